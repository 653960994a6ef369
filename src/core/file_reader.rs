//! Source reading
//!
//! Turns one file into the text that gets measured and packed:
//! - Markdown, Python and plain text are read as UTF-8
//! - Jupyter notebooks are parsed and their cell sources joined
//! - PDFs have the text of every page extracted
//!
//! Anything that stops a source from becoming an item is reported as a
//! [`FileWarning`] instead of failing the run. Content is never truncated.

use serde::{Deserialize, Serialize};
use std::fs;
use std::panic;
use std::path::Path;
use tracing::debug;

use crate::core::model::{Diagnostic, ResultItem};

/// Default maximum file size in bytes (64 MB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 64 * 1024 * 1024;

/// Bytes inspected for NUL when detecting binary files
const BINARY_SNIFF_LEN: usize = 8192;

/// Separator placed between notebook cells
const CELL_SEPARATOR: &str = "\n\n";

/// Supported source formats, keyed by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Markdown,
    Notebook,
    Python,
    Text,
    Pdf,
}

impl SourceKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "md" | "markdown" => Some(SourceKind::Markdown),
            "ipynb" => Some(SourceKind::Notebook),
            "py" => Some(SourceKind::Python),
            "txt" | "text" => Some(SourceKind::Text),
            "pdf" => Some(SourceKind::Pdf),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

/// Strategy for handling non-UTF-8 content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingStrategy {
    /// Skip non-UTF-8 files entirely
    Skip,
    /// Replace invalid sequences with U+FFFD
    #[default]
    Lossy,
}

impl std::str::FromStr for EncodingStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip" => Ok(EncodingStrategy::Skip),
            "lossy" => Ok(EncodingStrategy::Lossy),
            _ => Err(format!("Unknown encoding strategy: {}", s)),
        }
    }
}

/// Configuration for file reading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReadConfig {
    /// Files larger than this are skipped (bytes)
    pub max_file_size: u64,

    /// How to handle non-UTF-8 content
    pub encoding_strategy: EncodingStrategy,
}

impl Default for FileReadConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            encoding_strategy: EncodingStrategy::Lossy,
        }
    }
}

/// Result of reading one source
#[derive(Debug, Clone, Default)]
pub struct FileReadResult {
    /// Extracted text, `None` if the source was skipped
    pub content: Option<String>,

    /// Whether lossy conversion was used
    pub lossy_conversion: bool,

    /// Size on disk
    pub bytes: u64,

    pub warnings: Vec<FileWarning>,
}

impl FileReadResult {
    fn success(content: String, bytes: u64) -> Self {
        Self {
            content: Some(content),
            bytes,
            ..Self::default()
        }
    }

    fn skipped(warning: FileWarning) -> Self {
        Self {
            warnings: vec![warning],
            ..Self::default()
        }
    }

    fn with_lossy(mut self, warning: FileWarning) -> Self {
        self.lossy_conversion = true;
        self.warnings.push(warning);
        self
    }
}

/// Warning codes for source reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningCode {
    /// File was skipped due to size
    FileSkippedSize,
    /// File was skipped due to encoding
    FileSkippedEncoding,
    /// Lossy encoding conversion used
    LossyConversion,
    /// File appears to be binary
    BinaryFile,
    /// Notebook JSON could not be parsed
    NotebookParseFailed,
    /// Nothing but whitespace after extraction
    EmptyContent,
    /// PDF could not be parsed or has no extractable text layer
    PdfExtractFailed,
    /// I/O error while reading
    ReadFailed,
}

impl WarningCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarningCode::FileSkippedSize => "FILE_SKIPPED_SIZE",
            WarningCode::FileSkippedEncoding => "FILE_SKIPPED_ENCODING",
            WarningCode::LossyConversion => "LOSSY_CONVERSION",
            WarningCode::BinaryFile => "BINARY_FILE",
            WarningCode::NotebookParseFailed => "NOTEBOOK_PARSE_FAILED",
            WarningCode::EmptyContent => "EMPTY_CONTENT",
            WarningCode::PdfExtractFailed => "PDF_EXTRACT_FAILED",
            WarningCode::ReadFailed => "READ_FAILED",
        }
    }
}

/// A structured warning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileWarning {
    pub code: WarningCode,
    pub message: String,
}

impl FileWarning {
    pub fn new(code: WarningCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::new(self.code.as_str(), &self.message)
    }

    /// Convert to a warning record for `path`
    pub fn to_result_item(&self, path: &str) -> ResultItem {
        ResultItem::warning(path, self.to_diagnostic())
    }
}

/// Read one source with the given configuration
pub fn read_source(path: &Path, config: &FileReadConfig) -> FileReadResult {
    let kind = SourceKind::from_path(path).unwrap_or(SourceKind::Text);

    let file_size = match fs::metadata(path) {
        Ok(m) => m.len(),
        Err(e) => {
            return FileReadResult::skipped(FileWarning::new(
                WarningCode::ReadFailed,
                format!("Cannot read metadata: {}", e),
            ));
        }
    };

    if file_size > config.max_file_size {
        return FileReadResult::skipped(FileWarning::new(
            WarningCode::FileSkippedSize,
            format!(
                "File exceeds size limit ({} > {} bytes)",
                file_size, config.max_file_size
            ),
        ));
    }

    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            return FileReadResult::skipped(FileWarning::new(
                WarningCode::ReadFailed,
                format!("Cannot read file: {}", e),
            ));
        }
    };

    let result = match kind {
        SourceKind::Pdf => read_pdf(&bytes, file_size),
        SourceKind::Notebook => into_notebook_text(decode_text(bytes, file_size, config)),
        SourceKind::Markdown | SourceKind::Python | SourceKind::Text => {
            decode_text(bytes, file_size, config)
        }
    };

    match &result.content {
        Some(text) if text.trim().is_empty() => FileReadResult::skipped(FileWarning::new(
            WarningCode::EmptyContent,
            "No text content",
        )),
        _ => result,
    }
}

/// A NUL byte in the first [`BINARY_SNIFF_LEN`] bytes marks a binary file
fn is_binary(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(BINARY_SNIFF_LEN)];
    head.contains(&0)
}

/// Decode a text source as UTF-8 according to the encoding strategy
fn decode_text(bytes: Vec<u8>, file_size: u64, config: &FileReadConfig) -> FileReadResult {
    if is_binary(&bytes) {
        return FileReadResult::skipped(FileWarning::new(
            WarningCode::BinaryFile,
            "File appears to be binary (contains null bytes)",
        ));
    }

    match String::from_utf8(bytes) {
        Ok(text) => FileReadResult::success(text, file_size),
        Err(err) => match config.encoding_strategy {
            EncodingStrategy::Skip => FileReadResult::skipped(FileWarning::new(
                WarningCode::FileSkippedEncoding,
                "File contains invalid UTF-8 sequences",
            )),
            EncodingStrategy::Lossy => {
                let text = String::from_utf8_lossy(err.as_bytes()).into_owned();
                FileReadResult::success(text, file_size).with_lossy(FileWarning::new(
                    WarningCode::LossyConversion,
                    "Lossy UTF-8 conversion applied (some characters replaced)",
                ))
            }
        },
    }
}

/// Extract the text layer of every page, in page order
fn read_pdf(bytes: &[u8], file_size: u64) -> FileReadResult {
    // pdf-extract panics on some malformed documents instead of returning an error
    let extracted = panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes));

    match extracted {
        Ok(Ok(text)) => FileReadResult::success(text, file_size),
        Ok(Err(e)) => FileReadResult::skipped(FileWarning::new(
            WarningCode::PdfExtractFailed,
            format!("Cannot extract PDF text: {}", e),
        )),
        Err(_) => {
            debug!("pdf-extract panicked");
            FileReadResult::skipped(FileWarning::new(
                WarningCode::PdfExtractFailed,
                "Cannot extract PDF text: malformed document",
            ))
        }
    }
}

fn into_notebook_text(mut result: FileReadResult) -> FileReadResult {
    let Some(raw) = result.content.take() else {
        return result;
    };
    match notebook_text(&raw) {
        Ok(text) => {
            result.content = Some(text);
            result
        }
        Err(e) => FileReadResult::skipped(FileWarning::new(
            WarningCode::NotebookParseFailed,
            format!("Invalid notebook: {}", e),
        )),
    }
}

#[derive(Deserialize)]
struct Notebook {
    #[serde(default)]
    cells: Vec<Cell>,
}

#[derive(Deserialize)]
struct Cell {
    #[serde(default)]
    source: CellSource,
}

/// nbformat stores a cell source either as one string or as a list of lines
#[derive(Deserialize)]
#[serde(untagged)]
enum CellSource {
    Text(String),
    Lines(Vec<String>),
}

impl Default for CellSource {
    fn default() -> Self {
        CellSource::Text(String::new())
    }
}

impl CellSource {
    fn into_text(self) -> String {
        match self {
            CellSource::Text(text) => text,
            CellSource::Lines(lines) => lines.concat(),
        }
    }
}

/// Join the sources of every cell (markdown and code) in notebook order
pub fn notebook_text(raw: &str) -> Result<String, serde_json::Error> {
    let notebook: Notebook = serde_json::from_str(raw)?;
    Ok(notebook
        .cells
        .into_iter()
        .map(|cell| cell.source.into_text())
        .filter(|text| !text.trim().is_empty())
        .collect::<Vec<_>>()
        .join(CELL_SEPARATOR))
}
