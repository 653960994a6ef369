//! Source scanning backend
//!
//! Walks the root with the ignore crate, keeps files with a supported
//! extension and turns them into measured content items.

use anyhow::{bail, Context, Result};
use ignore::WalkBuilder;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::core::file_reader::{read_source, FileReadConfig, SourceKind};
use crate::core::model::{Kind, Meta, ResultItem, ResultSet};
use crate::core::paths::{is_within_root, make_relative};
use crate::core::render::{RenderConfig, Renderer};
use crate::core::tokenizer::CostOracle;
use crate::core::util::hash_bytes;
use crate::packing::ContentStore;

/// Extensions scanned when none are given
pub const DEFAULT_EXTENSIONS: &[&str] = &["md", "ipynb", "py", "pdf"];

/// What to walk and which files to keep
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Subdirectory of the root to restrict the walk to
    pub scope: Option<PathBuf>,
    pub max_depth: Option<usize>,
    /// Include hidden files and directories
    pub hidden: bool,
    /// Ignore .gitignore and .ignore rules
    pub no_ignore: bool,
    /// Lowercase extensions without the dot
    pub extensions: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            scope: None,
            max_depth: None,
            hidden: false,
            no_ignore: false,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl ScanOptions {
    /// Parse a comma-separated extension list such as `md,.ipynb, py`
    pub fn parse_extensions(list: &str) -> Vec<String> {
        list.split(',')
            .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect()
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }
}

/// A file found by the scanner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub path: PathBuf,
    /// '/'-separated path relative to the root; the item identifier
    pub relative: String,
    pub kind: Option<SourceKind>,
}

/// Find supported files under `root`, sorted by relative path
pub fn find_sources(root: &Path, options: &ScanOptions) -> Result<Vec<Source>> {
    let scan_path = match &options.scope {
        Some(scope) => {
            let joined = root.join(scope);
            if !is_within_root(&joined, root) {
                bail!(
                    "scope {} is not a directory inside {}",
                    scope.display(),
                    root.display()
                );
            }
            joined
        }
        None => root.to_path_buf(),
    };

    let use_ignore = !options.no_ignore;
    let mut builder = WalkBuilder::new(&scan_path);
    builder
        .hidden(!options.hidden)
        .ignore(use_ignore)
        .git_ignore(use_ignore)
        .git_global(use_ignore)
        .git_exclude(use_ignore)
        .require_git(false)
        .max_depth(options.max_depth);

    let mut sources = Vec::new();
    for entry in builder.build() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!(error = %e, "skipping unreadable entry");
                continue;
            }
        };

        let path = entry.path();
        if !entry.file_type().is_some_and(|t| t.is_file()) || !options.accepts(path) {
            continue;
        }

        let Some(relative) = make_relative(path, root) else {
            continue;
        };

        sources.push(Source {
            path: path.to_path_buf(),
            relative,
            kind: SourceKind::from_path(path),
        });
    }

    sources.sort_by(|a, b| a.relative.cmp(&b.relative));
    debug!(root = %root.display(), count = sources.len(), "sources found");
    Ok(sources)
}

/// Measured items plus everything reported while reading them
#[derive(Debug, Default)]
pub struct LoadedSources {
    pub store: ContentStore,
    /// Per-item metadata keyed by identifier
    pub meta: HashMap<String, Meta>,
    /// Warning records, in source order
    pub warnings: Vec<ResultItem>,
}

impl LoadedSources {
    pub fn meta_for(&self, identifier: &str) -> Meta {
        self.meta.get(identifier).cloned().unwrap_or_default()
    }
}

/// Scan, read and measure every source under `root`
pub fn load_sources<O>(
    root: &Path,
    options: &ScanOptions,
    read_config: &FileReadConfig,
    oracle: &O,
) -> Result<LoadedSources>
where
    O: CostOracle + ?Sized,
{
    let sources = find_sources(root, options)
        .with_context(|| format!("failed to scan {}", root.display()))?;

    let mut texts = Vec::with_capacity(sources.len());
    let mut meta = HashMap::with_capacity(sources.len());
    let mut warnings = Vec::new();

    for source in sources {
        let read = read_source(&source.path, read_config);
        warnings.extend(
            read.warnings
                .iter()
                .map(|warning| warning.to_result_item(&source.relative)),
        );

        let Some(text) = read.content else {
            debug!(path = %source.relative, "source skipped");
            continue;
        };

        meta.insert(
            source.relative.clone(),
            Meta {
                bytes: Some(read.bytes),
                hash: Some(hash_bytes(text.as_bytes())),
                lossy: read.lossy_conversion,
            },
        );
        texts.push((source.relative, text));
    }

    let store = ContentStore::measure(texts, oracle);
    info!(
        items = store.len(),
        total = store.total_size(),
        warnings = warnings.len(),
        oracle = %oracle.name(),
        "sources measured"
    );

    Ok(LoadedSources {
        store,
        meta,
        warnings,
    })
}

/// Item records for every measured source, warnings last
pub fn scan_records(loaded: &LoadedSources) -> ResultSet {
    let mut result_set: ResultSet = loaded
        .store
        .items()
        .iter()
        .map(|item| {
            ResultItem::item(&item.identifier, item.size)
                .with_meta(loaded.meta_for(&item.identifier))
        })
        .collect();
    result_set.extend(loaded.warnings.iter().cloned());
    result_set
}

/// Run the scan command
pub fn run_scan<O>(
    root: &Path,
    options: &ScanOptions,
    read_config: &FileReadConfig,
    oracle: &O,
    render_config: RenderConfig,
) -> Result<()>
where
    O: CostOracle + ?Sized,
{
    let loaded = load_sources(root, options, read_config, oracle)?;
    let result_set = scan_records(&loaded);
    if result_set.is_empty() {
        info!(root = %root.display(), "no sources found");
    }
    debug!(
        records = result_set.len(),
        warnings = result_set.count(Kind::Warning),
        "scan complete"
    );

    let renderer = Renderer::with_config(render_config);
    println!("{}", renderer.render(&result_set));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tokenizer::TokenModel;
    use std::fs;
    use tempfile::tempdir;

    fn relatives(sources: &[Source]) -> Vec<&str> {
        sources.iter().map(|s| s.relative.as_str()).collect()
    }

    #[test]
    fn test_scan_empty_dir() {
        let temp = tempdir().unwrap();
        let sources = find_sources(temp.path(), &ScanOptions::default()).unwrap();
        assert!(sources.is_empty());
    }

    #[test]
    fn test_scan_filters_by_extension_and_sorts() {
        let temp = tempdir().unwrap();
        fs::create_dir(temp.path().join("week1")).unwrap();
        fs::write(temp.path().join("week1/b.md"), "b").unwrap();
        fs::write(temp.path().join("a.py"), "a").unwrap();
        fs::write(temp.path().join("notes.txt"), "n").unwrap();
        fs::write(temp.path().join("main.rs"), "fn main() {}").unwrap();

        let sources = find_sources(temp.path(), &ScanOptions::default()).unwrap();
        assert_eq!(relatives(&sources), vec!["a.py", "week1/b.md"]);
        assert_eq!(sources[0].kind, Some(SourceKind::Python));
    }

    #[test]
    fn test_scan_custom_extensions() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("a.md"), "a").unwrap();
        fs::write(temp.path().join("b.TXT"), "b").unwrap();

        let options = ScanOptions {
            extensions: ScanOptions::parse_extensions(".txt"),
            ..ScanOptions::default()
        };
        let sources = find_sources(temp.path(), &options).unwrap();
        assert_eq!(relatives(&sources), vec!["b.TXT"]);
    }

    #[test]
    fn test_scan_respects_gitignore_and_hidden() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join(".gitignore"), "drafts/\n").unwrap();
        fs::create_dir(temp.path().join("drafts")).unwrap();
        fs::write(temp.path().join("drafts/wip.md"), "wip").unwrap();
        fs::write(temp.path().join(".hidden.md"), "secret").unwrap();
        fs::write(temp.path().join("kept.md"), "kept").unwrap();

        let sources = find_sources(temp.path(), &ScanOptions::default()).unwrap();
        assert_eq!(relatives(&sources), vec!["kept.md"]);

        let options = ScanOptions {
            hidden: true,
            no_ignore: true,
            ..ScanOptions::default()
        };
        let sources = find_sources(temp.path(), &options).unwrap();
        assert_eq!(
            relatives(&sources),
            vec![".hidden.md", "drafts/wip.md", "kept.md"]
        );
    }

    #[test]
    fn test_scan_max_depth_and_scope() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("a/b")).unwrap();
        fs::write(temp.path().join("top.md"), "t").unwrap();
        fs::write(temp.path().join("a/mid.md"), "m").unwrap();
        fs::write(temp.path().join("a/b/deep.md"), "d").unwrap();

        let shallow = ScanOptions {
            max_depth: Some(1),
            ..ScanOptions::default()
        };
        let sources = find_sources(temp.path(), &shallow).unwrap();
        assert_eq!(relatives(&sources), vec!["top.md"]);

        let scoped = ScanOptions {
            scope: Some(PathBuf::from("a")),
            ..ScanOptions::default()
        };
        let sources = find_sources(temp.path(), &scoped).unwrap();
        assert_eq!(relatives(&sources), vec!["a/b/deep.md", "a/mid.md"]);
    }

    #[test]
    fn test_scan_scope_outside_root_fails() {
        let temp = tempdir().unwrap();
        let options = ScanOptions {
            scope: Some(PathBuf::from("..")),
            ..ScanOptions::default()
        };
        assert!(find_sources(temp.path(), &options).is_err());
    }

    #[test]
    fn test_parse_extensions() {
        assert_eq!(
            ScanOptions::parse_extensions("md, .IPYNB,,py "),
            vec!["md", "ipynb", "py"]
        );
    }

    #[test]
    fn test_load_sources_measures_and_warns() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("intro.md"), "# Intro\n\nSome text here.").unwrap();
        fs::write(temp.path().join("empty.py"), "\n").unwrap();
        fs::write(temp.path().join("paper.pdf"), "%PDF-1.4").unwrap();

        let loaded = load_sources(
            temp.path(),
            &ScanOptions::default(),
            &FileReadConfig::default(),
            &TokenModel::Heuristic,
        )
        .unwrap();

        assert_eq!(loaded.store.len(), 1);
        let item = &loaded.store.items()[0];
        assert_eq!(item.identifier, "intro.md");
        assert!(item.size > 0);

        let meta = loaded.meta_for("intro.md");
        assert_eq!(meta.hash.as_ref().map(String::len), Some(16));
        assert!(!meta.lossy);

        let codes: Vec<(&str, &str)> = loaded
            .warnings
            .iter()
            .map(|w| (w.path.as_deref().unwrap(), w.errors[0].code.as_str()))
            .collect();
        assert_eq!(
            codes,
            vec![("empty.py", "EMPTY_CONTENT"), ("paper.pdf", "PDF_EXTRACT_FAILED")]
        );

        let records = scan_records(&loaded);
        assert_eq!(records.count(Kind::Item), 1);
        assert_eq!(records.count(Kind::Warning), 2);
        assert_eq!(records.items[0].kind, Kind::Item);
    }
}
