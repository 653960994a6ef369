//! Cost oracles - measure how much of a model's budget a text consumes
//!
//! Packing works on integer sizes only; where those come from is pluggable
//! through [`CostOracle`]. [`TokenModel`] is the built-in oracle:
//!
//! - cl100k_base (GPT-4, GPT-3.5-turbo; approximates Claude 3)
//! - o200k_base (GPT-4o)
//! - a heuristic estimate that needs no BPE tables
//!
//! ```rust
//! use ctxpack::core::tokenizer::{CostOracle, TokenModel};
//!
//! let size = TokenModel::default().cost("Hello world");
//! let rough = TokenModel::Heuristic.cost("mixed 混合 content");
//! ```

use once_cell::sync::Lazy;
use std::fmt;
use std::str::FromStr;
use tiktoken_rs::{cl100k_base, o200k_base, CoreBPE};

/// Measures the size of a text in some model-specific unit
pub trait CostOracle: Sync {
    fn cost(&self, text: &str) -> usize;

    /// Short name used in reports
    fn name(&self) -> String;
}

/// Supported token models/encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenModel {
    /// cl100k_base encoding (GPT-4, GPT-3.5-turbo, Claude 3)
    #[default]
    Cl100k,
    /// o200k_base encoding (GPT-4o native)
    O200k,
    /// GPT-4 / GPT-4-turbo (alias for Cl100k)
    Gpt4,
    /// GPT-4o (alias for O200k)
    Gpt4o,
    /// GPT-3.5-turbo (alias for Cl100k)
    Gpt35Turbo,
    /// Claude 3 / 3.5 (approximated with Cl100k)
    Claude3,
    /// Fast heuristic estimation (no BPE encoding)
    Heuristic,
}

/// BPE encodings backing the token models
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Cl100k,
    O200k,
}

impl Encoding {
    pub fn label(&self) -> &'static str {
        match self {
            Encoding::Cl100k => "cl100k_base",
            Encoding::O200k => "o200k_base",
        }
    }

    fn bpe(&self) -> Result<&'static CoreBPE, &'static str> {
        let loaded = match self {
            Encoding::Cl100k => &*CL100K_BPE,
            Encoding::O200k => &*O200K_BPE,
        };
        loaded.as_ref().map_err(String::as_str)
    }
}

impl TokenModel {
    /// The BPE encoding this model counts with, `None` for the heuristic
    pub fn encoding(&self) -> Option<Encoding> {
        match self {
            TokenModel::O200k | TokenModel::Gpt4o => Some(Encoding::O200k),
            TokenModel::Cl100k
            | TokenModel::Gpt4
            | TokenModel::Gpt35Turbo
            | TokenModel::Claude3 => Some(Encoding::Cl100k),
            TokenModel::Heuristic => None,
        }
    }

    /// List all available models
    pub fn available_models() -> &'static [&'static str] {
        &[
            "cl100k",
            "o200k",
            "gpt4",
            "gpt4o",
            "gpt35",
            "claude3",
            "heuristic",
        ]
    }
}

impl CostOracle for TokenModel {
    /// Falls back to the heuristic if the encoding failed to load
    fn cost(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        match self.encoding().map(|encoding| encoding.bpe()) {
            Some(Ok(bpe)) => bpe.encode_with_special_tokens(text).len(),
            _ => estimate_tokens_heuristic(text),
        }
    }

    fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for TokenModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenModel::Cl100k => "cl100k",
            TokenModel::O200k => "o200k",
            TokenModel::Gpt4 => "gpt4",
            TokenModel::Gpt4o => "gpt4o",
            TokenModel::Gpt35Turbo => "gpt35",
            TokenModel::Claude3 => "claude3",
            TokenModel::Heuristic => "heuristic",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for TokenModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cl100k" | "cl100k_base" | "default" => Ok(TokenModel::Cl100k),
            "o200k" | "o200k_base" => Ok(TokenModel::O200k),
            "gpt4" | "gpt-4" | "gpt-4-turbo" => Ok(TokenModel::Gpt4),
            "gpt4o" | "gpt-4o" => Ok(TokenModel::Gpt4o),
            "gpt35" | "gpt-3.5" | "gpt-3.5-turbo" | "gpt-3.5-turbo-1106" => {
                Ok(TokenModel::Gpt35Turbo)
            }
            "claude" | "claude3" | "claude-3" | "claude-3.5" => Ok(TokenModel::Claude3),
            "heuristic" | "fast" | "estimate" => Ok(TokenModel::Heuristic),
            _ => Err(format!(
                "Unknown model: {}. Available: {}",
                s,
                TokenModel::available_models().join(", ")
            )),
        }
    }
}

// Loaded once on first use
static CL100K_BPE: Lazy<Result<CoreBPE, String>> =
    Lazy::new(|| cl100k_base().map_err(|e| format!("Failed to load cl100k_base: {}", e)));

static O200K_BPE: Lazy<Result<CoreBPE, String>> =
    Lazy::new(|| o200k_base().map_err(|e| format!("Failed to load o200k_base: {}", e)));

/// Load every encoding and report `(label, error)` for each
pub fn encoding_status() -> Vec<(&'static str, Option<String>)> {
    [Encoding::Cl100k, Encoding::O200k]
        .into_iter()
        .map(|encoding| {
            let error = encoding.bpe().err().map(str::to_string);
            (encoding.label(), error)
        })
        .collect()
}

/// Estimate tokens without BPE encoding
///
/// Rough ratios: ASCII words ~4 chars/token, code symbols ~2 chars/token,
/// CJK ~1.5 chars/token, other Unicode ~2 chars/token.
pub fn estimate_tokens_heuristic(text: &str) -> usize {
    let mut words = 0usize;
    let mut symbols = 0usize;
    let mut cjk = 0usize;
    let mut other = 0usize;

    for c in text.chars() {
        if c.is_ascii() {
            if is_code_symbol(c) {
                symbols += 1;
            } else {
                words += 1;
            }
        } else if is_cjk_char(c) {
            cjk += 1;
        } else {
            other += 1;
        }
    }

    words.div_ceil(4) + symbols.div_ceil(2) + (cjk * 2).div_ceil(3) + other.div_ceil(2)
}

#[inline]
fn is_code_symbol(c: char) -> bool {
    c.is_ascii_punctuation() && c != '_'
}

#[inline]
fn is_cjk_char(c: char) -> bool {
    matches!(
        c as u32,
        0x4E00..=0x9FFF     // CJK Unified Ideographs
            | 0x3400..=0x4DBF   // Extension A
            | 0x3000..=0x30FF   // Symbols, punctuation, Hiragana, Katakana
            | 0xAC00..=0xD7AF   // Hangul Syllables
            | 0xFF00..=0xFFEF   // Fullwidth Forms
    )
}
