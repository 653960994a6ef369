//! Output record model
//!
//! Every command maps what it produced (measured items, chunks, unplaced
//! items, warnings) to [`ResultItem`] records before rendering.

use serde::{Deserialize, Serialize};

/// The kind of an output record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// A measured source item
    Item,
    /// One packed chunk
    Chunk,
    /// An item left out of every chunk
    Unplaced,
    /// A source skipped or altered while reading
    Warning,
    Error,
}

/// Metadata for a record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    /// Source size in bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,

    /// XXH3 hash of the record's text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,

    /// Invalid UTF-8 was replaced while reading
    #[serde(default)]
    pub lossy: bool,
}

/// A coded diagnostic attached to warning and error records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// One output record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultItem {
    pub kind: Kind,

    /// Item identifier, a '/'-separated path relative to root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// 0-based chunk index in emission order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk: Option<usize>,

    /// Measured size (item, unplaced) or total size (chunk)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,

    /// Chunk text, or a message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,

    /// Structured payload (chunk members, reports)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    #[serde(default)]
    pub meta: Meta,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<Diagnostic>,
}

impl ResultItem {
    fn bare(kind: Kind) -> Self {
        Self {
            kind,
            path: None,
            chunk: None,
            size: None,
            excerpt: None,
            data: None,
            meta: Meta::default(),
            errors: Vec::new(),
        }
    }

    /// A measured source item
    pub fn item(path: impl Into<String>, size: usize) -> Self {
        Self {
            path: Some(path.into()),
            size: Some(size),
            ..Self::bare(Kind::Item)
        }
    }

    /// A packed chunk
    pub fn chunk(index: usize, size: usize) -> Self {
        Self {
            chunk: Some(index),
            size: Some(size),
            ..Self::bare(Kind::Chunk)
        }
    }

    /// An item that no chunk holds
    pub fn unplaced(path: impl Into<String>, size: usize, reason: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            size: Some(size),
            excerpt: Some(reason.into()),
            ..Self::bare(Kind::Unplaced)
        }
    }

    /// A non-fatal problem with one source
    pub fn warning(path: impl Into<String>, diagnostic: Diagnostic) -> Self {
        Self {
            path: Some(path.into()),
            errors: vec![diagnostic],
            ..Self::bare(Kind::Warning)
        }
    }

    pub fn error(diagnostic: Diagnostic) -> Self {
        Self {
            errors: vec![diagnostic],
            ..Self::bare(Kind::Error)
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = meta;
        self
    }

    pub fn with_excerpt(mut self, excerpt: impl Into<String>) -> Self {
        self.excerpt = Some(excerpt.into());
        self
    }

    /// Set structured data payload
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

/// Ordered records for one command
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultSet {
    pub items: Vec<ResultItem>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn push(&mut self, item: ResultItem) {
        self.items.push(item);
    }

    pub fn extend(&mut self, items: impl IntoIterator<Item = ResultItem>) {
        self.items.extend(items);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn count(&self, kind: Kind) -> usize {
        self.items.iter().filter(|item| item.kind == kind).count()
    }
}

impl IntoIterator for ResultSet {
    type Item = ResultItem;
    type IntoIter = std::vec::IntoIter<ResultItem>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl FromIterator<ResultItem> for ResultSet {
    fn from_iter<T: IntoIterator<Item = ResultItem>>(iter: T) -> Self {
        Self {
            items: iter.into_iter().collect(),
        }
    }
}
