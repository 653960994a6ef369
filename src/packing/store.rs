//! Content item store and the chunk view built over it

use serde::Serialize;

use crate::core::tokenizer::CostOracle;

/// One unit of content with its measured cost
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentItem {
    /// Stable identifier, usually a path relative to the scan root
    pub identifier: String,
    pub text: String,
    pub size: usize,
}

impl ContentItem {
    pub fn new(identifier: impl Into<String>, text: impl Into<String>, size: usize) -> Self {
        Self {
            identifier: identifier.into(),
            text: text.into(),
            size,
        }
    }
}

/// Ordered, immutable collection of content items for one packing run
#[derive(Debug, Clone, Default)]
pub struct ContentStore {
    items: Vec<ContentItem>,
}

impl ContentStore {
    /// Build a store from items whose sizes are already known
    pub fn from_items(items: Vec<ContentItem>) -> Self {
        Self { items }
    }

    /// Measure each `(identifier, text)` pair with `oracle` and keep input order
    #[cfg(not(feature = "parallel"))]
    pub fn measure<O>(sources: Vec<(String, String)>, oracle: &O) -> Self
    where
        O: CostOracle + ?Sized,
    {
        let items = sources
            .into_iter()
            .map(|(identifier, text)| {
                let size = oracle.cost(&text);
                ContentItem::new(identifier, text, size)
            })
            .collect();
        Self::from_items(items)
    }

    /// Measure each `(identifier, text)` pair with `oracle` and keep input order
    #[cfg(feature = "parallel")]
    pub fn measure<O>(sources: Vec<(String, String)>, oracle: &O) -> Self
    where
        O: CostOracle + ?Sized,
    {
        use rayon::prelude::*;

        // collect() on an indexed parallel iterator preserves order
        let items = sources
            .into_par_iter()
            .map(|(identifier, text)| {
                let size = oracle.cost(&text);
                ContentItem::new(identifier, text, size)
            })
            .collect();
        Self::from_items(items)
    }

    pub fn items(&self) -> &[ContentItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_size(&self) -> usize {
        self.items.iter().map(|item| item.size).sum()
    }

    /// Largest single item size, 0 for an empty store
    pub fn max_size(&self) -> usize {
        self.items.iter().map(|item| item.size).max().unwrap_or(0)
    }
}

/// A group of items dispatched downstream as one unit
///
/// Chunks borrow their members from the store. The total size is always
/// derived from membership.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chunk<'a> {
    items: Vec<&'a ContentItem>,
}

impl<'a> Chunk<'a> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    pub fn from_items(items: Vec<&'a ContentItem>) -> Self {
        Self { items }
    }

    pub fn push(&mut self, item: &'a ContentItem) {
        self.items.push(item);
    }

    pub fn items(&self) -> &[&'a ContentItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_size(&self) -> usize {
        self.items.iter().map(|item| item.size).sum()
    }

    /// Member texts concatenated in chunk order
    pub fn text(&self) -> String {
        self.items.iter().map(|item| item.text.as_str()).collect()
    }

    pub fn identifiers(&self) -> Vec<&'a str> {
        self.items.iter().map(|item| item.identifier.as_str()).collect()
    }
}

/// Sort item references by size descending; ties keep input order
pub(crate) fn sorted_by_size_desc<'a>(items: &[&'a ContentItem]) -> Vec<&'a ContentItem> {
    let mut sorted = items.to_vec();
    sorted.sort_by(|a, b| b.size.cmp(&a.size));
    sorted
}
