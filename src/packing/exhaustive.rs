//! Exhaustive best-subset packing
//!
//! Each chunk is the subset of the remaining items with the largest total
//! size that still fits capacity. The subset search is a depth-first
//! branch-and-bound over the size-sorted pool:
//!
//! - candidates are tried include-first, in sorted order, so the first
//!   subset found for any total wins ties
//! - a branch stops when even taking every remaining item cannot beat the
//!   best total so far
//! - equal-size siblings at the same depth are explored once
//! - the search ends as soon as a subset fills capacity exactly
//!
//! Visited nodes are capped by a budget. A capped search keeps the best
//! subset it has seen and marks the pass as inexact.

use tracing::{debug, warn};

use super::store::{sorted_by_size_desc, Chunk, ContentItem};
use super::{check_capacity, PackError, Pass};

/// Pack by repeatedly removing the best-fitting subset from the pool
pub(crate) fn pack_exhaustive<'a>(
    items: &[&'a ContentItem],
    capacity: usize,
    budget: usize,
) -> Result<Pass<'a>, PackError> {
    check_capacity(capacity)?;
    if budget == 0 {
        return Err(PackError::InvalidConfig(
            "search_budget must be at least 1".to_string(),
        ));
    }

    let mut remaining = sorted_by_size_desc(items);
    let mut chunks = Vec::new();
    let mut exact = true;

    while !remaining.is_empty() {
        let sizes: Vec<usize> = remaining.iter().map(|item| item.size).collect();
        let outcome = best_subset(&sizes, capacity, budget);

        if outcome.exhausted {
            exact = false;
            warn!(
                chunk = chunks.len(),
                pool = sizes.len(),
                budget,
                best = outcome.total,
                "subset search budget exhausted; using best subset found"
            );
        } else {
            debug!(
                chunk = chunks.len(),
                pool = sizes.len(),
                nodes = outcome.nodes,
                total = outcome.total,
                "best subset found"
            );
        }

        // Zero-size items cost nothing; they join whichever chunk is forming
        let mut picked = outcome.indices;
        picked.extend(
            sizes
                .iter()
                .enumerate()
                .filter_map(|(i, &size)| (size == 0).then_some(i)),
        );
        picked.sort_unstable();
        picked.dedup();

        if picked.is_empty() {
            break;
        }

        chunks.push(Chunk::from_items(
            picked.iter().map(|&i| remaining[i]).collect(),
        ));

        remaining = remaining
            .into_iter()
            .enumerate()
            .filter_map(|(i, item)| picked.binary_search(&i).is_err().then_some(item))
            .collect();
    }

    Ok(Pass {
        chunks,
        leftover: remaining,
        exact,
    })
}

/// Best subset of one pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SubsetOutcome {
    /// Ascending indices into the pool
    pub indices: Vec<usize>,
    pub total: usize,
    pub nodes: usize,
    pub exhausted: bool,
}

/// Find the subset of `sizes` (sorted descending) with the largest total
/// not exceeding `capacity`, visiting at most `budget` nodes
pub(crate) fn best_subset(sizes: &[usize], capacity: usize, budget: usize) -> SubsetOutcome {
    let mut suffix = vec![0usize; sizes.len() + 1];
    for i in (0..sizes.len()).rev() {
        suffix[i] = suffix[i + 1].saturating_add(sizes[i]);
    }

    let mut search = SubsetSearch {
        sizes,
        suffix,
        capacity,
        budget,
        nodes: 0,
        current: Vec::new(),
        current_total: 0,
        best: Vec::new(),
        best_total: 0,
        exhausted: false,
    };
    search.extend(0);

    SubsetOutcome {
        indices: search.best,
        total: search.best_total,
        nodes: search.nodes,
        exhausted: search.exhausted,
    }
}

struct SubsetSearch<'s> {
    sizes: &'s [usize],
    /// `suffix[i]` is the sum of `sizes[i..]`
    suffix: Vec<usize>,
    capacity: usize,
    budget: usize,
    nodes: usize,
    current: Vec<usize>,
    current_total: usize,
    best: Vec<usize>,
    best_total: usize,
    exhausted: bool,
}

impl SubsetSearch<'_> {
    fn finished(&self) -> bool {
        self.exhausted || self.best_total == self.capacity
    }

    fn extend(&mut self, start: usize) {
        for i in start..self.sizes.len() {
            if self.finished() {
                return;
            }
            // Suffix sums shrink with i, so no later sibling can win either
            if self.current_total + self.suffix[i] <= self.best_total {
                return;
            }

            let size = self.sizes[i];
            if self.current_total + size > self.capacity {
                continue;
            }
            if i > start && size == self.sizes[i - 1] {
                continue;
            }

            if self.nodes >= self.budget {
                self.exhausted = true;
                return;
            }
            self.nodes += 1;

            self.current.push(i);
            self.current_total += size;
            if self.current_total > self.best_total {
                self.best_total = self.current_total;
                self.best.clone_from(&self.current);
            }

            self.extend(i + 1);

            self.current.pop();
            self.current_total -= size;
        }
    }
}
