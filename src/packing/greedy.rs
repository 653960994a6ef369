//! Greedy packers
//!
//! - [`pack_greedy`]: repeated first-fit scans; each scan fills one chunk
//!   from every remaining item that still fits
//! - [`pack_sequential`]: one forward pass over a single open chunk

use super::store::{sorted_by_size_desc, Chunk, ContentItem};
use super::{check_capacity, PackError, Pass};

/// Multi-pass greedy packing
///
/// Items that no scan can place are returned in `leftover`.
pub(crate) fn pack_greedy<'a>(
    items: &[&'a ContentItem],
    capacity: usize,
) -> Result<Pass<'a>, PackError> {
    check_capacity(capacity)?;

    let sorted = sorted_by_size_desc(items);
    let mut used = vec![false; sorted.len()];
    let mut remaining = sorted.len();
    let mut chunks = Vec::new();

    while remaining > 0 {
        let mut chunk = Chunk::new();
        let mut running = 0usize;

        for (i, &item) in sorted.iter().enumerate() {
            if used[i] {
                continue;
            }
            if running + item.size <= capacity {
                running += item.size;
                chunk.push(item);
                used[i] = true;
                remaining -= 1;
            }
        }

        if chunk.is_empty() {
            break;
        }
        chunks.push(chunk);
    }

    let leftover = sorted
        .iter()
        .zip(&used)
        .filter_map(|(&item, &placed)| (!placed).then_some(item))
        .collect();

    Ok(Pass {
        chunks,
        leftover,
        exact: true,
    })
}

/// First-fit-descending with a single running chunk
///
/// An empty chunk always accepts its first item, so callers must not pass
/// items larger than `capacity`.
pub(crate) fn pack_sequential<'a>(
    items: &[&'a ContentItem],
    capacity: usize,
) -> Result<Pass<'a>, PackError> {
    check_capacity(capacity)?;

    let mut chunks = Vec::new();
    let mut open = Chunk::new();
    let mut running = 0usize;

    for item in sorted_by_size_desc(items) {
        if !open.is_empty() && running + item.size > capacity {
            chunks.push(std::mem::take(&mut open));
            running = 0;
        }
        running += item.size;
        open.push(item);
    }

    if !open.is_empty() {
        chunks.push(open);
    }

    Ok(Pass {
        chunks,
        leftover: Vec::new(),
        exact: true,
    })
}
