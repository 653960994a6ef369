//! Packing flow - scan, measure and pack sources into chunks
//!
//! Emits one chunk record per chunk in emission order, then one unplaced
//! record per excluded item, then the warnings collected while reading.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use serde_json::json;
use std::path::Path;
use tracing::{debug, info};

use crate::backends::scan::{load_sources, LoadedSources, ScanOptions};
use crate::core::file_reader::FileReadConfig;
use crate::core::model::{Diagnostic, Kind, Meta, ResultItem, ResultSet};
use crate::core::render::{RenderConfig, Renderer};
use crate::core::tokenizer::CostOracle;
use crate::core::util::hash_bytes;
use crate::packing::{pack, Chunk, PackConfig, PackError, Packing, Strategy};

/// Error code for items rejected as larger than capacity
pub const OVERSIZED_ITEM: &str = "OVERSIZED_ITEM";

/// Options for the pack command
#[derive(Debug, Clone, Default)]
pub struct PackOptions {
    pub strategy: Strategy,
    pub config: PackConfig,
    /// Put the concatenated chunk text in each chunk record
    pub include_text: bool,
}

/// Summary of one packing run
#[derive(Debug, Clone, Serialize)]
pub struct PackStats {
    pub strategy: String,
    pub model: String,
    pub items: usize,
    /// Items that ended up in a chunk
    pub placed: usize,
    pub total_size: usize,
    pub largest_item: usize,
    pub chunks: usize,
    pub unplaced: usize,
    pub warnings: usize,
    /// Capacity requested
    pub capacity: usize,
    /// Capacity the returned chunks were packed at
    pub packed_capacity: usize,
    pub min_chunk: usize,
    pub max_chunk: usize,
    pub spread: usize,
    pub attempts: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converged: Option<bool>,
    pub exact: bool,
}

impl PackStats {
    fn new(packing: &Packing<'_>, loaded: &LoadedSources, capacity: usize, model: String) -> Self {
        let sizes = packing.chunk_sizes();
        Self {
            strategy: packing.report.strategy.to_string(),
            model,
            items: loaded.store.len(),
            placed: packing.placed_count(),
            total_size: loaded.store.total_size(),
            largest_item: loaded.store.max_size(),
            chunks: packing.chunks.len(),
            unplaced: packing.unplaced.len(),
            warnings: loaded.warnings.len(),
            capacity,
            packed_capacity: packing.report.capacity,
            min_chunk: sizes.iter().copied().min().unwrap_or(0),
            max_chunk: sizes.iter().copied().max().unwrap_or(0),
            spread: packing.spread(),
            attempts: packing.report.attempts,
            converged: packing.report.converged,
            exact: packing.report.exact,
        }
    }
}

fn chunk_record(
    index: usize,
    chunk: &Chunk<'_>,
    loaded: &LoadedSources,
    include_text: bool,
) -> ResultItem {
    let text = chunk.text();
    let sizes: Vec<usize> = chunk.items().iter().map(|item| item.size).collect();
    let lossy = chunk
        .identifiers()
        .iter()
        .any(|id| loaded.meta_for(id).lossy);

    let mut record = ResultItem::chunk(index, chunk.total_size())
        .with_data(json!({
            "members": chunk.identifiers(),
            "sizes": sizes,
        }))
        .with_meta(Meta {
            bytes: None,
            hash: Some(hash_bytes(text.as_bytes())),
            lossy,
        });
    if include_text {
        record = record.with_excerpt(text);
    }
    record
}

/// Pack the loaded sources and build the output records
pub fn pack_sources(
    loaded: &LoadedSources,
    options: &PackOptions,
    model: String,
) -> Result<(ResultSet, PackStats), PackError> {
    let packing = pack(loaded.store.items(), options.strategy, &options.config)?;

    let mut result_set = ResultSet::new();
    for (index, chunk) in packing.chunks.iter().enumerate() {
        result_set.push(chunk_record(index, chunk, loaded, options.include_text));
    }
    for unplaced in &packing.unplaced {
        let item = unplaced.item;
        result_set.push(
            ResultItem::unplaced(&item.identifier, item.size, unplaced.reason.as_str())
                .with_meta(loaded.meta_for(&item.identifier)),
        );
    }
    result_set.extend(loaded.warnings.iter().cloned());

    let stats = PackStats::new(&packing, loaded, options.config.capacity, model);
    Ok((result_set, stats))
}

/// One error record per item named in an oversize rejection
pub fn oversized_records(err: &PackError) -> Vec<ResultItem> {
    match err {
        PackError::OversizedItems { capacity, items } => items
            .iter()
            .map(|item| {
                ResultItem::error(Diagnostic::new(
                    OVERSIZED_ITEM,
                    format!("size {} exceeds capacity {}", item.size, capacity),
                ))
                .with_path(&item.identifier)
            })
            .collect(),
        PackError::InvalidConfig(_) => Vec::new(),
    }
}

fn print_stats(stats: &PackStats) {
    eprintln!("{}", "📦 Pack Statistics:".bold());
    eprintln!(
        "   Strategy: {} (model: {})",
        stats.strategy.cyan(),
        stats.model
    );
    eprintln!(
        "   Items: {} ({} tokens, largest {})",
        stats.items, stats.total_size, stats.largest_item
    );
    eprintln!("   Placed: {} of {} item(s)", stats.placed, stats.items);
    eprintln!(
        "   Chunks: {} at capacity {} (requested {})",
        stats.chunks, stats.packed_capacity, stats.capacity
    );
    eprintln!(
        "   Chunk sizes: min {} / max {} / spread {}",
        stats.min_chunk, stats.max_chunk, stats.spread
    );
    match stats.converged {
        Some(true) => eprintln!(
            "   Balancing: {} after {} attempt(s)",
            "target met".green(),
            stats.attempts
        ),
        Some(false) => eprintln!(
            "   Balancing: {} after {} attempt(s), best kept",
            "target missed".yellow(),
            stats.attempts
        ),
        None => {}
    }
    if !stats.exact {
        eprintln!(
            "   {}",
            "Subset search budget exhausted; chunks may not be optimal".yellow()
        );
    }
    if stats.unplaced > 0 {
        eprintln!("   {}", format!("Unplaced: {} item(s)", stats.unplaced).red());
    }
    if stats.warnings > 0 {
        eprintln!("   Warnings: {}", stats.warnings);
    }
    eprintln!();
}

/// Run the pack command
pub fn run_pack<O>(
    root: &Path,
    scan_options: &ScanOptions,
    read_config: &FileReadConfig,
    oracle: &O,
    options: PackOptions,
    show_stats: bool,
    render_config: RenderConfig,
) -> Result<()>
where
    O: CostOracle + ?Sized,
{
    let loaded = load_sources(root, scan_options, read_config, oracle)?;
    if loaded.store.is_empty() {
        info!(root = %root.display(), "no sources to pack");
    }
    let renderer = Renderer::with_config(render_config);

    match pack_sources(&loaded, &options, oracle.name()) {
        Ok((result_set, stats)) => {
            debug!(
                chunks = result_set.count(Kind::Chunk),
                unplaced = result_set.count(Kind::Unplaced),
                "pack complete"
            );
            if show_stats {
                print_stats(&stats);
            }
            println!("{}", renderer.render(&result_set));
            Ok(())
        }
        Err(err @ PackError::OversizedItems { .. }) => {
            let mut result_set: ResultSet = oversized_records(&err).into_iter().collect();
            result_set.extend(loaded.warnings.iter().cloned());
            println!("{}", renderer.render(&result_set));
            Err(err.into())
        }
        Err(err) => Err(err.into()),
    }
}
