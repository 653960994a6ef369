//! Packing engine - partition size-weighted items into capacity-bounded chunks
//!
//! Strategies:
//! - greedy: repeated first-fit scans over the remaining items
//! - sequential: one running chunk, closed as soon as the next item overflows it
//! - balanced: sequential packing under a shrinking capacity, minimizing spread
//! - exhaustive: best-subset search per chunk (budgeted branch-and-bound)
//! - balanced-exhaustive: exhaustive packing under the balancing loop
//!
//! Every strategy is a pure function of its input items and [`PackConfig`].

pub mod balance;
pub mod error;
pub mod exhaustive;
pub mod greedy;
pub mod store;

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

pub use error::{OversizedItem, PackError};
pub use store::{Chunk, ContentItem, ContentStore};

/// Default chunk capacity in tokens
pub const DEFAULT_CAPACITY: usize = 8000;

/// Default number of balancing attempts
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Default acceptable spread between the largest and smallest chunk
pub const DEFAULT_TARGET_SPREAD: usize = 100;

/// Default node budget for one best-subset search
pub const DEFAULT_SEARCH_BUDGET: usize = 1_000_000;

/// Packing strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Repeated first-fit scans, one chunk per scan
    #[default]
    Greedy,
    /// Single forward pass with one open chunk
    Sequential,
    /// Sequential packing with capacity adjusted to minimize spread
    Balanced,
    /// Best-subset search for every chunk
    Exhaustive,
    /// Exhaustive packing with capacity adjusted to minimize spread
    BalancedExhaustive,
}

impl Strategy {
    pub fn available() -> &'static [&'static str] {
        &[
            "greedy",
            "sequential",
            "balanced",
            "exhaustive",
            "balanced-exhaustive",
        ]
    }

    /// Capacity step used by the balancing loop unless the config overrides it
    pub fn default_step(&self) -> CapacityStep {
        match self {
            Strategy::BalancedExhaustive => CapacityStep::Proportional,
            _ => CapacityStep::Unit,
        }
    }

    pub fn is_balancing(&self) -> bool {
        matches!(self, Strategy::Balanced | Strategy::BalancedExhaustive)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Greedy => "greedy",
            Strategy::Sequential => "sequential",
            Strategy::Balanced => "balanced",
            Strategy::Exhaustive => "exhaustive",
            Strategy::BalancedExhaustive => "balanced-exhaustive",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "greedy" | "multi-pass" => Ok(Strategy::Greedy),
            "sequential" | "ffd" => Ok(Strategy::Sequential),
            "balanced" | "adaptive" => Ok(Strategy::Balanced),
            "exhaustive" | "best-fit" | "bestfit" => Ok(Strategy::Exhaustive),
            "balanced-exhaustive" | "balanced_exhaustive" => Ok(Strategy::BalancedExhaustive),
            _ => Err(format!(
                "Unknown strategy: {}. Available: {}",
                s,
                Strategy::available().join(", ")
            )),
        }
    }
}

/// How far the balancing loop lowers capacity after a miss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CapacityStep {
    /// One unit per attempt
    Unit,
    /// `(spread - target) / chunk_count`, never less than one
    Proportional,
}

impl FromStr for CapacityStep {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unit" | "one" => Ok(CapacityStep::Unit),
            "proportional" | "size-aware" => Ok(CapacityStep::Proportional),
            _ => Err(format!("Unknown capacity step: {}", s)),
        }
    }
}

/// What to do with items that are larger than capacity on their own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OversizePolicy {
    /// Fail the whole run with [`PackError::OversizedItems`]
    #[default]
    Reject,
    /// Pack the rest and report the oversized items as unplaced
    Skip,
}

impl FromStr for OversizePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reject" | "error" => Ok(OversizePolicy::Reject),
            "skip" | "exclude" => Ok(OversizePolicy::Skip),
            _ => Err(format!("Unknown oversize policy: {}", s)),
        }
    }
}

/// Configuration for one packing run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackConfig {
    /// Maximum total size of one chunk
    pub capacity: usize,
    /// Attempts allowed to the balancing strategies
    pub max_iterations: usize,
    /// Spread at which the balancing strategies stop early
    pub target_spread: usize,
    /// Node budget for each best-subset search
    pub search_budget: usize,
    pub oversize: OversizePolicy,
    /// Overrides [`Strategy::default_step`]
    pub step: Option<CapacityStep>,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl PackConfig {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            target_spread: DEFAULT_TARGET_SPREAD,
            search_budget: DEFAULT_SEARCH_BUDGET,
            oversize: OversizePolicy::Reject,
            step: None,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_target_spread(mut self, target_spread: usize) -> Self {
        self.target_spread = target_spread;
        self
    }

    pub fn with_search_budget(mut self, search_budget: usize) -> Self {
        self.search_budget = search_budget;
        self
    }

    pub fn with_oversize(mut self, oversize: OversizePolicy) -> Self {
        self.oversize = oversize;
        self
    }

    pub fn with_step(mut self, step: CapacityStep) -> Self {
        self.step = Some(step);
        self
    }

    pub fn validate(&self) -> Result<(), PackError> {
        if self.capacity == 0 {
            return Err(PackError::InvalidConfig(
                "capacity must be greater than 0".to_string(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(PackError::InvalidConfig(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        if self.search_budget == 0 {
            return Err(PackError::InvalidConfig(
                "search_budget must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Why an item was left out of every chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnplacedReason {
    /// Larger than capacity before packing began
    Oversized,
    /// No chunk could take it during packing
    Unplaceable,
}

impl UnplacedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnplacedReason::Oversized => "oversized",
            UnplacedReason::Unplaceable => "unplaceable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unplaced<'a> {
    pub item: &'a ContentItem,
    pub reason: UnplacedReason,
}

/// How the returned packing was found
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchReport {
    pub strategy: Strategy,
    /// Packing passes run, including the returned one
    pub attempts: usize,
    /// Capacity the returned chunks were packed at
    pub capacity: usize,
    /// Whether the spread target was met (balancing strategies only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converged: Option<bool>,
    /// False when a subset search stopped on its budget
    pub exact: bool,
}

/// Result of one packing run
#[derive(Debug, Clone)]
pub struct Packing<'a> {
    pub chunks: Vec<Chunk<'a>>,
    pub unplaced: Vec<Unplaced<'a>>,
    pub report: SearchReport,
}

impl Packing<'_> {
    pub fn spread(&self) -> usize {
        spread(&self.chunks)
    }

    pub fn chunk_sizes(&self) -> Vec<usize> {
        self.chunks.iter().map(Chunk::total_size).collect()
    }

    pub fn placed_count(&self) -> usize {
        self.chunks.iter().map(Chunk::len).sum()
    }
}

/// Largest chunk size minus smallest; 0 for fewer than two chunks
pub fn spread(chunks: &[Chunk<'_>]) -> usize {
    let sizes = chunks.iter().map(Chunk::total_size);
    match (sizes.clone().max(), sizes.min()) {
        (Some(max), Some(min)) => max - min,
        _ => 0,
    }
}

/// Output of a single packing pass at a fixed capacity
#[derive(Debug, Clone, Default)]
pub(crate) struct Pass<'a> {
    pub chunks: Vec<Chunk<'a>>,
    /// Items the pass could not place anywhere
    pub leftover: Vec<&'a ContentItem>,
    pub exact: bool,
}

pub(crate) fn check_capacity(capacity: usize) -> Result<(), PackError> {
    if capacity == 0 {
        return Err(PackError::InvalidConfig(
            "capacity must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

/// Pack `items` with `strategy`
///
/// Items larger than `config.capacity` are rejected or skipped according to
/// `config.oversize` before the strategy runs.
pub fn pack<'a>(
    items: &'a [ContentItem],
    strategy: Strategy,
    config: &PackConfig,
) -> Result<Packing<'a>, PackError> {
    config.validate()?;

    let (fitting, oversized): (Vec<&ContentItem>, Vec<&ContentItem>) =
        items.iter().partition(|item| item.size <= config.capacity);

    if !oversized.is_empty() {
        match config.oversize {
            OversizePolicy::Reject => {
                return Err(PackError::OversizedItems {
                    capacity: config.capacity,
                    items: oversized
                        .iter()
                        .map(|item| OversizedItem {
                            identifier: item.identifier.clone(),
                            size: item.size,
                        })
                        .collect(),
                });
            }
            OversizePolicy::Skip => {
                for item in &oversized {
                    warn!(
                        item = %item.identifier,
                        size = item.size,
                        capacity = config.capacity,
                        "skipping oversized item"
                    );
                }
            }
        }
    }

    debug!(
        %strategy,
        items = fitting.len(),
        capacity = config.capacity,
        "packing"
    );

    let capacity = config.capacity;
    let step = config.step.unwrap_or_else(|| strategy.default_step());

    let (pass, attempts, used_capacity, converged) = match strategy {
        Strategy::Greedy => (greedy::pack_greedy(&fitting, capacity)?, 1, capacity, None),
        Strategy::Sequential => (
            greedy::pack_sequential(&fitting, capacity)?,
            1,
            capacity,
            None,
        ),
        Strategy::Exhaustive => (
            exhaustive::pack_exhaustive(&fitting, capacity, config.search_budget)?,
            1,
            capacity,
            None,
        ),
        Strategy::Balanced => {
            let balanced = balance::balance(&fitting, config, step, greedy::pack_sequential)?;
            (
                balanced.pass,
                balanced.attempts,
                balanced.capacity,
                Some(balanced.converged),
            )
        }
        Strategy::BalancedExhaustive => {
            let budget = config.search_budget;
            let balanced = balance::balance(&fitting, config, step, |items, cap| {
                exhaustive::pack_exhaustive(items, cap, budget)
            })?;
            (
                balanced.pass,
                balanced.attempts,
                balanced.capacity,
                Some(balanced.converged),
            )
        }
    };

    let mut unplaced: Vec<Unplaced<'a>> = oversized
        .into_iter()
        .map(|item| Unplaced {
            item,
            reason: UnplacedReason::Oversized,
        })
        .collect();
    unplaced.extend(pass.leftover.into_iter().map(|item| Unplaced {
        item,
        reason: UnplacedReason::Unplaceable,
    }));

    Ok(Packing {
        chunks: pass.chunks,
        unplaced,
        report: SearchReport {
            strategy,
            attempts,
            capacity: used_capacity,
            converged,
            exact: pass.exact,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const ALL: [Strategy; 5] = [
        Strategy::Greedy,
        Strategy::Sequential,
        Strategy::Balanced,
        Strategy::Exhaustive,
        Strategy::BalancedExhaustive,
    ];

    fn items_of(sizes: &[usize]) -> Vec<ContentItem> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| ContentItem::new(format!("item-{}", i), format!("<{}>", i), size))
            .collect()
    }

    fn placement_counts(packing: &Packing<'_>) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for chunk in &packing.chunks {
            for item in chunk.items() {
                *counts.entry(item.identifier.clone()).or_insert(0) += 1;
            }
        }
        for unplaced in &packing.unplaced {
            *counts.entry(unplaced.item.identifier.clone()).or_insert(0) += 1;
        }
        counts
    }

    fn size_sets() -> Vec<(Vec<usize>, usize)> {
        vec![
            (vec![50, 50, 50], 100),
            (vec![90, 10, 10], 100),
            (vec![30, 30, 30, 30], 60),
            (vec![40, 30, 20, 10], 60),
            (vec![7, 3, 9, 1, 4, 4, 8, 2, 6, 5], 12),
            (vec![100, 1, 1, 1, 99, 50, 50], 100),
            (vec![0, 5, 0, 5, 10], 10),
            (vec![33; 9], 100),
            (vec![1], 1),
        ]
    }

    #[test]
    fn test_partition_property_all_strategies() {
        for (sizes, capacity) in size_sets() {
            let items = items_of(&sizes);
            let config = PackConfig::new(capacity).with_target_spread(0);
            for strategy in ALL {
                let packing = pack(&items, strategy, &config).unwrap();
                assert!(packing.unplaced.is_empty(), "{} {:?}", strategy, sizes);

                let counts = placement_counts(&packing);
                assert_eq!(counts.len(), items.len(), "{} {:?}", strategy, sizes);
                assert!(
                    counts.values().all(|&n| n == 1),
                    "{} duplicated an item for {:?}",
                    strategy,
                    sizes
                );
            }
        }
    }

    #[test]
    fn test_capacity_property_all_strategies() {
        for (sizes, capacity) in size_sets() {
            let items = items_of(&sizes);
            let config = PackConfig::new(capacity).with_target_spread(0);
            for strategy in ALL {
                let packing = pack(&items, strategy, &config).unwrap();
                for chunk in &packing.chunks {
                    assert!(
                        chunk.total_size() <= capacity,
                        "{} overflowed {:?}",
                        strategy,
                        sizes
                    );
                    assert!(!chunk.is_empty());
                }
                if !strategy.is_balancing() {
                    assert_eq!(packing.report.capacity, capacity);
                }
            }
        }
    }

    #[test]
    fn test_determinism() {
        let items = items_of(&[7, 3, 9, 1, 4, 4, 8, 2, 6, 5]);
        let config = PackConfig::new(12);
        for strategy in ALL {
            let first = pack(&items, strategy, &config).unwrap();
            let second = pack(&items, strategy, &config).unwrap();
            assert_eq!(first.chunks, second.chunks, "{}", strategy);
            assert_eq!(first.report, second.report, "{}", strategy);
        }
    }

    #[test]
    fn test_empty_input_is_not_an_error() {
        let items: Vec<ContentItem> = Vec::new();
        for strategy in ALL {
            let packing = pack(&items, strategy, &PackConfig::new(100)).unwrap();
            assert!(packing.chunks.is_empty());
            assert!(packing.unplaced.is_empty());
            assert_eq!(packing.spread(), 0);
        }
    }

    #[test]
    fn test_oversized_item_rejected() {
        let items = items_of(&[150]);
        for strategy in ALL {
            let err = pack(&items, strategy, &PackConfig::new(100)).unwrap_err();
            assert_eq!(
                err,
                PackError::OversizedItems {
                    capacity: 100,
                    items: vec![OversizedItem {
                        identifier: "item-0".to_string(),
                        size: 150,
                    }],
                }
            );
        }
    }

    #[test]
    fn test_oversized_rejection_lists_every_item() {
        let items = items_of(&[150, 20, 101]);
        let err = pack(&items, Strategy::Greedy, &PackConfig::new(100)).unwrap_err();
        match err {
            PackError::OversizedItems { items, .. } => {
                let ids: Vec<&str> = items.iter().map(|i| i.identifier.as_str()).collect();
                assert_eq!(ids, vec!["item-0", "item-2"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_oversized_item_skipped_is_reported() {
        let items = items_of(&[150, 60, 40]);
        let config = PackConfig::new(100).with_oversize(OversizePolicy::Skip);
        for strategy in ALL {
            let packing = pack(&items, strategy, &config).unwrap();
            assert_eq!(packing.unplaced.len(), 1);
            assert_eq!(packing.unplaced[0].item.identifier, "item-0");
            assert_eq!(packing.unplaced[0].reason, UnplacedReason::Oversized);
            assert_eq!(packing.placed_count(), 2);
        }
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let items = items_of(&[1, 2, 3]);
        assert!(matches!(
            pack(&items, Strategy::Greedy, &PackConfig::new(0)),
            Err(PackError::InvalidConfig(_))
        ));
        assert!(matches!(
            pack(
                &items,
                Strategy::Balanced,
                &PackConfig::new(10).with_max_iterations(0)
            ),
            Err(PackError::InvalidConfig(_))
        ));
        assert!(matches!(
            pack(
                &items,
                Strategy::Exhaustive,
                &PackConfig::new(10).with_search_budget(0)
            ),
            Err(PackError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_exhaustive_never_uses_more_chunks_than_greedy() {
        for (sizes, capacity) in size_sets() {
            let items = items_of(&sizes);
            let config = PackConfig::new(capacity);
            let exhaustive = pack(&items, Strategy::Exhaustive, &config).unwrap();
            let greedy = pack(&items, Strategy::Greedy, &config).unwrap();
            let sequential = pack(&items, Strategy::Sequential, &config).unwrap();
            assert!(exhaustive.chunks.len() <= greedy.chunks.len(), "{:?}", sizes);
            assert!(
                exhaustive.chunks.len() <= sequential.chunks.len(),
                "{:?}",
                sizes
            );
        }
    }

    #[test]
    fn test_spread() {
        let items = items_of(&[10, 4, 7]);
        let a = Chunk::from_items(vec![&items[0]]);
        let b = Chunk::from_items(vec![&items[1]]);
        let c = Chunk::from_items(vec![&items[2]]);
        assert_eq!(spread(&[]), 0);
        assert_eq!(spread(&[a.clone()]), 0);
        assert_eq!(spread(&[a, b, c]), 6);
    }

    #[test]
    fn test_report_fields() {
        let items = items_of(&[50, 50, 50]);
        let packing = pack(&items, Strategy::Sequential, &PackConfig::new(100)).unwrap();
        assert_eq!(packing.report.strategy, Strategy::Sequential);
        assert_eq!(packing.report.attempts, 1);
        assert_eq!(packing.report.converged, None);
        assert!(packing.report.exact);
        assert_eq!(packing.chunk_sizes(), vec![100, 50]);
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("greedy".parse::<Strategy>().unwrap(), Strategy::Greedy);
        assert_eq!("FFD".parse::<Strategy>().unwrap(), Strategy::Sequential);
        assert_eq!("adaptive".parse::<Strategy>().unwrap(), Strategy::Balanced);
        assert_eq!(
            "best-fit".parse::<Strategy>().unwrap(),
            Strategy::Exhaustive
        );
        assert_eq!(
            "balanced-exhaustive".parse::<Strategy>().unwrap(),
            Strategy::BalancedExhaustive
        );
        assert!("knapsack".parse::<Strategy>().is_err());
    }

    #[test]
    fn test_strategy_display_round_trips() {
        for name in Strategy::available() {
            let strategy: Strategy = name.parse().unwrap();
            assert_eq!(&strategy.to_string(), name);
        }
    }

    #[test]
    fn test_default_steps() {
        assert_eq!(Strategy::Balanced.default_step(), CapacityStep::Unit);
        assert_eq!(
            Strategy::BalancedExhaustive.default_step(),
            CapacityStep::Proportional
        );
        assert_eq!(
            "size-aware".parse::<CapacityStep>().unwrap(),
            CapacityStep::Proportional
        );
        assert_eq!(
            "skip".parse::<OversizePolicy>().unwrap(),
            OversizePolicy::Skip
        );
        assert!("drop".parse::<OversizePolicy>().is_err());
    }

    #[test]
    fn test_pack_config_defaults() {
        let config = PackConfig::default();
        assert_eq!(config.capacity, DEFAULT_CAPACITY);
        assert_eq!(config.max_iterations, DEFAULT_MAX_ITERATIONS);
        assert_eq!(config.target_spread, DEFAULT_TARGET_SPREAD);
        assert_eq!(config.search_budget, DEFAULT_SEARCH_BUDGET);
        assert_eq!(config.oversize, OversizePolicy::Reject);
        assert!(config.step.is_none());
        assert!(config.validate().is_ok());
    }
}
