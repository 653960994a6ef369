//! Adaptive-capacity balancing
//!
//! Repacks at a shrinking capacity to minimize spread (largest chunk size
//! minus smallest). The search is not convex: a lower capacity can raise the
//! chunk count and the spread, so the lowest-spread attempt seen is kept.

use tracing::{debug, warn};

use super::store::ContentItem;
use super::{spread, CapacityStep, PackConfig, PackError, Pass};

/// Outcome of the balancing loop
#[derive(Debug, Clone)]
pub(crate) struct Balanced<'a> {
    pub pass: Pass<'a>,
    pub attempts: usize,
    /// Capacity the returned pass was packed at
    pub capacity: usize,
    pub converged: bool,
}

/// Capacity decrement after an attempt that missed the target
pub(crate) fn next_step(
    step: CapacityStep,
    spread: usize,
    target_spread: usize,
    chunk_count: usize,
) -> usize {
    match step {
        CapacityStep::Unit => 1,
        CapacityStep::Proportional => {
            let excess = spread.saturating_sub(target_spread);
            (excess / chunk_count.max(1)).max(1)
        }
    }
}

/// Run `base` at decreasing capacities until the spread target is met
///
/// Capacity never drops below the largest item, so every attempt places
/// every item.
pub(crate) fn balance<'a, F>(
    items: &[&'a ContentItem],
    config: &PackConfig,
    step: CapacityStep,
    mut base: F,
) -> Result<Balanced<'a>, PackError>
where
    F: FnMut(&[&'a ContentItem], usize) -> Result<Pass<'a>, PackError>,
{
    let floor = items.iter().map(|item| item.size).max().unwrap_or(0).max(1);
    let mut capacity = config.capacity;
    let mut best: Option<(Balanced<'a>, usize)> = None;
    let mut attempts = 0;

    while attempts < config.max_iterations {
        attempts += 1;
        let pass = base(items, capacity)?;
        let achieved = spread(&pass.chunks);
        let chunk_count = pass.chunks.len();

        debug!(
            attempt = attempts,
            capacity,
            chunks = chunk_count,
            spread = achieved,
            "balancing attempt"
        );

        if achieved <= config.target_spread {
            return Ok(Balanced {
                pass,
                attempts,
                capacity,
                converged: true,
            });
        }

        if best.as_ref().map_or(true, |(_, s)| achieved < *s) {
            best = Some((
                Balanced {
                    pass,
                    attempts,
                    capacity,
                    converged: false,
                },
                achieved,
            ));
        }

        let lowered = capacity
            .saturating_sub(next_step(step, achieved, config.target_spread, chunk_count))
            .max(floor);
        if lowered == capacity {
            debug!(capacity, "capacity floor reached");
            break;
        }
        capacity = lowered;
    }

    match best {
        Some((mut result, achieved)) => {
            warn!(
                attempts,
                spread = achieved,
                target = config.target_spread,
                capacity = result.capacity,
                "spread target not reached; returning best attempt"
            );
            result.attempts = attempts;
            Ok(result)
        }
        // max_iterations >= 1 always runs one attempt, which either
        // converges or becomes the best
        None => Err(PackError::InvalidConfig(
            "max_iterations must be at least 1".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packing::exhaustive::pack_exhaustive;
    use crate::packing::greedy::pack_sequential;
    use crate::packing::{pack, Strategy};

    fn items_of(sizes: &[usize]) -> Vec<ContentItem> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| ContentItem::new(format!("f{}", i), "", size))
            .collect()
    }

    #[test]
    fn test_next_step_unit() {
        assert_eq!(next_step(CapacityStep::Unit, 500, 100, 3), 1);
    }

    #[test]
    fn test_next_step_proportional() {
        assert_eq!(next_step(CapacityStep::Proportional, 500, 100, 4), 100);
        assert_eq!(next_step(CapacityStep::Proportional, 107, 100, 3), 2);
    }

    #[test]
    fn test_next_step_proportional_never_stalls() {
        // (spread - target) / chunks truncates to zero here
        assert_eq!(next_step(CapacityStep::Proportional, 102, 100, 5), 1);
        assert_eq!(next_step(CapacityStep::Proportional, 102, 100, 0), 2);
    }

    #[test]
    fn test_converges_on_first_attempt() {
        let items = items_of(&[50, 50, 50, 50]);
        let refs: Vec<&ContentItem> = items.iter().collect();
        let config = PackConfig::new(100).with_target_spread(0);
        let result = balance(&refs, &config, CapacityStep::Unit, pack_sequential).unwrap();
        assert!(result.converged);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.capacity, 100);
        assert_eq!(spread(&result.pass.chunks), 0);
    }

    #[test]
    fn test_lowering_capacity_reduces_spread() {
        // 100..=90 pack [60,30] [20] (spread 70); 89 packs [60] [30,20] (spread 10)
        let items = items_of(&[60, 30, 20]);
        let refs: Vec<&ContentItem> = items.iter().collect();
        let config = PackConfig::new(100)
            .with_target_spread(10)
            .with_max_iterations(50);
        let result = balance(&refs, &config, CapacityStep::Unit, pack_sequential).unwrap();
        assert!(result.converged);
        assert_eq!(result.capacity, 89);
        assert_eq!(result.attempts, 12);
        assert_eq!(spread(&result.pass.chunks), 10);
    }

    #[test]
    fn test_proportional_step_with_exhaustive_base() {
        // 100 gives [60,30] [20]; step (70 - 10) / 2 = 30 lands on 70: [60] [30,20]
        let items = items_of(&[60, 30, 20]);
        let refs: Vec<&ContentItem> = items.iter().collect();
        let config = PackConfig::new(100).with_target_spread(10);
        let result = balance(&refs, &config, CapacityStep::Proportional, |items, cap| {
            pack_exhaustive(items, cap, 10_000)
        })
        .unwrap();
        assert!(result.converged);
        assert_eq!(result.attempts, 2);
        assert_eq!(result.capacity, 70);
        assert_eq!(spread(&result.pass.chunks), 10);
    }

    #[test]
    fn test_returns_best_when_target_missed() {
        let items = items_of(&[60, 30, 20]);
        let refs: Vec<&ContentItem> = items.iter().collect();
        let config = PackConfig::new(100)
            .with_target_spread(0)
            .with_max_iterations(3);
        let result = balance(&refs, &config, CapacityStep::Unit, pack_sequential).unwrap();
        assert!(!result.converged);
        assert_eq!(result.attempts, 3);
        // 100, 99 and 98 all give spread 70; the first one is kept
        assert_eq!(result.capacity, 100);
        assert_eq!(result.pass.chunks.len(), 2);
        assert_eq!(spread(&result.pass.chunks), 70);
    }

    #[test]
    fn test_best_so_far_never_worse_than_first_attempt() {
        let size_sets: [&[usize]; 4] = [
            &[60, 30, 10],
            &[7, 3, 9, 1, 4, 4, 8, 2, 6, 5],
            &[45, 44, 12, 11, 10, 9, 3],
            &[90, 80, 70, 5, 5],
        ];
        for sizes in size_sets {
            let items = items_of(sizes);
            let refs: Vec<&ContentItem> = items.iter().collect();
            let capacity = 100;
            let first = spread(&pack_sequential(&refs, capacity).unwrap().chunks);

            for step in [CapacityStep::Unit, CapacityStep::Proportional] {
                let config = PackConfig::new(capacity)
                    .with_target_spread(0)
                    .with_max_iterations(25);
                let result = balance(&refs, &config, step, pack_sequential).unwrap();
                assert!(spread(&result.pass.chunks) <= first, "{:?}", sizes);
                assert!(result.capacity <= capacity);
            }
        }
    }

    #[test]
    fn test_capacity_never_drops_below_largest_item() {
        // 100..=95 give [80,15] [10]; 94..=80 give [80] [15,10]; then the floor stops it
        let items = items_of(&[80, 15, 10]);
        let refs: Vec<&ContentItem> = items.iter().collect();
        let config = PackConfig::new(100)
            .with_target_spread(0)
            .with_max_iterations(1_000);
        let result = balance(&refs, &config, CapacityStep::Unit, pack_sequential).unwrap();
        assert!(!result.converged);
        assert_eq!(result.attempts, 21);
        assert_eq!(result.capacity, 94);
        assert_eq!(spread(&result.pass.chunks), 55);
        assert!(result.pass.leftover.is_empty());
    }

    #[test]
    fn test_empty_items_converge_immediately() {
        let refs: Vec<&ContentItem> = Vec::new();
        let config = PackConfig::new(10);
        let result = balance(&refs, &config, CapacityStep::Unit, pack_sequential).unwrap();
        assert!(result.converged);
        assert!(result.pass.chunks.is_empty());
    }

    #[test]
    fn test_balanced_exhaustive_through_dispatcher() {
        let items = items_of(&[45, 44, 12, 11, 10, 9, 3]);
        let config = PackConfig::new(100)
            .with_target_spread(5)
            .with_max_iterations(20);
        let packing = pack(&items, Strategy::BalancedExhaustive, &config).unwrap();
        let first = pack(&items, Strategy::Exhaustive, &config).unwrap();
        assert!(packing.spread() <= first.spread());
        assert!(packing.report.converged.is_some());
        for chunk in &packing.chunks {
            assert!(chunk.total_size() <= 100);
        }
        assert_eq!(packing.placed_count(), items.len());
    }
}
