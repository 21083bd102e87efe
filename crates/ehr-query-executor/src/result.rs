//! Result types for filter and aggregate execution.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::dimension::{AggregationKind, Dimension};
use crate::record::Record;

/// A bounded slice of matching records.
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    /// Matching records in dataset order, at most `limit` of them.
    pub records: Vec<Record>,
    /// Execution statistics.
    pub stats: ExecutionStats,
}

impl FilterOutcome {
    /// Number of records returned.
    pub fn returned(&self) -> usize {
        self.records.len()
    }

    /// Number of records that matched before the limit was applied.
    pub fn total_matched(&self) -> usize {
        self.stats.total_matched
    }
}

/// Group counts for one dimension.
#[derive(Debug, Clone)]
pub struct GroupCounts {
    /// Dimension that was grouped.
    pub dimension: Dimension,
    /// Counts keyed by group label.
    pub groups: BTreeMap<String, usize>,
    /// Execution statistics. `total_matched` counts records, not keys.
    pub stats: ExecutionStats,
}

impl GroupCounts {
    /// Aggregation kind of the grouped dimension.
    pub fn kind(&self) -> AggregationKind {
        self.dimension.kind()
    }

    /// Count for `label`, or 0.
    pub fn count(&self, label: &str) -> usize {
        self.groups.get(label).copied().unwrap_or(0)
    }

    /// Sum of all group counts.
    ///
    /// Equals `total_matched` for single-valued dimensions; may be larger or
    /// smaller for multi-valued ones.
    pub fn total(&self) -> usize {
        self.groups.values().sum()
    }
}

/// Outcome of executing a parsed textual query.
#[derive(Debug, Clone)]
pub enum PlanOutcome {
    /// The query had no `GROUP BY`.
    Records(FilterOutcome),
    /// The query had a `GROUP BY`.
    Groups(GroupCounts),
}

impl PlanOutcome {
    /// Execution statistics of either variant.
    pub fn stats(&self) -> &ExecutionStats {
        match self {
            PlanOutcome::Records(outcome) => &outcome.stats,
            PlanOutcome::Groups(counts) => &counts.stats,
        }
    }
}

/// Statistics from query execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    /// Time spent filtering and grouping.
    pub duration: Duration,
    /// Records examined.
    pub records_scanned: usize,
    /// Records that satisfied every predicate.
    pub total_matched: usize,
}

impl ExecutionStats {
    /// Creates new execution stats.
    pub fn new(duration: Duration, records_scanned: usize, total_matched: usize) -> Self {
        Self {
            duration,
            records_scanned,
            total_matched,
        }
    }

    /// Duration in fractional milliseconds.
    pub fn duration_ms(&self) -> f64 {
        self.duration.as_secs_f64() * 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_stats() {
        let stats = ExecutionStats::new(Duration::from_micros(1500), 10, 4);
        assert_eq!(stats.records_scanned, 10);
        assert_eq!(stats.total_matched, 4);
        assert!((stats.duration_ms() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_group_counts_helpers() {
        let groups: BTreeMap<String, usize> =
            [("Male".to_string(), 2), ("Female".to_string(), 1)].into_iter().collect();
        let counts = GroupCounts {
            dimension: Dimension::Gender,
            groups,
            stats: ExecutionStats::new(Duration::ZERO, 3, 3),
        };
        assert_eq!(counts.kind(), AggregationKind::SingleValued);
        assert_eq!(counts.count("Male"), 2);
        assert_eq!(counts.count("Other"), 0);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_plan_outcome_stats() {
        let outcome = PlanOutcome::Records(FilterOutcome {
            records: vec![Record::default()],
            stats: ExecutionStats::new(Duration::ZERO, 5, 1),
        });
        assert_eq!(outcome.stats().total_matched, 1);
        if let PlanOutcome::Records(records) = outcome {
            assert_eq!(records.returned(), 1);
            assert_eq!(records.total_matched(), 1);
        }
    }
}
