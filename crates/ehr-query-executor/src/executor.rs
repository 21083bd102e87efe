//! Filter and group-by execution over loaded records.
//!
//! A [`RecordFilter`] is an AND of criteria built either from a structured
//! [`FilterSpec`] or from a parsed [`QueryPlan`]. The [`QueryExecutor`]
//! applies it to a record slice and returns a bounded, order-preserving
//! slice or a grouped count table.

use std::time::Instant;

use ehr_query::QueryPlan;

use crate::config::EngineConfig;
use crate::dimension::{Dimension, Tally};
use crate::error::{ExecutorError, ExecutorResult};
use crate::record::Record;
use crate::result::{ExecutionStats, FilterOutcome, GroupCounts, PlanOutcome};

// =============================================================================
// Filter specification
// =============================================================================

/// Structured filter criteria, as sent by a filter request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    /// Inclusive lower age bound.
    pub age_min: Option<u32>,
    /// Inclusive upper age bound.
    pub age_max: Option<u32>,
    /// Substring matched against any chronic condition.
    pub condition: Option<String>,
    /// Substring matched against any medication.
    pub medication: Option<String>,
    /// Substring matched against the region.
    pub region: Option<String>,
    /// Exact (case-insensitive) gender.
    pub gender: Option<String>,
    /// Substring matched against any visit diagnosis.
    pub diagnosis: Option<String>,
    /// Maximum number of records to return.
    pub limit: Option<usize>,
}

impl FilterSpec {
    /// Checks the spec for contradictions.
    ///
    /// Returns [`ExecutorError::InvalidFilter`] when `age_min > age_max`.
    pub fn validate(&self) -> ExecutorResult<()> {
        if let (Some(min), Some(max)) = (self.age_min, self.age_max) {
            if min > max {
                return Err(ExecutorError::InvalidFilter(format!(
                    "ageMin {} exceeds ageMax {}",
                    min, max
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Record filter
// =============================================================================

/// Free-text record fields reachable from a textual query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextField {
    FullName,
    Address,
    PhoneNumber,
    InsuranceId,
}

impl TextField {
    fn value(self, record: &Record) -> &str {
        match self {
            TextField::FullName => &record.full_name,
            TextField::Address => &record.address,
            TextField::PhoneNumber => &record.phone_number,
            TextField::InsuranceId => &record.insurance_id,
        }
    }
}

/// A single predicate. String needles are stored lower-cased.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Criterion {
    AgeRange { min: Option<u32>, max: Option<u32> },
    /// `None` when the query value was not a number; matches nothing.
    AgeEquals(Option<u32>),
    Condition(String),
    Medication(String),
    Diagnosis(String),
    Region(String),
    Gender(String),
    Text(TextField, String),
}

impl Criterion {
    fn matches(&self, record: &Record) -> bool {
        match self {
            Criterion::AgeRange { min, max } => {
                min.map_or(true, |min| record.age >= min) && max.map_or(true, |max| record.age <= max)
            }
            Criterion::AgeEquals(age) => *age == Some(record.age),
            Criterion::Condition(needle) => record.has_symptom_like(needle),
            Criterion::Medication(needle) => record.has_medication_like(needle),
            Criterion::Diagnosis(needle) => record.has_diagnosis_like(needle),
            Criterion::Region(needle) => record.region.to_lowercase().contains(needle.as_str()),
            Criterion::Gender(expected) => record.gender.trim().to_lowercase() == *expected,
            Criterion::Text(field, needle) => {
                field.value(record).to_lowercase().contains(needle.as_str())
            }
        }
    }
}

/// An AND of predicates over records.
///
/// # Example
///
/// ```rust
/// use ehr_query_executor::{parse_query, Record, RecordFilter};
///
/// let filter = RecordFilter::from_plan(&parse_query("WHERE condition LIKE '%abet%'"));
/// let record = Record {
///     symptoms: vec!["Diabetes".to_string()],
///     ..Record::default()
/// };
/// assert!(filter.matches(&record));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    criteria: Vec<Criterion>,
}

impl RecordFilter {
    /// A filter that matches every record.
    pub fn all() -> Self {
        Self::default()
    }

    /// Builds a filter from a structured spec. Blank strings impose no
    /// predicate.
    pub fn from_spec(spec: &FilterSpec) -> Self {
        let mut filter = Self::default();

        if spec.age_min.is_some() || spec.age_max.is_some() {
            filter.criteria.push(Criterion::AgeRange {
                min: spec.age_min,
                max: spec.age_max,
            });
        }
        filter.push_text(&spec.condition, Criterion::Condition);
        filter.push_text(&spec.medication, Criterion::Medication);
        filter.push_text(&spec.diagnosis, Criterion::Diagnosis);
        filter.push_text(&spec.region, Criterion::Region);
        filter.push_text(&spec.gender, Criterion::Gender);

        filter
    }

    /// Builds a filter from a parsed query's `WHERE` predicates.
    ///
    /// Fields outside the supported set impose no predicate.
    pub fn from_plan(plan: &QueryPlan) -> Self {
        let mut filter = Self::default();

        for (field, predicate) in &plan.predicates {
            let value = predicate.value.trim();
            let needle = value.to_lowercase();
            let criterion = match field.as_str() {
                "condition" | "conditions" | "symptom" | "symptoms" => Criterion::Condition(needle),
                "medication" | "medications" | "medication_history" => {
                    Criterion::Medication(needle)
                }
                "diagnosis" => Criterion::Diagnosis(needle),
                "region" => Criterion::Region(needle),
                "gender" => Criterion::Gender(needle),
                "age" => Criterion::AgeEquals(value.parse().ok()),
                "name" | "full_name" => Criterion::Text(TextField::FullName, needle),
                "address" => Criterion::Text(TextField::Address, needle),
                "phone" | "phone_number" => Criterion::Text(TextField::PhoneNumber, needle),
                "insurance_id" => Criterion::Text(TextField::InsuranceId, needle),
                other => {
                    tracing::debug!(field = other, "ignoring predicate on unsupported field");
                    continue;
                }
            };
            filter.criteria.push(criterion);
        }

        filter
    }

    /// Returns true if `record` satisfies every predicate.
    pub fn matches(&self, record: &Record) -> bool {
        self.criteria.iter().all(|criterion| criterion.matches(record))
    }

    /// Number of predicates.
    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    /// Returns true if the filter matches everything.
    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    fn push_text(&mut self, value: &Option<String>, make: fn(String) -> Criterion) {
        if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            self.criteria.push(make(value.to_lowercase()));
        }
    }
}

// =============================================================================
// Executor
// =============================================================================

/// Applies filters and groupings to record slices.
///
/// The executor holds no data; callers pass the records from a cached
/// snapshot on each call.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    default_limit: usize,
    parallel: bool,
}

impl Default for QueryExecutor {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl QueryExecutor {
    /// Creates an executor from engine configuration.
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            default_limit: config.default_limit,
            parallel: config.parallel,
        }
    }

    /// Limit applied when neither query nor request sets one.
    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    /// Returns at most `limit` matching records in dataset order.
    pub fn filter(&self, records: &[Record], filter: &RecordFilter, limit: usize) -> FilterOutcome {
        let start = Instant::now();
        let matches = collect_matches(records, filter, self.parallel);
        let total_matched = matches.len();
        let selected: Vec<Record> = matches.into_iter().take(limit).cloned().collect();

        FilterOutcome {
            records: selected,
            stats: ExecutionStats::new(start.elapsed(), records.len(), total_matched),
        }
    }

    /// Validates `spec` and filters with it, using the spec's limit or the
    /// default limit.
    pub fn filter_spec(&self, records: &[Record], spec: &FilterSpec) -> ExecutorResult<FilterOutcome> {
        spec.validate()?;
        let limit = spec.limit.unwrap_or(self.default_limit);
        Ok(self.filter(records, &RecordFilter::from_spec(spec), limit))
    }

    /// Counts matching records by `dimension`.
    pub fn aggregate(
        &self,
        records: &[Record],
        dimension: Dimension,
        filter: &RecordFilter,
    ) -> GroupCounts {
        let start = Instant::now();
        let matches = collect_matches(records, filter, self.parallel);

        let mut tally = Tally::new();
        for record in &matches {
            tally.add_record(dimension, record);
        }

        GroupCounts {
            dimension,
            groups: tally.into_map(),
            stats: ExecutionStats::new(start.elapsed(), records.len(), matches.len()),
        }
    }

    /// Executes a parsed textual query.
    ///
    /// With `GROUP BY`, the `WHERE` predicates are applied first and matching
    /// records are counted per group. Otherwise the plan's limit (or
    /// `fallback_limit`, or the default) caps the returned slice.
    pub fn execute_plan(
        &self,
        records: &[Record],
        plan: &QueryPlan,
        fallback_limit: Option<usize>,
    ) -> PlanOutcome {
        let filter = RecordFilter::from_plan(plan);

        match plan.group_by {
            Some(group_by) => {
                PlanOutcome::Groups(self.aggregate(records, Dimension::from(group_by), &filter))
            }
            None => {
                let limit = plan.effective_limit(fallback_limit.unwrap_or(self.default_limit));
                PlanOutcome::Records(self.filter(records, &filter, limit))
            }
        }
    }
}

#[cfg(feature = "parallel")]
fn collect_matches<'r>(records: &'r [Record], filter: &RecordFilter, parallel: bool) -> Vec<&'r Record> {
    use rayon::prelude::*;

    if parallel {
        records.par_iter().filter(|record| filter.matches(record)).collect()
    } else {
        records.iter().filter(|record| filter.matches(record)).collect()
    }
}

#[cfg(not(feature = "parallel"))]
fn collect_matches<'r>(records: &'r [Record], filter: &RecordFilter, _parallel: bool) -> Vec<&'r Record> {
    records.iter().filter(|record| filter.matches(record)).collect()
}
