//! Grouping dimensions, age-bucket schemes and count tallies.
//!
//! A [`Dimension`] knows how to extract zero or more grouping keys from a
//! record. Single-valued dimensions yield exactly one key per record;
//! multi-valued dimensions yield one key per list item, so their counts can
//! sum to more than the number of records.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use ehr_query::GroupBy;
use serde::{Deserialize, Serialize};

use crate::record::Record;

/// Key used for single-valued fields that are empty in the dataset.
pub const UNKNOWN_KEY: &str = "Unknown";

// =============================================================================
// Age buckets
// =============================================================================

/// How ages are bucketed.
///
/// The dashboard statistics and the aggregate request use different
/// boundaries; callers always name the scheme they want.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AgeBucketScheme {
    /// `0-17`, `18-29`, `30-44`, `45-59`, `60-74`, `75+`.
    Statistics,
    /// `0-19`, `20-39`, `40-59`, `60-79`, `80+`.
    Decades,
}

impl AgeBucketScheme {
    /// Returns the bucket label for `age`.
    pub fn bucket(&self, age: u32) -> &'static str {
        match self {
            AgeBucketScheme::Statistics => match age {
                0..=17 => "0-17",
                18..=29 => "18-29",
                30..=44 => "30-44",
                45..=59 => "45-59",
                60..=74 => "60-74",
                _ => "75+",
            },
            AgeBucketScheme::Decades => match age {
                0..=19 => "0-19",
                20..=39 => "20-39",
                40..=59 => "40-59",
                60..=79 => "60-79",
                _ => "80+",
            },
        }
    }

    /// All bucket labels in ascending age order.
    pub fn labels(&self) -> &'static [&'static str] {
        match self {
            AgeBucketScheme::Statistics => &["0-17", "18-29", "30-44", "45-59", "60-74", "75+"],
            AgeBucketScheme::Decades => &["0-19", "20-39", "40-59", "60-79", "80+"],
        }
    }
}

// =============================================================================
// Dimensions
// =============================================================================

/// Whether a dimension yields one key per record or one per list item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AggregationKind {
    /// Exactly one key per record; group counts sum to the record count.
    SingleValued,
    /// Zero or more keys per record.
    MultiValued,
}

/// A record attribute that can be grouped and counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    /// Age bucketed with the given scheme.
    AgeGroup(AgeBucketScheme),
    /// Gender as written in the dataset.
    Gender,
    /// Region as written in the dataset.
    Region,
    /// Each chronic condition.
    Condition,
    /// Each medication.
    Medication,
    /// Each visit diagnosis.
    Diagnosis,
}

impl Dimension {
    /// Returns the aggregation kind of this dimension.
    pub fn kind(&self) -> AggregationKind {
        match self {
            Dimension::AgeGroup(_) | Dimension::Gender | Dimension::Region => {
                AggregationKind::SingleValued
            }
            Dimension::Condition | Dimension::Medication | Dimension::Diagnosis => {
                AggregationKind::MultiValued
            }
        }
    }

    /// Canonical lower-case name.
    pub fn name(&self) -> &'static str {
        match self {
            Dimension::AgeGroup(_) => "age_group",
            Dimension::Gender => "gender",
            Dimension::Region => "region",
            Dimension::Condition => "condition",
            Dimension::Medication => "medication",
            Dimension::Diagnosis => "diagnosis",
        }
    }

    /// Calls `f` once for each grouping key of `record`.
    ///
    /// Empty single-valued fields map to [`UNKNOWN_KEY`]; empty list items
    /// are skipped.
    pub fn for_each_key<'r, F>(&self, record: &'r Record, mut f: F)
    where
        F: FnMut(&'r str),
    {
        match self {
            Dimension::AgeGroup(scheme) => f(scheme.bucket(record.age)),
            Dimension::Gender => f(or_unknown(&record.gender)),
            Dimension::Region => f(or_unknown(&record.region)),
            Dimension::Condition => each_non_empty(&record.symptoms, f),
            Dimension::Medication => each_non_empty(&record.medication_history, f),
            Dimension::Diagnosis => record
                .past_visits
                .iter()
                .map(|visit| visit.diagnosis.trim())
                .filter(|diagnosis| !diagnosis.is_empty())
                .for_each(f),
        }
    }
}

impl From<GroupBy> for Dimension {
    /// Textual queries bucket ages with the statistics scheme.
    fn from(group_by: GroupBy) -> Self {
        match group_by {
            GroupBy::AgeGroup => Dimension::AgeGroup(AgeBucketScheme::Statistics),
            GroupBy::Gender => Dimension::Gender,
            GroupBy::Region => Dimension::Region,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn or_unknown(value: &str) -> &str {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        UNKNOWN_KEY
    } else {
        trimmed
    }
}

fn each_non_empty<'r, F>(items: &'r [String], f: F)
where
    F: FnMut(&'r str),
{
    items
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .for_each(f);
}

// =============================================================================
// Tally
// =============================================================================

/// One labelled count in a distribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionEntry {
    /// Group label.
    pub label: String,
    /// Number of occurrences.
    pub count: usize,
}

/// Counts keys while remembering the order each key was first seen.
#[derive(Debug, Clone, Default)]
pub struct Tally {
    entries: Vec<DistributionEntry>,
    index: HashMap<String, usize>,
}

impl Tally {
    /// Creates an empty tally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a tally pre-seeded with zero counts for `labels`, in order.
    pub fn with_labels(labels: &[&str]) -> Self {
        let mut tally = Self::new();
        for label in labels {
            tally.slot(label);
        }
        tally
    }

    /// Increments the count for `key`.
    pub fn add(&mut self, key: &str) {
        let slot = self.slot(key);
        self.entries[slot].count += 1;
    }

    /// Adds every key `dimension` yields for `record`.
    pub fn add_record(&mut self, dimension: Dimension, record: &Record) {
        dimension.for_each_key(record, |key| self.add(key));
    }

    /// Total of all counts.
    pub fn total(&self) -> usize {
        self.entries.iter().map(|entry| entry.count).sum()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no key has been seen.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in first-seen order.
    pub fn into_entries(self) -> Vec<DistributionEntry> {
        self.entries
    }

    /// Entries sorted by descending count and truncated to `cap`.
    /// Equal counts keep first-seen order.
    pub fn into_top(mut self, cap: usize) -> Vec<DistributionEntry> {
        self.entries.sort_by(|a, b| b.count.cmp(&a.count));
        self.entries.truncate(cap);
        self.entries
    }

    /// Counts keyed by label.
    pub fn into_map(self) -> BTreeMap<String, usize> {
        self.entries
            .into_iter()
            .map(|entry| (entry.label, entry.count))
            .collect()
    }

    fn slot(&mut self, key: &str) -> usize {
        if let Some(&slot) = self.index.get(key) {
            return slot;
        }
        let slot = self.entries.len();
        self.entries.push(DistributionEntry {
            label: key.to_string(),
            count: 0,
        });
        self.index.insert(key.to_string(), slot);
        slot
    }
}
