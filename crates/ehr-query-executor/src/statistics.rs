//! Dataset-wide statistics.
//!
//! Computes demographic, condition, medication and visit-history
//! distributions over every loaded record in a single pass.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::StatisticsLimits;
use crate::dimension::{AgeBucketScheme, Dimension, DistributionEntry, Tally};
use crate::record::Record;

/// Scheme used for the age-group distribution.
pub const STATISTICS_AGE_SCHEME: AgeBucketScheme = AgeBucketScheme::Statistics;

/// Records with and without any medication.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicationCoverage {
    /// Records with at least one medication.
    pub on_medication: usize,
    /// Records with no medication.
    pub no_medication: usize,
}

/// Derived statistics over one record snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsSnapshot {
    /// Generation of the record snapshot these statistics describe.
    pub generation: u64,
    /// When the statistics were computed.
    pub computed_at: DateTime<Utc>,
    /// Number of records.
    pub total_patients: usize,
    /// Every age bucket in ascending order, including empty ones.
    pub age_groups: Vec<DistributionEntry>,
    /// Gender counts in first-seen order.
    pub genders: Vec<DistributionEntry>,
    /// Most common regions.
    pub regions: Vec<DistributionEntry>,
    /// Most common chronic conditions.
    pub conditions: Vec<DistributionEntry>,
    /// Most common visit diagnoses.
    pub diagnoses: Vec<DistributionEntry>,
    /// Most common medications.
    pub medications: Vec<DistributionEntry>,
    /// Records on and off medication.
    pub medication_coverage: MedicationCoverage,
    /// Visits across all records.
    pub total_visits: usize,
    /// `total_visits / total_patients`, rounded to two decimals.
    pub average_visits_per_record: f64,
    /// Visit counts keyed by year.
    pub visits_by_year: BTreeMap<String, usize>,
}

/// Computes [`StatisticsSnapshot`]s.
#[derive(Debug, Clone, Default)]
pub struct StatisticsAggregator {
    limits: StatisticsLimits,
}

impl StatisticsAggregator {
    /// Creates an aggregator with the given distribution caps.
    pub fn new(limits: StatisticsLimits) -> Self {
        Self { limits }
    }

    /// Returns the configured caps.
    pub fn limits(&self) -> StatisticsLimits {
        self.limits
    }

    /// Computes statistics over `records`.
    pub fn compute(&self, records: &[Record], generation: u64) -> StatisticsSnapshot {
        let mut age_groups = Tally::with_labels(STATISTICS_AGE_SCHEME.labels());
        let mut genders = Tally::new();
        let mut regions = Tally::new();
        let mut conditions = Tally::new();
        let mut diagnoses = Tally::new();
        let mut medications = Tally::new();
        let mut coverage = MedicationCoverage::default();
        let mut total_visits = 0usize;
        let mut visits_by_year: BTreeMap<String, usize> = BTreeMap::new();

        for record in records {
            age_groups.add_record(Dimension::AgeGroup(STATISTICS_AGE_SCHEME), record);
            genders.add_record(Dimension::Gender, record);
            regions.add_record(Dimension::Region, record);
            conditions.add_record(Dimension::Condition, record);
            diagnoses.add_record(Dimension::Diagnosis, record);
            medications.add_record(Dimension::Medication, record);

            if record.is_on_medication() {
                coverage.on_medication += 1;
            } else {
                coverage.no_medication += 1;
            }

            total_visits += record.past_visits.len();
            for visit in &record.past_visits {
                if let Some(year) = visit.year() {
                    *visits_by_year.entry(year.to_string()).or_insert(0) += 1;
                }
            }
        }

        let snapshot = StatisticsSnapshot {
            generation,
            computed_at: Utc::now(),
            total_patients: records.len(),
            age_groups: age_groups.into_entries(),
            genders: genders.into_entries(),
            regions: regions.into_top(self.limits.region_cap),
            conditions: conditions.into_top(self.limits.distribution_cap),
            diagnoses: diagnoses.into_top(self.limits.distribution_cap),
            medications: medications.into_top(self.limits.distribution_cap),
            medication_coverage: coverage,
            total_visits,
            average_visits_per_record: average(total_visits, records.len()),
            visits_by_year,
        };

        tracing::debug!(
            generation,
            records = snapshot.total_patients,
            visits = snapshot.total_visits,
            "computed dataset statistics"
        );

        snapshot
    }
}

fn average(total: usize, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    let raw = total as f64 / count as f64;
    (raw * 100.0).round() / 100.0
}
