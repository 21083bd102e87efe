//! Typed patient record model.

use serde::{Deserialize, Serialize};

/// A single past visit parsed from the visit-history column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
    /// Visit date as written in the dataset (usually `YYYY-MM-DD`).
    pub date: String,
    /// Diagnosis recorded for the visit.
    pub diagnosis: String,
}

impl Visit {
    /// Creates a new visit.
    pub fn new(date: impl Into<String>, diagnosis: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            diagnosis: diagnosis.into(),
        }
    }

    /// Returns the year prefix of the visit date, if it is a non-empty run
    /// of digits before the first `-`.
    pub fn year(&self) -> Option<&str> {
        let prefix = self.date.split('-').next().unwrap_or_default().trim();
        if !prefix.is_empty() && prefix.chars().all(|c| c.is_ascii_digit()) {
            Some(prefix)
        } else {
            None
        }
    }
}

/// One parsed dataset row.
///
/// Records are immutable once loaded; a reload replaces the whole set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Patient's full name.
    pub full_name: String,
    /// Age in years; 0 when the dataset value was unparsable.
    pub age: u32,
    /// Free-form gender, conventionally "Male" or "Female".
    pub gender: String,
    /// Region of residence.
    pub region: String,
    /// Postal address.
    pub address: String,
    /// Chronic conditions, in dataset order.
    pub symptoms: Vec<String>,
    /// Medications, in dataset order.
    pub medication_history: Vec<String>,
    /// Past visits, in dataset order.
    pub past_visits: Vec<Visit>,
    /// Contact phone number.
    pub phone_number: String,
    /// Display/keying only; not guaranteed unique.
    pub insurance_id: String,
}

impl Record {
    /// Returns true if any symptom contains `needle_lower` (already lower-cased).
    pub(crate) fn has_symptom_like(&self, needle_lower: &str) -> bool {
        contains_any(&self.symptoms, needle_lower)
    }

    /// Returns true if any medication contains `needle_lower`.
    pub(crate) fn has_medication_like(&self, needle_lower: &str) -> bool {
        contains_any(&self.medication_history, needle_lower)
    }

    /// Returns true if any visit diagnosis contains `needle_lower`.
    pub(crate) fn has_diagnosis_like(&self, needle_lower: &str) -> bool {
        self.past_visits
            .iter()
            .any(|visit| visit.diagnosis.to_lowercase().contains(needle_lower))
    }

    /// True when the record has at least one medication.
    pub fn is_on_medication(&self) -> bool {
        !self.medication_history.is_empty()
    }
}

fn contains_any(items: &[String], needle_lower: &str) -> bool {
    items
        .iter()
        .any(|item| item.to_lowercase().contains(needle_lower))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visit_year() {
        assert_eq!(Visit::new("2024-10-06", "Fever").year(), Some("2024"));
        assert_eq!(Visit::new("2019", "Flu").year(), Some("2019"));
        assert_eq!(Visit::new("unknown-01", "Flu").year(), None);
        assert_eq!(Visit::new("-05-01", "Flu").year(), None);
        assert_eq!(Visit::new("", "Flu").year(), None);
    }

    #[test]
    fn test_record_serializes_camel_case() {
        let record = Record {
            full_name: "Ada Lovelace".to_string(),
            age: 36,
            medication_history: vec!["Metformin".to_string()],
            past_visits: vec![Visit::new("2024-01-02", "Checkup")],
            ..Record::default()
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["fullName"], "Ada Lovelace");
        assert_eq!(json["medicationHistory"][0], "Metformin");
        assert_eq!(json["pastVisits"][0]["diagnosis"], "Checkup");
        assert!(json.get("insuranceId").is_some());
        assert!(json.get("phoneNumber").is_some());
    }

    #[test]
    fn test_substring_helpers_are_case_insensitive() {
        let record = Record {
            symptoms: vec!["Type 2 Diabetes".to_string()],
            medication_history: vec!["Lisinopril".to_string()],
            past_visits: vec![Visit::new("2023-03-03", "Acute Bronchitis")],
            ..Record::default()
        };
        assert!(record.has_symptom_like("diabetes"));
        assert!(record.has_medication_like("lisin"));
        assert!(record.has_diagnosis_like("bronch"));
        assert!(!record.has_symptom_like("asthma"));
        assert!(record.is_on_medication());
    }
}
