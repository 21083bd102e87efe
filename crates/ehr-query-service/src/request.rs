//! Request shapes accepted by the service.
//!
//! Requests are JSON objects discriminated by a `type` field:
//!
//! ```json
//! { "type": "filter", "filters": { "ageMin": 40, "condition": "diabetes" }, "limit": 20 }
//! { "type": "sql", "query": "SELECT * FROM ehr_records WHERE gender = 'Female' LIMIT 10" }
//! { "type": "aggregate", "groupBy": "region", "filter": { "condition": "asthma" } }
//! { "type": "status" }
//! ```
//!
//! Any filter string that is empty or equal to `"all"` (any case) is
//! treated as absent.

use std::fmt;
use std::str::FromStr;

use ehr_query_executor::{AgeBucketScheme, Dimension, FilterSpec};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ServiceError;

/// A request to the query service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Request {
    /// Structured attribute filter.
    Filter {
        /// Filter criteria.
        filters: FilterCriteria,
        /// Maximum number of records to return.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<usize>,
    },
    /// Constrained SQL-like textual query.
    Sql {
        /// Query text.
        query: String,
    },
    /// Group-by count.
    Aggregate {
        /// Dimension to group by.
        #[serde(rename = "groupBy")]
        group_by: AggregateDimension,
        /// Optional pre-filter.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filter: Option<AggregateFilter>,
    },
    /// Dataset statistics and service capabilities.
    Status,
}

impl Request {
    /// Lower-case request type name, as used in the `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Filter { .. } => "filter",
            Request::Sql { .. } => "sql",
            Request::Aggregate { .. } => "aggregate",
            Request::Status => "status",
        }
    }
}

/// Criteria of a `filter` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCriteria {
    /// Inclusive lower age bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_min: Option<u32>,
    /// Inclusive upper age bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_max: Option<u32>,
    /// Condition substring.
    #[serde(default, deserialize_with = "optional_text", skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Medication substring.
    #[serde(default, deserialize_with = "optional_text", skip_serializing_if = "Option::is_none")]
    pub medication: Option<String>,
    /// Region substring.
    #[serde(default, deserialize_with = "optional_text", skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Exact gender.
    #[serde(default, deserialize_with = "optional_text", skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    /// Visit diagnosis substring.
    #[serde(default, deserialize_with = "optional_text", skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<String>,
}

impl FilterCriteria {
    /// Converts the criteria into an executor filter spec.
    pub fn to_spec(&self, limit: Option<usize>) -> FilterSpec {
        FilterSpec {
            age_min: self.age_min,
            age_max: self.age_max,
            condition: self.condition.clone(),
            medication: self.medication.clone(),
            region: self.region.clone(),
            gender: self.gender.clone(),
            diagnosis: self.diagnosis.clone(),
            limit,
        }
    }
}

/// Optional pre-filter of an `aggregate` request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateFilter {
    /// Condition substring.
    #[serde(default, deserialize_with = "optional_text", skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Region substring.
    #[serde(default, deserialize_with = "optional_text", skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Exact gender.
    #[serde(default, deserialize_with = "optional_text", skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
}

impl AggregateFilter {
    /// Converts the filter into an executor filter spec.
    pub fn to_spec(&self) -> FilterSpec {
        FilterSpec {
            condition: self.condition.clone(),
            region: self.region.clone(),
            gender: self.gender.clone(),
            ..FilterSpec::default()
        }
    }
}

/// Dimensions accepted by `aggregate` requests.
///
/// Names are matched case-insensitively, both in JSON and on the command
/// line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateDimension {
    /// Age in 20-year buckets.
    Age,
    /// Gender.
    Gender,
    /// Region.
    Region,
    /// Each chronic condition.
    Condition,
    /// Each medication.
    Medication,
}

impl AggregateDimension {
    /// All accepted dimensions.
    pub const ALL: [AggregateDimension; 5] = [
        AggregateDimension::Age,
        AggregateDimension::Gender,
        AggregateDimension::Region,
        AggregateDimension::Condition,
        AggregateDimension::Medication,
    ];

    /// Request-level name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateDimension::Age => "age",
            AggregateDimension::Gender => "gender",
            AggregateDimension::Region => "region",
            AggregateDimension::Condition => "condition",
            AggregateDimension::Medication => "medication",
        }
    }

    /// Engine dimension. Ages use the 20-year scheme.
    pub fn dimension(&self) -> Dimension {
        match self {
            AggregateDimension::Age => Dimension::AgeGroup(AgeBucketScheme::Decades),
            AggregateDimension::Gender => Dimension::Gender,
            AggregateDimension::Region => Dimension::Region,
            AggregateDimension::Condition => Dimension::Condition,
            AggregateDimension::Medication => Dimension::Medication,
        }
    }
}

impl FromStr for AggregateDimension {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|dimension| dimension.as_str() == wanted)
            .ok_or_else(|| {
                ServiceError::InvalidRequest(format!(
                    "unsupported groupBy '{}', expected one of age, gender, region, condition, medication",
                    s
                ))
            })
    }
}

impl<'de> Deserialize<'de> for AggregateDimension {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for AggregateDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Treats missing, empty and `"all"` strings as absent.
fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.and_then(|text| {
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("all") {
            None
        } else {
            Some(trimmed.to_string())
        }
    }))
}
