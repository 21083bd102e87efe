//! Response shapes produced by the service.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ehr_query_executor::{ExecutionStats, Record, StatisticsSnapshot};
use serde::Serialize;

use crate::error::{ErrorKind, ServiceError};
use crate::request::AggregateDimension;

/// A response to a single request. Success and error shapes never mix.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Response {
    /// `{ records, stats }`
    Records {
        /// Matching records, at most the effective limit.
        records: Vec<Record>,
        /// Result metadata.
        stats: ResponseStats,
    },
    /// `{ aggregations, stats }`
    Aggregations {
        /// Group label to count.
        aggregations: BTreeMap<String, usize>,
        /// Result metadata.
        stats: ResponseStats,
    },
    /// Dataset statistics plus capabilities.
    Status(Box<StatusReport>),
    /// `{ error: { kind, message } }`
    Error {
        /// Error details.
        error: ErrorBody,
    },
}

impl Response {
    /// Builds an error response.
    pub fn error(err: &ServiceError) -> Self {
        Response::Error {
            error: ErrorBody {
                kind: err.kind(),
                message: err.to_string(),
            },
        }
    }

    /// Returns true for error responses.
    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error { .. })
    }

    /// Result metadata, if this is a records or aggregations response.
    pub fn stats(&self) -> Option<&ResponseStats> {
        match self {
            Response::Records { stats, .. } | Response::Aggregations { stats, .. } => Some(stats),
            Response::Status(_) | Response::Error { .. } => None,
        }
    }
}

/// Metadata attached to records and aggregations responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseStats {
    /// Records that matched every predicate, before the limit.
    pub total_matched: usize,
    /// Execution time in milliseconds.
    pub query_time: f64,
    /// Records (or groups) in the response.
    pub returned: usize,
    /// True if this request reloaded the dataset.
    pub cache_refreshed: bool,
}

impl ResponseStats {
    /// Builds response metadata from executor statistics.
    pub fn from_execution(stats: &ExecutionStats, returned: usize, cache_refreshed: bool) -> Self {
        Self {
            total_matched: stats.total_matched,
            query_time: stats.duration_ms(),
            returned,
            cache_refreshed,
        }
    }
}

/// Body of an error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Error category.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
}

/// Response to a `status` request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    /// Dataset statistics, flattened into the report.
    #[serde(flatten)]
    pub statistics: StatisticsSnapshot,
    /// What the service can do.
    pub capabilities: Capabilities,
    /// Records in the live snapshot.
    pub records_loaded: usize,
    /// Rows dropped as malformed during the last load.
    pub skipped_rows: usize,
    /// When the live snapshot was loaded.
    pub last_loaded: DateTime<Utc>,
    /// True if this request reloaded the dataset.
    pub cache_refreshed: bool,
}

/// Supported request types and query features.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    /// Accepted values of the `type` field.
    pub request_types: Vec<&'static str>,
    /// Clauses understood by `sql` requests.
    pub query_clauses: Vec<&'static str>,
    /// Fields accepted by `GROUP BY`.
    pub group_by_fields: Vec<&'static str>,
    /// Accepted values of `groupBy` in `aggregate` requests.
    pub aggregate_dimensions: Vec<&'static str>,
    /// Row limit used when none is given.
    pub default_limit: usize,
}

impl Capabilities {
    /// Capabilities of this service build.
    pub fn current(default_limit: usize) -> Self {
        Self {
            request_types: vec!["filter", "sql", "aggregate", "status"],
            query_clauses: vec!["SELECT", "FROM", "WHERE", "AND", "LIKE", "GROUP BY", "LIMIT"],
            group_by_fields: vec!["age_group", "age", "gender", "region"],
            aggregate_dimensions: AggregateDimension::ALL
                .iter()
                .map(AggregateDimension::as_str)
                .collect(),
            default_limit,
        }
    }
}
