//! Error types for query-language name conversions.

use thiserror::Error;

/// Errors from strict conversions of query-language names.
///
/// The query parser itself never fails; these errors only surface through
/// `FromStr` implementations used by callers that need strict validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// The field cannot be used with `GROUP BY`.
    #[error("unsupported group-by field: {0}")]
    UnknownGroupBy(String),
}

/// Result type for query-language operations.
pub type QueryResult<T> = std::result::Result<T, QueryError>;
