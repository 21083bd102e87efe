//! Query plan types produced by the parser.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::QueryError;

/// Row limit applied when neither the query nor the caller specifies one.
pub const DEFAULT_LIMIT: usize = 100;

// =============================================================================
// Column selection
// =============================================================================

/// Columns named in the `SELECT` clause.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Columns {
    /// `SELECT *` or no `SELECT` clause at all.
    #[default]
    All,
    /// An explicit, lower-cased column list in query order.
    Named(Vec<String>),
}

impl Columns {
    /// Returns true when every column is selected.
    pub fn is_all(&self) -> bool {
        matches!(self, Columns::All)
    }
}

impl fmt::Display for Columns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Columns::All => write!(f, "*"),
            Columns::Named(names) => write!(f, "{}", names.join(", ")),
        }
    }
}

// =============================================================================
// Predicates
// =============================================================================

/// The comparison form a `WHERE` condition was written in.
///
/// Both forms carry a single match string; how that string is compared
/// against a record is decided per field by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MatchKind {
    /// `field = 'value'`
    Equals,
    /// `field LIKE '%value%'`
    Like,
}

/// A single `WHERE` condition value.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Predicate {
    /// Match string with any `LIKE` wildcards already stripped.
    pub value: String,
    /// Comparison form used in the query text.
    pub kind: MatchKind,
}

impl Predicate {
    /// Creates an equality predicate.
    pub fn equals(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            kind: MatchKind::Equals,
        }
    }

    /// Creates a substring predicate.
    pub fn like(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            kind: MatchKind::Like,
        }
    }
}

// =============================================================================
// Grouping
// =============================================================================

/// Fields a textual query may group by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum GroupBy {
    /// `GROUP BY age_group` or `GROUP BY age`.
    AgeGroup,
    /// `GROUP BY gender`
    Gender,
    /// `GROUP BY region`
    Region,
}

impl GroupBy {
    /// Canonical lower-case field name.
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupBy::AgeGroup => "age_group",
            GroupBy::Gender => "gender",
            GroupBy::Region => "region",
        }
    }
}

impl FromStr for GroupBy {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "age_group" | "age" => Ok(GroupBy::AgeGroup),
            "gender" => Ok(GroupBy::Gender),
            "region" => Ok(GroupBy::Region),
            other => Err(QueryError::UnknownGroupBy(other.to_string())),
        }
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Query plan
// =============================================================================

/// Structured result of parsing a textual query.
///
/// Every part is optional; an empty query produces [`QueryPlan::default`],
/// which selects all columns, applies no predicates and does not group.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct QueryPlan {
    /// Selected columns.
    pub columns: Columns,
    /// Table named after `FROM`, if any. Informational only.
    pub table: Option<String>,
    /// Lower-cased field name to match value. A later condition on the same
    /// field replaces an earlier one.
    pub predicates: BTreeMap<String, Predicate>,
    /// Optional grouping field.
    pub group_by: Option<GroupBy>,
    /// Optional row limit.
    pub limit: Option<usize>,
}

impl QueryPlan {
    /// Returns true if the plan aggregates instead of returning rows.
    pub fn is_grouped(&self) -> bool {
        self.group_by.is_some()
    }

    /// Returns the plan's limit, or `fallback` when the query set none.
    pub fn effective_limit(&self, fallback: usize) -> usize {
        self.limit.unwrap_or(fallback)
    }

    /// Looks up the predicate for a field (case-insensitive).
    pub fn predicate(&self, field: &str) -> Option<&Predicate> {
        self.predicates.get(&field.to_ascii_lowercase())
    }
}

impl fmt::Display for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT {}", self.columns)?;
        if let Some(table) = &self.table {
            write!(f, " FROM {}", table)?;
        }
        if !self.predicates.is_empty() {
            let conditions: Vec<String> = self
                .predicates
                .iter()
                .map(|(field, predicate)| match predicate.kind {
                    MatchKind::Equals => format!("{} = '{}'", field, predicate.value),
                    MatchKind::Like => format!("{} LIKE '%{}%'", field, predicate.value),
                })
                .collect();
            write!(f, " WHERE {}", conditions.join(" AND "))?;
        }
        if let Some(group_by) = self.group_by {
            write!(f, " GROUP BY {}", group_by)?;
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {}", limit)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_plan() {
        let plan = QueryPlan::default();
        assert!(plan.columns.is_all());
        assert!(plan.predicates.is_empty());
        assert!(!plan.is_grouped());
        assert_eq!(plan.effective_limit(DEFAULT_LIMIT), 100);
    }

    #[test]
    fn test_group_by_from_str() {
        assert_eq!("age".parse::<GroupBy>().unwrap(), GroupBy::AgeGroup);
        assert_eq!("AGE_GROUP".parse::<GroupBy>().unwrap(), GroupBy::AgeGroup);
        assert_eq!(" Gender ".parse::<GroupBy>().unwrap(), GroupBy::Gender);
        assert_eq!("region".parse::<GroupBy>().unwrap(), GroupBy::Region);
        assert_eq!(
            "condition".parse::<GroupBy>(),
            Err(QueryError::UnknownGroupBy("condition".to_string()))
        );
    }

    #[test]
    fn test_predicate_lookup_case_insensitive() {
        let mut plan = QueryPlan::default();
        plan.predicates
            .insert("gender".to_string(), Predicate::equals("Female"));
        assert_eq!(plan.predicate("GENDER"), Some(&Predicate::equals("Female")));
        assert!(plan.predicate("region").is_none());
    }

    #[test]
    fn test_display_full_plan() {
        let mut plan = QueryPlan {
            columns: Columns::Named(vec!["name".to_string(), "age".to_string()]),
            table: Some("ehr_records".to_string()),
            group_by: Some(GroupBy::Region),
            limit: Some(5),
            ..QueryPlan::default()
        };
        plan.predicates
            .insert("condition".to_string(), Predicate::like("diab"));
        plan.predicates
            .insert("gender".to_string(), Predicate::equals("Male"));

        assert_eq!(
            plan.to_string(),
            "SELECT name, age FROM ehr_records WHERE condition LIKE '%diab%' AND gender = 'Male' GROUP BY region LIMIT 5"
        );
    }

    #[test]
    fn test_display_default_plan() {
        assert_eq!(QueryPlan::default().to_string(), "SELECT *");
    }
}
