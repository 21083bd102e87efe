//! # ehr-query
//!
//! Parser for the constrained, SQL-like query language used to explore
//! tabular patient records.
//!
//! The language is intentionally small. It is a "best effort" query box for
//! researchers, not a SQL engine: parsing never fails, and anything the
//! parser does not recognise is dropped from the resulting [`QueryPlan`].
//!
//! ## Usage
//!
//! ```rust
//! use ehr_query::{parse_query, Columns, GroupBy, Predicate};
//!
//! let plan = parse_query(
//!     "SELECT * FROM ehr_records WHERE condition = 'Diabetes' AND region LIKE '%North%' LIMIT 20",
//! );
//!
//! assert_eq!(plan.columns, Columns::All);
//! assert_eq!(plan.predicate("condition"), Some(&Predicate::equals("Diabetes")));
//! assert_eq!(plan.predicate("region"), Some(&Predicate::like("North")));
//! assert_eq!(plan.limit, Some(20));
//!
//! let grouped = parse_query("SELECT * FROM ehr_records GROUP BY gender");
//! assert_eq!(grouped.group_by, Some(GroupBy::Gender));
//! ```
//!
//! ## Syntax Quick Reference
//!
//! | Clause | Form | Notes |
//! |--------|------|-------|
//! | `SELECT` | `SELECT *` / `SELECT a, b` | Defaults to `*` |
//! | `FROM` | `FROM <table>` | Informational only |
//! | `WHERE` | `field = 'v'` / `field LIKE '%v%'` joined by `AND` | Unknown shapes dropped |
//! | `GROUP BY` | `age_group`, `age`, `gender`, `region` | Other fields ignored |
//! | `LIMIT` | `LIMIT <n>` | Executor default is [`DEFAULT_LIMIT`] |
//!
//! Keywords and field names are case-insensitive. `OR`, parentheses, joins
//! and `ORDER BY` are not supported and produce a partial plan.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod ast;
mod error;
mod lexer;
mod parser;

pub use ast::{Columns, GroupBy, MatchKind, Predicate, QueryPlan, DEFAULT_LIMIT};
pub use error::{QueryError, QueryResult};
pub use lexer::{tokenize, Token};
pub use parser::{normalize_query_key, parse_query};
