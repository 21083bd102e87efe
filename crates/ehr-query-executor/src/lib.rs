//! # ehr-query-executor
//!
//! In-memory query engine for tabular patient records.
//!
//! This crate loads a delimited patient dataset into typed [`Record`]s, keeps
//! the parsed records and their derived statistics in a time-bounded
//! [`DatasetCache`], and answers attribute filters, parsed textual queries
//! (from the [`ehr-query`] parser) and group-by aggregations.
//!
//! ## Key Features
//!
//! - **Tolerant loading** - malformed rows are counted and skipped, never fatal
//! - **Independent TTLs** - records and statistics expire separately
//! - **Single-writer refresh** - readers always see a fully built snapshot
//! - **Optional parallelism** - enable the `parallel` feature for rayon filtering
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use ehr_query_executor::{
//!     parse_query, DatasetCache, EngineConfig, InMemorySource, PlanOutcome, QueryExecutor,
//! };
//!
//! let text = "name,age,gender,region,address,conditions,meds,visits,phone,insurance\n\
//!             Ana,34,Female,North,Addr,\"Diabetes, Asthma\",None,None,555,INS-1\n\
//!             Ben,61,Male,South,Addr,Asthma,Salbutamol,None,556,INS-2\n";
//!
//! let config = EngineConfig::default();
//! let cache = DatasetCache::new(InMemorySource::new(text), &config);
//! let executor = QueryExecutor::new(&config);
//!
//! let snapshot = cache.records().unwrap();
//! let plan = parse_query("SELECT * FROM ehr_records WHERE condition LIKE '%asth%' GROUP BY gender");
//!
//! match executor.execute_plan(snapshot.records(), &plan, None) {
//!     PlanOutcome::Groups(counts) => {
//!         assert_eq!(counts.count("Female"), 1);
//!         assert_eq!(counts.count("Male"), 1);
//!     }
//!     PlanOutcome::Records(_) => unreachable!(),
//! }
//!
//! let stats = cache.statistics().unwrap();
//! assert_eq!(stats.total_patients, 2);
//! ```
//!
//! ## Feature Flags
//!
//! - `parallel` - Enables parallel filtering using rayon
//! - `query-serde` - Enables serde support on the re-exported query plan types
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    ehr-query-executor                        │
//! │                                                              │
//! │  DatasetCache                                                │
//! │  ├── RecordSource → raw text (file / in-memory)             │
//! │  ├── loader       → Vec<Record>                             │
//! │  └── StatisticsAggregator → StatisticsSnapshot              │
//! │                                                              │
//! │  QueryExecutor                                               │
//! │  ├── RecordFilter (FilterSpec or QueryPlan)                  │
//! │  ├── bounded record slice                                    │
//! │  └── GroupCounts by Dimension                                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`ehr-query`]: ehr_query

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod cache;
mod config;
mod dimension;
mod error;
mod executor;
mod loader;
mod record;
mod result;
mod source;
mod statistics;
mod traits;

// Public re-exports
pub use cache::{CacheState, DatasetCache, DatasetSnapshot, Fetched};
pub use config::{
    CacheConfig, EngineConfig, EngineConfigBuilder, StatisticsLimits, ENV_DEFAULT_LIMIT,
    ENV_RECORD_TTL_SECS, ENV_STATS_TTL_SECS,
};
pub use dimension::{
    AgeBucketScheme, AggregationKind, Dimension, DistributionEntry, Tally, UNKNOWN_KEY,
};
pub use error::{ExecutorError, ExecutorResult};
pub use executor::{FilterSpec, QueryExecutor, RecordFilter};
pub use loader::{
    parse_list, parse_records, parse_visits, split_fields, ColumnLayout, LoadedRecords,
    MIN_FIELDS,
};
pub use record::{Record, Visit};
pub use result::{ExecutionStats, FilterOutcome, GroupCounts, PlanOutcome};
pub use source::{FileSource, InMemorySource};
pub use statistics::{
    MedicationCoverage, StatisticsAggregator, StatisticsSnapshot, STATISTICS_AGE_SCHEME,
};
pub use traits::RecordSource;

// Re-export commonly used types from the parser for convenience
pub use ehr_query::{parse_query, GroupBy, QueryPlan};
