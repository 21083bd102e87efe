//! # ehr-query-service
//!
//! JSON request/response front end for the [`ehr_query_executor`] engine.
//!
//! Requests are discriminated by a `type` field (`filter`, `sql`,
//! `aggregate`, `status`). [`QueryService::handle_json`] accepts a raw body
//! and always produces a [`Response`]: either a success shape
//! (`{ records, stats }`, `{ aggregations, stats }`, a status report) or
//! `{ error: { kind, message } }`.
//!
//! The `ehrq` binary in this crate wraps the service in a command-line tool.
//!
//! ## Quick Start
//!
//! ```rust
//! use ehr_query_executor::InMemorySource;
//! use ehr_query_service::{QueryService, ServiceConfig};
//!
//! let text = "name,age,gender,region,address,conditions,meds,visits,phone,insurance\n\
//!             Ana,34,Female,North,Addr,Asthma,None,None,555,INS-1\n\
//!             Ben,61,Male,South,Addr,None,None,None,556,INS-2\n";
//! let service = QueryService::from_source(InMemorySource::new(text), &ServiceConfig::default());
//!
//! let response = service.handle_json(r#"{"type":"aggregate","groupBy":"age"}"#);
//! let json = serde_json::to_value(&response).unwrap();
//! assert_eq!(json["aggregations"]["20-39"], 1);
//! assert_eq!(json["aggregations"]["60-79"], 1);
//! assert_eq!(json["stats"]["totalMatched"], 2);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod config;
mod error;
mod request;
mod response;
mod service;

// Public re-exports
pub use config::{ServiceConfig, DEFAULT_PLAN_CACHE_SIZE, ENV_PLAN_CACHE_SIZE};
pub use error::{ErrorKind, ServiceError, ServiceResult};
pub use request::{AggregateDimension, AggregateFilter, FilterCriteria, Request};
pub use response::{Capabilities, ErrorBody, Response, ResponseStats, StatusReport};
pub use service::QueryService;
