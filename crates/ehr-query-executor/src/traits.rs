//! Traits for supplying raw dataset text to the engine.
//!
//! The cache never opens files itself; it pulls text through a
//! [`RecordSource`]. Implementations are provided for files on disk
//! ([`FileSource`](crate::FileSource)) and for in-memory text
//! ([`InMemorySource`](crate::InMemorySource)); callers with other storage can
//! implement the trait directly.
//!
//! # Example
//!
//! ```rust
//! use ehr_query_executor::{ExecutorResult, RecordSource};
//!
//! struct Fixed(&'static str);
//!
//! impl RecordSource for Fixed {
//!     fn read_to_string(&self) -> ExecutorResult<String> {
//!         Ok(self.0.to_string())
//!     }
//!
//!     fn describe(&self) -> String {
//!         "fixed".to_string()
//!     }
//! }
//!
//! let source = Fixed("header\n");
//! assert_eq!(source.read_to_string().unwrap(), "header\n");
//! ```

use crate::error::ExecutorResult;

/// A provider of raw dataset text.
pub trait RecordSource: Send + Sync {
    /// Reads the complete dataset text.
    ///
    /// Called each time the cached record snapshot is missing or expired.
    fn read_to_string(&self) -> ExecutorResult<String>;

    /// Human-readable description used in logs and error messages.
    fn describe(&self) -> String;
}

impl<S: RecordSource + ?Sized> RecordSource for std::sync::Arc<S> {
    fn read_to_string(&self) -> ExecutorResult<String> {
        (**self).read_to_string()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
