//! Request dispatch.
//!
//! [`QueryService`] validates a [`Request`], warms the dataset cache, runs
//! the executor and shapes the [`Response`]. Parsed textual queries are kept
//! in a small LRU keyed by whitespace-normalized query text.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use ehr_query::{normalize_query_key, parse_query, QueryPlan};
use ehr_query_executor::{
    DatasetCache, PlanOutcome, QueryExecutor, RecordFilter, RecordSource,
};
use lru::LruCache;
use parking_lot::Mutex;

use crate::config::ServiceConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::request::{AggregateDimension, AggregateFilter, FilterCriteria, Request};
use crate::response::{Capabilities, Response, ResponseStats, StatusReport};

/// Answers filter, sql, aggregate and status requests against one dataset.
///
/// The service is `Send + Sync`; share it behind an `Arc` to serve requests
/// from several threads.
///
/// # Example
///
/// ```rust
/// use ehr_query_executor::InMemorySource;
/// use ehr_query_service::{QueryService, Response, ServiceConfig};
///
/// let text = "name,age,gender,region,address,conditions,meds,visits,phone,insurance\n\
///             Ana,34,Female,North,Addr,Asthma,None,None,555,INS-1\n";
/// let service = QueryService::from_source(InMemorySource::new(text), &ServiceConfig::default());
///
/// let response = service.handle_json(r#"{"type":"sql","query":"SELECT * WHERE gender = 'female'"}"#);
/// match response {
///     Response::Records { records, stats } => {
///         assert_eq!(records.len(), 1);
///         assert_eq!(stats.total_matched, 1);
///     }
///     other => panic!("unexpected response: {other:?}"),
/// }
/// ```
pub struct QueryService {
    cache: Arc<DatasetCache>,
    executor: QueryExecutor,
    plans: Option<Mutex<LruCache<String, Arc<QueryPlan>>>>,
}

impl QueryService {
    /// Creates a service over an existing cache.
    pub fn new(cache: Arc<DatasetCache>, config: &ServiceConfig) -> Self {
        let plans = NonZeroUsize::new(config.plan_cache_size)
            .map(|capacity| Mutex::new(LruCache::new(capacity)));

        Self {
            cache,
            executor: QueryExecutor::new(&config.engine),
            plans,
        }
    }

    /// Creates a service with its own cache reading from `source`.
    pub fn from_source<S>(source: S, config: &ServiceConfig) -> Self
    where
        S: RecordSource + 'static,
    {
        let cache = Arc::new(DatasetCache::new(source, &config.engine));
        Self::new(cache, config)
    }

    /// The dataset cache.
    pub fn cache(&self) -> &Arc<DatasetCache> {
        &self.cache
    }

    /// Parses a JSON request body and handles it. Never fails; problems are
    /// reported as error responses.
    pub fn handle_json(&self, body: &str) -> Response {
        match serde_json::from_str::<Request>(body) {
            Ok(request) => self.handle(&request),
            Err(err) => {
                let err = ServiceError::from(err);
                tracing::warn!(error = %err, "rejected malformed request");
                Response::error(&err)
            }
        }
    }

    /// Handles a request, converting failures into error responses.
    pub fn handle(&self, request: &Request) -> Response {
        match self.execute(request) {
            Ok(response) => response,
            Err(err) => {
                if err.is_client_error() {
                    tracing::warn!(kind = request.kind(), error = %err, "request rejected");
                } else {
                    tracing::error!(kind = request.kind(), error = %err, "request failed");
                }
                Response::error(&err)
            }
        }
    }

    /// Handles a request.
    pub fn execute(&self, request: &Request) -> ServiceResult<Response> {
        let started = Instant::now();
        let response = match request {
            Request::Filter { filters, limit } => self.filter(filters, *limit),
            Request::Sql { query } => self.sql(query),
            Request::Aggregate { group_by, filter } => self.aggregate(*group_by, filter.as_ref()),
            Request::Status => self.status(),
        }?;

        if let Some(stats) = response.stats() {
            tracing::info!(
                kind = request.kind(),
                matched = stats.total_matched,
                returned = stats.returned,
                query_ms = stats.query_time,
                refreshed = stats.cache_refreshed,
                elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
                "request handled"
            );
        } else {
            tracing::info!(kind = request.kind(), "request handled");
        }

        Ok(response)
    }

    /// Parses `query`, reusing a cached plan when the normalized text matches.
    pub fn plan(&self, query: &str) -> Arc<QueryPlan> {
        let Some(plans) = &self.plans else {
            return Arc::new(parse_query(query));
        };

        let key = normalize_query_key(query);
        if let Some(plan) = plans.lock().get(&key) {
            return Arc::clone(plan);
        }

        let plan = Arc::new(parse_query(query));
        tracing::debug!(plan = %plan, "parsed query");
        plans.lock().put(key, Arc::clone(&plan));
        plan
    }

    fn filter(&self, criteria: &FilterCriteria, limit: Option<usize>) -> ServiceResult<Response> {
        let spec = criteria.to_spec(limit);
        spec.validate()?;

        let fetched = self.cache.fetch_records()?;
        let outcome = self.executor.filter_spec(fetched.snapshot.records(), &spec)?;
        let stats = ResponseStats::from_execution(&outcome.stats, outcome.returned(), fetched.refreshed);

        Ok(Response::Records {
            records: outcome.records,
            stats,
        })
    }

    fn sql(&self, query: &str) -> ServiceResult<Response> {
        let plan = self.plan(query);
        let fetched = self.cache.fetch_records()?;

        let response = match self.executor.execute_plan(fetched.snapshot.records(), &plan, None) {
            PlanOutcome::Records(outcome) => Response::Records {
                stats: ResponseStats::from_execution(
                    &outcome.stats,
                    outcome.returned(),
                    fetched.refreshed,
                ),
                records: outcome.records,
            },
            PlanOutcome::Groups(counts) => Response::Aggregations {
                stats: ResponseStats::from_execution(
                    &counts.stats,
                    counts.groups.len(),
                    fetched.refreshed,
                ),
                aggregations: counts.groups,
            },
        };

        Ok(response)
    }

    fn aggregate(
        &self,
        group_by: AggregateDimension,
        filter: Option<&AggregateFilter>,
    ) -> ServiceResult<Response> {
        let filter = filter
            .map(|filter| RecordFilter::from_spec(&filter.to_spec()))
            .unwrap_or_else(RecordFilter::all);

        let fetched = self.cache.fetch_records()?;
        let counts = self
            .executor
            .aggregate(fetched.snapshot.records(), group_by.dimension(), &filter);

        Ok(Response::Aggregations {
            stats: ResponseStats::from_execution(
                &counts.stats,
                counts.groups.len(),
                fetched.refreshed,
            ),
            aggregations: counts.groups,
        })
    }

    fn status(&self) -> ServiceResult<Response> {
        let fetched = self.cache.fetch_records()?;
        let statistics = self.cache.statistics_for(&fetched.snapshot);

        Ok(Response::Status(Box::new(StatusReport {
            statistics: (*statistics).clone(),
            capabilities: Capabilities::current(self.executor.default_limit()),
            records_loaded: fetched.snapshot.len(),
            skipped_rows: fetched.snapshot.skipped_rows(),
            last_loaded: fetched.snapshot.loaded_at(),
            cache_refreshed: fetched.refreshed,
        })))
    }
}

impl std::fmt::Debug for QueryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryService")
            .field("cache", &self.cache)
            .field("executor", &self.executor)
            .field("cached_plans", &self.plans.as_ref().map(|plans| plans.lock().len()))
            .finish()
    }
}
