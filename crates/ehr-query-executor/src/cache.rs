//! Time-bounded caching of parsed records and derived statistics.
//!
//! [`DatasetCache`] owns two snapshots with independent TTLs: the parsed
//! record set and the statistics computed from it. Readers clone an `Arc`
//! to a fully built snapshot under a short read lock; refreshes are
//! serialized by a separate refresh lock so at most one reload runs at a
//! time.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use crate::config::{CacheConfig, EngineConfig};
use crate::error::ExecutorResult;
use crate::loader::{parse_records, ColumnLayout};
use crate::record::Record;
use crate::statistics::{StatisticsAggregator, StatisticsSnapshot};
use crate::traits::RecordSource;

/// A cached snapshot with expiration tracking.
#[derive(Debug)]
struct CacheEntry<T> {
    value: Arc<T>,
    created_at: Instant,
}

impl<T> CacheEntry<T> {
    fn new(value: Arc<T>) -> Self {
        Self {
            value,
            created_at: Instant::now(),
        }
    }

    /// A zero TTL expires immediately.
    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() >= ttl
    }

    fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

// =============================================================================
// Snapshots
// =============================================================================

/// An immutable, fully parsed record set.
#[derive(Debug, Clone)]
pub struct DatasetSnapshot {
    records: Vec<Record>,
    loaded_at: DateTime<Utc>,
    generation: u64,
    skipped_rows: usize,
}

impl DatasetSnapshot {
    /// All records in dataset order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the snapshot holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Wall-clock time the snapshot was built.
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Refresh counter; strictly increases with each replacement.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Data lines dropped during parsing.
    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }
}

/// A record snapshot plus whether obtaining it triggered a reload.
#[derive(Debug, Clone)]
pub struct Fetched {
    /// The live snapshot.
    pub snapshot: Arc<DatasetSnapshot>,
    /// True if this call read and parsed the source.
    pub refreshed: bool,
}

/// Point-in-time view of the cache for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheState {
    /// Generation of the live record snapshot, if any.
    pub generation: Option<u64>,
    /// Record count of the live snapshot, if any.
    pub record_count: Option<usize>,
    /// When the live snapshot was built, if any.
    pub loaded_at: Option<DateTime<Utc>>,
    /// Age of the live record snapshot.
    pub records_age: Option<Duration>,
    /// True if the record snapshot exists and is within its TTL.
    pub records_fresh: bool,
    /// True if a statistics snapshot for the live generation is within its TTL.
    pub statistics_fresh: bool,
}

// =============================================================================
// Cache
// =============================================================================

/// Thread-safe cache of the dataset and its statistics.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use ehr_query_executor::{DatasetCache, EngineConfig, InMemorySource};
///
/// let source = Arc::new(InMemorySource::new(
///     "name,age,gender,region,address,conditions,meds,visits,phone,insurance\n\
///      Ana,34,Female,North,Addr,Asthma,None,None,555,INS-1\n",
/// ));
/// let cache = DatasetCache::new(source.clone(), &EngineConfig::default());
///
/// let first = cache.fetch_records().unwrap();
/// assert!(first.refreshed);
/// assert_eq!(first.snapshot.len(), 1);
///
/// let second = cache.fetch_records().unwrap();
/// assert!(!second.refreshed);
/// ```
pub struct DatasetCache {
    source: Box<dyn RecordSource>,
    ttl: CacheConfig,
    layout: ColumnLayout,
    aggregator: StatisticsAggregator,
    records: RwLock<Option<CacheEntry<DatasetSnapshot>>>,
    statistics: RwLock<Option<CacheEntry<StatisticsSnapshot>>>,
    refresh_lock: Mutex<()>,
    generation: AtomicU64,
}

impl DatasetCache {
    /// Creates an empty cache reading from `source`.
    pub fn new<S>(source: S, config: &EngineConfig) -> Self
    where
        S: RecordSource + 'static,
    {
        Self {
            source: Box::new(source),
            ttl: config.cache.clone(),
            layout: config.layout,
            aggregator: StatisticsAggregator::new(config.statistics),
            records: RwLock::new(None),
            statistics: RwLock::new(None),
            refresh_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    /// Pre-seeds the cache with `records` as the live snapshot.
    pub fn with_records(self, records: Vec<Record>) -> Self {
        self.replace_records(records);
        self
    }

    /// Description of the underlying source.
    pub fn source_description(&self) -> String {
        self.source.describe()
    }

    /// The configured TTLs.
    pub fn ttl(&self) -> &CacheConfig {
        &self.ttl
    }

    /// Returns the live record snapshot, reloading it if missing or expired.
    ///
    /// If the source cannot be read the previous snapshot stays in place and
    /// the error is returned.
    pub fn fetch_records(&self) -> ExecutorResult<Fetched> {
        if let Some(snapshot) = self.fresh_records() {
            return Ok(Fetched {
                snapshot,
                refreshed: false,
            });
        }

        let _guard = self.refresh_lock.lock();

        // Another caller may have refreshed while we waited.
        if let Some(snapshot) = self.fresh_records() {
            return Ok(Fetched {
                snapshot,
                refreshed: false,
            });
        }

        let snapshot = self.reload()?;
        Ok(Fetched {
            snapshot,
            refreshed: true,
        })
    }

    /// Returns the live record snapshot, reloading it if needed.
    pub fn records(&self) -> ExecutorResult<Arc<DatasetSnapshot>> {
        self.fetch_records().map(|fetched| fetched.snapshot)
    }

    /// Returns statistics for the live record snapshot, recomputing them if
    /// missing, expired, or derived from an older snapshot.
    pub fn statistics(&self) -> ExecutorResult<Arc<StatisticsSnapshot>> {
        let snapshot = self.records()?;
        Ok(self.statistics_for(&snapshot))
    }

    /// Returns statistics describing exactly `snapshot`, never reading the
    /// source.
    ///
    /// Results are cached only while `snapshot` is the live generation.
    pub fn statistics_for(&self, snapshot: &DatasetSnapshot) -> Arc<StatisticsSnapshot> {
        let generation = snapshot.generation();

        if let Some(stats) = self.fresh_statistics(generation) {
            return stats;
        }

        let _guard = self.refresh_lock.lock();

        if let Some(stats) = self.fresh_statistics(generation) {
            return stats;
        }

        let started = Instant::now();
        let stats = Arc::new(self.aggregator.compute(snapshot.records(), generation));
        if self.live_generation() == Some(generation) {
            *self.statistics.write() = Some(CacheEntry::new(Arc::clone(&stats)));
        }

        tracing::info!(
            generation,
            records = snapshot.len(),
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "statistics recomputed"
        );

        stats
    }

    /// Installs `records` as a new snapshot and drops cached statistics.
    pub fn replace_records(&self, records: Vec<Record>) -> Arc<DatasetSnapshot> {
        self.install(records, 0)
    }

    /// Drops the record snapshot (and with it the statistics).
    pub fn invalidate_records(&self) {
        *self.records.write() = None;
        *self.statistics.write() = None;
        tracing::debug!("record snapshot invalidated");
    }

    /// Drops the statistics snapshot only.
    pub fn invalidate_statistics(&self) {
        *self.statistics.write() = None;
        tracing::debug!("statistics snapshot invalidated");
    }

    /// Returns a diagnostic view of the cache without refreshing anything.
    pub fn cache_state(&self) -> CacheState {
        let records = self.records.read();
        let live = records.as_ref();
        let generation = live.map(|entry| entry.value.generation());

        let statistics_fresh = match (self.statistics.read().as_ref(), generation) {
            (Some(entry), Some(generation)) => {
                !entry.is_expired(self.ttl.statistics_ttl) && entry.value.generation == generation
            }
            _ => false,
        };

        CacheState {
            generation,
            record_count: live.map(|entry| entry.value.len()),
            loaded_at: live.map(|entry| entry.value.loaded_at()),
            records_age: live.map(CacheEntry::age),
            records_fresh: live.is_some_and(|entry| !entry.is_expired(self.ttl.record_ttl)),
            statistics_fresh,
        }
    }

    fn live_generation(&self) -> Option<u64> {
        self.records.read().as_ref().map(|entry| entry.value.generation())
    }

    fn fresh_records(&self) -> Option<Arc<DatasetSnapshot>> {
        let records = self.records.read();
        records
            .as_ref()
            .filter(|entry| !entry.is_expired(self.ttl.record_ttl))
            .map(|entry| Arc::clone(&entry.value))
    }

    fn fresh_statistics(&self, generation: u64) -> Option<Arc<StatisticsSnapshot>> {
        let statistics = self.statistics.read();
        statistics
            .as_ref()
            .filter(|entry| !entry.is_expired(self.ttl.statistics_ttl))
            .filter(|entry| entry.value.generation == generation)
            .map(|entry| Arc::clone(&entry.value))
    }

    /// Must be called with the refresh lock held.
    fn reload(&self) -> ExecutorResult<Arc<DatasetSnapshot>> {
        let started = Instant::now();
        let source = self.source.describe();
        tracing::info!(source = %source, "loading dataset");

        let text = match self.source.read_to_string() {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(
                    source = %source,
                    error = %err,
                    has_previous = self.records.read().is_some(),
                    "dataset reload failed, keeping previous snapshot"
                );
                return Err(err);
            }
        };

        let loaded = parse_records(&text, &self.layout);
        if loaded.skipped_rows > 0 {
            tracing::warn!(
                source = %source,
                skipped = loaded.skipped_rows,
                "dropped malformed dataset rows"
            );
        }

        let snapshot = self.install(loaded.records, loaded.skipped_rows);
        tracing::info!(
            source = %source,
            records = snapshot.len(),
            generation = snapshot.generation(),
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "dataset loaded"
        );

        Ok(snapshot)
    }

    fn install(&self, records: Vec<Record>, skipped_rows: usize) -> Arc<DatasetSnapshot> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Arc::new(DatasetSnapshot {
            records,
            loaded_at: Utc::now(),
            generation,
            skipped_rows,
        });

        *self.records.write() = Some(CacheEntry::new(Arc::clone(&snapshot)));
        *self.statistics.write() = None;

        snapshot
    }
}

impl fmt::Debug for DatasetCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatasetCache")
            .field("source", &self.source.describe())
            .field("ttl", &self.ttl)
            .field("state", &self.cache_state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecutorError;
    use crate::source::InMemorySource;
    use std::io;
    use std::sync::atomic::AtomicBool;

    const HEADER: &str = "name,age,gender,region,address,conditions,meds,visits,phone,insurance";

    fn dataset(rows: &[&str]) -> String {
        let mut text = String::from(HEADER);
        for row in rows {
            text.push('\n');
            text.push_str(row);
        }
        text
    }

    fn config(record_ttl: Duration, statistics_ttl: Duration) -> EngineConfig {
        EngineConfig::builder()
            .with_record_ttl(record_ttl)
            .with_statistics_ttl(statistics_ttl)
            .build()
    }

    /// Source that can be switched into a failing state.
    struct FlakySource {
        inner: InMemorySource,
        failing: AtomicBool,
    }

    impl FlakySource {
        fn new(text: &str) -> Self {
            Self {
                inner: InMemorySource::new(text),
                failing: AtomicBool::new(false),
            }
        }

        fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }
    }

    impl RecordSource for FlakySource {
        fn read_to_string(&self) -> ExecutorResult<String> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(ExecutorError::SourceRead {
                    location: self.describe(),
                    source: io::Error::new(io::ErrorKind::NotFound, "gone"),
                });
            }
            self.inner.read_to_string()
        }

        fn describe(&self) -> String {
            "flaky".to_string()
        }
    }

    #[test]
    fn test_first_fetch_loads_then_hits() {
        let source = Arc::new(InMemorySource::new(dataset(&["a,30,Male,N,A,None,None,None,P,I"])));
        let cache = DatasetCache::new(source, &EngineConfig::default());

        let first = cache.fetch_records().unwrap();
        assert!(first.refreshed);
        assert_eq!(first.snapshot.generation(), 1);

        let second = cache.fetch_records().unwrap();
        assert!(!second.refreshed);
        assert!(Arc::ptr_eq(&first.snapshot, &second.snapshot));
    }

    #[test]
    fn test_expired_records_reload() {
        let source = Arc::new(InMemorySource::new(dataset(&["a,30,Male,N,A,None,None,None,P,I"])));
        let cache = DatasetCache::new(Arc::clone(&source), &config(Duration::ZERO, Duration::ZERO));

        let first = cache.records().unwrap();
        source.set_text(dataset(&[
            "a,30,Male,N,A,None,None,None,P,I",
            "b,40,Female,S,A,None,None,None,P,I",
        ]));
        let second = cache.records().unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 2);
        assert!(second.generation() > first.generation());
    }

    #[test]
    fn test_skipped_rows_recorded() {
        let source = InMemorySource::new(dataset(&["short,row", "a,30,Male,N,A,None,None,None,P,I"]));
        let cache = DatasetCache::new(source, &EngineConfig::default());
        let snapshot = cache.records().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.skipped_rows(), 1);
    }

    #[test]
    fn test_source_failure_keeps_previous_snapshot() {
        let source = Arc::new(FlakySource::new(&dataset(&["a,30,Male,N,A,None,None,None,P,I"])));
        let cache = DatasetCache::new(Arc::clone(&source), &config(Duration::ZERO, Duration::ZERO));

        let first = cache.records().unwrap();
        source.set_failing(true);

        let err = cache.records().unwrap_err();
        assert!(err.is_source_error());

        let state = cache.cache_state();
        assert_eq!(state.generation, Some(first.generation()));
        assert_eq!(state.record_count, Some(1));

        source.set_failing(false);
        assert_eq!(cache.records().unwrap().generation(), first.generation() + 1);
    }

    #[test]
    fn test_source_failure_without_previous_snapshot() {
        let source = FlakySource::new("");
        source.set_failing(true);
        let cache = DatasetCache::new(source, &EngineConfig::default());

        assert!(cache.records().is_err());
        assert_eq!(cache.cache_state().generation, None);
    }

    #[test]
    fn test_statistics_cached_per_generation() {
        let cache = DatasetCache::new(InMemorySource::default(), &EngineConfig::default())
            .with_records(vec![Record {
                age: 50,
                ..Record::default()
            }]);

        let first = cache.statistics().unwrap();
        let second = cache.statistics().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.total_patients, 1);

        cache.replace_records(vec![Record::default(), Record::default()]);
        let third = cache.statistics().unwrap();
        assert_eq!(third.total_patients, 2);
        assert_eq!(third.generation, first.generation + 1);
    }

    /// Source that counts how often it is read.
    #[derive(Default)]
    struct CountingSource {
        inner: InMemorySource,
        reads: AtomicU64,
    }

    impl RecordSource for CountingSource {
        fn read_to_string(&self) -> ExecutorResult<String> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.read_to_string()
        }

        fn describe(&self) -> String {
            "counting".to_string()
        }
    }

    #[test]
    fn test_statistics_for_snapshot_never_reads_source() {
        let source = Arc::new(CountingSource {
            inner: InMemorySource::new(dataset(&["a,30,Male,N,A,None,None,None,P,I"])),
            ..CountingSource::default()
        });
        let cache = DatasetCache::new(Arc::clone(&source), &config(Duration::ZERO, Duration::ZERO));

        let fetched = cache.fetch_records().unwrap();
        let stats = cache.statistics_for(&fetched.snapshot);

        assert_eq!(source.reads.load(Ordering::SeqCst), 1);
        assert_eq!(stats.generation, fetched.snapshot.generation());
        assert_eq!(stats.total_patients, 1);
    }

    #[test]
    fn test_statistics_for_superseded_snapshot_not_cached() {
        let cache = DatasetCache::new(InMemorySource::default(), &EngineConfig::default())
            .with_records(vec![Record::default()]);
        let old = cache.records().unwrap();
        cache.replace_records(vec![Record::default(), Record::default()]);

        let stale = cache.statistics_for(&old);
        assert_eq!(stale.total_patients, 1);
        assert_eq!(stale.generation, old.generation());
        assert!(!cache.cache_state().statistics_fresh);

        let live = cache.statistics().unwrap();
        assert_eq!(live.total_patients, 2);
        assert!(cache.cache_state().statistics_fresh);
    }

    #[test]
    fn test_statistics_expiry_does_not_reload_records() {
        let source = Arc::new(InMemorySource::new(dataset(&["a,30,Male,N,A,None,None,None,P,I"])));
        let cache = DatasetCache::new(
            Arc::clone(&source),
            &config(Duration::from_secs(300), Duration::ZERO),
        );

        let first = cache.statistics().unwrap();
        let generation = cache.cache_state().generation;
        let second = cache.statistics().unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(cache.cache_state().generation, generation);
    }

    #[test]
    fn test_invalidate() {
        let cache = DatasetCache::new(InMemorySource::new(dataset(&[])), &EngineConfig::default())
            .with_records(vec![Record::default()]);
        cache.statistics().unwrap();
        assert!(cache.cache_state().statistics_fresh);

        cache.invalidate_statistics();
        let state = cache.cache_state();
        assert!(state.records_fresh);
        assert!(!state.statistics_fresh);

        cache.invalidate_records();
        let state = cache.cache_state();
        assert!(!state.records_fresh);
        assert_eq!(state.generation, None);

        // Reloads from the (empty) source.
        let fetched = cache.fetch_records().unwrap();
        assert!(fetched.refreshed);
        assert!(fetched.snapshot.is_empty());
        assert_eq!(fetched.snapshot.generation(), 2);
    }

    #[test]
    fn test_debug_does_not_refresh() {
        let cache = DatasetCache::new(InMemorySource::default(), &EngineConfig::default());
        let rendered = format!("{:?}", cache);
        assert!(rendered.contains("in-memory"));
        assert_eq!(cache.cache_state().generation, None);
    }

    #[test]
    fn test_concurrent_readers_share_one_reload() {
        let source = InMemorySource::new(dataset(&["a,30,Male,N,A,None,None,None,P,I"]));
        let cache = Arc::new(DatasetCache::new(source, &EngineConfig::default()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.fetch_records().unwrap().refreshed)
            })
            .collect();

        let refreshes = handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|refreshed| *refreshed)
            .count();

        assert_eq!(refreshes, 1);
        assert_eq!(cache.cache_state().generation, Some(1));
    }
}
