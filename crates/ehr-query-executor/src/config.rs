//! Configuration types for the query engine.

use std::time::Duration;

use ehr_query::DEFAULT_LIMIT;

use crate::error::{ExecutorError, ExecutorResult};
use crate::loader::ColumnLayout;

/// Environment variable overriding the record snapshot TTL, in seconds.
pub const ENV_RECORD_TTL_SECS: &str = "EHRQ_RECORD_TTL_SECS";
/// Environment variable overriding the statistics snapshot TTL, in seconds.
pub const ENV_STATS_TTL_SECS: &str = "EHRQ_STATS_TTL_SECS";
/// Environment variable overriding the default row limit.
pub const ENV_DEFAULT_LIMIT: &str = "EHRQ_DEFAULT_LIMIT";

/// Configuration for the query engine.
///
/// # Example
///
/// ```rust
/// use ehr_query_executor::{EngineConfig, StatisticsLimits};
/// use std::time::Duration;
///
/// let config = EngineConfig::builder()
///     .with_record_ttl(Duration::from_secs(60))
///     .with_statistics_ttl(Duration::from_secs(600))
///     .with_default_limit(50)
///     .with_statistics_limits(StatisticsLimits { region_cap: 10, distribution_cap: 5 })
///     .build();
///
/// assert_eq!(config.default_limit, 50);
/// ```
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Snapshot TTLs.
    pub cache: CacheConfig,
    /// Row limit used when neither the query nor the request sets one.
    pub default_limit: usize,
    /// Presentation caps for capped statistics distributions.
    pub statistics: StatisticsLimits,
    /// Enable parallel filtering (requires `parallel` feature).
    pub parallel: bool,
    /// Column positions in the source dataset.
    pub layout: ColumnLayout,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            default_limit: DEFAULT_LIMIT,
            statistics: StatisticsLimits::default(),
            parallel: false,
            layout: ColumnLayout::default(),
        }
    }
}

impl EngineConfig {
    /// Creates a new builder for EngineConfig.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Builds a configuration from defaults overridden by `EHRQ_*`
    /// environment variables.
    pub fn from_env() -> ExecutorResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from defaults overridden by values returned
    /// from `lookup`.
    pub fn from_lookup<F>(lookup: F) -> ExecutorResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = EngineConfig::builder();

        if let Some(secs) = parse_env_number(&lookup, ENV_RECORD_TTL_SECS)? {
            builder = builder.with_record_ttl(Duration::from_secs(secs));
        }
        if let Some(secs) = parse_env_number(&lookup, ENV_STATS_TTL_SECS)? {
            builder = builder.with_statistics_ttl(Duration::from_secs(secs));
        }
        if let Some(limit) = parse_env_number(&lookup, ENV_DEFAULT_LIMIT)? {
            builder = builder.with_default_limit(limit as usize);
        }

        Ok(builder.build())
    }
}

fn parse_env_number<F>(lookup: &F, key: &str) -> ExecutorResult<Option<u64>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ExecutorError::InvalidConfig {
                key: key.to_string(),
                message: format!("expected a non-negative integer, got '{}'", raw),
            }),
    }
}

/// Builder for EngineConfig.
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Sets the record snapshot TTL.
    pub fn with_record_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache.record_ttl = ttl;
        self
    }

    /// Sets the statistics snapshot TTL.
    pub fn with_statistics_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache.statistics_ttl = ttl;
        self
    }

    /// Replaces both TTLs at once.
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.config.cache = cache;
        self
    }

    /// Sets the default row limit.
    pub fn with_default_limit(mut self, limit: usize) -> Self {
        self.config.default_limit = limit;
        self
    }

    /// Sets statistics distribution caps.
    pub fn with_statistics_limits(mut self, limits: StatisticsLimits) -> Self {
        self.config.statistics = limits;
        self
    }

    /// Enables or disables parallel filtering.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    /// Overrides the dataset column layout.
    pub fn with_layout(mut self, layout: ColumnLayout) -> Self {
        self.config.layout = layout;
        self
    }

    /// Builds the EngineConfig.
    pub fn build(self) -> EngineConfig {
        self.config
    }
}

/// Time-to-live settings for the dataset cache.
///
/// The two TTLs are independent: statistics may expire and be recomputed
/// without re-reading the dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// How long a parsed record snapshot stays valid.
    pub record_ttl: Duration,
    /// How long a statistics snapshot stays valid.
    pub statistics_ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            record_ttl: Duration::from_secs(300),
            statistics_ttl: Duration::from_secs(300),
        }
    }
}

/// Caps applied to top-N statistics distributions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatisticsLimits {
    /// Maximum number of regions reported.
    pub region_cap: usize,
    /// Maximum number of entries for conditions, diagnoses and medications.
    pub distribution_cap: usize,
}

impl Default for StatisticsLimits {
    fn default() -> Self {
        Self {
            region_cap: 30,
            distribution_cap: 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.cache.record_ttl, Duration::from_secs(300));
        assert_eq!(config.cache.statistics_ttl, Duration::from_secs(300));
        assert_eq!(config.default_limit, 100);
        assert_eq!(config.statistics.region_cap, 30);
        assert_eq!(config.statistics.distribution_cap, 20);
        assert!(!config.parallel);
    }

    #[test]
    fn test_engine_config_builder() {
        let config = EngineConfig::builder()
            .with_record_ttl(Duration::from_secs(10))
            .with_statistics_ttl(Duration::from_secs(20))
            .with_default_limit(7)
            .with_parallel(true)
            .build();

        assert_eq!(config.cache.record_ttl, Duration::from_secs(10));
        assert_eq!(config.cache.statistics_ttl, Duration::from_secs(20));
        assert_eq!(config.default_limit, 7);
        assert!(config.parallel);
    }

    #[test]
    fn test_builder_with_cache() {
        let config = EngineConfig::builder()
            .with_cache(CacheConfig {
                record_ttl: Duration::from_millis(5),
                statistics_ttl: Duration::from_millis(6),
            })
            .build();
        assert_eq!(config.cache.record_ttl, Duration::from_millis(5));
        assert_eq!(config.cache.statistics_ttl, Duration::from_millis(6));
    }

    #[test]
    fn test_from_lookup_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_RECORD_TTL_SECS, "60"),
            (ENV_STATS_TTL_SECS, " 120 "),
            (ENV_DEFAULT_LIMIT, "25"),
        ]
        .into_iter()
        .collect();

        let config = EngineConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.cache.record_ttl, Duration::from_secs(60));
        assert_eq!(config.cache.statistics_ttl, Duration::from_secs(120));
        assert_eq!(config.default_limit, 25);
    }

    #[test]
    fn test_from_lookup_missing_and_blank_use_defaults() {
        let config = EngineConfig::from_lookup(|k| {
            if k == ENV_DEFAULT_LIMIT {
                Some("  ".to_string())
            } else {
                None
            }
        })
        .unwrap();
        assert_eq!(config.default_limit, 100);
        assert_eq!(config.cache, CacheConfig::default());
    }

    #[test]
    fn test_from_lookup_invalid_value() {
        let err = EngineConfig::from_lookup(|k| {
            if k == ENV_RECORD_TTL_SECS {
                Some("soon".to_string())
            } else {
                None
            }
        })
        .unwrap_err();

        match err {
            ExecutorError::InvalidConfig { key, .. } => assert_eq!(key, ENV_RECORD_TTL_SECS),
            other => panic!("Expected InvalidConfig, got {other:?}"),
        }
    }
}
