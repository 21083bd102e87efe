//! Service configuration.

use ehr_query_executor::{EngineConfig, ExecutorError};

use crate::error::ServiceResult;

/// Environment variable overriding the parsed-plan cache size.
pub const ENV_PLAN_CACHE_SIZE: &str = "EHRQ_PLAN_CACHE_SIZE";

/// Default number of parsed textual queries kept in the plan cache.
pub const DEFAULT_PLAN_CACHE_SIZE: usize = 256;

/// Configuration for [`QueryService`](crate::QueryService).
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Engine settings (TTLs, default limit, caps).
    pub engine: EngineConfig,
    /// Maximum number of cached query plans; 0 disables the cache.
    pub plan_cache_size: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            plan_cache_size: DEFAULT_PLAN_CACHE_SIZE,
        }
    }
}

impl ServiceConfig {
    /// Reads engine and service settings from `EHRQ_*` environment variables.
    pub fn from_env() -> ServiceResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`ServiceConfig::from_env`] with a custom variable lookup.
    pub fn from_lookup<F>(lookup: F) -> ServiceResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let engine = EngineConfig::from_lookup(&lookup)?;
        let plan_cache_size = match lookup(ENV_PLAN_CACHE_SIZE) {
            Some(raw) if !raw.trim().is_empty() => {
                raw.trim()
                    .parse()
                    .map_err(|_| ExecutorError::InvalidConfig {
                        key: ENV_PLAN_CACHE_SIZE.to_string(),
                        message: format!("expected a non-negative integer, got '{}'", raw),
                    })?
            }
            _ => DEFAULT_PLAN_CACHE_SIZE,
        };

        Ok(Self {
            engine,
            plan_cache_size,
        })
    }

    /// Replaces the engine configuration.
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    /// Sets the plan cache size.
    pub fn with_plan_cache_size(mut self, size: usize) -> Self {
        self.plan_cache_size = size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;

    #[test]
    fn test_default() {
        let config = ServiceConfig::default();
        assert_eq!(config.plan_cache_size, 256);
        assert_eq!(config.engine.default_limit, 100);
    }

    #[test]
    fn test_from_lookup() {
        let config = ServiceConfig::from_lookup(|key| match key {
            ENV_PLAN_CACHE_SIZE => Some("8".to_string()),
            "EHRQ_DEFAULT_LIMIT" => Some("5".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.plan_cache_size, 8);
        assert_eq!(config.engine.default_limit, 5);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = ServiceConfig::from_lookup(|key| {
            (key == ENV_PLAN_CACHE_SIZE).then(|| "lots".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ServiceError::Executor(ExecutorError::InvalidConfig { .. })));
    }
}
