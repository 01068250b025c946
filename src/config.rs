//! Configuration for stgcache
//!
//! Centralized configuration with sensible defaults. Containers and caches are
//! configured independently: a [`StorageConfig`] is owned by the
//! [`ContainerRegistry`](crate::storage::ContainerRegistry) every container is
//! opened through, a [`CacheConfig`] is handed to each
//! [`ObjectCache`](crate::cache::ObjectCache).

use std::time::Duration;

use crate::error::{Result, StgError};
use crate::storage::ErrorPolicy;

/// Reference maximum entry-name length of the container format
pub const DEFAULT_NAME_BUDGET: usize = 31;

// =============================================================================
// Storage Configuration
// =============================================================================

/// Configuration shared by every container opened through one registry
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Maximum characters per entry name inside a container.
    /// Longer names are shortened by [`path::encode`](crate::path::encode).
    pub name_budget: usize,

    /// Policy a freshly opened container applies in `resolve`
    pub default_policy: ErrorPolicy,

    /// Allow share modes weaker than exclusive. When false, every open is
    /// raised to [`ShareMode::Exclusive`](crate::storage::ShareMode::Exclusive).
    pub allow_shared_access: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            name_budget: DEFAULT_NAME_BUDGET,
            default_policy: ErrorPolicy::Throw,
            allow_shared_access: false,
        }
    }
}

impl StorageConfig {
    /// Create a new config builder
    pub fn builder() -> StorageConfigBuilder {
        StorageConfigBuilder::default()
    }
}

/// Builder for StorageConfig
#[derive(Default)]
pub struct StorageConfigBuilder {
    config: StorageConfig,
}

impl StorageConfigBuilder {
    /// Set the maximum entry-name length
    pub fn name_budget(mut self, budget: usize) -> Self {
        self.config.name_budget = budget;
        self
    }

    /// Set the default error policy
    pub fn default_policy(mut self, policy: ErrorPolicy) -> Self {
        self.config.default_policy = policy;
        self
    }

    /// Permit share modes weaker than exclusive
    pub fn allow_shared_access(mut self, allow: bool) -> Self {
        self.config.allow_shared_access = allow;
        self
    }

    pub fn build(self) -> Result<StorageConfig> {
        // The budget is persisted as a u16 in the container header
        if self.config.name_budget == 0 || self.config.name_budget > u16::MAX as usize {
            return Err(StgError::Config(format!(
                "name_budget must be in 1..={}, got {}",
                u16::MAX,
                self.config.name_budget
            )));
        }
        Ok(self.config)
    }
}

// =============================================================================
// Cache Configuration
// =============================================================================

/// Configuration for one object cache and its prefetch worker
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Entry count above which eviction kicks in
    pub max_size: usize,

    /// Compare the backing file's modify time on every lookup
    pub check_expiry: bool,

    /// Name given to the prefetch worker thread
    pub worker_name: String,

    /// How often `wait_complete_pending` polls the queue
    pub poll_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 100,
            check_expiry: true,
            worker_name: "stgcache-prefetch".to_string(),
            poll_interval: Duration::from_millis(10),
        }
    }
}

impl CacheConfig {
    /// Create a new config builder
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }
}

/// Builder for CacheConfig
#[derive(Default)]
pub struct CacheConfigBuilder {
    config: CacheConfig,
}

impl CacheConfigBuilder {
    /// Set the maximum number of cached objects
    pub fn max_size(mut self, size: usize) -> Self {
        self.config.max_size = size;
        self
    }

    /// Enable or disable modify-time expiry checks
    pub fn check_expiry(mut self, check: bool) -> Self {
        self.config.check_expiry = check;
        self
    }

    /// Set the prefetch worker thread name
    pub fn worker_name(mut self, name: impl Into<String>) -> Self {
        self.config.worker_name = name.into();
        self
    }

    /// Set the polling interval of `wait_complete_pending` (in milliseconds)
    pub fn poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.poll_interval = Duration::from_millis(ms);
        self
    }

    pub fn build(self) -> Result<CacheConfig> {
        if self.config.max_size == 0 {
            return Err(StgError::Config("max_size must be at least 1".to_string()));
        }
        Ok(self.config)
    }
}
