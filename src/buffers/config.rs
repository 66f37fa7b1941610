//! Buffer pool configuration

use serde::{Deserialize, Serialize};

use crate::error::{PayloadError, Result};

/// Default allocation quantum in bytes
pub const DEFAULT_GRANULARITY: usize = 128;

/// Configuration for a granular buffer pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferPoolConfig {
    /// Name of the pool, used in log lines
    pub name: String,
    /// Every pooled capacity is a multiple of this
    pub granularity: usize,
    /// Ceiling on bytes held as Free buffers (`None` = unbounded)
    pub max_cached_bytes: Option<usize>,
    /// Ceiling on bytes currently loaned out (`None` = unbounded)
    pub max_acquired_bytes: Option<usize>,
    /// Denials logged unconditionally before rate limiting kicks in
    pub denial_log_burst: u64,
    /// After the burst, log every Nth denial
    pub denial_log_interval: u64,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            granularity: DEFAULT_GRANULARITY,
            max_cached_bytes: None,
            max_acquired_bytes: None,
            denial_log_burst: 10,
            denial_log_interval: 1000,
        }
    }
}

impl BufferPoolConfig {
    /// Create a new configuration with custom name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set granularity
    pub fn with_granularity(mut self, granularity: usize) -> Self {
        self.granularity = granularity;
        self
    }

    /// Bound the cached bytes
    pub fn with_max_cached_bytes(mut self, bytes: Option<usize>) -> Self {
        self.max_cached_bytes = bytes;
        self
    }

    /// Bound the acquired bytes
    pub fn with_max_acquired_bytes(mut self, bytes: Option<usize>) -> Self {
        self.max_acquired_bytes = bytes;
        self
    }

    /// Set denial log rate limiting
    pub fn with_denial_logging(mut self, burst: u64, interval: u64) -> Self {
        self.denial_log_burst = burst;
        self.denial_log_interval = interval;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.granularity == 0 {
            return Err(PayloadError::invalid_parameter(
                "granularity",
                "Granularity cannot be zero",
            ));
        }

        if self.denial_log_interval == 0 {
            return Err(PayloadError::invalid_parameter(
                "denial_log_interval",
                "Denial log interval cannot be zero",
            ));
        }

        if let Some(limit) = self.max_acquired_bytes {
            if limit < self.granularity {
                return Err(PayloadError::invalid_parameter(
                    "max_acquired_bytes",
                    "Acquire bound is smaller than one granule",
                ));
            }
        }

        Ok(())
    }

    /// Round a request up to the pooled capacity; zero maps to one granule.
    ///
    /// `None` when the rounded capacity is larger than any allocation can be.
    pub fn round_up(&self, requested: usize) -> Option<usize> {
        requested
            .div_ceil(self.granularity)
            .max(1)
            .checked_mul(self.granularity)
            .filter(|&capacity| capacity <= isize::MAX as usize)
    }

    /// Parse a TOML document into a validated configuration
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| PayloadError::invalid_parameter("config", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

/// Builder pattern for buffer pool configuration
pub struct BufferPoolConfigBuilder {
    config: BufferPoolConfig,
}

impl BufferPoolConfigBuilder {
    /// Create a new builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            config: BufferPoolConfig::new(name),
        }
    }

    /// Set granularity
    pub fn granularity(mut self, granularity: usize) -> Self {
        self.config.granularity = granularity;
        self
    }

    /// Bound cached bytes
    pub fn max_cached_bytes(mut self, bytes: usize) -> Self {
        self.config.max_cached_bytes = Some(bytes);
        self
    }

    /// Bound acquired bytes
    pub fn max_acquired_bytes(mut self, bytes: usize) -> Self {
        self.config.max_acquired_bytes = Some(bytes);
        self
    }

    /// Unbounded cache
    pub fn unbounded_cache(mut self) -> Self {
        self.config.max_cached_bytes = None;
        self
    }

    /// Unbounded acquisition
    pub fn unbounded_acquire(mut self) -> Self {
        self.config.max_acquired_bytes = None;
        self
    }

    /// Denial log rate limiting
    pub fn denial_logging(mut self, burst: u64, interval: u64) -> Self {
        self.config.denial_log_burst = burst;
        self.config.denial_log_interval = interval;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<BufferPoolConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
