//! Drain coordinator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{DrainError, DrainResult};

/// Default delay between drain checks
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Drain configuration
///
/// `timeout` has no default: callers decide how long shutdown may wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainConfig {
    /// Maximum time to wait for in-flight requests once shutdown starts
    pub timeout: Duration,
    /// Delay between successive emptiness checks while draining
    #[serde(default = "default_poll_interval")]
    pub poll_interval: Duration,
}

const fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

impl DrainConfig {
    /// Create a configuration with the default poll interval
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Create a configuration from a timeout in (fractional) seconds
    pub fn from_secs_f64(timeout_secs: f64) -> DrainResult<Self> {
        if !timeout_secs.is_finite() || timeout_secs < 0.0 {
            return Err(DrainError::configuration_with_key(
                format!("timeout must be a finite, non-negative number of seconds, got {timeout_secs}"),
                "timeout",
            ));
        }
        Ok(Self::new(Duration::from_secs_f64(timeout_secs)))
    }

    /// Check the configuration invariants
    pub fn validate(&self) -> DrainResult<()> {
        if self.poll_interval.is_zero() {
            return Err(DrainError::configuration_with_key(
                "poll interval must be greater than zero",
                "poll_interval",
            ));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub structured: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            structured: false,
        }
    }
}

/// Drain configuration builder
#[derive(Debug)]
pub struct DrainConfigBuilder {
    /// Configuration being built
    config: DrainConfig,
}

impl DrainConfigBuilder {
    /// Start a builder with the required timeout
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            config: DrainConfig::new(timeout),
        }
    }

    /// Set the drain timeout
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the poll interval
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> DrainResult<DrainConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
