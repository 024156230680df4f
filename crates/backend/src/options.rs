//! Backend open options and the transient-contention retry policy.

use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use snafu::Snafu;

/// Minimum redb cache size: 1 MB.
const MIN_CACHE_SIZE_BYTES: usize = 1024 * 1024;

/// Configuration validation error.
///
/// Returned when a configuration value is outside its valid range or
/// violates a cross-field constraint.
#[derive(Debug, Snafu)]
pub enum ConfigError {
    /// A configuration value is invalid.
    #[snafu(display("invalid config: {message}"))]
    Validation {
        /// Description of the validation failure.
        message: String,
    },
}

/// Retry policy for reads and writes that fail with transient contention.
///
/// Backoff doubles from `initial_backoff` up to `max_backoff`. With
/// `max_attempts` unset the operation is retried until it succeeds or fails with
/// a non-transient error.
///
/// # Validation Rules
///
/// - `initial_backoff` and `max_backoff` must be non-zero
/// - `initial_backoff` must be <= `max_backoff`
/// - `max_attempts`, when set, must be >= 1
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    #[serde(default = "default_initial_backoff")]
    #[serde(with = "humantime_serde")]
    #[schemars(with = "String")]
    pub initial_backoff: Duration,
    /// Upper bound on the delay between retries.
    #[serde(default = "default_max_backoff")]
    #[serde(with = "humantime_serde")]
    #[schemars(with = "String")]
    pub max_backoff: Duration,
    /// Total attempts before giving up, including the first. `None` retries
    /// without bound.
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

#[bon::bon]
impl RetryPolicy {
    /// Creates a retry policy with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any rule above is violated.
    #[builder]
    pub fn new(
        #[builder(default = default_initial_backoff())] initial_backoff: Duration,
        #[builder(default = default_max_backoff())] max_backoff: Duration,
        max_attempts: Option<u32>,
    ) -> Result<Self, ConfigError> {
        let policy = Self { initial_backoff, max_backoff, max_attempts };
        policy.validate()?;
        Ok(policy)
    }
}

impl RetryPolicy {
    /// Validates the policy values.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_backoff.is_zero() || self.max_backoff.is_zero() {
            return Err(ConfigError::Validation {
                message: "retry backoff durations must be non-zero".to_string(),
            });
        }
        if self.initial_backoff > self.max_backoff {
            return Err(ConfigError::Validation {
                message: format!(
                    "initial_backoff ({:?}) must be <= max_backoff ({:?})",
                    self.initial_backoff, self.max_backoff
                ),
            });
        }
        if self.max_attempts == Some(0) {
            return Err(ConfigError::Validation {
                message: "max_attempts must be >= 1 when set".to_string(),
            });
        }
        Ok(())
    }

    /// Delay to wait after the given 1-based failed attempt.
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1 << shift).min(self.max_backoff)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: default_initial_backoff(),
            max_backoff: default_max_backoff(),
            max_attempts: None,
        }
    }
}

fn default_initial_backoff() -> Duration {
    Duration::from_millis(1)
}

fn default_max_backoff() -> Duration {
    Duration::from_millis(100)
}

/// Options applied when a backend engine is opened.
///
/// # Example
///
/// ```no_run
/// # use dbarray_backend::BackendOptions;
/// let options = BackendOptions::builder()
///     .cache_size_bytes(256 * 1024 * 1024)
///     .build()
///     .expect("valid backend options");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BackendOptions {
    /// Page cache size for engines that take one (redb). Must be >= 1 MB.
    #[serde(default = "default_cache_size")]
    pub cache_size_bytes: usize,
    /// Retry policy for transient contention.
    #[serde(default)]
    pub retry: RetryPolicy,
}

#[bon::bon]
impl BackendOptions {
    /// Creates backend options with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if `cache_size_bytes` < 1 MB or the
    /// retry policy is invalid.
    #[builder]
    pub fn new(
        #[builder(default = default_cache_size())] cache_size_bytes: usize,
        #[builder(default)] retry: RetryPolicy,
    ) -> Result<Self, ConfigError> {
        let options = Self { cache_size_bytes, retry };
        options.validate()?;
        Ok(options)
    }
}

impl BackendOptions {
    /// Validates the option values.
    ///
    /// Call after deserialization to ensure values are within valid ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any value is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_size_bytes < MIN_CACHE_SIZE_BYTES {
            return Err(ConfigError::Validation {
                message: format!(
                    "cache_size_bytes must be >= {} (1 MB), got {}",
                    MIN_CACHE_SIZE_BYTES, self.cache_size_bytes
                ),
            });
        }
        self.retry.validate()
    }
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self { cache_size_bytes: default_cache_size(), retry: RetryPolicy::default() }
    }
}

fn default_cache_size() -> usize {
    64 * 1024 * 1024 // 64 MB
}

/// Duration serialization using humantime format.
mod humantime_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
