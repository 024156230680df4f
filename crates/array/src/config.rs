//! Array store configuration.

use dbarray_backend::{BackendKind, BackendOptions, ConfigError};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How an array store is opened.
///
/// `backend` is the requested kind; an existing store written by another
/// kind still opens with that kind.
///
/// # Example
///
/// ```no_run
/// # use dbarray::{ArrayConfig, BackendKind, DbArray};
/// let config = ArrayConfig::builder()
///     .backend(BackendKind::Sqlite)
///     .build()
///     .expect("valid array config");
/// let array = DbArray::open_with_config("/tmp/features".as_ref(), &config)?;
/// # Ok::<(), dbarray::Error>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ArrayConfig {
    /// Requested backend kind for new stores.
    #[serde(default)]
    pub backend: BackendKind,
    /// Options passed to the backend engine.
    #[serde(default)]
    pub options: BackendOptions,
}

#[bon::bon]
impl ArrayConfig {
    /// Creates an array config with validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if the backend options are invalid.
    #[builder]
    pub fn new(
        #[builder(default)] backend: BackendKind,
        #[builder(default)] options: BackendOptions,
    ) -> Result<Self, ConfigError> {
        let config = Self { backend, options };
        config.validate()?;
        Ok(config)
    }
}

impl ArrayConfig {
    /// Validates the config.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if the backend options are invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.options.validate()
    }
}
