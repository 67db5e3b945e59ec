use crate::codec::CodecKind;
use crate::core::{Result, StoreError};
use std::time::Duration;

/// Key the page has always stored its settings under.
pub const DEFAULT_STORAGE_KEY: &str = "new-tab-data";

/// Quiet window before a burst of updates is written out.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(50);

pub const ENV_STORAGE_KEY: &str = "NEWTAB_STATE_KEY";
pub const ENV_DEBOUNCE_MS: &str = "NEWTAB_STATE_DEBOUNCE_MS";
pub const ENV_CODEC: &str = "NEWTAB_STATE_CODEC";

/// Settings store configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Backend key the record is stored under
    pub storage_key: String,

    /// Quiet window for coalescing writes
    pub debounce: Duration,

    /// Encoding of the stored record
    pub codec: CodecKind,
}

impl StoreConfig {
    pub fn new() -> Self {
        Self {
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            debounce: DEFAULT_DEBOUNCE,
            codec: CodecKind::Json,
        }
    }

    /// Set the backend key
    pub fn storage_key(mut self, key: &str) -> Self {
        self.storage_key = key.to_string();
        self
    }

    /// Set the debounce window
    pub fn debounce(mut self, window: Duration) -> Self {
        self.debounce = window;
        self
    }

    /// Set the record encoding
    pub fn codec(mut self, codec: CodecKind) -> Self {
        self.codec = codec;
        self
    }

    /// Defaults overridden by `NEWTAB_STATE_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::new();

        if let Some(key) = lookup(ENV_STORAGE_KEY) {
            config = config.storage_key(key.trim());
        }

        if let Some(millis) = lookup(ENV_DEBOUNCE_MS) {
            let millis: u64 = millis.trim().parse().map_err(|_| {
                StoreError::InvalidConfig(format!(
                    "{} must be a whole number of milliseconds, got '{}'",
                    ENV_DEBOUNCE_MS, millis
                ))
            })?;
            config = config.debounce(Duration::from_millis(millis));
        }

        if let Some(codec) = lookup(ENV_CODEC) {
            config = config.codec(codec.trim().parse()?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.storage_key.trim().is_empty() {
            return Err(StoreError::InvalidConfig(
                "storage_key cannot be empty".to_string(),
            ));
        }

        if self.debounce.is_zero() {
            return Err(StoreError::InvalidConfig(
                "debounce window must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}
