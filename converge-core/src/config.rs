//! Reconciler configuration.
//!
//! Loaded from a JSON file; every field has a default so an empty object is
//! a valid configuration:
//!
//! ```json
//! {
//!   "default_poll": { "max_attempts": 10, "backoff": { "kind": "exponential", "initial_ms": 500, "max_ms": 5000 } },
//!   "poll": { "gcp": { "max_attempts": 20, "backoff": { "kind": "fixed", "interval_ms": 2000 } } },
//!   "update_recheck": { "max_attempts": 3, "backoff": { "kind": "fixed", "interval_ms": 1000 } },
//!   "import_default_variant": "aws"
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::poll::PollPolicy;
use crate::state::Variant;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Visibility polling after create and import.
    pub default_poll: PollPolicy,
    /// Per-variant overrides of `default_poll`.
    pub poll: HashMap<Variant, PollPolicy>,
    /// Re-read after an in-place update.
    pub update_recheck: PollPolicy,
    /// Variant assumed when an imported ID carries none.
    pub import_default_variant: Option<Variant>,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            default_poll: PollPolicy::create_default(),
            poll: HashMap::new(),
            update_recheck: PollPolicy::recheck_default(),
            import_default_variant: None,
        }
    }
}

impl ReconcilerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for variant in self.poll.keys() {
            if !Variant::is_valid_tag(variant.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "poll override for invalid variant {variant:?}"
                )));
            }
        }
        if let Some(variant) = &self.import_default_variant
            && !Variant::is_valid_tag(variant.as_str())
        {
            return Err(ConfigError::Invalid(format!(
                "invalid import_default_variant {variant:?}"
            )));
        }
        Ok(())
    }

    /// Poll policy used after creating or importing `variant`.
    pub fn poll_policy(&self, variant: &Variant) -> &PollPolicy {
        self.poll.get(variant).unwrap_or(&self.default_poll)
    }

    pub fn with_poll(mut self, variant: Variant, policy: PollPolicy) -> Self {
        self.poll.insert(variant, policy);
        self
    }
}
