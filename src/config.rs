//! Runtime configuration.
//!
//! ```toml
//! batch_size = 5
//! batch_wait_ms = 250
//! allow_updaters = true
//! reconciliation = "patch"
//! ```

use serde::{Deserialize, Serialize};
use web_time::Duration;

use crate::error::{BindError, Result};

/// How a re-rendered node is spliced into the live tree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reconciliation {
    /// Swap the live node for the freshly rendered one.
    #[default]
    Replace,
    /// Walk both trees and patch the live one in place.
    Patch,
}

/// Tunables for the scheduler and reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Queue length at which the whole queue is drained as one batch.
    pub batch_size: usize,
    /// Age of the oldest queued entry at which the queue is batched.
    pub batch_wait_ms: u64,
    /// Accept updater payloads. When false, dispatching one is `InvalidPayload`.
    pub allow_updaters: bool,
    pub reconciliation: Reconciliation,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            batch_size: 5,
            batch_wait_ms: 250,
            allow_updaters: true,
            reconciliation: Reconciliation::Replace,
        }
    }
}

impl RuntimeConfig {
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    #[must_use]
    pub fn with_batch_wait(mut self, wait: Duration) -> Self {
        self.batch_wait_ms = wait.as_millis().min(u64::MAX as u128) as u64;
        self
    }

    #[must_use]
    pub fn with_updaters(mut self, allow: bool) -> Self {
        self.allow_updaters = allow;
        self
    }

    #[must_use]
    pub fn with_reconciliation(mut self, reconciliation: Reconciliation) -> Self {
        self.reconciliation = reconciliation;
        self
    }

    pub fn batch_wait(&self) -> Duration {
        Duration::from_millis(self.batch_wait_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(BindError::invalid("batch_size must be at least 1"));
        }
        Ok(())
    }

    /// Parse and validate a TOML document. Missing fields take defaults.
    #[cfg(feature = "policy-config")]
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| BindError::invalid(format!("runtime config: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.batch_wait(), Duration::from_millis(250));
        assert!(config.allow_updaters);
        assert_eq!(config.reconciliation, Reconciliation::Replace);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_batch_size_is_invalid() {
        let config = RuntimeConfig::default().with_batch_size(0);
        assert!(matches!(
            config.validate(),
            Err(BindError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_serde_partial_document() {
        let config: RuntimeConfig =
            serde_json::from_str(r#"{"reconciliation": "patch", "batch_size": 2}"#).unwrap();
        assert_eq!(
            config,
            RuntimeConfig::default()
                .with_batch_size(2)
                .with_reconciliation(Reconciliation::Patch)
        );
    }

    #[cfg(feature = "policy-config")]
    #[test]
    fn test_from_toml_str() {
        let config = RuntimeConfig::from_toml_str("batch_wait_ms = 10\nallow_updaters = false\n").unwrap();
        assert_eq!(config.batch_wait_ms, 10);
        assert!(!config.allow_updaters);

        assert!(RuntimeConfig::from_toml_str("batch_size = 0").is_err());
    }
}
