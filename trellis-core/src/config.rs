//! Runtime Configuration
//!
//! Process-wide knobs read by the reconciler and the hook runtime. The
//! defaults match a debug build: diagnostics are on under
//! `debug_assertions` and off otherwise. Turning diagnostics off never
//! changes structural results, it only silences the warnings.
//!
//! # Example
//!
//! ```rust
//! use trellis_core::{Lane, RuntimeConfig};
//!
//! let config = RuntimeConfig::from_json_str(r#"{ "ambient_lane": "sync" }"#).unwrap();
//! assert_eq!(config.ambient_lane, Lane::SYNC);
//! ```

use std::sync::OnceLock;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fiber::Lane;

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Emit `tracing` warnings for unsupported descriptions and hook
    /// count drift.
    pub diagnostics: bool,

    /// Lane handed out by schedulers for updates triggered outside a
    /// render pass.
    pub ambient_lane: Lane,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            diagnostics: cfg!(debug_assertions),
            ambient_lane: Lane::DEFAULT,
        }
    }
}

static ACTIVE: OnceLock<RwLock<RuntimeConfig>> = OnceLock::new();

fn active() -> &'static RwLock<RuntimeConfig> {
    ACTIVE.get_or_init(|| RwLock::new(RuntimeConfig::default()))
}

impl RuntimeConfig {
    /// Parse a config from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    /// Make this the process-wide configuration.
    pub fn install(self) {
        *active().write() = self;
    }

    /// A copy of the process-wide configuration.
    pub fn current() -> Self {
        active().read().clone()
    }

    /// Whether diagnostics are currently enabled.
    pub fn diagnostics_enabled() -> bool {
        active().read().diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let config = RuntimeConfig::from_json_str("{}").unwrap();
        assert_eq!(config, RuntimeConfig::default());
    }

    #[test]
    fn parses_all_fields() {
        let config =
            RuntimeConfig::from_json_str(r#"{ "diagnostics": false, "ambient_lane": "idle" }"#)
                .unwrap();
        assert!(!config.diagnostics);
        assert_eq!(config.ambient_lane, Lane::IDLE);
    }

    #[test]
    fn rejects_unknown_lane_and_fields() {
        assert!(matches!(
            RuntimeConfig::from_json_str(r#"{ "ambient_lane": "later" }"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_json_str(r#"{ "verbose": true }"#),
            Err(Error::Config(_))
        ));
    }
}
