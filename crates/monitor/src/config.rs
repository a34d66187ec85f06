//! Monitor configuration
//!
//! Plain serde struct with per-field defaults, loadable from a TOML string
//! or file so applications can ship a `monitor.toml` next to their own
//! config.
//!
//! # Example
//!
//! ```toml
//! # Milliseconds between scheduled checks; 0 = on-demand only
//! check_interval_ms = 5000
//!
//! # Run a repair pass whenever a check finds violations
//! auto_repair = true
//!
//! # Restrict auto-repair to error-severity violations
//! repair_errors_only = true
//!
//! # Ring-buffer capacities
//! max_snapshots = 10
//! max_history = 100
//! ```

use planar_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

fn default_repair_errors_only() -> bool {
    true
}

fn default_max_snapshots() -> usize {
    10
}

fn default_max_history() -> usize {
    100
}

/// Configuration for a [`ConsistencyMonitor`](crate::ConsistencyMonitor)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Milliseconds between scheduled checks; 0 = on-demand only
    #[serde(default)]
    pub check_interval_ms: u64,
    /// Run a repair pass whenever a check finds violations
    #[serde(default)]
    pub auto_repair: bool,
    /// Restrict auto-repair to error-severity violations
    #[serde(default = "default_repair_errors_only")]
    pub repair_errors_only: bool,
    /// Snapshot ring-buffer capacity (oldest evicted first)
    #[serde(default = "default_max_snapshots")]
    pub max_snapshots: usize,
    /// Event-history ring-buffer capacity
    #[serde(default = "default_max_history")]
    pub max_history: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: 0,
            auto_repair: false,
            repair_errors_only: true,
            max_snapshots: default_max_snapshots(),
            max_history: default_max_history(),
        }
    }
}

impl MonitorConfig {
    /// The scheduled check interval; `None` when on-demand only
    pub fn check_interval(&self) -> Option<Duration> {
        (self.check_interval_ms > 0).then(|| Duration::from_millis(self.check_interval_ms))
    }

    /// Parse a configuration from TOML text
    ///
    /// # Errors
    /// Returns [`Error::Config`] on malformed TOML.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load a configuration from a TOML file
    ///
    /// # Errors
    /// Returns [`Error::Config`] when the file is unreadable or malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_toml_str(&text)
    }
}
