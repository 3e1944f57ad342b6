//! Board configuration.
//!
//! Everything a deployment tunes lives here: polling cadence, the
//! full-refresh cycle, the priority tie-break direction, and the
//! simultaneous-group cap. Loadable from TOML with per-field defaults, so a
//! partial file configures only what it names.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::order::PriorityDirection;

/// Tunables for one board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Seconds between change-feed polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Every Nth tick fetches a full snapshot instead of a diff.
    #[serde(default = "default_full_refresh_after")]
    pub full_refresh_after: u32,
    /// Consecutive failed diff windows tolerated before forcing a full
    /// refresh (bounds the re-fetch window after outages).
    #[serde(default = "default_max_missed_windows")]
    pub max_missed_windows: u32,
    /// Which end of the priority scale is "more urgent".
    #[serde(default)]
    pub priority_direction: PriorityDirection,
    /// Maximum number of simultaneously shown groups; `None` = unlimited.
    #[serde(default)]
    pub group_cap: Option<usize>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self::taskboard()
    }
}

impl BoardConfig {
    /// Taskboard defaults: frequent small diffs, rare full refreshes.
    #[must_use]
    pub const fn taskboard() -> Self {
        Self {
            poll_interval_secs: 5,
            full_refresh_after: 120,
            max_missed_windows: default_max_missed_windows(),
            priority_direction: PriorityDirection::LowerFirst,
            group_cap: None,
        }
    }

    /// Backlog defaults: slow cadence, every tick a full refresh, at most
    /// four milestones shown at once.
    #[must_use]
    pub const fn backlog() -> Self {
        Self {
            poll_interval_secs: 600,
            full_refresh_after: 1,
            max_missed_windows: default_max_missed_windows(),
            priority_direction: PriorityDirection::LowerFirst,
            group_cap: Some(4),
        }
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading board config from {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing board config {}", path.display()))
    }
}

const fn default_poll_interval() -> u64 {
    5
}

const fn default_full_refresh_after() -> u32 {
    120
}

const fn default_max_missed_windows() -> u32 {
    3
}
