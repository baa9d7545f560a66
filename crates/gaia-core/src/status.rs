//! Daemon lifecycle status.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Coarse-grained daemon state.
///
/// Transitions: `Uninitialized -> Locked` (init + restart), `Locked <->
/// Unlocked` (unlock/lock), `Locked | Unlocked -> Stopped` (stop). Only a
/// process restart leaves `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DaemonStatus {
    /// No database file on disk; only init is valid.
    Uninitialized,
    /// Listener running, master key not in memory.
    Locked,
    /// Master key and CA key in memory; all operations permitted.
    Unlocked,
    /// Listener shut down; database closed.
    Stopped,
}

impl DaemonStatus {
    /// Stable string form used in status responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            DaemonStatus::Uninitialized => "uninitialized",
            DaemonStatus::Locked => "locked",
            DaemonStatus::Unlocked => "unlocked",
            DaemonStatus::Stopped => "stopped",
        }
    }
}

impl fmt::Display for DaemonStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_forms_are_stable() {
        assert_eq!(DaemonStatus::Uninitialized.as_str(), "uninitialized");
        assert_eq!(DaemonStatus::Locked.as_str(), "locked");
        assert_eq!(DaemonStatus::Unlocked.as_str(), "unlocked");
        assert_eq!(DaemonStatus::Stopped.as_str(), "stopped");
    }

    #[test]
    fn display_matches_as_str() {
        assert_eq!(DaemonStatus::Locked.to_string(), "locked");
    }
}
