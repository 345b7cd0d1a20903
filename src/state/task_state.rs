/// Task state definitions for tracking download progress
use std::fmt;

/// Represents the current state of a download task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    // ===== Active States =====
    /// Task was submitted and waits for a download slot
    Pending,

    /// Task holds a slot and is talking to the portal
    Running,

    // ===== Terminal States =====
    /// File was written (or would have been, under dry-run)
    Saved,

    /// File was deliberately not written (filtered, already present, duplicate)
    Skipped,

    /// Transport, HTTP or file system error
    Failed,
}

impl TaskState {
    /// Returns true if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Saved => "saved",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }

    /// Returns all terminal states, in report order
    pub fn terminal_states() -> [Self; 3] {
        [Self::Saved, Self::Skipped, Self::Failed]
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
