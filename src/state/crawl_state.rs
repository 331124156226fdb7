/// Crawl run state definitions
///
/// A crawl moves `Idle → Running → {Completed, Cancelled, Failed}`.
use serde::Serialize;
use std::fmt;

/// Represents the lifecycle state of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CrawlState {
    /// No crawl has been started on this orchestrator
    Idle,

    /// A crawl worker is traversing sources
    Running,

    /// Every source was traversed
    Completed,

    /// Stopped at a checkpoint after a cancellation request
    Cancelled,

    /// Aborted by an unrecoverable error
    Failed,
}

impl CrawlState {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }

    /// Returns true if the transition `self -> next` is allowed
    pub fn can_transition_to(&self, next: CrawlState) -> bool {
        match (self, next) {
            (Self::Running, next) => next.is_terminal(),
            (current, Self::Running) => !current.is_running(),
            _ => false,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Converts the state to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    /// Parses a state from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for CrawlState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

impl Default for CrawlState {
    fn default() -> Self {
        Self::Idle
    }
}
