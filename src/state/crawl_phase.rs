//! Orchestrator state machine
//!
//! A crawl moves strictly forward: `Idle -> Running -> Draining -> Done`.

use std::fmt;

/// Represents the current phase of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    /// Coordinator is built but the loop has not started
    Idle,

    /// Workers are taking entries from the frontier and processing them
    Running,

    /// No more work will be taken; buffered documents are being flushed
    Draining,

    /// Terminal phase, the report is final
    Done,
}

impl CrawlPhase {
    /// Returns true while workers may still take frontier entries
    pub fn accepts_work(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Checks whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Running)
                | (Self::Running, Self::Draining)
                | (Self::Draining, Self::Done)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Draining => "draining",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
