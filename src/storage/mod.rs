//! Local crawl state in SQLite
//!
//! Two things outlive a process: the run history (one row per crawl with
//! its configuration hash and outcome counters) and, when enabled, the
//! content fingerprint registry used for cross-run deduplication.

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use std::fmt;

/// One row of the run history
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    /// RFC 3339 timestamps
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub summary: RunSummary,
}

impl RunRecord {
    pub fn is_finished(&self) -> bool {
        self.status != RunStatus::Running
    }
}

/// Outcome counters stored with a finished run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub pages_fetched: u64,
    pub documents_indexed: u64,
    pub documents_skipped: u64,
    pub documents_dropped: u64,
}

/// Lifecycle of a stored run
///
/// Runs start `running`. A run still `running` when the next process
/// starts was cut short and is marked `interrupted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    const ALL: [RunStatus; 4] = [
        RunStatus::Running,
        RunStatus::Completed,
        RunStatus::Interrupted,
        RunStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    /// Reads a status column; unknown values yield `None`
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == value)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
