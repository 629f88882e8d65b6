//! Storage traits and error types

use crate::storage::{RunRecord, RunStatus, RunSummary};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Stores the crawl history and the content fingerprints that let
/// deduplication span runs.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new crawl run in the `running` status
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Fingerprint of the effective configuration
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Lists the most recent runs, newest first
    fn list_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>>;

    /// Marks a run finished with its final status and counters
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        summary: &RunSummary,
    ) -> StorageResult<()>;

    /// Marks runs left in `running` by a crashed process as interrupted
    ///
    /// Returns how many runs were updated.
    fn mark_stale_runs_interrupted(&mut self) -> StorageResult<usize>;

    // ===== Fingerprints =====

    /// Loads every stored fingerprint with the time it was last seen
    fn load_fingerprints(&self) -> StorageResult<Vec<(String, DateTime<Utc>)>>;

    /// Inserts or refreshes fingerprints in a single transaction
    fn save_fingerprints(&mut self, entries: &[(String, String, DateTime<Utc>)])
        -> StorageResult<()>;

    /// Deletes all stored fingerprints
    fn clear_fingerprints(&mut self) -> StorageResult<()>;

    /// Counts stored fingerprints
    fn count_fingerprints(&self) -> StorageResult<u64>;
}
