use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure for Driftnet
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub index: IndexConfig,
    pub storage: StorageConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Starting URLs for the crawl
    pub seed_urls: Vec<String>,

    /// Maximum number of page fetches in one run
    pub max_pages: usize,

    /// Maximum link depth from a seed; deeper entries are dropped
    pub max_depth: u32,

    /// Minimum seconds between requests to the same host
    pub crawl_delay: f64,

    /// Seconds before a fetch is abandoned
    pub request_timeout: u64,

    /// Identifying user agent sent on every request
    pub user_agent: String,

    /// Number of concurrent crawl workers
    pub concurrency: usize,

    /// Response bodies beyond this size are truncated
    pub max_body_bytes: usize,

    /// Optional wall-clock deadline for the whole crawl, in seconds
    pub deadline: Option<u64>,

    /// Pages with fewer extracted characters are flagged low-value
    pub min_content_chars: usize,

    /// Extracted content is truncated to this many characters
    pub max_content_chars: usize,

    /// Drop low-value documents instead of indexing them
    pub skip_low_value: bool,

    /// Backoff before the single retry of a transient fetch failure (milliseconds)
    pub retry_backoff_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            seed_urls: Vec::new(),
            max_pages: 50,
            max_depth: 3,
            crawl_delay: 1.0,
            request_timeout: 15,
            user_agent: "SearchEngine-Crawler/1.0".to_string(),
            concurrency: 1,
            max_body_bytes: 2 * 1024 * 1024,
            deadline: None,
            min_content_chars: 100,
            max_content_chars: 5000,
            skip_low_value: false,
            retry_backoff_ms: 500,
        }
    }
}

impl CrawlerConfig {
    /// Minimum interval between requests to one host
    pub fn crawl_delay_duration(&self) -> Duration {
        Duration::from_secs_f64(self.crawl_delay.max(0.0))
    }

    /// Per-request timeout
    pub fn request_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

/// Search engine connection and batching configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct IndexConfig {
    /// Base endpoint of the Meilisearch instance
    pub url: String,

    /// Write credential; never written to logs or hashed
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Target index uid
    pub name: String,

    /// Documents per bulk upsert
    pub batch_size: usize,

    /// Seconds a partial batch may wait before it is delivered
    pub batch_window: u64,

    /// Retries after a failed delivery before the batch is dropped; 0 sends once
    pub max_retries: u32,

    /// Base backoff between delivery attempts (milliseconds)
    pub retry_backoff_ms: u64,

    /// Seconds to wait for an enqueued indexing task to finish
    pub task_timeout: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            url: "http://meilisearch:7700".to_string(),
            api_key: None,
            name: "documents".to_string(),
            batch_size: 10,
            batch_window: 30,
            max_retries: 3,
            retry_backoff_ms: 1000,
            task_timeout: 60,
        }
    }
}

/// Local state configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StorageConfig {
    /// Path to the SQLite database holding run history and fingerprints
    pub database_path: Option<String>,

    /// Load content fingerprints from earlier runs and save them afterwards
    pub persist_fingerprints: bool,
}
