//! Per-run robots.txt cache
//!
//! Each host's robots.txt is fetched at most once per run. Concurrent
//! lookups for the same host wait on the same in-flight fetch.

use crate::robots::ParsedRobots;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;

/// Robots.txt rules for one host together with when they were fetched
#[derive(Debug, Clone)]
pub struct CachedRobots {
    /// The parsed robots.txt content
    pub rules: ParsedRobots,

    /// When the robots.txt was fetched
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    /// Creates a new CachedRobots stamped with the current time
    pub fn new(rules: ParsedRobots) -> Self {
        Self {
            rules,
            fetched_at: Utc::now(),
        }
    }
}

/// Host-keyed cache of robots.txt decisions, valid for the whole run
#[derive(Debug, Default)]
pub struct RobotsCache {
    entries: Mutex<HashMap<String, Arc<OnceCell<Arc<CachedRobots>>>>>,
}

impl RobotsCache {
    /// Creates an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached rules for `host`, running `fetch` on first encounter
    ///
    /// `fetch` runs at most once per host even when called concurrently.
    pub async fn get_or_fetch<F, Fut>(&self, host: &str, fetch: F) -> Arc<CachedRobots>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ParsedRobots>,
    {
        let cell = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            entries.entry(host.to_string()).or_default().clone()
        };

        cell.get_or_init(|| async { Arc::new(CachedRobots::new(fetch().await)) })
            .await
            .clone()
    }

    /// Returns the cached rules for `host` without fetching
    pub fn get(&self, host: &str) -> Option<Arc<CachedRobots>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(host).and_then(|cell| cell.get().cloned())
    }

    /// Number of hosts with a resolved robots.txt decision
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.values().filter(|cell| cell.initialized()).count()
    }

    /// Returns true if no host has been resolved yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
