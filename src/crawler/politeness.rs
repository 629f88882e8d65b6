//! Per-host pacing and robots.txt compliance
//!
//! This module handles:
//! - Minimum spacing between requests to the same host
//! - Cached robots.txt decisions for the configured user agent
//! - Honoring robots.txt `Crawl-delay`

use crate::config::CrawlerConfig;
use crate::robots::{fetch_robots, RobotsCache};
use crate::state::HostBudget;
use crate::url::host_key;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::Mutex as AsyncMutex;
use url::Url;

/// Upper bound applied to robots.txt crawl delays
const MAX_ROBOTS_DELAY: Duration = Duration::from_secs(60);

/// Gatekeeper consulted before every page fetch
pub struct Politeness {
    client: Client,
    user_agent: String,
    base_interval: Duration,
    robots_max_bytes: usize,
    robots: RobotsCache,
    hosts: Mutex<HashMap<String, Arc<AsyncMutex<HostBudget>>>>,
}

impl Politeness {
    /// Creates a controller that fetches robots.txt with `client`
    pub fn new(client: Client, config: &CrawlerConfig) -> Self {
        Self {
            client,
            user_agent: config.user_agent.clone(),
            base_interval: config.crawl_delay_duration(),
            robots_max_bytes: config.max_body_bytes,
            robots: RobotsCache::new(),
            hosts: Mutex::new(HashMap::new()),
        }
    }

    fn budget(&self, host: &str) -> Arc<AsyncMutex<HostBudget>> {
        let mut hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
        hosts
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(HostBudget::new(self.base_interval))))
            .clone()
    }

    /// Waits until `host` may receive another request, then records it
    ///
    /// The host's budget stays locked while waiting, so concurrent callers
    /// for the same host pass one at a time, each at least the minimum
    /// interval after the previous one. Different hosts never wait on
    /// each other.
    pub async fn permit(&self, host: &str) {
        let budget = self.budget(host);
        let mut budget = budget.lock().await;

        if let Some(wait) = budget.time_until_next_request(Instant::now()) {
            tracing::trace!("Waiting {:?} before next request to {}", wait, host);
            tokio::time::sleep(wait).await;
        }

        budget.record_request(Instant::now());
    }

    /// Checks robots.txt for `url`, fetching it on the host's first encounter
    ///
    /// URLs without a host are never allowed. Robots fetch failures allow
    /// everything.
    pub async fn is_allowed(&self, url: &Url) -> bool {
        let Some(host) = host_key(url) else {
            return false;
        };

        let cached = self
            .robots
            .get_or_fetch(&host, || {
                fetch_robots(&self.client, url, self.robots_max_bytes)
            })
            .await;

        if let Some(delay) = cached.rules.crawl_delay(&self.user_agent) {
            if let Ok(delay) = Duration::try_from_secs_f64(delay) {
                let delay = delay.min(MAX_ROBOTS_DELAY);
                let budget = self.budget(&host);
                let mut budget = budget.lock().await;
                if delay > budget.min_interval {
                    tracing::debug!("Using robots.txt crawl delay {:?} for {}", delay, host);
                    budget.raise_min_interval(delay);
                }
            }
        }

        let allowed = cached.rules.is_allowed(url.as_str(), &self.user_agent);
        if !allowed {
            tracing::debug!("Disallowed by robots.txt: {}", url);
        }
        allowed
    }

    /// Current minimum interval for `host`, if it has been seen
    pub async fn min_interval(&self, host: &str) -> Option<Duration> {
        let budget = {
            let hosts = self.hosts.lock().unwrap_or_else(|e| e.into_inner());
            hosts.get(host).cloned()
        }?;
        let budget = budget.lock().await;
        Some(budget.min_interval)
    }

    /// Number of hosts with a cached robots.txt decision
    pub fn robots_cached(&self) -> usize {
        self.robots.len()
    }
}
