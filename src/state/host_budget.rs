use std::time::{Duration, Instant};

/// Tracks pacing for a single host during crawling
///
/// Only the politeness controller reads or mutates a `HostBudget`; it is
/// updated before and after every permitted request to the host.
#[derive(Debug, Clone)]
pub struct HostBudget {
    /// Number of requests permitted to this host in the current crawl
    pub request_count: u32,

    /// Timestamp of the last permitted request to this host
    pub last_request_time: Option<Instant>,

    /// Minimum spacing between two permitted requests
    pub min_interval: Duration,
}

impl HostBudget {
    /// Creates a new HostBudget with the given minimum interval
    pub fn new(min_interval: Duration) -> Self {
        Self {
            request_count: 0,
            last_request_time: None,
            min_interval,
        }
    }

    /// Checks if a request can be made to this host at `now`
    pub fn can_request(&self, now: Instant) -> bool {
        self.time_until_next_request(now).is_none()
    }

    /// Records that a request was permitted at `now`
    pub fn record_request(&mut self, now: Instant) {
        self.request_count += 1;
        self.last_request_time = Some(now);
    }

    /// Calculates the time until the next request can be made
    ///
    /// Returns None if a request can be made now, or the duration to wait otherwise.
    pub fn time_until_next_request(&self, now: Instant) -> Option<Duration> {
        let last = self.last_request_time?;
        let elapsed = now.saturating_duration_since(last);
        if elapsed < self.min_interval {
            Some(self.min_interval - elapsed)
        } else {
            None
        }
    }

    /// Raises the minimum interval, e.g. to honor a robots.txt crawl delay
    ///
    /// The interval never shrinks below what was configured.
    pub fn raise_min_interval(&mut self, interval: Duration) {
        if interval > self.min_interval {
            self.min_interval = interval;
        }
    }
}
