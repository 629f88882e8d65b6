//! URL frontier shared by crawl workers
//!
//! This module handles:
//! - Breadth-first ordering (depth, then discovery order)
//! - URL uniqueness across queued and already-dequeued entries
//! - The depth cap
//! - Waking idle workers when new work arrives or the crawl drains

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::sync::Mutex;
use tokio::sync::Notify;
use url::Url;

/// A URL waiting to be fetched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    /// Normalized URL
    pub url: Url,

    /// Link distance from the nearest seed
    pub depth: u32,

    /// Page the link was found on; `None` for seeds
    pub discovered_from: Option<Url>,
}

impl FrontierEntry {
    pub fn seed(url: Url) -> Self {
        Self {
            url,
            depth: 0,
            discovered_from: None,
        }
    }

    pub fn discovered(url: Url, depth: u32, from: &Url) -> Self {
        Self {
            url,
            depth,
            discovered_from: Some(from.clone()),
        }
    }
}

#[derive(Debug)]
struct Queued {
    entry: FrontierEntry,
    seq: u64,
}

// BinaryHeap is a max-heap, so compare in reverse to pop the shallowest,
// oldest entry first
impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .entry
            .depth
            .cmp(&self.entry.depth)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for Queued {}

#[derive(Debug, Default)]
struct FrontierState {
    heap: BinaryHeap<Queued>,
    queued: HashSet<String>,
    visited: HashSet<String>,
    in_flight: usize,
    next_seq: u64,
    closed: bool,
}

/// Pending URLs plus the set of URLs already handed out
///
/// All bookkeeping lives behind one mutex, so membership checks and
/// inserts are atomic with respect to concurrent `offer` and `take` calls.
#[derive(Debug)]
pub struct Frontier {
    state: Mutex<FrontierState>,
    max_depth: u32,
    notify: Notify,
}

impl Frontier {
    pub fn new(max_depth: u32) -> Self {
        Self {
            state: Mutex::new(FrontierState::default()),
            max_depth,
            notify: Notify::new(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FrontierState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queues an entry
    ///
    /// Returns false without queuing when the URL is already queued or was
    /// already taken, when the entry is deeper than the cap, or when the
    /// frontier has been closed.
    pub fn offer(&self, entry: FrontierEntry) -> bool {
        if entry.depth > self.max_depth {
            tracing::trace!("Dropping {} at depth {}", entry.url, entry.depth);
            return false;
        }

        let key = entry.url.as_str().to_string();
        {
            let mut state = self.lock();
            if state.closed || state.visited.contains(&key) || state.queued.contains(&key) {
                return false;
            }

            let seq = state.next_seq;
            state.next_seq += 1;
            state.queued.insert(key);
            state.heap.push(Queued { entry, seq });
        }

        self.notify.notify_one();
        true
    }

    /// Removes the next entry in breadth-first order
    ///
    /// The URL moves to the visited set and counts as in flight until
    /// [`Frontier::done`] is called. Returns `None` when nothing is queued.
    pub fn take(&self) -> Option<FrontierEntry> {
        let mut state = self.lock();
        if state.closed {
            return None;
        }

        let Queued { entry, .. } = state.heap.pop()?;
        let key = entry.url.as_str().to_string();
        state.queued.remove(&key);
        state.visited.insert(key);
        state.in_flight += 1;
        Some(entry)
    }

    /// Marks a taken entry as fully processed
    pub fn done(&self) {
        let drained = {
            let mut state = self.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            state.in_flight == 0 && state.heap.is_empty()
        };

        if drained {
            self.notify.notify_waiters();
        } else {
            self.notify.notify_one();
        }
    }

    /// Waits for the next entry
    ///
    /// While the queue is empty but other workers still hold entries, this
    /// waits because they may discover more links. Returns `None` once the
    /// queue is empty with nothing in flight, or after [`Frontier::close`].
    pub async fn next(&self) -> Option<FrontierEntry> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let state = self.lock();
                if state.closed {
                    return None;
                }
                if state.heap.is_empty() && state.in_flight == 0 {
                    return None;
                }
            }

            if let Some(entry) = self.take() {
                return Some(entry);
            }

            notified.await;
        }
    }

    /// Stops handing out entries and wakes every waiting worker
    pub fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_waiters();
    }

    /// Number of queued entries
    pub fn len(&self) -> usize {
        self.lock().heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of URLs handed out so far
    pub fn visited_count(&self) -> usize {
        self.lock().visited.len()
    }

    pub fn is_visited(&self, url: &Url) -> bool {
        self.lock().visited.contains(url.as_str())
    }
}
