//! Content fingerprint registry

use crate::index::Document;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone)]
struct Seen {
    url: String,
    at: DateTime<Utc>,
    /// Recorded during this run, as opposed to loaded from storage
    fresh: bool,
}

/// Suppresses documents whose content was already indexed
///
/// Works on `Document::content_hash`, independent of the URL-level
/// uniqueness the frontier already guarantees.
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: Mutex<HashMap<String, Seen>>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry pre-loaded with fingerprints from earlier runs
    pub fn with_fingerprints<I>(fingerprints: I) -> Self
    where
        I: IntoIterator<Item = (String, DateTime<Utc>)>,
    {
        let seen = fingerprints
            .into_iter()
            .map(|(hash, at)| {
                (
                    hash,
                    Seen {
                        url: String::new(),
                        at,
                        fresh: false,
                    },
                )
            })
            .collect();
        Self {
            seen: Mutex::new(seen),
        }
    }

    /// Returns true and records the fingerprint if the content is new
    ///
    /// Check and insert happen under one lock, so two workers holding the
    /// same content cannot both get `true`.
    pub fn should_index(&self, document: &Document) -> bool {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(previous) = seen.get(&document.content_hash) {
            tracing::debug!(
                "Duplicate content at {} (first seen {} at {})",
                document.url,
                if previous.url.is_empty() { "in an earlier run" } else { previous.url.as_str() },
                previous.at
            );
            return false;
        }

        seen.insert(
            document.content_hash.clone(),
            Seen {
                url: document.url.clone(),
                at: Utc::now(),
                fresh: true,
            },
        );
        true
    }

    /// Number of known fingerprints
    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops fingerprints recorded this run for content that never reached the index
    ///
    /// Fingerprints loaded from storage are kept. Returns how many were removed.
    pub fn release(&self, hashes: &[String]) -> usize {
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        let mut released = 0;
        for hash in hashes {
            if seen.get(hash).is_some_and(|s| s.fresh) {
                seen.remove(hash);
                released += 1;
            }
        }
        released
    }

    /// Fingerprints recorded during this run as `(hash, url, seen_at)`
    pub fn fresh_fingerprints(&self) -> Vec<(String, String, DateTime<Utc>)> {
        let seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());
        seen.iter()
            .filter(|(_, s)| s.fresh)
            .map(|(hash, s)| (hash.clone(), s.url.clone(), s.at))
            .collect()
    }
}
