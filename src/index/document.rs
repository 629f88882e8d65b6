//! Documents delivered to the search engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

/// A normalized page ready for indexing
///
/// `id` is derived from the normalized URL only, so re-crawling the same
/// URL replaces the existing engine document instead of adding another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub content: String,
    pub url: String,
    /// Fetch time in unix seconds
    pub timestamp: i64,
    pub word_count: usize,
    pub content_hash: String,
    pub low_value: bool,
}

impl Document {
    /// Builds a document for `url`, computing its id and content fingerprint
    pub fn new(
        url: &Url,
        title: impl Into<String>,
        content: impl Into<String>,
        low_value: bool,
        fetched_at: DateTime<Utc>,
    ) -> Self {
        let content = content.into();
        Self {
            id: document_id(url),
            title: title.into(),
            word_count: content.split_whitespace().count(),
            content_hash: content_fingerprint(&content),
            content,
            url: url.to_string(),
            timestamp: fetched_at.timestamp(),
            low_value,
        }
    }
}

/// Hex SHA-256 of the normalized URL
pub fn document_id(url: &Url) -> String {
    hex::encode(Sha256::digest(url.as_str().as_bytes()))
}

/// Hex SHA-256 of the content with all whitespace runs collapsed to one space
pub fn content_fingerprint(content: &str) -> String {
    let collapsed = content.split_whitespace().collect::<Vec<_>>().join(" ");
    hex::encode(Sha256::digest(collapsed.as_bytes()))
}
