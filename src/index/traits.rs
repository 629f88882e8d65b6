//! Search engine collaborator interface

use crate::index::Document;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by search engine calls
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Engine returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Indexing task {uid} failed: {message}")]
    TaskFailed { uid: u64, message: String },

    #[error("Indexing task {0} did not finish in time")]
    TaskTimeout(u64),

    #[error("Unexpected engine response: {0}")]
    InvalidResponse(String),

    #[error("Search query cannot be empty")]
    EmptyQuery,

    #[error("Invalid engine configuration: {0}")]
    Configuration(String),
}

impl IndexError {
    /// Whether repeating the same call could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_connect() || e.is_timeout() || e.is_request() || e.is_body(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::TaskTimeout(_) => true,
            _ => false,
        }
    }
}

/// A ranked search request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub q: String,
    pub limit: usize,
}

impl SearchQuery {
    pub const DEFAULT_LIMIT: usize = 20;

    /// Creates a query, rejecting blank text
    pub fn new(q: impl Into<String>, limit: Option<usize>) -> Result<Self, IndexError> {
        let q = q.into();
        if q.trim().is_empty() {
            return Err(IndexError::EmptyQuery);
        }
        let limit = limit.filter(|l| *l > 0).unwrap_or(Self::DEFAULT_LIMIT);
        Ok(Self { q, limit })
    }
}

/// One ranked result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub title: String,
    pub content: String,
    pub url: String,
    /// Relevance reported by the engine, higher is better
    pub score: f64,
}

/// Operations the pipeline needs from a search engine
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Checks that the engine is reachable and healthy
    async fn health(&self) -> Result<(), IndexError>;

    /// Applies searchable/filterable/sortable attribute settings
    async fn configure_index(&self) -> Result<(), IndexError>;

    /// Adds or replaces documents keyed by `Document::id`
    async fn upsert_documents(&self, documents: &[Document]) -> Result<(), IndexError>;

    /// Runs a ranked full-text search
    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, IndexError>;
}
