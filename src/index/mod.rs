//! Search index delivery
//!
//! Defines the document shape, the search engine collaborator trait, the
//! Meilisearch client, and the batching sink the crawler submits to.

mod document;
mod meilisearch;
mod sink;
mod traits;

pub use document::{content_fingerprint, document_id, Document};
pub use meilisearch::MeilisearchEngine;
pub use sink::{IndexSink, SinkStats};
pub use traits::{IndexError, SearchEngine, SearchHit, SearchQuery};
