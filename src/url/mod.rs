//! URL handling module for Driftnet
//!
//! This module provides URL normalization, host keys for politeness
//! grouping, and the crawlability filter applied to discovered links.

mod filter;
mod host;
mod normalize;

// Re-export main functions
pub use filter::is_crawlable;
pub use host::{host_key, robots_url};
pub use normalize::{normalize_parsed, normalize_url};
