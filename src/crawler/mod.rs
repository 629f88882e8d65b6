//! Crawler module for web page fetching and processing
//!
//! This module contains the crawl-and-index pipeline, including:
//! - The URL frontier shared by workers
//! - Per-host pacing and robots.txt compliance
//! - HTTP fetching with a bounded retry
//! - HTML content and link extraction
//! - Content deduplication
//! - Overall crawl coordination

mod coordinator;
mod dedup;
mod extractor;
mod fetcher;
mod frontier;
mod politeness;

pub use coordinator::Coordinator;
pub use dedup::Deduplicator;
pub use extractor::{extract, is_html_content_type, parse_page, ExtractOptions, ExtractedPage};
pub use fetcher::{build_http_client, FetchError, FetchResult, Fetcher};
pub use frontier::{Frontier, FrontierEntry};
pub use politeness::Politeness;

pub use crate::output::CrawlReport;
