//! Integration tests for driftnet
//!
//! Mock sites and a mock search engine are served with wiremock; the
//! state database lives in a temporary directory.

mod crawl_tests;
mod index_tests;
mod support;
