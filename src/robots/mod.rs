//! Robots.txt handling module
//!
//! This module provides functionality for fetching, parsing, and caching robots.txt files.
//! Any failure to obtain robots.txt is treated as "allow everything" so that an
//! unreachable policy file never stalls the crawl.

mod cache;
mod parser;

pub use cache::{CachedRobots, RobotsCache};
pub use parser::{product_token, ParsedRobots};

use crate::url::robots_url;
use reqwest::{Client, StatusCode};
use url::Url;

/// Fetches robots.txt for the host of `page_url`
///
/// # Arguments
///
/// * `client` - The HTTP client (already carrying the crawler's user agent and timeout)
/// * `page_url` - Any URL on the host whose robots.txt is wanted
/// * `max_bytes` - Body size cap; rules past it are ignored
///
/// # Returns
///
/// The parsed rules, or `ParsedRobots::allow_all()` on network errors,
/// non-200 statuses, or unreadable bodies.
pub async fn fetch_robots(client: &Client, page_url: &Url, max_bytes: usize) -> ParsedRobots {
    let Some(robots_url) = robots_url(page_url) else {
        return ParsedRobots::allow_all();
    };

    let mut response = match client.get(robots_url.clone()).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!("robots.txt fetch failed for {}: {}; allowing all", robots_url, e);
            return ParsedRobots::allow_all();
        }
    };

    if response.status() != StatusCode::OK {
        tracing::debug!(
            "robots.txt at {} returned {}; allowing all",
            robots_url,
            response.status()
        );
        return ParsedRobots::allow_all();
    }

    let mut body = Vec::new();
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                body.extend_from_slice(&chunk);
                if body.len() > max_bytes {
                    tracing::debug!(
                        "robots.txt at {} exceeds {} bytes, truncating",
                        robots_url,
                        max_bytes
                    );
                    body.truncate(max_bytes);
                    // Never keep a partial last line
                    let whole_lines = body.iter().rposition(|b| *b == b'\n').map_or(0, |i| i + 1);
                    body.truncate(whole_lines);
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::debug!("robots.txt unreadable at {}: {}; allowing all", robots_url, e);
                return ParsedRobots::allow_all();
            }
        }
    }

    tracing::debug!("Loaded robots.txt from {} ({} bytes)", robots_url, body.len());
    ParsedRobots::from_content(&String::from_utf8_lossy(&body))
}
