//! Shared helpers for the integration tests

use async_trait::async_trait;
use driftnet::config::Config;
use driftnet::index::{Document, IndexError, SearchEngine, SearchHit, SearchQuery};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// In-memory search engine that records every upsert
#[derive(Default)]
pub struct RecordingEngine {
    batches: Mutex<Vec<Vec<Document>>>,
    upsert_calls: AtomicUsize,
    fail_upserts: bool,
    unhealthy: bool,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every upsert answers with a server error
    pub fn failing() -> Self {
        Self {
            fail_upserts: true,
            ..Self::default()
        }
    }

    /// The health check fails
    pub fn unhealthy() -> Self {
        Self {
            unhealthy: true,
            ..Self::default()
        }
    }

    pub fn documents(&self) -> Vec<Document> {
        self.batches.lock().unwrap().iter().flatten().cloned().collect()
    }

    pub fn batch_count(&self) -> usize {
        self.batches.lock().unwrap().len()
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn paths(&self) -> BTreeSet<String> {
        self.documents()
            .iter()
            .map(|d| url::Url::parse(&d.url).unwrap().path().to_string())
            .collect()
    }

    pub fn ids(&self) -> BTreeSet<String> {
        self.documents().into_iter().map(|d| d.id).collect()
    }
}

#[async_trait]
impl SearchEngine for RecordingEngine {
    async fn health(&self) -> Result<(), IndexError> {
        if self.unhealthy {
            return Err(IndexError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(())
    }

    async fn configure_index(&self) -> Result<(), IndexError> {
        Ok(())
    }

    async fn upsert_documents(&self, documents: &[Document]) -> Result<(), IndexError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_upserts {
            return Err(IndexError::Status {
                status: 500,
                body: "internal error".to_string(),
            });
        }
        self.batches.lock().unwrap().push(documents.to_vec());
        Ok(())
    }

    async fn search(&self, _query: &SearchQuery) -> Result<Vec<SearchHit>, IndexError> {
        Ok(Vec::new())
    }
}

/// Fast, deterministic configuration seeded with `seeds`
pub fn test_config(seeds: Vec<String>) -> Config {
    let mut config = Config::default();
    config.crawler.seed_urls = seeds;
    config.crawler.crawl_delay = 0.0;
    config.crawler.request_timeout = 5;
    config.crawler.retry_backoff_ms = 10;
    config.crawler.user_agent = "TestBot/1.0".to_string();
    config.index.batch_window = 3600;
    config.index.retry_backoff_ms = 1;
    config
}

/// A page with enough distinct text to never collide with another page
pub fn html_page(title: &str, links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<a href="{}">{}</a> "#, href, href))
        .collect();
    format!(
        "<html><head><title>{title}</title></head><body>\
         <nav>{anchors}</nav>\
         <main><h1>{title}</h1><p>This is the page called {title}. \
         It carries some unique text so its fingerprint differs.</p></main>\
         </body></html>"
    )
}

/// Serves `body` as HTML at `route`, expecting exactly `hits` requests
pub async fn mount_html(server: &MockServer, route: &str, body: String, hits: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html; charset=utf-8")
                .set_body_string(body),
        )
        .expect(hits)
        .mount(server)
        .await;
}

pub async fn mount_robots(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

pub fn seed(server: &MockServer, route: &str) -> String {
    format!("{}{}", server.uri(), route)
}
