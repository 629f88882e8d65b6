//! End-to-end crawl scenarios against mock sites

use crate::support::{html_page, mount_html, mount_robots, seed, test_config, RecordingEngine};
use driftnet::crawler::Coordinator;
use driftnet::state::CrawlPhase;
use driftnet::DriftnetError;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn set(paths: &[&str]) -> BTreeSet<String> {
    paths.iter().map(|p| p.to_string()).collect()
}

#[tokio::test]
async fn test_fragment_links_fetch_once() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /").await;
    mount_html(&server, "/", html_page("Home", &["/b", "/b#frag"]), 1).await;
    mount_html(&server, "/b", html_page("B", &[]), 1).await;

    let engine = Arc::new(RecordingEngine::new());
    let config = test_config(vec![seed(&server, "/")]);
    let coordinator = Coordinator::new(config, engine.clone(), false).unwrap();

    let report = coordinator.run().await.unwrap();

    assert_eq!(report.fetched, 2);
    assert_eq!(report.indexed, 2);
    assert_eq!(report.final_state, CrawlPhase::Done);
    assert!(!report.cancelled);
    assert_eq!(engine.paths(), set(&["/", "/b"]));
}

#[tokio::test]
async fn test_robots_disallowed_page_never_fetched() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nDisallow: /private\n").await;
    mount_html(&server, "/", html_page("Home", &["/private", "/public"]), 1).await;
    mount_html(&server, "/private", html_page("Private", &[]), 0).await;
    mount_html(&server, "/public", html_page("Public", &[]), 1).await;

    let engine = Arc::new(RecordingEngine::new());
    let config = test_config(vec![seed(&server, "/")]);
    let coordinator = Coordinator::new(config, engine.clone(), false).unwrap();

    let report = coordinator.run().await.unwrap();

    assert_eq!(report.skipped_disallowed, 1);
    assert_eq!(report.fetched, 2);
    assert_eq!(engine.paths(), set(&["/", "/public"]));
}

#[tokio::test]
async fn test_page_budget_stops_crawl_and_flushes() {
    let server = MockServer::start().await;
    mount_robots(&server, "").await;
    mount_html(&server, "/one", html_page("One", &["/three"]), 1).await;
    mount_html(&server, "/two", html_page("Two", &[]), 0).await;
    mount_html(&server, "/three", html_page("Three", &[]), 0).await;

    let engine = Arc::new(RecordingEngine::new());
    let mut config = test_config(vec![seed(&server, "/one"), seed(&server, "/two")]);
    config.crawler.max_pages = 1;
    let coordinator = Coordinator::new(config, engine.clone(), false).unwrap();

    let report = coordinator.run().await.unwrap();

    assert_eq!(report.fetched, 1);
    assert_eq!(report.indexed, 1);
    assert_eq!(report.documents_delivered, 1);
    assert_eq!(report.final_state, CrawlPhase::Done);
    // The single document only fits a partial batch, so the flush delivered it
    assert_eq!(engine.batch_count(), 1);
    assert_eq!(coordinator.sink_stats().flushes, 1);
    assert_eq!(engine.paths(), set(&["/one"]));
}

#[tokio::test]
async fn test_failing_engine_does_not_abort_crawl() {
    let server = MockServer::start().await;
    mount_robots(&server, "").await;
    mount_html(&server, "/", html_page("Home", &["/a", "/b"]), 1).await;
    mount_html(&server, "/a", html_page("A", &[]), 1).await;
    mount_html(&server, "/b", html_page("B", &[]), 1).await;

    let engine = Arc::new(RecordingEngine::failing());
    let mut config = test_config(vec![seed(&server, "/")]);
    config.index.batch_size = 2;
    config.index.max_retries = 2;
    let coordinator = Coordinator::new(config, engine.clone(), false).unwrap();

    let report = coordinator.run().await.unwrap();

    assert_eq!(report.fetched, 3);
    assert_eq!(report.indexed, 3);
    assert_eq!(report.documents_delivered, 0);
    assert_eq!(report.batches_failed, 2);
    assert_eq!(report.documents_dropped, 3);
    assert!(!report.fully_delivered());
    assert_eq!(engine.upsert_calls(), 6);
    assert_eq!(report.final_state, CrawlPhase::Done);
}

#[tokio::test]
async fn test_duplicate_content_indexed_once() {
    let server = MockServer::start().await;
    mount_robots(&server, "").await;
    mount_html(&server, "/", html_page("Home", &["/a", "/mirror"]), 1).await;
    mount_html(&server, "/a", html_page("Shared", &[]), 1).await;
    mount_html(&server, "/mirror", html_page("Shared", &[]), 1).await;

    let engine = Arc::new(RecordingEngine::new());
    let config = test_config(vec![seed(&server, "/")]);
    let coordinator = Coordinator::new(config, engine.clone(), false).unwrap();

    let report = coordinator.run().await.unwrap();

    assert_eq!(report.fetched, 3);
    assert_eq!(report.indexed, 2);
    assert_eq!(report.skipped_duplicate, 1);
    assert_eq!(engine.paths(), set(&["/", "/a"]));
}

#[tokio::test]
async fn test_recrawl_produces_same_ids() {
    let server = MockServer::start().await;
    mount_robots(&server, "").await;
    mount_html(&server, "/", html_page("Home", &["/a"]), 2).await;
    mount_html(&server, "/a", html_page("A", &[]), 2).await;

    let first = Arc::new(RecordingEngine::new());
    let second = Arc::new(RecordingEngine::new());

    for engine in [&first, &second] {
        let config = test_config(vec![seed(&server, "/")]);
        let coordinator = Coordinator::new(config, engine.clone(), false).unwrap();
        coordinator.run().await.unwrap();
    }

    assert_eq!(first.ids().len(), 2);
    assert_eq!(first.ids(), second.ids());
}

#[tokio::test]
async fn test_depth_cap() {
    let server = MockServer::start().await;
    mount_robots(&server, "").await;
    mount_html(&server, "/", html_page("Root", &["/d1"]), 1).await;
    mount_html(&server, "/d1", html_page("Depth one", &["/d2"]), 1).await;
    mount_html(&server, "/d2", html_page("Depth two", &[]), 0).await;

    let engine = Arc::new(RecordingEngine::new());
    let mut config = test_config(vec![seed(&server, "/")]);
    config.crawler.max_depth = 1;
    let coordinator = Coordinator::new(config, engine.clone(), false).unwrap();

    let report = coordinator.run().await.unwrap();

    assert_eq!(report.fetched, 2);
    assert_eq!(engine.paths(), set(&["/", "/d1"]));
}

#[tokio::test]
async fn test_fetch_errors_and_non_html_are_skipped() {
    let server = MockServer::start().await;
    mount_robots(&server, "").await;
    mount_html(&server, "/", html_page("Home", &["/missing", "/feed", "/ok"]), 1).await;
    mount_html(&server, "/ok", html_page("Ok", &[]), 1).await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/feed"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/json")
                .set_body_string(r#"{"items": []}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    let engine = Arc::new(RecordingEngine::new());
    let config = test_config(vec![seed(&server, "/")]);
    let coordinator = Coordinator::new(config, engine.clone(), false).unwrap();

    let report = coordinator.run().await.unwrap();

    assert_eq!(report.fetched, 4);
    assert_eq!(report.skipped_fetch_error, 1);
    assert_eq!(report.skipped_non_html, 1);
    assert_eq!(report.indexed, 2);
    assert_eq!(report.skipped(), 2);
}

#[tokio::test]
async fn test_low_value_pages_skipped_when_configured() {
    let server = MockServer::start().await;
    mount_robots(&server, "").await;
    mount_html(
        &server,
        "/",
        r#"<html><body><nav><a href="/full">full</a></nav><p>tiny</p></body></html>"#.to_string(),
        1,
    )
    .await;
    mount_html(&server, "/full", html_page("Full", &[]), 1).await;

    let engine = Arc::new(RecordingEngine::new());
    let mut config = test_config(vec![seed(&server, "/")]);
    config.crawler.skip_low_value = true;
    config.crawler.min_content_chars = 50;
    let coordinator = Coordinator::new(config, engine.clone(), false).unwrap();

    let report = coordinator.run().await.unwrap();

    assert_eq!(report.skipped_low_value, 1);
    assert_eq!(report.indexed, 1);
    assert_eq!(engine.paths(), set(&["/full"]));
}

#[tokio::test]
async fn test_low_value_pages_indexed_by_default() {
    let server = MockServer::start().await;
    mount_robots(&server, "").await;
    mount_html(&server, "/", "<html><body></body></html>".to_string(), 1).await;

    let engine = Arc::new(RecordingEngine::new());
    let config = test_config(vec![seed(&server, "/")]);
    let coordinator = Coordinator::new(config, engine.clone(), false).unwrap();

    let report = coordinator.run().await.unwrap();

    assert_eq!(report.indexed, 1);
    let docs = engine.documents();
    assert!(docs[0].low_value);
    assert!(docs[0].content.is_empty());
    assert_eq!(docs[0].title, seed(&server, "/"));
}

#[tokio::test]
async fn test_politeness_interval_between_same_host_fetches() {
    let server = MockServer::start().await;
    mount_robots(&server, "").await;
    mount_html(&server, "/", html_page("Home", &["/a", "/b"]), 1).await;
    mount_html(&server, "/a", html_page("A", &[]), 1).await;
    mount_html(&server, "/b", html_page("B", &[]), 1).await;

    let engine = Arc::new(RecordingEngine::new());
    let mut config = test_config(vec![seed(&server, "/")]);
    config.crawler.crawl_delay = 0.25;
    config.crawler.concurrency = 3;
    let coordinator = Coordinator::new(config, engine.clone(), false).unwrap();

    let start = Instant::now();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.fetched, 3);
    // Three fetches to one host need at least two full intervals
    assert!(start.elapsed() >= Duration::from_millis(500));
}

#[tokio::test]
async fn test_concurrent_workers_fetch_each_url_once() {
    let server = MockServer::start().await;
    mount_robots(&server, "").await;

    let children: Vec<String> = (0..12).map(|i| format!("/p{}", i)).collect();
    let child_refs: Vec<&str> = children.iter().map(String::as_str).collect();
    mount_html(&server, "/", html_page("Hub", &child_refs), 1).await;
    for (i, child) in children.iter().enumerate() {
        // Every child links back to the hub and to its neighbours
        let next = format!("/p{}", (i + 1) % children.len());
        let prev = format!("/p{}", (i + children.len() - 1) % children.len());
        let body = html_page(&format!("Child {}", i), &["/", next.as_str(), prev.as_str()]);
        mount_html(&server, child, body, 1).await;
    }

    let engine = Arc::new(RecordingEngine::new());
    let mut config = test_config(vec![seed(&server, "/")]);
    config.crawler.concurrency = 4;
    config.index.batch_size = 5;
    let coordinator = Coordinator::new(config, engine.clone(), false).unwrap();

    let report = coordinator.run().await.unwrap();

    assert_eq!(report.fetched, 13);
    assert_eq!(report.indexed, 13);
    assert_eq!(report.documents_delivered, 13);
    assert_eq!(engine.ids().len(), 13);
}

#[tokio::test]
async fn test_budget_holds_with_concurrency() {
    let server = MockServer::start().await;
    mount_robots(&server, "").await;

    let children: Vec<String> = (0..20).map(|i| format!("/c{}", i)).collect();
    let child_refs: Vec<&str> = children.iter().map(String::as_str).collect();
    mount_html(&server, "/", html_page("Hub", &child_refs), 1).await;
    for (i, child) in children.iter().enumerate() {
        Mock::given(method("GET"))
            .and(path(child.as_str()))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(html_page(&format!("C{}", i), &[])),
            )
            .mount(&server)
            .await;
    }

    let engine = Arc::new(RecordingEngine::new());
    let mut config = test_config(vec![seed(&server, "/")]);
    config.crawler.concurrency = 8;
    config.crawler.max_pages = 5;
    let coordinator = Coordinator::new(config, engine.clone(), false).unwrap();

    let report = coordinator.run().await.unwrap();

    let page_requests = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() != "/robots.txt")
        .count();
    assert_eq!(report.fetched, 5);
    assert_eq!(page_requests, 5);
    assert_eq!(engine.documents().len(), 5);
}

#[tokio::test]
async fn test_cancelled_before_start_still_flushes() {
    let server = MockServer::start().await;
    mount_robots(&server, "").await;
    mount_html(&server, "/", html_page("Home", &[]), 0).await;

    let engine = Arc::new(RecordingEngine::new());
    let config = test_config(vec![seed(&server, "/")]);
    let coordinator = Coordinator::new(config, engine.clone(), false).unwrap();

    coordinator.cancellation_token().cancel();
    let report = coordinator.run().await.unwrap();

    assert!(report.cancelled);
    assert_eq!(report.fetched, 0);
    assert_eq!(report.final_state, CrawlPhase::Done);
    assert_eq!(coordinator.sink_stats().flushes, 1);
}

#[tokio::test]
async fn test_deadline_aborts_in_flight_fetch() {
    let server = MockServer::start().await;
    mount_robots(&server, "").await;
    mount_html(&server, "/", html_page("Home", &["/slow"]), 1).await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(html_page("Slow", &[]))
                .set_delay(Duration::from_secs(10)),
        )
        .mount(&server)
        .await;

    let engine = Arc::new(RecordingEngine::new());
    let mut config = test_config(vec![seed(&server, "/")]);
    config.crawler.request_timeout = 30;
    config.crawler.deadline = Some(1);
    let coordinator = Coordinator::new(config, engine.clone(), false).unwrap();

    let start = Instant::now();
    let report = coordinator.run().await.unwrap();

    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(report.cancelled);
    assert_eq!(report.final_state, CrawlPhase::Done);
    // The page fetched before the deadline is still delivered by the flush
    assert_eq!(report.documents_delivered, 1);
    assert_eq!(engine.paths(), set(&["/"]));
}

#[tokio::test]
async fn test_unavailable_engine_is_fatal_before_fetching() {
    let server = MockServer::start().await;
    mount_html(&server, "/", html_page("Home", &[]), 0).await;

    let engine = Arc::new(RecordingEngine::unhealthy());
    let config = test_config(vec![seed(&server, "/")]);
    let coordinator = Coordinator::new(config, engine, false).unwrap();

    let err = coordinator.run().await.unwrap_err();
    assert!(matches!(err, DriftnetError::EngineUnavailable(_)));
    assert_eq!(coordinator.phase(), CrawlPhase::Idle);
}

#[tokio::test]
async fn test_coordinator_runs_once() {
    let server = MockServer::start().await;
    mount_robots(&server, "").await;
    mount_html(&server, "/", html_page("Home", &[]), 1).await;

    let engine = Arc::new(RecordingEngine::new());
    let config = test_config(vec![seed(&server, "/")]);
    let coordinator = Coordinator::new(config, engine, false).unwrap();

    coordinator.run().await.unwrap();
    let err = coordinator.run().await.unwrap_err();
    assert!(matches!(err, DriftnetError::InvalidTransition { .. }));
}
