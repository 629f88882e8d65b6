//! Meilisearch wire traffic and cross-run state

use crate::support::{html_page, mount_html, mount_robots, seed, test_config, RecordingEngine};
use driftnet::crawler::Coordinator;
use driftnet::index::{document_id, MeilisearchEngine, SearchEngine, SearchQuery};
use driftnet::storage::{RunStatus, SqliteStorage, Storage};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn start_meilisearch() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "available"})))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/indexes/pages/settings"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"taskUid": 1})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/indexes/pages/documents"))
        .and(query_param("primaryKey", "id"))
        .and(header("authorization", "Bearer secret"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"taskUid": 2})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/tasks/\d+$"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "succeeded"})))
        .mount(&server)
        .await;
    server
}

async fn uploaded_documents(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.to_string() == "POST" && r.url.path() == "/indexes/pages/documents")
        .flat_map(|r| serde_json::from_slice::<Vec<Value>>(&r.body).unwrap())
        .collect()
}

#[tokio::test]
async fn test_crawl_into_meilisearch() {
    let site = MockServer::start().await;
    mount_robots(&site, "").await;
    mount_html(&site, "/", html_page("Home", &["/docs"]), 1).await;
    mount_html(&site, "/docs", html_page("Docs", &[]), 1).await;

    let meili = start_meilisearch().await;

    let mut config = test_config(vec![seed(&site, "/")]);
    config.index.url = meili.uri();
    config.index.api_key = Some("secret".to_string());
    config.index.name = "pages".to_string();
    config.index.batch_size = 1;

    let coordinator = Coordinator::from_config(config, false).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.indexed, 2);
    assert_eq!(report.documents_delivered, 2);
    assert!(report.fully_delivered());

    let documents = uploaded_documents(&meili).await;
    assert_eq!(documents.len(), 2);

    let home = url::Url::parse(&seed(&site, "/")).unwrap();
    let first = &documents[0];
    assert_eq!(first["id"], Value::String(document_id(&home)));
    assert_eq!(first["title"], "Home");
    assert_eq!(first["url"], home.as_str());
    assert!(first["content"].as_str().unwrap().contains("page called Home"));
    assert!(first["timestamp"].as_i64().unwrap() > 0);
    assert!(first["word_count"].as_u64().unwrap() > 0);
    assert_eq!(documents[1]["title"], "Docs");
}

#[tokio::test]
async fn test_rejected_batches_are_counted_not_fatal() {
    let site = MockServer::start().await;
    mount_robots(&site, "").await;
    mount_html(&site, "/", html_page("Home", &[]), 1).await;

    let meili = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&meili)
        .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(202).set_body_json(json!({"taskUid": 1})))
        .mount(&meili)
        .await;
    Mock::given(method("GET"))
        .and(path("/tasks/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "succeeded"})))
        .mount(&meili)
        .await;
    Mock::given(method("POST"))
        .and(path("/indexes/documents/documents"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .expect(2)
        .mount(&meili)
        .await;

    let mut config = test_config(vec![seed(&site, "/")]);
    config.index.url = meili.uri();
    config.index.max_retries = 1;

    let coordinator = Coordinator::from_config(config, false).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.indexed, 1);
    assert_eq!(report.batches_failed, 1);
    assert_eq!(report.documents_dropped, 1);
}

#[tokio::test]
async fn test_search_returns_ranked_hits() {
    let meili = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/indexes/pages/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hits": [
                {
                    "id": "a",
                    "title": "Rust",
                    "content": "ownership",
                    "url": "http://a.test/",
                    "_rankingScore": 0.9
                },
                {
                    "id": "b",
                    "title": "Go",
                    "content": "goroutines",
                    "url": "http://b.test/",
                    "_rankingScore": 0.4
                }
            ]
        })))
        .mount(&meili)
        .await;

    let mut config = test_config(Vec::new());
    config.index.url = meili.uri();
    config.index.name = "pages".to_string();
    let engine = MeilisearchEngine::new(&config.index).unwrap();

    let hits = engine
        .search(&SearchQuery::new("rust", Some(5)).unwrap())
        .await
        .unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, "a");
    assert!(hits[0].score > hits[1].score);

    let requests = meili.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["q"], "rust");
    assert_eq!(body["limit"], 5);
}

#[tokio::test]
async fn test_runs_and_fingerprints_persist() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("state").join("driftnet.db");

    let site = MockServer::start().await;
    mount_robots(&site, "").await;
    mount_html(&site, "/", html_page("Home", &["/a"]), 3).await;
    mount_html(&site, "/a", html_page("A", &[]), 2).await;

    let crawl = |fresh: bool| {
        let mut config = test_config(vec![seed(&site, "/")]);
        config.storage.database_path = Some(db_path.to_string_lossy().into_owned());
        config.storage.persist_fingerprints = true;
        async move {
            let engine = Arc::new(RecordingEngine::new());
            let coordinator = Coordinator::new(config, engine.clone(), fresh).unwrap();
            let report = coordinator.run().await.unwrap();
            (report, engine)
        }
    };

    let (first, first_engine) = crawl(false).await;
    assert_eq!(first.indexed, 2);
    assert_eq!(first_engine.documents().len(), 2);

    // Every page is already known, and duplicates contribute no links
    let (second, second_engine) = crawl(false).await;
    assert_eq!(second.fetched, 1);
    assert_eq!(second.indexed, 0);
    assert_eq!(second.skipped_duplicate, 1);
    assert!(second_engine.documents().is_empty());

    let (third, _) = crawl(true).await;
    assert_eq!(third.indexed, 2);

    let storage = SqliteStorage::new(&db_path).unwrap();
    let runs = storage.list_runs(10).unwrap();
    assert_eq!(runs.len(), 3);
    assert!(runs.iter().all(|r| r.status == RunStatus::Completed));
    assert_eq!(runs[0].summary.documents_indexed, 2);
    assert_eq!(runs[1].summary.documents_indexed, 0);
    assert_eq!(runs[1].summary.pages_fetched, 1);
    assert_eq!(storage.count_fingerprints().unwrap(), 2);
}

#[tokio::test]
async fn test_dropped_documents_are_retried_next_run() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("driftnet.db");

    let site = MockServer::start().await;
    mount_robots(&site, "").await;
    mount_html(&site, "/", html_page("Home", &[]), 2).await;

    let config = || {
        let mut config = test_config(vec![seed(&site, "/")]);
        config.storage.database_path = Some(db_path.to_string_lossy().into_owned());
        config.storage.persist_fingerprints = true;
        config
    };

    let rejecting = Arc::new(RecordingEngine::failing());
    let first = Coordinator::new(config(), rejecting, false)
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(first.documents_dropped, 1);

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.count_fingerprints().unwrap(), 0);
    drop(storage);

    let healthy = Arc::new(RecordingEngine::new());
    let second = Coordinator::new(config(), healthy.clone(), false)
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(second.skipped_duplicate, 0);
    assert_eq!(second.indexed, 1);
    assert_eq!(healthy.documents().len(), 1);

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.count_fingerprints().unwrap(), 1);
}

#[tokio::test]
async fn test_fingerprints_reset_without_persistence() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("driftnet.db");

    let site = MockServer::start().await;
    mount_robots(&site, "").await;
    mount_html(&site, "/", html_page("Home", &[]), 2).await;

    for _ in 0..2 {
        let mut config = test_config(vec![seed(&site, "/")]);
        config.storage.database_path = Some(db_path.to_string_lossy().into_owned());
        let coordinator =
            Coordinator::new(config, Arc::new(RecordingEngine::new()), false).unwrap();
        let report = coordinator.run().await.unwrap();
        assert_eq!(report.indexed, 1);
    }

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.count_fingerprints().unwrap(), 0);
    assert_eq!(storage.list_runs(10).unwrap().len(), 2);
}

#[tokio::test]
async fn test_stale_run_marked_interrupted() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("driftnet.db");

    let stale_id = {
        let mut storage = SqliteStorage::new(&db_path).unwrap();
        storage.create_run("old-config").unwrap()
    };

    let mut config = test_config(vec!["http://127.0.0.1:9/".to_string()]);
    config.storage.database_path = Some(db_path.to_string_lossy().into_owned());
    let _coordinator =
        Coordinator::new(config, Arc::new(RecordingEngine::new()), false).unwrap();

    let storage = SqliteStorage::new(&db_path).unwrap();
    let run = storage.get_run(stale_id).unwrap();
    assert_eq!(run.status, RunStatus::Interrupted);
}

#[tokio::test]
async fn test_engine_failure_recorded_as_failed_run() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("driftnet.db");

    let mut config = test_config(vec!["http://127.0.0.1:9/".to_string()]);
    config.storage.database_path = Some(db_path.to_string_lossy().into_owned());
    let coordinator =
        Coordinator::new(config, Arc::new(RecordingEngine::unhealthy()), false).unwrap();

    assert!(coordinator.run().await.is_err());
    drop(coordinator);

    let storage = SqliteStorage::new(&db_path).unwrap();
    let latest = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(latest.status, RunStatus::Failed);
}
