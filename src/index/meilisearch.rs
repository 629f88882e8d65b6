//! Meilisearch REST client

use crate::config::IndexConfig;
use crate::index::{Document, IndexError, SearchEngine, SearchHit, SearchQuery};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::time::{sleep, Instant};

const SEARCHABLE_ATTRIBUTES: &[&str] = &["title", "content", "url"];
const FILTERABLE_ATTRIBUTES: &[&str] = &["url", "timestamp", "word_count"];
const SORTABLE_ATTRIBUTES: &[&str] = &["timestamp", "word_count"];

/// Search engine backed by a Meilisearch instance
pub struct MeilisearchEngine {
    client: Client,
    base_url: String,
    index: String,
    api_key: Option<String>,
    task_timeout: Duration,
    poll_interval: Duration,
}

impl MeilisearchEngine {
    /// Builds a client for the configured instance and index
    pub fn new(config: &IndexConfig) -> Result<Self, IndexError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| IndexError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            index: config.name.clone(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            task_timeout: Duration::from_secs(config.task_timeout.max(1)),
            poll_interval: Duration::from_millis(100),
        })
    }

    /// Overrides how often enqueued tasks are polled
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path));
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Fails with `IndexError::Status` for any non-2xx response
    async fn check_status(response: Response) -> Result<Response, IndexError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<body unavailable>".to_string());
        Err(IndexError::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// Polls an enqueued task until it settles or the wait budget runs out
    async fn wait_for_task(&self, uid: u64) -> Result<(), IndexError> {
        let deadline = Instant::now() + self.task_timeout;

        loop {
            let response = self
                .request(Method::GET, &format!("/tasks/{}", uid))
                .send()
                .await?;
            let task: TaskStatus = Self::check_status(response).await?.json().await?;

            match task.status.as_str() {
                "succeeded" => {
                    tracing::trace!("Task {} succeeded", uid);
                    return Ok(());
                }
                "failed" | "canceled" => {
                    let message = task
                        .error
                        .map(|e| e.message)
                        .unwrap_or_else(|| task.status.clone());
                    return Err(IndexError::TaskFailed { uid, message });
                }
                _ => {}
            }

            if Instant::now() >= deadline {
                return Err(IndexError::TaskTimeout(uid));
            }
            sleep(self.poll_interval).await;
        }
    }
}

#[derive(Debug, Deserialize)]
struct TaskInfo {
    #[serde(rename = "taskUid")]
    task_uid: u64,
}

#[derive(Debug, Deserialize)]
struct TaskStatus {
    status: String,
    #[serde(default)]
    error: Option<TaskError>,
}

#[derive(Debug, Deserialize)]
struct TaskError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    hits: Vec<RawHit>,
}

#[derive(Debug, Deserialize)]
struct RawHit {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    url: String,
    #[serde(rename = "_rankingScore", default)]
    ranking_score: Option<f64>,
    #[serde(rename = "_formatted", default)]
    formatted: Option<FormattedHit>,
}

#[derive(Debug, Default, Deserialize)]
struct FormattedHit {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

impl From<RawHit> for SearchHit {
    fn from(hit: RawHit) -> Self {
        let formatted = hit.formatted.unwrap_or_default();
        SearchHit {
            id: hit.id,
            title: formatted.title.unwrap_or(hit.title),
            content: formatted.content.unwrap_or(hit.content),
            url: hit.url,
            score: hit.ranking_score.unwrap_or(0.0),
        }
    }
}

#[async_trait]
impl SearchEngine for MeilisearchEngine {
    async fn health(&self) -> Result<(), IndexError> {
        let response = self.request(Method::GET, "/health").send().await?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn configure_index(&self) -> Result<(), IndexError> {
        let body = json!({
            "searchableAttributes": SEARCHABLE_ATTRIBUTES,
            "filterableAttributes": FILTERABLE_ATTRIBUTES,
            "sortableAttributes": SORTABLE_ATTRIBUTES,
        });

        let response = self
            .request(Method::PATCH, &format!("/indexes/{}/settings", self.index))
            .json(&body)
            .send()
            .await?;
        let task: TaskInfo = Self::check_status(response).await?.json().await?;
        self.wait_for_task(task.task_uid).await?;

        tracing::info!("Configured index '{}'", self.index);
        Ok(())
    }

    async fn upsert_documents(&self, documents: &[Document]) -> Result<(), IndexError> {
        if documents.is_empty() {
            return Ok(());
        }

        let response = self
            .request(
                Method::POST,
                &format!("/indexes/{}/documents?primaryKey=id", self.index),
            )
            .json(documents)
            .send()
            .await?;
        let task: TaskInfo = Self::check_status(response).await?.json().await?;

        tracing::debug!(
            "Enqueued {} documents as task {}",
            documents.len(),
            task.task_uid
        );
        self.wait_for_task(task.task_uid).await
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit>, IndexError> {
        let body = json!({
            "q": query.q,
            "limit": query.limit,
            "showRankingScore": true,
            "attributesToHighlight": ["title", "content"],
            "attributesToCrop": ["content"],
            "cropLength": 50,
        });

        let response = self
            .request(Method::POST, &format!("/indexes/{}/search", self.index))
            .json(&body)
            .send()
            .await?;
        let results: SearchResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| IndexError::InvalidResponse(e.to_string()))?;

        Ok(results.hits.into_iter().map(SearchHit::from).collect())
    }
}
