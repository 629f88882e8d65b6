//! Batched delivery of documents to the search engine

use crate::config::IndexConfig;
use crate::index::{Document, SearchEngine};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Counters describing what the sink has done so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStats {
    pub documents_delivered: usize,
    pub batches_delivered: usize,
    pub batches_failed: usize,
    pub documents_dropped: usize,
    pub flushes: usize,
}

#[derive(Default)]
struct Buffer {
    documents: Vec<Document>,
    oldest: Option<Instant>,
}

impl Buffer {
    fn take(&mut self) -> Vec<Document> {
        self.oldest = None;
        std::mem::take(&mut self.documents)
    }
}

/// Buffers documents and upserts them in bulk
///
/// A batch is sent when it reaches `batch_size` documents or when the
/// oldest buffered document has waited longer than `window`. Failed
/// batches are retried with exponential backoff, then dropped and counted.
/// The content hashes of dropped documents are kept so they can be left
/// out of the persisted fingerprint registry.
pub struct IndexSink {
    engine: Arc<dyn SearchEngine>,
    buffer: Mutex<Buffer>,
    batch_size: usize,
    window: Duration,
    max_attempts: u32,
    retry_backoff: Duration,
    documents_delivered: AtomicUsize,
    batches_delivered: AtomicUsize,
    batches_failed: AtomicUsize,
    documents_dropped: AtomicUsize,
    flushes: AtomicUsize,
    dropped_hashes: Mutex<Vec<String>>,
}

impl IndexSink {
    pub fn new(engine: Arc<dyn SearchEngine>, config: &IndexConfig) -> Self {
        Self {
            engine,
            buffer: Mutex::new(Buffer::default()),
            batch_size: config.batch_size.max(1),
            window: Duration::from_secs(config.batch_window),
            max_attempts: config.max_retries.saturating_add(1),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            documents_delivered: AtomicUsize::new(0),
            batches_delivered: AtomicUsize::new(0),
            batches_failed: AtomicUsize::new(0),
            documents_dropped: AtomicUsize::new(0),
            flushes: AtomicUsize::new(0),
            dropped_hashes: Mutex::new(Vec::new()),
        }
    }

    /// Buffers a document, delivering the batch if it is full or stale
    pub async fn submit(&self, document: Document) {
        let ready = {
            let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
            buffer.documents.push(document);
            let oldest = *buffer.oldest.get_or_insert_with(Instant::now);

            if buffer.documents.len() >= self.batch_size || oldest.elapsed() >= self.window {
                Some(buffer.take())
            } else {
                None
            }
        };

        if let Some(batch) = ready {
            self.deliver(batch).await;
        }
    }

    /// Delivers the partial batch if its window has expired
    pub async fn flush_expired(&self) {
        let ready = {
            let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
            match buffer.oldest {
                Some(oldest) if oldest.elapsed() >= self.window => Some(buffer.take()),
                _ => None,
            }
        };

        if let Some(batch) = ready {
            tracing::debug!("Batch window expired with {} documents", batch.len());
            self.deliver(batch).await;
        }
    }

    /// Delivers whatever is buffered
    pub async fn flush(&self) {
        self.flushes.fetch_add(1, Ordering::SeqCst);

        let batch = {
            let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
            buffer.take()
        };

        if batch.is_empty() {
            tracing::debug!("Flush with empty buffer");
            return;
        }

        tracing::info!("Flushing final batch of {} documents", batch.len());
        self.deliver(batch).await;
    }

    /// Number of documents waiting in the buffer
    pub fn buffered(&self) -> usize {
        self.buffer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .documents
            .len()
    }

    pub fn stats(&self) -> SinkStats {
        SinkStats {
            documents_delivered: self.documents_delivered.load(Ordering::SeqCst),
            batches_delivered: self.batches_delivered.load(Ordering::SeqCst),
            batches_failed: self.batches_failed.load(Ordering::SeqCst),
            documents_dropped: self.documents_dropped.load(Ordering::SeqCst),
            flushes: self.flushes.load(Ordering::SeqCst),
        }
    }

    /// Content hashes of every document dropped so far
    pub fn dropped_fingerprints(&self) -> Vec<String> {
        self.dropped_hashes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    async fn deliver(&self, batch: Vec<Document>) {
        let count = batch.len();
        let mut attempt = 0u32;

        loop {
            let result = self.engine.upsert_documents(&batch).await;
            match result {
                Ok(()) => {
                    self.documents_delivered.fetch_add(count, Ordering::SeqCst);
                    self.batches_delivered.fetch_add(1, Ordering::SeqCst);
                    tracing::info!("Indexed batch of {} documents", count);
                    return;
                }
                Err(e) if e.is_retryable() && attempt + 1 < self.max_attempts => {
                    attempt += 1;
                    let wait = retry_backoff(self.retry_backoff, attempt);
                    tracing::warn!(
                        "Batch upsert failed (attempt {}/{}): {}; retrying in {:?}",
                        attempt,
                        self.max_attempts,
                        e,
                        wait
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(e) => {
                    self.batches_failed.fetch_add(1, Ordering::SeqCst);
                    self.documents_dropped.fetch_add(count, Ordering::SeqCst);
                    tracing::error!("Dropping batch of {} documents: {}", count, e);
                    self.dropped_hashes
                        .lock()
                        .unwrap_or_else(|e| e.into_inner())
                        .extend(batch.into_iter().map(|d| d.content_hash));
                    return;
                }
            }
        }
    }
}

/// Exponential backoff: `base * 2^attempt`, with the exponent capped at 5
fn retry_backoff(base: Duration, attempt: u32) -> Duration {
    base * (1u32 << attempt.min(5))
}
