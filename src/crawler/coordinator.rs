//! Crawl coordinator - main crawl orchestration logic
//!
//! This module drives a crawl run through `Idle -> Running -> Draining -> Done`:
//! - Checking the search engine and preparing the index
//! - Seeding the frontier and running the worker pool
//! - Gating every fetch through robots.txt, the page budget and host pacing
//! - Extracting, deduplicating and submitting documents
//! - Flushing the index sink and recording the run

use crate::config::{compute_config_hash, Config};
use crate::crawler::dedup::Deduplicator;
use crate::crawler::extractor::{extract, ExtractOptions};
use crate::crawler::fetcher::{build_http_client, Fetcher};
use crate::crawler::frontier::{Frontier, FrontierEntry};
use crate::crawler::politeness::Politeness;
use crate::index::{Document, IndexSink, MeilisearchEngine, SearchEngine, SinkStats};
use crate::output::CrawlReport;
use crate::state::CrawlPhase;
use crate::storage::{RunStatus, SqliteStorage, Storage};
use crate::url::{host_key, is_crawlable, normalize_url};
use crate::DriftnetError;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Per-disposition page counters shared by all workers
#[derive(Debug, Default)]
struct CrawlCounters {
    reserved: AtomicUsize,
    fetched: AtomicUsize,
    indexed: AtomicUsize,
    skipped_disallowed: AtomicUsize,
    skipped_fetch_error: AtomicUsize,
    skipped_non_html: AtomicUsize,
    skipped_duplicate: AtomicUsize,
    skipped_low_value: AtomicUsize,
}

impl CrawlCounters {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }

    fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// State shared between the coordinator and its workers
struct CrawlContext {
    config: Arc<Config>,
    frontier: Frontier,
    politeness: Politeness,
    fetcher: Fetcher,
    dedup: Deduplicator,
    sink: IndexSink,
    extract_options: ExtractOptions,
    counters: CrawlCounters,
    phase: Mutex<CrawlPhase>,
    cancel: CancellationToken,
    started: Mutex<Option<Instant>>,
}

impl CrawlContext {
    fn phase(&self) -> CrawlPhase {
        *self.phase.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn transition(&self, to: CrawlPhase) -> Result<(), DriftnetError> {
        let mut phase = self.phase.lock().unwrap_or_else(|e| e.into_inner());
        if !phase.can_transition_to(to) {
            return Err(DriftnetError::InvalidTransition { from: *phase, to });
        }
        tracing::info!("Crawl phase: {} -> {}", *phase, to);
        *phase = to;
        Ok(())
    }

    /// Stops taking work; safe to call from any worker, any number of times
    fn begin_draining(&self, reason: &str) {
        {
            let mut phase = self.phase.lock().unwrap_or_else(|e| e.into_inner());
            if !phase.accepts_work() {
                return;
            }
            tracing::info!("Crawl phase: {} -> {} ({})", *phase, CrawlPhase::Draining, reason);
            *phase = CrawlPhase::Draining;
        }
        self.frontier.close();
    }

    /// Claims one unit of the page budget
    fn try_reserve_page(&self) -> bool {
        let max_pages = self.config.crawler.max_pages;
        self.counters
            .reserved
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < max_pages).then_some(n + 1)
            })
            .is_ok()
    }

    fn budget_exhausted(&self) -> bool {
        CrawlCounters::get(&self.counters.reserved) >= self.config.crawler.max_pages
    }

    async fn worker(self: Arc<Self>, id: usize) {
        tracing::debug!("Worker {} started", id);

        loop {
            let entry = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                entry = self.frontier.next() => entry,
            };
            let Some(entry) = entry else {
                break;
            };

            self.process(entry).await;
            self.frontier.done();
            self.sink.flush_expired().await;
        }

        tracing::debug!("Worker {} finished", id);
    }

    /// Handles one frontier entry; every outcome other than success is a counted skip
    async fn process(&self, entry: FrontierEntry) {
        let url = &entry.url;

        if self.budget_exhausted() {
            self.begin_draining("page budget reached");
            return;
        }

        let Some(host) = host_key(url) else {
            tracing::debug!("No host in {}, skipping", url);
            CrawlCounters::bump(&self.counters.skipped_fetch_error);
            return;
        };

        if !self.politeness.is_allowed(url).await {
            tracing::info!("URL {} disallowed by robots.txt", url);
            CrawlCounters::bump(&self.counters.skipped_disallowed);
            return;
        }

        if !self.try_reserve_page() {
            self.begin_draining("page budget reached");
            return;
        }

        tokio::select! {
            _ = self.cancel.cancelled() => return,
            _ = self.politeness.permit(&host) => {}
        }

        let result = tokio::select! {
            _ = self.cancel.cancelled() => {
                tracing::debug!("Fetch of {} cancelled", url);
                return;
            }
            result = self.fetcher.fetch(url) => result,
        };
        let fetched = self.counters.fetched.fetch_add(1, Ordering::SeqCst) + 1;
        self.log_progress(fetched);

        if let Some(error) = &result.error {
            tracing::warn!("Failed to fetch {}: {}", url, error);
            CrawlCounters::bump(&self.counters.skipped_fetch_error);
            return;
        }

        let Some(page) = extract(&result, &self.extract_options) else {
            tracing::debug!(
                "Skipping non-HTML {} ({})",
                url,
                result.content_type.as_deref().unwrap_or("no content type")
            );
            CrawlCounters::bump(&self.counters.skipped_non_html);
            return;
        };

        let document = Document::new(
            url,
            page.title,
            page.content,
            page.low_value,
            result.fetched_at,
        );

        if document.low_value && self.config.crawler.skip_low_value {
            tracing::debug!("Skipping low-value page {}", url);
            CrawlCounters::bump(&self.counters.skipped_low_value);
            self.offer_links(&entry, page.links);
            return;
        }

        if !self.dedup.should_index(&document) {
            CrawlCounters::bump(&self.counters.skipped_duplicate);
            return;
        }

        tracing::debug!("Indexing {} ({} words)", url, document.word_count);
        self.sink.submit(document).await;
        CrawlCounters::bump(&self.counters.indexed);

        self.offer_links(&entry, page.links);
    }

    fn offer_links(&self, entry: &FrontierEntry, links: Vec<url::Url>) {
        let depth = entry.depth + 1;
        let mut offered = 0;
        for link in links {
            if self.frontier.offer(FrontierEntry::discovered(link, depth, &entry.url)) {
                offered += 1;
            }
        }

        if offered > 0 {
            tracing::trace!("Queued {} new links from {}", offered, entry.url);
        }
    }

    fn log_progress(&self, fetched: usize) {
        if fetched % 10 != 0 {
            return;
        }
        let started = *self.started.lock().unwrap_or_else(|e| e.into_inner());
        let elapsed = started.map(|s| s.elapsed()).unwrap_or_default();
        let rate = if elapsed.as_secs_f64() > 0.0 {
            fetched as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };
        tracing::info!(
            "Progress: {} pages fetched, {} in frontier, {:.2} pages/sec",
            fetched,
            self.frontier.len(),
            rate
        );
    }

    fn report(&self, elapsed: Duration) -> CrawlReport {
        let c = &self.counters;
        let sink = self.sink.stats();
        CrawlReport {
            fetched: CrawlCounters::get(&c.fetched),
            indexed: CrawlCounters::get(&c.indexed),
            skipped_disallowed: CrawlCounters::get(&c.skipped_disallowed),
            skipped_fetch_error: CrawlCounters::get(&c.skipped_fetch_error),
            skipped_non_html: CrawlCounters::get(&c.skipped_non_html),
            skipped_duplicate: CrawlCounters::get(&c.skipped_duplicate),
            skipped_low_value: CrawlCounters::get(&c.skipped_low_value),
            documents_delivered: sink.documents_delivered,
            batches_failed: sink.batches_failed,
            documents_dropped: sink.documents_dropped,
            final_state: self.phase(),
            cancelled: self.cancel.is_cancelled(),
            elapsed,
        }
    }
}

/// Main crawler coordinator structure
pub struct Coordinator {
    ctx: Arc<CrawlContext>,
    engine: Arc<dyn SearchEngine>,
    storage: Option<Mutex<SqliteStorage>>,
    config_hash: String,
}

impl Coordinator {
    /// Creates a coordinator that indexes into the configured Meilisearch instance
    ///
    /// # Arguments
    ///
    /// * `config` - The validated configuration
    /// * `fresh` - Discard persisted content fingerprints before crawling
    pub fn from_config(config: Config, fresh: bool) -> Result<Self, DriftnetError> {
        let engine = MeilisearchEngine::new(&config.index)?;
        Self::new(config, Arc::new(engine), fresh)
    }

    /// Creates a coordinator around an arbitrary search engine
    ///
    /// Opens the state database when one is configured, marks runs left
    /// `running` by a crashed process as interrupted, and loads persisted
    /// fingerprints when cross-run deduplication is enabled.
    pub fn new(
        config: Config,
        engine: Arc<dyn SearchEngine>,
        fresh: bool,
    ) -> Result<Self, DriftnetError> {
        let config_hash = compute_config_hash(&config);
        let client = build_http_client(&config.crawler)?;

        let mut dedup = Deduplicator::new();
        let storage = match &config.storage.database_path {
            Some(path) => {
                let mut storage = SqliteStorage::new(Path::new(path))?;

                let stale = storage.mark_stale_runs_interrupted()?;
                if stale > 0 {
                    tracing::warn!("Marked {} unfinished runs as interrupted", stale);
                }

                if fresh {
                    tracing::info!("Fresh run requested, clearing stored fingerprints");
                    storage.clear_fingerprints()?;
                }

                if config.storage.persist_fingerprints {
                    let fingerprints = storage.load_fingerprints()?;
                    tracing::info!("Loaded {} content fingerprints", fingerprints.len());
                    dedup = Deduplicator::with_fingerprints(fingerprints);
                }

                Some(Mutex::new(storage))
            }
            None => None,
        };

        let ctx = CrawlContext {
            frontier: Frontier::new(config.crawler.max_depth),
            politeness: Politeness::new(client.clone(), &config.crawler),
            fetcher: Fetcher::new(client, &config.crawler),
            dedup,
            sink: IndexSink::new(engine.clone(), &config.index),
            extract_options: ExtractOptions::from(&config.crawler),
            counters: CrawlCounters::default(),
            phase: Mutex::new(CrawlPhase::Idle),
            cancel: CancellationToken::new(),
            started: Mutex::new(None),
            config: Arc::new(config),
        };

        Ok(Self {
            ctx: Arc::new(ctx),
            engine,
            storage,
            config_hash,
        })
    }

    /// Token that stops the crawl when cancelled
    ///
    /// Cancelling moves the run straight to draining; buffered documents
    /// are still flushed.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.ctx.cancel.clone()
    }

    pub fn phase(&self) -> CrawlPhase {
        self.ctx.phase()
    }

    /// Counters of the index sink so far
    pub fn sink_stats(&self) -> SinkStats {
        self.ctx.sink.stats()
    }

    /// Runs one crawl pass to completion
    ///
    /// Fails only on configuration-level problems: an unreachable search
    /// engine, an invalid seed, or a state database error. Page-level and
    /// delivery failures are counted in the report.
    pub async fn run(&self) -> Result<CrawlReport, DriftnetError> {
        let run_id = self.with_storage(|s| s.create_run(&self.config_hash))?;

        match self.execute().await {
            Ok(report) => {
                let status = if report.cancelled {
                    RunStatus::Interrupted
                } else {
                    RunStatus::Completed
                };
                self.finish(run_id, status, &report)?;
                Ok(report)
            }
            Err(e) => {
                if let Some(run_id) = run_id {
                    let report = self.ctx.report(Duration::ZERO);
                    let _ = self.with_storage(|s| {
                        s.finish_run(run_id, RunStatus::Failed, &report.run_summary())
                    });
                }
                Err(e)
            }
        }
    }

    async fn execute(&self) -> Result<CrawlReport, DriftnetError> {
        if self.ctx.phase() != CrawlPhase::Idle {
            return Err(DriftnetError::InvalidTransition {
                from: self.ctx.phase(),
                to: CrawlPhase::Running,
            });
        }

        self.engine
            .health()
            .await
            .map_err(DriftnetError::EngineUnavailable)?;
        self.engine
            .configure_index()
            .await
            .map_err(DriftnetError::EngineUnavailable)?;

        let seeded = self.seed_frontier()?;
        tracing::info!("Seeded frontier with {} URLs", seeded);

        let start = Instant::now();
        *self.ctx.started.lock().unwrap_or_else(|e| e.into_inner()) = Some(start);
        self.ctx.transition(CrawlPhase::Running)?;

        let deadline = self.ctx.config.crawler.deadline.map(|secs| {
            let cancel = self.ctx.cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_secs(secs)).await;
                tracing::warn!("Crawl deadline of {}s reached, cancelling", secs);
                cancel.cancel();
            })
        });

        let mut workers = JoinSet::new();
        for id in 0..self.ctx.config.crawler.concurrency {
            workers.spawn(self.ctx.clone().worker(id));
        }
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Crawl worker failed: {}", e);
            }
        }

        if let Some(deadline) = deadline {
            deadline.abort();
        }

        if self.ctx.cancel.is_cancelled() {
            self.ctx.begin_draining("cancelled");
        } else {
            self.ctx.begin_draining("frontier drained");
        }

        self.ctx.sink.flush().await;
        self.ctx.transition(CrawlPhase::Done)?;

        let report = self.ctx.report(start.elapsed());
        tracing::info!(
            "Crawl finished: {} fetched, {} indexed, {} skipped in {:?}",
            report.fetched,
            report.indexed,
            report.skipped(),
            report.elapsed
        );
        if report.batches_failed > 0 {
            tracing::error!(
                "{} batches ({} documents) could not be delivered",
                report.batches_failed,
                report.documents_dropped
            );
        }

        Ok(report)
    }

    fn seed_frontier(&self) -> Result<usize, DriftnetError> {
        let mut seeded = 0;
        for seed in &self.ctx.config.crawler.seed_urls {
            let url = normalize_url(seed)?;
            if !is_crawlable(&url) {
                tracing::warn!("Seed {} is not crawlable, ignoring", url);
                continue;
            }
            if self.ctx.frontier.offer(FrontierEntry::seed(url)) {
                seeded += 1;
            }
        }
        Ok(seeded)
    }

    fn finish(
        &self,
        run_id: Option<i64>,
        status: RunStatus,
        report: &CrawlReport,
    ) -> Result<(), DriftnetError> {
        let Some(run_id) = run_id else {
            return Ok(());
        };

        let persist = self.ctx.config.storage.persist_fingerprints;
        self.with_storage(|s| {
            if persist {
                let released = self.ctx.dedup.release(&self.ctx.sink.dropped_fingerprints());
                if released > 0 {
                    tracing::info!("Not saving {} fingerprints of dropped documents", released);
                }
                let fresh = self.ctx.dedup.fresh_fingerprints();
                tracing::info!("Saving {} new content fingerprints", fresh.len());
                s.save_fingerprints(&fresh)?;
            }
            s.finish_run(run_id, status, &report.run_summary())
        })?;

        tracing::info!("Recorded run {} as {}", run_id, status);
        Ok(())
    }

    /// Runs `f` against the state database, if one is configured
    fn with_storage<T>(
        &self,
        f: impl FnOnce(&mut SqliteStorage) -> Result<T, crate::storage::StorageError>,
    ) -> Result<Option<T>, DriftnetError> {
        let Some(storage) = &self.storage else {
            return Ok(None);
        };
        let mut storage = storage.lock().unwrap_or_else(|e| e.into_inner());
        Ok(Some(f(&mut storage)?))
    }
}
