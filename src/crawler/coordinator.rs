//! Crawl orchestration
//!
//! The orchestrator walks each source depth-first (index → groups → leaves),
//! one fetch at a time, with a courtesy pause after every leaf and a longer
//! one after every group. Failures are recovered per unit of work; only an
//! unrecoverable error (no page renderer, no run row) fails the run.
//!
//! Cancellation is cooperative: [`Orchestrator::stop`] raises a flag that is
//! checked before every top-level unit, group and leaf, so at most the fetch
//! in flight completes after a stop request.

use crate::config::{Config, CrawlerConfig};
use crate::crawler::extractor::{CrawlUnit, Extraction, Extractor, PageKind, RawRecord};
use crate::crawler::fetcher::{HttpRenderer, PageFetcher, PageRenderer, RenderError, RetryPolicy};
use crate::crawler::progress::{CrawlProgress, ProgressHandle};
use crate::crawler::selector::SelectorExtractor;
use crate::normalize::canonicalize;
use crate::state::CrawlState;
use crate::storage::{lock, FetchLedger, RecordStore, RunLog, SharedStorage};
use crate::HarvestError;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use url::Url;

/// A century; longer windows are clamped
const MAX_REFETCH_WINDOW_HOURS: u64 = 876_000;

/// Builds the page renderer at the start of each run
pub type RendererFactory =
    Arc<dyn Fn() -> Result<Arc<dyn PageRenderer>, RenderError> + Send + Sync>;

/// Start/stop/status control over crawl runs
///
/// Cloning yields another handle to the same orchestrator.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    crawler: CrawlerConfig,
    storage: SharedStorage,
    sources: Vec<Arc<dyn Extractor>>,
    renderer_factory: RendererFactory,
    config_hash: String,
    progress: ProgressHandle,
    /// Present while a run holds the slot
    slot: Mutex<Option<RunSlot>>,
}

impl Inner {
    fn slot(&self) -> MutexGuard<'_, Option<RunSlot>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Per-run control state, replaced wholesale by each run
struct RunSlot {
    cancel: AtomicBool,
    run_id: Option<i64>,
}

/// Marks a traversal halted at a cancellation checkpoint
struct Interrupted;

type Step = Result<(), Interrupted>;

/// A leaf record waiting for enrichment and storage
struct Leaf {
    label: String,
    record: RawRecord,
}

/// Releases the run slot however the run ends, including by panic
///
/// A run that never reached its end is recorded as failed, in progress and
/// in the run log.
struct RunGuard(Arc<Inner>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        let inner = &self.0;
        let slot = inner.slot().take();

        if inner.progress.state().is_running() {
            inner.progress.finish(CrawlState::Failed);
            if let Some(run_id) = slot.and_then(|slot| slot.run_id) {
                let processed = inner.progress.snapshot().processed_count;
                if let Err(e) = lock(&inner.storage)
                    .and_then(|mut s| s.finish_run(run_id, CrawlState::Failed, processed))
                {
                    tracing::warn!("Failed to record end of aborted run {}: {}", run_id, e);
                }
            }
        }
    }
}

impl Orchestrator {
    pub fn new(
        crawler: CrawlerConfig,
        storage: SharedStorage,
        sources: Vec<Arc<dyn Extractor>>,
        renderer_factory: RendererFactory,
        config_hash: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                crawler,
                storage,
                sources,
                renderer_factory,
                config_hash: config_hash.into(),
                progress: ProgressHandle::new(),
                slot: Mutex::new(None),
            }),
        }
    }

    /// Builds an orchestrator over the configured sources with the HTTP renderer
    pub fn from_config(
        config: &Config,
        storage: SharedStorage,
        config_hash: impl Into<String>,
    ) -> Result<Self, HarvestError> {
        let sources = config
            .sources
            .iter()
            .map(|source| Ok(Arc::new(SelectorExtractor::new(source)?) as Arc<dyn Extractor>))
            .collect::<Result<Vec<_>, HarvestError>>()?;

        let agent = config.user_agent.clone();
        let crawler = config.crawler.clone();
        let factory: RendererFactory =
            Arc::new(move || -> Result<Arc<dyn PageRenderer>, RenderError> {
                Ok(Arc::new(HttpRenderer::new(&agent, &crawler)?))
            });

        Ok(Self::new(
            config.crawler.clone(),
            storage,
            sources,
            factory,
            config_hash,
        ))
    }

    /// Starts a run in a background task
    ///
    /// Progress is reset before this returns, so `status()` immediately
    /// reports the new run.
    ///
    /// # Errors
    ///
    /// Returns `HarvestError::AlreadyRunning` while a run is in progress.
    pub fn start(&self) -> Result<JoinHandle<CrawlState>, HarvestError> {
        let guard = self.claim()?;
        let this = self.clone();
        Ok(tokio::spawn(async move {
            let _guard = guard;
            this.execute().await
        }))
    }

    /// Runs a crawl to completion on the current task
    pub async fn run(&self) -> Result<CrawlState, HarvestError> {
        let _guard = self.claim()?;
        Ok(self.execute().await)
    }

    /// Requests cancellation and returns immediately
    ///
    /// Returns true if a run was in progress.
    pub fn stop(&self) -> bool {
        let running = match self.inner.slot().as_ref() {
            Some(slot) => {
                slot.cancel.store(true, Ordering::SeqCst);
                true
            }
            None => false,
        };
        if running {
            tracing::info!("Cancellation requested, stopping at the next checkpoint");
        }
        running
    }

    /// Snapshot of the current (or last) run's progress
    pub fn status(&self) -> CrawlProgress {
        self.inner.progress.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.inner.slot().is_some()
    }

    fn claim(&self) -> Result<RunGuard, HarvestError> {
        let mut slot = self.inner.slot();
        if slot.is_some() {
            return Err(HarvestError::AlreadyRunning);
        }

        *slot = Some(RunSlot {
            cancel: AtomicBool::new(false),
            run_id: None,
        });
        self.inner.progress.reset();
        Ok(RunGuard(Arc::clone(&self.inner)))
    }

    async fn execute(&self) -> CrawlState {
        let inner = &self.inner;
        tracing::info!("Starting crawl of {} source(s)", inner.sources.len());

        let run_id = match lock(&inner.storage).and_then(|mut s| s.create_run(&inner.config_hash)) {
            Ok(id) => {
                if let Some(slot) = inner.slot().as_mut() {
                    slot.run_id = Some(id);
                }
                id
            }
            Err(e) => {
                tracing::error!("Cannot record crawl run: {}", e);
                inner.progress.push_error(format!("Cannot record crawl run: {}", e));
                inner.progress.finish(CrawlState::Failed);
                return CrawlState::Failed;
            }
        };

        let state = match (inner.renderer_factory)() {
            Ok(renderer) => {
                let fetcher = PageFetcher::new(
                    renderer,
                    inner.storage.clone(),
                    RetryPolicy::from_config(&inner.crawler),
                );
                match self.traverse(&fetcher, run_id).await {
                    Ok(()) => CrawlState::Completed,
                    Err(Interrupted) => CrawlState::Cancelled,
                }
            }
            Err(e) => {
                tracing::error!("Cannot construct page renderer: {}", e);
                self.report_error(run_id, format!("Cannot construct page renderer: {}", e), None);
                CrawlState::Failed
            }
        };

        inner.progress.finish(state);
        let processed = inner.progress.snapshot().processed_count;
        if let Err(e) = lock(&inner.storage).and_then(|mut s| s.finish_run(run_id, state, processed)) {
            tracing::warn!("Failed to record end of run {}: {}", run_id, e);
        }

        tracing::info!("Crawl run {} {} ({} records processed)", run_id, state, processed);
        state
    }

    async fn traverse(&self, fetcher: &PageFetcher, run_id: i64) -> Step {
        for source in &self.inner.sources {
            self.checkpoint(None)?;
            self.inner.progress.set_source(source.source_id());
            tracing::info!("Harvesting source {}", source.source_id());

            let units = source.top_level_units();
            self.inner.progress.add_units(units.len());
            for unit in &units {
                self.crawl_index(source.as_ref(), fetcher, run_id, unit).await?;
            }
        }
        Ok(())
    }

    async fn crawl_index(
        &self,
        source: &dyn Extractor,
        fetcher: &PageFetcher,
        run_id: i64,
        unit: &CrawlUnit,
    ) -> Step {
        self.checkpoint(Some(format!("{} > {}", source.source_id(), unit.label)))?;

        let Some(extraction) = self
            .fetch_and_extract(source, fetcher, run_id, PageKind::Index, &unit.url)
            .await
        else {
            return Ok(());
        };

        let groups = extraction.children;
        tracing::info!("{}: {} group(s)", unit.label, groups.len());
        self.inner.progress.add_units(groups.len());

        for group in &groups {
            self.crawl_group(source, fetcher, run_id, group).await?;
            pause(self.inner.crawler.group_delay_ms).await;
        }
        Ok(())
    }

    async fn crawl_group(
        &self,
        source: &dyn Extractor,
        fetcher: &PageFetcher,
        run_id: i64,
        group: &CrawlUnit,
    ) -> Step {
        self.checkpoint(Some(format!("{} > {}", source.source_id(), group.label)))?;

        let Some(extraction) = self
            .fetch_and_extract(source, fetcher, run_id, PageKind::Group, &group.url)
            .await
        else {
            return Ok(());
        };

        let leaves = leaves_of(extraction, &group.label);
        tracing::debug!("{}: {} leaf record(s)", group.label, leaves.len());
        self.inner.progress.add_units(leaves.len());

        for leaf in leaves {
            self.crawl_leaf(source, fetcher, run_id, leaf).await?;
            pause(self.inner.crawler.leaf_delay_ms).await;
        }
        Ok(())
    }

    async fn crawl_leaf(
        &self,
        source: &dyn Extractor,
        fetcher: &PageFetcher,
        run_id: i64,
        leaf: Leaf,
    ) -> Step {
        self.checkpoint(Some(format!("{} > {}", source.source_id(), leaf.label)))?;
        let Leaf { label, mut record } = leaf;

        if self.inner.crawler.enrich_leaves {
            if let Some(url) = record.record_url.clone() {
                if self.recently_fetched(&url) {
                    tracing::debug!("Skipping enrichment of {}: fetched recently", url);
                } else if let Some(extraction) = self
                    .fetch_and_extract(source, fetcher, run_id, PageKind::Leaf, &url)
                    .await
                {
                    for detail in extraction.records {
                        record.absorb(detail);
                    }
                }
            }
        }

        if !record.has_name() && record.record_url.as_deref() != Some(label.as_str()) {
            record.name = Some(label.clone());
        }

        self.store(source, run_id, &label, &record);
        Ok(())
    }

    /// Fetches and extracts one page, reporting any failure
    async fn fetch_and_extract(
        &self,
        source: &dyn Extractor,
        fetcher: &PageFetcher,
        run_id: i64,
        kind: PageKind,
        url: &str,
    ) -> Option<Extraction> {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.report_error(run_id, format!("Invalid {} URL {}: {}", kind, url, e), Some(url));
                return None;
            }
        };

        let content = match fetcher.fetch(url).await.into_result() {
            Ok(content) => content,
            Err(e) => {
                self.report_error(run_id, format!("Failed to fetch {} page {}: {}", kind, url, e), Some(url));
                return None;
            }
        };

        match source.extract(kind, &content, &parsed) {
            Ok(extraction) => Some(extraction),
            Err(e) => {
                self.report_error(run_id, format!("Failed to extract {} page: {}", kind, e), Some(url));
                None
            }
        }
    }

    fn store(&self, source: &dyn Extractor, run_id: i64, label: &str, record: &RawRecord) {
        let url = record.record_url.as_deref();
        if !record.has_name() {
            self.report_error(run_id, format!("Dropping {}: no name found", label), url);
            return;
        }

        let today = Utc::now().date_naive();
        let canonical = canonicalize(record, source.source_id(), source.category(), today);

        match lock(&self.inner.storage).and_then(|mut s| s.upsert_record(&canonical)) {
            Ok(true) => {
                self.inner.progress.record_processed();
                tracing::debug!("Stored {}", canonical.name);
            }
            Ok(false) => tracing::debug!("No change for {}", canonical.name),
            Err(e) => self.report_error(run_id, format!("Failed to store {}: {}", label, e), url),
        }
    }

    /// Logs a recovered failure, shows it in progress and persists it
    fn report_error(&self, run_id: i64, message: String, url: Option<&str>) {
        tracing::warn!("{}", message);
        if let Err(e) = lock(&self.inner.storage).and_then(|mut s| s.log_error(Some(run_id), &message, url)) {
            tracing::warn!("Failed to persist error: {}", e);
        }
        self.inner.progress.push_error(message);
    }

    fn recently_fetched(&self, url: &str) -> bool {
        let hours = self.inner.crawler.refetch_window_hours;
        if hours == 0 {
            return false;
        }

        let since = Utc::now() - chrono::Duration::hours(hours.min(MAX_REFETCH_WINDOW_HOURS) as i64);
        lock(&self.inner.storage)
            .and_then(|s| s.fetched_successfully_since(url, since))
            .unwrap_or_else(|e| {
                tracing::warn!("Cannot read fetch ledger for {}: {}", url, e);
                false
            })
    }

    fn cancel_requested(&self) -> bool {
        self.inner
            .slot()
            .as_ref()
            .is_some_and(|slot| slot.cancel.load(Ordering::SeqCst))
    }

    /// Halts at a cancellation request, otherwise marks the unit in flight
    fn checkpoint(&self, unit: Option<String>) -> Step {
        if self.cancel_requested() {
            tracing::info!("Crawl cancelled");
            return Err(Interrupted);
        }
        if let Some(unit) = unit {
            self.inner.progress.set_current_unit(unit);
        }
        Ok(())
    }
}

/// Inline records plus leaf links no inline record already covers
fn leaves_of(extraction: Extraction, group_label: &str) -> Vec<Leaf> {
    let mut leaves: Vec<Leaf> = extraction
        .records
        .into_iter()
        .map(|mut record| {
            if record.group.is_none() {
                record.group = Some(group_label.to_string());
            }
            let label = record
                .name
                .clone()
                .or_else(|| record.record_url.clone())
                .unwrap_or_else(|| group_label.to_string());
            Leaf { label, record }
        })
        .collect();

    for child in extraction.children {
        let covered = leaves
            .iter()
            .any(|leaf| leaf.record.record_url.as_deref() == Some(child.url.as_str()));
        if !covered {
            leaves.push(Leaf {
                label: child.label,
                record: RawRecord {
                    record_url: Some(child.url),
                    group: Some(group_label.to_string()),
                    ..Default::default()
                },
            });
        }
    }

    leaves
}

async fn pause(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}
