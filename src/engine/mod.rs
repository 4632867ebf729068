//! Execution engine module
//!
//! The pagination driver: fetch a page, extract records, sink them one by
//! one, follow the next reference, repeat.
//!
//! # Overview
//!
//! The engine module provides:
//! - `ScrapeEngine` - Drives one pagination chain, or one chain per seed
//! - `ScrapeRun` - Cursor, sunk records and statistics of a run
//! - `CancelFlag` - Cooperative cancellation checked before every fetch
//!
//! Pages are processed strictly one after another. A chain ends when the
//! extractor returns no next reference, when a page yields no records (if
//! the policy says so), when the page cap is reached, or on cancellation.

mod types;

pub use types::{CancelFlag, RunStats, ScrapeRun, StopReason};

use crate::error::Result;
use crate::extract::{parse_seed_links, PageContext, RecordExtractor};
use crate::http::{Page, PageFetcher, RetryPolicy};
use crate::output::RecordSink;
use crate::pagination::{PageReference, PaginationPolicy, Seed};
use crate::state::{CheckpointStore, SeenKeys};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Scrape engine for orchestrating paginated extraction
pub struct ScrapeEngine {
    /// Page fetch capability
    fetcher: Box<dyn PageFetcher>,
    /// Record extraction capability
    extractor: Box<dyn RecordExtractor>,
    /// Run-scoped pagination settings
    policy: PaginationPolicy,
    /// Fetch retry policy
    retry: RetryPolicy,
    /// Cancellation signal
    cancel: CancelFlag,
    /// Duplicate suppression
    seen: Option<SeenKeys>,
    /// Checkpoint persistence
    checkpoint: Option<CheckpointStore>,
}

impl ScrapeEngine {
    /// Create a new engine with default policies
    pub fn new(fetcher: Box<dyn PageFetcher>, extractor: Box<dyn RecordExtractor>) -> Self {
        Self {
            fetcher,
            extractor,
            policy: PaginationPolicy::default(),
            retry: RetryPolicy::default(),
            cancel: CancelFlag::new(),
            seen: None,
            checkpoint: None,
        }
    }

    /// Set the pagination policy
    #[must_use]
    pub fn with_policy(mut self, policy: PaginationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Use an existing cancellation flag
    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Suppress records whose key was already seen
    #[must_use]
    pub fn with_dedup(mut self, seen: SeenKeys) -> Self {
        self.seen = Some(seen);
        self
    }

    /// Persist progress after every page
    #[must_use]
    pub fn with_checkpoint(mut self, store: CheckpointStore) -> Self {
        self.checkpoint = Some(store);
        self
    }

    /// Get the pagination policy
    pub fn policy(&self) -> &PaginationPolicy {
        &self.policy
    }

    /// Get the cancellation flag
    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Get the checkpoint store
    pub fn checkpoint(&self) -> Option<&CheckpointStore> {
        self.checkpoint.as_ref()
    }

    /// Get the dedup key set
    pub fn seen_keys(&self) -> Option<&SeenKeys> {
        self.seen.as_ref()
    }

    /// Run one pagination chain starting at `initial`
    ///
    /// With a checkpoint holding an unfinished cursor, the chain resumes
    /// from that cursor instead.
    pub async fn run(
        &mut self,
        initial: PageReference,
        sink: &mut dyn RecordSink,
    ) -> Result<ScrapeRun> {
        let start = Instant::now();
        self.reset_finished_checkpoint().await?;

        let initial = match self.resume_cursor(None) {
            Some(cursor) => {
                info!(cursor = %cursor, "Resuming from checkpoint");
                cursor
            }
            None => initial,
        };

        let mut run = self.run_chain(initial, None, sink).await?;

        if run.stop_reason.is_exhausted() {
            if let Some(store) = &mut self.checkpoint {
                store.complete().await?;
            }
        }

        #[allow(clippy::cast_possible_truncation)]
        run.stats.set_duration(start.elapsed().as_millis() as u64);
        info!(
            pages = run.stats.pages_fetched,
            records = run.stats.records_written,
            duration_ms = run.stats.duration_ms,
            "Completed scrape ({})",
            run.stop_reason
        );
        Ok(run)
    }

    /// Run one pagination chain per seed, sharing the sink
    ///
    /// Seeds already completed in the checkpoint are skipped. The page cap
    /// applies to each seed separately.
    pub async fn run_seeds(
        &mut self,
        seeds: &[Seed],
        sink: &mut dyn RecordSink,
    ) -> Result<ScrapeRun> {
        let start = Instant::now();
        self.reset_finished_checkpoint().await?;

        let mut total = ScrapeRun::new(None);
        info!(seeds = seeds.len(), "Starting seeded scrape");

        for seed in seeds {
            if self.seed_completed(&seed.label) {
                debug!(seed = %seed.label, "Skipping completed seed");
                continue;
            }

            let initial = self
                .resume_cursor(Some(&seed.label))
                .unwrap_or_else(|| seed.reference.clone());
            info!(seed = %seed.label, start = %initial, "Processing seed");

            let chain = self.run_chain(initial, Some(&seed.label), sink).await?;
            let cancelled = chain.cancelled();
            total.absorb(chain);
            if cancelled {
                break;
            }

            total.stats.add_seed();
            if let Some(store) = &mut self.checkpoint {
                store.complete_seed(&seed.label).await?;
            }
        }

        if !total.cancelled() {
            if let Some(store) = &mut self.checkpoint {
                store.complete().await?;
            }
        }

        #[allow(clippy::cast_possible_truncation)]
        total.stats.set_duration(start.elapsed().as_millis() as u64);
        info!(
            seeds = total.stats.seeds_completed,
            pages = total.stats.pages_fetched,
            records = total.stats.records_written,
            duration_ms = total.stats.duration_ms,
            "Completed seeded scrape"
        );
        Ok(total)
    }

    /// Fetch `root` and collect seeds from the links matching `link_css`
    pub async fn discover_seeds(&self, root: &PageReference, link_css: &str) -> Result<Vec<Seed>> {
        let mut stats = RunStats::new();
        let page = self.fetch_with_retry(root, &mut stats).await?;
        let seeds = parse_seed_links(&page.body, &page.url, link_css)?;
        info!(count = seeds.len(), root = %root, "Discovered seeds");
        Ok(seeds)
    }

    /// Drive one chain until a termination signal
    async fn run_chain(
        &mut self,
        initial: PageReference,
        seed: Option<&str>,
        sink: &mut dyn RecordSink,
    ) -> Result<ScrapeRun> {
        let mut run = ScrapeRun::new(Some(initial));

        loop {
            let Some(reference) = run.cursor.clone() else {
                run.stop_reason = StopReason::Exhausted;
                break;
            };
            if !self.policy.allows_page(run.stats.pages_fetched) {
                run.stop_reason = StopReason::PageLimit;
                break;
            }
            if run.stats.pages_fetched > 0 {
                tokio::time::sleep(self.policy.next_delay()).await;
            }
            if self.cancel.is_cancelled() {
                run.stop_reason = StopReason::Cancelled;
                break;
            }

            let page_number = run.stats.pages_fetched + 1;
            info!(page = page_number, seed, reference = %reference, "Scraping page");

            let page = self.fetch_with_retry(&reference, &mut run.stats).await?;
            let context = PageContext {
                reference: &reference,
                page_url: &page.url,
                seed,
            };
            let extraction = self.extractor.extract(&page.body, &context)?;
            run.stats.add_page();
            run.stats.add_skipped(extraction.skipped);

            if extraction.records.is_empty() && self.policy.stop_on_empty_batch {
                info!(page = page_number, "Page yielded no records, stopping");
                run.cursor = None;
                run.stop_reason = StopReason::EmptyBatch;
                self.save_checkpoint(seed, None, 0).await?;
                break;
            }

            let mut written = 0;
            for record in extraction.records {
                if let Some(seen) = &mut self.seen {
                    if !seen.insert(&record) {
                        run.stats.add_duplicate();
                        continue;
                    }
                }
                if let Err(e) = sink.append(&record) {
                    error!(page = page_number, "Sink write failed: {e}");
                    return Err(e);
                }
                run.stats.add_record();
                run.records.push(record);
                written += 1;
            }

            info!(
                page = page_number,
                records = written,
                total = run.stats.records_written,
                "Page complete"
            );

            run.cursor = extraction.next;
            self.save_checkpoint(seed, run.cursor.as_ref(), written).await?;
        }

        info!(
            seed,
            pages = run.stats.pages_fetched,
            records = run.stats.records_written,
            "Pagination stopped: {}",
            run.stop_reason
        );
        Ok(run)
    }

    /// Fetch with the retry policy; the last error is returned when retries run out
    async fn fetch_with_retry(&self, reference: &PageReference, stats: &mut RunStats) -> Result<Page> {
        let mut attempt = 0;
        loop {
            match self.fetcher.fetch(reference).await {
                Ok(page) => return Ok(page),
                Err(e) if self.retry.should_retry(&e, attempt) => {
                    let delay = self.retry.delay_for(&e, attempt);
                    #[allow(clippy::cast_possible_truncation)]
                    let delay_ms = delay.as_millis() as u64;
                    warn!(
                        reference = %reference,
                        attempt = attempt + 1,
                        max_retries = self.retry.max_retries,
                        delay_ms,
                        "Fetch failed, retrying: {e}"
                    );
                    stats.add_retry();
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!(reference = %reference, "Fetch failed: {e}");
                    return Err(e);
                }
            }
        }
    }

    fn resume_cursor(&self, seed: Option<&str>) -> Option<PageReference> {
        self.checkpoint
            .as_ref()
            .and_then(|store| store.checkpoint().resume_cursor(seed).cloned())
    }

    fn seed_completed(&self, label: &str) -> bool {
        self.checkpoint
            .as_ref()
            .is_some_and(|store| store.checkpoint().is_seed_completed(label))
    }

    /// A checkpoint of a finished run starts over
    async fn reset_finished_checkpoint(&mut self) -> Result<()> {
        if let Some(store) = &mut self.checkpoint {
            if store.checkpoint().completed {
                debug!("Previous run completed, starting over");
                store.clear().await?;
            }
        }
        Ok(())
    }

    async fn save_checkpoint(
        &mut self,
        seed: Option<&str>,
        next: Option<&PageReference>,
        records: usize,
    ) -> Result<()> {
        if let Some(store) = &mut self.checkpoint {
            store.record_page(seed, next, records as u64).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
