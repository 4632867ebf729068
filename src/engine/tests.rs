//! Tests for engine module

use super::*;
use crate::error::Error;
use crate::extract::{Extraction, FnExtractor};
use crate::output::MemorySink;
use crate::record::{FieldSet, Record};
use crate::types::BackoffType;
use async_trait::async_trait;
use pretty_assertions::assert_eq;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;

// ============================================================================
// Fixtures
// ============================================================================

/// Serves canned bodies keyed by reference, with optional queued failures
#[derive(Default)]
struct ScriptedFetcher {
    pages: HashMap<String, String>,
    failures: Mutex<HashMap<String, VecDeque<u16>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedFetcher {
    fn page(mut self, reference: &PageReference, body: impl Into<String>) -> Self {
        self.pages.insert(reference.to_string(), body.into());
        self
    }

    fn fail_first(self, reference: &PageReference, statuses: &[u16]) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(reference.to_string(), statuses.iter().copied().collect());
        self
    }

    fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, reference: &PageReference) -> crate::error::Result<Page> {
        let key = reference.to_string();
        self.calls.lock().unwrap().push(key.clone());

        let queued = self
            .failures
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(VecDeque::pop_front);
        if let Some(status) = queued {
            return Err(Error::http_status(status, "scripted"));
        }

        match self.pages.get(&key) {
            Some(body) => Ok(Page::new(key, body.clone())),
            None => Err(Error::http_status(404, "not found")),
        }
    }
}

fn fields() -> FieldSet {
    FieldSet::new(["value", "page", "seed"])
}

/// Body format: one `rec <value>` line per record, optional `next <url>`
/// or `next-offset <n>` line
fn line_extractor() -> FnExtractor<impl Fn(&str, &PageContext<'_>) -> crate::error::Result<Extraction>>
{
    let field_set = fields();
    let for_records = field_set.clone();
    FnExtractor::new(field_set, move |content: &str, ctx: &PageContext<'_>| {
        let mut records = Vec::new();
        let mut next = None;
        for line in content.lines().map(str::trim) {
            if let Some(value) = line.strip_prefix("rec ") {
                let mut record = Record::new(&for_records);
                record.set("value", Some(value.to_string()))?;
                record.set("page", Some(ctx.page_url.to_string()))?;
                record.set("seed", ctx.seed.map(str::to_string))?;
                records.push(record);
            } else if let Some(url) = line.strip_prefix("next ") {
                next = Some(PageReference::url(url));
            } else if let Some(offset) = line.strip_prefix("next-offset ") {
                next = offset.parse().ok().map(PageReference::offset);
            }
        }
        Ok(Extraction::new(records, next))
    })
}

fn url(n: u32) -> PageReference {
    PageReference::url(format!("https://quotes.test/page/{n}/"))
}

fn body(records: &[&str], next: Option<&PageReference>) -> String {
    let mut out: Vec<String> = records.iter().map(|r| format!("rec {r}")).collect();
    if let Some(PageReference::AbsoluteUrl(u)) = next {
        out.push(format!("next {u}"));
    }
    out.join("\n")
}

fn fast_policy() -> PaginationPolicy {
    PaginationPolicy::new().with_delay(Duration::ZERO)
}

fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy::default().with_max_retries(max_retries).with_backoff(
        BackoffType::Constant,
        Duration::from_millis(1),
        Duration::from_millis(5),
    )
}

fn engine(fetcher: ScriptedFetcher) -> ScrapeEngine {
    ScrapeEngine::new(Box::new(fetcher), Box::new(line_extractor()))
        .with_policy(fast_policy())
        .with_retry(fast_retry(3))
}

fn values(run: &ScrapeRun) -> Vec<&str> {
    run.records.iter().filter_map(|r| r.get("value")).collect()
}

/// Sink that fails after a number of successful appends
struct FailingSink {
    remaining: usize,
}

impl RecordSink for FailingSink {
    fn append(&mut self, _record: &Record) -> crate::error::Result<()> {
        if self.remaining == 0 {
            return Err(Error::sink("out.jsonl", "disk full"));
        }
        self.remaining -= 1;
        Ok(())
    }
}

/// Sink that requests cancellation after a number of appends
struct CancellingSink {
    inner: MemorySink,
    after: usize,
    flag: CancelFlag,
}

impl RecordSink for CancellingSink {
    fn append(&mut self, record: &Record) -> crate::error::Result<()> {
        self.inner.append(record)?;
        if self.inner.records.len() >= self.after {
            self.flag.cancel();
        }
        Ok(())
    }
}

// ============================================================================
// Termination Tests
// ============================================================================

#[tokio::test]
async fn test_three_pages_then_empty_page() {
    let fetcher = ScriptedFetcher::default()
        .page(&url(1), body(&["a", "b"], Some(&url(2))))
        .page(&url(2), body(&["c", "d"], Some(&url(3))))
        .page(&url(3), body(&["e", "f"], Some(&url(4))))
        // next link on the empty page must not be followed
        .page(&url(4), body(&[], Some(&url(5))));
    let calls = fetcher.calls();

    let mut sink = MemorySink::new();
    let run = engine(fetcher).run(url(1), &mut sink).await.unwrap();

    assert_eq!(run.total_records(), 6);
    assert_eq!(run.total_pages(), 4);
    assert_eq!(run.stop_reason, StopReason::EmptyBatch);
    assert_eq!(run.cursor, None);
    assert_eq!(calls.lock().unwrap().len(), 4);
}

#[tokio::test]
async fn test_next_link_only_on_first_two_pages() {
    let fetcher = ScriptedFetcher::default()
        .page(&url(1), body(&["a"], Some(&url(2))))
        .page(&url(2), body(&["b"], Some(&url(3))))
        .page(&url(3), body(&["c"], None));

    let mut sink = MemorySink::new();
    let run = engine(fetcher).run(url(1), &mut sink).await.unwrap();

    assert_eq!(run.cursor, None);
    assert_eq!(run.stop_reason, StopReason::Exhausted);
    assert_eq!(run.total_pages(), 3);
    assert_eq!(values(&run), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_page_cap_keeps_cursor() {
    let fetcher = ScriptedFetcher::default()
        .page(&url(1), body(&["a"], Some(&url(2))))
        .page(&url(2), body(&["b"], Some(&url(3))))
        .page(&url(3), body(&["c"], Some(&url(4))));

    let mut sink = MemorySink::new();
    let run = engine(fetcher)
        .with_policy(fast_policy().with_max_pages(2))
        .run(url(1), &mut sink)
        .await
        .unwrap();

    assert_eq!(run.total_pages(), 2);
    assert_eq!(run.stop_reason, StopReason::PageLimit);
    assert_eq!(run.cursor, Some(url(3)));
}

#[tokio::test]
async fn test_empty_page_continues_when_policy_allows() {
    let fetcher = ScriptedFetcher::default()
        .page(&url(1), body(&[], Some(&url(2))))
        .page(&url(2), body(&["b"], None));

    let mut sink = MemorySink::new();
    let run = engine(fetcher)
        .with_policy(fast_policy().with_stop_on_empty_batch(false))
        .run(url(1), &mut sink)
        .await
        .unwrap();

    assert_eq!(run.total_pages(), 2);
    assert_eq!(values(&run), vec!["b"]);
}

#[tokio::test]
async fn test_offset_chain_stops_on_empty_batch() {
    let fetcher = ScriptedFetcher::default()
        .page(&PageReference::offset(0), "rec a\nrec b\nnext-offset 2")
        .page(&PageReference::offset(2), "rec c\nnext-offset 4")
        .page(&PageReference::offset(4), "next-offset 6");

    let mut sink = MemorySink::new();
    let run = engine(fetcher)
        .run(PageReference::offset(0), &mut sink)
        .await
        .unwrap();

    assert_eq!(run.total_pages(), 3);
    assert_eq!(run.total_records(), 3);
    assert_eq!(run.stop_reason, StopReason::EmptyBatch);
}

// ============================================================================
// Sink Tests
// ============================================================================

#[tokio::test]
async fn test_run_records_match_sink_appends() {
    let fetcher = ScriptedFetcher::default()
        .page(&url(1), body(&["a", "b"], Some(&url(2))))
        .page(&url(2), body(&["c"], None));

    let mut sink = MemorySink::new();
    let run = engine(fetcher).run(url(1), &mut sink).await.unwrap();

    assert_eq!(run.records, sink.records);
    assert_eq!(run.total_records(), sink.records.len());
    assert_eq!(
        sink.records[2].get("page"),
        Some("https://quotes.test/page/2/")
    );
}

#[tokio::test]
async fn test_sink_failure_is_fatal() {
    let fetcher = ScriptedFetcher::default()
        .page(&url(1), body(&["a", "b"], Some(&url(2))))
        .page(&url(2), body(&["c"], None));
    let calls = fetcher.calls();

    let mut sink = FailingSink { remaining: 1 };
    let err = engine(fetcher).run(url(1), &mut sink).await.unwrap_err();

    assert!(matches!(err, Error::Sink { .. }));
    // no further page is requested after the failure
    assert_eq!(calls.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_duplicates_never_reach_sink() {
    let fetcher = ScriptedFetcher::default()
        .page(&url(1), body(&["a", "b"], Some(&url(2))))
        .page(&url(2), body(&["b", "c"], None));

    let mut sink = MemorySink::new();
    let run = engine(fetcher)
        .with_dedup(SeenKeys::new("value"))
        .run(url(1), &mut sink)
        .await
        .unwrap();

    assert_eq!(values(&run), vec!["a", "b", "c"]);
    assert_eq!(run.stats.duplicates, 1);
    assert_eq!(sink.records.len(), 3);
}

// ============================================================================
// Fetch Error Tests
// ============================================================================

#[tokio::test]
async fn test_transient_error_is_retried() {
    let fetcher = ScriptedFetcher::default()
        .page(&url(1), body(&["a"], None))
        .fail_first(&url(1), &[503, 502]);
    let calls = fetcher.calls();

    let mut sink = MemorySink::new();
    let run = engine(fetcher).run(url(1), &mut sink).await.unwrap();

    assert_eq!(run.total_records(), 1);
    assert_eq!(run.stats.retries, 2);
    assert_eq!(calls.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_retries_exhausted_is_fatal() {
    let fetcher = ScriptedFetcher::default()
        .page(&url(1), body(&["a"], None))
        .fail_first(&url(1), &[503, 503, 503, 503]);
    let calls = fetcher.calls();

    let mut sink = MemorySink::new();
    let err = engine(fetcher)
        .with_retry(fast_retry(2))
        .run(url(1), &mut sink)
        .await
        .unwrap_err();

    assert!(matches!(err, Error::HttpStatus { status: 503, .. }));
    assert_eq!(calls.lock().unwrap().len(), 3);
    assert!(sink.records.is_empty());
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let fetcher = ScriptedFetcher::default().page(&url(1), body(&["a"], Some(&url(2))));
    let calls = fetcher.calls();

    let mut sink = MemorySink::new();
    let err = engine(fetcher).run(url(1), &mut sink).await.unwrap_err();

    assert!(matches!(err, Error::HttpStatus { status: 404, .. }));
    assert_eq!(calls.lock().unwrap().len(), 2);
    // the first page was already sunk
    assert_eq!(sink.records.len(), 1);
}

// ============================================================================
// Cancellation Tests
// ============================================================================

#[tokio::test]
async fn test_cancel_before_start() {
    let fetcher = ScriptedFetcher::default().page(&url(1), body(&["a"], None));
    let calls = fetcher.calls();
    let flag = CancelFlag::new();
    flag.cancel();

    let mut sink = MemorySink::new();
    let run = engine(fetcher)
        .with_cancel_flag(flag)
        .run(url(1), &mut sink)
        .await
        .unwrap();

    assert!(run.cancelled());
    assert_eq!(run.total_pages(), 0);
    assert_eq!(run.cursor, Some(url(1)));
    assert!(calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_cancel_mid_run_keeps_partial_results() {
    let fetcher = ScriptedFetcher::default()
        .page(&url(1), body(&["a", "b"], Some(&url(2))))
        .page(&url(2), body(&["c"], None));
    let flag = CancelFlag::new();

    let mut sink = CancellingSink {
        inner: MemorySink::new(),
        after: 1,
        flag: flag.clone(),
    };
    let run = engine(fetcher)
        .with_cancel_flag(flag)
        .run(url(1), &mut sink)
        .await
        .unwrap();

    // the page in flight is finished before stopping
    assert!(run.cancelled());
    assert_eq!(values(&run), vec!["a", "b"]);
    assert_eq!(run.cursor, Some(url(2)));
    assert_eq!(sink.inner.records.len(), 2);
}

// ============================================================================
// Seed Tests
// ============================================================================

fn seeds() -> Vec<Seed> {
    vec![
        Seed::new("Travel", PageReference::url("https://books.test/travel/1")),
        Seed::new("Mystery", PageReference::url("https://books.test/mystery/1")),
    ]
}

fn seeded_fetcher() -> ScriptedFetcher {
    let travel2 = PageReference::url("https://books.test/travel/2");
    ScriptedFetcher::default()
        .page(&seeds()[0].reference, body(&["t1"], Some(&travel2)))
        .page(&travel2, body(&["t2"], None))
        .page(&seeds()[1].reference, body(&["m1"], None))
}

#[tokio::test]
async fn test_run_seeds_labels_records() {
    let mut sink = MemorySink::new();
    let run = engine(seeded_fetcher())
        .run_seeds(&seeds(), &mut sink)
        .await
        .unwrap();

    assert_eq!(values(&run), vec!["t1", "t2", "m1"]);
    assert_eq!(run.stats.seeds_completed, 2);
    assert_eq!(run.total_pages(), 3);
    let labels: Vec<_> = run.records.iter().filter_map(|r| r.get("seed")).collect();
    assert_eq!(labels, vec!["Travel", "Travel", "Mystery"]);
}

#[tokio::test]
async fn test_page_cap_applies_per_seed() {
    let mut sink = MemorySink::new();
    let run = engine(seeded_fetcher())
        .with_policy(fast_policy().with_max_pages(1))
        .run_seeds(&seeds(), &mut sink)
        .await
        .unwrap();

    assert_eq!(values(&run), vec!["t1", "m1"]);
}

#[tokio::test]
async fn test_discover_seeds() {
    let root = PageReference::url("https://books.test/");
    let fetcher = ScriptedFetcher::default().page(
        &root,
        r#"<ul class="cats"><li><a href="/travel/1">Travel</a></li><li><a href="mystery/1"> Mystery </a></li></ul>"#,
    );

    let seeds = engine(fetcher)
        .discover_seeds(&root, "ul.cats a")
        .await
        .unwrap();

    assert_eq!(seeds.len(), 2);
    assert_eq!(seeds[1].label, "Mystery");
    assert_eq!(
        seeds[1].reference,
        PageReference::url("https://books.test/mystery/1")
    );
}

// ============================================================================
// Checkpoint Tests
// ============================================================================

fn three_page_fetcher() -> ScriptedFetcher {
    ScriptedFetcher::default()
        .page(&url(1), body(&["a"], Some(&url(2))))
        .page(&url(2), body(&["b"], Some(&url(3))))
        .page(&url(3), body(&["c"], None))
}

#[tokio::test]
async fn test_resume_from_checkpoint() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("quotes.checkpoint.json");

    let mut sink = MemorySink::new();
    let first = engine(three_page_fetcher())
        .with_policy(fast_policy().with_max_pages(1))
        .with_checkpoint(CheckpointStore::new(&path, "quotes"))
        .run(url(1), &mut sink)
        .await
        .unwrap();
    assert_eq!(values(&first), vec!["a"]);

    let fetcher = three_page_fetcher();
    let calls = fetcher.calls();
    let store = CheckpointStore::open(&path, "quotes").await.unwrap();
    let mut engine = engine(fetcher).with_checkpoint(store);
    let second = engine.run(url(1), &mut sink).await.unwrap();

    assert_eq!(values(&second), vec!["b", "c"]);
    assert_eq!(calls.lock().unwrap()[0], url(2).to_string());

    let checkpoint = engine.checkpoint().unwrap().checkpoint();
    assert!(checkpoint.completed);
    assert_eq!(checkpoint.pages_fetched, 3);
    assert_eq!(checkpoint.records_written, 3);
}

#[tokio::test]
async fn test_completed_checkpoint_starts_over() {
    let mut store = CheckpointStore::in_memory("quotes");
    store.complete().await.unwrap();

    let mut sink = MemorySink::new();
    let run = engine(three_page_fetcher())
        .with_checkpoint(store)
        .run(url(1), &mut sink)
        .await
        .unwrap();

    assert_eq!(values(&run), vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_completed_seeds_are_skipped() {
    let mut store = CheckpointStore::in_memory("books");
    store.complete_seed("Travel").await.unwrap();

    let mut sink = MemorySink::new();
    let run = engine(seeded_fetcher())
        .with_checkpoint(store)
        .run_seeds(&seeds(), &mut sink)
        .await
        .unwrap();

    assert_eq!(values(&run), vec!["m1"]);
}
