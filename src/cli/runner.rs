//! CLI runner - executes commands

use crate::clean::{repair_csv, RepairOptions};
use crate::cli::commands::{Cli, Commands};
use crate::engine::{CancelFlag, ScrapeEngine, ScrapeRun};
use crate::error::{Error, Result, ResultExt};
use crate::extract::{FieldRule, FieldSource, HtmlExtractor, RecordExtractor};
use crate::http::{
    HttpClient, HttpClientConfig, HttpFetcher, ListingEndpoint, PageFetcher, RateLimiterConfig,
    RetryPolicy,
};
use crate::jobs::list_builtin_info;
use crate::loader::{
    load_job, FieldDefinition, FieldSourceKind, HttpDefinition, JobDefinition,
    PaginationDefinition, RequestDefinition, RetryDefinition, StrategyDefinition,
};
use crate::output::{
    read_jsonl, CsvAppendSink, CsvExporter, ExportOutcome, Finalizer, JsonExporter, JsonlSink,
    TeeSink,
};
use crate::pagination::{
    NextLinkPaginator, NoPaginator, OffsetPaginator, PageReference, PaginationPolicy, Paginator,
};
use crate::record::FieldSet;
use crate::state::{CheckpointStore, SeenKeys};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Per-invocation settings layered over a job definition
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Directory relative output paths are resolved against
    pub output_dir: PathBuf,
    /// JSON Lines path override
    pub jsonl: Option<PathBuf>,
    /// CSV export path override
    pub csv: Option<PathBuf>,
    /// Inter-page delay override in milliseconds
    pub delay_ms: Option<u64>,
    /// Page cap override
    pub max_pages: Option<u32>,
    /// Continue from the checkpoint
    pub resume: bool,
    /// Suppress the BOM on the CSV export
    pub no_bom: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            jsonl: None,
            csv: None,
            delay_ms: None,
            max_pages: None,
            resume: false,
            no_bom: false,
        }
    }
}

/// Result of a job run: the engine outcome plus every file written
#[derive(Debug)]
pub struct RunSummary {
    /// Engine outcome
    pub run: ScrapeRun,
    /// Files written, incremental sinks first
    pub outputs: Vec<PathBuf>,
}

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Run {
                output_dir,
                jsonl,
                csv,
                delay_ms,
                max_pages,
                resume,
                no_bom,
            } => {
                let options = RunOptions {
                    output_dir: output_dir.clone(),
                    jsonl: jsonl.clone(),
                    csv: csv.clone(),
                    delay_ms: *delay_ms,
                    max_pages: *max_pages,
                    resume: *resume,
                    no_bom: *no_bom,
                };
                self.scrape(&options).await
            }
            Commands::Validate => self.validate(),
            Commands::List => Self::list_jobs(),
            Commands::Show => self.show(),
            Commands::Repair {
                input,
                output,
                no_dedup,
                no_bom,
            } => Self::repair(input, output, *no_dedup, *no_bom),
        }
    }

    /// Load the job definition named by `--job`
    fn load_job(&self) -> Result<JobDefinition> {
        let path = self
            .cli
            .job
            .as_ref()
            .ok_or_else(|| Error::config("Job not specified (use -j flag)"))?;
        load_job(path)
    }

    /// Run the job and print the summary
    async fn scrape(&self, options: &RunOptions) -> Result<()> {
        let job = self.load_job()?;
        let cancel = CancelFlag::new();
        cancel.install_ctrl_c_handler();

        let summary = Self::run_job(&job, options, cancel).await?;
        Self::print_summary(&summary);
        Ok(())
    }

    /// Run a job end to end: paginate into the incremental sinks, then export
    pub async fn run_job(
        job: &JobDefinition,
        options: &RunOptions,
        cancel: CancelFlag,
    ) -> Result<RunSummary> {
        let job = apply_overrides(job.clone(), options);
        let out = &options.output_dir;
        std::fs::create_dir_all(out)
            .with_context(|| format!("Failed to create output directory '{}'", out.display()))?;

        let (engine, fields) = build_engine(&job)?;
        let mut engine = engine.with_cancel_flag(cancel);

        let jsonl_path = resolve(
            out,
            job.output
                .jsonl
                .clone()
                .unwrap_or_else(|| format!("{}.jsonl", job.name)),
        );
        let checkpoint_path = out.join(format!("{}.checkpoint.json", job.name));

        let checkpoint = if options.resume {
            CheckpointStore::open(&checkpoint_path, &job.name).await?
        } else {
            CheckpointStore::new(&checkpoint_path, job.name.as_str())
        };
        // A finished run has nothing to continue; start over with fresh outputs
        let resume = options.resume && !checkpoint.checkpoint().completed;
        if options.resume && !resume {
            info!(job = %job.name, "Previous run completed, starting a fresh run");
        }
        engine = engine.with_checkpoint(checkpoint);

        if let Some(key) = &job.output.dedup_key {
            let mut seen = SeenKeys::new(key);
            if resume {
                let loaded = seen.load_from_jsonl(&jsonl_path)?;
                info!(loaded, key = %key, "Loaded keys from previous output");
            }
            engine = engine.with_dedup(seen);
        }

        let mut outputs = vec![jsonl_path.clone()];
        let jsonl = if resume {
            JsonlSink::append_to(&jsonl_path)?
        } else {
            JsonlSink::create(&jsonl_path)?
        };
        let mut sink = TeeSink::new().with(jsonl);
        if let Some(path) = &job.output.csv_append {
            let path = resolve(out, path);
            let csv = if resume {
                CsvAppendSink::append_to(&path)?
            } else {
                CsvAppendSink::create(&path)?
            };
            sink = sink.with(csv);
            outputs.push(path);
        }

        let run = match (&job.seeds, &job.start.url) {
            (Some(seeds), Some(url)) => {
                let root = PageReference::url(url.as_str());
                let discovered = engine.discover_seeds(&root, &seeds.selector).await?;
                if discovered.is_empty() {
                    warn!(selector = %seeds.selector, "No seeds found on the start page");
                }
                engine.run_seeds(&discovered, &mut sink).await?
            }
            _ => engine.run(start_reference(&job)?, &mut sink).await?,
        };

        // Resumed runs export everything sunk so far, not just this invocation
        let records = if resume {
            read_jsonl(&jsonl_path, &fields)?
        } else {
            run.records.clone()
        };

        let mut finalizers: Vec<Box<dyn Finalizer>> = Vec::new();
        if let Some(path) = &job.output.csv {
            finalizers.push(Box::new(
                CsvExporter::new(resolve(out, path)).with_bom(job.output.bom),
            ));
        }
        if let Some(path) = &job.output.json {
            finalizers.push(Box::new(JsonExporter::new(resolve(out, path))));
        }
        for finalizer in &finalizers {
            if let ExportOutcome::Written { path, rows } = finalizer.finalize(&records)? {
                info!(path = %path.display(), rows, "Exported");
                outputs.push(path);
            }
        }

        Ok(RunSummary { run, outputs })
    }

    fn print_summary(summary: &RunSummary) {
        let stats = &summary.run.stats;
        if summary.run.cancelled() {
            println!("\nStopped early ({}).", summary.run.stop_reason);
        } else {
            println!("\nDone!");
        }
        println!(
            "Total pages: {}, total records: {} ({} skipped, {} duplicates)",
            stats.pages_fetched, stats.records_written, stats.skipped, stats.duplicates
        );
        if stats.seeds_completed > 0 {
            println!("Seeds completed: {}", stats.seeds_completed);
        }
        for path in &summary.outputs {
            println!("  -> {}", path.display());
        }
    }

    /// Validate job definition
    fn validate(&self) -> Result<()> {
        let job = self.load_job()?;
        build_engine(&job)?;

        println!(
            "Job '{}' is valid: {} fields, {} pagination",
            job.name,
            job.extract.fields.len(),
            strategy_name(&job.pagination.strategy)
        );
        Ok(())
    }

    /// Print the resolved job definition as YAML
    fn show(&self) -> Result<()> {
        let job = self.load_job()?;
        print!("{}", serde_yaml::to_string(&job)?);
        Ok(())
    }

    /// List built-in jobs
    fn list_jobs() -> Result<()> {
        for info in list_builtin_info() {
            let aliases = if info.aliases.is_empty() {
                String::new()
            } else {
                format!(" (aliases: {})", info.aliases.join(", "))
            };
            println!("{:<20} {:<20} {}{aliases}", info.name, info.pagination, info.description);
        }
        Ok(())
    }

    /// Clean a CSV file
    fn repair(input: &Path, output: &Path, no_dedup: bool, no_bom: bool) -> Result<()> {
        let options = RepairOptions {
            dedup: !no_dedup,
            bom: !no_bom,
            ..RepairOptions::default()
        };
        let report = repair_csv(input, output, options)
            .with_context(|| format!("Failed to repair '{}'", input.display()))?;

        println!(
            "Repaired {} rows: {} written, {} cells changed, {} duplicates dropped",
            report.rows_read, report.rows_written, report.cells_changed, report.duplicates_dropped
        );
        println!("  -> {}", output.display());
        Ok(())
    }
}

// ============================================================================
// Builders
// ============================================================================

/// Build the engine for a job, returning it with the job's field set
///
/// Sinks, checkpoint and dedup are left to the caller.
pub fn build_engine(job: &JobDefinition) -> Result<(ScrapeEngine, FieldSet)> {
    let client = HttpClient::with_config(build_http_config(&job.http))?;
    let fetcher = build_fetcher(client, job.request.as_ref());

    let extractor = HtmlExtractor::new(
        job.extract.rows.as_str(),
        build_rules(&job.extract.fields),
        build_paginator(&job.pagination.strategy)?,
    )?
    .with_encoding_repair(job.extract.repair_encoding);
    let fields = extractor.fields().clone();

    let engine = ScrapeEngine::new(fetcher, Box::new(extractor))
        .with_policy(build_policy(&job.pagination))
        .with_retry(build_retry(&job.retry));
    Ok((engine, fields))
}

fn build_http_config(def: &HttpDefinition) -> HttpClientConfig {
    let mut builder = HttpClientConfig::builder()
        .timeout(Duration::from_secs(def.timeout_secs))
        .user_agents(def.user_agents.iter().cloned());

    if let Some(rps) = def.requests_per_second {
        builder = builder.rate_limit(RateLimiterConfig::per_second(rps));
    } else {
        builder = builder.no_rate_limit();
    }

    for (key, value) in &def.headers {
        builder = builder.header(key, value);
    }

    builder.build()
}

fn build_fetcher(client: HttpClient, request: Option<&RequestDefinition>) -> Box<dyn PageFetcher> {
    match request {
        None => Box::new(HttpFetcher::new(client)),
        Some(def) => {
            let mut listing = ListingEndpoint::post(def.url.as_str())
                .with_offset_param(def.offset_param.as_str());
            listing.method = def.method;
            for (key, value) in &def.params {
                listing = listing.with_param(key, value);
            }
            Box::new(HttpFetcher::with_listing(client, listing))
        }
    }
}

fn build_paginator(def: &StrategyDefinition) -> Result<Box<dyn Paginator>> {
    Ok(match def {
        StrategyDefinition::None => Box::new(NoPaginator),
        StrategyDefinition::NextLink {
            selector,
            attribute,
        } => Box::new(NextLinkPaginator::new(selector.as_str())?.with_attribute(attribute.as_str())),
        StrategyDefinition::Offset { step } => Box::new(OffsetPaginator::new(*step)),
    })
}

fn build_rules(fields: &[FieldDefinition]) -> Vec<FieldRule> {
    fields.iter().map(build_rule).collect()
}

fn build_rule(def: &FieldDefinition) -> FieldRule {
    let source = match (&def.selector, def.cell, def.source) {
        (Some(selector), _, _) => FieldSource::Css {
            selector: selector.clone(),
            attribute: def.attribute.clone(),
        },
        (None, Some(index), _) => FieldSource::Cell(index),
        (None, None, Some(FieldSourceKind::PageUrl)) => FieldSource::PageUrl,
        (None, None, Some(FieldSourceKind::Seed)) => FieldSource::Seed,
        (None, None, Some(FieldSourceKind::Constant) | None) => {
            FieldSource::Constant(def.value.clone().unwrap_or_default())
        }
    };

    let mut rule = FieldRule::new(def.name.as_str(), source);
    if def.optional {
        rule = rule.optional();
    }
    if def.resolve_url {
        rule = rule.resolve_url();
    }
    rule
}

fn build_policy(def: &PaginationDefinition) -> PaginationPolicy {
    let policy = PaginationPolicy::new()
        .with_delay(Duration::from_millis(def.delay_ms))
        .with_jitter(Duration::from_millis(def.jitter_ms))
        .with_stop_on_empty_batch(def.stop_on_empty_batch);

    if def.unbounded {
        policy.unbounded()
    } else {
        policy.with_max_pages(def.max_pages)
    }
}

fn build_retry(def: &RetryDefinition) -> RetryPolicy {
    RetryPolicy::default()
        .with_max_retries(def.max_retries)
        .with_backoff(
            def.backoff,
            Duration::from_millis(def.initial_backoff_ms),
            Duration::from_millis(def.max_backoff_ms),
        )
}

// ============================================================================
// Helpers
// ============================================================================

/// Layer CLI overrides over the job's own settings
fn apply_overrides(mut job: JobDefinition, options: &RunOptions) -> JobDefinition {
    if let Some(path) = &options.jsonl {
        job.output.jsonl = Some(path.to_string_lossy().into_owned());
    }
    if let Some(path) = &options.csv {
        job.output.csv = Some(path.to_string_lossy().into_owned());
    }
    if let Some(delay) = options.delay_ms {
        job.pagination.delay_ms = delay;
    }
    if let Some(max_pages) = options.max_pages {
        job.pagination.max_pages = max_pages;
        job.pagination.unbounded = false;
    }
    if options.no_bom {
        job.output.bom = false;
    }
    job
}

fn start_reference(job: &JobDefinition) -> Result<PageReference> {
    match (&job.start.url, job.start.offset) {
        (Some(url), _) => Ok(PageReference::url(url.as_str())),
        (None, Some(offset)) => Ok(PageReference::offset(offset)),
        (None, None) => Err(Error::invalid_value("start", "url or offset is required")),
    }
}

/// Resolve an output path against the output directory; absolute paths stay
fn resolve(dir: &Path, path: impl AsRef<Path>) -> PathBuf {
    dir.join(path)
}

fn strategy_name(def: &StrategyDefinition) -> &'static str {
    match def {
        StrategyDefinition::None => "single page",
        StrategyDefinition::NextLink { .. } => "next link",
        StrategyDefinition::Offset { .. } => "offset",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_job_from_str;
    use pretty_assertions::assert_eq;

    const JOB: &str = r#"
name: vets
start:
  offset: 0
request:
  url: https://vets.test/list/
  method: GET
  offset_param: start
  params:
    status: all
pagination:
  strategy:
    type: offset
    step: 25
extract:
  rows: table tr
  fields:
    - name: license
      cell: 0
    - name: page
      source: page_url
    - name: site
      source: constant
      value: vets.test
    - name: link
      selector: a
      attribute: href
      optional: true
      resolve_url: true
output:
  csv: vets.csv
"#;

    #[test]
    fn test_build_rules() {
        let job = load_job_from_str(JOB).unwrap();
        let rules = build_rules(&job.extract.fields);

        assert_eq!(rules[0], FieldRule::cell("license", 0));
        assert_eq!(rules[1], FieldRule::page_url("page"));
        assert_eq!(rules[2], FieldRule::constant("site", "vets.test"));
        assert_eq!(
            rules[3],
            FieldRule::attr("link", "a", "href").optional().resolve_url()
        );
    }

    #[test]
    fn test_build_engine() {
        let job = load_job_from_str(JOB).unwrap();
        let (engine, fields) = build_engine(&job).unwrap();

        assert_eq!(fields.names(), &["license", "page", "site", "link"]);
        assert!(engine.policy().allows_page(999));
        assert!(!engine.policy().allows_page(1000));
    }

    #[test]
    fn test_build_policy_unbounded() {
        let def = PaginationDefinition {
            unbounded: true,
            ..PaginationDefinition::default()
        };
        assert!(build_policy(&def).allows_page(u32::MAX - 1));
    }

    #[test]
    fn test_apply_overrides() {
        let job = load_job_from_str(JOB).unwrap();
        let options = RunOptions {
            csv: Some(PathBuf::from("other.csv")),
            delay_ms: Some(0),
            max_pages: Some(5),
            no_bom: true,
            ..RunOptions::default()
        };

        let job = apply_overrides(job, &options);
        assert_eq!(job.output.csv.as_deref(), Some("other.csv"));
        assert_eq!(job.pagination.delay_ms, 0);
        assert_eq!(job.pagination.max_pages, 5);
        assert!(!job.output.bom);
        assert!(job.output.jsonl.is_none());
    }

    #[test]
    fn test_start_reference() {
        let job = load_job_from_str(JOB).unwrap();
        assert_eq!(start_reference(&job).unwrap(), PageReference::offset(0));
    }

    #[test]
    fn test_resolve_keeps_absolute_paths() {
        let dir = Path::new("/data/out");
        assert_eq!(resolve(dir, "a.csv"), PathBuf::from("/data/out/a.csv"));
        assert_eq!(resolve(dir, "/tmp/b.csv"), PathBuf::from("/tmp/b.csv"));
    }
}
