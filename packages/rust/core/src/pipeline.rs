//! End-to-end digest pipeline: run state → fetch → analyze → report → persist.

use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, instrument};

use feedpulse_digest::Summarizer;
use feedpulse_report::NotificationSink;
use feedpulse_shared::{AppConfig, DigestConfig, Result, RunId};
use feedpulse_source::normalize::{NormalizeOptions, normalize};
use feedpulse_source::{FetchWindow, TrackerClient};
use feedpulse_store::{RecordCache, RunStateStore};

const RUN_STATE_FILE: &str = "last_run";
const CACHE_FILE: &str = "cache.json";

/// Everything a single pipeline invocation needs.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Loaded application config (tracker, llm, report sections).
    pub app: AppConfig,
    /// Runtime digest bounds merged from config file + CLI flags.
    pub digest: DigestConfig,
    /// Directory holding the run-state marker and the record cache.
    pub state_dir: PathBuf,
    /// Bypass the cache freshness window for the trend corpus.
    pub force_refresh: bool,
    /// Ignore run state and digest the full corpus.
    pub fetch_all: bool,
    /// Render and deliver but do not advance the run marker.
    pub dry_run: bool,
}

/// Outcome of one pipeline invocation.
#[derive(Debug)]
pub struct DigestRunResult {
    pub run_id: RunId,
    /// Records in the digest batch.
    pub total: usize,
    pub new: usize,
    pub updated: usize,
    /// Whether a report was handed to the sink.
    pub notified: bool,
    pub elapsed: std::time::Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called once the batch size is known.
    fn batch_fetched(&self, count: usize);
    /// Called when the pipeline completes.
    fn done(&self, result: &DigestRunResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn batch_fetched(&self, _count: usize) {}
    fn done(&self, _result: &DigestRunResult) {}
}

/// Run the full digest pipeline.
///
/// 1. Load run state (missing/corrupt = first run)
/// 2. Fetch the windowed batch from the tracker
/// 3. Load the trend corpus through the cache
/// 4. Analyze (skipped for an empty batch)
/// 5. Assemble and deliver the report
/// 6. Persist run state
///
/// Any error short-circuits before step 6, so a failed run is retried over
/// the same window next time. A successful zero-record run still advances
/// the marker; otherwise the lookback would grow without bound on quiet
/// projects.
#[instrument(skip_all, fields(force_refresh = config.force_refresh, fetch_all = config.fetch_all))]
pub async fn run_digest(
    config: &RunConfig,
    sink: &dyn NotificationSink,
    progress: &dyn ProgressReporter,
) -> Result<DigestRunResult> {
    let start = Instant::now();
    // Captured before any fetch: this is both the window anchor and the
    // value persisted as the new marker, so records updated mid-run fall
    // into the next window instead of being skipped.
    let started_at = Utc::now();
    let run_id = RunId::new();
    info!(%run_id, "starting digest run");

    let state_store = RunStateStore::new(config.state_dir.join(RUN_STATE_FILE));
    let cache = RecordCache::new(
        config.state_dir.join(CACHE_FILE),
        config.digest.cache_ttl_minutes,
    );
    let client = TrackerClient::new(&config.app.tracker, config.digest.max_results)?;
    let summarizer = Summarizer::new(&config.app.llm, config.digest.top_tags)?;
    let normalize_opts = NormalizeOptions {
        body_limit: config.digest.body_limit,
        comment_window: config.digest.comment_window,
    };

    // --- Phase 1: run state ---
    progress.phase("Loading run state");
    let last_run = state_store.last_run();
    let window = if config.fetch_all {
        FetchWindow::All
    } else {
        match last_run {
            Some(t) => FetchWindow::Since(t),
            None => FetchWindow::Lookback {
                days: config.digest.lookback_days,
            },
        }
    };
    // The cutoff, not the raw marker, anchors the new/updated split: on a
    // first run the lookback cutoff still separates records created inside
    // the window from old ones that were merely touched.
    let window_start = window.cutoff(started_at);
    info!(?window, "fetch window resolved");

    // --- Phase 2: fetch batch ---
    progress.phase("Fetching records");
    let raw = client.fetch(window).await?;
    let batch = normalize(raw, &normalize_opts);
    progress.batch_fetched(batch.len());
    info!(records = batch.len(), "batch fetched");

    // --- Phase 3: trend corpus through the cache ---
    let history = if batch.is_empty() {
        Vec::new()
    } else {
        progress.phase("Loading record cache");
        cache
            .load(config.force_refresh, || async {
                let raw = client.fetch(FetchWindow::All).await?;
                Ok(normalize(raw, &normalize_opts))
            })
            .await?
    };

    // --- Phase 4: analysis ---
    progress.phase("Analyzing");
    let analysis = summarizer.analyze(&batch, &history, window_start).await?;

    // --- Phase 5: report ---
    let notified = if batch.is_empty() {
        info!("empty batch, no report delivered");
        false
    } else {
        progress.phase("Delivering report");
        let report = feedpulse_report::assemble(
            &analysis,
            &batch,
            &config.app.tracker.base_url,
            &run_id,
        );
        sink.deliver(&report, &config.app.report.recipient, &run_id)?;
        true
    };

    // --- Phase 6: persist run state ---
    if config.dry_run {
        info!("dry run, run state not advanced");
    } else {
        state_store.save_last_run(started_at)?;
    }

    let result = DigestRunResult {
        run_id,
        total: analysis.metrics.total,
        new: analysis.metrics.new,
        updated: analysis.metrics.updated,
        notified,
        elapsed: start.elapsed(),
    };
    info!(
        total = result.total,
        new = result.new,
        updated = result.updated,
        notified = result.notified,
        elapsed_ms = result.elapsed.as_millis() as u64,
        "digest run complete"
    );
    progress.done(&result);
    Ok(result)
}
