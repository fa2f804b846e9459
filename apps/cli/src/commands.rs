//! CLI command definitions, routing, and tracing setup.

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use feedpulse_core::pipeline::{DigestRunResult, ProgressReporter, RunConfig, run_digest};
use feedpulse_report::{FileSink, NotificationSink, StdoutSink};
use feedpulse_shared::{
    DigestConfig, Record, config_dir, config::expand_home, init_config, load_config,
    validate_credentials,
};
use feedpulse_store::{RecordCache, RunStateStore};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// FeedPulse — feedback-record digests for engineering teams.
#[derive(Parser)]
#[command(
    name = "feedpulse",
    version,
    about = "Digest new and changed feedback records into a periodic report.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the digest pipeline and deliver the report.
    Run {
        /// Refetch the trend corpus even if the cache is still fresh.
        #[arg(long)]
        force_refresh: bool,

        /// Digest the full corpus instead of the window since the last run.
        #[arg(long)]
        all: bool,

        /// Print the report to stdout and do not advance the run marker.
        #[arg(long)]
        dry_run: bool,
    },

    /// Search cached records by substring.
    Search {
        /// Text to look for (case-insensitive).
        text: String,

        /// Restrict the search to one field (title, body, status,
        /// priority, category, tags, id). Defaults to title + body.
        #[arg(long)]
        field: Option<String>,
    },

    /// Show one cached record in full.
    Show {
        /// Record id (e.g. FDB-123).
        id: String,
    },

    /// Show last run time and cache age.
    Status,

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "feedpulse=info",
        1 => "feedpulse=debug",
        _ => "feedpulse=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt().with_env_filter(env_filter).with_target(false).init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run {
            force_refresh,
            all,
            dry_run,
        } => cmd_run(force_refresh, all, dry_run).await,
        Command::Search { text, field } => cmd_search(&text, field.as_deref()).await,
        Command::Show { id } => cmd_show(&id).await,
        Command::Status => cmd_status().await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(force_refresh: bool, all: bool, dry_run: bool) -> Result<()> {
    // Fail on missing settings or secrets before any network call
    let config = load_config()?;
    validate_credentials(&config)?;

    let state_dir = config_dir()?;
    let reports_dir = expand_home(&config.report.reports_dir);
    let run_config = RunConfig {
        digest: DigestConfig::from(&config),
        app: config,
        state_dir,
        force_refresh,
        fetch_all: all,
        dry_run,
    };

    info!(force_refresh, all, dry_run, "starting digest run");

    let sink: Box<dyn NotificationSink> = if dry_run {
        Box::new(StdoutSink)
    } else {
        Box::new(FileSink::new(reports_dir))
    };
    let reporter = CliProgress::new();

    let result = run_digest(&run_config, sink.as_ref(), &reporter).await?;

    println!();
    if result.notified {
        println!("  Digest delivered.");
    } else {
        println!("  Nothing to report.");
    }
    println!("  Run:     {}", result.run_id);
    println!(
        "  Records: {} ({} new, {} updated)",
        result.total, result.new, result.updated
    );
    println!("  Time:    {:.1}s", result.elapsed.as_secs_f64());
    println!();

    Ok(())
}

async fn cmd_search(text: &str, field: Option<&str>) -> Result<()> {
    let config = load_config()?;
    let cache = open_cache(&config)?;

    let hits = match field {
        Some(field) => cache.search_by_field(field, text)?,
        None => cache.search_text(text)?,
    };

    if hits.is_empty() {
        println!("no matches for '{text}'");
        return Ok(());
    }
    for record in &hits {
        println!(
            "{}  {}  [{} | {} | {}]",
            record.id, record.title, record.status, record.priority, record.category
        );
    }
    println!("\n{} match(es)", hits.len());
    Ok(())
}

async fn cmd_show(id: &str) -> Result<()> {
    let config = load_config()?;
    let cache = open_cache(&config)?;

    match cache.find(id)? {
        Some(record) => print_record(&record),
        None => println!("no cached record with id '{id}'"),
    }
    Ok(())
}

async fn cmd_status() -> Result<()> {
    let config = load_config()?;
    let dir = config_dir()?;

    let state = RunStateStore::new(dir.join("last_run"));
    match state.last_run() {
        Some(t) => println!("last run:  {}", t.format("%Y-%m-%d %H:%M:%S UTC")),
        None => println!("last run:  never"),
    }

    let cache = open_cache(&config)?;
    match cache.snapshot_age() {
        Some(age) => println!("cache age: {} minute(s)", age.num_minutes()),
        None => println!("cache age: no snapshot"),
    }
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("created {}", path.display());
    println!("edit it, then set the token and API key environment variables.");
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config = load_config()?;
    let rendered = toml::to_string_pretty(&config)?;
    println!("{rendered}");
    Ok(())
}

fn open_cache(config: &feedpulse_shared::AppConfig) -> Result<RecordCache> {
    let dir = config_dir()?;
    Ok(RecordCache::new(
        dir.join("cache.json"),
        config.digest.cache_ttl_minutes,
    ))
}

fn print_record(record: &Record) {
    println!("{}  {}", record.id, record.title);
    println!(
        "status: {} | priority: {} | category: {}",
        record.status, record.priority, record.category
    );
    if !record.tags.is_empty() {
        println!("tags: {}", record.tags.join(", "));
    }
    println!(
        "created: {}  updated: {}",
        record.created_at.format("%Y-%m-%d %H:%M"),
        record.updated_at.format("%Y-%m-%d %H:%M")
    );
    if !record.body.is_empty() {
        println!("\n{}", record.body);
    }
    if !record.comments.is_empty() {
        println!("\ncomments:");
        for comment in &record.comments {
            println!("  {}: {}", comment.author, comment.text);
        }
    }
    if !record.custom_fields.is_empty() {
        println!("\nfields:");
        for field in &record.custom_fields {
            println!("  {} = {}", field.name, field.value);
        }
    }
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn batch_fetched(&self, count: usize) {
        self.spinner.set_message(format!("Fetched {count} record(s)"));
    }

    fn done(&self, _result: &DigestRunResult) {
        self.spinner.finish_and_clear();
    }
}
