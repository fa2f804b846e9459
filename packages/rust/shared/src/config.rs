//! Application configuration for FeedPulse.
//!
//! User config lives at `~/.feedpulse/feedpulse.toml`.
//! CLI flags override config file values, which override defaults.
//! Secrets are never stored in the file — only the names of the
//! environment variables that hold them.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FeedPulseError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "feedpulse.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".feedpulse";

// ---------------------------------------------------------------------------
// Config structs (matching feedpulse.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Upstream tracker connection.
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Generative text service settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Digest window and bounds.
    #[serde(default)]
    pub digest: DigestDefaultsConfig,

    /// Report delivery settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// `[tracker]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Base URL of the tracker API (e.g. `https://example.atlassian.net`).
    #[serde(default)]
    pub base_url: String,

    /// Identity for basic auth (account email or username).
    #[serde(default)]
    pub identity: String,

    /// Name of the env var holding the API token (never the token itself).
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Project key used in tracker queries (e.g. `FDB`).
    #[serde(default = "default_project_key")]
    pub project_key: String,

    /// Request timeout in seconds for tracker calls.
    #[serde(default = "default_tracker_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            identity: String::new(),
            token_env: default_token_env(),
            project_key: default_project_key(),
            timeout_secs: default_tracker_timeout_secs(),
        }
    }
}

fn default_token_env() -> String {
    "FEEDPULSE_TRACKER_TOKEN".into()
}
fn default_project_key() -> String {
    "FDB".into()
}
fn default_tracker_timeout_secs() -> u64 {
    30
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Chat-completions endpoint URL.
    #[serde(default = "default_llm_endpoint")]
    pub endpoint: String,

    /// Model to use for digest generation.
    #[serde(default = "default_model")]
    pub model: String,

    /// Request timeout in seconds for generative calls.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            endpoint: default_llm_endpoint(),
            model: default_model(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_llm_endpoint() -> String {
    "https://openrouter.ai/api/v1/chat/completions".into()
}
fn default_model() -> String {
    "moonshotai/kimi-k2.5".into()
}
fn default_llm_timeout_secs() -> u64 {
    120
}

/// `[digest]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestDefaultsConfig {
    /// Fallback lookback window (days) when no run state exists.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,

    /// Cache freshness window in minutes.
    #[serde(default = "default_cache_ttl_minutes")]
    pub cache_ttl_minutes: i64,

    /// Maximum records fetched per tracker call (single bounded page).
    #[serde(default = "default_max_results")]
    pub max_results: u32,

    /// Maximum characters retained from a flattened record body.
    #[serde(default = "default_body_limit")]
    pub body_limit: usize,

    /// Number of most recent comments retained per record.
    #[serde(default = "default_comment_window")]
    pub comment_window: usize,

    /// How many top tags to report in metrics.
    #[serde(default = "default_top_tags")]
    pub top_tags: usize,
}

impl Default for DigestDefaultsConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            cache_ttl_minutes: default_cache_ttl_minutes(),
            max_results: default_max_results(),
            body_limit: default_body_limit(),
            comment_window: default_comment_window(),
            top_tags: default_top_tags(),
        }
    }
}

fn default_lookback_days() -> i64 {
    4
}
fn default_cache_ttl_minutes() -> i64 {
    60
}
fn default_max_results() -> u32 {
    100
}
fn default_body_limit() -> usize {
    1000
}
fn default_comment_window() -> usize {
    3
}
fn default_top_tags() -> usize {
    5
}

/// `[report]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Recipient address handed to the notification sink.
    #[serde(default)]
    pub recipient: String,

    /// Directory where the file sink writes rendered reports.
    #[serde(default = "default_reports_dir")]
    pub reports_dir: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            recipient: String::new(),
            reports_dir: default_reports_dir(),
        }
    }
}

fn default_reports_dir() -> String {
    "~/.feedpulse/reports".into()
}

// ---------------------------------------------------------------------------
// Digest config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime digest configuration — merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct DigestConfig {
    pub lookback_days: i64,
    pub cache_ttl_minutes: i64,
    pub max_results: u32,
    pub body_limit: usize,
    pub comment_window: usize,
    pub top_tags: usize,
}

impl From<&AppConfig> for DigestConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            lookback_days: config.digest.lookback_days,
            cache_ttl_minutes: config.digest.cache_ttl_minutes,
            max_results: config.digest.max_results,
            body_limit: config.digest.body_limit,
            comment_window: config.digest.comment_window,
            top_tags: config.digest.top_tags,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.feedpulse/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| FeedPulseError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.feedpulse/feedpulse.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| FeedPulseError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| FeedPulseError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| FeedPulseError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| FeedPulseError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| FeedPulseError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that all required settings and secret env vars are present.
///
/// Runs before any network call so misconfiguration fails fast.
pub fn validate_credentials(config: &AppConfig) -> Result<()> {
    if config.tracker.base_url.is_empty() {
        return Err(FeedPulseError::config(
            "tracker.base_url is not set. Run `feedpulse config init` and edit the file.",
        ));
    }
    if config.tracker.identity.is_empty() {
        return Err(FeedPulseError::config("tracker.identity is not set"));
    }

    let token_var = &config.tracker.token_env;
    match std::env::var(token_var) {
        Ok(val) if !val.is_empty() => {}
        _ => {
            return Err(FeedPulseError::config(format!(
                "tracker token not found. Set the {token_var} environment variable."
            )));
        }
    }

    let key_var = &config.llm.api_key_env;
    match std::env::var(key_var) {
        Ok(val) if !val.is_empty() => Ok(()),
        _ => Err(FeedPulseError::config(format!(
            "LLM API key not found. Set the {key_var} environment variable."
        ))),
    }
}

/// Expand a leading `~` in a configured path against the user's home.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
