//! Tracker source adapter: time-filtered fetch + normalization.
//!
//! [`TrackerClient`] queries the upstream tracker's search endpoint for
//! records changed since a cutoff (or the full corpus) and returns raw
//! payloads; [`normalize`] flattens them into [`Record`]s.
//!
//! The adapter fetches a single bounded page (`max_results` cap) and never
//! retries internally — retry policy belongs to the caller.

pub mod normalize;

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument};
use url::Url;

use feedpulse_shared::{FeedPulseError, Result, TrackerConfig};

pub use normalize::{NormalizeOptions, normalize};

/// User-Agent string for tracker requests.
const USER_AGENT: &str = concat!("FeedPulse/", env!("CARGO_PKG_VERSION"));

/// Search endpoint path relative to the tracker base URL.
const SEARCH_PATH: &str = "/rest/api/3/search";

// ---------------------------------------------------------------------------
// Fetch window
// ---------------------------------------------------------------------------

/// Which slice of the corpus a fetch targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchWindow {
    /// No prior run state: fall back to the fixed lookback window.
    Lookback { days: i64 },
    /// Records with `updated_at >= cutoff`.
    Since(DateTime<Utc>),
    /// Full corpus, no time filter.
    All,
}

impl FetchWindow {
    /// The effective cutoff for this window as of `now`, if any.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Lookback { days } => Some(now - chrono::Duration::days(*days)),
            Self::Since(t) => Some(*t),
            Self::All => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Raw payload DTOs
// ---------------------------------------------------------------------------

/// Search response envelope from the tracker.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub issues: Vec<RawRecord>,
    #[serde(default)]
    pub total: usize,
}

/// One record as returned by the tracker, fields still nested.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecord {
    pub key: String,
    pub fields: RawFields,
}

/// Nested field block of a raw record.
///
/// `description` and the custom attributes keep their source shape
/// (`serde_json::Value`) and are flattened during normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct RawFields {
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<serde_json::Value>,
    #[serde(default)]
    pub status: Option<NamedValue>,
    #[serde(default)]
    pub priority: Option<NamedValue>,
    #[serde(default)]
    pub components: Vec<NamedValue>,
    #[serde(default)]
    pub labels: Vec<String>,
    pub created: String,
    pub updated: String,
    #[serde(default)]
    pub comment: Option<RawCommentBlock>,
    /// Everything else, including `customfield_*` entries.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A `{"name": "..."}` wrapper used by status/priority/component fields.
#[derive(Debug, Clone, Deserialize)]
pub struct NamedValue {
    #[serde(default)]
    pub name: Option<String>,
}

/// Comment container: the tracker nests the list one level down.
#[derive(Debug, Clone, Deserialize)]
pub struct RawCommentBlock {
    #[serde(default)]
    pub comments: Vec<RawComment>,
}

/// One raw comment; body may be a rich document tree.
#[derive(Debug, Clone, Deserialize)]
pub struct RawComment {
    #[serde(default)]
    pub author: Option<RawAuthor>,
    #[serde(default)]
    pub body: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawAuthor {
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
}

/// Error envelope the tracker returns on failed requests.
#[derive(Debug, Clone, Deserialize)]
struct TrackerErrorBody {
    #[serde(rename = "errorMessages", default)]
    error_messages: Vec<String>,
}

// ---------------------------------------------------------------------------
// TrackerClient
// ---------------------------------------------------------------------------

/// HTTP client for the upstream tracker's search API.
pub struct TrackerClient {
    client: Client,
    base_url: Url,
    identity: String,
    token: String,
    project_key: String,
    max_results: u32,
}

impl TrackerClient {
    /// Build a client from the tracker section of the app config.
    ///
    /// Reads the API token from the configured env var; fails fast if it is
    /// missing so no request is ever sent unauthenticated.
    pub fn new(config: &TrackerConfig, max_results: u32) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            FeedPulseError::config(format!("invalid tracker.base_url '{}': {e}", config.base_url))
        })?;

        let token = std::env::var(&config.token_env).map_err(|_| {
            FeedPulseError::config(format!(
                "tracker token not found in env var {}",
                config.token_env
            ))
        })?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FeedPulseError::source(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            identity: config.identity.clone(),
            token,
            project_key: config.project_key.clone(),
            max_results,
        })
    }

    /// Build the time-filter query expression for a fetch window.
    fn build_query(&self, window: FetchWindow, now: DateTime<Utc>) -> String {
        match window.cutoff(now) {
            Some(cutoff) => format!(
                "project = {} AND updated >= \"{}\" ORDER BY updated DESC",
                self.project_key,
                cutoff.format("%Y-%m-%d %H:%M")
            ),
            None => format!("project = {} ORDER BY updated DESC", self.project_key),
        }
    }

    /// Fetch one bounded page of records for the given window.
    ///
    /// Any non-2xx response surfaces as [`FeedPulseError::Source`] carrying
    /// the HTTP status and the upstream error message.
    #[instrument(skip_all, fields(window = ?window))]
    pub async fn fetch(&self, window: FetchWindow) -> Result<Vec<RawRecord>> {
        let query = self.build_query(window, Utc::now());
        debug!(%query, max_results = self.max_results, "querying tracker");

        let url = self
            .base_url
            .join(SEARCH_PATH)
            .map_err(|e| FeedPulseError::source(format!("bad search URL: {e}")))?;

        let response = self
            .client
            .get(url)
            .basic_auth(&self.identity, Some(&self.token))
            .query(&[
                ("jql", query.as_str()),
                ("maxResults", &self.max_results.to_string()),
            ])
            .send()
            .await
            .map_err(|e| FeedPulseError::source(format!("tracker request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<TrackerErrorBody>(&body)
                .ok()
                .filter(|b| !b.error_messages.is_empty())
                .map(|b| b.error_messages.join("; "))
                .unwrap_or_else(|| {
                    if body.is_empty() {
                        status.to_string()
                    } else {
                        body.chars().take(200).collect()
                    }
                });
            return Err(FeedPulseError::source_status(status.as_u16(), message));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| FeedPulseError::source(format!("malformed search response: {e}")))?;

        info!(
            fetched = parsed.issues.len(),
            total = parsed.total,
            "tracker fetch complete"
        );

        Ok(parsed.issues)
    }
}
