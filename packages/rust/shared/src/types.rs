//! Core domain types for FeedPulse digests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sentinel for records with no assignee-style value upstream.
pub const UNASSIGNED: &str = "Unassigned";
/// Sentinel for absent priority/category values.
pub const NONE_SENTINEL: &str = "None";
/// Sentinel for empty/null custom attributes.
pub const UNSET: &str = "unset";

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper tagging one pipeline invocation (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Generate a new time-sortable run identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RunId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// A single comment on a record. Only a bounded recent window is retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub text: String,
}

/// A custom attribute flattened to one display string.
///
/// Multi-value source structures are joined with `", "`; empty or null
/// values collapse to [`UNSET`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomField {
    pub name: String,
    pub value: String,
}

/// A normalized feedback item from the upstream tracker.
///
/// `id` is unique within a fetch batch and `updated_at >= created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Stable, source-assigned key (e.g. `FDB-123`).
    pub id: String,
    pub title: String,
    /// Plain text flattened from the source's rich document tree,
    /// truncated to a bounded length during normalization.
    pub body: String,
    pub status: String,
    pub priority: String,
    pub category: String,
    /// Display order is input order; dedup treats tags as a set.
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Most recent comments only (last 3 at normalization time).
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
}

// ---------------------------------------------------------------------------
// CacheSnapshot
// ---------------------------------------------------------------------------

/// On-disk cache payload: one wholesale snapshot of all known records.
///
/// Replaced in full on refresh, never merged or patched in place. Considered
/// fresh for a fixed window measured from `taken_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub taken_at: DateTime<Utc>,
    pub records: Vec<Record>,
}

// ---------------------------------------------------------------------------
// Analysis output
// ---------------------------------------------------------------------------

/// One tag with its occurrence count across a record set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

/// Locally computed counts for a digest window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DigestMetrics {
    /// All records considered this run.
    pub total: usize,
    /// Created within the lookback window.
    pub new: usize,
    /// Updated within the window but created earlier.
    pub updated: usize,
    /// Most frequent tags, descending, ties broken by first-seen order.
    pub top_tags: Vec<TagCount>,
}

/// Structured result of one summarization call.
///
/// The section-count contract (exactly 3 bullets per list) is requested of
/// the generative service but never assumed: lists may hold fewer or more.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Prose summary. Always non-empty when the input was non-empty.
    pub summary_text: String,
    pub high_priority: Vec<String>,
    pub recommendations: Vec<String>,
    pub metrics: DigestMetrics,
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

/// A fully rendered digest, ready for a notification sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub subject: String,
    /// Plain-text body.
    pub text_body: String,
    /// Markdown-decorated body (pill-tagged categories, record links).
    pub rich_body: String,
}
