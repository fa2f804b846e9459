//! On-disk state for FeedPulse: the last-run marker and the record cache.
//!
//! Two files, both owned exclusively by this crate:
//! - `last_run` — a single ISO-8601 timestamp, plain text
//! - `cache.json` — a wholesale [`CacheSnapshot`] (`{taken_at, records}`)
//!
//! **Access rules:** single process, one invocation at a time. Overlapping
//! scheduled runs would race on both files; no locking is implemented.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use feedpulse_shared::{CacheSnapshot, FeedPulseError, Record, Result};

// ---------------------------------------------------------------------------
// RunStateStore
// ---------------------------------------------------------------------------

/// Persists the timestamp of the last fully successful pipeline run.
pub struct RunStateStore {
    path: PathBuf,
}

impl RunStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the persisted marker.
    ///
    /// Missing, unreadable, or corrupt state is treated as "first run":
    /// it logs a warning and returns `None`, never failing the pipeline.
    pub fn last_run(&self) -> Option<DateTime<Utc>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no run state, treating as first run");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "run state unreadable, treating as first run");
                return None;
            }
        };

        match DateTime::parse_from_rfc3339(raw.trim()) {
            Ok(t) => Some(t.with_timezone(&Utc)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "run state corrupt, treating as first run");
                None
            }
        }
    }

    /// Overwrite the marker atomically: write a `.tmp` sibling, then rename.
    pub fn save_last_run(&self, t: DateTime<Utc>) -> Result<()> {
        write_atomic(&self.path, t.to_rfc3339().as_bytes())?;
        info!(path = %self.path.display(), last_run = %t, "run state saved");
        Ok(())
    }
}

/// Write-whole-file via temp path + rename, creating parent dirs as needed.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| FeedPulseError::io(parent, e))?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes).map_err(|e| FeedPulseError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| FeedPulseError::io(path, e))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// RecordCache
// ---------------------------------------------------------------------------

/// Age-bounded snapshot cache of the full record corpus.
///
/// A snapshot younger than the freshness window is served as-is; anything
/// else (stale, missing, corrupt) triggers the supplied fetch function and
/// a wholesale rewrite.
pub struct RecordCache {
    path: PathBuf,
    ttl: Duration,
}

impl RecordCache {
    pub fn new(path: impl Into<PathBuf>, ttl_minutes: i64) -> Self {
        Self {
            path: path.into(),
            ttl: Duration::minutes(ttl_minutes),
        }
    }

    /// Return cached records, refetching through `fetch` when needed.
    ///
    /// `force_refresh` bypasses the freshness check entirely. A corrupt or
    /// missing snapshot is treated identically to a stale one.
    pub async fn load<F, Fut>(&self, force_refresh: bool, fetch: F) -> Result<Vec<Record>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Record>>>,
    {
        if !force_refresh {
            if let Some(snapshot) = self.read_snapshot() {
                let age = Utc::now() - snapshot.taken_at;
                if age < self.ttl {
                    debug!(
                        records = snapshot.records.len(),
                        age_minutes = age.num_minutes(),
                        "serving fresh cache snapshot"
                    );
                    return Ok(snapshot.records);
                }
                debug!(age_minutes = age.num_minutes(), "cache snapshot stale");
            }
        }

        let records = fetch().await?;
        self.write_snapshot(&records)?;
        info!(records = records.len(), path = %self.path.display(), "cache snapshot refreshed");
        Ok(records)
    }

    /// Age of the current snapshot, if one exists and parses.
    pub fn snapshot_age(&self) -> Option<Duration> {
        self.read_snapshot().map(|s| Utc::now() - s.taken_at)
    }

    /// Point lookup by record id over the persisted snapshot.
    ///
    /// Errors with [`FeedPulseError::NoCachedData`] when no snapshot exists,
    /// so "nothing loaded" is distinguishable from "nothing matched".
    pub fn find(&self, id: &str) -> Result<Option<Record>> {
        let snapshot = self.require_snapshot()?;
        Ok(snapshot.records.into_iter().find(|r| r.id == id))
    }

    /// Case-insensitive substring search across title and body.
    pub fn search_text(&self, needle: &str) -> Result<Vec<Record>> {
        let snapshot = self.require_snapshot()?;
        let needle = needle.to_lowercase();
        Ok(snapshot
            .records
            .into_iter()
            .filter(|r| {
                r.title.to_lowercase().contains(&needle)
                    || r.body.to_lowercase().contains(&needle)
            })
            .collect())
    }

    /// Case-insensitive substring search over one named field.
    pub fn search_by_field(&self, field: &str, needle: &str) -> Result<Vec<Record>> {
        let snapshot = self.require_snapshot()?;
        let needle = needle.to_lowercase();

        let matches = |r: &Record| -> Result<bool> {
            let haystack = match field {
                "id" => r.id.clone(),
                "title" => r.title.clone(),
                "body" => r.body.clone(),
                "status" => r.status.clone(),
                "priority" => r.priority.clone(),
                "category" => r.category.clone(),
                "tags" => r.tags.join(" "),
                other => {
                    return Err(FeedPulseError::Cache(format!(
                        "unknown search field '{other}'"
                    )));
                }
            };
            Ok(haystack.to_lowercase().contains(&needle))
        };

        let mut out = Vec::new();
        for record in snapshot.records {
            if matches(&record)? {
                out.push(record);
            }
        }
        Ok(out)
    }

    fn require_snapshot(&self) -> Result<CacheSnapshot> {
        self.read_snapshot().ok_or(FeedPulseError::NoCachedData)
    }

    fn read_snapshot(&self) -> Option<CacheSnapshot> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cache snapshot corrupt, ignoring");
                None
            }
        }
    }

    fn write_snapshot(&self, records: &[Record]) -> Result<()> {
        let snapshot = CacheSnapshot {
            taken_at: Utc::now(),
            records: records.to_vec(),
        };
        let bytes = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| FeedPulseError::Cache(format!("serializing snapshot: {e}")))?;
        write_atomic(&self.path, &bytes)
    }
}
