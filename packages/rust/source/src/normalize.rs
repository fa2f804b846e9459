//! Flattening of nested tracker payloads into plain [`Record`]s.
//!
//! The tracker nests three awkward shapes: rich-text document trees for
//! bodies and comments, `{"name"/"value": ...}` wrappers for enumerated
//! fields, and single-or-multi-value custom attributes. Each is reduced to
//! a flat scalar here, with sentinels for absent values.

use chrono::{DateTime, Utc};
use tracing::warn;

use feedpulse_shared::{Comment, CustomField, NONE_SENTINEL, Record, UNASSIGNED, UNSET};

use crate::{RawComment, RawRecord};

/// Bounds applied during normalization.
#[derive(Debug, Clone, Copy)]
pub struct NormalizeOptions {
    /// Maximum characters retained from a flattened body.
    pub body_limit: usize,
    /// Number of most recent comments retained.
    pub comment_window: usize,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            body_limit: 1000,
            comment_window: 3,
        }
    }
}

// ---------------------------------------------------------------------------
// Field tree
// ---------------------------------------------------------------------------

/// Explicit recursive shape of a nested tracker field.
///
/// Replaces runtime type inspection with one flattening rule per variant.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldTree {
    /// A leaf text node (`{"type": "text", "text": "..."}`).
    Text(String),
    /// An ordered sequence of nodes.
    List(Vec<FieldTree>),
    /// A container node with children and an optional own value.
    Object {
        value: Option<String>,
        children: Vec<FieldTree>,
    },
    /// A bare scalar (string, number, bool).
    Scalar(String),
    Null,
}

impl FieldTree {
    /// Classify a raw JSON value into the variant shape.
    pub fn from_value(value: &serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Null,
            Value::String(s) => Self::Scalar(s.clone()),
            Value::Number(n) => Self::Scalar(n.to_string()),
            Value::Bool(b) => Self::Scalar(b.to_string()),
            Value::Array(items) => Self::List(items.iter().map(Self::from_value).collect()),
            Value::Object(map) => {
                if let Some(Value::String(text)) = map.get("text") {
                    return Self::Text(text.clone());
                }
                // Attribute wrappers use "value" or "name" for their payload.
                let value = map
                    .get("value")
                    .or_else(|| map.get("name"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string);
                let children = map
                    .get("content")
                    .and_then(|c| c.as_array())
                    .map(|items| items.iter().map(Self::from_value).collect())
                    .unwrap_or_default();
                Self::Object { value, children }
            }
        }
    }

    /// Depth-first text concatenation, one arm per variant.
    pub fn flatten(&self) -> String {
        match self {
            Self::Text(text) => text.trim().to_string(),
            Self::Scalar(s) => s.trim().to_string(),
            Self::Null => String::new(),
            Self::List(items) => join_nonempty(items.iter().map(Self::flatten)),
            Self::Object { value, children } => {
                let own = value.clone().unwrap_or_default();
                let rest = join_nonempty(children.iter().map(Self::flatten));
                join_nonempty([own, rest].into_iter())
            }
        }
    }
}

fn join_nonempty(parts: impl Iterator<Item = String>) -> String {
    parts
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

// ---------------------------------------------------------------------------
// Flattening helpers
// ---------------------------------------------------------------------------

/// Flatten a rich-text document tree into bounded plain text.
pub fn flatten_body(value: Option<&serde_json::Value>, limit: usize) -> String {
    let text = value
        .map(|v| FieldTree::from_value(v).flatten())
        .unwrap_or_default();
    truncate_chars(text.trim(), limit)
}

/// Flatten a custom attribute into one display string.
///
/// Multi-value arrays are joined with `", "`; a single wrapper object
/// yields its value/name; scalars stringify; empty or null collapses to
/// [`UNSET`].
pub fn flatten_custom(value: &serde_json::Value) -> String {
    let flat = match FieldTree::from_value(value) {
        FieldTree::List(items) => {
            let parts: Vec<String> = items
                .iter()
                .map(FieldTree::flatten)
                .filter(|p| !p.is_empty())
                .collect();
            parts.join(", ")
        }
        tree => tree.flatten(),
    };
    if flat.is_empty() { UNSET.to_string() } else { flat }
}

/// Truncate to at most `limit` characters on a char boundary.
fn truncate_chars(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        text.chars().take(limit).collect()
    }
}

/// Parse a tracker timestamp: RFC 3339 or the legacy `+0000` offset form.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.3f%z"))
        .map(|t| t.with_timezone(&Utc))
        .ok()
}

fn comment_from_raw(raw: &RawComment) -> Comment {
    Comment {
        author: raw
            .author
            .as_ref()
            .and_then(|a| a.display_name.clone())
            .unwrap_or_else(|| UNASSIGNED.to_string()),
        text: raw
            .body
            .as_ref()
            .map(|b| FieldTree::from_value(b).flatten())
            .unwrap_or_default(),
    }
}

// ---------------------------------------------------------------------------
// Normalization entry point
// ---------------------------------------------------------------------------

/// Flatten raw tracker records into the normalized domain shape.
///
/// Records whose timestamps cannot be parsed are dropped with a warning
/// rather than failing the batch.
pub fn normalize(raw: Vec<RawRecord>, opts: &NormalizeOptions) -> Vec<Record> {
    let mut records = Vec::with_capacity(raw.len());

    for item in raw {
        let (Some(created_at), Some(updated_at)) = (
            parse_timestamp(&item.fields.created),
            parse_timestamp(&item.fields.updated),
        ) else {
            warn!(key = %item.key, "skipping record with unparsable timestamps");
            continue;
        };

        let comments: Vec<Comment> = item
            .fields
            .comment
            .as_ref()
            .map(|block| {
                let all = &block.comments;
                let skip = all.len().saturating_sub(opts.comment_window);
                all[skip..].iter().map(comment_from_raw).collect()
            })
            .unwrap_or_default();

        let custom_fields: Vec<CustomField> = item
            .fields
            .extra
            .iter()
            .filter(|(name, _)| name.starts_with("customfield_"))
            .map(|(name, value)| CustomField {
                name: name.clone(),
                value: flatten_custom(value),
            })
            .collect();

        records.push(Record {
            id: item.key,
            title: item.fields.summary.unwrap_or_default(),
            body: flatten_body(item.fields.description.as_ref(), opts.body_limit),
            status: item
                .fields
                .status
                .and_then(|s| s.name)
                .unwrap_or_else(|| UNASSIGNED.to_string()),
            priority: item
                .fields
                .priority
                .and_then(|p| p.name)
                .unwrap_or_else(|| NONE_SENTINEL.to_string()),
            category: item
                .fields
                .components
                .first()
                .and_then(|c| c.name.clone())
                .unwrap_or_else(|| NONE_SENTINEL.to_string()),
            tags: item.fields.labels,
            created_at,
            updated_at,
            comments,
            custom_fields,
        });
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(paragraphs: &[&str]) -> serde_json::Value {
        json!({
            "type": "doc",
            "content": paragraphs.iter().map(|p| json!({
                "type": "paragraph",
                "content": [{"type": "text", "text": p}]
            })).collect::<Vec<_>>()
        })
    }

    fn raw_record(key: &str, body: serde_json::Value) -> RawRecord {
        serde_json::from_value(json!({
            "key": key,
            "fields": {
                "summary": "A title",
                "description": body,
                "status": {"name": "Open"},
                "priority": {"name": "High"},
                "components": [{"name": "Exports"}],
                "labels": ["a", "b"],
                "created": "2026-08-20T09:00:00.000+0000",
                "updated": "2026-08-21T10:00:00.000+0000"
            }
        }))
        .expect("raw record")
    }

    #[test]
    fn field_tree_flattens_depth_first() {
        let tree = FieldTree::from_value(&doc(&["first line", "second line"]));
        assert_eq!(tree.flatten(), "first line second line");
    }

    #[test]
    fn deeply_nested_trees_concatenate_in_order() {
        let value = json!({
            "type": "doc",
            "content": [
                {"type": "bulletList", "content": [
                    {"type": "listItem", "content": [
                        {"type": "paragraph", "content": [{"type": "text", "text": "alpha"}]}
                    ]},
                    {"type": "listItem", "content": [
                        {"type": "paragraph", "content": [{"type": "text", "text": "beta"}]}
                    ]}
                ]}
            ]
        });
        assert_eq!(FieldTree::from_value(&value).flatten(), "alpha beta");
    }

    #[test]
    fn body_of_5000_chars_truncates_to_limit() {
        let long = "x".repeat(5000);
        let value = doc(&[long.as_str()]);
        let flat = flatten_body(Some(&value), 1000);
        assert_eq!(flat.chars().count(), 1000);
    }

    #[test]
    fn missing_body_is_empty_not_error() {
        assert_eq!(flatten_body(None, 1000), "");
        assert_eq!(flatten_body(Some(&json!(null)), 1000), "");
    }

    #[test]
    fn custom_multi_value_joins_with_delimiter() {
        let value = json!([{"value": "Pro"}, {"value": "Enterprise"}]);
        assert_eq!(flatten_custom(&value), "Pro, Enterprise");
    }

    #[test]
    fn custom_single_object_uses_value_then_name() {
        assert_eq!(flatten_custom(&json!({"value": "Gold"})), "Gold");
        assert_eq!(flatten_custom(&json!({"name": "Silver"})), "Silver");
    }

    #[test]
    fn custom_scalar_stringifies() {
        assert_eq!(flatten_custom(&json!(42)), "42");
        assert_eq!(flatten_custom(&json!("plain")), "plain");
    }

    #[test]
    fn custom_empty_collapses_to_unset() {
        assert_eq!(flatten_custom(&json!(null)), UNSET);
        assert_eq!(flatten_custom(&json!([])), UNSET);
        assert_eq!(flatten_custom(&json!("")), UNSET);
    }

    #[test]
    fn normalize_maps_sentinels_for_absent_fields() {
        let raw: RawRecord = serde_json::from_value(json!({
            "key": "FDB-7",
            "fields": {
                "created": "2026-08-20T09:00:00.000+0000",
                "updated": "2026-08-20T09:00:00.000+0000"
            }
        }))
        .unwrap();

        let records = normalize(vec![raw], &NormalizeOptions::default());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, UNASSIGNED);
        assert_eq!(records[0].priority, NONE_SENTINEL);
        assert_eq!(records[0].category, NONE_SENTINEL);
    }

    #[test]
    fn normalize_keeps_only_last_comments() {
        let mut value = json!({
            "key": "FDB-8",
            "fields": {
                "created": "2026-08-20T09:00:00.000+0000",
                "updated": "2026-08-20T09:00:00.000+0000",
                "comment": {"comments": []}
            }
        });
        let comments: Vec<serde_json::Value> = (1..=5)
            .map(|i| {
                json!({
                    "author": {"displayName": format!("user{i}")},
                    "body": doc(&[&format!("comment {i}")])
                })
            })
            .collect();
        value["fields"]["comment"]["comments"] = json!(comments);

        let raw: RawRecord = serde_json::from_value(value).unwrap();
        let records = normalize(vec![raw], &NormalizeOptions::default());

        let kept = &records[0].comments;
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[0].author, "user3");
        assert_eq!(kept[2].text, "comment 5");
    }

    #[test]
    fn normalize_drops_unparsable_timestamps() {
        let bad: RawRecord = serde_json::from_value(json!({
            "key": "FDB-9",
            "fields": {"created": "yesterday", "updated": "today"}
        }))
        .unwrap();
        let good = raw_record("FDB-10", doc(&["ok"]));

        let records = normalize(vec![bad, good], &NormalizeOptions::default());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "FDB-10");
    }

    #[test]
    fn normalize_parses_both_timestamp_forms() {
        assert!(parse_timestamp("2026-08-20T09:00:00.000+0000").is_some());
        assert!(parse_timestamp("2026-08-20T09:00:00Z").is_some());
        assert!(parse_timestamp("not a date").is_none());
    }

    #[test]
    fn normalize_collects_custom_fields() {
        let mut value = json!({
            "key": "FDB-11",
            "fields": {
                "created": "2026-08-20T09:00:00.000+0000",
                "updated": "2026-08-20T09:00:00.000+0000",
                "customfield_10031": [{"value": "Pro"}, {"value": "Enterprise"}],
                "customfield_10044": null,
                "not_custom": "ignored"
            }
        });
        value["fields"]["summary"] = json!("t");

        let raw: RawRecord = serde_json::from_value(value).unwrap();
        let records = normalize(vec![raw], &NormalizeOptions::default());

        let fields = &records[0].custom_fields;
        assert_eq!(fields.len(), 2);
        assert!(fields.iter().any(|f| f.value == "Pro, Enterprise"));
        assert!(fields.iter().any(|f| f.value == UNSET));
        assert!(!fields.iter().any(|f| f.name == "not_custom"));
    }
}
