//! Report assembly and delivery.
//!
//! Turns an [`AnalysisResult`] plus the record batch into a [`Report`] with
//! a plain-text body and a markdown-decorated one, then hands it to a
//! [`NotificationSink`].

pub mod sink;

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

use feedpulse_shared::{AnalysisResult, Record, Report, RunId};

pub use sink::{FileSink, NotificationSink, StdoutSink};

/// Fixed palette for category pills. Index chosen by a stable hash so the
/// same category gets the same color across runs and machines.
const CATEGORY_PALETTE: [&str; 8] = [
    "#e06c75", "#e5c07b", "#98c379", "#56b6c2", "#61afef", "#c678dd", "#d19a66", "#abb2bf",
];

static RECORD_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Unwrap is fine for a literal pattern.
    Regex::new(r"\b([A-Z][A-Z0-9]*-\d+)\b").unwrap()
});

/// Stable palette color for a category name.
pub fn category_color(category: &str) -> &'static str {
    let digest = Sha256::digest(category.as_bytes());
    CATEGORY_PALETTE[digest[0] as usize % CATEGORY_PALETTE.len()]
}

/// Rewrite record-id tokens into links against the tracker's browse URL
/// and normalize `**bold**` markers for the rich body.
pub fn decorate(text: &str, base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    RECORD_ID_RE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let id = &caps[1];
            format!("[{id}]({base}/browse/{id})")
        })
        .into_owned()
}

fn strip_bold(text: &str) -> String {
    text.replace("**", "")
}

/// Build the outgoing report.
///
/// The itemized section lists the batch newest-first with duplicate ids
/// dropped (first occurrence wins).
pub fn assemble(
    analysis: &AnalysisResult,
    records: &[Record],
    base_url: &str,
    run_id: &RunId,
) -> Report {
    let m = &analysis.metrics;
    let subject = format!(
        "FeedPulse digest — {} new, {} updated",
        m.new, m.updated
    );

    let mut body = String::new();
    body.push_str(&format!(
        "{} records in window ({} new, {} updated)\n",
        m.total, m.new, m.updated
    ));
    if !m.top_tags.is_empty() {
        let tags: Vec<String> = m
            .top_tags
            .iter()
            .map(|t| format!("{} ({})", t.tag, t.count))
            .collect();
        body.push_str(&format!("Top tags: {}\n", tags.join(", ")));
    }
    body.push('\n');

    body.push_str(&analysis.summary_text);
    body.push('\n');

    push_bullets(&mut body, "Priority items", &analysis.high_priority);
    push_bullets(&mut body, "Recommendations", &analysis.recommendations);

    let items = itemize(records);
    if !items.is_empty() {
        body.push_str("\n## Records\n");
        for record in &items {
            body.push_str(&format!(
                "- {} {} [{} | {} | {}] {}\n",
                record.id,
                record.title,
                record.status,
                record.priority,
                record.category,
                record.created_at.format("%Y-%m-%d"),
            ));
        }
    }

    body.push_str(&format!("\nrun {run_id}\n"));

    Report {
        subject,
        text_body: strip_bold(&body),
        rich_body: decorate(&body, base_url),
    }
}

fn push_bullets(body: &mut String, heading: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    body.push_str(&format!("\n## {heading}\n"));
    for item in items {
        body.push_str(&format!("- {item}\n"));
    }
}

/// Newest-first, duplicate ids dropped keeping the first occurrence.
fn itemize(records: &[Record]) -> Vec<&Record> {
    let mut seen: Vec<&str> = Vec::new();
    let mut items: Vec<&Record> = Vec::new();
    for record in records {
        if seen.contains(&record.id.as_str()) {
            continue;
        }
        seen.push(&record.id);
        items.push(record);
    }
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use feedpulse_shared::{DigestMetrics, TagCount};

    fn record(id: &str, title: &str, created_offset_hours: i64) -> Record {
        let created = Utc::now() - Duration::hours(created_offset_hours);
        Record {
            id: id.into(),
            title: title.into(),
            body: String::new(),
            status: "Open".into(),
            priority: "High".into(),
            category: "Bug".into(),
            tags: vec![],
            created_at: created,
            updated_at: created,
            comments: vec![],
            custom_fields: vec![],
        }
    }

    fn analysis() -> AnalysisResult {
        AnalysisResult {
            summary_text: "A **busy** window; FDB-1 dominated.".into(),
            high_priority: vec!["FDB-1 login loop".into()],
            recommendations: vec!["triage auth first".into()],
            metrics: DigestMetrics {
                total: 2,
                new: 2,
                updated: 0,
                top_tags: vec![TagCount {
                    tag: "login".into(),
                    count: 2,
                }],
            },
        }
    }

    #[test]
    fn category_color_is_stable_and_in_palette() {
        let c1 = category_color("Auth");
        let c2 = category_color("Auth");
        assert_eq!(c1, c2);
        assert!(CATEGORY_PALETTE.contains(&c1));
        // Different categories usually differ; at minimum both stay in range.
        assert!(CATEGORY_PALETTE.contains(&category_color("Billing")));
    }

    #[test]
    fn decorate_links_record_ids() {
        let out = decorate(
            "see FDB-12 and FDB-340",
            "https://tracker.example.com/",
        );
        assert_eq!(
            out,
            "see [FDB-12](https://tracker.example.com/browse/FDB-12) \
             and [FDB-340](https://tracker.example.com/browse/FDB-340)"
        );
    }

    #[test]
    fn decorate_ignores_lowercase_tokens() {
        let out = decorate("version v1-2 unchanged", "https://t.example.com");
        assert_eq!(out, "version v1-2 unchanged");
    }

    #[test]
    fn assemble_builds_both_bodies() {
        let records = vec![record("FDB-1", "login loop", 5), record("FDB-2", "timeout", 1)];
        let report = assemble(
            &analysis(),
            &records,
            "https://tracker.example.com",
            &RunId::default(),
        );

        assert_eq!(report.subject, "FeedPulse digest — 2 new, 0 updated");
        assert!(report.text_body.contains("2 records in window"));
        assert!(report.text_body.contains("Top tags: login (2)"));
        // Plain body drops bold markers, rich body keeps them and links ids.
        assert!(report.text_body.contains("A busy window"));
        assert!(report.rich_body.contains("**busy**"));
        assert!(report
            .rich_body
            .contains("[FDB-1](https://tracker.example.com/browse/FDB-1)"));
        assert!(report.text_body.contains("## Priority items"));
        assert!(report.text_body.contains("- triage auth first"));
    }

    #[test]
    fn itemized_records_are_newest_first_and_deduped() {
        let records = vec![
            record("FDB-1", "older", 10),
            record("FDB-2", "newest", 1),
            record("FDB-1", "duplicate, loses", 0),
        ];
        let items = itemize(&records);

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "FDB-2");
        assert_eq!(items[1].id, "FDB-1");
        assert_eq!(items[1].title, "older");
    }

    #[test]
    fn empty_sections_are_omitted() {
        let analysis = AnalysisResult {
            summary_text: "Nothing to report.".into(),
            ..AnalysisResult::default()
        };
        let report = assemble(&analysis, &[], "https://t.example.com", &RunId::default());
        assert!(!report.text_body.contains("## Priority items"));
        assert!(!report.text_body.contains("## Records"));
        assert!(report.text_body.contains("Nothing to report."));
    }
}
