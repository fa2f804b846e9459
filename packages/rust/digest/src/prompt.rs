//! Prompt construction for the digest request.
//!
//! Each record gets a bounded block so a large batch cannot blow the
//! context window. The instruction footer pins the response shape the
//! parser expects.

use chrono::{DateTime, Utc};

use feedpulse_shared::{DigestMetrics, Record};

/// Per-record body excerpt inside the prompt. Bodies are already capped at
/// normalization time; this bound keeps the prompt itself predictable.
const PROMPT_BODY_LIMIT: usize = 400;

pub fn build(
    records: &[Record],
    history: &[Record],
    window_start: Option<DateTime<Utc>>,
    metrics: &DigestMetrics,
) -> String {
    let mut out = String::new();

    out.push_str("You are summarizing customer feedback records for an engineering team digest.\n\n");

    match window_start {
        Some(t) => out.push_str(&format!(
            "Reporting window: records created or updated since {}.\n",
            t.format("%Y-%m-%d %H:%M UTC")
        )),
        None => out.push_str("Reporting window: the full record corpus.\n"),
    }
    out.push_str(&format!(
        "Batch: {} records ({} new, {} updated).\n\n",
        metrics.total, metrics.new, metrics.updated
    ));

    out.push_str("## Records\n\n");
    for record in records {
        push_record_block(&mut out, record);
    }

    // Trend context only makes sense for a windowed digest with a corpus
    // beyond the current batch.
    if window_start.is_some() && history.len() > records.len() {
        out.push_str(&format!(
            "## Historical context\n\nThe full corpus holds {} records; the batch above is the \
             recent slice. Call out trends where the new records echo themes \
             already present in the corpus.\n\n",
            history.len()
        ));
    }

    out.push_str(
        "## Instructions\n\n\
         Respond with exactly three sections, in this order:\n\
         1. \"Summary\" - a short prose overview of the batch.\n\
         2. \"Priority Items\" - exactly 3 bullet points naming the records \
         that need attention first, each starting with the record id.\n\
         3. \"Recommendations\" - exactly 3 bullet points with concrete next \
         steps for the team.\n\
         Use plain `-` bullets. Do not add any other sections.\n",
    );

    out
}

fn push_record_block(out: &mut String, record: &Record) {
    out.push_str(&format!(
        "### {} — {}\nstatus: {} | priority: {} | category: {}\n",
        record.id, record.title, record.status, record.priority, record.category
    ));
    if !record.tags.is_empty() {
        out.push_str(&format!("tags: {}\n", record.tags.join(", ")));
    }

    let body: String = record.body.chars().take(PROMPT_BODY_LIMIT).collect();
    if !body.is_empty() {
        out.push_str(&body);
        out.push('\n');
    }

    for comment in &record.comments {
        out.push_str(&format!("comment ({}): {}\n", comment.author, comment.text));
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedpulse_shared::Comment;

    fn record(id: &str, body: &str) -> Record {
        let now = Utc::now();
        Record {
            id: id.into(),
            title: "Login fails".into(),
            body: body.into(),
            status: "Open".into(),
            priority: "High".into(),
            category: "Auth".into(),
            tags: vec!["login".into()],
            created_at: now,
            updated_at: now,
            comments: vec![Comment {
                author: "sam".into(),
                text: "seen on staging too".into(),
            }],
            custom_fields: vec![],
        }
    }

    #[test]
    fn includes_record_fields_and_comments() {
        let r = record("FDB-7", "cannot log in after reset");
        let metrics = DigestMetrics {
            total: 1,
            new: 1,
            updated: 0,
            top_tags: vec![],
        };
        let prompt = build(std::slice::from_ref(&r), &[r.clone()], None, &metrics);

        assert!(prompt.contains("FDB-7 — Login fails"));
        assert!(prompt.contains("priority: High"));
        assert!(prompt.contains("tags: login"));
        assert!(prompt.contains("comment (sam): seen on staging too"));
        assert!(prompt.contains("full record corpus"));
        assert!(prompt.contains("exactly 3 bullet points"));
    }

    #[test]
    fn bounds_the_body_excerpt() {
        let r = record("FDB-8", &"x".repeat(1000));
        let metrics = DigestMetrics::default();
        let prompt = build(std::slice::from_ref(&r), &[], None, &metrics);

        let longest_x_run = prompt
            .split(|c| c != 'x')
            .map(str::len)
            .max()
            .unwrap_or(0);
        assert_eq!(longest_x_run, PROMPT_BODY_LIMIT);
    }

    #[test]
    fn history_section_requires_a_window_anchor() {
        let r = record("FDB-9", "body");
        let metrics = DigestMetrics::default();
        let history = vec![r.clone(), record("FDB-1", "older"), record("FDB-2", "older")];

        let without = build(std::slice::from_ref(&r), &history, None, &metrics);
        assert!(!without.contains("Historical context"));

        let with = build(
            std::slice::from_ref(&r),
            &history,
            Some(Utc::now()),
            &metrics,
        );
        assert!(with.contains("Historical context"));
        assert!(with.contains("3 records"));
    }
}
