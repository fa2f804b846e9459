//! Locally computed digest metrics. Nothing here touches the LLM.

use chrono::{DateTime, Utc};

use feedpulse_shared::{DigestMetrics, Record, TagCount};

/// Classify the batch against the reporting window and rank its tags.
///
/// A record is *new* when it was created inside the window, *updated* when
/// it changed inside the window but was created earlier. Without a window
/// start (a full-corpus digest) everything counts as new. `top_tags` caps
/// the ranked tag list.
pub fn compute(
    records: &[Record],
    window_start: Option<DateTime<Utc>>,
    top_tags: usize,
) -> DigestMetrics {
    let mut new = 0;
    let mut updated = 0;
    for record in records {
        match window_start {
            Some(start) if record.created_at < start => updated += 1,
            _ => new += 1,
        }
    }

    DigestMetrics {
        total: records.len(),
        new,
        updated,
        top_tags: rank_tags(records, top_tags),
    }
}

/// Top tags by frequency, descending; ties keep first-seen order.
fn rank_tags(records: &[Record], limit: usize) -> Vec<TagCount> {
    // First-seen order matters for ties, so count in a Vec rather than a map.
    let mut counts: Vec<TagCount> = Vec::new();
    for record in records {
        for tag in &record.tags {
            match counts.iter_mut().find(|c| &c.tag == tag) {
                Some(entry) => entry.count += 1,
                None => counts.push(TagCount {
                    tag: tag.clone(),
                    count: 1,
                }),
            }
        }
    }
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(limit);
    counts
}
