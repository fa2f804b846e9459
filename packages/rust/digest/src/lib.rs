//! Digest generation: metrics, prompt, LLM call, response parsing.
//!
//! [`Summarizer::analyze`] is the only entry point the pipeline uses. The
//! LLM is consulted once per run; everything countable is computed locally
//! so a flaky model cannot corrupt the numbers.

pub mod llm;
pub mod metrics;
pub mod parser;
pub mod prompt;

use chrono::{DateTime, Utc};
use tracing::{info, instrument};

use feedpulse_shared::{AnalysisResult, LlmConfig, Record, Result};

use crate::llm::LlmClient;

/// Summary text used when a run finds nothing in the window.
pub const NOTHING_TO_REPORT: &str = "Nothing to report: no new or updated records in this window.";

pub struct Summarizer {
    client: LlmClient,
    top_tags: usize,
}

impl Summarizer {
    pub fn new(config: &LlmConfig, top_tags: usize) -> Result<Self> {
        Ok(Self {
            client: LlmClient::new(config)?,
            top_tags,
        })
    }

    /// Produce the digest for one batch.
    ///
    /// An empty batch short-circuits with a fixed result and makes no LLM
    /// call. `history` is the full cached corpus, used only for trend
    /// context in the prompt; `window_start` is the effective reporting
    /// cutoff anchoring the new/updated split (`None` for a full-corpus
    /// digest).
    #[instrument(skip_all, fields(batch = records.len(), history = history.len()))]
    pub async fn analyze(
        &self,
        records: &[Record],
        history: &[Record],
        window_start: Option<DateTime<Utc>>,
    ) -> Result<AnalysisResult> {
        if records.is_empty() {
            info!("empty batch, skipping analysis");
            return Ok(AnalysisResult {
                summary_text: NOTHING_TO_REPORT.to_string(),
                ..AnalysisResult::default()
            });
        }

        let metrics = metrics::compute(records, window_start, self.top_tags);
        let prompt = prompt::build(records, history, window_start, &metrics);
        let raw = self.client.complete(&prompt).await?;
        let sections = parser::parse(&raw);

        info!(
            new = metrics.new,
            updated = metrics.updated,
            priority_items = sections.high_priority.len(),
            "analysis complete"
        );

        Ok(AnalysisResult {
            summary_text: sections.summary,
            high_priority: sections.high_priority,
            recommendations: sections.recommendations,
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record(id: &str) -> Record {
        let now = Utc::now();
        Record {
            id: id.into(),
            title: "something broke".into(),
            body: "details".into(),
            status: "Open".into(),
            priority: "High".into(),
            category: "Bug".into(),
            tags: vec![],
            created_at: now,
            updated_at: now,
            comments: vec![],
            custom_fields: vec![],
        }
    }

    async fn summarizer(server: &MockServer) -> Summarizer {
        unsafe { std::env::set_var("FP_DIGEST_TEST_KEY", "sk-test") };
        let config = LlmConfig {
            api_key_env: "FP_DIGEST_TEST_KEY".into(),
            endpoint: format!("{}/api/v1/chat/completions", server.uri()),
            model: "test-model".into(),
            timeout_secs: 5,
        };
        Summarizer::new(&config, 5).unwrap()
    }

    #[tokio::test]
    async fn empty_batch_never_calls_the_llm() {
        let server = MockServer::start().await;
        // No mock mounted: any request would 404 and fail the analyze call.
        let s = summarizer(&server).await;

        let result = s.analyze(&[], &[], Some(Utc::now())).await.unwrap();
        assert_eq!(result.summary_text, NOTHING_TO_REPORT);
        assert!(result.high_priority.is_empty());
        assert_eq!(result.metrics.total, 0);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn full_round_trip_parses_sections() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content":
                    "## Summary\nOne open bug.\n## Priority Items\n- FDB-1 fix it\n## Recommendations\n- ship a patch\n"}}]
            })))
            .mount(&server)
            .await;

        let s = summarizer(&server).await;
        let result = s
            .analyze(&[record("FDB-1")], &[record("FDB-1")], None)
            .await
            .unwrap();

        assert_eq!(result.summary_text, "One open bug.");
        assert_eq!(result.high_priority, vec!["FDB-1 fix it"]);
        assert_eq!(result.recommendations, vec!["ship a patch"]);
        assert_eq!(result.metrics.new, 1);
    }

    #[tokio::test]
    async fn unstructured_reply_still_yields_a_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "just some prose with no headers"}}]
            })))
            .mount(&server)
            .await;

        let s = summarizer(&server).await;
        let result = s.analyze(&[record("FDB-2")], &[], None).await.unwrap();
        assert_eq!(result.summary_text, "just some prose with no headers");
        assert!(result.high_priority.is_empty());
    }
}
