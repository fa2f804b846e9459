//! OpenAI-compatible chat-completions transport.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use feedpulse_shared::{FeedPulseError, LlmConfig, Result};

const USER_AGENT: &str = concat!("FeedPulse/", env!("CARGO_PKG_VERSION"));

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Thin client over a chat-completions endpoint. One request per digest.
pub struct LlmClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl LlmClient {
    /// Build a client from config, resolving the API key from the
    /// environment variable the config names.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            FeedPulseError::config(format!(
                "LLM API key not found: set the {} environment variable",
                config.api_key_env
            ))
        })?;

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FeedPulseError::Analysis(format!("building HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
        })
    }

    /// Send one prompt, return the first choice's text.
    #[instrument(skip_all, fields(model = %self.model, prompt_chars = prompt.len()))]
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| FeedPulseError::Analysis(format!("LLM request failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FeedPulseError::Analysis(format!("reading LLM response: {e}")))?;

        if !status.is_success() {
            let head: String = body.chars().take(200).collect();
            return Err(FeedPulseError::Analysis(format!(
                "LLM endpoint returned HTTP {status}: {head}"
            )));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| FeedPulseError::Analysis(format!("malformed LLM response: {e}")))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| FeedPulseError::Analysis("LLM response had no choices".into()))?;

        debug!(response_chars = content.len(), "completion received");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{bearer_token, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(server: &MockServer) -> LlmConfig {
        unsafe { std::env::set_var("FP_LLM_TEST_KEY", "sk-test") };
        LlmConfig {
            api_key_env: "FP_LLM_TEST_KEY".into(),
            endpoint: format!("{}/api/v1/chat/completions", server.uri()),
            model: "test-model".into(),
            timeout_secs: 5,
        }
    }

    #[tokio::test]
    async fn sends_prompt_and_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .and(bearer_token("sk-test"))
            .and(body_partial_json(serde_json::json!({"model": "test-model"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "## Summary\nall good"}}]
            })))
            .mount(&server)
            .await;

        let client = LlmClient::new(&test_config(&server)).unwrap();
        let text = client.complete("digest these").await.unwrap();
        assert!(text.contains("all good"));
    }

    #[tokio::test]
    async fn server_error_maps_to_analysis_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&server)
            .await;

        let client = LlmClient::new(&test_config(&server)).unwrap();
        let err = client.complete("digest these").await.unwrap_err();
        assert!(matches!(err, FeedPulseError::Analysis(_)));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn empty_choices_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let client = LlmClient::new(&test_config(&server)).unwrap();
        let err = client.complete("digest these").await.unwrap_err();
        assert!(err.to_string().contains("no choices"));
    }
}
