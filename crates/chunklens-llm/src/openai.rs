use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{Completion, CompletionRequest, LlmProvider};
use crate::retry::send_with_retry;

const PROVIDER_NAME: &str = "openai";

/// Chat-completions backend for `OpenAI` and API-compatible servers.
#[derive(Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_retries: u32,
    timeout_secs: u64,
}

impl fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_retries", &self.max_retries)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl OpenAiProvider {
    #[must_use]
    pub fn new(api_key: String, mut base_url: String, model: String) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: crate::http::default_client(),
            api_key,
            base_url,
            model,
            max_retries: 3,
            timeout_secs: 60,
        }
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Rebuilds the HTTP client with the given per-request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self.client = crate::http::client_with_timeout(Duration::from_secs(timeout_secs));
        self
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    async fn send_request(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system.as_deref() {
            messages.push(ApiMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ApiMessage {
            role: "user",
            content: &request.prompt,
        });
        let body = ChatRequest {
            model: &self.model,
            messages: &messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };
        let url = format!("{}/chat/completions", self.base_url);

        let response = send_with_retry(PROVIDER_NAME, self.max_retries, self.timeout_secs, || {
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
        })
        .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;

        if !status.is_success() {
            tracing::error!(status = status.as_u16(), body = %text, "completion request failed");
            return Err(LlmError::Status {
                provider: PROVIDER_NAME.into(),
                status: status.as_u16(),
            });
        }

        let resp: ChatResponse = serde_json::from_str(&text)?;
        let usage = resp.usage.unwrap_or_default();
        let content = resp
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| LlmError::EmptyResponse {
                provider: PROVIDER_NAME.into(),
            })?;

        tracing::debug!(
            model = %self.model,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "completion usage"
        );

        Ok(Completion {
            content,
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        })
    }
}

impl LlmProvider for OpenAiProvider {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, LlmError> {
        self.send_request(request).await
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ApiMessage<'a>],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn provider(base_url: &str) -> OpenAiProvider {
        OpenAiProvider::new("sk-test".into(), base_url.into(), "gpt-4o-mini".into())
            .with_max_retries(1)
    }

    fn ok_body(content: &str) -> serde_json::Value {
        json!({
            "choices": [{"message": {"role": "assistant", "content": content}}],
            "usage": {"prompt_tokens": 120, "completion_tokens": 30}
        })
    }

    #[test]
    fn new_trims_trailing_slashes() {
        let p = OpenAiProvider::new("k".into(), "https://api.openai.com/v1//".into(), "m".into());
        assert_eq!(p.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn debug_redacts_api_key() {
        let p = OpenAiProvider::new("sk-secret".into(), "http://x".into(), "m".into());
        let dbg = format!("{p:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("<redacted>"));
    }

    #[tokio::test]
    async fn complete_returns_content_and_usage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({"model": "gpt-4o-mini", "max_tokens": 64})))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("a description")))
            .expect(1)
            .mount(&server)
            .await;

        let req = CompletionRequest::new("describe").with_max_tokens(64);
        let completion = provider(&server.uri()).complete(&req).await.unwrap();
        assert_eq!(completion.content, "a description");
        assert_eq!(completion.input_tokens, 120);
        assert_eq!(completion.output_tokens, 30);
    }

    #[tokio::test]
    async fn system_prompt_is_sent_first() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "messages": [
                    {"role": "system", "content": "judge"},
                    {"role": "user", "content": "chunk"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("ok")))
            .expect(1)
            .mount(&server)
            .await;

        let req = CompletionRequest::new("chunk").with_system("judge");
        assert!(provider(&server.uri()).complete(&req).await.is_ok());
    }

    #[tokio::test]
    async fn missing_usage_counts_as_zero() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "x"}}]
            })))
            .mount(&server)
            .await;

        let completion = provider(&server.uri())
            .complete(&CompletionRequest::new("p"))
            .await
            .unwrap();
        assert_eq!(completion.input_tokens, 0);
        assert_eq!(completion.output_tokens, 0);
    }

    #[tokio::test]
    async fn empty_choices_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
            .mount(&server)
            .await;

        let result = provider(&server.uri())
            .complete(&CompletionRequest::new("p"))
            .await;
        assert!(matches!(result, Err(LlmError::EmptyResponse { .. })));
    }

    #[tokio::test]
    async fn non_success_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let result = provider(&server.uri())
            .complete(&CompletionRequest::new("p"))
            .await;
        assert!(matches!(result, Err(LlmError::Status { status: 503, .. })));
    }

    #[tokio::test]
    async fn malformed_body_is_json_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let result = provider(&server.uri())
            .complete(&CompletionRequest::new("p"))
            .await;
        assert!(matches!(result, Err(LlmError::Json(_))));
    }

    #[tokio::test]
    async fn persistent_rate_limit_surfaces() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
            .expect(2)
            .mount(&server)
            .await;

        let result = provider(&server.uri())
            .complete(&CompletionRequest::new("p"))
            .await;
        assert!(matches!(result, Err(LlmError::RateLimited)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_errors() {
        let p = provider("http://127.0.0.1:1");
        assert!(p.complete(&CompletionRequest::new("p")).await.is_err());
    }

    #[test]
    fn name_and_model() {
        let p = provider("http://x");
        assert_eq!(p.name(), "openai");
        assert_eq!(p.model(), "gpt-4o-mini");
    }
}
