// ABOUTME: client for the openai chat completions api over reqwest.
// ABOUTME: mirrors the anthropic client's error mapping with bearer-token auth.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::HavenError;
use crate::llm::{ChatMessage, CompletionRequest, CompletionResponse, LlmProvider};

const DEFAULT_API_BASE: &str = "https://api.openai.com";

pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<ApiMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    choices: Vec<Choice>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
    #[serde(rename = "type")]
    error_type: Option<String>,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_base_url(api_key, model, DEFAULT_API_BASE.to_string())
    }

    pub fn with_base_url(api_key: String, model: String, api_base: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            api_base,
            model,
        }
    }

    fn convert_messages(system: &str, messages: &[ChatMessage]) -> Vec<ApiMessage> {
        let mut out = Vec::with_capacity(messages.len() + 1);
        if !system.is_empty() {
            out.push(ApiMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        out.extend(messages.iter().map(|m| ApiMessage {
            role: m.role.as_str().to_string(),
            content: m.content.clone(),
        }));
        out
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, HavenError> {
        let model = if request.model.is_empty() {
            self.model.clone()
        } else {
            request.model
        };
        let body = ChatCompletionsRequest {
            model,
            messages: Self::convert_messages(&request.system, &request.messages),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let url = format!("{}/v1/chat/completions", self.api_base);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| HavenError::LlmProvider(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(HavenError::RateLimited(
                "OpenAI API rate limit exceeded (429)".to_string(),
            ));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(HavenError::LlmProvider(
                "OpenAI API authentication failed: invalid API key".to_string(),
            ));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            if let Ok(err_resp) = serde_json::from_str::<ApiErrorResponse>(&text) {
                return Err(HavenError::LlmProvider(format!(
                    "OpenAI API error ({}): {}",
                    err_resp.error.error_type.as_deref().unwrap_or("unknown"),
                    err_resp.error.message
                )));
            }
            return Err(HavenError::LlmProvider(format!(
                "OpenAI API error (HTTP {status}): {text}"
            )));
        }

        let parsed: ChatCompletionsResponse = response
            .json()
            .await
            .map_err(|e| HavenError::LlmProvider(format!("failed to parse response: {e}")))?;

        let content = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .ok_or_else(|| {
                HavenError::LlmProvider("OpenAI response contained no choices".to_string())
            })?;

        Ok(CompletionResponse {
            content,
            model: parsed.model,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatRole;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_request() -> CompletionRequest {
        CompletionRequest {
            system: "Be brief.".to_string(),
            messages: vec![ChatMessage {
                role: ChatRole::User,
                content: "hello".to_string(),
            }],
            model: String::new(),
            max_tokens: 512,
            temperature: None,
        }
    }

    fn provider(uri: String) -> OpenAiProvider {
        OpenAiProvider::with_base_url("test-key".to_string(), "gpt-test".to_string(), uri)
    }

    #[tokio::test]
    async fn successful_completion_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "hi there"}}],
                "model": "gpt-test"
            })))
            .mount(&server)
            .await;

        let result = provider(server.uri()).complete(sample_request()).await.unwrap();
        assert_eq!(result.content, "hi there");
        assert_eq!(result.model, "gpt-test");
    }

    #[tokio::test]
    async fn missing_choices_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [],
                "model": "gpt-test"
            })))
            .mount(&server)
            .await;

        let err = provider(server.uri()).complete(sample_request()).await.unwrap_err();
        match err {
            HavenError::LlmProvider(msg) => assert!(msg.contains("no choices")),
            other => panic!("expected LlmProvider error, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn rate_limit_maps_to_typed_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = provider(server.uri()).complete(sample_request()).await.unwrap_err();
        assert!(matches!(err, HavenError::RateLimited(_)));
    }

    #[test]
    fn system_prompt_becomes_leading_system_message() {
        let messages = OpenAiProvider::convert_messages(
            "Be brief.",
            &[ChatMessage {
                role: ChatRole::User,
                content: "hello".to_string(),
            }],
        );
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
    }
}
