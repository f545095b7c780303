//! OpenAI-compatible completion client.
//!
//! Works with OpenAI, OpenRouter, Ollama, vLLM and any endpoint exposing
//! `/chat/completions`. Replies are requested non-streaming; the job queue
//! only ever needs the full text.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use studyhall_config::AppConfig;
use studyhall_core::error::CompletionError;
use studyhall_core::provider::{CompletionRequest, CompletionResponse, PromptMessage};
use tracing::{debug, warn};

/// A single attempt against an OpenAI-compatible endpoint. Wrap it in a
/// [`RetryingProvider`](crate::RetryingProvider) for backoff.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CompletionError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Build from the `completion` section and API key of the app config.
    pub fn from_config(config: &AppConfig) -> Result<Self, CompletionError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| CompletionError::NotConfigured("no API key configured".into()))?;

        Self::new(
            "openai",
            config.completion.base_url.clone(),
            api_key,
            config.completion.request_timeout(),
        )
    }

    fn to_api_messages(messages: &[PromptMessage]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect()
    }

    fn request_body(request: &CompletionRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": false,
        });
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        body
    }
}

/// Map a non-200 status to the error taxonomy.
fn status_error(status: u16, body: String) -> CompletionError {
    match status {
        429 => CompletionError::RateLimited {
            retry_after_secs: 5,
        },
        401 | 403 => CompletionError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ),
        400 => CompletionError::BadRequest(body),
        _ => CompletionError::ApiError {
            status_code: status,
            message: body,
        },
    }
}

fn send_error(e: reqwest::Error) -> CompletionError {
    if e.is_timeout() {
        CompletionError::Timeout(e.to_string())
    } else {
        CompletionError::Network(e.to_string())
    }
}

fn parse_response(api_response: ApiResponse) -> Result<CompletionResponse, CompletionError> {
    let choice = api_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| CompletionError::ApiError {
            status_code: 200,
            message: "No choices in response".into(),
        })?;

    Ok(CompletionResponse {
        text: choice.message.content.unwrap_or_default(),
        tokens_used: api_response.usage.map(|u| u.total_tokens).unwrap_or(0),
        model: api_response.model,
    })
}

#[async_trait]
impl studyhall_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> std::result::Result<CompletionResponse, CompletionError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request);

        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(send_error)?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(status_error(status, error_body));
        }

        let api_response: ApiResponse =
            response.json().await.map_err(|e| CompletionError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        parse_response(api_response)
    }

    async fn health_check(&self) -> std::result::Result<bool, CompletionError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(send_error)?;

        Ok(response.status().is_success())
    }
}

// --- Wire types ---

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
    #[serde(default)]
    model: String,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use studyhall_core::Provider;
    use studyhall_core::error::FailureClass;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let provider = OpenAiCompatProvider::new(
            "openai",
            "https://api.openai.com/v1/",
            "sk-test",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn from_config_requires_api_key() {
        let config = AppConfig::default();
        let err = OpenAiCompatProvider::from_config(&config).err().unwrap();
        assert!(matches!(err, CompletionError::NotConfigured(_)));
    }

    #[test]
    fn request_body_carries_roles_and_limits() {
        let request = CompletionRequest {
            model: "gpt-4o-mini".into(),
            messages: vec![
                PromptMessage::system("Be a tutor"),
                PromptMessage::user("What is a limit?"),
            ],
            temperature: 0.3,
            max_tokens: Some(200),
        };
        let body = OpenAiCompatProvider::request_body(&request);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "What is a limit?");
        assert_eq!(body["max_tokens"], 200);
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn status_codes_map_to_failure_classes() {
        assert!(matches!(
            status_error(429, String::new()),
            CompletionError::RateLimited { .. }
        ));
        assert!(matches!(
            status_error(401, String::new()),
            CompletionError::AuthenticationFailed(_)
        ));
        assert!(matches!(
            status_error(403, String::new()),
            CompletionError::AuthenticationFailed(_)
        ));
        assert_eq!(
            status_error(400, "bad".into()).failure_class(),
            FailureClass::NonRetryable
        );
        assert_eq!(
            status_error(502, "gateway".into()).failure_class(),
            FailureClass::Transient
        );
    }

    #[test]
    fn parses_choice_and_usage() {
        let data = r#"{
            "model": "gpt-4o-mini-2024",
            "choices": [{"message": {"role": "assistant", "content": "A limit is..."}}],
            "usage": {"prompt_tokens": 20, "completion_tokens": 22, "total_tokens": 42}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        let response = parse_response(parsed).unwrap();
        assert_eq!(response.text, "A limit is...");
        assert_eq!(response.tokens_used, 42);
        assert_eq!(response.model, "gpt-4o-mini-2024");
    }

    #[test]
    fn empty_choices_is_an_error() {
        let parsed: ApiResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(parse_response(parsed).is_err());
    }
}
