//! Chat completions over the OpenAI wire format.
//!
//! OpenAI itself, Ollama's `/v1` shim, OpenRouter, Groq and vLLM all speak
//! it, so one client covers every provider skylog ships with.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use skylog_core::error::ProviderError;
use skylog_core::message::ChatMessage;
use skylog_core::provider::*;
use tracing::{debug, warn};

const DEFAULT_RETRY_AFTER_SECS: u64 = 5;
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(120);

/// Chat-completion client for any OpenAI-style endpoint.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// `base_url` is the API root, e.g. `https://api.openai.com/v1`.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", "https://api.openai.com/v1", api_key)
    }

    /// Local Ollama; it ignores the key but expects the header.
    pub fn ollama(base_url: Option<&str>) -> Self {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama",
        )
    }

    /// Convert our messages to OpenAI API format.
    fn to_api_messages(messages: &[ChatMessage]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().into(),
                content: Some(m.content.clone()),
            })
            .collect()
    }

    /// Pull the reply text out of a parsed response.
    ///
    /// No choices, a choice without a message, or blank content are all
    /// malformed.
    fn extract_response(api_response: ApiResponse) -> Result<ProviderResponse, ProviderError> {
        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::MalformedResponse("no choices in response".into()))?;

        let content = choice
            .message
            .and_then(|m| m.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| {
                ProviderError::MalformedResponse("first choice has no content".into())
            })?;

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ProviderResponse {
            content,
            usage,
            model: api_response.model,
        })
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let body = ApiRequest {
            model: &request.model,
            messages: Self::to_api_messages(&request.messages),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        };

        debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after_secs = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                return Err(ProviderError::RateLimited { retry_after_secs });
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(ProviderError::AuthenticationFailed(format!(
                    "{} rejected the API key",
                    self.name
                )));
            }
            status => {
                let message = response.text().await.unwrap_or_default();
                warn!(
                    provider = %self.name,
                    status = status.as_u16(),
                    body = %message,
                    "Completion failed"
                );
                return Err(ProviderError::ApiError {
                    status_code: status.as_u16(),
                    message,
                });
            }
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(format!("unparseable body: {e}")))?;

        Self::extract_response(api_response)
    }

    /// Lists models; any 2xx means the endpoint and key are usable.
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

// Wire types for /chat/completions

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    #[serde(default)]
    message: Option<ApiMessage>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
#[cfg(test)]
mod tests {
    use super::*;

    fn parse(data: &str) -> ApiResponse {
        serde_json::from_str(data).unwrap()
    }

    #[test]
    fn openai_constructor() {
        let provider = OpenAiCompatProvider::openai("sk-test");
        assert_eq!(provider.name(), "openai");
        assert!(provider.base_url.contains("api.openai.com"));
    }

    #[test]
    fn ollama_defaults_to_local_port() {
        let provider = OpenAiCompatProvider::ollama(None);
        assert_eq!(provider.name(), "ollama");
        assert_eq!(provider.base_url, "http://localhost:11434/v1");
    }

    #[test]
    fn trailing_slash_trimmed() {
        let provider = OpenAiCompatProvider::new("custom", "http://host/v1/", "k");
        assert_eq!(provider.base_url, "http://host/v1");
    }

    #[test]
    fn request_omits_unset_max_tokens() {
        let messages = OpenAiCompatProvider::to_api_messages(&[ChatMessage::user("hi")]);
        let body = ApiRequest {
            model: "gpt-4o-mini",
            messages,
            temperature: 0.1,
            max_tokens: None,
            stream: false,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("max_tokens").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn roles_follow_chat_message() {
        let messages = vec![
            ChatMessage::system("protocol"),
            ChatMessage::user("Hello"),
            ChatMessage::assistant("query database: SELECT 1;"),
        ];
        let roles: Vec<String> = OpenAiCompatProvider::to_api_messages(&messages)
            .into_iter()
            .map(|m| m.role)
            .collect();
        assert_eq!(roles, ["system", "user", "assistant"]);
    }

    #[test]
    fn extracts_first_choice() {
        let data = r#"{
            "model": "gpt-4o-mini",
            "choices": [{"message": {"role": "assistant", "content": "query database: SELECT 1;"}}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;
        let response = OpenAiCompatProvider::extract_response(parse(data)).unwrap();
        assert_eq!(response.content, "query database: SELECT 1;");
        assert_eq!(response.model, "gpt-4o-mini");
        assert_eq!(response.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn empty_choices_is_malformed() {
        let err = OpenAiCompatProvider::extract_response(parse(r#"{"choices": []}"#)).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn missing_choices_is_malformed() {
        let err = OpenAiCompatProvider::extract_response(parse(r#"{"model": "m"}"#)).unwrap_err();
        assert!(err.is_malformed());
    }

    #[test]
    fn null_or_blank_content_is_malformed() {
        let null_content =
            r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#;
        assert!(
            OpenAiCompatProvider::extract_response(parse(null_content))
                .unwrap_err()
                .is_malformed()
        );

        let blank = r#"{"choices": [{"message": {"role": "assistant", "content": "  \n"}}]}"#;
        assert!(
            OpenAiCompatProvider::extract_response(parse(blank))
                .unwrap_err()
                .is_malformed()
        );
    }
}
