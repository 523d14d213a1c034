//! Provider trait over the chat-completion API.
//!
//! A Provider knows how to send a role-tagged context to an LLM and get the
//! reply text back. The agent loop never sees the wire format.

use crate::error::ProviderError;
use crate::message::ChatMessage;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One chat-completion call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The model to use (e.g., "gpt-4o-mini")
    pub model: String,

    /// The context: system instructions followed by the conversation snapshot
    pub messages: Vec<ChatMessage>,

    /// Sampling temperature; flight analysis wants it near zero
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Reply length cap, `None` leaves it to the API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.1
}

/// A complete response from a provider.
///
/// Providers only return this when the reply carries non-empty text; an
/// empty or choice-less reply is `ProviderError::MalformedResponse`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The generated text
    pub content: String,

    /// Token accounting, when the API reports it
    pub usage: Option<Usage>,

    /// Model name as reported by the API
    pub model: String,
}

/// Token counts for one call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// An LLM reachable through chat completions.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "ollama").
    fn name(&self) -> &str;

    /// Non-streaming completion. Blank replies are `MalformedResponse`.
    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Used by `skylog doctor`.
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}
