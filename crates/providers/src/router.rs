//! Provider construction from configuration.

use crate::openai_compat::OpenAiCompatProvider;
use skylog_core::error::ProviderError;
use skylog_core::provider::Provider;
use std::sync::Arc;

/// Build the configured provider.
///
/// Well-known names resolve their base URL; any other name needs `api_url`.
pub fn build_from_config(
    config: &skylog_config::AppConfig,
) -> Result<Arc<dyn Provider>, ProviderError> {
    let base_url = match (&config.api_url, default_base_url(&config.provider)) {
        (Some(url), _) => url.clone(),
        (None, Some(url)) => url.to_string(),
        (None, None) => {
            return Err(ProviderError::NotConfigured(format!(
                "unknown provider '{}' and no api_url set",
                config.provider
            )));
        }
    };

    let api_key = match (&config.api_key, config.provider.as_str()) {
        (Some(key), _) => key.clone(),
        // Ollama doesn't need a real key
        (None, "ollama") => "ollama".into(),
        (None, _) => String::new(),
    };

    Ok(Arc::new(OpenAiCompatProvider::new(
        &config.provider,
        base_url,
        api_key,
    )))
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> Option<&'static str> {
    match provider_name {
        "openai" => Some("https://api.openai.com/v1"),
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        "ollama" => Some("http://localhost:11434/v1"),
        "mistral" => Some("https://api.mistral.ai/v1"),
        "groq" => Some("https://api.groq.com/openai/v1"),
        "together" => Some("https://api.together.xyz/v1"),
        _ => None,
    }
}
