//! Chain-terminal failures.
//!
//! `Display` is the text the user sees.

use crate::directive::DirectiveError;
use skylog_core::error::ProviderError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AgentError {
    #[error(
        "The LLM API consistently returned malformed responses. Please check the API and try again later."
    )]
    RetriesExhausted { attempts: u32 },

    #[error("The query contains multiple statements. Please provide a single SQL statement.")]
    MultiStatement,

    #[error("{0}")]
    DirectiveFormat(#[from] DirectiveError),

    #[error("The analysis chain exceeded its maximum depth of {max_depth} steps.")]
    MaxDepthExceeded { max_depth: u32 },

    #[error("The request did not finish within {secs} seconds.")]
    DeadlineExceeded { secs: u64 },

    #[error("LLM API error: {0}")]
    Provider(ProviderError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_facing_messages() {
        assert_eq!(
            AgentError::MultiStatement.to_string(),
            "The query contains multiple statements. Please provide a single SQL statement."
        );
        assert!(
            AgentError::RetriesExhausted { attempts: 4 }
                .to_string()
                .contains("consistently returned malformed responses")
        );
        assert_eq!(
            AgentError::from(DirectiveError::Analyse).to_string(),
            "Invalid 'analyse:' format. It should be 'analyse: [PROMPT] [DATA]'."
        );
        assert_eq!(
            AgentError::MaxDepthExceeded { max_depth: 3 }.to_string(),
            "The analysis chain exceeded its maximum depth of 3 steps."
        );
    }
}
