//! Retry policy for malformed LLM responses.

use crate::error::AgentError;
use skylog_core::provider::{Provider, ProviderRequest, ProviderResponse};
use tracing::warn;

/// A response together with the number of calls it took.
#[derive(Debug)]
pub struct Attempted {
    pub response: ProviderResponse,
    pub attempts: u32,
}

/// Issue `request`, re-issuing the identical request up to `max_retries`
/// times while the provider answers with a malformed response.
///
/// `before_retry` runs ahead of each retry with the 1-based retry number.
/// Any other provider error ends the attempt immediately.
pub async fn complete_with_retry(
    provider: &dyn Provider,
    request: &ProviderRequest,
    max_retries: u32,
    mut before_retry: impl FnMut(u32),
) -> Result<Attempted, AgentError> {
    let mut attempts = 0;
    loop {
        attempts += 1;
        match provider.complete(request.clone()).await {
            Ok(response) => return Ok(Attempted { response, attempts }),
            Err(e) if e.is_malformed() => {
                if attempts > max_retries {
                    return Err(AgentError::RetriesExhausted { attempts });
                }
                warn!(
                    attempt = attempts,
                    max_retries,
                    error = %e,
                    "Malformed LLM response, retrying"
                );
                before_retry(attempts);
            }
            Err(e) => return Err(AgentError::Provider(e)),
        }
    }
}
