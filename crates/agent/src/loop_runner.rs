//! The question-answering chain: call the LLM, act on its directive,
//! feed the outcome back, repeat until it answers in plain text.

use crate::directive::{self, Directive};
use crate::error::AgentError;
use crate::prompts;
use crate::retry::complete_with_retry;
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use skylog_core::error::StoreError;
use skylog_core::event::{DomainEvent, EventBus};
use skylog_core::message::{ChatMessage, Conversation, SessionId, Speaker};
use skylog_core::provider::{Provider, ProviderRequest};
use skylog_core::store::{FlightStore, validate_single_statement};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Outcome flag surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Success,
    Error,
}

/// The terminal text of one chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,
    pub status: ReplyStatus,
}

impl Reply {
    pub fn is_success(&self) -> bool {
        self.status == ReplyStatus::Success
    }
}

/// Per-chain bookkeeping shared by every recursion level.
struct Chain {
    session_id: String,
    llm_calls: u32,
}

/// Orchestrates LLM calls, flight-store queries and self-analysis.
///
/// One user message drives a chain: the model's reply is classified into a
/// [`Directive`]; queries and analyses feed their results back as a new
/// input one level deeper, until the model answers directly.
pub struct AgentLoop {
    provider: Arc<dyn Provider>,
    store: Arc<dyn FlightStore>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    /// Deepest recursion level allowed; the user's message is level 0
    max_depth: u32,
    max_retries: u32,
    deadline: Duration,
    /// Rows rendered into a result turn
    max_result_rows: usize,
    event_bus: Arc<EventBus>,
}

impl AgentLoop {
    /// Create an agent loop with default limits.
    pub fn new(
        provider: Arc<dyn Provider>,
        store: Arc<dyn FlightStore>,
        model: impl Into<String>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            store,
            model: model.into(),
            temperature: 0.1,
            max_tokens: Some(1000),
            max_depth: 8,
            max_retries: 3,
            deadline: Duration::from_secs(180),
            max_result_rows: 200,
            event_bus,
        }
    }

    /// Create an agent loop with every knob taken from configuration.
    pub fn from_config(
        config: &skylog_config::AppConfig,
        provider: Arc<dyn Provider>,
        store: Arc<dyn FlightStore>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self::new(provider, store, &config.model, event_bus)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
            .with_max_depth(config.agent.max_depth)
            .with_max_retries(config.agent.max_retries)
            .with_deadline(Duration::from_secs(config.agent.deadline_secs))
            .with_max_result_rows(config.agent.max_result_rows)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the max tokens per LLM response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_max_depth(mut self, max: u32) -> Self {
        self.max_depth = max;
        self
    }

    /// Retries after the first malformed response.
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    /// Wall-clock budget for a whole chain.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_max_result_rows(mut self, rows: usize) -> Self {
        self.max_result_rows = rows;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Answer `message`, folding any failure into an error reply.
    pub async fn chat(
        &self,
        session_id: &SessionId,
        conversation: &mut Conversation,
        message: &str,
    ) -> Reply {
        match self.run(session_id, conversation, message).await {
            Ok(text) => Reply {
                text,
                status: ReplyStatus::Success,
            },
            Err(e) => {
                error!(session_id = %session_id, error = %e, "Agent chain failed");
                Reply {
                    text: e.to_string(),
                    status: ReplyStatus::Error,
                }
            }
        }
    }

    /// Drive one chain to its terminal text.
    ///
    /// Every intermediate turn is recorded in `conversation`, so one
    /// question can leave many turns behind.
    pub async fn run(
        &self,
        session_id: &SessionId,
        conversation: &mut Conversation,
        message: &str,
    ) -> Result<String, AgentError> {
        info!(
            session_id = %session_id,
            turns = conversation.len(),
            "Processing chat message"
        );

        let mut chain = Chain {
            session_id: session_id.to_string(),
            llm_calls: 0,
        };

        let outcome = match tokio::time::timeout(
            self.deadline,
            self.step(&mut chain, conversation, message.to_string(), 0),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(AgentError::DeadlineExceeded {
                secs: self.deadline.as_secs(),
            }),
        };

        self.event_bus.publish(DomainEvent::ChainFinished {
            session_id: chain.session_id,
            llm_calls: chain.llm_calls,
            success: outcome.is_ok(),
            timestamp: chrono::Utc::now(),
        });

        outcome
    }

    /// One level of the chain: build context, call the model, act on the
    /// directive.
    fn step<'a>(
        &'a self,
        chain: &'a mut Chain,
        conversation: &'a mut Conversation,
        input: String,
        depth: u32,
    ) -> BoxFuture<'a, Result<String, AgentError>> {
        async move {
            if depth > self.max_depth {
                warn!(
                    session_id = %chain.session_id,
                    depth,
                    max_depth = self.max_depth,
                    "Max chain depth reached"
                );
                return Err(AgentError::MaxDepthExceeded {
                    max_depth: self.max_depth,
                });
            }

            conversation.push(Speaker::User, input);
            let request = self.build_request(conversation);

            let mut retries = 0;
            let attempted = complete_with_retry(
                self.provider.as_ref(),
                &request,
                self.max_retries,
                |_| {
                    retries += 1;
                    conversation.push(Speaker::Tool, prompts::RETRY_NOTE);
                },
            )
            .await;
            chain.llm_calls += retries + 1;
            let attempted = attempted?;

            self.event_bus.publish(DomainEvent::ResponseGenerated {
                session_id: chain.session_id.clone(),
                model: attempted.response.model.clone(),
                depth,
                attempts: attempted.attempts,
                tokens_used: attempted
                    .response
                    .usage
                    .as_ref()
                    .map_or(0, |u| u.total_tokens),
                timestamp: chrono::Utc::now(),
            });

            let content = attempted.response.content;
            debug!(session_id = %chain.session_id, depth, response = %content, "LLM response");

            match directive::parse(&content)? {
                Directive::Query { sql } => self.run_query(chain, conversation, sql, depth).await,
                Directive::Analyse { instruction, data } => {
                    debug!(depth, instruction = %instruction, "Recursing into analysis");
                    let reply = self
                        .step(
                            chain,
                            conversation,
                            prompts::analyst_prompt(&instruction, &data),
                            depth + 1,
                        )
                        .await?;
                    conversation.push(Speaker::Tool, prompts::analyst_response_turn(&reply));
                    Ok(reply)
                }
                Directive::Direct(text) => {
                    conversation.push(Speaker::Assistant, text.clone());
                    Ok(text)
                }
            }
        }
        .boxed()
    }

    /// Execute a query directive.
    ///
    /// An empty result asks the model to re-evaluate, since the model can
    /// usually fix a wrong filter on its own. A failed statement ends the
    /// chain with a clarifying question for the user instead: the engine
    /// error usually means the model guessed the schema wrong, and only the
    /// user can say what the columns mean. SQL with more than one statement
    /// fails the chain without touching the store.
    async fn run_query(
        &self,
        chain: &mut Chain,
        conversation: &mut Conversation,
        sql: String,
        depth: u32,
    ) -> Result<String, AgentError> {
        let result = match validate_single_statement(&sql) {
            Ok(()) => {
                debug!(session_id = %chain.session_id, depth, sql = %sql, "Executing query");
                let started = Instant::now();
                let result = self.store.execute_query(&sql).await;
                self.event_bus.publish(DomainEvent::QueryExecuted {
                    session_id: chain.session_id.clone(),
                    rows: result.as_ref().map_or(0, |r| r.rows.len()),
                    success: result.is_ok(),
                    duration_ms: started.elapsed().as_millis() as u64,
                    timestamp: chrono::Utc::now(),
                });
                result
            }
            Err(StoreError::MultiStatement) => {
                warn!(session_id = %chain.session_id, sql = %sql, "Rejected multi-statement query");
                return Err(AgentError::MultiStatement);
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(rows) if rows.is_empty() => {
                conversation.push(Speaker::Tool, prompts::EMPTY_RESULT_QUESTION);
                self.step(
                    chain,
                    conversation,
                    prompts::EMPTY_RESULT_PROMPT.to_string(),
                    depth + 1,
                )
                .await
            }
            Ok(rows) => {
                let rendered = rows.render(self.max_result_rows);
                conversation.push(Speaker::Tool, prompts::results_turn(&rendered));
                self.step(
                    chain,
                    conversation,
                    prompts::analyze_results_prompt(&rendered),
                    depth + 1,
                )
                .await
            }
            Err(StoreError::MultiStatement) => Err(AgentError::MultiStatement),
            Err(e) => {
                warn!(session_id = %chain.session_id, error = %e, "Query failed");
                let question = prompts::execution_error_question(&e.to_string());
                conversation.push(Speaker::Tool, question.clone());
                Ok(question)
            }
        }
    }

    /// System instructions followed by the role-tagged history.
    fn build_request(&self, conversation: &Conversation) -> ProviderRequest {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(ChatMessage::system(prompts::SYSTEM_INSTRUCTIONS));
        messages.extend(conversation.snapshot());

        ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}
