//! The agent loop: the heart of skylog.
//!
//! A user question drives a chain of LLM calls:
//!
//! 1. **Build context**: system instructions + the session's history
//! 2. **Call the LLM**, retrying malformed responses
//! 3. **Classify** the reply into a directive
//! 4. **Query**: run the SQL against the flight store and recurse with
//!    the results (or a re-evaluate prompt when nothing came back)
//! 5. **Analyse**: recurse with domain hints, instruction and data
//! 6. **Direct**: return the text to the user
//!
//! Every recursion is one level deeper; the chain fails closed past the
//! configured depth or wall-clock deadline.

pub mod directive;
pub mod error;
pub mod loop_runner;
pub mod prompts;
pub mod retry;
pub mod sessions;

pub use directive::{Directive, DirectiveError};
pub use error::AgentError;
pub use loop_runner::{AgentLoop, Reply, ReplyStatus};
pub use sessions::{SessionStore, SharedConversation};
