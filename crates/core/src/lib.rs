//! # skylog Core
//!
//! Domain types, traits, and error definitions for the skylog flight-log
//! analysis agent. This crate has **no framework dependencies**: it defines
//! the domain model that every other crate implements against.
//!
//! ## Design Philosophy
//!
//! Each external collaborator (the LLM API, the flight-log database) is a
//! trait here. Implementations live in their own crates, which keeps the
//! agent loop testable with scripted stand-ins.

pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, StoreError};
pub use event::{DomainEvent, EventBus};
pub use message::{ChatMessage, Conversation, Role, SessionId, Speaker, Turn};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use store::{ColumnInfo, FlightStore, QueryResult, ScalarValue};
