//! REST handlers.
//!
//! Routes:
//! - `GET  /`                                banner
//! - `GET  /health`                          liveness and uptime
//! - `POST /api/parsed-data`                 ingest one message type
//! - `GET  /api/parsed-data/{session_id}`    what a session ingested
//! - `GET  /api/tables`                      user tables
//! - `GET  /api/table/{name}?limit=`         rows of one table
//! - `DELETE /api/clear-database`            drop every table
//! - `GET  /api/database-summary`            rows and columns per table
//! - `POST /api/chat`                        ask the agent
//! - `POST /api/chat/clear`                  reset a session's history
//! - `GET  /api/chat/context?session_id=`    role-tagged history

use crate::SharedState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use skylog_core::error::StoreError;
use skylog_core::event::DomainEvent;
use skylog_core::message::SessionId;
use skylog_core::store::FlightStore;
use skylog_store::IngestBatch;
use tracing::{info, warn};

const DEFAULT_SESSION: &str = "default";
const DEFAULT_TABLE_LIMIT: u32 = 100;

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/api/parsed-data", post(ingest_handler))
        .route("/api/parsed-data/{session_id}", get(session_data_handler))
        .route("/api/tables", get(tables_handler))
        .route("/api/table/{name}", get(table_data_handler))
        .route("/api/clear-database", delete(clear_database_handler))
        .route("/api/database-summary", get(summary_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/chat/clear", post(chat_clear_handler))
        .route("/api/chat/context", get(chat_context_handler))
        .with_state(state)
}

// ── Errors ───────────────────────────────────────────────────────────────

/// An error body: `{"status": "error", "message": ...}`.
#[derive(Debug)]
pub struct ApiError {
    code: StatusCode,
    message: String,
}

impl ApiError {
    fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.code,
            Json(json!({"status": "error", "message": self.message})),
        )
            .into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        let code = match &e {
            StoreError::TableNotFound(_) => StatusCode::NOT_FOUND,
            StoreError::InvalidPayload(_) | StoreError::MultiStatement => StatusCode::BAD_REQUEST,
            StoreError::Execution(_) | StoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(code, e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

// ── Request types ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SessionParams {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<u32>,
}

fn session_or_default(id: Option<String>) -> SessionId {
    match id {
        Some(id) if !id.trim().is_empty() => SessionId(id),
        _ => SessionId::from(DEFAULT_SESSION),
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn root_handler() -> Json<Value> {
    Json(json!({
        "status": "success",
        "message": "skylog flight-log API is running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health_handler(State(state): State<SharedState>) -> Json<Value> {
    let uptime = (chrono::Utc::now() - state.started_at).num_seconds().max(0);
    Json(json!({
        "status": "success",
        "healthy": true,
        "model": state.agent.model(),
        "sessions": state.sessions.len().await,
        "uptime_secs": uptime,
    }))
}

async fn ingest_handler(
    State(state): State<SharedState>,
    payload: Result<Json<IngestBatch>, JsonRejection>,
) -> ApiResult {
    let Json(batch) = payload?;
    info!(
        session_id = %batch.session_id,
        message_type = %batch.message_type,
        fields = batch.message_list.len(),
        "Received parsed data"
    );

    let report = state.store.ingest(&batch).await.map_err(|e| {
        warn!(message_type = %batch.message_type, error = %e, "Ingest failed");
        ApiError::from(e)
    })?;

    state
        .ingested
        .record(&batch.session_id, &batch.message_type, report.rows)
        .await;

    state.event_bus.publish(DomainEvent::DataIngested {
        table: report.table.clone(),
        rows: report.rows,
        timestamp: chrono::Utc::now(),
    });

    Ok(Json(json!({
        "status": "success",
        "message": "Data received and stored",
        "session_id": batch.session_id,
        "table_name": report.table,
        "rows": report.rows,
        "columns": report.columns,
    })))
}

async fn session_data_handler(
    State(state): State<SharedState>,
    Path(session_id): Path<String>,
) -> ApiResult {
    let Some(types) = state.ingested.counts(&session_id).await else {
        return Err(ApiError::new(
            StatusCode::NOT_FOUND,
            format!("No data found for session {session_id}"),
        ));
    };

    Ok(Json(json!({
        "status": "success",
        "summary": {
            "session_id": session_id,
            "message_types": types.keys().collect::<Vec<_>>(),
            "message_counts": types,
        },
    })))
}

async fn tables_handler(State(state): State<SharedState>) -> ApiResult {
    let tables = state.store.list_tables().await?;
    Ok(Json(json!({"status": "success", "tables": tables})))
}

async fn table_data_handler(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    Query(params): Query<LimitParams>,
) -> ApiResult {
    let limit = params.limit.unwrap_or(DEFAULT_TABLE_LIMIT);
    let result = state.store.table_data(&name, limit).await?;

    let data: Vec<Value> = result
        .rows
        .iter()
        .map(|row| {
            let record: serde_json::Map<String, Value> = result
                .columns
                .iter()
                .cloned()
                .zip(row.iter().map(|cell| json!(cell)))
                .collect();
            Value::Object(record)
        })
        .collect();

    Ok(Json(json!({
        "status": "success",
        "table": name,
        "count": data.len(),
        "data": data,
    })))
}

async fn clear_database_handler(State(state): State<SharedState>) -> ApiResult {
    let dropped = state.store.clear_all_tables().await?;
    state.ingested.clear().await;
    Ok(Json(json!({
        "status": "success",
        "message": format!("Dropped {} tables", dropped.len()),
        "dropped": dropped,
    })))
}

async fn summary_handler(State(state): State<SharedState>) -> ApiResult {
    let tables = state.store.summary().await?;
    let total_rows: u64 = tables.iter().map(|t| t.rows).sum();
    Ok(Json(json!({
        "status": "success",
        "table_count": tables.len(),
        "total_rows": total_rows,
        "tables": tables,
    })))
}

async fn chat_handler(
    State(state): State<SharedState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = payload?;
    if request.message.trim().is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "message must not be empty",
        ));
    }

    let session_id = session_or_default(request.session_id);
    info!(session_id = %session_id, "Chat request");

    let conversation = state.sessions.get_or_create(&session_id).await;
    let mut conversation = conversation.lock().await;
    let reply = state
        .agent
        .chat(&session_id, &mut conversation, &request.message)
        .await;

    Ok(Json(json!({
        "status": reply.status,
        "response": reply.text,
        "session_id": session_id.0,
    })))
}

async fn chat_clear_handler(
    State(state): State<SharedState>,
    payload: Result<Json<SessionParams>, JsonRejection>,
) -> ApiResult {
    // A missing or empty body clears the default session.
    let params = payload.map(|Json(p)| p).unwrap_or_default();
    let session_id = session_or_default(params.session_id);
    let existed = state.sessions.clear(&session_id).await;
    info!(session_id = %session_id, existed, "Cleared conversation");

    Ok(Json(json!({
        "status": "success",
        "message": "Conversation history cleared",
        "session_id": session_id.0,
    })))
}

async fn chat_context_handler(
    State(state): State<SharedState>,
    Query(params): Query<SessionParams>,
) -> ApiResult {
    let session_id = session_or_default(params.session_id);
    let (context, turns, updated_at) = match state.sessions.get(&session_id).await {
        Some(conversation) => {
            let conversation = conversation.lock().await;
            (
                json!(conversation.snapshot()),
                json!(conversation.turns()),
                json!(conversation.updated_at),
            )
        }
        None => (json!([]), json!([]), Value::Null),
    };

    Ok(Json(json!({
        "status": "success",
        "session_id": session_id.0,
        "context": context,
        "turns": turns,
        "updated_at": updated_at,
    })))
}
