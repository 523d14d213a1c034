//! HTTP API gateway for skylog.
//!
//! Exposes ingestion of parsed flight logs, table browsing, and the chat
//! endpoint that drives the agent loop. Every JSON body carries a
//! `status` of `"success"` or `"error"`.
//!
//! Built on Axum.

pub mod api;
pub mod ingest_log;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use ingest_log::IngestLog;
use skylog_agent::{AgentLoop, SessionStore};
use skylog_core::event::EventBus;
use skylog_store::SqliteStore;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub config: skylog_config::AppConfig,
    pub agent: Arc<AgentLoop>,
    pub store: Arc<SqliteStore>,
    pub sessions: Arc<SessionStore>,
    pub ingested: Arc<IngestLog>,
    pub event_bus: Arc<EventBus>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

pub type SharedState = Arc<GatewayState>;

impl GatewayState {
    pub fn new(
        config: skylog_config::AppConfig,
        agent: Arc<AgentLoop>,
        store: Arc<SqliteStore>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let sessions = Arc::new(SessionStore::from_config(&config.sessions));
        let ingested = Arc::new(IngestLog::from_config(&config.sessions));
        Self {
            config,
            agent,
            store,
            sessions,
            ingested,
            event_bus,
            started_at: chrono::Utc::now(),
        }
    }
}

/// Build the router with every route and the cross-cutting layers:
/// CORS per config, request body limit, and HTTP trace logging.
pub fn build_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.config.gateway.cors_origins);
    let body_limit = state.config.gateway.body_limit_bytes;

    api::routes(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// `"*"` anywhere in the list allows every origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %o, "Ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::DELETE,
        ])
        .allow_headers([axum::http::header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600))
}

/// Start the gateway HTTP server.
///
/// Opens the flight store, builds the configured provider and agent once,
/// and shares them across requests.
pub async fn start(config: skylog_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let store = Arc::new(
        SqliteStore::new(&config.store.path, config.store.max_connections).await?,
    );
    let provider = skylog_providers::build_from_config(&config)?;
    if !config.has_api_key() && config.provider != "ollama" {
        warn!("No API key configured; chat requests will fail until one is set");
    }

    let event_bus = Arc::new(EventBus::default());
    let agent = Arc::new(AgentLoop::from_config(
        &config,
        provider,
        store.clone(),
        event_bus.clone(),
    ));

    let state = Arc::new(GatewayState::new(config, agent, store, event_bus));
    let janitors = [
        state.sessions.spawn_janitor(Duration::from_secs(60)),
        state.ingested.spawn_janitor(Duration::from_secs(60)),
    ];

    let app = build_router(state);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    for janitor in janitors {
        janitor.abort();
    }
    Ok(())
}
