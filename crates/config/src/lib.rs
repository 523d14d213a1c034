//! Configuration loading, validation, and management for skylog.
//!
//! Loads configuration from `~/.skylog/config.toml` with environment
//! variable overrides, validated before anything else starts.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Everything skylog reads from `~/.skylog/config.toml`. Every field has a
/// default, so an empty or missing file is a working configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the chat-completion endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Provider name: "openai", "openrouter", "ollama", or anything
    /// OpenAI-compatible together with `api_url`
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Override the provider's base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Chat model
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature; kept low so directives stay well-formed
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Agent loop limits
    #[serde(default)]
    pub agent: AgentConfig,

    /// Flight-log database
    #[serde(default)]
    pub store: StoreConfig,

    /// HTTP gateway
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Chat session lifecycle
    #[serde(default)]
    pub sessions: SessionConfig,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_tokens() -> u32 {
    1000
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("agent", &self.agent)
            .field("store", &self.store)
            .field("gateway", &self.gateway)
            .field("sessions", &self.sessions)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Deepest recursion a single question may reach
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Re-issues of a malformed LLM call before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Wall-clock budget for one question, in seconds
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,

    /// Rows rendered into a result turn
    #[serde(default = "default_max_result_rows")]
    pub max_result_rows: usize,
}

fn default_max_depth() -> u32 {
    8
}
fn default_max_retries() -> u32 {
    3
}
fn default_deadline_secs() -> u64 {
    180
}
fn default_max_result_rows() -> usize {
    200
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_retries: default_max_retries(),
            deadline_secs: default_deadline_secs(),
            max_result_rows: default_max_result_rows(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file (":memory:" for an ephemeral store)
    #[serde(default = "default_store_path")]
    pub path: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_store_path() -> String {
    AppConfig::config_dir()
        .join("flight_logs.db")
        .to_string_lossy()
        .into_owned()
}
fn default_max_connections() -> u32 {
    4
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Allowed CORS origins; `"*"` allows any
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Request body limit; flight-log uploads are large
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}
fn default_body_limit() -> usize {
    64 * 1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            cors_origins: default_cors_origins(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Sessions idle longer than this are dropped
    #[serde(default = "default_idle_ttl")]
    pub idle_ttl_secs: u64,

    /// Oldest-idle sessions are evicted past this count
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
}

fn default_idle_ttl() -> u64 {
    3600
}
fn default_max_sessions() -> usize {
    1000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: default_idle_ttl(),
            max_sessions: default_max_sessions(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.skylog/config.toml).
    ///
    /// A set environment variable always overrides the file. Where several
    /// names feed one setting, the first one set wins:
    /// - API key: `SKYLOG_API_KEY`, `LLM_API_KEY`, `OPENAI_API_KEY`
    /// - provider: `SKYLOG_PROVIDER`, `LLM_PROVIDER`
    /// - model: `SKYLOG_MODEL`, `LLM_MODEL`
    /// - gateway: `API_HOST`, `API_PORT`
    /// - database: `SKYLOG_DB`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Read one TOML file; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`; see [`AppConfig::load`].
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let first = |keys: &[&str]| keys.iter().find_map(|k| lookup(k));

        if let Some(key) = first(&["SKYLOG_API_KEY", "LLM_API_KEY", "OPENAI_API_KEY"]) {
            self.api_key = Some(key);
        }
        if let Some(provider) = first(&["SKYLOG_PROVIDER", "LLM_PROVIDER"]) {
            self.provider = provider;
        }
        if let Some(model) = first(&["SKYLOG_MODEL", "LLM_MODEL"]) {
            self.model = model;
        }
        if let Some(host) = lookup("API_HOST") {
            self.gateway.host = host;
        }
        if let Some(port) = lookup("API_PORT") {
            self.gateway.port = port
                .parse()
                .map_err(|_| ConfigError::ValidationError(format!("API_PORT is not a port: {port}")))?;
        }
        if let Some(path) = lookup("SKYLOG_DB") {
            self.store.path = path;
        }
        Ok(())
    }

    /// `~/.skylog`, home of `config.toml` and the default database.
    pub fn config_dir() -> PathBuf {
        home_dir().join(".skylog")
    }

    /// Reject values the agent loop or the pool cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::ValidationError("max_tokens must be > 0".into()));
        }
        if self.agent.max_depth == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_depth must be at least 1".into(),
            ));
        }
        if self.sessions.max_sessions == 0 {
            return Err(ConfigError::ValidationError(
                "sessions.max_sessions must be at least 1".into(),
            ));
        }
        if self.store.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "store.max_connections must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Render as TOML with the API key redacted.
    pub fn redacted_toml(&self) -> String {
        let mut shown = self.clone();
        if shown.api_key.is_some() {
            shown.api_key = Some("[REDACTED]".into());
        }
        toml::to_string_pretty(&shown).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: default_provider(),
            api_url: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            agent: AgentConfig::default(),
            store: StoreConfig::default(),
            gateway: GatewayConfig::default(),
            sessions: SessionConfig::default(),
        }
    }
}

/// `$HOME` (or `%USERPROFILE%`); the working directory if neither is set.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("invalid TOML in {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("invalid configuration: {0}")]
    ValidationError(String),
}
