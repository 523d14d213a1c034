pub mod ask;
pub mod config_cmd;
pub mod doctor;
pub mod ingest;
pub mod serve;
pub mod tables;

use skylog_config::AppConfig;
use std::path::Path;

/// Load `path` if given, else the default location; env overrides apply
/// either way.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => {
            let mut config = AppConfig::load_from(path)?;
            config.apply_env(|key| std::env::var(key).ok())?;
            config.validate()?;
            config
        }
        None => AppConfig::load()?,
    };
    Ok(config)
}

pub async fn open_store(
    config: &AppConfig,
) -> Result<skylog_store::SqliteStore, Box<dyn std::error::Error>> {
    let store =
        skylog_store::SqliteStore::new(&config.store.path, config.store.max_connections).await?;
    Ok(store)
}
