//! `skylog ingest`: load parsed flight-log JSON.

use serde_json::Value;
use skylog_store::{IngestBatch, IngestReport, SqliteStore};
use std::path::Path;
use tracing::debug;

pub async fn run(config_path: Option<&Path>, file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let raw = tokio::fs::read_to_string(file)
        .await
        .map_err(|e| format!("Cannot read {}: {e}", file.display()))?;

    let store = super::open_store(&config).await?;
    let reports = ingest_file(&store, &raw).await;
    store.close().await;
    let reports = reports?;

    for report in &reports {
        println!(
            "  {}: {} rows, {} columns",
            report.table, report.rows, report.columns
        );
    }
    println!("Loaded {} message types into {}", reports.len(), config.store.path);
    Ok(())
}

/// Accept a single batch object or an array of them.
pub fn parse_batches(raw: &str) -> Result<Vec<IngestBatch>, serde_json::Error> {
    match serde_json::from_str::<Value>(raw)? {
        Value::Array(items) => items.into_iter().map(serde_json::from_value).collect(),
        single => Ok(vec![serde_json::from_value(single)?]),
    }
}

/// Parse `raw` and load every batch it holds, stopping at the first failure.
pub async fn ingest_file(store: &SqliteStore, raw: &str) -> skylog_core::Result<Vec<IngestReport>> {
    let batches = parse_batches(raw)?;
    Ok(ingest_all(store, &batches).await?)
}

pub async fn ingest_all(
    store: &SqliteStore,
    batches: &[IngestBatch],
) -> Result<Vec<IngestReport>, skylog_core::StoreError> {
    let mut reports = Vec::with_capacity(batches.len());
    for batch in batches {
        debug!(message_type = %batch.message_type, fields = batch.message_list.len(), "Ingesting batch");
        reports.push(store.ingest(batch).await?);
    }
    Ok(reports)
}
