//! `skylog tables`: list tables with row counts.

use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let store = super::open_store(&config).await?;
    let summary = store.summary().await?;

    if summary.is_empty() {
        println!("No tables. Load a log with `skylog ingest <file.json>`.");
        return Ok(());
    }

    let width = summary.iter().map(|t| t.name.len()).max().unwrap_or(0);
    for table in &summary {
        println!(
            "  {:<width$}  {:>8} rows  {:>3} columns",
            table.name,
            table.rows,
            table.columns.len()
        );
    }
    Ok(())
}
