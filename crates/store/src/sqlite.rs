//! SQLite backend for flight-log data.
//!
//! One table per ingested message type. The agent reaches it through the
//! `FlightStore` trait; the HTTP surface uses the inherent ingestion and
//! listing methods.

use crate::ingest::{IngestBatch, IngestReport, sanitize_table_name};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use skylog_core::error::StoreError;
use skylog_core::store::{
    ColumnInfo, FlightStore, QueryResult, ScalarValue, quote_ident, validate_single_statement,
};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous,
};
use sqlx::{Column, Row, SqlitePool, TypeInfo, ValueRef};
use std::path::Path;
use std::str::FromStr;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Per-table overview for the database summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSummary {
    pub name: String,
    pub rows: u64,
    pub columns: Vec<String>,
}

/// A pooled SQLite flight-log store.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`.
    ///
    /// `":memory:"` and `"sqlite::memory:"` give an ephemeral database. It
    /// lives on a single pooled connection that is never recycled, since
    /// each SQLite connection to `:memory:` is its own database.
    pub async fn new(path: &str, max_connections: u32) -> Result<Self, StoreError> {
        let in_memory = matches!(path, ":memory:" | "sqlite::memory:");

        let options = if in_memory {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
        } else {
            if let Some(parent) = Path::new(path).parent().filter(|p| !p.as_os_str().is_empty())
            {
                tokio::fs::create_dir_all(parent).await.map_err(|e| {
                    StoreError::Storage(format!("Cannot create {}: {e}", parent.display()))
                })?;
            }
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
        };

        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections.max(1))
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        info!("SQLite flight store initialized at {path}");
        Ok(Self { pool })
    }

    /// Ephemeral store, mostly for tests and one-shot CLI runs.
    pub async fn in_memory() -> Result<Self, StoreError> {
        Self::new(":memory:", 1).await
    }

    /// Replace the table for `batch.message_type` with the batch's rows.
    ///
    /// Each field becomes a nullable `REAL` column. An autoincrement `id`
    /// key is added unless the payload already carries an `id` field.
    /// The drop, create and inserts commit together.
    pub async fn ingest(&self, batch: &IngestBatch) -> Result<IngestReport, StoreError> {
        let columnar = batch.to_rows()?;
        let table = sanitize_table_name(&batch.message_type);
        let quoted = quote_ident(&table);

        let has_id = columnar.fields.iter().any(|f| f.eq_ignore_ascii_case("id"));
        let mut column_defs: Vec<String> = Vec::with_capacity(columnar.fields.len() + 1);
        if !has_id {
            column_defs.push("id INTEGER PRIMARY KEY AUTOINCREMENT".into());
        }
        column_defs.extend(
            columnar
                .fields
                .iter()
                .map(|f| format!("{} REAL", quote_ident(f))),
        );

        let column_list = columnar
            .fields
            .iter()
            .map(|f| quote_ident(f))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; columnar.fields.len()].join(", ");
        let insert_sql = format!("INSERT INTO {quoted} ({column_list}) VALUES ({placeholders})");

        let mut tx = self.pool.begin().await.map_err(storage)?;

        sqlx::query(&format!("DROP TABLE IF EXISTS {quoted}"))
            .execute(&mut *tx)
            .await
            .map_err(storage)?;
        sqlx::query(&format!(
            "CREATE TABLE {quoted} ({})",
            column_defs.join(", ")
        ))
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        for row in &columnar.rows {
            let mut insert = sqlx::query(&insert_sql);
            for value in row {
                insert = insert.bind(*value);
            }
            insert.execute(&mut *tx).await.map_err(storage)?;
        }

        tx.commit().await.map_err(storage)?;

        let report = IngestReport {
            table,
            rows: columnar.rows.len(),
            columns: columnar.fields.len(),
        };
        info!(
            table = %report.table,
            rows = report.rows,
            columns = report.columns,
            session = %batch.session_id,
            "Ingested message type"
        );
        Ok(report)
    }

    /// First `limit` rows of `table`, with every schema column.
    pub async fn table_data(&self, table: &str, limit: u32) -> Result<QueryResult, StoreError> {
        let schema = self.table_schema(table).await?;
        let rows = sqlx::query(&format!("SELECT * FROM {} LIMIT ?", quote_ident(table)))
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(execution)?;

        Ok(QueryResult {
            columns: schema.into_iter().map(|c| c.name).collect(),
            rows: rows.iter().map(decode_row).collect(),
        })
    }

    /// Drop every user table. Returns the dropped names.
    pub async fn clear_all_tables(&self) -> Result<Vec<String>, StoreError> {
        let tables = self.list_tables().await?;
        for table in &tables {
            sqlx::query(&format!("DROP TABLE IF EXISTS {}", quote_ident(table)))
                .execute(&self.pool)
                .await
                .map_err(storage)?;
        }
        info!(dropped = tables.len(), "Cleared flight database");
        Ok(tables)
    }

    /// Name, row count and columns of every user table.
    pub async fn summary(&self) -> Result<Vec<TableSummary>, StoreError> {
        let mut summaries = Vec::new();
        for name in self.list_tables().await? {
            let columns = self
                .table_schema(&name)
                .await?
                .into_iter()
                .map(|c| c.name)
                .collect();
            let rows = self.row_count(&name).await?;
            summaries.push(TableSummary {
                name,
                rows,
                columns,
            });
        }
        Ok(summaries)
    }

    /// Close the pool, flushing WAL state for file-backed databases.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl FlightStore for SqliteStore {
    async fn execute_query(&self, sql: &str) -> Result<QueryResult, StoreError> {
        validate_single_statement(sql)?;

        let started = Instant::now();
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, "Query failed");
                execution(e)
            })?;

        let columns = rows
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect()
            })
            .unwrap_or_default();

        debug!(
            rows = rows.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Query executed"
        );

        Ok(QueryResult {
            columns,
            rows: rows.iter().map(decode_row).collect(),
        })
    }

    async fn list_tables(&self) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("name").map_err(storage))
            .collect()
    }

    async fn table_schema(&self, table: &str) -> Result<Vec<ColumnInfo>, StoreError> {
        let rows = sqlx::query(&format!("PRAGMA table_info({})", quote_ident(table)))
            .fetch_all(&self.pool)
            .await
            .map_err(storage)?;

        if rows.is_empty() {
            return Err(StoreError::TableNotFound(table.to_string()));
        }

        rows.iter()
            .map(|row| {
                Ok(ColumnInfo {
                    name: row.try_get("name").map_err(storage)?,
                    declared_type: row.try_get("type").map_err(storage)?,
                    nullable: row.try_get::<i64, _>("notnull").map_err(storage)? == 0,
                })
            })
            .collect()
    }

    async fn row_count(&self, table: &str) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", quote_ident(table)))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match execution(e) {
                StoreError::Execution(msg) if msg.contains("no such table") => {
                    StoreError::TableNotFound(table.to_string())
                }
                other => other,
            })?;
        Ok(count.max(0) as u64)
    }
}

/// Decode each cell by its runtime storage class.
fn decode_row(row: &SqliteRow) -> Vec<ScalarValue> {
    (0..row.len())
        .map(|i| {
            let Ok(raw) = row.try_get_raw(i) else {
                return ScalarValue::Null;
            };
            if raw.is_null() {
                return ScalarValue::Null;
            }
            let storage_class = raw.type_info().name().to_string();
            match storage_class.as_str() {
                "INTEGER" => row
                    .try_get_unchecked::<i64, _>(i)
                    .map(ScalarValue::Integer)
                    .unwrap_or(ScalarValue::Null),
                "REAL" => row
                    .try_get_unchecked::<f64, _>(i)
                    .map(ScalarValue::Real)
                    .unwrap_or(ScalarValue::Null),
                "BLOB" => row
                    .try_get_unchecked::<Vec<u8>, _>(i)
                    .map(ScalarValue::Blob)
                    .unwrap_or(ScalarValue::Null),
                _ => row
                    .try_get_unchecked::<String, _>(i)
                    .map(ScalarValue::Text)
                    .unwrap_or(ScalarValue::Null),
            }
        })
        .collect()
}

/// Statement failures carry the engine's own message.
fn execution(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::Database(db) => StoreError::Execution(db.message().to_string()),
        other => StoreError::Storage(other.to_string()),
    }
}

fn storage(e: sqlx::Error) -> StoreError {
    StoreError::Storage(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> SqliteStore {
        SqliteStore::in_memory().await.unwrap()
    }

    fn gps_batch() -> IngestBatch {
        serde_json::from_value(serde_json::json!({
            "sessionId": "s1",
            "messageType": "GPS",
            "messageList": {
                "TimeUS": {"0": 1000, "1": 2000, "2": 3000},
                "Alt": {"0": 10.0, "1": 25.5, "2": 18.0},
                "NSats": {"0": 9, "1": 4}
            }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn ingest_creates_real_columns_with_id() {
        let store = test_store().await;
        let report = store.ingest(&gps_batch()).await.unwrap();
        assert_eq!(
            report,
            IngestReport {
                table: "GPS".into(),
                rows: 3,
                columns: 3
            }
        );

        let schema = store.table_schema("GPS").await.unwrap();
        let names: Vec<&str> = schema.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "TimeUS", "Alt", "NSats"]);
        assert_eq!(schema[1].declared_type, "REAL");
        assert!(schema[1].nullable);
    }

    #[tokio::test]
    async fn ingest_replaces_existing_table() {
        let store = test_store().await;
        store.ingest(&gps_batch()).await.unwrap();
        store.ingest(&gps_batch()).await.unwrap();
        assert_eq!(store.row_count("GPS").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn ingest_keeps_payload_id_column() {
        let store = test_store().await;
        let batch: IngestBatch = serde_json::from_value(serde_json::json!({
            "messageType": "MODE",
            "messageList": {"ID": {"0": 1}, "Mode": {"0": 5}}
        }))
        .unwrap();
        store.ingest(&batch).await.unwrap();

        let names: Vec<String> = store
            .table_schema("MODE")
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["ID", "Mode"]);
    }

    #[tokio::test]
    async fn ingest_sanitizes_table_name() {
        let store = test_store().await;
        let batch: IngestBatch = serde_json::from_value(serde_json::json!({
            "messageType": "BAT[0]",
            "messageList": {"Volt": {"0": 12.4}}
        }))
        .unwrap();
        let report = store.ingest(&batch).await.unwrap();
        assert_eq!(report.table, "BAT_0_");
        assert_eq!(store.list_tables().await.unwrap(), vec!["BAT_0_"]);
    }

    #[tokio::test]
    async fn execute_query_decodes_storage_classes() {
        let store = test_store().await;
        store.ingest(&gps_batch()).await.unwrap();

        let result = store
            .execute_query("SELECT id, Alt, NSats FROM GPS ORDER BY id;")
            .await
            .unwrap();
        assert_eq!(result.columns, vec!["id", "Alt", "NSats"]);
        assert_eq!(result.rows.len(), 3);
        assert_eq!(result.rows[0][0], ScalarValue::Integer(1));
        assert_eq!(result.rows[1][1], ScalarValue::Real(25.5));
        assert_eq!(result.rows[2][2], ScalarValue::Null);

        let text = store.execute_query("SELECT 'hover' AS mode").await.unwrap();
        assert_eq!(text.rows[0][0], ScalarValue::Text("hover".into()));
    }

    #[tokio::test]
    async fn execute_query_empty_result() {
        let store = test_store().await;
        store.ingest(&gps_batch()).await.unwrap();
        let result = store
            .execute_query("SELECT Alt FROM GPS WHERE Alt > 1000;")
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn execute_query_rejects_multiple_statements() {
        let store = test_store().await;
        store.ingest(&gps_batch()).await.unwrap();
        let err = store
            .execute_query("SELECT 1; DROP TABLE GPS;")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MultiStatement));
        assert_eq!(store.list_tables().await.unwrap(), vec!["GPS"]);
    }

    #[tokio::test]
    async fn statement_after_terminator_is_never_run() {
        let store = test_store().await;
        store.ingest(&gps_batch()).await.unwrap();
        let err = store
            .execute_query("SELECT 1; DROP TABLE GPS")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Execution(ref msg) if msg.contains("one statement")));
        assert_eq!(store.list_tables().await.unwrap(), vec!["GPS"]);
    }

    #[tokio::test]
    async fn execute_query_surfaces_engine_message() {
        let store = test_store().await;
        let err = store
            .execute_query("SELECT Alt FROM NOPE;")
            .await
            .unwrap_err();
        match err {
            StoreError::Execution(msg) => assert!(msg.contains("no such table")),
            other => panic!("expected execution error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_table_introspection() {
        let store = test_store().await;
        assert!(matches!(
            store.table_schema("NOPE").await,
            Err(StoreError::TableNotFound(_))
        ));
        assert!(matches!(
            store.row_count("NOPE").await,
            Err(StoreError::TableNotFound(_))
        ));
    }

    #[tokio::test]
    async fn table_data_respects_limit() {
        let store = test_store().await;
        store.ingest(&gps_batch()).await.unwrap();
        let data = store.table_data("GPS", 2).await.unwrap();
        assert_eq!(data.columns, vec!["id", "TimeUS", "Alt", "NSats"]);
        assert_eq!(data.rows.len(), 2);
    }

    #[tokio::test]
    async fn summary_and_clear() {
        let store = test_store().await;
        store.ingest(&gps_batch()).await.unwrap();
        let batch: IngestBatch = serde_json::from_value(serde_json::json!({
            "messageType": "ATT",
            "messageList": {"Roll": {"0": 0.1, "1": 0.2}}
        }))
        .unwrap();
        store.ingest(&batch).await.unwrap();

        let summary = store.summary().await.unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].name, "ATT");
        assert_eq!(summary[0].rows, 2);
        assert_eq!(summary[1].name, "GPS");
        assert_eq!(summary[1].rows, 3);

        let dropped = store.clear_all_tables().await.unwrap();
        assert_eq!(dropped, vec!["ATT", "GPS"]);
        assert!(store.list_tables().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("flight.db");
        let path = path.to_string_lossy().into_owned();

        let store = SqliteStore::new(&path, 2).await.unwrap();
        store.ingest(&gps_batch()).await.unwrap();
        store.close().await;

        let reopened = SqliteStore::new(&path, 2).await.unwrap();
        assert_eq!(reopened.row_count("GPS").await.unwrap(), 3);
    }
}
