//! Flight-log store for skylog.
//!
//! `SqliteStore` implements the `skylog_core::FlightStore` contract the
//! agent queries, plus the ingestion and listing operations the HTTP
//! surface needs.

pub mod ingest;
pub mod sqlite;

pub use ingest::{IngestBatch, IngestReport, sanitize_table_name};
pub use sqlite::{SqliteStore, TableSummary};
