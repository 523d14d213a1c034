//! FlightStore trait: the data store gateway the agent queries.
//!
//! The store executes single-statement SQL against the ingested flight log
//! and offers read-only schema introspection.

use crate::error::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One cell of a query result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl std::fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarValue::Null => write!(f, "NULL"),
            ScalarValue::Integer(v) => write!(f, "{v}"),
            ScalarValue::Real(v) => write!(f, "{v}"),
            ScalarValue::Text(v) => write!(f, "'{v}'"),
            ScalarValue::Blob(v) => write!(f, "<blob {} bytes>", v.len()),
        }
    }
}

/// Rows returned by a statement, with the projection's column names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<ScalarValue>>,
}

impl QueryResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render rows as tuples, e.g. `[(1, 2.5), (2, NULL)]`, keeping at most
    /// `max_rows` of them.
    pub fn render(&self, max_rows: usize) -> String {
        let shown: Vec<String> = self
            .rows
            .iter()
            .take(max_rows)
            .map(|row| {
                let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
                if cells.len() == 1 {
                    format!("({},)", cells[0])
                } else {
                    format!("({})", cells.join(", "))
                }
            })
            .collect();

        let mut out = String::new();
        if !self.columns.is_empty() {
            out.push_str(&format!("columns ({}): ", self.columns.join(", ")));
        }
        out.push_str(&format!("[{}]", shown.join(", ")));

        let omitted = self.rows.len().saturating_sub(max_rows);
        if omitted > 0 {
            out.push_str(&format!(" ... {omitted} more rows omitted"));
        }
        out
    }
}

/// A column as reported by schema introspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
    pub nullable: bool,
}

/// The collaborator contract the agent loop depends on.
#[async_trait]
pub trait FlightStore: Send + Sync {
    /// Run one validated statement and return its rows.
    async fn execute_query(&self, sql: &str) -> Result<QueryResult, StoreError>;

    /// Names of user tables.
    async fn list_tables(&self) -> Result<Vec<String>, StoreError>;

    /// Column layout of `table`.
    async fn table_schema(&self, table: &str) -> Result<Vec<ColumnInfo>, StoreError>;

    /// Number of rows in `table`.
    async fn row_count(&self, table: &str) -> Result<u64, StoreError>;
}

/// Message for text trailing the only `;`, worded as SQLite words it.
pub const ONE_STATEMENT_ONLY: &str = "You can only execute one statement at a time.";

/// Reject SQL the store must not run.
///
/// More than one `;` is `MultiStatement`. A single `;` followed by anything
/// but whitespace is never run either, but counts as an ordinary execution
/// failure, so it reaches the model as engine text.
pub fn validate_single_statement(sql: &str) -> Result<(), StoreError> {
    let separators = sql.matches(';').count();
    if separators > 1 {
        return Err(StoreError::MultiStatement);
    }
    if let Some(pos) = sql.find(';') {
        if !sql[pos + 1..].trim().is_empty() {
            return Err(StoreError::Execution(ONE_STATEMENT_ONLY.into()));
        }
    }
    Ok(())
}

/// Quote an SQL identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_statement_accepted() {
        assert!(validate_single_statement("SELECT a FROM t;").is_ok());
        assert!(validate_single_statement("SELECT a FROM t").is_ok());
        assert!(validate_single_statement("PRAGMA table_info(\"GPS\");  \n").is_ok());
    }

    #[test]
    fn two_separators_rejected() {
        let err = validate_single_statement("SELECT 1; SELECT 2;").unwrap_err();
        assert!(matches!(err, StoreError::MultiStatement));
    }

    #[test]
    fn text_after_single_terminator_is_execution_error() {
        for sql in [
            "SELECT 1; DROP TABLE GPS",
            "SELECT MAX(Alt) FROM GPS;\nThis returns the peak altitude.",
        ] {
            match validate_single_statement(sql) {
                Err(StoreError::Execution(msg)) => assert_eq!(msg, ONE_STATEMENT_ONLY),
                other => panic!("expected execution error for {sql:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn quote_ident_escapes() {
        assert_eq!(quote_ident("GPS"), "\"GPS\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn render_formats_tuples() {
        let result = QueryResult {
            columns: vec!["Alt".into(), "Spd".into()],
            rows: vec![
                vec![ScalarValue::Real(120.5), ScalarValue::Integer(3)],
                vec![ScalarValue::Null, ScalarValue::Text("x".into())],
            ],
        };
        assert_eq!(
            result.render(10),
            "columns (Alt, Spd): [(120.5, 3), (NULL, 'x')]"
        );
    }

    #[test]
    fn render_single_column_and_truncation() {
        let result = QueryResult {
            columns: vec![],
            rows: (0..5).map(|i| vec![ScalarValue::Integer(i)]).collect(),
        };
        let rendered = result.render(2);
        assert!(rendered.starts_with("[(0,), (1,)]"));
        assert!(rendered.ends_with("3 more rows omitted"));
    }

    #[test]
    fn scalar_serializes_untagged() {
        let json = serde_json::to_string(&vec![
            ScalarValue::Null,
            ScalarValue::Real(1.5),
            ScalarValue::Integer(2),
        ])
        .unwrap();
        assert_eq!(json, "[null,1.5,2]");
    }
}
