//! Ingestion payloads.
//!
//! A parsed flight log arrives one message type at a time, as a columnar
//! map: `field -> { "<row index>" -> value }`. Every field becomes a `REAL`
//! column of a table named after the message type.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use skylog_core::error::StoreError;

/// One message type's worth of parsed log data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestBatch {
    #[serde(default = "default_session_id")]
    pub session_id: String,

    #[serde(default = "default_message_type")]
    pub message_type: String,

    #[serde(default)]
    pub message_list: serde_json::Map<String, Value>,
}

fn default_session_id() -> String {
    "default".into()
}
fn default_message_type() -> String {
    "unknown".into()
}

/// What an ingest wrote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub table: String,
    pub rows: usize,
    pub columns: usize,
}

/// Row-major view of a batch.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Columnar {
    pub fields: Vec<String>,
    pub rows: Vec<Vec<Option<f64>>>,
}

impl IngestBatch {
    /// Pivot the columnar map into rows.
    ///
    /// The row count is the longest field; indices a field lacks, and
    /// values that are not numbers, become NULL.
    pub(crate) fn to_rows(&self) -> Result<Columnar, StoreError> {
        if self.message_list.is_empty() {
            return Err(StoreError::InvalidPayload(format!(
                "messageList for '{}' has no fields",
                self.message_type
            )));
        }

        let mut series = Vec::with_capacity(self.message_list.len());
        for (field, values) in &self.message_list {
            let Value::Object(by_index) = values else {
                return Err(StoreError::InvalidPayload(format!(
                    "field '{field}' is not an index-keyed object"
                )));
            };
            series.push((field.clone(), by_index));
        }

        let record_count = series.iter().map(|(_, m)| m.len()).max().unwrap_or(0);
        let rows = (0..record_count)
            .map(|i| {
                let key = i.to_string();
                series
                    .iter()
                    .map(|(_, m)| m.get(&key).and_then(Value::as_f64))
                    .collect()
            })
            .collect();

        Ok(Columnar {
            fields: series.into_iter().map(|(f, _)| f).collect(),
            rows,
        })
    }
}

/// Turn a message type into a safe SQLite identifier.
///
/// Anything other than ASCII alphanumerics and `_` becomes `_`; a leading
/// digit gets a `_` prefix.
pub fn sanitize_table_name(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    if sanitized.is_empty() || sanitized.starts_with(|c: char| c.is_ascii_digit()) {
        sanitized.insert(0, '_');
    }
    sanitized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(json: Value) -> IngestBatch {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn sanitize_replaces_specials() {
        assert_eq!(sanitize_table_name("GPS[0]"), "GPS_0_");
        assert_eq!(sanitize_table_name("BAT-1"), "BAT_1");
        assert_eq!(sanitize_table_name("RC IN"), "RC_IN");
        assert_eq!(sanitize_table_name("x\"; DROP TABLE y"), "x___DROP_TABLE_y");
    }

    #[test]
    fn sanitize_prefixes_leading_digit_and_empty() {
        assert_eq!(sanitize_table_name("3DR"), "_3DR");
        assert_eq!(sanitize_table_name(""), "_");
    }

    #[test]
    fn defaults_for_missing_keys() {
        let b = batch(serde_json::json!({}));
        assert_eq!(b.session_id, "default");
        assert_eq!(b.message_type, "unknown");
        assert!(b.message_list.is_empty());
    }

    #[test]
    fn pivots_columns_into_rows() {
        let b = batch(serde_json::json!({
            "sessionId": "s1",
            "messageType": "GPS",
            "messageList": {
                "TimeUS": {"0": 100, "1": 200, "2": 300},
                "Alt": {"0": 10.5, "1": null, "2": "n/a"}
            }
        }));
        let columnar = b.to_rows().unwrap();
        assert_eq!(columnar.fields, vec!["TimeUS", "Alt"]);
        assert_eq!(
            columnar.rows,
            vec![
                vec![Some(100.0), Some(10.5)],
                vec![Some(200.0), None],
                vec![Some(300.0), None],
            ]
        );
    }

    #[test]
    fn ragged_fields_pad_with_null() {
        let b = batch(serde_json::json!({
            "messageType": "BAT",
            "messageList": {
                "Volt": {"0": 12.6},
                "Curr": {"0": 1.0, "1": 2.0}
            }
        }));
        let columnar = b.to_rows().unwrap();
        assert_eq!(columnar.rows.len(), 2);
        assert_eq!(columnar.rows[1], vec![None, Some(2.0)]);
    }

    #[test]
    fn empty_or_flat_payload_rejected() {
        let empty = batch(serde_json::json!({"messageType": "GPS", "messageList": {}}));
        assert!(matches!(empty.to_rows(), Err(StoreError::InvalidPayload(_))));

        let flat = batch(serde_json::json!({
            "messageType": "GPS",
            "messageList": {"Alt": [1, 2, 3]}
        }));
        assert!(matches!(flat.to_rows(), Err(StoreError::InvalidPayload(_))));
    }
}
