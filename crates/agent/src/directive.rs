//! Directive parser: classify one LLM reply.
//!
//! The model is told to answer in exactly one of three shapes:
//!
//! ```text
//! query database: <single SQL statement>
//! analyse: <instruction-token> <data...>
//! <free text>
//! ```
//!
//! Markers match case-insensitively, `query database:` before `analyse:`.
//! When neither marker is present but the text holds a
//! `SELECT ... FROM ... ;` clause, that clause is recovered as a query.

use regex_lite::Regex;
use std::sync::LazyLock;

pub const QUERY_MARKER: &str = "query database:";
pub const ANALYSE_MARKER: &str = "analyse:";

static BARE_SELECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)(SELECT\s.*?FROM\s.*?;)").expect("static pattern"));

/// The classified intent of one LLM response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Run `sql` against the flight store.
    Query { sql: String },
    /// Recurse with `instruction` applied to `data`.
    Analyse { instruction: String, data: String },
    /// Plain answer for the user.
    Direct(String),
}

/// A marker was present but its payload was unusable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DirectiveError {
    #[error("Invalid 'analyse:' format. It should be 'analyse: [PROMPT] [DATA]'.")]
    Analyse,

    #[error("Invalid 'query database:' format. It should be 'query database: [SQL_QUERY]'.")]
    Query,
}

/// Classify `text`.
pub fn parse(text: &str) -> Result<Directive, DirectiveError> {
    // ASCII lowering keeps byte offsets aligned with `text`.
    let lowered = text.to_ascii_lowercase();

    if let Some(pos) = lowered.find(QUERY_MARKER) {
        let sql = text[pos + QUERY_MARKER.len()..].trim();
        if sql.is_empty() {
            return Err(DirectiveError::Query);
        }
        return Ok(Directive::Query {
            sql: sql.to_string(),
        });
    }

    if let Some(pos) = lowered.find(ANALYSE_MARKER) {
        let payload = text[pos + ANALYSE_MARKER.len()..].trim();
        let (instruction, data) = payload
            .split_once(char::is_whitespace)
            .ok_or(DirectiveError::Analyse)?;
        let data = data.trim();
        if instruction.is_empty() || data.is_empty() {
            return Err(DirectiveError::Analyse);
        }
        return Ok(Directive::Analyse {
            instruction: instruction.to_string(),
            data: data.to_string(),
        });
    }

    if let Some(found) = BARE_SELECT.find(text) {
        return Ok(Directive::Query {
            sql: found.as_str().to_string(),
        });
    }

    Ok(Directive::Direct(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_marker_strips_whitespace() {
        assert_eq!(
            parse("query database: SELECT a FROM t;").unwrap(),
            Directive::Query {
                sql: "SELECT a FROM t;".into()
            }
        );
        assert_eq!(
            parse("query database:\n   SELECT a FROM t;  \n").unwrap(),
            Directive::Query {
                sql: "SELECT a FROM t;".into()
            }
        );
    }

    #[test]
    fn query_marker_is_case_insensitive() {
        assert_eq!(
            parse("Sure. Query Database: PRAGMA table_info(\"GPS\");").unwrap(),
            Directive::Query {
                sql: "PRAGMA table_info(\"GPS\");".into()
            }
        );
    }

    #[test]
    fn empty_query_is_format_error() {
        assert_eq!(parse("query database:   "), Err(DirectiveError::Query));
    }

    #[test]
    fn analyse_splits_instruction_and_data() {
        assert_eq!(
            parse("analyse: trend 12,14,9,21").unwrap(),
            Directive::Analyse {
                instruction: "trend".into(),
                data: "12,14,9,21".into()
            }
        );
    }

    #[test]
    fn analyse_keeps_multiline_data() {
        assert_eq!(
            parse("ANALYSE: voltage\n[(12.6,), (11.1,)]").unwrap(),
            Directive::Analyse {
                instruction: "voltage".into(),
                data: "[(12.6,), (11.1,)]".into()
            }
        );
    }

    #[test]
    fn analyse_without_data_is_format_error() {
        assert_eq!(parse("analyse: trend"), Err(DirectiveError::Analyse));
        assert_eq!(parse("analyse:"), Err(DirectiveError::Analyse));
        assert_eq!(parse("analyse:    "), Err(DirectiveError::Analyse));
    }

    #[test]
    fn query_marker_wins_over_analyse() {
        assert!(matches!(
            parse("analyse: x y\nquery database: SELECT 1;").unwrap(),
            Directive::Query { .. }
        ));
    }

    #[test]
    fn recovers_bare_select() {
        let text = "You can find it with:\nSELECT x FROM y;\nLet me know.";
        assert_eq!(
            parse(text).unwrap(),
            Directive::Query {
                sql: "SELECT x FROM y;".into()
            }
        );
    }

    #[test]
    fn bare_select_spans_lines_and_stops_at_first_semicolon() {
        let text = "select Alt,\n TimeUS\nfrom GPS\nwhere Alt > 10; and more; text";
        assert_eq!(
            parse(text).unwrap(),
            Directive::Query {
                sql: "select Alt,\n TimeUS\nfrom GPS\nwhere Alt > 10;".into()
            }
        );
    }

    #[test]
    fn select_without_terminator_is_direct() {
        let text = "I would SELECT the altitude FROM the GPS table";
        assert_eq!(parse(text).unwrap(), Directive::Direct(text.into()));
    }

    #[test]
    fn plain_text_is_direct() {
        let text = "The maximum altitude was 120 m at 00:04:12.";
        assert_eq!(parse(text).unwrap(), Directive::Direct(text.into()));
    }

    #[test]
    fn error_messages_are_user_facing() {
        assert_eq!(
            DirectiveError::Analyse.to_string(),
            "Invalid 'analyse:' format. It should be 'analyse: [PROMPT] [DATA]'."
        );
    }
}
