//! Fixed prompt text.
//!
//! The directive markers in `SYSTEM_INSTRUCTIONS` must stay in sync with
//! `directive::QUERY_MARKER` and `directive::ANALYSE_MARKER`.

/// System turn prepended to every context.
pub const SYSTEM_INSTRUCTIONS: &str = "\
You are a flight engineer assistant capable of interacting with a SQLite database \
containing flight data about a single flight. \
Very important: if you need to query the database, you MUST respond with \
'query database: [SQL_QUERY]' or 'analyse: [PROMPT] [DATA_TO_ANALYZE]'. \
Never query every row of a table. \
Assume the user does not know the table names, column names or data types; \
use PRAGMA table_info to find them out before guessing. \
You either generate a SQL query, request analysis, or ask clarifying questions and \
respond to the user. Never combine these in one response. \
Break complex questions down into steps and validate each step with the user \
before proceeding. \
If the query is ambiguous or fails, ask clarifying questions before generating the \
SQL query. \
When referring to table or column names in SQL queries, use double quotes (\") or \
no quotes at all. Never use backticks (`).";

/// Domain heuristics injected into every analysis recursion.
pub const ANALYST_HINTS: &str = "
use timestamps to cite any events or data points.
General Flight Data Interpretation
* Determine flight duration from first arming to final disarming.
* Identify maximum and minimum values for altitude, temperature, voltage, and current.
* Track flight phases: takeoff, climb, cruise, descent, landing.
* Extract and summarize flight mode changes and the duration spent in each mode.
* Interpret GPS quality using HDOP, VDOP, and satellite count metrics.
* Use timestamps to correlate telemetry events and sequence of actions.

Anomaly Detection Heuristics
* Flag rapid changes in altitude (e.g., >10 meters per second).
* Identify GPS anomalies: loss of fix, large position jumps, high HDOP/VDOP.
* Detect RC signal loss: long gaps in RCIN data or failsafe mode triggers.
* Highlight battery issues: sudden voltage drops >1V within a few seconds, high battery temperature (>60°C), large current spikes.
* Monitor inconsistent motor behavior: high current draw with low throttle, RPM mismatch if available.
* Detect mode instability: frequent or unexpected mode changes, especially to failsafe or RTL.
* Identify log error messages such as GPS glitch, EKF variance, or barometer inconsistency.
* Mark times when telemetry data appears to be missing, frozen, or invalid.

Investigative Behavior Guidelines
* When asked vague questions like \"Are there any issues?\", provide a structured summary of potential anomalies and affected subsystems.
* When asked follow-up questions, use prior conversation context (e.g., user previously focused on GPS or battery).
* Ask clarifying questions if the user's query is ambiguous or could relate to multiple subsystems.
* Prioritize issues that would affect flight safety, such as power failures, GPS loss, or signal loss.
* Support reasoning with relevant timestamps, value trends, and subsystem names.
* Avoid binary judgments unless clearly supported by the data; instead, describe patterns or suggest likely causes.
";

pub const RETRY_NOTE: &str =
    "The LLM API response was missing expected content. Retrying the request.";

pub const EMPTY_RESULT_QUESTION: &str = "The query returned no results. Can you confirm the \
structure of the table or provide additional details about the data you are looking for?";

pub const EMPTY_RESULT_PROMPT: &str =
    "The query returned no results. Re-evaluate the query or try a different approach.";

/// Clarifying question returned when a statement fails.
pub fn execution_error_question(error: &str) -> String {
    format!(
        "Can you clarify the structure of the table or provide additional details about \
         the columns? The error was: {error}"
    )
}

pub fn results_turn(rendered: &str) -> String {
    format!("Database results: {rendered}")
}

pub fn analyze_results_prompt(rendered: &str) -> String {
    format!(
        "Analyze these database results and provide an answer to the user's original \
         question: {rendered}"
    )
}

/// Input for an analysis recursion.
pub fn analyst_prompt(instruction: &str, data: &str) -> String {
    format!("hints:{ANALYST_HINTS}.\n {instruction}\nData:\n{data}")
}

pub fn analyst_response_turn(reply: &str) -> String {
    format!("Flight analyst response: {reply}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::{ANALYSE_MARKER, QUERY_MARKER};

    #[test]
    fn system_instructions_name_both_markers() {
        assert!(SYSTEM_INSTRUCTIONS.contains(QUERY_MARKER));
        assert!(SYSTEM_INSTRUCTIONS.contains(ANALYSE_MARKER));
        assert!(SYSTEM_INSTRUCTIONS.contains("PRAGMA table_info"));
    }

    #[test]
    fn analyst_prompt_layout() {
        let prompt = analyst_prompt("trend", "12,14,9,21");
        assert!(prompt.starts_with("hints:"));
        assert!(prompt.contains(">10 meters per second"));
        assert!(prompt.ends_with(" trend\nData:\n12,14,9,21"));
    }
}
