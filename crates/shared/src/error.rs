//! Decoding of error bodies returned by the analysis service.

use serde_json::Value;

/// Picks the user-facing message out of a non-success response body.
///
/// A `detail` member wins; string details are used verbatim and any other
/// non-null detail is rendered as JSON. Without a detail the whole body is
/// rendered as JSON.
pub fn error_message_from_body(body: &Value) -> String {
    match body.get("detail") {
        Some(Value::String(detail)) if !detail.is_empty() => detail.clone(),
        Some(detail) if !detail.is_null() && !is_blank_string(detail) => detail.to_string(),
        _ => body.to_string(),
    }
}

/// Fallback message when a non-success body could not be decoded at all.
pub fn status_only_message(status: u16) -> String {
    format!("request failed with status {status}")
}

fn is_blank_string(value: &Value) -> bool {
    matches!(value, Value::String(s) if s.is_empty())
}

#[cfg(test)]
#[path = "tests/error_tests.rs"]
mod tests;
