//! JSON parsing utilities for the Saavn API client.

use anyhow::Result;
use serde::Deserialize;
use serde::de::DeserializeOwned;

/// Attempt to parse JSON and, on failure, include a contextual snippet of the
/// line where the error occurred along with the serde path and type mismatch.
pub fn parse_json_with_context<T: DeserializeOwned>(body: &str) -> Result<T> {
    let jd = &mut serde_json::Deserializer::from_str(body);
    match serde_path_to_error::deserialize(jd) {
        Ok(value) => Ok(value),
        Err(err) => {
            let inner_err = err.inner();
            let (line, column) = (inner_err.line(), inner_err.column());
            let path = err.path().to_string();

            let msg = inner_err.to_string();
            let loc = format!(" at line {line} column {column}");
            let msg_without_loc = msg.strip_suffix(&loc).unwrap_or(&msg).to_string();

            let type_info = parse_type_mismatch(&msg_without_loc);
            let snippet = build_error_snippet(body, line, column, 20);

            let mut final_err = String::new();
            if !path.is_empty() && path != "." {
                final_err.push_str(&format!("at path '{}': ", path));
            }
            final_err.push_str(&format!(
                "{} (line {} col {})\n{}",
                type_info, line, column, snippet
            ));

            Err(anyhow::anyhow!(final_err))
        }
    }
}

/// Only the envelope markers; everything else is ignored.
#[derive(Deserialize)]
struct EnvelopeMarkers {
    success: Option<bool>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Wrapped<T> {
    data: Option<T>,
}

/// Unwrap a Saavn response body into its payload.
///
/// The API answers either `{"success": true, "data": ...}` or the bare payload.
/// `{"success": false}` and `{"success": true, "data": null}` resolve to `Ok(None)`.
pub fn parse_envelope<T: DeserializeOwned>(body: &str) -> Result<Option<T>> {
    let markers: EnvelopeMarkers = match serde_json::from_str(body) {
        Ok(markers) => markers,
        // Not an object (e.g. a bare array): let the typed parse report it
        Err(_) => return parse_json_with_context::<T>(body).map(Some),
    };

    match markers.success {
        Some(false) => {
            tracing::debug!(
                message = markers.message.as_deref().unwrap_or(""),
                "Saavn reported an unsuccessful lookup"
            );
            Ok(None)
        }
        Some(true) => Ok(parse_json_with_context::<Wrapped<T>>(body)?.data),
        None => parse_json_with_context::<T>(body).map(Some),
    }
}

/// Extract type mismatch information from a serde error message.
///
/// Parses error messages like "invalid type: null, expected a string" to extract
/// the expected and actual types for clearer error reporting.
fn parse_type_mismatch(error_msg: &str) -> String {
    if let Some(invalid_start) = error_msg.find("invalid type: ") {
        let after_prefix = &error_msg[invalid_start + "invalid type: ".len()..];

        if let Some(comma_pos) = after_prefix.find(", expected ") {
            let actual_type = &after_prefix[..comma_pos];
            let expected_part = &after_prefix[comma_pos + ", expected ".len()..];

            let expected_type = expected_part
                .split(" at line ")
                .next()
                .unwrap_or(expected_part)
                .trim();

            return format!("expected {}, got {}", expected_type, actual_type);
        }
    }

    if error_msg.starts_with("expected ")
        && let Some(expected_part) = error_msg.split(" at line ").next()
    {
        return expected_part.to_string();
    }

    error_msg.to_string()
}

fn build_error_snippet(body: &str, line: usize, column: usize, context_len: usize) -> String {
    let target_line = body.lines().nth(line.saturating_sub(1)).unwrap_or("");
    if target_line.is_empty() {
        return "(empty line)".to_string();
    }

    // column is 1-based, convert to 0-based for slicing
    let error_idx = column.saturating_sub(1).min(target_line.len());

    let half_len = context_len / 2;
    let mut start = error_idx.saturating_sub(half_len);
    let mut end = (error_idx + half_len).min(target_line.len());
    // Upstream text is full of non-ASCII titles; never slice through a char
    while !target_line.is_char_boundary(start) {
        start -= 1;
    }
    while !target_line.is_char_boundary(end) {
        end += 1;
    }

    let slice = &target_line[start..end];
    let indicator_pos = error_idx - start;

    let indicator = " ".repeat(indicator_pos) + "^";

    format!("...{slice}...\n   {indicator}")
}
