//! JSON salvage from model output.
//!
//! Models are instructed to answer with bare JSON but routinely wrap it in
//! markdown fences or prose anyway. The extractor locates the JSON payload
//! before typed parsing; extraction and parsing are separate steps so the
//! error can say which of the two failed.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;

use crate::error::{AgentError, ParseErrorReason};

static FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(.*?)```").expect("fence grammar must compile")
});

/// Extracts the JSON payload from raw model output.
///
/// Fenced blocks are preferred; otherwise the widest `{...}` span is taken.
///
/// # Errors
///
/// Returns a [`AgentError::ParseError`] with
/// [`ParseErrorReason::MarkdownExtractionFailed`] when no candidate JSON can
/// be located, or [`ParseErrorReason::InvalidJson`] when the candidate does
/// not parse.
pub fn extract_json(raw: &str) -> Result<String, AgentError> {
    let candidate = FENCE_RE
        .captures(raw)
        .map(|caps| caps[1].trim().to_string())
        .or_else(|| brace_span(raw))
        .ok_or_else(|| AgentError::ParseError {
            message: format!("no JSON found in model output: {raw}"),
            reason: ParseErrorReason::MarkdownExtractionFailed,
        })?;

    serde_json::from_str::<serde_json::Value>(&candidate).map_err(|err| {
        AgentError::ParseError {
            message: format!("extracted text is not valid JSON: {err}"),
            reason: ParseErrorReason::InvalidJson,
        }
    })?;

    Ok(candidate)
}

/// Extracts and deserializes model output into the expected shape.
///
/// # Errors
///
/// Extraction failures are reported as above; a shape mismatch after
/// successful extraction maps to [`ParseErrorReason::SchemaMismatch`] (or
/// [`ParseErrorReason::UnexpectedEof`] for truncated output).
pub fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T, AgentError> {
    let json = extract_json(raw)?;

    serde_json::from_str(&json).map_err(|err| {
        let reason = if err.is_eof() {
            ParseErrorReason::UnexpectedEof
        } else if err.is_syntax() {
            ParseErrorReason::InvalidJson
        } else {
            ParseErrorReason::SchemaMismatch
        };

        AgentError::ParseError {
            message: format!("failed to parse JSON: {err}. Extracted JSON: {json}"),
            reason,
        }
    })
}

fn brace_span(raw: &str) -> Option<String> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(raw[start..=end].to_string())
}
