//! Validation of provider output.
//!
//! Providers are asked for a bare JSON object but are not trusted to deliver
//! one. Anything that does not match the schema is an error; fields are never
//! defaulted into a fabricated success.

use serde::Deserialize;
use vs_types::{Analysis, ExtractedFields, Verification};

use crate::error::OracleError;

#[derive(Deserialize)]
struct RawAnalysis {
    title: String,
    description: String,
    score: f64,
    #[serde(alias = "body")]
    content: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVerification {
    is_valid: bool,
    #[serde(flatten)]
    extracted: ExtractedFields,
}

/// Strip a surrounding Markdown code fence (```json ... ```), if any.
fn strip_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening line.
    match body.find('\n') {
        Some(newline) => body[newline + 1..].trim(),
        None => body.trim(),
    }
}

/// Parse and validate an analyzer response.
///
/// Requires `title`, `description`, a numeric `score` and a `content` (or
/// `body`) string. The score is rounded and clamped into `[0, 100]`.
pub fn parse_analysis(text: &str) -> Result<Analysis, OracleError> {
    let json = strip_fence(text);
    if json.is_empty() {
        return Err(OracleError::EmptyResponse);
    }
    let raw: RawAnalysis =
        serde_json::from_str(json).map_err(|e| OracleError::Schema(e.to_string()))?;
    if !raw.score.is_finite() {
        return Err(OracleError::Schema(format!("score is not finite: {}", raw.score)));
    }
    Ok(Analysis::new(raw.title, raw.description, raw.score, raw.content))
}

/// Parse and validate an identity verifier response.
///
/// Requires a boolean `isValid`; extracted fields are optional.
pub fn parse_verification(text: &str) -> Result<Verification, OracleError> {
    let json = strip_fence(text);
    if json.is_empty() {
        return Err(OracleError::EmptyResponse);
    }
    let raw: RawVerification =
        serde_json::from_str(json).map_err(|e| OracleError::Schema(e.to_string()))?;
    Ok(Verification {
        is_valid: raw.is_valid,
        extracted: raw.extracted,
    })
}
