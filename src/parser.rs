//! Structured output parsing shared by all providers.
//!
//! Chat providers are instructed to reply with a JSON object carrying
//! `classification`, `confidence` and `explanation`; local model providers
//! synthesize the same shape. The parser does not know which backend
//! produced the text.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ClassifierError, Result};

/// Validated record extracted from a provider's raw response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedResponse {
    pub classification: String,
    pub confidence: f32,
    pub explanation: String,
    #[serde(default)]
    pub category_group_id: Option<i64>,
    #[serde(default)]
    pub category_group_name: Option<String>,
}

/// Formatting instructions appended to chat provider system prompts
pub fn format_instructions() -> &'static str {
    r#"Respond with a JSON object containing exactly these fields:
{
    "classification": string, the chosen category name,
    "confidence": float, a confidence score between 0 and 1,
    "explanation": string, a brief explanation of the classification
}
Do not include any text outside the JSON object."#
}

/// Parse a provider's raw text into a validated response record.
///
/// Tolerates markdown code fences and prose around the JSON object, since
/// chat models do not always follow the format instructions to the letter.
pub fn parse(raw: &str) -> Result<ParsedResponse> {
    let json_text = extract_json(raw).ok_or_else(|| {
        ClassifierError::ParseError(format!(
            "No JSON object found in provider response: {}",
            truncate(raw, 200)
        ))
    })?;

    let value: Value = serde_json::from_str(json_text).map_err(|e| {
        ClassifierError::ParseError(format!("Invalid JSON in provider response: {}", e))
    })?;

    let obj = value.as_object().ok_or_else(|| {
        ClassifierError::ParseError("Provider response is not a JSON object".to_string())
    })?;

    let classification = obj
        .get("classification")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ClassifierError::ParseError("Missing 'classification' field".to_string())
        })?
        .to_string();

    let confidence = coerce_confidence(obj.get("confidence"))?;

    let explanation = obj
        .get("explanation")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let category_group_id = obj.get("category_group_id").and_then(Value::as_i64);
    let category_group_name = obj
        .get("category_group_name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok(ParsedResponse {
        classification,
        confidence,
        explanation,
        category_group_id,
        category_group_name,
    })
}

/// Synthesize a response in the shared schema, used by local model
/// providers so downstream parsing is provider-agnostic.
pub fn synthesize(classification: &str, confidence: f32, explanation: &str) -> String {
    serde_json::json!({
        "classification": classification,
        "confidence": confidence,
        "explanation": explanation,
        "category_group_id": null,
        "category_group_name": "",
    })
    .to_string()
}

/// Confidence may arrive as a JSON number or as a quoted string
fn coerce_confidence(value: Option<&Value>) -> Result<f32> {
    let value =
        value.ok_or_else(|| ClassifierError::ParseError("Missing 'confidence' field".to_string()))?;

    let confidence = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| {
        ClassifierError::ParseError(format!("'confidence' is not a number: {}", value))
    })?;

    if !(0.0..=1.0).contains(&confidence) {
        return Err(ClassifierError::ParseError(format!(
            "'confidence' must be between 0 and 1, got {}",
            confidence
        )));
    }

    Ok(confidence as f32)
}

/// Locate the JSON object within the raw response, stripping code fences
fn extract_json(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();

    // Strip ```json ... ``` fences if present
    let inner = if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        rest.rsplit_once("```").map(|(body, _)| body).unwrap_or(rest)
    } else {
        trimmed
    };

    let start = inner.find('{')?;
    let end = inner.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&inner[start..=end])
}

fn truncate(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}
