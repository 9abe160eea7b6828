//! Extraction of the JSON payload from raw oracle responses.
//!
//! A response may open with a reasoning trace closed by `</think>` and may
//! wrap its JSON in a fenced block tagged `json`. The last such block wins.

use retrokit_core::{Result, RetroError};
use serde_json::Value;

use crate::raw::{parse_candidates, RawCandidate};
use crate::schema::Report;

const THINK_END: &str = "</think>";
const THINK_START: &str = "<think>";
const FENCE_JSON: &str = "```json";
const FENCE: &str = "```";

/// What the extracted JSON looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// Object with a `disconnections` key.
    Position,
    /// Object with a `reaction_analysis` key.
    Transition,
    /// Array of raw candidate records, or `{"candidates": [...]}`.
    Candidates,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedResponse {
    pub reasoning: Option<String>,
    pub value: Value,
    pub shape: ResponseShape,
}

impl ExtractedResponse {
    /// The payload as a finished report.
    pub fn report(&self) -> Result<Report> {
        match self.shape {
            ResponseShape::Candidates => {
                Err(RetroError::Parse("response holds raw candidates, not a report".into()))
            }
            _ => serde_json::from_value(self.value.clone())
                .map_err(|e| RetroError::Parse(format!("response report: {e}"))),
        }
    }

    /// The payload as raw candidate records.
    pub fn candidates(&self) -> Result<Vec<RawCandidate>> {
        match self.shape {
            ResponseShape::Candidates => parse_candidates(&self.value.to_string()),
            _ => Err(RetroError::Parse("response holds a report, not raw candidates".into())),
        }
    }
}

/// Split off the reasoning trace, locate the JSON and classify it.
pub fn extract(content: &str) -> Result<ExtractedResponse> {
    let (reasoning, answer) = match content.split_once(THINK_END) {
        Some((before, after)) => {
            let trace = before.trim();
            let trace = trace.strip_prefix(THINK_START).unwrap_or(trace).trim();
            (Some(trace.to_string()), after)
        }
        None => (None, content),
    };

    let payload = fenced_json(answer).unwrap_or(answer).trim();
    if payload.is_empty() {
        return Err(RetroError::Parse("response contains no JSON".into()));
    }
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| RetroError::Parse(format!("response JSON: {e}")))?;

    let shape = match &value {
        Value::Object(map) if map.contains_key("disconnections") => ResponseShape::Position,
        Value::Object(map) if map.contains_key("reaction_analysis") => ResponseShape::Transition,
        Value::Object(map) if map.contains_key("candidates") => ResponseShape::Candidates,
        Value::Array(_) => ResponseShape::Candidates,
        _ => {
            return Err(RetroError::Parse(
                "response JSON has neither 'disconnections' nor 'reaction_analysis'".into(),
            ))
        }
    };

    Ok(ExtractedResponse { reasoning, value, shape })
}

/// Body of the last ```` ```json ```` block, if any.
fn fenced_json(text: &str) -> Option<&str> {
    let start = text.rfind(FENCE_JSON)? + FENCE_JSON.len();
    let rest = &text[start..];
    let end = rest.find(FENCE).unwrap_or(rest.len());
    Some(&rest[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasoning_and_last_fence() {
        let content = "<think>C:12 looks like an amide.</think>\n\
                       Draft:\n```json\n{\"disconnections\": [1]}\n```\n\
                       Final:\n```json\n{\"disconnections\": []}\n```\n";
        let extracted = extract(content).unwrap();
        assert_eq!(extracted.reasoning.as_deref(), Some("C:12 looks like an amide."));
        assert_eq!(extracted.shape, ResponseShape::Position);
        assert_eq!(extracted.value["disconnections"].as_array().unwrap().len(), 0);
        assert!(extracted.report().unwrap().as_position().is_some());
    }

    #[test]
    fn bare_json_and_transition_shape() {
        let extracted = extract(r#"  {"reaction_analysis": []} "#).unwrap();
        assert_eq!(extracted.reasoning, None);
        assert_eq!(extracted.shape, ResponseShape::Transition);
        assert!(extracted.candidates().is_err());
    }

    #[test]
    fn candidate_arrays() {
        let content =
            "```json\n[{\"atomSet\": \"N:14\", \"importance\": 1, \"discoveryOrder\": 3}]\n```";
        let extracted = extract(content).unwrap();
        assert_eq!(extracted.shape, ResponseShape::Candidates);
        assert_eq!(extracted.candidates().unwrap()[0].atom_set, "N:14");
        assert!(extracted.report().is_err());
    }

    #[test]
    fn failures_are_parse_errors() {
        assert!(matches!(extract("no json here"), Err(RetroError::Parse(_))));
        assert!(matches!(extract("</think>"), Err(RetroError::Parse(_))));
        assert!(matches!(extract(r#"{"answer": 42}"#), Err(RetroError::Parse(_))));
        // Unterminated fence still parses to the end
        let extracted = extract("```json\n{\"disconnections\": []}").unwrap();
        assert_eq!(extracted.shape, ResponseShape::Position);
    }
}
