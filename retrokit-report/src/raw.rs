//! Raw candidate records as the oracle emits them.

use std::path::Path;

use retrokit_core::{Result, RetroError};
use serde::{Deserialize, Serialize};

use crate::disconnection::DisconnectionKind;

/// One (disconnection, reactions) assertion from the oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCandidate {
    /// Space-separated `ELEMENT:MAPID` tokens.
    pub atom_set: String,
    #[serde(default)]
    pub reaction_names: Vec<String>,
    #[serde(default)]
    pub rationale: String,
    /// Expected in 1..=4; checked during aggregation.
    pub importance: i64,
    /// The oracle's own membership claim. The registry decides.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_in_ontology: Option<bool>,
    #[serde(default)]
    pub reactant_sets: Vec<RawReactantSet>,
    /// Default validity for reactant sets that omit theirs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_valid: Option<bool>,
    /// Default reasoning for reactant sets that omit theirs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    pub discovery_order: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<DisconnectionKind>,
}

/// One proposed list of reactants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawReactantSet {
    pub reactants: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_valid: Option<bool>,
    #[serde(default)]
    pub is_template: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    /// Reaction name this set belongs to; all names of the record if unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reaction: Option<String>,
}

impl RawReactantSet {
    pub fn new(reactants: Vec<String>) -> Self {
        RawReactantSet {
            reactants,
            is_valid: None,
            is_template: false,
            reasoning: None,
            reaction: None,
        }
    }
}

/// Accepted top-level shapes of a candidate file.
#[derive(Deserialize)]
#[serde(untagged)]
enum CandidateFile {
    List(Vec<RawCandidate>),
    Wrapped { candidates: Vec<RawCandidate> },
}

/// Parse a JSON array of candidates, or `{"candidates": [...]}`.
pub fn parse_candidates(json: &str) -> Result<Vec<RawCandidate>> {
    let file: CandidateFile =
        serde_json::from_str(json).map_err(|e| RetroError::Parse(format!("raw candidates: {e}")))?;
    Ok(match file {
        CandidateFile::List(list) | CandidateFile::Wrapped { candidates: list } => list,
    })
}

/// Read a candidate file from disk.
pub fn read_candidates(path: impl AsRef<Path>) -> Result<Vec<RawCandidate>> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|e| {
        RetroError::Io(std::io::Error::new(e.kind(), format!("{}: {}", path.display(), e)))
    })?;
    parse_candidates(&json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_and_full_records() {
        let json = r#"[
            {"atomSet": "C:12 N:14", "reactionNames": ["Carboxylic acid to amide conversion"],
             "rationale": "amide", "importance": 4, "isInOntology": true, "discoveryOrder": 1,
             "reactantSets": [{"reactants": ["[CH3:12]C(=O)O", "[NH2:14]C"], "is_valid": true,
                               "is_template": false, "reasoning": "ok"}]},
            {"atomSet": "N:14", "importance": 1, "discoveryOrder": 3, "kind": "interconversion"}
        ]"#;
        let candidates = parse_candidates(json).unwrap();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].reactant_sets[0].is_valid, Some(true));
        assert_eq!(candidates[0].reactant_sets[0].reaction, None);
        assert!(candidates[1].reaction_names.is_empty());
        assert_eq!(candidates[1].kind, Some(DisconnectionKind::Interconversion));
    }

    #[test]
    fn wrapped_and_invalid() {
        let wrapped =
            r#"{"candidates": [{"atomSet": "C:1", "importance": 2, "discoveryOrder": 0}]}"#;
        assert_eq!(parse_candidates(wrapped).unwrap().len(), 1);
        assert!(matches!(parse_candidates("{\"x\": 1}"), Err(RetroError::Parse(_))));
        assert!(matches!(read_candidates("/nonexistent/raw.json"), Err(RetroError::Io(_))));
    }
}
