//! Report schemas, assembly and validation.
//!
//! Two report shapes exist:
//!
//! ```json
//! {"disconnections": [{"disconnection": "C:12 N:14", "reactions": [
//!     {"forwardReaction": "...", "isInOntology": true,
//!      "forwardReactionClass": "Acylation", "Retrosynthesis Importance": 4,
//!      "Priority": 1, "rationale": "..."}]}]}
//! ```
//!
//! ```json
//! {"reaction_analysis": [{"disconnection": "C:12 N:14", "forwardReaction": "...",
//!     "forwardReactionClass": "Acylation", "Priority": 1,
//!     "reactant_permutations": [{"reactants": ["..."], "is_valid": true,
//!                                "is_template": false, "reasoning": "..."}]}]}
//! ```
//!
//! [`validate`] is all-or-nothing: a report either passes every check or
//! is rejected with [`RetroError::Schema`].

use std::collections::BTreeSet;

use retrokit_chem::parse_template;
use retrokit_core::hash::sha256;
use retrokit_core::{ContentAddressable, Result, RetroError, Summarizable};
use serde::{Deserialize, Serialize};

use crate::atom_ref::parse_atom_refs;
use crate::ontology::ReactionClass;
use crate::product::MappedProduct;
use crate::rank::{regroup, RankedPair};

/// One reactant list proposed for a reaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactantPermutation {
    pub reactants: Vec<String>,
    pub is_valid: bool,
    pub is_template: bool,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionReaction {
    #[serde(rename = "forwardReaction")]
    pub forward_reaction: String,
    #[serde(rename = "isInOntology")]
    pub is_in_ontology: bool,
    #[serde(rename = "forwardReactionClass")]
    pub forward_reaction_class: ReactionClass,
    #[serde(rename = "Retrosynthesis Importance")]
    pub importance: u8,
    #[serde(rename = "Priority")]
    pub priority: u32,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionGroup {
    pub disconnection: String,
    pub reactions: Vec<PositionReaction>,
}

/// Position analysis: reactions grouped by disconnection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PositionReport {
    pub disconnections: Vec<PositionGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionEntry {
    pub disconnection: String,
    #[serde(rename = "forwardReaction")]
    pub forward_reaction: String,
    #[serde(rename = "forwardReactionClass")]
    pub forward_reaction_class: ReactionClass,
    #[serde(rename = "Priority")]
    pub priority: u32,
    pub reactant_permutations: Vec<ReactantPermutation>,
}

/// Transition analysis: one entry per reaction with its reactant sets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransitionReport {
    pub reaction_analysis: Vec<TransitionEntry>,
}

/// Which report an analysis produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    #[default]
    Position,
    Transition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Report {
    Position(PositionReport),
    Transition(TransitionReport),
}

impl Report {
    pub fn kind(&self) -> ReportKind {
        match self {
            Report::Position(_) => ReportKind::Position,
            Report::Transition(_) => ReportKind::Transition,
        }
    }

    pub fn as_position(&self) -> Option<&PositionReport> {
        match self {
            Report::Position(report) => Some(report),
            Report::Transition(_) => None,
        }
    }

    pub fn as_transition(&self) -> Option<&TransitionReport> {
        match self {
            Report::Transition(report) => Some(report),
            Report::Position(_) => None,
        }
    }

    /// Number of (disconnection, reaction) pairs.
    pub fn pair_count(&self) -> usize {
        match self {
            Report::Position(r) => r.disconnections.iter().map(|g| g.reactions.len()).sum(),
            Report::Transition(r) => r.reaction_analysis.len(),
        }
    }

    /// Compact UTF-8 JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| RetroError::Schema(format!("serialize report: {e}")))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| RetroError::Schema(format!("serialize report: {e}")))
    }

    pub fn from_json(json: &str) -> Result<Report> {
        serde_json::from_str(json).map_err(|e| RetroError::Parse(format!("report: {e}")))
    }
}

impl ContentAddressable for Report {
    fn content_hash(&self) -> String {
        sha256(&serde_json::to_vec(self).unwrap_or_default())
    }
}

impl Summarizable for Report {
    fn summary(&self) -> String {
        match self {
            Report::Position(r) => format!(
                "position report: {} disconnections, {} reactions",
                r.disconnections.len(),
                self.pair_count()
            ),
            Report::Transition(r) => format!(
                "transition report: {} reactions, {} templates",
                r.reaction_analysis.len(),
                r.reaction_analysis
                    .iter()
                    .filter(|e| e.reactant_permutations.first().is_some_and(|p| p.is_template))
                    .count()
            ),
        }
    }
}

/// Explicit error object emitted in place of an invalid report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

impl ErrorReport {
    pub fn to_json(&self) -> String {
        // Two string fields; serialization cannot fail
        serde_json::to_string(self).unwrap_or_else(|_| String::from(r#"{"error":{}}"#))
    }
}

impl From<&RetroError> for ErrorReport {
    fn from(error: &RetroError) -> Self {
        ErrorReport {
            error: ErrorBody {
                kind: error.kind().to_string(),
                message: error.to_string(),
            },
        }
    }
}

/// Build the position report from ranked pairs.
pub fn assemble_position(ranked: Vec<RankedPair>) -> PositionReport {
    let disconnections = regroup(ranked)
        .into_iter()
        .map(|group| PositionGroup {
            disconnection: group.disconnection.to_string(),
            reactions: group
                .reactions
                .into_iter()
                .map(|r| PositionReaction {
                    forward_reaction: r.pair.name,
                    is_in_ontology: r.pair.is_in_ontology,
                    forward_reaction_class: r.pair.class,
                    importance: r.pair.importance,
                    priority: r.priority,
                    rationale: r.pair.rationale,
                })
                .collect(),
        })
        .collect();
    PositionReport { disconnections }
}

/// Build the transition report from ranked pairs, in priority order.
pub fn assemble_transition(ranked: Vec<RankedPair>) -> TransitionReport {
    let reaction_analysis = ranked
        .into_iter()
        .map(|r| TransitionEntry {
            disconnection: r.pair.disconnection.to_string(),
            reactant_permutations: r.pair.reactant_permutations(),
            forward_reaction: r.pair.name,
            forward_reaction_class: r.pair.class,
            priority: r.priority,
        })
        .collect();
    TransitionReport { reaction_analysis }
}

/// Check every structural invariant of a report against its product.
pub fn validate(report: &Report, product: &MappedProduct) -> Result<()> {
    let mut priorities = Vec::new();
    match report {
        Report::Position(r) => {
            let mut seen = BTreeSet::new();
            for group in &r.disconnections {
                let key = check_disconnection(&group.disconnection, product)?;
                if !seen.insert(key) {
                    let name = &group.disconnection;
                    return Err(schema(format!("disconnection '{name}' appears twice")));
                }
                if group.reactions.is_empty() {
                    let name = &group.disconnection;
                    return Err(schema(format!("disconnection '{name}' has no reactions")));
                }
                for reaction in &group.reactions {
                    require_text("forwardReaction", &reaction.forward_reaction)?;
                    require_text("rationale", &reaction.rationale)?;
                    if !(1..=4).contains(&reaction.importance) {
                        return Err(schema(format!(
                            "importance {} of '{}' is outside 1..=4",
                            reaction.importance, reaction.forward_reaction
                        )));
                    }
                    priorities.push(reaction.priority);
                }
            }
        }
        Report::Transition(r) => {
            let mut seen = BTreeSet::new();
            for entry in &r.reaction_analysis {
                let key = check_disconnection(&entry.disconnection, product)?;
                require_text("forwardReaction", &entry.forward_reaction)?;
                if !seen.insert((key, entry.forward_reaction.clone())) {
                    return Err(schema(format!(
                        "'{}' appears twice for '{}'",
                        entry.forward_reaction, entry.disconnection
                    )));
                }
                check_permutations(entry, product)?;
                priorities.push(entry.priority);
            }
        }
    }

    priorities.sort_unstable();
    let expected = 1..=priorities.len() as u32;
    if !priorities.iter().copied().eq(expected) {
        return Err(schema(format!("priorities {priorities:?} are not a permutation of 1..=N")));
    }
    Ok(())
}

fn schema(message: String) -> RetroError {
    RetroError::Schema(message)
}

fn require_text(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(schema(format!("required field '{field}' is empty")));
    }
    Ok(())
}

/// Well-formed tokens, all known to the product. Returns the map ids in
/// written order.
fn check_disconnection(text: &str, product: &MappedProduct) -> Result<Vec<u32>> {
    let atoms = parse_atom_refs(text).map_err(|e| schema(format!("disconnection '{text}': {e}")))?;
    atoms
        .iter()
        .map(|atom| {
            product
                .resolve(atom)
                .map(|a| a.map_id)
                .map_err(|e| schema(format!("disconnection '{text}': {e}")))
        })
        .collect()
}

fn check_permutations(entry: &TransitionEntry, product: &MappedProduct) -> Result<()> {
    for (i, permutation) in entry.reactant_permutations.iter().enumerate() {
        if permutation.is_template && i > 0 {
            return Err(schema(format!(
                "template for '{}' is at position {i}, not first",
                entry.forward_reaction
            )));
        }
        if permutation.is_template && !permutation.is_valid {
            let name = &entry.forward_reaction;
            return Err(schema(format!("template for '{name}' is not marked valid")));
        }
        if permutation.reactants.is_empty() {
            return Err(schema(format!("empty reactant list for '{}'", entry.forward_reaction)));
        }
        if permutation.reasoning.trim().is_empty() {
            let name = &entry.forward_reaction;
            return Err(schema(format!("reactant set {i} of '{name}' has no reasoning")));
        }
        for smiles in &permutation.reactants {
            let mol = parse_template(smiles)
                .map_err(|e| schema(format!("reactant '{smiles}': {e}")))?;
            if let Some(unknown) = mol.map_ids().into_iter().find(|id| !product.contains(*id)) {
                return Err(schema(format!(
                    "reactant '{smiles}' uses atom-map id {unknown} absent from the product"
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rank::rank;
    use crate::rank::tests::pair;

    const PRODUCT: &str =
        "[CH3:10][C:12](=[O:13])[NH:14][c:18]1[cH:19][cH:20][cH:21][cH:22][cH:23]1";

    fn product() -> MappedProduct {
        MappedProduct::from_smiles(PRODUCT).unwrap()
    }

    fn ranked() -> Vec<RankedPair> {
        let mut pairs = vec![
            pair("C:12 N:14", "Carboxylic acid to amide conversion", true, 4, 1),
            pair("N:14", "Boc amine deprotection", true, 1, 3),
            pair("C:12 N:14", "Amide Schotten-Baumann", true, 3, 2),
        ];
        for (i, p) in pairs.iter_mut().enumerate() {
            p.sequence = i;
        }
        rank(pairs)
    }

    #[test]
    fn empty_position_report_keeps_key() {
        let report = Report::Position(assemble_position(Vec::new()));
        assert_eq!(report.to_json().unwrap(), r#"{"disconnections":[]}"#);
        assert!(validate(&report, &product()).is_ok());
        let back = Report::from_json(r#"{"disconnections":[]}"#).unwrap();
        assert_eq!(back.kind(), ReportKind::Position);
    }

    #[test]
    fn position_report_field_names() {
        let report = Report::Position(assemble_position(ranked()));
        validate(&report, &product()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        let first = &value["disconnections"][0];
        assert_eq!(first["disconnection"], "C:12 N:14");
        assert_eq!(first["reactions"].as_array().unwrap().len(), 2);
        let reaction = &first["reactions"][0];
        assert_eq!(reaction["forwardReaction"], "Carboxylic acid to amide conversion");
        assert_eq!(reaction["isInOntology"], true);
        assert_eq!(reaction["Retrosynthesis Importance"], 4);
        assert_eq!(reaction["Priority"], 1);
        assert_eq!(reaction["forwardReactionClass"], "Miscellaneous");
        assert_eq!(report.pair_count(), 3);
    }

    #[test]
    fn transition_report_round_trips_shape() {
        let mut items = ranked();
        items[0].pair.permutations.push(ReactantPermutation {
            reactants: vec![
                "[CH3:10][C:12](=[O:13])O".into(),
                "[NH2:14][c:18]1[cH:19][cH:20][cH:21][cH:22][cH:23]1".into(),
            ],
            is_valid: true,
            is_template: false,
            reasoning: "acid and aniline".into(),
        });
        let report = Report::Transition(assemble_transition(items));
        validate(&report, &product()).unwrap();
        let json = report.to_json().unwrap();
        assert!(json.starts_with(r#"{"reaction_analysis":[{"disconnection":"C:12 N:14""#));
        assert_eq!(Report::from_json(&json).unwrap(), report);
        assert!(report.summary().starts_with("transition report: 3 reactions"));
    }

    #[test]
    fn unknown_map_id_is_a_schema_error() {
        let mut report = assemble_position(ranked());
        report.disconnections[0].disconnection = "C:12 N:99".into();
        let err = validate(&Report::Position(report), &product()).unwrap_err();
        assert!(matches!(err, RetroError::Schema(_)));
    }

    #[test]
    fn malformed_and_duplicate_disconnections() {
        let mut report = assemble_position(ranked());
        report.disconnections[1].disconnection = "N14".into();
        assert!(validate(&Report::Position(report.clone()), &product()).is_err());

        report.disconnections[1].disconnection = "C:12 N:14".into();
        assert!(validate(&Report::Position(report), &product()).is_err());
    }

    #[test]
    fn priority_gaps_and_bad_fields() {
        let mut report = assemble_position(ranked());
        report.disconnections[0].reactions[0].priority = 7;
        assert!(validate(&Report::Position(report), &product()).is_err());

        let mut report = assemble_position(ranked());
        report.disconnections[0].reactions[0].rationale = " ".into();
        assert!(validate(&Report::Position(report), &product()).is_err());

        let mut report = assemble_position(ranked());
        report.disconnections[0].reactions[0].importance = 5;
        assert!(validate(&Report::Position(report), &product()).is_err());
    }

    #[test]
    fn template_must_come_first() {
        let mut report = assemble_transition(ranked());
        let plain = ReactantPermutation {
            reactants: vec!["[CH3:10][C:12](=[O:13])Cl".into()],
            is_valid: true,
            is_template: false,
            reasoning: "acyl chloride".into(),
        };
        let template = ReactantPermutation {
            reactants: vec!["[CH3:10][C:12](=[O:13])[Cl,Br]".into()],
            is_template: true,
            ..plain.clone()
        };
        report.reaction_analysis[0].reactant_permutations = vec![template.clone(), plain.clone()];
        assert!(validate(&Report::Transition(report.clone()), &product()).is_ok());

        report.reaction_analysis[0].reactant_permutations = vec![plain.clone(), template];
        assert!(validate(&Report::Transition(report.clone()), &product()).is_err());

        let unexplained = ReactantPermutation { reasoning: " ".into(), ..plain };
        report.reaction_analysis[0].reactant_permutations = vec![unexplained];
        assert!(validate(&Report::Transition(report), &product()).is_err());
    }

    #[test]
    fn error_report_shape() {
        let err = RetroError::Schema("priorities broken".into());
        let json = ErrorReport::from(&err).to_json();
        assert_eq!(
            json,
            r#"{"error":{"kind":"schema","message":"schema error: priorities broken"}}"#
        );
    }

    #[test]
    fn content_hash_is_stable() {
        let a = Report::Position(assemble_position(ranked()));
        let b = Report::Position(assemble_position(ranked()));
        assert_eq!(a.content_hash(), b.content_hash());
        assert_eq!(a.content_hash().len(), 64);
    }
}
