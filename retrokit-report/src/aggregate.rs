//! Disconnection aggregation.
//!
//! Raw oracle records are checked against the product and grouped by
//! canonical disconnection key. A record that fails validation is dropped
//! on its own; every other record keeps flowing.

use std::collections::{BTreeMap, BTreeSet};

use retrokit_chem::{canonical_smiles, parse_smiles, parse_template, Molecule};
use retrokit_core::{Result, RetroError};
use tracing::debug;

use crate::diagnostics::{Diagnostics, Stage};
use crate::disconnection::{Disconnection, DisconnectionKind};
use crate::ontology::Ontology;
use crate::product::MappedProduct;
use crate::raw::{RawCandidate, RawReactantSet};

/// Rationale used when the oracle gave none.
pub const MISSING_RATIONALE: &str = "No rationale provided";

/// One reaction name asserted for a disconnection.
#[derive(Debug, Clone, PartialEq)]
pub struct ReactionMention {
    pub name: String,
    pub importance: u8,
    pub rationale: String,
    pub discovery_order: u32,
    /// Index of the raw record this mention came from.
    pub input_position: usize,
    pub claimed_in_ontology: Option<bool>,
}

/// A reactant set that passed structural checks.
#[derive(Debug, Clone, PartialEq)]
pub struct ReactantOption {
    pub reactants: Vec<String>,
    pub is_valid: bool,
    pub is_template: bool,
    pub reasoning: Option<String>,
    /// Reaction name this set is routed to; `None` routes to all.
    pub reaction: Option<String>,
    /// Order-independent canonical text, used for deduplication.
    pub canonical: String,
}

/// All records that share one canonical disconnection key.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedDisconnection {
    pub disconnection: Disconnection,
    /// Earliest discovery order among merged records.
    pub discovery_order: u32,
    /// Index of the first raw record of this group.
    pub input_position: usize,
    pub reactions: Vec<ReactionMention>,
    pub reactant_sets: Vec<ReactantOption>,
}

impl AggregatedDisconnection {
    /// Ordered union by name. A repeated name keeps the earliest-discovered
    /// mention, input position breaking ties.
    fn merge_mentions(&mut self, mentions: Vec<ReactionMention>) {
        for mention in mentions {
            match self.reactions.iter_mut().find(|m| m.name == mention.name) {
                Some(existing) => {
                    let earlier = (mention.discovery_order, mention.input_position)
                        < (existing.discovery_order, existing.input_position);
                    if earlier {
                        *existing = mention;
                    }
                }
                None => self.reactions.push(mention),
            }
        }
    }

    fn merge_reactant_sets(&mut self, options: Vec<ReactantOption>) {
        for option in options {
            let duplicate = self
                .reactant_sets
                .iter()
                .any(|o| o.canonical == option.canonical && o.reaction == option.reaction);
            if !duplicate {
                self.reactant_sets.push(option);
            }
        }
    }
}

/// Validate and group raw candidates.
///
/// Output groups are ordered by earliest discovery order, then by the
/// position of their first record.
pub fn aggregate(
    product: &MappedProduct,
    ontology: &Ontology,
    raw: &[RawCandidate],
) -> (Vec<AggregatedDisconnection>, Diagnostics) {
    let mut diagnostics = Diagnostics::new();
    let mut groups: Vec<AggregatedDisconnection> = Vec::new();
    let mut by_key: BTreeMap<Vec<u32>, usize> = BTreeMap::new();

    debug!(records = raw.len(), "aggregating raw candidates");

    for (position, record) in raw.iter().enumerate() {
        let disconnection = match resolve_disconnection(product, ontology, record) {
            Ok(d) => d,
            Err(e) => {
                let order = Some(record.discovery_order);
                diagnostics.record(Stage::Aggregate, order, &record.atom_set, &e);
                continue;
            }
        };
        let mentions = match mentions_of(record, position) {
            Ok(m) => m,
            Err(e) => {
                let order = Some(record.discovery_order);
                diagnostics.record(Stage::Aggregate, order, &record.atom_set, &e);
                continue;
            }
        };

        let mut options = Vec::with_capacity(record.reactant_sets.len());
        for set in &record.reactant_sets {
            match reactant_option(product, record, set) {
                Ok(option) => options.push(option),
                Err(e) => diagnostics.record(
                    Stage::Aggregate,
                    Some(record.discovery_order),
                    set.reactants.join("."),
                    &e,
                ),
            }
        }

        match by_key.get(&disconnection.key()) {
            Some(&idx) => {
                let group = &mut groups[idx];
                group.discovery_order = group.discovery_order.min(record.discovery_order);
                group.merge_mentions(mentions);
                group.merge_reactant_sets(options);
            }
            None => {
                by_key.insert(disconnection.key(), groups.len());
                let mut group = AggregatedDisconnection {
                    disconnection,
                    discovery_order: record.discovery_order,
                    input_position: position,
                    reactions: Vec::new(),
                    reactant_sets: Vec::new(),
                };
                group.merge_mentions(mentions);
                group.merge_reactant_sets(options);
                groups.push(group);
            }
        }
    }

    groups.sort_by_key(|g| (g.discovery_order, g.input_position));
    debug!(groups = groups.len(), dropped = diagnostics.len(), "aggregation done");
    (groups, diagnostics)
}

fn resolve_disconnection(
    product: &MappedProduct,
    ontology: &Ontology,
    record: &RawCandidate,
) -> Result<Disconnection> {
    let kind = record.kind.unwrap_or_else(|| {
        if record.reaction_names.iter().any(|n| ontology.is_ring_forming(n)) {
            DisconnectionKind::RingForming
        } else {
            DisconnectionKind::Cleavage
        }
    });
    let parsed = Disconnection::parse(&record.atom_set, kind)?;
    let resolved = parsed
        .atoms()
        .iter()
        .map(|atom| product.resolve(atom))
        .collect::<Result<Vec<_>>>()?;
    Disconnection::new(resolved, kind)
}

fn mentions_of(record: &RawCandidate, position: usize) -> Result<Vec<ReactionMention>> {
    let importance = u8::try_from(record.importance)
        .ok()
        .filter(|i| (1..=4).contains(i))
        .ok_or_else(|| {
            RetroError::Validation(format!("importance {} is outside 1..=4", record.importance))
        })?;
    if record.reaction_names.is_empty() {
        return Err(RetroError::Validation("record names no reactions".into()));
    }
    let rationale = match record.rationale.trim() {
        "" => MISSING_RATIONALE.to_string(),
        text => text.to_string(),
    };
    let mut seen = BTreeSet::new();
    Ok(record
        .reaction_names
        .iter()
        .map(|n| n.trim().to_string())
        .filter(|n| seen.insert(n.clone()))
        .map(|name| ReactionMention {
            name,
            importance,
            rationale: rationale.clone(),
            discovery_order: record.discovery_order,
            input_position: position,
            claimed_in_ontology: record.is_in_ontology,
        })
        .collect())
}

fn reactant_option(
    product: &MappedProduct,
    record: &RawCandidate,
    set: &RawReactantSet,
) -> Result<ReactantOption> {
    if set.reactants.is_empty() {
        return Err(RetroError::Validation("reactant set is empty".into()));
    }
    let mut canonical = Vec::with_capacity(set.reactants.len());
    let mut seen_maps = BTreeSet::new();
    for smiles in &set.reactants {
        let mol = parse_reactant(smiles, set.is_template)?;
        for map_id in mol.atoms.iter().filter_map(|a| a.map_id) {
            if !product.contains(map_id) {
                return Err(RetroError::Validation(format!(
                    "reactant '{smiles}' carries atom-map id {map_id} absent from the product"
                )));
            }
            if !seen_maps.insert(map_id) {
                return Err(RetroError::Validation(format!(
                    "atom-map id {map_id} appears twice in one reactant set"
                )));
            }
        }
        canonical.push(canonical_smiles(&mol));
    }
    canonical.sort();

    Ok(ReactantOption {
        reactants: set.reactants.iter().map(|s| s.trim().to_string()).collect(),
        is_valid: set.is_valid.or(record.is_valid).unwrap_or(false),
        is_template: set.is_template,
        reasoning: non_blank(&set.reasoning).or_else(|| non_blank(&record.reasoning)),
        reaction: set.reaction.as_ref().map(|r| r.trim().to_string()),
        canonical: canonical.join("."),
    })
}

fn non_blank(text: &Option<String>) -> Option<String> {
    text.as_deref().map(str::trim).filter(|t| !t.is_empty()).map(str::to_string)
}

fn parse_reactant(smiles: &str, is_template: bool) -> Result<Molecule> {
    let parsed = if is_template { parse_template(smiles) } else { parse_smiles(smiles) };
    parsed.map_err(|e| RetroError::Validation(format!("unparseable reactant '{smiles}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRODUCT: &str =
        "[CH3:10][C:12](=[O:13])[NH:14][c:18]1[cH:19][cH:20][cH:21][cH:22][cH:23]1";
    const ANILINE: &str = "[NH2:14][c:18]1[cH:19][cH:20][cH:21][cH:22][cH:23]1";

    fn product() -> MappedProduct {
        MappedProduct::from_smiles(PRODUCT).unwrap()
    }

    fn candidate(atoms: &str, names: &[&str], importance: i64, order: u32) -> RawCandidate {
        RawCandidate {
            atom_set: atoms.into(),
            reaction_names: names.iter().map(|s| s.to_string()).collect(),
            rationale: format!("rationale {order}"),
            importance,
            is_in_ontology: None,
            reactant_sets: Vec::new(),
            is_valid: None,
            reasoning: None,
            discovery_order: order,
            kind: None,
        }
    }

    #[test]
    fn groups_by_canonical_key() {
        let raw = vec![
            candidate("C:12 N:14", &["Carboxylic acid to amide conversion"], 4, 2),
            candidate(
                "N:14 C:12",
                &["Amide Schotten-Baumann", "Carboxylic acid to amide conversion"],
                3,
                1,
            ),
            candidate(
                "N:14 c:18",
                &["Buchwald-Hartwig/Ullmann-Goldberg/N-arylation secondary amine"],
                4,
                3,
            ),
        ];
        let (groups, diagnostics) = aggregate(&product(), &Ontology::builtin(), &raw);
        assert!(diagnostics.is_empty());
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].disconnection.to_string(), "C:12 N:14");
        assert_eq!(groups[0].discovery_order, 1);
        let names: Vec<_> = groups[0].reactions.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["Carboxylic acid to amide conversion", "Amide Schotten-Baumann"]);
        // The rediscovery at order 1 replaces the order-2 mention
        assert_eq!(groups[0].reactions[0].importance, 3);
        assert_eq!(groups[0].reactions[0].discovery_order, 1);
        assert_eq!(groups[0].reactions[0].input_position, 1);
        assert_eq!(groups[1].disconnection.to_string(), "N:14 c:18");
    }

    #[test]
    fn repeated_name_keeps_earliest_discovery_regardless_of_input_order() {
        let forward = vec![
            candidate("C:12 N:14", &["Amide Schotten-Baumann"], 2, 3),
            candidate("N:14", &["Boc amine deprotection"], 2, 2),
            candidate("N:14 C:12", &["Amide Schotten-Baumann"], 2, 1),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();

        let (a, _) = aggregate(&product(), &Ontology::builtin(), &forward);
        let (b, _) = aggregate(&product(), &Ontology::builtin(), &reversed);
        for groups in [&a, &b] {
            assert_eq!(groups[0].disconnection.to_string(), "C:12 N:14");
            assert_eq!(groups[0].reactions.len(), 1);
            assert_eq!(groups[0].reactions[0].discovery_order, 1);
            assert_eq!(groups[0].reactions[0].rationale, "rationale 1");
        }
    }

    #[test]
    fn unknown_map_id_drops_only_that_record() {
        let raw = vec![
            candidate("C:12 N:99", &["Carboxylic acid to amide conversion"], 4, 1),
            candidate("N:14", &["Boc amine deprotection"], 1, 2),
        ];
        let (groups, diagnostics) = aggregate(&product(), &Ontology::builtin(), &raw);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].disconnection.to_string(), "N:14");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics.dropped[0].kind, "validation");
        assert_eq!(diagnostics.dropped[0].discovery_order, Some(1));
    }

    #[test]
    fn bad_importance_malformed_atoms_and_missing_names() {
        let raw = vec![
            candidate("C:12", &["Ketone to alcohol reduction"], 5, 1),
            candidate("C:12", &["Ketone to alcohol reduction"], 0, 2),
            candidate("C12 N:14", &["Amide Schotten-Baumann"], 3, 3),
            candidate("O:12", &["Amide Schotten-Baumann"], 3, 4),
            candidate("N:14", &[], 3, 5),
        ];
        let (groups, diagnostics) = aggregate(&product(), &Ontology::builtin(), &raw);
        assert!(groups.is_empty());
        assert_eq!(diagnostics.len(), 5);
        assert!(diagnostics.dropped.iter().all(|d| d.kind == "validation"));
    }

    #[test]
    fn reactant_sets_are_checked_and_deduplicated() {
        let mut record = candidate("C:12 N:14", &["Carboxylic acid to amide conversion"], 4, 1);
        record.is_valid = Some(true);
        record.reasoning = Some("record reasoning".into());
        record.reactant_sets = vec![
            RawReactantSet::new(vec!["[CH3:10][C:12](=[O:13])O".into(), ANILINE.into()]),
            // Same set in another order
            RawReactantSet::new(vec![ANILINE.into(), "O[C:12](=[O:13])[CH3:10]".into()]),
            RawReactantSet::new(vec!["[CH3:10][C:12](=[O:99])O".into()]),
            RawReactantSet::new(vec!["C((".into()]),
        ];
        let (groups, diagnostics) = aggregate(&product(), &Ontology::builtin(), &[record]);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].reactant_sets.len(), 1);
        let option = &groups[0].reactant_sets[0];
        assert!(option.is_valid);
        assert_eq!(option.reasoning.as_deref(), Some("record reasoning"));
        assert_eq!(diagnostics.len(), 2);
    }

    #[test]
    fn missing_rationale_gets_placeholder() {
        let mut record = candidate("N:14", &["Boc amine deprotection"], 1, 1);
        record.rationale = "  ".into();
        let (groups, _) = aggregate(&product(), &Ontology::builtin(), &[record]);
        assert_eq!(groups[0].reactions[0].rationale, MISSING_RATIONALE);
    }

    #[test]
    fn ring_forming_names_keep_traversal_order() {
        let record = candidate("c:21 c:19 c:20 c:22", &["Diels-Alder reaction"], 2, 1);
        let (groups, _) = aggregate(&product(), &Ontology::builtin(), &[record]);
        assert_eq!(groups[0].disconnection.kind(), DisconnectionKind::RingForming);
        assert_eq!(groups[0].disconnection.key(), vec![19, 20, 22, 21]);
    }
}
