//! Reaction pair normalization: one pair per (disconnection, reaction name).

use retrokit_core::RetroError;
use tracing::debug;

use crate::aggregate::{AggregatedDisconnection, ReactantOption};
use crate::config::PipelineConfig;
use crate::diagnostics::{Diagnostics, Stage};
use crate::disconnection::Disconnection;
use crate::generalize::TemplateEntry;
use crate::ontology::{Ontology, ReactionClass};
use crate::schema::ReactantPermutation;

/// A single reaction proposed for a single disconnection.
#[derive(Debug, Clone, PartialEq)]
pub struct ReactionPair {
    pub disconnection: Disconnection,
    pub name: String,
    pub is_in_ontology: bool,
    pub class: ReactionClass,
    pub importance: u8,
    pub rationale: String,
    pub discovery_order: u32,
    /// Position in the normalized list; the last ranking tie-break.
    pub sequence: usize,
    /// Oracle-proposed reactant sets routed to this reaction.
    pub permutations: Vec<ReactantPermutation>,
    /// Generated template, written ahead of `permutations`.
    pub template: Option<TemplateEntry>,
}

impl ReactionPair {
    /// Permutation list as reported: template first, then the oracle's sets.
    pub fn reactant_permutations(&self) -> Vec<ReactantPermutation> {
        self.template
            .iter()
            .map(TemplateEntry::to_permutation)
            .chain(self.permutations.iter().cloned())
            .collect()
    }
}

/// Expand aggregated groups into flat reaction pairs.
///
/// Names equal to the configured placeholder are dropped one pair at a time
/// with an `InvalidReactionName` diagnostic.
pub fn normalize(
    ontology: &Ontology,
    config: &PipelineConfig,
    groups: &[AggregatedDisconnection],
) -> (Vec<ReactionPair>, Diagnostics) {
    let mut diagnostics = Diagnostics::new();
    let mut pairs = Vec::new();

    for group in groups {
        for mention in &group.reactions {
            if config.is_sentinel(&mention.name) {
                let error = RetroError::InvalidReactionName(format!(
                    "'{}' is a placeholder; a descriptive reaction name is required for {}",
                    mention.name, group.disconnection
                ));
                let order = Some(mention.discovery_order);
                diagnostics.record(Stage::Normalize, order, &mention.name, &error);
                continue;
            }

            let is_in_ontology = ontology.contains(&mention.name);
            if mention.claimed_in_ontology.is_some_and(|claim| claim != is_in_ontology) {
                debug!(
                    name = %mention.name,
                    is_in_ontology,
                    "oracle membership claim overridden by registry"
                );
            }

            let permutations = group
                .reactant_sets
                .iter()
                .filter(|o| o.reaction.as_deref().map_or(true, |r| r == mention.name))
                .map(|o| permutation_of(o, config))
                .collect();

            pairs.push(ReactionPair {
                disconnection: group.disconnection.clone(),
                name: mention.name.clone(),
                is_in_ontology,
                class: ontology.infer_class(&mention.name),
                importance: mention.importance,
                rationale: mention.rationale.clone(),
                discovery_order: mention.discovery_order,
                sequence: pairs.len(),
                permutations,
                template: None,
            });
        }
    }

    debug!(pairs = pairs.len(), dropped = diagnostics.len(), "normalization done");
    (pairs, diagnostics)
}

fn permutation_of(option: &ReactantOption, config: &PipelineConfig) -> ReactantPermutation {
    ReactantPermutation {
        reactants: option.reactants.clone(),
        is_valid: option.is_valid,
        is_template: option.is_template,
        reasoning: option
            .reasoning
            .clone()
            .unwrap_or_else(|| config.default_reactant_reasoning.clone()),
    }
}
