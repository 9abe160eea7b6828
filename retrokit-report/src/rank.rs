//! Global priority ranking.
//!
//! Priority is one rank over every (disconnection, reaction) pair of an
//! analysis, not a rank within each disconnection.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::debug;

use crate::disconnection::Disconnection;
use crate::normalize::ReactionPair;

/// A pair and its 1-based priority.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedPair {
    pub priority: u32,
    pub pair: ReactionPair,
}

/// Ranked pairs regrouped under their disconnection.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedGroup {
    pub disconnection: Disconnection,
    pub reactions: Vec<RankedPair>,
}

/// Ranking order: ontology members first, then higher importance, then
/// earlier discovery, then normalized position.
pub fn compare(a: &ReactionPair, b: &ReactionPair) -> Ordering {
    b.is_in_ontology
        .cmp(&a.is_in_ontology)
        .then_with(|| b.importance.cmp(&a.importance))
        .then_with(|| a.discovery_order.cmp(&b.discovery_order))
        .then_with(|| a.sequence.cmp(&b.sequence))
}

/// Sort all pairs and number them 1..=N.
pub fn rank(mut pairs: Vec<ReactionPair>) -> Vec<RankedPair> {
    // Stable, so equal keys keep input order even without a sequence
    pairs.sort_by(compare);
    let ranked: Vec<RankedPair> = pairs
        .into_iter()
        .zip(1u32..)
        .map(|(pair, priority)| RankedPair { priority, pair })
        .collect();
    debug!(pairs = ranked.len(), "ranking done");
    ranked
}

/// Put ranked pairs back under their disconnection.
///
/// Groups come out ordered by their best priority; reactions inside a
/// group by priority.
pub fn regroup(ranked: Vec<RankedPair>) -> Vec<RankedGroup> {
    let mut groups: Vec<RankedGroup> = Vec::new();
    let mut by_key: BTreeMap<Vec<u32>, usize> = BTreeMap::new();
    for item in ranked {
        let key = item.pair.disconnection.key();
        match by_key.get(&key) {
            Some(&idx) => groups[idx].reactions.push(item),
            None => {
                by_key.insert(key, groups.len());
                groups.push(RankedGroup {
                    disconnection: item.pair.disconnection.clone(),
                    reactions: vec![item],
                });
            }
        }
    }
    for group in &mut groups {
        group.reactions.sort_by_key(|r| r.priority);
    }
    groups.sort_by_key(|g| g.reactions.first().map_or(u32::MAX, |r| r.priority));
    groups
}


#[cfg(test)]
mod proptests {
    use super::tests::pair;
    use super::*;
    use proptest::prelude::*;

    fn arb_pairs() -> impl Strategy<Value = Vec<ReactionPair>> {
        prop::collection::vec((1u32..6, any::<bool>(), 1u8..=4, 0u32..5), 0..40).prop_map(|specs| {
            specs
                .into_iter()
                .enumerate()
                .map(|(i, (map, in_ontology, importance, order))| {
                    let atoms = format!("C:{map}");
                    let mut p = pair(&atoms, &format!("r{i}"), in_ontology, importance, order);
                    p.sequence = i;
                    p
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn priorities_are_a_permutation(pairs in arb_pairs()) {
            let n = pairs.len() as u32;
            let groups = regroup(rank(pairs));
            let mut priorities: Vec<u32> = groups
                .iter()
                .flat_map(|g| g.reactions.iter().map(|r| r.priority))
                .collect();
            priorities.sort_unstable();
            prop_assert_eq!(priorities, (1..=n).collect::<Vec<_>>());
        }

        #[test]
        fn ordering_implications_hold(pairs in arb_pairs()) {
            let ranked = rank(pairs);
            for a in &ranked {
                for b in &ranked {
                    if a.pair.is_in_ontology && !b.pair.is_in_ontology {
                        prop_assert!(a.priority < b.priority);
                    }
                    let same_tier = a.pair.is_in_ontology == b.pair.is_in_ontology;
                    if same_tier && a.pair.importance > b.pair.importance {
                        prop_assert!(a.priority < b.priority);
                    }
                }
            }
        }

        #[test]
        fn ranking_is_deterministic(pairs in arb_pairs()) {
            prop_assert_eq!(rank(pairs.clone()), rank(pairs));
        }
    }
}
