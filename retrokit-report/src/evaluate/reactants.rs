//! Scoring predicted reactant sets against the recorded reactants.
//!
//! Ground truth and predictions are dot-separated SMILES; atom maps are
//! ignored. A plain set matches when its reactants pair one-to-one with the
//! ground truth as identical graphs. A template set matches when each
//! template reactant pairs with a ground-truth reactant it is a
//! substructure of, covering at least [`MIN_TEMPLATE_COVERAGE`] of its atoms.

use retrokit_chem::{
    first_substructure_match, parse_smiles, parse_template, same_structure, Molecule,
};
use retrokit_core::{Result, RetroError};
use serde::Serialize;

use crate::schema::{ReactantPermutation, TransitionReport};

/// Smallest fraction of a ground-truth reactant a template must cover.
pub const MIN_TEMPLATE_COVERAGE: f64 = 0.75;

/// One report's reactant sets scored against the recorded reactants.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ReactantEvaluation {
    /// Some plain set parsed completely.
    pub valid_non_template_generated: bool,
    pub template_match: bool,
    pub template_match_with_stereo: bool,
    pub exact_match: bool,
    pub exact_match_with_stereo: bool,
    pub predictions: usize,
    pub reactants_per_prediction: Vec<usize>,
    pub templates: usize,
    pub non_templates: usize,
    /// Plain sets flagged valid by the report.
    pub valid_non_templates: usize,
    pub invalid_non_templates: usize,
}

impl ReactantEvaluation {
    /// An exact or a template match.
    pub fn any_match(&self, use_stereo: bool) -> bool {
        if use_stereo {
            self.exact_match_with_stereo || self.template_match_with_stereo
        } else {
            self.exact_match || self.template_match
        }
    }
}

/// Means over many evaluations. Accuracies are percentages.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ReactantSummary {
    pub molecules: usize,
    pub reactant_accuracy: f64,
    pub reactant_accuracy_with_stereo: f64,
    pub template_accuracy: f64,
    pub template_accuracy_with_stereo: f64,
    pub overall_accuracy: f64,
    pub overall_accuracy_with_stereo: f64,
    pub valid_generation_rate: f64,
    pub average_predictions: f64,
    pub average_reactants_per_prediction: f64,
    pub average_templates: f64,
    pub average_non_templates: f64,
    pub average_valid_non_templates: f64,
    pub average_invalid_non_templates: f64,
}

fn split_reactants<'a>(smiles: impl IntoIterator<Item = &'a String>) -> Vec<&'a str> {
    smiles
        .into_iter()
        .flat_map(|s| s.split('.'))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Whether `template` is a substructure of `ground_truth` covering enough of it.
pub fn template_covers(ground_truth: &Molecule, template: &Molecule, use_stereo: bool) -> bool {
    first_substructure_match(ground_truth, template, use_stereo)
        .is_some_and(|m| m.coverage(ground_truth) >= MIN_TEMPLATE_COVERAGE)
}

/// Pairs every ground-truth reactant with a distinct prediction, first fit.
/// Unparsed predictions never pair.
fn pairs_one_to_one(
    ground_truth: &[Molecule],
    predicted: &[Option<Molecule>],
    matches: impl Fn(&Molecule, &Molecule) -> bool,
) -> bool {
    if ground_truth.len() != predicted.len() {
        return false;
    }
    let mut used = vec![false; predicted.len()];
    for gt in ground_truth {
        let hit = predicted
            .iter()
            .enumerate()
            .position(|(i, p)| !used[i] && p.as_ref().is_some_and(|p| matches(gt, p)));
        match hit {
            Some(i) => used[i] = true,
            None => return false,
        }
    }
    true
}

/// Whether one reactant set reproduces the ground truth.
pub fn reactants_match(
    ground_truth: &[Molecule],
    permutation: &ReactantPermutation,
    use_stereo: bool,
) -> bool {
    let predicted: Vec<Option<Molecule>> = split_reactants(&permutation.reactants)
        .into_iter()
        .map(|s| {
            if permutation.is_template {
                parse_template(s).ok()
            } else {
                parse_smiles(s).ok()
            }
        })
        .collect();
    if permutation.is_template {
        pairs_one_to_one(ground_truth, &predicted, |gt, t| template_covers(gt, t, use_stereo))
    } else {
        pairs_one_to_one(ground_truth, &predicted, |gt, p| same_structure(gt, p, use_stereo))
    }
}

/// Score reactant sets against dot-separated ground-truth reactants.
pub fn evaluate_reactants(
    ground_truth: &str,
    permutations: &[ReactantPermutation],
) -> Result<ReactantEvaluation> {
    let truth: Vec<Molecule> = ground_truth
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(parse_smiles)
        .collect::<Result<_>>()?;
    if truth.is_empty() {
        return Err(RetroError::InvalidInput("ground-truth reactants are empty".into()));
    }

    let mut eval = ReactantEvaluation {
        predictions: permutations.len(),
        ..ReactantEvaluation::default()
    };
    for permutation in permutations {
        eval.reactants_per_prediction.push(split_reactants(&permutation.reactants).len());
        if permutation.is_template {
            eval.templates += 1;
            eval.template_match |= reactants_match(&truth, permutation, false);
            eval.template_match_with_stereo |= reactants_match(&truth, permutation, true);
            continue;
        }
        eval.non_templates += 1;
        if permutation.is_valid {
            eval.valid_non_templates += 1;
        } else {
            eval.invalid_non_templates += 1;
        }
        let parses = split_reactants(&permutation.reactants)
            .iter()
            .all(|s| parse_smiles(s).is_ok());
        eval.valid_non_template_generated |= parses;
        eval.exact_match |= reactants_match(&truth, permutation, false);
        eval.exact_match_with_stereo |= reactants_match(&truth, permutation, true);
    }
    tracing::debug!(
        predictions = eval.predictions,
        exact = eval.exact_match,
        template = eval.template_match,
        "scored reactant sets"
    );
    Ok(eval)
}

/// Score every reactant set of a transition report.
pub fn evaluate_transition_report(
    ground_truth: &str,
    report: &TransitionReport,
) -> Result<ReactantEvaluation> {
    let permutations: Vec<ReactantPermutation> = report
        .reaction_analysis
        .iter()
        .flat_map(|entry| entry.reactant_permutations.iter().cloned())
        .collect();
    evaluate_reactants(ground_truth, &permutations)
}

/// Aggregate reactant evaluations over many molecules.
pub fn summarize_reactants(results: &[ReactantEvaluation]) -> ReactantSummary {
    if results.is_empty() {
        return ReactantSummary::default();
    }
    let n = results.len() as f64;
    let rate = |f: fn(&ReactantEvaluation) -> bool| {
        results.iter().filter(|r| f(r)).count() as f64 / n * 100.0
    };
    let mean = |f: fn(&ReactantEvaluation) -> usize| {
        results.iter().map(|r| f(r) as f64).sum::<f64>() / n
    };

    let reactant_counts: Vec<usize> =
        results.iter().flat_map(|r| r.reactants_per_prediction.iter().copied()).collect();
    let average_reactants_per_prediction = if reactant_counts.is_empty() {
        0.0
    } else {
        reactant_counts.iter().sum::<usize>() as f64 / reactant_counts.len() as f64
    };

    ReactantSummary {
        molecules: results.len(),
        reactant_accuracy: rate(|r| r.exact_match),
        reactant_accuracy_with_stereo: rate(|r| r.exact_match_with_stereo),
        template_accuracy: rate(|r| r.template_match),
        template_accuracy_with_stereo: rate(|r| r.template_match_with_stereo),
        overall_accuracy: rate(|r| r.any_match(false)),
        overall_accuracy_with_stereo: rate(|r| r.any_match(true)),
        valid_generation_rate: rate(|r| r.valid_non_template_generated),
        average_predictions: mean(|r| r.predictions),
        average_reactants_per_prediction,
        average_templates: mean(|r| r.templates),
        average_non_templates: mean(|r| r.non_templates),
        average_valid_non_templates: mean(|r| r.valid_non_templates),
        average_invalid_non_templates: mean(|r| r.invalid_non_templates),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ontology::ReactionClass;
    use crate::schema::TransitionEntry;

    const AMINE: &str =
        "[NH2:14][CH2:15][CH2:16][NH:17][c:18]1[cH:19][cH:20][cH:21][cH:22][cH:23]1";
    const TRUTH: &str = "CC(=O)Cl.NCCNc1ccccc1";

    fn set(reactants: &[&str], is_template: bool, is_valid: bool) -> ReactantPermutation {
        ReactantPermutation {
            reactants: reactants.iter().map(|s| s.to_string()).collect(),
            is_valid,
            is_template,
            reasoning: "acyl halide".into(),
        }
    }

    #[test]
    fn mapped_prediction_matches_unmapped_truth() {
        let sets = [
            set(&["[CH3:10][C:12](=[O:13])Br", AMINE], false, true),
            set(&["[CH3:10][C:12](=[O:13])Cl", AMINE], false, true),
        ];
        let eval = evaluate_reactants(TRUTH, &sets).unwrap();
        assert!(eval.exact_match);
        assert!(eval.exact_match_with_stereo);
        assert!(!eval.template_match);
        assert!(eval.valid_non_template_generated);
        assert_eq!(eval.predictions, 2);
        assert_eq!(eval.reactants_per_prediction, vec![2, 2]);
        assert_eq!(eval.non_templates, 2);
    }

    #[test]
    fn dotted_reactant_strings_are_split() {
        let joined = format!("[CH3:10][C:12](=[O:13])Cl.{AMINE}");
        let eval = evaluate_reactants(TRUTH, &[set(&[joined.as_str()], false, true)]).unwrap();
        assert!(eval.exact_match);
        assert_eq!(eval.reactants_per_prediction, vec![2]);
    }

    #[test]
    fn template_needs_coverage() {
        let halide = set(&["[CH3:10][C:12](=[O:13])[Cl,Br,I]", AMINE], true, true);
        let eval = evaluate_reactants(TRUTH, &[halide]).unwrap();
        assert!(eval.template_match);
        assert!(eval.template_match_with_stereo);
        assert!(!eval.exact_match);
        assert!(eval.any_match(true));
        assert_eq!(eval.templates, 1);

        // three of six atoms of the longer acyl chloride
        let short = set(&["[C:12](=[O:13])[Cl,Br,I]", AMINE], true, true);
        let eval = evaluate_reactants("CCCCC(=O)Cl.NCCNc1ccccc1", &[short]).unwrap();
        assert!(!eval.template_match);
    }

    #[test]
    fn reactant_count_must_agree() {
        let eval = evaluate_reactants(TRUTH, &[set(&["CC(=O)Cl"], false, true)]).unwrap();
        assert!(!eval.exact_match);
        assert!(eval.valid_non_template_generated);
    }

    #[test]
    fn handedness_only_counts_with_stereo() {
        let truth = "C[C@H](N)C(=O)O.CO";
        let mirrored = set(&["C[C@@H](N)C(=O)O", "CO"], false, true);
        let eval = evaluate_reactants(truth, &[mirrored]).unwrap();
        assert!(eval.exact_match);
        assert!(!eval.exact_match_with_stereo);
    }

    #[test]
    fn unparsable_sets_count_but_never_match() {
        let sets = [set(&["C1CC", AMINE], false, false)];
        let eval = evaluate_reactants(TRUTH, &sets).unwrap();
        assert!(!eval.valid_non_template_generated);
        assert!(!eval.exact_match);
        assert_eq!(eval.invalid_non_templates, 1);
        assert!(evaluate_reactants(" . ", &sets).is_err());
        assert!(evaluate_reactants("C1CC", &sets).is_err());
    }

    #[test]
    fn transition_report_and_summary() {
        let entry = |sets: Vec<ReactantPermutation>| TransitionEntry {
            disconnection: "C:12 N:14".into(),
            forward_reaction: "Amide Schotten-Baumann".into(),
            forward_reaction_class: ReactionClass::Acylation,
            priority: 1,
            reactant_permutations: sets,
        };
        let hit = TransitionReport {
            reaction_analysis: vec![entry(vec![
                set(&["[CH3:10][C:12](=[O:13])[Cl,Br,I]", AMINE], true, true),
                set(&["[CH3:10][C:12](=[O:13])Cl", AMINE], false, true),
            ])],
        };
        let miss = TransitionReport {
            reaction_analysis: vec![entry(vec![set(&["CC(=O)O", AMINE], false, true)])],
        };
        let a = evaluate_transition_report(TRUTH, &hit).unwrap();
        let b = evaluate_transition_report(TRUTH, &miss).unwrap();
        assert!(a.exact_match && a.template_match);
        assert!(!b.any_match(false));

        let summary = summarize_reactants(&[a, b]);
        assert_eq!(summary.molecules, 2);
        assert!((summary.reactant_accuracy - 50.0).abs() < 1e-9);
        assert!((summary.overall_accuracy_with_stereo - 50.0).abs() < 1e-9);
        assert!((summary.valid_generation_rate - 100.0).abs() < 1e-9);
        assert!((summary.average_predictions - 1.5).abs() < 1e-9);
        assert!((summary.average_reactants_per_prediction - 2.0).abs() < 1e-9);
        assert!((summary.average_templates - 0.5).abs() < 1e-9);
        assert_eq!(summarize_reactants(&[]), ReactantSummary::default());
    }
}
