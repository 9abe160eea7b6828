//! Scoring predicted disconnections against ground-truth sites.
//!
//! Atom tokens compare case-insensitively, so `c:18` from a report matches
//! `C:18` from [`transformation_sites`](crate::sites::transformation_sites).
//! Transition reports are scored by [`reactants`].

pub mod reactants;

use std::collections::BTreeSet;

use retrokit_core::{Result, RetroError};
use serde::Serialize;

use crate::schema::PositionReport;

/// Overlap of a predicted atom set with the ground truth.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Similarity {
    /// |gt ∩ pred| / |pred|
    pub precision: f64,
    /// |gt ∩ pred| / |gt|
    pub recall: f64,
    /// |gt ∩ pred| / |gt ∪ pred|
    pub jaccard: f64,
}

/// One predicted (disconnection, reaction) scored against the truth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionScore {
    pub disconnection: String,
    pub reaction: String,
    pub priority: u32,
    pub similarity: Similarity,
    pub exact: bool,
    /// At least one ground-truth atom was found.
    pub partial: bool,
    /// Only set on a partial match.
    pub reaction_correct: bool,
}

/// The best prediction of one report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestMatch {
    /// Predictions considered.
    pub group_size: usize,
    pub best: PredictionScore,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct EvaluationSummary {
    pub molecules: usize,
    pub predictions: usize,
    pub exact_matches: usize,
    pub exact_match_rate: f64,
    pub partial_matches: usize,
    pub partial_match_rate: f64,
    pub correct_reactions: usize,
    pub reaction_accuracy: f64,
    pub average_group_size: f64,
    pub average_jaccard: f64,
    pub average_precision: f64,
    pub average_recall: f64,
}

fn atom_tokens(text: &str) -> BTreeSet<String> {
    text.split_whitespace().map(str::to_ascii_lowercase).collect()
}

/// Precision, recall and Jaccard of `predicted` against `ground_truth`.
pub fn similarity(ground_truth: &str, predicted: &str) -> Result<Similarity> {
    let gt = atom_tokens(ground_truth);
    if gt.is_empty() {
        return Err(RetroError::InvalidInput("ground-truth atom set is empty".into()));
    }
    let pred = atom_tokens(predicted);
    if pred.is_empty() {
        return Ok(Similarity::default());
    }
    let shared = gt.intersection(&pred).count() as f64;
    let union = gt.union(&pred).count() as f64;
    Ok(Similarity {
        precision: shared / pred.len() as f64,
        recall: shared / gt.len() as f64,
        jaccard: shared / union,
    })
}

/// Score one prediction.
pub fn score(
    ground_truth: &str,
    ground_truth_reaction: &str,
    disconnection: &str,
    reaction: &str,
    priority: u32,
) -> Result<PredictionScore> {
    let similarity = similarity(ground_truth, disconnection)?;
    let exact = similarity.precision == 1.0 && similarity.recall == 1.0;
    let partial = similarity.recall > 0.0;
    Ok(PredictionScore {
        disconnection: disconnection.to_string(),
        reaction: reaction.to_string(),
        priority,
        similarity,
        exact,
        partial,
        reaction_correct: partial && reaction.trim() == ground_truth_reaction.trim(),
    })
}

/// Score every reaction of a report, in report order.
pub fn score_report(
    ground_truth: &str,
    ground_truth_reaction: &str,
    report: &PositionReport,
) -> Result<Vec<PredictionScore>> {
    report
        .disconnections
        .iter()
        .flat_map(|group| group.reactions.iter().map(move |r| (group, r)))
        .map(|(group, r)| {
            score(
                ground_truth,
                ground_truth_reaction,
                &group.disconnection,
                &r.forward_reaction,
                r.priority,
            )
        })
        .collect()
}

/// The highest-Jaccard prediction of a report.
///
/// When nothing overlaps the first prediction is returned. Among equal
/// Jaccard scores a correct reaction name wins, then the lower priority.
/// `None` for an empty report.
pub fn best_match(
    ground_truth: &str,
    ground_truth_reaction: &str,
    report: &PositionReport,
) -> Result<Option<BestMatch>> {
    let scores = score_report(ground_truth, ground_truth_reaction, report)?;
    let group_size = scores.len();
    let max_jaccard = scores.iter().map(|s| s.similarity.jaccard).fold(0.0, f64::max);

    let best = if max_jaccard == 0.0 {
        scores.into_iter().next()
    } else {
        let ties: Vec<PredictionScore> =
            scores.into_iter().filter(|s| s.similarity.jaccard == max_jaccard).collect();
        let pool: Vec<&PredictionScore> = if ties.iter().any(|s| s.reaction_correct) {
            ties.iter().filter(|s| s.reaction_correct).collect()
        } else {
            ties.iter().collect()
        };
        pool.into_iter().min_by_key(|s| s.priority).cloned()
    };
    Ok(best.map(|best| BestMatch { group_size, best }))
}

/// Aggregate best matches over many molecules. Rates are percentages.
pub fn summarize(results: &[BestMatch]) -> EvaluationSummary {
    if results.is_empty() {
        return EvaluationSummary::default();
    }
    let n = results.len() as f64;
    let count = |f: fn(&PredictionScore) -> bool| results.iter().filter(|r| f(&r.best)).count();
    let mean = |f: fn(&BestMatch) -> f64| results.iter().map(f).sum::<f64>() / n;

    let exact_matches = count(|s| s.exact);
    let partial_matches = count(|s| s.partial);
    let correct_reactions = count(|s| s.reaction_correct);
    EvaluationSummary {
        molecules: results.len(),
        predictions: results.iter().map(|r| r.group_size).sum(),
        exact_matches,
        exact_match_rate: exact_matches as f64 / n * 100.0,
        partial_matches,
        partial_match_rate: partial_matches as f64 / n * 100.0,
        correct_reactions,
        reaction_accuracy: correct_reactions as f64 / n * 100.0,
        average_group_size: mean(|r| r.group_size as f64),
        average_jaccard: mean(|r| r.best.similarity.jaccard),
        average_precision: mean(|r| r.best.similarity.precision),
        average_recall: mean(|r| r.best.similarity.recall),
    }
}
