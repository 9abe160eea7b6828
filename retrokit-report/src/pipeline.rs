//! One analysis, from raw oracle records to a validated report.

use std::sync::Arc;

use retrokit_core::{Result, Summarizable};
use tracing::{debug, info};

use crate::aggregate::aggregate;
use crate::config::PipelineConfig;
use crate::diagnostics::Diagnostics;
use crate::generalize::attach_templates;
use crate::normalize::normalize;
use crate::ontology::Ontology;
use crate::product::MappedProduct;
use crate::rank::rank;
use crate::raw::{parse_candidates, RawCandidate};
use crate::schema::{
    assemble_position, assemble_transition, validate, ErrorReport, Report, ReportKind,
};

/// The validated report and everything dropped on the way.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub report: Report,
    pub diagnostics: Diagnostics,
}

/// One molecule of a batch: its product and the oracle's records.
#[derive(Debug, Clone)]
pub struct BatchJob {
    pub product: MappedProduct,
    pub candidates: Vec<RawCandidate>,
}

/// Runs analyses against one shared, read-only ontology.
///
/// A `Pipeline` holds no per-run state; one instance can serve many
/// molecules from many threads.
#[derive(Debug, Clone)]
pub struct Pipeline {
    ontology: Arc<Ontology>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(ontology: Arc<Ontology>, config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Pipeline { ontology, config })
    }

    /// Built-in ontology and default configuration.
    pub fn with_defaults() -> Self {
        Pipeline {
            ontology: Arc::new(Ontology::builtin()),
            config: PipelineConfig::default(),
        }
    }

    pub fn ontology(&self) -> &Ontology {
        &self.ontology
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Aggregate, normalize, generalize, rank, assemble and validate.
    ///
    /// Bad records are dropped into the diagnostics; only a report that
    /// breaks a structural invariant fails the whole run.
    pub fn run(
        &self,
        product: &MappedProduct,
        raw: &[RawCandidate],
        kind: ReportKind,
    ) -> Result<Analysis> {
        debug!(product = %product.smiles(), records = raw.len(), ?kind, "analysis started");

        let (groups, mut diagnostics) = aggregate(product, &self.ontology, raw);
        let (mut pairs, dropped) = normalize(&self.ontology, &self.config, &groups);
        diagnostics.extend(dropped);

        if kind == ReportKind::Transition {
            diagnostics.extend(attach_templates(&mut pairs, &self.config));
        }

        let ranked = rank(pairs);
        let report = match kind {
            ReportKind::Position => Report::Position(assemble_position(ranked)),
            ReportKind::Transition => Report::Transition(assemble_transition(ranked)),
        };
        validate(&report, product)?;

        info!(summary = %report.summary(), dropped = diagnostics.len(), "analysis complete");
        Ok(Analysis { report, diagnostics })
    }

    /// Run every job independently, results in job order.
    ///
    /// Jobs run on the rayon pool with the `parallel` feature and in
    /// sequence otherwise; the output is identical either way.
    pub fn run_batch(&self, jobs: &[BatchJob], kind: ReportKind) -> Vec<Result<Analysis>> {
        debug!(jobs = jobs.len(), ?kind, "batch started");

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            jobs.par_iter()
                .map(|job| self.run(&job.product, &job.candidates, kind))
                .collect()
        }
        #[cfg(not(feature = "parallel"))]
        jobs.iter()
            .map(|job| self.run(&job.product, &job.candidates, kind))
            .collect()
    }

    /// Run and render either the report or the explicit error object.
    pub fn run_json(
        &self,
        product: &MappedProduct,
        raw: &[RawCandidate],
        kind: ReportKind,
    ) -> String {
        match self.run(product, raw, kind).and_then(|analysis| analysis.report.to_json()) {
            Ok(json) => json,
            Err(e) => ErrorReport::from(&e).to_json(),
        }
    }

    /// Parse a mapped product SMILES and a candidate JSON document, then run.
    pub fn run_str(&self, product_smiles: &str, candidates_json: &str, kind: ReportKind) -> String {
        let inputs = MappedProduct::from_smiles(product_smiles)
            .and_then(|product| Ok((product, parse_candidates(candidates_json)?)));
        match inputs {
            Ok((product, raw)) => self.run_json(&product, &raw, kind),
            Err(e) => ErrorReport::from(&e).to_json(),
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::RawReactantSet;
    use retrokit_core::RetroError;

    const PRODUCT: &str =
        "[CH3:10][C:12](=[O:13])[NH:14][c:18]1[cH:19][cH:20][cH:21][cH:22][cH:23]1";

    fn candidate(atoms: &str, name: &str, importance: i64, order: u32) -> RawCandidate {
        RawCandidate {
            atom_set: atoms.into(),
            reaction_names: vec![name.into()],
            rationale: "because".into(),
            importance,
            is_in_ontology: Some(true),
            reactant_sets: Vec::new(),
            is_valid: None,
            reasoning: None,
            discovery_order: order,
            kind: None,
        }
    }

    #[test]
    fn position_run_collects_diagnostics() {
        let product = MappedProduct::from_smiles(PRODUCT).unwrap();
        let raw = vec![
            candidate("C:12 N:14", "Carboxylic acid to amide conversion", 4, 1),
            candidate("C:12 N:40", "Amide Schotten-Baumann", 4, 2),
            candidate("N:14", "Other", 2, 3),
        ];
        let analysis = Pipeline::with_defaults().run(&product, &raw, ReportKind::Position).unwrap();
        assert_eq!(analysis.report.pair_count(), 1);
        assert_eq!(analysis.diagnostics.len(), 2);
    }

    #[test]
    fn transition_run_places_template_first() {
        let product = MappedProduct::from_smiles(PRODUCT).unwrap();
        let aniline = "[NH2:14][c:18]1[cH:19][cH:20][cH:21][cH:22][cH:23]1";
        let mut record = candidate("C:12 N:14", "Amide Schotten-Baumann", 4, 1);
        record.is_valid = Some(true);
        record.reactant_sets = ["Cl", "Br"]
            .iter()
            .map(|x| {
                RawReactantSet::new(vec![
                    format!("[CH3:10][C:12](=[O:13]){x}"),
                    aniline.to_string(),
                ])
            })
            .collect();

        let analysis = Pipeline::with_defaults()
            .run(&product, &[record], ReportKind::Transition)
            .unwrap();
        let report = analysis.report.as_transition().unwrap();
        let permutations = &report.reaction_analysis[0].reactant_permutations;
        assert_eq!(permutations.len(), 3);
        assert!(permutations[0].is_template);
        assert_eq!(permutations[0].reactants[0], "[CH3:10][C:12](=[O:13])[Cl,Br]");
    }

    #[test]
    fn string_entry_point_reports_errors_as_objects() {
        let pipeline = Pipeline::with_defaults();
        let json = pipeline.run_str("C((", "[]", ReportKind::Position);
        assert!(json.starts_with(r#"{"error":{"kind":"parse""#));
        let json = pipeline.run_str(PRODUCT, "[]", ReportKind::Position);
        assert_eq!(json, r#"{"disconnections":[]}"#);
    }

    #[test]
    fn batch_matches_one_by_one_runs() {
        let pipeline = Pipeline::with_defaults();
        let product = MappedProduct::from_smiles(PRODUCT).unwrap();
        let jobs: Vec<BatchJob> = (0..8u32)
            .map(|i| BatchJob {
                product: product.clone(),
                candidates: vec![
                    candidate(
                        "C:12 N:14",
                        "Carboxylic acid to amide conversion",
                        i64::from(i % 4 + 1),
                        i,
                    ),
                    candidate("N:14 c:18", "Amide Schotten-Baumann", 3, 8 - i),
                ],
            })
            .collect();

        let batch = pipeline.run_batch(&jobs, ReportKind::Position);
        assert_eq!(batch.len(), jobs.len());
        for (job, result) in jobs.iter().zip(&batch) {
            let expected = pipeline.run_json(&job.product, &job.candidates, ReportKind::Position);
            assert_eq!(result.as_ref().unwrap().report.to_json().unwrap(), expected);
        }
        assert!(pipeline.run_batch(&[], ReportKind::Transition).is_empty());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = PipelineConfig { min_template_members: 0, ..PipelineConfig::default() };
        let err = Pipeline::new(Arc::new(Ontology::builtin()), config).unwrap_err();
        assert!(matches!(err, RetroError::InvalidInput(_)));
    }
}
