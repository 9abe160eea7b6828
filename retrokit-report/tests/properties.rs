//! Invariants that hold for any raw candidate set.

use proptest::prelude::*;
use retrokit_report::schema::validate;
use retrokit_report::{MappedProduct, Pipeline, RawCandidate, RawReactantSet, Report, ReportKind};

const PRODUCT: &str =
    "[CH3:10][C:12](=[O:13])[NH:14][CH2:15][CH2:16][NH:17][c:18]1[cH:19][cH:20][cH:21][cH:22][cH:23]1";

const AMINE: &str = "[NH2:14][CH2:15][CH2:16][NH:17][c:18]1[cH:19][cH:20][cH:21][cH:22][cH:23]1";

const LEAVING_GROUPS: &[&str] = &["Cl", "Br", "I", "O", "OC"];

/// Nitrogen substituents of protected forms of the product.
const PROTECTING_GROUPS: &[&str] = &["C(=O)OC(C)(C)C", "C(=O)OCc2ccccc2", "C(=O)OC"];

/// Tokens include one map id the product lacks and one malformed token.
const ATOMS: &[&str] = &["C:10", "C:12", "O:13", "N:14", "C:15", "N:17", "c:18", "c:19", "N:99", "X12"];

const NAMES: &[&str] = &[
    "Carboxylic acid to amide conversion",
    "Amide Schotten-Baumann",
    "Boc amine deprotection",
    "Buchwald-Hartwig/Ullmann-Goldberg/N-arylation secondary amine",
    "Invented coupling",
    "Other",
];

fn arb_candidate() -> impl Strategy<Value = RawCandidate> {
    (
        prop::collection::vec(0..ATOMS.len(), 1..4),
        prop::collection::vec(0..NAMES.len(), 0..3),
        0i64..6,
        0u32..6,
        any::<bool>(),
    )
        .prop_map(|(atoms, names, importance, order, claim)| RawCandidate {
            atom_set: atoms.iter().map(|&i| ATOMS[i]).collect::<Vec<_>>().join(" "),
            reaction_names: names.iter().map(|&i| NAMES[i].to_string()).collect(),
            rationale: String::new(),
            importance,
            is_in_ontology: Some(claim),
            reactant_sets: Vec::new(),
            is_valid: None,
            reasoning: None,
            discovery_order: order,
            kind: None,
        })
}

/// An acylation or deprotection record carrying a family of reactant sets.
fn arb_transition_candidate() -> impl Strategy<Value = RawCandidate> {
    (
        any::<bool>(),
        prop::collection::vec(0..LEAVING_GROUPS.len(), 1..5),
        1i64..6,
        0u32..6,
        any::<bool>(),
    )
        .prop_map(|(acylation, picks, importance, order, valid)| {
            let (atom_set, name, reactant_sets) = if acylation {
                let sets = picks
                    .iter()
                    .map(|&i| {
                        let acyl = format!("[CH3:10][C:12](=[O:13]){}", LEAVING_GROUPS[i]);
                        RawReactantSet::new(vec![acyl, AMINE.to_string()])
                    })
                    .collect();
                ("C:12 N:14", "Amide Schotten-Baumann", sets)
            } else {
                let sets = picks
                    .iter()
                    .map(|&i| {
                        let group = PROTECTING_GROUPS[i % PROTECTING_GROUPS.len()];
                        RawReactantSet::new(vec![format!(
                            "[CH3:10][C:12](=[O:13])[N:14]({group})[CH2:15][CH2:16][NH:17]\
                             [c:18]1[cH:19][cH:20][cH:21][cH:22][cH:23]1"
                        )])
                    })
                    .collect();
                ("N:14", "Boc amine deprotection", sets)
            };
            RawCandidate {
                atom_set: atom_set.to_string(),
                reaction_names: vec![name.to_string()],
                rationale: "family".into(),
                importance,
                is_in_ontology: None,
                reactant_sets,
                is_valid: Some(valid),
                reasoning: None,
                discovery_order: order,
                kind: None,
            }
        })
}

fn flattened(report: &Report) -> Vec<(bool, u8, u32)> {
    report
        .as_position()
        .map(|r| {
            r.disconnections
                .iter()
                .flat_map(|g| g.reactions.iter().map(|x| (x.is_in_ontology, x.importance, x.priority)))
                .collect()
        })
        .unwrap_or_default()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn any_input_yields_a_valid_report(raw in prop::collection::vec(arb_candidate(), 0..12)) {
        let product = MappedProduct::from_smiles(PRODUCT).unwrap();
        let analysis = Pipeline::with_defaults().run(&product, &raw, ReportKind::Position).unwrap();
        prop_assert!(validate(&analysis.report, &product).is_ok());

        let json = analysis.report.to_json().unwrap();
        prop_assert!(json.starts_with(r#"{"disconnections":["#), "json does not start with disconnections array");
        let back = Report::from_json(&json).unwrap();
        prop_assert_eq!(&back, &analysis.report);
    }

    #[test]
    fn priorities_respect_ontology_then_importance(raw in prop::collection::vec(arb_candidate(), 0..12)) {
        let product = MappedProduct::from_smiles(PRODUCT).unwrap();
        let analysis = Pipeline::with_defaults().run(&product, &raw, ReportKind::Position).unwrap();
        let pairs = flattened(&analysis.report);

        let mut priorities: Vec<u32> = pairs.iter().map(|p| p.2).collect();
        priorities.sort_unstable();
        prop_assert_eq!(priorities, (1..=pairs.len() as u32).collect::<Vec<_>>());

        for a in &pairs {
            for b in &pairs {
                if a.0 && !b.0 {
                    prop_assert!(a.2 < b.2);
                }
                if a.0 == b.0 && a.1 > b.1 {
                    prop_assert!(a.2 < b.2);
                }
            }
        }
    }

    #[test]
    fn reruns_are_byte_identical(raw in prop::collection::vec(arb_candidate(), 0..12)) {
        let product = MappedProduct::from_smiles(PRODUCT).unwrap();
        let pipeline = Pipeline::with_defaults();
        prop_assert_eq!(
            pipeline.run_json(&product, &raw, ReportKind::Position),
            pipeline.run_json(&product, &raw, ReportKind::Position)
        );
    }

    #[test]
    fn transition_reports_lead_with_at_most_one_template(
        raw in prop::collection::vec(arb_transition_candidate(), 0..8)
    ) {
        let product = MappedProduct::from_smiles(PRODUCT).unwrap();
        let pipeline = Pipeline::with_defaults();
        let analysis = pipeline.run(&product, &raw, ReportKind::Transition).unwrap();
        prop_assert!(validate(&analysis.report, &product).is_ok());

        let report = analysis.report.as_transition().unwrap();
        for entry in &report.reaction_analysis {
            let templates: Vec<usize> = entry
                .reactant_permutations
                .iter()
                .enumerate()
                .filter(|(_, p)| p.is_template)
                .map(|(i, _)| i)
                .collect();
            prop_assert!(templates.len() <= 1);
            prop_assert!(templates.iter().all(|&i| i == 0));
            let reasoned = entry.reactant_permutations.iter().all(|p| !p.reasoning.trim().is_empty());
            prop_assert!(reasoned);
        }

        let mut priorities: Vec<u32> =
            report.reaction_analysis.iter().map(|e| e.priority).collect();
        priorities.sort_unstable();
        let expected: Vec<u32> = (1..=report.reaction_analysis.len() as u32).collect();
        prop_assert_eq!(priorities, expected);

        prop_assert_eq!(
            pipeline.run_json(&product, &raw, ReportKind::Transition),
            pipeline.run_json(&product, &raw, ReportKind::Transition)
        );
    }
}
