//! Deterministic post-processing of retrosynthesis oracle output.
//!
//! Turns a noisy set of (disconnection, reaction) assertions about an
//! atom-mapped product into a validated, deduplicated, globally ranked
//! report, and collapses families of similar reactant sets into templates:
//!
//! - **Inputs**: [`MappedProduct`], [`Ontology`], [`RawCandidate`]
//! - **Stages**: [`aggregate`](aggregate::aggregate) →
//!   [`normalize`](normalize::normalize) →
//!   [`attach_templates`](generalize::attach_templates) →
//!   [`rank`](rank::rank) → [`validate`](schema::validate)
//! - **Output**: [`Report`] (position or transition schema) plus
//!   [`Diagnostics`] for every dropped record
//! - **Tooling**: oracle [`response`] extraction, reaction
//!   [`sites`], and prediction [`evaluate`]ion
//!
//! # Example
//!
//! ```
//! use retrokit_report::{MappedProduct, Pipeline, RawCandidate, ReportKind};
//!
//! let product = MappedProduct::from_smiles(
//!     "[CH3:10][C:12](=[O:13])[NH:14][c:18]1[cH:19][cH:20][cH:21][cH:22][cH:23]1",
//! ).unwrap();
//! let raw: Vec<RawCandidate> = serde_json::from_str(r#"[
//!     {"atomSet": "C:12 N:14", "reactionNames": ["Carboxylic acid to amide conversion"],
//!      "rationale": "amide bond", "importance": 4, "discoveryOrder": 1}
//! ]"#).unwrap();
//!
//! let analysis = Pipeline::with_defaults().run(&product, &raw, ReportKind::Position).unwrap();
//! let json = analysis.report.to_json().unwrap();
//! assert!(json.starts_with(r#"{"disconnections":[{"disconnection":"C:12 N:14""#));
//! assert!(analysis.diagnostics.is_empty());
//! ```

pub mod aggregate;
pub mod atom_ref;
pub mod config;
pub mod diagnostics;
pub mod disconnection;
pub mod evaluate;
pub mod generalize;
pub mod normalize;
pub mod ontology;
pub mod pipeline;
pub mod product;
pub mod rank;
pub mod raw;
pub mod response;
pub mod schema;
pub mod sites;

pub use atom_ref::AtomRef;
pub use config::PipelineConfig;
pub use diagnostics::{Diagnostics, DroppedRecord, Stage};
pub use evaluate::reactants::{evaluate_reactants, evaluate_transition_report, ReactantEvaluation};
pub use disconnection::{Disconnection, DisconnectionKind};
pub use generalize::{TemplateClass, TemplateEntry};
pub use normalize::ReactionPair;
pub use ontology::{Ontology, ReactionClass};
pub use pipeline::{Analysis, BatchJob, Pipeline};
pub use product::MappedProduct;
pub use rank::RankedPair;
pub use raw::{RawCandidate, RawReactantSet};
pub use schema::{ErrorReport, ReactantPermutation, Report, ReportKind};
