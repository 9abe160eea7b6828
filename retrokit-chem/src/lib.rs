//! Atom-mapped chemistry primitives for retrosynthesis post-processing.
//!
//! Provides the molecular graph, a SMILES parser that keeps atom-map
//! classes, wildcards and template disjunctions, a writer that emits
//! either canonical or input-ordered SMILES, and query-aware substructure
//! search.
//!
//! # Example
//!
//! ```
//! use retrokit_chem::{parse_smiles, write_smiles};
//!
//! let amide = parse_smiles("[CH3:1][C:2](=[O:3])[NH:4]C").unwrap();
//! assert_eq!(amide.atom_count(), 5);
//! assert_eq!(amide.atom_with_map(4), Some(3));
//! assert_eq!(write_smiles(&amide), "[CH3:1][C:2](=[O:3])[NH:4]C");
//! ```

pub mod element;
pub mod molecule;
pub mod smiles;
pub mod substructure;
pub mod writer;

pub use element::{
    element_by_number, element_by_smiles_symbol, element_by_symbol, Element, ElementGroup,
};
pub use molecule::{Bond, BondOrder, BondStereo, Chirality, MolAtom, Molecule};
pub use smiles::{parse_smiles, parse_smiles_named, parse_template};
pub use substructure::{
    find_substructure_matches, first_substructure_match, has_substructure, same_structure,
    SubstructureMatch,
};
pub use writer::{canonical_smiles, strip_atom_maps, write_smiles};
