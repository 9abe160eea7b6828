//! The atom-mapped target molecule an analysis is about.

use std::collections::BTreeSet;

use retrokit_chem::{canonical_smiles, parse_smiles_named, Molecule};
use retrokit_core::hash::sha256_parts;
use retrokit_core::{ContentAddressable, Result, RetroError, Summarizable};

use crate::atom_ref::AtomRef;

/// A parsed product structure and the atom-map ids it exposes.
///
/// Map ids are unique within the structure; construction fails otherwise.
#[derive(Debug, Clone)]
pub struct MappedProduct {
    smiles: String,
    molecule: Molecule,
    map_ids: BTreeSet<u32>,
}

impl MappedProduct {
    /// Parse an atom-mapped SMILES string.
    pub fn from_smiles(smiles: &str) -> Result<Self> {
        let molecule = parse_smiles_named(smiles, "product")?;
        let mut product = Self::new(molecule)?;
        product.smiles = smiles.trim().to_string();
        Ok(product)
    }

    /// Wrap an already parsed molecule.
    pub fn new(molecule: Molecule) -> Result<Self> {
        let duplicates = molecule.duplicate_map_ids();
        if !duplicates.is_empty() {
            return Err(RetroError::InvalidInput(format!(
                "product repeats atom-map ids {duplicates:?}"
            )));
        }
        let map_ids = molecule.map_ids();
        if map_ids.is_empty() {
            return Err(RetroError::InvalidInput("product carries no atom-map ids".into()));
        }
        Ok(MappedProduct {
            smiles: canonical_smiles(&molecule),
            molecule,
            map_ids,
        })
    }

    pub fn smiles(&self) -> &str {
        &self.smiles
    }

    pub fn molecule(&self) -> &Molecule {
        &self.molecule
    }

    pub fn map_ids(&self) -> &BTreeSet<u32> {
        &self.map_ids
    }

    pub fn contains(&self, map_id: u32) -> bool {
        self.map_ids.contains(&map_id)
    }

    /// The structure's own reference for `map_id`, symbol case included.
    pub fn atom_ref(&self, map_id: u32) -> Option<AtomRef> {
        let idx = self.molecule.atom_with_map(map_id)?;
        Some(AtomRef::new(self.molecule.symbol(idx), map_id))
    }

    /// Check a reference from oracle text against the structure.
    ///
    /// The map id must exist and the element must agree; symbol case is
    /// taken from the structure, so `C:18` on an aromatic carbon resolves
    /// to `c:18`.
    pub fn resolve(&self, atom: &AtomRef) -> Result<AtomRef> {
        let own = self.atom_ref(atom.map_id).ok_or_else(|| {
            RetroError::Validation(format!("atom-map id {} is not in the product", atom.map_id))
        })?;
        if !own.symbol.eq_ignore_ascii_case(&atom.symbol) {
            return Err(RetroError::Validation(format!(
                "{atom} names a different element than the product atom {own}"
            )));
        }
        Ok(own)
    }
}

impl Summarizable for MappedProduct {
    fn summary(&self) -> String {
        format!(
            "{} ({} atoms, {} mapped)",
            self.smiles,
            self.molecule.atom_count(),
            self.map_ids.len()
        )
    }
}

impl ContentAddressable for MappedProduct {
    fn content_hash(&self) -> String {
        let canonical = canonical_smiles(&self.molecule);
        let ids: Vec<u8> = self.map_ids.iter().flat_map(|id| id.to_le_bytes()).collect();
        sha256_parts([canonical.as_bytes(), ids.as_slice()])
    }
}
