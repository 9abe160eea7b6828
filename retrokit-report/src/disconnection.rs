//! Disconnection sites and their canonical grouping keys.

use std::collections::BTreeSet;
use std::fmt;

use retrokit_core::{Result, RetroError};
use serde::{Deserialize, Serialize};

use crate::atom_ref::{join_atom_refs, parse_atom_refs, AtomRef};

/// How the atoms of a disconnection relate to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectionKind {
    /// Bond cleavage; atom order is irrelevant.
    #[default]
    Cleavage,
    /// Functional group interconversion.
    Interconversion,
    /// Stereocenter manipulation.
    Stereo,
    /// Cycloaddition and other ring-forming steps; atoms follow the ring.
    RingForming,
}

impl DisconnectionKind {
    pub fn is_order_sensitive(self) -> bool {
        self == DisconnectionKind::RingForming
    }
}

/// The minimal product atom set implicated in one retrosynthetic step.
///
/// Atoms are stored in canonical order: sorted by map id for
/// order-insensitive kinds, and for ring-forming sites rotated to start at
/// the smallest map id and walked toward its smaller ring neighbor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Disconnection {
    atoms: Vec<AtomRef>,
    kind: DisconnectionKind,
}

impl Disconnection {
    pub fn new(atoms: Vec<AtomRef>, kind: DisconnectionKind) -> Result<Self> {
        if atoms.is_empty() {
            return Err(RetroError::Validation("disconnection has no atoms".into()));
        }
        let atoms = if kind.is_order_sensitive() {
            canonical_ring_order(atoms)?
        } else {
            let mut atoms = atoms;
            atoms.sort_by_key(|a| a.map_id);
            atoms.dedup_by_key(|a| a.map_id);
            atoms
        };
        Ok(Disconnection { atoms, kind })
    }

    /// Parse a space-separated `ELEMENT:MAPID` list.
    pub fn parse(atom_set: &str, kind: DisconnectionKind) -> Result<Self> {
        let atoms = parse_atom_refs(atom_set).map_err(|e| match e {
            RetroError::Parse(msg) => {
                RetroError::Validation(format!("malformed atom set '{atom_set}': {msg}"))
            }
            other => other,
        })?;
        Self::new(atoms, kind)
    }

    pub fn atoms(&self) -> &[AtomRef] {
        &self.atoms
    }

    pub fn kind(&self) -> DisconnectionKind {
        self.kind
    }

    /// Grouping key: map ids in canonical order.
    pub fn key(&self) -> Vec<u32> {
        self.atoms.iter().map(|a| a.map_id).collect()
    }

    pub fn map_ids(&self) -> BTreeSet<u32> {
        self.atoms.iter().map(|a| a.map_id).collect()
    }
}

impl fmt::Display for Disconnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&join_atom_refs(&self.atoms))
    }
}

/// Rotate a ring traversal to start at its smallest map id and pick the
/// direction whose second atom has the smaller map id.
fn canonical_ring_order(atoms: Vec<AtomRef>) -> Result<Vec<AtomRef>> {
    let unique: BTreeSet<u32> = atoms.iter().map(|a| a.map_id).collect();
    if unique.len() != atoms.len() {
        return Err(RetroError::Validation(format!(
            "ring-forming disconnection '{}' repeats an atom",
            join_atom_refs(&atoms)
        )));
    }
    let n = atoms.len();
    if n < 3 {
        let mut atoms = atoms;
        atoms.sort_by_key(|a| a.map_id);
        return Ok(atoms);
    }
    let start = atoms
        .iter()
        .enumerate()
        .min_by_key(|(_, a)| a.map_id)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let forward = atoms[(start + 1) % n].map_id;
    let backward = atoms[(start + n - 1) % n].map_id;
    let ordered = if forward <= backward {
        (0..n).map(|k| atoms[(start + k) % n].clone()).collect()
    } else {
        (0..n).map(|k| atoms[(start + n - k) % n].clone()).collect()
    };
    Ok(ordered)
}
