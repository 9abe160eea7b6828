//! Molecular graph representation with atom-map classes.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use retrokit_core::hash::ContentHasher;
use retrokit_core::{ContentAddressable, Summarizable};

use crate::element::element_by_number;

/// Tetrahedral chirality at a stereocenter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Chirality {
    /// No chirality specified.
    #[default]
    None,
    /// Counterclockwise (`@` in SMILES).
    CounterClockwise,
    /// Clockwise (`@@` in SMILES).
    Clockwise,
}

/// Cis-trans stereo bond direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BondStereo {
    /// No stereo bond.
    #[default]
    None,
    /// Up bond (`/` in SMILES).
    Up,
    /// Down bond (`\` in SMILES).
    Down,
}

/// Bond order classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BondOrder {
    Single,
    Double,
    Triple,
    Aromatic,
}

impl BondOrder {
    /// Numeric bond order for valence calculations.
    pub fn as_f64(self) -> f64 {
        match self {
            BondOrder::Single => 1.0,
            BondOrder::Double => 2.0,
            BondOrder::Triple => 3.0,
            BondOrder::Aromatic => 1.5,
        }
    }
}

/// An atom in a molecular graph.
///
/// `atomic_number` is 0 for a wildcard (`*`). `alternatives` is non-empty
/// only for query atoms written as a disjunction (`[Cl,Br,I]`); the first
/// alternative is mirrored in `atomic_number`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MolAtom {
    pub atomic_number: u8,
    pub formal_charge: i8,
    pub isotope: Option<u16>,
    pub is_aromatic: bool,
    pub implicit_hydrogens: u8,
    pub chirality: Chirality,
    pub map_id: Option<u32>,
    /// Written inside `[...]` in the source string.
    pub bracketed: bool,
    pub alternatives: Vec<u8>,
}

impl MolAtom {
    /// A plain organic-subset atom.
    pub fn new(atomic_number: u8) -> Self {
        MolAtom { atomic_number, ..Default::default() }
    }

    /// A generic placeholder atom (`*`).
    pub fn wildcard() -> Self {
        MolAtom { atomic_number: 0, ..Default::default() }
    }

    pub fn is_wildcard(&self) -> bool {
        self.atomic_number == 0 && self.alternatives.is_empty()
    }

    pub fn is_query(&self) -> bool {
        !self.alternatives.is_empty()
    }

    /// Element symbol with aromatic atoms in lowercase; `*` for wildcards.
    pub fn symbol(&self) -> String {
        if self.is_wildcard() {
            return "*".to_string();
        }
        match element_by_number(self.atomic_number) {
            Some(elem) if self.is_aromatic => elem.symbol.to_ascii_lowercase(),
            Some(elem) => elem.symbol.to_string(),
            None => "*".to_string(),
        }
    }
}

/// A bond between two atoms.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bond {
    pub atom1: usize,
    pub atom2: usize,
    pub order: BondOrder,
    pub is_aromatic: bool,
    pub stereo: BondStereo,
}

impl Bond {
    pub fn new(atom1: usize, atom2: usize, order: BondOrder) -> Self {
        Bond {
            atom1,
            atom2,
            order,
            is_aromatic: order == BondOrder::Aromatic,
            stereo: BondStereo::None,
        }
    }

    /// The atom on the other side of the bond.
    pub fn other(&self, atom_idx: usize) -> usize {
        if self.atom1 == atom_idx {
            self.atom2
        } else {
            self.atom1
        }
    }
}

/// A molecular graph with atoms, bonds, and adjacency information.
#[derive(Debug, Clone)]
pub struct Molecule {
    pub name: String,
    pub atoms: Vec<MolAtom>,
    pub bonds: Vec<Bond>,
    /// adjacency[atom_idx] = Vec<(neighbor_atom_idx, bond_idx)>
    pub adjacency: Vec<Vec<(usize, usize)>>,
}

impl Molecule {
    /// Create a new molecule, building the adjacency list from atoms and bonds.
    pub fn new(name: String, atoms: Vec<MolAtom>, bonds: Vec<Bond>) -> Self {
        let mut adjacency = vec![Vec::new(); atoms.len()];
        for (bi, bond) in bonds.iter().enumerate() {
            adjacency[bond.atom1].push((bond.atom2, bi));
            adjacency[bond.atom2].push((bond.atom1, bi));
        }
        Molecule { name, atoms, bonds, adjacency }
    }

    /// Number of graph nodes.
    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// Number of bonds.
    pub fn bond_count(&self) -> usize {
        self.bonds.len()
    }

    /// Neighbor atom indices for a given atom.
    pub fn neighbors(&self, atom_idx: usize) -> Vec<usize> {
        self.adjacency[atom_idx].iter().map(|&(n, _)| n).collect()
    }

    /// Graph degree of an atom (number of explicit bonds).
    pub fn degree(&self, atom_idx: usize) -> usize {
        self.adjacency[atom_idx].len()
    }

    /// Find the bond between two atoms, if any.
    pub fn get_bond(&self, a1: usize, a2: usize) -> Option<&Bond> {
        self.adjacency[a1]
            .iter()
            .find(|&&(n, _)| n == a2)
            .map(|&(_, bi)| &self.bonds[bi])
    }

    /// Element symbol of an atom, aromatic atoms in lowercase.
    pub fn symbol(&self, atom_idx: usize) -> String {
        self.atoms[atom_idx].symbol()
    }

    /// All atom-map ids carried by the molecule, in ascending order.
    pub fn map_ids(&self) -> BTreeSet<u32> {
        self.atoms.iter().filter_map(|a| a.map_id).collect()
    }

    /// Atom-map ids that occur on more than one atom.
    pub fn duplicate_map_ids(&self) -> Vec<u32> {
        let mut counts: BTreeMap<u32, usize> = BTreeMap::new();
        for id in self.atoms.iter().filter_map(|a| a.map_id) {
            *counts.entry(id).or_insert(0) += 1;
        }
        counts.into_iter().filter(|&(_, c)| c > 1).map(|(id, _)| id).collect()
    }

    /// Index of the atom carrying `map_id`, if any.
    pub fn atom_with_map(&self, map_id: u32) -> Option<usize> {
        self.atoms.iter().position(|a| a.map_id == Some(map_id))
    }

    /// Connected components as sorted atom index lists, ordered by their
    /// lowest atom index.
    pub fn fragments(&self) -> Vec<Vec<usize>> {
        let n = self.atom_count();
        let mut seen = vec![false; n];
        let mut components = Vec::new();
        for start in 0..n {
            if seen[start] {
                continue;
            }
            let mut component = Vec::new();
            let mut queue = VecDeque::from([start]);
            seen[start] = true;
            while let Some(atom) = queue.pop_front() {
                component.push(atom);
                for &(next, _) in &self.adjacency[atom] {
                    if !seen[next] {
                        seen[next] = true;
                        queue.push_back(next);
                    }
                }
            }
            component.sort_unstable();
            components.push(component);
        }
        components
    }

    /// Induced subgraph over `atom_indices`, keeping their relative order.
    pub fn subgraph(&self, atom_indices: &[usize]) -> Molecule {
        let keep: BTreeSet<usize> = atom_indices.iter().copied().collect();
        let drop: BTreeSet<usize> = (0..self.atom_count()).filter(|i| !keep.contains(i)).collect();
        self.without_atoms(&drop)
    }

    /// Copy of the molecule with the given atoms (and their bonds) removed.
    /// Remaining atoms keep their relative order.
    pub fn without_atoms(&self, removed: &BTreeSet<usize>) -> Molecule {
        let mut new_index = vec![usize::MAX; self.atom_count()];
        let mut atoms = Vec::with_capacity(self.atom_count().saturating_sub(removed.len()));
        for (i, atom) in self.atoms.iter().enumerate() {
            if !removed.contains(&i) {
                new_index[i] = atoms.len();
                atoms.push(atom.clone());
            }
        }
        let bonds = self
            .bonds
            .iter()
            .filter(|b| !removed.contains(&b.atom1) && !removed.contains(&b.atom2))
            .map(|b| Bond {
                atom1: new_index[b.atom1],
                atom2: new_index[b.atom2],
                ..b.clone()
            })
            .collect();
        Molecule::new(self.name.clone(), atoms, bonds)
    }
}

impl Summarizable for Molecule {
    fn summary(&self) -> String {
        format!(
            "{}: {} atoms, {} bonds, {} mapped",
            if self.name.is_empty() { "Molecule" } else { &self.name },
            self.atom_count(),
            self.bond_count(),
            self.map_ids().len()
        )
    }
}

impl ContentAddressable for Molecule {
    fn content_hash(&self) -> String {
        let mut hasher = ContentHasher::new();
        // Atoms sorted by their properties, map ids included
        let mut sorted_atoms: Vec<&MolAtom> = self.atoms.iter().collect();
        sorted_atoms.sort_by_key(|a| {
            (
                a.atomic_number,
                a.formal_charge,
                a.isotope,
                a.is_aromatic,
                a.implicit_hydrogens,
                a.map_id,
            )
        });
        for atom in &sorted_atoms {
            hasher
                .number(u64::from(atom.atomic_number))
                .field(atom.formal_charge.to_le_bytes())
                .number(u64::from(atom.implicit_hydrogens))
                .number(atom.isotope.map_or(0, u64::from))
                .number(u64::from(atom.is_aromatic))
                .number(u64::from(atom.map_id.unwrap_or(0)))
                .field(&atom.alternatives);
        }
        let mut sorted_bonds: Vec<_> = self
            .bonds
            .iter()
            .map(|b| {
                let (a, c) = if b.atom1 <= b.atom2 {
                    (b.atom1, b.atom2)
                } else {
                    (b.atom2, b.atom1)
                };
                (a, c, b.order as u8)
            })
            .collect();
        sorted_bonds.sort_unstable();
        for &(a, c, order) in &sorted_bonds {
            hasher.number(a as u64).number(c as u64).number(u64::from(order));
        }
        hasher.finish()
    }
}
