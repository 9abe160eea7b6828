//! Substructure search via VF2 subgraph isomorphism, with query atoms.
//!
//! Pattern atoms may be wildcards (`*`, any atom) or disjunctions
//! (`[Cl,Br,I]`, any listed element). Atom-map classes are ignored, so a
//! mapped template can be matched against an unmapped molecule.

use std::collections::BTreeMap;

use crate::molecule::{BondOrder, Chirality, MolAtom, Molecule};

/// A mapping from pattern atoms to target atoms.
#[derive(Debug, Clone, PartialEq)]
pub struct SubstructureMatch {
    /// Pairs of (pattern_atom_idx, target_atom_idx).
    pub atom_mapping: Vec<(usize, usize)>,
}

impl SubstructureMatch {
    /// Fraction of target atoms covered by the match.
    pub fn coverage(&self, target: &Molecule) -> f64 {
        if target.atom_count() == 0 {
            return 0.0;
        }
        self.atom_mapping.len() as f64 / target.atom_count() as f64
    }
}

/// Check if `target` contains `pattern` as a substructure.
///
/// With `use_chirality`, a chiral pattern atom only matches a target atom of
/// the same handedness.
pub fn has_substructure(target: &Molecule, pattern: &Molecule, use_chirality: bool) -> bool {
    first_substructure_match(target, pattern, use_chirality).is_some()
}

/// The first substructure match of `pattern` in `target`, if any.
pub fn first_substructure_match(
    target: &Molecule,
    pattern: &Molecule,
    use_chirality: bool,
) -> Option<SubstructureMatch> {
    let mut state = Vf2State::new(target, pattern, use_chirality);
    state.search(true);
    state.matches.pop()
}

/// Find all substructure matches of `pattern` in `target`.
pub fn find_substructure_matches(
    target: &Molecule,
    pattern: &Molecule,
    use_chirality: bool,
) -> Vec<SubstructureMatch> {
    let mut state = Vf2State::new(target, pattern, use_chirality);
    state.search(false);
    state.matches
}

/// Whether two molecules have the same graph: identical atom and bond
/// census, and each a substructure of the other.
pub fn same_structure(a: &Molecule, b: &Molecule, use_chirality: bool) -> bool {
    census(a) == census(b)
        && has_substructure(a, b, use_chirality)
        && has_substructure(b, a, use_chirality)
}

type AtomKey = (u8, bool, i8, u8);

fn census(mol: &Molecule) -> (BTreeMap<AtomKey, usize>, BTreeMap<BondOrder, usize>) {
    let mut atoms = BTreeMap::new();
    for a in &mol.atoms {
        *atoms
            .entry((a.atomic_number, a.is_aromatic, a.formal_charge, a.implicit_hydrogens))
            .or_insert(0) += 1;
    }
    let mut bonds = BTreeMap::new();
    for b in &mol.bonds {
        *bonds.entry(b.order).or_insert(0) += 1;
    }
    (atoms, bonds)
}

struct Vf2State<'a> {
    target: &'a Molecule,
    pattern: &'a Molecule,
    use_chirality: bool,
    // core_target[t] = Some(p) means target atom t is mapped to pattern atom p
    core_target: Vec<Option<usize>>,
    // core_pattern[p] = Some(t) means pattern atom p is mapped to target atom t
    core_pattern: Vec<Option<usize>>,
    matches: Vec<SubstructureMatch>,
}

impl<'a> Vf2State<'a> {
    fn new(target: &'a Molecule, pattern: &'a Molecule, use_chirality: bool) -> Self {
        Vf2State {
            target,
            pattern,
            use_chirality,
            core_target: vec![None; target.atom_count()],
            core_pattern: vec![None; pattern.atom_count()],
            matches: Vec::new(),
        }
    }

    fn search(&mut self, early_exit: bool) {
        if self.pattern.atom_count() == 0
            || self.pattern.atom_count() > self.target.atom_count()
            || self.pattern.bond_count() > self.target.bond_count()
            || !self.element_count_compatible()
        {
            return;
        }
        self.match_recursive(0, early_exit);
    }

    /// Concrete pattern elements must all be available in the target.
    fn element_count_compatible(&self) -> bool {
        let mut needed: BTreeMap<u8, usize> = BTreeMap::new();
        for atom in self.pattern.atoms.iter().filter(|a| !a.is_wildcard() && !a.is_query()) {
            *needed.entry(atom.atomic_number).or_insert(0) += 1;
        }
        let mut available: BTreeMap<u8, usize> = BTreeMap::new();
        for atom in &self.target.atoms {
            *available.entry(atom.atomic_number).or_insert(0) += 1;
        }
        needed
            .iter()
            .all(|(z, &n)| available.get(z).copied().unwrap_or(0) >= n)
    }

    fn match_recursive(&mut self, depth: usize, early_exit: bool) {
        if early_exit && !self.matches.is_empty() {
            return;
        }

        if depth == self.pattern.atom_count() {
            let mapping: Vec<(usize, usize)> = self
                .core_pattern
                .iter()
                .enumerate()
                .filter_map(|(p, t)| t.map(|t| (p, t)))
                .collect();
            if !self.use_chirality || self.chirality_consistent() {
                self.matches.push(SubstructureMatch { atom_mapping: mapping });
            }
            return;
        }

        let pattern_atom = depth;
        for target_atom in self.find_candidates(pattern_atom) {
            if self.core_target[target_atom].is_some()
                || !self.is_feasible(pattern_atom, target_atom)
            {
                continue;
            }
            self.core_pattern[pattern_atom] = Some(target_atom);
            self.core_target[target_atom] = Some(pattern_atom);

            self.match_recursive(depth + 1, early_exit);

            self.core_pattern[pattern_atom] = None;
            self.core_target[target_atom] = None;

            if early_exit && !self.matches.is_empty() {
                return;
            }
        }
    }

    fn find_candidates(&self, pattern_atom: usize) -> Vec<usize> {
        // Restrict to neighbors of already-mapped pattern neighbors
        let mut candidates: Option<Vec<usize>> = None;

        for &(p_neighbor, _) in &self.pattern.adjacency[pattern_atom] {
            if let Some(t_mapped) = self.core_pattern[p_neighbor] {
                let t_neighbors: Vec<usize> = self.target.adjacency[t_mapped]
                    .iter()
                    .map(|&(n, _)| n)
                    .filter(|&n| self.core_target[n].is_none())
                    .collect();

                candidates = Some(match candidates {
                    None => t_neighbors,
                    Some(existing) => {
                        existing.into_iter().filter(|n| t_neighbors.contains(n)).collect()
                    }
                });
            }
        }

        candidates.unwrap_or_else(|| {
            (0..self.target.atom_count())
                .filter(|&i| self.core_target[i].is_none())
                .collect()
        })
    }

    fn is_feasible(&self, pattern_atom: usize, target_atom: usize) -> bool {
        if !atom_compatible(&self.pattern.atoms[pattern_atom], &self.target.atoms[target_atom]) {
            return false;
        }

        for &(p_neighbor, p_bond_idx) in &self.pattern.adjacency[pattern_atom] {
            if let Some(t_mapped) = self.core_pattern[p_neighbor] {
                match self.target.get_bond(target_atom, t_mapped) {
                    None => return false,
                    Some(tb) => {
                        if self.pattern.bonds[p_bond_idx].order != tb.order {
                            return false;
                        }
                    }
                }
            }
        }
        true
    }

    /// Every chiral pattern atom maps to a target atom of the same
    /// handedness, judged by the parity of its mapped neighbor order.
    fn chirality_consistent(&self) -> bool {
        for (p, p_atom) in self.pattern.atoms.iter().enumerate() {
            if p_atom.chirality == Chirality::None {
                continue;
            }
            let Some(t) = self.core_pattern[p] else {
                return false;
            };
            let t_atom = &self.target.atoms[t];
            if t_atom.chirality == Chirality::None {
                return false;
            }
            let t_order: Vec<usize> = self.target.adjacency[t].iter().map(|&(n, _)| n).collect();
            let mapped: Vec<usize> = self.pattern.adjacency[p]
                .iter()
                .filter_map(|&(n, _)| self.core_pattern[n])
                .filter_map(|tn| t_order.iter().position(|&x| x == tn))
                .collect();
            if mapped.len() != t_order.len() {
                // Partial neighborhoods carry no comparable parity
                continue;
            }
            let same_tag = p_atom.chirality == t_atom.chirality;
            if same_tag != (permutation_parity(&mapped) == 0) {
                return false;
            }
        }
        true
    }
}

/// Pattern atom `p` can stand for target atom `t`.
fn atom_compatible(p: &MolAtom, t: &MolAtom) -> bool {
    if p.is_wildcard() {
        return true;
    }
    let element_ok = if p.is_query() {
        p.alternatives.contains(&t.atomic_number)
    } else {
        p.atomic_number == t.atomic_number && p.is_aromatic == t.is_aromatic
    };
    element_ok
        && (p.formal_charge == 0 || p.formal_charge == t.formal_charge)
        && (p.implicit_hydrogens == 0 || p.implicit_hydrogens == t.implicit_hydrogens)
}

/// 0 for an even permutation of `0..n`, 1 for an odd one.
fn permutation_parity(perm: &[usize]) -> u8 {
    let mut inversions = 0usize;
    for i in 0..perm.len() {
        for j in i + 1..perm.len() {
            if perm[i] > perm[j] {
                inversions += 1;
            }
        }
    }
    (inversions % 2) as u8
}
