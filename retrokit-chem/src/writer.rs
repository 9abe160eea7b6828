//! SMILES generation for mapped molecules and templates.
//!
//! Two traversal orders share one writer:
//!
//! - [`canonical_smiles`] ranks atoms with Morgan-like invariant refinement
//!   (map ids and query alternatives included) so that equal graphs written
//!   in different orders produce the same string.
//! - [`write_smiles`] walks atoms in input order, which keeps generated
//!   templates visually close to the reactants they came from.
//!
//! # Example
//!
//! ```
//! use retrokit_chem::{parse_smiles, canonical_smiles};
//!
//! let mol1 = parse_smiles("OC[CH3:1]").unwrap();
//! let mol2 = parse_smiles("[CH3:1]CO").unwrap();
//! assert_eq!(canonical_smiles(&mol1), canonical_smiles(&mol2));
//! ```

use retrokit_core::Result;

use crate::element::element_by_number;
use crate::molecule::{BondOrder, BondStereo, Chirality, MolAtom, Molecule};
use crate::smiles::parse_smiles;

/// Generate a canonical SMILES string for the given molecule.
pub fn canonical_smiles(mol: &Molecule) -> String {
    let ranks = compute_canonical_ranks(mol);
    write_ranked(mol, &ranks)
}

/// Write the molecule following atom input order.
///
/// Branches and ring closures are placed by the same DFS as the canonical
/// writer, with each atom ranked by its index.
pub fn write_smiles(mol: &Molecule) -> String {
    let ranks: Vec<u64> = (0..mol.atom_count() as u64).collect();
    write_ranked(mol, &ranks)
}

/// Remove atom-map classes from a SMILES string and canonicalize the result.
pub fn strip_atom_maps(smiles: &str) -> Result<String> {
    let mut mol = parse_smiles(smiles)?;
    for atom in &mut mol.atoms {
        atom.map_id = None;
    }
    for idx in 0..mol.atom_count() {
        if mol.atoms[idx].bracketed && hydrogens_are_implicit(&mol, idx) {
            mol.atoms[idx].bracketed = false;
        }
    }
    Ok(canonical_smiles(&mol))
}

/// True when a bracket atom could be written in the organic subset and
/// still parse back with the same hydrogen count.
fn hydrogens_are_implicit(mol: &Molecule, idx: usize) -> bool {
    let atom = &mol.atoms[idx];
    if atom.formal_charge != 0
        || atom.isotope.is_some()
        || atom.chirality != Chirality::None
        || atom.is_query()
        || atom.is_wildcard()
        || !is_organic_subset(atom.atomic_number, atom.is_aromatic)
    {
        return false;
    }
    let Some(valence) = element_by_number(atom.atomic_number).map(|e| e.valence as usize) else {
        return false;
    };
    let (available, used) = if atom.is_aromatic {
        (valence.saturating_sub(1), mol.degree(idx))
    } else {
        let sum: f64 = mol.adjacency[idx].iter().map(|&(_, bi)| mol.bonds[bi].order.as_f64()).sum();
        (valence, sum.round() as usize)
    };
    // Aromatic nH needs its bracket to stay unambiguous
    !(atom.is_aromatic && atom.implicit_hydrogens > 0 && atom.atomic_number != 6)
        && available.saturating_sub(used) == atom.implicit_hydrogens as usize
}

fn write_ranked(mol: &Molecule, ranks: &[u64]) -> String {
    let n = mol.atom_count();
    if n == 0 {
        return String::new();
    }

    let mut visited = vec![false; n];
    let mut result = String::new();
    let ring_closures = precompute_ring_closures(mol, ranks);

    while let Some(start_idx) = (0..n).filter(|&i| !visited[i]).min_by_key(|&i| ranks[i]) {
        if !result.is_empty() {
            result.push('.');
        }
        dfs_smiles(mol, start_idx, None, ranks, &mut visited, &mut result, &ring_closures);
    }

    result
}

/// Ring digits to write at each atom.
struct RingClosureInfo {
    /// For each atom: (ring_number, bond_idx, is_opening)
    atom_closures: Vec<Vec<(usize, usize, bool)>>,
    /// Bonds written as ring closures rather than tree edges.
    ring_bond: Vec<bool>,
}

/// Assign ring closure digits by running the writer's DFS once and
/// collecting back-edges. Digits are reused once their ring has closed.
fn precompute_ring_closures(mol: &Molecule, ranks: &[u64]) -> RingClosureInfo {
    let n = mol.atom_count();
    let mut visited = vec![false; n];
    let mut preorder = Vec::with_capacity(n);
    let mut back_edges = Vec::new();
    let mut ring_bond = vec![false; mol.bond_count()];

    while let Some(component_start) = (0..n).filter(|&i| !visited[i]).min_by_key(|&i| ranks[i]) {
        precompute_dfs(
            mol,
            component_start,
            None,
            ranks,
            &mut visited,
            &mut preorder,
            &mut back_edges,
            &mut ring_bond,
        );
    }

    let mut position = vec![0usize; n];
    for (pos, &atom) in preorder.iter().enumerate() {
        position[atom] = pos;
    }

    // (opener, closer, bond) with the opener written first
    let mut rings: Vec<(usize, usize, usize)> = back_edges
        .into_iter()
        .map(|(a, b, bi)| if position[a] < position[b] { (a, b, bi) } else { (b, a, bi) })
        .collect();
    rings.sort_by_key(|&(opener, closer, _)| (position[opener], position[closer]));

    let mut atom_closures = vec![Vec::new(); n];
    let mut digit_of_bond = vec![0usize; mol.bond_count()];
    let mut in_use: Vec<usize> = Vec::new();
    for &atom in &preorder {
        let mut closing: Vec<usize> = Vec::new();
        for &(_, _, bi) in rings.iter().filter(|&&(_, closer, _)| closer == atom) {
            closing.push(digit_of_bond[bi]);
            atom_closures[atom].push((digit_of_bond[bi], bi, false));
        }
        for &(_, _, bi) in rings.iter().filter(|&&(opener, _, _)| opener == atom) {
            let digit = (1..).find(|d| !in_use.contains(d)).unwrap_or(1);
            in_use.push(digit);
            digit_of_bond[bi] = digit;
            atom_closures[atom].push((digit, bi, true));
        }
        in_use.retain(|d| !closing.contains(d));
    }

    RingClosureInfo { atom_closures, ring_bond }
}

#[allow(clippy::too_many_arguments)]
fn precompute_dfs(
    mol: &Molecule,
    atom_idx: usize,
    from_atom: Option<usize>,
    ranks: &[u64],
    visited: &mut Vec<bool>,
    preorder: &mut Vec<usize>,
    back_edges: &mut Vec<(usize, usize, usize)>,
    ring_bond: &mut Vec<bool>,
) {
    visited[atom_idx] = true;
    preorder.push(atom_idx);

    for (n, bi) in sorted_neighbors(mol, atom_idx, from_atom, ranks) {
        if visited[n] {
            if !ring_bond[bi] {
                ring_bond[bi] = true;
                back_edges.push((n, atom_idx, bi));
            }
        } else {
            precompute_dfs(mol, n, Some(atom_idx), ranks, visited, preorder, back_edges, ring_bond);
        }
    }
}

fn sorted_neighbors(
    mol: &Molecule,
    atom_idx: usize,
    from_atom: Option<usize>,
    ranks: &[u64],
) -> Vec<(usize, usize)> {
    let mut neighbors: Vec<(usize, usize)> = mol.adjacency[atom_idx]
        .iter()
        .copied()
        .filter(|&(n, _)| Some(n) != from_atom)
        .collect();
    neighbors.sort_by_key(|&(n, _)| ranks[n]);
    neighbors
}

/// Compute canonical atom ranks using a Morgan-like refinement.
fn compute_canonical_ranks(mol: &Molecule) -> Vec<u64> {
    let n = mol.atom_count();

    let mut invariants: Vec<u64> = (0..n)
        .map(|i| {
            let atom = &mol.atoms[i];
            let degree = mol.degree(i) as u64;
            let h_count = atom.implicit_hydrogens as u64;
            let charge = (atom.formal_charge as i64 + 128) as u64;
            let mass = atom.isotope.unwrap_or(0) as u64 & 0xff;
            let aromatic = atom.is_aromatic as u64;
            let base = (atom.atomic_number as u64) << 40
                | degree << 32
                | h_count << 24
                | charge << 16
                | mass << 8
                | aromatic;
            // Map ids and query alternatives distinguish otherwise equal atoms
            let mut inv = base.wrapping_mul(1000003).wrapping_add(atom.map_id.unwrap_or(0) as u64);
            for &alt in &atom.alternatives {
                inv = inv.wrapping_mul(257).wrapping_add(alt as u64);
            }
            inv
        })
        .collect();

    let mut prev_distinct = count_distinct(&invariants);

    for _ in 0..n {
        let new_invariants: Vec<u64> = (0..n)
            .map(|i| {
                let mut combined = invariants[i].wrapping_mul(1000003);
                let mut neighbor_invs: Vec<u64> = mol.adjacency[i]
                    .iter()
                    .map(|&(neighbor, bond_idx)| {
                        let bond_val = mol.bonds[bond_idx].order as u64;
                        invariants[neighbor].wrapping_mul(31).wrapping_add(bond_val)
                    })
                    .collect();
                neighbor_invs.sort_unstable();
                for nv in &neighbor_invs {
                    combined = combined.wrapping_mul(1000003).wrapping_add(*nv);
                }
                combined
            })
            .collect();

        let new_distinct = count_distinct(&new_invariants);
        invariants = new_invariants;

        if new_distinct <= prev_distinct {
            break;
        }
        prev_distinct = new_distinct;
    }

    let mut indexed: Vec<(u64, usize)> =
        invariants.iter().copied().enumerate().map(|(i, v)| (v, i)).collect();
    indexed.sort_unstable();

    let mut ranks = vec![0u64; n];
    let mut rank = 0u64;
    for i in 0..indexed.len() {
        if i > 0 && indexed[i].0 != indexed[i - 1].0 {
            rank += 1;
        }
        ranks[indexed[i].1] = rank;
    }
    ranks
}

fn count_distinct(values: &[u64]) -> usize {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.len()
}

fn dfs_smiles(
    mol: &Molecule,
    atom_idx: usize,
    from_atom: Option<usize>,
    ranks: &[u64],
    visited: &mut Vec<bool>,
    output: &mut String,
    ring_info: &RingClosureInfo,
) {
    visited[atom_idx] = true;

    write_atom(&mol.atoms[atom_idx], output);

    for &(ring_num, bi, is_opening) in &ring_info.atom_closures[atom_idx] {
        // Bond symbol goes on the opening digit only
        if is_opening {
            write_bond_symbol(mol, bi, atom_idx, output);
        }
        write_ring_number(ring_num, output);
    }

    let neighbors: Vec<(usize, usize)> = sorted_neighbors(mol, atom_idx, from_atom, ranks)
        .into_iter()
        .filter(|&(_, bi)| !ring_info.ring_bond[bi])
        .collect();

    // Earlier branches may visit atoms that were unvisited when the list was built
    for i in 0..neighbors.len() {
        let (n, bi) = neighbors[i];
        if visited[n] {
            continue;
        }

        let has_more = neighbors[i + 1..].iter().any(|&(m, _)| !visited[m]);

        if has_more {
            output.push('(');
            write_bond_symbol(mol, bi, atom_idx, output);
            dfs_smiles(mol, n, Some(atom_idx), ranks, visited, output, ring_info);
            output.push(')');
        } else {
            write_bond_symbol(mol, bi, atom_idx, output);
            dfs_smiles(mol, n, Some(atom_idx), ranks, visited, output, ring_info);
        }
    }
}

fn write_ring_number(num: usize, output: &mut String) {
    if num < 10 {
        output.push((b'0' + num as u8) as char);
    } else {
        output.push('%');
        output.push_str(&num.to_string());
    }
}

/// Write the symbol for bond `bond_idx` as seen when leaving `from_atom`.
fn write_bond_symbol(mol: &Molecule, bond_idx: usize, from_atom: usize, output: &mut String) {
    let bond = &mol.bonds[bond_idx];
    let other = bond.other(from_atom);
    let both_aromatic = mol.atoms[from_atom].is_aromatic && mol.atoms[other].is_aromatic;
    match bond.order {
        BondOrder::Single => {
            let forward = bond.atom1 == from_atom;
            match (bond.stereo, forward) {
                (BondStereo::Up, true) | (BondStereo::Down, false) => output.push('/'),
                (BondStereo::Down, true) | (BondStereo::Up, false) => output.push('\\'),
                // A plain single bond between aromatic atoms must be explicit
                (BondStereo::None, _) if both_aromatic => output.push('-'),
                (BondStereo::None, _) => {}
            }
        }
        BondOrder::Double => output.push('='),
        BondOrder::Triple => output.push('#'),
        BondOrder::Aromatic => {
            if !both_aromatic {
                output.push(':');
            }
        }
    }
}

fn write_element(atomic_number: u8, is_aromatic: bool, output: &mut String) {
    match element_by_number(atomic_number) {
        Some(elem) if is_aromatic => output.push_str(&elem.symbol.to_ascii_lowercase()),
        Some(elem) => output.push_str(elem.symbol),
        None => output.push('*'),
    }
}

fn write_atom(atom: &MolAtom, output: &mut String) {
    if !needs_bracket(atom) {
        if atom.is_wildcard() {
            output.push('*');
        } else {
            write_element(atom.atomic_number, atom.is_aromatic, output);
        }
        return;
    }

    output.push('[');
    if let Some(iso) = atom.isotope {
        output.push_str(&iso.to_string());
    }
    if atom.is_query() {
        for (i, &alt) in atom.alternatives.iter().enumerate() {
            if i > 0 {
                output.push(',');
            }
            write_element(alt, atom.is_aromatic, output);
        }
    } else if atom.is_wildcard() {
        output.push('*');
    } else {
        write_element(atom.atomic_number, atom.is_aromatic, output);
    }
    match atom.chirality {
        Chirality::None => {}
        Chirality::CounterClockwise => output.push('@'),
        Chirality::Clockwise => output.push_str("@@"),
    }
    if atom.implicit_hydrogens > 0 {
        output.push('H');
        if atom.implicit_hydrogens > 1 {
            output.push_str(&atom.implicit_hydrogens.to_string());
        }
    }
    if atom.formal_charge > 0 {
        output.push('+');
        if atom.formal_charge > 1 {
            output.push_str(&atom.formal_charge.to_string());
        }
    } else if atom.formal_charge < 0 {
        output.push('-');
        if atom.formal_charge < -1 {
            output.push_str(&atom.formal_charge.abs().to_string());
        }
    }
    if let Some(map) = atom.map_id {
        output.push(':');
        output.push_str(&map.to_string());
    }
    output.push(']');
}

/// Atoms that were bracketed in the input stay bracketed so their explicit
/// hydrogen count survives a round trip.
fn needs_bracket(atom: &MolAtom) -> bool {
    if atom.is_wildcard() {
        return atom.map_id.is_some() || atom.isotope.is_some() || atom.formal_charge != 0;
    }
    atom.bracketed
        || atom.is_query()
        || atom.map_id.is_some()
        || atom.formal_charge != 0
        || atom.isotope.is_some()
        || atom.chirality != Chirality::None
        || !is_organic_subset(atom.atomic_number, atom.is_aromatic)
}

/// Check if an atom can be written in the organic subset (no brackets).
fn is_organic_subset(atomic_number: u8, is_aromatic: bool) -> bool {
    if is_aromatic {
        matches!(atomic_number, 5 | 6 | 7 | 8 | 15 | 16)
    } else {
        matches!(atomic_number, 5 | 6 | 7 | 8 | 15 | 16 | 9 | 17 | 35 | 53)
    }
}
