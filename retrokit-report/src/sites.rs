//! Transformation sites of an atom-mapped reaction.
//!
//! Gives the product atoms a forward reaction touched, in the same
//! `ELEMENT:MAPID` form as a disconnection, so ground truth from mapped
//! reaction data can be compared with predicted disconnections.

use std::collections::BTreeSet;

use retrokit_chem::{element_by_number, parse_smiles, BondOrder, Molecule};
use retrokit_core::{Result, RetroError};

type BondKey = (u32, u32, Option<BondOrder>);

/// Sites of `reactants>>product` (or `reactants>agents>product`).
///
/// With one reactant the sites are product atoms missing from the reactant
/// plus the atoms of every bond that differs between the two. With several
/// reactants they are the atoms of product bonds no reactant contains.
/// `include_bond_order` also counts bonds whose order changed.
///
/// Only the first product fragment is considered. Atoms are returned in
/// product order; an unchanged reaction yields an empty string.
pub fn transformation_sites(reaction_smiles: &str, include_bond_order: bool) -> Result<String> {
    let parts: Vec<&str> = reaction_smiles.trim().split('>').collect();
    let [reactant_side, _agents, product_side] = parts.as_slice() else {
        return Err(RetroError::Parse(format!(
            "reaction '{reaction_smiles}' is not reactants>agents>product"
        )));
    };

    let product_all = parse_smiles(product_side)?;
    let first = product_all
        .fragments()
        .into_iter()
        .next()
        .ok_or_else(|| RetroError::Parse("reaction has no product".into()))?;
    let product = product_all.subgraph(&first);

    let reactants = parse_smiles(reactant_side)?;
    let reactant_count = reactants.fragments().len();
    if reactant_count == 0 {
        return Err(RetroError::Parse("reaction has no reactants".into()));
    }

    let product_maps = product.map_ids();
    let next_free = product_maps
        .iter()
        .chain(reactants.map_ids().iter())
        .max()
        .map_or(1, |m| m + 1);
    let reactant_ids = complete_map_ids(&reactants, next_free);
    let product_ids: Vec<Option<u32>> = product.atoms.iter().map(|a| a.map_id).collect();

    let product_bonds = bond_set(&product, &product_ids, include_bond_order);
    let reactant_bonds = bond_set(&reactants, &reactant_ids, include_bond_order);

    let mut changed: BTreeSet<u32> = BTreeSet::new();
    if reactant_count == 1 {
        let reactant_maps: BTreeSet<u32> = reactant_ids.iter().flatten().copied().collect();
        changed.extend(product_maps.difference(&reactant_maps));
        for (a, b, _) in product_bonds.symmetric_difference(&reactant_bonds) {
            changed.insert(*a);
            changed.insert(*b);
        }
    } else {
        for (a, b, _) in product_bonds.difference(&reactant_bonds) {
            changed.insert(*a);
            changed.insert(*b);
        }
    }

    let sites: Vec<String> = product
        .atoms
        .iter()
        .filter_map(|atom| {
            let map_id = atom.map_id.filter(|m| changed.contains(m))?;
            let symbol = element_by_number(atom.atomic_number).map_or("*", |e| e.symbol);
            Some(format!("{symbol}:{map_id}"))
        })
        .collect();
    Ok(sites.join(" "))
}

/// Map ids per atom, unmapped atoms numbered from `next_free` in index order.
fn complete_map_ids(mol: &Molecule, mut next_free: u32) -> Vec<Option<u32>> {
    mol.atoms
        .iter()
        .map(|atom| {
            Some(atom.map_id.unwrap_or_else(|| {
                next_free += 1;
                next_free - 1
            }))
        })
        .collect()
}

fn bond_set(mol: &Molecule, ids: &[Option<u32>], include_order: bool) -> BTreeSet<BondKey> {
    mol.bonds
        .iter()
        .filter_map(|bond| {
            let a = ids[bond.atom1]?;
            let b = ids[bond.atom2]?;
            let order = include_order.then_some(bond.order);
            Some((a.min(b), a.max(b), order))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const AMIDE_COUPLING: &str =
        "[CH3:1][C:2](=[O:3])O.[NH2:4][c:5]1[cH:6][cH:7][cH:8][cH:9][cH:10]1>>\
         [CH3:1][C:2](=[O:3])[NH:4][c:5]1[cH:6][cH:7][cH:8][cH:9][cH:10]1";

    #[test]
    fn coupling_of_two_reactants() {
        assert_eq!(transformation_sites(AMIDE_COUPLING, false).unwrap(), "C:2 N:4");
    }

    #[test]
    fn agents_are_ignored() {
        let reaction = AMIDE_COUPLING.replace(">>", ">CCN(CC)CC>");
        assert_eq!(transformation_sites(&reaction, false).unwrap(), "C:2 N:4");
    }

    #[test]
    fn single_reactant_counts_lost_substituents() {
        // Boc removal: the N keeps its map but loses a bond to unmapped atoms
        let reaction = "[CH3:1][NH:2]C(=O)OC(C)(C)C>>[CH3:1][NH2:2]";
        assert_eq!(transformation_sites(reaction, false).unwrap(), "N:2");
    }

    #[test]
    fn bond_order_changes_need_the_flag() {
        let reduction = "[CH3:1][C:2](=[O:3])[CH3:4]>>[CH3:1][CH:2]([OH:3])[CH3:4]";
        assert_eq!(transformation_sites(reduction, false).unwrap(), "");
        assert_eq!(transformation_sites(reduction, true).unwrap(), "C:2 O:3");
    }

    #[test]
    fn malformed_reactions() {
        assert!(matches!(transformation_sites("CC>CO", false), Err(RetroError::Parse(_))));
        assert!(transformation_sites("C((>>C", false).is_err());
        assert!(transformation_sites(">>[CH4:1]", false).is_err());
    }
}
