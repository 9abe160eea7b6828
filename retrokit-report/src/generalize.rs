//! Template generalization.
//!
//! Validated reactant sets proposed for one reaction are decomposed into a
//! mapped skeleton plus the unmapped substituents hanging off single mapped
//! atoms. Sets that share a skeleton and attachment layout form a family;
//! the substituents that differ inside a family decide its class:
//!
//! - every varying substituent is one atom of the same element group: the
//!   atom becomes a disjunction such as `[Cl,Br,I]`
//!   ([`TemplateClass::DefinedChemicalClass`]);
//! - every varying substituent spans several atoms: it is cut off and a
//!   single `*` is bonded to the attachment atom
//!   ([`TemplateClass::WildcardAdditionClass`]).
//!
//! Anything else has no consistent alignment and yields no template.

use std::collections::{BTreeMap, BTreeSet};

use retrokit_chem::{
    canonical_smiles, element_by_number, parse_smiles, write_smiles, Bond, BondOrder, ElementGroup,
    MolAtom, Molecule,
};
use retrokit_core::RetroError;
use serde::Serialize;
use tracing::debug;

use crate::config::PipelineConfig;
use crate::diagnostics::{Diagnostics, Stage};
use crate::normalize::ReactionPair;
use crate::schema::ReactantPermutation;

pub const DEFINED_CLASS_TAG: &str = "[DEFINED CHEMICAL CLASS]";
pub const WILDCARD_CLASS_TAG: &str = "[WILDCARD ADDITION CLASS]";

/// Inferred class of a generated template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum TemplateClass {
    /// Disjunctive pattern covering every observed single-atom variant.
    DefinedChemicalClass { pattern: String },
    /// Invariant skeleton with a `*` at each varying attachment point.
    WildcardAdditionClass { skeleton: String },
}

impl TemplateClass {
    pub fn tag(&self) -> &'static str {
        match self {
            TemplateClass::DefinedChemicalClass { .. } => DEFINED_CLASS_TAG,
            TemplateClass::WildcardAdditionClass { .. } => WILDCARD_CLASS_TAG,
        }
    }
}

/// A generated reactant set standing in for a family of specific ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateEntry {
    pub class: TemplateClass,
    pub reactants: Vec<String>,
    /// Permutation indices of the distinct family members summarized.
    pub members: Vec<usize>,
    /// Map ids of the mapped atoms where the family varies.
    pub attachment_map_ids: Vec<u32>,
    pub rationale: String,
}

impl TemplateEntry {
    pub fn to_permutation(&self) -> ReactantPermutation {
        ReactantPermutation {
            reactants: self.reactants.clone(),
            is_valid: true,
            is_template: true,
            reasoning: self.rationale.clone(),
        }
    }
}

/// Generalize with the default family size of two.
pub fn generalize(pair: &ReactionPair) -> Option<TemplateEntry> {
    generalize_with(pair, 2)
}

/// Build at most one template from the pair's validated reactant sets.
///
/// Returns `None` when fewer than `min_members` structurally distinct
/// members exist or no family classifies cleanly.
pub fn generalize_with(pair: &ReactionPair, min_members: usize) -> Option<TemplateEntry> {
    let mut members: Vec<Member> = Vec::new();
    for (index, permutation) in pair.permutations.iter().enumerate() {
        if !permutation.is_valid || permutation.is_template {
            continue;
        }
        let Some(member) = Member::parse(index, &permutation.reactants) else {
            debug!(reaction = %pair.name, index, "reactant set skipped by generalization");
            continue;
        };
        if !members.iter().any(|m| m.canonical == member.canonical) {
            members.push(member);
        }
    }
    if members.len() < min_members.max(2) {
        return None;
    }

    let mut families: Vec<(Vec<(String, Vec<u32>)>, Vec<&Member>)> = Vec::new();
    for member in &members {
        let shape = member.shape();
        match families.iter_mut().find(|(s, _)| *s == shape) {
            Some((_, family)) => family.push(member),
            None => families.push((shape, vec![member])),
        }
    }

    let mut best: Option<TemplateEntry> = None;
    for (_, family) in &families {
        if family.len() < min_members.max(2) {
            continue;
        }
        let Some(entry) = classify(family) else {
            debug!(
                reaction = %pair.name,
                size = family.len(),
                "family has no consistent alignment"
            );
            continue;
        };
        if best.as_ref().map_or(true, |b| entry.members.len() > b.members.len()) {
            best = Some(entry);
        }
    }

    if let Some(entry) = &best {
        debug!(
            reaction = %pair.name,
            tag = entry.class.tag(),
            members = entry.members.len(),
            "template generated"
        );
    }
    best
}

/// Replace oracle-authored templates with generated ones.
///
/// Oracle templates are always removed; a generated template is attached
/// only when `config.generalize` is set.
pub fn attach_templates(pairs: &mut [ReactionPair], config: &PipelineConfig) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();
    for pair in pairs.iter_mut() {
        let (templates, kept): (Vec<_>, Vec<_>) =
            pair.permutations.drain(..).partition(|p| p.is_template);
        pair.permutations = kept;
        for template in templates {
            let error = RetroError::Validation(format!(
                "oracle template for '{}' discarded; templates are generated",
                pair.name
            ));
            diagnostics.record(
                Stage::Generalize,
                Some(pair.discovery_order),
                template.reactants.join("."),
                &error,
            );
        }
        pair.template = if config.generalize {
            generalize_with(pair, config.min_template_members)
        } else {
            None
        };
    }
    diagnostics
}

/// Unmapped atoms attached to exactly one mapped atom.
#[derive(Debug)]
struct Substituent {
    attachment: usize,
    atoms: BTreeSet<usize>,
    /// Canonical text with the attachment atom written as `*`.
    text: String,
    /// Element of a plain single-atom substituent.
    element: Option<u8>,
}

#[derive(Debug)]
struct Fragment {
    reactant: usize,
    skeleton: String,
    substituents: BTreeMap<u32, Substituent>,
    order: (u8, u32, String),
}

#[derive(Debug)]
struct Member {
    index: usize,
    reactants: Vec<String>,
    molecules: Vec<Molecule>,
    fragments: Vec<Fragment>,
    canonical: String,
}

impl Member {
    fn parse(index: usize, reactants: &[String]) -> Option<Member> {
        if reactants.is_empty() {
            return None;
        }
        let molecules = reactants
            .iter()
            .map(|s| parse_smiles(s))
            .collect::<Result<Vec<_>, _>>()
            .ok()?;

        let mut canonical: Vec<String> = molecules.iter().map(canonical_smiles).collect();
        canonical.sort();

        let mut fragments: Vec<Fragment> = molecules
            .iter()
            .enumerate()
            .flat_map(|(r, mol)| {
                mol.fragments()
                    .into_iter()
                    .map(move |atoms| decompose(mol, r, &atoms))
            })
            .collect();
        fragments.sort_by(|a, b| a.order.cmp(&b.order));

        Some(Member {
            index,
            reactants: reactants.iter().map(|s| s.trim().to_string()).collect(),
            molecules,
            fragments,
            canonical: canonical.join("."),
        })
    }

    /// Skeleton text and attachment map ids per fragment.
    fn shape(&self) -> Vec<(String, Vec<u32>)> {
        self.fragments
            .iter()
            .map(|f| (f.skeleton.clone(), f.substituents.keys().copied().collect()))
            .collect()
    }

    fn substituent(&self, fragment: usize, map_id: u32) -> Option<&Substituent> {
        self.fragments.get(fragment)?.substituents.get(&map_id)
    }
}

fn decompose(mol: &Molecule, reactant: usize, atoms: &[usize]) -> Fragment {
    let mapped: BTreeSet<usize> =
        atoms.iter().copied().filter(|&i| mol.atoms[i].map_id.is_some()).collect();
    if mapped.is_empty() {
        let whole = canonical_smiles(&mol.subgraph(atoms));
        return Fragment {
            reactant,
            skeleton: whole.clone(),
            substituents: BTreeMap::new(),
            order: (1, 0, whole),
        };
    }

    let mut skeleton_atoms = mapped.clone();
    let mut by_attachment: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
    let mut seen: BTreeSet<usize> = BTreeSet::new();
    for &start in atoms {
        if mapped.contains(&start) || !seen.insert(start) {
            continue;
        }
        let mut component = BTreeSet::new();
        let mut attachments = BTreeSet::new();
        let mut stack = vec![start];
        while let Some(atom) = stack.pop() {
            component.insert(atom);
            for &(next, _) in &mol.adjacency[atom] {
                if mapped.contains(&next) {
                    attachments.insert(next);
                } else if seen.insert(next) {
                    stack.push(next);
                }
            }
        }
        match attachments.iter().next() {
            Some(&attachment) if attachments.len() == 1 => {
                by_attachment.entry(attachment).or_default().extend(component);
            }
            // Bridges between mapped atoms belong to the skeleton
            _ => skeleton_atoms.extend(component),
        }
    }

    let mut substituents = BTreeMap::new();
    for (attachment, sub_atoms) in by_attachment {
        let Some(map_id) = mol.atoms[attachment].map_id else { continue };
        substituents.insert(
            map_id,
            Substituent {
                attachment,
                text: substituent_text(mol, attachment, &sub_atoms),
                element: single_element(mol, &sub_atoms),
                atoms: sub_atoms,
            },
        );
    }

    let skeleton_list: Vec<usize> = skeleton_atoms.into_iter().collect();
    let min_map = mapped.iter().filter_map(|&i| mol.atoms[i].map_id).min().unwrap_or(0);
    Fragment {
        reactant,
        skeleton: canonical_smiles(&mol.subgraph(&skeleton_list)),
        substituents,
        order: (0, min_map, String::new()),
    }
}

fn substituent_text(mol: &Molecule, attachment: usize, atoms: &BTreeSet<usize>) -> String {
    let mut indices: Vec<usize> = atoms.iter().copied().collect();
    indices.push(attachment);
    indices.sort_unstable();
    let mut sub = mol.subgraph(&indices);
    if let Some(pos) = indices.iter().position(|&i| i == attachment) {
        sub.atoms[pos] = MolAtom::wildcard();
    }
    canonical_smiles(&sub)
}

fn single_element(mol: &Molecule, atoms: &BTreeSet<usize>) -> Option<u8> {
    if atoms.len() != 1 {
        return None;
    }
    let atom = &mol.atoms[*atoms.iter().next()?];
    let plain = !atom.is_aromatic
        && atom.formal_charge == 0
        && !atom.is_wildcard()
        && !atom.is_query();
    plain.then_some(atom.atomic_number)
}

enum Variation {
    /// Observed elements, in member order.
    SingleAtom(Vec<u8>),
    MultiAtom,
}

fn classify(family: &[&Member]) -> Option<TemplateEntry> {
    let rep = family.first()?;

    let mut varying: Vec<(usize, u32, Variation)> = Vec::new();
    for (fi, fragment) in rep.fragments.iter().enumerate() {
        for (&map_id, reference) in &fragment.substituents {
            let observed: Vec<&Substituent> =
                family.iter().map(|m| m.substituent(fi, map_id)).collect::<Option<Vec<_>>>()?;
            if observed.iter().all(|s| s.text == reference.text) {
                continue;
            }
            let variation = if observed.iter().any(|s| s.atoms.len() > 1) {
                Variation::MultiAtom
            } else {
                let elements = observed.iter().map(|s| s.element).collect::<Option<Vec<_>>>()?;
                Variation::SingleAtom(elements)
            };
            varying.push((fi, map_id, variation));
        }
    }
    if varying.is_empty() {
        return None;
    }

    let members: Vec<usize> = family.iter().map(|m| m.index).collect();
    let attachment_map_ids: Vec<u32> = varying.iter().map(|&(_, m, _)| m).collect();
    let maps_text = attachment_map_ids.iter().map(u32::to_string).collect::<Vec<_>>().join(", ");

    if varying.iter().all(|(_, _, v)| matches!(v, Variation::MultiAtom)) {
        let mut replacements: BTreeMap<usize, Vec<(usize, BTreeSet<usize>)>> = BTreeMap::new();
        for &(fi, map_id, _) in &varying {
            let sub = rep.substituent(fi, map_id)?;
            replacements
                .entry(rep.fragments[fi].reactant)
                .or_default()
                .push((sub.attachment, sub.atoms.clone()));
        }
        let reactants = rewrite_reactants(rep, |r, mol| {
            replacements.get(&r).map(|subs| replace_substituents(mol, subs))
        });
        let skeleton = reactants.join(".");
        let rationale = format!(
            "{WILDCARD_CLASS_TAG} Variable substituent at atom map {maps_text} replaced by a \
             generic attachment point; invariant skeleton shared by {} validated reactant sets.",
            members.len()
        );
        return Some(TemplateEntry {
            class: TemplateClass::WildcardAdditionClass { skeleton },
            reactants,
            members,
            attachment_map_ids,
            rationale,
        });
    }

    // Single-atom variation everywhere, all in one element group
    let mut group: Option<ElementGroup> = None;
    let mut edits: BTreeMap<usize, Vec<(usize, Vec<u8>)>> = BTreeMap::new();
    let mut observed_symbols: BTreeSet<(u8, &'static str)> = BTreeSet::new();
    for (fi, map_id, variation) in &varying {
        let Variation::SingleAtom(elements) = variation else { return None };
        let mut alternatives = elements.clone();
        alternatives.sort_unstable();
        alternatives.dedup();
        if alternatives.len() < 2 {
            return None;
        }
        for &z in &alternatives {
            let element = element_by_number(z)?;
            if *group.get_or_insert(element.group) != element.group {
                return None;
            }
            observed_symbols.insert((z, element.symbol));
        }
        let sub = rep.substituent(*fi, *map_id)?;
        let atom = *sub.atoms.iter().next()?;
        edits.entry(rep.fragments[*fi].reactant).or_default().push((atom, alternatives));
    }
    let group = group?;

    let reactants = rewrite_reactants(rep, |r, mol| {
        let atom_edits = edits.get(&r)?;
        let mut mol = mol.clone();
        for (atom, alternatives) in atom_edits {
            let target = &mut mol.atoms[*atom];
            target.atomic_number = alternatives[0];
            target.alternatives = alternatives.clone();
            target.bracketed = true;
        }
        Some(mol)
    });
    let pattern = reactants.join(".");
    let symbols = observed_symbols.iter().map(|&(_, s)| s).collect::<Vec<_>>().join(", ");
    let rationale = format!(
        "{DEFINED_CLASS_TAG} Single-atom {} substituent at atom map {maps_text} ({symbols}) \
         merged across {} validated reactant sets.",
        group.label(),
        members.len()
    );
    Some(TemplateEntry {
        class: TemplateClass::DefinedChemicalClass { pattern },
        reactants,
        members,
        attachment_map_ids,
        rationale,
    })
}

/// Reactant strings of `rep`, with edited molecules rewritten in input order.
fn rewrite_reactants<F>(rep: &Member, mut edit: F) -> Vec<String>
where
    F: FnMut(usize, &Molecule) -> Option<Molecule>,
{
    rep.molecules
        .iter()
        .enumerate()
        .map(|(r, mol)| match edit(r, mol) {
            Some(edited) => write_smiles(&edited),
            None => rep.reactants[r].clone(),
        })
        .collect()
}

/// Swap each substituent for one `*` bonded to its attachment atom.
///
/// The placeholder takes the index of the substituent's first atom so the
/// written template keeps the reactant's atom order.
fn replace_substituents(mol: &Molecule, replacements: &[(usize, BTreeSet<usize>)]) -> Molecule {
    let removed: BTreeSet<usize> =
        replacements.iter().flat_map(|(_, atoms)| atoms.iter().copied()).collect();
    let mut placeholder_for: BTreeMap<usize, (usize, BondOrder)> = BTreeMap::new();
    for (attachment, atoms) in replacements {
        let Some(&first) = atoms.iter().next() else { continue };
        let order = mol.adjacency[*attachment]
            .iter()
            .find(|(n, _)| atoms.contains(n))
            .map(|&(_, bi)| mol.bonds[bi].order)
            .filter(|&o| o != BondOrder::Aromatic)
            .unwrap_or(BondOrder::Single);
        placeholder_for.insert(first, (*attachment, order));
    }

    let mut new_index: Vec<Option<usize>> = vec![None; mol.atom_count()];
    let mut atoms = Vec::with_capacity(mol.atom_count());
    let mut placeholders = Vec::new();
    for (i, atom) in mol.atoms.iter().enumerate() {
        if let Some(&(attachment, order)) = placeholder_for.get(&i) {
            placeholders.push((atoms.len(), attachment, order));
            atoms.push(MolAtom::wildcard());
        } else if !removed.contains(&i) {
            new_index[i] = Some(atoms.len());
            atoms.push(atom.clone());
        }
    }

    let mut bonds: Vec<Bond> = mol
        .bonds
        .iter()
        .filter_map(|b| {
            Some(Bond {
                atom1: new_index[b.atom1]?,
                atom2: new_index[b.atom2]?,
                ..b.clone()
            })
        })
        .collect();
    for (wildcard, attachment, order) in placeholders {
        if let Some(a) = new_index[attachment] {
            bonds.push(Bond::new(a, wildcard, order));
        }
    }
    Molecule::new(mol.name.clone(), atoms, bonds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disconnection::{Disconnection, DisconnectionKind};
    use crate::ontology::ReactionClass;
    use retrokit_chem::parse_template;

    const ANILINE: &str = "[NH2:14][c:18]1[cH:19][cH:20][cH:21][cH:22][cH:23]1";

    fn set(reactants: &[&str], is_valid: bool) -> ReactantPermutation {
        ReactantPermutation {
            reactants: reactants.iter().map(|s| s.to_string()).collect(),
            is_valid,
            is_template: false,
            reasoning: String::new(),
        }
    }

    fn pair(permutations: Vec<ReactantPermutation>) -> ReactionPair {
        ReactionPair {
            disconnection: Disconnection::parse("C:12 N:14", DisconnectionKind::Cleavage).unwrap(),
            name: "Amide Schotten-Baumann".into(),
            is_in_ontology: true,
            class: ReactionClass::Acylation,
            importance: 4,
            rationale: "amide bond".into(),
            discovery_order: 1,
            sequence: 0,
            permutations,
            template: None,
        }
    }

    fn acyl_halide(halogen: &str) -> String {
        format!("[CH3:10][C:12](=[O:13]){halogen}")
    }

    #[test]
    fn halogen_family_gives_disjunction() {
        let p = pair(vec![
            set(&[&acyl_halide("Cl"), ANILINE], true),
            set(&[&acyl_halide("Br"), ANILINE], true),
            set(&[ANILINE, &acyl_halide("I")], true),
        ]);
        let entry = generalize(&p).unwrap();
        assert_eq!(entry.class.tag(), DEFINED_CLASS_TAG);
        assert_eq!(
            entry.reactants,
            vec!["[CH3:10][C:12](=[O:13])[Cl,Br,I]".to_string(), ANILINE.to_string()]
        );
        assert_eq!(entry.members, vec![0, 1, 2]);
        assert_eq!(entry.attachment_map_ids, vec![12]);
        assert!(entry.rationale.starts_with("[DEFINED CHEMICAL CLASS]"));
        assert!(entry.rationale.contains("halogen"));

        let permutation = entry.to_permutation();
        assert!(permutation.is_template && permutation.is_valid);
        let parsed = parse_template(&permutation.reactants[0]).unwrap();
        assert_eq!(parsed.map_ids().into_iter().collect::<Vec<_>>(), vec![10, 12, 13]);
    }

    #[test]
    fn protecting_groups_give_wildcard() {
        let boc = "[CH3:10][C:12](=[O:13])[N:14](C(=O)OC(C)(C)C)\
                   [c:18]1[cH:19][cH:20][cH:21][cH:22][cH:23]1";
        let cbz = "[CH3:10][C:12](=[O:13])[N:14](C(=O)OCc2ccccc2)\
                   [c:18]1[cH:19][cH:20][cH:21][cH:22][cH:23]1";
        let entry = generalize(&pair(vec![set(&[boc], true), set(&[cbz], true)])).unwrap();
        assert_eq!(entry.class.tag(), WILDCARD_CLASS_TAG);
        assert_eq!(
            entry.reactants,
            vec!["[CH3:10][C:12](=[O:13])[N:14](*)[c:18]1[cH:19][cH:20][cH:21][cH:22][cH:23]1"
                .to_string()]
        );
        let parsed = parse_template(&entry.reactants[0]).unwrap();
        assert_eq!(parsed.atoms.iter().filter(|a| a.is_wildcard()).count(), 1);
        assert_eq!(parsed.map_ids(), parse_smiles(boc).unwrap().map_ids());
        assert!(entry.rationale.starts_with("[WILDCARD ADDITION CLASS]"));
    }

    #[test]
    fn single_or_duplicate_members_give_nothing() {
        assert!(generalize(&pair(vec![set(&[&acyl_halide("Cl"), ANILINE], true)])).is_none());
        let p = pair(vec![
            set(&[&acyl_halide("Cl"), ANILINE], true),
            set(&[ANILINE, "Cl[C:12](=[O:13])[CH3:10]"], true),
        ]);
        assert!(generalize(&p).is_none());
    }

    #[test]
    fn invalid_members_do_not_count() {
        let p = pair(vec![
            set(&[&acyl_halide("Cl"), ANILINE], true),
            set(&[&acyl_halide("Br"), ANILINE], false),
        ]);
        assert!(generalize(&p).is_none());
    }

    #[test]
    fn inconsistent_variation_gives_nothing() {
        // Halide at one position, protecting group at another
        let boc_aniline = "[NH:14](C(=O)OC(C)(C)C)[c:18]1[cH:19][cH:20][cH:21][cH:22][cH:23]1";
        let cbz_aniline = "[NH:14](C(=O)OCc2ccccc2)[c:18]1[cH:19][cH:20][cH:21][cH:22][cH:23]1";
        let p = pair(vec![
            set(&[&acyl_halide("Cl"), boc_aniline], true),
            set(&[&acyl_halide("Br"), cbz_aniline], true),
        ]);
        assert!(generalize(&p).is_none());

        // Halogen against chalcogen
        let p = pair(vec![
            set(&[&acyl_halide("Cl"), ANILINE], true),
            set(&[&acyl_halide("O"), ANILINE], true),
        ]);
        assert!(generalize(&p).is_none());
    }

    #[test]
    fn minimum_family_size_is_configurable() {
        let p = pair(vec![
            set(&[&acyl_halide("Cl"), ANILINE], true),
            set(&[&acyl_halide("Br"), ANILINE], true),
        ]);
        assert!(generalize_with(&p, 2).is_some());
        assert!(generalize_with(&p, 3).is_none());
    }

    #[test]
    fn attach_replaces_oracle_templates() {
        let mut oracle = set(&["[CH3:10][C:12](=[O:13])[Cl,Br]", ANILINE], true);
        oracle.is_template = true;
        let mut pairs = vec![pair(vec![
            set(&[&acyl_halide("Cl"), ANILINE], true),
            oracle,
            set(&[&acyl_halide("Br"), ANILINE], true),
        ])];
        let diagnostics = attach_templates(&mut pairs, &PipelineConfig::default());
        assert_eq!(diagnostics.by_stage(Stage::Generalize).count(), 1);
        assert_eq!(pairs[0].permutations.len(), 2);

        let permutations = pairs[0].reactant_permutations();
        assert_eq!(permutations.len(), 3);
        assert!(permutations[0].is_template);
        assert_eq!(permutations[0].reactants[0], "[CH3:10][C:12](=[O:13])[Cl,Br]");
        assert!(permutations[1..].iter().all(|p| !p.is_template));
    }

    #[test]
    fn generalization_can_be_disabled() {
        let mut pairs = vec![pair(vec![
            set(&[&acyl_halide("Cl"), ANILINE], true),
            set(&[&acyl_halide("Br"), ANILINE], true),
        ])];
        let config = PipelineConfig { generalize: false, ..PipelineConfig::default() };
        assert!(attach_templates(&mut pairs, &config).is_empty());
        assert!(pairs[0].template.is_none());
    }
}
