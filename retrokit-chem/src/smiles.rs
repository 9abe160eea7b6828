//! Atom-mapped SMILES parser.
//!
//! Understands the organic subset, bracket atoms with isotope, chirality,
//! hydrogen count, charge and atom-map class (`[C@@H:12]`), wildcard atoms
//! (`*`, `[*:3]`), branches, ring closures and fragment separators.
//! [`parse_template`] additionally accepts the element disjunctions that
//! generalized reactant templates carry (`[Cl,Br,I]`).

use std::collections::BTreeMap;

use retrokit_core::{Result, RetroError};

use crate::element::{element_by_number, element_by_smiles_symbol, element_by_symbol};
use crate::molecule::{Bond, BondOrder, BondStereo, Chirality, MolAtom, Molecule};

/// Parse a SMILES string into a `Molecule`.
pub fn parse_smiles(smiles: &str) -> Result<Molecule> {
    parse_smiles_named(smiles, "")
}

/// Parse a SMILES string into a `Molecule` with a given name.
pub fn parse_smiles_named(smiles: &str, name: &str) -> Result<Molecule> {
    parse_with(smiles, name, false)
}

/// Parse a reactant template: SMILES plus bracketed element disjunctions.
pub fn parse_template(template: &str) -> Result<Molecule> {
    parse_with(template, "template", true)
}

fn parse_with(smiles: &str, name: &str, allow_queries: bool) -> Result<Molecule> {
    let trimmed = smiles.trim();
    if trimmed.is_empty() {
        return Err(RetroError::Parse("empty SMILES".into()));
    }
    let mut parser = SmilesParser::new(trimmed, allow_queries);
    parser.parse()?;
    parser.resolve_ring_closures()?;
    parser.compute_implicit_hydrogens();
    Ok(Molecule::new(name.to_string(), parser.atoms, parser.bonds))
}

struct SmilesParser<'a> {
    input: &'a [u8],
    pos: usize,
    allow_queries: bool,
    atoms: Vec<MolAtom>,
    bonds: Vec<Bond>,
    /// ring_closures[digit] = (atom_idx, Option<BondOrder>)
    ring_closures: BTreeMap<u16, (usize, Option<BondOrder>)>,
    /// Stack of atom indices for branch handling
    stack: Vec<usize>,
    /// Index of the previous atom (for bonding)
    prev_atom: Option<usize>,
    /// Pending bond order for the next bond
    pending_bond: Option<BondOrder>,
    pending_stereo: BondStereo,
}

impl<'a> SmilesParser<'a> {
    fn new(input: &'a str, allow_queries: bool) -> Self {
        SmilesParser {
            input: input.as_bytes(),
            pos: 0,
            allow_queries,
            atoms: Vec::new(),
            bonds: Vec::new(),
            ring_closures: BTreeMap::new(),
            stack: Vec::new(),
            prev_atom: None,
            pending_bond: None,
            pending_stereo: BondStereo::None,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.input.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<u8> {
        let ch = self.input.get(self.pos).copied();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    fn parse(&mut self) -> Result<()> {
        while let Some(ch) = self.peek() {
            match ch {
                b'(' => {
                    self.advance();
                    let prev = self.prev_atom.ok_or_else(|| {
                        let at = self.pos - 1;
                        RetroError::Parse(format!("branch without preceding atom at position {at}"))
                    })?;
                    self.stack.push(prev);
                }
                b')' => {
                    self.advance();
                    self.prev_atom = Some(self.stack.pop().ok_or_else(|| {
                        RetroError::Parse(format!("unmatched ')' at position {}", self.pos - 1))
                    })?);
                    self.pending_bond = None;
                    self.pending_stereo = BondStereo::None;
                }
                b'-' => {
                    self.advance();
                    self.pending_bond = Some(BondOrder::Single);
                }
                b'=' => {
                    self.advance();
                    self.pending_bond = Some(BondOrder::Double);
                }
                b'#' => {
                    self.advance();
                    self.pending_bond = Some(BondOrder::Triple);
                }
                b':' => {
                    self.advance();
                    self.pending_bond = Some(BondOrder::Aromatic);
                }
                b'/' => {
                    self.advance();
                    self.pending_stereo = BondStereo::Up;
                }
                b'\\' => {
                    self.advance();
                    self.pending_stereo = BondStereo::Down;
                }
                b'%' => {
                    self.advance();
                    let ring_num = self.parse_two_digit_ring()?;
                    self.handle_ring_closure(ring_num)?;
                }
                b'[' => {
                    self.parse_bracket_atom()?;
                }
                b'.' => {
                    self.advance();
                    if self.pending_bond.is_some() {
                        return Err(RetroError::Parse("bond symbol before '.'".into()));
                    }
                    self.prev_atom = None;
                }
                ch if ch.is_ascii_digit() => {
                    self.advance();
                    self.handle_ring_closure((ch - b'0') as u16)?;
                }
                b'*' => {
                    self.advance();
                    self.push_atom(MolAtom::wildcard());
                }
                ch if is_organic_atom_start(ch) => {
                    self.parse_organic_atom()?;
                }
                ch => {
                    return Err(RetroError::Parse(format!(
                        "unexpected character '{}' at position {}",
                        ch as char, self.pos
                    )));
                }
            }
        }
        if self.pending_bond.is_some() {
            return Err(RetroError::Parse("SMILES ends with a dangling bond".into()));
        }
        Ok(())
    }

    fn parse_organic_atom(&mut self) -> Result<()> {
        let Some(ch) = self.advance() else {
            return Err(RetroError::Parse("unexpected end of SMILES".into()));
        };
        let is_aromatic = ch.is_ascii_lowercase();
        let upper = ch.to_ascii_uppercase();

        let symbol = match upper {
            b'B' if !is_aromatic && self.peek() == Some(b'r') => {
                self.advance();
                "Br"
            }
            b'C' if !is_aromatic && self.peek() == Some(b'l') => {
                self.advance();
                "Cl"
            }
            b'B' => "B",
            b'C' => "C",
            b'N' => "N",
            b'O' => "O",
            b'P' => "P",
            b'S' => "S",
            b'F' => "F",
            b'I' => "I",
            _ => {
                return Err(RetroError::Parse(format!(
                    "unknown organic atom '{}'",
                    ch as char
                )));
            }
        };

        let elem = element_by_symbol(symbol)
            .ok_or_else(|| RetroError::Parse(format!("unknown element '{symbol}'")))?;

        let mut atom = MolAtom::new(elem.atomic_number);
        atom.is_aromatic = is_aromatic;
        self.push_atom(atom);
        Ok(())
    }

    fn parse_bracket_atom(&mut self) -> Result<()> {
        let start = self.pos;
        self.advance(); // consume '['

        let isotope = self.parse_optional_number();

        let (atomic_number, is_aromatic) = self.parse_bracket_symbol()?;
        let mut atom = MolAtom::new(atomic_number);
        atom.is_aromatic = is_aromatic;
        atom.bracketed = true;
        atom.isotope = isotope.map(|n| n as u16);

        if self.peek() == Some(b',') {
            if !self.allow_queries {
                return Err(RetroError::Parse(format!(
                    "atom disjunction at position {} is only allowed in templates",
                    self.pos
                )));
            }
            let mut alternatives = vec![atomic_number];
            while self.peek() == Some(b',') {
                self.advance();
                let (alt, _) = self.parse_bracket_symbol()?;
                if alt == 0 {
                    return Err(RetroError::Parse("wildcard inside an atom disjunction".into()));
                }
                alternatives.push(alt);
            }
            if atomic_number == 0 {
                return Err(RetroError::Parse("wildcard inside an atom disjunction".into()));
            }
            atom.alternatives = alternatives;
        }

        if self.peek() == Some(b'@') {
            self.advance();
            atom.chirality = if self.peek() == Some(b'@') {
                self.advance();
                Chirality::Clockwise
            } else {
                Chirality::CounterClockwise
            };
        }

        if self.peek() == Some(b'H') {
            self.advance();
            atom.implicit_hydrogens = match self.peek() {
                Some(d) if d.is_ascii_digit() => {
                    self.advance();
                    d - b'0'
                }
                _ => 1,
            };
        }

        atom.formal_charge = self.parse_charge();

        if self.peek() == Some(b':') {
            self.advance();
            let map = self.parse_optional_number().ok_or_else(|| {
                RetroError::Parse(format!("expected atom-map number at position {}", self.pos))
            })?;
            atom.map_id = (map > 0).then_some(map);
        }

        if self.advance() != Some(b']') {
            return Err(RetroError::Parse(format!(
                "expected ']' to close bracket atom opened at position {start}"
            )));
        }

        self.push_atom(atom);
        Ok(())
    }

    /// Element symbol inside brackets. Returns (atomic number, aromatic);
    /// atomic number 0 denotes `*`.
    fn parse_bracket_symbol(&mut self) -> Result<(u8, bool)> {
        let ch = self.advance().ok_or_else(|| {
            RetroError::Parse("unexpected end of SMILES in bracket atom".into())
        })?;
        if ch == b'*' {
            return Ok((0, false));
        }
        if !ch.is_ascii_alphabetic() {
            return Err(RetroError::Parse(format!(
                "unexpected character '{}' in bracket atom",
                ch as char
            )));
        }

        // Two-letter symbols first: `Cl`, `Br`, `se`, `as`
        if let Some(next) = self.peek().filter(|c| c.is_ascii_lowercase()) {
            let two_letter = format!("{}{}", ch as char, next as char);
            if let Some((elem, aromatic)) = element_by_smiles_symbol(&two_letter) {
                self.advance();
                return Ok((elem.atomic_number, aromatic));
            }
        }

        let one_letter = (ch as char).to_string();
        element_by_smiles_symbol(&one_letter)
            .map(|(elem, aromatic)| (elem.atomic_number, aromatic))
            .ok_or_else(|| RetroError::Parse(format!("unknown element '{one_letter}'")))
    }

    fn parse_charge(&mut self) -> i8 {
        let sign: i8 = match self.peek() {
            Some(b'+') => 1,
            Some(b'-') => -1,
            _ => return 0,
        };
        let symbol = self.advance().unwrap_or(b'+');
        if let Some(d) = self.peek().filter(|d| d.is_ascii_digit()) {
            self.advance();
            return sign * (d - b'0') as i8;
        }
        let mut count = 1i8;
        while self.peek() == Some(symbol) {
            self.advance();
            count += 1;
        }
        sign * count
    }

    fn parse_optional_number(&mut self) -> Option<u32> {
        let mut n: u32 = 0;
        let mut found = false;
        while let Some(ch) = self.peek().filter(|c| c.is_ascii_digit()) {
            self.advance();
            n = n.saturating_mul(10).saturating_add((ch - b'0') as u32);
            found = true;
        }
        found.then_some(n)
    }

    fn parse_two_digit_ring(&mut self) -> Result<u16> {
        match (self.peek(), self.peek_at(1)) {
            (Some(d1), Some(d2)) if d1.is_ascii_digit() && d2.is_ascii_digit() => {
                self.pos += 2;
                Ok((d1 - b'0') as u16 * 10 + (d2 - b'0') as u16)
            }
            _ => Err(RetroError::Parse("invalid ring closure number after '%'".into())),
        }
    }

    fn handle_ring_closure(&mut self, ring_num: u16) -> Result<()> {
        let current = self.prev_atom.ok_or_else(|| {
            RetroError::Parse("ring closure without preceding atom".into())
        })?;

        if let Some((open_atom, open_bond)) = self.ring_closures.remove(&ring_num) {
            if open_atom == current {
                return Err(RetroError::Parse(format!(
                    "ring closure {ring_num} bonds an atom to itself"
                )));
            }
            let is_aromatic = self.atoms[open_atom].is_aromatic && self.atoms[current].is_aromatic;
            let order = self
                .pending_bond
                .take()
                .or(open_bond)
                .unwrap_or(if is_aromatic { BondOrder::Aromatic } else { BondOrder::Single });
            let mut bond = Bond::new(open_atom, current, order);
            bond.is_aromatic = is_aromatic && order == BondOrder::Aromatic;
            self.bonds.push(bond);
        } else {
            self.ring_closures.insert(ring_num, (current, self.pending_bond.take()));
        }
        Ok(())
    }

    fn push_atom(&mut self, atom: MolAtom) {
        let atom_idx = self.atoms.len();
        self.atoms.push(atom);
        self.add_bond_to_prev(atom_idx);
        self.prev_atom = Some(atom_idx);
    }

    fn add_bond_to_prev(&mut self, atom_idx: usize) {
        if let Some(prev) = self.prev_atom {
            let both_aromatic = self.atoms[prev].is_aromatic && self.atoms[atom_idx].is_aromatic;
            let order = self.pending_bond.take().unwrap_or(if both_aromatic {
                BondOrder::Aromatic
            } else {
                BondOrder::Single
            });
            let mut bond = Bond::new(prev, atom_idx, order);
            bond.is_aromatic = both_aromatic && order == BondOrder::Aromatic;
            bond.stereo = self.pending_stereo;
            self.bonds.push(bond);
        }
        self.pending_bond = None;
        self.pending_stereo = BondStereo::None;
    }

    fn resolve_ring_closures(&self) -> Result<()> {
        if !self.ring_closures.is_empty() {
            let open: Vec<_> = self.ring_closures.keys().collect();
            return Err(RetroError::Parse(format!(
                "unmatched ring closure(s): {:?}",
                open
            )));
        }
        if !self.stack.is_empty() {
            return Err(RetroError::Parse(format!(
                "{} unmatched '(' in SMILES",
                self.stack.len()
            )));
        }
        Ok(())
    }

    /// Organic-subset atoms get hydrogens up to their default valence;
    /// bracket atoms keep the count they were written with.
    fn compute_implicit_hydrogens(&mut self) {
        for i in 0..self.atoms.len() {
            let atom = &self.atoms[i];
            if atom.bracketed || atom.is_wildcard() {
                continue;
            }
            let valence = element_by_number(atom.atomic_number).map(|e| e.valence as usize);
            let Some(target) = valence else {
                continue;
            };
            // Aromatic atoms donate one electron to the pi system
            let (available, used) = if atom.is_aromatic {
                (target.saturating_sub(1), self.bond_degree(i))
            } else {
                (target, self.bond_order_sum(i))
            };
            if available > used {
                self.atoms[i].implicit_hydrogens = (available - used) as u8;
            }
        }
    }

    fn bond_degree(&self, atom_idx: usize) -> usize {
        self.bonds
            .iter()
            .filter(|b| b.atom1 == atom_idx || b.atom2 == atom_idx)
            .count()
    }

    fn bond_order_sum(&self, atom_idx: usize) -> usize {
        let sum: f64 = self
            .bonds
            .iter()
            .filter(|b| b.atom1 == atom_idx || b.atom2 == atom_idx)
            .map(|b| b.order.as_f64())
            .sum();
        sum.round() as usize
    }
}

fn is_organic_atom_start(ch: u8) -> bool {
    matches!(
        ch,
        b'B' | b'C' | b'N' | b'O' | b'P' | b'S' | b'F' | b'I'
            | b'b' | b'c' | b'n' | b'o' | b'p' | b's'
    )
}
