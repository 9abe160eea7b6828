//! `ELEMENT:MAPID` atom references.

use std::fmt;
use std::str::FromStr;

use retrokit_chem::element_by_smiles_symbol;
use retrokit_core::{Result, RetroError};
use serde::{Deserialize, Serialize};

/// One atom of the product, named by element symbol and atom-map id.
///
/// The symbol keeps its aromatic/aliphatic case (`c:18` vs `C:12`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AtomRef {
    pub symbol: String,
    pub map_id: u32,
}

impl AtomRef {
    pub fn new(symbol: impl Into<String>, map_id: u32) -> Self {
        AtomRef { symbol: symbol.into(), map_id }
    }

    /// Atomic number of the referenced element.
    pub fn atomic_number(&self) -> Option<u8> {
        element_by_smiles_symbol(&self.symbol).map(|(e, _)| e.atomic_number)
    }
}

impl fmt::Display for AtomRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.symbol, self.map_id)
    }
}

impl FromStr for AtomRef {
    type Err = RetroError;

    fn from_str(token: &str) -> Result<Self> {
        let token = token.trim();
        let (symbol, map) = token
            .split_once(':')
            .ok_or_else(|| {
                RetroError::Parse(format!("atom token '{token}' is not ELEMENT:MAPID"))
            })?;
        if element_by_smiles_symbol(symbol).is_none() {
            return Err(RetroError::Parse(format!(
                "unknown element '{symbol}' in atom token '{token}'"
            )));
        }
        let map_id: u32 = map
            .parse()
            .map_err(|_| {
                RetroError::Parse(format!("invalid map id '{map}' in atom token '{token}'"))
            })?;
        if map_id == 0 {
            return Err(RetroError::Parse(format!("map id 0 in atom token '{token}'")));
        }
        Ok(AtomRef::new(symbol, map_id))
    }
}

impl TryFrom<String> for AtomRef {
    type Error = RetroError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<AtomRef> for String {
    fn from(atom: AtomRef) -> Self {
        atom.to_string()
    }
}

/// Parse a whitespace-separated list of atom tokens (`"C:12 N:14"`).
pub fn parse_atom_refs(atom_set: &str) -> Result<Vec<AtomRef>> {
    let atoms = atom_set
        .split_whitespace()
        .map(str::parse)
        .collect::<Result<Vec<AtomRef>>>()?;
    if atoms.is_empty() {
        return Err(RetroError::Parse("empty atom set".into()));
    }
    Ok(atoms)
}

/// Space-joined display form of an atom list.
pub fn join_atom_refs(atoms: &[AtomRef]) -> String {
    atoms.iter().map(ToString::to_string).collect::<Vec<_>>().join(" ")
}
