//! Periodic table data and element lookup.

/// Coarse structural family of an element.
///
/// Used to decide whether single-atom substituents observed at the same
/// position play one structural role (e.g. all halide leaving groups).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ElementGroup {
    Hydrogen,
    Metal,
    Boron,
    Tetrel,
    Pnictogen,
    Chalcogen,
    Halogen,
    NobleGas,
}

impl ElementGroup {
    /// Human-readable label for rationale strings.
    pub fn label(self) -> &'static str {
        match self {
            ElementGroup::Hydrogen => "hydrogen",
            ElementGroup::Metal => "metal",
            ElementGroup::Boron => "boron",
            ElementGroup::Tetrel => "group 14",
            ElementGroup::Pnictogen => "pnictogen",
            ElementGroup::Chalcogen => "chalcogen",
            ElementGroup::Halogen => "halogen",
            ElementGroup::NobleGas => "noble gas",
        }
    }
}

/// A chemical element from the periodic table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Element {
    pub atomic_number: u8,
    pub symbol: &'static str,
    pub name: &'static str,
    pub valence: u8,
    pub group: ElementGroup,
}

use ElementGroup::*;

const fn el(
    atomic_number: u8,
    symbol: &'static str,
    name: &'static str,
    valence: u8,
    group: ElementGroup,
) -> Element {
    Element { atomic_number, symbol, name, valence, group }
}

/// Elements 1 to 54 plus the heavier atoms that show up in reagents.
static ELEMENTS: [Element; 62] = [
    el(1, "H", "Hydrogen", 1, Hydrogen),
    el(2, "He", "Helium", 0, NobleGas),
    el(3, "Li", "Lithium", 1, Metal),
    el(4, "Be", "Beryllium", 2, Metal),
    el(5, "B", "Boron", 3, Boron),
    el(6, "C", "Carbon", 4, Tetrel),
    el(7, "N", "Nitrogen", 3, Pnictogen),
    el(8, "O", "Oxygen", 2, Chalcogen),
    el(9, "F", "Fluorine", 1, Halogen),
    el(10, "Ne", "Neon", 0, NobleGas),
    el(11, "Na", "Sodium", 1, Metal),
    el(12, "Mg", "Magnesium", 2, Metal),
    el(13, "Al", "Aluminum", 3, Metal),
    el(14, "Si", "Silicon", 4, Tetrel),
    el(15, "P", "Phosphorus", 3, Pnictogen),
    el(16, "S", "Sulfur", 2, Chalcogen),
    el(17, "Cl", "Chlorine", 1, Halogen),
    el(18, "Ar", "Argon", 0, NobleGas),
    el(19, "K", "Potassium", 1, Metal),
    el(20, "Ca", "Calcium", 2, Metal),
    el(21, "Sc", "Scandium", 3, Metal),
    el(22, "Ti", "Titanium", 4, Metal),
    el(23, "V", "Vanadium", 5, Metal),
    el(24, "Cr", "Chromium", 3, Metal),
    el(25, "Mn", "Manganese", 2, Metal),
    el(26, "Fe", "Iron", 3, Metal),
    el(27, "Co", "Cobalt", 3, Metal),
    el(28, "Ni", "Nickel", 2, Metal),
    el(29, "Cu", "Copper", 2, Metal),
    el(30, "Zn", "Zinc", 2, Metal),
    el(31, "Ga", "Gallium", 3, Metal),
    el(32, "Ge", "Germanium", 4, Tetrel),
    el(33, "As", "Arsenic", 3, Pnictogen),
    el(34, "Se", "Selenium", 2, Chalcogen),
    el(35, "Br", "Bromine", 1, Halogen),
    el(36, "Kr", "Krypton", 0, NobleGas),
    el(37, "Rb", "Rubidium", 1, Metal),
    el(38, "Sr", "Strontium", 2, Metal),
    el(39, "Y", "Yttrium", 3, Metal),
    el(40, "Zr", "Zirconium", 4, Metal),
    el(41, "Nb", "Niobium", 5, Metal),
    el(42, "Mo", "Molybdenum", 6, Metal),
    el(43, "Tc", "Technetium", 7, Metal),
    el(44, "Ru", "Ruthenium", 4, Metal),
    el(45, "Rh", "Rhodium", 3, Metal),
    el(46, "Pd", "Palladium", 2, Metal),
    el(47, "Ag", "Silver", 1, Metal),
    el(48, "Cd", "Cadmium", 2, Metal),
    el(49, "In", "Indium", 3, Metal),
    el(50, "Sn", "Tin", 4, Tetrel),
    el(51, "Sb", "Antimony", 3, Pnictogen),
    el(52, "Te", "Tellurium", 2, Chalcogen),
    el(53, "I", "Iodine", 1, Halogen),
    el(54, "Xe", "Xenon", 0, NobleGas),
    el(55, "Cs", "Cesium", 1, Metal),
    el(56, "Ba", "Barium", 2, Metal),
    el(78, "Pt", "Platinum", 2, Metal),
    el(79, "Au", "Gold", 1, Metal),
    el(80, "Hg", "Mercury", 2, Metal),
    el(81, "Tl", "Thallium", 1, Metal),
    el(82, "Pb", "Lead", 4, Tetrel),
    el(83, "Bi", "Bismuth", 3, Pnictogen),
];

/// Look up an element by its symbol (e.g. "C", "Fe"). Case-sensitive.
pub fn element_by_symbol(symbol: &str) -> Option<&'static Element> {
    ELEMENTS.iter().find(|e| e.symbol == symbol)
}

/// Look up an element by a SMILES-style symbol, accepting the lowercase
/// aromatic spellings (`c`, `n`, `se`, `as`).
///
/// Returns the element and whether the spelling was aromatic.
pub fn element_by_smiles_symbol(symbol: &str) -> Option<(&'static Element, bool)> {
    let mut chars = symbol.chars();
    let first = chars.next()?;
    let is_aromatic = first.is_ascii_lowercase();
    if is_aromatic {
        let rest: String = chars.collect();
        if !rest.chars().all(|c| c.is_ascii_lowercase()) {
            return None;
        }
        let normalized = format!("{}{}", first.to_ascii_uppercase(), rest);
        if !can_be_aromatic(&normalized) {
            return None;
        }
        element_by_symbol(&normalized).map(|e| (e, true))
    } else {
        element_by_symbol(symbol).map(|e| (e, false))
    }
}

/// Look up an element by its atomic number.
pub fn element_by_number(n: u8) -> Option<&'static Element> {
    if (1..=56).contains(&n) {
        Some(&ELEMENTS[(n - 1) as usize])
    } else {
        ELEMENTS[56..].iter().find(|e| e.atomic_number == n)
    }
}

/// Elements that may be written in lowercase (aromatic) form.
fn can_be_aromatic(symbol: &str) -> bool {
    matches!(symbol, "B" | "C" | "N" | "O" | "P" | "S" | "Se" | "As" | "Te" | "Si")
}
