//! Reaction ontology: canonical reaction names and their classes.
//!
//! The registry is loaded once, never mutated, and shared read-only
//! between analyses (wrap it in an `Arc`).

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use retrokit_core::hash::sha256;
use retrokit_core::{Result, RetroError};
use serde::{Deserialize, Serialize};

/// Forward reaction class of an ontology entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReactionClass {
    #[serde(rename = "Heteroatom Alkylation and Arylation")]
    HeteroatomAlkylationArylation,
    #[serde(rename = "Acylation")]
    Acylation,
    #[serde(rename = "C-C Coupling")]
    CCCoupling,
    #[serde(rename = "Aromatic Heterocycle Formation")]
    AromaticHeterocycleFormation,
    #[serde(rename = "Deprotection")]
    Deprotection,
    #[serde(rename = "Protection")]
    Protection,
    #[serde(rename = "Reduction")]
    Reduction,
    #[serde(rename = "Oxidation")]
    Oxidation,
    #[serde(rename = "Functional Group Interconversion")]
    FunctionalGroupInterconversion,
    #[serde(rename = "Functional Group Addition")]
    FunctionalGroupAddition,
    #[serde(rename = "Miscellaneous")]
    Miscellaneous,
}

impl ReactionClass {
    pub const ALL: [ReactionClass; 11] = [
        ReactionClass::HeteroatomAlkylationArylation,
        ReactionClass::Acylation,
        ReactionClass::CCCoupling,
        ReactionClass::AromaticHeterocycleFormation,
        ReactionClass::Deprotection,
        ReactionClass::Protection,
        ReactionClass::Reduction,
        ReactionClass::Oxidation,
        ReactionClass::FunctionalGroupInterconversion,
        ReactionClass::FunctionalGroupAddition,
        ReactionClass::Miscellaneous,
    ];

    /// Display name, identical to the serialized form.
    pub fn label(self) -> &'static str {
        match self {
            ReactionClass::HeteroatomAlkylationArylation => "Heteroatom Alkylation and Arylation",
            ReactionClass::Acylation => "Acylation",
            ReactionClass::CCCoupling => "C-C Coupling",
            ReactionClass::AromaticHeterocycleFormation => "Aromatic Heterocycle Formation",
            ReactionClass::Deprotection => "Deprotection",
            ReactionClass::Protection => "Protection",
            ReactionClass::Reduction => "Reduction",
            ReactionClass::Oxidation => "Oxidation",
            ReactionClass::FunctionalGroupInterconversion => "Functional Group Interconversion",
            ReactionClass::FunctionalGroupAddition => "Functional Group Addition",
            ReactionClass::Miscellaneous => "Miscellaneous",
        }
    }

    /// Name of the retrosynthetic step that undoes this forward class.
    pub fn retro(self) -> &'static str {
        match self {
            ReactionClass::HeteroatomAlkylationArylation => "Dealkylation / Dearylation",
            ReactionClass::Acylation => "Deacylation",
            ReactionClass::CCCoupling => "C-C Bond Cleavage / Disconnection",
            ReactionClass::AromaticHeterocycleFormation => "Heterocycle Ring Opening",
            ReactionClass::Deprotection => "Protection",
            ReactionClass::Protection => "Deprotection",
            ReactionClass::Reduction => "Oxidation",
            ReactionClass::Oxidation => "Reduction",
            ReactionClass::FunctionalGroupInterconversion => "Functional Group Interconversion",
            ReactionClass::FunctionalGroupAddition => "Elimination",
            ReactionClass::Miscellaneous => "Miscellaneous",
        }
    }

    /// Parse a class label: exact, then case-insensitive, then partial.
    pub fn from_label(label: &str) -> Option<ReactionClass> {
        let label = label.trim();
        if label.is_empty() {
            return None;
        }
        if let Some(class) = Self::ALL.iter().find(|c| c.label() == label) {
            return Some(*class);
        }
        let lower = label.to_lowercase();
        if let Some(class) = Self::ALL.iter().find(|c| c.label().to_lowercase() == lower) {
            return Some(*class);
        }
        Self::ALL.iter().copied().find(|c| {
            let own = c.label().to_lowercase();
            own.contains(&lower) || lower.contains(&own)
        })
    }
}

impl fmt::Display for ReactionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Keyword rules for names outside the registry. First match wins.
const CLASS_RULES: &[(&[&str], ReactionClass)] = &[
    (
        &["deprotection", "saponification", "demethylation", "debenzylation"],
        ReactionClass::Deprotection,
    ),
    (&["protection"], ReactionClass::Protection),
    (
        &[
            "buchwald",
            "ullmann",
            "chan-lam",
            "arylation",
            "alkylation",
            "reductive amination",
            "mitsunobu",
            "williamson",
            "snar",
        ],
        ReactionClass::HeteroatomAlkylationArylation,
    ),
    (
        &[
            "heterocycle",
            "cyclization",
            "cyclisation",
            "azole",
            "indole",
            "pyridine",
            "pyrimidine",
            "quinoline",
        ],
        ReactionClass::AromaticHeterocycleFormation,
    ),
    (
        &[
            "suzuki",
            "stille",
            "negishi",
            "heck",
            "sonogashira",
            "kumada",
            "grignard",
            "wittig",
            "aldol",
            "diels-alder",
            "coupling",
            "friedel-crafts",
            "michael",
        ],
        ReactionClass::CCCoupling,
    ),
    (
        &[
            "acylation",
            "amide",
            "ester",
            "acetylation",
            "sulfonamide",
            "carbamate",
            "urea",
            "schotten-baumann",
        ],
        ReactionClass::Acylation,
    ),
    (&["reduction", "hydrogenation", "reductive"], ReactionClass::Reduction),
    (&["oxidation", "epoxidation", "dihydroxylation"], ReactionClass::Oxidation),
    (
        &[
            "nitration",
            "halogenation",
            "bromination",
            "chlorination",
            "iodination",
            "addition",
            "hydroboration",
        ],
        ReactionClass::FunctionalGroupAddition,
    ),
    (
        &["conversion", "interconversion", "hydrolysis", "substitution"],
        ReactionClass::FunctionalGroupInterconversion,
    ),
];

/// Name fragments that mark a ring-forming step.
const RING_FORMING_KEYWORDS: &[&str] = &[
    "cycloaddition",
    "diels-alder",
    "annulation",
    "electrocycl",
    "[2+2]",
    "[3+2]",
    "[4+2]",
    "ring-closing metathesis",
    "ring closing metathesis",
];

/// Default registry content.
const BUILTIN: &[(&str, ReactionClass)] = &[
    // Heteroatom alkylation and arylation
    (
        "N-alkylation of primary amines with alkyl halides",
        ReactionClass::HeteroatomAlkylationArylation,
    ),
    (
        "N-alkylation of secondary amines with alkyl halides",
        ReactionClass::HeteroatomAlkylationArylation,
    ),
    ("Reductive amination with aldehyde", ReactionClass::HeteroatomAlkylationArylation),
    ("Reductive amination with ketone", ReactionClass::HeteroatomAlkylationArylation),
    ("Williamson ether synthesis", ReactionClass::HeteroatomAlkylationArylation),
    ("Mitsunobu aryl ether synthesis", ReactionClass::HeteroatomAlkylationArylation),
    ("SNAr ether synthesis", ReactionClass::HeteroatomAlkylationArylation),
    ("N-arylation with Ar-X (SNAr)", ReactionClass::HeteroatomAlkylationArylation),
    (
        "Buchwald-Hartwig/Ullmann-Goldberg/N-arylation primary amine",
        ReactionClass::HeteroatomAlkylationArylation,
    ),
    (
        "Buchwald-Hartwig/Ullmann-Goldberg/N-arylation secondary amine",
        ReactionClass::HeteroatomAlkylationArylation,
    ),
    ("Chan-Lam coupling", ReactionClass::HeteroatomAlkylationArylation),
    ("S-alkylation of thiols", ReactionClass::HeteroatomAlkylationArylation),
    // Acylation
    ("Carboxylic acid to amide conversion", ReactionClass::Acylation),
    ("Amide Schotten-Baumann", ReactionClass::Acylation),
    ("Ester Schotten-Baumann", ReactionClass::Acylation),
    ("Sulfonamide Schotten-Baumann", ReactionClass::Acylation),
    ("Fischer-Speier esterification", ReactionClass::Acylation),
    ("N-acetylation", ReactionClass::Acylation),
    ("Urea synthesis via isocyanate and primary amine", ReactionClass::Acylation),
    ("Carbamate synthesis from chloroformate", ReactionClass::Acylation),
    // C-C coupling
    ("Suzuki coupling with boronic acids", ReactionClass::CCCoupling),
    ("Suzuki coupling with boronic esters", ReactionClass::CCCoupling),
    ("Stille reaction", ReactionClass::CCCoupling),
    ("Negishi coupling", ReactionClass::CCCoupling),
    ("Heck reaction", ReactionClass::CCCoupling),
    ("Sonogashira coupling", ReactionClass::CCCoupling),
    ("Grignard addition to carbonyl", ReactionClass::CCCoupling),
    ("Wittig olefination", ReactionClass::CCCoupling),
    ("Aldol condensation", ReactionClass::CCCoupling),
    ("Friedel-Crafts acylation", ReactionClass::CCCoupling),
    ("Diels-Alder reaction", ReactionClass::CCCoupling),
    // Aromatic heterocycle formation
    ("Benzimidazole formation", ReactionClass::AromaticHeterocycleFormation),
    ("Fischer indole synthesis", ReactionClass::AromaticHeterocycleFormation),
    ("Pyrazole formation", ReactionClass::AromaticHeterocycleFormation),
    ("1,2,4-Oxadiazole formation", ReactionClass::AromaticHeterocycleFormation),
    ("Hantzsch thiazole synthesis", ReactionClass::AromaticHeterocycleFormation),
    ("Huisgen 1,3-dipolar cycloaddition", ReactionClass::AromaticHeterocycleFormation),
    // Deprotection
    ("Boc amine deprotection", ReactionClass::Deprotection),
    ("Cbz amine deprotection", ReactionClass::Deprotection),
    ("Fmoc amine deprotection", ReactionClass::Deprotection),
    ("N-benzyl deprotection", ReactionClass::Deprotection),
    ("O-benzyl deprotection", ReactionClass::Deprotection),
    ("TBS ether deprotection", ReactionClass::Deprotection),
    ("tert-Butyl ester deprotection", ReactionClass::Deprotection),
    ("Ester saponification (methyl deprotection)", ReactionClass::Deprotection),
    ("Ester saponification (ethyl deprotection)", ReactionClass::Deprotection),
    ("Methoxy to hydroxy (O-demethylation)", ReactionClass::Deprotection),
    // Protection
    ("Boc amine protection", ReactionClass::Protection),
    ("Fmoc amine protection", ReactionClass::Protection),
    ("TBS protection of alcohols", ReactionClass::Protection),
    ("Benzyl ether protection", ReactionClass::Protection),
    // Reduction
    ("Nitro to amine reduction", ReactionClass::Reduction),
    ("Ketone to alcohol reduction", ReactionClass::Reduction),
    ("Ester to alcohol reduction", ReactionClass::Reduction),
    ("Carboxylic acid to alcohol reduction", ReactionClass::Reduction),
    ("Nitrile to amine reduction", ReactionClass::Reduction),
    ("Amide to amine reduction", ReactionClass::Reduction),
    ("Alkene hydrogenation", ReactionClass::Reduction),
    // Oxidation
    ("Alcohol to aldehyde oxidation", ReactionClass::Oxidation),
    ("Alcohol to ketone oxidation", ReactionClass::Oxidation),
    ("Aldehyde to carboxylic acid oxidation", ReactionClass::Oxidation),
    ("Sulfide to sulfoxide oxidation", ReactionClass::Oxidation),
    ("Sulfide to sulfone oxidation", ReactionClass::Oxidation),
    ("Alkene epoxidation", ReactionClass::Oxidation),
    // Functional group interconversion
    ("Alcohol to chloride conversion", ReactionClass::FunctionalGroupInterconversion),
    ("Alcohol to bromide conversion", ReactionClass::FunctionalGroupInterconversion),
    ("Alcohol to mesylate conversion", ReactionClass::FunctionalGroupInterconversion),
    ("Carboxylic acid to acyl chloride conversion", ReactionClass::FunctionalGroupInterconversion),
    ("Nitrile hydrolysis to amide", ReactionClass::FunctionalGroupInterconversion),
    // Functional group addition
    ("Aromatic nitration", ReactionClass::FunctionalGroupAddition),
    ("Aromatic bromination", ReactionClass::FunctionalGroupAddition),
    ("Aromatic chlorination", ReactionClass::FunctionalGroupAddition),
    ("Aromatic iodination", ReactionClass::FunctionalGroupAddition),
    ("Hydroboration of alkenes", ReactionClass::FunctionalGroupAddition),
    // Miscellaneous
    ("Salt formation", ReactionClass::Miscellaneous),
    ("Decarboxylation", ReactionClass::Miscellaneous),
];

/// One registered reaction name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OntologyEntry {
    pub name: String,
    pub class: ReactionClass,
}

/// JSON shape accepted by [`Ontology::from_json_str`].
#[derive(Deserialize)]
#[serde(untagged)]
enum OntologyRecord {
    Name(String),
    Classified {
        name: String,
        #[serde(default, alias = "reactionClass")]
        class: Option<String>,
    },
}

/// Immutable registry of canonical reaction names.
#[derive(Debug, Clone, Default)]
pub struct Ontology {
    entries: Vec<OntologyEntry>,
    index: BTreeMap<String, usize>,
    source_hash: Option<String>,
}

impl Ontology {
    /// The default registry shipped with the crate.
    pub fn builtin() -> Self {
        Self::from_entries(BUILTIN.iter().map(|&(name, class)| OntologyEntry {
            name: name.to_string(),
            class,
        }))
    }

    /// Registry over plain names; classes are inferred from keywords.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::from_entries(names.into_iter().map(|name| {
            let name = name.as_ref().trim().to_string();
            let class = infer_class(&name);
            OntologyEntry { name, class }
        }))
    }

    /// Parse a JSON array whose items are names or `{"name", "class"}` objects.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let records: Vec<OntologyRecord> = serde_json::from_str(json)
            .map_err(|e| RetroError::Parse(format!("ontology JSON: {e}")))?;
        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            let entry = match record {
                OntologyRecord::Name(name) => {
                    let class = infer_class(&name);
                    OntologyEntry { name, class }
                }
                OntologyRecord::Classified { name, class: None } => {
                    let class = infer_class(&name);
                    OntologyEntry { name, class }
                }
                OntologyRecord::Classified { name, class: Some(label) } => {
                    let class = ReactionClass::from_label(&label).ok_or_else(|| {
                        RetroError::Parse(format!("unknown reaction class '{label}' for '{name}'"))
                    })?;
                    OntologyEntry { name, class }
                }
            };
            entries.push(entry);
        }
        Ok(Self::from_entries(entries))
    }

    /// Load a JSON registry from disk, remembering the file's SHA-256.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            RetroError::Io(std::io::Error::new(e.kind(), format!("{}: {}", path.display(), e)))
        })?;
        let mut ontology = Self::from_json_str(&json)?;
        ontology.source_hash = Some(sha256(json.as_bytes()));
        Ok(ontology)
    }

    fn from_entries(entries: impl IntoIterator<Item = OntologyEntry>) -> Self {
        let mut ontology = Ontology::default();
        for mut entry in entries {
            entry.name = entry.name.trim().to_string();
            if entry.name.is_empty() || ontology.index.contains_key(&entry.name) {
                continue;
            }
            ontology.index.insert(entry.name.clone(), ontology.entries.len());
            ontology.entries.push(entry);
        }
        ontology
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[OntologyEntry] {
        &self.entries
    }

    /// SHA-256 of the file the registry was loaded from, if any.
    pub fn source_hash(&self) -> Option<&str> {
        self.source_hash.as_deref()
    }

    /// Exact membership on the trimmed name.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name.trim())
    }

    /// Registered class of `name`.
    pub fn class_of(&self, name: &str) -> Option<ReactionClass> {
        self.index.get(name.trim()).map(|&i| self.entries[i].class)
    }

    /// Registered class, or a keyword guess for names outside the registry.
    pub fn infer_class(&self, name: &str) -> ReactionClass {
        self.class_of(name).unwrap_or_else(|| infer_class(name))
    }

    pub fn is_ring_forming(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        RING_FORMING_KEYWORDS.iter().any(|k| lower.contains(k))
    }
}

/// Best-effort class for a free-text reaction name.
pub fn infer_class(name: &str) -> ReactionClass {
    let lower = name.to_lowercase();
    CLASS_RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|&(_, class)| class)
        .unwrap_or(ReactionClass::Miscellaneous)
}
