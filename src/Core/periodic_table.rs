//! Element and polyatomic ion data.
//!
//! The built-in table covers the main-group elements and the common transition metals used in
//! school and general chemistry. Every element carries its standard atomic mass, a list of
//! common oxidation states (used by the formula parser to split neutral formulas into a cation
//! and an anion) and a metal flag (used to classify simple substances).
//!
//! Polyatomic ions (SO4 2-, NH4+, ...) live in the same database: the parser looks them up by
//! atomic composition, so `NaHCO3` and `NaCHO3` resolve to the same hydrogen carbonate anion.
//!
//! A table can also be read from JSON:
//! ```json
//! {
//!   "elements": [
//!     {"symbol": "H", "name": "hydrogen", "atomic_number": 1, "atomic_mass": 1.008,
//!      "oxidation_states": [1, -1], "metal": false}
//!   ],
//!   "ions": [ {"formula": "OH", "charge": -1, "atoms": {"O": 1, "H": 1}} ]
//! }
//! ```
use crate::Core::composition::Composition;
use crate::Core::errors::ChemistryError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::OnceLock;

/// Chemical element. Equality, ordering and hashing use the symbol only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Element {
    pub symbol: String,
    pub name: String,
    pub atomic_number: u32,
    /// g/mol
    pub atomic_mass: f64,
    /// common oxidation states, signed
    pub oxidation_states: Vec<i32>,
    pub metal: bool,
}

impl Element {
    pub fn new(
        symbol: &str,
        name: &str,
        atomic_number: u32,
        atomic_mass: f64,
        oxidation_states: Vec<i32>,
        metal: bool,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            atomic_number,
            atomic_mass,
            oxidation_states,
            metal,
        }
    }

    pub fn positive_states(&self) -> Vec<i32> {
        self.oxidation_states
            .iter()
            .copied()
            .filter(|q| *q > 0)
            .collect()
    }

    pub fn negative_states(&self) -> Vec<i32> {
        self.oxidation_states
            .iter()
            .copied()
            .filter(|q| *q < 0)
            .collect()
    }

    /// Largest (most positive) or smallest oxidation state, if the element has any.
    pub fn extreme_state(&self, largest: bool) -> Option<i32> {
        if largest {
            self.oxidation_states.iter().copied().max()
        } else {
            self.oxidation_states.iter().copied().min()
        }
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.symbol == other.symbol
    }
}

impl Eq for Element {}

impl Hash for Element {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.symbol.hash(state);
    }
}

impl PartialOrd for Element {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Element {
    fn cmp(&self, other: &Self) -> Ordering {
        self.symbol.cmp(&other.symbol)
    }
}

/// Polyatomic ion known to the database, e.g. `SO4` with charge -2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownIon {
    /// preferred rendering of the ion body, without charge
    pub formula: String,
    pub charge: i32,
    pub atoms: IndexMap<String, u32>,
}

impl KnownIon {
    /// True when `body` has exactly the atoms of this ion (charge and order ignored).
    pub fn matches(&self, body: &Composition) -> bool {
        body.len() == self.atoms.len()
            && self
                .atoms
                .iter()
                .all(|(symbol, count)| body.count(symbol) == *count)
    }
}

/// Lookup-by-symbol access to element and ion data.
pub trait ElementDatabase {
    fn element(&self, symbol: &str) -> Option<&Element>;

    fn polyatomic_ions(&self) -> &[KnownIon];

    fn contains(&self, symbol: &str) -> bool {
        self.element(symbol).is_some()
    }

    /// Known ions whose atoms coincide with `body`.
    fn ions_matching(&self, body: &Composition) -> Vec<&KnownIon> {
        self.polyatomic_ions()
            .iter()
            .filter(|ion| ion.matches(body))
            .collect()
    }
}

struct ElementRecord {
    symbol: &'static str,
    name: &'static str,
    number: u32,
    mass: f64,
    states: &'static [i32],
    metal: bool,
}

const fn record(
    symbol: &'static str,
    name: &'static str,
    number: u32,
    mass: f64,
    states: &'static [i32],
    metal: bool,
) -> ElementRecord {
    ElementRecord {
        symbol,
        name,
        number,
        mass,
        states,
        metal,
    }
}

const ELEMENTS: &[ElementRecord] = &[
    record("H", "hydrogen", 1, 1.008, &[1, -1], false),
    record("He", "helium", 2, 4.0026, &[], false),
    record("Li", "lithium", 3, 6.94, &[1], true),
    record("Be", "beryllium", 4, 9.0122, &[2], true),
    record("B", "boron", 5, 10.81, &[3], false),
    record("C", "carbon", 6, 12.011, &[4, 2, -4], false),
    record("N", "nitrogen", 7, 14.007, &[-3, 1, 2, 3, 4, 5], false),
    record("O", "oxygen", 8, 15.999, &[-2, -1, 2], false),
    record("F", "fluorine", 9, 18.998, &[-1], false),
    record("Ne", "neon", 10, 20.18, &[], false),
    record("Na", "sodium", 11, 22.99, &[1], true),
    record("Mg", "magnesium", 12, 24.305, &[2], true),
    record("Al", "aluminium", 13, 26.982, &[3], true),
    record("Si", "silicon", 14, 28.085, &[4, -4], false),
    record("P", "phosphorus", 15, 30.974, &[-3, 3, 5], false),
    record("S", "sulfur", 16, 32.06, &[-2, 2, 4, 6], false),
    record("Cl", "chlorine", 17, 35.45, &[-1, 1, 3, 5, 7], false),
    record("Ar", "argon", 18, 39.948, &[], false),
    record("K", "potassium", 19, 39.098, &[1], true),
    record("Ca", "calcium", 20, 40.078, &[2], true),
    record("Sc", "scandium", 21, 44.956, &[3], true),
    record("Ti", "titanium", 22, 47.867, &[2, 3, 4], true),
    record("V", "vanadium", 23, 50.942, &[2, 3, 4, 5], true),
    record("Cr", "chromium", 24, 51.996, &[2, 3, 6], true),
    record("Mn", "manganese", 25, 54.938, &[2, 3, 4, 6, 7], true),
    record("Fe", "iron", 26, 55.845, &[2, 3], true),
    record("Co", "cobalt", 27, 58.933, &[2, 3], true),
    record("Ni", "nickel", 28, 58.693, &[2, 3], true),
    record("Cu", "copper", 29, 63.546, &[1, 2], true),
    record("Zn", "zinc", 30, 65.38, &[2], true),
    record("Ga", "gallium", 31, 69.723, &[3], true),
    record("Ge", "germanium", 32, 72.63, &[2, 4], true),
    record("As", "arsenic", 33, 74.922, &[-3, 3, 5], false),
    record("Se", "selenium", 34, 78.971, &[-2, 4, 6], false),
    record("Br", "bromine", 35, 79.904, &[-1, 1, 3, 5], false),
    record("Kr", "krypton", 36, 83.798, &[2], false),
    record("Rb", "rubidium", 37, 85.468, &[1], true),
    record("Sr", "strontium", 38, 87.62, &[2], true),
    record("Y", "yttrium", 39, 88.906, &[3], true),
    record("Zr", "zirconium", 40, 91.224, &[4], true),
    record("Nb", "niobium", 41, 92.906, &[3, 5], true),
    record("Mo", "molybdenum", 42, 95.95, &[4, 6], true),
    record("Tc", "technetium", 43, 98.0, &[4, 7], true),
    record("Ru", "ruthenium", 44, 101.07, &[3, 4], true),
    record("Rh", "rhodium", 45, 102.91, &[3], true),
    record("Pd", "palladium", 46, 106.42, &[2, 4], true),
    record("Ag", "silver", 47, 107.87, &[1], true),
    record("Cd", "cadmium", 48, 112.41, &[2], true),
    record("In", "indium", 49, 114.82, &[3], true),
    record("Sn", "tin", 50, 118.71, &[2, 4], true),
    record("Sb", "antimony", 51, 121.76, &[-3, 3, 5], false),
    record("Te", "tellurium", 52, 127.6, &[-2, 4, 6], false),
    record("I", "iodine", 53, 126.9, &[-1, 1, 5, 7], false),
    record("Xe", "xenon", 54, 131.29, &[2, 4, 6], false),
    record("Cs", "caesium", 55, 132.91, &[1], true),
    record("Ba", "barium", 56, 137.33, &[2], true),
    record("La", "lanthanum", 57, 138.91, &[3], true),
    record("W", "tungsten", 74, 183.84, &[4, 6], true),
    record("Pt", "platinum", 78, 195.08, &[2, 4], true),
    record("Au", "gold", 79, 196.97, &[1, 3], true),
    record("Hg", "mercury", 80, 200.59, &[1, 2], true),
    record("Tl", "thallium", 81, 204.38, &[1, 3], true),
    record("Pb", "lead", 82, 207.2, &[2, 4], true),
    record("Bi", "bismuth", 83, 208.98, &[3, 5], true),
    record("U", "uranium", 92, 238.03, &[4, 6], true),
];

// (body, charge, atoms)
const POLYATOMIC_IONS: &[(&str, i32, &[(&str, u32)])] = &[
    ("OH", -1, &[("O", 1), ("H", 1)]),
    ("NO3", -1, &[("N", 1), ("O", 3)]),
    ("NO2", -1, &[("N", 1), ("O", 2)]),
    ("SO4", -2, &[("S", 1), ("O", 4)]),
    ("SO3", -2, &[("S", 1), ("O", 3)]),
    ("HSO4", -1, &[("H", 1), ("S", 1), ("O", 4)]),
    ("HSO3", -1, &[("H", 1), ("S", 1), ("O", 3)]),
    ("S2O3", -2, &[("S", 2), ("O", 3)]),
    ("CO3", -2, &[("C", 1), ("O", 3)]),
    ("HCO3", -1, &[("H", 1), ("C", 1), ("O", 3)]),
    ("PO4", -3, &[("P", 1), ("O", 4)]),
    ("HPO4", -2, &[("H", 1), ("P", 1), ("O", 4)]),
    ("H2PO4", -1, &[("H", 2), ("P", 1), ("O", 4)]),
    ("ClO", -1, &[("Cl", 1), ("O", 1)]),
    ("ClO2", -1, &[("Cl", 1), ("O", 2)]),
    ("ClO3", -1, &[("Cl", 1), ("O", 3)]),
    ("ClO4", -1, &[("Cl", 1), ("O", 4)]),
    ("MnO4", -1, &[("Mn", 1), ("O", 4)]),
    ("CrO4", -2, &[("Cr", 1), ("O", 4)]),
    ("Cr2O7", -2, &[("Cr", 2), ("O", 7)]),
    ("SiO3", -2, &[("Si", 1), ("O", 3)]),
    ("CH3COO", -1, &[("C", 2), ("H", 3), ("O", 2)]),
    ("CN", -1, &[("C", 1), ("N", 1)]),
    ("SCN", -1, &[("S", 1), ("C", 1), ("N", 1)]),
    ("O2", -2, &[("O", 2)]),
    ("NH4", 1, &[("N", 1), ("H", 4)]),
    ("H3O", 1, &[("H", 3), ("O", 1)]),
    ("Hg2", 2, &[("Hg", 2)]),
];

/// In-memory element and ion database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodicTable {
    elements: IndexMap<String, Element>,
    ions: Vec<KnownIon>,
}

#[derive(Deserialize)]
struct TableFile {
    elements: Vec<Element>,
    #[serde(default)]
    ions: Vec<KnownIon>,
}

static STANDARD_TABLE: OnceLock<PeriodicTable> = OnceLock::new();

impl PeriodicTable {
    /// Table filled from the built-in element and ion lists.
    pub fn builtin() -> Self {
        let elements = ELEMENTS
            .iter()
            .map(|r| {
                (
                    r.symbol.to_string(),
                    Element::new(r.symbol, r.name, r.number, r.mass, r.states.to_vec(), r.metal),
                )
            })
            .collect();
        let ions = POLYATOMIC_IONS
            .iter()
            .map(|(formula, charge, atoms)| KnownIon {
                formula: formula.to_string(),
                charge: *charge,
                atoms: atoms.iter().map(|(s, c)| (s.to_string(), *c)).collect(),
            })
            .collect();
        Self { elements, ions }
    }

    /// Shared read-only instance of the built-in table.
    pub fn standard() -> &'static PeriodicTable {
        STANDARD_TABLE.get_or_init(PeriodicTable::builtin)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ChemistryError> {
        let file: TableFile =
            serde_json::from_str(json).map_err(|e| ChemistryError::Database(e.to_string()))?;
        let mut elements = IndexMap::new();
        for element in file.elements {
            if elements.contains_key(&element.symbol) {
                return Err(ChemistryError::Database(format!(
                    "element '{}' is listed twice",
                    element.symbol
                )));
            }
            elements.insert(element.symbol.clone(), element);
        }
        for ion in &file.ions {
            if let Some(symbol) = ion.atoms.keys().find(|s| !elements.contains_key(*s)) {
                return Err(ChemistryError::Database(format!(
                    "ion '{}' refers to unknown element '{}'",
                    ion.formula, symbol
                )));
            }
            if ion.charge == 0 {
                return Err(ChemistryError::Database(format!(
                    "ion '{}' must carry a non-zero charge",
                    ion.formula
                )));
            }
        }
        Ok(Self {
            elements,
            ions: file.ions,
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ChemistryError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            ChemistryError::Database(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_json_str(&content)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.elements.keys().map(|s| s.as_str())
    }
}

impl ElementDatabase for PeriodicTable {
    fn element(&self, symbol: &str) -> Option<&Element> {
        self.elements.get(symbol)
    }

    fn polyatomic_ions(&self) -> &[KnownIon] {
        &self.ions
    }
}

/// Element from the built-in table. Only called with symbols present in `ELEMENTS`.
pub(crate) fn standard_element(symbol: &str) -> Element {
    PeriodicTable::standard()
        .element(symbol)
        .cloned()
        .unwrap_or_else(|| panic!("element {} is missing from the built-in table", symbol))
}
