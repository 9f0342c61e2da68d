//! Substance variants: simple substances (one element), ions and ionic molecules.
//!
//! `Substance` is a closed enum over the three variants; the shared capabilities live in the
//! [`Particle`] trait and are dispatched with `enum_dispatch`. Two substances are equal when
//! their compositions (atoms and charge) are equal, whatever variant or rendering produced them.
//!
//! A `Molecule` is always a cation plus an anion in the minimal charge-balancing ratio:
//! the index of each ion is `lcm(|q+|, |q-|) / |q|`.
use crate::Core::composition::Composition;
use crate::Core::errors::ChemistryError;
use crate::Core::formula_parser;
use crate::Core::periodic_table::{Element, standard_element};
use enum_dispatch::enum_dispatch;
use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Elements that exist as diatomic simple substances.
pub const DIATOMIC: [&str; 7] = ["H", "N", "O", "F", "Cl", "Br", "I"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubstanceClass {
    Metal,
    Nonmetal,
    Acid,
    Base,
    Oxide,
    Salt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Gas,
    Liquid,
    Solid,
    Aqueous,
}

impl Phase {
    pub fn mark(&self) -> &'static str {
        match self {
            Phase::Gas => "(g)",
            Phase::Liquid => "(l)",
            Phase::Solid => "(s)",
            Phase::Aqueous => "(aq)",
        }
    }
}

#[enum_dispatch]
pub trait Particle {
    fn composition(&self) -> Composition;
    /// canonical rendering; parsing it gives back an equal substance
    fn formula(&self) -> String;

    fn charge(&self) -> i32 {
        self.composition().charge()
    }
    /// g/mol
    fn molar_mass(&self) -> f64 {
        self.composition().molar_mass()
    }
    fn elements(&self) -> Vec<Element> {
        self.composition().elements()
    }
    /// number of distinct elements
    fn size(&self) -> usize {
        self.composition().len()
    }
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 { a } else { gcd(b, a % b) }
}

fn lcm(a: u32, b: u32) -> Option<u32> {
    (a / gcd(a, b)).checked_mul(b)
}

//////////////////////////////////////////////////////////////////////////////////
// Simple
//////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Simple {
    element: Element,
    index: u32,
}

impl Simple {
    pub fn new(element: Element, index: u32) -> Result<Self, ChemistryError> {
        if index == 0 {
            return Err(ChemistryError::InvalidComposition(format!(
                "index of {} must be positive",
                element.symbol
            )));
        }
        Ok(Self { element, index })
    }

    /// Simple substance of an element as it usually exists: diatomic elements get index 2.
    pub fn from_element(element: Element) -> Self {
        let index = if DIATOMIC.contains(&element.symbol.as_str()) {
            2
        } else {
            1
        };
        Self { element, index }
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn simple_class(&self) -> SubstanceClass {
        if self.element.metal {
            SubstanceClass::Metal
        } else {
            SubstanceClass::Nonmetal
        }
    }
}

impl Particle for Simple {
    fn composition(&self) -> Composition {
        Composition::from_pairs(vec![(self.element.clone(), self.index)], 0)
            .unwrap_or_else(|_| unreachable!("index is checked on construction"))
    }

    fn formula(&self) -> String {
        if self.index == 1 {
            self.element.symbol.clone()
        } else {
            format!("{}{}", self.element.symbol, self.index)
        }
    }
}

//////////////////////////////////////////////////////////////////////////////////
// Ion
//////////////////////////////////////////////////////////////////////////////////

/// Charged particle. `label` is an optional preferred rendering of the body (`CH3COO` rather
/// than `C2H3O2`); it never takes part in comparisons.
#[derive(Debug, Clone)]
pub struct Ion {
    composition: Composition,
    label: Option<String>,
}

impl Ion {
    pub fn new(composition: Composition) -> Result<Self, ChemistryError> {
        if composition.charge() == 0 {
            return Err(ChemistryError::InvalidComposition(format!(
                "ion {} must carry a non-zero charge",
                composition.render_body()
            )));
        }
        Ok(Self {
            composition,
            label: None,
        })
    }

    pub fn labelled(composition: Composition, label: &str) -> Result<Self, ChemistryError> {
        let mut ion = Self::new(composition)?;
        ion.label = Some(label.to_string());
        Ok(ion)
    }

    /// Monatomic ion in the largest (or smallest) oxidation state of the element.
    pub fn from_element(element: Element, largest: bool) -> Result<Self, ChemistryError> {
        let charge = element
            .extreme_state(largest)
            .filter(|q| *q != 0)
            .ok_or_else(|| {
                ChemistryError::InvalidComposition(format!(
                    "{} has no oxidation states to form an ion",
                    element.symbol
                ))
            })?;
        Self::new(Composition::single(element, 1)?.with_charge(charge))
    }

    pub fn proton() -> Self {
        Self::builtin(&[("H", 1)], 1)
    }

    pub fn hydroxide() -> Self {
        Self::builtin(&[("O", 1), ("H", 1)], -1)
    }

    pub fn oxide() -> Self {
        Self::builtin(&[("O", 1)], -2)
    }

    fn builtin(atoms: &[(&str, u32)], charge: i32) -> Self {
        let atoms = atoms
            .iter()
            .map(|(symbol, count)| (standard_element(symbol), *count))
            .collect();
        let composition = Composition::new(atoms, charge)
            .unwrap_or_else(|_| unreachable!("built-in ions have positive counts"));
        Self {
            composition,
            label: None,
        }
    }

    pub fn is_cation(&self) -> bool {
        self.composition.charge() > 0
    }

    pub fn is_anion(&self) -> bool {
        self.composition.charge() < 0
    }

    /// Rendering of the atoms without the charge: `SO4`, `NH4`.
    pub fn body(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| self.composition.render_body())
    }
}

impl Particle for Ion {
    fn composition(&self) -> Composition {
        self.composition.clone()
    }

    fn formula(&self) -> String {
        format!("{}({:+})", self.body(), self.composition.charge())
    }
}

impl PartialEq for Ion {
    fn eq(&self, other: &Self) -> bool {
        self.composition == other.composition
    }
}

impl Eq for Ion {}

impl Hash for Ion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.composition.hash(state);
    }
}

//////////////////////////////////////////////////////////////////////////////////
// Molecule
//////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Molecule {
    cation: Ion,
    anion: Ion,
    cation_index: u32,
    anion_index: u32,
    composition: Composition,
}

impl Molecule {
    pub fn new(cation: Ion, anion: Ion) -> Result<Self, ChemistryError> {
        if !cation.is_cation() {
            return Err(ChemistryError::InvalidComposition(format!(
                "{} is not a cation",
                cation.formula()
            )));
        }
        if !anion.is_anion() {
            return Err(ChemistryError::InvalidComposition(format!(
                "{} is not an anion",
                anion.formula()
            )));
        }
        let q_plus = cation.charge().unsigned_abs();
        let q_minus = anion.charge().unsigned_abs();
        let common = lcm(q_plus, q_minus).ok_or_else(|| {
            ChemistryError::InvalidComposition(format!(
                "charges of {} and {} are too large",
                cation.formula(),
                anion.formula()
            ))
        })?;
        Self::assemble(cation, common / q_plus, anion, common / q_minus)
    }

    fn assemble(
        cation: Ion,
        cation_index: u32,
        anion: Ion,
        anion_index: u32,
    ) -> Result<Self, ChemistryError> {
        let composition = cation
            .composition
            .neutral()
            .scale(cation_index)?
            .add(&anion.composition.neutral().scale(anion_index)?)?;
        Ok(Self {
            cation,
            anion,
            cation_index,
            anion_index,
            composition,
        })
    }

    pub fn acid(anion: Ion) -> Result<Self, ChemistryError> {
        Self::new(Ion::proton(), anion)
    }

    pub fn base(cation: Ion) -> Result<Self, ChemistryError> {
        Self::new(cation, Ion::hydroxide())
    }

    pub fn oxide(cation: Ion) -> Result<Self, ChemistryError> {
        Self::new(cation, Ion::oxide())
    }

    pub fn water() -> Self {
        Self::assemble(Ion::proton(), 2, Ion::oxide(), 1)
            .unwrap_or_else(|_| unreachable!("H2O counts are small"))
    }

    pub fn cation(&self) -> &Ion {
        &self.cation
    }

    pub fn anion(&self) -> &Ion {
        &self.anion
    }

    pub fn cation_index(&self) -> u32 {
        self.cation_index
    }

    pub fn anion_index(&self) -> u32 {
        self.anion_index
    }

    pub fn is_water(&self) -> bool {
        self.composition() == Molecule::water().composition()
    }

    /// Acid, base, oxide or salt; water counts as an oxide.
    pub fn simple_class(&self) -> SubstanceClass {
        if self.is_water() {
            SubstanceClass::Oxide
        } else if self.cation == Ion::proton() {
            SubstanceClass::Acid
        } else if self.anion == Ion::hydroxide() {
            SubstanceClass::Base
        } else if self.anion == Ion::oxide() {
            SubstanceClass::Oxide
        } else {
            SubstanceClass::Salt
        }
    }

    fn render_part(ion: &Ion, index: u32) -> String {
        if index == 1 {
            ion.body()
        } else if ion.composition.atom_count() == 1 {
            format!("{}{}", ion.body(), index)
        } else {
            format!("({}){}", ion.body(), index)
        }
    }
}

impl Particle for Molecule {
    fn composition(&self) -> Composition {
        self.composition.clone()
    }

    fn formula(&self) -> String {
        if self.is_water() {
            return "H2O".to_string();
        }
        format!(
            "{}{}",
            Self::render_part(&self.cation, self.cation_index),
            Self::render_part(&self.anion, self.anion_index)
        )
    }
}

//////////////////////////////////////////////////////////////////////////////////
// Substance
//////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone)]
#[enum_dispatch(Particle)]
pub enum Substance {
    Simple(Simple),
    Ion(Ion),
    Molecule(Molecule),
}

impl Substance {
    pub fn parse(text: &str) -> Result<Self, ChemistryError> {
        formula_parser::parse(text)
    }

    pub fn water() -> Self {
        Substance::Molecule(Molecule::water())
    }

    pub fn is_water(&self) -> bool {
        self.composition() == Molecule::water().composition()
    }

    /// Metal/nonmetal for simple substances, acid/base/oxide/salt for molecules, none for ions.
    pub fn simple_class(&self) -> Option<SubstanceClass> {
        match self {
            Substance::Simple(s) => Some(s.simple_class()),
            Substance::Molecule(m) => Some(m.simple_class()),
            Substance::Ion(_) => None,
        }
    }

    /// School-chemistry gas heuristic: H2, Cl2, N2, O2, and two-element substances that pair
    /// C, N or S with H or O (CO2, NH3, H2S, SO2, ...).
    pub fn is_gas(&self) -> bool {
        if let Substance::Ion(_) = self {
            return false;
        }
        let composition = self.composition();
        if composition.len() > 2 {
            return false;
        }
        if let Substance::Simple(s) = self {
            return s.index() == 2 && ["H", "Cl", "N", "O"].contains(&s.element().symbol.as_str());
        }
        composition.len() == 2
            && ["C", "N", "S"].iter().any(|s| composition.contains(s))
            && ["H", "O"].iter().any(|s| composition.contains(s))
    }
}

/// Simple substance of an element, diatomic elements with index 2.
pub fn simple_from_element(element: Element) -> Substance {
    Substance::Simple(Simple::from_element(element))
}

/// Monatomic ion of an element in its largest or smallest oxidation state.
pub fn ion_from_element(element: Element, largest: bool) -> Result<Substance, ChemistryError> {
    Ok(Substance::Ion(Ion::from_element(element, largest)?))
}

impl PartialEq for Substance {
    fn eq(&self, other: &Self) -> bool {
        self.composition() == other.composition()
    }
}

impl Eq for Substance {}

impl Hash for Substance {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.composition().hash(state);
    }
}

impl fmt::Display for Substance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formula())
    }
}

impl FromStr for Substance {
    type Err = ChemistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        formula_parser::parse(s)
    }
}

impl Serialize for Substance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.formula())
    }
}

impl<'de> Deserialize<'de> for Substance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        formula_parser::parse(&text).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_molecule_indices() {
        let al = Ion::from_element(standard_element("Al"), true).unwrap();
        let so4 = Ion::new(
            Composition::from_pairs(
                vec![(standard_element("S"), 1), (standard_element("O"), 4)],
                -2,
            )
            .unwrap(),
        )
        .unwrap();
        let salt = Molecule::new(al, so4).unwrap();
        assert_eq!(salt.cation_index(), 2);
        assert_eq!(salt.anion_index(), 3);
        assert_eq!(salt.formula(), "Al2(SO4)3");
        assert_eq!(salt.charge(), 0);
        assert_eq!(salt.simple_class(), SubstanceClass::Salt);
        assert_relative_eq!(salt.molar_mass(), 342.15, epsilon = 0.05);
    }

    #[test]
    fn test_molecule_needs_cation_and_anion() {
        let result = Molecule::new(Ion::hydroxide(), Ion::oxide());
        assert!(matches!(result, Err(ChemistryError::InvalidComposition(_))));
    }

    #[test]
    fn test_ion_formula() {
        assert_eq!(Ion::proton().formula(), "H(+1)");
        assert_eq!(Ion::oxide().formula(), "O(-2)");
        assert_eq!(Ion::hydroxide().formula(), "OH(-1)");
        let neutral = Composition::single(standard_element("Na"), 1).unwrap();
        assert!(Ion::new(neutral).is_err());
    }

    #[test]
    fn test_water_renderings_agree() {
        let hoh = Molecule::new(Ion::proton(), Ion::hydroxide()).unwrap();
        assert_eq!(hoh.formula(), "H2O");
        assert_eq!(Substance::Molecule(hoh), Substance::water());
        assert_eq!(Substance::water().simple_class(), Some(SubstanceClass::Oxide));
    }

    #[test]
    fn test_classes() {
        let na = Ion::from_element(standard_element("Na"), true).unwrap();
        assert_eq!(
            Molecule::base(na.clone()).unwrap().simple_class(),
            SubstanceClass::Base
        );
        assert_eq!(
            Molecule::oxide(na).unwrap().simple_class(),
            SubstanceClass::Oxide
        );
        let cl = Ion::from_element(standard_element("Cl"), false).unwrap();
        assert_eq!(
            Molecule::acid(cl).unwrap().simple_class(),
            SubstanceClass::Acid
        );
        assert_eq!(
            simple_from_element(standard_element("Fe")).simple_class(),
            Some(SubstanceClass::Metal)
        );
        assert_eq!(
            simple_from_element(standard_element("S")).simple_class(),
            Some(SubstanceClass::Nonmetal)
        );
    }

    #[test]
    fn test_simple_from_element() {
        let o2 = simple_from_element(standard_element("O"));
        assert_eq!(o2.formula(), "O2");
        let na = simple_from_element(standard_element("Na"));
        assert_eq!(na.formula(), "Na");
        assert!(Simple::new(standard_element("Na"), 0).is_err());
        assert!(ion_from_element(standard_element("He"), true).is_err());
    }

    #[test]
    fn test_is_gas() {
        for (formula, gas) in [
            ("H2", true),
            ("O2", true),
            ("Cl2", true),
            ("Br2", false),
            ("CO2", true),
            ("NH3", true),
            ("SO2", true),
            ("H2O", false),
            ("NaOH", false),
            ("Na", false),
        ] {
            let substance = Substance::parse(formula).unwrap();
            assert_eq!(substance.is_gas(), gas, "{}", formula);
        }
    }
}
