use crate::Core::errors::ChemistryError;
use crate::Core::periodic_table::Element;
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::hash::{Hash, Hasher};

/// Atomic composition: element counts (strictly positive) plus the net charge.
///
/// Insertion order of the elements is kept and used for rendering; equality and hashing do not
/// depend on it.
fn overflow() -> ChemistryError {
    ChemistryError::InvalidComposition("atom count is too large".to_string())
}

#[derive(Debug, Clone)]
pub struct Composition {
    atoms: IndexMap<Element, u32>,
    charge: i32,
}

impl Composition {
    pub fn new(atoms: IndexMap<Element, u32>, charge: i32) -> Result<Self, ChemistryError> {
        if atoms.is_empty() {
            return Err(ChemistryError::InvalidComposition(
                "composition must contain at least one element".to_string(),
            ));
        }
        if let Some((element, _)) = atoms.iter().find(|(_, count)| **count == 0) {
            return Err(ChemistryError::InvalidComposition(format!(
                "count of {} must be positive",
                element.symbol
            )));
        }
        Ok(Self { atoms, charge })
    }

    /// Builds a composition from (element, count) pairs; repeated elements are summed and keep
    /// the position of their first occurrence.
    pub fn from_pairs(pairs: Vec<(Element, u32)>, charge: i32) -> Result<Self, ChemistryError> {
        let mut atoms: IndexMap<Element, u32> = IndexMap::new();
        for (element, count) in pairs {
            if count == 0 {
                return Err(ChemistryError::InvalidComposition(format!(
                    "count of {} must be positive",
                    element.symbol
                )));
            }
            let total = atoms.entry(element).or_insert(0);
            *total = total.checked_add(count).ok_or_else(overflow)?;
        }
        Self::new(atoms, charge)
    }

    pub fn single(element: Element, count: u32) -> Result<Self, ChemistryError> {
        Self::from_pairs(vec![(element, count)], 0)
    }

    /// Merges counts and sums charges.
    pub fn add(&self, other: &Composition) -> Result<Composition, ChemistryError> {
        let mut atoms = self.atoms.clone();
        for (element, count) in &other.atoms {
            let total = atoms.entry(element.clone()).or_insert(0);
            *total = total.checked_add(*count).ok_or_else(overflow)?;
        }
        let charge = self.charge.checked_add(other.charge).ok_or_else(overflow)?;
        Ok(Composition { atoms, charge })
    }

    /// Multiplies every count by `k`; the charge is left as it is.
    pub fn scale(&self, k: u32) -> Result<Composition, ChemistryError> {
        if k == 0 {
            return Err(ChemistryError::InvalidComposition(
                "scale factor must be positive".to_string(),
            ));
        }
        let atoms = self
            .atoms
            .iter()
            .map(|(element, count)| {
                count
                    .checked_mul(k)
                    .map(|scaled| (element.clone(), scaled))
                    .ok_or_else(overflow)
            })
            .collect::<Result<IndexMap<Element, u32>, ChemistryError>>()?;
        Ok(Composition {
            atoms,
            charge: self.charge,
        })
    }

    pub fn with_charge(&self, charge: i32) -> Composition {
        Composition {
            atoms: self.atoms.clone(),
            charge,
        }
    }

    pub fn neutral(&self) -> Composition {
        self.with_charge(0)
    }

    pub fn charge(&self) -> i32 {
        self.charge
    }

    pub fn count(&self, symbol: &str) -> u32 {
        self.atoms
            .iter()
            .find(|(element, _)| element.symbol == symbol)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }

    /// Number of distinct elements.
    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Total number of atoms.
    pub fn atom_count(&self) -> u64 {
        self.atoms.values().map(|count| *count as u64).sum()
    }

    pub fn elements(&self) -> Vec<Element> {
        self.atoms.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Element, u32)> {
        self.atoms.iter().map(|(element, count)| (element, *count))
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.count(symbol) > 0
    }

    pub fn molar_mass(&self) -> f64 {
        self.atoms
            .iter()
            .map(|(element, count)| element.atomic_mass * *count as f64)
            .sum()
    }

    /// Element symbols with counts in insertion order, charge not included: `SO4`, `H2`.
    pub fn render_body(&self) -> String {
        self.atoms
            .iter()
            .map(|(element, count)| {
                if *count == 1 {
                    element.symbol.clone()
                } else {
                    format!("{}{}", element.symbol, count)
                }
            })
            .collect()
    }

    fn sorted_entries(&self) -> Vec<(&str, u32)> {
        let mut entries: Vec<(&str, u32)> = self
            .atoms
            .iter()
            .map(|(element, count)| (element.symbol.as_str(), *count))
            .collect();
        entries.sort();
        entries
    }
}

impl PartialEq for Composition {
    fn eq(&self, other: &Self) -> bool {
        // IndexMap equality does not depend on order
        self.charge == other.charge && self.atoms == other.atoms
    }
}

impl Eq for Composition {}

impl Hash for Composition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sorted_entries().hash(state);
        self.charge.hash(state);
    }
}

impl Serialize for Composition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let atoms: IndexMap<&str, u32> = self
            .atoms
            .iter()
            .map(|(element, count)| (element.symbol.as_str(), *count))
            .collect();
        let mut state = serializer.serialize_struct("Composition", 2)?;
        state.serialize_field("atoms", &atoms)?;
        state.serialize_field("charge", &self.charge)?;
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Core::periodic_table::standard_element;
    use approx::assert_relative_eq;
    use std::collections::HashSet;

    fn comp(pairs: &[(&str, u32)], charge: i32) -> Composition {
        Composition::from_pairs(
            pairs
                .iter()
                .map(|(s, c)| (standard_element(s), *c))
                .collect(),
            charge,
        )
        .unwrap()
    }

    #[test]
    fn test_zero_count_is_rejected() {
        let result = Composition::from_pairs(vec![(standard_element("H"), 0)], 0);
        assert!(matches!(result, Err(ChemistryError::InvalidComposition(_))));
        assert!(Composition::from_pairs(vec![], 0).is_err());
    }

    #[test]
    fn test_equality_ignores_order() {
        let a = comp(&[("H", 2), ("O", 1)], 0);
        let b = comp(&[("O", 1), ("H", 2)], 0);
        assert_eq!(a, b);
        let set: HashSet<Composition> = [a.clone(), b].into_iter().collect();
        assert_eq!(set.len(), 1);
        assert_ne!(a, a.with_charge(1));
    }

    #[test]
    fn test_add_and_scale() {
        let na = comp(&[("Na", 1)], 1);
        let oh = comp(&[("O", 1), ("H", 1)], -1);
        let naoh = na.add(&oh).unwrap();
        assert_eq!(naoh, comp(&[("Na", 1), ("O", 1), ("H", 1)], 0));
        assert_eq!(naoh.render_body(), "NaOH");

        let so4 = comp(&[("S", 1), ("O", 4)], -2);
        let scaled = so4.scale(3).unwrap();
        assert_eq!(scaled.count("O"), 12);
        assert_eq!(scaled.charge(), -2);
        assert!(so4.scale(0).is_err());
    }

    #[test]
    fn test_count_overflow_is_an_error() {
        let big = comp(&[("H", u32::MAX)], 0);
        assert!(matches!(
            big.add(&comp(&[("H", 1)], 0)),
            Err(ChemistryError::InvalidComposition(_))
        ));
        assert!(matches!(
            big.scale(2),
            Err(ChemistryError::InvalidComposition(_))
        ));
        let merged = Composition::from_pairs(
            vec![(standard_element("H"), u32::MAX), (standard_element("H"), 1)],
            0,
        );
        assert!(matches!(merged, Err(ChemistryError::InvalidComposition(_))));
        assert_eq!(big.atom_count(), u32::MAX as u64);
    }

    #[test]
    fn test_molar_mass() {
        let water = comp(&[("H", 2), ("O", 1)], 0);
        assert_relative_eq!(water.molar_mass(), 18.015, epsilon = 1e-3);
        assert_eq!(water.atom_count(), 3);
        assert_eq!(water.len(), 2);
    }

    #[test]
    fn test_serialize() {
        let so4 = comp(&[("S", 1), ("O", 4)], -2);
        let json = serde_json::to_string(&so4).unwrap();
        assert_eq!(json, r#"{"atoms":{"S":1,"O":4},"charge":-2}"#);
    }
}
