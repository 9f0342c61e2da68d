use crate::Core::balancer::{balance, create_elem_composition_matrix};
use crate::Core::errors::ChemistryError;
use crate::Core::formula_parser::parse_with_phase;
use crate::Core::periodic_table::PeriodicTable;
use crate::Core::substances::{Particle, Phase, Substance};
use indexmap::IndexMap;
use prettytable::{Cell, Row, Table};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static ARROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*(?:->|=>|→|=)\s*").expect("arrow pattern must compile"));
static SPACED_PLUS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+\+\s+").expect("separator pattern must compile"));
static LEADING_COEFFICIENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s*(\S.*)$").expect("coefficient pattern must compile"));

/// School classification by the number and kind of reacting substances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReactionType {
    /// several reagents, one product
    Addition,
    /// one reagent, several products
    Decomposition,
    /// molecules only on the reagent side
    Exchange,
    /// a simple substance and a molecule react
    Substitution,
    Other,
}

/// Balanced chemical reaction. Coefficients are listed for reagents first, then products.
/// Phase marks are informational and do not take part in equality.
#[derive(Debug, Clone, Serialize)]
pub struct Reaction {
    reagents: Vec<Substance>,
    products: Vec<Substance>,
    coefficients: Vec<u32>,
    #[serde(skip)]
    phases: Vec<Option<Phase>>,
}

impl Reaction {
    /// Balances the reaction; an unbalanceable or ambiguous scheme is an error.
    pub fn new(reagents: Vec<Substance>, products: Vec<Substance>) -> Result<Self, ChemistryError> {
        let phases = vec![None; reagents.len() + products.len()];
        Self::with_phases(reagents, products, phases)
    }

    fn with_phases(
        reagents: Vec<Substance>,
        products: Vec<Substance>,
        phases: Vec<Option<Phase>>,
    ) -> Result<Self, ChemistryError> {
        let all: Vec<&Substance> = reagents.iter().chain(products.iter()).collect();
        for (i, substance) in all.iter().enumerate() {
            if all[..i].contains(substance) {
                return Err(ChemistryError::InvalidReaction(format!(
                    "{} is listed more than once",
                    substance.formula()
                )));
            }
        }
        let coefficients = balance(&reagents, &products)?;
        Ok(Self {
            reagents,
            products,
            coefficients,
            phases,
        })
    }

    /// Parses `A + B -> C + D`; `=` and `=>` are accepted as arrows, leading coefficients are
    /// dropped and recomputed. Charged species need whitespace around the `+` separators.
    pub fn from_text(text: &str) -> Result<Self, ChemistryError> {
        let sides: Vec<&str> = ARROW.split(text.trim()).collect();
        if sides.len() != 2 {
            return Err(ChemistryError::syntax(
                text,
                "a reaction needs exactly one arrow ('->', '=>' or '=')",
            ));
        }
        let table = PeriodicTable::standard();
        let mut substances = [Vec::new(), Vec::new()];
        let mut phases = Vec::new();
        for (side, list) in sides.iter().zip(substances.iter_mut()) {
            for item in split_side(side) {
                let item = item.trim();
                if item.is_empty() {
                    return Err(ChemistryError::syntax(text, "empty substance in reaction"));
                }
                let formula = match LEADING_COEFFICIENT.captures(item) {
                    Some(caps) => caps.get(2).map_or(item, |m| m.as_str()),
                    None => item,
                };
                let (substance, phase) = parse_with_phase(formula, table)?;
                list.push(substance);
                phases.push(phase);
            }
        }
        let [reagents, products] = substances;
        Self::with_phases(reagents, products, phases)
    }

    pub fn reagents(&self) -> &[Substance] {
        &self.reagents
    }

    pub fn products(&self) -> &[Substance] {
        &self.products
    }

    pub fn coefficients(&self) -> &[u32] {
        &self.coefficients
    }

    /// Reagents then products.
    pub fn substances(&self) -> Vec<&Substance> {
        self.reagents.iter().chain(self.products.iter()).collect()
    }

    fn position(&self, substance: &Substance) -> Option<usize> {
        self.substances().iter().position(|s| *s == substance)
    }

    pub fn coefficient_of(&self, substance: &Substance) -> Option<u32> {
        self.position(substance).map(|i| self.coefficients[i])
    }

    pub fn is_reagent(&self, substance: &Substance) -> bool {
        self.reagents.contains(substance)
    }

    pub fn is_product(&self, substance: &Substance) -> bool {
        self.products.contains(substance)
    }

    /// Phase mark given in the reaction text, if any.
    pub fn phase_of(&self, substance: &Substance) -> Option<Phase> {
        self.position(substance).and_then(|i| self.phases[i])
    }

    /// Formula -> coefficient, reagents first.
    pub fn string_coefficients(&self) -> IndexMap<String, u32> {
        self.substances()
            .into_iter()
            .zip(self.coefficients.iter())
            .map(|(s, c)| (s.formula(), *c))
            .collect()
    }

    /// `Na + H2O -> NaOH + H2`
    pub fn scheme(&self) -> String {
        let side = |list: &[Substance]| {
            list.iter()
                .map(|s| s.formula())
                .collect::<Vec<_>>()
                .join(" + ")
        };
        format!("{} -> {}", side(&self.reagents), side(&self.products))
    }

    /// `2Na + 2H2O = 2NaOH + H2`
    pub fn equation(&self) -> String {
        let n = self.reagents.len();
        let side = |list: &[Substance], offset: usize| {
            list.iter()
                .enumerate()
                .map(|(i, s)| match self.coefficients[offset + i] {
                    1 => s.formula(),
                    c => format!("{}{}", c, s.formula()),
                })
                .collect::<Vec<_>>()
                .join(" + ")
        };
        format!("{} = {}", side(&self.reagents, 0), side(&self.products, n))
    }

    pub fn reaction_type(&self) -> ReactionType {
        let molecules = self
            .reagents
            .iter()
            .filter(|s| matches!(s, Substance::Molecule(_)))
            .count();
        let simples = self
            .reagents
            .iter()
            .filter(|s| matches!(s, Substance::Simple(_)))
            .count();
        if self.reagents.len() > 1 && self.products.len() == 1 {
            ReactionType::Addition
        } else if self.reagents.len() == 1 && self.products.len() > 1 {
            ReactionType::Decomposition
        } else if molecules == self.reagents.len() {
            ReactionType::Exchange
        } else if simples > 0 && molecules > 0 && simples + molecules == self.reagents.len() {
            ReactionType::Substitution
        } else {
            ReactionType::Other
        }
    }

    /// Every element and the charge are conserved exactly with the stored coefficients.
    pub fn is_balanced(&self) -> bool {
        let (matrix, _) = create_elem_composition_matrix(&self.reagents, &self.products);
        (0..matrix.nrows()).all(|i| {
            (0..matrix.ncols())
                .map(|j| matrix[(i, j)] * self.coefficients[j] as i64)
                .sum::<i64>()
                == 0
        })
    }

    /// Σ coeff·M over reagents equals Σ coeff·M over products within `abs_tol` g/mol.
    pub fn mass_conservation_test(&self, abs_tol: f64) -> bool {
        let n = self.reagents.len();
        let side = |list: &[Substance], offset: usize| -> f64 {
            list.iter()
                .enumerate()
                .map(|(i, s)| self.coefficients[offset + i] as f64 * s.molar_mass())
                .sum()
        };
        (side(&self.reagents, 0) - side(&self.products, n)).abs() <= abs_tol
    }

    pub fn pretty_print(&self) {
        let mut table = Table::new();
        table.add_row(Row::new(vec![
            Cell::new("substance"),
            Cell::new("role"),
            Cell::new("coefficient"),
            Cell::new("M, g/mol"),
        ]));
        for (i, substance) in self.substances().into_iter().enumerate() {
            let role = if i < self.reagents.len() {
                "reagent"
            } else {
                "product"
            };
            table.add_row(Row::new(vec![
                Cell::new(&substance.formula()),
                Cell::new(role),
                Cell::new(&self.coefficients[i].to_string()),
                Cell::new(&format!("{:.3}", substance.molar_mass())),
            ]));
        }
        println!("{}", self.equation());
        table.printstd();
    }
}

fn split_side(side: &str) -> Vec<&str> {
    if SPACED_PLUS.is_match(side) {
        SPACED_PLUS.split(side).collect()
    } else {
        side.split('+').collect()
    }
}

impl PartialEq for Reaction {
    fn eq(&self, other: &Self) -> bool {
        self.reagents == other.reagents
            && self.products == other.products
            && self.coefficients == other.coefficients
    }
}

impl FromStr for Reaction {
    type Err = ChemistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Reaction::from_text(s)
    }
}

impl fmt::Display for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.equation())
    }
}
