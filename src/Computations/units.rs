//! Units of measurement grouped by dimension. Values are converted through the SI unit of their
//! dimension: `si = value * factor + offset` (the offset is only used by degrees Celsius).
//! Conversion is allowed within one dimension only.
use crate::Computations::errors::ComputationError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dimension {
    Mass,
    Amount,
    Volume,
    MolarMass,
    MolarVolume,
    Concentration,
    Density,
    Pressure,
    Temperature,
    GasConstant,
    Dimensionless,
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dimension::Mass => "mass",
            Dimension::Amount => "amount of substance",
            Dimension::Volume => "volume",
            Dimension::MolarMass => "molar mass",
            Dimension::MolarVolume => "molar volume",
            Dimension::Concentration => "concentration",
            Dimension::Density => "density",
            Dimension::Pressure => "pressure",
            Dimension::Temperature => "temperature",
            Dimension::GasConstant => "molar gas constant",
            Dimension::Dimensionless => "dimensionless",
        };
        write!(f, "{}", name)
    }
}

// (accepted spellings, dimension, factor to SI, offset to SI); the first spelling is canonical
const UNITS: &[(&[&str], Dimension, f64, f64)] = &[
    (&["kg", "kilogram"], Dimension::Mass, 1.0, 0.0),
    (&["g", "gram", "grams"], Dimension::Mass, 1e-3, 0.0),
    (&["mg"], Dimension::Mass, 1e-6, 0.0),
    (&["ug", "µg"], Dimension::Mass, 1e-9, 0.0),
    (&["t", "tonne"], Dimension::Mass, 1e3, 0.0),
    (&["mol", "mole", "moles"], Dimension::Amount, 1.0, 0.0),
    (&["mmol"], Dimension::Amount, 1e-3, 0.0),
    (&["umol", "µmol"], Dimension::Amount, 1e-6, 0.0),
    (&["kmol"], Dimension::Amount, 1e3, 0.0),
    (&["m3"], Dimension::Volume, 1.0, 0.0),
    (&["L", "l", "dm3", "liter", "litre"], Dimension::Volume, 1e-3, 0.0),
    (&["mL", "ml", "cm3"], Dimension::Volume, 1e-6, 0.0),
    (&["uL", "µL"], Dimension::Volume, 1e-9, 0.0),
    (&["kg/mol"], Dimension::MolarMass, 1.0, 0.0),
    (&["g/mol"], Dimension::MolarMass, 1e-3, 0.0),
    (&["m3/mol"], Dimension::MolarVolume, 1.0, 0.0),
    (&["L/mol", "l/mol", "dm3/mol"], Dimension::MolarVolume, 1e-3, 0.0),
    (&["mL/mol", "ml/mol", "cm3/mol"], Dimension::MolarVolume, 1e-6, 0.0),
    (&["mol/m3"], Dimension::Concentration, 1.0, 0.0),
    (&["mol/L", "mol/l", "mol/dm3", "M"], Dimension::Concentration, 1e3, 0.0),
    (&["mmol/L", "mmol/l", "mM"], Dimension::Concentration, 1.0, 0.0),
    (&["kg/m3"], Dimension::Density, 1.0, 0.0),
    (&["g/L", "g/l", "g/dm3"], Dimension::Density, 1.0, 0.0),
    (&["g/mL", "g/ml", "g/cm3", "kg/L", "kg/l"], Dimension::Density, 1e3, 0.0),
    (&["Pa"], Dimension::Pressure, 1.0, 0.0),
    (&["kPa"], Dimension::Pressure, 1e3, 0.0),
    (&["MPa"], Dimension::Pressure, 1e6, 0.0),
    (&["bar"], Dimension::Pressure, 1e5, 0.0),
    (&["atm"], Dimension::Pressure, 101325.0, 0.0),
    (&["mmHg", "torr", "Torr"], Dimension::Pressure, 133.322368, 0.0),
    (&["K"], Dimension::Temperature, 1.0, 0.0),
    (&["degC", "°C", "C"], Dimension::Temperature, 1.0, 273.15),
    (
        &["J/(mol*K)", "J/mol/K", "J/(K*mol)", "J/molK"],
        Dimension::GasConstant,
        1.0,
        0.0,
    ),
    (&["", "1", "dimensionless"], Dimension::Dimensionless, 1.0, 0.0),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub symbol: String,
    pub dimension: Dimension,
    pub factor: f64,
    pub offset: f64,
}

fn normalize(symbol: &str) -> String {
    symbol
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .replace("**", "")
        .replace('^', "")
        .replace(['·', '.'], "*")
}

impl Unit {
    /// Unit by symbol: `g`, `mol/L`, `J/(mol*K)`, `m^3`, ...
    pub fn parse(symbol: &str) -> Result<Unit, ComputationError> {
        let normalized = normalize(symbol);
        UNITS
            .iter()
            .find(|(names, ..)| names.contains(&normalized.as_str()))
            .map(|(names, dimension, factor, offset)| Unit {
                symbol: names[0].to_string(),
                dimension: *dimension,
                factor: *factor,
                offset: *offset,
            })
            .ok_or_else(|| ComputationError::UnknownUnit(symbol.to_string()))
    }

    /// SI unit of a dimension.
    pub fn si(dimension: Dimension) -> Unit {
        UNITS
            .iter()
            .find(|(_, d, factor, offset)| *d == dimension && *factor == 1.0 && *offset == 0.0)
            .map(|(names, ..)| Unit {
                symbol: names[0].to_string(),
                dimension,
                factor: 1.0,
                offset: 0.0,
            })
            .unwrap_or_else(|| unreachable!("every dimension has an SI unit in the table"))
    }

    pub fn is_si(&self) -> bool {
        self.factor == 1.0 && self.offset == 0.0
    }

    pub fn to_si(&self, value: f64) -> f64 {
        value * self.factor + self.offset
    }

    pub fn from_si(&self, value: f64) -> f64 {
        (value - self.offset) / self.factor
    }

    pub fn convertible(&self, other: &Unit) -> bool {
        self.dimension == other.dimension
    }

    /// Converts `value` given in `self` into `to`.
    pub fn convert(&self, value: f64, to: &Unit) -> Result<f64, ComputationError> {
        if !self.convertible(to) {
            return Err(ComputationError::IncompatibleUnits {
                from: self.symbol.clone(),
                to: to.symbol.clone(),
            });
        }
        Ok(to.from_si(self.to_si(value)))
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}
