use crate::Computations::errors::ComputationError;
use crate::Computations::units::{Dimension, Unit};
use crate::Core::substances::{Particle, Substance};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use std::sync::LazyLock;

static DATUM_STRING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?P<name>[A-Za-z_][A-Za-z0-9_]*)\s*=\s*(?P<value>[-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)\s*(?P<unit>.*?)\s*$",
    )
    .expect("datum pattern must compile")
});

/// Physical quantities the solver knows how to relate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QuantityKind {
    Mass,
    Moles,
    MolarMass,
    Volume,
    SolutionVolume,
    Concentration,
    Density,
    MolarVolume,
    Pressure,
    Temperature,
    GasConstant,
}

impl QuantityKind {
    pub const ALL: [QuantityKind; 11] = [
        QuantityKind::Mass,
        QuantityKind::Moles,
        QuantityKind::MolarMass,
        QuantityKind::Volume,
        QuantityKind::SolutionVolume,
        QuantityKind::Concentration,
        QuantityKind::Density,
        QuantityKind::MolarVolume,
        QuantityKind::Pressure,
        QuantityKind::Temperature,
        QuantityKind::GasConstant,
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            QuantityKind::Mass => "m",
            QuantityKind::Moles => "n",
            QuantityKind::MolarMass => "M",
            QuantityKind::Volume => "V",
            QuantityKind::SolutionVolume => "Vs",
            QuantityKind::Concentration => "c",
            QuantityKind::Density => "rho",
            QuantityKind::MolarVolume => "V0",
            QuantityKind::Pressure => "P",
            QuantityKind::Temperature => "T",
            QuantityKind::GasConstant => "R",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            QuantityKind::Mass => "mass",
            QuantityKind::Moles => "amount of substance",
            QuantityKind::MolarMass => "molar mass",
            QuantityKind::Volume => "volume",
            QuantityKind::SolutionVolume => "solution volume",
            QuantityKind::Concentration => "molar concentration",
            QuantityKind::Density => "density",
            QuantityKind::MolarVolume => "molar volume",
            QuantityKind::Pressure => "pressure",
            QuantityKind::Temperature => "temperature",
            QuantityKind::GasConstant => "molar gas constant",
        }
    }

    pub fn dimension(&self) -> Dimension {
        match self {
            QuantityKind::Mass => Dimension::Mass,
            QuantityKind::Moles => Dimension::Amount,
            QuantityKind::MolarMass => Dimension::MolarMass,
            QuantityKind::Volume | QuantityKind::SolutionVolume => Dimension::Volume,
            QuantityKind::Concentration => Dimension::Concentration,
            QuantityKind::Density => Dimension::Density,
            QuantityKind::MolarVolume => Dimension::MolarVolume,
            QuantityKind::Pressure => Dimension::Pressure,
            QuantityKind::Temperature => Dimension::Temperature,
            QuantityKind::GasConstant => Dimension::GasConstant,
        }
    }

    /// Unit used for answers when the caller did not ask for one.
    pub fn default_unit(&self) -> Unit {
        let symbol = match self {
            QuantityKind::Mass => "g",
            QuantityKind::Moles => "mol",
            QuantityKind::MolarMass => "g/mol",
            QuantityKind::Volume | QuantityKind::SolutionVolume => "L",
            QuantityKind::Concentration => "mol/L",
            QuantityKind::Density => "g/mL",
            QuantityKind::MolarVolume => "L/mol",
            QuantityKind::Pressure => "Pa",
            QuantityKind::Temperature => "K",
            QuantityKind::GasConstant => "J/(mol*K)",
        };
        Unit::parse(symbol).unwrap_or_else(|_| Unit::si(self.dimension()))
    }

    /// Quantities that belong to the surroundings rather than to one substance.
    pub fn is_environmental(&self) -> bool {
        matches!(
            self,
            QuantityKind::MolarVolume
                | QuantityKind::Pressure
                | QuantityKind::Temperature
                | QuantityKind::GasConstant
        )
    }

    pub fn from_symbol(symbol: &str) -> Option<QuantityKind> {
        QuantityKind::ALL
            .into_iter()
            .find(|kind| kind.symbol() == symbol || kind.name() == symbol)
    }

    /// Kind implied by a dimension; volume means the volume of the substance itself.
    pub fn for_dimension(dimension: Dimension) -> Option<QuantityKind> {
        QuantityKind::ALL
            .into_iter()
            .find(|kind| kind.dimension() == dimension)
    }
}

impl fmt::Display for QuantityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A value of a quantity with its unit, e.g. `m = 25 g`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datum {
    variable: String,
    kind: QuantityKind,
    value: f64,
    unit: Unit,
}

impl Datum {
    /// Datum named by the symbol of its kind. Negative values are rejected.
    pub fn new(kind: QuantityKind, value: f64, unit: &str) -> Result<Self, ComputationError> {
        Self::named(kind.symbol(), kind, value, unit)
    }

    pub fn named(
        variable: &str,
        kind: QuantityKind,
        value: f64,
        unit: &str,
    ) -> Result<Self, ComputationError> {
        Self::with_unit(variable, kind, value, Unit::parse(unit)?)
    }

    pub fn with_unit(
        variable: &str,
        kind: QuantityKind,
        value: f64,
        unit: Unit,
    ) -> Result<Self, ComputationError> {
        if value < 0.0 {
            return Err(ComputationError::NegativeValue {
                variable: variable.to_string(),
                value,
            });
        }
        Self::signed(variable, kind, value, unit)
    }

    /// Same as `with_unit` but accepts negative values.
    pub fn signed(
        variable: &str,
        kind: QuantityKind,
        value: f64,
        unit: Unit,
    ) -> Result<Self, ComputationError> {
        if !value.is_finite() {
            return Err(ComputationError::NonFiniteValue {
                variable: variable.to_string(),
                value,
            });
        }
        if unit.dimension != kind.dimension() {
            return Err(ComputationError::IncompatibleUnits {
                from: unit.symbol,
                to: kind.dimension().to_string(),
            });
        }
        Ok(Self {
            variable: variable.to_string(),
            kind,
            value,
            unit,
        })
    }

    /// Datum in the SI unit of its kind.
    pub fn from_si(kind: QuantityKind, value: f64) -> Self {
        Self {
            variable: kind.symbol().to_string(),
            kind,
            value,
            unit: Unit::si(kind.dimension()),
        }
    }

    /// Parses `name = value unit`, e.g. `m = 25 g` or `T = 25 degC`. Unknown names get their kind
    /// from the dimension of the unit.
    pub fn from_string(text: &str) -> Result<Self, ComputationError> {
        let caps = DATUM_STRING
            .captures(text)
            .ok_or_else(|| ComputationError::WrongStringFormat(text.to_string()))?;
        let name = caps.name("name").map_or("", |m| m.as_str());
        let value: f64 = caps
            .name("value")
            .map_or("", |m| m.as_str())
            .parse()
            .map_err(|_| ComputationError::WrongStringFormat(text.to_string()))?;
        let unit = Unit::parse(caps.name("unit").map_or("", |m| m.as_str()))?;
        let kind = QuantityKind::from_symbol(name)
            .or_else(|| QuantityKind::for_dimension(unit.dimension))
            .ok_or_else(|| ComputationError::UnknownVariable(name.to_string()))?;
        Self::with_unit(name, kind, value, unit)
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn kind(&self) -> QuantityKind {
        self.kind
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> &Unit {
        &self.unit
    }

    pub fn si_value(&self) -> f64 {
        self.unit.to_si(self.value)
    }

    pub fn convertible(&self, unit: &str) -> bool {
        Unit::parse(unit).is_ok_and(|u| self.unit.convertible(&u))
    }

    pub fn convert(&self, unit: &str) -> Result<Datum, ComputationError> {
        self.convert_to(&Unit::parse(unit)?)
    }

    pub fn convert_to(&self, unit: &Unit) -> Result<Datum, ComputationError> {
        let value = self.unit.convert(self.value, unit)?;
        Ok(Datum {
            variable: self.variable.clone(),
            kind: self.kind,
            value,
            unit: unit.clone(),
        })
    }

    /// Multiplies the value by `factor` (kept in the current unit).
    pub fn scale(&self, factor: f64) -> Result<Datum, ComputationError> {
        Self::with_unit(&self.variable, self.kind, self.value * factor, self.unit.clone())
    }

    /// Sum with a value of the same quantity, in the unit of `self`.
    pub fn plus(&self, other: &Datum) -> Result<Datum, ComputationError> {
        let other = self.same_quantity(other)?;
        Self::with_unit(&self.variable, self.kind, self.value + other, self.unit.clone())
    }

    /// Difference with a value of the same quantity, in the unit of `self`; a negative result is
    /// an error.
    pub fn minus(&self, other: &Datum) -> Result<Datum, ComputationError> {
        let other = self.same_quantity(other)?;
        Self::with_unit(&self.variable, self.kind, self.value - other, self.unit.clone())
    }

    fn same_quantity(&self, other: &Datum) -> Result<f64, ComputationError> {
        if other.kind != self.kind {
            return Err(ComputationError::IncompatibleUnits {
                from: format!("{} ({})", other.unit, other.kind.name()),
                to: format!("{} ({})", self.unit, self.kind.name()),
            });
        }
        other.unit.convert(other.value, &self.unit)
    }

    pub fn rounded(&self, decimals: u32) -> Datum {
        let p = 10f64.powi(decimals as i32);
        Datum {
            value: (self.value * p).round() / p,
            ..self.clone()
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unit.symbol.is_empty() {
            write!(f, "{} = {}", self.variable, self.value)
        } else {
            write!(f, "{} = {} {}", self.variable, self.value, self.unit)
        }
    }
}

/// Datum bound to a substance and, inside a reaction, to its stoichiometric coefficient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SSDatum {
    substance: Substance,
    datum: Datum,
    coefficient: Option<u32>,
}

impl SSDatum {
    pub fn new(
        substance: Substance,
        kind: QuantityKind,
        value: f64,
        unit: &str,
    ) -> Result<Self, ComputationError> {
        Ok(Self::from_datum(substance, Datum::new(kind, value, unit)?))
    }

    pub fn from_datum(substance: Substance, datum: Datum) -> Self {
        Self {
            substance,
            datum,
            coefficient: None,
        }
    }

    pub fn with_coefficient(mut self, coefficient: Option<u32>) -> Self {
        self.coefficient = coefficient;
        self
    }

    pub fn substance(&self) -> &Substance {
        &self.substance
    }

    pub fn datum(&self) -> &Datum {
        &self.datum
    }

    pub fn coefficient(&self) -> Option<u32> {
        self.coefficient
    }

    pub fn into_datum(self) -> Datum {
        self.datum
    }

    pub fn convert(&self, unit: &str) -> Result<SSDatum, ComputationError> {
        Ok(SSDatum {
            substance: self.substance.clone(),
            datum: self.datum.convert(unit)?,
            coefficient: self.coefficient,
        })
    }
}

impl Deref for SSDatum {
    type Target = Datum;

    fn deref(&self) -> &Datum {
        &self.datum
    }
}

impl fmt::Display for SSDatum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({}) = {} {}",
            self.datum.variable,
            self.substance.formula(),
            self.datum.value,
            self.datum.unit
        )
    }
}
