//! Named presets of physical conditions (STP, NTP, SATP, standard water density, ...).
//!
//! An assumption owns three kinds of entries:
//! - `variable` constants, kept as they are;
//! - `compute` constants, evaluated from a fixed set of ideal-gas templates once the variables
//!   are bound (`V0 = R·T/P`, `V = n·R·T/P`, `P = n·R·T/V`, `T = P·V/(n·R)`, `n = P·V/(R·T)`);
//! - `assume` values, bound only while the compute constants are evaluated and dropped afterwards.
//!
//! The molar gas constant `R` is always bound; a `variable R` overrides it.
//!
//! Presets are evaluated when they are registered, so a broken table fails at load time.
//! After loading, the registry is read-only and can be shared by reference between sessions.
//!
//! Table format:
//! ```text
//! # comment
//! !STP: standard temperature and pressure
//! variable T:273.15:K
//! variable P:101325:Pa
//! compute V0::L/mol
//! !
//! ```
use crate::Computations::datum::{Datum, QuantityKind};
use crate::Computations::errors::ComputationError;
use crate::Computations::units::Unit;
use indexmap::IndexMap;
use log::{info, warn};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

/// J/(mol·K)
pub const GAS_CONSTANT: f64 = 8.314462618;

/// Built-in table: STP, NTP, SATP and SWD.
pub const STANDARD_TABLE: &str = include_str!("assumptions.txt");

static HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^!\s*(?P<symbol>[A-Za-z0-9_]+)\s*:\s*(?P<name>.*?)\s*$").expect("header pattern")
});
static VALUE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<keyword>variable|assume)\s+(?P<name>[A-Za-z_][A-Za-z0-9_]*)\s*:\s*(?P<value>[^:]+?)\s*:\s*(?P<unit>.*?)\s*$",
    )
    .expect("value line pattern")
});
static COMPUTE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^compute\s+(?P<name>[A-Za-z_][A-Za-z0-9_]*)\s*::\s*(?P<unit>.+?)\s*$")
        .expect("compute line pattern")
});

struct Template {
    target: &'static str,
    kind: QuantityKind,
    inputs: &'static [&'static str],
    eval: fn(&[f64]) -> f64,
}

fn molar_volume(v: &[f64]) -> f64 {
    v[0] * v[1] / v[2]
}

fn gas_volume(v: &[f64]) -> f64 {
    v[0] * v[1] * v[2] / v[3]
}

fn gas_temperature(v: &[f64]) -> f64 {
    v[0] * v[1] / (v[2] * v[3])
}

const TEMPLATES: &[Template] = &[
    Template {
        target: "V0",
        kind: QuantityKind::MolarVolume,
        inputs: &["R", "T", "P"],
        eval: molar_volume,
    },
    Template {
        target: "V",
        kind: QuantityKind::Volume,
        inputs: &["n", "R", "T", "P"],
        eval: gas_volume,
    },
    Template {
        target: "P",
        kind: QuantityKind::Pressure,
        inputs: &["n", "R", "T", "V"],
        eval: gas_volume,
    },
    Template {
        target: "T",
        kind: QuantityKind::Temperature,
        inputs: &["P", "V", "n", "R"],
        eval: gas_temperature,
    },
    Template {
        target: "n",
        kind: QuantityKind::Moles,
        inputs: &["P", "V", "R", "T"],
        eval: gas_temperature,
    },
];

/// Constant evaluated from a template, answered in `unit`.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputeTarget {
    pub name: String,
    pub unit: Unit,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assumption {
    symbol: String,
    name: String,
    variables: Vec<Datum>,
    compute: Vec<ComputeTarget>,
    assume: Vec<Datum>,
}

impl Assumption {
    pub fn new(symbol: &str, name: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            variables: Vec::new(),
            compute: Vec::new(),
            assume: Vec::new(),
        }
    }

    pub fn variable(mut self, datum: Datum) -> Self {
        self.variables.push(datum);
        self
    }

    pub fn compute(mut self, name: &str, unit: &str) -> Result<Self, ComputationError> {
        self.compute.push(ComputeTarget {
            name: name.to_string(),
            unit: Unit::parse(unit)?,
        });
        Ok(self)
    }

    pub fn assume(mut self, datum: Datum) -> Self {
        self.assume.push(datum);
        self
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variables(&self) -> &[Datum] {
        &self.variables
    }

    pub fn computed(&self) -> &[ComputeTarget] {
        &self.compute
    }

    pub fn transient(&self) -> &[Datum] {
        &self.assume
    }

    /// Binds variables and transient values, evaluates the compute constants in declaration
    /// order and returns variables then computed constants.
    pub fn evaluate(&self) -> Result<IndexMap<String, Datum>, ComputationError> {
        let mut bindings: IndexMap<String, Datum> = IndexMap::new();
        bindings.insert(
            "R".to_string(),
            Datum::from_si(QuantityKind::GasConstant, GAS_CONSTANT),
        );
        for datum in self.assume.iter().chain(self.variables.iter()) {
            bindings.insert(datum.variable().to_string(), datum.clone());
        }

        let mut output: IndexMap<String, Datum> = self
            .variables
            .iter()
            .map(|d| (d.variable().to_string(), d.clone()))
            .collect();

        for target in &self.compute {
            let template = TEMPLATES
                .iter()
                .find(|t| t.target == target.name)
                .ok_or_else(|| ComputationError::UnknownTemplate {
                    assumption: self.symbol.clone(),
                    target: target.name.clone(),
                })?;
            let mut values = Vec::with_capacity(template.inputs.len());
            for input in template.inputs {
                let datum =
                    bindings
                        .get(*input)
                        .ok_or_else(|| ComputationError::UndefinedConstant {
                            assumption: self.symbol.clone(),
                            target: target.name.clone(),
                            constant: input.to_string(),
                        })?;
                values.push(datum.si_value());
            }
            let si = Datum::from_si(template.kind, (template.eval)(&values));
            let converted = si.convert_to(&target.unit)?;
            let datum =
                Datum::with_unit(&target.name, template.kind, converted.value(), target.unit.clone())?;
            bindings.insert(target.name.clone(), datum.clone());
            output.insert(target.name.clone(), datum);
        }
        Ok(output)
    }

    /// Renders the block back into table text.
    pub fn to_table(&self) -> String {
        let mut text = format!("!{}: {}\n", self.symbol, self.name);
        for d in &self.variables {
            text.push_str(&format!("variable {}:{}:{}\n", d.variable(), d.value(), d.unit()));
        }
        for d in &self.assume {
            text.push_str(&format!("assume {}:{}:{}\n", d.variable(), d.value(), d.unit()));
        }
        for t in &self.compute {
            text.push_str(&format!("compute {}::{}\n", t.name, t.unit));
        }
        text.push_str("!\n");
        text
    }
}

fn table_error(line: usize, reason: impl Into<String>) -> ComputationError {
    ComputationError::IncorrectTableFormat {
        line,
        reason: reason.into(),
    }
}

fn table_datum(line: usize, name: &str, value: &str, unit: &str) -> Result<Datum, ComputationError> {
    let value: f64 = value
        .parse()
        .map_err(|_| table_error(line, format!("'{}' is not a number", value)))?;
    let unit = Unit::parse(unit).map_err(|e| table_error(line, e.to_string()))?;
    let kind = QuantityKind::from_symbol(name)
        .or_else(|| QuantityKind::for_dimension(unit.dimension))
        .ok_or_else(|| table_error(line, format!("cannot tell what '{}' measures", name)))?;
    Datum::with_unit(name, kind, value, unit).map_err(|e| table_error(line, e.to_string()))
}

/// Parses an assumption table into its blocks.
pub fn parse_table(text: &str) -> Result<Vec<Assumption>, ComputationError> {
    let mut blocks = Vec::new();
    let mut current: Option<Assumption> = None;
    for (i, raw) in text.lines().enumerate() {
        let line_no = i + 1;
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        if line == "!" {
            match current.take() {
                Some(block) => blocks.push(block),
                None => return Err(table_error(line_no, "'!' closes no block")),
            }
        } else if let Some(caps) = HEADER.captures(line) {
            if let Some(open) = &current {
                return Err(table_error(
                    line_no,
                    format!("block '{}' is not closed", open.symbol),
                ));
            }
            current = Some(Assumption::new(&caps["symbol"], &caps["name"]));
        } else if let Some(caps) = VALUE_LINE.captures(line) {
            let block = current
                .take()
                .ok_or_else(|| table_error(line_no, "entry outside of a block"))?;
            let datum = table_datum(line_no, &caps["name"], &caps["value"], &caps["unit"])?;
            current = Some(if &caps["keyword"] == "variable" {
                block.variable(datum)
            } else {
                block.assume(datum)
            });
        } else if let Some(caps) = COMPUTE_LINE.captures(line) {
            let block = current
                .take()
                .ok_or_else(|| table_error(line_no, "entry outside of a block"))?;
            current = Some(
                block
                    .compute(&caps["name"], &caps["unit"])
                    .map_err(|e| table_error(line_no, e.to_string()))?,
            );
        } else {
            return Err(table_error(line_no, format!("cannot read '{}'", line)));
        }
    }
    if let Some(open) = current {
        return Err(table_error(
            text.lines().count(),
            format!("block '{}' is not closed", open.symbol),
        ));
    }
    Ok(blocks)
}

/// Read-only collection of evaluated assumptions.
#[derive(Debug, Clone, Default)]
pub struct AssumptionRegistry {
    assumptions: IndexMap<String, Assumption>,
    resolved: IndexMap<String, IndexMap<String, Datum>>,
}

impl AssumptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in presets.
    pub fn standard() -> Result<Self, ComputationError> {
        Self::from_table(STANDARD_TABLE)
    }

    pub fn from_table(text: &str) -> Result<Self, ComputationError> {
        let mut registry = Self::new();
        registry.load_table(text)?;
        Ok(registry)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ComputationError> {
        let mut registry = Self::new();
        registry.load_file(path)?;
        Ok(registry)
    }

    pub fn load_table(&mut self, text: &str) -> Result<(), ComputationError> {
        for assumption in parse_table(text)? {
            self.register(assumption)?;
        }
        Ok(())
    }

    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ComputationError> {
        let text = fs::read_to_string(path.as_ref()).map_err(|e| {
            warn!("cannot read assumption table {}: {}", path.as_ref().display(), e);
            e
        })?;
        self.load_table(&text)
    }

    /// Stores and evaluates an assumption; its symbol must be new.
    pub fn register(&mut self, assumption: Assumption) -> Result<(), ComputationError> {
        if self.assumptions.contains_key(assumption.symbol()) {
            return Err(ComputationError::DuplicateAssumption(
                assumption.symbol().to_string(),
            ));
        }
        let resolved = assumption.evaluate()?;
        info!(
            "assumption {} ({}) registered: {}",
            assumption.symbol(),
            assumption.name(),
            resolved
                .values()
                .map(|d| d.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        self.resolved
            .insert(assumption.symbol().to_string(), resolved);
        self.assumptions
            .insert(assumption.symbol().to_string(), assumption);
        Ok(())
    }

    /// Constants of a registered assumption, variables first, then computed ones.
    pub fn resolve(&self, symbol: &str) -> Result<&IndexMap<String, Datum>, ComputationError> {
        self.resolved
            .get(symbol)
            .ok_or_else(|| ComputationError::UnknownAssumption(symbol.to_string()))
    }

    pub fn get(&self, symbol: &str) -> Option<&Assumption> {
        self.assumptions.get(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.assumptions.contains_key(symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.assumptions.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.assumptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assumptions.is_empty()
    }

    /// All assumptions rendered as one table.
    pub fn to_table(&self) -> String {
        self.assumptions
            .values()
            .map(|a| a.to_table())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_standard_presets() {
        let registry = AssumptionRegistry::standard().unwrap();
        assert_eq!(
            registry.symbols().collect::<Vec<_>>(),
            vec!["STP", "NTP", "SATP", "SWD"]
        );
        let stp = registry.resolve("STP").unwrap();
        assert_relative_eq!(stp["T"].value(), 273.15);
        assert_relative_eq!(stp["V0"].value(), 22.414, epsilon = 1e-3);
        assert_eq!(stp["V0"].unit().symbol, "L/mol");
        assert!(!stp.contains_key("R"));
        let satp = registry.resolve("SATP").unwrap();
        assert_relative_eq!(satp["V0"].value(), 24.79, epsilon = 1e-2);
        let swd = registry.resolve("SWD").unwrap();
        assert_eq!(swd["rho_w"].kind(), QuantityKind::Density);
        assert_relative_eq!(swd["rho_w"].si_value(), 1000.0);
    }

    #[test]
    fn test_transient_values_are_dropped() {
        let table = "
            !TEST: one mole at STP # comment
            variable T:273.15:K
            variable P:101.325:kPa
            assume n:1:mol
            compute V::L
            !";
        let registry = AssumptionRegistry::from_table(table).unwrap();
        let constants = registry.resolve("TEST").unwrap();
        assert!(!constants.contains_key("n"));
        assert_relative_eq!(constants["V"].value(), 22.414, epsilon = 1e-3);
        assert_eq!(
            constants.keys().map(|k| k.as_str()).collect::<Vec<_>>(),
            vec!["T", "P", "V"]
        );
    }

    #[test]
    fn test_variable_overrides_gas_constant() {
        let table = "!X: x\nvariable R:8:J/(mol*K)\nvariable T:100:K\nvariable P:100:Pa\ncompute V0::m3/mol\n!";
        let registry = AssumptionRegistry::from_table(table).unwrap();
        assert_relative_eq!(registry.resolve("X").unwrap()["V0"].value(), 8.0);
    }

    #[test]
    fn test_undefined_constant() {
        let table = "!BAD: no pressure\nvariable T:273.15:K\ncompute V0::L/mol\n!";
        match AssumptionRegistry::from_table(table) {
            Err(ComputationError::UndefinedConstant { constant, .. }) => assert_eq!(constant, "P"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_unknown_template() {
        let table = "!BAD: x\nvariable T:273.15:K\ncompute rho::g/L\n!";
        assert!(matches!(
            AssumptionRegistry::from_table(table),
            Err(ComputationError::UnknownTemplate { .. })
        ));
    }

    #[test]
    fn test_duplicate_assumption() {
        let mut registry = AssumptionRegistry::standard().unwrap();
        let again = Assumption::new("STP", "again")
            .variable(Datum::new(QuantityKind::Temperature, 273.15, "K").unwrap());
        assert!(matches!(
            registry.register(again),
            Err(ComputationError::DuplicateAssumption(_))
        ));
    }

    #[test]
    fn test_unknown_assumption() {
        let registry = AssumptionRegistry::standard().unwrap();
        assert!(matches!(
            registry.resolve("MARS"),
            Err(ComputationError::UnknownAssumption(_))
        ));
    }

    #[test]
    fn test_malformed_tables() {
        for (table, line) in [
            ("variable T:1:K\n", 1),
            ("!A: a\nvariable T:1:K\n", 2),
            ("!A: a\n!B: b\n!\n", 2),
            ("!A: a\nvariable T:abc:K\n!\n", 2),
            ("!A: a\nvariable T:1\n!\n", 2),
            ("!A: a\nvariable T:1:furlong\n!\n", 2),
            ("!\n", 1),
        ] {
            match parse_table(table) {
                Err(ComputationError::IncorrectTableFormat { line: l, .. }) => {
                    assert_eq!(l, line, "{:?}", table)
                }
                other => panic!("{:?} gave {:?}", table, other),
            }
        }
    }

    #[test]
    fn test_builder_and_round_trip_through_table() {
        let assumption = Assumption::new("HOT", "hot furnace")
            .variable(Datum::new(QuantityKind::Temperature, 1200.0, "K").unwrap())
            .variable(Datum::new(QuantityKind::Pressure, 1.0, "atm").unwrap())
            .compute("V0", "L/mol")
            .unwrap();
        let text = assumption.to_table();
        let parsed = parse_table(&text).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0], assumption);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "!HOT: hot furnace").unwrap();
        writeln!(file, "variable T:1200:K").unwrap();
        writeln!(file, "variable P:1E5:Pa").unwrap();
        writeln!(file, "compute V0::L/mol").unwrap();
        writeln!(file, "!").unwrap();
        let mut registry = AssumptionRegistry::standard().unwrap();
        registry.load_file(file.path()).unwrap();
        assert_eq!(registry.len(), 5);
        assert_relative_eq!(
            registry.resolve("HOT").unwrap()["V0"].value(),
            GAS_CONSTANT * 1200.0 / 1e5 * 1e3,
            epsilon = 1e-9
        );
        assert!(AssumptionRegistry::from_file("/definitely/missing/table.txt").is_err());
    }
}
