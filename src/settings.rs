//! # Settings Module
//!
//! ## Purpose
//! JSON-backed configuration of the quantity solver: how strictly repeated data must agree,
//! how long forward chaining may run, which assumption presets are active from the start and
//! where an additional assumption table lives.
//!
//! ## Configuration Format
//! ```json
//! {
//!   "conflict_tolerance": 1e-6,
//!   "max_passes": 256,
//!   "default_assumptions": ["STP", "SWD"],
//!   "assumption_table": "my_conditions.txt",
//!   "round_to": 3
//! }
//! ```
//! Missing fields take their default values.
//!
//! ## Usage Pattern
//! ```rust,no_run
//! use ChemStoich::settings::CalculatorConfig;
//!
//! let config = CalculatorConfig::load_config("calculator_config.json").unwrap();
//! let registry = config.registry().unwrap();
//! ```

use crate::Computations::assumptions::AssumptionRegistry;
use crate::Computations::errors::ComputationError;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_CONFIG_FILE: &str = "calculator_config.json";

/// Solver configuration.
///
/// # Fields
/// * `conflict_tolerance` - relative difference below which two values of one quantity agree
/// * `max_passes` - upper bound on forward-chaining passes per request
/// * `default_assumptions` - presets activated when a solver takes this configuration
/// * `assumption_table` - optional path of a table loaded on top of the built-in presets
/// * `round_to` - decimals of every answer the solver returns (`compute`, `compute_in`, `read`,
///   `derive_moles_of`, `limiting_reagent`), no rounding when absent; stored values are kept exact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculatorConfig {
    pub conflict_tolerance: f64,
    pub max_passes: usize,
    pub default_assumptions: Vec<String>,
    pub assumption_table: Option<String>,
    pub round_to: Option<u32>,
}

impl Default for CalculatorConfig {
    fn default() -> Self {
        Self {
            conflict_tolerance: 1e-6,
            max_passes: 256,
            default_assumptions: Vec::new(),
            assumption_table: None,
            round_to: None,
        }
    }
}

impl CalculatorConfig {
    /// Loads configuration from a JSON file. A missing file gives the default configuration;
    /// an unreadable or malformed one is an error.
    pub fn load_config<P: AsRef<Path>>(config_file: P) -> Result<Self, ComputationError> {
        let path = config_file.as_ref();
        if !path.exists() {
            warn!(
                "configuration file {} not found, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let config: CalculatorConfig = serde_json::from_str(&content)?;
        info!("configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn save_config<P: AsRef<Path>>(&self, config_file: P) -> Result<(), ComputationError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(config_file.as_ref(), content)?;
        Ok(())
    }

    /// Built-in presets plus the configured assumption table, if any.
    pub fn registry(&self) -> Result<AssumptionRegistry, ComputationError> {
        let mut registry = AssumptionRegistry::standard()?;
        if let Some(table) = &self.assumption_table {
            registry.load_file(table)?;
        }
        for symbol in &self.default_assumptions {
            registry.resolve(symbol)?;
        }
        Ok(registry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = CalculatorConfig::load_config("/no/such/dir/calculator_config.json").unwrap();
        assert_eq!(config, CalculatorConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let file = NamedTempFile::new().unwrap();
        let config = CalculatorConfig {
            default_assumptions: vec!["STP".to_string()],
            round_to: Some(2),
            ..CalculatorConfig::default()
        };
        config.save_config(file.path()).unwrap();
        let loaded = CalculatorConfig::load_config(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_partial_file_uses_defaults_for_the_rest() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"max_passes": 10}}"#).unwrap();
        let loaded = CalculatorConfig::load_config(file.path()).unwrap();
        assert_eq!(loaded.max_passes, 10);
        assert_eq!(loaded.conflict_tolerance, 1e-6);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            CalculatorConfig::load_config(file.path()),
            Err(ComputationError::Serde(_))
        ));
    }

    #[test]
    fn test_registry_with_custom_table() {
        let mut table = NamedTempFile::new().unwrap();
        writeln!(table, "!MARS: Mars surface").unwrap();
        writeln!(table, "variable T:210:K").unwrap();
        writeln!(table, "variable P:610:Pa").unwrap();
        writeln!(table, "compute V0::L/mol").unwrap();
        writeln!(table, "!").unwrap();
        let config = CalculatorConfig {
            assumption_table: Some(table.path().to_string_lossy().to_string()),
            default_assumptions: vec!["MARS".to_string()],
            ..CalculatorConfig::default()
        };
        let registry = config.registry().unwrap();
        assert!(registry.contains("MARS"));
        assert!(registry.contains("STP"));

        let unknown = CalculatorConfig {
            default_assumptions: vec!["VENUS".to_string()],
            ..CalculatorConfig::default()
        };
        assert!(matches!(
            unknown.registry(),
            Err(ComputationError::UnknownAssumption(_))
        ));
    }
}
