use crate::Core::errors::ChemistryError;
use thiserror::Error;

/// Errors of units, data, assumption presets and the quantity solver.
#[derive(Debug, Error)]
pub enum ComputationError {
    #[error(transparent)]
    Chemistry(#[from] ChemistryError),

    #[error("unknown unit '{0}'")]
    UnknownUnit(String),

    #[error("cannot convert '{from}' to '{to}'")]
    IncompatibleUnits { from: String, to: String },

    #[error("unknown quantity '{0}'")]
    UnknownVariable(String),

    #[error("negative value {value} is not allowed for '{variable}'")]
    NegativeValue { variable: String, value: f64 },

    #[error("value {value} of '{variable}' is not a finite number")]
    NonFiniteValue { variable: String, value: f64 },

    #[error("wrong datum format '{0}', expected 'name = value unit'")]
    WrongStringFormat(String),

    #[error("assumption '{0}' is already registered")]
    DuplicateAssumption(String),

    #[error("unknown assumption '{0}'")]
    UnknownAssumption(String),

    #[error("assumption '{assumption}': computing '{target}' needs '{constant}', which is not defined")]
    UndefinedConstant {
        assumption: String,
        target: String,
        constant: String,
    },

    #[error("assumption '{assumption}': no compute template for '{target}'")]
    UnknownTemplate { assumption: String, target: String },

    #[error("incorrect assumption table format at line {line}: {reason}")]
    IncorrectTableFormat { line: usize, reason: String },

    #[error("conflicting value for {key}: {known} is already known, {written} was written")]
    ConflictingDatum {
        key: String,
        known: f64,
        written: f64,
    },

    #[error("cannot resolve {target}; still unknown: {}", .unknown.join(", "))]
    InsufficientData { target: String, unknown: Vec<String> },

    #[error("no value is stored for {0}")]
    ValueNotFound(String),

    #[error("'{0}' does not take part in this calculation")]
    UnknownSubstance(String),

    #[error("{0} requires a reaction")]
    NoReaction(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
