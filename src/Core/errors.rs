use thiserror::Error;

/// Errors of the chemistry engine: formula parsing, substance construction and reaction balancing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChemistryError {
    #[error("formula syntax error in '{formula}': {reason}")]
    FormulaSyntax { formula: String, reason: String },

    #[error("unknown element '{symbol}' in '{formula}'")]
    UnknownElement { symbol: String, formula: String },

    #[error("invalid composition: {0}")]
    InvalidComposition(String),

    #[error("invalid reaction: {0}")]
    InvalidReaction(String),

    #[error("reaction '{scheme}' cannot be balanced: {reason}")]
    Unbalanceable { scheme: String, reason: String },

    #[error("reaction '{scheme}' is ambiguous: {dimension} independent balanced combinations")]
    AmbiguousReaction { scheme: String, dimension: usize },

    #[error("chemical database error: {0}")]
    Database(String),
}

impl ChemistryError {
    pub(crate) fn syntax(formula: &str, reason: impl Into<String>) -> Self {
        ChemistryError::FormulaSyntax {
            formula: formula.to_string(),
            reason: reason.into(),
        }
    }
}
