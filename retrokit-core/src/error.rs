//! Structured error types for the retrokit workspace.

use thiserror::Error;

/// Unified error type for all retrokit operations.
#[derive(Debug, Error)]
pub enum RetroError {
    /// I/O error (file not found, permission denied, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error (malformed SMILES, JSON, or atom token)
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid input (bad arguments, duplicate atom maps in a product)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A raw record references something the product does not contain.
    #[error("validation error: {0}")]
    Validation(String),

    /// A reaction name equal to the generic placeholder.
    #[error("invalid reaction name: {0}")]
    InvalidReactionName(String),

    /// The assembled report breaks a structural invariant.
    #[error("schema error: {0}")]
    Schema(String),

}

impl RetroError {
    /// Whether the error only invalidates the record that produced it.
    ///
    /// Record-local errors are collected as diagnostics and processing
    /// continues; everything else aborts the analysis.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RetroError::Parse(_) | RetroError::Validation(_) | RetroError::InvalidReactionName(_)
        )
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            RetroError::Io(_) => "io",
            RetroError::Parse(_) => "parse",
            RetroError::InvalidInput(_) => "invalid_input",
            RetroError::Validation(_) => "validation",
            RetroError::InvalidReactionName(_) => "invalid_reaction_name",
            RetroError::Schema(_) => "schema",
        }
    }
}

/// Convenience alias used throughout the retrokit workspace.
pub type Result<T> = std::result::Result<T, RetroError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_local_errors_are_recoverable() {
        assert!(RetroError::Validation("map 99".into()).is_recoverable());
        assert!(RetroError::InvalidReactionName("Other".into()).is_recoverable());
        assert!(RetroError::Parse("bad".into()).is_recoverable());
        assert!(!RetroError::Schema("gap".into()).is_recoverable());
        assert!(!RetroError::InvalidInput("dup".into()).is_recoverable());
    }

    #[test]
    fn display_and_kind() {
        let err = RetroError::Schema("priority gap".into());
        assert_eq!(err.to_string(), "schema error: priority gap");
        assert_eq!(err.kind(), "schema");
        let missing = std::io::Error::new(std::io::ErrorKind::NotFound, "ontology.json");
        let io = RetroError::from(missing);
        assert_eq!(io.kind(), "io");
        assert!(!io.is_recoverable());
    }
}
