use thiserror::Error;

/// Errors surfaced by dataset generation.
///
/// `Configuration` and `Validation` are raised during parameter resolution,
/// before any randomness is drawn, so a rejected request never advances a
/// random stream and never yields a partial dataset.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// Scenario name not present in the catalogue.
    #[error("unknown scenario: {0}")]
    Configuration(String),
    /// Parameter outside its permitted range.
    #[error("invalid parameter `{field}`: {reason}")]
    Validation {
        /// Offending field.
        field: &'static str,
        /// Human readable detail.
        reason: String,
    },
    /// Generated tables disagree with each other.
    #[error("dataset integrity violated: {0}")]
    Integrity(String),
}

impl GenerationError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Short machine-readable kind used in logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Validation { .. } => "validation",
            Self::Integrity(_) => "integrity",
        }
    }
}
