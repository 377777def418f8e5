//! Analytics error model.

use thiserror::Error;

/// Result type used across the analytical core.
pub type AnalyticsResult<T> = Result<T, AnalyticsError>;

/// Error taxonomy of the inventory intelligence engine.
///
/// Lookup failures surface to callers; numeric degeneracies are normally
/// repaired in place and only reach this enum when an input cannot be repaired.
/// A cache miss is not an error and never appears here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnalyticsError {
    /// A referenced record (book, inventory snapshot, forecast...) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Not enough history to compute anything at all.
    ///
    /// Sparse-but-present history does not produce this error; it produces a
    /// result flagged with [`crate::DataQuality::Sparse`].
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// Optimization constraints are self-contradictory or out of range.
    #[error("invalid constraint: {0}")]
    InvalidConstraint(String),

    /// A numeric input could not be mapped to a safe default.
    #[error("degenerate computation: {0}")]
    ComputationDegenerate(String),

    /// A configuration value or argument failed validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The historical data source could not be read.
    #[error("data source unavailable: {0}")]
    Unavailable(String),
}

impl AnalyticsError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn insufficient_data(msg: impl Into<String>) -> Self {
        Self::InsufficientData(msg.into())
    }

    pub fn invalid_constraint(msg: impl Into<String>) -> Self {
        Self::InvalidConstraint(msg.into())
    }

    pub fn degenerate(msg: impl Into<String>) -> Self {
        Self::ComputationDegenerate(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// True when the caller asked for something that does not exist (as opposed
    /// to something that exists but cannot be computed).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
