use thiserror::Error;

/// Structural errors that halt a meta-analysis run
///
/// Degenerate statistics on a single genus are never reported through this
/// type; they surface as `NaN` in the affected record instead.
#[derive(Error, Debug)]
pub enum MetaError {
    #[error("genus appears more than once: {0}")]
    DuplicateGenus(String),

    #[error("study appears more than once: {0}")]
    DuplicateStudy(String),

    #[error("dimension mismatch for {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        context: String,
        expected: usize,
        actual: usize,
    },

    #[error("unable to derive a disease label from study id '{0}'")]
    UnknownDisease(String),

    #[error("study '{0}' is not present in the study table")]
    UnknownStudy(String),

    #[error("study '{0}' has no sample size")]
    MissingSampleSize(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, MetaError>;
