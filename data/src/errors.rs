use thiserror::Error;

/// A result type for data handling
pub type Result<T> = std::result::Result<T, DataError>;

/// An error when sampling, splitting or scaling data
#[derive(Error, Debug)]
pub enum DataError {
    /// When a value is not valid
    #[error("InvalidValue error: {0}")]
    InvalidValue(String),
    /// When data required by an operation is not available yet
    #[error("Missing data: {0}")]
    MissingData(String),
    /// When no output row is flagged as converged
    #[error("No converged data to compute output moments")]
    EmptyConvergedSet,
}
