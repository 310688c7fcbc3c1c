use thiserror::Error;

/// A result type for model building
pub type Result<T> = std::result::Result<T, ExprError>;

/// An error when building or evaluating an optimization [`Model`](crate::Model)
#[derive(Error, Debug)]
pub enum ExprError {
    /// When a variable id does not belong to the model
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),
    /// When sizes of arrays do not match
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),
    /// When a value is not valid
    #[error("InvalidValue error: {0}")]
    InvalidValue(String),
}
