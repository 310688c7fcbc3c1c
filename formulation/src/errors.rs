use thiserror::Error;

/// A result type for surrogate formulation
pub type Result<T> = std::result::Result<T, FormulationError>;

/// An error when describing a surrogate or translating it into constraints
#[derive(Error, Debug)]
pub enum FormulationError {
    /// When the model kind, activation or kernel is not handled
    #[error("Unsupported model kind: {0}")]
    UnsupportedModelKind(String),
    /// When a hyperparameter value is not handled (e.g. matern nu)
    #[error("Unsupported hyperparameter: {0}")]
    UnsupportedHyperparameter(String),
    /// When the surrogate description is inconsistent
    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),
    /// When a value is not valid
    #[error("InvalidValue error: {0}")]
    InvalidValue(String),
    /// When building the optimization model fails
    #[error(transparent)]
    Expr(#[from] ddobox_expr::ExprError),
    /// When data handling fails
    #[error(transparent)]
    Data(#[from] ddobox_data::DataError),
    /// When error during saving
    #[cfg(feature = "persistent")]
    #[error("Save error: {0}")]
    SaveJsonError(#[from] serde_json::Error),
    /// When error during saving
    #[cfg(feature = "persistent")]
    #[error("Save error: {0}")]
    SaveBinaryError(#[from] bincode::error::EncodeError),
    /// When error during loading
    #[cfg(feature = "persistent")]
    #[error("Load error: {0}")]
    LoadBinaryError(#[from] bincode::error::DecodeError),
    /// When error during loading
    #[error("Load IO error")]
    LoadIoError(#[from] std::io::Error),
}
