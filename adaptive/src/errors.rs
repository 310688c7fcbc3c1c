use thiserror::Error;

/// A result type for adaptive sampling
pub type Result<T> = std::result::Result<T, AdaptiveError>;

/// An error when partitioning samples or building active learning problems
#[derive(Error, Debug)]
pub enum AdaptiveError {
    /// When there are fewer points than needed for one simplex
    #[error("Insufficient points: {0}")]
    InsufficientPoints(String),
    /// When points are affinely dependent or a simplex is flat
    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),
    /// When no candidate region remains to select
    #[error("No feasible region: {0}")]
    NoFeasibleRegion(String),
    /// When a value is not valid
    #[error("InvalidValue error: {0}")]
    InvalidValue(String),
    /// When the surrogate formulation fails
    #[error(transparent)]
    Formulation(#[from] ddobox_formulation::FormulationError),
    /// When building the optimization model fails
    #[error(transparent)]
    Expr(#[from] ddobox_expr::ExprError),
    /// When linear algebra computation fails
    #[error(transparent)]
    Linalg(#[from] linfa_linalg::LinalgError),
}
