//! `ddobox` is a toolbox to optimize *through* trained surrogate models and to
//! drive the adaptive sampling of expensive simulations.
//!
//! It re-exports the following libraries:
//! * [expr]: algebraic modeling layer (variables, expressions, constraints, blocks)
//!   producing models for an external mixed-integer nonlinear solver,
//! * [data]: initial designs, train/test split and standardization of sampled data,
//! * [formulation]: translation of neural networks, gaussian process regressors and
//!   classifiers, and hybrid models into constraint blocks,
//! * [adaptive]: Delaunay partitioning of the input space and active learning problems
//!   selecting the next sample.
//!
//! # Example
//!
//! ```
//! use ddobox::data::{DataHandler, SamplingKind};
//! use ddobox::expr::Sense;
//! use ddobox::formulation::{
//!     formulate, optimize_through, GaussianProcessRegressor, Kernel, Surrogate,
//! };
//! use ndarray::array;
//!
//! let xlimits = array![[0., 2.]];
//! let x = array![[0.], [1.], [2.]];
//! let y = array![[0.5], [1.5], [1.]];
//! let mut data = DataHandler::new(x, y).unwrap().with_xlimits(&xlimits).unwrap();
//! let scaling = data.scale().unwrap().clone();
//!
//! // a regressor fitted elsewhere on the standardized data
//! let gpr = GaussianProcessRegressor::new(
//!     Kernel::Rbf { length_scale: 1. },
//!     1.,
//!     scaling.scale_x(data.x()),
//!     array![-0.8, 1.2, 0.1],
//! ).unwrap();
//! let block = formulate(&Surrogate::from(gpr), &scaling, false).unwrap();
//! let model = optimize_through(&block, &xlimits, 0, Sense::Maximize).unwrap();
//! assert_eq!(model.n_binaries(), 0);
//! ```
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

pub use ddobox_adaptive as adaptive;
pub use ddobox_data as data;
pub use ddobox_expr as expr;
pub use ddobox_formulation as formulation;
