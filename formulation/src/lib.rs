//! This library translates fitted surrogate models into blocks of optimization
//! variables and constraints, so that a generic mixed-integer nonlinear solver can
//! optimize *through* a trained model.
//!
//! Supported descriptors:
//! * [NeuralNetwork]: feed-forward networks with linear, relu, tanh, sigmoid, softplus,
//!   hard sigmoid or leaky relu hidden activations. Relu and hard sigmoid nodes are
//!   encoded exactly with binary variables and big-M constraints (see [BigM]), other
//!   activations with their closed form expression.
//! * [GaussianProcessRegressor]: mean prediction with rbf, linear, polynomial, rational
//!   quadratic, exp-sine-squared, matern kernels and sums of two rbf or rational quadratic
//!   kernels, and an uncertainty proxy for rbf, linear and polynomial kernels.
//! * [GaussianProcessClassifier]: class probability of a binary rbf classifier.
//! * [HybridModel]: network features fed to an rbf regressor head.
//!
//! Models are trained elsewhere: a descriptor only records fitted parameters, and
//! the [ScalingProvider](ddobox_data::ScalingProvider) moments used to standardize the
//! training data. The produced [Block](ddobox_expr::Block) works in raw units.
//!
//! # Example
//!
//! ```
//! use ddobox_data::Scaling;
//! use ddobox_expr::Sense;
//! use ddobox_formulation::{
//!     formulate, optimize_through, Activation, BigM, FormulationParams, NeuralNetwork, Surrogate,
//! };
//! use linfa::ParamGuard;
//! use ndarray::array;
//!
//! let nn = NeuralNetwork::new(
//!     vec![array![[1., -1.], [0.5, 2.]], array![[1., 1.]]],
//!     vec![array![0., 0.1], array![-0.2]],
//!     Activation::Relu,
//! ).expect("valid network");
//! let surrogate = Surrogate::from(nn);
//! let scaling = Scaling::new(array![0., 0.], array![1., 1.], array![0.], array![1.]).unwrap();
//! let xlimits = array![[-1., 1.], [-1., 1.]];
//!
//! // default fixed big-M
//! let block = formulate(&surrogate, &scaling, false).unwrap();
//! assert_eq!(block.model().n_binaries(), 2);
//!
//! // tighter per node constants
//! let params = FormulationParams::new()
//!     .big_m(BigM::propagated(xlimits.clone()))
//!     .check()
//!     .unwrap();
//! let block = params.formulate(&surrogate, &scaling, false).unwrap();
//!
//! let model = optimize_through(&block, &xlimits, 0, Sense::Minimize).unwrap();
//! assert!(model.is_linear());
//! ```
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod activation;
mod bounds;
mod errors;
mod gaussian_process;
mod kernels;
mod network;
mod predict;
mod surrogates;

mod algorithm;
mod params;
mod problem;

pub use activation::*;
pub use bounds::*;
pub use errors::*;
pub use kernels::*;
pub use surrogates::*;

pub use algorithm::*;
pub use params::*;
pub use problem::*;
