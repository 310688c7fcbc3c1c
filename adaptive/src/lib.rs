//! This library selects where to sample next when building a surrogate model
//! of an expensive function.
//!
//! Two families of criteria are available through an [AdaptiveSampler]:
//! * model based: maximize the uncertainty proxy or a modified expected improvement
//!   of a gaussian process regressor, formulated with `ddobox-formulation`,
//! * geometric: partition the input space with a Delaunay triangulation of the
//!   samples (see [Partition]) and select the centroid of the largest simplex,
//!   possibly restricted to the simplices adjacent to the best sample.
//!
//! Every criterion is returned as a [Model](ddobox_expr::Model) to be maximized by an
//! external solver, the next sample being the value of its `inputs` variables.
//!
//! # Example
//!
//! ```
//! use ddobox_adaptive::{partition, AdaptiveSampler};
//! use ddobox_expr::Sense;
//! use ndarray::array;
//!
//! let xlimits = array![[0., 1.], [0., 1.]];
//! let x = array![[0.2, 0.3], [0.7, 0.1], [0.5, 0.8]];
//! let y = array![1.5, 0.3, 2.1];
//!
//! // corners of the input space are added so that simplices fill it
//! let part = partition(&x, &xlimits, true).unwrap();
//! assert!((part.total_volume() - 1.).abs() < 1e-9);
//!
//! let sampler = AdaptiveSampler::new(&xlimits).unwrap();
//! let explore = sampler.max_volume(&part).unwrap();
//! let exploit = sampler.exploit_adjacent(&part, &y, Sense::Minimize).unwrap();
//! assert_eq!(explore.n_binaries(), part.simplices().len());
//! assert_eq!(exploit.n_binaries(), part.simplices().len());
//! ```
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod delaunay;
mod errors;
mod partition;
mod sampler;

pub use errors::*;
pub use partition::*;
pub use sampler::*;
