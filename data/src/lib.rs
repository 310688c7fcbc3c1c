/*!
This library handles the data side of surrogate-based optimization:

* initial designs within a bounded input space `xlimits`, given as a `(nx, 2)` ndarray
  of lower and upper bounds, generated by [Random], maximin [Lhs], [Grid] or scrambled
  [Sobol] sampling,
* the [DataHandler] which keeps inputs, outputs and convergence flags of the sampled
  simulations, splits them in train/test sets and standardizes them,
* the [Scaling] moments which implement the [ScalingProvider] contract consumed by the
  surrogate formulation engine.

Example:
```
use ddobox_data::{DataHandler, SamplingKind, ScalingProvider};
use ndarray::array;
use ndarray_rand::rand::SeedableRng;
use rand_xoshiro::Xoshiro256Plus;

let xlimits = array![[-3., 3.], [0., 10.]];
let mut data = DataHandler::init_with_rng(
    30, &xlimits, 1, SamplingKind::Lhs, Xoshiro256Plus::seed_from_u64(42)
).unwrap();
// outputs come from the simulations of the sampled inputs
let y = data.x().map_axis(ndarray::Axis(1), |x| x[0] * x[0] + x[1]).insert_axis(ndarray::Axis(1));
data.set_y(y).unwrap();
data.split(0.25).unwrap();
let scaling = data.scale().unwrap();
assert_eq!(scaling.nx(), 2);
```
*/
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod errors;
mod handler;
mod sampling;
mod scaling;

pub use errors::*;
pub use handler::*;
pub use sampling::*;
pub use scaling::*;
