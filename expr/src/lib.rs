/*!
This library provides the algebraic modeling layer used to express surrogate models
as optimization constraints: decision variables (bounded continuous or binary),
scalar expressions (affine terms, products, quotients, constant powers and elementary
functions), constraints (`==`, `<=`, `>=`), objectives and reusable [`Block`]s.

A [`Block`] is a [`Model`] fragment exposing public `inputs` and `outputs`; it can be
embedded several times in a host model, its variables and constraints being copied
under a name prefix.

The library does not solve anything: a [`Model`] is handed to an external [`Solver`]
which returns an [`Assignment`] of the variables. Any assignment can be checked
against the model with [`Model::max_violation`] or [`Model::is_feasible`].

Example:
```
use ddobox_expr::{Assignment, Block, Constraint, Model, Sense};
use ndarray::array;

// y = 2x + 1 as a block
let mut m = Model::new("affine");
let x = m.add_free("x");
let y = m.add_free("y");
m.add_constraint(Constraint::equal("def", y, 2. * x + 1.)).unwrap();
let block = Block::new(m, vec![x], vec![y]).unwrap();

// maximize the block output over x in [0, 3]
let mut problem = Model::new("problem");
let u = problem.add_continuous("u", 0., 3.);
let b = problem.embed("blk", &block);
problem.add_constraint(Constraint::equal("link", u, b.inputs[0])).unwrap();
problem.set_objective(b.outputs[0], Sense::Maximize).unwrap();

let sol = Assignment::new(array![3., 3., 7.]);
assert!(problem.is_feasible(&sol, 1e-9).unwrap());
```
*/
#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
mod errors;
mod expression;
mod model;
mod solver;

pub use errors::*;
pub use expression::*;
pub use model::*;
pub use solver::*;
