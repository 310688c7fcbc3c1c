//! Contract of the external optimization solver.
use crate::model::{Assignment, Model};
use thiserror::Error;

/// Failure reported by a [`Solver`]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolveError {
    /// No assignment satisfies the constraints
    #[error("Problem is infeasible")]
    Infeasible,
    /// The objective is unbounded in the optimization direction
    #[error("Problem is unbounded")]
    Unbounded,
    /// Any other solver failure
    #[error("Solver failure: {0}")]
    SolverFailure(String),
}

/// A mixed-integer (non)linear solver able to optimize a [`Model`].
///
/// Implementations are expected to return an assignment of every model variable,
/// in [`VarId`](crate::VarId) order.
pub trait Solver {
    /// Solve the model
    fn solve(&self, model: &Model) -> std::result::Result<Assignment, SolveError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Constraint, Domain, Sense};
    use ndarray::Array1;

    /// Brute force solver over the binaries of a model without continuous variables
    struct Enumerate;

    impl Solver for Enumerate {
        fn solve(&self, model: &Model) -> std::result::Result<Assignment, SolveError> {
            let n = model.n_vars();
            if model.variables().iter().any(|v| v.domain != Domain::Binary) {
                return Err(SolveError::SolverFailure("binaries only".to_string()));
            }
            let sign = match model.objective().map(|o| o.sense) {
                Some(Sense::Maximize) => -1.,
                _ => 1.,
            };
            let mut best: Option<(f64, Assignment)> = None;
            for code in 0..(1usize << n) {
                let x = Assignment::new(Array1::from_shape_fn(n, |i| ((code >> i) & 1) as f64));
                if model.is_feasible(&x, 1e-9).unwrap() {
                    let obj = sign * model.objective_value(&x).unwrap().unwrap_or(0.);
                    if best.as_ref().map_or(true, |(b, _)| obj < *b) {
                        best = Some((obj, x));
                    }
                }
            }
            best.map(|(_, x)| x).ok_or(SolveError::Infeasible)
        }
    }

    #[test]
    fn test_solver_contract() {
        let mut m = Model::new("knapsack");
        let a = m.add_binary("a");
        let b = m.add_binary("b");
        let c = m.add_binary("c");
        m.add_constraint(Constraint::less_eq("cap", 3. * a + 2. * b + 2. * c, 4.))
            .unwrap();
        m.set_objective(5. * a + 3. * b + 3. * c, Sense::Maximize)
            .unwrap();
        let x = Enumerate.solve(&m).unwrap();
        assert_eq!(x.values().to_vec(), vec![0., 1., 1.]);

        m.add_constraint(Constraint::greater_eq("all", a + b + c, 3.))
            .unwrap();
        assert_eq!(Enumerate.solve(&m), Err(SolveError::Infeasible));
    }
}
