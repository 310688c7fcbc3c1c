//! Optimization model: variables, constraints, objective and reusable blocks.
use crate::errors::{ExprError, Result};
use crate::expression::{Expr, VarId};
use log::debug;
use ndarray::Array1;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Variable domain
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum Domain {
    /// Real valued
    Continuous,
    /// Takes value 0 or 1
    Binary,
}

/// A decision variable
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Variable {
    /// Name, unique within a model
    pub name: String,
    /// Domain
    pub domain: Domain,
    /// Lower bound (may be -inf)
    pub lower: f64,
    /// Upper bound (may be +inf)
    pub upper: f64,
}

/// Constraint relation between left and right hand sides
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum Relation {
    /// `lhs == rhs`
    Eq,
    /// `lhs <= rhs`
    Le,
    /// `lhs >= rhs`
    Ge,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::Eq => write!(f, "=="),
            Relation::Le => write!(f, "<="),
            Relation::Ge => write!(f, ">="),
        }
    }
}

/// A named constraint `lhs relation rhs`
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Constraint {
    /// Name
    pub name: String,
    /// Left hand side
    pub lhs: Expr,
    /// Relation
    pub relation: Relation,
    /// Right hand side
    pub rhs: Expr,
}

impl Constraint {
    /// Constraint `lhs == rhs`
    pub fn equal(name: impl Into<String>, lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        Self::new(name, lhs, Relation::Eq, rhs)
    }

    /// Constraint `lhs <= rhs`
    pub fn less_eq(name: impl Into<String>, lhs: impl Into<Expr>, rhs: impl Into<Expr>) -> Self {
        Self::new(name, lhs, Relation::Le, rhs)
    }

    /// Constraint `lhs >= rhs`
    pub fn greater_eq(
        name: impl Into<String>,
        lhs: impl Into<Expr>,
        rhs: impl Into<Expr>,
    ) -> Self {
        Self::new(name, lhs, Relation::Ge, rhs)
    }

    fn new(
        name: impl Into<String>,
        lhs: impl Into<Expr>,
        relation: Relation,
        rhs: impl Into<Expr>,
    ) -> Self {
        Constraint {
            name: name.into(),
            lhs: lhs.into(),
            relation,
            rhs: rhs.into(),
        }
    }

    /// `lhs - rhs` at the given point
    pub fn residual(&self, x: &Assignment) -> f64 {
        self.lhs.eval(x) - self.rhs.eval(x)
    }

    /// Amount by which the constraint is violated, 0 when satisfied.
    /// NaN residuals count as infinitely violated.
    pub fn violation(&self, x: &Assignment) -> f64 {
        let r = self.residual(x);
        if r.is_nan() {
            return f64::INFINITY;
        }
        match self.relation {
            Relation::Eq => r.abs(),
            Relation::Le => r.max(0.),
            Relation::Ge => (-r).max(0.),
        }
    }

    /// Whether the constraint is affine on both sides
    pub fn is_affine(&self) -> bool {
        self.lhs.is_affine() && self.rhs.is_affine()
    }

    fn shifted(&self, prefix: &str, offset: usize) -> Constraint {
        Constraint {
            name: format!("{prefix}.{}", self.name),
            lhs: self.lhs.shifted(offset),
            relation: self.relation,
            rhs: self.rhs.shifted(offset),
        }
    }
}

/// Optimization direction
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum Sense {
    /// Minimization
    #[default]
    Minimize,
    /// Maximization
    Maximize,
}

impl FromStr for Sense {
    type Err = ExprError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "min" | "minimize" => Ok(Sense::Minimize),
            "max" | "maximize" => Ok(Sense::Maximize),
            _ => Err(ExprError::InvalidValue(format!(
                "Unknown optimization sense '{s}', expected 'min' or 'max'"
            ))),
        }
    }
}

/// Objective of a model
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Objective {
    /// Objective expression
    pub expr: Expr,
    /// Direction
    pub sense: Sense,
}

/// Values of every variable of a model, indexed by [`VarId`]
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Assignment(Array1<f64>);

impl Assignment {
    /// Assignment from raw values
    pub fn new(values: Array1<f64>) -> Self {
        Assignment(values)
    }

    /// All zeros assignment of `n` variables
    pub fn zeros(n: usize) -> Self {
        Assignment(Array1::zeros(n))
    }

    /// Value of the variable `v`
    pub fn value(&self, v: VarId) -> f64 {
        self.0[v.index()]
    }

    /// Set the value of the variable `v`
    pub fn set(&mut self, v: VarId, value: f64) {
        self.0[v.index()] = value;
    }

    /// Number of values
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the assignment holds no values
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Raw values
    pub fn values(&self) -> &Array1<f64> {
        &self.0
    }
}

/// Public variables of a block once embedded in a model
#[derive(Clone, Debug, PartialEq)]
pub struct Embedded {
    /// Block inputs in the host model
    pub inputs: Vec<VarId>,
    /// Block outputs in the host model
    pub outputs: Vec<VarId>,
}

/// An optimization model
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Model {
    name: String,
    variables: Vec<Variable>,
    constraints: Vec<Constraint>,
    objective: Option<Objective>,
}

impl Model {
    /// Empty model
    pub fn new(name: impl Into<String>) -> Self {
        Model {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Model name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Variables
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Variable by id
    pub fn variable(&self, v: VarId) -> Result<&Variable> {
        self.variables
            .get(v.index())
            .ok_or_else(|| ExprError::UnknownVariable(format!("{v}")))
    }

    /// Constraints
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Objective if any
    pub fn objective(&self) -> Option<&Objective> {
        self.objective.as_ref()
    }

    /// Number of variables
    pub fn n_vars(&self) -> usize {
        self.variables.len()
    }

    /// Number of binary variables
    pub fn n_binaries(&self) -> usize {
        self.variables
            .iter()
            .filter(|v| v.domain == Domain::Binary)
            .count()
    }

    /// Whether every constraint and the objective are affine
    pub fn is_linear(&self) -> bool {
        self.constraints.iter().all(|c| c.is_affine())
            && self.objective.as_ref().map_or(true, |o| o.expr.is_affine())
    }

    /// Add a variable and return its id
    pub fn add_variable(&mut self, var: Variable) -> VarId {
        self.variables.push(var);
        VarId(self.variables.len() - 1)
    }

    /// Add a bounded continuous variable
    pub fn add_continuous(&mut self, name: impl Into<String>, lower: f64, upper: f64) -> VarId {
        self.add_variable(Variable {
            name: name.into(),
            domain: Domain::Continuous,
            lower,
            upper,
        })
    }

    /// Add an unbounded continuous variable
    pub fn add_free(&mut self, name: impl Into<String>) -> VarId {
        self.add_continuous(name, f64::NEG_INFINITY, f64::INFINITY)
    }

    /// Add a binary variable
    pub fn add_binary(&mut self, name: impl Into<String>) -> VarId {
        self.add_variable(Variable {
            name: name.into(),
            domain: Domain::Binary,
            lower: 0.,
            upper: 1.,
        })
    }

    /// Add `n` continuous variables named `prefix[i]`
    pub fn add_vars(&mut self, prefix: &str, n: usize, lower: f64, upper: f64) -> Vec<VarId> {
        (0..n)
            .map(|i| self.add_continuous(format!("{prefix}[{i}]"), lower, upper))
            .collect()
    }

    /// Add a constraint, every variable it references must belong to the model
    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<()> {
        self.check_expr(&constraint.lhs)?;
        self.check_expr(&constraint.rhs)?;
        self.constraints.push(constraint);
        Ok(())
    }

    /// Set the objective
    pub fn set_objective(&mut self, expr: impl Into<Expr>, sense: Sense) -> Result<()> {
        let expr = expr.into();
        self.check_expr(&expr)?;
        self.objective = Some(Objective { expr, sense });
        Ok(())
    }

    /// Id of the first variable with the given name
    pub fn find(&self, name: &str) -> Option<VarId> {
        self.variables
            .iter()
            .position(|v| v.name == name)
            .map(VarId)
    }

    /// Copy every variable and constraint of `block` into this model.
    /// Names are prefixed with `prefix.`, the block objective is ignored.
    pub fn embed(&mut self, prefix: &str, block: &Block) -> Embedded {
        let offset = self.variables.len();
        for var in block.model.variables.iter() {
            self.variables.push(Variable {
                name: format!("{prefix}.{}", var.name),
                ..var.clone()
            });
        }
        for c in block.model.constraints.iter() {
            self.constraints.push(c.shifted(prefix, offset));
        }
        debug!(
            "Embed block '{}' as '{prefix}' ({} vars, {} constraints) in '{}'",
            block.model.name,
            block.model.n_vars(),
            block.model.constraints.len(),
            self.name
        );
        Embedded {
            inputs: block.inputs.iter().map(|v| v.shifted(offset)).collect(),
            outputs: block.outputs.iter().map(|v| v.shifted(offset)).collect(),
        }
    }

    /// Largest violation over variable bounds, integrality and constraints
    pub fn max_violation(&self, x: &Assignment) -> Result<f64> {
        self.check_assignment(x)?;
        let bounds = self.variables.iter().enumerate().map(|(i, var)| {
            let v = x.0[i];
            let mut viol = (var.lower - v).max(0.).max(v - var.upper);
            if var.domain == Domain::Binary {
                viol = viol.max(v.min(1. - v).max(0.));
            }
            viol
        });
        let cstrs = self.constraints.iter().map(|c| c.violation(x));
        Ok(bounds.chain(cstrs).fold(0., f64::max))
    }

    /// Whether every bound, integrality requirement and constraint holds within `tol`
    pub fn is_feasible(&self, x: &Assignment, tol: f64) -> Result<bool> {
        Ok(self.max_violation(x)? <= tol)
    }

    /// Names of the constraints violated by more than `tol`
    pub fn violated(&self, x: &Assignment, tol: f64) -> Result<Vec<&str>> {
        self.check_assignment(x)?;
        Ok(self
            .constraints
            .iter()
            .filter(|c| c.violation(x) > tol)
            .map(|c| c.name.as_str())
            .collect())
    }

    /// Objective value at `x`, `None` without objective
    pub fn objective_value(&self, x: &Assignment) -> Result<Option<f64>> {
        self.check_assignment(x)?;
        Ok(self.objective.as_ref().map(|o| o.expr.eval(x)))
    }

    fn check_expr(&self, expr: &Expr) -> Result<()> {
        match expr
            .variables()
            .into_iter()
            .find(|v| v.index() >= self.variables.len())
        {
            Some(v) => Err(ExprError::UnknownVariable(format!(
                "{v} in model '{}' with {} variables",
                self.name,
                self.variables.len()
            ))),
            None => Ok(()),
        }
    }

    fn check_assignment(&self, x: &Assignment) -> Result<()> {
        if x.len() != self.variables.len() {
            return Err(ExprError::DimensionMismatch(format!(
                "assignment of {} values for model '{}' with {} variables",
                x.len(),
                self.name,
                self.variables.len()
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Model {}", self.name)?;
        for (i, v) in self.variables.iter().enumerate() {
            writeln!(
                f,
                "  x{i} {}: {:?} [{}, {}]",
                v.name, v.domain, v.lower, v.upper
            )?;
        }
        for c in self.constraints.iter() {
            writeln!(f, "  {}: {} {} {}", c.name, c.lhs, c.relation, c.rhs)?;
        }
        if let Some(obj) = &self.objective {
            writeln!(f, "  {:?} {}", obj.sense, obj.expr)?;
        }
        Ok(())
    }
}

/// A self-contained model fragment exposing public `inputs` and `outputs`.
/// Every other variable of the block is internal.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Block {
    model: Model,
    inputs: Vec<VarId>,
    outputs: Vec<VarId>,
}

impl Block {
    /// Block from a model and its public variables
    pub fn new(model: Model, inputs: Vec<VarId>, outputs: Vec<VarId>) -> Result<Self> {
        if let Some(v) = inputs
            .iter()
            .chain(outputs.iter())
            .find(|v| v.index() >= model.n_vars())
        {
            return Err(ExprError::UnknownVariable(format!(
                "public variable {v} not in block '{}'",
                model.name
            )));
        }
        Ok(Block {
            model,
            inputs,
            outputs,
        })
    }

    /// Underlying model
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Public inputs
    pub fn inputs(&self) -> &[VarId] {
        &self.inputs
    }

    /// Public outputs
    pub fn outputs(&self) -> &[VarId] {
        &self.outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn square_block() -> Block {
        let mut m = Model::new("square");
        let x = m.add_free("x");
        let y = m.add_free("y");
        m.add_constraint(Constraint::equal("def", y, Expr::from(x).powi(2)))
            .unwrap();
        Block::new(m, vec![x], vec![y]).unwrap()
    }

    #[test]
    fn test_constraint_violation() {
        let x = VarId(0);
        let vals = Assignment::new(array![2.]);
        assert_abs_diff_eq!(Constraint::equal("c", x, 3.).violation(&vals), 1.);
        assert_abs_diff_eq!(Constraint::less_eq("c", x, 3.).violation(&vals), 0.);
        assert_abs_diff_eq!(Constraint::greater_eq("c", x, 3.).violation(&vals), 1.);
        assert_abs_diff_eq!(Constraint::less_eq("c", x, 1.5).violation(&vals), 0.5);
    }

    #[test]
    fn test_unknown_variable() {
        let mut m = Model::new("m");
        let x = m.add_free("x");
        assert!(m.add_constraint(Constraint::equal("c", x, 1.)).is_ok());
        assert!(matches!(
            m.add_constraint(Constraint::equal("c", VarId(3), 1.)),
            Err(ExprError::UnknownVariable(_))
        ));
        assert!(matches!(
            m.set_objective(VarId(1), Sense::Maximize),
            Err(ExprError::UnknownVariable(_))
        ));
        assert!(Block::new(m, vec![VarId(1)], vec![]).is_err());
    }

    #[test]
    fn test_feasibility_with_bounds_and_binaries() {
        let mut m = Model::new("m");
        let x = m.add_continuous("x", 0., 1.);
        let y = m.add_binary("y");
        m.add_constraint(Constraint::less_eq("c", x, y)).unwrap();
        assert!(m.is_feasible(&Assignment::new(array![0.5, 1.]), 1e-9).unwrap());
        // bound violation
        assert!(!m.is_feasible(&Assignment::new(array![1.5, 1.]), 1e-9).unwrap());
        // fractional binary
        assert_abs_diff_eq!(
            m.max_violation(&Assignment::new(array![0.2, 0.6])).unwrap(),
            0.4,
            epsilon = 1e-12
        );
        // constraint violation
        assert_eq!(
            m.violated(&Assignment::new(array![0.5, 0.]), 1e-9).unwrap(),
            vec!["c"]
        );
        assert!(matches!(
            m.max_violation(&Assignment::zeros(3)),
            Err(ExprError::DimensionMismatch(_))
        ));
    }

    #[test]
    fn test_embed_blocks() {
        let block = square_block();
        let mut m = Model::new("outer");
        let u = m.add_continuous("u", -1., 1.);
        let first = m.embed("b1", &block);
        let second = m.embed("b2", &block);
        assert_eq!(m.n_vars(), 5);
        assert_eq!(first.inputs, vec![VarId(1)]);
        assert_eq!(second.outputs, vec![VarId(4)]);
        assert_eq!(m.find("b2.y"), Some(VarId(4)));
        assert_eq!(m.constraints()[1].name, "b2.def");

        m.add_constraint(Constraint::equal("link1", u, first.inputs[0]))
            .unwrap();
        m.add_constraint(Constraint::equal("link2", first.outputs[0], second.inputs[0]))
            .unwrap();
        m.set_objective(second.outputs[0], Sense::Minimize).unwrap();

        // u = 0.5 -> 0.25 -> 0.0625
        let x = Assignment::new(array![0.5, 0.5, 0.25, 0.25, 0.0625]);
        assert!(m.is_feasible(&x, 1e-12).unwrap());
        assert_abs_diff_eq!(m.objective_value(&x).unwrap().unwrap(), 0.0625);
        assert!(!m.is_linear());
    }

    #[test]
    fn test_sense_from_str() {
        assert_eq!("max".parse::<Sense>().unwrap(), Sense::Maximize);
        assert_eq!("Minimize".parse::<Sense>().unwrap(), Sense::Minimize);
        assert!("best".parse::<Sense>().is_err());
    }
}
