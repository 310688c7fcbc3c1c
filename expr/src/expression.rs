//! Scalar expressions built over the variables of a [`Model`](crate::Model).
//!
//! An [`Expr`] is a plain tree: constants, variables, sums, products, quotients,
//! constant powers and elementary function calls. Arithmetic operators are
//! overloaded for [`Expr`], [`VarId`] and `f64` so that constraints read like
//! the mathematical formulation:
//!
//! ```
//! use ddobox_expr::{Expr, Model};
//!
//! let mut model = Model::new("demo");
//! let x = model.add_free("x");
//! let y = model.add_binary("y");
//! let e = 2. * x - 1e3 * (1. - y) + Expr::from(x).exp();
//! assert!(!e.is_affine());
//! ```
use crate::model::Assignment;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Index of a variable within a [`Model`](crate::Model)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct VarId(pub(crate) usize);

impl VarId {
    /// Position of the variable in the model variable list
    pub fn index(self) -> usize {
        self.0
    }

    pub(crate) fn shifted(self, offset: usize) -> VarId {
        VarId(self.0 + offset)
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// Elementary functions available in expressions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum Func {
    /// Exponential
    Exp,
    /// Natural logarithm
    Ln,
    /// Square root
    Sqrt,
    /// Sine
    Sin,
    /// Absolute value
    Abs,
}

impl Func {
    /// Evaluate the function at `v`
    pub fn apply(self, v: f64) -> f64 {
        match self {
            Func::Exp => v.exp(),
            Func::Ln => v.ln(),
            Func::Sqrt => v.sqrt(),
            Func::Sin => v.sin(),
            Func::Abs => v.abs(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Func::Exp => "exp",
            Func::Ln => "log",
            Func::Sqrt => "sqrt",
            Func::Sin => "sin",
            Func::Abs => "abs",
        }
    }
}

/// A scalar expression
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum Expr {
    /// Constant value
    Const(f64),
    /// Variable reference
    Var(VarId),
    /// Sum of terms
    Sum(Vec<Expr>),
    /// Product of two expressions
    Mul(Box<Expr>, Box<Expr>),
    /// Quotient of two expressions
    Div(Box<Expr>, Box<Expr>),
    /// Expression raised to a constant power
    Powf(Box<Expr>, f64),
    /// Opposite of an expression
    Neg(Box<Expr>),
    /// Elementary function call
    Call(Func, Box<Expr>),
}

impl Default for Expr {
    fn default() -> Self {
        Expr::Const(0.)
    }
}

impl From<f64> for Expr {
    fn from(v: f64) -> Self {
        Expr::Const(v)
    }
}

impl From<VarId> for Expr {
    fn from(v: VarId) -> Self {
        Expr::Var(v)
    }
}

impl Expr {
    /// Constant expression
    pub fn constant(v: f64) -> Expr {
        Expr::Const(v)
    }

    /// Variable expression
    pub fn var(v: VarId) -> Expr {
        Expr::Var(v)
    }

    /// Sum of the given terms, nested sums are flattened and constants gathered
    /// in one trailing term. An empty sum is the constant 0.
    pub fn sum<I: IntoIterator<Item = Expr>>(terms: I) -> Expr {
        let mut flat = Vec::new();
        let mut cst = 0.;
        for term in terms {
            match term {
                Expr::Sum(inner) => {
                    for t in inner {
                        match t {
                            Expr::Const(c) => cst += c,
                            other => flat.push(other),
                        }
                    }
                }
                Expr::Const(c) => cst += c,
                other => flat.push(other),
            }
        }
        if cst != 0. || flat.is_empty() {
            flat.push(Expr::Const(cst));
        }
        if flat.len() == 1 {
            flat.swap_remove(0)
        } else {
            Expr::Sum(flat)
        }
    }

    /// Dot product `sum_i coefs[i] * terms[i]`
    pub fn dot<'a, I>(coefs: I, terms: &[Expr]) -> Expr
    where
        I: IntoIterator<Item = &'a f64>,
    {
        Expr::sum(coefs.into_iter().zip(terms).map(|(c, t)| *c * t.clone()))
    }

    /// `exp(self)`
    pub fn exp(self) -> Expr {
        Expr::Call(Func::Exp, Box::new(self))
    }

    /// `log(self)`
    pub fn ln(self) -> Expr {
        Expr::Call(Func::Ln, Box::new(self))
    }

    /// `sqrt(self)`
    pub fn sqrt(self) -> Expr {
        Expr::Call(Func::Sqrt, Box::new(self))
    }

    /// `sin(self)`
    pub fn sin(self) -> Expr {
        Expr::Call(Func::Sin, Box::new(self))
    }

    /// `|self|`
    pub fn abs(self) -> Expr {
        Expr::Call(Func::Abs, Box::new(self))
    }

    /// `self^p`
    pub fn powf(self, p: f64) -> Expr {
        match self {
            Expr::Const(c) => Expr::Const(pow(c, p)),
            e if p == 1. => e,
            e => Expr::Powf(Box::new(e), p),
        }
    }

    /// `self^n`
    pub fn powi(self, n: i32) -> Expr {
        self.powf(n as f64)
    }

    /// Value of the expression for the given variable values
    pub fn eval(&self, x: &Assignment) -> f64 {
        match self {
            Expr::Const(c) => *c,
            Expr::Var(v) => x.value(*v),
            Expr::Sum(terms) => terms.iter().map(|t| t.eval(x)).sum(),
            Expr::Mul(a, b) => a.eval(x) * b.eval(x),
            Expr::Div(a, b) => a.eval(x) / b.eval(x),
            Expr::Powf(a, p) => pow(a.eval(x), *p),
            Expr::Neg(a) => -a.eval(x),
            Expr::Call(f, a) => f.apply(a.eval(x)),
        }
    }

    /// Set of variables referenced by the expression
    pub fn variables(&self) -> BTreeSet<VarId> {
        let mut acc = BTreeSet::new();
        self.collect_variables(&mut acc);
        acc
    }

    fn collect_variables(&self, acc: &mut BTreeSet<VarId>) {
        match self {
            Expr::Const(_) => {}
            Expr::Var(v) => {
                acc.insert(*v);
            }
            Expr::Sum(terms) => terms.iter().for_each(|t| t.collect_variables(acc)),
            Expr::Mul(a, b) | Expr::Div(a, b) => {
                a.collect_variables(acc);
                b.collect_variables(acc);
            }
            Expr::Powf(a, _) | Expr::Neg(a) | Expr::Call(_, a) => a.collect_variables(acc),
        }
    }

    /// Whether the expression does not depend on any variable
    pub fn is_constant(&self) -> bool {
        match self {
            Expr::Const(_) => true,
            Expr::Var(_) => false,
            Expr::Sum(terms) => terms.iter().all(|t| t.is_constant()),
            Expr::Mul(a, b) | Expr::Div(a, b) => a.is_constant() && b.is_constant(),
            Expr::Powf(a, _) | Expr::Neg(a) | Expr::Call(_, a) => a.is_constant(),
        }
    }

    /// Whether the expression is affine in the variables
    pub fn is_affine(&self) -> bool {
        match self {
            Expr::Const(_) | Expr::Var(_) => true,
            Expr::Sum(terms) => terms.iter().all(|t| t.is_affine()),
            Expr::Mul(a, b) => {
                (a.is_constant() && b.is_affine()) || (b.is_constant() && a.is_affine())
            }
            Expr::Div(a, b) => a.is_affine() && b.is_constant(),
            Expr::Powf(a, p) => a.is_constant() || (*p == 1. && a.is_affine()),
            Expr::Neg(a) => a.is_affine(),
            Expr::Call(_, a) => a.is_constant(),
        }
    }

    /// Same expression with every variable index moved by `offset`
    pub(crate) fn shifted(&self, offset: usize) -> Expr {
        match self {
            Expr::Const(c) => Expr::Const(*c),
            Expr::Var(v) => Expr::Var(v.shifted(offset)),
            Expr::Sum(terms) => Expr::Sum(terms.iter().map(|t| t.shifted(offset)).collect()),
            Expr::Mul(a, b) => Expr::Mul(Box::new(a.shifted(offset)), Box::new(b.shifted(offset))),
            Expr::Div(a, b) => Expr::Div(Box::new(a.shifted(offset)), Box::new(b.shifted(offset))),
            Expr::Powf(a, p) => Expr::Powf(Box::new(a.shifted(offset)), *p),
            Expr::Neg(a) => Expr::Neg(Box::new(a.shifted(offset))),
            Expr::Call(f, a) => Expr::Call(*f, Box::new(a.shifted(offset))),
        }
    }

    fn is_atomic(&self) -> bool {
        matches!(self, Expr::Const(_) | Expr::Var(_) | Expr::Call(_, _))
    }
}

/// Integer exponents go through `powi` so that negative bases stay defined
fn pow(v: f64, p: f64) -> f64 {
    if p.fract() == 0. && p.abs() <= i32::MAX as f64 {
        v.powi(p as i32)
    } else {
        v.powf(p)
    }
}

fn add_exprs(lhs: Expr, rhs: Expr) -> Expr {
    Expr::sum([lhs, rhs])
}

fn sub_exprs(lhs: Expr, rhs: Expr) -> Expr {
    Expr::sum([lhs, -rhs])
}

fn mul_exprs(lhs: Expr, rhs: Expr) -> Expr {
    match (lhs, rhs) {
        (Expr::Const(a), Expr::Const(b)) => Expr::Const(a * b),
        (Expr::Const(c), _) | (_, Expr::Const(c)) if c == 0. => Expr::Const(0.),
        (Expr::Const(c), e) | (e, Expr::Const(c)) if c == 1. => e,
        (a, b) => Expr::Mul(Box::new(a), Box::new(b)),
    }
}

fn div_exprs(lhs: Expr, rhs: Expr) -> Expr {
    match (lhs, rhs) {
        (Expr::Const(a), Expr::Const(b)) => Expr::Const(a / b),
        (e, Expr::Const(c)) if c == 1. => e,
        (a, b) => Expr::Div(Box::new(a), Box::new(b)),
    }
}

impl Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        match self {
            Expr::Const(c) => Expr::Const(-c),
            Expr::Neg(inner) => *inner,
            e => Expr::Neg(Box::new(e)),
        }
    }
}

impl Neg for VarId {
    type Output = Expr;
    fn neg(self) -> Expr {
        -Expr::Var(self)
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $func:ident) => {
        impl $trait<Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                $func(self, rhs)
            }
        }
        impl $trait<f64> for Expr {
            type Output = Expr;
            fn $method(self, rhs: f64) -> Expr {
                $func(self, Expr::Const(rhs))
            }
        }
        impl $trait<VarId> for Expr {
            type Output = Expr;
            fn $method(self, rhs: VarId) -> Expr {
                $func(self, Expr::Var(rhs))
            }
        }
        impl $trait<Expr> for f64 {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                $func(Expr::Const(self), rhs)
            }
        }
        impl $trait<VarId> for f64 {
            type Output = Expr;
            fn $method(self, rhs: VarId) -> Expr {
                $func(Expr::Const(self), Expr::Var(rhs))
            }
        }
        impl $trait<Expr> for VarId {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                $func(Expr::Var(self), rhs)
            }
        }
        impl $trait<f64> for VarId {
            type Output = Expr;
            fn $method(self, rhs: f64) -> Expr {
                $func(Expr::Var(self), Expr::Const(rhs))
            }
        }
        impl $trait<VarId> for VarId {
            type Output = Expr;
            fn $method(self, rhs: VarId) -> Expr {
                $func(Expr::Var(self), Expr::Var(rhs))
            }
        }
    };
}

impl_binary_op!(Add, add, add_exprs);
impl_binary_op!(Sub, sub, sub_exprs);
impl_binary_op!(Mul, mul, mul_exprs);
impl_binary_op!(Div, div, div_exprs);

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let operand = |e: &Expr, f: &mut fmt::Formatter<'_>| -> fmt::Result {
            if e.is_atomic() {
                write!(f, "{e}")
            } else {
                write!(f, "({e})")
            }
        };
        match self {
            Expr::Const(c) => write!(f, "{c}"),
            Expr::Var(v) => write!(f, "{v}"),
            Expr::Sum(terms) => {
                for (i, t) in terms.iter().enumerate() {
                    if i > 0 {
                        write!(f, " + ")?;
                    }
                    operand(t, f)?;
                }
                Ok(())
            }
            Expr::Mul(a, b) => {
                operand(a, f)?;
                write!(f, " * ")?;
                operand(b, f)
            }
            Expr::Div(a, b) => {
                operand(a, f)?;
                write!(f, " / ")?;
                operand(b, f)
            }
            Expr::Powf(a, p) => {
                operand(a, f)?;
                write!(f, "^{p}")
            }
            Expr::Neg(a) => {
                write!(f, "-")?;
                operand(a, f)
            }
            Expr::Call(func, a) => write!(f, "{}({a})", func.name()),
        }
    }
}
