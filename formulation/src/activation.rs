//! Activation functions of the network hidden layers.
use crate::errors::FormulationError;
use ddobox_expr::Expr;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Slope of the leaky ReLU activation for negative inputs
pub const LEAKY_RELU_SLOPE: f64 = 0.01;

/// Activation functions of hidden layers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum Activation {
    /// `a = z`
    Linear,
    /// `a = max(0, z)`
    Relu,
    /// `a = tanh(z)`
    Tanh,
    /// `a = 1 / (1 + exp(-z))`
    Sigmoid,
    /// `a = log(1 + exp(z))`
    Softplus,
    /// `a = min(1, max(0, z / 6 + 1/2))`
    HardSigmoid,
    /// `a = max(z, 0.01 z)`
    LeakyRelu,
}

impl Activation {
    /// Value of the activation at `z`
    pub fn apply(&self, z: f64) -> f64 {
        match self {
            Activation::Linear => z,
            Activation::Relu => z.max(0.),
            Activation::Tanh => z.tanh(),
            Activation::Sigmoid => 1. / (1. + (-z).exp()),
            Activation::Softplus => z.exp().ln_1p(),
            Activation::HardSigmoid => (z / 6. + 0.5).clamp(0., 1.),
            Activation::LeakyRelu => z.max(LEAKY_RELU_SLOPE * z),
        }
    }

    /// Closed form expression of the activation, `None` when it is encoded with binaries
    pub fn expression(&self, z: Expr) -> Option<Expr> {
        match self {
            Activation::Linear => Some(z),
            Activation::Tanh => Some(1. - 2. / ((2. * z).exp() + 1.)),
            Activation::Sigmoid => Some(1. / (1. + (-z).exp())),
            Activation::Softplus => Some((1. + z.exp()).ln()),
            Activation::LeakyRelu => {
                let (s, d) = (
                    (1. + LEAKY_RELU_SLOPE) / 2.,
                    (1. - LEAKY_RELU_SLOPE) / 2.,
                );
                Some(s * z.clone() + d * z.abs())
            }
            Activation::Relu | Activation::HardSigmoid => None,
        }
    }

    /// Whether the activation requires binary variables (big-M encoding)
    pub fn is_piecewise_linear(&self) -> bool {
        matches!(self, Activation::Relu | Activation::HardSigmoid)
    }

    fn tag(&self) -> &'static str {
        match self {
            Activation::Linear => "linear",
            Activation::Relu => "relu",
            Activation::Tanh => "tanh",
            Activation::Sigmoid => "sigmoid",
            Activation::Softplus => "softplus",
            Activation::HardSigmoid => "hardsigmoid",
            Activation::LeakyRelu => "leakyrelu",
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl FromStr for Activation {
    type Err = FormulationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_lowercase();
        match tag.as_str() {
            "linear" | "identity" => Ok(Activation::Linear),
            "relu" => Ok(Activation::Relu),
            "tanh" => Ok(Activation::Tanh),
            "sigmoid" | "logistic" => Ok(Activation::Sigmoid),
            "softplus" => Ok(Activation::Softplus),
            "hardsigmoid" => Ok(Activation::HardSigmoid),
            "leakyrelu" => Ok(Activation::LeakyRelu),
            _ => Err(FormulationError::UnsupportedModelKind(format!(
                "activation '{s}'"
            ))),
        }
    }
}
