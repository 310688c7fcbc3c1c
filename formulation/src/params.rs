//! Formulation parameters and big-M policies.
use crate::errors::{FormulationError, Result};
use linfa::ParamGuard;
use ndarray::Array2;
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Default big-M constant used for every node
pub const DEFAULT_BIG_M: f64 = 1e6;
/// Default safety factor applied to propagated bounds
pub const DEFAULT_MARGIN: f64 = 10.;

/// Big-M policy of the piecewise linear activations encodings
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum BigM {
    /// Same constant for every node
    Fixed(f64),
    /// Per node constant computed by interval propagation of the raw input box
    /// through the network, multiplied by `margin`
    Propagated {
        /// Raw input space as a (nx, 2) matrix of [lower, upper] bounds
        xlimits: Array2<f64>,
        /// Safety factor (>= 1)
        margin: f64,
    },
}

impl Default for BigM {
    fn default() -> Self {
        BigM::Fixed(DEFAULT_BIG_M)
    }
}

impl BigM {
    /// Propagated policy with the default margin
    pub fn propagated(xlimits: Array2<f64>) -> Self {
        BigM::Propagated {
            xlimits,
            margin: DEFAULT_MARGIN,
        }
    }
}

/// The validated set of parameters of the formulation engine
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct FormulationValidParams {
    pub(crate) big_m: BigM,
}

impl FormulationValidParams {
    /// Big-M policy
    pub fn big_m(&self) -> &BigM {
        &self.big_m
    }
}

#[derive(Clone, Debug, Default)]
/// The set of parameters that can be specified for the formulation engine
pub struct FormulationParams(FormulationValidParams);

impl FormulationParams {
    /// Default parameters: fixed big-M of [DEFAULT_BIG_M]
    pub fn new() -> Self {
        Self::default()
    }

    /// A constructor from validated parameters
    pub fn new_from_valid(params: &FormulationValidParams) -> Self {
        Self(params.clone())
    }

    /// Set the big-M policy
    pub fn big_m(mut self, big_m: BigM) -> Self {
        self.0.big_m = big_m;
        self
    }
}

impl From<FormulationValidParams> for FormulationParams {
    fn from(valid: FormulationValidParams) -> Self {
        FormulationParams(valid)
    }
}

impl ParamGuard for FormulationParams {
    type Checked = FormulationValidParams;
    type Error = FormulationError;

    fn check_ref(&self) -> Result<&Self::Checked> {
        match &self.0.big_m {
            BigM::Fixed(m) => {
                if !m.is_finite() || *m <= 0. {
                    return Err(FormulationError::InvalidValue(format!(
                        "big-M should be positive and finite, got {m}"
                    )));
                }
            }
            BigM::Propagated { xlimits, margin } => {
                if !margin.is_finite() || *margin < 1. {
                    return Err(FormulationError::InvalidValue(format!(
                        "big-M margin should be >= 1, got {margin}"
                    )));
                }
                check_xlimits(xlimits)?;
            }
        }
        Ok(&self.0)
    }

    fn check(self) -> Result<Self::Checked> {
        self.check_ref()?;
        Ok(self.0)
    }
}

/// Check a (nx, 2) matrix of finite [lower, upper] bounds
pub(crate) fn check_xlimits(xlimits: &Array2<f64>) -> Result<()> {
    if xlimits.ncols() != 2 {
        return Err(FormulationError::InvalidValue(format!(
            "xlimits should have 2 columns, got {}",
            xlimits.ncols()
        )));
    }
    for (i, row) in xlimits.rows().into_iter().enumerate() {
        if !row[0].is_finite() || !row[1].is_finite() || row[0] > row[1] {
            return Err(FormulationError::InvalidValue(format!(
                "xlimits row {i} should be finite lower <= upper, got [{}, {}]",
                row[0], row[1]
            )));
        }
    }
    Ok(())
}
