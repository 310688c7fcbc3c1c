//! Kernels of gaussian process models, evaluated either numerically or as
//! expressions of the (standardized) input variables.
use crate::errors::{FormulationError, Result};
use ddobox_expr::Expr;
use ndarray::{ArrayBase, Data, Ix1};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::fmt;

/// Matern smoothness values with a closed form expression
pub const MATERN_NU_VALUES: [f64; 3] = [0.5, 1.5, 2.5];

/// Covariance kernels `k(x, t)`, the signal variance is kept apart in the model descriptor
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum Kernel {
    /// `exp(-|x - t|^2 / (2 l^2))`
    Rbf {
        /// Length scale
        length_scale: f64,
    },
    /// `sigma_0^2 + x.t`
    Linear {
        /// Inhomogeneity
        sigma_0: f64,
    },
    /// `(sigma_0^2 + x.t)^order`
    Polynomial {
        /// Inhomogeneity
        sigma_0: f64,
        /// Polynomial order
        order: u32,
    },
    /// `(1 + |x - t|^2 / (2 alpha l^2))^(-alpha)`
    RationalQuadratic {
        /// Length scale
        length_scale: f64,
        /// Scale mixture
        alpha: f64,
    },
    /// `exp(-2 sin^2(pi |x - t| / p) / l^2)`
    ExpSineSquared {
        /// Length scale
        length_scale: f64,
        /// Periodicity
        periodicity: f64,
    },
    /// Matern kernel for `nu` in {0.5, 1.5, 2.5}
    Matern {
        /// Length scale
        length_scale: f64,
        /// Smoothness
        nu: f64,
    },
    /// Sum of two rbf kernels
    SumRbf {
        /// Length scale of the first term
        length_scale: f64,
        /// Length scale of the second term
        length_scale_1: f64,
    },
    /// Sum of two rational quadratic kernels
    SumRationalQuadratic {
        /// Length scale of the first term
        length_scale: f64,
        /// Scale mixture of the first term
        alpha: f64,
        /// Length scale of the second term
        length_scale_1: f64,
        /// Scale mixture of the second term
        alpha_1: f64,
    },
}

/// Hyperparameters record used to build a [`Kernel`] from its tag
#[derive(Clone, Debug, Default, PartialEq)]
pub struct KernelHyperparameters {
    /// Length scale
    pub length_scale: Option<f64>,
    /// Length scale of the second term of sum kernels
    pub length_scale_1: Option<f64>,
    /// Inhomogeneity of dot product kernels
    pub sigma_0: Option<f64>,
    /// Polynomial order
    pub order: Option<u32>,
    /// Scale mixture of rational quadratic kernels
    pub scale_mixture: Option<f64>,
    /// Scale mixture of the second term of the sum of rational quadratic kernels
    pub scale_mixture_1: Option<f64>,
    /// Periodicity of the exp-sine-squared kernel
    pub periodicity: Option<f64>,
    /// Matern smoothness
    pub nu: Option<f64>,
}

fn required<T>(value: Option<T>, name: &str, tag: &str) -> Result<T> {
    value.ok_or_else(|| {
        FormulationError::InvalidDescriptor(format!("kernel '{tag}' requires '{name}'"))
    })
}

impl Kernel {
    /// Build a kernel from its tag (`rbf`, `linear`, `polynomial`, `RationalQuadratic`,
    /// `ExpSineSquared`, `Matern`, `Sum_RBF`, `Sum_RQ`) and hyperparameters
    pub fn from_tag(tag: &str, hp: &KernelHyperparameters) -> Result<Self> {
        let key: String = tag
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_lowercase();
        let kernel = match key.as_str() {
            "rbf" => Kernel::Rbf {
                length_scale: required(hp.length_scale, "length_scale", tag)?,
            },
            "linear" | "dotproduct" => Kernel::Linear {
                sigma_0: required(hp.sigma_0, "sigma_0", tag)?,
            },
            "polynomial" => Kernel::Polynomial {
                sigma_0: required(hp.sigma_0, "sigma_0", tag)?,
                order: required(hp.order, "order", tag)?,
            },
            "rationalquadratic" | "rq" => Kernel::RationalQuadratic {
                length_scale: required(hp.length_scale, "length_scale", tag)?,
                alpha: required(hp.scale_mixture, "scale_mixture", tag)?,
            },
            "expsinesquared" | "ess" => Kernel::ExpSineSquared {
                length_scale: required(hp.length_scale, "length_scale", tag)?,
                periodicity: required(hp.periodicity, "periodicity", tag)?,
            },
            "matern" => Kernel::Matern {
                length_scale: required(hp.length_scale, "length_scale", tag)?,
                nu: required(hp.nu, "nu", tag)?,
            },
            "sumrbf" => Kernel::SumRbf {
                length_scale: required(hp.length_scale, "length_scale", tag)?,
                length_scale_1: required(hp.length_scale_1, "length_scale_1", tag)?,
            },
            "sumrq" | "sumrationalquadratic" => Kernel::SumRationalQuadratic {
                length_scale: required(hp.length_scale, "length_scale", tag)?,
                alpha: required(hp.scale_mixture, "scale_mixture", tag)?,
                length_scale_1: required(hp.length_scale_1, "length_scale_1", tag)?,
                alpha_1: required(hp.scale_mixture_1, "scale_mixture_1", tag)?,
            },
            _ => {
                return Err(FormulationError::UnsupportedModelKind(format!(
                    "kernel '{tag}'"
                )))
            }
        };
        Ok(kernel)
    }

    /// Check hyperparameter values: positive length scales, mixtures and periodicity,
    /// matern `nu` in {0.5, 1.5, 2.5}
    pub fn check(&self) -> Result<()> {
        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0. {
                Ok(())
            } else {
                Err(FormulationError::InvalidDescriptor(format!(
                    "{self} kernel: {name} should be positive, got {v}"
                )))
            }
        };
        match self {
            Kernel::Rbf { length_scale } => positive("length_scale", *length_scale),
            Kernel::Linear { sigma_0 } | Kernel::Polynomial { sigma_0, .. } => {
                if sigma_0.is_finite() {
                    Ok(())
                } else {
                    Err(FormulationError::InvalidDescriptor(format!(
                        "{self} kernel: sigma_0 should be finite"
                    )))
                }
            }
            Kernel::RationalQuadratic {
                length_scale,
                alpha,
            } => {
                positive("length_scale", *length_scale)?;
                positive("scale_mixture", *alpha)
            }
            Kernel::ExpSineSquared {
                length_scale,
                periodicity,
            } => {
                positive("length_scale", *length_scale)?;
                positive("periodicity", *periodicity)
            }
            Kernel::Matern { length_scale, nu } => {
                positive("length_scale", *length_scale)?;
                if MATERN_NU_VALUES.contains(nu) {
                    Ok(())
                } else {
                    Err(FormulationError::UnsupportedHyperparameter(format!(
                        "matern nu = {nu}, expected one of {MATERN_NU_VALUES:?}"
                    )))
                }
            }
            Kernel::SumRbf {
                length_scale,
                length_scale_1,
            } => {
                positive("length_scale", *length_scale)?;
                positive("length_scale_1", *length_scale_1)
            }
            Kernel::SumRationalQuadratic {
                length_scale,
                alpha,
                length_scale_1,
                alpha_1,
            } => {
                positive("length_scale", *length_scale)?;
                positive("scale_mixture", *alpha)?;
                positive("length_scale_1", *length_scale_1)?;
                positive("scale_mixture_1", *alpha_1)
            }
        }
    }

    /// Whether the uncertainty proxy formulation is available for this kernel
    pub fn supports_variance(&self) -> bool {
        matches!(
            self,
            Kernel::Rbf { .. } | Kernel::Linear { .. } | Kernel::Polynomial { .. }
        )
    }

    /// Kernel value between two points
    pub fn value(
        &self,
        x: &ArrayBase<impl Data<Elem = f64>, Ix1>,
        t: &ArrayBase<impl Data<Elem = f64>, Ix1>,
    ) -> f64 {
        let sq_dist = || {
            x.iter()
                .zip(t.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
        };
        let dot = || x.dot(t);
        match self {
            Kernel::Rbf { length_scale } => rbf(sq_dist(), *length_scale),
            Kernel::Linear { sigma_0 } => sigma_0.powi(2) + dot(),
            Kernel::Polynomial { sigma_0, order } => {
                (sigma_0.powi(2) + dot()).powi(*order as i32)
            }
            Kernel::RationalQuadratic {
                length_scale,
                alpha,
            } => rational_quadratic(sq_dist(), *length_scale, *alpha),
            Kernel::ExpSineSquared {
                length_scale,
                periodicity,
            } => {
                let s = (PI * sq_dist().sqrt() / periodicity).sin();
                (-2. * s * s / length_scale.powi(2)).exp()
            }
            Kernel::Matern { length_scale, nu } => {
                let f = (2. * nu).sqrt() * sq_dist().sqrt() / length_scale;
                matern_factor(*nu, f) * (-f).exp()
            }
            Kernel::SumRbf {
                length_scale,
                length_scale_1,
            } => {
                let d = sq_dist();
                rbf(d, *length_scale) + rbf(d, *length_scale_1)
            }
            Kernel::SumRationalQuadratic {
                length_scale,
                alpha,
                length_scale_1,
                alpha_1,
            } => {
                let d = sq_dist();
                rational_quadratic(d, *length_scale, *alpha)
                    + rational_quadratic(d, *length_scale_1, *alpha_1)
            }
        }
    }

    /// Kernel expression between variables `x` and a fixed point `t`
    pub fn expression(&self, x: &[Expr], t: &ArrayBase<impl Data<Elem = f64>, Ix1>) -> Expr {
        let sq_dist = || {
            Expr::sum(
                x.iter()
                    .zip(t.iter())
                    .map(|(xj, tj)| (xj.clone() - *tj).powi(2)),
            )
        };
        let dot = || Expr::dot(t.iter(), x);
        match self {
            Kernel::Rbf { length_scale } => rbf_expr(sq_dist(), *length_scale),
            Kernel::Linear { sigma_0 } => sigma_0.powi(2) + dot(),
            Kernel::Polynomial { sigma_0, order } => (sigma_0.powi(2) + dot()).powi(*order as i32),
            Kernel::RationalQuadratic {
                length_scale,
                alpha,
            } => rational_quadratic_expr(sq_dist(), *length_scale, *alpha),
            Kernel::ExpSineSquared {
                length_scale,
                periodicity,
            } => {
                let s = (PI / periodicity * sq_dist().sqrt()).sin();
                (-2. / length_scale.powi(2) * s.powi(2)).exp()
            }
            Kernel::Matern { length_scale, nu } => {
                let f = (2. * nu).sqrt() / length_scale * sq_dist().sqrt();
                let factor = if *nu == 0.5 {
                    Expr::from(1.)
                } else if *nu == 1.5 {
                    1. + f.clone()
                } else if *nu == 2.5 {
                    1. + f.clone() + f.clone().powi(2) / 3.
                } else {
                    Expr::from(f64::NAN)
                };
                factor * (-f).exp()
            }
            Kernel::SumRbf {
                length_scale,
                length_scale_1,
            } => rbf_expr(sq_dist(), *length_scale) + rbf_expr(sq_dist(), *length_scale_1),
            Kernel::SumRationalQuadratic {
                length_scale,
                alpha,
                length_scale_1,
                alpha_1,
            } => {
                rational_quadratic_expr(sq_dist(), *length_scale, *alpha)
                    + rational_quadratic_expr(sq_dist(), *length_scale_1, *alpha_1)
            }
        }
    }
}

fn rbf(sq_dist: f64, l: f64) -> f64 {
    (-sq_dist / (2. * l * l)).exp()
}

fn rbf_expr(sq_dist: Expr, l: f64) -> Expr {
    (-1. / (2. * l * l) * sq_dist).exp()
}

fn rational_quadratic(sq_dist: f64, l: f64, alpha: f64) -> f64 {
    (1. + sq_dist / (2. * alpha * l * l)).powf(-alpha)
}

fn rational_quadratic_expr(sq_dist: Expr, l: f64, alpha: f64) -> Expr {
    (1. + 1. / (2. * alpha * l * l) * sq_dist).powf(-alpha)
}

/// Polynomial factor of the matern kernel, `nu` is expected to be checked
/// Polynomial factor of the matern kernel, NaN outside of the supported `nu` values
fn matern_factor(nu: f64, f: f64) -> f64 {
    if nu == 0.5 {
        1.
    } else if nu == 1.5 {
        1. + f
    } else if nu == 2.5 {
        1. + f + f * f / 3.
    } else {
        f64::NAN
    }
}

impl fmt::Display for Kernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kernel::Rbf { .. } => "rbf",
            Kernel::Linear { .. } => "linear",
            Kernel::Polynomial { .. } => "polynomial",
            Kernel::RationalQuadratic { .. } => "RationalQuadratic",
            Kernel::ExpSineSquared { .. } => "ExpSineSquared",
            Kernel::Matern { .. } => "Matern",
            Kernel::SumRbf { .. } => "Sum_RBF",
            Kernel::SumRationalQuadratic { .. } => "Sum_RQ",
        };
        write!(f, "{name}")
    }
}
