//! Kernel model formulations: regressor mean, regressor uncertainty proxy,
//! classifier probability and hybrid model head.
//!
//! Kernel evaluations feeding quadratic forms are stored in auxiliary variables
//! `k[i]` so that each kernel expansion appears once in the model.
use crate::errors::{FormulationError, Result};
use crate::kernels::Kernel;
use crate::surrogates::{GaussianProcessClassifier, GaussianProcessRegressor, HybridModel};
use ddobox_data::ScalingProvider;
use ddobox_expr::{Constraint, Expr, Model, VarId};
use ndarray::{Array2, ArrayView2};
use std::f64::consts::PI;

/// Standardized input expressions `(inputs[j] - x_mean[j]) / x_std[j]`
pub(crate) fn standardized_inputs<S: ScalingProvider + ?Sized>(
    inputs: &[VarId],
    scaling: &S,
) -> Vec<Expr> {
    inputs
        .iter()
        .enumerate()
        .map(|(j, v)| (Expr::from(*v) - scaling.x_mean(j)) / scaling.x_std(j))
        .collect()
}

/// Standardized mean prediction `sum_i alpha[i] c k(x~, x_train[i])`
pub(crate) fn gpr_mean(gpr: &GaussianProcessRegressor, x_std: &[Expr]) -> Expr {
    Expr::sum(
        gpr.x_train
            .rows()
            .into_iter()
            .zip(gpr.alpha.iter())
            .map(|(t, alpha)| alpha * gpr.constant_value * gpr.kernel.expression(x_std, &t)),
    )
}

/// Uncertainty proxy `-sum_i k[i] sum_k invK[i,k] k[k]` with `k[i] == c k(x~, x_train[i])`
pub(crate) fn add_gpr_proxy(
    model: &mut Model,
    gpr: &GaussianProcessRegressor,
    x_std: &[Expr],
) -> Result<Expr> {
    let inv_k = gpr.inv_k.as_ref().ok_or_else(|| {
        FormulationError::InvalidDescriptor(
            "variance formulation needs the inverse Gram matrix".to_string(),
        )
    })?;
    let k = add_kernel_vars(model, &gpr.kernel, gpr.constant_value, x_std, gpr.x_train.view())?;
    Ok(-quadratic_form(inv_k, &k))
}

/// Class probability `1 / (1 + exp(-m / sqrt(1 + pi/8 v)))`
pub(crate) fn add_gpc(
    model: &mut Model,
    gpc: &GaussianProcessClassifier,
    x_std: &[Expr],
) -> Result<Expr> {
    let kernel = Kernel::Rbf {
        length_scale: gpc.length_scale,
    };
    let s = gpc.signal_variance();
    let k = add_kernel_vars(model, &kernel, 1., x_std, gpc.x_train.view())?;
    let m = s * Expr::dot(gpc.delta.iter(), &k);
    let v = s * (1. - s * quadratic_form(&gpc.inv_p, &k));
    Ok(1. / (1. + (-m / (1. + PI / 8. * v).sqrt()).exp()))
}

/// Standardized head prediction `sum_i alpha[i] s exp(-|f - t_i|^2 / (2 l^2))`
pub(crate) fn hybrid_head(hybrid: &HybridModel, features: &[Expr]) -> Expr {
    let kernel = Kernel::Rbf {
        length_scale: hybrid.length_scale,
    };
    Expr::sum(
        hybrid
            .features
            .rows()
            .into_iter()
            .zip(hybrid.alpha.iter())
            .map(|(t, alpha)| alpha * hybrid.output_scale * kernel.expression(features, &t)),
    )
}

fn add_kernel_vars(
    model: &mut Model,
    kernel: &Kernel,
    scale: f64,
    x_std: &[Expr],
    x_train: ArrayView2<f64>,
) -> Result<Vec<Expr>> {
    let mut k = Vec::with_capacity(x_train.nrows());
    for (i, t) in x_train.rows().into_iter().enumerate() {
        let ki = model.add_free(format!("k[{i}]"));
        model.add_constraint(Constraint::equal(
            format!("kernel[{i}]"),
            ki,
            scale * kernel.expression(x_std, &t),
        ))?;
        k.push(Expr::from(ki));
    }
    Ok(k)
}

fn quadratic_form(mat: &Array2<f64>, k: &[Expr]) -> Expr {
    Expr::sum(
        mat.rows()
            .into_iter()
            .zip(k.iter())
            .map(|(row, ki)| ki.clone() * Expr::dot(row.iter(), k)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ddobox_data::Scaling;
    use ddobox_expr::Assignment;
    use ndarray::array;

    #[test]
    fn test_standardized_inputs_affine() {
        let mut model = Model::new("x");
        let x = model.add_vars("inputs", 2, -5., 5.);
        let scaling = Scaling::new(array![1., -2.], array![2., 4.], array![0.], array![1.])
            .unwrap();
        let xs = standardized_inputs(&x, &scaling);
        assert!(xs.iter().all(|e| e.is_affine()));
        let point = Assignment::new(array![3., 2.]);
        assert_abs_diff_eq!(xs[0].eval(&point), 1.);
        assert_abs_diff_eq!(xs[1].eval(&point), 1.);
    }

    #[test]
    fn test_quadratic_form() {
        let mut model = Model::new("q");
        let k: Vec<Expr> = model
            .add_vars("k", 2, -1., 1.)
            .into_iter()
            .map(Expr::from)
            .collect();
        let q = quadratic_form(&array![[2., 1.], [1., 3.]], &k);
        // 2 a^2 + 2 ab + 3 b^2 at (1, -1)
        assert_abs_diff_eq!(q.eval(&Assignment::new(array![1., -1.])), 3.);
    }
}
