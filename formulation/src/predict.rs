//! Direct evaluation of surrogate descriptors.
//!
//! Predictions use the same formulas as the constraint formulations so that a
//! formulation can be checked against the model it encodes.
use crate::errors::{FormulationError, Result};
use crate::surrogates::{
    GaussianProcessClassifier, GaussianProcessRegressor, HybridModel, NeuralNetwork, Surrogate,
};
use ddobox_data::ScalingProvider;
use ndarray::{Array1, Array2, ArrayBase, ArrayView1, Data, Ix1, Ix2, Zip};
use std::f64::consts::PI;

/// Check that the scaling moments dimensions agree with the descriptor
pub(crate) fn check_scaling<S: ScalingProvider + ?Sized>(
    surrogate: &Surrogate,
    scaling: &S,
) -> Result<()> {
    if scaling.nx() != surrogate.nx() {
        return Err(FormulationError::InvalidDescriptor(format!(
            "scaling has {} inputs, surrogate expects {}",
            scaling.nx(),
            surrogate.nx()
        )));
    }
    let ny_ok = match surrogate {
        Surrogate::NeuralNetwork(nn) => scaling.ny() == nn.ny(),
        Surrogate::GaussianProcessRegressor(_) | Surrogate::Hybrid(_) => scaling.ny() >= 1,
        Surrogate::GaussianProcessClassifier(_) => true,
    };
    if !ny_ok {
        return Err(FormulationError::InvalidDescriptor(format!(
            "scaling has {} outputs, surrogate predicts {}",
            scaling.ny(),
            surrogate.ny()
        )));
    }
    Ok(())
}

fn standardize<S: ScalingProvider + ?Sized>(scaling: &S, x: ArrayView1<f64>) -> Array1<f64> {
    Array1::from_iter(
        x.iter()
            .enumerate()
            .map(|(j, v)| (v - scaling.x_mean(j)) / scaling.x_std(j)),
    )
}

impl NeuralNetwork {
    /// Forward pass of a standardized input.
    ///
    /// Returns the pre-activations `z[l]` and the activations `a[l]` of the layers
    /// `1..=L`, the output layer carrying no activation (`a[L] == z[L]`).
    pub fn forward(
        &self,
        x: &ArrayBase<impl Data<Elem = f64>, Ix1>,
    ) -> (Vec<Array1<f64>>, Vec<Array1<f64>>) {
        let n_layers = self.weights.len();
        let mut zs = Vec::with_capacity(n_layers);
        let mut acts: Vec<Array1<f64>> = Vec::with_capacity(n_layers);
        for (l, (w, b)) in self.weights.iter().zip(self.biases.iter()).enumerate() {
            let z = match acts.last() {
                Some(prev) => w.dot(prev) + b,
                None => w.dot(x) + b,
            };
            let a = if l + 1 < n_layers {
                z.mapv(|v| self.activation.apply(v))
            } else {
                z.clone()
            };
            zs.push(z);
            acts.push(a);
        }
        (zs, acts)
    }
}

impl GaussianProcessRegressor {
    fn mean_std(&self, xs: &Array1<f64>) -> f64 {
        Zip::from(self.x_train.rows())
            .and(&self.alpha)
            .fold(0., |acc, t, alpha| {
                acc + alpha * self.constant_value * self.kernel.value(xs, &t)
            })
    }

    fn proxy_std(&self, xs: &Array1<f64>, inv_k: &Array2<f64>) -> f64 {
        let k = Array1::from_iter(
            self.x_train
                .rows()
                .into_iter()
                .map(|t| self.constant_value * self.kernel.value(xs, &t)),
        );
        -k.dot(&inv_k.dot(&k))
    }

    /// Uncertainty proxy `-k^T K^-1 k` at n raw points given as a (n, nx) matrix.
    ///
    /// The prior variance term is omitted: the value is only meaningful to rank
    /// candidate points, it is not a variance.
    pub fn uncertainty_proxy<S: ScalingProvider + ?Sized>(
        &self,
        scaling: &S,
        x: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    ) -> Result<Array1<f64>> {
        self.kernel.check()?;
        if !self.kernel.supports_variance() {
            return Err(FormulationError::UnsupportedModelKind(format!(
                "uncertainty proxy of a {} kernel",
                self.kernel
            )));
        }
        let inv_k = self.inv_k.as_ref().ok_or_else(|| {
            FormulationError::InvalidDescriptor(
                "uncertainty proxy needs the inverse Gram matrix".to_string(),
            )
        })?;
        if scaling.nx() != self.nx() || scaling.ny() == 0 {
            return Err(FormulationError::InvalidDescriptor(format!(
                "scaling dimensions ({}, {}) do not match regressor inputs {}",
                scaling.nx(),
                scaling.ny(),
                self.nx()
            )));
        }
        if x.ncols() != self.nx() {
            return Err(FormulationError::InvalidValue(format!(
                "points should have {} columns, got {}",
                self.nx(),
                x.ncols()
            )));
        }
        Ok(Array1::from_iter(x.rows().into_iter().map(|row| {
            let xs = standardize(scaling, row);
            self.proxy_std(&xs, inv_k)
        })))
    }
}

impl GaussianProcessClassifier {
    fn probability(&self, xs: &Array1<f64>) -> f64 {
        let s = self.signal_variance();
        let k = Array1::from_iter(self.x_train.rows().into_iter().map(|t| {
            let d2 = xs
                .iter()
                .zip(t.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>();
            (-d2 / (2. * self.length_scale.powi(2))).exp()
        }));
        let m = s * self.delta.dot(&k);
        let v = s * (1. - s * k.dot(&self.inv_p.dot(&k)));
        1. / (1. + (-m / (1. + PI / 8. * v).sqrt()).exp())
    }
}

impl HybridModel {
    fn head(&self, features: &Array1<f64>) -> f64 {
        Zip::from(self.features.rows())
            .and(&self.alpha)
            .fold(0., |acc, t, alpha| {
                let d2 = features
                    .iter()
                    .zip(t.iter())
                    .map(|(a, b)| (a - b).powi(2))
                    .sum::<f64>();
                acc + alpha
                    * self.output_scale
                    * (-d2 / (2. * self.length_scale.powi(2))).exp()
            })
    }
}

impl Surrogate {
    /// Predict outputs at n raw points given as a (n, nx) matrix.
    /// Returns a (n, ny) matrix in raw output units.
    ///
    /// The classifier returns the class probability, not de-standardized.
    pub fn predict<S: ScalingProvider + ?Sized>(
        &self,
        scaling: &S,
        x: &ArrayBase<impl Data<Elem = f64>, Ix2>,
    ) -> Result<Array2<f64>> {
        if x.ncols() != self.nx() {
            return Err(FormulationError::InvalidValue(format!(
                "points should have {} columns, got {}",
                self.nx(),
                x.ncols()
            )));
        }
        check_scaling(self, scaling)?;
        if let Surrogate::GaussianProcessRegressor(gpr) = self {
            gpr.kernel.check()?;
        }
        let mut y = Array2::zeros((x.nrows(), self.ny()));
        Zip::from(y.rows_mut())
            .and(x.rows())
            .for_each(|mut yi, xi| {
                let xs = standardize(scaling, xi);
                match self {
                    Surrogate::NeuralNetwork(nn) => {
                        let (zs, _) = nn.forward(&xs);
                        let out = &zs[zs.len() - 1];
                        for (n, v) in yi.iter_mut().enumerate() {
                            *v = out[n] * scaling.y_std(n) + scaling.y_mean(n);
                        }
                    }
                    Surrogate::GaussianProcessRegressor(gpr) => {
                        yi[0] = gpr.mean_std(&xs) * scaling.y_std(0) + scaling.y_mean(0);
                    }
                    Surrogate::GaussianProcessClassifier(gpc) => {
                        yi[0] = gpc.probability(&xs);
                    }
                    Surrogate::Hybrid(hybrid) => {
                        let (zs, _) = hybrid.network.forward(&xs);
                        yi[0] = hybrid.head(&zs[zs.len() - 1]) * scaling.y_std(0)
                            + scaling.y_mean(0);
                    }
                }
            });
        Ok(y)
    }
}
