use crate::errors::{DataError, Result};
use linfa::Float;
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix2, Zip};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};

/// Per-dimension moments used to standardize inputs and outputs.
///
/// Consumed by the formulation engine: raw input variables are mapped to
/// `(x - x_mean) / x_std` and standardized predictions are mapped back to
/// `y * y_std + y_mean`.
pub trait ScalingProvider {
    /// Input dimension
    fn nx(&self) -> usize;
    /// Output dimension
    fn ny(&self) -> usize;
    /// Mean of the `dim`-th input
    fn x_mean(&self, dim: usize) -> f64;
    /// Standard deviation of the `dim`-th input
    fn x_std(&self, dim: usize) -> f64;
    /// Mean of the `dim`-th output
    fn y_mean(&self, dim: usize) -> f64;
    /// Standard deviation of the `dim`-th output
    fn y_std(&self, dim: usize) -> f64;

    /// Bounds of a (nx, 2) input space expressed in standardized units
    fn rescale_space(&self, xlimits: &Array2<f64>) -> Array2<f64> {
        let mut res = xlimits.to_owned();
        for (i, mut row) in res.rows_mut().into_iter().enumerate() {
            let (mean, std) = (self.x_mean(i), self.x_std(i));
            row.mapv_inplace(|v| (v - mean) / std);
        }
        res
    }
}

/// Mean and standard deviation vectors of inputs and outputs
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct Scaling<F: Float> {
    x_mean: Array1<F>,
    x_std: Array1<F>,
    y_mean: Array1<F>,
    y_std: Array1<F>,
}

impl<F: Float> Scaling<F> {
    /// Constructor from given moments.
    ///
    /// Means and standard deviations must have matching lengths and standard
    /// deviations must be positive and finite.
    pub fn new(
        x_mean: Array1<F>,
        x_std: Array1<F>,
        y_mean: Array1<F>,
        y_std: Array1<F>,
    ) -> Result<Self> {
        if x_mean.len() != x_std.len() || y_mean.len() != y_std.len() {
            return Err(DataError::InvalidValue(format!(
                "moments lengths mismatch: x ({}, {}), y ({}, {})",
                x_mean.len(),
                x_std.len(),
                y_mean.len(),
                y_std.len()
            )));
        }
        if x_mean.iter().chain(y_mean.iter()).any(|v| !v.is_finite()) {
            return Err(DataError::InvalidValue("means should be finite".to_string()));
        }
        if x_std
            .iter()
            .chain(y_std.iter())
            .any(|v| !v.is_finite() || *v <= F::zero())
        {
            return Err(DataError::InvalidValue(
                "standard deviations should be positive and finite".to_string(),
            ));
        }
        Ok(Scaling {
            x_mean,
            x_std,
            y_mean,
            y_std,
        })
    }

    /// Moments leaving `nx` inputs and `ny` outputs unchanged
    pub fn identity(nx: usize, ny: usize) -> Self {
        Scaling {
            x_mean: Array1::zeros(nx),
            x_std: Array1::ones(nx),
            y_mean: Array1::zeros(ny),
            y_std: Array1::ones(ny),
        }
    }

    /// Moments computed from data: input moments over all rows of `x`,
    /// output moments over rows of `y` flagged in `converged` (all rows when `None`).
    ///
    /// Standard deviations are population ones, a zero deviation is replaced by 1.
    pub fn fit(
        x: &ArrayBase<impl Data<Elem = F>, Ix2>,
        y: &ArrayBase<impl Data<Elem = F>, Ix2>,
        converged: Option<&Array1<bool>>,
    ) -> Result<Self> {
        let (x_mean, x_std) = moments(x)
            .ok_or_else(|| DataError::MissingData("no input rows to scale".to_string()))?;
        let (y_mean, y_std) = match converged {
            Some(t) => {
                if t.len() != y.nrows() {
                    return Err(DataError::InvalidValue(format!(
                        "convergence flags length {} does not match outputs rows {}",
                        t.len(),
                        y.nrows()
                    )));
                }
                let rows: Vec<usize> = t
                    .iter()
                    .enumerate()
                    .filter_map(|(i, ok)| ok.then_some(i))
                    .collect();
                moments(&y.select(Axis(0), &rows)).ok_or(DataError::EmptyConvergedSet)?
            }
            None => moments(y).ok_or(DataError::EmptyConvergedSet)?,
        };
        Ok(Scaling {
            x_mean,
            x_std,
            y_mean,
            y_std,
        })
    }

    /// Input means and standard deviations
    pub fn x_moments(&self) -> (&Array1<F>, &Array1<F>) {
        (&self.x_mean, &self.x_std)
    }

    /// Output means and standard deviations
    pub fn y_moments(&self) -> (&Array1<F>, &Array1<F>) {
        (&self.y_mean, &self.y_std)
    }

    /// Standardize (n, nx) inputs
    pub fn scale_x(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
        (x - &self.x_mean) / &self.x_std
    }

    /// Map standardized (n, nx) inputs back to raw units
    pub fn inv_scale_x(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
        x * &self.x_std + &self.x_mean
    }

    /// Standardize (n, ny) outputs
    pub fn scale_y(&self, y: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
        (y - &self.y_mean) / &self.y_std
    }

    /// Map standardized (n, ny) outputs back to raw units
    pub fn inv_scale_y(&self, y: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
        y * &self.y_std + &self.y_mean
    }

    /// Bounds of a (nx, 2) input space in standardized units
    pub fn scale_space(&self, xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Array2<F> {
        let mut res = xlimits.to_owned();
        Zip::from(res.rows_mut())
            .and(&self.x_mean)
            .and(&self.x_std)
            .for_each(|mut row, &m, &s| row.mapv_inplace(|v| (v - m) / s));
        res
    }
}

impl<F: Float> ScalingProvider for Scaling<F> {
    fn nx(&self) -> usize {
        self.x_mean.len()
    }
    fn ny(&self) -> usize {
        self.y_mean.len()
    }
    fn x_mean(&self, dim: usize) -> f64 {
        to_f64(self.x_mean[dim])
    }
    fn x_std(&self, dim: usize) -> f64 {
        to_f64(self.x_std[dim])
    }
    fn y_mean(&self, dim: usize) -> f64 {
        to_f64(self.y_mean[dim])
    }
    fn y_std(&self, dim: usize) -> f64 {
        to_f64(self.y_std[dim])
    }
}

fn to_f64<F: Float>(v: F) -> f64 {
    v.to_f64().unwrap_or(f64::NAN)
}

/// Column means and population standard deviations (zero replaced by one),
/// `None` when there is no row.
fn moments<F: Float>(x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Option<(Array1<F>, Array1<F>)> {
    let mean = x.mean_axis(Axis(0))?;
    let mut std = x.std_axis(Axis(0), F::zero());
    std.mapv_inplace(|v| if v == F::zero() { F::one() } else { v });
    Some((mean, std))
}
