use crate::errors::{DataError, Result};
use crate::sampling::{
    Grid, Lhs, Random, SamplingKind, SamplingMethod, Sobol, SOBOL_MAX_DIMENSIONS,
};
use crate::scaling::Scaling;
use linfa::Float;
use log::{debug, info};
use ndarray::{s, Array1, Array2, ArrayBase, ArrayView1, ArrayView2, Data, Ix2};
use ndarray_rand::rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;

/// Default share of samples kept for testing by [`DataHandler::split`]
pub const DEFAULT_TEST_SIZE: f64 = 0.25;

/// Holds sampled inputs `x`, observed outputs `y` and convergence flags `t`
/// (whether the simulation producing the row succeeded), with optional
/// train/test split and standardization moments.
///
/// Once [`scale`](DataHandler::scale)d, moments come from the training rows when
/// the data was split and from all rows otherwise; output moments only consider
/// converged rows.
#[derive(Clone, Debug)]
pub struct DataHandler<F: Float> {
    xlimits: Option<Array2<F>>,
    x: Array2<F>,
    y: Array2<F>,
    t: Array1<bool>,
    n_train: Option<usize>,
    scaling: Option<Scaling<F>>,
}

impl<F: Float> DataHandler<F> {
    /// Handler over given inputs and outputs, every row flagged as converged
    pub fn new(x: Array2<F>, y: Array2<F>) -> Result<Self> {
        if x.nrows() != y.nrows() {
            return Err(DataError::InvalidValue(format!(
                "x and y should have the same number of rows, got {} and {}",
                x.nrows(),
                y.nrows()
            )));
        }
        let t = Array1::from_elem(x.nrows(), true);
        Ok(DataHandler {
            xlimits: None,
            x,
            y,
            t,
            n_train: None,
            scaling: None,
        })
    }

    /// Handler with `n_samples` inputs sampled in `xlimits` using the given method,
    /// outputs initialized to zero and every row flagged as converged
    pub fn init(
        n_samples: usize,
        xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>,
        n_outputs: usize,
        method: SamplingKind,
    ) -> Result<Self> {
        Self::init_with_rng(
            n_samples,
            xlimits,
            n_outputs,
            method,
            Xoshiro256Plus::from_entropy(),
        )
    }

    /// Same as [`init`](DataHandler::init) with a given random generator for reproducibility
    pub fn init_with_rng<R: Rng>(
        n_samples: usize,
        xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>,
        n_outputs: usize,
        method: SamplingKind,
        mut rng: R,
    ) -> Result<Self> {
        check_xlimits(xlimits)?;
        let x = match method {
            SamplingKind::Random => Random::new_with_rng(xlimits, rng).sample(n_samples),
            SamplingKind::Lhs => Lhs::new_with_rng(xlimits, rng).sample(n_samples),
            SamplingKind::Grid => Grid::new_with_rng(xlimits, rng).sample(n_samples),
            SamplingKind::Sobol => {
                if xlimits.nrows() > SOBOL_MAX_DIMENSIONS {
                    return Err(DataError::InvalidValue(format!(
                        "Sobol sampling is limited to {SOBOL_MAX_DIMENSIONS} dimensions, got {}",
                        xlimits.nrows()
                    )));
                }
                Sobol::new(xlimits).seed(rng.gen()).sample(n_samples)
            }
        };
        info!(
            "Initial {:?} sampling of {} points in dimension {}",
            method,
            x.nrows(),
            x.ncols()
        );
        let mut handler = Self::new(x, Array2::zeros((n_samples, n_outputs)))?;
        handler.xlimits = Some(xlimits.to_owned());
        Ok(handler)
    }

    /// Set the input space bounds
    pub fn with_xlimits(mut self, xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Self> {
        check_xlimits(xlimits)?;
        if xlimits.nrows() != self.x.ncols() {
            return Err(DataError::InvalidValue(format!(
                "xlimits has {} rows, inputs have {} columns",
                xlimits.nrows(),
                self.x.ncols()
            )));
        }
        self.xlimits = Some(xlimits.to_owned());
        Ok(self)
    }

    /// Set the convergence flags
    pub fn with_convergence(mut self, t: Array1<bool>) -> Result<Self> {
        if t.len() != self.x.nrows() {
            return Err(DataError::InvalidValue(format!(
                "convergence flags length {} does not match {} samples",
                t.len(),
                self.x.nrows()
            )));
        }
        self.t = t;
        self.scaling = None;
        Ok(self)
    }

    /// Replace outputs, typically once simulations of the sampled inputs are done
    pub fn set_y(&mut self, y: Array2<F>) -> Result<()> {
        if y.nrows() != self.x.nrows() {
            return Err(DataError::InvalidValue(format!(
                "outputs have {} rows, expected {}",
                y.nrows(),
                self.x.nrows()
            )));
        }
        self.y = y;
        self.scaling = None;
        Ok(())
    }

    /// Keep the first `floor((1 - test_size) n)` rows for training, the remaining for testing
    pub fn split(&mut self, test_size: f64) -> Result<()> {
        if !(0. ..1.).contains(&test_size) {
            return Err(DataError::InvalidValue(format!(
                "test size should be in [0, 1), got {test_size}"
            )));
        }
        let n = self.x.nrows();
        let n_train = ((1. - test_size) * n as f64).floor() as usize;
        debug!("Split {n} samples: {n_train} train, {} test", n - n_train);
        self.n_train = Some(n_train);
        self.scaling = None;
        Ok(())
    }

    /// Compute standardization moments, see [`Scaling::fit`]
    pub fn scale(&mut self) -> Result<&Scaling<F>> {
        let n = self.n_train.unwrap_or(self.x.nrows());
        let t = self.t.slice(s![..n]).to_owned();
        let scaling = Scaling::fit(
            &self.x.slice(s![..n, ..]),
            &self.y.slice(s![..n, ..]),
            Some(&t),
        )?;
        debug!("Scaling computed on {n} rows");
        Ok(self.scaling.insert(scaling))
    }

    /// Moments snapshot, available once [`scale`](DataHandler::scale)d
    pub fn scaling(&self) -> Result<&Scaling<F>> {
        self.scaling
            .as_ref()
            .ok_or_else(|| DataError::MissingData("data not scaled yet".to_string()))
    }

    /// Input space bounds
    pub fn xlimits(&self) -> Option<&Array2<F>> {
        self.xlimits.as_ref()
    }

    /// All inputs
    pub fn x(&self) -> &Array2<F> {
        &self.x
    }

    /// All outputs
    pub fn y(&self) -> &Array2<F> {
        &self.y
    }

    /// Convergence flags
    pub fn converged(&self) -> &Array1<bool> {
        &self.t
    }

    /// Number of training rows, all rows when not split
    pub fn n_train(&self) -> usize {
        self.n_train.unwrap_or(self.x.nrows())
    }

    /// Training inputs
    pub fn x_train(&self) -> ArrayView2<F> {
        self.x.slice(s![..self.n_train(), ..])
    }

    /// Training outputs
    pub fn y_train(&self) -> ArrayView2<F> {
        self.y.slice(s![..self.n_train(), ..])
    }

    /// Training convergence flags
    pub fn t_train(&self) -> ArrayView1<bool> {
        self.t.slice(s![..self.n_train()])
    }

    /// Test inputs, empty when not split
    pub fn x_test(&self) -> ArrayView2<F> {
        self.x.slice(s![self.n_train().., ..])
    }

    /// Test outputs, empty when not split
    pub fn y_test(&self) -> ArrayView2<F> {
        self.y.slice(s![self.n_train().., ..])
    }

    /// Test convergence flags, empty when not split
    pub fn t_test(&self) -> ArrayView1<bool> {
        self.t.slice(s![self.n_train()..])
    }

    /// Standardize inputs with the current moments
    pub fn scale_x(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array2<F>> {
        Ok(self.scaling()?.scale_x(x))
    }

    /// Map standardized inputs back to raw units
    pub fn inv_scale_x(&self, x: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array2<F>> {
        Ok(self.scaling()?.inv_scale_x(x))
    }

    /// Standardize outputs with the current moments
    pub fn scale_y(&self, y: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array2<F>> {
        Ok(self.scaling()?.scale_y(y))
    }

    /// Map standardized outputs back to raw units
    pub fn inv_scale_y(&self, y: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array2<F>> {
        Ok(self.scaling()?.inv_scale_y(y))
    }

    /// Standardize a (nx, 2) input space
    pub fn scale_space(&self, xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<Array2<F>> {
        Ok(self.scaling()?.scale_space(xlimits))
    }

    /// The handler input space in standardized units
    pub fn scaled_space(&self) -> Result<Array2<F>> {
        let xlimits = self
            .xlimits
            .as_ref()
            .ok_or_else(|| DataError::MissingData("no input space defined".to_string()))?;
        self.scale_space(xlimits)
    }
}

fn check_xlimits<F: Float>(xlimits: &ArrayBase<impl Data<Elem = F>, Ix2>) -> Result<()> {
    if xlimits.ncols() != 2 {
        return Err(DataError::InvalidValue(format!(
            "xlimits must have 2 columns (lower, upper), got {}",
            xlimits.ncols()
        )));
    }
    if xlimits.rows().into_iter().any(|r| r[0] > r[1]) {
        return Err(DataError::InvalidValue(
            "xlimits lower bounds should not exceed upper bounds".to_string(),
        ));
    }
    Ok(())
}
