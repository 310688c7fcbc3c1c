//! Descriptors of fitted surrogate models.
//!
//! Descriptors are immutable records of the parameters of an already trained model.
//! They are validated at construction so that the formulation engine can rely on
//! consistent shapes.
use crate::activation::Activation;
use crate::errors::{FormulationError, Result};
use crate::kernels::Kernel;
use ndarray::{Array1, Array2};
#[cfg(feature = "serializable")]
use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(feature = "persistent")]
use std::fs;
#[cfg(feature = "persistent")]
use std::io::Write;

/// Feed-forward neural network with one activation kind for every hidden layer
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct NeuralNetwork {
    pub(crate) layers: Vec<usize>,
    pub(crate) weights: Vec<Array2<f64>>,
    pub(crate) biases: Vec<Array1<f64>>,
    pub(crate) activation: Activation,
}

impl NeuralNetwork {
    /// Network from its weights `W[l]` of shape `(n_{l+1}, n_l)` and biases `b[l]`
    /// of length `n_{l+1}`
    pub fn new(
        weights: Vec<Array2<f64>>,
        biases: Vec<Array1<f64>>,
        activation: Activation,
    ) -> Result<Self> {
        if weights.is_empty() {
            return Err(FormulationError::InvalidDescriptor(
                "network needs at least one layer of weights".to_string(),
            ));
        }
        if weights.len() != biases.len() {
            return Err(FormulationError::InvalidDescriptor(format!(
                "{} weight matrices for {} bias vectors",
                weights.len(),
                biases.len()
            )));
        }
        let mut layers = vec![weights[0].ncols()];
        for (l, (w, b)) in weights.iter().zip(biases.iter()).enumerate() {
            let n_in = layers[l];
            if w.ncols() != n_in {
                return Err(FormulationError::InvalidDescriptor(format!(
                    "weights {l} should have {n_in} columns, got {}",
                    w.ncols()
                )));
            }
            if b.len() != w.nrows() {
                return Err(FormulationError::InvalidDescriptor(format!(
                    "bias {l} should have length {}, got {}",
                    w.nrows(),
                    b.len()
                )));
            }
            layers.push(w.nrows());
        }
        if layers.iter().any(|n| *n == 0) {
            return Err(FormulationError::InvalidDescriptor(
                "layers should not be empty".to_string(),
            ));
        }
        Ok(NeuralNetwork {
            layers,
            weights,
            biases,
            activation,
        })
    }

    /// Layer sizes `[n_0, ..., n_L]`
    pub fn layers(&self) -> &[usize] {
        &self.layers
    }

    /// Weight matrices
    pub fn weights(&self) -> &[Array2<f64>] {
        &self.weights
    }

    /// Bias vectors
    pub fn biases(&self) -> &[Array1<f64>] {
        &self.biases
    }

    /// Hidden layers activation
    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// Number of inputs
    pub fn nx(&self) -> usize {
        self.layers[0]
    }

    /// Number of outputs
    pub fn ny(&self) -> usize {
        self.layers[self.layers.len() - 1]
    }
}

/// Gaussian process regressor
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct GaussianProcessRegressor {
    pub(crate) kernel: Kernel,
    pub(crate) constant_value: f64,
    pub(crate) x_train: Array2<f64>,
    pub(crate) alpha: Array1<f64>,
    pub(crate) inv_k: Option<Array2<f64>>,
}

impl GaussianProcessRegressor {
    /// Regressor from its kernel, signal variance `constant_value`, standardized
    /// training inputs `(n_samples, n_inputs)` and dual coefficients `alpha`.
    ///
    /// Kernel hyperparameters are checked with [Kernel::check].
    pub fn new(
        kernel: Kernel,
        constant_value: f64,
        x_train: Array2<f64>,
        alpha: Array1<f64>,
    ) -> Result<Self> {
        kernel.check()?;
        check_training_set(&x_train, alpha.len(), "alpha")?;
        check_positive(constant_value, "constant_value")?;
        Ok(GaussianProcessRegressor {
            kernel,
            constant_value,
            x_train,
            alpha,
            inv_k: None,
        })
    }

    /// Set the inverse of the training Gram matrix, needed by the uncertainty proxy
    pub fn with_inv_gram(mut self, inv_k: Array2<f64>) -> Result<Self> {
        let n = self.x_train.nrows();
        if inv_k.dim() != (n, n) {
            return Err(FormulationError::InvalidDescriptor(format!(
                "inverse Gram matrix should be ({n}, {n}), got {:?}",
                inv_k.dim()
            )));
        }
        self.inv_k = Some(inv_k);
        Ok(self)
    }

    /// Kernel
    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// Signal variance
    pub fn constant_value(&self) -> f64 {
        self.constant_value
    }

    /// Standardized training inputs
    pub fn x_train(&self) -> &Array2<f64> {
        &self.x_train
    }

    /// Dual coefficients
    pub fn alpha(&self) -> &Array1<f64> {
        &self.alpha
    }

    /// Inverse Gram matrix if any
    pub fn inv_gram(&self) -> Option<&Array2<f64>> {
        self.inv_k.as_ref()
    }

    /// Number of inputs
    pub fn nx(&self) -> usize {
        self.x_train.ncols()
    }
}

/// Binary gaussian process classifier with rbf kernel (Laplace approximation)
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct GaussianProcessClassifier {
    pub(crate) length_scale: f64,
    pub(crate) sigma_f: f64,
    pub(crate) x_train: Array2<f64>,
    pub(crate) delta: Array1<f64>,
    pub(crate) inv_p: Array2<f64>,
}

impl GaussianProcessClassifier {
    /// Classifier from its rbf length scale, signal std `sigma_f`, standardized training
    /// inputs, latent targets `delta` and inverse auxiliary covariance `inv_p`
    pub fn new(
        length_scale: f64,
        sigma_f: f64,
        x_train: Array2<f64>,
        delta: Array1<f64>,
        inv_p: Array2<f64>,
    ) -> Result<Self> {
        check_training_set(&x_train, delta.len(), "delta")?;
        check_positive(length_scale, "length_scale")?;
        check_positive(sigma_f, "sigma_f")?;
        let n = x_train.nrows();
        if inv_p.dim() != (n, n) {
            return Err(FormulationError::InvalidDescriptor(format!(
                "inverse covariance should be ({n}, {n}), got {:?}",
                inv_p.dim()
            )));
        }
        Ok(GaussianProcessClassifier {
            length_scale,
            sigma_f,
            x_train,
            delta,
            inv_p,
        })
    }

    /// Rbf length scale
    pub fn length_scale(&self) -> f64 {
        self.length_scale
    }

    /// Signal variance `sigma_f^2`
    pub fn signal_variance(&self) -> f64 {
        self.sigma_f * self.sigma_f
    }

    /// Number of inputs
    pub fn nx(&self) -> usize {
        self.x_train.ncols()
    }
}

/// Neural network feature extractor followed by an rbf gaussian process head
/// working on the last layer pre-activations
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub struct HybridModel {
    pub(crate) network: NeuralNetwork,
    pub(crate) length_scale: f64,
    pub(crate) output_scale: f64,
    pub(crate) features: Array2<f64>,
    pub(crate) alpha: Array1<f64>,
}

impl HybridModel {
    /// Hybrid model from the extractor, rbf head length scale, head output scale,
    /// training features `(n_samples, n_features)` and dual coefficients
    pub fn new(
        network: NeuralNetwork,
        length_scale: f64,
        output_scale: f64,
        features: Array2<f64>,
        alpha: Array1<f64>,
    ) -> Result<Self> {
        check_training_set(&features, alpha.len(), "alpha")?;
        check_positive(length_scale, "length_scale")?;
        check_positive(output_scale, "output_scale")?;
        if features.ncols() != network.ny() {
            return Err(FormulationError::InvalidDescriptor(format!(
                "training features have {} columns, extractor outputs {}",
                features.ncols(),
                network.ny()
            )));
        }
        Ok(HybridModel {
            network,
            length_scale,
            output_scale,
            features,
            alpha,
        })
    }

    /// Feature extractor
    pub fn network(&self) -> &NeuralNetwork {
        &self.network
    }

    /// Number of inputs
    pub fn nx(&self) -> usize {
        self.network.nx()
    }
}

fn check_training_set(x_train: &Array2<f64>, n_coefs: usize, name: &str) -> Result<()> {
    if x_train.nrows() == 0 || x_train.ncols() == 0 {
        return Err(FormulationError::InvalidDescriptor(
            "training data should not be empty".to_string(),
        ));
    }
    if x_train.nrows() != n_coefs {
        return Err(FormulationError::InvalidDescriptor(format!(
            "{} training points for {n_coefs} {name} coefficients",
            x_train.nrows()
        )));
    }
    Ok(())
}

fn check_positive(v: f64, name: &str) -> Result<()> {
    if v.is_finite() && v > 0. {
        Ok(())
    } else {
        Err(FormulationError::InvalidDescriptor(format!(
            "{name} should be positive, got {v}"
        )))
    }
}

/// A fitted surrogate model descriptor
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serializable", derive(Serialize, Deserialize))]
pub enum Surrogate {
    /// Feed-forward neural network
    NeuralNetwork(NeuralNetwork),
    /// Gaussian process regressor
    GaussianProcessRegressor(GaussianProcessRegressor),
    /// Gaussian process classifier
    GaussianProcessClassifier(GaussianProcessClassifier),
    /// Neural network + gaussian process model
    Hybrid(HybridModel),
}

impl Surrogate {
    /// Number of inputs
    pub fn nx(&self) -> usize {
        match self {
            Surrogate::NeuralNetwork(nn) => nn.nx(),
            Surrogate::GaussianProcessRegressor(gpr) => gpr.nx(),
            Surrogate::GaussianProcessClassifier(gpc) => gpc.nx(),
            Surrogate::Hybrid(hybrid) => hybrid.nx(),
        }
    }

    /// Number of outputs
    pub fn ny(&self) -> usize {
        match self {
            Surrogate::NeuralNetwork(nn) => nn.ny(),
            _ => 1,
        }
    }

    /// Save the descriptor in a file
    #[cfg(feature = "persistent")]
    pub fn save(&self, path: &str, format: DescriptorFileFormat) -> Result<()> {
        let mut file = fs::File::create(path)?;
        let bytes = match format {
            DescriptorFileFormat::Json => serde_json::to_vec(self)?,
            DescriptorFileFormat::Binary => {
                bincode::serde::encode_to_vec(self, bincode::config::standard())?
            }
        };
        file.write_all(&bytes)?;
        Ok(())
    }

    /// Load a descriptor saved with [`Surrogate::save`]
    #[cfg(feature = "persistent")]
    pub fn load(path: &str, format: DescriptorFileFormat) -> Result<Surrogate> {
        let data = fs::read(path)?;
        let surrogate = match format {
            DescriptorFileFormat::Json => serde_json::from_slice(&data)?,
            DescriptorFileFormat::Binary => {
                bincode::serde::decode_from_slice(&data, bincode::config::standard())
                    .map(|(surrogate, _)| surrogate)?
            }
        };
        Ok(surrogate)
    }
}

impl fmt::Display for Surrogate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Surrogate::NeuralNetwork(nn) => write!(f, "NN({:?}, {})", nn.layers, nn.activation),
            Surrogate::GaussianProcessRegressor(gpr) => write!(f, "GPR({})", gpr.kernel),
            Surrogate::GaussianProcessClassifier(_) => write!(f, "GPC(rbf)"),
            Surrogate::Hybrid(h) => {
                write!(f, "Hybrid(NN({:?}, {}) + rbf)", h.network.layers, h.network.activation)
            }
        }
    }
}

impl From<NeuralNetwork> for Surrogate {
    fn from(nn: NeuralNetwork) -> Self {
        Surrogate::NeuralNetwork(nn)
    }
}

impl From<GaussianProcessRegressor> for Surrogate {
    fn from(gpr: GaussianProcessRegressor) -> Self {
        Surrogate::GaussianProcessRegressor(gpr)
    }
}

impl From<GaussianProcessClassifier> for Surrogate {
    fn from(gpc: GaussianProcessClassifier) -> Self {
        Surrogate::GaussianProcessClassifier(gpc)
    }
}

impl From<HybridModel> for Surrogate {
    fn from(hybrid: HybridModel) -> Self {
        Surrogate::Hybrid(hybrid)
    }
}

/// File formats of saved descriptors
#[cfg(feature = "persistent")]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DescriptorFileFormat {
    /// Human readable format
    #[default]
    Json,
    /// Compact binary format
    Binary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_network_shapes() {
        let nn = NeuralNetwork::new(
            vec![array![[1., 2.], [3., 4.], [5., 6.]], array![[1., 1., 1.]]],
            vec![array![0., 0., 0.], array![0.]],
            Activation::Tanh,
        )
        .unwrap();
        assert_eq!(nn.layers(), &[2, 3, 1]);
        assert_eq!(nn.nx(), 2);
        assert_eq!(nn.ny(), 1);

        // bias length
        assert!(matches!(
            NeuralNetwork::new(vec![array![[1., 2.]]], vec![array![0., 0.]], Activation::Relu),
            Err(FormulationError::InvalidDescriptor(_))
        ));
        // chained shapes
        assert!(NeuralNetwork::new(
            vec![array![[1., 2.]], array![[1., 1.]]],
            vec![array![0.], array![0.]],
            Activation::Relu
        )
        .is_err());
        assert!(NeuralNetwork::new(vec![], vec![], Activation::Relu).is_err());
    }

    #[test]
    fn test_gp_shapes() {
        let kernel = Kernel::Rbf { length_scale: 1. };
        let x = array![[0.], [1.]];
        assert!(GaussianProcessRegressor::new(kernel.clone(), 1., x.clone(), array![1.]).is_err());
        let gpr = GaussianProcessRegressor::new(kernel, 1., x.clone(), array![1., 2.]).unwrap();
        assert!(gpr.clone().with_inv_gram(array![[1.]]).is_err());
        assert!(gpr.with_inv_gram(array![[1., 0.], [0., 1.]]).is_ok());
        assert!(GaussianProcessClassifier::new(
            1.,
            1.,
            x.clone(),
            array![0.5, 0.5],
            array![[1.]]
        )
        .is_err());
    }

    #[test]
    fn test_gp_kernel_checked_at_construction() {
        let x = array![[0.]];
        let matern = Kernel::Matern {
            length_scale: 1.,
            nu: 3.5,
        };
        assert!(matches!(
            GaussianProcessRegressor::new(matern, 1., x.clone(), array![1.]),
            Err(FormulationError::UnsupportedHyperparameter(_))
        ));
        for length_scale in [0., -0., -1., f64::NAN] {
            let kernel = Kernel::Rbf { length_scale };
            assert!(matches!(
                GaussianProcessRegressor::new(kernel, 1., x.clone(), array![1.]),
                Err(FormulationError::InvalidDescriptor(_))
            ));
        }
        for nu in [0.5, 1.5, 2.5] {
            let kernel = Kernel::Matern {
                length_scale: 1.,
                nu,
            };
            assert!(GaussianProcessRegressor::new(kernel, 1., x.clone(), array![1.]).is_ok());
        }
    }

    #[test]
    fn test_hybrid_features_width() {
        let nn = NeuralNetwork::new(
            vec![array![[1.], [2.]]],
            vec![array![0., 0.]],
            Activation::Linear,
        )
        .unwrap();
        assert!(HybridModel::new(nn.clone(), 1., 1., array![[0.]], array![1.]).is_err());
        let hybrid = HybridModel::new(nn, 1., 1., array![[0., 1.]], array![1.]).unwrap();
        let surrogate = Surrogate::from(hybrid);
        assert_eq!(surrogate.nx(), 1);
        assert_eq!(surrogate.ny(), 1);
        assert_eq!(format!("{surrogate}"), "Hybrid(NN([1, 2], linear) + rbf)");
    }

    #[cfg(feature = "persistent")]
    #[test]
    fn test_save_load() {
        let gpr = GaussianProcessRegressor::new(
            Kernel::Matern {
                length_scale: 0.5,
                nu: 2.5,
            },
            1.25,
            array![[0., 1.], [1., 0.]],
            array![0.375, -0.375],
        )
        .unwrap()
        .with_inv_gram(array![[1., 0.125], [0.125, 1.]])
        .unwrap();
        let surrogate = Surrogate::from(gpr);
        for (format, ext) in [
            (DescriptorFileFormat::Json, "json"),
            (DescriptorFileFormat::Binary, "bin"),
        ] {
            let path = std::env::temp_dir().join(format!("ddobox_gpr.{ext}"));
            let path = path.to_str().unwrap();
            surrogate.save(path, format).unwrap();
            assert_eq!(Surrogate::load(path, format).unwrap(), surrogate);
        }
    }
}
