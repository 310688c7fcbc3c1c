//! Interval bounds of network pre-activations.
use crate::activation::Activation;
use crate::surrogates::NeuralNetwork;
use ddobox_data::ScalingProvider;
use ndarray::{Array1, Array2};

/// Elementwise lower and upper bounds of a layer pre-activations
#[derive(Clone, Debug, PartialEq)]
pub struct IntervalBounds {
    /// Lower bounds
    pub lower: Array1<f64>,
    /// Upper bounds
    pub upper: Array1<f64>,
}

impl IntervalBounds {
    /// Largest absolute value reachable by the `node`-th component
    pub fn magnitude(&self, node: usize) -> f64 {
        self.lower[node].abs().max(self.upper[node].abs())
    }

    /// Big-M constant of the `node`-th component for the given activation encoding
    pub fn big_m(&self, node: usize, activation: Activation, margin: f64) -> f64 {
        let bound = match activation {
            // both branches of the hard sigmoid are shifted by the +/-3 breakpoints
            Activation::HardSigmoid => self.magnitude(node) + 3.,
            _ => self.magnitude(node),
        };
        (margin * bound).max(1.)
    }
}

/// Pre-activation bounds of every layer `1..=L` of the network when its raw
/// inputs range in `xlimits`, a (nx, 2) matrix.
///
/// Inputs are standardized with the scaling moments, then each affine layer
/// is bounded by splitting its weights in positive and negative parts. Every
/// activation being monotone, activation bounds are the images of the
/// pre-activation bounds.
pub fn propagate_bounds<S: ScalingProvider + ?Sized>(
    network: &NeuralNetwork,
    scaling: &S,
    xlimits: &Array2<f64>,
) -> Vec<IntervalBounds> {
    let space = scaling.rescale_space(xlimits);
    let mut lo = space.column(0).to_owned();
    let mut hi = space.column(1).to_owned();
    let n_layers = network.weights.len();
    let mut res = Vec::with_capacity(n_layers);
    for (l, (w, b)) in network
        .weights
        .iter()
        .zip(network.biases.iter())
        .enumerate()
    {
        let w_pos = w.mapv(|v| v.max(0.));
        let w_neg = w.mapv(|v| v.min(0.));
        let z_lo = w_pos.dot(&lo) + w_neg.dot(&hi) + b;
        let z_hi = w_pos.dot(&hi) + w_neg.dot(&lo) + b;
        if l + 1 < n_layers {
            lo = z_lo.mapv(|v| network.activation.apply(v));
            hi = z_hi.mapv(|v| network.activation.apply(v));
        }
        res.push(IntervalBounds {
            lower: z_lo,
            upper: z_hi,
        });
    }
    res
}
