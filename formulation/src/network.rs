//! Feed-forward network formulations.
//!
//! Layer `l` in `1..=L` is written with pre-activation variables `z[l,n]`, hidden layers
//! `l < L` also carry activation variables `a[l,n]`. Relu nodes use one binary `y[l,n]`
//! and hard sigmoid nodes two binaries `p[l,n]` (`z >= -3`) and `q[l,n]` (`z >= 3`).
use crate::activation::Activation;
use crate::bounds::propagate_bounds;
use crate::errors::{FormulationError, Result};
use crate::params::BigM;
use crate::surrogates::NeuralNetwork;
use ddobox_data::ScalingProvider;
use ddobox_expr::{Constraint, Expr, Model, VarId};
use log::debug;
use ndarray::Array1;

/// Big-M constants of the hidden layers nodes
pub(crate) fn hidden_big_m<S: ScalingProvider + ?Sized>(
    network: &NeuralNetwork,
    scaling: &S,
    big_m: &BigM,
) -> Result<Vec<Array1<f64>>> {
    let hidden = &network.layers[1..network.layers.len() - 1];
    match big_m {
        BigM::Fixed(m) => Ok(hidden.iter().map(|n| Array1::from_elem(*n, *m)).collect()),
        BigM::Propagated { xlimits, margin } => {
            if xlimits.nrows() != network.nx() {
                return Err(FormulationError::InvalidValue(format!(
                    "big-M xlimits should have {} rows, got {}",
                    network.nx(),
                    xlimits.nrows()
                )));
            }
            let bounds = propagate_bounds(network, scaling, xlimits);
            let ms: Vec<Array1<f64>> = bounds[..hidden.len()]
                .iter()
                .map(|b| {
                    Array1::from_shape_fn(b.lower.len(), |n| {
                        b.big_m(n, network.activation, *margin)
                    })
                })
                .collect();
            debug!(
                "Propagated big-M per hidden layer: {:?}",
                ms.iter()
                    .map(|m| m.fold(0., |acc: f64, v| acc.max(*v)))
                    .collect::<Vec<_>>()
            );
            Ok(ms)
        }
    }
}

/// Add the network layers to the model given the standardized input expressions.
/// Returns the output layer pre-activation variables `z[L,.]`.
pub(crate) fn add_network(
    model: &mut Model,
    network: &NeuralNetwork,
    x_std: &[Expr],
    big_m: &[Array1<f64>],
) -> Result<Vec<VarId>> {
    let n_layers = network.weights.len();
    let mut prev: Vec<Expr> = x_std.to_vec();
    let mut last = Vec::new();
    for (i, (w, b)) in network
        .weights
        .iter()
        .zip(network.biases.iter())
        .enumerate()
    {
        let l = i + 1;
        let mut z_vars = Vec::with_capacity(w.nrows());
        for (n, row) in w.rows().into_iter().enumerate() {
            let z = model.add_free(format!("z[{l},{n}]"));
            model.add_constraint(Constraint::equal(
                format!("layer[{l},{n}]"),
                z,
                Expr::dot(row.iter(), &prev) + b[n],
            ))?;
            z_vars.push(z);
        }
        if l == n_layers {
            last = z_vars;
        } else {
            let mut acts = Vec::with_capacity(z_vars.len());
            for (n, z) in z_vars.into_iter().enumerate() {
                let a = model.add_free(format!("a[{l},{n}]"));
                add_activation(model, network.activation, l, n, z, a, big_m[i][n])?;
                acts.push(Expr::from(a));
            }
            prev = acts;
        }
    }
    debug!(
        "Network {:?} ({}) added: {} variables, {} binaries",
        network.layers,
        network.activation,
        model.n_vars(),
        model.n_binaries()
    );
    Ok(last)
}

fn add_activation(
    model: &mut Model,
    activation: Activation,
    l: usize,
    n: usize,
    z: VarId,
    a: VarId,
    m: f64,
) -> Result<()> {
    let name = |tag: &str| format!("{tag}[{l},{n}]");
    match activation {
        Activation::Relu => {
            let y = model.add_binary(name("y"));
            model.add_constraint(Constraint::greater_eq(name("relu_pos"), a, 0.))?;
            model.add_constraint(Constraint::greater_eq(name("relu_lb"), a, z))?;
            model.add_constraint(Constraint::less_eq(name("relu_on"), a, m * y))?;
            model.add_constraint(Constraint::less_eq(
                name("relu_off"),
                a,
                z + m * (1. - y),
            ))?;
        }
        Activation::HardSigmoid => {
            let p = model.add_binary(name("p"));
            let q = model.add_binary(name("q"));
            let linear = Expr::from(z) / 6. + 0.5;
            let relax = || m * (1. - p + q);
            model.add_constraint(Constraint::less_eq(name("hsig_p"), a, p))?;
            model.add_constraint(Constraint::greater_eq(
                name("hsig_lin_lb"),
                a,
                linear.clone() - relax(),
            ))?;
            model.add_constraint(Constraint::less_eq(
                name("hsig_lin_ub"),
                a,
                linear + relax(),
            ))?;
            model.add_constraint(Constraint::greater_eq(name("hsig_q"), a, q))?;
            model.add_constraint(Constraint::less_eq(name("hsig_p_off"), z - m * p, -3.))?;
            model.add_constraint(Constraint::greater_eq(
                name("hsig_p_on"),
                z + m * (1. - p),
                -3.,
            ))?;
            model.add_constraint(Constraint::less_eq(name("hsig_q_off"), z - m * q, 3.))?;
            model.add_constraint(Constraint::greater_eq(
                name("hsig_q_on"),
                z + m * (1. - q),
                3.,
            ))?;
        }
        act => {
            let closed_form = act.expression(z.into()).ok_or_else(|| {
                FormulationError::UnsupportedModelKind(format!("activation {act}"))
            })?;
            model.add_constraint(Constraint::equal(name("act"), a, closed_form))?;
        }
    }
    Ok(())
}
