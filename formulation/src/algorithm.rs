//! Translation of a surrogate descriptor into a block of algebraic constraints.
use crate::errors::{FormulationError, Result};
use crate::gaussian_process::{
    add_gpc, add_gpr_proxy, gpr_mean, hybrid_head, standardized_inputs,
};
use crate::network::{add_network, hidden_big_m};
use crate::params::{FormulationParams, FormulationValidParams};
use crate::predict::check_scaling;
use crate::surrogates::Surrogate;
use ddobox_data::ScalingProvider;
use ddobox_expr::{Block, Constraint, Expr, Model};
use linfa::ParamGuard;
use log::{debug, info};

impl FormulationValidParams {
    /// Translate a surrogate into a block of variables and constraints.
    ///
    /// The block public `inputs` are the raw (unscaled) model inputs and its
    /// `outputs` the raw predictions. When `want_variance` is set, the single
    /// output is the uncertainty proxy of a gaussian process regressor instead
    /// of its mean.
    ///
    /// # Errors
    ///
    /// * [FormulationError::UnsupportedModelKind]: variance requested for another
    ///   descriptor than a regressor with rbf, linear or polynomial kernel,
    /// * [FormulationError::UnsupportedHyperparameter]: kernel hyperparameters not handled
    ///   (matern nu not in {0.5, 1.5, 2.5}),
    /// * [FormulationError::InvalidDescriptor]: scaling dimensions disagree with the
    ///   descriptor or variance requested without the inverse Gram matrix.
    pub fn formulate<S: ScalingProvider + ?Sized>(
        &self,
        surrogate: &Surrogate,
        scaling: &S,
        want_variance: bool,
    ) -> Result<Block> {
        check_scaling(surrogate, scaling)?;
        if let Surrogate::GaussianProcessRegressor(gpr) = surrogate {
            gpr.kernel.check()?;
            if want_variance && !gpr.kernel.supports_variance() {
                return Err(FormulationError::UnsupportedModelKind(format!(
                    "variance formulation of a {} kernel",
                    gpr.kernel
                )));
            }
        } else if want_variance {
            return Err(FormulationError::UnsupportedModelKind(format!(
                "variance formulation of {surrogate}"
            )));
        }

        let name = match (surrogate, want_variance) {
            (Surrogate::NeuralNetwork(_), _) => "neural_network",
            (Surrogate::GaussianProcessRegressor(_), false) => "gpr_mean",
            (Surrogate::GaussianProcessRegressor(_), true) => "gpr_variance",
            (Surrogate::GaussianProcessClassifier(_), _) => "gpc",
            (Surrogate::Hybrid(_), _) => "hybrid",
        };
        let mut model = Model::new(name);
        let inputs: Vec<_> = (0..surrogate.nx())
            .map(|k| model.add_free(format!("inputs[{k}]")))
            .collect();
        let x_std = standardized_inputs(&inputs, scaling);

        let predictions: Vec<Expr> = match surrogate {
            Surrogate::NeuralNetwork(nn) => {
                let big_m = hidden_big_m(nn, scaling, &self.big_m)?;
                let last = add_network(&mut model, nn, &x_std, &big_m)?;
                last.iter()
                    .enumerate()
                    .map(|(n, z)| *z * scaling.y_std(n) + scaling.y_mean(n))
                    .collect()
            }
            Surrogate::GaussianProcessRegressor(gpr) => {
                if want_variance {
                    vec![add_gpr_proxy(&mut model, gpr, &x_std)?]
                } else {
                    vec![gpr_mean(gpr, &x_std) * scaling.y_std(0) + scaling.y_mean(0)]
                }
            }
            Surrogate::GaussianProcessClassifier(gpc) => vec![add_gpc(&mut model, gpc, &x_std)?],
            Surrogate::Hybrid(hybrid) => {
                let big_m = hidden_big_m(&hybrid.network, scaling, &self.big_m)?;
                let last = add_network(&mut model, &hybrid.network, &x_std, &big_m)?;
                let mut features = Vec::with_capacity(last.len());
                for (j, z) in last.into_iter().enumerate() {
                    let f = model.add_free(format!("features[{j}]"));
                    model.add_constraint(Constraint::equal(format!("feature[{j}]"), f, z))?;
                    features.push(Expr::from(f));
                }
                vec![hybrid_head(hybrid, &features) * scaling.y_std(0) + scaling.y_mean(0)]
            }
        };

        let mut outputs = Vec::with_capacity(predictions.len());
        for (n, prediction) in predictions.into_iter().enumerate() {
            let out = model.add_free(format!("outputs[{n}]"));
            model.add_constraint(Constraint::equal(format!("prediction[{n}]"), out, prediction))?;
            outputs.push(out);
        }
        debug!(
            "Block '{name}': {} variables ({} binaries), {} constraints",
            model.n_vars(),
            model.n_binaries(),
            model.constraints().len()
        );
        info!(
            "Formulated {surrogate}{} as a {} block",
            if want_variance { " variance" } else { "" },
            if model.is_linear() {
                "linear"
            } else {
                "nonlinear"
            }
        );
        Ok(Block::new(model, inputs, outputs)?)
    }
}

/// Translate a surrogate into a block with default parameters (fixed big-M).
///
/// See [FormulationValidParams::formulate].
pub fn formulate<S: ScalingProvider + ?Sized>(
    surrogate: &Surrogate,
    scaling: &S,
    want_variance: bool,
) -> Result<Block> {
    FormulationParams::default()
        .check()?
        .formulate(surrogate, scaling, want_variance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::Activation;
    use crate::kernels::Kernel;
    use crate::params::BigM;
    use crate::surrogates::{
        GaussianProcessClassifier, GaussianProcessRegressor, HybridModel, NeuralNetwork,
    };
    use approx::assert_abs_diff_eq;
    use ddobox_data::Scaling;
    use ddobox_expr::{Assignment, Relation, VarId};
    use ndarray::{array, Array1, Array2};

    fn init_log() {
        let env = env_logger::Env::new().filter_or("DDOBOX_LOG", "info");
        let mut builder = env_logger::Builder::from_env(env);
        let builder = builder.target(env_logger::Target::Stdout);
        builder.try_init().ok();
    }

    /// Assignment at the raw point `x` where every variable defined by an
    /// equality `v == expr` is computed in declaration order
    fn complete(block: &Block, x: &[f64]) -> Assignment {
        let model = block.model();
        let mut point = Assignment::zeros(model.n_vars());
        for (v, xv) in block.inputs().iter().zip(x) {
            point.set(*v, *xv);
        }
        for c in model.constraints() {
            if let (Relation::Eq, Expr::Var(v)) = (c.relation, &c.lhs) {
                let value = c.rhs.eval(&point);
                point.set(*v, value);
            }
        }
        point
    }

    fn var(block: &Block, name: &str) -> VarId {
        block.model().find(name).unwrap()
    }

    /// Forward pass assignment of a big-M encoded network
    fn network_assignment(block: &Block, nn: &NeuralNetwork, x: &Array1<f64>) -> Assignment {
        let model = block.model();
        let mut point = Assignment::zeros(model.n_vars());
        for (v, xv) in block.inputs().iter().zip(x.iter()) {
            point.set(*v, *xv);
        }
        let (zs, acts) = nn.forward(x);
        for (i, (z, a)) in zs.iter().zip(acts.iter()).enumerate() {
            let l = i + 1;
            for n in 0..z.len() {
                point.set(var(block, &format!("z[{l},{n}]")), z[n]);
                if l == zs.len() {
                    point.set(block.outputs()[n], z[n]);
                    continue;
                }
                point.set(var(block, &format!("a[{l},{n}]")), a[n]);
                let flag = |b: bool| if b { 1. } else { 0. };
                match nn.activation() {
                    Activation::Relu => {
                        point.set(var(block, &format!("y[{l},{n}]")), flag(z[n] > 0.))
                    }
                    Activation::HardSigmoid => {
                        point.set(var(block, &format!("p[{l},{n}]")), flag(z[n] >= -3.));
                        point.set(var(block, &format!("q[{l},{n}]")), flag(z[n] >= 3.));
                    }
                    _ => (),
                }
            }
        }
        point
    }

    fn relu_network() -> NeuralNetwork {
        NeuralNetwork::new(
            vec![Array2::eye(3), array![[1., -2., 0.5]]],
            vec![array![0.3, -0.2, 0.1], array![0.25]],
            Activation::Relu,
        )
        .unwrap()
    }

    #[test]
    fn test_linear_network_matches_forward_pass() {
        init_log();
        let nn = NeuralNetwork::new(
            vec![array![[1., -0.5], [2., 0.3]], array![[0.7, -1.1], [0.2, 0.4]]],
            vec![array![0.1, -0.3], array![0.5, 0.]],
            Activation::Linear,
        )
        .unwrap();
        let scaling =
            Scaling::new(array![1., 2.], array![0.5, 3.], array![-1., 4.], array![2., 0.1])
                .unwrap();
        let surrogate = Surrogate::from(nn);
        let block = formulate(&surrogate, &scaling, false).unwrap();
        assert!(block.model().is_linear());
        assert_eq!(block.outputs().len(), 2);

        let x = [0.3, -1.7];
        let point = complete(&block, &x);
        assert!(block.model().is_feasible(&point, 1e-12).unwrap());
        let expected = surrogate.predict(&scaling, &array![x]).unwrap();
        for n in 0..2 {
            assert_abs_diff_eq!(
                point.value(block.outputs()[n]),
                expected[[0, n]],
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_relu_big_m_sign_patterns() {
        let nn = relu_network();
        let surrogate = Surrogate::from(nn.clone());
        let scaling = Scaling::<f64>::identity(3, 1);
        let box3 = array![[-1., 1.], [-1., 1.], [-1., 1.]];
        for big_m in [BigM::Fixed(100.), BigM::propagated(box3)] {
            let params = FormulationParams::new().big_m(big_m).check().unwrap();
            let block = params.formulate(&surrogate, &scaling, false).unwrap();
            assert_eq!(block.model().n_binaries(), 3);
            for pattern in 0..8 {
                let x = Array1::from_shape_fn(3, |i| if pattern >> i & 1 == 1 { 1. } else { -1. });
                let point = network_assignment(&block, &nn, &x);
                assert!(block.model().is_feasible(&point, 1e-9).unwrap());
                let y = surrogate.predict(&scaling, &x.clone().insert_axis(ndarray::Axis(0)));
                assert_abs_diff_eq!(
                    point.value(block.outputs()[0]),
                    y.unwrap()[[0, 0]],
                    epsilon = 1e-12
                );

                for n in 0..3 {
                    let mut flipped = point.clone();
                    let y = var(&block, &format!("y[1,{n}]"));
                    flipped.set(y, 1. - point.value(y));
                    assert!(!block.model().is_feasible(&flipped, 1e-9).unwrap());

                    let mut perturbed = point.clone();
                    let a = var(&block, &format!("a[1,{n}]"));
                    perturbed.set(a, point.value(a) + 0.5);
                    assert!(!block.model().is_feasible(&perturbed, 1e-9).unwrap());
                }
            }
        }
    }

    #[test]
    fn test_hard_sigmoid_regimes() {
        let nn = NeuralNetwork::new(
            vec![array![[4., 0.], [0., 4.]], array![[1., 1.]]],
            vec![array![0., 0.], array![0.]],
            Activation::HardSigmoid,
        )
        .unwrap();
        let surrogate = Surrogate::from(nn.clone());
        let scaling = Scaling::<f64>::identity(2, 1);
        let params = FormulationParams::new()
            .big_m(BigM::Fixed(1e3))
            .check()
            .unwrap();
        let block = params.formulate(&surrogate, &scaling, false).unwrap();
        assert_eq!(block.model().n_binaries(), 4);
        for x in [array![-1., 0.2], array![1., -0.2], array![0.1, 1.]] {
            let point = network_assignment(&block, &nn, &x);
            assert!(block.model().is_feasible(&point, 1e-9).unwrap());
            let p = var(&block, "p[1,0]");
            let mut flipped = point.clone();
            flipped.set(p, 1. - point.value(p));
            assert!(!block.model().is_feasible(&flipped, 1e-9).unwrap());
        }
    }

    #[test]
    fn test_smooth_activations() {
        for activation in [
            Activation::Tanh,
            Activation::Sigmoid,
            Activation::Softplus,
            Activation::LeakyRelu,
        ] {
            let nn = NeuralNetwork::new(
                vec![array![[1.2, -0.4], [-0.8, 0.6]], array![[1., -1.]]],
                vec![array![0.1, 0.2], array![0.]],
                activation,
            )
            .unwrap();
            let surrogate = Surrogate::from(nn);
            let scaling = Scaling::new(array![0., 1.], array![2., 2.], array![3.], array![0.5])
                .unwrap();
            let block = formulate(&surrogate, &scaling, false).unwrap();
            assert_eq!(block.model().n_binaries(), 0);
            let x = [1.5, -0.5];
            let point = complete(&block, &x);
            assert!(block.model().is_feasible(&point, 1e-12).unwrap());
            let expected = surrogate.predict(&scaling, &array![x]).unwrap()[[0, 0]];
            assert_abs_diff_eq!(point.value(block.outputs()[0]), expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_rbf_mean_at_training_point() {
        let gpr = GaussianProcessRegressor::new(
            Kernel::Rbf { length_scale: 1. },
            1.,
            array![[0.]],
            array![1.],
        )
        .unwrap();
        let block = formulate(&Surrogate::from(gpr), &Scaling::<f64>::identity(1, 1), false)
            .unwrap();
        let point = complete(&block, &[0.]);
        assert_eq!(point.value(block.outputs()[0]), 1.0);
    }

    #[test]
    fn test_kernels_mean_match_predict() {
        let x_train = array![[0., 0.5], [1., -0.5], [-0.7, 0.2]];
        let alpha = array![0.5, -1.2, 0.8];
        let scaling =
            Scaling::new(array![0.5, -1.], array![2., 0.5], array![1.], array![3.]).unwrap();
        let kernels = [
            Kernel::Rbf { length_scale: 0.8 },
            Kernel::Linear { sigma_0: 0.5 },
            Kernel::Polynomial {
                sigma_0: 0.5,
                order: 2,
            },
            Kernel::RationalQuadratic {
                length_scale: 1.2,
                alpha: 0.7,
            },
            Kernel::ExpSineSquared {
                length_scale: 1.,
                periodicity: 2.,
            },
            Kernel::Matern {
                length_scale: 1.,
                nu: 1.5,
            },
            Kernel::SumRbf {
                length_scale: 0.5,
                length_scale_1: 2.,
            },
            Kernel::SumRationalQuadratic {
                length_scale: 0.5,
                alpha: 1.,
                length_scale_1: 2.,
                alpha_1: 0.3,
            },
        ];
        for kernel in kernels {
            let gpr =
                GaussianProcessRegressor::new(kernel, 1.5, x_train.clone(), alpha.clone()).unwrap();
            let surrogate = Surrogate::from(gpr);
            let block = formulate(&surrogate, &scaling, false).unwrap();
            for x in [[0.7, -1.2], [-1.5, -0.8]] {
                let point = complete(&block, &x);
                let expected = surrogate.predict(&scaling, &array![x]).unwrap()[[0, 0]];
                assert_abs_diff_eq!(point.value(block.outputs()[0]), expected, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn test_gpr_variance() {
        let x_train = array![[0.], [1.]];
        let gpr = GaussianProcessRegressor::new(
            Kernel::Rbf { length_scale: 1. },
            2.,
            x_train.clone(),
            array![1., 1.],
        )
        .unwrap();
        let scaling = Scaling::<f64>::identity(1, 1);

        // no inverse gram
        let surrogate = Surrogate::from(gpr.clone());
        assert!(matches!(
            formulate(&surrogate, &scaling, true),
            Err(FormulationError::InvalidDescriptor(_))
        ));

        let gpr = gpr.with_inv_gram(array![[0.6, -0.2], [-0.2, 0.6]]).unwrap();
        let block = formulate(&Surrogate::from(gpr.clone()), &scaling, true).unwrap();
        assert!(block.model().find("k[1]").is_some());
        let point = complete(&block, &[0.4]);
        assert!(block.model().is_feasible(&point, 1e-12).unwrap());
        let expected = gpr.uncertainty_proxy(&scaling, &array![[0.4]]).unwrap();
        assert_abs_diff_eq!(point.value(block.outputs()[0]), expected[0], epsilon = 1e-12);
    }

    #[test]
    fn test_unsupported_requests() {
        let scaling = Scaling::<f64>::identity(1, 1);
        // as read from a descriptor file, bypassing the constructor check
        let rbf = Kernel::Rbf { length_scale: 1. };
        let mut matern =
            GaussianProcessRegressor::new(rbf, 1., array![[0.]], array![1.]).unwrap();
        matern.kernel = Kernel::Matern {
            length_scale: 1.,
            nu: 3.5,
        };
        assert!(matches!(
            formulate(&Surrogate::from(matern), &scaling, false),
            Err(FormulationError::UnsupportedHyperparameter(_))
        ));

        let rq = GaussianProcessRegressor::new(
            Kernel::RationalQuadratic {
                length_scale: 1.,
                alpha: 1.,
            },
            1.,
            array![[0.]],
            array![1.],
        )
        .unwrap()
        .with_inv_gram(array![[1.]])
        .unwrap();
        assert!(matches!(
            formulate(&Surrogate::from(rq), &scaling, true),
            Err(FormulationError::UnsupportedModelKind(_))
        ));

        let nn = NeuralNetwork::new(vec![array![[1.]]], vec![array![0.]], Activation::Relu)
            .unwrap();
        assert!(matches!(
            formulate(&Surrogate::from(nn.clone()), &scaling, true),
            Err(FormulationError::UnsupportedModelKind(_))
        ));
        assert!(matches!(
            formulate(&Surrogate::from(nn), &Scaling::<f64>::identity(1, 2), false),
            Err(FormulationError::InvalidDescriptor(_))
        ));
    }

    #[test]
    fn test_gpc_matches_predict() {
        let gpc = GaussianProcessClassifier::new(
            0.9,
            1.3,
            array![[0., 0.], [1., 1.], [-1., 0.5]],
            array![0.4, -0.6, 0.2],
            array![[0.5, 0.1, 0.], [0.1, 0.4, 0.05], [0., 0.05, 0.6]],
        )
        .unwrap();
        let surrogate = Surrogate::from(gpc);
        let scaling = Scaling::new(array![0., 1.], array![1., 2.], array![5.], array![2.]).unwrap();
        let block = formulate(&surrogate, &scaling, false).unwrap();
        let x = [0.3, 0.8];
        let point = complete(&block, &x);
        assert!(block.model().is_feasible(&point, 1e-12).unwrap());
        let expected = surrogate.predict(&scaling, &array![x]).unwrap()[[0, 0]];
        assert!(0. < expected && expected < 1.);
        assert_abs_diff_eq!(point.value(block.outputs()[0]), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_hybrid_matches_predict() {
        let nn = NeuralNetwork::new(
            vec![array![[1., -1.], [0.5, 0.5]], array![[1., 0.2], [-0.3, 1.]]],
            vec![array![0., 0.1], array![0.2, -0.1]],
            Activation::Tanh,
        )
        .unwrap();
        let hybrid = HybridModel::new(
            nn,
            0.7,
            1.4,
            array![[0., 0.], [0.5, -0.5], [1., 1.]],
            array![0.3, -0.8, 1.1],
        )
        .unwrap();
        let surrogate = Surrogate::from(hybrid);
        let scaling =
            Scaling::new(array![0., 0.], array![1., 1.], array![2.], array![0.5]).unwrap();
        let block = formulate(&surrogate, &scaling, false).unwrap();
        assert!(block.model().find("features[1]").is_some());
        let x = [0.4, -0.9];
        let point = complete(&block, &x);
        assert!(block.model().is_feasible(&point, 1e-12).unwrap());
        let expected = surrogate.predict(&scaling, &array![x]).unwrap()[[0, 0]];
        assert_abs_diff_eq!(point.value(block.outputs()[0]), expected, epsilon = 1e-12);
    }
}
