use crate::errors::{AdaptiveError, Result};
use crate::partition::{check_xlimits, Partition};
use ddobox_data::ScalingProvider;
use ddobox_expr::{Constraint, Expr, Model, Sense};
use ddobox_formulation::{
    FormulationError, FormulationParams, FormulationValidParams, Surrogate, SurrogateProblem,
};
use linfa::ParamGuard;
use log::{debug, info};
use ndarray::{Array2, ArrayBase, Data, Ix1, Ix2};
use std::f64::consts::PI;

/// Builder of the optimization problems selecting the next sample location
/// within a bounded input space.
///
/// Every built model has global `inputs` bounded by the input space and is
/// meant to be maximized by an external solver.
#[derive(Clone, Debug)]
pub struct AdaptiveSampler {
    xlimits: Array2<f64>,
    params: FormulationValidParams,
}

impl AdaptiveSampler {
    /// Sampler for the input space `xlimits`, a (nx, 2) matrix of [lower, upper] bounds
    pub fn new(xlimits: &ArrayBase<impl Data<Elem = f64>, Ix2>) -> Result<Self> {
        check_xlimits(xlimits)?;
        Ok(AdaptiveSampler {
            xlimits: xlimits.to_owned(),
            params: FormulationParams::default().check()?,
        })
    }

    /// Set the parameters used to formulate surrogates
    pub fn formulation_params(mut self, params: FormulationValidParams) -> Self {
        self.params = params;
        self
    }

    /// Input space
    pub fn xlimits(&self) -> &Array2<f64> {
        &self.xlimits
    }

    /// Maximize the uncertainty proxy of a gaussian process regressor
    /// (exploration only).
    pub fn max_uncertainty<S: ScalingProvider + ?Sized>(
        &self,
        surrogate: &Surrogate,
        scaling: &S,
    ) -> Result<Model> {
        let block = self.params.formulate(surrogate, scaling, true)?;
        let mut problem = SurrogateProblem::new("max_uncertainty", &self.xlimits)?;
        let uncertainty = problem.embed("uncertainty", &block)?;
        problem.set_objective(uncertainty.outputs[0], Sense::Maximize)?;
        info!("Max uncertainty problem built");
        Ok(problem.into_model())
    }

    /// Maximize the modified expected improvement of a gaussian process regressor
    /// over the best observed output `y_opt` (max or min of `y` depending on `sense`):
    ///
    /// `mod_ei = sqrt((c + u) / (2 pi)) exp(-(y_opt - mean)^2 / (2 (c + u)))`
    ///
    /// where `c` is the regressor signal variance, `mean` its prediction and `u` its
    /// uncertainty proxy.
    pub fn modified_expected_improvement<S: ScalingProvider + ?Sized>(
        &self,
        surrogate: &Surrogate,
        scaling: &S,
        y: &ArrayBase<impl Data<Elem = f64>, Ix1>,
        sense: Sense,
    ) -> Result<Model> {
        let c = match surrogate {
            Surrogate::GaussianProcessRegressor(gpr) => gpr.constant_value(),
            other => {
                return Err(FormulationError::UnsupportedModelKind(format!(
                    "modified expected improvement of {other}"
                ))
                .into())
            }
        };
        let y_opt = best_value(y.iter().copied(), sense)
            .ok_or_else(|| AdaptiveError::NoFeasibleRegion("no observed output".to_string()))?
            .1;
        debug!("Modified expected improvement with y_opt = {y_opt}");

        let mean_block = self.params.formulate(surrogate, scaling, false)?;
        let uncertainty_block = self.params.formulate(surrogate, scaling, true)?;
        let mut problem = SurrogateProblem::new("modified_expected_improvement", &self.xlimits)?;
        let mean = problem.embed("mean", &mean_block)?.outputs[0];
        let uncertainty = problem.embed("uncertainty", &uncertainty_block)?.outputs[0];

        let model = problem.model_mut();
        let mod_ei = model.add_free("mod_ei");
        let s = c + uncertainty;
        let improvement = (y_opt - mean).powi(2);
        model.add_constraint(Constraint::equal(
            "mod_ei_def",
            mod_ei,
            (s.clone() / (2. * PI)).sqrt() * (-improvement / (2. * s)).exp(),
        ))?;
        problem.set_objective(mod_ei, Sense::Maximize)?;
        info!("Modified expected improvement problem built");
        Ok(problem.into_model())
    }

    /// Select the largest simplex of the partition (exploration only).
    /// The inputs are the centroid of the selected simplex.
    pub fn max_volume(&self, partition: &Partition) -> Result<Model> {
        let weights: Vec<f64> = partition.simplices().iter().map(|s| s.volume()).collect();
        self.selection_model("max_volume", partition, &weights)
    }

    /// Select the largest simplex of the partition having the best observed sample
    /// as vertex (exploitation only).
    ///
    /// `y` holds the observed outputs of the samples given to the partitioner, samples
    /// left out of the partition are ignored.
    pub fn exploit_adjacent(
        &self,
        partition: &Partition,
        y: &ArrayBase<impl Data<Elem = f64>, Ix1>,
        sense: Sense,
    ) -> Result<Model> {
        if y.len() != partition.n_samples() {
            return Err(AdaptiveError::InvalidValue(format!(
                "{} outputs for {} partitioned samples",
                y.len(),
                partition.n_samples()
            )));
        }
        let kept: Vec<(usize, f64)> = partition
            .origin()
            .iter()
            .enumerate()
            .filter_map(|(p, o)| o.map(|i| (p, y[i])))
            .collect();
        let (k, y_best) = best_value(kept.iter().map(|(_, v)| *v), sense).ok_or_else(|| {
            AdaptiveError::NoFeasibleRegion("no observed output in the partition".to_string())
        })?;
        let best = kept[k].0;
        let adjacent = partition.simplices_with(best);
        if adjacent.is_empty() {
            return Err(AdaptiveError::NoFeasibleRegion(format!(
                "no simplex adjacent to the best sample (y = {y_best})"
            )));
        }
        debug!("Best sample {best} (y = {y_best}) has {} adjacent simplices", adjacent.len());
        let weights: Vec<f64> = partition
            .simplices()
            .iter()
            .enumerate()
            .map(|(k, s)| if adjacent.contains(&k) { s.volume() } else { 0. })
            .collect();
        self.selection_model("exploit_adjacent", partition, &weights)
    }

    fn selection_model(&self, name: &str, partition: &Partition, weights: &[f64]) -> Result<Model> {
        let d = self.xlimits.nrows();
        if partition.points().ncols() != d {
            return Err(AdaptiveError::InvalidValue(format!(
                "partition in dimension {}, input space in dimension {d}",
                partition.points().ncols()
            )));
        }
        let simplices = partition.simplices();
        if simplices.is_empty() {
            return Err(AdaptiveError::NoFeasibleRegion(
                "partition has no simplex".to_string(),
            ));
        }

        let mut model = Model::new(name);
        let inputs: Vec<_> = self
            .xlimits
            .rows()
            .into_iter()
            .enumerate()
            .map(|(i, b)| model.add_continuous(format!("inputs[{i}]"), b[0], b[1]))
            .collect();
        let selectors: Vec<Expr> = (0..simplices.len())
            .map(|k| Expr::from(model.add_binary(format!("selector[{k}]"))))
            .collect();
        model.add_constraint(Constraint::equal(
            "select_one",
            Expr::sum(selectors.iter().cloned()),
            1.,
        ))?;
        for (i, input) in inputs.iter().enumerate() {
            let coords: Vec<f64> = simplices.iter().map(|s| s.centroid()[i]).collect();
            model.add_constraint(Constraint::equal(
                format!("centroid[{i}]"),
                *input,
                Expr::dot(coords.iter(), &selectors),
            ))?;
        }
        model.set_objective(Expr::dot(weights.iter(), &selectors), Sense::Maximize)?;
        info!("Simplex selection problem '{name}' built over {} simplices", simplices.len());
        Ok(model)
    }
}

/// Index and value of the best finite value (first one on ties)
fn best_value(values: impl Iterator<Item = f64>, sense: Sense) -> Option<(usize, f64)> {
    values
        .enumerate()
        .filter(|(_, v)| v.is_finite())
        .fold(None, |best, (k, v)| match best {
            Some((_, b)) => {
                let better = match sense {
                    Sense::Maximize => v > b,
                    Sense::Minimize => v < b,
                };
                if better {
                    Some((k, v))
                } else {
                    best
                }
            }
            None => Some((k, v)),
        })
}
