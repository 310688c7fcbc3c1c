//! Outer problems optimizing through formulated blocks.
use crate::errors::{FormulationError, Result};
use crate::params::check_xlimits;
use ddobox_expr::{Block, Constraint, Embedded, Expr, Model, Sense, VarId};
use log::debug;
use ndarray::Array2;

/// An optimization model with bounded global `inputs` shared by embedded blocks
#[derive(Clone, Debug)]
pub struct SurrogateProblem {
    model: Model,
    inputs: Vec<VarId>,
    n_blocks: usize,
}

impl SurrogateProblem {
    /// Problem with one global input per row of `xlimits`, a (nx, 2) matrix of raw bounds
    pub fn new(name: &str, xlimits: &Array2<f64>) -> Result<Self> {
        check_xlimits(xlimits)?;
        let mut model = Model::new(name);
        let inputs = xlimits
            .rows()
            .into_iter()
            .enumerate()
            .map(|(i, row)| model.add_continuous(format!("inputs[{i}]"), row[0], row[1]))
            .collect();
        Ok(SurrogateProblem {
            model,
            inputs,
            n_blocks: 0,
        })
    }

    /// Global inputs
    pub fn inputs(&self) -> &[VarId] {
        &self.inputs
    }

    /// Model being built
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Mutable access to the model, to add variables or side constraints
    pub fn model_mut(&mut self) -> &mut Model {
        &mut self.model
    }

    /// Embed a block under `prefix` and link its inputs to the global inputs.
    /// Returns the embedded public variables.
    pub fn embed(&mut self, prefix: &str, block: &Block) -> Result<Embedded> {
        if block.inputs().len() != self.inputs.len() {
            return Err(FormulationError::InvalidValue(format!(
                "block '{}' has {} inputs, problem has {}",
                block.model().name(),
                block.inputs().len(),
                self.inputs.len()
            )));
        }
        let embedded = self.model.embed(prefix, block);
        for (i, (global, local)) in self.inputs.iter().zip(embedded.inputs.iter()).enumerate() {
            self.model.add_constraint(Constraint::equal(
                format!("{prefix}.link[{i}]"),
                *global,
                *local,
            ))?;
        }
        self.n_blocks += 1;
        debug!(
            "Problem '{}': {} blocks embedded",
            self.model.name(),
            self.n_blocks
        );
        Ok(embedded)
    }

    /// Set the objective
    pub fn set_objective(&mut self, expr: impl Into<Expr>, sense: Sense) -> Result<()> {
        Ok(self.model.set_objective(expr, sense)?)
    }

    /// Final model
    pub fn into_model(self) -> Model {
        self.model
    }
}

/// Model optimizing the `output`-th output of the block over the raw input box `xlimits`
pub fn optimize_through(
    block: &Block,
    xlimits: &Array2<f64>,
    output: usize,
    sense: Sense,
) -> Result<Model> {
    if output >= block.outputs().len() {
        return Err(FormulationError::InvalidValue(format!(
            "output index {output} out of range, block has {} outputs",
            block.outputs().len()
        )));
    }
    let mut problem = SurrogateProblem::new("surrogate_problem", xlimits)?;
    let embedded = problem.embed("surrogate", block)?;
    problem.set_objective(embedded.outputs[output], sense)?;
    Ok(problem.into_model())
}
