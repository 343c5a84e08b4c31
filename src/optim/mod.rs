//! # Optimization Algorithms (`optim`)
//!
//! Provides the gradient-based update rules used to train model parameters.
//! Every optimizer owns a [`SlotTable`] with its per-parameter auxiliary state
//! and an iteration counter that advances once per step.

use log::{debug, trace};
use ndarray::{ArrayD, ArrayViewD};

use crate::tensor::{Tensor, TensorData, TensorError, TensorId};

// --- Submodules ---
pub mod adabelief;
pub mod adagrad;
pub mod adam;
pub mod config;
pub mod indian;
pub mod learning_rate;
pub mod lookahead;
pub mod momentum;
pub mod nadian;
pub mod nag;
pub mod rmsprop;
pub mod sgd;
pub mod slots;

// Re-export optimizers
pub use adabelief::AdaBelief;
pub use adagrad::AdaGrad;
pub use adam::Adam;
pub use indian::Indian;
pub use momentum::Momentum;
pub use nadian::Nadian;
pub use nag::NAG;
pub use rmsprop::RMSprop;
pub use sgd::SGD;

pub use config::{IndianUpdate, OptimizerConfig};
pub use learning_rate::LearningRate;
pub use lookahead::{FiniteDifference, GradientTape, LookAhead, Loss, Phase};
pub use slots::{Lifecycle, OptimizerState, ParamHandle, SlotSpec, SlotTable};

/// A gradient paired with the parameter it belongs to.
pub type GradAndParam = (ArrayD<TensorData>, Tensor);

#[derive(thiserror::Error, Debug)]
pub enum OptimError {
    #[error("Parameter {id} is not registered with this optimizer")]
    UnregisteredParameter { id: TensorId },
    #[error("Tensor error: {0}")]
    Tensor(#[from] TensorError),
    #[error("A gradient tape is required when the loss is a value (loss = {loss})")]
    MissingTape { loss: TensorData },
    #[error("Expected {expected} gradient(s), got {got}")]
    GradientCount { expected: usize, got: usize },
    #[error("{optimizer} has no slot named '{slot}'")]
    UnknownSlot {
        optimizer: &'static str,
        slot: String,
    },
    #[error("Invalid {name} = {value}: {reason}")]
    InvalidHyperparameter {
        name: &'static str,
        value: TensorData,
        reason: &'static str,
    },
    #[error("Incompatible optimizer state: {0}")]
    IncompatibleState(String),
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

// --- Optimizer Trait ---

/// Base trait for all optimizers.
///
/// Implementors provide their slot table, iteration counter, learning rate and
/// the per-parameter [`update_step`](Optimizer::update_step); registration,
/// gradient collection, stepping and checkpointing are shared.
pub trait Optimizer {
    /// Type name, also used to validate loaded state.
    fn name(&self) -> &'static str;

    fn slots(&self) -> &SlotTable;

    fn slots_mut(&mut self) -> &mut SlotTable;

    /// Number of completed steps.
    fn iterations(&self) -> u64;

    fn set_iterations(&mut self, iterations: u64);

    fn learning_rate_schedule(&self) -> &LearningRate;

    /// Applies the update rule to one parameter.
    ///
    /// Does not advance the iteration counter: every parameter of a step
    /// sees the same count until [`finish_step`](Optimizer::finish_step).
    fn update_step(&mut self, grad: ArrayViewD<'_, TensorData>, param: &Tensor)
        -> Result<(), OptimError>;

    /// The learning rate for the current step.
    fn learning_rate(&self) -> TensorData {
        self.learning_rate_schedule().at(self.iterations())
    }

    /// Registers `params` and allocates their slots. Only the first call has
    /// any effect.
    fn build(&mut self, params: &[Tensor]) {
        let name = self.name();
        self.slots_mut().allocate(name, params);
    }

    fn is_built(&self) -> bool {
        self.slots().is_allocated()
    }

    fn finish_step(&mut self) {
        let iterations = self.iterations() + 1;
        self.set_iterations(iterations);
        debug!("{}: finished step {}", self.name(), iterations);
    }

    /// Gradients of `loss` with respect to `params`.
    ///
    /// Uses `tape` when given; a [`Loss::Closure`] without a tape is
    /// differentiated numerically.
    fn compute_gradients(
        &mut self,
        loss: Loss<'_>,
        params: &[Tensor],
        tape: Option<&mut dyn GradientTape>,
    ) -> Result<Vec<GradAndParam>, OptimError> {
        self.build(params);
        lookahead::gradients(loss, params, tape)
    }

    /// Runs one step: updates every parameter, then advances the counter.
    ///
    /// All pairs are validated first, so an unregistered parameter or a shape
    /// mismatch leaves parameters, slots and counter untouched.
    fn apply_gradients(&mut self, grads_and_params: &[GradAndParam]) -> Result<(), OptimError> {
        for (grad, param) in grads_and_params {
            self.slots().check(param, grad.shape())?;
        }
        for (grad, param) in grads_and_params {
            self.update_step(grad.view(), param)?;
        }
        trace!(
            "{}: applied {} gradient(s)",
            self.name(),
            grads_and_params.len()
        );
        self.finish_step();
        Ok(())
    }

    fn minimize(
        &mut self,
        loss: Loss<'_>,
        params: &[Tensor],
        tape: Option<&mut dyn GradientTape>,
    ) -> Result<(), OptimError> {
        self.build(params);
        let grads_and_params = self.compute_gradients(loss, params, tape)?;
        self.apply_gradients(&grads_and_params)
    }

    fn slot_names(&self) -> Vec<&'static str> {
        self.slots().slot_names().collect()
    }

    /// A copy of the named slot of `param`.
    fn slot(&self, param: &Tensor, name: &str) -> Result<ArrayD<TensorData>, OptimError> {
        self.slots().value(self.name(), param, name)
    }

    fn state_dict(&self) -> OptimizerState {
        OptimizerState {
            optimizer: self.name().to_string(),
            iterations: self.iterations(),
            slot_names: self.slots().slot_names().map(str::to_string).collect(),
            params: self.slots().export(),
        }
    }

    /// Restores slots and the iteration counter. The optimizer must already be
    /// built for the same parameters, in the same order.
    fn load_state_dict(&mut self, state: &OptimizerState) -> Result<(), OptimError> {
        if state.optimizer != self.name() {
            return Err(OptimError::IncompatibleState(format!(
                "state was saved by {}, not {}",
                state.optimizer,
                self.name()
            )));
        }
        self.slots_mut().import(&state.slot_names, &state.params)?;
        self.set_iterations(state.iterations);
        debug!(
            "{}: loaded state at iteration {}",
            self.name(),
            state.iterations
        );
        Ok(())
    }
}
