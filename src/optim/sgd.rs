//! # Stochastic Gradient Descent (SGD) Optimizer

use log::trace;
use ndarray::{ArrayViewD, Zip};

use super::config::SgdConfig;
use super::slots::{SlotSpec, SlotTable};
use super::{LearningRate, OptimError, Optimizer};
use crate::tensor::{Tensor, TensorData};

const SLOTS: &[SlotSpec] = &[];

/// Implements plain gradient descent: `w <- w - lr * g`.
/// Keeps no auxiliary state.
#[derive(Debug)]
pub struct SGD {
    lr: LearningRate,
    slots: SlotTable,
    iterations: u64,
}

impl SGD {
    /// Creates a new SGD optimizer instance.
    ///
    /// # Arguments
    /// * `config`: Learning rate (default: 0.01).
    pub fn new(config: SgdConfig) -> Result<Self, OptimError> {
        config.validate()?;
        Ok(SGD {
            lr: LearningRate::Constant(config.learning_rate),
            slots: SlotTable::new(SLOTS),
            iterations: 0,
        })
    }

    /// Replaces the configured learning rate, e.g. with a schedule.
    pub fn with_learning_rate(mut self, lr: impl Into<LearningRate>) -> Self {
        self.lr = lr.into();
        self
    }
}

impl Optimizer for SGD {
    fn name(&self) -> &'static str {
        "SGD"
    }

    fn slots(&self) -> &SlotTable {
        &self.slots
    }

    fn slots_mut(&mut self) -> &mut SlotTable {
        &mut self.slots
    }

    fn iterations(&self) -> u64 {
        self.iterations
    }

    fn set_iterations(&mut self, iterations: u64) {
        self.iterations = iterations;
    }

    fn learning_rate_schedule(&self) -> &LearningRate {
        &self.lr
    }

    fn update_step(
        &mut self,
        grad: ArrayViewD<'_, TensorData>,
        param: &Tensor,
    ) -> Result<(), OptimError> {
        let lr = self.learning_rate();
        self.slots.check(param, grad.shape())?;

        Zip::from(&mut *param.data_mut())
            .and(&grad)
            .for_each(|w, &g| *w -= lr * g);

        trace!("SGD: updated {param} with lr {lr}");
        Ok(())
    }
}
