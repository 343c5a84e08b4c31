//! # RMSprop Optimizer
//!
//! Divides the gradient by a running root mean square of recent gradients:
//!
//! ```text
//! v <- rho * v + (1 - rho) * g^2
//! w <- w - lr * g / (sqrt(v) + eps)
//! ```

use log::trace;
use ndarray::{ArrayViewD, Zip};

use super::config::RmsPropConfig;
use super::slots::{SlotSpec, SlotTable};
use super::{LearningRate, OptimError, Optimizer};
use crate::tensor::{Tensor, TensorData};

const SLOTS: &[SlotSpec] = &[SlotSpec::zeros("v")];

#[derive(Debug)]
pub struct RMSprop {
    lr: LearningRate,
    rho: TensorData,
    eps: TensorData,
    slots: SlotTable,
    iterations: u64,
}

impl RMSprop {
    /// Creates a new RMSprop optimizer instance.
    ///
    /// # Arguments
    /// * `config`: Learning rate (default: 1e-3), decay `rho` (default: 0.9)
    ///   and `epsilon` (default: 1e-7).
    pub fn new(config: RmsPropConfig) -> Result<Self, OptimError> {
        config.validate()?;
        Ok(RMSprop {
            lr: LearningRate::Constant(config.learning_rate),
            rho: config.rho,
            eps: config.epsilon,
            slots: SlotTable::new(SLOTS),
            iterations: 0,
        })
    }

    pub fn with_learning_rate(mut self, lr: impl Into<LearningRate>) -> Self {
        self.lr = lr.into();
        self
    }
}

impl Optimizer for RMSprop {
    fn name(&self) -> &'static str {
        "RMSprop"
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
        let (rho, eps) = (self.rho, self.eps);
        let [v] = self.slots.slots_for::<1>(param, grad.shape())?;

        Zip::from(&mut *param.data_mut())
            .and(v)
            .and(&grad)
            .for_each(|w, v, &g| {
                *v = rho * *v + (1.0 - rho) * g * g;
                *w -= lr * g / (v.sqrt() + eps);
            });

        trace!("RMSprop: updated {param} with lr {lr}");
        Ok(())
    }
}
