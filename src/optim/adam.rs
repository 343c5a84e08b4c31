//! # Adam Optimizer

use log::trace;
use ndarray::{ArrayViewD, Zip};

use super::config::AdamConfig;
use super::slots::{SlotSpec, SlotTable};
use super::{LearningRate, OptimError, Optimizer};
use crate::tensor::ops::bias_correction;
use crate::tensor::{Tensor, TensorData};

const SLOTS: &[SlotSpec] = &[SlotSpec::zeros("m"), SlotSpec::zeros("v")];

/// Implements the Adam algorithm.
/// Reference: Adam: A Method for Stochastic Optimization - https://arxiv.org/abs/1412.6980
#[derive(Debug)]
pub struct Adam {
    lr: LearningRate,
    betas: (TensorData, TensorData), // (beta1, beta2)
    eps: TensorData,
    slots: SlotTable,
    // Completed steps; bias correction uses iterations + 1
    iterations: u64,
}

impl Adam {
    /// Creates a new Adam optimizer instance.
    ///
    /// # Arguments
    /// * `config`: Learning rate (default: 1e-3), `beta_1` (default: 0.9),
    ///   `beta_2` (default: 0.999) and `epsilon` (default: 1e-7).
    pub fn new(config: AdamConfig) -> Result<Self, OptimError> {
        config.validate()?;
        Ok(Adam {
            lr: LearningRate::Constant(config.learning_rate),
            betas: (config.beta_1, config.beta_2),
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

impl Optimizer for Adam {
    fn name(&self) -> &'static str {
        "Adam"
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
        let (beta1, beta2) = self.betas;
        let eps = self.eps;

        let bias_correction1 = bias_correction(beta1, self.iterations);
        let bias_correction2 = bias_correction(beta2, self.iterations);

        let [m, v] = self.slots.slots_for::<2>(param, grad.shape())?;

        Zip::from(&mut *param.data_mut())
            .and(m)
            .and(v)
            .and(&grad)
            .for_each(|w, m, v, &g| {
                *m = beta1 * *m + (1.0 - beta1) * g;
                *v = beta2 * *v + (1.0 - beta2) * g * g;
                let m_hat = *m / bias_correction1;
                let v_hat = *v / bias_correction2;
                *w -= lr * m_hat / (v_hat.sqrt() + eps);
            });

        trace!("Adam: updated {param} at t = {}", self.iterations + 1);
        Ok(())
    }
}
