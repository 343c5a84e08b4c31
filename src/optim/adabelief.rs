//! # AdaBelief Optimizer
//!
//! Adam with the second moment replaced by the variance of the gradient around
//! its running mean, i.e. how far the gradient strays from the "belief" `m`.
//! Reference: AdaBelief Optimizer: Adapting Stepsizes by the Belief in Observed Gradients - https://arxiv.org/abs/2010.07468

use log::trace;
use ndarray::{ArrayViewD, Zip};

use super::config::AdamConfig;
use super::slots::{SlotSpec, SlotTable};
use super::{LearningRate, OptimError, Optimizer};
use crate::tensor::ops::bias_correction;
use crate::tensor::{Tensor, TensorData};

const SLOTS: &[SlotSpec] = &[SlotSpec::zeros("m"), SlotSpec::zeros("s")];

#[derive(Debug)]
pub struct AdaBelief {
    lr: LearningRate,
    betas: (TensorData, TensorData),
    eps: TensorData,
    slots: SlotTable,
    iterations: u64,
}

impl AdaBelief {
    /// Creates a new AdaBelief optimizer instance. Takes the same options
    /// and defaults as [`Adam`](super::Adam).
    pub fn new(config: AdamConfig) -> Result<Self, OptimError> {
        config.validate()?;
        Ok(AdaBelief {
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

impl Optimizer for AdaBelief {
    fn name(&self) -> &'static str {
        "AdaBelief"
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

        let [m, s] = self.slots.slots_for::<2>(param, grad.shape())?;

        Zip::from(&mut *param.data_mut())
            .and(m)
            .and(s)
            .and(&grad)
            .for_each(|w, m, s, &g| {
                *m = beta1 * *m + (1.0 - beta1) * g;
                // deviation from the freshly updated mean
                let deviation = g - *m;
                *s = beta2 * *s + (1.0 - beta2) * deviation * deviation;
                let m_hat = *m / bias_correction1;
                let s_hat = *s / bias_correction2;
                *w -= lr * m_hat / (s_hat.sqrt() + eps);
            });

        trace!("AdaBelief: updated {param} at t = {}", self.iterations + 1);
        Ok(())
    }
}
