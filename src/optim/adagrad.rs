//! # AdaGrad Optimizer

use log::trace;
use ndarray::{ArrayViewD, Zip};

use super::config::AdaGradConfig;
use super::slots::{SlotSpec, SlotTable};
use super::{LearningRate, OptimError, Optimizer};
use crate::tensor::{Tensor, TensorData};

const SLOTS: &[SlotSpec] = &[SlotSpec::zeros("h")];

/// Implements the AdaGrad algorithm.
/// Reference: Adaptive Subgradient Methods for Online Learning and Stochastic Optimization - https://jmlr.org/papers/v12/duchi11a.html
///
/// ```text
/// h <- h + g^2
/// w <- w - lr * g / (sqrt(h) + eps)
/// ```
#[derive(Debug)]
pub struct AdaGrad {
    lr: LearningRate,
    eps: TensorData,
    slots: SlotTable,
    iterations: u64,
}

impl AdaGrad {
    /// Creates a new AdaGrad optimizer instance.
    ///
    /// # Arguments
    /// * `config`: Learning rate (default: 1e-3) and `epsilon` (default: 1e-5).
    pub fn new(config: AdaGradConfig) -> Result<Self, OptimError> {
        config.validate()?;
        Ok(AdaGrad {
            lr: LearningRate::Constant(config.learning_rate),
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

impl Optimizer for AdaGrad {
    fn name(&self) -> &'static str {
        "AdaGrad"
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
        let eps = self.eps;
        let [h] = self.slots.slots_for::<1>(param, grad.shape())?;

        Zip::from(&mut *param.data_mut())
            .and(h)
            .and(&grad)
            .for_each(|w, h, &g| {
                *h += g * g;
                *w -= lr * g / (h.sqrt() + eps);
            });

        trace!("AdaGrad: updated {param} with lr {lr}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::full;
    use approx::assert_abs_diff_eq;
    use ndarray::{ArrayD, IxDyn};

    #[test]
    fn first_step_accumulates_squared_gradient() {
        let w = full(&[1], 1.0);
        let mut opt = AdaGrad::new(AdaGradConfig {
            learning_rate: 0.1,
            epsilon: 1e-7,
        })
        .unwrap();
        opt.build(&[w.clone()]);
        opt.apply_gradients(&[(ArrayD::from_elem(IxDyn(&[1]), 1.0), w.clone())])
            .unwrap();

        assert_abs_diff_eq!(opt.slot(&w, "h").unwrap()[[0]], 1.0);
        assert_abs_diff_eq!(w.to_vec()[0], 1.0 - 0.0999999, epsilon = 1e-6);
    }

    #[test]
    fn zero_gradient_is_a_fixed_point() {
        let w = full(&[2], 0.3);
        let mut opt = AdaGrad::new(AdaGradConfig::default()).unwrap();
        opt.build(&[w.clone()]);
        for _ in 0..3 {
            opt.apply_gradients(&[(ArrayD::zeros(IxDyn(&[2])), w.clone())])
                .unwrap();
        }
        assert_eq!(w.to_vec(), vec![0.3, 0.3]);
    }
}
