//! # Momentum Optimizer
//!
//! Heavy-ball momentum expressed through the previous parameter value rather
//! than a velocity buffer:
//!
//! ```text
//! tmp <- w
//! w   <- w + mu * (w - past) - lr * g
//! past <- tmp
//! ```

use log::trace;
use ndarray::{ArrayViewD, Zip};

use super::config::MomentumConfig;
use super::slots::{SlotSpec, SlotTable};
use super::{LearningRate, OptimError, Optimizer};
use crate::tensor::{Tensor, TensorData};

pub(crate) const PAST: usize = 0;
const SLOTS: &[SlotSpec] = &[SlotSpec::copy_of_param("past")];

#[derive(Debug)]
pub struct Momentum {
    lr: LearningRate,
    mu: TensorData,
    slots: SlotTable,
    iterations: u64,
}

impl Momentum {
    /// Creates a new Momentum optimizer instance.
    ///
    /// # Arguments
    /// * `config`: Learning rate (default: 0.01) and momentum factor `mu` (default: 0.9).
    pub fn new(config: MomentumConfig) -> Result<Self, OptimError> {
        config.validate()?;
        Ok(Momentum {
            lr: LearningRate::Constant(config.learning_rate),
            mu: config.mu,
            slots: SlotTable::new(SLOTS),
            iterations: 0,
        })
    }

    pub fn with_learning_rate(mut self, lr: impl Into<LearningRate>) -> Self {
        self.lr = lr.into();
        self
    }

    pub fn mu(&self) -> TensorData {
        self.mu
    }

    /// One momentum update of `param`, logged under `name`.
    pub(crate) fn apply(
        &mut self,
        name: &str,
        grad: ArrayViewD<'_, TensorData>,
        param: &Tensor,
    ) -> Result<(), OptimError> {
        let lr = self.learning_rate();
        let mu = self.mu;
        let [past] = self.slots.slots_for::<1>(param, grad.shape())?;

        Zip::from(&mut *param.data_mut())
            .and(past)
            .and(&grad)
            .for_each(|w, p, &g| {
                let tmp = *w;
                *w = tmp + mu * (tmp - *p) - lr * g;
                *p = tmp;
            });

        trace!("{name}: updated {param} with lr {lr}");
        Ok(())
    }
}

impl Optimizer for Momentum {
    fn name(&self) -> &'static str {
        "Momentum"
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
        let name = self.name();
        self.apply(name, grad, param)
    }
}
