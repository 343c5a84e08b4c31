//! # Indian Optimizer
//!
//! Couples the parameter with an auxiliary variable `y`:
//!
//! ```text
//! tmp <- w
//! w   <- w + lr * ((1/beta - alpha) * w - y / beta - beta * g)
//! y   <- y + lr * ((1/beta - alpha) * x - y / beta)
//! ```
//!
//! where `x` is `tmp` ([`IndianUpdate::PreUpdate`]) or the new `w`
//! ([`IndianUpdate::PostUpdate`]). Both updates read the old `y`.

use log::trace;
use ndarray::{ArrayD, ArrayViewD, Zip};

use super::config::{IndianConfig, IndianUpdate};
use super::slots::{SlotSpec, SlotTable};
use super::{LearningRate, OptimError, Optimizer};
use crate::tensor::{Tensor, TensorData};

const SLOTS: &[SlotSpec] = &[SlotSpec::zeros("y")];

/// Coefficients of the Indian recurrence, shared with Nadian.
#[derive(Debug, Clone, Copy)]
pub(crate) struct IndianRule {
    pub alpha: TensorData,
    pub beta: TensorData,
    pub update: IndianUpdate,
}

impl IndianRule {
    pub(crate) fn apply(
        &self,
        lr: TensorData,
        w: &mut ArrayD<TensorData>,
        y: &mut ArrayD<TensorData>,
        grad: &ArrayViewD<'_, TensorData>,
    ) {
        let inv_beta = 1.0 / self.beta;
        let decay = inv_beta - self.alpha;
        let beta = self.beta;
        let update = self.update;

        Zip::from(w).and(y).and(grad).for_each(|w, y, &g| {
            let tmp = *w;
            *w = tmp + lr * (decay * tmp - inv_beta * *y - beta * g);
            let x = match update {
                IndianUpdate::PreUpdate => tmp,
                IndianUpdate::PostUpdate => *w,
            };
            *y += lr * (decay * x - inv_beta * *y);
        });
    }
}

#[derive(Debug)]
pub struct Indian {
    lr: LearningRate,
    rule: IndianRule,
    slots: SlotTable,
    iterations: u64,
}

impl Indian {
    /// Creates a new Indian optimizer instance.
    ///
    /// # Arguments
    /// * `config`: Learning rate (default: 1e-3), `alpha` (default: 1.0),
    ///   `beta` (default: 1.5) and which `w` feeds the `y` update
    ///   (default: `pre_update`).
    pub fn new(config: IndianConfig) -> Result<Self, OptimError> {
        config.validate()?;
        Ok(Indian {
            lr: LearningRate::Constant(config.learning_rate),
            rule: IndianRule {
                alpha: config.alpha,
                beta: config.beta,
                update: config.update,
            },
            slots: SlotTable::new(SLOTS),
            iterations: 0,
        })
    }

    pub fn with_learning_rate(mut self, lr: impl Into<LearningRate>) -> Self {
        self.lr = lr.into();
        self
    }

    pub fn update_mode(&self) -> IndianUpdate {
        self.rule.update
    }
}

impl Optimizer for Indian {
    fn name(&self) -> &'static str {
        "Indian"
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
        let rule = self.rule;
        let [y] = self.slots.slots_for::<1>(param, grad.shape())?;

        rule.apply(lr, &mut param.data_mut(), y, &grad);

        trace!("Indian: updated {param} with lr {lr}");
        Ok(())
    }
}
