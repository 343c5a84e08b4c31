//! # Nadian Optimizer
//!
//! The Indian recurrence driven by a Nesterov look-ahead gradient. Before the
//! Indian update, `past` takes the current value of `w`, so the next step looks
//! ahead along the move this step makes.

use log::trace;
use ndarray::ArrayViewD;

use super::config::{IndianUpdate, NadianConfig};
use super::indian::IndianRule;
use super::lookahead::{look_ahead_gradients, momentum_points, GradientTape, Loss};
use super::slots::{SlotSpec, SlotTable};
use super::{GradAndParam, LearningRate, OptimError, Optimizer};
use crate::tensor::{Tensor, TensorData};

const PAST: usize = 1;
const SLOTS: &[SlotSpec] = &[SlotSpec::zeros("y"), SlotSpec::copy_of_param("past")];

#[derive(Debug)]
pub struct Nadian {
    lr: LearningRate,
    mu: TensorData,
    rule: IndianRule,
    slots: SlotTable,
    iterations: u64,
}

impl Nadian {
    /// Creates a new Nadian optimizer instance.
    ///
    /// # Arguments
    /// * `config`: Learning rate (default: 1e-3), `alpha` (default: 1.0),
    ///   `beta` (default: 1.5), momentum factor `mu` (default: 0.9) and the
    ///   `y` update mode (default: `pre_update`).
    pub fn new(config: NadianConfig) -> Result<Self, OptimError> {
        config.validate()?;
        Ok(Nadian {
            lr: LearningRate::Constant(config.learning_rate),
            mu: config.mu,
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

    pub fn mu(&self) -> TensorData {
        self.mu
    }

    pub fn update_mode(&self) -> IndianUpdate {
        self.rule.update
    }
}

impl Optimizer for Nadian {
    fn name(&self) -> &'static str {
        "Nadian"
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
        let [y, past] = self.slots.slots_for::<2>(param, grad.shape())?;

        let mut w = param.data_mut();
        past.assign(&*w);
        rule.apply(lr, &mut w, y, &grad);
        drop(w);

        trace!("Nadian: updated {param} with lr {lr}");
        Ok(())
    }

    fn compute_gradients(
        &mut self,
        loss: Loss<'_>,
        params: &[Tensor],
        tape: Option<&mut dyn GradientTape>,
    ) -> Result<Vec<GradAndParam>, OptimError> {
        self.build(params);
        let points = momentum_points(&self.slots, PAST, self.mu, params)?;
        look_ahead_gradients(loss, params, tape, points)
    }
}
