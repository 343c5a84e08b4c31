//! # Nesterov Accelerated Gradient (NAG)
//!
//! The Momentum recurrence, with the gradient taken at the look-ahead point
//! `w + mu * (w - past)` instead of at `w`.

use ndarray::ArrayViewD;

use super::config::MomentumConfig;
use super::lookahead::{look_ahead_gradients, momentum_points, GradientTape, Loss};
use super::momentum::{Momentum, PAST};
use super::slots::SlotTable;
use super::{GradAndParam, LearningRate, OptimError, Optimizer};
use crate::tensor::{Tensor, TensorData};

#[derive(Debug)]
pub struct NAG(Momentum);

impl NAG {
    /// Creates a new NAG optimizer instance.
    ///
    /// # Arguments
    /// * `config`: Learning rate (default: 0.01) and momentum factor `mu` (default: 0.9).
    pub fn new(config: MomentumConfig) -> Result<Self, OptimError> {
        Ok(NAG(Momentum::new(config)?))
    }

    pub fn with_learning_rate(self, lr: impl Into<LearningRate>) -> Self {
        NAG(self.0.with_learning_rate(lr))
    }

    pub fn mu(&self) -> TensorData {
        self.0.mu()
    }
}

impl Optimizer for NAG {
    fn name(&self) -> &'static str {
        "NAG"
    }

    fn slots(&self) -> &SlotTable {
        self.0.slots()
    }

    fn slots_mut(&mut self) -> &mut SlotTable {
        self.0.slots_mut()
    }

    fn iterations(&self) -> u64 {
        self.0.iterations()
    }

    fn set_iterations(&mut self, iterations: u64) {
        self.0.set_iterations(iterations);
    }

    fn learning_rate_schedule(&self) -> &LearningRate {
        self.0.learning_rate_schedule()
    }

    fn update_step(
        &mut self,
        grad: ArrayViewD<'_, TensorData>,
        param: &Tensor,
    ) -> Result<(), OptimError> {
        let name = self.name();
        self.0.apply(name, grad, param)
    }

    fn compute_gradients(
        &mut self,
        loss: Loss<'_>,
        params: &[Tensor],
        tape: Option<&mut dyn GradientTape>,
    ) -> Result<Vec<GradAndParam>, OptimError> {
        self.build(params);
        let points = momentum_points(self.slots(), PAST, self.mu(), params)?;
        look_ahead_gradients(loss, params, tape, points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::full;
    use approx::assert_abs_diff_eq;
    use ndarray::ArrayD;

    #[test]
    fn first_look_ahead_point_is_the_parameter_itself() {
        let w = full(&[1], 2.0);
        let mut opt = NAG::new(MomentumConfig::default()).unwrap();
        let mut seen = Vec::new();
        let mut tape = |params: &[Tensor]| -> Result<Vec<ArrayD<TensorData>>, OptimError> {
            seen.push(params[0].to_vec()[0]);
            Ok(vec![params[0].data_clone()])
        };
        let grads = opt
            .compute_gradients(Loss::Value(0.0), &[w.clone()], Some(&mut tape))
            .unwrap();
        assert_eq!(seen, vec![2.0]);
        assert_abs_diff_eq!(grads[0].0[[0]], 2.0);
        assert_eq!(w.to_vec(), vec![2.0]);
    }

    #[test]
    fn momentum_state_is_not_shared_by_name() {
        let w = full(&[1], 0.0);
        let mut opt = NAG::new(MomentumConfig::default()).unwrap();
        opt.build(&[w]);
        let mut state = opt.state_dict();
        assert_eq!(state.optimizer, "NAG");
        state.optimizer = "Momentum".to_string();
        assert!(opt.load_state_dict(&state).is_err());
    }
}
