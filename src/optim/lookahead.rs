//! # Gradient Collection and Look-ahead
//!
//! Gradients come from a [`GradientTape`] handed in by the caller, or, for a
//! re-evaluable [`Loss::Closure`], from central finite differences.
//!
//! The Nesterov-style optimizers evaluate that gradient at a look-ahead point
//! instead of at the current parameters. [`LookAhead`] moves every parameter
//! there, lets the tape run once, and puts the original values back. The
//! values are put back on drop as well, so a failing or panicking tape never
//! leaves a parameter at its look-ahead point.

use std::fmt;

use log::{trace, warn};
use ndarray::{ArrayD, Dimension, IxDyn};

use super::slots::SlotTable;
use super::{GradAndParam, OptimError};
use crate::tensor::ops::{ensure_same_shape, look_ahead_point};
use crate::tensor::{Tensor, TensorData};

/// Source of gradients for a set of parameters, evaluated at their current
/// values.
pub trait GradientTape {
    /// One gradient per parameter, in the order of `params`.
    fn gradient(&mut self, params: &[Tensor]) -> Result<Vec<ArrayD<TensorData>>, OptimError>;
}

impl<F> GradientTape for F
where
    F: FnMut(&[Tensor]) -> Result<Vec<ArrayD<TensorData>>, OptimError>,
{
    fn gradient(&mut self, params: &[Tensor]) -> Result<Vec<ArrayD<TensorData>>, OptimError> {
        self(params)
    }
}

/// The loss handed to `compute_gradients`/`minimize`.
#[derive(Clone, Copy)]
pub enum Loss<'a> {
    /// Recomputes the loss from the parameters' current values.
    Closure(&'a dyn Fn(&[Tensor]) -> TensorData),
    /// An already computed value; differentiating it needs a tape.
    Value(TensorData),
}

impl fmt::Debug for Loss<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Loss::Closure(_) => f.write_str("Closure(..)"),
            Loss::Value(value) => f.debug_tuple("Value").field(value).finish(),
        }
    }
}

/// Central-difference gradients of a loss closure.
///
/// Each element is probed at `x + step` and `x - step` and then set back to
/// `x`.
pub struct FiniteDifference<'a> {
    loss: &'a dyn Fn(&[Tensor]) -> TensorData,
    step: TensorData,
}

impl<'a> FiniteDifference<'a> {
    pub const DEFAULT_STEP: TensorData = 1e-3;

    pub fn new(loss: &'a dyn Fn(&[Tensor]) -> TensorData) -> Self {
        FiniteDifference {
            loss,
            step: Self::DEFAULT_STEP,
        }
    }

    pub fn with_step(mut self, step: TensorData) -> Self {
        self.step = step;
        self
    }

    fn probe(
        &self,
        params: &[Tensor],
        param: &Tensor,
        index: &[usize],
        value: TensorData,
    ) -> TensorData {
        param.data_mut()[index] = value;
        (self.loss)(params)
    }
}

impl GradientTape for FiniteDifference<'_> {
    fn gradient(&mut self, params: &[Tensor]) -> Result<Vec<ArrayD<TensorData>>, OptimError> {
        let mut grads = Vec::with_capacity(params.len());
        for param in params {
            let indices: Vec<Vec<usize>> = param
                .data()
                .indexed_iter()
                .map(|(index, _)| index.slice().to_vec())
                .collect();
            let mut grad = ArrayD::zeros(IxDyn(param.shape()));
            for index in &indices {
                let original = param.data()[index.as_slice()];
                let plus = self.probe(params, param, index, original + self.step);
                let minus = self.probe(params, param, index, original - self.step);
                param.data_mut()[index.as_slice()] = original;
                grad[index.as_slice()] = (plus - minus) / (2.0 * self.step);
            }
            grads.push(grad);
        }
        Ok(grads)
    }
}

fn raw_gradients(
    loss: Loss<'_>,
    params: &[Tensor],
    tape: Option<&mut dyn GradientTape>,
) -> Result<Vec<ArrayD<TensorData>>, OptimError> {
    match (tape, loss) {
        (Some(tape), _) => tape.gradient(params),
        (None, Loss::Closure(loss)) => FiniteDifference::new(loss).gradient(params),
        (None, Loss::Value(loss)) => Err(OptimError::MissingTape { loss }),
    }
}

fn pair_with_params(
    grads: Vec<ArrayD<TensorData>>,
    params: &[Tensor],
) -> Result<Vec<GradAndParam>, OptimError> {
    if grads.len() != params.len() {
        return Err(OptimError::GradientCount {
            expected: params.len(),
            got: grads.len(),
        });
    }
    for (grad, param) in grads.iter().zip(params) {
        ensure_same_shape(param.shape(), grad.shape())?;
    }
    Ok(grads.into_iter().zip(params.iter().cloned()).collect())
}

/// Gradients at the parameters' current values.
pub fn gradients(
    loss: Loss<'_>,
    params: &[Tensor],
    tape: Option<&mut dyn GradientTape>,
) -> Result<Vec<GradAndParam>, OptimError> {
    let grads = raw_gradients(loss, params, tape)?;
    pair_with_params(grads, params)
}

/// Gradients at `points`, one per parameter. The parameters hold their
/// original values again when this returns, whether it succeeds or not.
pub fn look_ahead_gradients(
    loss: Loss<'_>,
    params: &[Tensor],
    tape: Option<&mut dyn GradientTape>,
    points: Vec<ArrayD<TensorData>>,
) -> Result<Vec<GradAndParam>, OptimError> {
    let mut look_ahead = LookAhead::perturb(params, points)?;
    let grads = look_ahead.differentiate(loss, tape)?;
    look_ahead.restore();
    pair_with_params(grads, params)
}

/// The momentum look-ahead point `w + mu * (w - past)` of every parameter,
/// where `past` is the slot at `past_index`.
pub fn momentum_points(
    slots: &SlotTable,
    past_index: usize,
    mu: TensorData,
    params: &[Tensor],
) -> Result<Vec<ArrayD<TensorData>>, OptimError> {
    params
        .iter()
        .map(|param| -> Result<ArrayD<TensorData>, OptimError> {
            let past = slots.values(param)?.get(past_index).ok_or_else(|| {
                OptimError::IncompatibleState(format!("no slot at index {past_index}"))
            })?;
            Ok(look_ahead_point(&param.data(), past, mu)?)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Perturbed,
    Differentiated,
    Restored,
}

/// Parameters temporarily moved to their look-ahead points.
pub struct LookAhead<'p> {
    params: &'p [Tensor],
    saved: Vec<ArrayD<TensorData>>,
    phase: Phase,
}

impl<'p> LookAhead<'p> {
    /// Writes `points` into `params`, keeping the current values.
    ///
    /// Every point is checked against its parameter before the first write.
    pub fn perturb(
        params: &'p [Tensor],
        points: Vec<ArrayD<TensorData>>,
    ) -> Result<Self, OptimError> {
        if points.len() != params.len() {
            return Err(OptimError::IncompatibleState(format!(
                "{} look-ahead point(s) for {} parameter(s)",
                points.len(),
                params.len()
            )));
        }
        for (point, param) in points.iter().zip(params) {
            ensure_same_shape(param.shape(), point.shape())?;
        }
        let saved = params
            .iter()
            .zip(points)
            .map(|(param, point)| param.replace_data(point))
            .collect();
        trace!("look-ahead: perturbed {} parameter(s)", params.len());
        Ok(LookAhead {
            params,
            saved,
            phase: Phase::Perturbed,
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Runs the gradient source once, at the look-ahead points.
    pub fn differentiate(
        &mut self,
        loss: Loss<'_>,
        tape: Option<&mut dyn GradientTape>,
    ) -> Result<Vec<ArrayD<TensorData>>, OptimError> {
        let grads = raw_gradients(loss, self.params, tape)?;
        self.phase = Phase::Differentiated;
        Ok(grads)
    }

    pub fn restore(mut self) {
        self.restore_saved();
    }

    fn restore_saved(&mut self) {
        if self.phase == Phase::Restored {
            return;
        }
        // Reverse order so a parameter listed twice ends with its original value.
        for (param, saved) in self.params.iter().zip(self.saved.drain(..)).rev() {
            param.replace_data(saved);
        }
        self.phase = Phase::Restored;
    }
}

impl Drop for LookAhead<'_> {
    fn drop(&mut self) {
        if self.phase != Phase::Restored {
            warn!(
                "look-ahead: restoring parameters left in the {:?} phase",
                self.phase
            );
            self.restore_saved();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::{full, Tensor};
    use approx::assert_abs_diff_eq;
    use ndarray::arr1;

    fn squared_distance(params: &[Tensor]) -> TensorData {
        params[0].data().iter().map(|&w| (w - 3.0) * (w - 3.0)).sum()
    }

    #[test]
    fn finite_difference_matches_analytic_gradient() {
        let w = Tensor::new(arr1(&[1.0, 2.0]).into_dyn());
        let params = [w.clone()];
        let grads = FiniteDifference::new(&squared_distance)
            .gradient(&params)
            .unwrap();
        assert_abs_diff_eq!(grads[0][[0]], -4.0, epsilon = 1e-2);
        assert_abs_diff_eq!(grads[0][[1]], -2.0, epsilon = 1e-2);
        assert_eq!(w.to_vec(), vec![1.0, 2.0]);
    }

    #[test]
    fn value_loss_without_tape_is_rejected() {
        let params = [full(&[1], 1.0)];
        let err = gradients(Loss::Value(0.5), &params, None).unwrap_err();
        assert!(matches!(err, OptimError::MissingTape { .. }));
    }

    #[test]
    fn wrong_gradient_count_is_rejected() {
        let params = [full(&[1], 1.0), full(&[1], 2.0)];
        let mut tape = |_: &[Tensor]| -> Result<Vec<ArrayD<TensorData>>, OptimError> {
            Ok(vec![ArrayD::zeros(IxDyn(&[1]))])
        };
        let err = gradients(Loss::Value(0.0), &params, Some(&mut tape)).unwrap_err();
        assert!(matches!(
            err,
            OptimError::GradientCount {
                expected: 2,
                got: 1
            }
        ));
    }

    #[test]
    fn look_ahead_restores_after_tape_error() {
        let w = full(&[2], 1.0);
        let params = [w.clone()];
        let mut seen = Vec::new();
        let mut tape = |params: &[Tensor]| -> Result<Vec<ArrayD<TensorData>>, OptimError> {
            seen = params[0].to_vec();
            Err(OptimError::IncompatibleState("tape failed".to_string()))
        };
        let points = vec![ArrayD::from_elem(IxDyn(&[2]), 5.0)];
        let result = look_ahead_gradients(Loss::Value(0.0), &params, Some(&mut tape), points);
        assert!(result.is_err());
        assert_eq!(seen, vec![5.0, 5.0]);
        assert_eq!(w.to_vec(), vec![1.0, 1.0]);
    }

    #[test]
    fn guard_walks_through_phases() {
        let w = full(&[1], 2.0);
        let params = [w.clone()];
        let mut look_ahead =
            LookAhead::perturb(&params, vec![ArrayD::from_elem(IxDyn(&[1]), 4.0)]).unwrap();
        assert_eq!(look_ahead.phase(), Phase::Perturbed);
        assert_eq!(w.to_vec(), vec![4.0]);

        let mut tape = |params: &[Tensor]| -> Result<Vec<ArrayD<TensorData>>, OptimError> {
            Ok(params.iter().map(|p| p.data_clone()).collect())
        };
        let grads = look_ahead.differentiate(Loss::Value(0.0), Some(&mut tape)).unwrap();
        assert_eq!(look_ahead.phase(), Phase::Differentiated);
        assert_eq!(grads[0][[0]], 4.0);

        look_ahead.restore();
        assert_eq!(w.to_vec(), vec![2.0]);
    }

    #[test]
    fn perturb_rejects_mismatched_points_without_writing() {
        let a = full(&[1], 1.0);
        let b = full(&[2], 1.0);
        let params = [a.clone(), b.clone()];
        let points = vec![
            ArrayD::from_elem(IxDyn(&[1]), 9.0),
            ArrayD::from_elem(IxDyn(&[3]), 9.0),
        ];
        assert!(LookAhead::perturb(&params, points).is_err());
        assert_eq!(a.to_vec(), vec![1.0]);
    }
}
