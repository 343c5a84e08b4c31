//! # Tensor Operations
//!
//! Elementwise helpers shared by the update rules. The rules themselves run
//! their recurrences through `ndarray::Zip`; what lives here is the part more
//! than one rule needs.

use super::{TensorData, TensorError};
use ndarray::{ArrayD, Zip};

/// Fails with `ShapeMismatch` unless `got` equals `expected`.
/// No broadcasting: optimizer state always has exactly the parameter's shape.
pub fn ensure_same_shape(expected: &[usize], got: &[usize]) -> Result<(), TensorError> {
    if expected != got {
        return Err(TensorError::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        });
    }
    Ok(())
}

/// The point momentum alone would carry `current` to: `w + mu * (w - past)`.
pub fn look_ahead_point(
    current: &ArrayD<TensorData>,
    past: &ArrayD<TensorData>,
    mu: TensorData,
) -> Result<ArrayD<TensorData>, TensorError> {
    ensure_same_shape(current.shape(), past.shape())?;
    Ok(Zip::from(current)
        .and(past)
        .map_collect(|&w, &p| w + mu * (w - p)))
}

/// `1 - beta^t` for the step that follows `completed` finished steps.
///
/// The first step uses `t = 1`.
pub fn bias_correction(beta: TensorData, completed: u64) -> TensorData {
    1.0 - beta.powf((completed + 1) as TensorData)
}
