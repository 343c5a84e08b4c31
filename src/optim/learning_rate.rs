//! Learning rates: a constant, or a function of the number of completed steps.

use std::fmt;
use std::sync::Arc;

use crate::tensor::TensorData;

#[derive(Clone)]
pub enum LearningRate {
    Constant(TensorData),
    /// Evaluated with the number of completed steps, starting at 0.
    Scheduled(Arc<dyn Fn(u64) -> TensorData + Send + Sync>),
}

impl LearningRate {
    pub fn scheduled<F>(schedule: F) -> Self
    where
        F: Fn(u64) -> TensorData + Send + Sync + 'static,
    {
        LearningRate::Scheduled(Arc::new(schedule))
    }

    pub fn at(&self, iteration: u64) -> TensorData {
        match self {
            LearningRate::Constant(lr) => *lr,
            LearningRate::Scheduled(schedule) => schedule(iteration),
        }
    }
}

impl From<TensorData> for LearningRate {
    fn from(lr: TensorData) -> Self {
        LearningRate::Constant(lr)
    }
}

impl fmt::Debug for LearningRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LearningRate::Constant(lr) => f.debug_tuple("Constant").field(lr).finish(),
            LearningRate::Scheduled(_) => f.write_str("Scheduled(..)"),
        }
    }
}
