//! # gradstep
//!
//! Gradient-based parameter update rules on `ndarray`: SGD, Momentum,
//! Nesterov (NAG), AdaGrad, RMSprop, Adam, AdaBelief, Indian and Nadian.
//!
//! Parameters are [`Tensor`]s shared with the caller's model. An optimizer
//! registers them once with [`Optimizer::build`], keeps its per-parameter
//! state in slots, and updates the values in place on every step.

pub mod optim;
pub mod tensor;
pub mod utils;

pub use optim::{
    GradientTape, LearningRate, Loss, OptimError, Optimizer, OptimizerConfig, OptimizerState,
};
pub use tensor::{Tensor, TensorError};
