//! # Optimizer Configuration
//!
//! Hyperparameters per optimizer, with defaults, validation and JSON input.
//! Every field is optional in the serialized form:
//!
//! ```json
//! { "optimizer": "adam", "learning_rate": 0.0005 }
//! ```

use serde::{Deserialize, Serialize};

use super::{
    AdaBelief, AdaGrad, Adam, Indian, Momentum, Nadian, OptimError, Optimizer, RMSprop, NAG, SGD,
};
use crate::tensor::TensorData;

// --- Validation helpers ---

fn finite(name: &'static str, value: TensorData) -> Result<(), OptimError> {
    if !value.is_finite() {
        return Err(OptimError::InvalidHyperparameter {
            name,
            value,
            reason: "must be finite",
        });
    }
    Ok(())
}

fn non_negative(name: &'static str, value: TensorData) -> Result<(), OptimError> {
    finite(name, value)?;
    if value < 0.0 {
        return Err(OptimError::InvalidHyperparameter {
            name,
            value,
            reason: "must be >= 0",
        });
    }
    Ok(())
}

fn positive(name: &'static str, value: TensorData) -> Result<(), OptimError> {
    finite(name, value)?;
    if value <= 0.0 {
        return Err(OptimError::InvalidHyperparameter {
            name,
            value,
            reason: "must be > 0",
        });
    }
    Ok(())
}

fn decay_rate(name: &'static str, value: TensorData) -> Result<(), OptimError> {
    if !(0.0..1.0).contains(&value) {
        return Err(OptimError::InvalidHyperparameter {
            name,
            value,
            reason: "must be in [0, 1)",
        });
    }
    Ok(())
}

// --- Per-optimizer configs ---

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SgdConfig {
    pub learning_rate: TensorData,
}

impl Default for SgdConfig {
    fn default() -> Self {
        SgdConfig {
            learning_rate: 0.01,
        }
    }
}

impl SgdConfig {
    pub fn validate(&self) -> Result<(), OptimError> {
        non_negative("learning_rate", self.learning_rate)
    }
}

/// Options of [`Momentum`] and [`NAG`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumConfig {
    pub learning_rate: TensorData,
    pub mu: TensorData,
}

impl Default for MomentumConfig {
    fn default() -> Self {
        MomentumConfig {
            learning_rate: 0.01,
            mu: 0.9,
        }
    }
}

impl MomentumConfig {
    pub fn validate(&self) -> Result<(), OptimError> {
        non_negative("learning_rate", self.learning_rate)?;
        decay_rate("mu", self.mu)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaGradConfig {
    pub learning_rate: TensorData,
    pub epsilon: TensorData,
}

impl Default for AdaGradConfig {
    fn default() -> Self {
        AdaGradConfig {
            learning_rate: 0.001,
            epsilon: 1e-5,
        }
    }
}

impl AdaGradConfig {
    pub fn validate(&self) -> Result<(), OptimError> {
        non_negative("learning_rate", self.learning_rate)?;
        positive("epsilon", self.epsilon)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RmsPropConfig {
    pub learning_rate: TensorData,
    pub rho: TensorData,
    pub epsilon: TensorData,
}

impl Default for RmsPropConfig {
    fn default() -> Self {
        RmsPropConfig {
            learning_rate: 0.001,
            rho: 0.9,
            epsilon: 1e-7,
        }
    }
}

impl RmsPropConfig {
    pub fn validate(&self) -> Result<(), OptimError> {
        non_negative("learning_rate", self.learning_rate)?;
        decay_rate("rho", self.rho)?;
        positive("epsilon", self.epsilon)
    }
}

/// Options of [`Adam`] and [`AdaBelief`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdamConfig {
    pub learning_rate: TensorData,
    pub beta_1: TensorData,
    pub beta_2: TensorData,
    pub epsilon: TensorData,
}

impl Default for AdamConfig {
    fn default() -> Self {
        AdamConfig {
            learning_rate: 0.001,
            beta_1: 0.9,
            beta_2: 0.999,
            epsilon: 1e-7,
        }
    }
}

impl AdamConfig {
    pub fn validate(&self) -> Result<(), OptimError> {
        non_negative("learning_rate", self.learning_rate)?;
        decay_rate("beta_1", self.beta_1)?;
        decay_rate("beta_2", self.beta_2)?;
        positive("epsilon", self.epsilon)
    }
}

/// Which parameter value drives the `y` update of [`Indian`] and [`Nadian`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndianUpdate {
    /// The value before this step's update.
    #[default]
    PreUpdate,
    /// The value this step just wrote.
    PostUpdate,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndianConfig {
    pub learning_rate: TensorData,
    pub alpha: TensorData,
    pub beta: TensorData,
    pub update: IndianUpdate,
}

impl Default for IndianConfig {
    fn default() -> Self {
        IndianConfig {
            learning_rate: 0.001,
            alpha: 1.0,
            beta: 1.5,
            update: IndianUpdate::PreUpdate,
        }
    }
}

impl IndianConfig {
    pub fn validate(&self) -> Result<(), OptimError> {
        non_negative("learning_rate", self.learning_rate)?;
        finite("alpha", self.alpha)?;
        positive("beta", self.beta)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NadianConfig {
    pub learning_rate: TensorData,
    pub alpha: TensorData,
    pub beta: TensorData,
    pub mu: TensorData,
    pub update: IndianUpdate,
}

impl Default for NadianConfig {
    fn default() -> Self {
        NadianConfig {
            learning_rate: 0.001,
            alpha: 1.0,
            beta: 1.5,
            mu: 0.9,
            update: IndianUpdate::PreUpdate,
        }
    }
}

impl NadianConfig {
    pub fn validate(&self) -> Result<(), OptimError> {
        non_negative("learning_rate", self.learning_rate)?;
        finite("alpha", self.alpha)?;
        positive("beta", self.beta)?;
        decay_rate("mu", self.mu)
    }
}

// --- Tagged config ---

/// Any optimizer's configuration, tagged by the `optimizer` field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "optimizer", rename_all = "lowercase")]
pub enum OptimizerConfig {
    Sgd(SgdConfig),
    Momentum(MomentumConfig),
    Nag(MomentumConfig),
    AdaGrad(AdaGradConfig),
    RmsProp(RmsPropConfig),
    Adam(AdamConfig),
    AdaBelief(AdamConfig),
    Indian(IndianConfig),
    Nadian(NadianConfig),
}

impl OptimizerConfig {
    pub fn from_json(json: &str) -> Result<Self, OptimError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, OptimError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validates and constructs the configured optimizer.
    pub fn build(&self) -> Result<Box<dyn Optimizer>, OptimError> {
        Ok(match *self {
            OptimizerConfig::Sgd(config) => Box::new(SGD::new(config)?),
            OptimizerConfig::Momentum(config) => Box::new(Momentum::new(config)?),
            OptimizerConfig::Nag(config) => Box::new(NAG::new(config)?),
            OptimizerConfig::AdaGrad(config) => Box::new(AdaGrad::new(config)?),
            OptimizerConfig::RmsProp(config) => Box::new(RMSprop::new(config)?),
            OptimizerConfig::Adam(config) => Box::new(Adam::new(config)?),
            OptimizerConfig::AdaBelief(config) => Box::new(AdaBelief::new(config)?),
            OptimizerConfig::Indian(config) => Box::new(Indian::new(config)?),
            OptimizerConfig::Nadian(config) => Box::new(Nadian::new(config)?),
        })
    }
}
