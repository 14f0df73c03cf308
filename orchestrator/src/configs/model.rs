use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

/// How the global model's weights are initialized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParamGenConfig {
    Const { value: f32 },
    Uniform { low: f32, high: f32 },
    Normal { mean: f32, std_dev: f32 },
    /// Fans are taken from the model's dimensions.
    XavierUniform,
    Kaiming,
}

impl Default for ParamGenConfig {
    fn default() -> Self {
        Self::Const { value: 0. }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OptimizerConfig {
    GradientDescent { lr: f32 },
}

impl OptimizerConfig {
    pub fn learning_rate(&self) -> f32 {
        match *self {
            OptimizerConfig::GradientDescent { lr } => lr,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossFnConfig {
    #[default]
    Mse,
}

/// The model every participant trains, and the coordinator evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelConfig {
    LinearRegression {
        x_size: usize,
        y_size: usize,
        batch_size: NonZeroUsize,
        optimizer: OptimizerConfig,
        #[serde(default)]
        init: ParamGenConfig,
        #[serde(default)]
        loss_fn: LossFnConfig,
    },
}

impl ModelConfig {
    /// Returns the `(x_size, y_size)` the model expects from its data.
    pub fn dims(&self) -> (usize, usize) {
        match *self {
            ModelConfig::LinearRegression { x_size, y_size, .. } => (x_size, y_size),
        }
    }
}
