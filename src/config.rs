//! Model configuration and learning-rate schedules.
//!
//! `ModelConfig` is read-only after construction except for the learning
//! rate, which decays once per completed epoch according to the selected
//! schedule. Defaults match the MNIST digit-classifier setup.

use std::str::FromStr;

use crate::{ActivationKind, Error, PoolingKind, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Rule by which the step size changes across epochs.
pub enum LrSchedule {
    #[default]
    Constant,
    Logarithmic,
    Linear,
}

impl LrSchedule {
    /// Rate for the next epoch, given the just-completed epoch index.
    pub fn next_rate(self, rate: f64, epoch: usize, total_epochs: usize) -> f64 {
        match self {
            LrSchedule::Constant => rate,
            LrSchedule::Logarithmic => rate / (1 + epoch) as f64,
            LrSchedule::Linear => rate * (1.0 - epoch as f64 / total_epochs as f64),
        }
    }
}

impl FromStr for LrSchedule {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "constant" => Ok(LrSchedule::Constant),
            "logarithmic" => Ok(LrSchedule::Logarithmic),
            "linear" => Ok(LrSchedule::Linear),
            other => Err(Error::UnsupportedSchedule(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub epochs: usize,
    /// Training samples consumed per epoch.
    pub epoch_size: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub schedule: LrSchedule,
    /// Widths of the hidden layers, input to output order. May be empty.
    pub hidden_layers: Vec<usize>,
    pub activation: ActivationKind,
    pub pooling: PoolingKind,
    /// Grid width of one raw sample, used by 2D pooling.
    pub input_width: usize,
    /// Raw feature count of one sample before pooling.
    pub input_features: usize,
    /// Number of output classes.
    pub output_features: usize,
}

impl Default for ModelConfig {
    /// The MNIST digit-classifier defaults.
    fn default() -> Self {
        Self {
            epochs: 5,
            epoch_size: 1750,
            batch_size: 1,
            learning_rate: 0.1,
            schedule: LrSchedule::Constant,
            hidden_layers: Vec::new(),
            activation: ActivationKind::ReLU,
            pooling: PoolingKind::Identity,
            input_width: 28,
            input_features: 784,
            output_features: 10,
        }
    }
}

impl ModelConfig {
    /// Fail-fast validation, run before any layer is allocated.
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(Error::InvalidConfig("epochs must be > 0".to_owned()));
        }
        if self.batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be > 0".to_owned()));
        }
        if self.epoch_size < self.batch_size {
            return Err(Error::InvalidConfig(format!(
                "epoch_size {} must be at least batch_size {}",
                self.epoch_size, self.batch_size
            )));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(Error::InvalidConfig(
                "learning rate must be finite and > 0".to_owned(),
            ));
        }
        if self.input_features == 0 || self.output_features == 0 {
            return Err(Error::InvalidConfig(
                "input and output feature counts must be > 0".to_owned(),
            ));
        }
        if self.hidden_layers.contains(&0) {
            return Err(Error::InvalidConfig(
                "all hidden layer widths must be > 0".to_owned(),
            ));
        }
        if self.pooling == PoolingKind::Linear2dMean {
            if self.input_width == 0 {
                return Err(Error::InvalidConfig(
                    "2D pooling requires input_width > 0".to_owned(),
                ));
            }
            if self.input_features % self.input_width != 0 {
                return Err(Error::InvalidConfig(format!(
                    "input_width {} does not divide input_features {}",
                    self.input_width, self.input_features
                )));
            }
        }
        Ok(())
    }
}
