//! Model Configuration Module
//!
//! Hyperparameters for the configurable architectures. InceptionV3 has a
//! fixed topology and needs none.

use burn::config::Config;

use super::Activation;
use crate::utils::error::DeepWaterError;

/// Deepest MLP the layer naming supports
pub const MAX_HIDDEN_LAYERS: usize = 8;

/// Configuration for LeNet
#[derive(Config, Debug)]
pub struct LeNetConfig {
    /// Activation after both convolutions and the hidden dense layer
    #[config(default = "Activation::Tanh")]
    pub activation: Activation,

    /// Square kernel side for both convolutions
    #[config(default = "5")]
    pub kernel_size: usize,

    /// Feature maps of the first convolution
    #[config(default = "20")]
    pub conv1_features: usize,

    /// Feature maps of the second convolution
    #[config(default = "50")]
    pub conv2_features: usize,

    /// Units of the hidden dense layer
    #[config(default = "500")]
    pub hidden_units: usize,
}

/// Configuration for the multi-layer perceptron preset
#[derive(Config, Debug)]
pub struct MlpConfig {
    /// Units of each hidden layer
    pub hidden: Vec<usize>,

    /// Activation of each hidden layer
    pub activations: Vec<Activation>,

    /// Dropout applied to the input
    #[config(default = "0.0")]
    pub input_dropout: f64,

    /// Dropout after each hidden layer; empty means none
    #[config(default = "Vec::new()")]
    pub hidden_dropout: Vec<f64>,
}

impl MlpConfig {
    /// The `relu_1024_relu_1024_relu_2048_dropout` preset
    pub fn relu_1024_relu_1024_relu_2048_dropout() -> Self {
        Self::new(vec![1024, 1024, 2048], vec![Activation::Relu; 3])
            .with_input_dropout(0.1)
            .with_hidden_dropout(vec![0.5, 0.5, 0.5])
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::utils::error::Result<()> {
        if self.hidden.is_empty() {
            return Err(DeepWaterError::Config(
                "MLP needs at least one hidden layer".to_string(),
            ));
        }
        if self.hidden.len() > MAX_HIDDEN_LAYERS {
            return Err(DeepWaterError::Config(format!(
                "MLP supports at most {MAX_HIDDEN_LAYERS} hidden layers, got {}",
                self.hidden.len()
            )));
        }
        if self.hidden.iter().any(|&units| units == 0) {
            return Err(DeepWaterError::Config(
                "MLP hidden layers need at least one unit".to_string(),
            ));
        }
        if self.activations.len() != self.hidden.len() {
            return Err(DeepWaterError::Config(format!(
                "MLP has {} hidden layers but {} activations",
                self.hidden.len(),
                self.activations.len()
            )));
        }
        if !self.hidden_dropout.is_empty() && self.hidden_dropout.len() != self.hidden.len() {
            return Err(DeepWaterError::Config(format!(
                "MLP has {} hidden layers but {} dropout rates",
                self.hidden.len(),
                self.hidden_dropout.len()
            )));
        }
        let rates = std::iter::once(&self.input_dropout).chain(self.hidden_dropout.iter());
        for rate in rates {
            if !(0.0..1.0).contains(rate) {
                return Err(DeepWaterError::Config(format!(
                    "dropout rate {rate} must be in range [0.0, 1.0)"
                )));
            }
        }
        Ok(())
    }

    pub(crate) fn dropout_for(&self, layer: usize) -> f64 {
        self.hidden_dropout.get(layer).copied().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lenet_config_default() {
        let config = LeNetConfig::new();
        assert_eq!(config.activation, Activation::Tanh);
        assert_eq!(config.kernel_size, 5);
        assert_eq!(config.conv1_features, 20);
        assert_eq!(config.conv2_features, 50);
        assert_eq!(config.hidden_units, 500);
    }

    #[test]
    fn test_mlp_preset_is_valid() {
        let config = MlpConfig::relu_1024_relu_1024_relu_2048_dropout();
        assert!(config.validate().is_ok());
        assert_eq!(config.dropout_for(2), 0.5);
    }

    #[test]
    fn test_mlp_validation() {
        let config = MlpConfig::new(vec![], vec![]);
        assert!(config.validate().is_err());

        let config = MlpConfig::new(vec![64, 32], vec![Activation::Relu]);
        assert!(config.validate().is_err());

        let config = MlpConfig::new(vec![64], vec![Activation::Relu]).with_input_dropout(1.5);
        assert!(config.validate().is_err());

        let config = MlpConfig::new(vec![8; 9], vec![Activation::Relu; 9]);
        assert!(config.validate().is_err());

        let config = MlpConfig::new(vec![64], vec![Activation::Tanh]);
        assert!(config.validate().is_ok());
        assert_eq!(config.dropout_for(0), 0.0);
    }
}
