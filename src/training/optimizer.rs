//! Optimizer selection
//!
//! Maps the optimizer kinds the convergence checks accept onto `burn::optim`
//! configurations. Defaults follow the classic image-training recipe:
//! momentum 0.9, weight decay 1e-6 and element-wise gradient clipping at 10.

use std::fmt;
use std::str::FromStr;

use burn::{
    grad_clipping::GradientClippingConfig,
    module::AutodiffModule,
    optim::{decay::WeightDecayConfig, momentum::MomentumConfig, AdamConfig, Optimizer, SgdConfig},
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::utils::error::{DeepWaterError, Result};

/// Optimizer families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    /// SGD with momentum
    #[default]
    Momentum,
    /// Plain SGD
    Sgd,
    Adam,
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizerKind::Momentum => write!(f, "momentum"),
            OptimizerKind::Sgd => write!(f, "sgd"),
            OptimizerKind::Adam => write!(f, "adam"),
        }
    }
}

impl FromStr for OptimizerKind {
    type Err = DeepWaterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "momentum" | "momentumoptimizer" => Ok(OptimizerKind::Momentum),
            "sgd" | "gradientdescent" => Ok(OptimizerKind::Sgd),
            "adam" | "adamoptimizer" => Ok(OptimizerKind::Adam),
            other => Err(DeepWaterError::Config(format!(
                "unknown optimizer '{other}' (expected momentum, sgd or adam)"
            ))),
        }
    }
}

/// Hyperparameters shared by every optimizer kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerSettings {
    /// Momentum factor (momentum optimizer only)
    pub momentum: f64,
    /// L2 penalty
    pub weight_decay: f32,
    /// Clip each gradient element to `[-c, c]`; `None` disables clipping
    pub clip_gradient: Option<f32>,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            momentum: 0.9,
            weight_decay: 1e-6,
            clip_gradient: Some(10.0),
        }
    }
}

impl OptimizerSettings {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.momentum) {
            return Err(DeepWaterError::Config(format!(
                "momentum {} must be in range [0.0, 1.0)",
                self.momentum
            )));
        }
        if self.weight_decay < 0.0 {
            return Err(DeepWaterError::Config(format!(
                "weight decay {} must not be negative",
                self.weight_decay
            )));
        }
        if let Some(clip) = self.clip_gradient {
            if clip <= 0.0 {
                return Err(DeepWaterError::Config(format!(
                    "gradient clip {clip} must be positive"
                )));
            }
        }
        Ok(())
    }

    fn weight_decay_config(&self) -> Option<WeightDecayConfig> {
        (self.weight_decay > 0.0).then(|| WeightDecayConfig::new(self.weight_decay))
    }

    fn clipping_config(&self) -> Option<GradientClippingConfig> {
        self.clip_gradient.map(GradientClippingConfig::Value)
    }

    pub fn sgd_config(&self) -> SgdConfig {
        SgdConfig::new()
            .with_weight_decay(self.weight_decay_config())
            .with_gradient_clipping(self.clipping_config())
    }

    pub fn momentum_config(&self) -> SgdConfig {
        self.sgd_config().with_momentum(Some(
            MomentumConfig::new()
                .with_momentum(self.momentum)
                .with_dampening(0.0),
        ))
    }

    pub fn adam_config(&self) -> AdamConfig {
        AdamConfig::new()
            .with_weight_decay(self.weight_decay_config())
            .with_grad_clipping(self.clipping_config())
    }
}

/// SGD with momentum
pub fn momentum_optimizer<B, M>(settings: &OptimizerSettings) -> impl Optimizer<M, B>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    settings.momentum_config().init()
}

/// Plain SGD
pub fn sgd_optimizer<B, M>(settings: &OptimizerSettings) -> impl Optimizer<M, B>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    settings.sgd_config().init()
}

/// Adam
pub fn adam_optimizer<B, M>(settings: &OptimizerSettings) -> impl Optimizer<M, B>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    settings.adam_config().init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = OptimizerSettings::default();
        assert_eq!(settings.momentum, 0.9);
        assert_eq!(settings.weight_decay, 1e-6);
        assert_eq!(settings.clip_gradient, Some(10.0));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_momentum_config() {
        let config = OptimizerSettings::default().momentum_config();
        let momentum = config.momentum.unwrap();
        assert_eq!(momentum.momentum, 0.9);
        assert_eq!(momentum.dampening, 0.0);
        assert!(config.weight_decay.is_some());
        assert!(config.gradient_clipping.is_some());
    }

    #[test]
    fn test_sgd_has_no_momentum() {
        let settings = OptimizerSettings {
            weight_decay: 0.0,
            clip_gradient: None,
            ..Default::default()
        };
        let config = settings.sgd_config();
        assert!(config.momentum.is_none());
        assert!(config.weight_decay.is_none());
        assert!(config.gradient_clipping.is_none());
    }

    #[test]
    fn test_invalid_settings() {
        let settings = OptimizerSettings {
            momentum: 1.0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());

        let settings = OptimizerSettings {
            clip_gradient: Some(0.0),
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_optimizer_kind_parse() {
        assert_eq!(
            "MomentumOptimizer".parse::<OptimizerKind>().unwrap(),
            OptimizerKind::Momentum
        );
        assert_eq!("adam".parse::<OptimizerKind>().unwrap(), OptimizerKind::Adam);
        assert!("rmsprop".parse::<OptimizerKind>().is_err());
        assert_eq!(OptimizerKind::default(), OptimizerKind::Momentum);
    }
}
