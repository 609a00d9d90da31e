//! Network presets
//!
//! Resolves a preset name to one of the built-in classifiers. The resulting
//! [`Network`] is itself a Burn module, so it can be trained, saved and
//! loaded like any single architecture.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use burn::{
    module::Module,
    tensor::{backend::Backend, Tensor},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::{
    inception, lenet, BuildImageClassifier, ImageClassifier, InceptionV3, InputShape, LeNet,
    LeNetConfig, Mlp, MlpConfig, ModelDescriptor,
};
use crate::utils::error::{DeepWaterError, Result};

/// Named network presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkPreset {
    LeNet,
    InceptionV3,
    Mlp,
    /// Three ReLU layers (1024, 1024, 2048) with input and hidden dropout
    Relu1024Relu1024Relu2048Dropout,
}

impl NetworkPreset {
    pub const ALL: [NetworkPreset; 4] = [
        NetworkPreset::LeNet,
        NetworkPreset::InceptionV3,
        NetworkPreset::Mlp,
        NetworkPreset::Relu1024Relu1024Relu2048Dropout,
    ];

    /// Smallest spatial side the preset accepts
    pub fn min_side(&self) -> usize {
        match self {
            NetworkPreset::LeNet => lenet::MIN_SIDE,
            NetworkPreset::InceptionV3 => inception::MIN_SIDE,
            NetworkPreset::Mlp | NetworkPreset::Relu1024Relu1024Relu2048Dropout => 1,
        }
    }
}

impl fmt::Display for NetworkPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkPreset::LeNet => write!(f, "lenet"),
            NetworkPreset::InceptionV3 => write!(f, "inception_v3"),
            NetworkPreset::Mlp => write!(f, "mlp"),
            NetworkPreset::Relu1024Relu1024Relu2048Dropout => {
                write!(f, "relu_1024_relu_1024_relu_2048_dropout")
            }
        }
    }
}

impl FromStr for NetworkPreset {
    type Err = DeepWaterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "lenet" | "LeNet" => Ok(NetworkPreset::LeNet),
            "inception_v3" | "inceptionV3" | "InceptionV3" => Ok(NetworkPreset::InceptionV3),
            "mlp" | "MLP" => Ok(NetworkPreset::Mlp),
            "relu_1024_relu_1024_relu_2048_dropout" => {
                Ok(NetworkPreset::Relu1024Relu1024Relu2048Dropout)
            }
            other => Err(DeepWaterError::UnsupportedNetwork(other.to_string())),
        }
    }
}

/// Any of the built-in classifiers
#[derive(Module, Debug)]
pub enum Network<B: Backend> {
    LeNet(LeNet<B>),
    InceptionV3(InceptionV3<B>),
    Mlp(Mlp<B>),
}

impl<B: Backend> Network<B> {
    /// Build the network named by `preset`
    pub fn build(
        preset: NetworkPreset,
        input: InputShape,
        num_classes: usize,
        device: &B::Device,
    ) -> Result<Self> {
        let network = match preset {
            NetworkPreset::LeNet => Network::LeNet(LeNet::build(input, num_classes, device)?),
            NetworkPreset::InceptionV3 => {
                Network::InceptionV3(InceptionV3::build(input, num_classes, device)?)
            }
            NetworkPreset::Mlp => Network::Mlp(Mlp::build(input, num_classes, device)?),
            NetworkPreset::Relu1024Relu1024Relu2048Dropout => Network::Mlp(
                MlpConfig::relu_1024_relu_1024_relu_2048_dropout().init(
                    input,
                    num_classes,
                    device,
                )?,
            ),
        };

        tracing::info!(
            "Built {} ({}) for {} input, {} classes, {} parameters",
            network.name(),
            preset,
            input,
            num_classes,
            network.num_params()
        );

        Ok(network)
    }

    /// Resolve `name` and build it; unknown names are an error
    pub fn from_name(
        name: &str,
        input: InputShape,
        num_classes: usize,
        device: &B::Device,
    ) -> Result<Self> {
        Self::build(name.parse()?, input, num_classes, device)
    }

    /// Rebuild the architecture a [`ModelDescriptor`] describes. Parameters
    /// are freshly initialized.
    pub fn from_descriptor(descriptor: &ModelDescriptor, device: &B::Device) -> Result<Self> {
        let input = descriptor.inputs;
        let classes = descriptor.number_of_classes;

        let network = match descriptor.name.as_str() {
            "LeNet" => Network::LeNet(
                hyperparameters::<LeNetConfig>(descriptor)?
                    .unwrap_or_else(LeNetConfig::new)
                    .init(input, classes, device)?,
            ),
            "InceptionV3" => Network::InceptionV3(InceptionV3::new(input, classes, device)?),
            "MLP" => {
                let config = hyperparameters::<MlpConfig>(descriptor)?.ok_or_else(|| {
                    DeepWaterError::Model("MLP description has no hyperparameters".to_string())
                })?;
                Network::Mlp(config.init(input, classes, device)?)
            }
            other => return Err(DeepWaterError::UnsupportedNetwork(other.to_string())),
        };

        if !descriptor.layers.is_empty() && network.layers() != descriptor.layers {
            return Err(DeepWaterError::Model(format!(
                "{} description lists layers {:?}, the rebuilt network has {:?}",
                descriptor.name,
                descriptor.layers,
                network.layers()
            )));
        }

        tracing::info!(
            "Rebuilt {} for {} input, {} classes",
            network.name(),
            input,
            classes
        );
        Ok(network)
    }

    /// Rebuild from a JSON description saved next to the parameters
    pub fn load_description(path: &Path, device: &B::Device) -> Result<Self> {
        Self::from_descriptor(&ModelDescriptor::load(path)?, device)
    }
}

fn hyperparameters<C: DeserializeOwned>(descriptor: &ModelDescriptor) -> Result<Option<C>> {
    if descriptor.hyperparameters.is_null() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_value(
        descriptor.hyperparameters.clone(),
    )?))
}

impl<B: Backend> ImageClassifier<B> for Network<B> {
    fn name(&self) -> &'static str {
        match self {
            Network::LeNet(m) => m.name(),
            Network::InceptionV3(m) => m.name(),
            Network::Mlp(m) => m.name(),
        }
    }

    fn number_of_classes(&self) -> usize {
        match self {
            Network::LeNet(m) => m.number_of_classes(),
            Network::InceptionV3(m) => m.number_of_classes(),
            Network::Mlp(m) => m.number_of_classes(),
        }
    }

    fn inputs(&self) -> InputShape {
        match self {
            Network::LeNet(m) => m.inputs(),
            Network::InceptionV3(m) => m.inputs(),
            Network::Mlp(m) => m.inputs(),
        }
    }

    fn logits(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        match self {
            Network::LeNet(m) => m.logits(input),
            Network::InceptionV3(m) => m.logits(input),
            Network::Mlp(m) => m.logits(input),
        }
    }

    fn layers(&self) -> Vec<&'static str> {
        match self {
            Network::LeNet(m) => m.layers(),
            Network::InceptionV3(m) => m.layers(),
            Network::Mlp(m) => m.layers(),
        }
    }

    fn layer_output(&self, input: Tensor<B, 2>, scope: &str) -> Option<Tensor<B, 2>> {
        match self {
            Network::LeNet(m) => m.layer_output(input, scope),
            Network::InceptionV3(m) => m.layer_output(input, scope),
            Network::Mlp(m) => m.layer_output(input, scope),
        }
    }

    fn hyperparameters(&self) -> serde_json::Value {
        match self {
            Network::LeNet(m) => m.hyperparameters(),
            Network::InceptionV3(m) => m.hyperparameters(),
            Network::Mlp(m) => m.hyperparameters(),
        }
    }
}
