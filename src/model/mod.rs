//! Model module for image classifiers built with the Burn framework
//!
//! Every model here is a fixed stack of Burn layers behind the same
//! accessor surface:
//! - `inputs`: the shape of the flat input handle `[batch, width * height * channels]`
//! - `logits`: unnormalized class scores from the final dense layer
//! - `predictions`: softmax over logits, or the raw score for a single output
//! - `number_of_classes` and `name`
//!
//! Networks can also be resolved by preset name through [`Network`].

pub mod config;
pub mod inception;
pub mod lenet;
pub mod mlp;
pub mod network;

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use burn::{
    module::Module,
    tensor::{activation, backend::Backend, Tensor},
};
use serde::{Deserialize, Serialize};

use crate::utils::error::{DeepWaterError, Result};

pub use config::{LeNetConfig, MlpConfig};
pub use inception::InceptionV3;
pub use lenet::LeNet;
pub use mlp::Mlp;
pub use network::{Network, NetworkPreset};

/// Shape of one input image.
///
/// Inputs are fed as flat rows of `width * height * channels` floats laid
/// out channel-major (all of channel 0 row by row, then channel 1, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputShape {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
}

impl InputShape {
    pub fn new(width: usize, height: usize, channels: usize) -> Self {
        Self {
            width,
            height,
            channels,
        }
    }

    /// Square image of side `dim`
    pub fn square(dim: usize, channels: usize) -> Self {
        Self::new(dim, dim, channels)
    }

    /// Number of floats in one flattened image
    pub fn size(&self) -> usize {
        self.width * self.height * self.channels
    }

    /// Reject shapes whose sides are below `min_side`, that have no channels,
    /// or whose flattened size does not fit in a `usize`
    pub fn validate(&self, model: &str, min_side: usize) -> Result<()> {
        if self.channels == 0 {
            return Err(DeepWaterError::Model(format!(
                "{model}: input must have at least one channel"
            )));
        }
        if self.width < min_side || self.height < min_side {
            return Err(DeepWaterError::Model(format!(
                "{model}: input {}x{} is smaller than the minimum {min_side}x{min_side}",
                self.width, self.height
            )));
        }
        self.width
            .checked_mul(self.height)
            .and_then(|area| area.checked_mul(self.channels))
            .ok_or_else(|| DeepWaterError::Model(format!("{model}: input {self} is too large")))?;
        Ok(())
    }
}

impl std::fmt::Display for InputShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.channels)
    }
}

/// Supported hidden-layer activations
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Tanh,
    Relu,
}

impl Activation {
    pub fn apply<B: Backend, const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        match self {
            Activation::Tanh => activation::tanh(x),
            Activation::Relu => activation::relu(x),
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "tanh" => Ok(Activation::Tanh),
            "relu" => Ok(Activation::Relu),
            other => Err(DeepWaterError::Config(format!(
                "unknown activation '{other}' (expected tanh or relu)"
            ))),
        }
    }
}

impl Default for Activation {
    fn default() -> Self {
        Self::Tanh
    }
}

/// Logits and predictions from one forward pass
#[derive(Debug, Clone)]
pub struct ModelOutput<B: Backend> {
    /// `[batch, classes]`
    pub logits: Tensor<B, 2>,
    /// `[batch, classes]`, rows sum to one when `classes > 1`
    pub predictions: Tensor<B, 2>,
}

/// Softmax over the class axis, or identity for a single output
pub fn predictions_from_logits<B: Backend>(logits: Tensor<B, 2>, classes: usize) -> Tensor<B, 2> {
    if classes > 1 {
        activation::softmax(logits, 1)
    } else {
        logits
    }
}

/// Accessor surface shared by every classifier
pub trait ImageClassifier<B: Backend>: Module<B> {
    /// Architecture name
    fn name(&self) -> &'static str;

    fn number_of_classes(&self) -> usize;

    /// Shape of the flat input handle
    fn inputs(&self) -> InputShape;

    /// Unnormalized class scores for a `[batch, inputs().size()]` input
    fn logits(&self, input: Tensor<B, 2>) -> Tensor<B, 2>;

    /// Variable-scope names in the order the graph is assembled
    fn layers(&self) -> Vec<&'static str>;

    /// Activations of the layer named `scope`, flattened to
    /// `[batch, features]`, or `None` if no layer has that name
    fn layer_output(&self, input: Tensor<B, 2>, scope: &str) -> Option<Tensor<B, 2>>;

    /// Hyperparameters needed to rebuild the architecture
    fn hyperparameters(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    fn predictions(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        predictions_from_logits(self.logits(input), self.number_of_classes())
    }

    fn forward(&self, input: Tensor<B, 2>) -> ModelOutput<B> {
        let logits = self.logits(input);
        let predictions = predictions_from_logits(logits.clone(), self.number_of_classes());
        ModelOutput {
            logits,
            predictions,
        }
    }

    /// Extra per-step training inputs; none of these models need any
    fn train_dict(&self) -> HashMap<String, f32> {
        HashMap::new()
    }

    fn descriptor(&self) -> ModelDescriptor {
        let inputs = self.inputs();
        ModelDescriptor {
            name: self.name().to_string(),
            number_of_classes: self.number_of_classes(),
            inputs,
            input_size: inputs.size(),
            layers: self.layers().into_iter().map(String::from).collect(),
            num_params: self.num_params(),
            hyperparameters: self.hyperparameters(),
        }
    }
}

/// Classifiers that can be built from an input shape and a class count.
///
/// The convergence harness is generic over this trait, the way a test picks
/// a model class and lets the harness construct it.
pub trait BuildImageClassifier<B: Backend>: ImageClassifier<B> + Sized {
    /// Smallest spatial side the architecture accepts
    const MIN_SIDE: usize = 1;

    fn build(input: InputShape, num_classes: usize, device: &B::Device) -> Result<Self>;
}

/// Serializable description of a built model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelDescriptor {
    pub name: String,
    pub number_of_classes: usize,
    pub inputs: InputShape,
    pub input_size: usize,
    pub layers: Vec<String>,
    pub num_params: usize,
    #[serde(default)]
    pub hyperparameters: serde_json::Value,
}

impl ModelDescriptor {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read a description written by [`ModelDescriptor::to_json`]
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

pub(crate) fn check_classes(model: &str, num_classes: usize) -> Result<()> {
    if num_classes == 0 {
        return Err(DeepWaterError::Model(format!(
            "{model}: number of classes must be at least 1"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::TensorData;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_input_shape_size() {
        assert_eq!(InputShape::new(28, 28, 1).size(), 784);
        assert_eq!(InputShape::square(32, 3).size(), 3072);
        assert_eq!(InputShape::new(32, 16, 3).to_string(), "32x16x3");
    }

    #[test]
    fn test_input_shape_validate() {
        assert!(InputShape::square(28, 1).validate("LeNet", 4).is_ok());
        assert!(InputShape::square(3, 1).validate("LeNet", 4).is_err());
        assert!(InputShape::square(28, 0).validate("LeNet", 4).is_err());
    }

    #[test]
    fn test_input_shape_validate_overflow() {
        let shape = InputShape::new(usize::MAX, 2, 1);
        assert!(matches!(
            shape.validate("MLP", 1),
            Err(DeepWaterError::Model(_))
        ));

        let shape = InputShape::new(1 << 32, 1 << 16, 1 << 16);
        assert!(shape.validate("MLP", 1).is_err());
    }

    #[test]
    fn test_descriptor_without_hyperparameters() {
        let json = r#"{
            "name": "InceptionV3",
            "number_of_classes": 3,
            "inputs": {"width": 75, "height": 75, "channels": 3},
            "input_size": 16875,
            "layers": [],
            "num_params": 0
        }"#;
        let descriptor = ModelDescriptor::from_json(json).unwrap();
        assert_eq!(descriptor.inputs, InputShape::square(75, 3));
        assert!(descriptor.hyperparameters.is_null());

        assert!(ModelDescriptor::from_json("{}").is_err());
    }

    #[test]
    fn test_activation_parse() {
        assert_eq!(Activation::parse("TANH").unwrap(), Activation::Tanh);
        assert_eq!(Activation::parse("relu").unwrap(), Activation::Relu);
        assert!(Activation::parse("gelu").is_err());
    }

    #[test]
    fn test_activation_apply() {
        let device = Default::default();
        let x = Tensor::<TestBackend, 1>::from_floats([-1.0, 0.0, 2.0], &device);

        let relu: Vec<f32> = Activation::Relu.apply(x.clone()).into_data().to_vec().unwrap();
        assert_eq!(relu, vec![0.0, 0.0, 2.0]);

        let tanh: Vec<f32> = Activation::Tanh.apply(x).into_data().to_vec().unwrap();
        assert!((tanh[0] + 0.7616).abs() < 1e-3);
        assert!(tanh[1].abs() < 1e-6);
    }

    #[test]
    fn test_predictions_single_output_is_identity() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::from_data(
            TensorData::new(vec![3.5f32, -2.0], [2, 1]),
            &device,
        );
        let preds: Vec<f32> = predictions_from_logits(logits, 1)
            .into_data()
            .to_vec()
            .unwrap();
        assert_eq!(preds, vec![3.5, -2.0]);
    }

    #[test]
    fn test_predictions_softmax_rows_sum_to_one() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::from_data(
            TensorData::new(vec![1.0f32, 2.0, 3.0, 0.0, 0.0, 0.0], [2, 3]),
            &device,
        );
        let preds: Vec<f32> = predictions_from_logits(logits, 3)
            .into_data()
            .to_vec()
            .unwrap();
        for row in preds.chunks(3) {
            assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        }
        assert!((preds[3] - 1.0 / 3.0).abs() < 1e-5);
    }
}
