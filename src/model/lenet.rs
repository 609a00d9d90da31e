//! LeNet
//!
//! reshape → conv(5×5, 20) → pool → conv(5×5, 50) → pool → flatten →
//! dense(500) → dense(classes) → softmax

use burn::{
    module::{Ignored, Module},
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Initializer, Linear, LinearConfig, PaddingConfig2d,
    },
    tensor::{backend::Backend, Tensor},
};

use super::{
    check_classes, Activation, BuildImageClassifier, ImageClassifier, InputShape, LeNetConfig,
};
use crate::utils::error::Result;

const NAME: &str = "LeNet";

/// Two 2×2 stride-2 poolings shrink each side by four
pub(crate) const MIN_SIDE: usize = 4;

const LAYERS: [&str; 6] = ["reshape1", "conv1", "conv2", "reshape2", "fc1", "fc2"];

/// LeNet convolutional classifier
#[derive(Module, Debug)]
pub struct LeNet<B: Backend> {
    conv1: Conv2d<B>,
    pool1: MaxPool2d,
    conv2: Conv2d<B>,
    pool2: MaxPool2d,
    fc1: Linear<B>,
    fc2: Linear<B>,
    config: Ignored<LeNetConfig>,
    width: usize,
    height: usize,
    channels: usize,
    flatten_size: usize,
    num_classes: usize,
}

impl LeNetConfig {
    /// Build a LeNet for `input` images and `num_classes` outputs
    pub fn init<B: Backend>(
        &self,
        input: InputShape,
        num_classes: usize,
        device: &B::Device,
    ) -> Result<LeNet<B>> {
        check_classes(NAME, num_classes)?;
        input.validate(NAME, MIN_SIDE)?;

        let init = Initializer::XavierUniform { gain: 1.0 };
        let kernel = [self.kernel_size, self.kernel_size];

        let conv1 = Conv2dConfig::new([input.channels, self.conv1_features], kernel)
            .with_padding(PaddingConfig2d::Same)
            .with_initializer(init.clone())
            .init(device);
        let conv2 = Conv2dConfig::new([self.conv1_features, self.conv2_features], kernel)
            .with_padding(PaddingConfig2d::Same)
            .with_initializer(init.clone())
            .init(device);

        let flatten_size = self.flatten_size(input);

        let fc1 = LinearConfig::new(flatten_size, self.hidden_units)
            .with_initializer(init.clone())
            .init(device);
        let fc2 = LinearConfig::new(self.hidden_units, num_classes)
            .with_initializer(init)
            .init(device);

        Ok(LeNet {
            conv1,
            pool1: max_pool_2x2(),
            conv2,
            pool2: max_pool_2x2(),
            fc1,
            fc2,
            config: Ignored(self.clone()),
            width: input.width,
            height: input.height,
            channels: input.channels,
            flatten_size,
            num_classes,
        })
    }

    /// Features entering `fc1`: both same-padded convolutions keep the
    /// spatial size, each pooling halves it (rounding down)
    pub fn flatten_size(&self, input: InputShape) -> usize {
        self.conv2_features * (input.height / 2 / 2) * (input.width / 2 / 2)
    }
}

fn max_pool_2x2() -> MaxPool2d {
    MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init()
}

impl<B: Backend> LeNet<B> {
    /// Build with the default configuration (tanh activations)
    pub fn new(input: InputShape, num_classes: usize, device: &B::Device) -> Result<Self> {
        LeNetConfig::new().init(input, num_classes, device)
    }

    pub fn activation(&self) -> Activation {
        self.config.0.activation
    }

    pub fn config(&self) -> &LeNetConfig {
        &self.config.0
    }

    pub fn flatten_size(&self) -> usize {
        self.flatten_size
    }
}

impl<B: Backend> LeNet<B> {
    /// Run the graph up to and including `scope`, flattened per sample.
    /// Anything past `reshape2` keeps going until it matches or reaches `fc2`.
    fn forward_until(&self, input: Tensor<B, 2>, scope: &str) -> Tensor<B, 2> {
        let activation = self.config.0.activation;
        let [batch_size, _] = input.dims();

        let x: Tensor<B, 4> = input.reshape([batch_size, self.channels, self.height, self.width]);
        if scope == "reshape1" {
            return x.flatten(1, 3);
        }

        let x = self.pool1.forward(activation.apply(self.conv1.forward(x)));
        if scope == "conv1" {
            return x.flatten(1, 3);
        }

        let x = self.pool2.forward(activation.apply(self.conv2.forward(x)));
        if scope == "conv2" {
            return x.flatten(1, 3);
        }

        let x: Tensor<B, 2> = x.reshape([batch_size, self.flatten_size]);
        if scope == "reshape2" {
            return x;
        }

        let x = activation.apply(self.fc1.forward(x));
        if scope == "fc1" {
            return x;
        }

        self.fc2.forward(x)
    }
}

impl<B: Backend> ImageClassifier<B> for LeNet<B> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn number_of_classes(&self) -> usize {
        self.num_classes
    }

    fn inputs(&self) -> InputShape {
        InputShape::new(self.width, self.height, self.channels)
    }

    fn logits(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        self.forward_until(input, "fc2")
    }

    fn layers(&self) -> Vec<&'static str> {
        LAYERS.to_vec()
    }

    fn layer_output(&self, input: Tensor<B, 2>, scope: &str) -> Option<Tensor<B, 2>> {
        LAYERS
            .contains(&scope)
            .then(|| self.forward_until(input, scope))
    }

    fn hyperparameters(&self) -> serde_json::Value {
        serde_json::to_value(&self.config.0).unwrap_or_default()
    }
}

impl<B: Backend> BuildImageClassifier<B> for LeNet<B> {
    const MIN_SIDE: usize = MIN_SIDE;

    fn build(input: InputShape, num_classes: usize, device: &B::Device) -> Result<Self> {
        Self::new(input, num_classes, device)
    }
}
