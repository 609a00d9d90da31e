//! Multi-layer perceptron preset
//!
//! flatten → [dropout] → (dense → activation → [dropout]) × N → dense(classes)

use burn::{
    module::{Ignored, Module},
    nn::{Dropout, DropoutConfig, Initializer, Linear, LinearConfig},
    tensor::{backend::Backend, Tensor},
};

use super::config::MAX_HIDDEN_LAYERS;
use super::{
    check_classes, Activation, BuildImageClassifier, ImageClassifier, InputShape, MlpConfig,
};
use crate::utils::error::Result;

const NAME: &str = "MLP";

/// One hidden dense layer with its activation and dropout
#[derive(Module, Debug)]
pub struct HiddenLayer<B: Backend> {
    linear: Linear<B>,
    activation: Ignored<Activation>,
    dropout: Dropout,
}

impl<B: Backend> HiddenLayer<B> {
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.activation.0.apply(self.linear.forward(x));
        self.dropout.forward(x)
    }
}

/// Fully connected classifier
#[derive(Module, Debug)]
pub struct Mlp<B: Backend> {
    input_dropout: Dropout,
    hidden: Vec<HiddenLayer<B>>,
    output: Linear<B>,
    config: Ignored<MlpConfig>,
    width: usize,
    height: usize,
    channels: usize,
    num_classes: usize,
}

impl MlpConfig {
    /// Build an MLP for `input` images and `num_classes` outputs
    pub fn init<B: Backend>(
        &self,
        input: InputShape,
        num_classes: usize,
        device: &B::Device,
    ) -> Result<Mlp<B>> {
        self.validate()?;
        check_classes(NAME, num_classes)?;
        input.validate(NAME, 1)?;

        let init = Initializer::XavierUniform { gain: 1.0 };
        let mut in_features = input.size();
        let mut hidden = Vec::with_capacity(self.hidden.len());

        for (i, (&units, &activation)) in self.hidden.iter().zip(&self.activations).enumerate() {
            hidden.push(HiddenLayer {
                linear: LinearConfig::new(in_features, units)
                    .with_initializer(init.clone())
                    .init(device),
                activation: Ignored(activation),
                dropout: DropoutConfig::new(self.dropout_for(i)).init(),
            });
            in_features = units;
        }

        let output = LinearConfig::new(in_features, num_classes)
            .with_initializer(init)
            .init(device);

        Ok(Mlp {
            input_dropout: DropoutConfig::new(self.input_dropout).init(),
            hidden,
            output,
            config: Ignored(self.clone()),
            width: input.width,
            height: input.height,
            channels: input.channels,
            num_classes,
        })
    }
}

impl<B: Backend> Mlp<B> {
    /// Single hidden layer of 128 ReLU units
    pub fn new(input: InputShape, num_classes: usize, device: &B::Device) -> Result<Self> {
        MlpConfig::new(vec![128], vec![Activation::Relu]).init(input, num_classes, device)
    }

    pub fn depth(&self) -> usize {
        self.hidden.len()
    }

    pub fn config(&self) -> &MlpConfig {
        &self.config.0
    }

    /// Output of the first `depth` hidden layers
    fn hidden_until(&self, input: Tensor<B, 2>, depth: usize) -> Tensor<B, 2> {
        self.hidden
            .iter()
            .take(depth)
            .fold(self.input_dropout.forward(input), |x, layer| layer.forward(x))
    }
}

impl<B: Backend> ImageClassifier<B> for Mlp<B> {
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
        self.output.forward(self.hidden_until(input, self.hidden.len()))
    }

    fn layers(&self) -> Vec<&'static str> {
        const HIDDEN: [&str; MAX_HIDDEN_LAYERS] =
            ["fc1", "fc2", "fc3", "fc4", "fc5", "fc6", "fc7", "fc8"];
        let mut layers = vec!["flatten"];
        layers.extend(HIDDEN.iter().take(self.hidden.len()));
        layers.push("output");
        layers
    }

    fn layer_output(&self, input: Tensor<B, 2>, scope: &str) -> Option<Tensor<B, 2>> {
        // "flatten" is position 0, so a position doubles as a hidden depth
        match self.layers().iter().position(|&layer| layer == scope)? {
            depth if depth <= self.hidden.len() => Some(self.hidden_until(input, depth)),
            _ => Some(self.logits(input)),
        }
    }

    fn hyperparameters(&self) -> serde_json::Value {
        serde_json::to_value(&self.config.0).unwrap_or_default()
    }
}

impl<B: Backend> BuildImageClassifier<B> for Mlp<B> {
    fn build(input: InputShape, num_classes: usize, device: &B::Device) -> Result<Self> {
        Self::new(input, num_classes, device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_mlp_default_forward() {
        let device = Default::default();
        let model = Mlp::<TestBackend>::new(InputShape::square(8, 1), 4, &device).unwrap();

        let input = Tensor::<TestBackend, 2>::ones([3, 64], &device);
        let output = model.forward(input);

        assert_eq!(output.logits.dims(), [3, 4]);
        assert_eq!(model.depth(), 1);
        assert_eq!(model.layers(), vec!["flatten", "fc1", "output"]);
    }

    #[test]
    fn test_mlp_dropout_preset() {
        let device = Default::default();
        let model = MlpConfig::relu_1024_relu_1024_relu_2048_dropout()
            .init::<TestBackend>(InputShape::square(4, 1), 2, &device)
            .unwrap();

        assert_eq!(model.depth(), 3);
        assert_eq!(model.layers().len(), 5);

        let input = Tensor::<TestBackend, 2>::ones([2, 16], &device);
        assert_eq!(model.logits(input).dims(), [2, 2]);
    }

    #[test]
    fn test_mlp_rejects_invalid_config() {
        let device = Default::default();
        let result = MlpConfig::new(vec![16, 16], vec![Activation::Tanh])
            .init::<TestBackend>(InputShape::square(4, 1), 2, &device);
        assert!(result.is_err());
    }

    #[test]
    fn test_mlp_layer_outputs() {
        let device = Default::default();
        let model = MlpConfig::new(vec![6, 5], vec![Activation::Relu, Activation::Tanh])
            .init::<TestBackend>(InputShape::square(2, 1), 3, &device)
            .unwrap();
        let input = Tensor::<TestBackend, 2>::ones([2, 4], &device);

        let dims = |scope: &str| model.layer_output(input.clone(), scope).map(|x| x.dims());
        assert_eq!(dims("flatten"), Some([2, 4]));
        assert_eq!(dims("fc1"), Some([2, 6]));
        assert_eq!(dims("fc2"), Some([2, 5]));
        assert_eq!(dims("output"), Some([2, 3]));
        assert_eq!(dims("fc3"), None);

        let flatten: Vec<f32> = model
            .layer_output(input, "flatten")
            .unwrap()
            .into_data()
            .to_vec()
            .unwrap();
        assert_eq!(flatten, vec![1.0; 8]);
    }

    #[test]
    fn test_mlp_hyperparameters() {
        let device = Default::default();
        let model = MlpConfig::relu_1024_relu_1024_relu_2048_dropout()
            .init::<TestBackend>(InputShape::square(2, 1), 2, &device)
            .unwrap();

        let config: MlpConfig = serde_json::from_value(model.hyperparameters()).unwrap();
        assert_eq!(config.hidden, vec![1024, 1024, 2048]);
        assert_eq!(config.hidden_dropout, vec![0.5, 0.5, 0.5]);
    }
}
