//! Image training session
//!
//! A stateful wrapper around one [`Network`] for callers that feed raw float
//! buffers rather than datasets: build a preset (or a saved JSON description)
//! for a fixed batch shape, then call [`ImageTrainer::train`] /
//! [`ImageTrainer::predict`] per batch. The parameters can be saved and
//! restored, the network described as JSON, and any named layer read back
//! with [`ImageTrainer::extract_layer`].

use std::fs;
use std::path::{Path, PathBuf};

use burn::{
    module::{AutodiffModule, Module},
    nn::loss::CrossEntropyLossConfig,
    optim::{GradientsParams, Optimizer},
    record::CompactRecorder,
    tensor::{
        backend::{AutodiffBackend, Backend},
        Int, Tensor, TensorData,
    },
};
use tracing::{debug, info};

use super::optimizer::{momentum_optimizer, OptimizerSettings};
use crate::backend::seed_backend;
use crate::dataset;
use crate::model::{
    predictions_from_logits, ImageClassifier, InputShape, ModelDescriptor, Network, NetworkPreset,
};
use crate::utils::error::{DeepWaterError, Result};

/// Learning rate used unless set explicitly
pub const DEFAULT_LEARNING_RATE: f64 = 1e-2;

/// A network, its optimizer and a fixed batch size
pub struct ImageTrainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<Network<B>, B>,
{
    network: Network<B>,
    optimizer: O,
    batch_size: usize,
    learning_rate: f64,
    device: B::Device,
    steps: usize,
}

/// Build `preset` for batches of `batch_size` images of `shape`, trained with
/// SGD + momentum. The backend is seeded with `seed` before initialization.
///
/// A `preset` ending in `.json` is read as a description written by
/// [`ImageTrainer::save_model`]; it must describe `shape` and `num_classes`.
pub fn build_image_trainer<B: AutodiffBackend>(
    preset: &str,
    num_classes: usize,
    batch_size: usize,
    shape: InputShape,
    settings: &OptimizerSettings,
    seed: u64,
    device: &B::Device,
) -> Result<ImageTrainer<B, impl Optimizer<Network<B>, B>>> {
    settings.validate()?;
    seed_backend::<B>(device, seed);

    let network = if preset.ends_with(".json") {
        let network = Network::load_description(Path::new(preset), device)?;
        if network.inputs() != shape || network.number_of_classes() != num_classes {
            return Err(DeepWaterError::InvalidInput(format!(
                "{preset} describes {} input with {} classes, expected {shape} with {num_classes}",
                network.inputs(),
                network.number_of_classes()
            )));
        }
        network
    } else {
        let preset: NetworkPreset = preset.parse()?;
        Network::build(preset, shape, num_classes, device)?
    };
    let optimizer = momentum_optimizer::<B, Network<B>>(settings);
    ImageTrainer::new(network, optimizer, batch_size, device.clone())
}

impl<B, O> ImageTrainer<B, O>
where
    B: AutodiffBackend,
    O: Optimizer<Network<B>, B>,
{
    pub fn new(
        network: Network<B>,
        optimizer: O,
        batch_size: usize,
        device: B::Device,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(DeepWaterError::InvalidInput(
                "batch size must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            network,
            optimizer,
            batch_size,
            learning_rate: DEFAULT_LEARNING_RATE,
            device,
            steps: 0,
        })
    }

    pub fn set_learning_rate(&mut self, learning_rate: f64) -> Result<()> {
        if !(learning_rate.is_finite() && learning_rate > 0.0) {
            return Err(DeepWaterError::InvalidInput(format!(
                "learning rate {learning_rate} must be positive"
            )));
        }
        self.learning_rate = learning_rate;
        Ok(())
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn network(&self) -> &Network<B> {
        &self.network
    }

    /// Optimizer steps taken so far
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Reseed the backend; affects dropout masks from the next step on
    pub fn set_seed(&self, seed: u64) {
        seed_backend::<B>(&self.device, seed);
    }

    /// One forward/backward/update step on a batch.
    ///
    /// `images` holds `batch_size` flat CHW images, `labels` one class index
    /// per image. Returns the predictions computed before the update,
    /// `batch_size * classes` values in row-major order.
    pub fn train(&mut self, images: &[f32], labels: &[f32]) -> Result<Vec<f32>> {
        let inputs = self.input_tensor::<B>(images)?;
        let targets = self.target_tensor(labels)?;

        let logits = self.network.logits(inputs);
        let predictions =
            predictions_from_logits(logits.clone(), self.network.number_of_classes());
        let loss = CrossEntropyLossConfig::new()
            .init(&self.device)
            .forward(logits, targets);

        let grads = GradientsParams::from_grads(loss.backward(), &self.network);
        self.network = self
            .optimizer
            .step(self.learning_rate, self.network.clone(), grads);
        self.steps += 1;

        to_vec(predictions.into_data())
    }

    /// Forward pass only
    pub fn predict(&self, images: &[f32]) -> Result<Vec<f32>> {
        let network = self.network.valid();
        let inputs = self.input_tensor::<B::InnerBackend>(images)?;
        to_vec(network.predictions(inputs).into_data())
    }

    /// Activations of the layer named `scope` for a batch, flattened to
    /// `batch_size * features` values in row-major order
    pub fn extract_layer(&self, images: &[f32], scope: &str) -> Result<Vec<f32>> {
        let network = self.network.valid();
        let inputs = self.input_tensor::<B::InnerBackend>(images)?;
        let output = network.layer_output(inputs, scope).ok_or_else(|| {
            DeepWaterError::InvalidInput(format!(
                "{} has no layer '{scope}'; available layers: {}",
                self.network.name(),
                self.network.layers().join(", ")
            ))
        })?;
        to_vec(output.into_data())
    }

    /// Read a mean image saved with [`dataset::save_mean_image`] for this
    /// network's input shape
    pub fn load_mean_image(&self, path: &Path) -> Result<Vec<f32>> {
        dataset::load_mean_image(path, self.network.inputs())
    }

    /// Save the parameters with Burn's compact recorder. The recorder
    /// replaces any extension with `.mpk`; the written path is returned.
    pub fn save_params(&self, path: &Path) -> Result<PathBuf> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        self.network
            .clone()
            .save_file(path.to_path_buf(), &CompactRecorder::new())?;

        let written = path.with_extension("mpk");
        info!("Saved {} parameters to {:?}", self.network.name(), written);
        Ok(written)
    }

    /// Replace the parameters with ones saved by [`Self::save_params`]
    pub fn load_params(&mut self, path: &Path) -> Result<()> {
        self.network = self.network.clone().load_file(
            path.to_path_buf(),
            &CompactRecorder::new(),
            &self.device,
        )?;

        info!("Loaded {} parameters from {:?}", self.network.name(), path);
        Ok(())
    }

    /// The network description as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        self.descriptor().to_json()
    }

    pub fn save_model(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        debug!("Wrote network description to {:?}", path);
        Ok(())
    }

    pub fn descriptor(&self) -> ModelDescriptor {
        self.network.descriptor()
    }

    /// Layer scope names, one per line
    pub fn list_layers(&self) -> String {
        self.network.layers().join("\n")
    }

    fn input_tensor<E: Backend<Device = B::Device>>(
        &self,
        images: &[f32],
    ) -> Result<Tensor<E, 2>> {
        let size = self.network.inputs().size();
        let expected = self.batch_size * size;
        if images.len() != expected {
            return Err(DeepWaterError::InvalidInput(format!(
                "expected {} floats ({} images of {}), got {}",
                expected,
                self.batch_size,
                self.network.inputs(),
                images.len()
            )));
        }

        Ok(Tensor::from_floats(
            TensorData::new(images.to_vec(), [self.batch_size, size]),
            &self.device,
        ))
    }

    fn target_tensor(&self, labels: &[f32]) -> Result<Tensor<B, 1, Int>> {
        if labels.len() != self.batch_size {
            return Err(DeepWaterError::InvalidInput(format!(
                "expected {} labels, got {}",
                self.batch_size,
                labels.len()
            )));
        }

        let classes = self.network.number_of_classes();
        let targets = labels
            .iter()
            .map(|&label| {
                if label.fract() != 0.0 || label < 0.0 || label as usize >= classes {
                    Err(DeepWaterError::InvalidInput(format!(
                        "label {label} is not a class index below {classes}"
                    )))
                } else {
                    Ok(label as i64)
                }
            })
            .collect::<Result<Vec<i64>>>()?;

        Ok(Tensor::from_data(
            TensorData::new(targets, [self.batch_size]),
            &self.device,
        ))
    }
}

fn to_vec(data: TensorData) -> Result<Vec<f32>> {
    data.to_vec::<f32>()
        .map_err(|e| DeepWaterError::Training(format!("failed to read predictions: {e:?}")))
}
