//! Training loop
//!
//! Shuffled mini-batch passes over an in-memory [`ImageDataset`] with
//! cross-entropy on the logits and one optimizer step per batch at a constant
//! learning rate. The error reported for an epoch is the fraction of training
//! samples the model misclassified while it was being trained on them.

use std::time::Instant;

use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    module::{AutodiffModule, Module},
    nn::loss::CrossEntropyLossConfig,
    optim::{GradientsParams, Optimizer},
    tensor::{
        backend::{AutodiffBackend, Backend},
        ElementConversion,
    },
};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::dataset::{ImageBatch, ImageBatcher, ImageDataset, ImageItem};
use crate::model::ImageClassifier;
use crate::utils::error::{DeepWaterError, Result};
use crate::utils::logging::TrainingLogger;

/// Settings for one training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub batch_size: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    pub seed: u64,
    /// Report every epoch at `info` instead of `debug`
    pub summaries: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            batch_size: 32,
            epochs: 10,
            learning_rate: 1e-3,
            seed: 42,
            summaries: false,
        }
    }
}

impl TrainingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(DeepWaterError::Config(
                "batch size must be at least 1".to_string(),
            ));
        }
        if self.epochs == 0 {
            return Err(DeepWaterError::Config(
                "epochs must be at least 1".to_string(),
            ));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(DeepWaterError::Config(format!(
                "learning rate {} must be positive",
                self.learning_rate
            )));
        }
        Ok(())
    }
}

/// Loss and error of one epoch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based
    pub epoch: usize,
    /// Mean cross-entropy over the epoch's batches
    pub loss: f64,
    /// Fraction of samples misclassified
    pub error: f64,
}

/// Outcome of a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub model: String,
    pub num_samples: usize,
    pub num_classes: usize,
    pub config: TrainingConfig,
    pub history: Vec<EpochStats>,
    pub duration_secs: f64,
}

impl TrainingReport {
    /// Error of the last epoch
    pub fn final_error(&self) -> f64 {
        self.history.last().map(|s| s.error).unwrap_or(1.0)
    }

    pub fn final_loss(&self) -> f64 {
        self.history.last().map(|s| s.loss).unwrap_or(f64::NAN)
    }
}

/// Train `model` on `dataset`, returning the trained model and its history
pub fn fit<B, M, O>(
    mut model: M,
    optimizer: &mut O,
    dataset: &ImageDataset,
    config: &TrainingConfig,
    device: &B::Device,
) -> Result<(M, TrainingReport)>
where
    B: AutodiffBackend,
    M: ImageClassifier<B> + AutodiffModule<B>,
    O: Optimizer<M, B>,
{
    config.validate()?;
    check_compatible::<B, M>(&model, dataset)?;

    let name = model.name().to_string();
    let batcher = ImageBatcher::new(dataset.shape());
    let loss_fn = CrossEntropyLossConfig::new().init(device);
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut logger = TrainingLogger::new(&name, config.epochs, config.summaries);
    let mut history = Vec::with_capacity(config.epochs);
    let start = Instant::now();

    tracing::info!(
        "Training {} ({} parameters) on {} samples: {} epochs, batch size {}, lr {}",
        name,
        model.num_params(),
        dataset.len(),
        config.epochs,
        config.batch_size,
        config.learning_rate
    );

    for epoch in 0..config.epochs {
        logger.start_epoch();

        let mut indices: Vec<usize> = (0..dataset.len()).collect();
        indices.shuffle(&mut rng);

        let mut epoch_loss = 0.0f64;
        let mut num_batches = 0usize;
        let mut correct = 0usize;

        for chunk in indices.chunks(config.batch_size) {
            let items: Vec<ImageItem> = chunk.iter().filter_map(|&i| dataset.get(i)).collect();
            let batch: ImageBatch<B> = batcher.batch(items, device);
            let batch_size = chunk.len();

            let logits = model.logits(batch.images);
            let loss = loss_fn.forward(logits.clone(), batch.targets.clone());

            let batch_correct: i64 = logits
                .argmax(1)
                .reshape([batch_size])
                .equal(batch.targets)
                .int()
                .sum()
                .into_scalar()
                .elem();
            correct += batch_correct as usize;

            let loss_value: f64 = loss.clone().into_scalar().elem();
            if !loss_value.is_finite() {
                return Err(DeepWaterError::Training(format!(
                    "{name}: loss diverged to {loss_value} in epoch {}",
                    epoch + 1
                )));
            }
            epoch_loss += loss_value;
            num_batches += 1;

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(config.learning_rate, model, grads);
        }

        let stats = EpochStats {
            epoch: epoch + 1,
            loss: epoch_loss / num_batches.max(1) as f64,
            error: 1.0 - correct as f64 / dataset.len() as f64,
        };
        logger.end_epoch(epoch, stats.loss, stats.error);
        history.push(stats);
    }

    let report = TrainingReport {
        model: name,
        num_samples: dataset.len(),
        num_classes: dataset.num_classes(),
        config: config.clone(),
        history,
        duration_secs: start.elapsed().as_secs_f64(),
    };
    logger.log_complete(report.final_error());

    Ok((model, report))
}

/// Fraction of `dataset` the model misclassifies, without updating it.
///
/// Pass an inference model (`model.valid()` for one trained on autodiff).
pub fn evaluate<B, M>(
    model: &M,
    dataset: &ImageDataset,
    batch_size: usize,
    device: &B::Device,
) -> f64
where
    B: Backend,
    M: ImageClassifier<B>,
{
    if dataset.is_empty() {
        return 0.0;
    }

    let batcher = ImageBatcher::new(dataset.shape());
    let mut correct = 0usize;

    for chunk in dataset.items().chunks(batch_size.max(1)) {
        let batch: ImageBatch<B> = batcher.batch(chunk.to_vec(), device);
        let batch_correct: i64 = model
            .logits(batch.images)
            .argmax(1)
            .reshape([chunk.len()])
            .equal(batch.targets)
            .int()
            .sum()
            .into_scalar()
            .elem();
        correct += batch_correct as usize;
    }

    1.0 - correct as f64 / dataset.len() as f64
}

fn check_compatible<B, M>(model: &M, dataset: &ImageDataset) -> Result<()>
where
    B: Backend,
    M: ImageClassifier<B>,
{
    if dataset.is_empty() {
        return Err(DeepWaterError::Training(
            "cannot train on an empty dataset".to_string(),
        ));
    }
    if model.inputs() != dataset.shape() {
        return Err(DeepWaterError::Training(format!(
            "{} expects {} inputs but the dataset holds {} images",
            model.name(),
            model.inputs(),
            dataset.shape()
        )));
    }
    if model.number_of_classes() != dataset.num_classes() {
        return Err(DeepWaterError::Training(format!(
            "{} has {} outputs but the dataset has {} classes",
            model.name(),
            model.number_of_classes(),
            dataset.num_classes()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::synthetic_cat_dog_mouse;
    use crate::model::{InputShape, LeNet, Mlp};
    use crate::training::optimizer::{momentum_optimizer, OptimizerSettings};
    use burn::backend::Autodiff;
    use burn_ndarray::NdArray;

    type TestBackend = Autodiff<NdArray>;

    #[test]
    fn test_config_validation() {
        assert!(TrainingConfig::default().validate().is_ok());

        let config = TrainingConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = TrainingConfig {
            learning_rate: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_fit_one_epoch() {
        let device = Default::default();
        let dataset = synthetic_cat_dog_mouse(8, 4, 1).unwrap();
        let model = Mlp::<TestBackend>::new(dataset.shape(), 3, &device).unwrap();
        let mut optimizer =
            momentum_optimizer::<TestBackend, Mlp<TestBackend>>(&OptimizerSettings::default());

        let config = TrainingConfig {
            batch_size: 5,
            epochs: 2,
            ..Default::default()
        };
        let (model, report) = fit(model, &mut optimizer, &dataset, &config, &device).unwrap();

        assert_eq!(report.history.len(), 2);
        assert_eq!(report.history[1].epoch, 2);
        assert_eq!(report.num_samples, 12);
        assert!((0.0..=1.0).contains(&report.final_error()));
        assert!(report.final_loss().is_finite());

        let error = evaluate(&model.valid(), &dataset, 4, &device);
        assert!((0.0..=1.0).contains(&error));
    }

    #[test]
    fn test_fit_rejects_mismatched_model() {
        let device = Default::default();
        let dataset = synthetic_cat_dog_mouse(8, 2, 1).unwrap();
        let mut optimizer =
            momentum_optimizer::<TestBackend, LeNet<TestBackend>>(&OptimizerSettings::default());

        let model = LeNet::<TestBackend>::new(InputShape::square(8, 1), 3, &device).unwrap();
        let result = fit(
            model,
            &mut optimizer,
            &dataset,
            &TrainingConfig::default(),
            &device,
        );
        assert!(matches!(result, Err(DeepWaterError::Training(_))));

        let mut optimizer =
            momentum_optimizer::<TestBackend, LeNet<TestBackend>>(&OptimizerSettings::default());
        let model = LeNet::<TestBackend>::new(dataset.shape(), 5, &device).unwrap();
        let result = fit(
            model,
            &mut optimizer,
            &dataset,
            &TrainingConfig::default(),
            &device,
        );
        assert!(result.is_err());
    }
}
