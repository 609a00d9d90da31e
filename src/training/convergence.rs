//! Convergence checks
//!
//! Each check loads a dataset, builds the requested model for the dataset's
//! input shape and class count, trains it with the chosen optimizer and
//! returns the final training error. Callers assert on the returned value.
//!
//! Dataset locations under `data_dir`:
//! - MNIST: `mnist/` (IDX files, raw or gzipped)
//! - CIFAR-10: `cifar-10-batches-bin/` or `cifar10/`
//! - cat/dog/mouse: `cat_dog_mouse/{cat,dog,mouse}/`, generated when absent

use std::fs;
use std::path::{Path, PathBuf};

use burn::{module::AutodiffModule, tensor::backend::AutodiffBackend};
use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::optimizer::{
    adam_optimizer, momentum_optimizer, sgd_optimizer, OptimizerKind, OptimizerSettings,
};
use super::trainer::{fit, TrainingConfig, TrainingReport};
use crate::backend::seed_backend;
use crate::dataset::{load_cat_dog_mouse, load_cifar10, load_mnist, DatasetKind, ImageDataset};
use crate::model::{BuildImageClassifier, ImageClassifier};
use crate::utils::error::{DeepWaterError, Result};

/// Environment variable overriding the default data root
pub const DATA_DIR_ENV: &str = "DEEPWATER_DATA_DIR";

/// Settings for a convergence check
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceConfig {
    pub batch_size: usize,
    pub epochs: usize,
    pub initial_learning_rate: f64,
    /// Log every epoch at `info` and write a JSON summary
    pub summaries: bool,
    /// Image side for the cat/dog/mouse set
    pub dim: usize,
    pub seed: u64,
    /// Train on a random subset of at most this many samples
    pub max_samples: Option<usize>,
    pub data_dir: PathBuf,
    pub summary_dir: PathBuf,
    pub optimizer: OptimizerSettings,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        let data_dir = std::env::var_os(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data"));

        Self {
            batch_size: 32,
            epochs: 10,
            initial_learning_rate: 1e-3,
            summaries: false,
            dim: 28,
            seed: 42,
            max_samples: None,
            data_dir,
            summary_dir: PathBuf::from("summaries"),
            optimizer: OptimizerSettings::default(),
        }
    }
}

impl ConvergenceConfig {
    pub fn new(batch_size: usize, epochs: usize, initial_learning_rate: f64) -> Self {
        Self {
            batch_size,
            epochs,
            initial_learning_rate,
            ..Default::default()
        }
    }

    pub fn with_summaries(mut self, summaries: bool) -> Self {
        self.summaries = summaries;
        self
    }

    pub fn with_dim(mut self, dim: usize) -> Self {
        self.dim = dim;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_max_samples(mut self, max_samples: usize) -> Self {
        self.max_samples = Some(max_samples);
        self
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn with_summary_dir(mut self, summary_dir: impl Into<PathBuf>) -> Self {
        self.summary_dir = summary_dir.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.training_config().validate()?;
        self.optimizer.validate()?;
        if self.dim == 0 {
            return Err(DeepWaterError::Config(
                "image dimension must be positive".to_string(),
            ));
        }
        if self.max_samples == Some(0) {
            return Err(DeepWaterError::Config(
                "max_samples must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn training_config(&self) -> TrainingConfig {
        TrainingConfig {
            batch_size: self.batch_size,
            epochs: self.epochs,
            learning_rate: self.initial_learning_rate,
            seed: self.seed,
            summaries: self.summaries,
        }
    }
}

/// Train `M` on MNIST and return the final training error
pub fn mnist_must_converge<B, M>(
    name: &str,
    optimizer: OptimizerKind,
    config: &ConvergenceConfig,
) -> Result<f64>
where
    B: AutodiffBackend,
    M: BuildImageClassifier<B> + AutodiffModule<B>,
{
    must_converge::<B, M>(name, DatasetKind::Mnist, optimizer, config)
}

/// Train `M` on CIFAR-10 and return the final training error
pub fn cifar10_must_converge<B, M>(
    name: &str,
    optimizer: OptimizerKind,
    config: &ConvergenceConfig,
) -> Result<f64>
where
    B: AutodiffBackend,
    M: BuildImageClassifier<B> + AutodiffModule<B>,
{
    must_converge::<B, M>(name, DatasetKind::Cifar10, optimizer, config)
}

/// Train `M` on the cat/dog/mouse set and return the final training error
pub fn cat_dog_mouse_must_converge<B, M>(
    name: &str,
    optimizer: OptimizerKind,
    config: &ConvergenceConfig,
) -> Result<f64>
where
    B: AutodiffBackend,
    M: BuildImageClassifier<B> + AutodiffModule<B>,
{
    must_converge::<B, M>(name, DatasetKind::CatDogMouse, optimizer, config)
}

/// Shared body of the convergence checks
pub fn must_converge<B, M>(
    name: &str,
    kind: DatasetKind,
    optimizer: OptimizerKind,
    config: &ConvergenceConfig,
) -> Result<f64>
where
    B: AutodiffBackend,
    M: BuildImageClassifier<B> + AutodiffModule<B>,
{
    config.validate()?;

    let dataset = load_dataset(kind, config, M::MIN_SIDE)?;
    if dataset.num_classes() < 2 {
        return Err(DeepWaterError::Training(format!(
            "{name}: convergence needs at least two classes"
        )));
    }

    let device = B::Device::default();
    seed_backend::<B>(&device, config.seed);
    let model = M::build(dataset.shape(), dataset.num_classes(), &device)?;
    let (_, report) = train_model::<B, M>(model, &dataset, optimizer, config, &device)?;

    if config.summaries {
        write_summary(&config.summary_dir, name, kind, optimizer, &report)?;
    }

    let error = report.final_error();
    info!("{} on {}: final training error {:.4}", name, kind, error);
    Ok(error)
}

/// Load `kind` from the configured data root.
///
/// The cat/dog/mouse set is generated at `max(dim, min_side)`.
pub fn load_dataset(
    kind: DatasetKind,
    config: &ConvergenceConfig,
    min_side: usize,
) -> Result<ImageDataset> {
    let dataset = match kind {
        DatasetKind::Mnist => load_mnist(&config.data_dir.join("mnist"))?,
        DatasetKind::Cifar10 => load_cifar10(&cifar10_dir(&config.data_dir))?,
        DatasetKind::CatDogMouse => {
            let dim = config.dim.max(min_side);
            if dim != config.dim {
                info!(
                    "Raising cat/dog/mouse image side from {} to {}",
                    config.dim, dim
                );
            }
            load_cat_dog_mouse(&config.data_dir, dim, config.seed)?
        }
    };

    Ok(match config.max_samples {
        Some(max) => dataset.subsample(max, config.seed),
        None => dataset,
    })
}

fn cifar10_dir(data_dir: &Path) -> PathBuf {
    let extracted = data_dir.join("cifar-10-batches-bin");
    if extracted.is_dir() {
        extracted
    } else {
        data_dir.join("cifar10")
    }
}

/// Train an already-built model with the chosen optimizer kind
pub fn train_model<B, M>(
    model: M,
    dataset: &ImageDataset,
    optimizer: OptimizerKind,
    config: &ConvergenceConfig,
    device: &B::Device,
) -> Result<(M, TrainingReport)>
where
    B: AutodiffBackend,
    M: ImageClassifier<B> + AutodiffModule<B>,
{
    let training = config.training_config();
    let settings = &config.optimizer;

    match optimizer {
        OptimizerKind::Momentum => {
            let mut optim = momentum_optimizer::<B, M>(settings);
            fit::<B, M, _>(model, &mut optim, dataset, &training, device)
        }
        OptimizerKind::Sgd => {
            let mut optim = sgd_optimizer::<B, M>(settings);
            fit::<B, M, _>(model, &mut optim, dataset, &training, device)
        }
        OptimizerKind::Adam => {
            let mut optim = adam_optimizer::<B, M>(settings);
            fit::<B, M, _>(model, &mut optim, dataset, &training, device)
        }
    }
}

/// JSON record of a convergence run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvergenceSummary {
    pub name: String,
    pub dataset: DatasetKind,
    pub optimizer: OptimizerKind,
    pub timestamp: String,
    pub final_error: f64,
    pub report: TrainingReport,
}

/// Write `<dir>/<name>_<dataset>_<timestamp>.json`
pub fn write_summary(
    dir: &Path,
    name: &str,
    dataset: DatasetKind,
    optimizer: OptimizerKind,
    report: &TrainingReport,
) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;

    let now = Local::now();
    let summary = ConvergenceSummary {
        name: name.to_string(),
        dataset,
        optimizer,
        timestamp: now.to_rfc3339(),
        final_error: report.final_error(),
        report: report.clone(),
    };

    let path = dir.join(format!(
        "{}_{}_{}.json",
        name,
        dataset,
        now.format("%Y%m%d_%H%M%S")
    ));
    fs::write(&path, serde_json::to_string_pretty(&summary)?)?;

    info!("Summary written to {:?}", path);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LeNet, Mlp};
    use burn::backend::Autodiff;
    use burn_ndarray::NdArray;

    type TestBackend = Autodiff<NdArray>;

    #[test]
    fn test_default_config() {
        let config = ConvergenceConfig::new(32, 40, 1e-3);
        assert_eq!(config.dim, 28);
        assert!(!config.summaries);
        assert!(config.validate().is_ok());

        let training = config.training_config();
        assert_eq!(training.epochs, 40);
        assert_eq!(training.learning_rate, 1e-3);
    }

    #[test]
    fn test_config_from_toml() {
        let config: ConvergenceConfig =
            toml::from_str("epochs = 3\nbatch_size = 8\n[optimizer]\nmomentum = 0.5\n").unwrap();
        assert_eq!(config.epochs, 3);
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.optimizer.momentum, 0.5);
        assert_eq!(config.optimizer.clip_gradient, Some(10.0));
        assert_eq!(config.dim, 28);
    }

    #[test]
    fn test_invalid_config() {
        assert!(ConvergenceConfig::new(0, 1, 1e-3).validate().is_err());
        assert!(ConvergenceConfig::new(8, 1, 1e-3)
            .with_dim(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_cat_dog_mouse_smoke() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConvergenceConfig::new(8, 1, 1e-2)
            .with_dim(8)
            .with_data_dir(dir.path())
            .with_summary_dir(dir.path().join("summaries"))
            .with_summaries(true);

        let error = cat_dog_mouse_must_converge::<TestBackend, Mlp<TestBackend>>(
            "mlp",
            OptimizerKind::Momentum,
            &config,
        )
        .unwrap();
        assert!((0.0..=1.0).contains(&error));

        let summaries: Vec<_> = fs::read_dir(dir.path().join("summaries"))
            .unwrap()
            .collect();
        assert_eq!(summaries.len(), 1);
    }

    #[test]
    fn test_dim_raised_to_model_minimum() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConvergenceConfig::default()
            .with_dim(2)
            .with_data_dir(dir.path());

        let dataset = load_dataset(DatasetKind::CatDogMouse, &config, 4).unwrap();
        assert_eq!(dataset.shape().width, 4);
    }

    #[test]
    fn test_max_samples() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConvergenceConfig::default()
            .with_dim(8)
            .with_max_samples(10)
            .with_data_dir(dir.path());

        let dataset = load_dataset(DatasetKind::CatDogMouse, &config, 1).unwrap();
        assert_eq!(dataset.items().len(), 10);
    }

    #[test]
    fn test_missing_mnist() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConvergenceConfig::default().with_data_dir(dir.path());

        let result = mnist_must_converge::<TestBackend, LeNet<TestBackend>>(
            "lenet",
            OptimizerKind::Momentum,
            &config,
        );
        assert!(matches!(result, Err(DeepWaterError::PathNotFound(_))));
    }

    /// Five `data_batch_N.bin` files of `per_batch` records each
    fn write_cifar10_batches(dir: &Path, per_batch: usize) {
        fs::create_dir_all(dir).unwrap();
        for batch in 1..=5 {
            let mut bytes = Vec::with_capacity(per_batch * 3073);
            for i in 0..per_batch {
                let label = ((batch + i) % 10) as u8;
                bytes.push(label);
                bytes.extend((0..3072).map(|p| (p as u8).wrapping_mul(label + 1)));
            }
            fs::write(dir.join(format!("data_batch_{batch}.bin")), bytes).unwrap();
        }
    }

    #[test]
    fn test_cifar10_smoke() {
        let dir = tempfile::tempdir().unwrap();
        write_cifar10_batches(&dir.path().join("cifar10"), 4);
        let config = ConvergenceConfig::new(8, 1, 1e-2).with_data_dir(dir.path());

        let error = cifar10_must_converge::<TestBackend, Mlp<TestBackend>>(
            "mlp",
            OptimizerKind::Momentum,
            &config,
        )
        .unwrap();
        assert!((0.0..=1.0).contains(&error));
    }

    #[test]
    fn test_cifar10_prefers_extracted_dir() {
        let dir = tempfile::tempdir().unwrap();
        write_cifar10_batches(&dir.path().join("cifar10"), 1);
        let config = ConvergenceConfig::default().with_data_dir(dir.path());

        let dataset = load_dataset(DatasetKind::Cifar10, &config, 1).unwrap();
        assert_eq!(dataset.items().len(), 5);
        assert_eq!(dataset.num_classes(), 10);

        write_cifar10_batches(&dir.path().join("cifar-10-batches-bin"), 2);
        let dataset = load_dataset(DatasetKind::Cifar10, &config, 1).unwrap();
        assert_eq!(dataset.items().len(), 10);
    }

    #[test]
    fn test_train_model_each_optimizer() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConvergenceConfig::new(16, 1, 1e-2)
            .with_dim(4)
            .with_data_dir(dir.path());
        let dataset = load_dataset(DatasetKind::CatDogMouse, &config, 1).unwrap();
        let device = Default::default();

        for optimizer in [
            OptimizerKind::Momentum,
            OptimizerKind::Sgd,
            OptimizerKind::Adam,
        ] {
            let model =
                Mlp::<TestBackend>::build(dataset.shape(), dataset.num_classes(), &device).unwrap();
            let (_, report) =
                train_model::<TestBackend, _>(model, &dataset, optimizer, &config, &device)
                    .unwrap();

            assert_eq!(report.history.len(), 1, "{optimizer}");
            assert!(report.final_loss().is_finite(), "{optimizer}");
            assert!((0.0..=1.0).contains(&report.final_error()), "{optimizer}");
        }
    }

    #[test]
    fn test_write_summary() {
        let dir = tempfile::tempdir().unwrap();
        let report = TrainingReport {
            model: "LeNet".to_string(),
            num_samples: 10,
            num_classes: 3,
            config: TrainingConfig::default(),
            history: vec![],
            duration_secs: 0.5,
        };

        let path = write_summary(
            dir.path(),
            "lenet",
            DatasetKind::CatDogMouse,
            OptimizerKind::Momentum,
            &report,
        )
        .unwrap();

        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("lenet_cat_dog_mouse_"));
        assert!(name.ends_with(".json"));

        let summary: ConvergenceSummary =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(summary.final_error, 1.0);
        assert_eq!(summary.dataset, DatasetKind::CatDogMouse);
    }
}
