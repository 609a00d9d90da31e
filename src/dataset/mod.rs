//! Dataset module for the convergence datasets
//!
//! Every loader produces the same in-memory [`ImageDataset`]: flat CHW float
//! images in `[0, 1]` with integer labels. [`ImageBatcher`] turns a slice of
//! items into the flat `[batch, width * height * channels]` tensor the models
//! take as input.

pub mod cat_dog_mouse;
pub mod cifar10;
pub mod mnist;

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::model::InputShape;
use crate::utils::error::{DeepWaterError, Result};

pub use cat_dog_mouse::{load_cat_dog_mouse, synthetic_cat_dog_mouse, CAT_DOG_MOUSE_CLASSES};
pub use cifar10::{load_cifar10, CIFAR10_CLASSES};
pub use mnist::load_mnist;

/// The datasets the convergence checks train on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DatasetKind {
    Mnist,
    Cifar10,
    CatDogMouse,
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetKind::Mnist => write!(f, "mnist"),
            DatasetKind::Cifar10 => write!(f, "cifar10"),
            DatasetKind::CatDogMouse => write!(f, "cat_dog_mouse"),
        }
    }
}

impl FromStr for DatasetKind {
    type Err = DeepWaterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "mnist" => Ok(DatasetKind::Mnist),
            "cifar10" | "cifar-10" => Ok(DatasetKind::Cifar10),
            "cat-dog-mouse" => Ok(DatasetKind::CatDogMouse),
            other => Err(DeepWaterError::Config(format!(
                "unknown dataset '{other}' (expected mnist, cifar10 or cat-dog-mouse)"
            ))),
        }
    }
}

/// A single labelled image
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImageItem {
    /// Flattened CHW floats in `[0, 1]`
    pub image: Vec<f32>,
    pub label: usize,
}

/// An in-memory labelled image set
#[derive(Clone, Debug)]
pub struct ImageDataset {
    items: Vec<ImageItem>,
    shape: InputShape,
    class_names: Vec<String>,
}

impl ImageDataset {
    /// Create a dataset, checking every item against `shape` and the class list
    pub fn new(items: Vec<ImageItem>, shape: InputShape, class_names: Vec<String>) -> Result<Self> {
        if class_names.is_empty() {
            return Err(DeepWaterError::Dataset(
                "dataset needs at least one class".to_string(),
            ));
        }
        let expected = shape.size();
        for (i, item) in items.iter().enumerate() {
            if item.image.len() != expected {
                return Err(DeepWaterError::Dataset(format!(
                    "item {i} has {} values, expected {expected} for {shape}",
                    item.image.len()
                )));
            }
            if item.label >= class_names.len() {
                return Err(DeepWaterError::Dataset(format!(
                    "item {i} has label {} but only {} classes exist",
                    item.label,
                    class_names.len()
                )));
            }
        }

        Ok(Self {
            items,
            shape,
            class_names,
        })
    }

    pub fn shape(&self) -> InputShape {
        self.shape
    }

    pub fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn items(&self) -> &[ImageItem] {
        &self.items
    }

    /// Number of items per class
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.num_classes()];
        for item in &self.items {
            counts[item.label] += 1;
        }
        counts
    }

    /// Keep a random subset of at most `max` items
    pub fn subsample(mut self, max: usize, seed: u64) -> Self {
        if self.items.len() > max {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            self.items.shuffle(&mut rng);
            self.items.truncate(max);
            tracing::debug!("Subsampled dataset to {} items", max);
        }
        self
    }

    /// Per-value mean over every image, zeros for an empty dataset
    pub fn mean_image(&self) -> Vec<f32> {
        let mut mean = vec![0.0f64; self.shape.size()];
        for item in &self.items {
            for (acc, &value) in mean.iter_mut().zip(&item.image) {
                *acc += value as f64;
            }
        }
        let count = self.items.len().max(1) as f64;
        mean.into_iter().map(|sum| (sum / count) as f32).collect()
    }
}

/// A mean image stored alongside the shape it was computed for
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MeanImageFile {
    shape: InputShape,
    values: Vec<f32>,
}

/// Write `mean` (as returned by [`ImageDataset::mean_image`]) as JSON
pub fn save_mean_image(path: &Path, shape: InputShape, mean: &[f32]) -> Result<()> {
    if mean.len() != shape.size() {
        return Err(DeepWaterError::InvalidInput(format!(
            "mean image has {} values, expected {} for {shape}",
            mean.len(),
            shape.size()
        )));
    }
    let file = MeanImageFile {
        shape,
        values: mean.to_vec(),
    };
    fs::write(path, serde_json::to_string(&file)?)?;
    Ok(())
}

/// Read a mean image written by [`save_mean_image`], checking it was
/// computed for `shape`
pub fn load_mean_image(path: &Path, shape: InputShape) -> Result<Vec<f32>> {
    let file: MeanImageFile = serde_json::from_str(&fs::read_to_string(path)?)?;
    if file.shape != shape || file.values.len() != shape.size() {
        return Err(DeepWaterError::Dataset(format!(
            "mean image in {:?} is for {} ({} values), expected {shape}",
            path,
            file.shape,
            file.values.len()
        )));
    }
    Ok(file.values)
}

impl Dataset<ImageItem> for ImageDataset {
    fn get(&self, index: usize) -> Option<ImageItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// A batch of flat images with their targets
#[derive(Clone, Debug)]
pub struct ImageBatch<B: Backend> {
    /// `[batch, width * height * channels]`
    pub images: Tensor<B, 2>,
    /// `[batch]`
    pub targets: Tensor<B, 1, Int>,
}

/// Batcher producing flat image tensors
#[derive(Clone, Debug)]
pub struct ImageBatcher {
    input_size: usize,
}

impl ImageBatcher {
    pub fn new(shape: InputShape) -> Self {
        Self {
            input_size: shape.size(),
        }
    }
}

impl<B: Backend> Batcher<B, ImageItem, ImageBatch<B>> for ImageBatcher {
    fn batch(&self, items: Vec<ImageItem>, device: &B::Device) -> ImageBatch<B> {
        let batch_size = items.len();

        let images_data: Vec<f32> = items.iter().flat_map(|item| item.image.clone()).collect();
        let images = Tensor::<B, 2>::from_floats(
            TensorData::new(images_data, [batch_size, self.input_size]),
            device,
        );

        let targets_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let targets =
            Tensor::<B, 1, Int>::from_data(TensorData::new(targets_data, [batch_size]), device);

        ImageBatch { images, targets }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray;

    fn tiny_dataset() -> ImageDataset {
        let shape = InputShape::new(2, 2, 1);
        let items = (0..6)
            .map(|i| ImageItem {
                image: vec![i as f32 / 10.0; 4],
                label: i % 3,
            })
            .collect();
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        ImageDataset::new(items, shape, names).unwrap()
    }

    #[test]
    fn test_dataset_kind_parse() {
        assert_eq!("mnist".parse::<DatasetKind>().unwrap(), DatasetKind::Mnist);
        assert_eq!("CIFAR10".parse::<DatasetKind>().unwrap(), DatasetKind::Cifar10);
        assert_eq!(
            "cat_dog_mouse".parse::<DatasetKind>().unwrap(),
            DatasetKind::CatDogMouse
        );
        assert!("imagenet".parse::<DatasetKind>().is_err());
    }

    #[test]
    fn test_dataset_validation() {
        let shape = InputShape::new(2, 2, 1);
        let names = vec!["only".to_string()];

        let wrong_len = vec![ImageItem {
            image: vec![0.0; 3],
            label: 0,
        }];
        assert!(ImageDataset::new(wrong_len, shape, names.clone()).is_err());

        let wrong_label = vec![ImageItem {
            image: vec![0.0; 4],
            label: 1,
        }];
        assert!(ImageDataset::new(wrong_label, shape, names).is_err());

        assert!(ImageDataset::new(vec![], shape, vec![]).is_err());
    }

    #[test]
    fn test_dataset_access() {
        let dataset = tiny_dataset();
        assert_eq!(dataset.len(), 6);
        assert_eq!(dataset.num_classes(), 3);
        assert_eq!(dataset.class_counts(), vec![2, 2, 2]);
        assert_eq!(dataset.get(4).unwrap().label, 1);
        assert!(dataset.get(6).is_none());
    }

    #[test]
    fn test_subsample() {
        let dataset = tiny_dataset().subsample(4, 7);
        assert_eq!(dataset.len(), 4);

        let dataset = tiny_dataset().subsample(100, 7);
        assert_eq!(dataset.len(), 6);
    }

    #[test]
    fn test_mean_image() {
        let mean = tiny_dataset().mean_image();
        assert_eq!(mean.len(), 4);
        assert!((mean[0] - 0.25).abs() < 1e-6);

        let empty = ImageDataset::new(vec![], InputShape::new(2, 2, 1), vec!["a".into()]).unwrap();
        assert_eq!(empty.mean_image(), vec![0.0; 4]);
    }

    #[test]
    fn test_mean_image_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mean.json");
        let shape = InputShape::new(2, 2, 1);
        let mean = tiny_dataset().mean_image();

        save_mean_image(&path, shape, &mean).unwrap();
        assert_eq!(load_mean_image(&path, shape).unwrap(), mean);

        let other = InputShape::new(4, 1, 1);
        assert!(matches!(
            load_mean_image(&path, other),
            Err(DeepWaterError::Dataset(_))
        ));
        assert!(save_mean_image(&path, shape, &mean[..3]).is_err());
        assert!(load_mean_image(&dir.path().join("missing.json"), shape).is_err());
    }

    #[test]
    fn test_batcher_shapes() {
        let dataset = tiny_dataset();
        let batcher = ImageBatcher::new(dataset.shape());
        let device = Default::default();

        let batch: ImageBatch<TestBackend> =
            batcher.batch(dataset.items()[..4].to_vec(), &device);

        assert_eq!(batch.images.dims(), [4, 4]);
        assert_eq!(batch.targets.dims(), [4]);

        let targets: Vec<i64> = batch.targets.into_data().to_vec().unwrap();
        assert_eq!(targets, vec![0, 1, 2, 0]);
    }
}
