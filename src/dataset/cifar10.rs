//! CIFAR-10 loader
//!
//! Reads the binary batches (`data_batch_1.bin` .. `data_batch_5.bin`,
//! `test_batch.bin`). Each record is one label byte followed by a 32×32 image
//! stored as three planar 1024-byte channels (R, G, B), which is already the
//! CHW layout the models expect.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use super::{ImageDataset, ImageItem};
use crate::model::InputShape;
use crate::utils::error::{DeepWaterError, Result};

const SIDE: usize = 32;
const CHANNELS: usize = 3;
const RECORD_SIZE: usize = 1 + SIDE * SIDE * CHANNELS;
const TRAIN_BATCHES: usize = 5;

pub const CIFAR10_CLASSES: [&str; 10] = [
    "airplane",
    "automobile",
    "bird",
    "cat",
    "deer",
    "dog",
    "frog",
    "horse",
    "ship",
    "truck",
];

/// Load the five CIFAR-10 training batches from `dir`
pub fn load_cifar10(dir: &Path) -> Result<ImageDataset> {
    let mut items = Vec::new();
    for i in 1..=TRAIN_BATCHES {
        items.extend(load_batch(&dir.join(format!("data_batch_{i}.bin")))?);
    }
    info!("Loaded {} CIFAR-10 training images from {:?}", items.len(), dir);
    build(items)
}

/// Load the CIFAR-10 test batch from `dir`
pub fn load_cifar10_test(dir: &Path) -> Result<ImageDataset> {
    let items = load_batch(&dir.join("test_batch.bin"))?;
    info!("Loaded {} CIFAR-10 test images from {:?}", items.len(), dir);
    build(items)
}

fn build(items: Vec<ImageItem>) -> Result<ImageDataset> {
    let class_names = CIFAR10_CLASSES.iter().map(|s| s.to_string()).collect();
    ImageDataset::new(items, InputShape::square(SIDE, CHANNELS), class_names)
}

/// Read one batch file
pub fn load_batch(path: &Path) -> Result<Vec<ImageItem>> {
    if !path.exists() {
        return Err(DeepWaterError::PathNotFound(path.to_path_buf()));
    }
    let bytes = fs::read(path)?;
    let items = parse_records(&bytes)
        .map_err(|e| DeepWaterError::Dataset(format!("{}: {e}", path.display())))?;
    debug!("Read {} records from {:?}", items.len(), path);
    Ok(items)
}

/// Parse a buffer of 3073-byte records
pub fn parse_records(bytes: &[u8]) -> std::result::Result<Vec<ImageItem>, String> {
    if bytes.len() % RECORD_SIZE != 0 {
        return Err(format!(
            "{} bytes is not a whole number of {RECORD_SIZE}-byte records",
            bytes.len()
        ));
    }

    bytes
        .chunks_exact(RECORD_SIZE)
        .enumerate()
        .map(|(i, record)| {
            let label = record[0] as usize;
            if label >= CIFAR10_CLASSES.len() {
                return Err(format!("record {i} has label {label}"));
            }
            Ok(ImageItem {
                image: record[1..].iter().map(|&b| f32::from(b) / 255.0).collect(),
                label,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(label: u8, fill: u8) -> Vec<u8> {
        let mut bytes = vec![label];
        bytes.extend(std::iter::repeat(fill).take(RECORD_SIZE - 1));
        bytes
    }

    #[test]
    fn test_parse_records() {
        let mut bytes = record(3, 255);
        bytes.extend(record(9, 0));

        let items = parse_records(&bytes).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].label, 3);
        assert_eq!(items[0].image.len(), 3072);
        assert_eq!(items[0].image[0], 1.0);
        assert_eq!(items[1].image[3071], 0.0);
    }

    #[test]
    fn test_partial_record_is_an_error() {
        let mut bytes = record(1, 10);
        bytes.push(0);
        assert!(parse_records(&bytes).is_err());
    }

    #[test]
    fn test_bad_label() {
        assert!(parse_records(&record(10, 0)).is_err());
    }

    #[test]
    fn test_load_cifar10_dir() {
        let dir = tempfile::tempdir().unwrap();
        for i in 1..=TRAIN_BATCHES {
            let mut bytes = record(0, 1);
            bytes.extend(record(i as u8, 2));
            fs::write(dir.path().join(format!("data_batch_{i}.bin")), bytes).unwrap();
        }

        let dataset = load_cifar10(dir.path()).unwrap();
        assert_eq!(dataset.items().len(), 10);
        assert_eq!(dataset.num_classes(), 10);
        assert_eq!(dataset.shape(), InputShape::square(32, 3));
        assert_eq!(dataset.class_counts()[0], 5);
    }

    #[test]
    fn test_missing_batch() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_cifar10(dir.path()),
            Err(DeepWaterError::PathNotFound(_))
        ));
    }
}
