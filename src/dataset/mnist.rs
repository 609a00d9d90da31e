//! MNIST loader
//!
//! Reads the IDX files (`train-images-idx3-ubyte`, `train-labels-idx1-ubyte`)
//! from a directory, gzipped or raw.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt};
use flate2::read::GzDecoder;
use tracing::info;

use super::{ImageDataset, ImageItem};
use crate::model::InputShape;
use crate::utils::error::{DeepWaterError, Result};

const IMAGES_MAGIC: u32 = 2051;
const LABELS_MAGIC: u32 = 2049;
const NUM_CLASSES: usize = 10;

/// Largest image side accepted from an IDX header
const MAX_SIDE: usize = 4096;

/// Upper bound on entries reserved up front from a header count
const MAX_PREALLOC: usize = 1 << 16;

/// Load the MNIST training set from `dir`
pub fn load_mnist(dir: &Path) -> Result<ImageDataset> {
    load_split(dir, "train")
}

/// Load the MNIST test set from `dir`
pub fn load_mnist_test(dir: &Path) -> Result<ImageDataset> {
    load_split(dir, "t10k")
}

fn load_split(dir: &Path, prefix: &str) -> Result<ImageDataset> {
    let mut images_file = open_idx(dir, &format!("{prefix}-images-idx3-ubyte"))?;
    let mut labels_file = open_idx(dir, &format!("{prefix}-labels-idx1-ubyte"))?;

    let (shape, images) = read_images(&mut images_file)?;
    let labels = read_labels(&mut labels_file)?;

    if images.len() != labels.len() {
        return Err(DeepWaterError::Dataset(format!(
            "MNIST {prefix}: {} images but {} labels",
            images.len(),
            labels.len()
        )));
    }

    let items = images
        .into_iter()
        .zip(labels)
        .map(|(image, label)| ImageItem {
            image,
            label: label as usize,
        })
        .collect::<Vec<_>>();

    info!(
        "Loaded {} MNIST {} images ({}) from {:?}",
        items.len(),
        prefix,
        shape,
        dir
    );

    let class_names = (0..NUM_CLASSES).map(|d| d.to_string()).collect();
    ImageDataset::new(items, shape, class_names)
}

/// Open `<dir>/<name>.gz`, falling back to `<dir>/<name>`
fn open_idx(dir: &Path, name: &str) -> Result<Box<dyn Read>> {
    let gz_path = dir.join(format!("{name}.gz"));
    if gz_path.exists() {
        let file = File::open(&gz_path)?;
        return Ok(Box::new(GzDecoder::new(BufReader::new(file))));
    }

    let path = dir.join(name);
    if path.exists() {
        return Ok(Box::new(BufReader::new(File::open(&path)?)));
    }

    Err(DeepWaterError::PathNotFound(path))
}

/// Parse an IDX3 image file into flat `[0, 1]` images
pub fn read_images<R: Read>(reader: &mut R) -> Result<(InputShape, Vec<Vec<f32>>)> {
    let magic = reader.read_u32::<BigEndian>()?;
    if magic != IMAGES_MAGIC {
        return Err(DeepWaterError::Dataset(format!(
            "Invalid magic number for images: {magic}"
        )));
    }

    let count = reader.read_u32::<BigEndian>()? as usize;
    let rows = reader.read_u32::<BigEndian>()? as usize;
    let cols = reader.read_u32::<BigEndian>()? as usize;
    if rows == 0 || cols == 0 || rows > MAX_SIDE || cols > MAX_SIDE {
        return Err(DeepWaterError::Dataset(format!(
            "MNIST image header has implausible size {rows}x{cols}"
        )));
    }
    let shape = InputShape::new(cols, rows, 1);

    // the header count is untrusted until the pixels are actually read
    let mut images = Vec::with_capacity(count.min(MAX_PREALLOC));
    let mut buffer = vec![0u8; rows * cols];
    for i in 0..count {
        reader.read_exact(&mut buffer).map_err(|e| {
            DeepWaterError::Dataset(format!("MNIST image {i} of {count} is truncated: {e}"))
        })?;
        images.push(buffer.iter().map(|&b| f32::from(b) / 255.0).collect());
    }

    Ok((shape, images))
}

/// Parse an IDX1 label file
pub fn read_labels<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let magic = reader.read_u32::<BigEndian>()?;
    if magic != LABELS_MAGIC {
        return Err(DeepWaterError::Dataset(format!(
            "Invalid magic number for labels: {magic}"
        )));
    }

    let count = reader.read_u32::<BigEndian>()? as usize;
    let mut labels = Vec::with_capacity(count.min(MAX_PREALLOC));
    reader.by_ref().take(count as u64).read_to_end(&mut labels)?;
    if labels.len() != count {
        return Err(DeepWaterError::Dataset(format!(
            "MNIST label file holds {} of {count} labels",
            labels.len()
        )));
    }

    if let Some(bad) = labels.iter().find(|&&l| l as usize >= NUM_CLASSES) {
        return Err(DeepWaterError::Dataset(format!(
            "MNIST label {bad} is out of range"
        )));
    }

    Ok(labels)
}
