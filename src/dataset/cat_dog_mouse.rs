//! Cat/dog/mouse dataset
//!
//! A small three-class image set. When `<data_dir>/cat_dog_mouse/` holds one
//! folder per class, the images are read from disk and resized to `dim × dim`
//! RGB. Otherwise a seeded synthetic stand-in is generated: each class is a
//! distinct procedural pattern family with per-image jitter and noise.

use std::f32::consts::PI;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::ImageReader;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::{ImageDataset, ImageItem};
use crate::model::InputShape;
use crate::utils::error::{DeepWaterError, Result};

pub const CAT_DOG_MOUSE_CLASSES: [&str; 3] = ["cat", "dog", "mouse"];

/// Directory name under the data root
pub const DIR_NAME: &str = "cat_dog_mouse";

/// Synthetic images generated per class
pub const SYNTHETIC_PER_CLASS: usize = 30;

const CHANNELS: usize = 3;
const NOISE: f32 = 0.1;
const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "gif"];

/// Load the set from `<data_dir>/cat_dog_mouse`, or generate it
pub fn load_cat_dog_mouse(data_dir: &Path, dim: usize, seed: u64) -> Result<ImageDataset> {
    let root = data_dir.join(DIR_NAME);
    if CAT_DOG_MOUSE_CLASSES.iter().all(|c| root.join(c).is_dir()) {
        load_folders(&root, dim)
    } else {
        debug!(
            "No class folders under {:?}, generating synthetic cat/dog/mouse set",
            root
        );
        synthetic_cat_dog_mouse(dim, SYNTHETIC_PER_CLASS, seed)
    }
}

/// Read `root/{cat,dog,mouse}/*` resized to `dim × dim` RGB
pub fn load_folders(root: &Path, dim: usize) -> Result<ImageDataset> {
    if dim == 0 {
        return Err(DeepWaterError::InvalidInput(
            "image dimension must be positive".to_string(),
        ));
    }

    let mut items = Vec::new();
    for (label, class) in CAT_DOG_MOUSE_CLASSES.iter().enumerate() {
        let paths = image_paths(&root.join(class));
        if paths.is_empty() {
            return Err(DeepWaterError::Dataset(format!(
                "no images found for class '{class}' in {:?}",
                root
            )));
        }
        for path in paths {
            match load_image(&path, dim) {
                Ok(image) => items.push(ImageItem { image, label }),
                Err(e) => warn!("Skipping {:?}: {}", path, e),
            }
        }
    }

    info!(
        "Loaded {} cat/dog/mouse images from {:?} at {}x{}",
        items.len(),
        root,
        dim,
        dim
    );

    ImageDataset::new(items, InputShape::square(dim, CHANNELS), class_names())
}

fn image_paths(dir: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();
    paths
}

/// Decode, resize and convert one image to CHW floats in `[0, 1]`
fn load_image(path: &Path, dim: usize) -> Result<Vec<f32>> {
    let img = ImageReader::open(path)?
        .decode()?
        .resize_exact(dim as u32, dim as u32, FilterType::Triangle)
        .to_rgb8();

    let plane = dim * dim;
    let mut image = vec![0.0f32; CHANNELS * plane];
    for (x, y, pixel) in img.enumerate_pixels() {
        let offset = y as usize * dim + x as usize;
        for c in 0..CHANNELS {
            image[c * plane + offset] = pixel[c] as f32 / 255.0;
        }
    }
    Ok(image)
}

/// Generate a balanced synthetic set of `per_class` images per class
pub fn synthetic_cat_dog_mouse(dim: usize, per_class: usize, seed: u64) -> Result<ImageDataset> {
    if dim == 0 || per_class == 0 {
        return Err(DeepWaterError::InvalidInput(format!(
            "synthetic set needs a positive size, got dim {dim} and {per_class} per class"
        )));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut items = Vec::with_capacity(per_class * CAT_DOG_MOUSE_CLASSES.len());

    for _ in 0..per_class {
        for label in 0..CAT_DOG_MOUSE_CLASSES.len() {
            items.push(ImageItem {
                image: pattern(label, dim, &mut rng),
                label,
            });
        }
    }

    info!(
        "Generated {} synthetic cat/dog/mouse images at {}x{}",
        items.len(),
        dim,
        dim
    );

    ImageDataset::new(items, InputShape::square(dim, CHANNELS), class_names())
}

/// One image of the given class.
///
/// cat: warm horizontal stripes; dog: green vertical stripes;
/// mouse: blue radial blob.
fn pattern(label: usize, dim: usize, rng: &mut ChaCha8Rng) -> Vec<f32> {
    let plane = dim * dim;
    let mut image = vec![0.0f32; CHANNELS * plane];

    let frequency = rng.gen_range(2.0f32..4.0);
    let phase = rng.gen_range(0.0f32..2.0 * PI);
    let (cx, cy) = (rng.gen_range(0.35f32..0.65), rng.gen_range(0.35f32..0.65));
    let radius = rng.gen_range(0.2f32..0.35);
    let tint = match label {
        0 => [0.9, 0.5, 0.2],
        1 => [0.3, 0.85, 0.3],
        _ => [0.25, 0.35, 0.9],
    };

    for y in 0..dim {
        for x in 0..dim {
            let u = x as f32 / dim as f32;
            let v = y as f32 / dim as f32;
            let intensity = match label {
                0 => 0.5 + 0.5 * (2.0 * PI * frequency * v + phase).sin(),
                1 => 0.5 + 0.5 * (2.0 * PI * frequency * u + phase).sin(),
                _ => {
                    let d = ((u - cx).powi(2) + (v - cy).powi(2)).sqrt();
                    (1.0 - d / radius).clamp(0.0, 1.0)
                }
            };
            for (c, weight) in tint.iter().enumerate() {
                let noise = rng.gen_range(-NOISE..NOISE);
                image[c * plane + y * dim + x] = (intensity * weight + noise).clamp(0.0, 1.0);
            }
        }
    }

    image
}

fn class_names() -> Vec<String> {
    CAT_DOG_MOUSE_CLASSES.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::data::dataset::Dataset;

    #[test]
    fn test_synthetic_is_balanced() {
        let dataset = synthetic_cat_dog_mouse(28, 10, 42).unwrap();
        assert_eq!(dataset.len(), 30);
        assert_eq!(dataset.class_counts(), vec![10, 10, 10]);
        assert_eq!(dataset.shape(), InputShape::square(28, 3));
        assert_eq!(dataset.class_names()[2], "mouse");
    }

    #[test]
    fn test_synthetic_is_deterministic() {
        let a = synthetic_cat_dog_mouse(16, 2, 7).unwrap();
        let b = synthetic_cat_dog_mouse(16, 2, 7).unwrap();
        let c = synthetic_cat_dog_mouse(16, 2, 8).unwrap();

        assert_eq!(a.items()[0].image, b.items()[0].image);
        assert_ne!(a.items()[0].image, c.items()[0].image);
    }

    #[test]
    fn test_synthetic_values_in_range() {
        let dataset = synthetic_cat_dog_mouse(12, 3, 1).unwrap();
        for item in dataset.items() {
            assert!(item.image.iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn test_synthetic_rejects_empty() {
        assert!(synthetic_cat_dog_mouse(0, 3, 1).is_err());
        assert!(synthetic_cat_dog_mouse(8, 0, 1).is_err());
    }

    #[test]
    fn test_falls_back_to_synthetic() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = load_cat_dog_mouse(dir.path(), 20, 3).unwrap();
        assert_eq!(dataset.len(), 3 * SYNTHETIC_PER_CLASS);
        assert_eq!(dataset.shape(), InputShape::square(20, 3));
    }

    #[test]
    fn test_loads_class_folders() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join(DIR_NAME);
        for (i, class) in CAT_DOG_MOUSE_CLASSES.iter().enumerate() {
            let class_dir = root.join(class);
            std::fs::create_dir_all(&class_dir).unwrap();
            for j in 0..2u8 {
                let img = image::RgbImage::from_pixel(10, 6, image::Rgb([i as u8 * 100, j, 0]));
                img.save(class_dir.join(format!("{j}.png"))).unwrap();
            }
            std::fs::write(class_dir.join("notes.txt"), "not an image").unwrap();
        }

        let dataset = load_cat_dog_mouse(dir.path(), 8, 0).unwrap();
        assert_eq!(dataset.len(), 6);
        assert_eq!(dataset.class_counts(), vec![2, 2, 2]);
        assert_eq!(dataset.shape(), InputShape::square(8, 3));

        let mouse = &dataset.items()[4];
        assert_eq!(mouse.label, 2);
        assert!((mouse.image[0] - 200.0 / 255.0).abs() < 1e-3);
    }

    #[test]
    fn test_empty_class_folder_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join(DIR_NAME);
        for class in CAT_DOG_MOUSE_CLASSES {
            std::fs::create_dir_all(root.join(class)).unwrap();
        }
        assert!(load_cat_dog_mouse(dir.path(), 8, 0).is_err());
    }
}
