//! # DeepWater
//!
//! Image classifiers built with the Burn framework, plus the convergence
//! checks that train them on small datasets and report the final error.
//!
//! ## Modules
//!
//! - `model`: LeNet, Inception-v3 and a dense baseline behind one accessor trait
//! - `dataset`: MNIST, CIFAR-10 and cat/dog/mouse loaders and the batcher
//! - `training`: training loop, optimizers, convergence checks and sessions
//! - `backend`: the concrete backend the binary and tests train on
//! - `utils`: logging, configuration files and errors
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use deepwater::backend::TrainingBackend;
//! use deepwater::model::LeNet;
//! use deepwater::training::{cat_dog_mouse_must_converge, ConvergenceConfig, OptimizerKind};
//!
//! let config = ConvergenceConfig::new(32, 40, 1e-3);
//! let error = cat_dog_mouse_must_converge::<TrainingBackend, LeNet<TrainingBackend>>(
//!     "lenet",
//!     OptimizerKind::Momentum,
//!     &config,
//! )?;
//! assert!(error <= 0.1);
//! ```

pub mod backend;
pub mod dataset;
pub mod model;
pub mod training;
pub mod utils;

// Re-export commonly used items for convenience
pub use dataset::{DatasetKind, ImageBatch, ImageBatcher, ImageDataset, ImageItem};
pub use model::{
    BuildImageClassifier, ImageClassifier, InceptionV3, InputShape, LeNet, Mlp, Network,
    NetworkPreset,
};
pub use training::{ConvergenceConfig, OptimizerKind, TrainingConfig, TrainingReport};
pub use utils::error::{DeepWaterError, Result};

/// Final training error a convergence check must reach
pub const MAX_CONVERGED_ERROR: f64 = 0.1;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
