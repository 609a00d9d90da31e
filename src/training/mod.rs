//! Training module
//!
//! - `trainer`: the mini-batch loop and evaluation
//! - `optimizer`: momentum / SGD / Adam selection
//! - `convergence`: dataset + model + optimizer checks returning the final error
//! - `session`: a stateful per-batch trainer for a named network preset

pub mod convergence;
pub mod optimizer;
pub mod session;
pub mod trainer;

pub use convergence::{
    cat_dog_mouse_must_converge, cifar10_must_converge, load_dataset, mnist_must_converge,
    must_converge, train_model, write_summary, ConvergenceConfig, ConvergenceSummary,
};
pub use optimizer::{OptimizerKind, OptimizerSettings};
pub use session::{build_image_trainer, ImageTrainer};
pub use trainer::{evaluate, fit, EpochStats, TrainingConfig, TrainingReport};
