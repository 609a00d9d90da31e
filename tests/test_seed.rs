//! Seeded initialization
//!
//! The backend random generator is process-wide, so this binary holds a
//! single test to keep other tests from drawing from it in between.

use deepwater::backend::TrainingBackend;
use deepwater::training::{build_image_trainer, OptimizerSettings};
use deepwater::InputShape;

type B = TrainingBackend;

fn predictions(preset: &str, seed: u64, images: &[f32]) -> Vec<f32> {
    let session = build_image_trainer::<B>(
        preset,
        3,
        2,
        InputShape::square(8, 1),
        &OptimizerSettings::default(),
        seed,
        &Default::default(),
    )
    .expect("failed to build the session");
    session.predict(images).expect("prediction failed")
}

#[test]
fn test_same_seed_same_parameters() {
    let images: Vec<f32> = (0..128).map(|i| (i % 11) as f32 / 11.0).collect();

    for preset in ["lenet", "mlp"] {
        let first = predictions(preset, 7, &images);
        let second = predictions(preset, 7, &images);
        assert_eq!(first, second, "{preset} differs under the same seed");

        let other = predictions(preset, 8, &images);
        assert_ne!(first, other, "{preset} ignores the seed");
    }
}
