//! Inception-v3 convergence checks

use deepwater::backend::{default_device, DefaultBackend, TrainingBackend};
use deepwater::training::{cat_dog_mouse_must_converge, ConvergenceConfig, OptimizerKind};
use deepwater::{
    ImageClassifier, InceptionV3, InputShape, Network, NetworkPreset, MAX_CONVERGED_ERROR,
};

type B = TrainingBackend;

#[test]
#[ignore = "five hundred epochs of Inception-v3 on CPU"]
fn test_inception_cat_dog_mouse() {
    let config = ConvergenceConfig::new(32, 500, 1e-3).with_summaries(false);
    let error = cat_dog_mouse_must_converge::<B, InceptionV3<B>>(
        "inception_v3",
        OptimizerKind::Momentum,
        &config,
    )
    .expect("cat/dog/mouse run failed");
    assert!(
        error <= MAX_CONVERGED_ERROR,
        "final error {error} exceeds {MAX_CONVERGED_ERROR}"
    );
}

#[test]
fn test_inception_preset() {
    let device = default_device();
    let shape = InputShape::square(NetworkPreset::InceptionV3.min_side(), 3);
    let network = Network::<DefaultBackend>::from_name("inceptionV3", shape, 3, &device).unwrap();

    assert_eq!(network.name(), "InceptionV3");
    assert_eq!(network.number_of_classes(), 3);
    assert_eq!(network.inputs(), shape);
    let layers = network.layers();
    assert_eq!(layers.first(), Some(&"reshape1"));
    assert_eq!(layers[1], "Conv2d_1a_3x3");
    assert_eq!(layers.last(), Some(&"Logits"));
}

#[test]
fn test_inception_rejects_small_input() {
    let device = default_device();
    let shape = InputShape::square(NetworkPreset::InceptionV3.min_side() - 1, 3);
    assert!(Network::<DefaultBackend>::from_name("inception_v3", shape, 3, &device).is_err());
}
