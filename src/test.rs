#![cfg(test)]

use ndarray::{Array2, array};

use crate::arch::Model;
use crate::arch::layers::Layer;
use crate::checkpoint::Checkpoint;
use crate::config::Hyperparams;
use crate::data::InMemorySource;
use crate::error::NetError;
use crate::optimization::{LrPolicy, Optimizer};
use crate::training::Trainer;

fn hyper(max_epochs: usize, learning_rate: f32) -> Hyperparams {
    Hyperparams {
        max_epochs,
        learning_rate,
        lr_policy: LrPolicy::Constant,
        weight_decay: 0.1,
        reg: 1e-3,
    }
}

/// Three linearly separable feature patterns, one per class: each class
/// raises its own group of features, which survives per-row normalization.
fn separable_source(per_class: usize, test_per_class: usize, batch_size: usize) -> InMemorySource {
    const CLASSES: usize = 3;
    const GROUP: usize = 4;
    const WIDTH: usize = CLASSES * GROUP;

    let generate = |count: usize| {
        let n = count * CLASSES;
        let mut inputs = Array2::zeros((n, WIDTH));
        let mut labels = Vec::with_capacity(n);
        for class in 0..CLASSES {
            for i in 0..count {
                let row = class * count + i;
                for col in 0..WIDTH {
                    // Deterministic jitter so no row has zero variance.
                    inputs[[row, col]] = ((row * 7 + col * 3) % 5) as f32 * 0.1;
                }
                for col in class * GROUP..(class + 1) * GROUP {
                    inputs[[row, col]] += 2.0;
                }
                labels.push(class);
            }
        }
        (inputs, labels)
    };

    let (train_inputs, train_labels) = generate(per_class);
    let (test_inputs, test_labels) = generate(test_per_class);
    let names = (0..CLASSES).map(|c| format!("pattern-{c}")).collect();

    InMemorySource::new(
        train_inputs,
        train_labels,
        test_inputs,
        test_labels,
        batch_size,
        names,
    )
    .unwrap()
}

#[test]
fn two_layer_loss_strictly_decreases() {
    let mut model = Model::build(
        hyper(10, 0.05),
        vec![Layer::linear(4, 2), Layer::softmax()],
    )
    .unwrap();

    let input = array![[1.0, 2.0, -1.0, -2.0]];
    let targets = [0];

    let mut last = model.train_step(input.view(), &targets).unwrap();
    for _ in 0..5 {
        let loss = model.train_step(input.view(), &targets).unwrap();
        assert!(loss < last, "loss did not decrease: {loss} >= {last}");
        last = loss;
    }
}

#[test]
fn nan_loss_is_fatal() {
    let mut model = Model::build(
        hyper(10, 0.05),
        vec![Layer::linear(4, 2), Layer::softmax()],
    )
    .unwrap();

    // Zero-variance row: normalization divides by a zero standard deviation
    // and the resulting NaN must surface as a hard error, not a step.
    let input = array![[3.0, 3.0, 3.0, 3.0]];
    let result = model.train_step(input.view(), &[0]);

    assert!(matches!(result, Err(NetError::NanLoss)));
}

#[test]
fn optimum_tracks_best_injected_loss_and_restores_it() {
    let losses = [5.0, 2.0, 4.0, 1.0, 3.0];
    let mut model = Model::build(
        hyper(losses.len(), 0.05),
        vec![Layer::linear(3, 2), Layer::softmax()],
    )
    .unwrap();
    let optimizer = Optimizer::new(&model);

    for (epoch, &loss) in losses.iter().enumerate() {
        // Make the live parameters distinguishable per epoch.
        model.set_weight(0, epoch as f32);
        model.set_loss(loss);
        optimizer.set_optimum(&mut model, epoch);
    }

    let optimum = model.optimum();
    assert_eq!(optimum.loss, 1.0);
    assert_eq!(optimum.epoch, 3);
    // After the final epoch the live parameters are the snapshot's (epoch 3),
    // not the last epoch's.
    assert!(model.weights()[0].iter().all(|&w| w == 3.0));
    assert!(optimum.weights[0].iter().all(|&w| w == 3.0));
}

#[test]
fn checkpoint_round_trips_parameters_and_hyperparams() {
    let hyper = Hyperparams {
        max_epochs: 7,
        learning_rate: 0.02,
        lr_policy: LrPolicy::StepDecay {
            drop_after: 3,
            drop: 0.5,
        },
        weight_decay: 0.1,
        reg: 2e-3,
    };
    let mut model = Model::build(
        hyper,
        vec![
            Layer::linear(4, 3),
            Layer::relu(),
            Layer::linear(3, 2),
            Layer::softmax(),
        ],
    )
    .unwrap();

    // Take a couple of real steps so the saved parameters are non-trivial.
    let input = array![[0.5, -1.0, 2.0, 0.0], [1.0, 1.5, -0.5, 3.0]];
    let targets = [0, 1];
    model.train_step(input.view(), &targets).unwrap();
    model.record_optimum(1);

    let path = std::env::temp_dir().join(format!("fcnet-roundtrip-{}.json", std::process::id()));
    Checkpoint::from_model(&model).save(&path).unwrap();
    let restored = Checkpoint::load(&path).unwrap().into_model().unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(restored.hyper(), model.hyper());
    assert_eq!(restored.layer_configs(), model.layer_configs());
    assert_eq!(restored.weights(), model.weights());
    assert_eq!(restored.biases(), model.biases());
    assert_eq!(restored.optimum().loss, model.optimum().loss);
    assert_eq!(restored.optimum().epoch, 1);
}

#[test]
fn trainer_drives_loss_down_and_classifies_the_test_set() {
    let data = separable_source(40, 10, 8);
    let model = Model::build(
        hyper(40, 0.05),
        vec![
            Layer::linear(12, 16),
            Layer::relu(),
            Layer::linear(16, 3),
            Layer::softmax(),
        ],
    )
    .unwrap();

    let mut trainer = Trainer::new(model, data, rand::rng());
    trainer.train().unwrap();

    let history = trainer.model().loss_history();
    assert_eq!(history.len(), 40);
    assert!(trainer.model().optimum().loss <= history[0]);
    assert!(trainer.model().optimum().loss.is_finite());

    let report = trainer.test().unwrap();
    assert!(report.loss.is_finite());
    assert!(
        report.accuracy >= 0.6,
        "accuracy too low: {}",
        report.accuracy
    );
}

#[test]
fn fit_overfits_a_single_batch() {
    let data = separable_source(4, 2, 6);
    let model = Model::build(
        hyper(30, 0.05),
        vec![
            Layer::linear(12, 8),
            Layer::relu(),
            Layer::linear(8, 3),
            Layer::softmax(),
        ],
    )
    .unwrap();

    let mut trainer = Trainer::new(model, data, rand::rng());
    trainer.fit().unwrap();

    let history = trainer.model().loss_history();
    assert_eq!(history.len(), 30);
    assert!(
        history[history.len() - 1] < history[0],
        "fit did not reduce the loss: {history:?}"
    );
}
