use std::env;
use std::path::Path;

use anyhow::{Context, Result};
use ndarray::Array2;
use rand::Rng;

use fcnet::arch::Model;
use fcnet::arch::layers::Layer;
use fcnet::checkpoint::Checkpoint;
use fcnet::config::Hyperparams;
use fcnet::data::InMemorySource;
use fcnet::optimization::LrPolicy;
use fcnet::training::Trainer;

const USAGE: &str = "Usage: fcnet [--gpu] [--load <path> | --new] [--fit] [--train] [--test] [--infer]";
const DEFAULT_CHECKPOINT: &str = "fcnet-model.json";

const NUM_CLASSES: usize = 3;
const FEATURES_PER_CLASS: usize = 4;
const INPUT_WIDTH: usize = NUM_CLASSES * FEATURES_PER_CLASS;

#[derive(Debug, Default)]
struct Args {
    gpu: bool,
    load: Option<String>,
    new: bool,
    fit: bool,
    train: bool,
    test: bool,
    infer: bool,
}

fn parse_args() -> Option<Args> {
    let mut args = Args::default();
    let mut argv = env::args().skip(1).peekable();
    if argv.peek().is_none() {
        return None;
    }

    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "--gpu" => args.gpu = true,
            "--load" => args.load = argv.next(),
            "--new" => args.new = true,
            "--fit" => args.fit = true,
            "--train" => args.train = true,
            "--test" => args.test = true,
            "--infer" => args.infer = true,
            other => {
                eprintln!("unknown flag: {other}");
                return None;
            }
        }
    }
    Some(args)
}

/// Synthetic classification set standing in for the external data-loading
/// collaborator: each class raises a distinct group of features, a pattern
/// that survives the model's per-row normalization.
fn synthetic_source<R: Rng>(rng: &mut R, per_class: usize, test_per_class: usize) -> Result<InMemorySource> {
    let mut generate = |count: usize| {
        let n = count * NUM_CLASSES;
        let mut inputs = Array2::zeros((n, INPUT_WIDTH));
        let mut labels = Vec::with_capacity(n);
        for class in 0..NUM_CLASSES {
            for i in 0..count {
                let row = class * count + i;
                for col in 0..INPUT_WIDTH {
                    inputs[[row, col]] = rng.random::<f32>() * 0.5;
                }
                for col in class * FEATURES_PER_CLASS..(class + 1) * FEATURES_PER_CLASS {
                    inputs[[row, col]] += 2.0;
                }
                labels.push(class);
            }
        }
        (inputs, labels)
    };

    let (train_inputs, train_labels) = generate(per_class);
    let (test_inputs, test_labels) = generate(test_per_class);
    let class_names = (0..NUM_CLASSES).map(|c| format!("pattern-{c}")).collect();

    Ok(InMemorySource::new(
        train_inputs,
        train_labels,
        test_inputs,
        test_labels,
        8,
        class_names,
    )?)
}

fn new_model() -> Result<Model> {
    let hyper = Hyperparams {
        max_epochs: 30,
        learning_rate: 0.05,
        lr_policy: LrPolicy::TimeDecay { decay_rate: 0.01 },
        weight_decay: 0.1,
        reg: 1e-3,
    };
    let model = Model::build(
        hyper,
        vec![
            Layer::linear(INPUT_WIDTH, 16),
            Layer::relu(),
            Layer::linear(16, NUM_CLASSES),
            Layer::softmax(),
        ],
    )?;
    Ok(model)
}

fn main() -> Result<()> {
    env_logger::init();

    let Some(args) = parse_args() else {
        println!("{USAGE}");
        return Ok(());
    };
    if !(args.fit || args.train || args.test || args.infer) {
        println!("{USAGE}");
        return Ok(());
    }
    if args.load.is_none() && !args.new {
        println!("{USAGE}");
        return Ok(());
    }
    if args.gpu {
        log::warn!("GPU execution is not available in this build, running on CPU");
    }

    let mut rng = rand::rng();
    let data = synthetic_source(&mut rng, 80, 20)?;

    let model = match &args.load {
        Some(path) => {
            log::info!("loading model from {path}");
            Checkpoint::load(Path::new(path))
                .and_then(Checkpoint::into_model)
                .with_context(|| format!("failed to load model from {path}"))?
        }
        None => {
            log::info!("working with a new model");
            new_model()?
        }
    };
    log::info!("net arch: {}", model.describe());

    let mut trainer = Trainer::new(model, data, rng);

    if args.fit {
        log::info!("fitting net on a single batch");
        trainer.fit()?;
    } else if args.train {
        log::info!("training net");
        trainer.train()?;
    }

    if args.test {
        trainer.test()?;
    }
    if args.infer {
        trainer.report_inferences()?;
    }

    if args.fit || args.train {
        let path = args.load.as_deref().unwrap_or(DEFAULT_CHECKPOINT);
        Checkpoint::from_model(trainer.model())
            .save(Path::new(path))
            .with_context(|| format!("failed to save model to {path}"))?;
        log::info!("model saved as {path}");
    }

    Ok(())
}
