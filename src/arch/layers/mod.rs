mod activation;
mod criterion;
mod linear;

pub use activation::{ActKind, Activation};
pub use criterion::{Criterion, LossKind, SoftmaxOutput};
pub use linear::Linear;

use crate::config::LayerConfig;

/// A computational unit of the sequential pipeline. Closed set: an affine
/// transform, an elementwise nonlinearity, or the terminal classifier/loss
/// head. Dispatch is a plain `match` on the variant.
#[derive(Debug, Clone)]
pub enum Layer {
    Linear(Linear),
    Activation(Activation),
    Criterion(Criterion),
}

impl Layer {
    pub fn linear(input: usize, output: usize) -> Self {
        Self::Linear(Linear::new(input, output))
    }

    pub fn relu() -> Self {
        Self::Activation(Activation::new(ActKind::Relu))
    }

    pub fn softmax() -> Self {
        Self::Criterion(Criterion::new(LossKind::SoftmaxCrossEntropy))
    }

    /// The static description of this layer, as persisted in checkpoints.
    pub fn config(&self) -> LayerConfig {
        match self {
            Self::Linear(l) => LayerConfig::Linear {
                input: l.input_width(),
                output: l.output_width(),
            },
            Self::Activation(a) => LayerConfig::Activation { act: a.kind() },
            Self::Criterion(c) => LayerConfig::Criterion { loss: c.kind() },
        }
    }

    pub fn from_config(config: LayerConfig) -> Self {
        match config {
            LayerConfig::Linear { input, output } => Self::linear(input, output),
            LayerConfig::Activation { act: ActKind::Relu } => Self::relu(),
            LayerConfig::Criterion {
                loss: LossKind::SoftmaxCrossEntropy,
            } => Self::softmax(),
        }
    }
}
