use serde::{Deserialize, Serialize};

use crate::arch::layers::{ActKind, LossKind};
use crate::optimization::LrPolicy;

/// Hyperparameters of a training run. Stored on the model and persisted in
/// checkpoints so a saved run can be reconstructed without re-specifying them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hyperparams {
    /// Number of epochs the run is scheduled for.
    pub max_epochs: usize,
    /// Base learning rate, before any decay policy is applied.
    pub learning_rate: f32,
    /// Learning-rate decay policy.
    pub lr_policy: LrPolicy,
    /// Scale factor applied to freshly initialized Linear weights when a
    /// layer is added to the model.
    pub weight_decay: f32,
    /// L2 regularization strength, coupled into the weight gradient at each
    /// update step.
    pub reg: f32,
}

impl Default for Hyperparams {
    fn default() -> Self {
        Self {
            max_epochs: 10,
            learning_rate: 0.01,
            lr_policy: LrPolicy::Constant,
            weight_decay: 1.0,
            reg: 1e-3,
        }
    }
}

/// Static description of one layer, enough to rebuild it from a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayerConfig {
    Linear { input: usize, output: usize },
    Activation { act: ActKind },
    Criterion { loss: LossKind },
}

impl std::fmt::Display for LayerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Linear { input, output } => write!(f, "Linear({input}x{output})"),
            Self::Activation { act } => write!(f, "Activation({act:?})"),
            Self::Criterion { loss } => write!(f, "Criterion({loss:?})"),
        }
    }
}
