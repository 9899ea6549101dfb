use ndarray::{Array1, Array2};

use crate::arch::Model;

/// The best-loss state recorded during a training run. Captured by deep copy
/// so later in-place parameter updates cannot retroactively corrupt it.
#[derive(Debug, Clone)]
pub struct Optimum {
    /// Best loss seen so far; `f32::INFINITY` until the first epoch finishes.
    pub loss: f32,
    /// Epoch at which the best loss occurred.
    pub epoch: usize,
    /// Learning rate in effect at that epoch.
    pub learning_rate: f32,
    /// Copies of the Linear-layer weight matrices at that epoch.
    pub weights: Vec<Array2<f32>>,
    /// Copies of the Linear-layer bias vectors at that epoch.
    pub biases: Vec<Array1<f32>>,
}

impl Optimum {
    pub fn new() -> Self {
        Self {
            loss: f32::INFINITY,
            epoch: 0,
            learning_rate: 0.0,
            weights: Vec::new(),
            biases: Vec::new(),
        }
    }
}

impl Default for Optimum {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives the learning-rate schedule and tracks the optimum snapshot across
/// a training run.
pub struct Optimizer {
    base_lr: f32,
}

impl Optimizer {
    pub fn new(model: &Model) -> Self {
        Self {
            base_lr: model.hyper().learning_rate,
        }
    }

    /// Applies the model's decay policy for `epoch`, before the epoch's
    /// batches run.
    pub fn schedule(&self, model: &mut Model, epoch: usize) {
        let lr = model
            .hyper()
            .lr_policy
            .apply(self.base_lr, model.learning_rate(), epoch);
        model.set_learning_rate(lr);
    }

    /// End-of-epoch bookkeeping: captures the optimum snapshot whenever the
    /// epoch loss improves on the recorded best, and on the final scheduled
    /// epoch restores the model's live parameters from the snapshot,
    /// discarding the last epoch's parameters in favor of the historically
    /// best ones.
    pub fn set_optimum(&self, model: &mut Model, epoch: usize) {
        if model.loss() < model.optimum().loss {
            model.record_optimum(epoch);
            log::debug!("new optimum: loss {:.6} at epoch {epoch}", model.loss());
        }

        if epoch + 1 == model.hyper().max_epochs {
            model.restore_optimum();
            let optimum = model.optimum();
            log::info!(
                "optimum loss in {} epochs: {:.6} (epoch {}, lr {:.6})",
                model.hyper().max_epochs,
                optimum.loss,
                optimum.epoch,
                optimum.learning_rate
            );
        }
    }
}
