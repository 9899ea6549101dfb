use serde::{Deserialize, Serialize};

/// Learning-rate decay policy, keyed by the epoch counter. The policy maps
/// (base rate, current rate, epoch) to the rate used for the next epoch's
/// updates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LrPolicy {
    /// No decay.
    Constant,
    /// `lr = base / (1 + decay_rate * epoch)`.
    TimeDecay { decay_rate: f32 },
    /// Multiply the current rate by `drop` once, when the epoch counter is
    /// exactly `drop_after`. The equality check is intentional: if the
    /// threshold epoch is skipped the drop silently never fires.
    StepDecay { drop_after: usize, drop: f32 },
    /// `lr = base * exp(-decay_rate * epoch)`.
    ExpDecay { decay_rate: f32 },
}

impl LrPolicy {
    /// Computes the learning rate for `epoch`.
    ///
    /// # Arguments
    /// * `base_lr` - The rate the run started with.
    /// * `current_lr` - The rate currently in effect.
    /// * `epoch` - The epoch counter, starting at 0.
    pub fn apply(&self, base_lr: f32, current_lr: f32, epoch: usize) -> f32 {
        match *self {
            Self::Constant => current_lr,
            Self::TimeDecay { decay_rate } => base_lr / (1.0 + decay_rate * epoch as f32),
            Self::StepDecay { drop_after, drop } => {
                if epoch == drop_after {
                    current_lr * drop
                } else {
                    current_lr
                }
            }
            Self::ExpDecay { decay_rate } => base_lr * (-decay_rate * epoch as f32).exp(),
        }
    }
}
