use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// Which classifier/loss pair a `Criterion` layer implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LossKind {
    SoftmaxCrossEntropy,
}

/// Per-row result of the softmax classifier.
#[derive(Debug, Clone)]
pub struct SoftmaxOutput {
    /// Full probability matrix, batch-size × classes. Rows sum to 1.
    pub probs: Array2<f32>,
    /// Argmax class index per row.
    pub predictions: Vec<usize>,
    /// Max probability per row, i.e. the confidence in the prediction.
    pub confidences: Vec<f32>,
}

/// The terminal layer: a softmax classifier head combined with a
/// cross-entropy loss. Losses are expressed in base-10 logs, which scales
/// reported values by 1/ln(10) compared to the usual convention.
#[derive(Debug, Clone)]
pub struct Criterion {
    kind: LossKind,
}

impl Criterion {
    pub fn new(kind: LossKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> LossKind {
        self.kind
    }

    /// Row-wise softmax of the logits, plus the argmax index and max
    /// probability per row. The row max is subtracted before exponentiating
    /// so large logits cannot overflow.
    pub fn softmax(&self, logits: ArrayView2<f32>) -> SoftmaxOutput {
        let LossKind::SoftmaxCrossEntropy = self.kind;

        let mut probs = Array2::zeros(logits.raw_dim());
        let mut predictions = Vec::with_capacity(logits.nrows());
        let mut confidences = Vec::with_capacity(logits.nrows());

        for (row, mut out) in logits.rows().into_iter().zip(probs.rows_mut()) {
            let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
            let mut sum = 0.0;
            for (o, &v) in out.iter_mut().zip(row) {
                *o = (v - max).exp();
                sum += *o;
            }
            out.mapv_inplace(|e| e / sum);

            let (argmax, &conf) = out
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| a.total_cmp(b))
                .unwrap_or((0, &0.0));
            predictions.push(argmax);
            confidences.push(conf);
        }

        SoftmaxOutput {
            probs,
            predictions,
            confidences,
        }
    }

    /// Softmax-cross-entropy gradient with respect to the logits: subtract 1
    /// at each row's true-class column, then divide everything by the batch
    /// size. Takes the probability matrix by value and returns it mutated.
    pub fn backward_softmax(&self, mut probs: Array2<f32>, targets: &[usize]) -> Array2<f32> {
        let LossKind::SoftmaxCrossEntropy = self.kind;

        let batch = probs.nrows() as f32;
        for (row, &target) in targets.iter().enumerate() {
            probs[[row, target]] -= 1.0;
        }
        probs /= batch;
        probs
    }

    /// Training loss: mean over the batch of `-log10(p_true)` plus the L2
    /// penalty the model accumulated over its weight matrices.
    pub fn training_loss(&self, probs: ArrayView2<f32>, targets: &[usize], l2_penalty: f32) -> f32 {
        let LossKind::SoftmaxCrossEntropy = self.kind;

        let data_loss = targets
            .iter()
            .enumerate()
            .map(|(row, &target)| -probs[[row, target]].log10())
            .sum::<f32>()
            / targets.len() as f32;

        data_loss + l2_penalty
    }

    /// Evaluation loss: mean of `-log10(p)` over every entry of the full
    /// probability matrix. No regularization term and no label selection.
    /// This is deliberately a different formula from the training loss.
    pub fn evaluation_loss(&self, probs: ArrayView2<f32>) -> f32 {
        let LossKind::SoftmaxCrossEntropy = self.kind;

        probs.mapv(|p| -p.log10()).mean().unwrap_or(f32::NAN)
    }
}
