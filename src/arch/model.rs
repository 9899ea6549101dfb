use ndarray::{Array1, Array2, ArrayView2};
use ndarray_rand::RandomExt;
use ndarray_rand::rand_distr::StandardUniform;

use super::layers::{Layer, SoftmaxOutput};
use crate::config::{Hyperparams, LayerConfig};
use crate::error::{NetError, Result};
use crate::optimization::Optimum;

/// Normalizes each batch row: subtract the row mean, divide by the row
/// standard deviation (sample std, n-1 denominator). A zero-variance row
/// produces non-finite values; these are not masked here and are caught by
/// the NaN loss guard instead.
fn normalize(input: ArrayView2<f32>) -> Array2<f32> {
    let mut data = input.to_owned();
    for mut row in data.rows_mut() {
        let n = row.len() as f32;
        let mean = row.sum() / n;
        let var = row.iter().map(|&v| (v - mean).powi(2)).sum::<f32>() / (n - 1.0);
        let std = var.sqrt();
        row.mapv_inplace(|v| (v - mean) / std);
    }
    data
}

/// Result of an evaluation pass over a batch.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub loss: f32,
    /// Predicted class index per example.
    pub predictions: Vec<usize>,
    /// Probability assigned to the predicted class, per example.
    pub confidences: Vec<f32>,
}

/// A sequential feed-forward classifier. Owns the ordered layer pipeline and
/// every mutable buffer of the run: per-layer outputs and output gradients,
/// plus weight/bias/gradient vectors indexed over the Linear layers only.
///
/// Contract: `forward` must run before `backward` on the same batch.
/// `backward` reads the per-layer caches `forward` populates.
#[derive(Debug, Clone)]
pub struct Model {
    layers: Vec<Layer>,
    /// One slot per layer, populated when the forward pass visits it.
    outputs: Vec<Option<Array2<f32>>>,
    /// One slot per layer, populated when the backward pass visits it.
    grad_outputs: Vec<Option<Array2<f32>>>,

    // Parameter slots, one per Linear layer, in layer order.
    weights: Vec<Array2<f32>>,
    biases: Vec<Array1<f32>>,
    grad_weights: Vec<Array2<f32>>,
    grad_biases: Vec<Array1<f32>>,

    hyper: Hyperparams,
    /// Learning rate currently in effect (the scheduler moves it away from
    /// `hyper.learning_rate` over the run).
    learning_rate: f32,
    train_mode: bool,

    /// Normalized input of the current batch, cached for the layer-0
    /// parameter gradient.
    input: Option<Array2<f32>>,
    loss: f32,
    loss_history: Vec<f32>,
    predictions: Vec<usize>,
    confidences: Vec<f32>,

    optimum: Optimum,
}

impl Model {
    /// Builds a model from an ordered layer sequence, initializing one
    /// weight/bias slot per Linear layer. Weights start uniform in [0, 1)
    /// scaled by `hyper.weight_decay`; biases start at zero.
    ///
    /// # Errors
    /// `InvalidArchitecture` if the sequence is empty, does not start with a
    /// Linear layer or does not end with a Criterion; `ShapeMismatch` if
    /// consecutive Linear widths do not chain.
    pub fn build(hyper: Hyperparams, layers: Vec<Layer>) -> Result<Self> {
        if layers.is_empty() {
            return Err(NetError::InvalidArchitecture("model has no layers"));
        }
        if !matches!(layers.first(), Some(Layer::Linear(_))) {
            return Err(NetError::InvalidArchitecture(
                "first layer must be Linear, it consumes the raw input",
            ));
        }
        if !matches!(layers.last(), Some(Layer::Criterion(_))) {
            return Err(NetError::InvalidArchitecture(
                "last layer must be a Criterion, it produces the loss",
            ));
        }

        let mut width = None;
        for layer in &layers {
            if let Layer::Linear(l) = layer {
                if let Some(expected) = width {
                    if l.input_width() != expected {
                        return Err(NetError::ShapeMismatch {
                            what: "linear input width",
                            got: l.input_width(),
                            expected,
                        });
                    }
                }
                width = Some(l.output_width());
            }
        }

        let mut model = Self {
            layers: Vec::new(),
            outputs: Vec::new(),
            grad_outputs: Vec::new(),
            weights: Vec::new(),
            biases: Vec::new(),
            grad_weights: Vec::new(),
            grad_biases: Vec::new(),
            learning_rate: hyper.learning_rate,
            hyper,
            train_mode: false,
            input: None,
            loss: 0.0,
            loss_history: Vec::new(),
            predictions: Vec::new(),
            confidences: Vec::new(),
            optimum: Optimum::new(),
        };
        for layer in layers {
            model.add(layer);
        }
        Ok(model)
    }

    /// Appends a layer, allocating its parameter slot if it is Linear.
    fn add(&mut self, layer: Layer) {
        if let Layer::Linear(l) = &layer {
            let dim = (l.input_width(), l.output_width());
            let w = Array2::random(dim, StandardUniform) * self.hyper.weight_decay;
            self.weights.push(w);
            self.biases.push(Array1::zeros(dim.1));
            self.grad_weights.push(Array2::zeros(dim));
            self.grad_biases.push(Array1::zeros(dim.1));
        }
        self.outputs.push(None);
        self.grad_outputs.push(None);
        self.layers.push(layer);
    }

    /// Forward pass: normalizes the batch, runs every layer in order and
    /// finishes by computing and storing the loss. In evaluation mode the
    /// Criterion additionally records predictions and confidences.
    ///
    /// # Errors
    /// `ShapeMismatch` if the batch does not fit the first layer or the
    /// label vector; `NanLoss` if the computed loss is not a number.
    pub fn forward(&mut self, input: ArrayView2<f32>, targets: &[usize]) -> Result<()> {
        if let Some(Layer::Linear(l)) = self.layers.first() {
            if input.ncols() != l.input_width() {
                return Err(NetError::ShapeMismatch {
                    what: "input width",
                    got: input.ncols(),
                    expected: l.input_width(),
                });
            }
        }
        if self.train_mode && targets.len() != input.nrows() {
            return Err(NetError::ShapeMismatch {
                what: "labels",
                got: targets.len(),
                expected: input.nrows(),
            });
        }

        self.input = Some(normalize(input));

        let num_layers = self.layers.len();
        let mut param = 0;
        for lth in 0..num_layers {
            let out = {
                let x = if lth == 0 {
                    self.input.as_ref().unwrap().view()
                } else {
                    self.outputs[lth - 1]
                        .as_ref()
                        .expect("previous layer output missing")
                        .view()
                };
                match &self.layers[lth] {
                    Layer::Linear(l) => {
                        let out = l.forward(x, &self.weights[param], &self.biases[param]);
                        param += 1;
                        out
                    }
                    Layer::Activation(a) => a.forward(x),
                    Layer::Criterion(c) => {
                        let SoftmaxOutput {
                            probs,
                            predictions,
                            confidences,
                        } = c.softmax(x);
                        if !self.train_mode {
                            self.predictions = predictions;
                            self.confidences = confidences;
                        }
                        probs
                    }
                }
            };
            self.outputs[lth] = Some(out);
        }

        self.compute_loss(targets)
    }

    fn compute_loss(&mut self, targets: &[usize]) -> Result<()> {
        let Some(Layer::Criterion(criterion)) = self.layers.last() else {
            return Err(NetError::InvalidArchitecture(
                "last layer must be a Criterion, it produces the loss",
            ));
        };
        let probs = self
            .outputs
            .last()
            .and_then(|o| o.as_ref())
            .expect("criterion output missing");

        let loss = if self.train_mode {
            let l2_penalty = 0.5
                * self.hyper.reg
                * self
                    .weights
                    .iter()
                    .map(|w| w.mapv(|v| v * v).sum())
                    .sum::<f32>();
            criterion.training_loss(probs.view(), targets, l2_penalty)
        } else {
            criterion.evaluation_loss(probs.view())
        };

        if loss.is_nan() {
            return Err(NetError::NanLoss);
        }
        self.loss = loss;
        Ok(())
    }

    /// Backward pass: walks the layers in strict reverse order, filling the
    /// parameter-gradient slots by chain rule, then applies the parameter
    /// update. Must run after `forward` on the same batch.
    pub fn backward(&mut self, targets: &[usize]) -> Result<()> {
        let num_layers = self.layers.len();
        let mut param = self.weights.len();

        for lth in (0..num_layers).rev() {
            if lth == num_layers - 1 {
                let Some(Layer::Criterion(c)) = self.layers.last() else {
                    return Err(NetError::InvalidArchitecture(
                        "last layer must be a Criterion, it produces the loss",
                    ));
                };
                let probs = self.outputs[lth]
                    .take()
                    .expect("forward must run before backward");
                self.grad_outputs[lth] = Some(c.backward_softmax(probs, targets));
            } else if lth > 0 {
                match &self.layers[lth] {
                    Layer::Linear(l) => {
                        param -= 1;
                        let (grad_w, grad_b, back) = {
                            let upstream = self.grad_outputs[lth + 1]
                                .as_ref()
                                .expect("upstream gradient missing")
                                .view();
                            let prev = self.outputs[lth - 1]
                                .as_ref()
                                .expect("forward must run before backward")
                                .view();
                            let (grad_w, grad_b) = l.grad_params(prev, upstream);
                            let back = l.grad_input(&self.weights[param], upstream);
                            (grad_w, grad_b, back)
                        };
                        self.grad_weights[param] = grad_w;
                        self.grad_biases[param] = grad_b;
                        self.grad_outputs[lth] = Some(back);
                    }
                    Layer::Activation(a) => {
                        // The upstream gradient is consumed: ownership moves
                        // into the masked pass-through.
                        let upstream = self.grad_outputs[lth + 1]
                            .take()
                            .expect("upstream gradient missing");
                        let out = self.outputs[lth]
                            .as_ref()
                            .expect("forward must run before backward");
                        self.grad_outputs[lth] = Some(a.backward(out.view(), upstream));
                    }
                    Layer::Criterion(_) => {
                        return Err(NetError::InvalidArchitecture(
                            "criterion cannot appear before the last layer",
                        ));
                    }
                }
            } else {
                let Layer::Linear(l) = &self.layers[0] else {
                    return Err(NetError::InvalidArchitecture(
                        "first layer must be Linear, it consumes the raw input",
                    ));
                };
                let (grad_w, grad_b) = {
                    let upstream = self.grad_outputs[1]
                        .as_ref()
                        .expect("upstream gradient missing")
                        .view();
                    let input = self
                        .input
                        .as_ref()
                        .expect("forward must run before backward")
                        .view();
                    l.grad_params(input, upstream)
                };
                self.grad_weights[0] = grad_w;
                self.grad_biases[0] = grad_b;
            }
        }

        self.update_parameters();
        Ok(())
    }

    /// In-place SGD step. L2 regularization is coupled into the weight
    /// gradient (`grad_w += reg * w`) before the step, once per update.
    pub fn update_parameters(&mut self) {
        let reg = self.hyper.reg;
        let lr = self.learning_rate;
        for j in 0..self.weights.len() {
            self.grad_weights[j].scaled_add(reg, &self.weights[j]);
            self.weights[j].scaled_add(-lr, &self.grad_weights[j]);
            self.biases[j].scaled_add(-lr, &self.grad_biases[j]);
        }
    }

    /// One training step on a batch: forward, backward, parameter update.
    ///
    /// # Returns
    /// The training loss of the batch.
    pub fn train_step(&mut self, input: ArrayView2<f32>, targets: &[usize]) -> Result<f32> {
        self.train_mode = true;
        self.forward(input, targets)?;
        self.backward(targets)?;
        Ok(self.loss)
    }

    /// Evaluation pass on a batch: forward only, no gradients, no update.
    pub fn evaluate(&mut self, input: ArrayView2<f32>, targets: &[usize]) -> Result<Evaluation> {
        self.train_mode = false;
        self.forward(input, targets)?;
        Ok(Evaluation {
            loss: self.loss,
            predictions: self.predictions.clone(),
            confidences: self.confidences.clone(),
        })
    }

    /// Captures the current loss, epoch, learning rate and a deep copy of the
    /// parameters as the new optimum snapshot.
    pub fn record_optimum(&mut self, epoch: usize) {
        self.optimum.loss = self.loss;
        self.optimum.epoch = epoch;
        self.optimum.learning_rate = self.learning_rate;
        self.optimum.weights = self.weights.clone();
        self.optimum.biases = self.biases.clone();
    }

    /// Overwrites the live parameters with the snapshot's, discarding the
    /// current ones. No-op if nothing was ever recorded.
    pub fn restore_optimum(&mut self) {
        if self.optimum.weights.is_empty() {
            return;
        }
        self.weights = self.optimum.weights.clone();
        self.biases = self.optimum.biases.clone();
    }

    /// Assigns weight/bias arrays into the Linear-layer slots in layer order,
    /// e.g. when restoring a checkpoint.
    ///
    /// # Errors
    /// `ShapeMismatch` if the count or any array shape does not match the
    /// architecture.
    pub fn set_parameters(&mut self, weights: Vec<Array2<f32>>, biases: Vec<Array1<f32>>) -> Result<()> {
        if weights.len() != self.weights.len() {
            return Err(NetError::ShapeMismatch {
                what: "weight matrices",
                got: weights.len(),
                expected: self.weights.len(),
            });
        }
        if biases.len() != self.biases.len() {
            return Err(NetError::ShapeMismatch {
                what: "bias vectors",
                got: biases.len(),
                expected: self.biases.len(),
            });
        }
        for (j, (w, b)) in weights.iter().zip(&biases).enumerate() {
            if w.dim() != self.weights[j].dim() {
                return Err(NetError::ShapeMismatch {
                    what: "weight matrix rows x cols",
                    got: w.nrows() * w.ncols(),
                    expected: self.weights[j].nrows() * self.weights[j].ncols(),
                });
            }
            if b.len() != self.biases[j].len() {
                return Err(NetError::ShapeMismatch {
                    what: "bias length",
                    got: b.len(),
                    expected: self.biases[j].len(),
                });
            }
        }
        self.weights = weights;
        self.biases = biases;
        Ok(())
    }

    /// Human-readable architecture listing, in execution order.
    pub fn describe(&self) -> String {
        let mut net = String::from("{\n");
        for (i, layer) in self.layers.iter().enumerate() {
            net.push_str(&format!("{i}: {}-->\n", layer.config()));
        }
        net.push('}');
        net
    }

    /// Static layer descriptions, in execution order.
    pub fn layer_configs(&self) -> Vec<LayerConfig> {
        self.layers.iter().map(|l| l.config()).collect()
    }

    pub fn hyper(&self) -> &Hyperparams {
        &self.hyper
    }

    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    pub fn set_learning_rate(&mut self, lr: f32) {
        self.learning_rate = lr;
    }

    pub fn loss(&self) -> f32 {
        self.loss
    }

    pub fn loss_history(&self) -> &[f32] {
        &self.loss_history
    }

    pub fn record_epoch_loss(&mut self, loss: f32) {
        self.loss_history.push(loss);
    }

    pub fn optimum(&self) -> &Optimum {
        &self.optimum
    }

    /// Replaces the optimum record wholesale, e.g. when a checkpoint is
    /// restored.
    pub fn set_optimum_record(&mut self, optimum: Optimum) {
        self.optimum = optimum;
    }

    pub fn weights(&self) -> &[Array2<f32>] {
        &self.weights
    }

    pub fn biases(&self) -> &[Array1<f32>] {
        &self.biases
    }

    #[cfg(test)]
    pub(crate) fn set_loss(&mut self, loss: f32) {
        self.loss = loss;
    }

    #[cfg(test)]
    pub(crate) fn set_weight(&mut self, j: usize, value: f32) {
        self.weights[j].fill(value);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn normalize_centers_and_scales_rows() {
        let input = ndarray::array![[1.0, 2.0, 3.0, 4.0]];
        let out = normalize(input.view());

        let mean: f32 = out.row(0).sum() / 4.0;
        assert!(mean.abs() < 1e-6);
        // Sample std of the normalized row is 1.
        let var: f32 = out.row(0).iter().map(|&v| (v - mean).powi(2)).sum::<f32>() / 3.0;
        assert!((var.sqrt() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn normalize_zero_variance_row_is_not_finite() {
        let input = ndarray::array![[5.0, 5.0, 5.0]];
        let out = normalize(input.view());
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn build_rejects_bad_architectures() {
        let hyper = Hyperparams::default();
        assert!(matches!(
            Model::build(hyper, vec![]),
            Err(NetError::InvalidArchitecture(_))
        ));
        assert!(matches!(
            Model::build(hyper, vec![Layer::relu(), Layer::softmax()]),
            Err(NetError::InvalidArchitecture(_))
        ));
        assert!(matches!(
            Model::build(hyper, vec![Layer::linear(4, 2)]),
            Err(NetError::InvalidArchitecture(_))
        ));
        assert!(matches!(
            Model::build(
                hyper,
                vec![Layer::linear(4, 2), Layer::linear(3, 2), Layer::softmax()]
            ),
            Err(NetError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn build_allocates_one_parameter_slot_per_linear() {
        let model = Model::build(
            Hyperparams::default(),
            vec![
                Layer::linear(4, 3),
                Layer::relu(),
                Layer::linear(3, 2),
                Layer::softmax(),
            ],
        )
        .unwrap();

        assert_eq!(model.weights().len(), 2);
        assert_eq!(model.biases().len(), 2);
        assert_eq!(model.weights()[0].dim(), (4, 3));
        assert_eq!(model.weights()[1].dim(), (3, 2));
    }
}
