use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::arch::Model;
use crate::arch::layers::Layer;
use crate::config::{Hyperparams, LayerConfig};
use crate::error::Result;
use crate::optimization::Optimum;

/// Serialized form of the optimum snapshot: enough architecture metadata to
/// rebuild the model without re-specifying it, the hyperparameters, and one
/// weight/bias pair per Linear layer in layer order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub layers: Vec<LayerConfig>,
    pub hyper: Hyperparams,
    /// Best loss of the run the snapshot was taken from.
    pub loss: f32,
    /// Epoch that produced the best loss.
    pub epoch: usize,
    /// Learning rate in effect at that epoch.
    pub learning_rate: f32,
    pub weights: Vec<Array2<f32>>,
    pub biases: Vec<Array1<f32>>,
}

impl Checkpoint {
    /// Captures the model's optimum snapshot. If no epoch ever improved on
    /// the initial infinite loss, the live parameters and loss are captured
    /// instead.
    pub fn from_model(model: &Model) -> Self {
        let optimum = model.optimum();
        let (loss, weights, biases) = if optimum.weights.is_empty() {
            (model.loss(), model.weights().to_vec(), model.biases().to_vec())
        } else {
            (optimum.loss, optimum.weights.clone(), optimum.biases.clone())
        };

        Self {
            layers: model.layer_configs(),
            hyper: *model.hyper(),
            loss,
            epoch: optimum.epoch,
            learning_rate: optimum.learning_rate,
            weights,
            biases,
        }
    }

    /// Writes the checkpoint as JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Reads a checkpoint back from JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Rebuilds a model: hyperparameters first, then the layer sequence, then
    /// the i-th stored weight/bias pair into the i-th Linear layer. The
    /// restored parameters are also re-recorded as the model's optimum.
    ///
    /// # Errors
    /// `InvalidArchitecture`/`ShapeMismatch` if the stored metadata does not
    /// describe a valid network or the arrays do not fit it.
    pub fn into_model(self) -> Result<Model> {
        let layers = self.layers.iter().map(|&c| Layer::from_config(c)).collect();
        let mut model = Model::build(self.hyper, layers)?;
        model.set_parameters(self.weights.clone(), self.biases.clone())?;
        model.set_optimum_record(Optimum {
            loss: self.loss,
            epoch: self.epoch,
            learning_rate: self.learning_rate,
            weights: self.weights,
            biases: self.biases,
        });
        Ok(model)
    }
}
