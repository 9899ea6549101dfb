use ndarray::{Array2, Axis};
use rand::RngCore;
use rand::seq::SliceRandom;

use crate::error::{NetError, Result};

/// The data-loading collaborator the engine trains against.
///
/// A `DataSource` is responsible only for *providing* batches and dataset
/// facts (batch size, class names, test-set size). It does not normalize,
/// augment or otherwise interpret the data; the model reads these values,
/// it never computes them.
pub trait DataSource {
    /// Fixed number of examples per training batch.
    fn batch_size(&self) -> usize;

    /// Fixed number of classes.
    fn num_classes(&self) -> usize;

    /// Display names of the classes, indexed by label.
    fn class_names(&self) -> &[String];

    /// Fixed number of examples in the held-out test set.
    fn test_size(&self) -> usize;

    /// Training batches of `(input, labels)` for one epoch, in the current
    /// shuffle order. Inputs are batch-size × feature-width.
    fn train_batches(&self) -> Vec<(Array2<f32>, Vec<usize>)>;

    /// The full held-out test set as a single batch.
    fn test_set(&self) -> (Array2<f32>, Vec<usize>);

    /// Re-draws the batch order for the next epoch.
    fn shuffle(&mut self, rng: &mut dyn RngCore);
}

/// A `DataSource` backed by in-memory arrays.
pub struct InMemorySource {
    train_inputs: Array2<f32>,
    train_labels: Vec<usize>,
    test_inputs: Array2<f32>,
    test_labels: Vec<usize>,
    batch_size: usize,
    class_names: Vec<String>,
    /// Row permutation applied to the training set, reshuffled per epoch.
    order: Vec<usize>,
}

impl InMemorySource {
    /// # Errors
    /// `ShapeMismatch` if the label vectors do not line up with the input
    /// rows, or a label falls outside the class list.
    pub fn new(
        train_inputs: Array2<f32>,
        train_labels: Vec<usize>,
        test_inputs: Array2<f32>,
        test_labels: Vec<usize>,
        batch_size: usize,
        class_names: Vec<String>,
    ) -> Result<Self> {
        if train_labels.len() != train_inputs.nrows() {
            return Err(NetError::ShapeMismatch {
                what: "training labels",
                got: train_labels.len(),
                expected: train_inputs.nrows(),
            });
        }
        if test_labels.len() != test_inputs.nrows() {
            return Err(NetError::ShapeMismatch {
                what: "test labels",
                got: test_labels.len(),
                expected: test_inputs.nrows(),
            });
        }
        let num_classes = class_names.len();
        if let Some(&bad) = train_labels
            .iter()
            .chain(&test_labels)
            .find(|&&l| l >= num_classes)
        {
            return Err(NetError::ShapeMismatch {
                what: "class label",
                got: bad,
                expected: num_classes,
            });
        }

        let order = (0..train_inputs.nrows()).collect();
        Ok(Self {
            train_inputs,
            train_labels,
            test_inputs,
            test_labels,
            batch_size,
            class_names,
            order,
        })
    }
}

impl DataSource for InMemorySource {
    fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn num_classes(&self) -> usize {
        self.class_names.len()
    }

    fn class_names(&self) -> &[String] {
        &self.class_names
    }

    fn test_size(&self) -> usize {
        self.test_labels.len()
    }

    fn train_batches(&self) -> Vec<(Array2<f32>, Vec<usize>)> {
        self.order
            .chunks(self.batch_size)
            .map(|idx| {
                let input = self.train_inputs.select(Axis(0), idx);
                let labels = idx.iter().map(|&i| self.train_labels[i]).collect();
                (input, labels)
            })
            .collect()
    }

    fn test_set(&self) -> (Array2<f32>, Vec<usize>) {
        (self.test_inputs.clone(), self.test_labels.clone())
    }

    fn shuffle(&mut self, rng: &mut dyn RngCore) {
        self.order.shuffle(rng);
    }
}
