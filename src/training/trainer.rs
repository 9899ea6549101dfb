use rand::Rng;

use crate::arch::Model;
use crate::data::DataSource;
use crate::error::Result;
use crate::optimization::Optimizer;

/// Test-set evaluation summary.
#[derive(Debug, Clone, Copy)]
pub struct TestReport {
    pub loss: f32,
    /// Fraction of test examples whose predicted class equals the label.
    pub accuracy: f32,
}

/// Owns a model, its optimizer and a data source, and drives the epoch loop.
/// Execution is strictly sequential: each batch is forward-propagated,
/// backward-propagated and applied before the next batch begins.
pub struct Trainer<D, R>
where
    D: DataSource,
    R: Rng,
{
    model: Model,
    optimizer: Optimizer,
    data: D,
    rng: R,
}

impl<D, R> Trainer<D, R>
where
    D: DataSource,
    R: Rng,
{
    pub fn new(model: Model, data: D, rng: R) -> Self {
        let optimizer = Optimizer::new(&model);
        Self {
            model,
            optimizer,
            data,
            rng,
        }
    }

    /// Full training run over the scheduled epochs. Each epoch applies the
    /// learning-rate policy, steps every batch, records the epoch loss, and
    /// lets the optimizer capture or restore the optimum snapshot. A NaN
    /// loss aborts the run.
    pub fn train(&mut self) -> Result<()> {
        let epochs = self.model.hyper().max_epochs;
        for epoch in 0..epochs {
            self.optimizer.schedule(&mut self.model, epoch);
            self.data.shuffle(&mut self.rng);

            for (input, labels) in self.data.train_batches() {
                self.step(input.view(), &labels, epoch)?;
            }

            self.finish_epoch(epoch);
        }
        Ok(())
    }

    /// Overfits a single fixed batch for the scheduled epochs. A sanity
    /// check that the network and its gradients can drive the loss down at
    /// all before committing to a full run.
    pub fn fit(&mut self) -> Result<()> {
        let Some((input, labels)) = self.data.train_batches().into_iter().next() else {
            log::warn!("fit: data source produced no batches");
            return Ok(());
        };

        let epochs = self.model.hyper().max_epochs;
        for epoch in 0..epochs {
            self.optimizer.schedule(&mut self.model, epoch);
            self.step(input.view(), &labels, epoch)?;
            self.finish_epoch(epoch);
        }
        Ok(())
    }

    fn step(&mut self, input: ndarray::ArrayView2<f32>, labels: &[usize], epoch: usize) -> Result<f32> {
        self.model.train_step(input, labels).inspect_err(|e| {
            log::error!(
                "training aborted at epoch {epoch} (lr {:.6}): {e}",
                self.model.learning_rate()
            );
        })
    }

    fn finish_epoch(&mut self, epoch: usize) {
        let loss = self.model.loss();
        self.model.record_epoch_loss(loss);
        log::info!(
            "epoch {epoch}: loss {:.6}, lr {:.6}",
            loss,
            self.model.learning_rate()
        );
        self.optimizer.set_optimum(&mut self.model, epoch);
    }

    /// Evaluates the held-out test set.
    pub fn test(&mut self) -> Result<TestReport> {
        let (input, labels) = self.data.test_set();
        let eval = self.model.evaluate(input.view(), &labels)?;

        let correct = eval
            .predictions
            .iter()
            .zip(&labels)
            .filter(|(p, l)| p == l)
            .count();
        let accuracy = correct as f32 / labels.len().max(1) as f32;

        log::info!(
            "test: loss {:.6}, accuracy {:.2}% ({correct}/{})",
            eval.loss,
            accuracy * 100.0,
            labels.len()
        );
        Ok(TestReport {
            loss: eval.loss,
            accuracy,
        })
    }

    /// Logs ground truth vs. prediction with class names and confidence for
    /// every test example.
    pub fn report_inferences(&mut self) -> Result<()> {
        let (input, labels) = self.data.test_set();
        let eval = self.model.evaluate(input.view(), &labels)?;
        let names = self.data.class_names();

        for (i, (&truth, (&pred, &conf))) in labels
            .iter()
            .zip(eval.predictions.iter().zip(&eval.confidences))
            .enumerate()
        {
            log::info!(
                "example {i}: ground truth ({truth}) {} || prediction ({pred}) {} || confidence {:.2}%",
                names[truth],
                names[pred],
                conf * 100.0
            );
        }
        Ok(())
    }

    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn into_model(self) -> Model {
        self.model
    }
}
