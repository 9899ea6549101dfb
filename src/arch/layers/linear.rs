use ndarray::{Array1, Array2, ArrayView2, Axis};

/// An affine transform `y = xW + b` mapping a fixed input width to a fixed
/// output width. The layer only knows its dimensions; the weight matrix and
/// bias vector live in the model's parameter vectors and are passed into
/// every call.
#[derive(Debug, Clone)]
pub struct Linear {
    input_width: usize,
    output_width: usize,
}

impl Linear {
    pub fn new(input_width: usize, output_width: usize) -> Self {
        Self {
            input_width,
            output_width,
        }
    }

    pub fn input_width(&self) -> usize {
        self.input_width
    }

    pub fn output_width(&self) -> usize {
        self.output_width
    }

    /// Computes `input · w + b`, broadcasting the bias across batch rows.
    ///
    /// # Arguments
    /// * `input` - A batch-size × input-width array.
    /// * `w` - The weight matrix, input-width × output-width.
    /// * `b` - The bias vector, length output-width.
    ///
    /// # Returns
    /// A batch-size × output-width array.
    pub fn forward(&self, input: ArrayView2<f32>, w: &Array2<f32>, b: &Array1<f32>) -> Array2<f32> {
        input.dot(w) + b
    }

    /// Gradient of the loss with respect to this layer's parameters.
    ///
    /// # Arguments
    /// * `input` - The input this layer saw during the forward pass.
    /// * `upstream` - The gradient flowing back from the following layer.
    ///
    /// # Returns
    /// `(grad_w, grad_b)` where `grad_w = inputᵀ · upstream` and `grad_b` is
    /// the column-wise sum of `upstream`.
    pub fn grad_params(
        &self,
        input: ArrayView2<f32>,
        upstream: ArrayView2<f32>,
    ) -> (Array2<f32>, Array1<f32>) {
        let grad_w = input.t().dot(&upstream);
        let grad_b = upstream.sum_axis(Axis(0));
        (grad_w, grad_b)
    }

    /// Gradient of the loss with respect to this layer's input, handed back
    /// to the preceding layer: `upstream · wᵀ`.
    pub fn grad_input(&self, w: &Array2<f32>, upstream: ArrayView2<f32>) -> Array2<f32> {
        upstream.dot(&w.t())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::array;

    #[test]
    fn forward_matches_hand_computed_affine() {
        let layer = Linear::new(2, 2);
        let w = array![[1.0, 2.0], [3.0, 4.0]];
        let b = array![0.5, -0.5];
        let input = array![[1.0, 1.0], [2.0, 0.0]];

        let out = layer.forward(input.view(), &w, &b);

        assert_eq!(out, array![[4.5, 5.5], [2.5, 3.5]]);
    }

    #[test]
    fn grad_params_matches_finite_differences() {
        let layer = Linear::new(2, 2);
        let w = array![[0.3, -0.2], [0.1, 0.4]];
        let b = array![0.05, -0.1];
        let input = array![[1.0, -2.0], [0.5, 3.0]];

        // Scalar objective: sum of the outputs, so upstream is all ones.
        let upstream = Array2::from_elem((2, 2), 1.0);
        let (grad_w, grad_b) = layer.grad_params(input.view(), upstream.view());

        let objective = |w: &Array2<f32>, b: &Array1<f32>| layer.forward(input.view(), w, b).sum();

        let eps = 1e-3;
        for i in 0..2 {
            for j in 0..2 {
                let mut w_plus = w.clone();
                w_plus[[i, j]] += eps;
                let mut w_minus = w.clone();
                w_minus[[i, j]] -= eps;
                let numeric = (objective(&w_plus, &b) - objective(&w_minus, &b)) / (2.0 * eps);
                assert!(
                    (grad_w[[i, j]] - numeric).abs() < 1e-4,
                    "grad_w[{i},{j}] = {}, numeric = {numeric}",
                    grad_w[[i, j]]
                );
            }
        }
        for j in 0..2 {
            let mut b_plus = b.clone();
            b_plus[j] += eps;
            let mut b_minus = b.clone();
            b_minus[j] -= eps;
            let numeric = (objective(&w, &b_plus) - objective(&w, &b_minus)) / (2.0 * eps);
            assert!(
                (grad_b[j] - numeric).abs() < 1e-4,
                "grad_b[{j}] = {}, numeric = {numeric}",
                grad_b[j]
            );
        }
    }

    #[test]
    fn grad_input_is_upstream_times_w_transposed() {
        let layer = Linear::new(2, 3);
        let w = array![[1.0, 0.0, 2.0], [0.0, 1.0, -1.0]];
        let upstream = array![[1.0, 2.0, 3.0]];

        let grad = layer.grad_input(&w, upstream.view());

        assert_eq!(grad, array![[7.0, -1.0]]);
    }
}
