use ndarray::{Array2, ArrayView2, Zip};
use serde::{Deserialize, Serialize};

/// Which nonlinearity an `Activation` layer applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActKind {
    Relu,
}

/// An elementwise nonlinearity. Stateless: the mask needed by the backward
/// pass is recovered from the cached forward output the model hands back in.
#[derive(Debug, Clone)]
pub struct Activation {
    kind: ActKind,
}

impl Activation {
    pub fn new(kind: ActKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> ActKind {
        self.kind
    }

    /// Elementwise `max(x, 0)`.
    pub fn forward(&self, input: ArrayView2<f32>) -> Array2<f32> {
        match self.kind {
            ActKind::Relu => input.mapv(|x| x.max(0.0)),
        }
    }

    /// Zeroes the components of `upstream` wherever the cached forward
    /// `output` was clamped (`<= 0`). Takes the gradient by value: the caller
    /// hands over ownership and receives the masked gradient back.
    pub fn backward(&self, output: ArrayView2<f32>, mut upstream: Array2<f32>) -> Array2<f32> {
        match self.kind {
            ActKind::Relu => {
                Zip::from(&mut upstream).and(&output).for_each(|g, &o| {
                    if o <= 0.0 {
                        *g = 0.0;
                    }
                });
                upstream
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ndarray::array;

    #[test]
    fn forward_clamps_negatives_to_zero() {
        let relu = Activation::new(ActKind::Relu);
        let out = relu.forward(array![[-1.0, 0.0, 2.0]].view());
        assert_eq!(out, array![[0.0, 0.0, 2.0]]);
    }

    #[test]
    fn backward_masks_clamped_positions() {
        let relu = Activation::new(ActKind::Relu);
        let output = relu.forward(array![[-1.0, 0.0, 2.0]].view());
        let upstream = array![[1.0, 1.0, 1.0]];

        let grad = relu.backward(output.view(), upstream);

        assert_eq!(grad, array![[0.0, 0.0, 1.0]]);
    }
}
