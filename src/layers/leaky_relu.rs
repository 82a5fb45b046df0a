use crate::{LayerBackwardContext, LayerForwardContext, Tensor};

/// Leaky ReLU activation, an alpha of 0.0 gives a plain ReLU
#[derive(Debug)]
pub struct LeakyReLU {
    /// Slope applied to non-positive inputs
    alpha: f32,
}

#[derive(Debug)]
pub struct LeakyReLUForwardContext {
    pub mask: Vec<bool>,
}

#[derive(Debug)]
pub struct LeakyReLUBackwardContext {}

impl LeakyReLU {
    pub fn new(alpha: f32) -> Self {
        LeakyReLU { alpha }
    }

    pub fn relu() -> Self {
        Self::new(0.0)
    }

    pub fn forward(&self, input: Tensor, _training: bool) -> (Tensor, LayerForwardContext) {
        let mut output = input;
        let mask = output
            .data
            .iter_mut()
            .map(|val| {
                let positive = *val > 0.0;
                if !positive {
                    *val *= self.alpha;
                }
                positive
            })
            .collect();

        (
            output,
            LayerForwardContext::LeakyReLU(LeakyReLUForwardContext { mask }),
        )
    }

    pub fn backward(
        &self,
        grad_output: Tensor,
        context: &LeakyReLUForwardContext,
    ) -> (Tensor, LayerBackwardContext) {
        let mut output = grad_output;
        for (grad, _) in output
            .data
            .iter_mut()
            .zip(&context.mask)
            .filter(|(_, positive)| !**positive)
        {
            *grad *= self.alpha;
        }

        (
            output,
            LayerBackwardContext::LeakyReLU(LeakyReLUBackwardContext {}),
        )
    }
}
