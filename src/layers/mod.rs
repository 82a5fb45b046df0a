use crate::Tensor;

mod dense;
mod dropout;
mod leaky_relu;
mod sparse_dense;

pub use dense::{Dense, DenseBackwardContext, DenseForwardContext};
pub use dropout::{Dropout, DropoutBackwardContext, DropoutForwardContext};
pub use leaky_relu::{LeakyReLU, LeakyReLUBackwardContext, LeakyReLUForwardContext};
pub use sparse_dense::{SparseDense, SparseDenseBackwardContext};

/// Dense layers that can follow the sparse input projection
#[derive(Debug)]
pub enum Layer {
    Dense(Dense),
    Dropout(Dropout),
    LeakyReLU(LeakyReLU),
}

/// Layer-specific context from forward pass for backpropagation
#[derive(Debug)]
pub enum LayerForwardContext {
    Dense(DenseForwardContext),
    Dropout(DropoutForwardContext),
    LeakyReLU(LeakyReLUForwardContext),
}

/// Layer-specific gradients from the backward pass
#[derive(Debug)]
pub enum LayerBackwardContext {
    Dense(DenseBackwardContext),
    Dropout(DropoutBackwardContext),
    LeakyReLU(LeakyReLUBackwardContext),
}

impl Layer {
    pub fn forward(&self, input: Tensor, training: bool) -> (Tensor, LayerForwardContext) {
        match self {
            Layer::Dense(dense) => dense.forward(input, training),
            Layer::Dropout(dropout) => dropout.forward(input, training),
            Layer::LeakyReLU(relu) => relu.forward(input, training),
        }
    }

    /// Takes the gradient from the next layer and this layer's forward context,
    /// returns the input gradient and backward context
    ///
    /// # Panics
    /// Panics if `context` was produced by a different kind of layer.
    pub fn backward(
        &self,
        grad: Tensor,
        context: &LayerForwardContext,
    ) -> (Tensor, LayerBackwardContext) {
        match (self, context) {
            (Layer::Dense(dense), LayerForwardContext::Dense(context)) => {
                dense.backward(grad, context)
            }
            (Layer::Dropout(dropout), LayerForwardContext::Dropout(context)) => {
                dropout.backward(grad, context)
            }
            (Layer::LeakyReLU(relu), LayerForwardContext::LeakyReLU(context)) => {
                relu.backward(grad, context)
            }
            (layer, context) => panic!("{:?} cannot consume context {:?}", layer, context),
        }
    }

    /// Folds gradients from a backward pass into the layer
    pub fn update_state(&mut self, backward_context: &LayerBackwardContext) {
        if let (Layer::Dense(dense), LayerBackwardContext::Dense(context)) =
            (self, backward_context)
        {
            dense.update_grads(context);
        }
    }

    pub fn get_parameters(&self) -> Vec<&Tensor> {
        match self {
            Layer::Dense(dense) => dense.get_parameters(),
            _ => vec![],
        }
    }

    pub fn get_parameter_pairs(&mut self) -> Vec<(&mut Tensor, &Tensor)> {
        match self {
            Layer::Dense(dense) => dense.get_parameter_pairs(),
            _ => vec![],
        }
    }

    pub fn clear_grads(&mut self) {
        if let Layer::Dense(dense) = self {
            dense.clear_grads();
        }
    }
}
