use crate::{LayerBackwardContext, LayerForwardContext, Tensor};
use rand::Rng;
use rand_distr::StandardNormal;

/// Fully-connected layer, `output = input * weights + bias`
#[derive(Debug)]
pub struct Dense {
    /// Weight matrix of shape (inputs, outputs)
    pub weights: Tensor,
    /// Bias row of shape (1, outputs)
    pub bias: Tensor,
    /// Accumulated gradients for weights
    pub grad_weights: Tensor,
    /// Accumulated gradients for bias
    pub grad_bias: Tensor,
}

#[derive(Debug)]
pub struct DenseForwardContext {
    pub input: Tensor,
}

#[derive(Debug)]
pub struct DenseBackwardContext {
    pub grad_weights: Tensor,
    pub grad_bias: Tensor,
}

/// Samples an (inputs, outputs) weight matrix with He initialization
pub(crate) fn he_normal<R: Rng + ?Sized>(
    inputs: usize,
    outputs: usize,
    leaky_relu_alpha: f32,
    rng: &mut R,
) -> Tensor {
    let std_dev = (2.0 / ((1.0 + leaky_relu_alpha.powi(2)) * inputs.max(1) as f32)).sqrt();
    let weights = (0..inputs * outputs)
        .map(|_| rng.sample::<f32, _>(StandardNormal) * std_dev)
        .collect();
    Tensor::new_with_shape(weights, (inputs, outputs))
}

impl Dense {
    /// Creates a layer with He-normal weights and the given bias value
    pub fn new<R: Rng + ?Sized>(
        input_size: usize,
        output_size: usize,
        initial_bias: f32,
        rng: &mut R,
    ) -> Self {
        Self::from_parameters(
            he_normal(input_size, output_size, 0.0, rng),
            Tensor::new_with_shape(vec![initial_bias; output_size], (1, output_size)),
        )
    }

    /// Creates a layer from explicit parameters
    pub fn from_parameters(weights: Tensor, bias: Tensor) -> Self {
        let grad_weights = weights.zeros_like();
        let grad_bias = bias.zeros_like();
        Dense {
            weights,
            bias,
            grad_weights,
            grad_bias,
        }
    }

    pub fn forward(&self, input: Tensor, _training: bool) -> (Tensor, LayerForwardContext) {
        let output = input.matmul(&self.weights).add_row_vector(&self.bias);
        (
            output,
            LayerForwardContext::Dense(DenseForwardContext { input }),
        )
    }

    pub fn backward(
        &self,
        grad_output: Tensor,
        context: &DenseForwardContext,
    ) -> (Tensor, LayerBackwardContext) {
        let grad_input = grad_output.matmul(&self.weights.transpose());
        let grad_weights = context.input.transpose().matmul(&grad_output);
        let grad_bias = grad_output.sum_rows();

        (
            grad_input,
            LayerBackwardContext::Dense(DenseBackwardContext {
                grad_weights,
                grad_bias,
            }),
        )
    }

    /// Accumulates gradients from backward pass
    pub fn update_grads(&mut self, context: &DenseBackwardContext) {
        accumulate(&mut self.grad_weights, &context.grad_weights);
        accumulate(&mut self.grad_bias, &context.grad_bias);
    }

    pub fn get_parameters(&self) -> Vec<&Tensor> {
        vec![&self.weights, &self.bias]
    }

    pub fn get_parameter_pairs(&mut self) -> Vec<(&mut Tensor, &Tensor)> {
        vec![
            (&mut self.weights, &self.grad_weights),
            (&mut self.bias, &self.grad_bias),
        ]
    }

    pub fn clear_grads(&mut self) {
        self.grad_weights.data.fill(0.0);
        self.grad_bias.data.fill(0.0);
    }
}

pub(crate) fn accumulate(dest: &mut Tensor, src: &Tensor) {
    for (d, s) in dest.data.iter_mut().zip(&src.data) {
        *d += s;
    }
}
