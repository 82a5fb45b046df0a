use super::dense::{accumulate, he_normal};
use crate::{SparseError, SparseTensor, Tensor};
use rand::Rng;

/// Input projection that multiplies a sparse feature matrix by a dense
/// weight matrix, so wide feature spaces are never densified
#[derive(Debug)]
pub struct SparseDense {
    /// Weight matrix of shape (num_features, outputs)
    pub weights: Tensor,
    /// Bias row of shape (1, outputs)
    pub bias: Tensor,
    pub grad_weights: Tensor,
    pub grad_bias: Tensor,
}

#[derive(Debug)]
pub struct SparseDenseBackwardContext {
    pub grad_weights: Tensor,
    pub grad_bias: Tensor,
}

impl SparseDense {
    pub fn new<R: Rng + ?Sized>(
        num_features: usize,
        output_size: usize,
        initial_bias: f32,
        rng: &mut R,
    ) -> Self {
        Self::from_parameters(
            he_normal(num_features, output_size, 0.0, rng),
            Tensor::new_with_shape(vec![initial_bias; output_size], (1, output_size)),
        )
    }

    pub fn from_parameters(weights: Tensor, bias: Tensor) -> Self {
        let grad_weights = weights.zeros_like();
        let grad_bias = bias.zeros_like();
        SparseDense {
            weights,
            bias,
            grad_weights,
            grad_bias,
        }
    }

    pub fn num_features(&self) -> usize {
        self.weights.shape.0
    }

    pub fn forward(&self, input: &SparseTensor) -> Result<Tensor, SparseError> {
        Ok(input.matmul(&self.weights)?.add_row_vector(&self.bias))
    }

    /// Computes parameter gradients; the sparse input itself needs none
    pub fn backward(
        &self,
        grad_output: &Tensor,
        input: &SparseTensor,
    ) -> Result<SparseDenseBackwardContext, SparseError> {
        Ok(SparseDenseBackwardContext {
            grad_weights: input.transpose_matmul(grad_output)?,
            grad_bias: grad_output.sum_rows(),
        })
    }

    pub fn update_grads(&mut self, context: &SparseDenseBackwardContext) {
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse_batch;
    use crate::test_utils::assert_tensors_close;

    fn layer() -> SparseDense {
        SparseDense::from_parameters(
            Tensor::new_with_shape(
                vec![
                    1.0, 0.0, //
                    0.0, 1.0, //
                    2.0, -1.0, //
                ],
                (3, 2),
            ),
            Tensor::new_with_shape(vec![0.5, 0.0], (1, 2)),
        )
    }

    #[test]
    fn test_forward_from_libsvm_batch() {
        let batch = parse_batch(&["+1 1:0.5 3:2.0", "-1 2:1.0"], 2).unwrap();
        let input = batch.to_sparse_tensor(3).unwrap();

        let output = layer().forward(&input).unwrap();
        let expected = Tensor::new_with_shape(
            vec![
                5.0, -2.0, //
                0.5, 1.0, //
            ],
            (2, 2),
        );
        assert_tensors_close(&output, &expected, 1e-6);
    }

    #[test]
    fn test_backward_touches_only_present_features() {
        let batch = parse_batch(&["+1 1:2.0", "-1 1:1.0"], 2).unwrap();
        let input = batch.to_sparse_tensor(3).unwrap();
        let grad_output = Tensor::new_with_shape(vec![1.0, -1.0, 0.5, 0.5], (2, 2));

        let context = layer().backward(&grad_output, &input).unwrap();
        assert_tensors_close(
            &context.grad_weights,
            &Tensor::new_with_shape(vec![2.5, -1.5, 0.0, 0.0, 0.0, 0.0], (3, 2)),
            1e-6,
        );
        assert_tensors_close(
            &context.grad_bias,
            &Tensor::new_with_shape(vec![1.5, -0.5], (1, 2)),
            1e-6,
        );
    }

    #[test]
    fn test_feature_space_mismatch() {
        let batch = parse_batch(&["+1 1:1.0"], 1).unwrap();
        let input = batch.to_sparse_tensor(5).unwrap();
        assert!(layer().forward(&input).is_err());
    }
}
