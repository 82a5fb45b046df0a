use crate::{LayerBackwardContext, LayerForwardContext, Tensor};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, PoisonError};

/// Inverted dropout parameterized by the probability of keeping a unit
#[derive(Debug)]
pub struct Dropout {
    /// Probability that a unit survives during training
    pub keep_prob: f32,
    rng: Mutex<StdRng>,
}

#[derive(Debug)]
pub struct DropoutForwardContext {
    /// `None` when the layer was a pass-through
    pub mask: Option<Vec<bool>>,
}

#[derive(Debug)]
pub struct DropoutBackwardContext {}

impl Dropout {
    pub fn new(keep_prob: f32) -> Self {
        Self::with_rng(keep_prob, StdRng::from_entropy())
    }

    /// Dropout whose masks are drawn from `rng`, for reproducible runs
    pub fn with_rng(keep_prob: f32, rng: StdRng) -> Self {
        Dropout {
            keep_prob,
            rng: Mutex::new(rng),
        }
    }

    fn scale(&self) -> f32 {
        1.0 / self.keep_prob
    }

    pub fn forward(&self, input: Tensor, training: bool) -> (Tensor, LayerForwardContext) {
        // Evaluation and keep_prob == 1.0 both leave the input untouched
        if !training || self.keep_prob >= 1.0 {
            return (
                input,
                LayerForwardContext::Dropout(DropoutForwardContext { mask: None }),
            );
        }

        let scale = self.scale();
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let mut output = input;
        let mask = output
            .data
            .iter_mut()
            .map(|val| {
                let keep = rng.gen::<f32>() < self.keep_prob;
                *val = if keep { *val * scale } else { 0.0 };
                keep
            })
            .collect();

        (
            output,
            LayerForwardContext::Dropout(DropoutForwardContext { mask: Some(mask) }),
        )
    }

    pub fn backward(
        &self,
        grad_output: Tensor,
        context: &DropoutForwardContext,
    ) -> (Tensor, LayerBackwardContext) {
        let mut output = grad_output;
        if let Some(mask) = &context.mask {
            let scale = self.scale();
            for (grad, &keep) in output.data.iter_mut().zip(mask) {
                *grad = if keep { *grad * scale } else { 0.0 };
            }
        }

        (
            output,
            LayerBackwardContext::Dropout(DropoutBackwardContext {}),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::assert_tensors_close;

    #[test]
    fn test_dropout_eval_is_identity() {
        let input = Tensor::new_with_shape(vec![1.0, 2.0, 3.0], (1, 3));
        let (output, context) = Dropout::new(0.5).forward(input.clone(), false);

        assert_tensors_close(&output, &input, 0.0);
        assert!(matches!(
            context,
            LayerForwardContext::Dropout(DropoutForwardContext { mask: None })
        ));
    }

    #[test]
    fn test_dropout_keep_all() {
        let input = Tensor::new_with_shape(vec![4.0; 8], (2, 4));
        let (output, _) = Dropout::new(1.0).forward(input.clone(), true);
        assert_tensors_close(&output, &input, 0.0);
    }

    #[test]
    fn test_dropout_training_rate_and_scale() {
        let size = 100_000;
        let input = Tensor::new_with_shape(vec![2.0; size], (1, size));
        let dropout = Dropout::new(0.5);

        let (output, context) = dropout.forward(input, true);
        let LayerForwardContext::Dropout(DropoutForwardContext { mask: Some(mask) }) = context
        else {
            panic!()
        };

        let kept = mask.iter().filter(|&&keep| keep).count() as f32 / size as f32;
        assert!((kept - 0.5).abs() < 0.05);

        for (val, &keep) in output.data.iter().zip(&mask) {
            if keep {
                assert!((val - 4.0).abs() < 1e-6);
            } else {
                assert_eq!(*val, 0.0);
            }
        }
    }

    #[test]
    fn test_dropout_same_seed_same_mask() {
        let input = Tensor::new_with_shape(vec![1.0; 64], (4, 16));
        let first = Dropout::with_rng(0.5, StdRng::seed_from_u64(11));
        let second = Dropout::with_rng(0.5, StdRng::seed_from_u64(11));

        for _ in 0..3 {
            let (a, _) = first.forward(input.clone(), true);
            let (b, _) = second.forward(input.clone(), true);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_dropout_backward_follows_mask() {
        let dropout = Dropout::new(0.25);
        let context = DropoutForwardContext {
            mask: Some(vec![true, false, true]),
        };
        let grad = Tensor::new_with_shape(vec![1.0, 1.0, 2.0], (1, 3));

        let (grad_input, _) = dropout.backward(grad, &context);
        assert_tensors_close(
            &grad_input,
            &Tensor::new_with_shape(vec![4.0, 0.0, 8.0], (1, 3)),
            1e-6,
        );
    }
}
