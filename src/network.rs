use crate::layers::{Dense, Dropout, LeakyReLU, SparseDense, SparseDenseBackwardContext};
use crate::{
    Layer, LayerBackwardContext, LayerForwardContext, Optimizer, SparseError, SparseTensor, Tensor,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Number of output classes, matching the two-column one-hot labels
pub const NUM_CLASSES: usize = 2;

/// Bias value dense layers start from
const INITIAL_BIAS: f32 = 0.1;

/// Feed-forward classifier over sparse input: a sparse projection followed
/// by an arbitrary stack of dense layers
pub struct Network {
    pub input_layer: SparseDense,
    pub layers: Vec<Layer>,
    /// Optimizer for parameter updates
    pub optimizer: Box<dyn Optimizer>,
}

impl Network {
    pub fn new(input_layer: SparseDense, optimizer: Box<dyn Optimizer>) -> Self {
        Network {
            input_layer,
            layers: Vec::new(),
            optimizer,
        }
    }

    /// Builds `sparse -> [relu -> dropout -> dense]* -> logits`
    ///
    /// # Arguments
    /// * `num_features` - Width of the sparse feature space
    /// * `hidden_units` - Width of each hidden layer, empty for a linear model
    /// * `keep_prob` - Dropout keep probability applied after each hidden layer
    /// * `optimizer` - Optimizer used for every parameter
    /// * `rng` - Source of initial weights
    pub fn classifier<R: Rng + ?Sized>(
        num_features: usize,
        hidden_units: &[usize],
        keep_prob: f32,
        optimizer: Box<dyn Optimizer>,
        rng: &mut R,
    ) -> Self {
        let first_width = hidden_units.first().copied().unwrap_or(NUM_CLASSES);
        let input_layer = SparseDense::new(num_features, first_width, INITIAL_BIAS, rng);
        let mut network = Network::new(input_layer, optimizer);

        let widths: Vec<usize> = hidden_units
            .iter()
            .copied()
            .chain(std::iter::once(NUM_CLASSES))
            .collect();
        for pair in widths.windows(2) {
            network.add_layer(Layer::LeakyReLU(LeakyReLU::relu()));
            network.add_layer(Layer::Dropout(Dropout::with_rng(
                keep_prob,
                StdRng::seed_from_u64(rng.gen()),
            )));
            network.add_layer(Layer::Dense(Dense::new(
                pair[0],
                pair[1],
                INITIAL_BIAS,
                rng,
            )));
        }

        network.initialize_optimizer();
        network
    }

    pub fn add_layer(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    pub fn num_features(&self) -> usize {
        self.input_layer.num_features()
    }

    /// Initializes optimizer with all trainable parameters, input layer first
    pub fn initialize_optimizer(&mut self) {
        let mut all_params = self.input_layer.get_parameters();
        for layer in &self.layers {
            all_params.extend(layer.get_parameters());
        }
        self.optimizer.init(&all_params);
    }

    /// Performs forward pass through the network
    ///
    /// # Returns
    /// Tuple of (logits, forward contexts of the dense stack)
    pub fn forward(
        &self,
        input: &SparseTensor,
        training: bool,
    ) -> Result<(Tensor, Vec<LayerForwardContext>), SparseError> {
        let mut current = self.input_layer.forward(input)?;
        let mut contexts = Vec::with_capacity(self.layers.len());

        for layer in &self.layers {
            let (output, context) = layer.forward(current, training);
            current = output;
            contexts.push(context);
        }

        Ok((current, contexts))
    }

    /// Performs backward pass through the network
    ///
    /// # Returns
    /// Input layer gradients and the dense stack's backward contexts in
    /// reverse layer order
    pub fn backward(
        &self,
        grad_output: Tensor,
        input: &SparseTensor,
        forward_contexts: &[LayerForwardContext],
    ) -> Result<(SparseDenseBackwardContext, Vec<LayerBackwardContext>), SparseError> {
        let mut current = grad_output;
        let mut contexts = Vec::with_capacity(self.layers.len());

        for (layer, forward_context) in self.layers.iter().zip(forward_contexts).rev() {
            let (grad_input, context) = layer.backward(current, forward_context);
            current = grad_input;
            contexts.push(context);
        }

        let input_context = self.input_layer.backward(&current, input)?;
        Ok((input_context, contexts))
    }

    /// Applies one optimizer update from the gradients of a backward pass
    pub fn update_parameters(
        &mut self,
        input_context: &SparseDenseBackwardContext,
        backward_contexts: &[LayerBackwardContext],
        learning_rate: f32,
    ) {
        self.input_layer.update_grads(input_context);
        for (layer, context) in self.layers.iter_mut().rev().zip(backward_contexts) {
            layer.update_state(context);
        }

        let mut param_pairs = self.input_layer.get_parameter_pairs();
        for layer in self.layers.iter_mut() {
            param_pairs.extend(layer.get_parameter_pairs());
        }
        self.optimizer
            .update_parameters(&mut param_pairs, learning_rate);

        self.input_layer.clear_grads();
        for layer in self.layers.iter_mut() {
            layer.clear_grads();
        }
    }
}
