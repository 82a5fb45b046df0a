use crate::{
    calculate_loss, calculate_number_of_correct_outputs, LibsvmBatch, Network, SparseError,
    Tensor, TrainingConfig,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("session has not been started")]
    NotStarted,

    #[error("session was asked to stop")]
    Stopped,

    #[error("batch does not fit the model")]
    Sparse(#[from] SparseError),
}

/// Loss and accuracy of one batch, tagged with the global step they were
/// observed at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutput {
    pub global_step: u64,
    pub loss: f32,
    /// Fraction of rows whose predicted class matches the label
    pub accuracy: f32,
}

/// Execution capability the training loop drives.
///
/// A session owns the model state. The loop only decides when to step and
/// when to stop.
pub trait Session {
    /// Prepares the session; must be called before the first step
    fn start(&mut self) -> Result<(), SessionError>;

    fn should_stop(&self) -> bool;

    /// Parameter updates applied so far
    fn global_step(&self) -> u64;

    /// Runs one training step on `batch` and returns the step it produced
    fn run_step(&mut self, batch: &LibsvmBatch) -> Result<StepOutput, SessionError>;

    /// Scores `batch` without touching the parameters
    fn evaluate(&self, batch: &LibsvmBatch) -> Result<StepOutput, SessionError>;
}

/// Shared flag that lets another thread stop a running session
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// In-process session training a [`Network`] directly
pub struct LocalSession {
    network: Network,
    learning_rate: f32,
    global_step: u64,
    started: bool,
    stop: StopHandle,
}

impl LocalSession {
    /// Builds the classifier described by `config`
    pub fn new(config: &TrainingConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let network = Network::classifier(
            config.num_features,
            &config.hidden_units,
            config.keep_prob,
            config.optimizer.build(),
            &mut rng,
        );
        Self::from_network(network, config.learning_rate)
    }

    pub fn from_network(network: Network, learning_rate: f32) -> Self {
        LocalSession {
            network,
            learning_rate,
            global_step: 0,
            started: false,
            stop: StopHandle::new(),
        }
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn request_stop(&self) {
        self.stop.request_stop();
    }

    /// Returns (softmax output, one-hot targets) for `batch`
    fn score(&self, batch: &LibsvmBatch, training: bool) -> Result<(Tensor, Tensor), SessionError> {
        let input = batch.to_sparse_tensor(self.network.num_features())?;
        let (logits, _) = self.network.forward(&input, training)?;
        Ok((logits.softmax(), batch.one_hot_tensor()))
    }

    fn step_output(&self, output: &Tensor, targets: &Tensor) -> StepOutput {
        let rows = output.rows().max(1) as f32;
        StepOutput {
            global_step: self.global_step,
            loss: calculate_loss(output, targets),
            accuracy: calculate_number_of_correct_outputs(output, targets) / rows,
        }
    }
}

/// Gradient of mean softmax cross-entropy with respect to the logits
fn output_gradient(output: &Tensor, targets: &Tensor) -> Tensor {
    let rows = output.rows().max(1) as f32;
    let data = output
        .data
        .iter()
        .zip(&targets.data)
        .map(|(&p, &t)| (p - t) / rows)
        .collect();
    Tensor::new_with_shape(data, output.shape)
}

impl Session for LocalSession {
    fn start(&mut self) -> Result<(), SessionError> {
        if !self.started {
            self.started = true;
            info!(
                num_features = self.network.num_features(),
                layers = self.network.layers.len(),
                "local session started"
            );
        }
        Ok(())
    }

    fn should_stop(&self) -> bool {
        self.stop.is_stopped()
    }

    fn global_step(&self) -> u64 {
        self.global_step
    }

    fn run_step(&mut self, batch: &LibsvmBatch) -> Result<StepOutput, SessionError> {
        if !self.started {
            return Err(SessionError::NotStarted);
        }
        if self.should_stop() {
            return Err(SessionError::Stopped);
        }

        let input = batch.to_sparse_tensor(self.network.num_features())?;
        let targets = batch.one_hot_tensor();

        let (logits, forward_contexts) = self.network.forward(&input, true)?;
        let output = logits.softmax();

        let grad = output_gradient(&output, &targets);
        let (input_context, backward_contexts) =
            self.network.backward(grad, &input, &forward_contexts)?;
        self.network
            .update_parameters(&input_context, &backward_contexts, self.learning_rate);

        self.global_step += 1;
        let step = self.step_output(&output, &targets);
        debug!(
            global_step = step.global_step,
            nnz = input.nnz(),
            loss = step.loss,
            "applied step"
        );
        Ok(step)
    }

    fn evaluate(&self, batch: &LibsvmBatch) -> Result<StepOutput, SessionError> {
        let (output, targets) = self.score(batch, false)?;
        Ok(self.step_output(&output, &targets))
    }
}
