use crate::{parse_batch, BatchError, BatchReader, Session, SessionError, TrainingConfig};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum TrainingError {
    #[error("failed to parse batch")]
    Batch(#[from] BatchError),

    #[error("session step failed")]
    Session(#[from] SessionError),
}

/// Statistics from a training run
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingStats {
    /// Global step reported by the session when the loop ended
    pub global_step: u64,
    /// Steps run by this worker
    pub local_iterations: u64,
    pub last_loss: f32,
    pub last_accuracy: f32,
    /// Time taken for the whole loop
    pub duration: Duration,
}

/// Drives `session` over batches from `reader` until one of the stop
/// conditions holds:
/// * the session asks to stop
/// * the global step reaches `batches_per_epoch * epochs`
/// * this worker has run `max_iteration` steps
/// * the reader is exhausted
///
/// A batch that fails to parse aborts the run.
pub fn run_training<S: Session>(
    session: &mut S,
    reader: &mut BatchReader,
    config: &TrainingConfig,
) -> Result<TrainingStats, TrainingError> {
    let start = Instant::now();
    session.start()?;

    let max_steps = (reader.batches_per_epoch() as u64).saturating_mul(config.epochs as u64);
    let max_iteration = config.max_iteration();
    info!(
        max_steps,
        max_iteration = ?config.max_iteration,
        batch_size = config.batch_size,
        optimizer = %config.optimizer,
        "starting training"
    );

    let mut stats = TrainingStats {
        global_step: session.global_step(),
        local_iterations: 0,
        last_loss: 0.0,
        last_accuracy: 0.0,
        duration: Duration::ZERO,
    };

    while !session.should_stop()
        && session.global_step() < max_steps
        && stats.local_iterations < max_iteration
    {
        let Some(lines) = reader.next_batch() else {
            break;
        };
        let step_start = Instant::now();

        let batch = parse_batch(&lines, config.batch_size)?;
        let unexpected = batch.count_unexpected_labels();
        if unexpected > 0 {
            warn!(
                unexpected,
                "labels other than +1/-1 in batch, training them as the negative class"
            );
        }

        let output = match session.run_step(&batch) {
            Ok(output) => output,
            // A stop requested between the check and the step ends the run
            Err(SessionError::Stopped) => break,
            Err(e) => return Err(e.into()),
        };

        stats.global_step = output.global_step;
        stats.local_iterations += 1;
        stats.last_loss = output.loss;
        stats.last_accuracy = output.accuracy;

        if config.log_every > 0 && stats.local_iterations % config.log_every == 0 {
            info!(
                step = output.global_step,
                accuracy = output.accuracy,
                loss = output.loss,
                step_time = ?step_start.elapsed(),
                "training step"
            );
        }
    }

    stats.global_step = session.global_step();
    stats.duration = start.elapsed();
    info!(
        global_step = stats.global_step,
        local_iterations = stats.local_iterations,
        duration = ?stats.duration,
        "training finished"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::separable_lines;
    use crate::{LibsvmBatch, LocalSession, StepOutput};

    fn toy_config() -> TrainingConfig {
        TrainingConfig {
            learning_rate: 0.5,
            batch_size: 5,
            epochs: 2,
            num_features: 3,
            hidden_units: vec![],
            keep_prob: 1.0,
            log_every: 1,
            seed: Some(0),
            ..Default::default()
        }
    }

    fn reader(lines: Vec<String>, config: &TrainingConfig) -> BatchReader {
        BatchReader::new(lines, config.batch_size, None, true, Some(1))
    }

    /// Records every batch and requests a stop after `stop_after` steps
    struct ScriptedSession {
        started: bool,
        steps: u64,
        stop_after: u64,
        batch_sizes: Vec<usize>,
    }

    impl ScriptedSession {
        fn new(stop_after: u64) -> Self {
            ScriptedSession {
                started: false,
                steps: 0,
                stop_after,
                batch_sizes: Vec::new(),
            }
        }
    }

    impl Session for ScriptedSession {
        fn start(&mut self) -> Result<(), SessionError> {
            self.started = true;
            Ok(())
        }

        fn should_stop(&self) -> bool {
            self.steps >= self.stop_after
        }

        fn global_step(&self) -> u64 {
            self.steps
        }

        fn run_step(&mut self, batch: &LibsvmBatch) -> Result<StepOutput, SessionError> {
            assert!(self.started);
            self.steps += 1;
            self.batch_sizes.push(batch.batch_size);
            Ok(StepOutput {
                global_step: self.steps,
                loss: 1.0 / self.steps as f32,
                accuracy: 0.5,
            })
        }

        fn evaluate(&self, _batch: &LibsvmBatch) -> Result<StepOutput, SessionError> {
            Err(SessionError::NotStarted)
        }
    }

    #[test]
    fn test_stops_at_epoch_bound() {
        let config = toy_config();
        let mut session = LocalSession::new(&config);
        let mut reader = reader(separable_lines(12), &config);

        let stats = run_training(&mut session, &mut reader, &config).unwrap();
        // Two full batches per epoch, two epochs
        assert_eq!(stats.global_step, 4);
        assert_eq!(stats.local_iterations, 4);
        assert!(stats.last_loss.is_finite());
    }

    #[test]
    fn test_honours_max_iteration() {
        let config = TrainingConfig {
            max_iteration: Some(3),
            epochs: 100,
            ..toy_config()
        };
        let mut session = LocalSession::new(&config);
        let mut reader = reader(separable_lines(10), &config);

        let stats = run_training(&mut session, &mut reader, &config).unwrap();
        assert_eq!(stats.local_iterations, 3);
        assert_eq!(session.global_step(), 3);
    }

    #[test]
    fn test_stop_request_ends_loop() {
        let config = TrainingConfig {
            epochs: 100,
            ..toy_config()
        };
        let mut session = ScriptedSession::new(2);
        let mut reader = reader(separable_lines(10), &config);

        let stats = run_training(&mut session, &mut reader, &config).unwrap();
        assert_eq!(stats.local_iterations, 2);
        assert_eq!(stats.last_loss, 0.5);
        assert_eq!(session.batch_sizes, vec![5, 5]);
    }

    #[test]
    fn test_stopped_before_start_runs_nothing() {
        let config = toy_config();
        let mut session = LocalSession::new(&config);
        session.request_stop();
        let mut reader = reader(separable_lines(10), &config);

        let stats = run_training(&mut session, &mut reader, &config).unwrap();
        assert_eq!(stats.local_iterations, 0);
        assert_eq!(stats.global_step, 0);
    }

    #[test]
    fn test_exhausted_reader_ends_loop() {
        let config = TrainingConfig {
            epochs: 100,
            ..toy_config()
        };
        let mut session = ScriptedSession::new(u64::MAX);
        let mut reader = BatchReader::new(separable_lines(10), 5, Some(1), false, None);

        let stats = run_training(&mut session, &mut reader, &config).unwrap();
        assert_eq!(stats.local_iterations, 2);
    }

    #[test]
    fn test_parse_error_aborts() {
        let config = toy_config();
        let mut session = ScriptedSession::new(u64::MAX);
        let mut lines = separable_lines(5);
        lines[3] = "+1 1:abc".to_string();
        let mut reader = BatchReader::new(lines, 5, None, false, None);

        let result = run_training(&mut session, &mut reader, &config);
        assert!(matches!(
            result,
            Err(TrainingError::Batch(BatchError::Record { row: 3, .. }))
        ));
        assert_eq!(session.steps, 0);
    }

    #[test]
    fn test_reader_batch_size_must_match_config() {
        let config = toy_config();
        let mut session = ScriptedSession::new(u64::MAX);
        let mut reader = BatchReader::new(separable_lines(12), 4, None, false, None);

        let result = run_training(&mut session, &mut reader, &config);
        assert!(matches!(
            result,
            Err(TrainingError::Batch(BatchError::ShapeMismatch {
                records: 4,
                batch_size: 5
            }))
        ));
    }
}
