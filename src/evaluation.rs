use crate::{parse_batch, BatchReader, Session, Tensor, TrainingError};
use tracing::debug;

/// Probabilities are clamped into `[EPSILON, 1 - EPSILON]` before the log
const EPSILON: f32 = 1e-15;

/// Calculates number of correct predictions from model outputs
///
/// # Arguments
/// * `output` - Model output probabilities, one row per sample
/// * `targets` - One-hot targets with the same shape
pub fn calculate_number_of_correct_outputs(output: &Tensor, targets: &Tensor) -> f32 {
    output
        .argmax_rows()
        .into_iter()
        .zip(targets.argmax_rows())
        .filter(|(predicted, expected)| predicted == expected)
        .count() as f32
}

/// Mean cross-entropy between output probabilities and one-hot targets
pub fn calculate_loss(output: &Tensor, targets: &Tensor) -> f32 {
    let rows = output.shape.0;
    if rows == 0 {
        return 0.0;
    }

    let loss: f32 = output
        .data
        .iter()
        .zip(&targets.data)
        .filter(|(_, &target)| target > 0.0)
        .map(|(&pred, &target)| -target * pred.clamp(EPSILON, 1.0 - EPSILON).ln())
        .sum();
    loss / rows as f32
}

/// Evaluates accuracy over every batch the reader yields.
///
/// Batches may be shorter than `batch_size`, so a reader built with
/// [`BatchReader::keep_partial_batches`] scores every record. Accuracy is
/// weighted by the number of records in each batch.
///
/// # Returns
/// Accuracy percentage, `None` when the reader yields no records
pub fn evaluate_dataset<S: Session>(
    session: &S,
    reader: &mut BatchReader,
    batch_size: usize,
) -> Result<Option<f32>, TrainingError> {
    let mut total_correct = 0.0;
    let mut total_samples = 0;

    while let Some(lines) = reader.next_batch() {
        let batch = parse_batch(&lines, lines.len().min(batch_size))?;
        let output = session.evaluate(&batch)?;
        debug!(
            records = batch.batch_size,
            accuracy = output.accuracy,
            loss = output.loss,
            "evaluated batch"
        );

        total_correct += output.accuracy * batch.batch_size as f32;
        total_samples += batch.batch_size;
    }

    if total_samples == 0 {
        return Ok(None);
    }
    Ok(Some(total_correct / total_samples as f32 * 100.0))
}
