use crate::{SparseError, SparseTensor, Tensor};
use std::num::{ParseFloatError, ParseIntError};
use thiserror::Error;

/// Label token selecting the positive class
pub const POSITIVE_LABEL: &str = "+1";

/// Label token conventionally used for the negative class
pub const NEGATIVE_LABEL: &str = "-1";

/// Failure while parsing a single libsvm record
#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error("empty record")]
    EmptyRecord,

    #[error("feature token `{token}` is not of the form index:value")]
    MalformedFeature { token: String },

    #[error("invalid feature index `{token}`")]
    InvalidIndex {
        token: String,
        #[source]
        source: ParseIntError,
    },

    #[error("invalid feature value `{token}`")]
    InvalidValue {
        token: String,
        #[source]
        source: ParseFloatError,
    },

    #[error("feature index `{token}` does not fit a zero-based i64")]
    IndexOverflow { token: String },

    #[error("feature value `{token}` is not a finite f32")]
    NonFiniteValue { token: String },
}

/// Failure while assembling a batch; the whole batch is discarded
#[derive(Debug, Error, PartialEq)]
pub enum BatchError {
    #[error("record {row} is malformed")]
    Record {
        row: usize,
        #[source]
        source: RecordError,
    },

    #[error("cannot reshape {records} records into a batch of {batch_size}")]
    ShapeMismatch { records: usize, batch_size: usize },
}

/// One parsed libsvm line
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRecord {
    /// Raw label token, unconverted
    pub label: String,
    /// `[1, 0]` for the positive class, `[0, 1]` otherwise
    pub one_hot_label: [i32; 2],
    /// Zero-based feature indices, unchecked
    pub indices: Vec<i64>,
    /// Feature values aligned with `indices`
    pub values: Vec<f32>,
}

/// A parsed mini-batch ready for sparse tensor construction
#[derive(Debug, Clone, PartialEq)]
pub struct LibsvmBatch {
    /// `batch_size x 2` one-hot labels
    pub labels_one_hot: Vec<[i32; 2]>,
    /// `batch_size x 1` raw label tokens
    pub labels: Vec<String>,
    /// Every emitted feature index, in order
    pub feature_ids: Vec<i64>,
    /// `(row, feature_index)` coordinate per non-zero entry
    pub sparse_row_indices: Vec<[i64; 2]>,
    /// Values aligned positionally with `sparse_row_indices`
    pub sparse_values: Vec<f32>,
    pub batch_size: usize,
}

/// Returns the one-hot encoding for a label token.
///
/// Only an exact `"+1"` is positive. Every other token, malformed ones
/// included, lands in the negative class.
pub fn one_hot_for_label(label: &str) -> [i32; 2] {
    if label == POSITIVE_LABEL {
        [1, 0]
    } else {
        [0, 1]
    }
}

/// Parses a single `index:value` token into a zero-based index and a value
fn parse_feature(token: &str) -> Result<(i64, f32), RecordError> {
    let mut parts = token.split(':');
    let (index_str, value_str) = match (parts.next(), parts.next(), parts.next()) {
        (Some(index), Some(value), None) if !token.is_empty() => (index, value),
        _ => {
            return Err(RecordError::MalformedFeature {
                token: token.to_string(),
            })
        }
    };

    let index = index_str
        .parse::<i64>()
        .map_err(|source| RecordError::InvalidIndex {
            token: index_str.to_string(),
            source,
        })?;
    let wide = value_str
        .parse::<f64>()
        .map_err(|source| RecordError::InvalidValue {
            token: value_str.to_string(),
            source,
        })?;
    let value = wide as f32;
    if !value.is_finite() {
        return Err(RecordError::NonFiniteValue {
            token: value_str.to_string(),
        });
    }

    // libsvm indices are 1-based
    let index = index
        .checked_sub(1)
        .ok_or_else(|| RecordError::IndexOverflow {
            token: index_str.to_string(),
        })?;
    Ok((index, value))
}

/// Parses one libsvm line, `<label> <idx>:<val> <idx>:<val> ...`
///
/// Fields are separated by single spaces. A single trailing line
/// terminator is accepted, any other stray whitespace is a format error.
pub fn parse_line(line: &str) -> Result<ParsedRecord, RecordError> {
    let line = line
        .strip_suffix("\r\n")
        .or_else(|| line.strip_suffix('\n'))
        .unwrap_or(line);

    if line.is_empty() {
        return Err(RecordError::EmptyRecord);
    }

    let mut fields = line.split(' ');
    let label = fields.next().unwrap_or_default().to_string();
    let one_hot_label = one_hot_for_label(&label);

    let mut indices = Vec::new();
    let mut values = Vec::new();
    for token in fields {
        let (index, value) = parse_feature(token)?;
        indices.push(index);
        values.push(value);
    }

    Ok(ParsedRecord {
        label,
        one_hot_label,
        indices,
        values,
    })
}

/// Parses a batch of raw lines into labels and flattened sparse coordinates
///
/// # Arguments
/// * `raw_lines` - Lines in batch order, the position of a line is its row
/// * `batch_size` - Declared number of records, must equal the line count
///
/// # Returns
/// The assembled batch, or the first error encountered. No partial batch
/// is ever returned.
pub fn parse_batch<S: AsRef<str>>(
    raw_lines: &[S],
    batch_size: usize,
) -> Result<LibsvmBatch, BatchError> {
    let mut labels = Vec::with_capacity(raw_lines.len());
    let mut labels_one_hot = Vec::with_capacity(raw_lines.len());
    let mut feature_ids = Vec::new();
    let mut sparse_row_indices = Vec::new();
    let mut sparse_values = Vec::new();

    for (row, line) in raw_lines.iter().enumerate() {
        let record =
            parse_line(line.as_ref()).map_err(|source| BatchError::Record { row, source })?;

        for &index in &record.indices {
            sparse_row_indices.push([row as i64, index]);
        }
        feature_ids.extend_from_slice(&record.indices);
        sparse_values.extend_from_slice(&record.values);
        labels_one_hot.push(record.one_hot_label);
        labels.push(record.label);
    }

    if labels_one_hot.len() != batch_size {
        return Err(BatchError::ShapeMismatch {
            records: labels_one_hot.len(),
            batch_size,
        });
    }

    Ok(LibsvmBatch {
        labels_one_hot,
        labels,
        feature_ids,
        sparse_row_indices,
        sparse_values,
        batch_size,
    })
}

impl LibsvmBatch {
    /// Number of non-zero feature entries across the batch
    pub fn nnz(&self) -> usize {
        self.sparse_values.len()
    }

    /// One-hot labels as a `(batch_size, 2)` tensor
    pub fn one_hot_tensor(&self) -> Tensor {
        let data = self
            .labels_one_hot
            .iter()
            .flat_map(|pair| pair.iter().map(|&v| v as f32))
            .collect();
        Tensor::new_with_shape(data, (self.batch_size, 2))
    }

    /// Builds the `(batch_size, num_features)` sparse feature matrix,
    /// rejecting indices that fall outside the feature space
    pub fn to_sparse_tensor(&self, num_features: usize) -> Result<SparseTensor, SparseError> {
        SparseTensor::new(
            self.sparse_row_indices.clone(),
            self.sparse_values.clone(),
            (self.batch_size, num_features),
        )
    }

    /// Counts labels that are neither `+1` nor `-1`; these still train as negatives
    pub fn count_unexpected_labels(&self) -> usize {
        self.labels
            .iter()
            .filter(|label| label.as_str() != POSITIVE_LABEL && label.as_str() != NEGATIVE_LABEL)
            .count()
    }
}
