use crate::Tensor;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SparseError {
    #[error("{indices} coordinates but {values} values")]
    LengthMismatch { indices: usize, values: usize },

    #[error("row {row} outside of dense shape ({rows}, {cols})")]
    RowOutOfRange { row: i64, rows: usize, cols: usize },

    #[error("feature index {index} outside of dense shape ({rows}, {cols})")]
    IndexOutOfRange { index: i64, rows: usize, cols: usize },

    #[error("cannot multiply {left:?} by {right:?}")]
    ShapeMismatch {
        left: (usize, usize),
        right: (usize, usize),
    },
}

/// Coordinate-format sparse matrix with a validated dense shape
#[derive(Debug, Clone, PartialEq)]
pub struct SparseTensor {
    entries: Vec<(usize, usize, f32)>,
    /// Dense shape as (rows, columns)
    pub dense_shape: (usize, usize),
}

impl SparseTensor {
    /// Builds a sparse tensor from `(row, column)` coordinates and values.
    ///
    /// Every coordinate must lie inside `dense_shape`; negative coordinates
    /// are rejected as out of range.
    pub fn new(
        indices: Vec<[i64; 2]>,
        values: Vec<f32>,
        dense_shape: (usize, usize),
    ) -> Result<Self, SparseError> {
        if indices.len() != values.len() {
            return Err(SparseError::LengthMismatch {
                indices: indices.len(),
                values: values.len(),
            });
        }

        let (rows, cols) = dense_shape;
        let mut entries = Vec::with_capacity(values.len());
        for ([row, col], value) in indices.into_iter().zip(values) {
            let r = usize::try_from(row)
                .ok()
                .filter(|&r| r < rows)
                .ok_or(SparseError::RowOutOfRange { row, rows, cols })?;
            let c = usize::try_from(col)
                .ok()
                .filter(|&c| c < cols)
                .ok_or(SparseError::IndexOutOfRange {
                    index: col,
                    rows,
                    cols,
                })?;
            entries.push((r, c, value));
        }

        Ok(SparseTensor {
            entries,
            dense_shape,
        })
    }

    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    /// Computes `self * dense`, a (rows, dense.cols) tensor
    pub fn matmul(&self, dense: &Tensor) -> Result<Tensor, SparseError> {
        let (rows, cols) = self.dense_shape;
        if dense.shape.0 != cols {
            return Err(SparseError::ShapeMismatch {
                left: self.dense_shape,
                right: dense.shape,
            });
        }

        let p = dense.shape.1;
        let mut result = Tensor::zeros((rows, p));
        for &(r, c, value) in &self.entries {
            let out = &mut result.data[r * p..(r + 1) * p];
            for (o, &w) in out.iter_mut().zip(dense.row(c)) {
                *o += value * w;
            }
        }
        Ok(result)
    }

    /// Computes `self^T * dense`, a (cols, dense.cols) tensor
    pub fn transpose_matmul(&self, dense: &Tensor) -> Result<Tensor, SparseError> {
        let (rows, cols) = self.dense_shape;
        if dense.shape.0 != rows {
            return Err(SparseError::ShapeMismatch {
                left: (cols, rows),
                right: dense.shape,
            });
        }

        let p = dense.shape.1;
        let mut result = Tensor::zeros((cols, p));
        for &(r, c, value) in &self.entries {
            let out = &mut result.data[c * p..(c + 1) * p];
            for (o, &g) in out.iter_mut().zip(dense.row(r)) {
                *o += value * g;
            }
        }
        Ok(result)
    }

    /// Materializes the dense matrix, duplicate coordinates are summed
    pub fn to_dense(&self) -> Tensor {
        let (rows, cols) = self.dense_shape;
        let mut dense = Tensor::zeros((rows, cols));
        for &(r, c, value) in &self.entries {
            dense.data[r * cols + c] += value;
        }
        dense
    }
}
