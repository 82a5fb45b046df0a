/// Row-major two-dimensional tensor used by the model layers
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    /// Flattened storage of tensor elements
    pub data: Vec<f32>,
    /// Shape as (rows, columns)
    pub shape: (usize, usize),
}

impl Tensor {
    /// Creates a new tensor with default shape (1, n)
    pub fn new(data: Vec<f32>) -> Self {
        let n = data.len();
        Tensor {
            data,
            shape: (1, n),
        }
    }

    /// Creates a new tensor with specified shape
    pub fn new_with_shape(data: Vec<f32>, shape: (usize, usize)) -> Self {
        debug_assert_eq!(data.len(), shape.0 * shape.1);
        Tensor { data, shape }
    }

    pub fn zeros(shape: (usize, usize)) -> Self {
        Tensor {
            data: vec![0.0; shape.0 * shape.1],
            shape,
        }
    }

    /// Creates a zero-filled tensor with same shape as self
    pub fn zeros_like(&self) -> Self {
        Self::zeros(self.shape)
    }

    pub fn rows(&self) -> usize {
        self.shape.0
    }

    pub fn cols(&self) -> usize {
        self.shape.1
    }

    /// Borrows one row as a slice
    pub fn row(&self, row: usize) -> &[f32] {
        let cols = self.shape.1;
        &self.data[row * cols..(row + 1) * cols]
    }

    /// Matrix multiplication, `self` is (m, n) and `other` is (n, p)
    pub fn matmul(&self, other: &Tensor) -> Tensor {
        let (m, n) = self.shape;
        let (inner, p) = other.shape;
        assert_eq!(n, inner, "matmul shape mismatch: {:?} x {:?}", self.shape, other.shape);

        let mut result = vec![0.0; m * p];
        for (i, out_row) in result.chunks_mut(p.max(1)).enumerate().take(m) {
            for (k, &a) in self.data[i * n..(i + 1) * n].iter().enumerate() {
                if a == 0.0 {
                    continue;
                }
                let other_row = &other.data[k * p..(k + 1) * p];
                for (out, &b) in out_row.iter_mut().zip(other_row) {
                    *out += a * b;
                }
            }
        }

        Tensor::new_with_shape(result, (m, p))
    }

    pub fn transpose(&self) -> Tensor {
        let (rows, cols) = self.shape;
        let mut result = vec![0.0; self.data.len()];
        for i in 0..rows {
            for j in 0..cols {
                result[j * rows + i] = self.data[i * cols + j];
            }
        }
        Tensor::new_with_shape(result, (cols, rows))
    }

    /// Adds a (1, cols) row vector to every row
    pub fn add_row_vector(mut self, bias: &Tensor) -> Tensor {
        let cols = self.shape.1;
        for row in self.data.chunks_mut(cols.max(1)) {
            for (val, &b) in row.iter_mut().zip(&bias.data) {
                *val += b;
            }
        }
        self
    }

    /// Sums over the row axis, producing a (1, cols) tensor
    pub fn sum_rows(&self) -> Tensor {
        let cols = self.shape.1;
        let mut sums = vec![0.0; cols];
        for row in self.data.chunks(cols.max(1)) {
            for (sum, &val) in sums.iter_mut().zip(row) {
                *sum += val;
            }
        }
        Tensor::new_with_shape(sums, (1, cols))
    }

    /// Applies softmax function across each row
    pub fn softmax(&self) -> Tensor {
        let cols = self.shape.1;
        let mut data = self.data.clone();

        for row in data.chunks_mut(cols.max(1)) {
            // Subtract the row max for numerical stability
            let max_val = row.iter().copied().fold(f32::MIN, f32::max);
            let mut sum = 0.0;
            for val in row.iter_mut() {
                *val = (*val - max_val).exp();
                sum += *val;
            }
            row.iter_mut().for_each(|val| *val /= sum);
        }

        Tensor {
            data,
            shape: self.shape,
        }
    }

    /// Index of the largest element in each row, first one wins on ties
    pub fn argmax_rows(&self) -> Vec<usize> {
        (0..self.shape.0)
            .map(|row| {
                let mut best = 0;
                for (j, &val) in self.row(row).iter().enumerate() {
                    if val > self.row(row)[best] {
                        best = j;
                    }
                }
                best
            })
            .collect()
    }
}
