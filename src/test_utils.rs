#[cfg(test)]
use crate::Tensor;

/// Asserts that two floating point values are approximately equal
#[cfg(test)]
pub fn assert_close(a: f32, b: f32, epsilon: f32) {
    assert!((a - b).abs() <= epsilon, "{} != {} (epsilon {})", a, b, epsilon);
}

/// Asserts that two tensors share a shape and agree element-wise within `epsilon`
#[cfg(test)]
pub fn assert_tensors_close(a: &Tensor, b: &Tensor, epsilon: f32) {
    assert_eq!(a.shape, b.shape);
    for (x, y) in a.data.iter().zip(b.data.iter()) {
        assert_close(*x, *y, epsilon);
    }
}

/// Builds `count` linearly separable libsvm lines over `num_features` features:
/// positives carry weight on feature 1, negatives on feature 2
#[cfg(test)]
pub fn separable_lines(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            if i % 2 == 0 {
                format!("+1 1:1.0 3:{:.2}", (i % 7) as f32 * 0.1)
            } else {
                format!("-1 2:1.0 3:{:.2}", (i % 5) as f32 * 0.1)
            }
        })
        .collect()
}
