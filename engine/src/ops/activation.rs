use crate::tensor::{Tensor2, Tensor4};

pub fn relu_2d(input: &Tensor2) -> Tensor2 {
    input.map(|x| x.max(0.0))
}

pub fn relu_4d(input: &Tensor4) -> Tensor4 {
    input.map(|x| x.max(0.0))
}

/// Logistic function. Only used to squash activations for display.
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// `2 * sigmoid(x) - 1`, mapping non-negative activations onto `[0, 1)`.
pub fn sigmoid_centered(x: f64) -> f64 {
    2.0 * sigmoid(x) - 1.0
}

/// Row-wise softmax, shifted by each row's maximum before exponentiating.
pub fn softmax(input: &Tensor2) -> Tensor2 {
    let mut output = Tensor2::zeros(input.shape());
    for i in 0..input.rows() {
        let row = input.row(i);
        let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let sum: f64 = row.iter().map(|&x| (x - max).exp()).sum();
        for (j, &x) in row.iter().enumerate() {
            output[[i, j]] = (x - max).exp() / sum;
        }
    }
    output
}
