use crate::error::{Error, Result};
use crate::tensor::Tensor2;

/// Dense layer: `input · weight + bias`, with `bias` broadcast over rows.
///
/// `weight` is `[in_features][out_features]`.
pub fn affine(input: &Tensor2, weight: &Tensor2, bias: &[f64]) -> Result<Tensor2> {
    let [batch, in_features] = input.shape();
    let [weight_in, out_features] = weight.shape();

    if weight_in != in_features {
        return Err(Error::shape_mismatch(
            "affine weight rows (input features)",
            in_features,
            weight_in,
        ));
    }
    if bias.len() != out_features {
        return Err(Error::shape_mismatch(
            "affine bias length",
            out_features,
            bias.len(),
        ));
    }

    let mut output = Tensor2::zeros([batch, out_features]);
    for i in 0..batch {
        let row = input.row(i);
        for j in 0..out_features {
            let sum: f64 = row
                .iter()
                .enumerate()
                .map(|(k, &x)| x * weight[[k, j]])
                .sum();
            output[[i, j]] = sum + bias[j];
        }
    }

    tracing::trace!(
        input = ?input.shape(),
        output = ?output.shape(),
        "affine"
    );
    Ok(output)
}
