use crate::error::{Error, Result};
use crate::tensor::Tensor4;

use super::{output_size, source_index};

/// Max pooling over each `[batch][channel]` plane.
///
/// Window cells outside the input are left out of the maximum instead of
/// counting as zero, so an all-negative edge window still yields its largest
/// negative value.
pub fn max_pool(
    input: &Tensor4,
    pool_rows: usize,
    pool_cols: usize,
    stride: usize,
    padding: usize,
) -> Result<Tensor4> {
    let [batch, channels, rows, cols] = input.shape();
    let [out_rows, out_cols] =
        output_size("pooling", [rows, cols], [pool_rows, pool_cols], padding, stride)?;
    check_padding(padding, pool_rows, pool_cols)?;

    let mut output = Tensor4::zeros([batch, channels, out_rows, out_cols]);
    for b in 0..batch {
        for c in 0..channels {
            for i in 0..out_rows {
                for j in 0..out_cols {
                    let mut max = f64::NEG_INFINITY;
                    for k in 0..pool_rows {
                        let Some(r) = source_index(i, k, stride, padding, rows) else {
                            continue;
                        };
                        for l in 0..pool_cols {
                            if let Some(col) = source_index(j, l, stride, padding, cols) {
                                max = max.max(input[[b, c, r, col]]);
                            }
                        }
                    }
                    output[[b, c, i, j]] = max;
                }
            }
        }
    }

    tracing::trace!(
        input = ?input.shape(),
        output = ?output.shape(),
        "max pooling"
    );
    Ok(output)
}

/// A window sitting entirely in the border would have no cell to take a
/// maximum over.
pub(crate) fn check_padding(padding: usize, pool_rows: usize, pool_cols: usize) -> Result<()> {
    if padding >= pool_rows || padding >= pool_cols {
        return Err(Error::InvalidConfig {
            parameter: "padding",
            reason: format!(
                "pooling padding {padding} must be smaller than the {pool_rows}x{pool_cols} window"
            ),
        });
    }
    Ok(())
}
