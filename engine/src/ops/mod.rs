//! Tensor operators of the forward pass.
//!
//! Every operator reads only its arguments and allocates only its output.

mod activation;
mod affine;
mod conv;
pub(crate) mod pool;
mod reshape;

pub use activation::{relu_2d, relu_4d, sigmoid, sigmoid_centered, softmax};
pub use affine::affine;
pub use conv::convolve;
pub use pool::max_pool;
pub use reshape::{flatten_channels, flatten_feature_map};

use crate::error::{Error, Result};

/// Output spatial size of a sliding window: `(extent + 2p - window) / stride + 1`
/// per axis.
///
/// Rejects an empty input, a zero stride or window, padding too large to
/// represent, a window larger than the padded input, and any configuration
/// where the division leaves a remainder.
pub fn output_size(
    layer: &'static str,
    extent: [usize; 2],
    window: [usize; 2],
    padding: usize,
    stride: usize,
) -> Result<[usize; 2]> {
    if stride == 0 {
        return Err(Error::InvalidConfig {
            parameter: "stride",
            reason: format!("{layer} stride must be at least 1"),
        });
    }

    let mut out = [0; 2];
    for (axis, name) in ["rows", "cols"].into_iter().enumerate() {
        if window[axis] == 0 {
            return Err(Error::InvalidConfig {
                parameter: "window",
                reason: format!("{layer} window {name} must be at least 1"),
            });
        }
        if extent[axis] == 0 {
            return Err(Error::InvalidConfig {
                parameter: "input",
                reason: format!("{layer} input {name} must be at least 1"),
            });
        }
        let padded = padding
            .checked_mul(2)
            .and_then(|border| extent[axis].checked_add(border))
            .ok_or_else(|| Error::InvalidConfig {
                parameter: "padding",
                reason: format!("{layer} padding {padding} overflows the padded {name}"),
            })?;
        let span = padded.checked_sub(window[axis]).ok_or_else(|| Error::InvalidConfig {
            parameter: "window",
            reason: format!(
                "{layer} window {name} {} exceeds padded input {padded}",
                window[axis]
            ),
        })?;
        if span % stride != 0 {
            return Err(Error::NonIntegralOutput {
                layer,
                axis: name,
                extent: extent[axis],
                window: window[axis],
                padding,
                stride,
            });
        }
        out[axis] = span / stride + 1;
    }
    Ok(out)
}

/// Maps an output coordinate plus window offset back onto the unpadded input,
/// or `None` when it lands in the padding border.
#[inline]
pub(crate) fn source_index(
    out: usize,
    offset: usize,
    stride: usize,
    padding: usize,
    extent: usize,
) -> Option<usize> {
    (out * stride + offset)
        .checked_sub(padding)
        .filter(|&idx| idx < extent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_size_follows_sliding_window_law() {
        assert_eq!(output_size("conv", [28, 28], [5, 5], 0, 1).unwrap(), [24, 24]);
        assert_eq!(output_size("pool", [24, 24], [2, 2], 0, 2).unwrap(), [12, 12]);
        assert_eq!(output_size("conv", [28, 28], [5, 5], 2, 1).unwrap(), [28, 28]);
        assert_eq!(output_size("conv", [3, 5], [2, 3], 0, 1).unwrap(), [2, 3]);
    }

    #[test]
    fn output_size_rejects_remainders() {
        let err = output_size("pool", [5, 4], [2, 2], 0, 2).unwrap_err();
        match err {
            Error::NonIntegralOutput { layer, axis, extent, .. } => {
                assert_eq!((layer, axis, extent), ("pool", "rows", 5));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn output_size_rejects_degenerate_windows() {
        assert!(matches!(
            output_size("conv", [4, 4], [2, 2], 0, 0),
            Err(Error::InvalidConfig { parameter: "stride", .. })
        ));
        assert!(matches!(
            output_size("conv", [2, 2], [3, 3], 0, 1),
            Err(Error::InvalidConfig { parameter: "window", .. })
        ));
        assert!(output_size("conv", [2, 2], [3, 3], 1, 1).is_ok());
    }

    #[test]
    fn output_size_rejects_unrepresentable_padding() {
        assert!(matches!(
            output_size("conv", [28, 28], [5, 5], usize::MAX / 2 + 1, 1),
            Err(Error::InvalidConfig { parameter: "padding", .. })
        ));
        assert!(matches!(
            output_size("conv", [28, 28], [5, 5], usize::MAX / 2, 1),
            Err(Error::InvalidConfig { parameter: "padding", .. })
        ));
    }

    #[test]
    fn output_size_rejects_empty_input() {
        assert!(matches!(
            output_size("pool", [0, 4], [2, 2], 1, 1),
            Err(Error::InvalidConfig { parameter: "input", .. })
        ));
        assert!(matches!(
            output_size("pool", [4, 0], [2, 2], 1, 1),
            Err(Error::InvalidConfig { parameter: "input", .. })
        ));
    }

    #[test]
    fn source_index_skips_padding_border() {
        assert_eq!(source_index(0, 0, 1, 1, 4), None);
        assert_eq!(source_index(0, 1, 1, 1, 4), Some(0));
        assert_eq!(source_index(3, 2, 1, 1, 4), None);
        assert_eq!(source_index(1, 1, 2, 0, 4), Some(3));
    }
}
