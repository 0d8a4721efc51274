use crate::error::{Error, Result};
use crate::tensor::Tensor4;

use super::{output_size, source_index};

/// 2-D convolution over `[batch][channel][row][col]` input.
///
/// `filters` is `[filter][channel][row][col]` and `bias` holds one value per
/// filter. Taps that fall in the padding border contribute nothing, which is
/// the same as zero-filling the border. No activation is applied.
pub fn convolve(
    input: &Tensor4,
    filters: &Tensor4,
    bias: &[f64],
    padding: usize,
    stride: usize,
) -> Result<Tensor4> {
    let [batch, channels, rows, cols] = input.shape();
    let [filter_count, filter_channels, filter_rows, filter_cols] = filters.shape();

    if filter_channels != channels {
        return Err(Error::shape_mismatch(
            "convolution filter channels",
            channels,
            filter_channels,
        ));
    }
    if bias.len() != filter_count {
        return Err(Error::shape_mismatch(
            "convolution bias length",
            filter_count,
            bias.len(),
        ));
    }

    let [out_rows, out_cols] = output_size(
        "convolution",
        [rows, cols],
        [filter_rows, filter_cols],
        padding,
        stride,
    )?;

    let mut output = Tensor4::zeros([batch, filter_count, out_rows, out_cols]);
    for b in 0..batch {
        for f in 0..filter_count {
            for i in 0..out_rows {
                for j in 0..out_cols {
                    let mut sum = 0.0;
                    for m in 0..channels {
                        for k in 0..filter_rows {
                            let Some(r) = source_index(i, k, stride, padding, rows) else {
                                continue;
                            };
                            for l in 0..filter_cols {
                                if let Some(c) = source_index(j, l, stride, padding, cols) {
                                    sum += input[[b, m, r, c]] * filters[[f, m, k, l]];
                                }
                            }
                        }
                    }
                    output[[b, f, i, j]] = sum + bias[f];
                }
            }
        }
    }

    tracing::trace!(
        input = ?input.shape(),
        output = ?output.shape(),
        "convolution"
    );
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_filters() -> Tensor4 {
        Tensor4::from_nested(vec![
            vec![vec![vec![1.0, 2.0], vec![3.0, 4.0]]],
            vec![vec![vec![5.0, 6.0], vec![7.0, 8.0]]],
        ])
        .unwrap()
    }

    #[test]
    fn three_by_three_with_two_filters() {
        let pixels: Vec<f64> = (1..=9).map(f64::from).collect();
        let input = Tensor4::from_image(&pixels, 3, 3).unwrap();

        let out = convolve(&input, &two_filters(), &[1.0, 2.0], 0, 1).unwrap();

        assert_eq!(out.shape(), [1, 2, 2, 2]);
        let expected = vec![vec![
            vec![
                vec![1. * 1. + 2. * 2. + 4. * 3. + 5. * 4. + 1., 2. * 1. + 3. * 2. + 5. * 3. + 6. * 4. + 1.],
                vec![4. * 1. + 5. * 2. + 7. * 3. + 8. * 4. + 1., 5. * 1. + 6. * 2. + 8. * 3. + 9. * 4. + 1.],
            ],
            vec![
                vec![1. * 5. + 2. * 6. + 4. * 7. + 5. * 8. + 2., 2. * 5. + 3. * 6. + 5. * 7. + 6. * 8. + 2.],
                vec![4. * 5. + 5. * 6. + 7. * 7. + 8. * 8. + 2., 5. * 5. + 6. * 6. + 8. * 7. + 9. * 8. + 2.],
            ],
        ]];
        assert_eq!(out[[0, 0, 0, 0]], 38.0);
        assert_eq!(out.to_nested(), expected);
    }

    #[test]
    fn padding_matches_explicit_zero_fill() {
        let pixels: Vec<f64> = (1..=9).map(f64::from).collect();
        let input = Tensor4::from_image(&pixels, 3, 3).unwrap();

        let mut padded = Tensor4::zeros([1, 1, 5, 5]);
        for r in 0..3 {
            for c in 0..3 {
                padded[[0, 0, r + 1, c + 1]] = input[[0, 0, r, c]];
            }
        }

        let filters = two_filters();
        let implicit = convolve(&input, &filters, &[0.5, -0.5], 1, 1).unwrap();
        let explicit = convolve(&padded, &filters, &[0.5, -0.5], 0, 1).unwrap();

        assert_eq!(implicit.shape(), [1, 2, 4, 4]);
        assert_eq!(implicit, explicit);
    }

    #[test]
    fn stride_skips_positions() {
        let pixels: Vec<f64> = (0..16).map(f64::from).collect();
        let input = Tensor4::from_image(&pixels, 4, 4).unwrap();
        let filter = Tensor4::from_nested(vec![vec![vec![vec![1.0, 0.0], vec![0.0, 0.0]]]]).unwrap();

        let out = convolve(&input, &filter, &[0.0], 0, 2).unwrap();

        assert_eq!(out.shape(), [1, 1, 2, 2]);
        assert_eq!(out.as_slice(), &[0.0, 2.0, 8.0, 10.0]);
    }

    #[test]
    fn sums_over_input_channels() {
        let input = Tensor4::from_nested(vec![vec![
            vec![vec![1.0, 2.0], vec![3.0, 4.0]],
            vec![vec![10.0, 20.0], vec![30.0, 40.0]],
        ]])
        .unwrap();
        let filter = Tensor4::from_nested(vec![vec![
            vec![vec![1.0, 1.0], vec![1.0, 1.0]],
            vec![vec![0.1, 0.1], vec![0.1, 0.1]],
        ]])
        .unwrap();

        let out = convolve(&input, &filter, &[0.0], 0, 1).unwrap();
        assert_eq!(out.shape(), [1, 1, 1, 1]);
        assert!((out[[0, 0, 0, 0]] - 20.0).abs() < 1e-12);
    }

    #[test]
    fn rejects_inconsistent_parameters() {
        let input = Tensor4::zeros([1, 1, 3, 3]);
        let filters = two_filters();

        let err = convolve(&input, &filters, &[1.0], 0, 1).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }), "{err}");

        let err = convolve(&Tensor4::zeros([1, 2, 3, 3]), &filters, &[1.0, 2.0], 0, 1).unwrap_err();
        assert!(err.to_string().contains("filter channels"), "{err}");

        let err = convolve(&input, &filters, &[1.0, 2.0], 0, 2).unwrap_err();
        assert!(matches!(err, Error::NonIntegralOutput { .. }), "{err}");
    }
}
