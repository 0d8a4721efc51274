use crate::tensor::{Tensor2, Tensor4};

/// `[batch][C][H][W]` to `[batch][C*H*W]`, channel outermost, then row, then
/// column.
///
/// Dense weights are fitted against exactly this order. Because `Tensor4`
/// stores its buffer in that order already, each batch row is a straight copy.
pub fn flatten_feature_map(input: &Tensor4) -> Tensor2 {
    let [batch, channels, rows, cols] = input.shape();
    Tensor2::from_raw([batch, channels * rows * cols], input.as_slice().to_vec())
}

/// Per-batch `[C][H*W]` planes: each channel's pixels as one flat row.
pub fn flatten_channels(input: &Tensor4) -> Vec<Tensor2> {
    let [batch, channels, rows, cols] = input.shape();
    let plane = channels * rows * cols;
    (0..batch)
        .map(|b| {
            let data = input.as_slice()[b * plane..(b + 1) * plane].to_vec();
            Tensor2::from_raw([channels, rows * cols], data)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_channel_grid() -> Tensor4 {
        let plane = vec![
            vec![1.0, 2.0, 3.0],
            vec![4.0, 5.0, 6.0],
            vec![7.0, 8.0, 9.0],
        ];
        Tensor4::from_nested(vec![vec![plane.clone(), plane]]).unwrap()
    }

    #[test]
    fn flatten_is_channel_major() {
        let flat = flatten_feature_map(&two_channel_grid());
        assert_eq!(flat.shape(), [1, 18]);
        assert_eq!(
            flat.row(0),
            &[
                1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0,
                8.0, 9.0
            ]
        );
    }

    #[test]
    fn flatten_keeps_batches_apart() {
        let data: Vec<f64> = (0..16).map(f64::from).collect();
        let tensor = Tensor4::from_vec([2, 2, 2, 2], data).unwrap();
        let flat = flatten_feature_map(&tensor);
        assert_eq!(flat.shape(), [2, 8]);
        assert_eq!(flat.row(1)[0], 8.0);
        assert_eq!(flat[[0, 4]], tensor[[0, 1, 0, 0]]);
    }

    #[test]
    fn channels_become_flat_planes() {
        let planes = flatten_channels(&two_channel_grid());
        assert_eq!(planes.len(), 1);
        assert_eq!(planes[0].shape(), [2, 9]);
        assert_eq!(planes[0].row(1), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
    }
}
