//! Dense row-major tensors.
//!
//! Both tensor kinds keep one contiguous buffer plus a fixed-rank shape. Their
//! serde form is the nested-array layout (`[[[[..]]]]` / `[[..]]`), so a
//! jagged array is rejected while decoding rather than at first use.

use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// `[batch][channel][row][col]` in nested form.
pub type Nested4 = Vec<Vec<Vec<Vec<f64>>>>;
/// `[row][col]` in nested form.
pub type Nested2 = Vec<Vec<f64>>;

/// Four-dimensional tensor laid out as `[batch][channel][row][col]`.
///
/// Used for input images, convolution filter banks and feature maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Nested4", into = "Nested4")]
pub struct Tensor4 {
    shape: [usize; 4],
    data: Vec<f64>,
}

impl Tensor4 {
    pub fn from_vec(shape: [usize; 4], data: Vec<f64>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(Error::shape_mismatch(
                format!("4-D tensor of shape {shape:?}"),
                expected,
                data.len(),
            ));
        }
        Ok(Self { shape, data })
    }

    pub fn zeros(shape: [usize; 4]) -> Self {
        Self {
            shape,
            data: vec![0.0; shape.iter().product()],
        }
    }

    /// Builds a tensor from nested vectors, failing on any ragged level.
    pub fn from_nested(nested: Nested4) -> Result<Self> {
        let batch = nested.len();
        let channels = nested.first().map_or(0, Vec::len);
        let rows = nested
            .first()
            .and_then(|b| b.first())
            .map_or(0, Vec::len);
        let cols = nested
            .first()
            .and_then(|b| b.first())
            .and_then(|c| c.first())
            .map_or(0, Vec::len);

        let mut data = Vec::with_capacity(batch * channels * rows * cols);
        for (b, planes) in nested.into_iter().enumerate() {
            if planes.len() != channels {
                return Err(ragged4(format!(
                    "batch {b} has {} channels, expected {channels}",
                    planes.len()
                )));
            }
            for (c, plane) in planes.into_iter().enumerate() {
                if plane.len() != rows {
                    return Err(ragged4(format!(
                        "[{b}][{c}] has {} rows, expected {rows}",
                        plane.len()
                    )));
                }
                for (r, row) in plane.into_iter().enumerate() {
                    if row.len() != cols {
                        return Err(ragged4(format!(
                            "[{b}][{c}][{r}] has {} columns, expected {cols}",
                            row.len()
                        )));
                    }
                    data.extend(row);
                }
            }
        }

        Ok(Self {
            shape: [batch, channels, rows, cols],
            data,
        })
    }

    /// Wraps one flat, row-major, single-channel image as `[1][1][rows][cols]`.
    pub fn from_image(pixels: &[f64], rows: usize, cols: usize) -> Result<Self> {
        if pixels.len() != rows * cols {
            return Err(Error::shape_mismatch(
                format!("{rows}x{cols} image"),
                rows * cols,
                pixels.len(),
            ));
        }
        Ok(Self {
            shape: [1, 1, rows, cols],
            data: pixels.to_vec(),
        })
    }

    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    /// Element-wise transform into a tensor of the same shape.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            shape: self.shape,
            data: self.data.iter().map(|&x| f(x)).collect(),
        }
    }

    pub fn to_nested(&self) -> Nested4 {
        let [_, channels, rows, cols] = self.shape;
        if rows == 0 || cols == 0 || channels == 0 {
            return vec![vec![vec![Vec::new(); rows]; channels]; self.shape[0]];
        }
        self.data
            .chunks(channels * rows * cols)
            .map(|batch| {
                batch
                    .chunks(rows * cols)
                    .map(|plane| plane.chunks(cols).map(<[f64]>::to_vec).collect())
                    .collect()
            })
            .collect()
    }

    #[inline]
    fn offset(&self, [b, c, r, col]: [usize; 4]) -> usize {
        let [_, channels, rows, cols] = self.shape;
        debug_assert!(
            b < self.shape[0] && c < channels && r < rows && col < cols,
            "index [{b}, {c}, {r}, {col}] out of bounds for shape {:?}",
            self.shape
        );
        ((b * channels + c) * rows + r) * cols + col
    }
}

fn ragged4(detail: String) -> Error {
    Error::Malformed {
        tensor: "4-D tensor",
        detail,
    }
}

impl Index<[usize; 4]> for Tensor4 {
    type Output = f64;

    fn index(&self, index: [usize; 4]) -> &f64 {
        &self.data[self.offset(index)]
    }
}

impl IndexMut<[usize; 4]> for Tensor4 {
    fn index_mut(&mut self, index: [usize; 4]) -> &mut f64 {
        let offset = self.offset(index);
        &mut self.data[offset]
    }
}

impl TryFrom<Nested4> for Tensor4 {
    type Error = Error;

    fn try_from(nested: Nested4) -> Result<Self> {
        Self::from_nested(nested)
    }
}

impl From<Tensor4> for Nested4 {
    fn from(tensor: Tensor4) -> Self {
        tensor.to_nested()
    }
}

/// Row-major matrix laid out as `[row][col]`.
///
/// Used for flattened features, dense-layer weights (`[in][out]`) and
/// per-batch score rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Nested2", into = "Nested2")]
pub struct Tensor2 {
    shape: [usize; 2],
    data: Vec<f64>,
}

impl Tensor2 {
    pub fn from_vec(shape: [usize; 2], data: Vec<f64>) -> Result<Self> {
        let expected = shape[0] * shape[1];
        if data.len() != expected {
            return Err(Error::shape_mismatch(
                format!("2-D tensor of shape {shape:?}"),
                expected,
                data.len(),
            ));
        }
        Ok(Self { shape, data })
    }

    /// Caller guarantees `data.len() == shape[0] * shape[1]`.
    pub(crate) fn from_raw(shape: [usize; 2], data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), shape[0] * shape[1]);
        Self { shape, data }
    }

    pub fn zeros(shape: [usize; 2]) -> Self {
        Self {
            shape,
            data: vec![0.0; shape[0] * shape[1]],
        }
    }

    pub fn from_nested(nested: Nested2) -> Result<Self> {
        let rows = nested.len();
        let cols = nested.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(rows * cols);
        for (r, row) in nested.into_iter().enumerate() {
            if row.len() != cols {
                return Err(Error::Malformed {
                    tensor: "2-D tensor",
                    detail: format!("row {r} has {} columns, expected {cols}", row.len()),
                });
            }
            data.extend(row);
        }
        Ok(Self {
            shape: [rows, cols],
            data,
        })
    }

    pub fn shape(&self) -> [usize; 2] {
        self.shape
    }

    pub fn rows(&self) -> usize {
        self.shape[0]
    }

    pub fn cols(&self) -> usize {
        self.shape[1]
    }

    pub fn row(&self, r: usize) -> &[f64] {
        let cols = self.shape[1];
        &self.data[r * cols..(r + 1) * cols]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            shape: self.shape,
            data: self.data.iter().map(|&x| f(x)).collect(),
        }
    }

    pub fn to_nested(&self) -> Nested2 {
        (0..self.rows()).map(|r| self.row(r).to_vec()).collect()
    }

    #[inline]
    fn offset(&self, [r, c]: [usize; 2]) -> usize {
        debug_assert!(
            r < self.shape[0] && c < self.shape[1],
            "index [{r}, {c}] out of bounds for shape {:?}",
            self.shape
        );
        r * self.shape[1] + c
    }
}

impl Index<[usize; 2]> for Tensor2 {
    type Output = f64;

    fn index(&self, index: [usize; 2]) -> &f64 {
        &self.data[self.offset(index)]
    }
}

impl IndexMut<[usize; 2]> for Tensor2 {
    fn index_mut(&mut self, index: [usize; 2]) -> &mut f64 {
        let offset = self.offset(index);
        &mut self.data[offset]
    }
}

impl TryFrom<Nested2> for Tensor2 {
    type Error = Error;

    fn try_from(nested: Nested2) -> Result<Self> {
        Self::from_nested(nested)
    }
}

impl From<Tensor2> for Nested2 {
    fn from(tensor: Tensor2) -> Self {
        tensor.to_nested()
    }
}
