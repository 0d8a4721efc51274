//! Layer configuration for the conv → pool → dense → dense network.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ops::{output_size, pool};

/// Scalar sizes of every layer, fixed before any tensor is seen.
///
/// Defaults describe the digit classifier: a 28x28 grayscale image, 30 5x5
/// filters, 2x2/2 max pooling, 100 hidden units and 10 classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
#[serde(default)]
pub struct LayerConfig {
    /// Input image height in pixels.
    #[cfg_attr(feature = "cli", arg(long, env = "MNIST_INPUT_ROWS", default_value_t = 28))]
    pub input_rows: usize,
    /// Input image width in pixels.
    #[cfg_attr(feature = "cli", arg(long, env = "MNIST_INPUT_COLS", default_value_t = 28))]
    pub input_cols: usize,
    /// Channels per input image (1 for grayscale).
    #[cfg_attr(feature = "cli", arg(long, env = "MNIST_INPUT_CHANNELS", default_value_t = 1))]
    pub input_channels: usize,
    /// Number of convolution filters.
    #[cfg_attr(feature = "cli", arg(long, env = "MNIST_FILTER_COUNT", default_value_t = 30))]
    pub filter_count: usize,
    #[cfg_attr(feature = "cli", arg(long, env = "MNIST_FILTER_ROWS", default_value_t = 5))]
    pub filter_rows: usize,
    #[cfg_attr(feature = "cli", arg(long, env = "MNIST_FILTER_COLS", default_value_t = 5))]
    pub filter_cols: usize,
    #[cfg_attr(feature = "cli", arg(long, env = "MNIST_CONV_STRIDE", default_value_t = 1))]
    pub conv_stride: usize,
    /// Zero-filled border added around the input before convolving.
    #[cfg_attr(feature = "cli", arg(long, env = "MNIST_CONV_PADDING", default_value_t = 0))]
    pub conv_padding: usize,
    #[cfg_attr(feature = "cli", arg(long, env = "MNIST_POOL_ROWS", default_value_t = 2))]
    pub pool_rows: usize,
    #[cfg_attr(feature = "cli", arg(long, env = "MNIST_POOL_COLS", default_value_t = 2))]
    pub pool_cols: usize,
    #[cfg_attr(feature = "cli", arg(long, env = "MNIST_POOL_STRIDE", default_value_t = 2))]
    pub pool_stride: usize,
    /// Border excluded from each pooling window's maximum.
    #[cfg_attr(feature = "cli", arg(long, env = "MNIST_POOL_PADDING", default_value_t = 0))]
    pub pool_padding: usize,
    /// Width of the hidden dense layer.
    #[cfg_attr(feature = "cli", arg(long, env = "MNIST_HIDDEN_UNITS", default_value_t = 100))]
    pub hidden_units: usize,
    /// Number of output classes.
    #[cfg_attr(feature = "cli", arg(long, env = "MNIST_CLASSES", default_value_t = 10))]
    pub classes: usize,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            input_rows: 28,
            input_cols: 28,
            input_channels: 1,
            filter_count: 30,
            filter_rows: 5,
            filter_cols: 5,
            conv_stride: 1,
            conv_padding: 0,
            pool_rows: 2,
            pool_cols: 2,
            pool_stride: 2,
            pool_padding: 0,
            hidden_units: 100,
            classes: 10,
        }
    }
}

/// Sizes derived from a valid [`LayerConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Geometry {
    /// `[rows, cols]` of each convolution feature map.
    pub conv_output: [usize; 2],
    /// `[rows, cols]` of each pooled feature map.
    pub pool_output: [usize; 2],
    /// Length of the flattened pooled features, i.e. rows of `W2`.
    pub flat_features: usize,
}

impl LayerConfig {
    /// Validates the config and computes every intermediate size.
    pub fn geometry(&self) -> Result<Geometry> {
        for (parameter, value) in [
            ("input_rows", self.input_rows),
            ("input_cols", self.input_cols),
            ("input_channels", self.input_channels),
            ("filter_count", self.filter_count),
            ("hidden_units", self.hidden_units),
            ("classes", self.classes),
        ] {
            if value == 0 {
                return Err(Error::InvalidConfig {
                    parameter,
                    reason: "must be at least 1".to_string(),
                });
            }
        }

        let conv_output = output_size(
            "convolution",
            [self.input_rows, self.input_cols],
            [self.filter_rows, self.filter_cols],
            self.conv_padding,
            self.conv_stride,
        )?;
        let pool_output = output_size(
            "pooling",
            conv_output,
            [self.pool_rows, self.pool_cols],
            self.pool_padding,
            self.pool_stride,
        )?;
        pool::check_padding(self.pool_padding, self.pool_rows, self.pool_cols)?;

        Ok(Geometry {
            conv_output,
            pool_output,
            flat_features: self.filter_count * pool_output[0] * pool_output[1],
        })
    }

    /// Expected `W1` shape: `[filters][channels][rows][cols]`.
    pub fn filter_shape(&self) -> [usize; 4] {
        [
            self.filter_count,
            self.input_channels,
            self.filter_rows,
            self.filter_cols,
        ]
    }

    /// Expected input image shape for a single-image batch.
    pub fn input_shape(&self) -> [usize; 4] {
        [1, self.input_channels, self.input_rows, self.input_cols]
    }
}
