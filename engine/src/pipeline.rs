//! Forward pass: conv → ReLU → max-pool → flatten → dense → ReLU → dense → softmax.

use std::sync::{Arc, OnceLock};

use serde::Serialize;

use crate::config::{Geometry, LayerConfig};
use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;
use crate::ops;
use crate::params::ParameterBundle;
use crate::tensor::{Tensor2, Tensor4};

/// Class scores and probabilities for one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Inference {
    pub scores: Vec<f64>,
    pub probabilities: Vec<f64>,
    /// Index of the most probable class, i.e. the predicted digit.
    pub predicted: usize,
}

impl Inference {
    pub fn confidence(&self) -> f64 {
        self.probabilities[self.predicted]
    }
}

/// Every intermediate tensor of one forward pass.
#[derive(Debug, Clone, Serialize)]
pub struct Trace {
    /// Convolution output before ReLU.
    pub conv: Tensor4,
    pub conv_relu: Tensor4,
    pub pooled: Tensor4,
    pub flattened: Tensor2,
    /// First dense layer before ReLU.
    pub hidden: Tensor2,
    pub hidden_relu: Tensor2,
    pub scores: Tensor2,
    pub probabilities: Tensor2,
    pub predicted: usize,
}

/// Activations squashed into display-friendly ranges for a visualizer.
#[derive(Debug, Clone, Serialize)]
pub struct DisplayActivations {
    /// Rectified convolution maps, unchanged.
    pub conv: Tensor4,
    /// Pooled maps through `2 * sigmoid(x) - 1`.
    pub pooled: Tensor4,
    /// Hidden pre-activations through `sigmoid`.
    pub hidden: Vec<f64>,
    pub probabilities: Vec<f64>,
}

impl Trace {
    pub fn inference(&self) -> Inference {
        Inference {
            scores: self.scores.row(0).to_vec(),
            probabilities: self.probabilities.row(0).to_vec(),
            predicted: self.predicted,
        }
    }

    pub fn display(&self) -> DisplayActivations {
        DisplayActivations {
            conv: self.conv_relu.clone(),
            pooled: self.pooled.map(ops::sigmoid_centered),
            hidden: self.hidden.row(0).iter().map(|&x| ops::sigmoid(x)).collect(),
            probabilities: self.probabilities.row(0).to_vec(),
        }
    }
}

/// Index of the first largest value, `None` for an empty slice.
pub fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f64)>, (i, &v)| match best {
            Some((_, top)) if v <= top => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Runs the network on one `[1][channels][rows][cols]` image.
pub fn infer(image: &Tensor4, params: &ParameterBundle, config: &LayerConfig) -> Result<Inference> {
    trace(image, params, config).map(|trace| trace.inference())
}

/// Like [`infer`], keeping every intermediate activation.
pub fn trace(image: &Tensor4, params: &ParameterBundle, config: &LayerConfig) -> Result<Trace> {
    if image.shape() != config.input_shape() {
        return Err(Error::shape_mismatch(
            "input image",
            config.input_shape(),
            image.shape(),
        ));
    }
    params.validate(config)?;

    let conv = ops::convolve(
        image,
        &params.w1,
        &params.b1,
        config.conv_padding,
        config.conv_stride,
    )?;
    let conv_relu = ops::relu_4d(&conv);
    let pooled = ops::max_pool(
        &conv_relu,
        config.pool_rows,
        config.pool_cols,
        config.pool_stride,
        config.pool_padding,
    )?;
    let flattened = ops::flatten_feature_map(&pooled);
    let hidden = ops::affine(&flattened, &params.w2, &params.b2)?;
    let hidden_relu = ops::relu_2d(&hidden);
    let scores = ops::affine(&hidden_relu, &params.w3, &params.b3)?;
    let probabilities = ops::softmax(&scores);

    let predicted = argmax(probabilities.row(0)).ok_or_else(|| Error::InvalidConfig {
        parameter: "classes",
        reason: "network produced no class scores".to_string(),
    })?;

    tracing::debug!(
        conv = ?conv.shape(),
        pooled = ?pooled.shape(),
        hidden = ?hidden.shape(),
        predicted,
        "forward pass complete"
    );

    Ok(Trace {
        conv,
        conv_relu,
        pooled,
        flattened,
        hidden,
        hidden_relu,
        scores,
        probabilities,
        predicted,
    })
}

#[derive(Debug)]
struct Loaded {
    bundle: Arc<ParameterBundle>,
    fingerprint: Fingerprint,
}

/// A configured network with a load-once parameter slot.
///
/// Inference fails with [`Error::NotReady`] until [`Network::load`] succeeds.
/// After that the bundle is shared read-only, so a `Network` can serve
/// concurrent callers through `&self`.
#[derive(Debug)]
pub struct Network {
    config: LayerConfig,
    geometry: Geometry,
    loaded: OnceLock<Loaded>,
}

impl Network {
    pub fn new(config: LayerConfig) -> Result<Self> {
        let geometry = config.geometry()?;
        Ok(Self {
            config,
            geometry,
            loaded: OnceLock::new(),
        })
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Validates `bundle` against the config and installs it.
    ///
    /// Only the first successful load takes effect; later calls fail with
    /// [`Error::AlreadyLoaded`].
    pub fn load(&self, bundle: impl Into<Arc<ParameterBundle>>) -> Result<Fingerprint> {
        if self.loaded.get().is_some() {
            return Err(Error::AlreadyLoaded);
        }
        let bundle = bundle.into();
        bundle.validate(&self.config)?;
        let fingerprint = bundle.fingerprint();

        self.loaded
            .set(Loaded {
                bundle,
                fingerprint,
            })
            .map_err(|_| Error::AlreadyLoaded)?;

        tracing::debug!(
            %fingerprint,
            filters = ?self.config.filter_shape(),
            flat_features = self.geometry.flat_features,
            hidden_units = self.config.hidden_units,
            classes = self.config.classes,
            "parameter bundle loaded"
        );
        Ok(fingerprint)
    }

    pub fn is_ready(&self) -> bool {
        self.loaded.get().is_some()
    }

    pub fn params(&self) -> Result<&Arc<ParameterBundle>> {
        self.loaded
            .get()
            .map(|loaded| &loaded.bundle)
            .ok_or(Error::NotReady)
    }

    pub fn fingerprint(&self) -> Result<Fingerprint> {
        self.loaded
            .get()
            .map(|loaded| loaded.fingerprint)
            .ok_or(Error::NotReady)
    }

    pub fn infer(&self, image: &Tensor4) -> Result<Inference> {
        infer(image, self.params()?, &self.config)
    }

    pub fn trace(&self, image: &Tensor4) -> Result<Trace> {
        trace(image, self.params()?, &self.config)
    }
}
