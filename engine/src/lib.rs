//! # mnist_inference
//!
//! Forward pass of a small digit-classifying CNN over plain `f64` tensors.
//!
//! The network has a fixed topology:
//!
//! ```text
//! image ─ conv ─ ReLU ─ max-pool ─ flatten ─ dense ─ ReLU ─ dense ─ softmax
//! ```
//!
//! Layer sizes come from a [`LayerConfig`]; trained weights come from a
//! [`ParameterBundle`] decoded by the host. Operators in [`ops`] are pure
//! functions. [`Network`] holds the config plus a load-once parameter slot and
//! is safe to share between threads.
//!
//! ```no_run
//! use mnist_inference::{LayerConfig, Network, ParameterBundle, Tensor4};
//!
//! # fn main() -> mnist_inference::Result<()> {
//! let bytes = std::fs::read("cnn-params.json").unwrap();
//! let network = Network::new(LayerConfig::default())?;
//! network.load(ParameterBundle::from_json(&bytes)?)?;
//!
//! let pixels = vec![0.0; 28 * 28];
//! let image = Tensor4::from_image(&pixels, 28, 28)?;
//! let result = network.infer(&image)?;
//! println!("digit {} ({:.3})", result.predicted, result.confidence());
//! # Ok(())
//! # }
//! ```

mod cache;
mod config;
mod error;
mod fingerprint;
pub mod ops;
mod params;
mod pipeline;
mod tensor;

pub use cache::{image_fingerprint, InferenceCache};
pub use config::{Geometry, LayerConfig};
pub use error::{Error, Result};
pub use fingerprint::Fingerprint;
pub use params::ParameterBundle;
pub use pipeline::{argmax, infer, trace, DisplayActivations, Inference, Network, Trace};
pub use tensor::{Nested2, Nested4, Tensor2, Tensor4};
