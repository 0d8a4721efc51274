//! Trained weights and biases of the network.

use serde::{Deserialize, Serialize};

use crate::config::{Geometry, LayerConfig};
use crate::error::{Error, Result};
use crate::fingerprint::{Fingerprint, FingerprintBuilder};
use crate::tensor::{Tensor2, Tensor4};

/// All trained parameters, read-only once loaded.
///
/// The serde field names match the exported parameter record
/// (`W1, b1, W2, b2, W3, b3`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterBundle {
    /// Convolution filters, `[filters][channels][rows][cols]`.
    #[serde(rename = "W1")]
    pub w1: Tensor4,
    /// One bias per filter.
    pub b1: Vec<f64>,
    /// Hidden dense weights, `[flat_features][hidden_units]`.
    #[serde(rename = "W2")]
    pub w2: Tensor2,
    pub b2: Vec<f64>,
    /// Output dense weights, `[hidden_units][classes]`.
    #[serde(rename = "W3")]
    pub w3: Tensor2,
    pub b3: Vec<f64>,
}

impl ParameterBundle {
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn from_bincode(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    pub fn to_bincode(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Checks every tensor against the shapes `config` implies.
    pub fn validate(&self, config: &LayerConfig) -> Result<Geometry> {
        let geometry = config.geometry()?;

        expect_shape("W1", &config.filter_shape(), &self.w1.shape())?;
        expect_shape("b1", &[config.filter_count], &[self.b1.len()])?;
        expect_shape(
            "W2",
            &[geometry.flat_features, config.hidden_units],
            &self.w2.shape(),
        )?;
        expect_shape("b2", &[config.hidden_units], &[self.b2.len()])?;
        expect_shape("W3", &[config.hidden_units, config.classes], &self.w3.shape())?;
        expect_shape("b3", &[config.classes], &[self.b3.len()])?;

        Ok(geometry)
    }

    /// Identity of the whole bundle, used to key cached results.
    pub fn fingerprint(&self) -> Fingerprint {
        FingerprintBuilder::default()
            .tensor(&self.w1.shape(), self.w1.as_slice())
            .tensor(&[self.b1.len()], &self.b1)
            .tensor(&self.w2.shape(), self.w2.as_slice())
            .tensor(&[self.b2.len()], &self.b2)
            .tensor(&self.w3.shape(), self.w3.as_slice())
            .tensor(&[self.b3.len()], &self.b3)
            .finish()
    }
}

fn expect_shape(name: &str, expected: &[usize], actual: &[usize]) -> Result<()> {
    if expected != actual {
        return Err(Error::shape_mismatch(
            format!("parameter {name}"),
            expected,
            actual,
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_config() -> LayerConfig {
        LayerConfig {
            input_rows: 4,
            input_cols: 4,
            input_channels: 1,
            filter_count: 2,
            filter_rows: 3,
            filter_cols: 3,
            conv_stride: 1,
            conv_padding: 0,
            pool_rows: 2,
            pool_cols: 2,
            pool_stride: 2,
            pool_padding: 0,
            hidden_units: 3,
            classes: 2,
        }
    }

    const TINY_JSON: &str = r#"{
        "W1": [
            [[[1, 0, 0], [0, 1, 0], [0, 0, 1]]],
            [[[0, 0, 1], [0, 1, 0], [1, 0, 0]]]
        ],
        "b1": [0.5, -0.5],
        "W2": [[1, 0, 0], [0, 1, 0]],
        "b2": [0, 0, 0.25],
        "W3": [[1, -1], [-1, 1], [0.5, 0.5]],
        "b3": [0, 0]
    }"#;

    #[test]
    fn decodes_named_json_record() {
        let bundle = ParameterBundle::from_json(TINY_JSON.as_bytes()).unwrap();
        assert_eq!(bundle.w1.shape(), [2, 1, 3, 3]);
        assert_eq!(bundle.w1[[1, 0, 0, 2]], 1.0);
        assert_eq!(bundle.w2.shape(), [2, 3]);
        assert_eq!(bundle.b2, vec![0.0, 0.0, 0.25]);

        let geometry = bundle.validate(&tiny_config()).unwrap();
        assert_eq!(geometry.flat_features, 2);
    }

    #[test]
    fn truncated_bincode_fails_to_decode() {
        let err = ParameterBundle::from_bincode(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, Error::Bincode(_)), "{err}");
    }

    #[test]
    fn jagged_filters_fail_to_decode() {
        let json = TINY_JSON.replace("[0, 0, 1]]]", "[0, 1]]]");
        let err = ParameterBundle::from_json(json.as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Json(_)));
        assert!(err.to_string().contains("malformed 4-D tensor"), "{err}");
    }

    #[test]
    fn missing_field_fails_to_decode() {
        let json = TINY_JSON.replace(r#""b3": [0, 0]"#, r#""b4": [0, 0]"#);
        assert!(ParameterBundle::from_json(json.as_bytes()).is_err());
    }

    #[test]
    fn validate_names_the_bad_tensor() {
        let mut bundle = ParameterBundle::from_json(TINY_JSON.as_bytes()).unwrap();
        bundle.b3.push(1.0);
        let err = bundle.validate(&tiny_config()).unwrap_err();
        assert!(err.to_string().contains("parameter b3"), "{err}");

        let bundle = ParameterBundle::from_json(TINY_JSON.as_bytes()).unwrap();
        let config = LayerConfig {
            hidden_units: 4,
            ..tiny_config()
        };
        let err = bundle.validate(&config).unwrap_err();
        assert!(err.to_string().contains("parameter W2"), "{err}");
    }

    #[test]
    fn bincode_preserves_identity() {
        let bundle = ParameterBundle::from_json(TINY_JSON.as_bytes()).unwrap();
        let bytes = bundle.to_bincode().unwrap();
        let decoded = ParameterBundle::from_bincode(&bytes).unwrap();

        assert_eq!(decoded, bundle);
        assert_eq!(decoded.fingerprint(), bundle.fingerprint());
    }

    #[test]
    fn fingerprint_tracks_values() {
        let bundle = ParameterBundle::from_json(TINY_JSON.as_bytes()).unwrap();
        let mut nudged = bundle.clone();
        nudged.b1[0] += 1e-12;
        assert_ne!(bundle.fingerprint(), nudged.fingerprint());
    }
}
