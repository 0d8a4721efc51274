use thiserror::Error;

/// Result alias used across the engine.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the inference engine.
///
/// Every variant is a programmer or data error; nothing here is transient, so
/// callers should report rather than retry.
#[derive(Debug, Error)]
pub enum Error {
    /// Nested input was not rectangular.
    #[error("malformed {tensor}: {detail}")]
    Malformed { tensor: &'static str, detail: String },

    /// Two tensors, or a tensor and the layer config, disagree on a dimension.
    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: String,
        expected: String,
        actual: String,
    },

    /// `(extent + 2 * padding - window)` is not a multiple of `stride`.
    #[error(
        "{layer} {axis} does not divide evenly: ({extent} + 2*{padding} - {window}) is not a multiple of stride {stride}"
    )]
    NonIntegralOutput {
        layer: &'static str,
        axis: &'static str,
        extent: usize,
        window: usize,
        padding: usize,
        stride: usize,
    },

    #[error("invalid configuration for {parameter}: {reason}")]
    InvalidConfig {
        parameter: &'static str,
        reason: String,
    },

    #[error("network not ready: no parameter bundle has been loaded")]
    NotReady,

    #[error("a parameter bundle is already loaded; bundles are immutable once loaded")]
    AlreadyLoaded,

    #[error("failed to decode parameter bundle from JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to encode or decode parameter bundle with bincode: {0}")]
    Bincode(#[from] bincode::Error),
}

impl Error {
    pub(crate) fn shape_mismatch(
        context: impl Into<String>,
        expected: impl std::fmt::Debug,
        actual: impl std::fmt::Debug,
    ) -> Self {
        Error::ShapeMismatch {
            context: context.into(),
            expected: format!("{expected:?}"),
            actual: format!("{actual:?}"),
        }
    }
}
