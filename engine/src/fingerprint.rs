use std::fmt;

use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};

/// SHA-256 identity of one or more tensors, covering shapes and raw values.
///
/// Values are hashed in native byte order, so fingerprints are only
/// comparable within one architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Incremental builder; each tensor is framed by its rank and dimensions so
/// that reshaping the same values changes the digest.
#[derive(Default)]
pub(crate) struct FingerprintBuilder(Sha256);

impl FingerprintBuilder {
    pub(crate) fn tensor(mut self, shape: &[usize], data: &[f64]) -> Self {
        self.0.update((shape.len() as u64).to_le_bytes());
        for &dim in shape {
            self.0.update((dim as u64).to_le_bytes());
        }
        self.0.update(bytemuck::cast_slice::<f64, u8>(data));
        self
    }

    pub(crate) fn finish(self) -> Fingerprint {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&self.0.finalize());
        Fingerprint(bytes)
    }
}
