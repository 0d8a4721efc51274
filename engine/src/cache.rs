//! Caller-owned memoization of inference results.
//!
//! The engine itself never caches. A host that re-submits the same image (a
//! visualizer redrawing, a batch with duplicates) can route calls through an
//! [`InferenceCache`] keyed on the config, the bundle fingerprint and the
//! image fingerprint. Entries are evicted least-recently-used once the
//! capacity is reached.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;

use crate::config::LayerConfig;
use crate::error::Result;
use crate::fingerprint::{Fingerprint, FingerprintBuilder};
use crate::pipeline::{Inference, Network};
use crate::tensor::Tensor4;

pub fn image_fingerprint(image: &Tensor4) -> Fingerprint {
    FingerprintBuilder::default()
        .tensor(&image.shape(), image.as_slice())
        .finish()
}

type CacheKey = (LayerConfig, Fingerprint, Fingerprint);

const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(128) {
    Some(capacity) => capacity,
    None => unreachable!(),
};

pub struct InferenceCache {
    entries: LruCache<CacheKey, Arc<Inference>>,
    hits: u64,
    misses: u64,
}

impl Default for InferenceCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl InferenceCache {
    /// Cache holding up to 128 results.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            entries: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// Returns the cached result for `image` on `network`, running inference
    /// only on a miss. Errors are not cached.
    pub fn get_or_infer(&mut self, network: &Network, image: &Tensor4) -> Result<Arc<Inference>> {
        let key = (
            *network.config(),
            network.fingerprint()?,
            image_fingerprint(image),
        );

        if let Some(hit) = self.entries.get(&key) {
            self.hits += 1;
            tracing::debug!(image = %key.2, "inference cache hit");
            return Ok(Arc::clone(hit));
        }

        self.misses += 1;
        tracing::debug!(image = %key.2, "inference cache miss");
        let inference = Arc::new(network.infer(image)?);
        self.entries.put(key, Arc::clone(&inference));
        Ok(inference)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    /// `(hits, misses)` since creation or the last [`clear`](Self::clear).
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.hits = 0;
        self.misses = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::params::ParameterBundle;
    use crate::tensor::Tensor2;

    fn one_pixel_network() -> Network {
        let config = LayerConfig {
            input_rows: 2,
            input_cols: 2,
            input_channels: 1,
            filter_count: 1,
            filter_rows: 1,
            filter_cols: 1,
            conv_stride: 1,
            conv_padding: 0,
            pool_rows: 2,
            pool_cols: 2,
            pool_stride: 2,
            pool_padding: 0,
            hidden_units: 1,
            classes: 2,
        };
        let network = Network::new(config).unwrap();
        network
            .load(ParameterBundle {
                w1: Tensor4::from_vec([1, 1, 1, 1], vec![1.0]).unwrap(),
                b1: vec![0.0],
                w2: Tensor2::from_vec([1, 1], vec![1.0]).unwrap(),
                b2: vec![0.0],
                w3: Tensor2::from_vec([1, 2], vec![1.0, -1.0]).unwrap(),
                b3: vec![0.0, 0.0],
            })
            .unwrap();
        network
    }

    #[test_log::test]
    fn repeated_image_hits() {
        let network = one_pixel_network();
        let image = Tensor4::from_image(&[0.0, 0.5, 1.0, 0.25], 2, 2).unwrap();
        let mut cache = InferenceCache::new();

        let first = cache.get_or_infer(&network, &image).unwrap();
        let second = cache.get_or_infer(&network, &image).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.scores, vec![1.0, -1.0]);
        assert_eq!(cache.stats(), (1, 1));

        let other = Tensor4::from_image(&[0.0, 0.0, 0.0, 0.0], 2, 2).unwrap();
        let third = cache.get_or_infer(&network, &other).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), (0, 0));
    }

    #[test]
    fn least_recently_used_entry_is_evicted() {
        let network = one_pixel_network();
        let first = Tensor4::from_image(&[1.0, 0.0, 0.0, 0.0], 2, 2).unwrap();
        let second = Tensor4::from_image(&[0.0, 1.0, 0.0, 0.0], 2, 2).unwrap();
        let third = Tensor4::from_image(&[0.0, 0.0, 1.0, 0.0], 2, 2).unwrap();
        let mut cache = InferenceCache::with_capacity(NonZeroUsize::new(2).unwrap());

        cache.get_or_infer(&network, &first).unwrap();
        cache.get_or_infer(&network, &second).unwrap();
        cache.get_or_infer(&network, &first).unwrap();
        cache.get_or_infer(&network, &third).unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.capacity(), 2);
        assert_eq!(cache.stats(), (1, 3));

        // `second` was least recently used when `third` arrived.
        cache.get_or_infer(&network, &first).unwrap();
        cache.get_or_infer(&network, &second).unwrap();
        assert_eq!(cache.stats(), (2, 4));
    }

    #[test]
    fn unloaded_network_is_not_cached() {
        let network = Network::new(LayerConfig::default()).unwrap();
        let image = Tensor4::zeros([1, 1, 28, 28]);
        let mut cache = InferenceCache::new();

        assert!(matches!(
            cache.get_or_infer(&network, &image),
            Err(Error::NotReady)
        ));
        assert!(cache.is_empty());
    }
}
