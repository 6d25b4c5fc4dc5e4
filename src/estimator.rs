// src/estimator.rs
//! Fixed-probability quantile estimator on top of a [`TDigest`].
//!
//! The probability and digest configuration are set once; samples are
//! collected one at a time or in batches and `estimate` answers the quantile
//! at that probability over everything collected since the last `reset`.

use tracing::debug;

use crate::tdigest::frontends::parse_probability;
use crate::tdigest::{StorageVariant, TDigest};
use crate::TdResult;

#[derive(Debug, Clone)]
pub struct QuantileEstimator {
    prob: f64,
    digest: TDigest,
    count: usize,
}

impl QuantileEstimator {
    /// `prob` must lie in `[0, 1]` and `compression` must be positive.
    pub fn new(prob: f64, variant: StorageVariant, compression: f64) -> TdResult<Self> {
        let prob = parse_probability(prob)?;
        let digest = TDigest::new(compression, variant)?;
        Ok(Self {
            prob,
            digest,
            count: 0,
        })
    }

    /// Wrap an existing (possibly non-empty) digest. Its weight is not
    /// reflected in [`count`](Self::count).
    pub fn with_digest(prob: f64, digest: TDigest) -> TdResult<Self> {
        Ok(Self {
            prob: parse_probability(prob)?,
            digest,
            count: 0,
        })
    }

    pub fn collect(&mut self, value: f64) -> TdResult<()> {
        self.digest.add(value)?;
        self.count += 1;
        Ok(())
    }

    /// All-or-nothing: a non-finite value rejects the whole batch.
    pub fn collect_many(&mut self, values: &[f64]) -> TdResult<()> {
        self.digest.add_many(values)?;
        self.count += values.len();
        Ok(())
    }

    /// Quantile at the configured probability.
    pub fn estimate(&mut self) -> TdResult<f64> {
        self.digest.quantile(self.prob)
    }

    /// Drop every collected sample; configuration is kept.
    pub fn reset(&mut self) {
        debug!(count = self.count, "estimator reset");
        self.digest = self.digest.empty_like();
        self.count = 0;
    }

    /// Samples collected since construction or the last reset.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn probability(&self) -> f64 {
        self.prob
    }

    #[inline]
    pub fn digest(&self) -> &TDigest {
        &self.digest
    }

    pub fn into_digest(self) -> TDigest {
        self.digest
    }
}
