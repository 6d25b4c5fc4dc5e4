// src/tdigest/tdigest.rs
use tracing::debug;

use crate::tdigest::centroids::{is_sorted_strict_by_mean, Centroid};
use crate::tdigest::compressor::compress_into;
use crate::tdigest::merges::{KWayCentroidMerge, MergeByMean};
use crate::tdigest::scale::ScaleFamily;
use crate::tdigest::storage::{CentroidStore, Storage, StorageVariant};
use crate::{TdError, TdResult};

/// Default compression used by [`TDigest::default`] and the CLI.
pub const DEFAULT_COMPRESSION: f64 = 100.0;

/// Floor for the automatic buffer size.
const MIN_BUFFER_CAPACITY: usize = 32;

/// Buffered samples per unit of compression before a pass is forced.
const BUFFER_FACTOR: f64 = 5.0;

fn default_buffer_capacity(compression: f64) -> usize {
    ((BUFFER_FACTOR * compression).ceil() as usize).max(MIN_BUFFER_CAPACITY)
}

/// Streaming t-digest.
///
/// Samples land in an unmerged buffer; a compression pass folds the buffer into
/// the centroid store when it fills up, before every query, before merges and
/// serialization, and on [`TDigest::compress`]. Queries therefore take
/// `&mut self`. Inspection accessors (`total_weight`, `min`, `max`, ...) do not
/// flush and take `&self`.
///
/// `total_weight`, `sum`, `min` and `max` track the raw input exactly and are
/// never recomputed from centroids.
#[derive(Debug, Clone, PartialEq)]
pub struct TDigest {
    store: Storage,
    buffer: Vec<(f64, f64)>, // (value, weight)
    compression: f64,
    variant: StorageVariant,
    scale: ScaleFamily,
    buffer_capacity: usize,
    total_weight: f64, // ∑w over every accepted sample
    sum: f64,          // ∑(w·x)
    min: f64,          // +inf while empty
    max: f64,          // -inf while empty
}

impl Default for TDigest {
    fn default() -> Self {
        Self::empty(
            DEFAULT_COMPRESSION,
            StorageVariant::Default,
            ScaleFamily::K2,
            default_buffer_capacity(DEFAULT_COMPRESSION),
        )
    }
}

/* =============================================================================
 * Builder
 * ============================================================================= */

/// Builder for [`TDigest`].
///
/// Use the builder when you want a scale family or buffer size other than the
/// defaults; [`TDigest::new`] covers the common case.
#[derive(Debug, Clone)]
pub struct TDigestBuilder {
    compression: f64,
    variant: StorageVariant,
    scale: ScaleFamily,
    buffer_capacity: Option<usize>,
}

impl Default for TDigestBuilder {
    fn default() -> Self {
        Self {
            compression: DEFAULT_COMPRESSION,
            variant: StorageVariant::Default,
            scale: ScaleFamily::K2,
            buffer_capacity: None,
        }
    }
}

impl TDigestBuilder {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the compression parameter (`δ`). Must be finite and `> 0`.
    #[inline]
    pub fn compression(mut self, compression: f64) -> Self {
        self.compression = compression;
        self
    }

    #[inline]
    pub fn variant(mut self, variant: StorageVariant) -> Self {
        self.variant = variant;
        self
    }

    /// Choose the scale family used by the k-limit.
    #[inline]
    pub fn scale(mut self, scale: ScaleFamily) -> Self {
        self.scale = scale;
        self
    }

    /// Number of buffered samples that triggers a compression pass.
    /// Defaults to `5 × compression` (at least 32).
    #[inline]
    pub fn buffer_capacity(mut self, n: usize) -> Self {
        self.buffer_capacity = Some(n);
        self
    }

    pub fn build(self) -> TdResult<TDigest> {
        validate_compression(self.compression)?;
        let capacity = match self.buffer_capacity {
            Some(0) => return Err(TdError::InvalidBufferCapacity),
            Some(n) => n,
            None => default_buffer_capacity(self.compression),
        };
        Ok(TDigest::empty(
            self.compression,
            self.variant,
            self.scale,
            capacity,
        ))
    }
}

#[inline]
pub(crate) fn validate_compression(compression: f64) -> TdResult<()> {
    if compression.is_finite() && compression > 0.0 {
        Ok(())
    } else {
        Err(TdError::InvalidCompression { value: compression })
    }
}

#[inline]
fn validate_sample(value: f64, weight: f64) -> TdResult<()> {
    if !value.is_finite() {
        return Err(TdError::NonFiniteInput {
            context: "sample value",
        });
    }
    if !(weight.is_finite() && weight > 0.0) {
        return Err(TdError::InvalidWeight { weight });
    }
    Ok(())
}

/* =============================================================================
 * Digest
 * ============================================================================= */

/// Data-level stats of the raw input (not of the centroids).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DigestStats {
    /// Total weight (∑w). For unit samples this equals the sample count.
    pub total_weight: f64,
    /// ∑(w·x) of the raw samples.
    pub data_sum: f64,
    /// Smallest raw value.
    pub data_min: f64,
    /// Largest raw value.
    pub data_max: f64,
}

impl TDigest {
    /// Empty digest with the default scale family and buffer size.
    pub fn new(compression: f64, variant: StorageVariant) -> TdResult<Self> {
        Self::builder()
            .compression(compression)
            .variant(variant)
            .build()
    }

    /// Entry point for fluent construction.
    #[inline]
    pub fn builder() -> TDigestBuilder {
        TDigestBuilder::default()
    }

    fn empty(
        compression: f64,
        variant: StorageVariant,
        scale: ScaleFamily,
        buffer_capacity: usize,
    ) -> Self {
        Self {
            store: Storage::for_variant(variant),
            buffer: Vec::new(),
            compression,
            variant,
            scale,
            buffer_capacity,
            total_weight: 0.0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    /// Same configuration, no data.
    pub fn empty_like(&self) -> Self {
        Self::empty(
            self.compression,
            self.variant,
            self.scale,
            self.buffer_capacity,
        )
    }

    /// Rebuild a digest from already-compressed parts (persistence).
    ///
    /// Rejects anything a compression pass could not have produced: unsorted or
    /// duplicate means, non-positive weights, non-finite numbers, or stats that
    /// contradict the centroids.
    pub(crate) fn from_parts(
        compression: f64,
        variant: StorageVariant,
        scale: ScaleFamily,
        centroids: Vec<Centroid>,
        stats: DigestStats,
    ) -> TdResult<Self> {
        let DigestStats {
            total_weight,
            data_sum: sum,
            data_min: min,
            data_max: max,
        } = stats;
        let invalid = |reason: &'static str| TdError::InvalidSnapshot { reason };

        validate_compression(compression)
            .map_err(|_| invalid("compression must be finite and > 0"))?;
        if centroids
            .iter()
            .any(|c| !c.mean().is_finite() || !c.weight().is_finite() || c.weight() <= 0.0)
        {
            return Err(invalid("centroids need finite means and positive weights"));
        }
        if !is_sorted_strict_by_mean(&centroids) {
            return Err(invalid("centroid means must be strictly ascending"));
        }
        // `sum` may have overflowed on finite input, so it is carried as is.
        if !(total_weight.is_finite() && total_weight >= 0.0) {
            return Err(invalid("total weight must be finite and >= 0"));
        }

        let mut td = Self::empty(
            compression,
            variant,
            scale,
            default_buffer_capacity(compression),
        );
        match (centroids.first(), centroids.last()) {
            (Some(first), Some(last)) => {
                if !(min.is_finite() && max.is_finite()) {
                    return Err(invalid("min and max must be finite"));
                }
                if min > first.mean() || max < last.mean() {
                    return Err(invalid("min/max must enclose the centroid means"));
                }
                if total_weight <= 0.0 {
                    return Err(invalid("non-empty digest needs positive total weight"));
                }
                td.min = min;
                td.max = max;
            }
            _ => {
                if total_weight != 0.0 {
                    return Err(invalid("empty digest must have zero total weight"));
                }
            }
        }
        td.total_weight = total_weight;
        td.sum = sum;
        td.store.replace_sorted(centroids);
        Ok(td)
    }

    /// Override the buffer size of a restored digest (`n >= 1`).
    pub(crate) fn with_buffer_capacity(mut self, n: usize) -> Self {
        debug_assert!(n > 0);
        self.buffer_capacity = n.max(1);
        self
    }

    /* ===========================
     * Ingestion
     * =========================== */

    /// Add one sample with unit weight.
    #[inline]
    pub fn add(&mut self, value: f64) -> TdResult<()> {
        self.add_weighted(value, 1.0)
    }

    /// Add one weighted sample. Rejected input leaves the digest untouched.
    pub fn add_weighted(&mut self, value: f64, weight: f64) -> TdResult<()> {
        validate_sample(value, weight)?;
        self.commit(value, weight);
        Ok(())
    }

    /// Add a batch of unit-weight samples. The whole batch is validated before
    /// anything is committed.
    pub fn add_many(&mut self, values: &[f64]) -> TdResult<()> {
        for &v in values {
            validate_sample(v, 1.0)?;
        }
        for &v in values {
            self.commit(v, 1.0);
        }
        Ok(())
    }

    fn commit(&mut self, value: f64, weight: f64) {
        self.total_weight += weight;
        self.sum += weight * value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.buffer.push((value, weight));
        if self.buffer.len() >= self.buffer_capacity {
            debug!(
                buffered = self.buffer.len(),
                centroids = self.store.len(),
                "buffer full, compressing"
            );
            self.flush();
        }
    }

    /// Fold any buffered samples into the centroid store.
    pub fn compress(&mut self) {
        self.flush();
    }

    pub(crate) fn flush(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let mut buffer = std::mem::take(&mut self.buffer);
        buffer.sort_by(|a, b| a.0.total_cmp(&b.0));

        let stream = MergeByMean::new(self.store.iter(), &buffer);
        let compressed = compress_into(self.scale, self.compression, stream);
        self.store.replace_sorted(compressed);

        buffer.clear();
        self.buffer = buffer;
    }

    /* ===========================
     * Merging
     * =========================== */

    /// Absorb `other` (its centroids and its unflushed samples, copied by value)
    /// and recompress under `self`'s configuration. `other` is not modified.
    pub fn merge(&mut self, other: &TDigest) {
        if other.is_empty() {
            return;
        }
        debug!(
            self_centroids = self.store.len(),
            other_centroids = other.store.len(),
            other_buffered = other.buffer.len(),
            "merging digests"
        );

        let mine = self.store.to_vec();
        let theirs = other.store.to_vec();
        let runs: Vec<Centroid> =
            KWayCentroidMerge::new(vec![mine.as_slice(), theirs.as_slice()]).collect();

        let mut samples = std::mem::take(&mut self.buffer);
        samples.extend_from_slice(&other.buffer);
        samples.sort_by(|a, b| a.0.total_cmp(&b.0));

        let compressed = compress_into(
            self.scale,
            self.compression,
            MergeByMean::new(runs.iter(), &samples),
        );
        self.store.replace_sorted(compressed);

        samples.clear();
        self.buffer = samples;
        self.total_weight += other.total_weight;
        self.sum += other.sum;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Merge many digests into a new one.
    ///
    /// The configuration is taken from the first non-empty digest (or the first
    /// digest, or the defaults for an empty slice). Inputs are not modified.
    pub fn merge_all(digests: &[TDigest]) -> TDigest {
        let mut result = digests
            .iter()
            .find(|d| !d.is_empty())
            .or_else(|| digests.first())
            .map(TDigest::empty_like)
            .unwrap_or_default();

        let live: Vec<&TDigest> = digests.iter().filter(|d| !d.is_empty()).collect();
        if live.is_empty() {
            return result;
        }
        debug!(digests = live.len(), "k-way merging digests");

        let cents: Vec<Vec<Centroid>> = live.iter().map(|d| d.store.to_vec()).collect();
        let runs: Vec<&[Centroid]> = cents.iter().map(Vec::as_slice).collect();
        let merged: Vec<Centroid> = KWayCentroidMerge::new(runs).collect();

        let mut samples: Vec<(f64, f64)> = live
            .iter()
            .flat_map(|d| d.buffer.iter().copied())
            .collect();
        samples.sort_by(|a, b| a.0.total_cmp(&b.0));

        let compressed = compress_into(
            result.scale,
            result.compression,
            MergeByMean::new(merged.iter(), &samples),
        );
        result.store.replace_sorted(compressed);

        for d in live {
            result.total_weight += d.total_weight;
            result.sum += d.sum;
            result.min = result.min.min(d.min);
            result.max = result.max.max(d.max);
        }
        result
    }

    /* ===========================
     * Inspection (no flush)
     * =========================== */

    /// ∑w of every accepted sample, buffered or not.
    #[inline]
    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// ∑(w·x) of every accepted sample. Becomes `±inf` or NaN if the running
    /// sum overflows, even though every sample was finite.
    #[inline]
    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Weighted mean of the raw input; `None` while empty. Non-finite once
    /// [`sum`](Self::sum) has overflowed.
    #[inline]
    pub fn mean(&self) -> Option<f64> {
        (!self.is_empty()).then(|| self.sum / self.total_weight)
    }

    #[inline]
    pub fn min(&self) -> Option<f64> {
        (!self.is_empty()).then_some(self.min)
    }

    #[inline]
    pub fn max(&self) -> Option<f64> {
        (!self.is_empty()).then_some(self.max)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.total_weight == 0.0
    }

    #[inline]
    pub fn compression(&self) -> f64 {
        self.compression
    }

    #[inline]
    pub fn variant(&self) -> StorageVariant {
        self.variant
    }

    /// The configured scale family used by the compressor's k-limit.
    #[inline]
    pub fn scale(&self) -> ScaleFamily {
        self.scale
    }

    #[inline]
    pub fn buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }

    /// Samples waiting for the next compression pass.
    #[inline]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Number of compressed centroids (buffered samples not included).
    #[inline]
    pub fn centroid_count(&self) -> usize {
        self.store.len()
    }

    /// Flush, then copy out the centroids in ascending mean order.
    pub fn centroids(&mut self) -> Vec<Centroid> {
        self.flush();
        self.store.to_vec()
    }

    /* ===========================
     * Crate-internal views
     * =========================== */

    #[inline]
    pub(crate) fn store(&self) -> &Storage {
        &self.store
    }

    /// Stats as persisted; `data_min`/`data_max` are `±inf` while empty.
    pub(crate) fn stats(&self) -> DigestStats {
        DigestStats {
            total_weight: self.total_weight,
            data_sum: self.sum,
            data_min: self.min,
            data_max: self.max,
        }
    }

    /// Raw `(min, max)`; only meaningful when non-empty.
    #[inline]
    pub(crate) fn bounds(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    #[inline]
    pub(crate) fn ensure_non_empty(&self) -> TdResult<()> {
        if self.is_empty() {
            Err(TdError::EmptyDigest)
        } else {
            Ok(())
        }
    }
}
