//! Serde view of a digest.
//!
//! A [`DigestSnapshot`] carries the configuration, the raw-data stats and the
//! compressed centroids. It never carries unmerged samples: taking a snapshot
//! flushes the buffer. Restoring validates the content the same way the wire
//! decoder does.

use serde::{Deserialize, Serialize};

use crate::tdigest::centroids::Centroid;
use crate::tdigest::scale::ScaleFamily;
use crate::tdigest::storage::StorageVariant;
use crate::tdigest::{DigestStats, TDigest};
use crate::{TdError, TdResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DigestSnapshot {
    pub compression: f64,
    #[serde(default)]
    pub variant: StorageVariant,
    #[serde(default)]
    pub scale: ScaleFamily,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buffer_capacity: Option<usize>,
    pub total_weight: f64,
    /// `null` in JSON once the running sum has overflowed.
    #[serde(with = "lossy_sum")]
    pub sum: f64,
    /// `None` for an empty digest.
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// Ascending by mean.
    pub centroids: Vec<Centroid>,
}

/// JSON has no `inf`/NaN: a non-finite sum is written as `null` and read back
/// as NaN.
mod lossy_sum {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(sum: &f64, s: S) -> Result<S::Ok, S::Error> {
        if sum.is_finite() {
            s.serialize_f64(*sum)
        } else {
            s.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(d)?.unwrap_or(f64::NAN))
    }
}

impl TDigest {
    /// Flush and capture the digest.
    pub fn snapshot(&mut self) -> DigestSnapshot {
        let centroids = self.centroids();
        DigestSnapshot {
            compression: self.compression(),
            variant: self.variant(),
            scale: self.scale(),
            buffer_capacity: Some(self.buffer_capacity()),
            total_weight: self.total_weight(),
            sum: self.sum(),
            min: self.min(),
            max: self.max(),
            centroids,
        }
    }

    /// Rebuild a digest from a snapshot.
    pub fn from_snapshot(snap: DigestSnapshot) -> TdResult<TDigest> {
        let (min, max) = match (snap.min, snap.max) {
            (Some(lo), Some(hi)) => (lo, hi),
            (None, None) if snap.centroids.is_empty() => (f64::INFINITY, f64::NEG_INFINITY),
            _ => {
                return Err(TdError::InvalidSnapshot {
                    reason: "min and max must both be present for a non-empty digest",
                })
            }
        };
        let stats = DigestStats {
            total_weight: snap.total_weight,
            data_sum: snap.sum,
            data_min: min,
            data_max: max,
        };
        let td = TDigest::from_parts(
            snap.compression,
            snap.variant,
            snap.scale,
            snap.centroids,
            stats,
        )?;
        match snap.buffer_capacity {
            Some(0) => Err(TdError::InvalidBufferCapacity),
            Some(n) => Ok(td.with_buffer_capacity(n)),
            None => Ok(td),
        }
    }
}
