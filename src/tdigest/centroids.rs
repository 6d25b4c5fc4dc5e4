use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A centroid summarizes a cluster in the digest.
///
/// `atomic` is a *data* flag:
/// - `true` when every absorbed sample had the same value (a single raw
///   sample, or a pile of identical values with `weight > 1`),
/// - `false` for a mixed cluster.
///
/// Queries treat atomic centroids as point masses and never interpolate
/// through them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Centroid {
    mean: OrderedFloat<f64>,
    weight: OrderedFloat<f64>,
    atomic: bool,
}

impl PartialOrd for Centroid {
    fn partial_cmp(&self, other: &Centroid) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Centroid {
    fn cmp(&self, other: &Centroid) -> Ordering {
        // Compressed digests never hold duplicate means; ordering by mean alone is fine.
        self.mean.cmp(&other.mean)
    }
}

impl Centroid {
    /// A mixed cluster (not known to be single-valued).
    #[inline]
    pub fn new(mean: f64, weight: f64) -> Self {
        Self::new_mixed(mean, weight)
    }

    /// A point mass: one raw sample, or a pile of identical samples.
    #[inline]
    pub fn new_atomic(mean: f64, weight: f64) -> Self {
        debug_assert!(weight > 0.0);
        Centroid {
            mean: OrderedFloat::from(mean),
            weight: OrderedFloat::from(weight),
            atomic: true,
        }
    }

    #[inline]
    pub fn new_mixed(mean: f64, weight: f64) -> Self {
        debug_assert!(weight > 0.0);
        Centroid {
            mean: OrderedFloat::from(mean),
            weight: OrderedFloat::from(weight),
            atomic: false,
        }
    }

    #[inline]
    pub(crate) fn with_kind(mean: f64, weight: f64, atomic: bool) -> Self {
        if atomic {
            Self::new_atomic(mean, weight)
        } else {
            Self::new_mixed(mean, weight)
        }
    }

    #[inline]
    pub fn mean(&self) -> f64 {
        self.mean.into_inner()
    }
    #[inline]
    pub fn weight(&self) -> f64 {
        self.weight.into_inner()
    }
    #[inline]
    pub fn is_atomic(&self) -> bool {
        self.atomic
    }

    /// Absorb `other`, moving the mean by the weighted difference.
    ///
    /// The result stays atomic only when both sides are atomic at the same mean.
    #[inline]
    pub fn absorb(&mut self, other: &Centroid) {
        let w0 = self.weight();
        let w = w0 + other.weight();
        let m = if self.mean == other.mean {
            self.mean()
        } else {
            self.mean() + other.weight() * (other.mean() - self.mean()) / w
        };
        self.atomic = self.atomic && other.atomic && self.mean == other.mean;
        self.mean = OrderedFloat::from(m);
        self.weight = OrderedFloat::from(w);
    }
}

/* ===========================
 * Helpers used by compressor
 * =========================== */

/// Strictly increasing by mean.
#[inline]
pub fn is_sorted_strict_by_mean(cs: &[Centroid]) -> bool {
    cs.windows(2).all(|w| w[0].mean() < w[1].mean())
}

/// Non-strictly increasing by mean (allows equal means).
#[inline]
pub fn is_sorted_by_mean(cs: &[Centroid]) -> bool {
    cs.windows(2).all(|w| w[0] <= w[1])
}
