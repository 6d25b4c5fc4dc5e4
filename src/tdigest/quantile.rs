//! Quantile evaluation for `TDigest`.
//!
//! Half-weight bracketing in the style of the reference MergingDigest:
//!
//! - **Index mapping**: `q ∈ [0,1]` maps to the cumulative weight `i = q·N`,
//!   `N = ∑w`.
//! - **Centres**: each centroid sits at half its weight from its left edge;
//!   adjacent centres are `(w_left + w_right)/2` apart.
//! - **Edge clamps**: the extreme samples own `u = min(1, w_edge/2)` of the
//!   weight, so `i < u₀` returns `min` and `N − i < u_last` returns `max`.
//!   With unit weights this is the usual one-sample clamp.
//! - **Tail ramps**: between `u` and the edge centroid's centre, interpolate
//!   linearly from `min` to its mean (symmetric on the right towards `max`).
//! - **Single centroid**: `min → mean → max` with the mean at `q = 0.5`.
//! - **Atomic centroids** (single values and piles of identical values):
//!   inside their half weight the answer snaps to their mean, and that half
//!   weight is removed from the interpolation span. This mirrors the CDF.
//!
//! # Guarantees
//! - Monotone non-decreasing in `q`.
//! - With capacity to keep every distinct value, `quantile(0) == min`,
//!   `quantile(1) == max` and `quantile((i+0.5)/N)` is the `i`-th order
//!   statistic.
//!
//! # Errors
//! - `q` NaN or outside `[0,1]` → [`TdError::QuantileOutOfRange`].
//! - Empty digest → [`TdError::EmptyDigest`].

use crate::tdigest::storage::{Bracket, CentroidStore};
use crate::tdigest::TDigest;
use crate::{TdError, TdResult};

#[inline]
fn validate_q(q: f64) -> TdResult<()> {
    if (0.0..=1.0).contains(&q) {
        Ok(())
    } else {
        Err(TdError::QuantileOutOfRange { q })
    }
}

/// One centroid spreads over `[min, max]` with its mean at the half-way rank.
/// Inverse of the single-centroid branch of the CDF.
#[inline]
fn single_centroid_quantile(q: f64, min: f64, mean: f64, max: f64) -> f64 {
    if q < 0.5 {
        min + 2.0 * q * (mean - min)
    } else if q > 0.5 {
        mean + (2.0 * q - 1.0) * (max - mean)
    } else {
        mean
    }
}

impl TDigest {
    /// Estimate the value at quantile `q`. Flushes buffered samples first.
    pub fn quantile(&mut self, q: f64) -> TdResult<f64> {
        validate_q(q)?;
        self.ensure_non_empty()?;
        self.flush();
        Ok(self.quantile_flushed(q))
    }

    /// `quantile(0.5)`.
    #[inline]
    pub fn median(&mut self) -> TdResult<f64> {
        self.quantile(0.5)
    }

    /// Evaluate several quantiles; every `q` is validated before any work.
    pub fn quantiles(&mut self, qs: &[f64]) -> TdResult<Vec<f64>> {
        for &q in qs {
            validate_q(q)?;
        }
        self.ensure_non_empty()?;
        self.flush();
        Ok(qs.iter().map(|&q| self.quantile_flushed(q)).collect())
    }

    /// Kernel over a flushed, non-empty digest.
    fn quantile_flushed(&self, q: f64) -> f64 {
        let store = self.store();
        let (min, max) = self.bounds();
        let (Some(first), Some(last)) = (store.first(), store.last()) else {
            return f64::NAN;
        };

        if q == 0.0 {
            return min;
        }
        if q == 1.0 {
            return max;
        }
        if store.len() == 1 {
            return single_centroid_quantile(q, min, first.mean(), max);
        }

        let n = self.total_weight();
        let index = q * n;

        // The extreme samples hold at most one unit each, less when the edge
        // centroid itself is lighter than two units.
        let w0 = first.weight();
        let u0 = (0.5 * w0).min(1.0);
        if index < u0 {
            return min;
        }
        let wl = last.weight();
        let ul = (0.5 * wl).min(1.0);
        if n - index < ul {
            return max;
        }

        // Tail ramps between the observed extremes and the edge centroids.
        if index < 0.5 * w0 {
            return min + (index - u0) / (0.5 * w0 - u0) * (first.mean() - min);
        }
        if n - index < 0.5 * wl {
            return max - (n - index - ul) / (0.5 * wl - ul) * (max - last.mean());
        }

        match store.locate_center(index) {
            Some(bracket) => self.interpolate_between_centroids(bracket, index),
            None => first.mean(),
        }
    }

    /// Interpolate inside a bracketing pair, honouring atomic dead zones.
    fn interpolate_between_centroids(&self, b: Bracket, index: f64) -> f64 {
        let store = self.store();
        let (Some(l), Some(r)) = (store.get(b.left), store.get(b.left + 1)) else {
            return f64::NAN;
        };
        let (ml, wl) = (l.mean(), l.weight());
        let (mr, wr) = (r.mean(), r.weight());

        if l.is_atomic() && index - b.left_center < wl / 2.0 {
            return ml;
        }
        if r.is_atomic() && b.right_center - index <= wr / 2.0 {
            return mr;
        }

        let dead_l = if l.is_atomic() { wl / 2.0 } else { 0.0 };
        let dead_r = if r.is_atomic() { wr / 2.0 } else { 0.0 };
        let z1 = index - b.left_center - dead_l;
        let z2 = b.right_center - index - dead_r;
        let denom = z1 + z2;
        if denom <= 0.0 {
            return mr;
        }
        ((ml * z2 + mr * z1) / denom).clamp(ml, mr)
    }
}
