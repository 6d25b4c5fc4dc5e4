//! CDF (cumulative distribution function) evaluation for `TDigest`.
//!
//! # Semantics
//! - **Outside support**: strictly below `min` → `0`, strictly above `max` → `1`.
//! - **Single centroid**: `min → mean → max`, the mean at `0.5`.
//! - **Left/right tails**: linear ramps between `min↔mean[0]` and
//!   `mean[last]↔max`, where the edge centroid contributes **half weight**.
//! - **Exact centroid hit**: midpoint mass `(prefix + 0.5·w) / N`.
//! - **Between centroids**: centre-to-centre interpolation that **excludes
//!   atomic half-mass** from the span. Two atomic neighbours produce a
//!   **step** (no smearing).
//!
//! # Guarantees
//! - Output is in **[0, 1]** and non-decreasing in the probe.
//! - With capacity to keep every distinct value, the result matches the
//!   **midpoint ECDF** at the training values.
//!
//! # Errors
//! - NaN probe → [`TdError::NonFiniteInput`]. `±inf` are fine (they clamp).
//! - Empty digest → [`TdError::EmptyDigest`].
//!
//! # Performance
//! Array storage locates a probe with a binary search; tree storage walks in
//! order. Large batches go through Rayon.

use rayon::prelude::*;

use crate::tdigest::storage::CentroidStore;
use crate::tdigest::TDigest;
use crate::{TdError, TdResult};

/// Crossover for parallel evaluation with Rayon.
///
/// Rayon setup has a fixed cost; below this size a scalar loop is faster.
const PAR_MIN: usize = 32_768;

#[inline]
fn validate_probe(x: f64) -> TdResult<()> {
    if x.is_nan() {
        Err(TdError::NonFiniteInput {
            context: "cdf probe",
        })
    } else {
        Ok(())
    }
}

impl TDigest {
    /// Estimated fraction of the weight at or below `x`. Flushes first.
    pub fn cdf(&mut self, x: f64) -> TdResult<f64> {
        validate_probe(x)?;
        self.ensure_non_empty()?;
        self.flush();
        Ok(self.cdf_flushed(x))
    }

    /// Evaluate many probes; all are validated before any work.
    pub fn cdf_many(&mut self, xs: &[f64]) -> TdResult<Vec<f64>> {
        for &x in xs {
            validate_probe(x)?;
        }
        self.ensure_non_empty()?;
        self.flush();

        let this = &*self;
        if xs.len() >= PAR_MIN {
            Ok(xs
                .par_iter()
                .with_min_len(4096)
                .map(|&x| this.cdf_flushed(x))
                .collect())
        } else {
            Ok(xs.iter().map(|&x| this.cdf_flushed(x)).collect())
        }
    }

    /// Kernel over a flushed, non-empty digest.
    fn cdf_flushed(&self, x: f64) -> f64 {
        let store = self.store();
        let (min, max) = self.bounds();
        let n = self.total_weight();

        if x < min {
            return 0.0;
        }
        if x > max {
            return 1.0;
        }
        if store.len() == 1 {
            // One centroid: half its weight on each side of the mean, spread
            // linearly towards the observed extremes. A point mass steps at
            // its value.
            return match store.first() {
                Some(c) => single_centroid_cdf(x, min, c.mean(), max),
                None => f64::NAN,
            };
        }

        let pos = store.locate_mean(x);
        let p = if pos.exact {
            match store.get(pos.idx) {
                Some(c) => (pos.prefix + 0.5 * c.weight()) / n,
                None => return f64::NAN,
            }
        } else if pos.idx == 0 {
            match store.first() {
                Some(c) => left_tail(x, min, c.mean(), c.weight()) / n,
                None => return f64::NAN,
            }
        } else if pos.idx == store.len() {
            match store.last() {
                Some(c) => 1.0 - right_tail(x, max, c.mean(), c.weight()) / n,
                None => return f64::NAN,
            }
        } else {
            let (Some(l), Some(r)) = (store.get(pos.idx - 1), store.get(pos.idx)) else {
                return f64::NAN;
            };
            let (ml, wl) = (l.mean(), l.weight());
            let (mr, wr) = (r.mean(), r.weight());

            // Atomic-aware exclusion: subtract w/2 for any atomic neighbour.
            let left_excl = if l.is_atomic() { 0.5 * wl } else { 0.0 };
            let right_excl = if r.is_atomic() { 0.5 * wr } else { 0.0 };

            // Left centre is `prefix(right) − wl/2`.
            let base = pos.prefix - 0.5 * wl + left_excl;
            let dw_span = 0.5 * (wl + wr) - left_excl - right_excl;
            if dw_span <= 0.0 {
                base / n
            } else {
                (base + dw_span * (x - ml) / (mr - ml)) / n
            }
        };
        p.clamp(0.0, 1.0)
    }
}

/// `min <= x <= max` over a lone centroid at `mean`.
#[inline]
fn single_centroid_cdf(x: f64, min: f64, mean: f64, max: f64) -> f64 {
    if x < mean {
        0.5 * (x - min) / (mean - min)
    } else if x > mean {
        0.5 + 0.5 * (x - mean) / (max - mean)
    } else {
        0.5
    }
}

/// Weight left of `x` for `min <= x < mean0`. The sample at `min` holds at most
/// one unit (less when weights are fractional).
#[inline]
fn left_tail(x: f64, min: f64, mean0: f64, w0: f64) -> f64 {
    let gap = mean0 - min;
    let u = (0.5 * w0).min(1.0);
    if gap <= 0.0 {
        return 0.0;
    }
    if x == min {
        return 0.5 * u;
    }
    u + (x - min) / gap * (0.5 * w0 - u)
}

/// Weight right of `x` for `mean_last < x <= max`; mirror of [`left_tail`].
#[inline]
fn right_tail(x: f64, max: f64, mean_last: f64, w_last: f64) -> f64 {
    let gap = max - mean_last;
    let u = (0.5 * w_last).min(1.0);
    if gap <= 0.0 {
        return 0.0;
    }
    if x == max {
        return 0.5 * u;
    }
    u + (max - x) / gap * (0.5 * w_last - u)
}
