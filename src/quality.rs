//! Accuracy harness: build a digest over a seeded synthetic dataset and
//! compare its answers with the exact ones on a fixed grid.
//!
//! Two probes:
//! - [`assess_cdf`]: CDF on an evenly spaced value grid spanning the data,
//!   against the midpoint ECDF;
//! - [`assess_quantiles`]: quantiles on `q = i/1000`, against mid-rank
//!   interpolation between order statistics.
//!
//! Both report the max error (KS-like), the mean absolute error and a
//! scalar score in `(0, 1]` (higher is better).

pub use tdigest_testdata::{gen_dataset, gen_sorted, DistKind};

use crate::tdigest::frontends::DigestConfig;
use crate::tdigest::TDigest;
use crate::TdResult;

/// Grid resolution for both probes.
const GRID_STEPS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityReport {
    pub n: usize,
    /// KS-like error (max absolute error on the grid).
    pub ks: f64,
    /// Mean absolute error on the grid.
    pub mae: f64,
    /// A single scalar for rough comparison (higher is better).
    pub score: f64,
}

impl QualityReport {
    #[inline]
    pub fn from_metrics(n: usize, ks: f64, mae: f64) -> Self {
        // Same heuristic everywhere so numbers are comparable.
        let score = (-((1200.0 * mae) + (18.0 * ks))).exp();
        QualityReport { n, ks, mae, score }
    }

    /// No worse on both error metrics, up to `1e-12`.
    pub fn no_worse_than(&self, other: &QualityReport) -> bool {
        let eps = 1e-12;
        self.ks <= other.ks + eps && self.mae <= other.mae + eps
    }

    pub fn to_line(&self) -> String {
        format!(
            "QualityReport(n={}, KS={:.6e}, MAE={:.6e}, score={:.3})",
            self.n, self.ks, self.mae, self.score
        )
    }
}

/// Mid-rank interpolation between order statistics: the `i`-th value sits at
/// `q = (i + 0.5)/n`, outside that range the extremes are returned.
pub fn expected_quantile(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    let t = (q * n as f64 - 0.5).clamp(0.0, (n - 1) as f64);
    let lo = t.floor() as usize;
    let hi = t.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let alpha = t - lo as f64;
        (1.0 - alpha) * sorted[lo] + alpha * sorted[hi]
    }
}

/// Midpoint ECDF of a sorted sample: ties count half.
pub fn midpoint_ecdf(sorted: &[f64], x: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let below = sorted.partition_point(|&v| v < x);
    let at_or_below = sorted.partition_point(|&v| v <= x);
    (below as f64 + 0.5 * (at_or_below - below) as f64) / sorted.len() as f64
}

fn build(sorted: &[f64], config: &DigestConfig) -> TdResult<TDigest> {
    let mut td = config.build()?;
    td.add_many(sorted)?;
    Ok(td)
}

fn summarize(n: usize, errors: impl Iterator<Item = f64>) -> QualityReport {
    let (mut ks, mut sum, mut count) = (0.0f64, 0.0f64, 0usize);
    for err in errors {
        ks = ks.max(err);
        sum += err;
        count += 1;
    }
    let mae = if count == 0 { f64::NAN } else { sum / count as f64 };
    QualityReport::from_metrics(n, ks, mae)
}

/// CDF error over `[min, max]` of a generated dataset.
pub fn assess_cdf(
    kind: DistKind,
    n: usize,
    config: &DigestConfig,
    seed: u64,
) -> TdResult<QualityReport> {
    let data = gen_sorted(kind, n, seed);
    let (Some(&lo), Some(&hi)) = (data.first(), data.last()) else {
        return Ok(QualityReport::from_metrics(0, f64::NAN, f64::NAN));
    };
    let mut td = build(&data, config)?;

    let grid: Vec<f64> = (0..=GRID_STEPS)
        .map(|i| lo + (hi - lo) * i as f64 / GRID_STEPS as f64)
        .collect();
    let est = td.cdf_many(&grid)?;
    Ok(summarize(
        n,
        grid.iter()
            .zip(&est)
            .map(|(&x, &p)| (p - midpoint_ecdf(&data, x)).abs()),
    ))
}

/// Quantile error on `q = i/1000`, `0 < i < 1000`.
pub fn assess_quantiles(
    kind: DistKind,
    n: usize,
    config: &DigestConfig,
    seed: u64,
) -> TdResult<QualityReport> {
    let data = gen_sorted(kind, n, seed);
    if data.is_empty() {
        return Ok(QualityReport::from_metrics(0, f64::NAN, f64::NAN));
    }
    let mut td = build(&data, config)?;

    let qs: Vec<f64> = (1..GRID_STEPS)
        .map(|i| i as f64 / GRID_STEPS as f64)
        .collect();
    let est = td.quantiles(&qs)?;
    Ok(summarize(
        n,
        qs.iter()
            .zip(&est)
            .map(|(&q, &v)| (v - expected_quantile(&data, q)).abs()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tdigest::{ScaleFamily, StorageVariant};

    const SEED: u64 = 4242;
    const N: usize = 50_000;

    fn config(compression: f64, scale: ScaleFamily) -> DigestConfig {
        DigestConfig {
            compression,
            variant: StorageVariant::Default,
            scale,
        }
    }

    #[test]
    fn expected_quantile_uses_mid_ranks() {
        let xs = [10.0, 20.0, 30.0, 40.0];
        assert_eq!(expected_quantile(&xs, 0.125), 10.0);
        assert_eq!(expected_quantile(&xs, 0.25), 15.0);
        assert_eq!(expected_quantile(&xs, 0.5), 25.0);
        assert_eq!(expected_quantile(&xs, 0.0), 10.0);
        assert_eq!(expected_quantile(&xs, 1.0), 40.0);
        assert!(expected_quantile(&[], 0.5).is_nan());
    }

    #[test]
    fn midpoint_ecdf_counts_ties_half() {
        let xs = [1.0, 2.0, 2.0, 3.0];
        assert_eq!(midpoint_ecdf(&xs, 0.0), 0.0);
        assert_eq!(midpoint_ecdf(&xs, 2.0), 0.5);
        assert_eq!(midpoint_ecdf(&xs, 2.5), 0.75);
        assert_eq!(midpoint_ecdf(&xs, 3.0), 0.875);
    }

    #[test]
    fn smooth_shapes_stay_accurate_for_every_scale() {
        for scale in ScaleFamily::ALL {
            for kind in [DistKind::Uniform, DistKind::Normal] {
                let cfg = config(100.0, scale);
                let c = assess_cdf(kind, N, &cfg, SEED).unwrap();
                let q = assess_quantiles(kind, N, &cfg, SEED).unwrap();
                eprintln!("{scale}/{kind:?} cdf {} q {}", c.to_line(), q.to_line());
                assert!(c.ks < 0.02 && c.mae < 5e-3, "cdf {}", c.to_line());
                assert!(q.ks < 0.02 && q.mae < 5e-3, "quantile {}", q.to_line());
                assert!(c.score > 0.0 && c.score <= 1.0);
            }
        }
    }

    #[test]
    fn larger_compression_is_no_worse_on_uniform() {
        let small = assess_cdf(DistKind::Uniform, N, &config(50.0, ScaleFamily::K2), SEED).unwrap();
        let large =
            assess_cdf(DistKind::Uniform, N, &config(1000.0, ScaleFamily::K2), SEED).unwrap();
        eprintln!("small {} / large {}", small.to_line(), large.to_line());
        assert!(large.no_worse_than(&small));
        assert!(large.score >= small.score);
    }

    #[test]
    fn every_shape_produces_finite_metrics() {
        for kind in DistKind::ALL {
            let r = assess_quantiles(kind, 10_000, &DigestConfig::default(), 7).unwrap();
            assert!(r.ks.is_finite() && r.mae.is_finite(), "{kind:?}: {}", r.to_line());
            let c = assess_cdf(kind, 10_000, &DigestConfig::default(), 7).unwrap();
            assert!((0.0..=1.0).contains(&c.ks), "{kind:?}: {}", c.to_line());
        }
    }

    #[test]
    fn empty_dataset_reports_nan() {
        let r = assess_cdf(DistKind::Uniform, 0, &DigestConfig::default(), 1).unwrap();
        assert_eq!(r.n, 0);
        assert!(r.ks.is_nan());
    }
}
