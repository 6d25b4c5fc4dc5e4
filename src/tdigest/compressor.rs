use tracing::trace;

use crate::tdigest::centroids::{is_sorted_strict_by_mean, Centroid};
use crate::tdigest::scale::{KScale, ScaleFamily};

/// Slack on the unit k-span so rounding never splits an exactly-full cluster.
pub(crate) const KLIMIT_TOL: f64 = 1e-12;

/// Greedy k-limit pass over strictly mean-sorted items.
///
/// A cluster keeps absorbing the next item while its span on the `k` axis
/// stays within one unit. An item whose own span already exceeds one unit is
/// left alone. Cluster means stay inside the range of their members.
fn klimit_merge(items: &[Centroid], scale: &KScale, total_w: f64) -> Vec<Centroid> {
    let Some(first) = items.first() else {
        return Vec::new();
    };

    let mut clusters: Vec<Centroid> = Vec::with_capacity(items.len());
    let mut before = 0.0_f64; // weight left of the open cluster
    let mut acc = *first;
    let mut lo_mean = first.mean();
    let mut k_left = scale.k(0.0);

    for c in &items[1..] {
        let q_right = (before + acc.weight() + c.weight()) / total_w;
        if scale.k(q_right) - k_left <= 1.0 + KLIMIT_TOL {
            acc.absorb(c);
            // Incremental means may drift an ulp past the last member.
            let m = acc.mean().clamp(lo_mean, c.mean());
            acc = Centroid::with_kind(m, acc.weight(), acc.is_atomic());
        } else {
            before += acc.weight();
            clusters.push(acc);
            acc = *c;
            lo_mean = c.mean();
            k_left = scale.k(before / total_w);
        }
    }
    clusters.push(acc);
    clusters
}

/// Fold runs of equal means into one centroid; atomic iff every member was.
///
/// Input must be non-decreasing by mean.
fn coalesce_equal_means<I>(items: I) -> Vec<Centroid>
where
    I: IntoIterator<Item = Centroid>,
{
    let mut out: Vec<Centroid> = Vec::new();
    for c in items {
        match out.last_mut() {
            Some(last) if last.mean() == c.mean() => last.absorb(&c),
            Some(last) => {
                debug_assert!(
                    last.mean() < c.mean(),
                    "compression input must be sorted by mean"
                );
                out.push(c);
            }
            None => out.push(c),
        }
    }
    out
}

/// One compression pass: coalesce, then k-limit merge under `family` at
/// `compression`. Returns strictly mean-sorted centroids with the same total
/// weight as the input.
pub(crate) fn compress_into<I>(family: ScaleFamily, compression: f64, items: I) -> Vec<Centroid>
where
    I: IntoIterator<Item = Centroid>,
{
    let coalesced = coalesce_equal_means(items);
    let total_w: f64 = coalesced.iter().map(|c| c.weight()).sum();
    if coalesced.len() <= 1 {
        return coalesced;
    }

    let scale = KScale::new(family, compression, total_w);
    let compressed = klimit_merge(&coalesced, &scale, total_w);

    trace!(
        scale = %family,
        n_in = coalesced.len(),
        n_out = compressed.len(),
        total_w,
        "compression pass"
    );
    debug_assert!(is_sorted_strict_by_mean(&compressed));
    compressed
}

/// Largest k-span of any multi-member cluster, measured at the edges of each
/// centroid. Used by tests to check the scale invariant.
#[cfg(test)]
pub(crate) fn max_merged_k_span(cs: &[Centroid], family: ScaleFamily, compression: f64) -> f64 {
    let total: f64 = cs.iter().map(|c| c.weight()).sum();
    let scale = KScale::new(family, compression, total);
    let mut before = 0.0;
    let mut worst = 0.0_f64;
    for c in cs {
        let span = scale.k((before + c.weight()) / total) - scale.k(before / total);
        // Atomic centroids are single inputs (or piles) and may exceed one unit.
        if !c.is_atomic() {
            worst = worst.max(span);
        }
        before += c.weight();
    }
    worst
}
