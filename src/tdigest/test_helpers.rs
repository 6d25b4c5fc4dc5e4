//! Shared assertions for the digest unit tests.

pub fn assert_exact(label: &str, expected: f64, got: f64) {
    assert!(
        expected == got,
        "{}: expected exactly {:.12}, got {:.12}",
        label,
        expected,
        got
    );
}

pub fn assert_rel_close(label: &str, expected: f64, got: f64, rtol: f64) {
    let denom = expected.abs().max(1e-300);
    let rel = ((expected - got).abs()) / denom;
    assert!(
        rel <= rtol,
        "{}: expected ~= {:.9}, got {:.9}, rel_err={:.6e}, rtol={:.6e}",
        label,
        expected,
        got,
        rel,
        rtol
    );
}

pub fn assert_abs_close(label: &str, expected: f64, got: f64, atol: f64) {
    assert!(
        (expected - got).abs() <= atol,
        "{}: expected {:.9} ± {:.3e}, got {:.9}",
        label,
        expected,
        atol,
        got
    );
}

pub fn assert_monotone_chain(label: &str, values: &[f64]) {
    for i in 1..values.len() {
        assert!(
            values[i] >= values[i - 1],
            "{}: non-monotone at i={}: {} < {}",
            label,
            i,
            values[i],
            values[i - 1]
        );
    }
}

/// Order statistics bracketing rank `q·(n−1)` in sorted `values`.
pub fn bracket(values: &[f64], q: f64) -> (f64, f64) {
    assert!(!values.is_empty(), "bracket() requires non-empty values");
    let n = values.len();
    let r = q.clamp(0.0, 1.0) * (n.saturating_sub(1) as f64);
    (values[r.floor() as usize], values[r.ceil() as usize])
}

/// Midpoint ECDF of sorted `values` at `x`: `(#less + #equal/2) / n`.
pub fn midpoint_ecdf(values: &[f64], x: f64) -> f64 {
    let less = values.partition_point(|&v| v < x);
    let le = values.partition_point(|&v| v <= x);
    (less as f64 + 0.5 * (le - less) as f64) / values.len() as f64
}
