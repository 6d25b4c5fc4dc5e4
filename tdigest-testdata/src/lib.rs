//! tdigest-testdata
//! Seeded synthetic streams shared by the stream-tdigest tests and benches.
//! Bounded shapes are squashed into \[0,1] so error numbers are comparable.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp, Normal};

/// Available synthetic distributions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DistKind {
    /// Uniform in \[0,1)
    Uniform,
    /// Gaussian mapped to \[0,1]
    Normal,
    /// Log-normal-ish: exp(N(0, σ²)) squashed to \[0,1]
    LogNormal { sigma: f64 },
    /// Exponential with rate `lambda`, left unbounded (heavy right tail).
    Exponential { lambda: f64 },
    /// Mixed: clumps with repeated values, a broad region, and heavy tails
    Mixture,
}

impl DistKind {
    /// Every shape, with the parameters the quality harness uses.
    pub const ALL: [DistKind; 5] = [
        DistKind::Uniform,
        DistKind::Normal,
        DistKind::LogNormal { sigma: 1.0 },
        DistKind::Exponential { lambda: 1.0 },
        DistKind::Mixture,
    ];
}

/// Generate `n` samples for the chosen distribution.
pub fn gen_dataset(kind: DistKind, n: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = Vec::with_capacity(n);

    match kind {
        DistKind::Uniform => {
            for _ in 0..n {
                out.push(rng.random::<f64>());
            }
        }
        DistKind::Normal => {
            let normal = Normal::new(0.0, 1.0).expect("unit normal");
            for _ in 0..n {
                let z: f64 = normal.sample(&mut rng);
                out.push((0.5 + 0.2 * z).clamp(0.0, 1.0));
            }
        }
        DistKind::LogNormal { sigma } => {
            let normal = Normal::new(0.0, 1.0).expect("unit normal");
            for _ in 0..n {
                let z: f64 = normal.sample(&mut rng);
                let x = (sigma * z).exp();
                out.push((x / (1.0 + x)).clamp(0.0, 1.0));
            }
        }
        DistKind::Exponential { lambda } => {
            let exp = Exp::new(lambda).expect("positive rate");
            for _ in 0..n {
                out.push(exp.sample(&mut rng));
            }
        }
        DistKind::Mixture => {
            for _ in 0..n {
                let bucket: u32 = rng.random_range(0..100);
                let v = match bucket {
                    // Exact repeats at 0.1, 0.5, 0.9 (exercise piles)
                    0..=14 => match rng.random_range(0..3) {
                        0 => 0.10,
                        1 => 0.50,
                        _ => 0.90,
                    },
                    // Clumps around the same centres with micro-noise
                    15..=29 => {
                        let center = match rng.random_range(0..3) {
                            0 => 0.10,
                            1 => 0.50,
                            _ => 0.90,
                        };
                        center + rng.random_range(-1.0..1.0) * 1e-3
                    }
                    30..=69 => rng.random::<f64>(),
                    _ => {
                        let exp = rng.random_range(3.0..9.0);
                        if rng.random_bool(0.5) {
                            rng.random::<f64>().clamp(1e-12, 1.0).powf(exp)
                        } else {
                            1.0 - rng.random::<f64>().clamp(1e-12, 1.0).powf(exp)
                        }
                    }
                };
                out.push(v.clamp(0.0, 1.0));
            }
        }
    }
    out
}

/// Same as [`gen_dataset`], sorted ascending.
pub fn gen_sorted(kind: DistKind, n: usize, seed: u64) -> Vec<f64> {
    let mut xs = gen_dataset(kind, n, seed);
    xs.sort_by(f64::total_cmp);
    xs
}

/// `n` integer weights drawn uniformly from `1..=max_weight`.
pub fn gen_weights(n: usize, max_weight: u32, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed ^ 0x9e37_79b9_7f4a_7c15);
    (0..n)
        .map(|_| rng.random_range(1..=max_weight.max(1)) as f64)
        .collect()
}
