use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{TdError, TdResult};

/// Scale families define the q→k mapping that controls compression density.
///
/// All families are steep near `q = 0` and `q = 1` (centroids stay small at the
/// tails) and flat around the median (centroids may grow there).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")] // accept "quad","k1","k2","k3"
pub enum ScaleFamily {
    /// Piecewise-quadratic scale.
    Quad,
    /// k1: arcsine scale, `δ/(2π)·asin(2q−1)`.
    K1,
    /// k2: logistic scale normalized by `Z(n) = 4·ln(n/δ) + 24` (DEFAULT).
    #[default]
    K2,
    /// k3: double-log scale normalized by `Z(n) = 4·ln(n/δ) + 21`.
    K3,
}

impl ScaleFamily {
    pub const ALL: [ScaleFamily; 4] = [
        ScaleFamily::Quad,
        ScaleFamily::K1,
        ScaleFamily::K2,
        ScaleFamily::K3,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ScaleFamily::Quad => "quad",
            ScaleFamily::K1 => "k1",
            ScaleFamily::K2 => "k2",
            ScaleFamily::K3 => "k3",
        }
    }
}

impl fmt::Display for ScaleFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScaleFamily {
    type Err = TdError;

    fn from_str(s: &str) -> TdResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quad" => Ok(ScaleFamily::Quad),
            "k1" => Ok(ScaleFamily::K1),
            "k2" => Ok(ScaleFamily::K2),
            "k3" => Ok(ScaleFamily::K3),
            _ => Err(TdError::UnknownScale { name: s.to_string() }),
        }
    }
}

const Q_EPS: f64 = 1e-15;

#[inline]
pub(crate) fn clamp(v: f64, lo: f64, hi: f64) -> f64 {
    v.max(lo).min(hi)
}

/// `q → k` mapping for one compression pass.
///
/// `K2` and `K3` depend on the total weight of the pass through their
/// normalizer, so the mapping is fixed once per pass.
#[derive(Debug, Clone, Copy)]
pub(crate) struct KScale {
    family: ScaleFamily,
    /// Compression (`δ`).
    d: f64,
    /// `δ / Z(n)` for the normalized families, `δ` otherwise.
    norm: f64,
}

impl KScale {
    pub(crate) fn new(family: ScaleFamily, compression: f64, total_weight: f64) -> Self {
        let n = total_weight.max(1.0);
        let z = |offset: f64| (4.0 * (n / compression).ln() + offset).max(1.0);
        let norm = match family {
            ScaleFamily::K2 => compression / z(24.0),
            ScaleFamily::K3 => compression / z(21.0),
            ScaleFamily::Quad | ScaleFamily::K1 => compression,
        };
        Self {
            family,
            d: compression,
            norm,
        }
    }

    /// Family-aware `q → k`. `q` is clamped to `[1e-15, 1 − 1e-15]`.
    #[inline]
    pub(crate) fn k(&self, q: f64) -> f64 {
        use std::f64::consts::PI;
        let qq = clamp(q, Q_EPS, 1.0 - Q_EPS);
        match self.family {
            // Inverse of: r=k/d; q = 2r^2 (r<0.5), else 1-2(1-r)^2
            ScaleFamily::Quad => {
                let r = if qq < 0.5 {
                    (qq * 0.5).sqrt()
                } else {
                    1.0 - ((1.0 - qq) * 0.5).sqrt()
                };
                self.d * r
            }
            ScaleFamily::K1 => {
                let s = (2.0 * qq - 1.0).clamp(-1.0, 1.0).asin();
                (self.d / (2.0 * PI)) * s
            }
            ScaleFamily::K2 => self.norm * (qq / (1.0 - qq)).ln(),
            ScaleFamily::K3 => {
                let a = (1.0 / (1.0 - qq)).ln(); // ln(1/(1-q))
                let b = (1.0 / qq).ln(); // ln(1/q)
                let ratio = (a / b).max(Q_EPS);
                self.norm * ratio.ln()
            }
        }
    }
}
