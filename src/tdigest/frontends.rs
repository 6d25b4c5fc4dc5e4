// src/tdigest/frontends.rs
//! Small, shared parsing & normalization helpers for string-facing callers
//! (the CLI, config files, persisted digests).
//! Keep this free of clap types; the binary maps its own enums onto these.

use std::str::FromStr;

use thiserror::Error;

use crate::tdigest::scale::ScaleFamily;
use crate::tdigest::snapshot::DigestSnapshot;
use crate::tdigest::storage::StorageVariant;
use crate::tdigest::wire::WireError;
use crate::tdigest::{TDigest, DEFAULT_COMPRESSION};
use crate::{TdError, TdResult};

#[derive(Debug, Error)]
pub enum FrontendError {
    #[error("not a number: {token:?}")]
    InvalidNumber { token: String },

    #[error("line {line}: not a number: {text:?}")]
    InvalidLine { line: usize, text: String },

    #[error(transparent)]
    Digest(#[from] TdError),

    #[error("unknown digest format {name:?} (expected 'binary' or 'json')")]
    UnknownFormat { name: String },

    #[error("binary digest: {0}")]
    Wire(#[from] WireError),

    #[error("json digest: {0}")]
    Json(#[from] serde_json::Error),
}

/// Lowercase/normalize a free-form string by removing `_`, `-` and spaces.
#[inline]
fn norm(s: &str) -> String {
    s.trim().to_ascii_lowercase().replace(['_', '-', ' '], "")
}

/* ----------------------- variant / scale ----------------------- */

/// `None` selects [`StorageVariant::Default`].
pub fn parse_variant_str(raw: Option<&str>) -> TdResult<StorageVariant> {
    match raw {
        None => Ok(StorageVariant::Default),
        Some(s) => StorageVariant::from_str(s),
    }
}

/// `None` selects [`ScaleFamily::K2`].
pub fn parse_scale_str(raw: Option<&str>) -> TdResult<ScaleFamily> {
    match raw.map(norm) {
        None => Ok(ScaleFamily::K2),
        Some(v) => ScaleFamily::from_str(&v),
    }
}

/* ----------------------- numbers ----------------------- */

fn parse_number(token: &str) -> Result<f64, FrontendError> {
    token
        .trim()
        .parse::<f64>()
        .map_err(|_| FrontendError::InvalidNumber {
            token: token.to_string(),
        })
}

/// Parse and validate a compression given as text.
pub fn parse_compression_str(raw: &str) -> Result<f64, FrontendError> {
    let value = parse_number(raw)?;
    crate::tdigest::tdigest::validate_compression(value)?;
    Ok(value)
}

/// Probabilities must lie in `[0, 1]`.
pub fn parse_probability(p: f64) -> TdResult<f64> {
    if (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(TdError::InvalidProbability { value: p })
    }
}

/// Numbers separated by whitespace, `,` or `;`.
pub fn parse_values(text: &str) -> Result<Vec<f64>, FrontendError> {
    text.split(|c: char| c.is_whitespace() || c == ',' || c == ';')
        .filter(|t| !t.is_empty())
        .map(parse_number)
        .collect()
}

/// One number per line. Blank lines yield `None`; `line_no` is 1-based and
/// only used for the error.
pub fn parse_value_line(line_no: usize, line: &str) -> Option<Result<f64, FrontendError>> {
    let text = line.trim();
    if text.is_empty() {
        return None;
    }
    Some(text.parse::<f64>().map_err(|_| FrontendError::InvalidLine {
        line: line_no,
        text: text.to_string(),
    }))
}

/* ----------------------- config ----------------------- */

/// String-level digest configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DigestConfig {
    pub compression: f64,
    pub variant: StorageVariant,
    pub scale: ScaleFamily,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            compression: DEFAULT_COMPRESSION,
            variant: StorageVariant::Default,
            scale: ScaleFamily::K2,
        }
    }
}

impl DigestConfig {
    /// Parse optional textual settings; missing ones take defaults.
    pub fn from_strs(
        compression: Option<&str>,
        variant: Option<&str>,
        scale: Option<&str>,
    ) -> Result<Self, FrontendError> {
        let compression = match compression {
            Some(raw) => parse_compression_str(raw)?,
            None => DEFAULT_COMPRESSION,
        };
        Ok(Self {
            compression,
            variant: parse_variant_str(variant)?,
            scale: parse_scale_str(scale)?,
        })
    }

    pub fn build(&self) -> TdResult<TDigest> {
        TDigest::builder()
            .compression(self.compression)
            .variant(self.variant)
            .scale(self.scale)
            .build()
    }
}

/* ----------------------- persisted digests ----------------------- */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DigestFormat {
    /// The `TDIG` wire blob.
    #[default]
    Binary,
    /// A serde_json [`DigestSnapshot`].
    Json,
}

impl DigestFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            DigestFormat::Binary => "binary",
            DigestFormat::Json => "json",
        }
    }

    pub fn encode(self, td: &mut TDigest) -> Result<Vec<u8>, FrontendError> {
        match self {
            DigestFormat::Binary => Ok(td.to_bytes()),
            DigestFormat::Json => Ok(serde_json::to_vec_pretty(&td.snapshot())?),
        }
    }

    pub fn decode(self, bytes: &[u8]) -> Result<TDigest, FrontendError> {
        match self {
            DigestFormat::Binary => Ok(TDigest::from_bytes(bytes)?),
            DigestFormat::Json => {
                let snap: DigestSnapshot = serde_json::from_slice(bytes)?;
                Ok(TDigest::from_snapshot(snap)?)
            }
        }
    }
}

impl FromStr for DigestFormat {
    type Err = FrontendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match norm(s).as_str() {
            "binary" | "bin" | "tdig" => Ok(DigestFormat::Binary),
            "json" => Ok(DigestFormat::Json),
            _ => Err(FrontendError::UnknownFormat {
                name: s.to_string(),
            }),
        }
    }
}
