// src/error.rs
use thiserror::Error;

/// Coarse classification of a [`TdError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad construction parameters (compression, variant, scale, probability).
    Configuration,
    /// Bad input to an operation on an otherwise valid digest.
    Domain,
    /// A persisted digest could not be turned back into a digest.
    Data,
}

/// Library-wide error for stream-tdigest.
///
/// Every error is raised before any state changes, so a failed call leaves
/// the digest exactly as it was.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TdError {
    #[error("tdigest: invalid compression {value} (hint: compression must be finite and > 0)")]
    InvalidCompression { value: f64 },

    #[error(
        "tdigest: unknown storage variant {name:?} (expected 'default', 'array', 'avltree' or 'tree')"
    )]
    UnknownVariant { name: String },

    #[error("tdigest: unknown scale family {name:?} (expected 'quad', 'k1', 'k2' or 'k3')")]
    UnknownScale { name: String },

    #[error("tdigest: invalid probability {value} (hint: must lie in [0, 1])")]
    InvalidProbability { value: f64 },

    #[error("tdigest: buffer capacity must be at least 1")]
    InvalidBufferCapacity,

    /// NaN/±inf where a finite number is required.
    /// `context` pinpoints where it came from (e.g. "sample value", "cdf probe").
    #[error(
        "tdigest: non-finite values are not allowed ({context}). \
hint: clean your data or drop NaN/±inf before feeding the digest"
    )]
    NonFiniteInput { context: &'static str },

    #[error("tdigest: invalid sample weight {weight} (hint: weight must be finite and > 0)")]
    InvalidWeight { weight: f64 },

    #[error("tdigest: quantile {q} is outside [0, 1]")]
    QuantileOutOfRange { q: f64 },

    #[error("tdigest: no data (the digest is empty)")]
    EmptyDigest,

    #[error("tdigest: invalid snapshot: {reason}")]
    InvalidSnapshot { reason: &'static str },
}

impl TdError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TdError::InvalidCompression { .. }
            | TdError::UnknownVariant { .. }
            | TdError::UnknownScale { .. }
            | TdError::InvalidProbability { .. }
            | TdError::InvalidBufferCapacity => ErrorKind::Configuration,
            TdError::NonFiniteInput { .. }
            | TdError::InvalidWeight { .. }
            | TdError::QuantileOutOfRange { .. }
            | TdError::EmptyDigest => ErrorKind::Domain,
            TdError::InvalidSnapshot { .. } => ErrorKind::Data,
        }
    }
}

pub type TdResult<T> = Result<T, TdError>;
