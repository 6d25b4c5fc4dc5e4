// src/tdigest/wire.rs
//
// Canonical TDigest binary wire codec ("TDIG" format).
//
// Layout (little-endian):
//
//   header (64 bytes):
//     0..4   : magic = b"TDIG"
//     4      : version
//     5      : scale_code    (u8)
//     6      : variant_code  (u8)
//     7      : reserved (0)
//     8..16  : compression     (f64)
//    16..24  : total_weight    (f64)
//    24..32  : min             (f64, NaN when empty)
//    32..40  : max             (f64, NaN when empty)
//    40..48  : centroid_count  (u64)
//    48..56  : data_sum        (f64)
//    56..64  : buffer_capacity (u64)
//
//   centroids (payload), ascending mean:
//     mean(f64) + weight(f64) + kind(u8)   kind: 0 = atomic, 1 = mixed
//
// Encoding flushes the buffer first, so a blob never carries unmerged samples.

use thiserror::Error;

use crate::tdigest::centroids::Centroid;
use crate::tdigest::scale::ScaleFamily;
use crate::tdigest::storage::StorageVariant;
use crate::tdigest::{DigestStats, TDigest};
use crate::TdError;

const MAGIC: &[u8; 4] = b"TDIG";
const VERSION: u8 = 1;
const HEADER_LEN: usize = 64;
const CENTROID_LEN: usize = 8 + 8 + 1;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WireError {
    #[error("invalid TDIG magic header")]
    InvalidMagic,
    #[error("unsupported TDIG version: {0}")]
    UnsupportedVersion(u8),
    #[error("invalid TDIG scale code: {0}")]
    InvalidScale(u8),
    #[error("invalid TDIG storage variant code: {0}")]
    InvalidVariant(u8),
    #[error("invalid TDIG header: {0}")]
    InvalidHeader(&'static str),
    #[error("invalid TDIG payload: {0}")]
    InvalidPayload(&'static str),
    #[error("inconsistent TDIG digest: {0}")]
    Inconsistent(#[from] TdError),
}

pub type WireResult<T> = Result<T, WireError>;

/* ============================
 * Small helpers
 * ============================ */

#[inline]
fn write_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

#[inline]
fn write_f64(buf: &mut Vec<u8>, v: f64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

/// Little-endian cursor over a blob.
struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn take<const N: usize>(&mut self, what: &'static str) -> WireResult<[u8; N]> {
        let end = self.offset + N;
        let slice = self
            .bytes
            .get(self.offset..end)
            .ok_or(WireError::InvalidPayload(what))?;
        let mut arr = [0u8; N];
        arr.copy_from_slice(slice);
        self.offset = end;
        Ok(arr)
    }

    fn u8(&mut self, what: &'static str) -> WireResult<u8> {
        Ok(self.take::<1>(what)?[0])
    }

    fn u64(&mut self, what: &'static str) -> WireResult<u64> {
        Ok(u64::from_le_bytes(self.take::<8>(what)?))
    }

    fn f64(&mut self, what: &'static str) -> WireResult<f64> {
        Ok(f64::from_le_bytes(self.take::<8>(what)?))
    }
}

fn scale_to_code(s: ScaleFamily) -> u8 {
    match s {
        ScaleFamily::Quad => 0,
        ScaleFamily::K1 => 1,
        ScaleFamily::K2 => 2,
        ScaleFamily::K3 => 3,
    }
}

fn code_to_scale(c: u8) -> WireResult<ScaleFamily> {
    match c {
        0 => Ok(ScaleFamily::Quad),
        1 => Ok(ScaleFamily::K1),
        2 => Ok(ScaleFamily::K2),
        3 => Ok(ScaleFamily::K3),
        _ => Err(WireError::InvalidScale(c)),
    }
}

#[inline]
fn kind_to_code(c: &Centroid) -> u8 {
    if c.is_atomic() {
        0
    } else {
        1
    }
}

#[inline]
fn code_is_atomic(code: u8) -> WireResult<bool> {
    match code {
        0 => Ok(true),
        1 => Ok(false),
        _ => Err(WireError::InvalidPayload("invalid centroid kind code")),
    }
}

/* ============================
 * Encode
 * ============================ */

pub fn encode_digest(td: &mut TDigest) -> Vec<u8> {
    let cents = td.centroids();
    let stats = td.stats();
    let (min, max) = if td.is_empty() {
        (f64::NAN, f64::NAN)
    } else {
        (stats.data_min, stats.data_max)
    };

    let mut buf = Vec::with_capacity(HEADER_LEN + CENTROID_LEN * cents.len());
    buf.extend_from_slice(MAGIC);
    buf.push(VERSION);
    buf.push(scale_to_code(td.scale()));
    buf.push(td.variant().code());
    buf.push(0);

    write_f64(&mut buf, td.compression());
    write_f64(&mut buf, stats.total_weight);
    write_f64(&mut buf, min);
    write_f64(&mut buf, max);
    write_u64(&mut buf, cents.len() as u64);
    write_f64(&mut buf, stats.data_sum);
    write_u64(&mut buf, td.buffer_capacity() as u64);
    debug_assert_eq!(buf.len(), HEADER_LEN);

    for c in &cents {
        write_f64(&mut buf, c.mean());
        write_f64(&mut buf, c.weight());
        buf.push(kind_to_code(c));
    }
    buf
}

/* ============================
 * Decode
 * ============================ */

pub fn decode_digest(bytes: &[u8]) -> WireResult<TDigest> {
    if bytes.len() < HEADER_LEN {
        return Err(WireError::InvalidHeader("buffer too small"));
    }
    if &bytes[0..4] != MAGIC {
        return Err(WireError::InvalidMagic);
    }
    let version = bytes[4];
    if version != VERSION {
        return Err(WireError::UnsupportedVersion(version));
    }
    let scale = code_to_scale(bytes[5])?;
    let variant =
        StorageVariant::from_code(bytes[6]).ok_or(WireError::InvalidVariant(bytes[6]))?;
    if bytes[7] != 0 {
        return Err(WireError::InvalidHeader("reserved byte must be zero"));
    }

    let mut r = Reader { bytes, offset: 8 };
    let compression = r.f64("compression")?;
    let total_weight = r.f64("total_weight")?;
    let min = r.f64("min")?;
    let max = r.f64("max")?;
    let centroid_count = r.u64("centroid_count")?;
    let data_sum = r.f64("data_sum")?;
    let buffer_capacity = r.u64("buffer_capacity")?;
    debug_assert_eq!(r.offset, HEADER_LEN);

    if buffer_capacity == 0 {
        return Err(WireError::InvalidHeader("buffer_capacity must be >= 1"));
    }
    let expected_len = usize::try_from(centroid_count)
        .ok()
        .and_then(|n| n.checked_mul(CENTROID_LEN))
        .ok_or(WireError::InvalidPayload("centroid count overflows"))?;
    if bytes.len() - HEADER_LEN != expected_len {
        return Err(WireError::InvalidPayload(
            "payload length does not match centroid count",
        ));
    }

    let mut cents: Vec<Centroid> = Vec::with_capacity(expected_len / CENTROID_LEN);
    for _ in 0..centroid_count {
        let mean = r.f64("truncated mean")?;
        let weight = r.f64("truncated weight")?;
        let atomic = code_is_atomic(r.u8("truncated kind")?)?;
        if !mean.is_finite() {
            return Err(WireError::InvalidPayload("non-finite centroid mean"));
        }
        if !weight.is_finite() || weight <= 0.0 {
            return Err(WireError::InvalidPayload("invalid centroid weight"));
        }
        cents.push(Centroid::with_kind(mean, weight, atomic));
    }

    let stats = DigestStats {
        total_weight,
        data_sum,
        data_min: min,
        data_max: max,
    };
    let td = TDigest::from_parts(compression, variant, scale, cents, stats)?;
    Ok(td.with_buffer_capacity(
        usize::try_from(buffer_capacity).unwrap_or(usize::MAX),
    ))
}

impl TDigest {
    /// Serialize to the `TDIG` wire format (flushes first).
    pub fn to_bytes(&mut self) -> Vec<u8> {
        encode_digest(self)
    }

    /// Decode a `TDIG` blob, validating every field.
    pub fn from_bytes(bytes: &[u8]) -> WireResult<TDigest> {
        decode_digest(bytes)
    }
}
