//! Streaming t-digest: bounded-memory quantile and CDF estimates over numeric
//! streams, with array- or tree-backed centroid storage.
//!
//! ```
//! use stream_tdigest::{StorageVariant, TDigest};
//!
//! let mut td = TDigest::new(100.0, StorageVariant::Default).unwrap();
//! for i in 0..1_000 {
//!     td.add(i as f64).unwrap();
//! }
//! let p99 = td.quantile(0.99).unwrap();
//! assert!((p99 - 989.5).abs() < 5.0);
//! ```

mod error;
pub mod estimator;
pub mod quality;
pub mod tdigest;

pub use error::{ErrorKind, TdError, TdResult};
pub use estimator::QuantileEstimator;
pub use quality::QualityReport;
pub use tdigest::{Centroid, ScaleFamily, StorageVariant, TDigest, TDigestBuilder};
