pub mod centroids;
pub mod cdf;
pub mod frontends;
pub mod quantile;
pub mod snapshot;
pub mod storage;
pub mod wire;

#[cfg(test)]
pub(crate) mod test_helpers;

// Internal building blocks
mod compressor;
mod merges;
mod scale;
mod tdigest;

// Public surface
pub use centroids::Centroid;
pub use frontends::{DigestConfig, DigestFormat, FrontendError};
pub use scale::ScaleFamily;
pub use snapshot::DigestSnapshot;
pub use storage::StorageVariant;
pub use tdigest::{DigestStats, TDigest, TDigestBuilder, DEFAULT_COMPRESSION};
pub use wire::{WireError, WireResult};
