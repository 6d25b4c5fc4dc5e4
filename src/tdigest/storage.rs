//! Centroid containers.
//!
//! A digest keeps its compressed centroids in one of two containers behind the
//! [`CentroidStore`] interface:
//!
//! - [`ArrayStore`]: a mean-sorted `Vec` with a prefix-weight array. Lookups are
//!   binary searches; inserting into the middle shifts the tail.
//! - [`TreeStore`]: an ordered `BTreeMap` keyed by mean. Inserts are
//!   logarithmic, but it keeps no prefix weights: `get`, `locate_center` and
//!   `locate_mean` walk the values in order, so every tree-backed query costs
//!   `O(centroids)` rather than `O(log centroids)`.
//!
//! Both containers accumulate prefix weights in mean order with the same
//! arithmetic, so every query answers bit-for-bit the same whichever one backs
//! the digest. The choice is purely a memory/time tradeoff.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::tdigest::centroids::Centroid;
use crate::{TdError, TdResult};

/// Storage strategy selected at construction time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageVariant {
    /// Library default; currently array-backed.
    #[default]
    Default,
    /// Flat mean-sorted array.
    Array,
    /// Balanced-tree storage (served by the ordered tree container).
    AvlTree,
    /// Ordered tree storage.
    Tree,
}

impl StorageVariant {
    pub const ALL: [StorageVariant; 4] = [
        StorageVariant::Default,
        StorageVariant::Array,
        StorageVariant::AvlTree,
        StorageVariant::Tree,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StorageVariant::Default => "default",
            StorageVariant::Array => "array",
            StorageVariant::AvlTree => "avltree",
            StorageVariant::Tree => "tree",
        }
    }

    /// Stable numeric code used by the wire format.
    pub(crate) fn code(self) -> u8 {
        match self {
            StorageVariant::Default => 0,
            StorageVariant::Array => 1,
            StorageVariant::AvlTree => 2,
            StorageVariant::Tree => 3,
        }
    }

    pub(crate) fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(StorageVariant::Default),
            1 => Some(StorageVariant::Array),
            2 => Some(StorageVariant::AvlTree),
            3 => Some(StorageVariant::Tree),
            _ => None,
        }
    }

    /// True when the variant is served by the tree container.
    pub fn is_tree_backed(self) -> bool {
        matches!(self, StorageVariant::AvlTree | StorageVariant::Tree)
    }
}

impl fmt::Display for StorageVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageVariant {
    type Err = TdError;

    /// Accepts: default | array | avl | avltree | tree (case-insensitive, `_`/`-`/spaces ignored).
    fn from_str(s: &str) -> TdResult<Self> {
        let norm = s.trim().to_ascii_lowercase().replace(['_', '-', ' '], "");
        match norm.as_str() {
            "default" => Ok(StorageVariant::Default),
            "array" => Ok(StorageVariant::Array),
            "avl" | "avltree" => Ok(StorageVariant::AvlTree),
            "tree" => Ok(StorageVariant::Tree),
            _ => Err(TdError::UnknownVariant {
                name: s.to_string(),
            }),
        }
    }
}

/// Adjacent pair of centroids whose centres bracket a cumulative-weight index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Bracket {
    pub left: usize,
    /// Cumulative weight at the centre of `left` (`prefix + w/2`).
    pub left_center: f64,
    /// Cumulative weight at the centre of `left + 1`.
    pub right_center: f64,
}

/// Where a value falls among the centroid means.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct MeanPosition {
    /// Index of the first centroid whose mean is `>= x` (`len` if none).
    pub idx: usize,
    /// Total weight of the centroids before `idx`.
    pub prefix: f64,
    /// `mean[idx] == x`.
    pub exact: bool,
}

/// Container interface: insert in mean order, iterate in mean order, locate
/// by cumulative weight, locate by mean.
pub(crate) trait CentroidStore {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self);

    /// Insert keeping mean order; equal means go after existing ones.
    fn insert(&mut self, c: Centroid);

    /// Replace the whole content with an already mean-sorted run.
    fn replace_sorted(&mut self, cs: Vec<Centroid>) {
        self.clear();
        for c in cs {
            self.insert(c);
        }
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &Centroid> + '_>;

    fn get(&self, idx: usize) -> Option<&Centroid>;

    fn first(&self) -> Option<&Centroid> {
        self.get(0)
    }

    fn last(&self) -> Option<&Centroid> {
        self.len().checked_sub(1).and_then(|i| self.get(i))
    }

    /// Largest `i < len − 1` whose centre is `<= index`, with both centres.
    /// `None` with fewer than two centroids or when `index` lies left of the
    /// first centre.
    fn locate_center(&self, index: f64) -> Option<Bracket>;

    fn locate_mean(&self, x: f64) -> MeanPosition;

    fn to_vec(&self) -> Vec<Centroid> {
        self.iter().copied().collect()
    }
}

/* ============================
 * Array container
 * ============================ */

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ArrayStore {
    cents: Vec<Centroid>,
    /// `prefix[i]` = weight of `cents[..i]`, accumulated left to right.
    prefix: Vec<f64>,
}

impl ArrayStore {
    fn rebuild_prefix_from(&mut self, from: usize) {
        self.prefix.truncate(from);
        let mut run = if from == 0 {
            0.0
        } else {
            self.prefix[from - 1] + self.cents[from - 1].weight()
        };
        for c in &self.cents[from..] {
            self.prefix.push(run);
            run += c.weight();
        }
    }

    #[inline]
    fn center(&self, i: usize) -> f64 {
        self.prefix[i] + self.cents[i].weight() / 2.0
    }
}

impl CentroidStore for ArrayStore {
    fn len(&self) -> usize {
        self.cents.len()
    }

    fn clear(&mut self) {
        self.cents.clear();
        self.prefix.clear();
    }

    fn insert(&mut self, c: Centroid) {
        let pos = self.cents.partition_point(|x| x.mean() <= c.mean());
        self.cents.insert(pos, c);
        self.rebuild_prefix_from(pos);
    }

    fn replace_sorted(&mut self, cs: Vec<Centroid>) {
        debug_assert!(crate::tdigest::centroids::is_sorted_by_mean(&cs));
        self.cents = cs;
        self.rebuild_prefix_from(0);
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &Centroid> + '_> {
        Box::new(self.cents.iter())
    }

    fn get(&self, idx: usize) -> Option<&Centroid> {
        self.cents.get(idx)
    }

    fn locate_center(&self, index: f64) -> Option<Bracket> {
        let n = self.cents.len();
        if n < 2 {
            return None;
        }
        // Centres strictly increase, so binary search for the first one past `index`.
        let (mut lo, mut hi) = (0usize, n);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.center(mid) <= index {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        let p = lo;
        if p == 0 {
            return None;
        }
        let left = (p - 1).min(n - 2);
        Some(Bracket {
            left,
            left_center: self.center(left),
            right_center: self.center(left + 1),
        })
    }

    fn locate_mean(&self, x: f64) -> MeanPosition {
        let idx = self.cents.partition_point(|c| c.mean() < x);
        let prefix = if idx < self.cents.len() {
            self.prefix[idx]
        } else {
            match self.cents.last() {
                Some(last) => self.prefix[idx - 1] + last.weight(),
                None => 0.0,
            }
        };
        let exact = self.cents.get(idx).is_some_and(|c| c.mean() == x);
        MeanPosition { idx, prefix, exact }
    }

    fn to_vec(&self) -> Vec<Centroid> {
        self.cents.clone()
    }
}

/* ============================
 * Tree container
 * ============================ */

/// Key: mean first, then insertion sequence so equal means can coexist.
type TreeKey = (OrderedFloat<f64>, u64);

#[derive(Debug, Clone, Default)]
pub(crate) struct TreeStore {
    map: BTreeMap<TreeKey, Centroid>,
    seq: u64,
}

impl PartialEq for TreeStore {
    fn eq(&self, other: &Self) -> bool {
        self.map.values().eq(other.map.values())
    }
}

impl CentroidStore for TreeStore {
    fn len(&self) -> usize {
        self.map.len()
    }

    fn clear(&mut self) {
        self.map.clear();
        self.seq = 0;
    }

    fn insert(&mut self, c: Centroid) {
        self.map.insert((OrderedFloat::from(c.mean()), self.seq), c);
        self.seq += 1;
    }

    fn iter(&self) -> Box<dyn Iterator<Item = &Centroid> + '_> {
        Box::new(self.map.values())
    }

    /// Linear in `idx`.
    fn get(&self, idx: usize) -> Option<&Centroid> {
        self.map.values().nth(idx)
    }

    fn first(&self) -> Option<&Centroid> {
        self.map.values().next()
    }

    fn last(&self) -> Option<&Centroid> {
        self.map.values().next_back()
    }

    fn locate_center(&self, index: f64) -> Option<Bracket> {
        let n = self.map.len();
        if n < 2 {
            return None;
        }
        let mut found: Option<Bracket> = None;
        let mut run = 0.0_f64;
        let mut prev_center: Option<f64> = None;
        for (i, c) in self.map.values().enumerate() {
            let center = run + c.weight() / 2.0;
            if let Some(pc) = prev_center {
                // Candidate pair (i-1, i); keep the last one whose left centre is <= index.
                if pc <= index {
                    found = Some(Bracket {
                        left: i - 1,
                        left_center: pc,
                        right_center: center,
                    });
                } else {
                    break;
                }
            }
            prev_center = Some(center);
            run += c.weight();
        }
        found
    }

    fn locate_mean(&self, x: f64) -> MeanPosition {
        let mut run = 0.0_f64;
        for (idx, c) in self.map.values().enumerate() {
            if c.mean() >= x {
                return MeanPosition {
                    idx,
                    prefix: run,
                    exact: c.mean() == x,
                };
            }
            run += c.weight();
        }
        MeanPosition {
            idx: self.map.len(),
            prefix: run,
            exact: false,
        }
    }
}

/* ============================
 * Dispatch
 * ============================ */

/// The container a digest owns, chosen from its [`StorageVariant`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Storage {
    Array(ArrayStore),
    Tree(TreeStore),
}

impl Storage {
    pub(crate) fn for_variant(variant: StorageVariant) -> Self {
        if variant.is_tree_backed() {
            Storage::Tree(TreeStore::default())
        } else {
            Storage::Array(ArrayStore::default())
        }
    }
}

macro_rules! dispatch {
    ($self:ident, $s:ident => $e:expr) => {
        match $self {
            Storage::Array($s) => $e,
            Storage::Tree($s) => $e,
        }
    };
}

impl CentroidStore for Storage {
    fn len(&self) -> usize {
        dispatch!(self, s => s.len())
    }
    fn clear(&mut self) {
        dispatch!(self, s => s.clear())
    }
    fn insert(&mut self, c: Centroid) {
        dispatch!(self, s => s.insert(c))
    }
    fn replace_sorted(&mut self, cs: Vec<Centroid>) {
        dispatch!(self, s => s.replace_sorted(cs))
    }
    fn iter(&self) -> Box<dyn Iterator<Item = &Centroid> + '_> {
        dispatch!(self, s => s.iter())
    }
    fn get(&self, idx: usize) -> Option<&Centroid> {
        dispatch!(self, s => s.get(idx))
    }
    fn first(&self) -> Option<&Centroid> {
        dispatch!(self, s => s.first())
    }
    fn last(&self) -> Option<&Centroid> {
        dispatch!(self, s => s.last())
    }
    fn locate_center(&self, index: f64) -> Option<Bracket> {
        dispatch!(self, s => s.locate_center(index))
    }
    fn locate_mean(&self, x: f64) -> MeanPosition {
        dispatch!(self, s => s.locate_mean(x))
    }
    fn to_vec(&self) -> Vec<Centroid> {
        dispatch!(self, s => s.to_vec())
    }
}
