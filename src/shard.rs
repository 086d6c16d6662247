//! Shard identifiers and shard-keyed collections
//!
//! The host addresses erasure-coded data by small non-negative shard ids.
//! Ids below the data-chunk count are "data" in host terms, the rest are
//! "parity"; how literally that distinction holds depends on the codec.
//!
//! Legacy host signatures key everything by plain integers. The conversion
//! helpers here are the single place where those integers are checked and
//! turned into [`ShardId`]s, so the deprecated entry points can stay thin
//! shells over the modern ones.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{Error, Result};

/// Identifier of a single shard within a stripe, in `[0, total)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShardId(pub u8);

impl ShardId {
    /// Position of this shard, usable as a buffer-vector index.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Validate a plain integer from a legacy container.
    pub fn from_index(id: i32, total: usize) -> Result<Self> {
        if id < 0 || id as usize >= total {
            return Err(Error::ShardIdOutOfRange { id, total });
        }
        Ok(ShardId(id as u8))
    }
}

impl From<u8> for ShardId {
    fn from(id: u8) -> Self {
        ShardId(id)
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordered set of shard ids; iteration is ascending.
pub type ShardSet = BTreeSet<ShardId>;

/// Shard-keyed map, sparse over `[0, total)`.
pub type ShardMap<T> = BTreeMap<ShardId, T>;

/// The set `{0, 1, .., total - 1}`.
pub fn full_shard_set(total: usize) -> ShardSet {
    (0..total).map(|i| ShardId(i as u8)).collect()
}

// =============================================================================
// Legacy Integer Conversions
// =============================================================================

/// Convert a legacy integer set, validating every id against `total`.
pub fn shard_set_from_ints(ints: &BTreeSet<i32>, total: usize) -> Result<ShardSet> {
    ints.iter()
        .map(|&id| ShardId::from_index(id, total))
        .collect()
}

/// Convert a shard set back into the legacy integer form.
pub fn ints_from_shard_set(set: &ShardSet) -> BTreeSet<i32> {
    set.iter().map(|id| id.index() as i32).collect()
}

/// Convert a legacy integer-keyed map, cloning the values.
pub fn shard_map_from_ints<T: Clone>(
    map: &BTreeMap<i32, T>,
    total: usize,
) -> Result<ShardMap<T>> {
    map.iter()
        .map(|(&id, value)| Ok((ShardId::from_index(id, total)?, value.clone())))
        .collect()
}

/// Convert a shard-keyed map into the legacy integer form, moving the values.
pub fn ints_from_shard_map<T>(map: ShardMap<T>) -> BTreeMap<i32, T> {
    map.into_iter()
        .map(|(id, value)| (id.index() as i32, value))
        .collect()
}
