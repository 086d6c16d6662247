//! Host-facing contracts
//!
//! This module pins down the two interfaces the plugin shares with the host
//! object store:
//!
//! - [`ErasureCodeInterface`], the codec surface the host drives for every
//!   stripe: chunk arithmetic, encode/decode, minimum-to-decode, rule
//!   creation and the optimization flags. Deprecated integer-keyed
//!   signatures are provided methods implemented as bijective shells over
//!   the shard-id-keyed ones, so codecs implement the logic exactly once.
//! - [`CrushRuleset`], the slice of the host's placement layer the plugin
//!   needs when asked to create a rule.

use std::collections::{BTreeMap, BTreeSet};

use bitflags::bitflags;

use crate::error::{Error, Result};
use crate::profile::ErasureCodeProfile;
use crate::shard::{
    ints_from_shard_map, ints_from_shard_set, shard_map_from_ints, shard_set_from_ints, ShardId,
    ShardMap, ShardSet,
};

bitflags! {
    /// Optimization capabilities a codec advertises to the host.
    ///
    /// The host routes partial reads, partial writes and parity-delta
    /// updates only to codecs that set the matching bit; a cleared bit is a
    /// promise that such requests never arrive.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PluginFlags: u64 {
        /// Participates in the optimized erasure-coding pathway
        const OPTIMIZED_SUPPORTED = 1 << 0;
        /// Can serve a sub-stripe read without decoding the full stripe
        const PARTIAL_READ_OPTIMIZATION = 1 << 1;
        /// Can absorb a sub-stripe write without re-encoding the full stripe
        const PARTIAL_WRITE_OPTIMIZATION = 1 << 2;
        /// Trailing zero padding may be elided on the wire
        const ZERO_PADDING_OPTIMIZATION = 1 << 3;
        /// Parity can be updated from a delta instead of re-encoded
        const PARITY_DELTA_OPTIMIZATION = 1 << 4;
    }
}

// =============================================================================
// Placement Contract
// =============================================================================

/// The host's CRUSH-like placement layer, as far as the plugin needs it.
pub trait CrushRuleset {
    /// Whether a rule with this name already exists.
    fn rule_exists(&self, name: &str) -> bool;

    /// Id of an existing rule.
    fn rule_id(&self, name: &str) -> Result<i32>;

    /// Add a rule selecting devices under `root`, separating across
    /// `failure_domain`, with the given placement mode (`"indep"` for
    /// erasure-coded pools). Returns the new rule id.
    fn add_simple_rule(
        &mut self,
        name: &str,
        root: &str,
        failure_domain: &str,
        mode: &str,
    ) -> Result<i32>;
}

/// In-memory [`CrushRuleset`] for tests and embedding hosts.
#[derive(Debug, Default)]
pub struct MemoryCrushRuleset {
    rules: Vec<String>,
}

impl MemoryCrushRuleset {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CrushRuleset for MemoryCrushRuleset {
    fn rule_exists(&self, name: &str) -> bool {
        self.rules.iter().any(|r| r == name)
    }

    fn rule_id(&self, name: &str) -> Result<i32> {
        self.rules
            .iter()
            .position(|r| r == name)
            .map(|id| id as i32)
            .ok_or_else(|| Error::RuleCreation {
                name: name.to_string(),
                reason: "rule does not exist".to_string(),
            })
    }

    fn add_simple_rule(
        &mut self,
        name: &str,
        _root: &str,
        _failure_domain: &str,
        _mode: &str,
    ) -> Result<i32> {
        if self.rule_exists(name) {
            return Err(Error::RuleCreation {
                name: name.to_string(),
                reason: "rule already exists".to_string(),
            });
        }
        self.rules.push(name.to_string());
        Ok((self.rules.len() - 1) as i32)
    }
}

// =============================================================================
// Codec Contract
// =============================================================================

/// The erasure-codec surface the host object store drives.
///
/// Shard maps are OUT parameters on encode/decode: the codec allocates the
/// buffers and moves ownership into the caller's map. Errors never mutate
/// codec state; any call may be retried or abandoned independently.
pub trait ErasureCodeInterface {
    /// Validate the profile and make the codec operational.
    fn init(&mut self, profile: &ErasureCodeProfile) -> Result<()>;

    /// The profile in effect, defaults merged with what `init` received.
    fn profile(&self) -> &ErasureCodeProfile;

    /// Return the id of the named rule, creating a default-root, host-level,
    /// indep, erasure-typed rule when it does not exist yet.
    fn create_rule(&self, name: &str, crush: &mut dyn CrushRuleset) -> Result<i32>;

    // -------------------------------------------------------------------------
    // Geometry
    // -------------------------------------------------------------------------

    /// Total shards per stripe (data + parity).
    fn chunk_count(&self) -> usize;

    /// Host-visible data shards per stripe.
    fn data_chunk_count(&self) -> usize;

    /// Host-visible parity shards per stripe.
    fn coding_chunk_count(&self) -> usize;

    /// Sub-chunks per chunk; 1 for codecs without sub-chunk addressing.
    fn sub_chunk_count(&self) -> usize {
        1
    }

    /// Per-shard chunk size for a stripe of `stripe_width` logical bytes.
    ///
    /// The identity `data_chunk_count() * chunk_size(w)` equals the padded
    /// stripe width for every `w`.
    fn chunk_size(&self, stripe_width: usize) -> usize;

    /// Input lengths must be multiples of this.
    fn alignment(&self) -> usize;

    /// Smallest unit at which the host may address a partial write.
    fn minimum_granularity(&self) -> usize;

    /// Placement-slot to shard-id mapping, one entry per shard.
    fn chunk_mapping(&self) -> &[ShardId];

    /// Optimization bits the host may rely on.
    fn supported_optimizations(&self) -> PluginFlags;

    // -------------------------------------------------------------------------
    // Minimum To Decode
    // -------------------------------------------------------------------------

    /// Smallest subset of `available` sufficient to serve `want_to_read`.
    ///
    /// A sub-chunk out-parameter, when passed, is cleared by codecs that do
    /// not use sub-chunk addressing.
    fn minimum_to_decode(
        &self,
        want_to_read: &ShardSet,
        available: &ShardSet,
        minimum_sub_chunks: Option<&mut ShardMap<Vec<(i32, i32)>>>,
    ) -> Result<ShardSet>;

    /// Cost-aware variant; codecs with a set-determined policy ignore the
    /// per-shard costs.
    fn minimum_to_decode_with_cost(
        &self,
        want_to_read: &ShardSet,
        available: &ShardMap<i32>,
    ) -> Result<ShardSet>;

    /// Integer-keyed shell over [`Self::minimum_to_decode`].
    #[deprecated(note = "use the shard-id-keyed minimum_to_decode")]
    fn minimum_to_decode_legacy(
        &self,
        want_to_read: &BTreeSet<i32>,
        available: &BTreeSet<i32>,
    ) -> Result<BTreeMap<i32, Vec<(i32, i32)>>> {
        let total = self.chunk_count();
        let want = shard_set_from_ints(want_to_read, total)?;
        let avail = shard_set_from_ints(available, total)?;
        let minimum = self.minimum_to_decode(&want, &avail, None)?;
        Ok(minimum
            .into_iter()
            .map(|id| (id.index() as i32, Vec::new()))
            .collect())
    }

    /// Integer-keyed shell over [`Self::minimum_to_decode_with_cost`].
    #[deprecated(note = "use the shard-id-keyed minimum_to_decode_with_cost")]
    fn minimum_to_decode_with_cost_legacy(
        &self,
        want_to_read: &BTreeSet<i32>,
        available: &BTreeMap<i32, i32>,
    ) -> Result<BTreeSet<i32>> {
        let total = self.chunk_count();
        let want = shard_set_from_ints(want_to_read, total)?;
        let avail = shard_map_from_ints(available, total)?;
        let minimum = self.minimum_to_decode_with_cost(&want, &avail)?;
        Ok(ints_from_shard_set(&minimum))
    }

    // -------------------------------------------------------------------------
    // Encode
    // -------------------------------------------------------------------------

    /// Encode `input` and move the requested shard buffers into `encoded`.
    fn encode(
        &self,
        want_to_encode: &ShardSet,
        input: &[u8],
        encoded: &mut ShardMap<Vec<u8>>,
    ) -> Result<()>;

    /// Integer-keyed shell over [`Self::encode`].
    #[deprecated(note = "use the shard-id-keyed encode")]
    fn encode_legacy(
        &self,
        want_to_encode: &BTreeSet<i32>,
        input: &[u8],
    ) -> Result<BTreeMap<i32, Vec<u8>>> {
        let want = shard_set_from_ints(want_to_encode, self.chunk_count())?;
        let mut encoded = ShardMap::new();
        self.encode(&want, input, &mut encoded)?;
        Ok(ints_from_shard_map(encoded))
    }

    /// Parity-only encode over pre-split shards; codecs that cannot compute
    /// parity in isolation reject it.
    fn encode_chunks(
        &self,
        _in_chunks: &ShardMap<Vec<u8>>,
        _out_chunks: &mut ShardMap<Vec<u8>>,
    ) -> Result<()> {
        Err(Error::NotSupported("encode_chunks"))
    }

    // -------------------------------------------------------------------------
    // Decode
    // -------------------------------------------------------------------------

    /// Decode from `chunks` and move the requested shard buffers into
    /// `decoded`. A `chunk_size` of zero or less is inferred from the first
    /// available chunk.
    fn decode(
        &self,
        want_to_read: &ShardSet,
        chunks: &ShardMap<Vec<u8>>,
        decoded: &mut ShardMap<Vec<u8>>,
        chunk_size: i32,
    ) -> Result<()>;

    /// Integer-keyed shell over [`Self::decode`].
    #[deprecated(note = "use the shard-id-keyed decode")]
    fn decode_legacy(
        &self,
        want_to_read: &BTreeSet<i32>,
        chunks: &BTreeMap<i32, Vec<u8>>,
        chunk_size: i32,
    ) -> Result<BTreeMap<i32, Vec<u8>>> {
        let total = self.chunk_count();
        let want = shard_set_from_ints(want_to_read, total)?;
        let avail = shard_map_from_ints(chunks, total)?;
        let mut decoded = ShardMap::new();
        self.decode(&want, &avail, &mut decoded, chunk_size)?;
        Ok(ints_from_shard_map(decoded))
    }

    /// In-place reconstruction over raw shards; codecs whose on-disk shards
    /// are not independently repairable reject it.
    fn decode_chunks(
        &self,
        _want_to_read: &ShardSet,
        _in_chunks: &ShardMap<Vec<u8>>,
        _out_chunks: &mut ShardMap<Vec<u8>>,
    ) -> Result<()> {
        Err(Error::NotSupported("decode_chunks"))
    }

    /// Decode, then concatenate the requested shards in the caller's
    /// `want_to_read` iteration order. A requested shard missing from the
    /// decoded output contributes `chunk_size` zero bytes in its place, so
    /// upstream offset arithmetic stays valid.
    #[deprecated(note = "use decode and concatenate explicitly")]
    fn decode_concat(
        &self,
        want_to_read: &BTreeSet<i32>,
        chunks: &BTreeMap<i32, Vec<u8>>,
    ) -> Result<Vec<u8>> {
        let total = self.chunk_count();
        let want = shard_set_from_ints(want_to_read, total)?;
        let avail = shard_map_from_ints(chunks, total)?;
        let chunk_size = avail.values().next().map(Vec::len).unwrap_or(0);

        let mut decoded = ShardMap::new();
        self.decode(&want, &avail, &mut decoded, 0)?;

        let mut out = Vec::with_capacity(chunk_size * want.len());
        for id in &want {
            match decoded.remove(id) {
                Some(buf) => out.extend_from_slice(&buf),
                None => out.resize(out.len() + chunk_size, 0),
            }
        }
        Ok(out)
    }

    /// [`Self::decode_concat`] over every data shard.
    #[deprecated(note = "use decode and concatenate explicitly")]
    #[allow(deprecated)]
    fn decode_concat_all(&self, chunks: &BTreeMap<i32, Vec<u8>>) -> Result<Vec<u8>> {
        let want: BTreeSet<i32> = (0..self.data_chunk_count() as i32).collect();
        self.decode_concat(&want, chunks)
    }

    // -------------------------------------------------------------------------
    // Delta Operations
    // -------------------------------------------------------------------------

    /// Delta between an old and a new version of one shard's bytes. Codecs
    /// with no representable delta return an empty buffer.
    fn encode_delta(&self, old_data: &[u8], new_data: &[u8]) -> Vec<u8>;

    /// Apply per-shard deltas to the output shards. Codecs that cannot
    /// update in place clear the output map instead.
    fn apply_delta(&self, deltas: &ShardMap<Vec<u8>>, out_chunks: &mut ShardMap<Vec<u8>>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_disjoint() {
        let all = [
            PluginFlags::OPTIMIZED_SUPPORTED,
            PluginFlags::PARTIAL_READ_OPTIMIZATION,
            PluginFlags::PARTIAL_WRITE_OPTIMIZATION,
            PluginFlags::ZERO_PADDING_OPTIMIZATION,
            PluginFlags::PARITY_DELTA_OPTIMIZATION,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert!((a.bits() & b.bits()) == 0);
            }
        }
    }

    #[test]
    fn test_memory_crush_ruleset() {
        let mut crush = MemoryCrushRuleset::new();
        assert!(!crush.rule_exists("ecpool"));
        assert!(crush.rule_id("ecpool").is_err());

        let id = crush
            .add_simple_rule("ecpool", "default", "host", "indep")
            .unwrap();
        assert_eq!(id, 0);
        assert!(crush.rule_exists("ecpool"));
        assert_eq!(crush.rule_id("ecpool").unwrap(), 0);

        let id2 = crush
            .add_simple_rule("ecpool2", "default", "host", "indep")
            .unwrap();
        assert_eq!(id2, 1);

        assert!(crush
            .add_simple_rule("ecpool", "default", "host", "indep")
            .is_err());
    }
}
