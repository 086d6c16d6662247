//! Two-plus-one XOR parity codec
//!
//! The smallest codec behind the plugin surface: two data shards and one
//! bytewise XOR parity shard. Unlike the sizeceph codec, stored data shards
//! are readable as-is, so this variant follows the conditional-decode
//! pathway — decode reconstructs only what is missing, and delta updates
//! are real rather than inert.

use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::interface::{CrushRuleset, ErasureCodeInterface, PluginFlags};
use crate::profile::ErasureCodeProfile;
use crate::shard::{ShardId, ShardMap, ShardSet};
use crate::sizeceph::layout::round_up;

/// Data shards per stripe
pub const XOR_DATA_CHUNKS: usize = 2;
/// Parity shards per stripe
pub const XOR_CODING_CHUNKS: usize = 1;
/// Total shards per stripe
pub const XOR_TOTAL_CHUNKS: usize = XOR_DATA_CHUNKS + XOR_CODING_CHUNKS;

const XOR_ALIGNMENT: usize = std::mem::size_of::<i32>();

fn xor_of(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter().zip(b).map(|(x, y)| x ^ y).collect()
}

fn xor_into(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= s;
    }
}

/// k=2/m=1 XOR parity codec.
#[derive(Debug)]
pub struct SimpleXorCodec {
    profile: ErasureCodeProfile,
    chunk_mapping: Vec<ShardId>,
}

impl SimpleXorCodec {
    pub fn new() -> Self {
        let mut profile = ErasureCodeProfile::new();
        profile
            .set("k", XOR_DATA_CHUNKS)
            .set("m", XOR_CODING_CHUNKS)
            .set("technique", "simple_xor");

        Self {
            profile,
            chunk_mapping: (0..XOR_TOTAL_CHUNKS).map(|i| ShardId(i as u8)).collect(),
        }
    }

    fn validate_profile(profile: &ErasureCodeProfile) -> Result<()> {
        if let Some(technique) = profile.get("technique") {
            if technique != "simple_xor" {
                return Err(Error::InvalidProfile(format!(
                    "technique '{technique}' is not handled by this codec"
                )));
            }
        }
        if let Some(k) = profile.parse_u32("k")? {
            if k as usize != XOR_DATA_CHUNKS {
                return Err(Error::InvalidProfile(format!(
                    "simple_xor only supports k={XOR_DATA_CHUNKS}, got k={k}"
                )));
            }
        }
        if let Some(m) = profile.parse_u32("m")? {
            if m as usize != XOR_CODING_CHUNKS {
                return Err(Error::InvalidProfile(format!(
                    "simple_xor only supports m={XOR_CODING_CHUNKS}, got m={m}"
                )));
            }
        }
        Ok(())
    }

    /// Rebuild one missing shard from the other two.
    fn reconstruct_shard(missing: usize, chunks: &ShardMap<Vec<u8>>) -> Vec<u8> {
        let shard = |idx: usize| &chunks[&ShardId(idx as u8)];
        match missing {
            0 => xor_of(shard(1), shard(2)),
            1 => xor_of(shard(0), shard(2)),
            _ => xor_of(shard(0), shard(1)),
        }
    }
}

impl Default for SimpleXorCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ErasureCodeInterface for SimpleXorCodec {
    fn init(&mut self, profile: &ErasureCodeProfile) -> Result<()> {
        Self::validate_profile(profile)?;
        let mut merged = self.profile.clone();
        for (key, value) in profile.iter() {
            merged.set(key, value);
        }
        self.profile = merged;
        debug!(k = XOR_DATA_CHUNKS, m = XOR_CODING_CHUNKS, "simple_xor codec initialized");
        Ok(())
    }

    fn profile(&self) -> &ErasureCodeProfile {
        &self.profile
    }

    fn create_rule(&self, name: &str, crush: &mut dyn CrushRuleset) -> Result<i32> {
        if crush.rule_exists(name) {
            return crush.rule_id(name);
        }
        crush.add_simple_rule(name, "default", "host", "indep")
    }

    fn chunk_count(&self) -> usize {
        XOR_TOTAL_CHUNKS
    }

    fn data_chunk_count(&self) -> usize {
        XOR_DATA_CHUNKS
    }

    fn coding_chunk_count(&self) -> usize {
        XOR_CODING_CHUNKS
    }

    fn chunk_size(&self, stripe_width: usize) -> usize {
        round_up(stripe_width, XOR_DATA_CHUNKS * XOR_ALIGNMENT) / XOR_DATA_CHUNKS
    }

    fn alignment(&self) -> usize {
        XOR_ALIGNMENT
    }

    fn minimum_granularity(&self) -> usize {
        XOR_ALIGNMENT
    }

    fn chunk_mapping(&self) -> &[ShardId] {
        &self.chunk_mapping
    }

    fn supported_optimizations(&self) -> PluginFlags {
        // parity is linear, so delta updates are honest here
        PluginFlags::OPTIMIZED_SUPPORTED
            | PluginFlags::PARTIAL_WRITE_OPTIMIZATION
            | PluginFlags::PARITY_DELTA_OPTIMIZATION
    }

    fn minimum_to_decode(
        &self,
        want_to_read: &ShardSet,
        available: &ShardSet,
        minimum_sub_chunks: Option<&mut ShardMap<Vec<(i32, i32)>>>,
    ) -> Result<ShardSet> {
        if let Some(sub_chunks) = minimum_sub_chunks {
            sub_chunks.clear();
        }

        if want_to_read.iter().all(|id| available.contains(id)) {
            return Ok(want_to_read.clone());
        }
        if available.len() < XOR_DATA_CHUNKS {
            return Err(Error::InsufficientShards {
                available: available.len(),
                required: XOR_DATA_CHUNKS,
            });
        }
        // any two shards determine the third; prefer data shards
        Ok(available.iter().take(XOR_DATA_CHUNKS).copied().collect())
    }

    fn minimum_to_decode_with_cost(
        &self,
        want_to_read: &ShardSet,
        available: &ShardMap<i32>,
    ) -> Result<ShardSet> {
        let available_set: ShardSet = available.keys().copied().collect();
        self.minimum_to_decode(want_to_read, &available_set, None)
    }

    #[instrument(skip(self, input, encoded), fields(input_len = input.len()))]
    fn encode(
        &self,
        want_to_encode: &ShardSet,
        input: &[u8],
        encoded: &mut ShardMap<Vec<u8>>,
    ) -> Result<()> {
        for id in want_to_encode {
            if id.index() >= XOR_TOTAL_CHUNKS {
                return Err(Error::ShardIdOutOfRange {
                    id: id.index() as i32,
                    total: XOR_TOTAL_CHUNKS,
                });
            }
        }

        let chunk_len = self.chunk_size(input.len());

        let mut d0 = vec![0u8; chunk_len];
        let mut d1 = vec![0u8; chunk_len];
        let split = input.len().min(chunk_len);
        d0[..split].copy_from_slice(&input[..split]);
        d1[..input.len() - split].copy_from_slice(&input[split..]);

        let parity = xor_of(&d0, &d1);

        for (index, shard) in [d0, d1, parity].into_iter().enumerate() {
            let id = ShardId(index as u8);
            if want_to_encode.contains(&id) {
                encoded.insert(id, shard);
            }
        }
        debug!(chunk_len, "stripe encoded");
        Ok(())
    }

    #[instrument(skip(self, chunks, decoded), fields(available = chunks.len()))]
    fn decode(
        &self,
        want_to_read: &ShardSet,
        chunks: &ShardMap<Vec<u8>>,
        decoded: &mut ShardMap<Vec<u8>>,
        chunk_size: i32,
    ) -> Result<()> {
        for id in want_to_read {
            if id.index() >= XOR_TOTAL_CHUNKS {
                return Err(Error::ShardIdOutOfRange {
                    id: id.index() as i32,
                    total: XOR_TOTAL_CHUNKS,
                });
            }
        }

        let chunk_len = if chunk_size > 0 {
            chunk_size as usize
        } else {
            chunks.values().next().map(Vec::len).unwrap_or(0)
        };
        for (id, buf) in chunks {
            if id.index() >= XOR_TOTAL_CHUNKS {
                return Err(Error::ShardIdOutOfRange {
                    id: id.index() as i32,
                    total: XOR_TOTAL_CHUNKS,
                });
            }
            if buf.len() != chunk_len {
                return Err(Error::InvalidArgument(format!(
                    "shard {id} has length {}, expected {chunk_len}",
                    buf.len()
                )));
            }
        }

        if chunks.len() < XOR_DATA_CHUNKS {
            return Err(Error::InsufficientShards {
                available: chunks.len(),
                required: XOR_DATA_CHUNKS,
            });
        }

        for id in want_to_read {
            let shard = match chunks.get(id) {
                // conditional-decode pathway: present shards pass through
                Some(buf) => buf.clone(),
                None => Self::reconstruct_shard(id.index(), chunks),
            };
            decoded.insert(*id, shard);
        }
        Ok(())
    }

    fn encode_delta(&self, old_data: &[u8], new_data: &[u8]) -> Vec<u8> {
        if old_data.len() != new_data.len() {
            debug!(
                old = old_data.len(),
                new = new_data.len(),
                "delta buffer size mismatch"
            );
            return Vec::new();
        }
        xor_of(old_data, new_data)
    }

    fn apply_delta(&self, deltas: &ShardMap<Vec<u8>>, out_chunks: &mut ShardMap<Vec<u8>>) {
        // identity-matrix application: each delta folds into the shard with
        // the same id
        for (id, delta) in deltas {
            if let Some(out) = out_chunks.get_mut(id) {
                xor_into(out, delta);
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::shard::full_shard_set;
    use crate::StatusKind;

    fn initialized_codec() -> SimpleXorCodec {
        let mut codec = SimpleXorCodec::new();
        codec.init(&ErasureCodeProfile::new()).unwrap();
        codec
    }

    fn encode_all(codec: &SimpleXorCodec, input: &[u8]) -> ShardMap<Vec<u8>> {
        let mut encoded = ShardMap::new();
        codec
            .encode(&full_shard_set(XOR_TOTAL_CHUNKS), input, &mut encoded)
            .unwrap();
        encoded
    }

    #[test]
    fn test_basic_properties() {
        let codec = initialized_codec();
        assert_eq!(codec.chunk_count(), 3);
        assert_eq!(codec.data_chunk_count(), 2);
        assert_eq!(codec.coding_chunk_count(), 1);
        assert_eq!(codec.alignment(), std::mem::size_of::<i32>());
        assert_eq!(codec.minimum_granularity(), std::mem::size_of::<i32>());
        assert_eq!(codec.sub_chunk_count(), 1);
    }

    #[test]
    fn test_profile_validation() {
        let mut profile = ErasureCodeProfile::new();
        profile.set("k", 2).set("m", 1);
        assert!(SimpleXorCodec::validate_profile(&profile).is_ok());

        profile.set("k", 3);
        assert!(matches!(
            SimpleXorCodec::validate_profile(&profile),
            Err(Error::InvalidProfile(_))
        ));

        profile.set("k", 2).set("m", 2);
        assert!(SimpleXorCodec::validate_profile(&profile).is_err());
    }

    #[test]
    fn test_parity_is_xor_of_data() {
        let codec = initialized_codec();
        let d0 = [0x01u8, 0x02, 0x03, 0x04];
        let d1 = [0x10u8, 0x20, 0x30, 0x40];
        let input: Vec<u8> = d0.iter().chain(d1.iter()).copied().collect();

        let encoded = encode_all(&codec, &input);
        assert_eq!(encoded[&ShardId(0)], d0);
        assert_eq!(encoded[&ShardId(1)], d1);
        assert_eq!(encoded[&ShardId(2)], vec![0x11, 0x22, 0x33, 0x44]);
    }

    #[test]
    fn test_decode_reconstructs_each_single_erasure() {
        let codec = initialized_codec();
        let input: Vec<u8> = (0..24u8).collect();
        let encoded = encode_all(&codec, &input);

        for missing in 0..XOR_TOTAL_CHUNKS {
            let mut available = encoded.clone();
            let lost = available.remove(&ShardId(missing as u8)).unwrap();

            let mut want = ShardSet::new();
            want.insert(ShardId(missing as u8));
            let mut decoded = ShardMap::new();
            codec.decode(&want, &available, &mut decoded, 0).unwrap();

            assert_eq!(decoded[&ShardId(missing as u8)], lost);
        }
    }

    #[test]
    fn test_decode_passes_through_present_shards() {
        let codec = initialized_codec();
        let input: Vec<u8> = (0..16u8).collect();
        let encoded = encode_all(&codec, &input);

        let want = full_shard_set(XOR_DATA_CHUNKS);
        let mut decoded = ShardMap::new();
        codec.decode(&want, &encoded, &mut decoded, 0).unwrap();

        let joined: Vec<u8> = decoded.values().flatten().copied().collect();
        assert_eq!(joined, input);
    }

    #[test]
    fn test_decode_refuses_double_erasure() {
        let codec = initialized_codec();
        let encoded = encode_all(&codec, &[0xA5u8; 8]);

        let mut available = encoded;
        available.remove(&ShardId(0));
        available.remove(&ShardId(2));

        let mut decoded = ShardMap::new();
        let err = codec
            .decode(&full_shard_set(XOR_DATA_CHUNKS), &available, &mut decoded, 0)
            .unwrap_err();
        assert_eq!(err.kind(), StatusKind::Io);
    }

    #[test]
    fn test_minimum_to_decode() {
        let codec = initialized_codec();
        let want = full_shard_set(XOR_DATA_CHUNKS);

        // everything wanted is available: minimum is the want set itself
        let minimum = codec
            .minimum_to_decode(&want, &full_shard_set(XOR_TOTAL_CHUNKS), None)
            .unwrap();
        assert_eq!(minimum, want);

        // shard 0 lost: any two of the remaining shards suffice
        let available: ShardSet = [ShardId(1), ShardId(2)].into_iter().collect();
        let minimum = codec.minimum_to_decode(&want, &available, None).unwrap();
        assert_eq!(minimum, available);

        // one shard is not enough
        let available: ShardSet = [ShardId(1)].into_iter().collect();
        assert!(codec.minimum_to_decode(&want, &available, None).is_err());
    }

    #[test]
    fn test_delta_roundtrip() {
        let codec = initialized_codec();
        let old = [1u8, 2, 3, 4];
        let new = [9u8, 9, 9, 9];

        let delta = codec.encode_delta(&old, &new);
        assert_eq!(delta, xor_of(&old, &new));

        // applying the delta to the old shard yields the new shard
        let mut deltas = ShardMap::new();
        deltas.insert(ShardId(0), delta);
        let mut out = ShardMap::new();
        out.insert(ShardId(0), old.to_vec());
        out.insert(ShardId(1), vec![7u8; 4]);
        codec.apply_delta(&deltas, &mut out);

        assert_eq!(out[&ShardId(0)], new);
        assert_eq!(out[&ShardId(1)], vec![7u8; 4]);
    }

    #[test]
    fn test_delta_size_mismatch_yields_empty() {
        let codec = initialized_codec();
        assert!(codec.encode_delta(&[1, 2], &[1, 2, 3]).is_empty());
    }

    #[test]
    fn test_supported_optimizations_advertise_delta() {
        let codec = initialized_codec();
        let flags = codec.supported_optimizations();
        assert!(flags.contains(PluginFlags::PARITY_DELTA_OPTIMIZATION));
        assert!(!flags.contains(PluginFlags::PARTIAL_READ_OPTIMIZATION));
    }

    proptest! {
        /// Any single erasure is recoverable as the XOR of the other two.
        #[test]
        fn prop_single_erasure_recovers(
            data in prop::collection::vec(any::<u8>(), 0..256),
            missing in 0usize..XOR_TOTAL_CHUNKS,
        ) {
            let codec = initialized_codec();
            let encoded = encode_all(&codec, &data);

            let mut available = encoded.clone();
            let lost = available.remove(&ShardId(missing as u8)).unwrap();

            let mut want = ShardSet::new();
            want.insert(ShardId(missing as u8));
            let mut decoded = ShardMap::new();
            codec.decode(&want, &available, &mut decoded, 0)?;
            prop_assert_eq!(&decoded[&ShardId(missing as u8)], &lost);
        }

        /// Encode splits the input across the data shards with zero padding.
        #[test]
        fn prop_data_shards_carry_input(data in prop::collection::vec(any::<u8>(), 0..256)) {
            let codec = initialized_codec();
            let encoded = encode_all(&codec, &data);

            let mut joined = Vec::new();
            joined.extend_from_slice(&encoded[&ShardId(0)]);
            joined.extend_from_slice(&encoded[&ShardId(1)]);
            prop_assert!(joined.len() >= data.len());
            prop_assert_eq!(&joined[..data.len()], data.as_slice());
            prop_assert!(joined[data.len()..].iter().all(|&b| b == 0));
        }
    }
}
