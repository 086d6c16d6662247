//! SizeCeph always-decode codec
//!
//! The host sees a k=4/m=5 erasure code, but the native transformation
//! correlates all nine shards: every encode consumes the whole stripe and
//! every decode runs a full restore of the original before any shard can be
//! served. Data shards handed back by decode are slices of that restored
//! original; parity shards expose nothing readable and come back empty.
//!
//! The decode policy here is the strict one: all nine shards must be on
//! hand, and the native validator is still consulted before restore. The
//! validator owns the knowledge of which erasure patterns are recoverable;
//! this codec never guesses.

use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::interface::{CrushRuleset, ErasureCodeInterface, PluginFlags};
use crate::profile::ErasureCodeProfile;
use crate::shard::{ShardId, ShardMap, ShardSet};

use super::binding::{BindingGuard, NativeFns};
use super::layout;
use super::{ALGORITHM_ALIGNMENT, CODING_CHUNKS, DATA_CHUNKS, TOTAL_CHUNKS};

/// Erasure codec driving the native SizeCeph transformation.
#[derive(Debug)]
pub struct SizeCephCodec {
    profile: ErasureCodeProfile,
    chunk_mapping: Vec<ShardId>,
    binding: Option<BindingGuard>,
}

impl SizeCephCodec {
    /// Create an uninitialized codec with the default profile registered.
    pub fn new() -> Self {
        let mut profile = ErasureCodeProfile::new();
        profile
            .set("k", DATA_CHUNKS)
            .set("m", CODING_CHUNKS)
            .set("technique", "sizeceph");

        Self {
            profile,
            chunk_mapping: (0..TOTAL_CHUNKS).map(|i| ShardId(i as u8)).collect(),
            binding: None,
        }
    }

    /// Validate the two accepted profile shapes.
    ///
    /// Standard is k=4/m=5. With `force_all_chunks = "true"` the legacy
    /// shape k=9/m=0 (every chunk presented as data) is also accepted;
    /// runtime behavior is identical either way.
    fn validate_profile(profile: &ErasureCodeProfile) -> Result<()> {
        if let Some(technique) = profile.get("technique") {
            if technique != "sizeceph" {
                return Err(Error::InvalidProfile(format!(
                    "technique '{technique}' is not handled by this codec"
                )));
            }
        }

        let k = profile.parse_u32("k")?;
        let m = profile.parse_u32("m")?;

        if profile.flag("force_all_chunks") {
            if let Some(k) = k {
                if k as usize != TOTAL_CHUNKS {
                    return Err(Error::InvalidProfile(format!(
                        "force_all_chunks mode requires k={TOTAL_CHUNKS}, got k={k}"
                    )));
                }
            }
            if let Some(m) = m {
                if m != 0 {
                    return Err(Error::InvalidProfile(format!(
                        "force_all_chunks mode requires m=0, got m={m}"
                    )));
                }
            }
        } else {
            if let Some(k) = k {
                if k as usize != DATA_CHUNKS {
                    return Err(Error::InvalidProfile(format!(
                        "sizeceph only supports k={DATA_CHUNKS}, got k={k}"
                    )));
                }
            }
            if let Some(m) = m {
                if m as usize != CODING_CHUNKS {
                    return Err(Error::InvalidProfile(format!(
                        "sizeceph only supports m={CODING_CHUNKS}, got m={m}"
                    )));
                }
            }
        }
        Ok(())
    }

    fn fns(&self) -> Result<&NativeFns> {
        self.binding
            .as_ref()
            .map(BindingGuard::fns)
            .ok_or_else(|| Error::LibraryUnavailable("codec not initialized".to_string()))
    }
}

impl Default for SizeCephCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ErasureCodeInterface for SizeCephCodec {
    fn init(&mut self, profile: &ErasureCodeProfile) -> Result<()> {
        Self::validate_profile(profile)?;

        // overlay the caller's profile onto the registered defaults
        let mut merged = self.profile.clone();
        for (key, value) in profile.iter() {
            merged.set(key, value);
        }
        self.profile = merged;

        if self.binding.is_none() {
            self.binding = Some(BindingGuard::acquire()?);
        }
        debug!(k = DATA_CHUNKS, m = CODING_CHUNKS, "sizeceph codec initialized");
        Ok(())
    }

    fn profile(&self) -> &ErasureCodeProfile {
        &self.profile
    }

    fn create_rule(&self, name: &str, crush: &mut dyn CrushRuleset) -> Result<i32> {
        if crush.rule_exists(name) {
            debug!(name, "rule already exists");
            return crush.rule_id(name);
        }
        let rule_id = crush.add_simple_rule(name, "default", "host", "indep")?;
        debug!(name, rule_id, "created crush rule");
        Ok(rule_id)
    }

    fn chunk_count(&self) -> usize {
        TOTAL_CHUNKS
    }

    fn data_chunk_count(&self) -> usize {
        DATA_CHUNKS
    }

    fn coding_chunk_count(&self) -> usize {
        CODING_CHUNKS
    }

    fn chunk_size(&self, stripe_width: usize) -> usize {
        layout::chunk_size(stripe_width)
    }

    fn alignment(&self) -> usize {
        ALGORITHM_ALIGNMENT
    }

    fn minimum_granularity(&self) -> usize {
        ALGORITHM_ALIGNMENT
    }

    fn chunk_mapping(&self) -> &[ShardId] {
        &self.chunk_mapping
    }

    fn supported_optimizations(&self) -> PluginFlags {
        // no partial-read, partial-write or parity-delta bits: any mutation
        // of a stripe needs a full re-encode
        PluginFlags::OPTIMIZED_SUPPORTED | PluginFlags::ZERO_PADDING_OPTIMIZATION
    }

    fn minimum_to_decode(
        &self,
        _want_to_read: &ShardSet,
        available: &ShardSet,
        minimum_sub_chunks: Option<&mut ShardMap<Vec<(i32, i32)>>>,
    ) -> Result<ShardSet> {
        let have_all = (0..TOTAL_CHUNKS).all(|i| available.contains(&ShardId(i as u8)));
        if !have_all {
            debug!(
                available = available.len(),
                "minimum_to_decode refused, every shard is required"
            );
            return Err(Error::InsufficientShards {
                available: available.len(),
                required: TOTAL_CHUNKS,
            });
        }
        if let Some(sub_chunks) = minimum_sub_chunks {
            sub_chunks.clear();
        }
        Ok(available.clone())
    }

    fn minimum_to_decode_with_cost(
        &self,
        want_to_read: &ShardSet,
        available: &ShardMap<i32>,
    ) -> Result<ShardSet> {
        // the policy is set-determined, costs carry no information here
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
        let fns = self.fns()?;

        // The transformation correlates every output shard; a partial encode
        // has no meaning.
        let is_full_set = want_to_encode.len() == TOTAL_CHUNKS
            && want_to_encode
                .iter()
                .all(|id| id.index() < TOTAL_CHUNKS);
        if !is_full_set {
            return Err(Error::InvalidArgument(format!(
                "want_to_encode must name all {TOTAL_CHUNKS} shards, got {}",
                want_to_encode.len()
            )));
        }

        if input.len() % ALGORITHM_ALIGNMENT != 0 {
            return Err(Error::InvalidArgument(format!(
                "input length {} is not a multiple of {ALGORITHM_ALIGNMENT}",
                input.len()
            )));
        }

        if input.is_empty() {
            debug!("empty input, emitting empty shards");
            for id in want_to_encode {
                encoded.insert(*id, Vec::new());
            }
            return Ok(());
        }

        let shard_len = input.len() / ALGORITHM_ALIGNMENT;
        let mut shards: Vec<Vec<u8>> = (0..TOTAL_CHUNKS).map(|_| vec![0u8; shard_len]).collect();
        let mut shard_ptrs: Vec<*mut u8> = shards.iter_mut().map(|s| s.as_mut_ptr()).collect();

        // SAFETY: nine output buffers of shard_len = len / 4 bytes each,
        // exactly what size_split writes; the input is contiguous for len
        // bytes and len is a multiple of 4.
        unsafe { (fns.split)(shard_ptrs.as_mut_ptr(), input.as_ptr(), input.len() as u32) };

        for (index, shard) in shards.into_iter().enumerate() {
            let id = ShardId(index as u8);
            if want_to_encode.contains(&id) {
                encoded.insert(id, shard);
            }
        }

        debug!(shard_len, shards = TOTAL_CHUNKS, "stripe encoded");
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
        let fns = self.fns()?;

        // strict always-decode policy: every shard must be on hand
        let have_all = chunks.len() >= TOTAL_CHUNKS
            && (0..TOTAL_CHUNKS).all(|i| chunks.contains_key(&ShardId(i as u8)));
        if !have_all {
            debug!(available = chunks.len(), "decode refused, shards missing");
            return Err(Error::MissingShards {
                available: chunks.len(),
                required: TOTAL_CHUNKS,
            });
        }

        for id in want_to_read {
            if id.index() >= TOTAL_CHUNKS {
                return Err(Error::ShardIdOutOfRange {
                    id: id.index() as i32,
                    total: TOTAL_CHUNKS,
                });
            }
        }

        let chunk_len = if chunk_size > 0 {
            chunk_size as usize
        } else {
            chunks.values().next().map(Vec::len).unwrap_or(0)
        };
        if chunk_len == 0 {
            return Err(Error::InvalidArgument(
                "chunk size could not be inferred from the available shards".to_string(),
            ));
        }

        // Shard-pointer vector in id order; a missing slot would carry null,
        // though the all-present check above rules that out today.
        let mut shard_ptrs: Vec<*const u8> = vec![std::ptr::null(); TOTAL_CHUNKS];
        for (id, buf) in chunks {
            if id.index() >= TOTAL_CHUNKS {
                return Err(Error::ShardIdOutOfRange {
                    id: id.index() as i32,
                    total: TOTAL_CHUNKS,
                });
            }
            if buf.len() != chunk_len {
                return Err(Error::InvalidArgument(format!(
                    "shard {id} has length {}, expected {chunk_len}",
                    buf.len()
                )));
            }
            shard_ptrs[id.index()] = buf.as_ptr();
        }

        let available_mask: u32 = shard_ptrs
            .iter()
            .enumerate()
            .filter(|(_, ptr)| !ptr.is_null())
            .fold(0, |mask, (index, _)| mask | 1 << index);

        // SAFETY: nine pointers, each null or valid for chunk_len bytes.
        let restorable = unsafe { (fns.can_restore)(shard_ptrs.as_ptr()) };
        if restorable == 0 {
            debug!(available_mask, "pattern rejected by native validator");
            return Err(Error::UnrecoverablePattern { available_mask });
        }

        let original_len = ALGORITHM_ALIGNMENT * chunk_len;
        let mut restored = vec![0u8; original_len];

        // SAFETY: the output buffer holds original_len bytes, each non-null
        // shard pointer is valid for original_len / 4 bytes, and original_len
        // is a multiple of 4 by construction.
        let rc = unsafe {
            (fns.restore)(restored.as_mut_ptr(), shard_ptrs.as_ptr(), original_len as u32)
        };
        if rc != 0 {
            debug!(code = rc, available_mask, "native restore failed");
            return Err(Error::RestoreFailed { code: rc });
        }

        let slice_len = original_len / DATA_CHUNKS;
        for id in want_to_read {
            if id.index() < DATA_CHUNKS {
                // data shards are slices of the restored original, not the
                // transformed bytes stored on disk
                let start = id.index() * slice_len;
                let end = if id.index() == DATA_CHUNKS - 1 {
                    original_len
                } else {
                    start + slice_len
                };
                decoded.insert(*id, restored[start..end].to_vec());
            } else {
                // on-disk parity shards expose nothing readable
                decoded.insert(*id, Vec::new());
            }
        }

        debug!(want = want_to_read.len(), "stripe decoded");
        Ok(())
    }

    fn encode_delta(&self, _old_data: &[u8], _new_data: &[u8]) -> Vec<u8> {
        // the transformation is non-linear, no delta can represent an update
        Vec::new()
    }

    fn apply_delta(&self, _deltas: &ShardMap<Vec<u8>>, out_chunks: &mut ShardMap<Vec<u8>>) {
        // partial updates are impossible, leave nothing stale behind
        out_chunks.clear();
    }
}

// =============================================================================
// Tests
// =============================================================================
