//! Property-Based Tests for the SizeCeph codec
//!
//! Systematically verifies the codec laws across input shapes:
//!
//! 1. **Roundtrip**: a full encode followed by a full-shard decode
//!    reproduces the input exactly
//! 2. **Stripe identity**: `data_chunks * chunk_size(w)` equals the padded
//!    stripe width for every width
//! 3. **Shard uniformity**: every encoded shard has the same length
//! 4. **Determinism**: encoding is a pure function of the input

#![cfg(test)]

use proptest::prelude::*;

use crate::interface::ErasureCodeInterface;
use crate::profile::ErasureCodeProfile;
use crate::shard::{full_shard_set, ShardMap};

use super::codec::SizeCephCodec;
use super::layout;
use super::{DATA_CHUNKS, TOTAL_CHUNKS};

fn initialized_codec() -> SizeCephCodec {
    let mut codec = SizeCephCodec::new();
    codec
        .init(&ErasureCodeProfile::new())
        .expect("mock binding always loads");
    codec
}

/// Aligned input data: between 1 and 128 four-byte blocks.
fn aligned_data_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..=128)
        .prop_map(|blocks| blocks.into_iter().flat_map(|b| [b, b ^ 0x5A, b.wrapping_add(1), b.wrapping_mul(3)]).collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: full encode then full-shard decode reproduces the input.
    #[test]
    fn prop_roundtrip(data in aligned_data_strategy()) {
        let codec = initialized_codec();

        let mut encoded = ShardMap::new();
        codec.encode(&full_shard_set(TOTAL_CHUNKS), &data, &mut encoded)?;

        let want = full_shard_set(DATA_CHUNKS);
        let mut decoded = ShardMap::new();
        codec.decode(&want, &encoded, &mut decoded, 0)?;

        let mut joined = Vec::with_capacity(data.len());
        for id in &want {
            joined.extend_from_slice(&decoded[id]);
        }
        prop_assert_eq!(joined, data);
    }

    /// Property: every encoded shard has length chunk_size(input_len).
    #[test]
    fn prop_shard_uniformity(data in aligned_data_strategy()) {
        let codec = initialized_codec();

        let mut encoded = ShardMap::new();
        codec.encode(&full_shard_set(TOTAL_CHUNKS), &data, &mut encoded)?;

        prop_assert_eq!(encoded.len(), TOTAL_CHUNKS);
        let expected = codec.chunk_size(data.len());
        for shard in encoded.values() {
            prop_assert_eq!(shard.len(), expected);
        }
    }

    /// Property: the host's stripe identity holds for every width.
    #[test]
    fn prop_stripe_identity(stripe_width in 0usize..1_000_000) {
        prop_assert_eq!(
            DATA_CHUNKS * layout::chunk_size(stripe_width),
            layout::padded_stripe_width(stripe_width)
        );
        // padding never exceeds one stride
        prop_assert!(layout::padded_stripe_width(stripe_width) - stripe_width < DATA_CHUNKS * layout::ALGORITHM_ALIGNMENT);
    }

    /// Property: encoding is deterministic.
    #[test]
    fn prop_encoding_deterministic(data in aligned_data_strategy()) {
        let codec = initialized_codec();

        let mut first = ShardMap::new();
        codec.encode(&full_shard_set(TOTAL_CHUNKS), &data, &mut first)?;
        let mut second = ShardMap::new();
        codec.encode(&full_shard_set(TOTAL_CHUNKS), &data, &mut second)?;

        prop_assert_eq!(first, second);
    }

    /// Property: parity shards decode to empty buffers, data shards to
    /// chunk-size slices.
    #[test]
    fn prop_parity_opacity(data in aligned_data_strategy()) {
        let codec = initialized_codec();

        let mut encoded = ShardMap::new();
        codec.encode(&full_shard_set(TOTAL_CHUNKS), &data, &mut encoded)?;

        let mut decoded = ShardMap::new();
        codec.decode(&full_shard_set(TOTAL_CHUNKS), &encoded, &mut decoded, 0)?;

        let chunk = codec.chunk_size(data.len());
        for (id, shard) in &decoded {
            if id.index() < DATA_CHUNKS {
                prop_assert_eq!(shard.len(), chunk);
            } else {
                prop_assert!(shard.is_empty());
            }
        }
    }
}
