//! Native Binding Lifetime Tests
//!
//! The binding is process-wide, so this suite runs as its own test binary
//! with a single test: nothing else in the process holds codec instances,
//! and the fully-unloaded end state can be asserted exactly.

#![cfg(feature = "mock-codec")]

use std::thread;

use sizeceph_plugin::shard::full_shard_set;
use sizeceph_plugin::sizeceph::binding;
use sizeceph_plugin::{ErasureCodeInterface, ErasureCodeProfile, ShardMap, SizeCephCodec};

#[test]
fn test_ref_count_discipline() {
    assert_eq!(binding::ref_count(), 0);
    assert!(!binding::is_loaded());

    // re-initializing one instance must not leak additional references
    let mut codec = SizeCephCodec::new();
    codec.init(&ErasureCodeProfile::new()).unwrap();
    let single = binding::ref_count();
    assert_eq!(single, 1);
    codec.init(&ErasureCodeProfile::new()).unwrap();
    assert_eq!(binding::ref_count(), single);
    drop(codec);
    assert_eq!(binding::ref_count(), 0);

    // construct and destroy instances across threads
    let handles: Vec<_> = (0..8)
        .map(|worker| {
            thread::spawn(move || {
                for round in 0..16 {
                    let mut codec = SizeCephCodec::new();
                    codec.init(&ErasureCodeProfile::new()).unwrap();

                    // the binding is held open while any instance lives
                    assert!(binding::is_loaded());
                    assert!(binding::ref_count() >= 1);

                    // one real operation so the guard's pointers are used
                    let input = vec![(worker * 16 + round) as u8; 32];
                    let mut encoded = ShardMap::new();
                    codec
                        .encode(&full_shard_set(9), &input, &mut encoded)
                        .unwrap();
                    assert_eq!(encoded.len(), 9);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    // every instance dropped: the binding is released and unloaded
    assert_eq!(binding::ref_count(), 0);
    assert!(!binding::is_loaded());
}
