//! Pure-Rust rendition of the native codec ABI
//!
//! Mirrors the shared library's contract exactly — `size_split` turns a
//! 4-byte-aligned input of `len` bytes into nine shards of `len / 4` bytes,
//! `size_restore` inverts it, and the validator answers which patterns are
//! recoverable — so the whole plugin pipeline can run without `sizeceph.so`.
//!
//! The transformation itself is a stand-in, not the production algorithm:
//! shards 0..4 are the four byte columns of the input, shard 4 is their XOR
//! and shards 5..9 are pairwise column XORs. Restorable patterns are "all
//! four columns present" or "one column missing but the XOR shard present",
//! which gives the validator a real refusal surface.

use super::{DATA_CHUNKS, TOTAL_CHUNKS};

/// `size_split(out, in, len)`: write `len / 4` bytes into each output shard.
///
/// # Safety
///
/// `dst` must point to `TOTAL_CHUNKS` valid buffers of at least `len / 4`
/// bytes each; `src` must be valid for `len` bytes; `len` must be a
/// multiple of 4.
pub(crate) unsafe extern "C" fn size_split(dst: *mut *mut u8, src: *const u8, len: u32) {
    let len = len as usize;
    let cols = len / DATA_CHUNKS;
    let input = std::slice::from_raw_parts(src, len);

    for shard_idx in 0..TOTAL_CHUNKS {
        let shard = std::slice::from_raw_parts_mut(*dst.add(shard_idx), cols);
        for (col, out) in shard.iter_mut().enumerate() {
            let b = &input[col * DATA_CHUNKS..(col + 1) * DATA_CHUNKS];
            *out = match shard_idx {
                0..=3 => b[shard_idx],
                4 => b[0] ^ b[1] ^ b[2] ^ b[3],
                5 => b[0] ^ b[1],
                6 => b[1] ^ b[2],
                7 => b[2] ^ b[3],
                8 => b[3] ^ b[0],
                _ => unreachable!(),
            };
        }
    }
}

/// `size_restore(out, in, len)`: rebuild the original `len` bytes from the
/// shard-pointer vector; null entries mark missing shards. Returns 0 on
/// success.
///
/// # Safety
///
/// `src` must point to `TOTAL_CHUNKS` pointers, each null or valid for
/// `len / 4` bytes; `dst` must be valid for `len` bytes; `len` must be a
/// multiple of 4.
pub(crate) unsafe extern "C" fn size_restore(
    dst: *mut u8,
    src: *const *const u8,
    len: u32,
) -> i32 {
    let len = len as usize;
    let cols = len / DATA_CHUNKS;

    let shard = |idx: usize| -> Option<&[u8]> {
        // SAFETY: callers pass TOTAL_CHUNKS pointers, each null or valid
        unsafe {
            let ptr = *src.add(idx);
            if ptr.is_null() {
                None
            } else {
                Some(std::slice::from_raw_parts(ptr, cols))
            }
        }
    };

    let data: Vec<Option<&[u8]>> = (0..DATA_CHUNKS).map(shard).collect();
    let parity = shard(DATA_CHUNKS);
    let missing: Vec<usize> = (0..DATA_CHUNKS).filter(|&i| data[i].is_none()).collect();

    match (missing.len(), parity) {
        (0, _) => {}
        (1, Some(_)) => {}
        _ => return -1,
    }

    let out = std::slice::from_raw_parts_mut(dst, len);
    for col in 0..cols {
        let mut b = [0u8; DATA_CHUNKS];
        for (i, column) in data.iter().enumerate() {
            if let Some(s) = column {
                b[i] = s[col];
            }
        }
        if let (Some(&m), Some(p)) = (missing.first(), parity) {
            let mut value = p[col];
            for (i, byte) in b.iter().enumerate() {
                if i != m {
                    value ^= byte;
                }
            }
            b[m] = value;
        }
        out[col * DATA_CHUNKS..(col + 1) * DATA_CHUNKS].copy_from_slice(&b);
    }
    0
}

/// `size_can_get_restore_fn(in)`: non-zero iff the non-null entries form a
/// restorable pattern.
///
/// # Safety
///
/// `src` must point to `TOTAL_CHUNKS` pointers.
pub(crate) unsafe extern "C" fn size_can_get_restore(src: *const *const u8) -> i32 {
    // SAFETY: callers pass TOTAL_CHUNKS pointers
    let have = |idx: usize| unsafe { !(*src.add(idx)).is_null() };
    let missing_data = (0..DATA_CHUNKS).filter(|&i| !have(i)).count();
    let restorable = missing_data == 0 || (missing_data == 1 && have(DATA_CHUNKS));
    restorable as i32
}
