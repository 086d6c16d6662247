//! SizeCeph always-decode codec subsystem
//!
//! SizeCeph is a data-transformation erasure code: the native library turns
//! a 4-byte-aligned input into nine equal shards, none of which contains the
//! input verbatim, and restores the original from a sufficient subset. The
//! host-facing view is k=4 data plus m=5 parity, but internally all nine
//! shards participate in every decode.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       SizeCephCodec                           │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                               │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐  │
//! │  │   Encoder    │   │   Decoder    │   │  Stripe Layout   │  │
//! │  │ (size_split) │   │(size_restore)│   │   (alignment)    │  │
//! │  └──────┬───────┘   └──────┬───────┘   └──────────────────┘  │
//! │         │                  │                                  │
//! │         └─────────┬────────┘                                  │
//! │                   ▼                                           │
//! │  ┌─────────────────────────────────────────────────────────┐ │
//! │  │     Native binding (process-wide, reference-counted)     │ │
//! │  └─────────────────────────────────────────────────────────┘ │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - **Binding** (`binding.rs`): locates `sizeceph.so`, resolves the three
//!   entry points together, and ties library lifetime to codec instances
//!   through a reference count.
//! - **Layout** (`layout.rs`): stripe-width padding and per-shard chunk
//!   sizing around the codec's 4-byte internal block.
//! - **Codec** (`codec.rs`): the host-facing façade with the strict
//!   always-decode policy.
//! - **Mock** (`mock.rs`): a pure-Rust rendition of the native ABI so the
//!   full pipeline can be exercised without the shared library.

pub mod binding;
pub mod codec;
pub mod layout;

#[cfg(any(test, feature = "mock-codec"))]
pub mod mock;

#[cfg(test)]
mod proptest;

pub use codec::SizeCephCodec;
pub use layout::{ALGORITHM_ALIGNMENT, STORAGE_BLOCK_SIZE};

/// Data shards visible to the host
pub const DATA_CHUNKS: usize = 4;
/// Parity shards visible to the host
pub const CODING_CHUNKS: usize = 5;
/// Total shards emitted per stripe
pub const TOTAL_CHUNKS: usize = DATA_CHUNKS + CODING_CHUNKS;
