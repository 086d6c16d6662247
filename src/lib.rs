//! SizeCeph erasure-code plugin
//!
//! An erasure-code plugin for a distributed object store, implementing the
//! SizeCeph always-decode (k=4, m=5) transformation code and a trivial
//! (k=2, m=1) XOR parity code behind one plugin surface.
//!
//! SizeCeph is not a data-preservation code: the native library transforms
//! the stripe so that no shard contains the input verbatim, and every read
//! runs a full restore. The plugin wraps the dynamically loaded native
//! codec, keeps the host's stripe arithmetic consistent with the codec's
//! 4-byte internal block, and enforces the strict all-shards decode policy.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                       Plugin Registry                          │
//! │        plugin_version / plugin_init / technique dispatch       │
//! ├───────────────────────────────────────────────────────────────┤
//! │                                                                │
//! │  ┌─────────────────────┐        ┌─────────────────────┐       │
//! │  │    SizeCephCodec    │        │    SimpleXorCodec   │       │
//! │  │   (always-decode)   │        │ (conditional decode)│       │
//! │  └──────────┬──────────┘        └─────────────────────┘       │
//! │             │                                                  │
//! │  ┌──────────▼──────────────────────────────────────────────┐  │
//! │  │       Native binding (process-wide, ref-counted)         │  │
//! │  │   size_split / size_restore / size_can_get_restore_fn    │  │
//! │  └─────────────────────────────────────────────────────────┘  │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`error`] - Error types and the host status taxonomy
//! - [`interface`] - Codec and placement contracts shared with the host
//! - [`profile`] - The string-keyed configuration dictionary
//! - [`registry`] - Plugin registration and factory entry points
//! - [`shard`] - Shard identifiers and legacy integer conversions
//! - [`simple_xor`] - The k=2/m=1 XOR parity codec
//! - [`sizeceph`] - The SizeCeph codec, its native binding and layout math

pub mod error;
pub mod interface;
pub mod profile;
pub mod registry;
pub mod shard;
pub mod simple_xor;
pub mod sizeceph;

// Re-export commonly used types
pub use error::{Error, Result, StatusKind};
pub use interface::{CrushRuleset, ErasureCodeInterface, MemoryCrushRuleset, PluginFlags};
pub use profile::ErasureCodeProfile;
pub use registry::{plugin_init, plugin_version, ErasureCodePlugin, PluginRegistry, SizeCephPluginFactory};
pub use shard::{ShardId, ShardMap, ShardSet};
pub use simple_xor::SimpleXorCodec;
pub use sizeceph::SizeCephCodec;
