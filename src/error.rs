//! Error types for the SizeCeph erasure-code plugin

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse disposition of an [`Error`], mirroring the status families the
/// host object store distinguishes when deciding how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// Caller input violated a precondition; never retried
    Invalid,
    /// A required resource (library, symbol, shard) is missing
    NotFound,
    /// Operation defined but unavailable here, or pattern not recoverable
    NotSupported,
    /// Downstream failure in the native codec or the placement layer
    Io,
}

/// Errors that can occur in the erasure-code plugin
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Caller Input Errors
    // =========================================================================
    /// Profile rejected during init
    #[error("invalid profile: {0}")]
    InvalidProfile(String),

    /// Encode/decode argument rejected
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Shard id outside the configured range
    #[error("shard id {id} out of range (total {total})")]
    ShardIdOutOfRange { id: i32, total: usize },

    /// A plugin with this name is already registered
    #[error("plugin '{0}' already registered")]
    PluginExists(String),

    // =========================================================================
    // Missing Resource Errors
    // =========================================================================
    /// No plugin registered under this name
    #[error("plugin '{0}' not registered")]
    PluginNotFound(String),

    /// The native library or one of its symbols could not be resolved
    #[error("sizeceph library unavailable: {0}")]
    LibraryUnavailable(String),

    /// Decode requires every shard to be on hand
    #[error("missing shards: have {available}, need {required}")]
    MissingShards { available: usize, required: usize },

    // =========================================================================
    // Unsupported Operations and Patterns
    // =========================================================================
    /// The native validator rejected this erasure pattern
    #[error("shard pattern {available_mask:#x} cannot be restored")]
    UnrecoverablePattern { available_mask: u32 },

    /// Operation defined by the interface but not by this codec
    #[error("operation not supported: {0}")]
    NotSupported(&'static str),

    // =========================================================================
    // Downstream Failures
    // =========================================================================
    /// Not enough shards to satisfy the minimum-to-decode policy
    #[error("insufficient shards: have {available}, need {required}")]
    InsufficientShards { available: usize, required: usize },

    /// The native restore entry point returned a non-zero code
    #[error("native restore failed with code {code}")]
    RestoreFailed { code: i32 },

    /// Rule creation failed in the host's placement layer
    #[error("crush rule '{name}' could not be created: {reason}")]
    RuleCreation { name: String, reason: String },
}

impl Error {
    /// Map this error onto the status family the host understands.
    pub fn kind(&self) -> StatusKind {
        match self {
            Error::InvalidProfile(_)
            | Error::InvalidArgument(_)
            | Error::ShardIdOutOfRange { .. }
            | Error::PluginExists(_) => StatusKind::Invalid,
            Error::PluginNotFound(_)
            | Error::LibraryUnavailable(_)
            | Error::MissingShards { .. } => StatusKind::NotFound,
            Error::UnrecoverablePattern { .. } | Error::NotSupported(_) => {
                StatusKind::NotSupported
            }
            Error::InsufficientShards { .. }
            | Error::RestoreFailed { .. }
            | Error::RuleCreation { .. } => StatusKind::Io,
        }
    }
}
