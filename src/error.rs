//! Error types for zip-builder

use std::io;
use thiserror::Error;

/// Result type for zip-builder operations
pub type Result<T> = std::result::Result<T, ZipBuilderError>;

/// Errors reported by [`ArchiveWriter`](crate::ArchiveWriter) operations.
///
/// Every error is raised synchronously by the offending call and leaves the
/// archive in its last valid state.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ZipBuilderError {
    /// `create` was called on a writer that already holds an archive
    #[error("the builder already holds an archive stream")]
    AlreadyInitialized,
    /// An operation was attempted before `create`
    #[error("the builder has no archive stream; call create() first")]
    NotInitialized,
    /// Configuration changed after entries were written, or configured twice
    #[error("invalid configuration state: {0}")]
    InvalidConfigurationState(&'static str),
    /// A caller-supplied argument was rejected
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument { name: &'static str, reason: String },
    /// A source file could not be resolved
    #[error("source file not found: {0}")]
    NotFound(String),
    /// The requested AES key size is not available
    #[error("unsupported encryption strength: AES-{0}")]
    UnsupportedEncryptionStrength(u16),
    /// A size, offset or count needs Zip64 but Zip64 was disabled
    #[error("size limit exceeded without Zip64: {0}")]
    SizeLimitExceeded(String),
    /// The archive was already finalized
    #[error("the archive has already been finalized")]
    AlreadyFinalized,
    /// Key derivation or cipher setup failed
    #[error("encryption error: {0}")]
    Crypto(String),
    /// I/O error from the codec or the filesystem
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ZipBuilderError {
    pub(crate) fn invalid_argument(name: &'static str, reason: impl Into<String>) -> Self {
        ZipBuilderError::InvalidArgument {
            name,
            reason: reason.into(),
        }
    }
}
