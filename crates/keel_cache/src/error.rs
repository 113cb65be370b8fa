//! Error types for cache operations.

use std::path::PathBuf;

/// Errors that can occur during cache operations.
///
/// Header, checksum, version and parse failures are all integrity failures:
/// [`is_corruption`](CacheError::is_corruption) groups them so that callers
/// can discard the cache and rebuild instead of serving unchecked data.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A blob file has an invalid or missing header.
    #[error("invalid blob header in {path}: {reason}")]
    InvalidHeader {
        /// The blob file path.
        path: PathBuf,
        /// Description of the header problem.
        reason: String,
    },

    /// The stored checksum does not match the computed checksum of the payload.
    #[error("checksum mismatch in {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// The file path.
        path: PathBuf,
        /// The expected checksum from the header.
        expected: String,
        /// The actual checksum computed from the payload.
        actual: String,
    },

    /// The blob format version does not match the current version.
    #[error("version mismatch in {path}: expected {expected}, got {actual}")]
    VersionMismatch {
        /// The blob file path.
        path: PathBuf,
        /// The expected format version.
        expected: u32,
        /// The actual format version found in the file.
        actual: u32,
    },

    /// The persisted cache is unreadable or inconsistent.
    #[error("cache corrupted at {path}: {reason}")]
    Corrupted {
        /// The file that failed the check.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },
}

impl CacheError {
    /// Returns `true` if this error means persisted data failed an integrity check.
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            CacheError::InvalidHeader { .. }
                | CacheError::ChecksumMismatch { .. }
                | CacheError::VersionMismatch { .. }
                | CacheError::Corrupted { .. }
        )
    }
}
