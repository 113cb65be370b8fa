//! Content-addressed store and persisted incremental cache.
//!
//! The [`BlobStore`] maps a source content hash to the compiled unit the front
//! end produced for it, so identical sources are never compiled twice. The
//! [`CacheManifest`] persists one [`CacheEntry`] per module across development
//! sessions, and [`Cache`] ties both together behind a configuration
//! fingerprint: a changed fingerprint or a failed integrity check discards the
//! whole cache instead of serving entries built under other assumptions.

#![warn(missing_docs)]

pub mod blob;
pub mod cache;
pub mod error;
pub mod hasher;
pub mod manifest;

pub use blob::{Blob, BlobMeta, BlobStore, FormatTag};
pub use cache::{Cache, CacheOpen};
pub use error::CacheError;
pub use hasher::{ChangeSet, SourceHasher};
pub use manifest::{CacheEntry, CacheManifest};

use std::io::Write;
use std::path::Path;

/// Writes `data` to `path` through a temporary file in the same directory,
/// so readers never observe a partially written file.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<(), CacheError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| CacheError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| CacheError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;
    tmp.write_all(data).map_err(|e| CacheError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    tmp.persist(path).map_err(|e| CacheError::Io {
        path: path.to_path_buf(),
        source: e.error,
    })?;
    Ok(())
}
