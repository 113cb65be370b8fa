//! Content-addressed blob storage.
//!
//! Each blob lives at `<cache_dir>/blobs/<hash>.blob` and starts with a
//! length-prefixed bincode header holding magic bytes, the blob format
//! version, the payload's metadata and a checksum. Blobs are immutable:
//! a key that already holds a valid blob is never rewritten.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use keel_common::{ContentHash, KEEL_VERSION};
use serde::{Deserialize, Serialize};

use crate::error::CacheError;

/// Magic bytes identifying a keel cache blob.
const BLOB_MAGIC: [u8; 4] = *b"KEEL";

/// Current blob format version. Increment on breaking changes to the header
/// or payload encoding.
const BLOB_FORMAT_VERSION: u32 = 1;

/// Subdirectory of the cache directory holding blobs.
const BLOB_SUBDIR: &str = "blobs";

/// File extension of blob files.
const BLOB_EXT: &str = "blob";

/// Kind of compiled output a blob holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatTag {
    /// Executable script output.
    Script,
    /// JSON data module.
    Json,
    /// Opaque asset copied as-is.
    Asset,
}

/// Small metadata stored alongside every blob.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobMeta {
    /// Payload size in bytes.
    pub size: u64,
    /// Compiled format of the payload.
    pub format: FormatTag,
}

/// Header prepended to every blob for validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BlobHeader {
    magic: [u8; 4],
    format_version: u32,
    keel_version: String,
    meta: BlobMeta,
    checksum: ContentHash,
}

/// A blob read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    /// The key the blob is stored under.
    pub key: ContentHash,
    /// Payload metadata.
    pub meta: BlobMeta,
    /// The payload bytes.
    pub payload: Vec<u8>,
}

/// Content-addressed store for compiled units.
///
/// Safe to share between worker threads: writes go through a temporary file
/// and an atomic rename, so two workers storing the same key cannot produce a
/// torn blob.
#[derive(Debug, Clone)]
pub struct BlobStore {
    dir: PathBuf,
}

impl BlobStore {
    /// Creates a store rooted at `<cache_dir>/blobs`.
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            dir: cache_dir.join(BLOB_SUBDIR),
        }
    }

    /// Returns the file path for the blob with the given key.
    pub fn blob_path(&self, key: &ContentHash) -> PathBuf {
        self.dir.join(format!("{key}.{BLOB_EXT}"))
    }

    /// Returns `true` if a blob file exists for `key`. Does not validate it.
    pub fn contains(&self, key: &ContentHash) -> bool {
        self.blob_path(key).is_file()
    }

    /// Stores `payload` under `key`.
    ///
    /// If a valid blob already exists for the key, nothing is written.
    /// An existing blob that fails validation is replaced.
    pub fn put(
        &self,
        key: &ContentHash,
        format: FormatTag,
        payload: &[u8],
    ) -> Result<BlobMeta, CacheError> {
        let meta = BlobMeta {
            size: payload.len() as u64,
            format,
        };
        if let Ok(Some(existing)) = self.get(key) {
            return Ok(existing.meta);
        }

        let header = BlobHeader {
            magic: BLOB_MAGIC,
            format_version: BLOB_FORMAT_VERSION,
            keel_version: KEEL_VERSION.to_string(),
            meta,
            checksum: ContentHash::from_bytes(payload),
        };
        let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;

        // 4-byte header length (little-endian) + header + payload
        let header_len = header_bytes.len() as u32;
        let mut output = Vec::with_capacity(4 + header_bytes.len() + payload.len());
        output.extend_from_slice(&header_len.to_le_bytes());
        output.extend_from_slice(&header_bytes);
        output.extend_from_slice(payload);

        crate::write_atomic(&self.blob_path(key), &output)?;
        tracing::trace!(%key, size = meta.size, "stored blob");
        Ok(meta)
    }

    /// Reads and validates the blob stored under `key`.
    ///
    /// Returns `Ok(None)` if no blob exists. A blob that exists but fails
    /// validation is an error for which [`CacheError::is_corruption`] holds.
    pub fn get(&self, key: &ContentHash) -> Result<Option<Blob>, CacheError> {
        let path = self.blob_path(key);
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::Io { path, source: e }),
        };

        let invalid = |reason: &str| CacheError::InvalidHeader {
            path: path.clone(),
            reason: reason.to_string(),
        };

        if raw.len() < 4 {
            return Err(invalid("file shorter than header length prefix"));
        }
        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&raw[..4]);
        let header_len = u32::from_le_bytes(len_bytes) as usize;
        if raw.len() < 4 + header_len {
            return Err(invalid("truncated header"));
        }

        let (header, _): (BlobHeader, usize) =
            bincode::serde::decode_from_slice(&raw[4..4 + header_len], bincode::config::standard())
                .map_err(|e| invalid(&e.to_string()))?;

        if header.magic != BLOB_MAGIC {
            return Err(invalid("missing magic bytes"));
        }
        if header.format_version != BLOB_FORMAT_VERSION {
            return Err(CacheError::VersionMismatch {
                path,
                expected: BLOB_FORMAT_VERSION,
                actual: header.format_version,
            });
        }

        let payload = &raw[4 + header_len..];
        let actual = ContentHash::from_bytes(payload);
        if actual != header.checksum || payload.len() as u64 != header.meta.size {
            return Err(CacheError::ChecksumMismatch {
                path,
                expected: header.checksum.to_string(),
                actual: actual.to_string(),
            });
        }

        Ok(Some(Blob {
            key: *key,
            meta: header.meta,
            payload: payload.to_vec(),
        }))
    }

    /// Validates the blob stored under `key`; a missing blob is an error.
    pub fn verify(&self, key: &ContentHash) -> Result<(), CacheError> {
        match self.get(key)? {
            Some(_) => Ok(()),
            None => Err(CacheError::Corrupted {
                path: self.blob_path(key),
                reason: "referenced blob is missing".to_string(),
            }),
        }
    }

    /// Removes blobs whose key is not in `live`.
    ///
    /// Files in the blob directory that are not named like blobs are left
    /// alone. Returns the number of blobs removed.
    pub fn gc(&self, live: &HashSet<ContentHash>) -> Result<usize, CacheError> {
        if !self.dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        let entries = std::fs::read_dir(&self.dir).map_err(|e| CacheError::Io {
            path: self.dir.clone(),
            source: e,
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| CacheError::Io {
                path: self.dir.clone(),
                source: e,
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(BLOB_EXT) {
                continue;
            }
            let Some(key) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse::<ContentHash>().ok())
            else {
                continue;
            };
            if !live.contains(&key) {
                std::fs::remove_file(&path).map_err(|e| CacheError::Io {
                    path: path.clone(),
                    source: e,
                })?;
                removed += 1;
            }
        }

        Ok(removed)
    }
}
