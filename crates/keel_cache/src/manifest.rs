//! Persisted per-module cache state.
//!
//! The manifest is stored as `manifest.json` in the cache directory. It holds
//! one [`CacheEntry`] per module key together with the configuration
//! fingerprint the entries were built under and a checksum over the entries,
//! so a hand-edited or half-written manifest is detected on load.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use keel_common::ContentHash;
use serde::{Deserialize, Serialize};

use crate::blob::FormatTag;
use crate::error::CacheError;

/// Name of the manifest file within the cache directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Top-level cache manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheManifest {
    /// keel version that produced this cache.
    pub keel_version: String,

    /// Fingerprint of the configuration the entries were built under.
    pub fingerprint: ContentHash,

    /// Per-module cache state, keyed by module key.
    pub entries: BTreeMap<String, CacheEntry>,

    /// Checksum over the serialized `entries`.
    pub checksum: ContentHash,
}

/// Cached state for a single module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Absolute path of the module source.
    pub path: PathBuf,

    /// Whether the module comes from a third-party package.
    pub external: bool,

    /// Unit key from [`SourceHasher::unit_key`](crate::SourceHasher::unit_key); also the
    /// key of the compiled unit in the blob store.
    pub source_hash: ContentHash,

    /// Hash of the compiled output.
    pub output_hash: ContentHash,

    /// Format of the compiled output.
    pub format: FormatTag,

    /// Keys of the modules this module imports, in import order.
    pub dependencies: Vec<String>,

    /// Keys of the modules that import this module.
    pub dependents: BTreeSet<String>,

    /// Seconds since the Unix epoch at which the entry was last rebuilt.
    pub built_at: u64,

    /// Message of the last failed rebuild, if the module is currently broken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CacheEntry {
    /// Returns `true` if the last rebuild of this module failed.
    pub fn is_errored(&self) -> bool {
        self.error.is_some()
    }
}

impl CacheManifest {
    /// Creates an empty manifest for the given keel version and fingerprint.
    pub fn new(keel_version: &str, fingerprint: ContentHash) -> Self {
        let mut manifest = Self {
            keel_version: keel_version.to_string(),
            fingerprint,
            entries: BTreeMap::new(),
            checksum: ContentHash::from_bytes(b""),
        };
        // An empty entry map always serializes, so the checksum is well-defined.
        manifest.checksum = manifest.compute_checksum().unwrap_or(manifest.checksum);
        manifest
    }

    /// Returns the path of the manifest file inside `cache_dir`.
    pub fn path(cache_dir: &Path) -> PathBuf {
        cache_dir.join(MANIFEST_FILE)
    }

    /// Loads the manifest from the cache directory.
    ///
    /// Returns `Ok(None)` if no manifest exists. A manifest that cannot be
    /// parsed or whose checksum does not match its entries is
    /// [`CacheError::Corrupted`].
    pub fn load(cache_dir: &Path) -> Result<Option<Self>, CacheError> {
        let path = Self::path(cache_dir);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheError::Io { path, source: e }),
        };

        let manifest: CacheManifest =
            serde_json::from_str(&content).map_err(|e| CacheError::Corrupted {
                path: path.clone(),
                reason: format!("unparseable manifest: {e}"),
            })?;

        let expected = manifest.compute_checksum()?;
        if expected != manifest.checksum {
            return Err(CacheError::Corrupted {
                path,
                reason: format!(
                    "entry checksum {} does not match recorded {}",
                    expected, manifest.checksum
                ),
            });
        }
        Ok(Some(manifest))
    }

    /// Recomputes the checksum and writes the manifest atomically.
    pub fn save(&mut self, cache_dir: &Path) -> Result<(), CacheError> {
        self.checksum = self.compute_checksum()?;
        let json = serde_json::to_string_pretty(self).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        crate::write_atomic(&Self::path(cache_dir), json.as_bytes())
    }

    /// Returns `true` if this manifest was produced by the given keel version
    /// under the given configuration fingerprint.
    pub fn is_compatible(&self, keel_version: &str, fingerprint: &ContentHash) -> bool {
        self.keel_version == keel_version && self.fingerprint == *fingerprint
    }

    fn compute_checksum(&self) -> Result<ContentHash, CacheError> {
        let bytes = serde_json::to_vec(&self.entries).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        Ok(ContentHash::from_parts([
            self.keel_version.as_bytes(),
            self.fingerprint.as_bytes().as_slice(),
            bytes.as_slice(),
        ]))
    }
}
