//! High-level cache orchestrator.
//!
//! [`Cache`] ties the manifest and the blob store together for one project.
//! Opening a cache is all-or-nothing: either every entry was built under the
//! current fingerprint and every referenced blob verifies, or the cache is
//! discarded and the caller starts from a cold build.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use keel_common::{ContentHash, KEEL_VERSION};

use crate::blob::BlobStore;
use crate::error::CacheError;
use crate::hasher::{ChangeSet, SourceHasher};
use crate::manifest::{CacheEntry, CacheManifest};

/// How [`Cache::open`] found the persisted state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheOpen {
    /// A valid cache was loaded.
    Warm {
        /// Number of entries loaded.
        entries: usize,
    },
    /// No cache existed yet.
    Fresh,
    /// A cache existed but was built by another keel version or configuration.
    Reset {
        /// Why the cache was discarded.
        reason: String,
    },
    /// A cache existed but failed an integrity check and was discarded.
    Recovered {
        /// The integrity failure.
        reason: String,
    },
}

impl CacheOpen {
    /// Returns `true` if persisted state was thrown away.
    pub fn discarded(&self) -> bool {
        matches!(self, CacheOpen::Reset { .. } | CacheOpen::Recovered { .. })
    }
}

/// Persisted incremental cache for one project.
#[derive(Debug)]
pub struct Cache {
    cache_dir: PathBuf,
    manifest: CacheManifest,
    blobs: BlobStore,
}

impl Cache {
    /// Opens the cache in `cache_dir`, discarding it if it does not match
    /// `fingerprint` or fails validation.
    ///
    /// Only I/O errors unrelated to integrity are returned as errors.
    pub fn open(cache_dir: &Path, fingerprint: ContentHash) -> Result<(Self, CacheOpen), CacheError> {
        let blobs = BlobStore::new(cache_dir);
        let mut cache = Self {
            cache_dir: cache_dir.to_path_buf(),
            manifest: CacheManifest::new(KEEL_VERSION, fingerprint),
            blobs,
        };

        let loaded = match CacheManifest::load(cache_dir) {
            Ok(Some(manifest)) => manifest,
            Ok(None) => {
                tracing::debug!(dir = %cache_dir.display(), "no cache manifest, starting fresh");
                return Ok((cache, CacheOpen::Fresh));
            }
            Err(e) if e.is_corruption() => {
                let reason = e.to_string();
                tracing::warn!(%reason, "discarding corrupted cache");
                cache.clear()?;
                return Ok((cache, CacheOpen::Recovered { reason }));
            }
            Err(e) => return Err(e),
        };

        if !loaded.is_compatible(KEEL_VERSION, &fingerprint) {
            let reason = if loaded.keel_version != KEEL_VERSION {
                format!(
                    "cache was written by keel {}, this is {}",
                    loaded.keel_version, KEEL_VERSION
                )
            } else {
                "build configuration changed".to_string()
            };
            tracing::info!(%reason, "discarding cache");
            cache.clear()?;
            return Ok((cache, CacheOpen::Reset { reason }));
        }

        for (key, entry) in &loaded.entries {
            // A broken module may never have produced a blob.
            if entry.is_errored() && !cache.blobs.contains(&entry.source_hash) {
                continue;
            }
            if let Err(e) = cache.blobs.verify(&entry.source_hash) {
                if !e.is_corruption() {
                    return Err(e);
                }
                let reason = format!("entry `{key}`: {e}");
                tracing::warn!(%reason, "discarding corrupted cache");
                cache.clear()?;
                return Ok((cache, CacheOpen::Recovered { reason }));
            }
        }

        let entries = loaded.entries.len();
        cache.manifest = loaded;
        tracing::debug!(entries, "loaded warm cache");
        Ok((cache, CacheOpen::Warm { entries }))
    }

    /// Returns the cache directory.
    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Returns the blob store.
    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Returns the current manifest.
    pub fn manifest(&self) -> &CacheManifest {
        &self.manifest
    }

    /// Returns the fingerprint entries are built under.
    pub fn fingerprint(&self) -> ContentHash {
        self.manifest.fingerprint
    }

    /// Looks up the entry for a module key.
    pub fn entry(&self, key: &str) -> Option<&CacheEntry> {
        self.manifest.entries.get(key)
    }

    /// Looks up the entry for a module key mutably.
    pub fn entry_mut(&mut self, key: &str) -> Option<&mut CacheEntry> {
        self.manifest.entries.get_mut(key)
    }

    /// Iterates over all entries in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&String, &CacheEntry)> {
        self.manifest.entries.iter()
    }

    /// Inserts or replaces the entry for `key`.
    pub fn upsert(&mut self, key: impl Into<String>, entry: CacheEntry) {
        self.manifest.entries.insert(key.into(), entry);
    }

    /// Removes the entry for `key`, returning it if present.
    pub fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        self.manifest.entries.remove(key)
    }

    /// Keeps only the entries for which `keep` returns `true`.
    pub fn retain(&mut self, mut keep: impl FnMut(&str, &CacheEntry) -> bool) {
        self.manifest.entries.retain(|k, e| keep(k, e));
    }

    /// Persists the manifest to disk.
    pub fn save(&mut self) -> Result<(), CacheError> {
        self.manifest.save(&self.cache_dir)
    }

    /// Hashes every known source file and compares it with its entry.
    pub fn detect_changes(&self) -> ChangeSet {
        let files: Vec<(PathBuf, bool)> = self
            .manifest
            .entries
            .values()
            .map(|e| (e.path.clone(), e.external))
            .collect();
        let hashes = SourceHasher::hash_files(&files);
        SourceHasher::detect_changes(&hashes, &self.manifest)
    }

    /// Removes blobs no entry references. Returns the number removed.
    pub fn gc(&self) -> Result<usize, CacheError> {
        let live: HashSet<ContentHash> = self
            .manifest
            .entries
            .values()
            .map(|e| e.source_hash)
            .collect();
        self.blobs.gc(&live)
    }

    /// Deletes every blob and the manifest, leaving an empty cache.
    pub fn clear(&mut self) -> Result<(), CacheError> {
        let blob_dir = self.cache_dir.join("blobs");
        if blob_dir.exists() {
            std::fs::remove_dir_all(&blob_dir).map_err(|e| CacheError::Io {
                path: blob_dir.clone(),
                source: e,
            })?;
        }
        let manifest_path = CacheManifest::path(&self.cache_dir);
        if manifest_path.exists() {
            std::fs::remove_file(&manifest_path).map_err(|e| CacheError::Io {
                path: manifest_path.clone(),
                source: e,
            })?;
        }
        self.manifest = CacheManifest::new(KEEL_VERSION, self.manifest.fingerprint);
        Ok(())
    }
}
