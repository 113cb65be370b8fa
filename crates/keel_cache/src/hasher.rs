//! Source file hashing and change detection.
//!
//! Compares the current content of every source file the manifest knows
//! about against the hash recorded when it was last built. Used on session
//! startup to find edits made while no watcher was running.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use keel_common::ContentHash;

use crate::error::CacheError;
use crate::manifest::CacheManifest;

/// Result of comparing source files on disk against the cache manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Module keys whose source hash differs from the manifest.
    pub modified: Vec<String>,

    /// Module keys whose source file no longer exists.
    pub deleted: Vec<String>,

    /// Module keys whose source hash matches the manifest.
    pub unchanged: Vec<String>,
}

impl ChangeSet {
    /// Returns `true` if no module was modified or deleted.
    pub fn is_empty(&self) -> bool {
        self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Number of modules that need rebuilding.
    pub fn dirty_count(&self) -> usize {
        self.modified.len() + self.deleted.len()
    }
}

/// Utility for computing content hashes of source files and detecting changes.
pub struct SourceHasher;

impl SourceHasher {
    /// Key of the compiled unit built from `source`.
    ///
    /// A front end sees more than the bytes: the extension selects the
    /// output format and whether imports are scanned, and external modules
    /// may compile differently from project sources. Identical bytes under
    /// different extensions therefore get different keys.
    pub fn unit_key(path: &Path, external: bool, source: &[u8]) -> ContentHash {
        let extension = path
            .extension()
            .map(|e| e.as_encoded_bytes())
            .unwrap_or_default();
        ContentHash::from_parts([source, extension, &[external as u8][..]])
    }

    /// Computes the unit key of a single file from its current content.
    pub fn hash_file(path: &Path, external: bool) -> Result<ContentHash, CacheError> {
        let content = std::fs::read(path).map_err(|e| CacheError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Self::unit_key(path, external, &content))
    }

    /// Computes unit keys for multiple files, each with its external flag.
    ///
    /// Files that cannot be read are left out of the map.
    pub fn hash_files(files: &[(PathBuf, bool)]) -> HashMap<PathBuf, ContentHash> {
        let mut hashes = HashMap::with_capacity(files.len());
        for (path, external) in files {
            if let Ok(hash) = Self::hash_file(path, *external) {
                hashes.insert(path.clone(), hash);
            }
        }
        hashes
    }

    /// Compares current file hashes against every manifest entry.
    ///
    /// An entry whose path is missing from `current_hashes` counts as deleted.
    pub fn detect_changes(
        current_hashes: &HashMap<PathBuf, ContentHash>,
        manifest: &CacheManifest,
    ) -> ChangeSet {
        let mut changes = ChangeSet::default();

        // BTreeMap iteration keeps each list sorted by key.
        for (key, entry) in &manifest.entries {
            match current_hashes.get(&entry.path) {
                Some(hash) if *hash == entry.source_hash => changes.unchanged.push(key.clone()),
                Some(_) => changes.modified.push(key.clone()),
                None => changes.deleted.push(key.clone()),
            }
        }

        changes
    }
}
