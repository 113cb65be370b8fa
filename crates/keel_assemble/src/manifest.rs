//! The assembly manifest written next to the output tree.
//!
//! `keel-assembly.json` lists every file the last assembly produced. The next
//! assembly uses it to delete files that are no longer part of the output.

use std::path::Path;

use keel_common::ContentHash;
use serde::{Deserialize, Serialize};

/// File name of the assembly manifest in the output root.
pub const ASSEMBLY_MANIFEST: &str = "keel-assembly.json";

/// Where a written file came from.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FileOrigin {
    /// Compiled output of a module.
    Module {
        /// Module key.
        key: String,
    },
    /// A package manifest needed by the runtime loader.
    PackageManifest {
        /// Package name.
        package: String,
    },
    /// The synthesized entrypoint.
    Entrypoint,
}

/// One file in the output tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrittenFile {
    /// Path relative to the output root, `/`-separated.
    pub path: String,
    /// What produced the file.
    pub origin: FileOrigin,
    /// Hash of the file contents.
    pub hash: ContentHash,
    /// Size in bytes.
    pub size: u64,
}

/// Contents of `keel-assembly.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssemblyManifest {
    /// keel version that wrote the tree.
    pub keel_version: String,
    /// Entrypoint file name, if one was written.
    pub entrypoint: Option<String>,
    /// Every file, sorted by path.
    pub files: Vec<WrittenFile>,
}

impl AssemblyManifest {
    /// Reads the manifest of a previous assembly. A missing or unreadable
    /// manifest yields `None`; the tree is then treated as foreign and left
    /// alone apart from the files being written.
    pub fn load(out_root: &Path) -> Option<Self> {
        let content = std::fs::read_to_string(out_root.join(ASSEMBLY_MANIFEST)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Serializes the manifest with a trailing newline.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }
}
