//! Layout resolution: turning configured relative paths into absolute ones.

use crate::types::ProjectConfig;
use std::path::{Path, PathBuf};

/// Absolute directories a build operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    /// The directory containing `keel.toml`. Module identities are relative to it.
    pub project_root: PathBuf,
    /// Where entry specifiers resolve.
    pub source_root: PathBuf,
    /// Where bare package specifiers resolve.
    pub packages_root: PathBuf,
    /// Where the standalone tree is written.
    pub out_dir: PathBuf,
    /// Where the incremental cache persists.
    pub cache_dir: PathBuf,
}

/// Resolves the configured directories against the project root.
///
/// `out_dir_override` (from the command line) replaces `build.outDir`.
/// Absolute configured paths are kept as they are.
pub fn resolve_layout(
    config: &ProjectConfig,
    project_root: &Path,
    out_dir_override: Option<&Path>,
) -> ProjectLayout {
    let join = |p: &Path| {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            project_root.join(p)
        }
    };

    ProjectLayout {
        project_root: project_root.to_path_buf(),
        source_root: join(&config.build.source_dir),
        packages_root: join(&config.build.packages_dir),
        out_dir: join(out_dir_override.unwrap_or(&config.build.out_dir)),
        cache_dir: join(&config.build.cache_dir),
    }
}
