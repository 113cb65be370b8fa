//! Writing the standalone output tree.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use keel_cache::BlobStore;
use keel_common::{ContentHash, KEEL_VERSION};
use keel_graph::{load_output, ModuleGraph, ModuleId, NodeState};
use keel_prune::ReachabilitySet;

use crate::entrypoint::render_entrypoint;
use crate::error::AssemblyError;
use crate::manifest::{AssemblyManifest, FileOrigin, WrittenFile, ASSEMBLY_MANIFEST};

/// Default name of the synthesized entrypoint.
pub const DEFAULT_ENTRYPOINT: &str = "server.js";

/// Summary of one assembly run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyResult {
    /// The output root.
    pub out_dir: PathBuf,
    /// Every file in the tree, sorted by path. Excludes the manifest.
    pub files: Vec<WrittenFile>,
    /// Files whose contents changed or that did not exist before.
    pub written: usize,
    /// Files left over from the previous assembly that were deleted.
    pub removed: Vec<String>,
}

struct PlannedFile {
    origin: FileOrigin,
    bytes: Vec<u8>,
}

/// Copies compiled outputs and runtime metadata into an output directory.
pub struct Assembler<'a> {
    blobs: &'a BlobStore,
    project_root: PathBuf,
    entrypoint: String,
}

impl<'a> Assembler<'a> {
    /// Creates an assembler reading compiled units from `blobs` and package
    /// manifests from below `project_root`.
    pub fn new(blobs: &'a BlobStore, project_root: &Path) -> Self {
        Self {
            blobs,
            project_root: project_root.to_path_buf(),
            entrypoint: DEFAULT_ENTRYPOINT.to_string(),
        }
    }

    /// Sets the entrypoint file name.
    pub fn with_entrypoint(mut self, name: impl Into<String>) -> Self {
        self.entrypoint = name.into();
        self
    }

    /// Writes every reachable module, the manifests of used packages and an
    /// entrypoint into `out_root`.
    ///
    /// Idempotent: files whose contents are already correct are not
    /// rewritten, files the previous assembly wrote that are no longer part
    /// of the output are removed, and nothing in the tree depends on time.
    pub fn assemble(
        &self,
        graph: &ModuleGraph,
        set: &ReachabilitySet,
        out_root: &Path,
    ) -> Result<AssemblyResult, AssemblyError> {
        let mut plan = self.plan_modules(graph, set.reachable.iter().copied())?;

        for package in &set.used_packages {
            let source = self.project_root.join(&package.root).join("package.json");
            match std::fs::read(&source) {
                Ok(bytes) => insert(
                    &mut plan,
                    format!("{}/package.json", package.root),
                    FileOrigin::PackageManifest {
                        package: package.name.clone(),
                    },
                    bytes,
                )?,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(package = %package.name, "package has no package.json")
                }
                Err(e) => return Err(AssemblyError::io(source, e)),
            }
        }

        let entry_keys: Vec<String> = set
            .entries
            .iter()
            .map(|&id| graph.get(id).key.clone())
            .collect();
        insert(
            &mut plan,
            self.entrypoint.clone(),
            FileOrigin::Entrypoint,
            render_entrypoint(&entry_keys).into_bytes(),
        )?;

        self.write_tree(plan, out_root, Some(self.entrypoint.clone()))
    }

    /// Writes only the compiled outputs of the graph's own (non-package)
    /// modules. Used when packages are installed at deploy time instead of
    /// being copied.
    pub fn assemble_internal(
        &self,
        graph: &ModuleGraph,
        out_root: &Path,
    ) -> Result<AssemblyResult, AssemblyError> {
        let internal = graph
            .iter()
            .filter(|(_, node)| !node.external)
            .map(|(id, _)| id);
        let plan = self.plan_modules(graph, internal)?;
        self.write_tree(plan, out_root, None)
    }

    fn plan_modules(
        &self,
        graph: &ModuleGraph,
        ids: impl Iterator<Item = ModuleId>,
    ) -> Result<BTreeMap<String, PlannedFile>, AssemblyError> {
        let mut plan = BTreeMap::new();
        for id in ids {
            let node = graph.get(id);
            if node.state != NodeState::Ready {
                return Err(AssemblyError::NotReady {
                    key: node.key.clone(),
                });
            }
            let bytes = load_output(self.blobs, &node.source_hash)?.ok_or_else(|| {
                AssemblyError::MissingOutput {
                    key: node.key.clone(),
                }
            })?;
            insert(
                &mut plan,
                node.key.clone(),
                FileOrigin::Module {
                    key: node.key.clone(),
                },
                bytes,
            )?;
        }
        Ok(plan)
    }

    fn write_tree(
        &self,
        plan: BTreeMap<String, PlannedFile>,
        out_root: &Path,
        entrypoint: Option<String>,
    ) -> Result<AssemblyResult, AssemblyError> {
        std::fs::create_dir_all(out_root).map_err(|e| AssemblyError::io(out_root, e))?;

        let mut removed = Vec::new();
        if let Some(previous) = AssemblyManifest::load(out_root) {
            for stale in previous.files.iter().filter(|f| !plan.contains_key(&f.path)) {
                if !is_plain_relative(&stale.path) {
                    tracing::warn!(path = %stale.path, "ignoring manifest entry outside the output directory");
                    continue;
                }
                let path = out_root.join(&stale.path);
                match std::fs::remove_file(&path) {
                    Ok(()) => {
                        remove_empty_parents(out_root, &path);
                        removed.push(stale.path.clone());
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(AssemblyError::io(path, e)),
                }
            }
        }

        let mut files = Vec::with_capacity(plan.len());
        let mut written = 0;
        for (relative, planned) in plan {
            let path = out_root.join(&relative);
            if write_if_changed(&path, &planned.bytes)? {
                written += 1;
            }
            files.push(WrittenFile {
                path: relative,
                origin: planned.origin,
                hash: ContentHash::from_bytes(&planned.bytes),
                size: planned.bytes.len() as u64,
            });
        }

        let manifest = AssemblyManifest {
            keel_version: KEEL_VERSION.to_string(),
            entrypoint,
            files,
        };
        let json = manifest.to_json().map_err(|e| AssemblyError::Serialization {
            reason: e.to_string(),
        })?;
        write_if_changed(&out_root.join(ASSEMBLY_MANIFEST), json.as_bytes())?;

        tracing::debug!(
            files = manifest.files.len(),
            written,
            removed = removed.len(),
            out = %out_root.display(),
            "assembled output tree"
        );
        Ok(AssemblyResult {
            out_dir: out_root.to_path_buf(),
            files: manifest.files,
            written,
            removed,
        })
    }
}

fn insert(
    plan: &mut BTreeMap<String, PlannedFile>,
    path: String,
    origin: FileOrigin,
    bytes: Vec<u8>,
) -> Result<(), AssemblyError> {
    if path == ASSEMBLY_MANIFEST || plan.contains_key(&path) {
        return Err(AssemblyError::Conflict { path });
    }
    plan.insert(path, PlannedFile { origin, bytes });
    Ok(())
}

/// Atomically replaces `path` with `bytes` unless it already holds them.
/// Returns `true` if the file was written.
fn write_if_changed(path: &Path, bytes: &[u8]) -> Result<bool, AssemblyError> {
    if std::fs::read(path).is_ok_and(|existing| existing == bytes) {
        return Ok(false);
    }
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(|e| AssemblyError::io(dir, e))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| AssemblyError::io(dir, e))?;
    tmp.write_all(bytes).map_err(|e| AssemblyError::io(path, e))?;
    tmp.persist(path).map_err(|e| AssemblyError::io(path, e.error))?;
    Ok(true)
}

/// Whether `relative` only descends from the root: no `..`, no `.`, no
/// root or prefix component.
fn is_plain_relative(relative: &str) -> bool {
    let path = Path::new(relative);
    path.components().next().is_some() && path.components().all(|c| matches!(c, Component::Normal(_)))
}

/// Removes directories left empty below `root` after deleting `file`.
fn remove_empty_parents(root: &Path, file: &Path) {
    let mut dir = file.parent();
    while let Some(current) = dir {
        if current == root || !current.starts_with(root) {
            break;
        }
        // Fails (and stops) on the first non-empty directory.
        if std::fs::remove_dir(current).is_err() {
            break;
        }
        dir = current.parent();
    }
}

/// Lists every regular file below `root` relative to it, sorted. Used to
/// compare trees.
pub fn list_tree(root: &Path) -> std::io::Result<BTreeSet<String>> {
    fn walk(root: &Path, dir: &Path, out: &mut BTreeSet<String>) -> std::io::Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                walk(root, &path, out)?;
            } else if let Ok(relative) = path.strip_prefix(root) {
                let parts: Vec<_> = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect();
                out.insert(parts.join("/"));
            }
        }
        Ok(())
    }
    let mut out = BTreeSet::new();
    walk(root, root, &mut out)?;
    Ok(out)
}
