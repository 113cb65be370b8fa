//! Specifier resolution.
//!
//! Maps import specifiers to source files in a fixed priority order: the
//! exact path, the path with each configured extension appended, a
//! directory index file, and finally a package's declared `main` entry.
//! The first candidate that exists wins.

use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

use crate::error::ResolutionError;
use crate::node::PackageRef;

/// A specifier mapped to a source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Module key: the normalized path relative to the project root.
    pub key: String,
    /// Absolute source path.
    pub path: PathBuf,
    /// Whether the file lies in the packages directory.
    pub external: bool,
    /// Owning package for external files.
    pub package: Option<PackageRef>,
}

#[derive(Deserialize)]
struct PackageManifest {
    main: Option<String>,
}

/// Resolves entry and import specifiers for one project.
#[derive(Debug, Clone)]
pub struct Resolver {
    project_root: PathBuf,
    source_root: PathBuf,
    packages_root: PathBuf,
    extensions: Vec<String>,
}

impl Resolver {
    /// Creates a resolver. All roots are normalized lexically.
    pub fn new(
        project_root: &Path,
        source_root: &Path,
        packages_root: &Path,
        extensions: Vec<String>,
    ) -> Self {
        Self {
            project_root: normalize(project_root),
            source_root: normalize(source_root),
            packages_root: normalize(packages_root),
            extensions,
        }
    }

    /// Returns the configured extensions, without leading dots.
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Resolves an entry specifier against the source directory.
    pub fn resolve_entry(&self, specifier: &str) -> Result<Resolved, ResolutionError> {
        let base = self.source_root.join(specifier);
        let path = self
            .resolve_path(&base)
            .ok_or_else(|| ResolutionError::new(specifier, None, "no matching file in the source directory"))?;
        self.resolved(path, specifier, None)
    }

    /// Resolves `specifier` as imported by the module at `importer_path`.
    pub fn resolve_import(
        &self,
        importer_key: &str,
        importer_path: &Path,
        specifier: &str,
    ) -> Result<Resolved, ResolutionError> {
        let error = |reason: &str| ResolutionError::new(specifier, Some(importer_key), reason);

        if specifier.is_empty() {
            return Err(error("empty specifier"));
        }
        if is_relative(specifier) {
            let dir = importer_path.parent().unwrap_or(&self.project_root);
            let base = normalize(&dir.join(specifier));
            let path = self.resolve_path(&base).ok_or_else(|| error("no matching file"))?;
            return self.resolved(path, specifier, Some(importer_key));
        }
        if Path::new(specifier).is_absolute() {
            return Err(error("absolute specifiers are not supported"));
        }

        let (name, subpath) = split_package(specifier).ok_or_else(|| error("malformed package specifier"))?;
        let package_dir = self.packages_root.join(name);
        if !package_dir.is_dir() {
            return Err(error(&format!("package `{name}` is not installed")));
        }
        let path = match subpath {
            Some(sub) => self.resolve_path(&normalize(&package_dir.join(sub))),
            None => self.resolve_path(&package_dir),
        }
        .ok_or_else(|| error(&format!("no matching file in package `{name}`")))?;
        self.resolved(path, specifier, Some(importer_key))
    }

    /// Lists the files a non-literal import with the static `prefix` may load.
    ///
    /// Only relative prefixes are expanded. Returns every file directly in
    /// the prefix's directory whose name starts with the prefix's last
    /// segment and whose extension is configured, sorted by key. The
    /// returned specifiers are relative to the importer.
    pub fn expand_pattern(
        &self,
        importer_key: &str,
        importer_path: &Path,
        prefix: &str,
    ) -> Result<Vec<(String, Resolved)>, ResolutionError> {
        let error = |reason: &str| ResolutionError::new(prefix, Some(importer_key), reason);
        if !is_relative(prefix) {
            return Err(error("only relative dynamic import patterns can be expanded"));
        }

        let (dir_part, stem) = match prefix.rfind('/') {
            Some(i) => (&prefix[..=i], &prefix[i + 1..]),
            None => (prefix, ""),
        };
        let importer_dir = importer_path.parent().unwrap_or(&self.project_root);
        let dir = normalize(&importer_dir.join(dir_part));
        let listing = std::fs::read_dir(&dir).map_err(|e| error(&format!("cannot list {}: {e}", dir.display())))?;

        let mut matches = Vec::new();
        for entry in listing.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !file_name.starts_with(stem) || path == normalize(importer_path) {
                continue;
            }
            let ext_ok = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| self.extensions.iter().any(|x| x == e));
            if !ext_ok {
                continue;
            }
            let specifier = format!("{dir_part}{file_name}");
            let resolved = self.resolved(path, &specifier, Some(importer_key))?;
            matches.push((specifier, resolved));
        }
        matches.sort_by(|a, b| a.1.key.cmp(&b.1.key));
        if matches.is_empty() {
            return Err(error("pattern matches no files"));
        }
        Ok(matches)
    }

    /// Computes the key of an absolute path, failing if it is outside the
    /// project root.
    pub fn key_for(&self, path: &Path) -> Option<String> {
        let relative = normalize(path).strip_prefix(&self.project_root).ok()?.to_path_buf();
        let parts: Vec<&str> = relative
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect();
        if parts.is_empty() {
            return None;
        }
        Some(parts.join("/"))
    }

    fn resolved(
        &self,
        path: PathBuf,
        specifier: &str,
        importer: Option<&str>,
    ) -> Result<Resolved, ResolutionError> {
        let path = normalize(&path);
        let key = self
            .key_for(&path)
            .ok_or_else(|| ResolutionError::new(specifier, importer, "resolves outside the project root"))?;
        let package = self.package_for(&path);
        Ok(Resolved {
            key,
            external: package.is_some(),
            package,
            path,
        })
    }

    fn package_for(&self, path: &Path) -> Option<PackageRef> {
        let relative = path.strip_prefix(&self.packages_root).ok()?;
        let mut parts = relative.components().filter_map(|c| match c {
            Component::Normal(s) => s.to_str(),
            _ => None,
        });
        let first = parts.next()?;
        let name = if first.starts_with('@') {
            format!("{first}/{}", parts.next()?)
        } else {
            first.to_string()
        };
        let root = self.key_for(&self.packages_root.join(&name))?;
        Some(PackageRef { name, root })
    }

    /// exact file, then `<base>.<ext>`, then `<base>/index.<ext>`, then the
    /// `main` field of `<base>/package.json`.
    fn resolve_path(&self, base: &Path) -> Option<PathBuf> {
        if let Some(found) = self.resolve_file_or_index(base) {
            return Some(found);
        }
        let manifest = base.join("package.json");
        let content = std::fs::read_to_string(manifest).ok()?;
        let parsed: PackageManifest = serde_json::from_str(&content).ok()?;
        let main = parsed.main.unwrap_or_else(|| "index.js".to_string());
        self.resolve_file_or_index(&normalize(&base.join(main)))
    }

    fn resolve_file_or_index(&self, base: &Path) -> Option<PathBuf> {
        if base.is_file() {
            return Some(base.to_path_buf());
        }
        for ext in &self.extensions {
            let mut candidate = base.as_os_str().to_owned();
            candidate.push(".");
            candidate.push(ext);
            let candidate = PathBuf::from(candidate);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        if base.is_dir() {
            for ext in &self.extensions {
                let candidate = base.join(format!("index.{ext}"));
                if candidate.is_file() {
                    return Some(candidate);
                }
            }
        }
        None
    }
}

fn is_relative(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
}

/// Splits `@scope/name/sub` or `name/sub` into package name and subpath.
fn split_package(specifier: &str) -> Option<(&str, Option<&str>)> {
    let name_end = if specifier.starts_with('@') {
        let slash = specifier.find('/')?;
        specifier[slash + 1..].find('/').map(|i| slash + 1 + i)
    } else {
        specifier.find('/')
    };
    match name_end {
        Some(end) => {
            let sub = &specifier[end + 1..];
            Some((&specifier[..end], (!sub.is_empty()).then_some(sub)))
        }
        None => Some((specifier, None)),
    }
}

/// Normalizes `.` and `..` components without touching the file system.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
