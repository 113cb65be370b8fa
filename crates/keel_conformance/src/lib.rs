//! Shared fixtures for keel's end-to-end tests.
//!
//! A [`Fixture`] is a throwaway project directory with a `keel.toml`. A
//! [`ScriptedFrontEnd`] compiles a tiny line language, so each test can
//! state its module graph directly in the source files:
//!
//! ```text
//! import ./service     static import
//! maybe optional-dep   conditional import
//! dynamic ./locale/    dynamic import with a computed specifier
//! // note              dropped from the output
//! anything else        copied to the output
//! ```

#![warn(missing_docs)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use keel_cache::FormatTag;
use keel_config::{load_config, resolve_layout, ProjectConfig, ProjectLayout, CONFIG_FILE};
use keel_graph::{CompileFailure, CompileRequest, CompiledUnit, FrontEnd, ImportKind, ImportRequest};
use tempfile::TempDir;

/// A project on disk that lives as long as the value.
pub struct Fixture {
    dir: TempDir,
}

impl Fixture {
    /// Creates a project whose `keel.toml` has the given entries and
    /// extra top-level settings.
    pub fn new(entries: &[&str], settings: &str) -> Self {
        let dir = tempfile::tempdir().expect("create fixture directory");
        let fixture = Self { dir };
        let entries: Vec<String> = entries.iter().map(|e| format!("\"{e}\"")).collect();
        fixture.write(
            CONFIG_FILE,
            &format!(
                "entries = [{}]\n{settings}\n[project]\nname = \"fixture\"\n",
                entries.join(", ")
            ),
        );
        fixture
    }

    /// Writes `content` to `rel`, creating parent directories.
    pub fn write(&self, rel: &str, content: &str) -> &Self {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create fixture subdirectory");
        }
        std::fs::write(&path, content).expect("write fixture file");
        self
    }

    /// Writes an installed package with a `package.json` and an `index.js`.
    pub fn package(&self, name: &str, index: &str) -> &Self {
        self.write(
            &format!("node_modules/{name}/package.json"),
            &format!("{{\"name\":\"{name}\",\"main\":\"index.js\"}}\n"),
        );
        self.write(&format!("node_modules/{name}/index.js"), index)
    }

    /// Deletes `rel`.
    pub fn remove(&self, rel: &str) {
        std::fs::remove_file(self.path(rel)).expect("remove fixture file");
    }

    /// Absolute path of `rel`.
    pub fn path(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// The project root.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Loads `keel.toml` and resolves the project layout.
    pub fn load(&self) -> (ProjectConfig, ProjectLayout) {
        let config = load_config(self.root()).expect("load fixture config");
        let layout = resolve_layout(&config, self.root(), None);
        (config, layout)
    }
}

/// Front end for the fixture line language, with call counting and
/// injected failures.
#[derive(Default)]
pub struct ScriptedFrontEnd {
    calls: Mutex<BTreeMap<String, usize>>,
    failing: Mutex<BTreeSet<String>>,
}

impl ScriptedFrontEnd {
    /// Creates a front end that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later compile of `key` fail.
    pub fn fail(&self, key: &str) {
        self.failing.lock().unwrap().insert(key.to_string());
    }

    /// Stops failing `key`.
    pub fn heal(&self, key: &str) {
        self.failing.lock().unwrap().remove(key);
    }

    /// How many times `key` was compiled.
    pub fn calls(&self, key: &str) -> usize {
        self.calls.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    /// Total compiles across all modules.
    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }
}

impl FrontEnd for ScriptedFrontEnd {
    fn compile(&self, request: &CompileRequest) -> Result<CompiledUnit, CompileFailure> {
        *self.calls.lock().unwrap().entry(request.key.clone()).or_default() += 1;
        if self.failing.lock().unwrap().contains(&request.key) {
            return Err(CompileFailure::new(format!("{}: injected failure", request.key)));
        }
        let text = std::str::from_utf8(&request.source)
            .map_err(|e| CompileFailure::new(format!("source is not UTF-8: {e}")))?;

        let mut output = String::new();
        let mut imports = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if let Some(spec) = line.strip_prefix("import ") {
                imports.push(ImportRequest::literal(spec.trim(), ImportKind::Static));
            } else if let Some(spec) = line.strip_prefix("maybe ") {
                imports.push(ImportRequest::literal(spec.trim(), ImportKind::Conditional));
            } else if let Some(prefix) = line.strip_prefix("dynamic ") {
                imports.push(ImportRequest::pattern(prefix.trim()));
            } else if line.starts_with("//") {
                continue;
            }
            output.push_str(line);
            output.push('\n');
        }

        Ok(CompiledUnit {
            output: output.into_bytes(),
            format: FormatTag::Script,
            imports,
        })
    }
}
