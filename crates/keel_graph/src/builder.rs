//! Graph construction.
//!
//! The builder discovers modules breadth-first from the entries. Each wave of
//! newly discovered modules is compiled in parallel on a bounded worker pool;
//! linking (resolution and node insertion) happens on the calling thread
//! between waves, so the graph itself is never shared mutably.
//!
//! A module whose unit key (source bytes, extension and origin) is already in
//! the blob store is not sent to the front end. A node is inserted in the `InProgress` state when first
//! discovered and any later import of it simply adds an edge, so import
//! cycles terminate without special casing.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use keel_cache::{BlobStore, SourceHasher};
use keel_common::{ContentHash, InternalError};
use keel_config::{ProjectConfig, ProjectLayout};
use rayon::prelude::*;

use crate::error::{CompileError, GraphError, ResolutionError};
use crate::front_end::{CompileRequest, CompiledUnit, FrontEnd, ImportSpecifier};
use crate::graph::ModuleGraph;
use crate::ids::ModuleId;
use crate::node::{Edge, EdgeTarget, ModuleNode, NodeState};
use crate::resolve::{Resolved, Resolver};

/// Settings for a [`GraphBuilder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Module keys are relative to this directory.
    pub project_root: PathBuf,
    /// Entry specifiers resolve here.
    pub source_root: PathBuf,
    /// Bare specifiers resolve here.
    pub packages_root: PathBuf,
    /// Extensions tried during resolution, in priority order.
    pub extensions: Vec<String>,
    /// Maximum number of concurrent front end calls.
    pub concurrency: usize,
    /// Whether compiled units already in the blob store are reused.
    pub reuse_cache: bool,
}

impl BuildOptions {
    /// Derives builder settings from a loaded configuration.
    pub fn new(config: &ProjectConfig, layout: &ProjectLayout) -> Self {
        Self {
            project_root: layout.project_root.clone(),
            source_root: layout.source_root.clone(),
            packages_root: layout.packages_root.clone(),
            extensions: config.build.extensions.clone(),
            concurrency: config.build.concurrency,
            reuse_cache: true,
        }
    }
}

/// A module's compiled unit together with the hash it is stored under.
#[derive(Debug, Clone)]
pub struct CompiledModule {
    /// Unit key of the source the unit was compiled from.
    pub source_hash: ContentHash,
    /// The compiled unit.
    pub unit: CompiledUnit,
    /// Whether the unit came from the blob store.
    pub cache_hit: bool,
}

/// New nodes and failures produced by linking one module.
#[derive(Debug, Default)]
pub struct LinkOutcome {
    /// Nodes inserted while resolving the module's imports.
    pub discovered: Vec<ModuleId>,
    /// Static imports that could not be resolved.
    pub errors: Vec<GraphError>,
}

/// Counters for front end work done by a builder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Modules sent to the front end.
    pub compiled: usize,
    /// Modules served from the blob store.
    pub reused: usize,
}

/// Builds and extends module graphs.
pub struct GraphBuilder {
    resolver: Resolver,
    front_end: Arc<dyn FrontEnd>,
    blobs: BlobStore,
    pool: rayon::ThreadPool,
    reuse_cache: bool,
    compiled: AtomicUsize,
    reused: AtomicUsize,
}

impl GraphBuilder {
    /// Creates a builder with a worker pool of `options.concurrency` threads.
    pub fn new(
        options: BuildOptions,
        front_end: Arc<dyn FrontEnd>,
        blobs: BlobStore,
    ) -> Result<Self, GraphError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.concurrency.max(1))
            .thread_name(|i| format!("keel-compile-{i}"))
            .build()
            .map_err(|e| InternalError::new(format!("cannot start compile workers: {e}")))?;
        Ok(Self {
            resolver: Resolver::new(
                &options.project_root,
                &options.source_root,
                &options.packages_root,
                options.extensions,
            ),
            front_end,
            blobs,
            pool,
            reuse_cache: options.reuse_cache,
            compiled: AtomicUsize::new(0),
            reused: AtomicUsize::new(0),
        })
    }

    /// The resolver used for every specifier.
    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// The blob store compiled units are written to.
    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Front end work done so far.
    pub fn stats(&self) -> BuildStats {
        BuildStats {
            compiled: self.compiled.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
        }
    }

    /// Builds the complete graph reachable from `entries`.
    ///
    /// Every wave runs to completion before failures are reported, so one
    /// broken module does not hide another. Any resolution or compile failure
    /// fails the build.
    pub fn build(&self, entries: &[String]) -> Result<ModuleGraph, GraphError> {
        let mut graph = ModuleGraph::new();
        let wave = self.add_entries(&mut graph, entries)?;
        let failures = self.expand(&mut graph, wave);
        if let Some(err) = GraphError::from_many(failures) {
            return Err(err);
        }
        graph.finalize()?;
        tracing::debug!(modules = graph.len(), "module graph complete");
        Ok(graph)
    }

    /// Resolves `entries` and inserts them as entry nodes.
    ///
    /// Returns the nodes that were newly inserted. Fails if any entry does
    /// not resolve.
    pub fn add_entries(
        &self,
        graph: &mut ModuleGraph,
        entries: &[String],
    ) -> Result<Vec<ModuleId>, GraphError> {
        let mut inserted = Vec::new();
        let mut errors = Vec::new();
        for specifier in entries {
            match self.resolver.resolve_entry(specifier) {
                Ok(resolved) => {
                    let id = intern(graph, resolved, &mut inserted);
                    graph.add_entry(id);
                }
                Err(e) => errors.push(GraphError::from(e)),
            }
        }
        match GraphError::from_many(errors) {
            Some(err) => Err(err),
            None => Ok(inserted),
        }
    }

    /// Compiles and links `wave` and everything it discovers.
    ///
    /// Never stops early: a node that fails to compile is marked
    /// [`NodeState::Failed`], an unresolvable static import becomes an
    /// unresolved edge, and both are returned.
    pub fn expand(&self, graph: &mut ModuleGraph, mut wave: Vec<ModuleId>) -> Vec<GraphError> {
        let mut failures = Vec::new();
        let mut depth = 0usize;

        while !wave.is_empty() {
            tracing::debug!(depth, modules = wave.len(), "compiling wave");
            let results = self.compile_many(graph, &wave);
            let mut next = Vec::new();
            for (id, result) in results {
                match result {
                    Ok(compiled) => {
                        let outcome = self.link(graph, id, &compiled);
                        next.extend(outcome.discovered);
                        failures.extend(outcome.errors);
                    }
                    Err(e) => {
                        graph.get_mut(id).state = NodeState::Failed;
                        failures.push(e);
                    }
                }
            }
            wave = next;
            depth += 1;
        }
        failures
    }

    /// Compiles `ids` in parallel. Results are in the order of `ids`.
    pub fn compile_many(
        &self,
        graph: &ModuleGraph,
        ids: &[ModuleId],
    ) -> Vec<(ModuleId, Result<CompiledModule, GraphError>)> {
        self.pool.install(|| {
            ids.par_iter()
                .map(|&id| (id, self.compile_node(graph.get(id))))
                .collect()
        })
    }

    /// The per-node compile step: hash the source, reuse the stored unit
    /// if there is one, otherwise compile it and store the result.
    pub fn compile_node(&self, node: &ModuleNode) -> Result<CompiledModule, GraphError> {
        let source = std::fs::read(&node.path).map_err(|e| {
            ResolutionError::new(
                &node.key,
                None,
                format!("cannot read {}: {e}", node.path.display()),
            )
        })?;
        let source_hash = SourceHasher::unit_key(&node.path, node.external, &source);

        if self.reuse_cache {
            match self.blobs.get(&source_hash) {
                Ok(Some(blob)) => match CompiledUnit::decode(&blob.payload) {
                    Ok(unit) => {
                        tracing::trace!(key = %node.key, "reused compiled unit");
                        self.reused.fetch_add(1, Ordering::Relaxed);
                        return Ok(CompiledModule {
                            source_hash,
                            unit,
                            cache_hit: true,
                        });
                    }
                    Err(e) => {
                        tracing::warn!(key = %node.key, error = %e, "undecodable compiled unit, recompiling")
                    }
                },
                Ok(None) => {}
                Err(e) if e.is_corruption() => {
                    tracing::warn!(key = %node.key, error = %e, "corrupt blob, recompiling")
                }
                Err(e) => return Err(e.into()),
            }
        }

        let request = CompileRequest {
            key: node.key.clone(),
            path: node.path.clone(),
            source,
            external: node.external,
        };
        self.compiled.fetch_add(1, Ordering::Relaxed);
        let unit = self.front_end.compile(&request).map_err(|f| CompileError {
            key: node.key.clone(),
            path: node.path.clone(),
            message: f.message,
        })?;
        tracing::trace!(key = %node.key, bytes = unit.output.len(), "compiled");

        let encoded = unit
            .encode()
            .map_err(|e| InternalError::new(format!("cannot encode unit for `{}`: {e}", node.key)))?;
        self.blobs.put(&source_hash, unit.format, &encoded)?;
        Ok(CompiledModule {
            source_hash,
            unit,
            cache_hit: false,
        })
    }

    /// Applies a compiled unit to its node: records hashes, resolves the
    /// unit's imports into edges and marks the node ready.
    ///
    /// Replaces any previous edges. Optional imports that do not resolve
    /// become unresolved edges; static ones also produce an error.
    pub fn link(&self, graph: &mut ModuleGraph, id: ModuleId, compiled: &CompiledModule) -> LinkOutcome {
        let (key, path) = {
            let node = graph.get(id);
            (node.key.clone(), node.path.clone())
        };
        let mut outcome = LinkOutcome::default();
        let mut edges = Vec::with_capacity(compiled.unit.imports.len());

        for import in &compiled.unit.imports {
            let kind = import.kind;
            match &import.specifier {
                ImportSpecifier::Literal(specifier) => {
                    match self.resolver.resolve_import(&key, &path, specifier) {
                        Ok(resolved) => {
                            let target = intern(graph, resolved, &mut outcome.discovered);
                            edges.push(Edge {
                                specifier: specifier.clone(),
                                kind,
                                pattern: None,
                                target: EdgeTarget::Module(target),
                            });
                        }
                        Err(e) => {
                            if kind.is_optional() {
                                tracing::debug!(importer = %key, %specifier, "optional import left unresolved");
                            } else {
                                outcome.errors.push(e.into());
                            }
                            edges.push(Edge {
                                specifier: specifier.clone(),
                                kind,
                                pattern: None,
                                target: EdgeTarget::Unresolved,
                            });
                        }
                    }
                }
                ImportSpecifier::Pattern(prefix) => {
                    match self.resolver.expand_pattern(&key, &path, prefix) {
                        Ok(matches) => {
                            for (specifier, resolved) in matches {
                                let target = intern(graph, resolved, &mut outcome.discovered);
                                edges.push(Edge {
                                    specifier,
                                    kind,
                                    pattern: Some(prefix.clone()),
                                    target: EdgeTarget::Module(target),
                                });
                            }
                        }
                        Err(e) => {
                            if !kind.is_optional() {
                                outcome.errors.push(e.into());
                            }
                            edges.push(Edge {
                                specifier: prefix.clone(),
                                kind,
                                pattern: Some(prefix.clone()),
                                target: EdgeTarget::Unresolved,
                            });
                        }
                    }
                }
            }
        }

        let node = graph.get_mut(id);
        node.source_hash = compiled.source_hash;
        node.output_hash = compiled.unit.output_hash();
        node.format = compiled.unit.format;
        node.edges = edges;
        node.state = NodeState::Ready;
        outcome
    }
}

fn intern(graph: &mut ModuleGraph, resolved: Resolved, discovered: &mut Vec<ModuleId>) -> ModuleId {
    let (id, inserted) = graph.insert(ModuleNode::discovered(
        resolved.key,
        resolved.path,
        resolved.external,
        resolved.package,
    ));
    if inserted {
        discovered.push(id);
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::front_end::{CompileFailure, ImportRequest};
    use crate::node::ImportKind;
    use crate::scan::ScanFrontEnd;
    use std::sync::Mutex;

    struct Project {
        dir: tempfile::TempDir,
    }

    impl Project {
        fn new() -> Self {
            Self {
                dir: tempfile::tempdir().unwrap(),
            }
        }

        fn file(&self, rel: &str, content: &str) {
            let path = self.dir.path().join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }

        fn options(&self) -> BuildOptions {
            let root = self.dir.path();
            BuildOptions {
                project_root: root.to_path_buf(),
                source_root: root.join("src"),
                packages_root: root.join("node_modules"),
                extensions: vec!["js".into(), "json".into()],
                concurrency: 4,
                reuse_cache: true,
            }
        }

        fn builder(&self, front_end: Arc<dyn FrontEnd>) -> GraphBuilder {
            GraphBuilder::new(
                self.options(),
                front_end,
                BlobStore::new(&self.dir.path().join(".keel/cache")),
            )
            .unwrap()
        }
    }

    /// Records every compiled key and rejects sources containing `SYNTAX ERROR`.
    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<String>>,
    }

    impl FrontEnd for Recording {
        fn compile(&self, request: &CompileRequest) -> Result<CompiledUnit, CompileFailure> {
            self.seen.lock().unwrap().push(request.key.clone());
            if String::from_utf8_lossy(&request.source).contains("SYNTAX ERROR") {
                return Err(CompileFailure::new("unexpected token"));
            }
            ScanFrontEnd.compile(request)
        }
    }

    #[test]
    fn builds_across_packages() {
        let p = Project::new();
        p.file("src/app.js", "const lib = require('lib');\nrequire('./util');");
        p.file("src/util.js", "module.exports = {};");
        p.file("node_modules/lib/package.json", r#"{"main":"main.js"}"#);
        p.file("node_modules/lib/main.js", "require('./inner');");
        p.file("node_modules/lib/inner.js", "");

        let builder = p.builder(Arc::new(ScanFrontEnd));
        let graph = builder.build(&["app".to_string()]).unwrap();
        assert_eq!(graph.len(), 4);
        let inner = graph.node_by_key("node_modules/lib/inner.js").unwrap();
        assert!(inner.external);
        assert_eq!(inner.package.as_ref().unwrap().name, "lib");
        let app = graph.get(graph.entries()[0]);
        assert_eq!(app.key, "src/app.js");
        assert_eq!(app.edges.len(), 2);
        assert!(graph.iter().all(|(_, n)| n.is_ready()));
    }

    #[test]
    fn cycle_builds_once_per_module() {
        let p = Project::new();
        p.file("src/a.js", "require('./b');");
        p.file("src/b.js", "require('./a');");
        let front_end = Arc::new(Recording::default());
        let builder = p.builder(front_end.clone());
        let graph = builder.build(&["a".to_string()]).unwrap();
        assert_eq!(graph.len(), 2);
        assert_eq!(graph.cycles().len(), 1);
        let mut seen = front_end.seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec!["src/a.js", "src/b.js"]);
    }

    #[test]
    fn same_bytes_under_another_extension_compile_separately() {
        let p = Project::new();
        p.file("src/app.js", "require('./data.txt');\nrequire('./mid');");
        p.file("src/mid.js", "require('./x');");
        p.file("src/data.txt", "require('./y');");
        p.file("src/x.js", "require('./y');");
        p.file("src/y.js", "");

        let builder = p.builder(Arc::new(ScanFrontEnd));
        let graph = builder.build(&["app".to_string()]).unwrap();
        let data = graph.node_by_key("src/data.txt").unwrap();
        let x = graph.node_by_key("src/x.js").unwrap();
        assert!(data.edges.is_empty());
        assert_eq!(x.edges.len(), 1);
        assert_ne!(data.source_hash, x.source_hash);
        assert_eq!(data.format, keel_cache::FormatTag::Asset);
        assert_eq!(x.format, keel_cache::FormatTag::Script);
        assert!(graph.lookup("src/y.js").is_some());
        assert_eq!(builder.stats(), BuildStats { compiled: 5, reused: 0 });
    }

    #[test]
    fn second_build_hits_the_store() {
        let p = Project::new();
        p.file("src/a.js", "require('./b');");
        p.file("src/b.js", "");
        let front_end = Arc::new(Recording::default());

        p.builder(front_end.clone()).build(&["a".to_string()]).unwrap();
        let builder = p.builder(front_end.clone());
        builder.build(&["a".to_string()]).unwrap();
        assert_eq!(front_end.seen.lock().unwrap().len(), 2);
        assert_eq!(builder.stats(), BuildStats { compiled: 0, reused: 2 });
    }

    #[test]
    fn disabled_reuse_always_compiles() {
        let p = Project::new();
        p.file("src/a.js", "");
        let front_end = Arc::new(Recording::default());
        p.builder(front_end.clone()).build(&["a".to_string()]).unwrap();

        let mut options = p.options();
        options.reuse_cache = false;
        let builder = GraphBuilder::new(
            options,
            front_end.clone(),
            BlobStore::new(&p.dir.path().join(".keel/cache")),
        )
        .unwrap();
        builder.build(&["a".to_string()]).unwrap();
        assert_eq!(builder.stats().compiled, 1);
        assert_eq!(front_end.seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn unresolved_static_import_fails() {
        let p = Project::new();
        p.file("src/app.js", "require('./missing');");
        let err = p
            .builder(Arc::new(ScanFrontEnd))
            .build(&["app".to_string()])
            .unwrap_err();
        match err {
            GraphError::Resolution(e) => {
                assert_eq!(e.specifier, "./missing");
                assert_eq!(e.importer.as_deref(), Some("src/app.js"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unresolved_conditional_import_is_an_edge() {
        let p = Project::new();
        p.file(
            "src/app.js",
            "try { require('optionalFeature'); } catch (e) {}",
        );
        let graph = p
            .builder(Arc::new(ScanFrontEnd))
            .build(&["app".to_string()])
            .unwrap();
        let unresolved: Vec<_> = graph.unresolved_edges().collect();
        assert_eq!(unresolved.len(), 1);
        assert_eq!(unresolved[0].1.kind, ImportKind::Conditional);
    }

    #[test]
    fn unresolved_entry_fails() {
        let p = Project::new();
        p.file("src/app.js", "");
        let err = p
            .builder(Arc::new(ScanFrontEnd))
            .build(&["app".to_string(), "nope".to_string()])
            .unwrap_err();
        assert!(matches!(err, GraphError::Resolution(ref e) if e.importer.is_none()));
    }

    #[test]
    fn every_failure_in_a_wave_is_reported() {
        let p = Project::new();
        p.file("src/app.js", "require('./a'); require('./b'); require('./c');");
        p.file("src/a.js", "SYNTAX ERROR");
        p.file("src/b.js", "");
        p.file("src/c.js", "SYNTAX ERROR");
        let front_end = Arc::new(Recording::default());
        let err = p
            .builder(front_end.clone())
            .build(&["app".to_string()])
            .unwrap_err();
        let mut keys: Vec<String> = err
            .flatten()
            .iter()
            .filter_map(|e| e.module_key().map(str::to_string))
            .collect();
        keys.sort();
        assert_eq!(keys, vec!["src/a.js", "src/c.js"]);
        assert!(front_end.seen.lock().unwrap().contains(&"src/b.js".to_string()));
    }

    #[test]
    fn expand_marks_failed_nodes() {
        let p = Project::new();
        p.file("src/app.js", "require('./bad');");
        p.file("src/bad.js", "SYNTAX ERROR");
        let builder = p.builder(Arc::new(Recording::default()));
        let mut graph = ModuleGraph::new();
        let wave = builder.add_entries(&mut graph, &["app".to_string()]).unwrap();
        let failures = builder.expand(&mut graph, wave);
        assert_eq!(failures.len(), 1);
        assert_eq!(
            graph.node_by_key("src/bad.js").unwrap().state,
            NodeState::Failed
        );
        assert!(graph.node_by_key("src/app.js").unwrap().is_ready());
    }

    #[test]
    fn dynamic_pattern_expands() {
        let p = Project::new();
        p.file("src/app.js", "const m = import(`./locale/${lang}`);");
        p.file("src/locale/en.js", "");
        p.file("src/locale/de.js", "");
        let graph = p
            .builder(Arc::new(ScanFrontEnd))
            .build(&["app".to_string()])
            .unwrap();
        let app = graph.node_by_key("src/app.js").unwrap();
        let specs: Vec<_> = app.edges.iter().map(|e| e.specifier.as_str()).collect();
        assert_eq!(specs, vec!["./locale/de.js", "./locale/en.js"]);
        assert!(app
            .edges
            .iter()
            .all(|e| e.pattern.as_deref() == Some("./locale/")));
    }

    #[test]
    fn link_replaces_edges() {
        let p = Project::new();
        p.file("src/app.js", "require('./a');");
        p.file("src/a.js", "");
        p.file("src/b.js", "");
        let builder = p.builder(Arc::new(ScanFrontEnd));
        let mut graph = builder.build(&["app".to_string()]).unwrap();
        let app = graph.lookup("src/app.js").unwrap();

        let compiled = CompiledModule {
            source_hash: ContentHash::from_bytes(b"new"),
            unit: CompiledUnit {
                output: b"new".to_vec(),
                format: keel_cache::FormatTag::Script,
                imports: vec![ImportRequest::literal("./b", ImportKind::Static)],
            },
            cache_hit: false,
        };
        let outcome = builder.link(&mut graph, app, &compiled);
        assert_eq!(outcome.discovered.len(), 1);
        assert!(outcome.errors.is_empty());
        let deps: Vec<_> = graph
            .get(app)
            .dependencies()
            .map(|d| graph.get(d).key.clone())
            .collect();
        assert_eq!(deps, vec!["src/b.js"]);
        assert_eq!(graph.get(app).output_hash, ContentHash::from_bytes(b"new"));
    }
}
