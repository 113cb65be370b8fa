//! The incremental cache/invalidation engine.
//!
//! One pass turns a batch of file changes into a minimal rebuild:
//!
//! 1. **Invalidating.** Each changed path maps to the modules it backs.
//!    Those modules, previously failed modules and the importers of deleted
//!    modules seed an [`InvalidationFrontier`], which is then closed over
//!    the cache's reverse edges. The frontier is complete before anything is
//!    rebuilt.
//! 2. **Rebuilding.** The frontier is ordered into levels of strongly
//!    connected components, dependencies first. A component is recompiled
//!    if it was invalidated directly or if a module it imports produced new
//!    output earlier in this pass; otherwise it is skipped. Components of
//!    one level compile in parallel. Between levels the event queue is
//!    polled, and modules whose file has since been deleted are cancelled.
//! 3. **Idle.** Newly discovered modules are built, modules no longer
//!    reachable from any entry are dropped, and the cache is written back.
//!
//! A module that fails to compile keeps its last good output, is marked
//! with the error in its cache entry and is retried on every later pass.
//! It never stops its siblings from rebuilding.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use keel_cache::{Cache, CacheEntry};
use keel_config::{DevBundlerMode, ProjectConfig, ProjectLayout};
use keel_graph::resolve::normalize;
use keel_graph::{
    load_output, BuildOptions, FrontEnd, GraphBuilder, GraphError, ModuleGraph, ModuleId, NodeState,
};
use keel_prune::prune;

use crate::error::DevError;
use crate::event::{ChangeKind, EventQueue};
use crate::frontier::InvalidationFrontier;
use crate::report::{EngineState, PassReport, StartupReport};
use crate::session::DevBundler;

/// Cache-backed engine that recompiles only what a change invalidates.
pub struct IncrementalEngine {
    builder: GraphBuilder,
    graph: ModuleGraph,
    cache: Cache,
    state: EngineState,
}

impl IncrementalEngine {
    /// Opens the project's cache and builds the graph from the configured
    /// entries. Sources whose hash is still in the store are not recompiled.
    ///
    /// Fails if an entry does not resolve or the cache directory is unusable.
    /// Modules that fail to compile do not fail the startup.
    pub fn open(
        config: &ProjectConfig,
        layout: &ProjectLayout,
        front_end: Arc<dyn FrontEnd>,
    ) -> Result<(Self, StartupReport), DevError> {
        let (cache, opened) = Cache::open(&layout.cache_dir, config.fingerprint())?;
        let stale = cache.detect_changes();
        if !stale.is_empty() {
            tracing::debug!(
                modified = stale.modified.len(),
                deleted = stale.deleted.len(),
                "sources changed since the last session"
            );
        }

        let builder = GraphBuilder::new(
            BuildOptions::new(config, layout),
            front_end,
            cache.blobs().clone(),
        )?;
        let mut graph = ModuleGraph::new();
        let wave = builder.add_entries(&mut graph, &config.entries)?;
        let mut failed = BTreeMap::new();
        record_failures(&mut failed, builder.expand(&mut graph, wave))?;

        let mut engine = Self {
            builder,
            graph,
            cache,
            state: EngineState::Idle,
        };
        let everything: BTreeSet<String> = engine.graph.iter().map(|(_, n)| n.key.clone()).collect();
        engine.sync_cache(&everything, &failed);
        engine.cache.save()?;

        let report = StartupReport {
            cache: Some(opened),
            stale,
            modules: engine.graph.len(),
            stats: engine.builder.stats(),
            failed,
        };
        tracing::debug!(
            modules = report.modules,
            compiled = report.stats.compiled,
            reused = report.stats.reused,
            "incremental engine ready"
        );
        Ok((engine, report))
    }

    /// The persisted cache.
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// The builder used for every compile.
    pub fn builder(&self) -> &GraphBuilder {
        &self.builder
    }

    fn transition(&mut self, next: EngineState) {
        tracing::debug!(from = %self.state, to = %next, "engine state");
        self.state = next;
    }

    fn key(&self, id: ModuleId) -> String {
        self.graph.get(id).key.clone()
    }

    /// Runs one pass over every change pending in `queue`.
    pub fn run_pass(&mut self, queue: &mut EventQueue) -> Result<PassReport, DevError> {
        queue.poll();
        let batch = queue.take_batch();
        let mut report = PassReport::default();

        self.transition(EngineState::Invalidating);
        let mut frontier = InvalidationFrontier::new();
        let mut deleted: BTreeSet<String> = BTreeSet::new();
        let mut created = false;

        for event in &batch {
            let path = normalize(&event.path);
            let ids = self.graph.modules_at(&path).to_vec();
            match event.kind {
                ChangeKind::Deleted => {
                    for id in ids {
                        deleted.insert(self.key(id));
                        for importer in self.graph.importers(id) {
                            frontier.seed(self.key(importer));
                        }
                    }
                }
                ChangeKind::Created | ChangeKind::Modified => {
                    created |= event.kind == ChangeKind::Created;
                    for id in ids {
                        frontier.seed(self.key(id));
                    }
                }
            }
        }

        // A new file may satisfy an import that did not resolve before.
        if created {
            let importers: BTreeSet<ModuleId> = self.graph.unresolved_edges().map(|(id, _)| id).collect();
            for id in importers {
                frontier.seed(self.key(id));
            }
        }
        for (key, entry) in self.cache.entries() {
            if entry.is_errored() {
                frontier.seed(key.clone());
            }
        }
        for (_, node) in self.graph.iter() {
            if node.state == NodeState::Failed {
                frontier.seed(node.key.clone());
            }
        }

        let added = frontier.close(&self.cache.manifest().entries);
        for key in &deleted {
            frontier.remove(key);
        }
        tracing::debug!(
            events = batch.len(),
            seeds = frontier.seeds().len(),
            dependents = added,
            "frontier closed"
        );
        report.frontier = frontier.keys().clone();

        if frontier.is_empty() && deleted.is_empty() {
            self.transition(EngineState::Idle);
            return Ok(report);
        }

        self.transition(EngineState::Rebuilding);
        let known_before = self.graph.len();
        let mut failed: BTreeMap<String, String> = BTreeMap::new();
        let discovered = self.rebuild(&frontier, queue, &mut report, &mut failed);

        if !discovered.is_empty() {
            let failures = self.builder.expand(&mut self.graph, discovered);
            record_failures(&mut failed, failures)?;
        }
        report.added = self
            .graph
            .iter()
            .skip(known_before)
            .map(|(_, node)| node.key.clone())
            .collect();

        self.drop_unreachable(&mut report)?;

        for key in &deleted {
            if let Some(id) = self.graph.lookup(key) {
                // Still imported by a module that could not be rebuilt.
                self.graph.get_mut(id).state = NodeState::Failed;
                failed
                    .entry(key.clone())
                    .or_insert_with(|| "source file was deleted".to_string());
            }
        }
        failed.retain(|key, _| self.graph.lookup(key).is_some());

        let touched: BTreeSet<String> = report
            .rebuilt
            .iter()
            .chain(&report.added)
            .chain(failed.keys())
            .cloned()
            .collect();
        self.sync_cache(&touched, &failed);
        self.cache.save()?;
        report.failed = failed;

        self.transition(EngineState::Idle);
        tracing::debug!(
            rebuilt = report.rebuilt.len(),
            changed = report.changed.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "pass complete"
        );
        Ok(report)
    }

    /// Rebuilds the frontier level by level. Returns modules discovered
    /// while linking, which still have to be compiled.
    fn rebuild(
        &mut self,
        frontier: &InvalidationFrontier,
        queue: &mut EventQueue,
        report: &mut PassReport,
        failed: &mut BTreeMap<String, String>,
    ) -> Vec<ModuleId> {
        let direct: BTreeSet<ModuleId> = frontier
            .seeds()
            .iter()
            .filter_map(|key| self.graph.lookup(key))
            .collect();
        let subset: BTreeSet<ModuleId> = frontier
            .keys()
            .iter()
            .filter_map(|key| self.graph.lookup(key))
            .collect();

        let mut changed: BTreeSet<ModuleId> = BTreeSet::new();
        let mut discovered = Vec::new();

        for (depth, level) in self.graph.rebuild_levels(&subset).into_iter().enumerate() {
            queue.poll();
            let mut work = Vec::new();
            for component in level {
                let mut live = Vec::with_capacity(component.len());
                for id in component {
                    if queue.is_deleted(&self.graph.get(id).path) {
                        report.cancelled.insert(self.key(id));
                    } else {
                        live.push(id);
                    }
                }
                let needed = live.iter().any(|&id| {
                    direct.contains(&id) || self.graph.get(id).dependencies().any(|d| changed.contains(&d))
                });
                if needed {
                    work.extend(live);
                } else {
                    report.skipped.extend(live.into_iter().map(|id| self.key(id)));
                }
            }
            if work.is_empty() {
                continue;
            }

            tracing::debug!(depth, modules = work.len(), "rebuilding level");
            for (id, result) in self.builder.compile_many(&self.graph, &work) {
                let key = self.key(id);
                report.rebuilt.insert(key.clone());
                match result {
                    Ok(compiled) => {
                        let node = self.graph.get(id);
                        let previous = (node.state, node.output_hash);
                        let outcome = self.builder.link(&mut self.graph, id, &compiled);
                        discovered.extend(outcome.discovered);
                        for error in outcome.errors {
                            record(failed, key.clone(), error.to_string());
                        }
                        if previous == (NodeState::Ready, self.graph.get(id).output_hash) {
                            report.unchanged.insert(key);
                        } else {
                            changed.insert(id);
                            report.changed.insert(key);
                        }
                    }
                    Err(error) => {
                        tracing::debug!(%key, %error, "rebuild failed");
                        record(failed, key, error.to_string());
                    }
                }
            }
        }
        discovered
    }

    /// Removes modules that no entry reaches any more.
    fn drop_unreachable(&mut self, report: &mut PassReport) -> Result<(), DevError> {
        let entries = self.graph.entries().to_vec();
        let set = prune(&self.graph, &entries)?;
        if set.prunable.is_empty() {
            return Ok(());
        }
        for &id in &set.prunable {
            report.removed.insert(self.key(id));
        }
        // A module found and dropped in the same pass was never visible.
        let transient: Vec<String> = report.added.intersection(&report.removed).cloned().collect();
        for key in transient {
            report.added.remove(&key);
            report.removed.remove(&key);
        }
        self.graph = self.graph.retain(&set.reachable)?;
        tracing::debug!(removed = set.prunable.len(), "dropped unreachable modules");
        Ok(())
    }

    /// Writes the graph back into the cache. Entries of `touched` modules
    /// take their error from `failed`; others keep their previous state.
    /// Entries of modules no longer in the graph are removed.
    fn sync_cache(&mut self, touched: &BTreeSet<String>, failed: &BTreeMap<String, String>) {
        let reverse = self.graph.reverse_edges();
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();

        let mut updates = Vec::with_capacity(self.graph.len());
        for (id, node) in self.graph.iter() {
            let previous = self.cache.entry(&node.key);
            let (built_at, error) = if touched.contains(&node.key) {
                let error = failed.get(&node.key).cloned();
                let built_at = match (&error, previous) {
                    (Some(_), Some(prev)) => prev.built_at,
                    (Some(_), None) => 0,
                    (None, _) => now,
                };
                (built_at, error)
            } else {
                (
                    previous.map_or(now, |p| p.built_at),
                    previous.and_then(|p| p.error.clone()),
                )
            };
            let mut entry = manifest_entry(&self.graph, &reverse, id, built_at);
            entry.error = error;
            updates.push((node.key.clone(), entry));
        }

        for (key, entry) in updates {
            self.cache.upsert(key, entry);
        }
        let graph = &self.graph;
        self.cache.retain(|key, _| graph.lookup(key).is_some());
    }
}

impl DevBundler for IncrementalEngine {
    fn mode(&self) -> DevBundlerMode {
        DevBundlerMode::Incremental
    }

    fn state(&self) -> EngineState {
        self.state
    }

    fn graph(&self) -> &ModuleGraph {
        &self.graph
    }

    fn process(&mut self, queue: &mut EventQueue) -> Result<PassReport, DevError> {
        self.run_pass(queue)
    }

    fn read_output(&self, key: &str) -> Result<Option<Vec<u8>>, DevError> {
        let Some(node) = self.graph.node_by_key(key) else {
            return Ok(None);
        };
        if node.state != NodeState::Ready {
            return Ok(None);
        }
        Ok(load_output(self.builder.blobs(), &node.source_hash)?)
    }

    fn failures(&self) -> BTreeMap<String, String> {
        self.cache
            .entries()
            .filter_map(|(key, entry)| entry.error.clone().map(|e| (key.clone(), e)))
            .collect()
    }

    fn save(&mut self) -> Result<(), DevError> {
        Ok(self.cache.save()?)
    }
}

fn record(failed: &mut BTreeMap<String, String>, key: String, message: String) {
    failed
        .entry(key)
        .and_modify(|existing| {
            existing.push('\n');
            existing.push_str(&message);
        })
        .or_insert(message);
}

/// Builds the manifest entry for node `id`. `reverse` is the graph's
/// [`reverse_edges`](ModuleGraph::reverse_edges).
pub fn manifest_entry(
    graph: &ModuleGraph,
    reverse: &HashMap<ModuleId, BTreeSet<ModuleId>>,
    id: ModuleId,
    built_at: u64,
) -> CacheEntry {
    let node = graph.get(id);
    let mut dependencies: Vec<String> = Vec::new();
    for dep in node.dependencies() {
        let key = &graph.get(dep).key;
        if !dependencies.contains(key) {
            dependencies.push(key.clone());
        }
    }
    let dependents = reverse
        .get(&id)
        .map(|importers| importers.iter().map(|&i| graph.get(i).key.clone()).collect())
        .unwrap_or_default();
    CacheEntry {
        path: node.path.clone(),
        external: node.external,
        source_hash: node.source_hash,
        output_hash: node.output_hash,
        format: node.format,
        dependencies,
        dependents,
        built_at,
        error: None,
    }
}

/// Attributes builder failures to the modules they belong to. Failures
/// that belong to no module (I/O on the cache directory) are returned.
pub(crate) fn record_failures(
    failed: &mut BTreeMap<String, String>,
    failures: Vec<GraphError>,
) -> Result<(), DevError> {
    for failure in failures.into_iter().flat_map(GraphError::flatten) {
        let key = match &failure {
            GraphError::Resolution(e) => Some(e.importer.clone().unwrap_or_else(|| e.specifier.clone())),
            other => other.module_key().map(str::to_string),
        };
        match key {
            Some(key) => record(failed, key, failure.to_string()),
            None => return Err(failure.into()),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{channel, ChangeEvent};
    use keel_cache::FormatTag;
    use keel_config::load_config_from_str;
    use keel_config::resolve_layout;
    use keel_graph::{CompileFailure, CompileRequest, CompiledUnit, ImportRequest, ImportKind};
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Output is the source minus `//` comment lines; `import x` lines are
    /// static imports; a source containing `SYNTAX ERROR` fails.
    #[derive(Default)]
    struct CommentStripper {
        calls: Mutex<BTreeMap<String, usize>>,
        total: AtomicUsize,
    }

    impl CommentStripper {
        fn calls(&self, key: &str) -> usize {
            self.calls.lock().unwrap().get(key).copied().unwrap_or(0)
        }
    }

    impl FrontEnd for CommentStripper {
        fn compile(&self, request: &CompileRequest) -> Result<CompiledUnit, CompileFailure> {
            *self.calls.lock().unwrap().entry(request.key.clone()).or_default() += 1;
            self.total.fetch_add(1, Ordering::Relaxed);
            let text = String::from_utf8_lossy(&request.source);
            if text.contains("SYNTAX ERROR") {
                return Err(CompileFailure::new("syntax error"));
            }
            let mut output = String::new();
            let mut imports = Vec::new();
            for line in text.lines() {
                if line.trim_start().starts_with("//") {
                    continue;
                }
                if let Some(spec) = line.strip_prefix("import ") {
                    imports.push(ImportRequest::literal(spec.trim(), ImportKind::Static));
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

    struct Project {
        dir: tempfile::TempDir,
        front_end: Arc<CommentStripper>,
    }

    impl Project {
        fn new(files: &[(&str, &str)]) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let project = Self {
                dir,
                front_end: Arc::new(CommentStripper::default()),
            };
            for (path, content) in files {
                project.write(path, content);
            }
            project
        }

        fn path(&self, rel: &str) -> PathBuf {
            self.dir.path().join(rel)
        }

        fn write(&self, rel: &str, content: &str) {
            let path = self.path(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }

        fn open(&self) -> (IncrementalEngine, StartupReport) {
            let config = load_config_from_str(
                "entries = [\"app\"]\ndevBundler = \"incremental\"\n[project]\nname = \"t\"\n[build]\nconcurrency = 2\n",
            )
            .unwrap();
            let layout = resolve_layout(&config, self.dir.path(), None);
            IncrementalEngine::open(&config, &layout, self.front_end.clone()).unwrap()
        }
    }

    fn app_service_utils() -> Project {
        Project::new(&[
            ("src/app.js", "import ./service\napp\n"),
            ("src/service.js", "import ./utils\nservice\n"),
            ("src/utils.js", "// v1\nutils\n"),
        ])
    }

    fn pass(engine: &mut IncrementalEngine, events: Vec<ChangeEvent>) -> PassReport {
        let (tx, mut queue) = channel();
        for event in events {
            tx.send(event).unwrap();
        }
        engine.run_pass(&mut queue).unwrap()
    }

    #[test]
    fn identical_output_stops_propagation() {
        let project = app_service_utils();
        let (mut engine, _) = project.open();
        project.write("src/utils.js", "// v2, comment only\nutils\n");

        let report = pass(&mut engine, vec![ChangeEvent::modified(project.path("src/utils.js"))]);

        assert_eq!(report.frontier.len(), 3);
        assert!(report.unchanged.contains("src/utils.js"));
        assert!(report.skipped.contains("src/service.js"));
        assert!(report.skipped.contains("src/app.js"));
        assert_eq!(project.front_end.calls("src/service.js"), 1);
        assert_eq!(project.front_end.calls("src/utils.js"), 2);
        assert!(report.notice().is_empty());
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[test]
    fn changed_output_propagates() {
        let project = app_service_utils();
        let (mut engine, _) = project.open();
        project.write("src/utils.js", "utils v2\n");

        let report = pass(&mut engine, vec![ChangeEvent::modified(project.path("src/utils.js"))]);

        assert!(report.changed.contains("src/utils.js"));
        // service is relinked from the store; its own output is the same,
        // so app is left alone.
        assert!(report.unchanged.contains("src/service.js"));
        assert!(report.skipped.contains("src/app.js"));
        assert_eq!(project.front_end.calls("src/service.js"), 1);
        assert_eq!(
            engine.read_output("src/utils.js").unwrap().unwrap(),
            b"utils v2\n".to_vec()
        );
        assert_eq!(report.notice().changed_paths, vec!["src/utils.js"]);
    }

    #[test]
    fn compile_failure_is_isolated_and_retried() {
        let project = Project::new(&[
            ("src/app.js", "import ./a\nimport ./b\nimport ./broken\n"),
            ("src/a.js", "a\n"),
            ("src/b.js", "b\n"),
            ("src/broken.js", "broken\n"),
        ]);
        let (mut engine, _) = project.open();
        project.write("src/a.js", "a2\n");
        project.write("src/b.js", "b2\n");
        project.write("src/broken.js", "SYNTAX ERROR\n");

        let report = pass(
            &mut engine,
            vec![
                ChangeEvent::modified(project.path("src/a.js")),
                ChangeEvent::modified(project.path("src/b.js")),
                ChangeEvent::modified(project.path("src/broken.js")),
            ],
        );

        assert_eq!(engine.state(), EngineState::Idle);
        assert!(report.failed.contains_key("src/broken.js"));
        assert!(report.changed.contains("src/a.js"));
        assert!(report.changed.contains("src/b.js"));
        assert!(engine.cache().entry("src/broken.js").unwrap().is_errored());
        assert!(!engine.cache().entry("src/a.js").unwrap().is_errored());
        // Last good output is still served.
        assert_eq!(engine.read_output("src/broken.js").unwrap().unwrap(), b"broken\n".to_vec());

        // Fixing the file clears the error on the next pass.
        project.write("src/broken.js", "fixed\n");
        let report = pass(&mut engine, vec![ChangeEvent::modified(project.path("src/broken.js"))]);
        assert!(report.failed.is_empty());
        assert!(engine.failures().is_empty());
    }

    #[test]
    fn new_import_discovers_and_dropped_import_removes() {
        let project = app_service_utils();
        let (mut engine, _) = project.open();

        project.write("src/extra.js", "extra\n");
        project.write("src/app.js", "import ./service\nimport ./extra\napp\n");
        let report = pass(&mut engine, vec![ChangeEvent::modified(project.path("src/app.js"))]);
        assert!(report.added.contains("src/extra.js"));
        assert!(engine.cache().entry("src/extra.js").is_some());

        project.write("src/app.js", "app alone\n");
        let report = pass(&mut engine, vec![ChangeEvent::modified(project.path("src/app.js"))]);
        let removed: Vec<_> = report.removed.iter().map(String::as_str).collect();
        assert_eq!(removed, vec!["src/extra.js", "src/service.js", "src/utils.js"]);
        assert!(engine.cache().entry("src/service.js").is_none());
        assert_eq!(engine.graph().len(), 1);
    }

    #[test]
    fn deleting_a_dependency_fails_its_importer() {
        let project = app_service_utils();
        let (mut engine, _) = project.open();
        std::fs::remove_file(project.path("src/utils.js")).unwrap();

        let report = pass(&mut engine, vec![ChangeEvent::deleted(project.path("src/utils.js"))]);

        assert!(report.rebuilt.contains("src/service.js"));
        assert!(report.failed.contains_key("src/service.js"));
        assert!(report.removed.contains("src/utils.js"));
        assert!(engine.cache().entry("src/utils.js").is_none());

        // Recreating the file satisfies the import again.
        project.write("src/utils.js", "utils back\n");
        let report = pass(&mut engine, vec![ChangeEvent::created(project.path("src/utils.js"))]);
        assert!(report.failed.is_empty(), "{:?}", report.failed);
        assert!(report.added.contains("src/utils.js"));
    }

    #[test]
    fn warm_start_skips_front_end() {
        let project = app_service_utils();
        let (engine, first) = project.open();
        assert_eq!(first.stats.compiled, 3);
        drop(engine);

        let (_engine, second) = project.open();
        assert!(matches!(second.cache, Some(keel_cache::CacheOpen::Warm { entries: 3 })));
        assert_eq!(second.stats.compiled, 0);
        assert_eq!(second.stats.reused, 3);
        assert!(second.stale.is_empty());
    }

    #[test]
    fn edits_while_down_are_reported() {
        let project = app_service_utils();
        drop(project.open());
        project.write("src/utils.js", "utils edited offline\n");
        let (_engine, report) = project.open();
        assert_eq!(report.stale.modified, vec!["src/utils.js"]);
    }

    #[test]
    fn unknown_paths_do_nothing() {
        let project = app_service_utils();
        let (mut engine, _) = project.open();
        let report = pass(&mut engine, vec![ChangeEvent::modified(Path::new("/elsewhere/x.js"))]);
        assert!(report.is_empty());
    }

    #[test]
    fn cycles_rebuild_together() {
        let project = Project::new(&[
            ("src/app.js", "import ./a\n"),
            ("src/a.js", "import ./b\na\n"),
            ("src/b.js", "import ./a\nb\n"),
        ]);
        let (mut engine, startup) = project.open();
        assert!(startup.failed.is_empty());
        assert_eq!(engine.graph().len(), 3);

        project.write("src/b.js", "import ./a\nb2\n");
        let report = pass(&mut engine, vec![ChangeEvent::modified(project.path("src/b.js"))]);
        assert!(report.rebuilt.contains("src/a.js"));
        assert!(report.rebuilt.contains("src/b.js"));
        assert!(report.skipped.contains("src/app.js"));
    }
}
