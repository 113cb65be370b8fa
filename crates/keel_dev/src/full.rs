//! The non-incremental development bundler.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use keel_cache::{BlobStore, ChangeSet};
use keel_config::{DevBundlerMode, ProjectConfig, ProjectLayout};
use keel_graph::{load_output, BuildOptions, FrontEnd, GraphBuilder, ModuleGraph, NodeState};

use crate::engine::record_failures;
use crate::error::DevError;
use crate::event::EventQueue;
use crate::report::{EngineState, PassReport, StartupReport};
use crate::session::DevBundler;

/// Rebuilds the whole graph from the entries on every batch of changes.
///
/// Never reuses compiled units and keeps no manifest, so every module is
/// sent to the front end on every pass and every output is reported as
/// changed. Compiled units still go through the blob store so
/// [`read_output`](DevBundler::read_output) can serve them.
pub struct FullRebuildEngine {
    builder: GraphBuilder,
    entries: Vec<String>,
    graph: ModuleGraph,
    failed: BTreeMap<String, String>,
    state: EngineState,
}

impl FullRebuildEngine {
    /// Builds the initial graph.
    pub fn open(
        config: &ProjectConfig,
        layout: &ProjectLayout,
        front_end: Arc<dyn FrontEnd>,
    ) -> Result<(Self, StartupReport), DevError> {
        let options = BuildOptions {
            reuse_cache: false,
            ..BuildOptions::new(config, layout)
        };
        let builder = GraphBuilder::new(options, front_end, BlobStore::new(&layout.cache_dir))?;
        let mut engine = Self {
            builder,
            entries: config.entries.clone(),
            graph: ModuleGraph::new(),
            failed: BTreeMap::new(),
            state: EngineState::Idle,
        };
        let wave = engine.builder.add_entries(&mut engine.graph, &engine.entries)?;
        record_failures(&mut engine.failed, engine.builder.expand(&mut engine.graph, wave))?;

        let report = StartupReport {
            cache: None,
            stale: ChangeSet::default(),
            modules: engine.graph.len(),
            stats: engine.builder.stats(),
            failed: engine.failed.clone(),
        };
        Ok((engine, report))
    }

    fn keys(&self) -> BTreeSet<String> {
        self.graph.iter().map(|(_, node)| node.key.clone()).collect()
    }
}

impl DevBundler for FullRebuildEngine {
    fn mode(&self) -> DevBundlerMode {
        DevBundlerMode::Default
    }

    fn state(&self) -> EngineState {
        self.state
    }

    fn graph(&self) -> &ModuleGraph {
        &self.graph
    }

    fn process(&mut self, queue: &mut EventQueue) -> Result<PassReport, DevError> {
        queue.poll();
        if queue.take_batch().is_empty() {
            return Ok(PassReport::default());
        }
        self.state = EngineState::Rebuilding;
        tracing::debug!("rebuilding the whole graph");

        let before = self.keys();
        let mut graph = ModuleGraph::new();
        let mut failed = BTreeMap::new();
        let mut report = PassReport::default();
        match self.builder.add_entries(&mut graph, &self.entries) {
            Ok(wave) => record_failures(&mut failed, self.builder.expand(&mut graph, wave))?,
            Err(error) => {
                // Keep serving the previous graph until the entries resolve again.
                record_failures(&mut failed, vec![error])?;
                self.state = EngineState::Idle;
                report.failed = failed.clone();
                self.failed = failed;
                return Ok(report);
            }
        }
        self.graph = graph;
        let after = self.keys();

        report.frontier = after.clone();
        for (_, node) in self.graph.iter() {
            if node.is_ready() {
                report.rebuilt.insert(node.key.clone());
                report.changed.insert(node.key.clone());
            }
        }
        report.added = after.difference(&before).cloned().collect();
        report.removed = before.difference(&after).cloned().collect();
        report.failed = failed.clone();
        self.failed = failed;
        self.state = EngineState::Idle;
        Ok(report)
    }

    fn read_output(&self, key: &str) -> Result<Option<Vec<u8>>, DevError> {
        match self.graph.node_by_key(key) {
            Some(node) if node.state == NodeState::Ready => {
                Ok(load_output(self.builder.blobs(), &node.source_hash)?)
            }
            _ => Ok(None),
        }
    }

    fn failures(&self) -> BTreeMap<String, String> {
        self.failed.clone()
    }

    fn save(&mut self) -> Result<(), DevError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{channel, ChangeEvent};
    use keel_config::{load_config_from_str, resolve_layout};
    use keel_graph::ScanFrontEnd;

    fn project() -> (tempfile::TempDir, ProjectConfig, ProjectLayout) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/app.js"), "require('./util');\n").unwrap();
        std::fs::write(dir.path().join("src/util.js"), "module.exports = 1;\n").unwrap();
        let config = load_config_from_str("entries = [\"app\"]\n[project]\nname = \"t\"\n").unwrap();
        let layout = resolve_layout(&config, dir.path(), None);
        (dir, config, layout)
    }

    #[test]
    fn every_pass_recompiles_everything() {
        let (dir, config, layout) = project();
        let (mut engine, startup) = FullRebuildEngine::open(&config, &layout, Arc::new(ScanFrontEnd)).unwrap();
        assert!(startup.cache.is_none());
        assert_eq!(startup.stats.compiled, 2);

        std::fs::write(dir.path().join("src/util.js"), "module.exports = 2;\n").unwrap();
        let (tx, mut queue) = channel();
        tx.send(ChangeEvent::modified(dir.path().join("src/util.js"))).unwrap();
        let report = engine.process(&mut queue).unwrap();

        assert_eq!(report.rebuilt.len(), 2);
        assert_eq!(report.changed.len(), 2);
        assert_eq!(engine.builder.stats().compiled, 4);
        assert_eq!(
            engine.read_output("src/util.js").unwrap().unwrap(),
            b"module.exports = 2;\n".to_vec()
        );
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[test]
    fn empty_queue_is_a_no_op() {
        let (_dir, config, layout) = project();
        let (mut engine, _) = FullRebuildEngine::open(&config, &layout, Arc::new(ScanFrontEnd)).unwrap();
        let (_tx, mut queue) = channel();
        assert!(engine.process(&mut queue).unwrap().is_empty());
    }

    #[test]
    fn deleted_entry_keeps_previous_graph() {
        let (dir, config, layout) = project();
        let (mut engine, _) = FullRebuildEngine::open(&config, &layout, Arc::new(ScanFrontEnd)).unwrap();
        std::fs::remove_file(dir.path().join("src/app.js")).unwrap();
        let (tx, mut queue) = channel();
        tx.send(ChangeEvent::deleted(dir.path().join("src/app.js"))).unwrap();
        let report = engine.process(&mut queue).unwrap();
        assert_eq!(report.failed.len(), 1);
        assert_eq!(engine.graph().len(), 2);
        assert_eq!(engine.failures().len(), 1);
    }
}
