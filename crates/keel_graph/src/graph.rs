//! The module graph: an arena of nodes with index-list edges.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use keel_common::InternalError;
use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;

use crate::arena::Arena;
use crate::ids::ModuleId;
use crate::node::{Edge, EdgeTarget, ModuleNode, NodeState};

/// Directed graph of modules, possibly cyclic.
///
/// Holds at most one node per key. Edges point from importer to imported.
#[derive(Debug, Clone, Default)]
pub struct ModuleGraph {
    modules: Arena<ModuleId, ModuleNode>,
    index: HashMap<String, ModuleId>,
    by_path: HashMap<PathBuf, Vec<ModuleId>>,
    entries: Vec<ModuleId>,
}

impl ModuleGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `node`, or returns the existing node with the same key.
    ///
    /// The second value is `true` if the node was newly inserted.
    pub fn insert(&mut self, node: ModuleNode) -> (ModuleId, bool) {
        if let Some(&id) = self.index.get(&node.key) {
            return (id, false);
        }
        let key = node.key.clone();
        let path = node.path.clone();
        let id = self.modules.alloc(node);
        self.index.insert(key, id);
        self.by_path.entry(path).or_default().push(id);
        (id, true)
    }

    /// Adds `node` unless a node with its key exists, returning the node's ID.
    pub fn add_node(&mut self, node: ModuleNode) -> ModuleId {
        self.insert(node).0
    }

    /// Appends an outgoing edge to `from`.
    pub fn add_edge(&mut self, from: ModuleId, edge: Edge) {
        self.modules[from].edges.push(edge);
    }

    /// Marks `id` as an entry. Entries keep their first-marked order.
    pub fn add_entry(&mut self, id: ModuleId) {
        if !self.entries.contains(&id) {
            self.entries.push(id);
        }
    }

    /// Entry nodes in declaration order.
    pub fn entries(&self) -> &[ModuleId] {
        &self.entries
    }

    /// Returns the node with the given ID.
    ///
    /// # Panics
    ///
    /// Panics if the ID does not belong to this graph.
    pub fn get(&self, id: ModuleId) -> &ModuleNode {
        &self.modules[id]
    }

    /// Returns the node with the given ID mutably.
    pub fn get_mut(&mut self, id: ModuleId) -> &mut ModuleNode {
        &mut self.modules[id]
    }

    /// Looks up a node by key.
    pub fn lookup(&self, key: &str) -> Option<ModuleId> {
        self.index.get(key).copied()
    }

    /// Looks up a node by key and returns it.
    pub fn node_by_key(&self, key: &str) -> Option<&ModuleNode> {
        self.lookup(key).map(|id| &self.modules[id])
    }

    /// Nodes backed by the source file at `path`.
    pub fn modules_at(&self, path: &Path) -> &[ModuleId] {
        self.by_path.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns `true` if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Iterates over `(ID, node)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (ModuleId, &ModuleNode)> {
        self.modules.iter()
    }

    /// Iterates over node IDs in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = ModuleId> {
        self.modules.ids()
    }

    /// Iterates over every unresolved edge with its importer.
    pub fn unresolved_edges(&self) -> impl Iterator<Item = (ModuleId, &Edge)> {
        self.modules.iter().flat_map(|(id, node)| {
            node.edges
                .iter()
                .filter(|e| matches!(e.target, EdgeTarget::Unresolved))
                .map(move |e| (id, e))
        })
    }

    /// Maps each node to the set of nodes importing it.
    pub fn reverse_edges(&self) -> HashMap<ModuleId, BTreeSet<ModuleId>> {
        let mut reverse: HashMap<ModuleId, BTreeSet<ModuleId>> = HashMap::new();
        for (id, node) in self.modules.iter() {
            for dep in node.dependencies() {
                reverse.entry(dep).or_default().insert(id);
            }
        }
        reverse
    }

    /// Nodes that import `id` directly.
    pub fn importers(&self, id: ModuleId) -> BTreeSet<ModuleId> {
        self.modules
            .iter()
            .filter(|(_, node)| node.dependencies().any(|d| d == id))
            .map(|(importer, _)| importer)
            .collect()
    }

    /// Checks that the graph is complete: every edge target and entry is a
    /// node of this graph and no node is still in progress.
    pub fn finalize(&self) -> Result<(), InternalError> {
        for (id, node) in self.modules.iter() {
            if node.state == NodeState::InProgress {
                return Err(InternalError::new(format!(
                    "module `{}` ({id:?}) was never linked",
                    node.key
                )));
            }
            for dep in node.dependencies() {
                if !self.modules.contains(dep) {
                    return Err(InternalError::new(format!(
                        "module `{}` has a dangling edge to {dep:?}",
                        node.key
                    )));
                }
            }
        }
        if let Some(entry) = self.entries.iter().find(|e| !self.modules.contains(**e)) {
            return Err(InternalError::new(format!(
                "entry {entry:?} is not in the graph"
            )));
        }
        Ok(())
    }

    /// Import cycles: strongly connected components with more than one
    /// node, plus self-importing nodes. Each cycle is sorted by ID.
    pub fn cycles(&self) -> Vec<Vec<ModuleId>> {
        let digraph = self.digraph(None);
        let mut cycles: Vec<Vec<ModuleId>> = tarjan_scc(&digraph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || digraph.contains_edge(scc[0], scc[0]))
            .map(|mut scc| {
                scc.sort();
                scc
            })
            .collect();
        cycles.sort();
        cycles
    }

    /// Orders `subset` for rebuilding: dependencies before importers.
    ///
    /// Returns levels of strongly connected components. Components within a
    /// level do not depend on each other and can be rebuilt in parallel; a
    /// component depends only on components of earlier levels. Edges leaving
    /// `subset` are ignored.
    pub fn rebuild_levels(&self, subset: &BTreeSet<ModuleId>) -> Vec<Vec<Vec<ModuleId>>> {
        let digraph = self.digraph(Some(subset));
        // tarjan_scc yields components in reverse topological order, which
        // for importer -> imported edges puts dependencies first.
        let sccs = tarjan_scc(&digraph);

        let mut component_of: HashMap<ModuleId, usize> = HashMap::new();
        for (index, scc) in sccs.iter().enumerate() {
            for &id in scc {
                component_of.insert(id, index);
            }
        }

        let mut level_of = vec![0usize; sccs.len()];
        for (index, scc) in sccs.iter().enumerate() {
            let level = scc
                .iter()
                .flat_map(|&id| digraph.neighbors(id))
                .filter_map(|dep| component_of.get(&dep).copied())
                .filter(|&c| c != index)
                .map(|c| level_of[c] + 1)
                .max()
                .unwrap_or(0);
            level_of[index] = level;
        }

        let depth = level_of.iter().copied().max().map_or(0, |m| m + 1);
        let mut levels: Vec<Vec<Vec<ModuleId>>> = vec![Vec::new(); depth];
        for (index, mut scc) in sccs.into_iter().enumerate() {
            scc.sort();
            levels[level_of[index]].push(scc);
        }
        for level in &mut levels {
            level.sort();
        }
        levels
    }

    /// Builds a new graph holding only the nodes in `keep`.
    ///
    /// `keep` must be closed under resolved edges; an edge leaving it is an
    /// internal error. Entries outside `keep` are dropped.
    pub fn retain(&self, keep: &BTreeSet<ModuleId>) -> Result<ModuleGraph, InternalError> {
        let mut compacted = ModuleGraph::new();
        let mut remap: HashMap<ModuleId, ModuleId> = HashMap::new();

        for &old in keep {
            let mut node = self
                .modules
                .try_get(old)
                .ok_or_else(|| InternalError::new(format!("{old:?} is not in the graph")))?
                .clone();
            node.edges.clear();
            remap.insert(old, compacted.add_node(node));
        }

        for &old in keep {
            let new = remap[&old];
            for edge in &self.modules[old].edges {
                let target = match edge.target {
                    EdgeTarget::Module(dep) => match remap.get(&dep) {
                        Some(&mapped) => EdgeTarget::Module(mapped),
                        None => {
                            return Err(InternalError::new(format!(
                                "module `{}` imports {dep:?} which is being dropped",
                                self.modules[old].key
                            )))
                        }
                    },
                    EdgeTarget::Unresolved => EdgeTarget::Unresolved,
                };
                compacted.add_edge(
                    new,
                    Edge {
                        target,
                        ..edge.clone()
                    },
                );
            }
        }

        for entry in &self.entries {
            if let Some(&mapped) = remap.get(entry) {
                compacted.add_entry(mapped);
            }
        }
        Ok(compacted)
    }

    fn digraph(&self, subset: Option<&BTreeSet<ModuleId>>) -> DiGraphMap<ModuleId, ()> {
        let included = |id: ModuleId| subset.map_or(true, |s| s.contains(&id));
        let mut digraph = DiGraphMap::new();
        for (id, node) in self.modules.iter() {
            if !included(id) {
                continue;
            }
            digraph.add_node(id);
            for dep in node.dependencies().filter(|d| included(*d)) {
                digraph.add_edge(id, dep, ());
            }
        }
        digraph
    }
}
