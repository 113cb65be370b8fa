//! Module nodes and the edges between them.

use std::path::PathBuf;

use keel_cache::FormatTag;
use keel_common::ContentHash;
use serde::{Deserialize, Serialize};

use crate::ids::ModuleId;

/// How an import takes part in the program's control flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportKind {
    /// Unconditional top-level import or require.
    Static,
    /// Import guarded by a branch, `try` block or short-circuit expression.
    Conditional,
    /// `import()` expression, evaluated at run time.
    Dynamic,
}

impl ImportKind {
    /// Returns `true` for imports that may or may not execute at run time.
    pub fn is_optional(self) -> bool {
        !matches!(self, ImportKind::Static)
    }
}

/// Where an edge points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EdgeTarget {
    /// A node in the same graph.
    Module(ModuleId),
    /// The specifier could not be mapped to a module.
    Unresolved,
}

/// An outgoing import edge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edge {
    /// The specifier as written, or the concrete file a pattern expanded to.
    pub specifier: String,
    /// Import kind.
    pub kind: ImportKind,
    /// The static prefix of the non-literal import this edge was expanded from.
    pub pattern: Option<String>,
    /// Target node.
    pub target: EdgeTarget,
}

impl Edge {
    /// Returns the target node, if the edge is resolved.
    pub fn module(&self) -> Option<ModuleId> {
        match self.target {
            EdgeTarget::Module(id) => Some(id),
            EdgeTarget::Unresolved => None,
        }
    }
}

/// The third-party package a module belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageRef {
    /// Package name, including its scope (`@scope/name`).
    pub name: String,
    /// Key of the package directory relative to the project root.
    pub root: String,
}

/// Build progress of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeState {
    /// Discovered; its edges are not known yet.
    InProgress,
    /// Compiled and linked.
    Ready,
    /// Discovered but never compiled successfully. Has no output.
    Failed,
}

/// A single module in the graph.
#[derive(Clone, Debug)]
pub struct ModuleNode {
    /// Canonical identity: the normalized path relative to the project root.
    pub key: String,
    /// Absolute path of the source file.
    pub path: PathBuf,
    /// Whether the module was resolved outside the project's own sources.
    pub external: bool,
    /// Owning package for external modules.
    pub package: Option<PackageRef>,
    /// Unit key of the source (bytes, extension and origin); keys the
    /// compiled unit in the blob store.
    pub source_hash: ContentHash,
    /// Hash of the compiled output bytes.
    pub output_hash: ContentHash,
    /// Compiled output format.
    pub format: FormatTag,
    /// Outgoing edges in import order.
    pub edges: Vec<Edge>,
    /// Build progress.
    pub state: NodeState,
}

impl ModuleNode {
    /// Creates a node that has been discovered but not yet compiled.
    pub fn discovered(
        key: impl Into<String>,
        path: impl Into<PathBuf>,
        external: bool,
        package: Option<PackageRef>,
    ) -> Self {
        let empty = ContentHash::from_bytes(b"");
        Self {
            key: key.into(),
            path: path.into(),
            external,
            package,
            source_hash: empty,
            output_hash: empty,
            format: FormatTag::Script,
            edges: Vec::new(),
            state: NodeState::InProgress,
        }
    }

    /// Targets of resolved edges, in import order. May contain duplicates.
    pub fn dependencies(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.edges.iter().filter_map(Edge::module)
    }

    /// Returns `true` if any edge is unresolved.
    pub fn has_unresolved(&self) -> bool {
        self.edges
            .iter()
            .any(|e| matches!(e.target, EdgeTarget::Unresolved))
    }

    /// Returns `true` if the node has compiled output.
    pub fn is_ready(&self) -> bool {
        self.state == NodeState::Ready
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discovered_node_is_in_progress() {
        let node = ModuleNode::discovered("src/app.js", "/p/src/app.js", false, None);
        assert_eq!(node.state, NodeState::InProgress);
        assert!(!node.is_ready());
        assert!(node.edges.is_empty());
    }

    #[test]
    fn dependencies_skip_unresolved() {
        let mut node = ModuleNode::discovered("src/app.js", "/p/src/app.js", false, None);
        node.edges.push(Edge {
            specifier: "./a".into(),
            kind: ImportKind::Static,
            pattern: None,
            target: EdgeTarget::Module(ModuleId::from_raw(1)),
        });
        node.edges.push(Edge {
            specifier: "optional".into(),
            kind: ImportKind::Conditional,
            pattern: None,
            target: EdgeTarget::Unresolved,
        });
        let deps: Vec<_> = node.dependencies().collect();
        assert_eq!(deps, vec![ModuleId::from_raw(1)]);
        assert!(node.has_unresolved());
    }

    #[test]
    fn optional_kinds() {
        assert!(!ImportKind::Static.is_optional());
        assert!(ImportKind::Conditional.is_optional());
        assert!(ImportKind::Dynamic.is_optional());
    }
}
