//! Forward reachability from production entries.

use std::collections::BTreeSet;

use keel_config::DynamicImportPolicy;
use keel_graph::{EdgeTarget, ImportKind, ModuleGraph, ModuleId, PackageRef};

use crate::error::PruneError;

/// An optional import that was not followed, or could not be.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SkippedImport {
    /// The importing module.
    pub importer: ModuleId,
    /// The specifier as recorded on the edge.
    pub specifier: String,
    /// Conditional or dynamic.
    pub kind: ImportKind,
}

/// The outcome of pruning: every module the production entries can load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReachabilitySet {
    /// The entries the set was computed from, in order.
    pub entries: Vec<ModuleId>,
    /// Reachable modules.
    pub reachable: BTreeSet<ModuleId>,
    /// Modules in the graph that are not reachable.
    pub prunable: BTreeSet<ModuleId>,
    /// Packages with at least one reachable module.
    pub used_packages: BTreeSet<PackageRef>,
    /// Known packages with no reachable module.
    pub prunable_packages: BTreeSet<PackageRef>,
    /// Optional imports on reachable modules that have no target module.
    /// They may fail at run time exactly as they would without pruning.
    pub unresolved: Vec<SkippedImport>,
    /// Optional imports the policy chose not to follow.
    pub excluded: Vec<SkippedImport>,
}

impl ReachabilitySet {
    /// Returns `true` if `id` is reachable.
    pub fn contains(&self, id: ModuleId) -> bool {
        self.reachable.contains(&id)
    }

    /// Number of reachable modules.
    pub fn len(&self) -> usize {
        self.reachable.len()
    }

    /// Returns `true` if nothing is reachable.
    pub fn is_empty(&self) -> bool {
        self.reachable.is_empty()
    }

    /// Returns `true` if the package named `name` has a reachable module.
    pub fn uses_package(&self, name: &str) -> bool {
        self.used_packages.iter().any(|p| p.name == name)
    }
}

/// Computes reachability sets under a dynamic-import policy.
#[derive(Debug, Clone, Default)]
pub struct Pruner {
    policy: DynamicImportPolicy,
    installed: Vec<PackageRef>,
}

impl Pruner {
    /// Creates a pruner with the given policy.
    pub fn new(policy: DynamicImportPolicy) -> Self {
        Self {
            policy,
            installed: Vec::new(),
        }
    }

    /// Adds installed packages that should be classified even if the graph
    /// never imports them.
    pub fn with_installed(mut self, installed: Vec<PackageRef>) -> Self {
        self.installed = installed;
        self
    }

    /// Walks forward edges from `entries`.
    ///
    /// Pure and deterministic: the same graph, entries and policy always give
    /// the same set. Cycles are visited once.
    pub fn prune(&self, graph: &ModuleGraph, entries: &[ModuleId]) -> Result<ReachabilitySet, PruneError> {
        if entries.is_empty() {
            return Err(PruneError::NoEntries);
        }
        let known: BTreeSet<ModuleId> = graph.ids().collect();
        if let Some(&missing) = entries.iter().find(|e| !known.contains(e)) {
            return Err(PruneError::UnknownEntry(missing));
        }

        let mut reachable = BTreeSet::new();
        let mut unresolved = Vec::new();
        let mut excluded = Vec::new();
        let mut stack: Vec<ModuleId> = entries.iter().rev().copied().collect();

        while let Some(id) = stack.pop() {
            if !reachable.insert(id) {
                continue;
            }
            let node = graph.get(id);
            for edge in node.edges.iter().rev() {
                let skipped = || SkippedImport {
                    importer: id,
                    specifier: edge.specifier.clone(),
                    kind: edge.kind,
                };
                if edge.kind.is_optional()
                    && !self.policy.permits(&edge.specifier, edge.pattern.as_deref())
                {
                    excluded.push(skipped());
                    continue;
                }
                match edge.target {
                    EdgeTarget::Module(target) => {
                        if !reachable.contains(&target) {
                            stack.push(target);
                        }
                    }
                    EdgeTarget::Unresolved => unresolved.push(skipped()),
                }
            }
        }

        let prunable: BTreeSet<ModuleId> = known.difference(&reachable).copied().collect();

        let used_packages: BTreeSet<PackageRef> = reachable
            .iter()
            .filter_map(|&id| graph.get(id).package.clone())
            .collect();
        let prunable_packages: BTreeSet<PackageRef> = graph
            .iter()
            .filter_map(|(_, node)| node.package.clone())
            .chain(self.installed.iter().cloned())
            .filter(|p| !used_packages.iter().any(|u| u.name == p.name))
            .collect();

        unresolved.sort();
        excluded.sort();
        tracing::debug!(
            reachable = reachable.len(),
            prunable = prunable.len(),
            used_packages = used_packages.len(),
            "pruned module graph"
        );

        Ok(ReachabilitySet {
            entries: entries.to_vec(),
            reachable,
            prunable,
            used_packages,
            prunable_packages,
            unresolved,
            excluded,
        })
    }
}

/// Prunes with the conservative policy: every optional import is followed.
pub fn prune(graph: &ModuleGraph, entries: &[ModuleId]) -> Result<ReachabilitySet, PruneError> {
    Pruner::default().prune(graph, entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use keel_graph::{Edge, ModuleNode, NodeState};

    fn node(key: &str, package: Option<&str>) -> ModuleNode {
        let mut node = ModuleNode::discovered(
            key,
            format!("/p/{key}"),
            package.is_some(),
            package.map(|name| PackageRef {
                name: name.to_string(),
                root: format!("node_modules/{name}"),
            }),
        );
        node.state = NodeState::Ready;
        node
    }

    fn edge(graph: &mut ModuleGraph, from: ModuleId, specifier: &str, kind: ImportKind, to: Option<ModuleId>) {
        graph.add_edge(
            from,
            Edge {
                specifier: specifier.to_string(),
                kind,
                pattern: None,
                target: to.map_or(EdgeTarget::Unresolved, EdgeTarget::Module),
            },
        );
    }

    /// app -> lib (static), app -> optionalFeature (conditional),
    /// app -> missing (conditional, unresolved); unrelated is in the graph
    /// only because something unreachable imports it.
    fn scenario() -> (ModuleGraph, ModuleId) {
        let mut g = ModuleGraph::new();
        let app = g.add_node(node("src/app.js", None));
        let lib = g.add_node(node("node_modules/lib/index.js", Some("lib")));
        let optional = g.add_node(node("node_modules/optionalFeature/index.js", Some("optionalFeature")));
        let orphan = g.add_node(node("src/orphan.js", None));
        let unrelated = g.add_node(node("node_modules/unrelated/index.js", Some("unrelated")));
        edge(&mut g, app, "lib", ImportKind::Static, Some(lib));
        edge(&mut g, app, "optionalFeature", ImportKind::Conditional, Some(optional));
        edge(&mut g, app, "missing", ImportKind::Conditional, None);
        edge(&mut g, orphan, "unrelated", ImportKind::Static, Some(unrelated));
        g.add_entry(app);
        (g, app)
    }

    #[test]
    fn conservative_policy_keeps_optional_imports() {
        let (g, app) = scenario();
        let set = prune(&g, &[app]).unwrap();
        assert_eq!(set.len(), 3);
        assert!(set.uses_package("lib"));
        assert!(set.uses_package("optionalFeature"));
        assert!(!set.uses_package("unrelated"));
        let prunable: Vec<_> = set.prunable_packages.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(prunable, vec!["unrelated"]);
        assert_eq!(set.unresolved.len(), 1);
        assert_eq!(set.unresolved[0].specifier, "missing");
        assert!(set.excluded.is_empty());
    }

    #[test]
    fn allow_list_excludes_unlisted_optional_imports() {
        let (g, app) = scenario();
        let pruner = Pruner::new(DynamicImportPolicy::AllowList(vec!["lib".into()]));
        let set = pruner.prune(&g, &[app]).unwrap();
        assert!(set.uses_package("lib"));
        assert!(!set.uses_package("optionalFeature"));
        assert_eq!(set.excluded.len(), 2);
        assert!(set.unresolved.is_empty());
    }

    #[test]
    fn static_edges_ignore_policy() {
        let (g, app) = scenario();
        let pruner = Pruner::new(DynamicImportPolicy::AllowList(vec![]));
        let set = pruner.prune(&g, &[app]).unwrap();
        assert!(set.uses_package("lib"));
    }

    #[test]
    fn installed_packages_are_classified() {
        let (g, app) = scenario();
        let extra = PackageRef {
            name: "left-pad".into(),
            root: "node_modules/left-pad".into(),
        };
        let set = Pruner::default()
            .with_installed(vec![extra.clone()])
            .prune(&g, &[app])
            .unwrap();
        assert!(set.prunable_packages.contains(&extra));
    }

    #[test]
    fn cycles_terminate() {
        let mut g = ModuleGraph::new();
        let a = g.add_node(node("a", None));
        let b = g.add_node(node("b", None));
        edge(&mut g, a, "./b", ImportKind::Static, Some(b));
        edge(&mut g, b, "./a", ImportKind::Static, Some(a));
        let set = prune(&g, &[a]).unwrap();
        assert_eq!(set.reachable, [a, b].into_iter().collect());
        assert!(set.prunable.is_empty());
    }

    #[test]
    fn entry_errors() {
        let (g, _) = scenario();
        assert_eq!(prune(&g, &[]).unwrap_err(), PruneError::NoEntries);
        let ghost = ModuleId::from_raw(99);
        assert_eq!(prune(&g, &[ghost]).unwrap_err(), PruneError::UnknownEntry(ghost));
    }

    #[test]
    fn deterministic() {
        let (g, app) = scenario();
        assert_eq!(prune(&g, &[app]).unwrap(), prune(&g, &[app]).unwrap());
    }
}
