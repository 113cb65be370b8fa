//! Property tests for reachability pruning.

use std::collections::BTreeSet;

use proptest::prelude::*;

use keel_config::DynamicImportPolicy;
use keel_graph::{Edge, EdgeTarget, ImportKind, ModuleGraph, ModuleId, ModuleNode, NodeState};
use keel_prune::{prune, Pruner};

fn kind_strategy() -> impl Strategy<Value = ImportKind> {
    prop_oneof![
        Just(ImportKind::Static),
        Just(ImportKind::Conditional),
        Just(ImportKind::Dynamic),
    ]
}

/// A random graph of `1..24` nodes with arbitrary (possibly cyclic) edges,
/// some unresolved, plus a non-empty entry list.
fn graph_strategy() -> impl Strategy<Value = (ModuleGraph, Vec<ModuleId>)> {
    (1usize..24).prop_flat_map(|n| {
        let edges = proptest::collection::vec((0..n, 0..=n, kind_strategy()), 0..n * 3);
        let entries = proptest::collection::vec(0..n, 1..4);
        (Just(n), edges, entries).prop_map(|(n, edges, entries)| {
            let mut graph = ModuleGraph::new();
            let ids: Vec<ModuleId> = (0..n)
                .map(|i| {
                    let mut node = ModuleNode::discovered(format!("m{i}.js"), format!("/p/m{i}.js"), false, None);
                    node.state = NodeState::Ready;
                    graph.add_node(node)
                })
                .collect();
            for (from, to, kind) in edges {
                // `to == n` stands for an unresolved import.
                let target = ids.get(to).map_or(EdgeTarget::Unresolved, |&t| EdgeTarget::Module(t));
                graph.add_edge(
                    ids[from],
                    Edge {
                        specifier: format!("./m{to}"),
                        kind,
                        pattern: None,
                        target,
                    },
                );
            }
            let entries = entries.into_iter().map(|i| ids[i]).collect();
            (graph, entries)
        })
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    /// The reachable set is a subset of the graph and contains every entry.
    #[test]
    fn reachable_is_subset_containing_entries((graph, entries) in graph_strategy()) {
        let set = prune(&graph, &entries).unwrap();
        let all: BTreeSet<ModuleId> = graph.ids().collect();
        prop_assert!(set.reachable.is_subset(&all));
        for entry in &entries {
            prop_assert!(set.contains(*entry));
        }
        prop_assert_eq!(set.reachable.len() + set.prunable.len(), graph.len());
    }

    /// Under the conservative policy the set is closed under every resolved edge.
    #[test]
    fn conservative_set_is_closed((graph, entries) in graph_strategy()) {
        let set = prune(&graph, &entries).unwrap();
        for &id in &set.reachable {
            for dep in graph.get(id).dependencies() {
                prop_assert!(set.contains(dep), "{:?} -> {:?} escapes the set", id, dep);
            }
        }
    }

    /// A restrictive policy never reaches more than the conservative one.
    #[test]
    fn allow_list_is_never_larger((graph, entries) in graph_strategy()) {
        let conservative = prune(&graph, &entries).unwrap();
        let strict = Pruner::new(DynamicImportPolicy::AllowList(vec![]))
            .prune(&graph, &entries)
            .unwrap();
        prop_assert!(strict.reachable.is_subset(&conservative.reachable));
        for entry in &entries {
            prop_assert!(strict.contains(*entry));
        }
    }

    /// Pruning is a pure function of its inputs.
    #[test]
    fn pruning_is_deterministic((graph, entries) in graph_strategy()) {
        prop_assert_eq!(prune(&graph, &entries).unwrap(), prune(&graph, &entries).unwrap());
    }
}
