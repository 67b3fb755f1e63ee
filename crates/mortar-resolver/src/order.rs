//! Build order planning over a resolved graph.
//!
//! Nodes are grouped into levels by longest path to a leaf: level 0 holds
//! nodes with no dependencies at all, and every node sits one level above
//! its deepest dependency. Everything within one level can build in
//! parallel because nothing in a level depends on anything else in it.
//! Build-require edges count like regular ones here; a tool must exist
//! before its consumer builds even though it never links in.

use petgraph::algo::toposort;
use petgraph::graph::DiGraph;

use mortar_core::error::{MortarError, MortarResult};
use mortar_core::hash::PackageId;
use mortar_index::ArtifactStore;

use crate::graph::{Graph, NodeId};

/// Parallelizable build levels, leaves first
#[derive(Debug, Clone)]
pub struct BuildOrder {
    levels: Vec<Vec<NodeId>>,
}

impl BuildOrder {
    /// Plan levels for a resolved graph
    ///
    /// Expansion already rejects cycles, so a cycle here means the graph
    /// was tampered with or deserialized from a corrupt source.
    pub fn plan(graph: &Graph) -> MortarResult<Self> {
        let mut mirror = DiGraph::<NodeId, ()>::new();
        let indices: Vec<_> = graph.iter().map(|node| mirror.add_node(node.id)).collect();
        for node in graph.iter() {
            for (_, dep) in &node.dependencies {
                mirror.add_edge(indices[node.id.0], indices[dep.0], ());
            }
        }
        toposort(&mirror, None).map_err(|cycle| MortarError::CorruptGraph {
            message: format!(
                "dependency edges form a cycle through {}",
                graph.node(mirror[cycle.node_id()]).reference
            ),
        })?;

        // Longest path to a leaf; the toposort above guarantees termination.
        let mut depth = vec![usize::MAX; graph.len()];
        for node in graph.iter() {
            level_of(graph, node.id, &mut depth);
        }

        let height = depth.iter().copied().max().unwrap_or(0);
        let mut levels = vec![Vec::new(); height + 1];
        // Arena order keeps each level sorted by node id.
        for (idx, level) in depth.iter().enumerate() {
            levels[*level].push(NodeId(idx));
        }
        Ok(Self { levels })
    }

    /// Levels in build order, leaves first
    pub fn levels(&self) -> &[Vec<NodeId>] {
        &self.levels
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Write each node's level back onto the graph
    pub fn annotate(&self, graph: &mut Graph) {
        for (level, nodes) in self.levels.iter().enumerate() {
            for id in nodes {
                graph.node_mut(*id).build_level = Some(level);
            }
        }
    }
}

fn level_of(graph: &Graph, id: NodeId, depth: &mut [usize]) -> usize {
    if depth[id.0] != usize::MAX {
        return depth[id.0];
    }
    let level = graph
        .node(id)
        .dependencies
        .iter()
        .map(|(_, dep)| level_of(graph, *dep, depth) + 1)
        .max()
        .unwrap_or(0);
    depth[id.0] = level;
    level
}

/// What to do for one node when executing a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildAction {
    /// No artifact for this package id is available; build from source
    Build,
    /// A compatible artifact already exists under this package id
    Reuse { id: PackageId },
}

/// Decide build-or-reuse per node against an artifact store, in plan order
pub fn plan_actions<S: ArtifactStore>(
    graph: &Graph,
    order: &BuildOrder,
    store: &S,
) -> Vec<(NodeId, BuildAction)> {
    let mut actions = Vec::with_capacity(graph.len());
    for level in order.levels() {
        for id in level {
            let action = match graph.node(*id).package_id {
                Some(pkg) if store.contains(&pkg) => BuildAction::Reuse { id: pkg },
                _ => BuildAction::Build,
            };
            actions.push((*id, action));
        }
    }
    actions
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use mortar_core::types::{OptionsView, Reference, RequirementSpec, SettingsView, VersionExpr};
    use mortar_index::InMemoryStore;

    use super::*;
    use crate::graph::{GraphNode, NodeState, HOST_CONTEXT};

    fn test_node(id: usize, name: &str) -> GraphNode {
        GraphNode {
            id: NodeId(id),
            reference: Reference::new(name, "1.0".parse().unwrap()),
            settings: SettingsView::default(),
            options: OptionsView::new(),
            package_id: None,
            dependencies: Vec::new(),
            dependents: BTreeSet::new(),
            state: NodeState::Resolved,
            context: HOST_CONTEXT.to_string(),
            depth: 0,
            via: None,
            build_level: None,
        }
    }

    fn edge(name: &str, build: bool) -> RequirementSpec {
        let spec = RequirementSpec::new(name, VersionExpr::Pin("1.0".parse().unwrap()));
        if build {
            spec.build_require()
        } else {
            spec
        }
    }

    fn link(nodes: &mut [GraphNode], from: usize, to: usize, build: bool) {
        let name = nodes[to].reference.name.clone();
        nodes[from].dependencies.push((edge(&name, build), NodeId(to)));
        nodes[to].dependents.insert(NodeId(from));
    }

    fn graph_of(nodes: Vec<GraphNode>) -> Graph {
        Graph::from_nodes(nodes)
    }

    #[test]
    fn test_chain_levels() {
        // root -> a -> b
        let mut nodes = vec![test_node(0, "root"), test_node(1, "a"), test_node(2, "b")];
        link(&mut nodes, 0, 1, false);
        link(&mut nodes, 1, 2, false);
        let order = BuildOrder::plan(&graph_of(nodes)).unwrap();

        assert_eq!(order.levels().len(), 3);
        assert_eq!(order.levels()[0], vec![NodeId(2)]);
        assert_eq!(order.levels()[1], vec![NodeId(1)]);
        assert_eq!(order.levels()[2], vec![NodeId(0)]);
    }

    #[test]
    fn test_diamond_shares_a_level() {
        // root -> a -> c, root -> b -> c
        let mut nodes = vec![
            test_node(0, "root"),
            test_node(1, "a"),
            test_node(2, "b"),
            test_node(3, "c"),
        ];
        link(&mut nodes, 0, 1, false);
        link(&mut nodes, 0, 2, false);
        link(&mut nodes, 1, 3, false);
        link(&mut nodes, 2, 3, false);
        let order = BuildOrder::plan(&graph_of(nodes)).unwrap();

        assert_eq!(order.levels()[0], vec![NodeId(3)]);
        assert_eq!(order.levels()[1], vec![NodeId(1), NodeId(2)]);
        assert_eq!(order.levels()[2], vec![NodeId(0)]);
    }

    #[test]
    fn test_node_sits_above_its_deepest_dependency() {
        // root -> a -> b, root -> b: root must sit two above b, not one
        let mut nodes = vec![test_node(0, "root"), test_node(1, "a"), test_node(2, "b")];
        link(&mut nodes, 0, 1, false);
        link(&mut nodes, 0, 2, false);
        link(&mut nodes, 1, 2, false);
        let order = BuildOrder::plan(&graph_of(nodes)).unwrap();

        assert_eq!(order.levels()[0], vec![NodeId(2)]);
        assert_eq!(order.levels()[1], vec![NodeId(1)]);
        assert_eq!(order.levels()[2], vec![NodeId(0)]);
    }

    #[test]
    fn test_build_require_builds_before_consumer() {
        // root build-requires a tool and has no regular dependencies
        let mut nodes = vec![test_node(0, "root"), test_node(1, "cmake")];
        link(&mut nodes, 0, 1, true);
        let order = BuildOrder::plan(&graph_of(nodes)).unwrap();

        assert_eq!(order.levels()[0], vec![NodeId(1)]);
        assert_eq!(order.levels()[1], vec![NodeId(0)]);
    }

    #[test]
    fn test_annotate_writes_levels_back() {
        let mut nodes = vec![test_node(0, "root"), test_node(1, "a")];
        link(&mut nodes, 0, 1, false);
        let mut graph = graph_of(nodes);
        let order = BuildOrder::plan(&graph).unwrap();
        order.annotate(&mut graph);

        assert_eq!(graph.node(NodeId(1)).build_level, Some(0));
        assert_eq!(graph.node(NodeId(0)).build_level, Some(1));
    }

    #[test]
    fn test_cycle_reports_corrupt_graph() {
        let mut nodes = vec![test_node(0, "root"), test_node(1, "a"), test_node(2, "b")];
        link(&mut nodes, 0, 1, false);
        link(&mut nodes, 1, 2, false);
        // manual back edge; expansion would never produce this
        link(&mut nodes, 2, 1, false);
        let err = BuildOrder::plan(&graph_of(nodes)).unwrap_err();
        assert!(matches!(err, MortarError::CorruptGraph { .. }));
    }

    #[test]
    fn test_plan_actions_reuses_known_artifacts() {
        let mut nodes = vec![test_node(0, "root"), test_node(1, "a")];
        link(&mut nodes, 0, 1, false);
        let known = PackageId::new([3u8; 32]);
        nodes[1].package_id = Some(known);
        nodes[0].package_id = Some(PackageId::new([4u8; 32]));
        let graph = graph_of(nodes);
        let order = BuildOrder::plan(&graph).unwrap();

        let store = InMemoryStore::new();
        store.put(known);
        let actions = plan_actions(&graph, &order, &store);

        assert_eq!(actions[0], (NodeId(1), BuildAction::Reuse { id: known }));
        assert_eq!(actions[1], (NodeId(0), BuildAction::Build));
    }
}
