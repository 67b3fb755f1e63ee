//! The resolved dependency graph.
//!
//! All nodes live in one arena owned by [`Graph`]; `NodeId` is an arena
//! index and `NodeId(0)` is always the root. The node/edge structure is a
//! DAG; cycles are a hard error during construction, never silently broken.

use std::collections::BTreeSet;
use std::fmt;

use mortar_core::types::{OptionsView, Reference, RequirementSpec, SettingsView};
use mortar_core::PackageId;

/// Arena index of one graph node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The root node's id
pub const ROOT: NodeId = NodeId(0);

/// Context key of the host context
pub const HOST_CONTEXT: &str = "host";

/// Resolution state of one node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Created, requirements not yet visited
    Pending,
    /// Requirements being visited
    Expanding,
    /// Reference frozen, all requirements resolved
    Resolved,
}

/// One resolved package instance
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub id: NodeId,
    /// Concrete reference; immutable once the node is `Resolved`
    pub reference: Reference,
    pub settings: SettingsView,
    pub options: OptionsView,
    /// Computed exactly once, after all dependencies are resolved
    pub package_id: Option<PackageId>,
    /// Outgoing edges in declaration order
    pub dependencies: Vec<(RequirementSpec, NodeId)>,
    /// Non-owning back-references
    pub dependents: BTreeSet<NodeId>,
    pub state: NodeState,
    /// Expansion context key: [`HOST_CONTEXT`] for the host context,
    /// build-requires get their own nested keys
    pub context: String,
    /// Distance from the root, for override precedence
    pub depth: usize,
    /// First requirer, for path attribution in errors
    pub via: Option<NodeId>,
    /// Derived build-order annotation; never affects identity
    pub build_level: Option<usize>,
}

impl GraphNode {
    /// Regular (non-build, non-private) dependency edges, declaration order
    pub fn regular_dependencies(&self) -> impl Iterator<Item = (&RequirementSpec, NodeId)> {
        self.dependencies
            .iter()
            .filter(|(spec, _)| !spec.is_build_require && !spec.is_private)
            .map(|(spec, id)| (spec, *id))
    }

    /// Build-require edges, declaration order
    pub fn build_dependencies(&self) -> impl Iterator<Item = (&RequirementSpec, NodeId)> {
        self.dependencies
            .iter()
            .filter(|(spec, _)| spec.is_build_require)
            .map(|(spec, id)| (spec, *id))
    }
}

/// Owns every node of one resolution
///
/// Only the graph builder creates nodes; consumers get read access.
#[derive(Debug)]
pub struct Graph {
    nodes: Vec<GraphNode>,
}

impl Graph {
    pub(crate) fn from_nodes(nodes: Vec<GraphNode>) -> Self {
        Self { nodes }
    }

    /// The root node
    pub fn root(&self) -> &GraphNode {
        &self.nodes[ROOT.0]
    }

    pub fn node(&self, id: NodeId) -> &GraphNode {
        &self.nodes[id.0]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut GraphNode {
        &mut self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter()
    }

    /// Find a node by package name (host context only)
    pub fn find_by_name(&self, name: &str) -> Option<&GraphNode> {
        self.nodes
            .iter()
            .find(|n| n.context == HOST_CONTEXT && n.reference.name == name)
    }

    /// Whether `to` is reachable from `from` over dependency edges
    pub fn reaches(&self, from: NodeId, to: NodeId) -> bool {
        self.find_path(from, to).is_some()
    }

    /// A dependency path from `from` to `to`, if one exists
    pub fn find_path(&self, from: NodeId, to: NodeId) -> Option<Vec<NodeId>> {
        find_path_in(&self.nodes, from, to)
    }

    /// The requirement path from the root to a node, following first requirers
    pub fn path_from_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = vec![id];
        let mut current = id;
        while let Some(via) = self.nodes[current.0].via {
            path.push(via);
            current = via;
        }
        path.reverse();
        path
    }

    /// Format a root path as `root -> a/1.0 -> b/2.0`
    pub fn format_path(&self, id: NodeId) -> String {
        self.path_from_root(id)
            .iter()
            .map(|n| self.nodes[n.0].reference.to_string())
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    /// Format a cycle as `a/1.0 -> b/1.0 -> a/1.0`
    pub fn format_cycle(&self, cycle: &[NodeId]) -> String {
        cycle
            .iter()
            .map(|n| self.nodes[n.0].reference.to_string())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// DFS over dependency edges; works on the raw arena so expansion can
/// check reachability before a [`Graph`] exists.
pub(crate) fn find_path_in(nodes: &[GraphNode], from: NodeId, to: NodeId) -> Option<Vec<NodeId>> {
    fn dfs(
        nodes: &[GraphNode],
        current: NodeId,
        to: NodeId,
        path: &mut Vec<NodeId>,
        seen: &mut BTreeSet<NodeId>,
    ) -> bool {
        path.push(current);
        if current == to {
            return true;
        }
        if seen.insert(current) {
            for (_, dep) in &nodes[current.0].dependencies {
                if dfs(nodes, *dep, to, path, seen) {
                    return true;
                }
            }
        }
        path.pop();
        false
    }

    let mut path = Vec::new();
    let mut seen = BTreeSet::new();
    dfs(nodes, from, to, &mut path, &mut seen).then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mortar_core::types::RequirementSpec;

    fn node(id: usize, reference: &str) -> GraphNode {
        GraphNode {
            id: NodeId(id),
            reference: reference.parse().unwrap(),
            settings: SettingsView::default(),
            options: OptionsView::default(),
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

    fn link(nodes: &mut [GraphNode], from: usize, to: usize) {
        let spec = RequirementSpec::parse(&format!(
            "{}/{}",
            nodes[to].reference.name, nodes[to].reference.version
        ))
        .unwrap();
        nodes[from].dependencies.push((spec, NodeId(to)));
        nodes[to].dependents.insert(NodeId(from));
        nodes[to].via.get_or_insert(NodeId(from));
        nodes[to].depth = nodes[from].depth + 1;
    }

    fn chain() -> Graph {
        // root -> a -> b
        let mut nodes = vec![node(0, "proj/0.1.0"), node(1, "liba/1.0"), node(2, "libb/2.0")];
        link(&mut nodes, 0, 1);
        link(&mut nodes, 1, 2);
        Graph::from_nodes(nodes)
    }

    #[test]
    fn test_root_is_node_zero() {
        let graph = chain();
        assert_eq!(graph.root().id, ROOT);
        assert_eq!(graph.root().reference.name, "proj");
        assert_eq!(graph.len(), 3);
    }

    #[test]
    fn test_reachability() {
        let graph = chain();
        assert!(graph.reaches(ROOT, NodeId(2)));
        assert!(graph.reaches(NodeId(1), NodeId(2)));
        assert!(!graph.reaches(NodeId(2), ROOT));
    }

    #[test]
    fn test_path_formatting() {
        let graph = chain();
        assert_eq!(
            graph.format_path(NodeId(2)),
            "proj/0.1.0 -> liba/1.0 -> libb/2.0"
        );
        let path = graph.find_path(NodeId(1), NodeId(2)).unwrap();
        assert_eq!(path, vec![NodeId(1), NodeId(2)]);
    }

    #[test]
    fn test_find_by_name_skips_build_contexts() {
        let mut nodes = vec![node(0, "proj/0.1.0"), node(1, "cmake/3.27.0")];
        nodes[1].context = "host/proj".to_string();
        let graph = Graph::from_nodes(nodes);
        assert!(graph.find_by_name("cmake").is_none());
        assert!(graph.find_by_name("proj").is_some());
    }
}
