//! Dependency graph resolution engine for Mortar
//!
//! This crate expands root requirements into a complete dependency graph with
//! conflict resolution, override handling, build-require contexts and cycle
//! detection, then derives package ids, build order and lock snapshots from
//! the resolved graph.

pub mod builder;
pub mod generator;
pub mod graph;
pub mod lock;
pub mod order;
pub mod package_id;
pub mod solve;

// Re-export main types
pub use builder::{GraphBuilder, RootManifest};
pub use generator::Generator;
pub use graph::{Graph, GraphNode, NodeId, NodeState, HOST_CONTEXT, ROOT};
pub use lock::{Lockfile, PackageIdChange};
pub use order::{plan_actions, BuildAction, BuildOrder};
pub use package_id::{compute_ids, recompute};
pub use solve::RangeSolver;
