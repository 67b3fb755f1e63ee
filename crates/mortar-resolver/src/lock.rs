//! Lock snapshots: capture a resolved graph, replay it later.
//!
//! A snapshot records every node's concrete reference, package id,
//! expansion context and adjacency. Feeding it back through
//! [`GraphBuilder::resolve_locked`] pins every previously-seen name, per
//! context, to its captured version, so a later resolution cannot drift
//! even if newer versions were published in the meantime. Names absent
//! from the snapshot resolve normally.
//!
//! [`GraphBuilder::resolve_locked`]: crate::builder::GraphBuilder::resolve_locked

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use mortar_core::error::{MortarError, MortarResult};
use mortar_core::hash::PackageId;
use mortar_core::types::{Reference, Version};

use crate::graph::{Graph, ROOT};

/// Bump when the snapshot layout changes incompatibly
pub const FORMAT_VERSION: u32 = 1;

/// One captured graph node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockNode {
    pub reference: String,
    pub package_id: PackageId,
    /// Expansion context the node resolved in; a name may be locked at
    /// different versions in different contexts
    pub context: String,
    /// Regular dependency edges, by node id, in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<usize>,
    /// Build-require edges, by node id, in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub build_requires: Vec<usize>,
    /// Private dependency edges, by node id, in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub private: Vec<usize>,
}

/// Serializable snapshot of a resolved graph
///
/// Unknown fields from newer writers are ignored on load; the version
/// field guards against layouts this reader cannot interpret at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lockfile {
    pub version: u32,
    pub root: usize,
    pub nodes: BTreeMap<usize, LockNode>,
}

impl Lockfile {
    /// Capture a resolved graph
    ///
    /// Every node must already carry a package id.
    pub fn capture(graph: &Graph) -> MortarResult<Self> {
        let mut nodes = BTreeMap::new();
        for node in graph.iter() {
            let package_id = node.package_id.ok_or_else(|| MortarError::CorruptGraph {
                message: format!("node {} has no package id to snapshot", node.id),
            })?;

            let mut requires = Vec::new();
            let mut build_requires = Vec::new();
            let mut private = Vec::new();
            for (spec, dep) in &node.dependencies {
                if spec.is_build_require {
                    build_requires.push(dep.0);
                } else if spec.is_private {
                    private.push(dep.0);
                } else {
                    requires.push(dep.0);
                }
            }

            nodes.insert(
                node.id.0,
                LockNode {
                    reference: node.reference.to_string(),
                    package_id,
                    context: node.context.clone(),
                    requires,
                    build_requires,
                    private,
                },
            );
        }
        Ok(Self {
            version: FORMAT_VERSION,
            root: ROOT.0,
            nodes,
        })
    }

    pub fn to_json(&self) -> MortarResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| MortarError::LockSnapshot {
            message: format!("failed to serialize snapshot: {e}"),
        })
    }

    pub fn from_json(text: &str) -> MortarResult<Self> {
        let lock: Lockfile =
            serde_json::from_str(text).map_err(|e| MortarError::LockSnapshot {
                message: format!("failed to parse snapshot: {e}"),
            })?;
        if lock.version > FORMAT_VERSION {
            return Err(MortarError::LockSnapshot {
                message: format!(
                    "snapshot format version {} is newer than supported version {FORMAT_VERSION}",
                    lock.version
                ),
            });
        }
        Ok(lock)
    }

    pub fn save(&self, path: &Path) -> MortarResult<()> {
        let text = self.to_json()?;
        std::fs::write(path, text)
            .map_err(|e| MortarError::io(format!("failed to write {}", path.display()), e))
    }

    pub fn load(path: &Path) -> MortarResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| MortarError::io(format!("failed to read {}", path.display()), e))?;
        Self::from_json(&text)
    }

    /// Captured version per (context, package name) pair
    ///
    /// Within one context a name resolves to exactly one node, so the map
    /// carries every captured version without ties.
    pub fn pinned_versions(&self) -> MortarResult<HashMap<(String, String), Version>> {
        let mut pins = HashMap::new();
        for node in self.nodes.values() {
            let reference: Reference = node.reference.parse()?;
            pins.insert((node.context.clone(), reference.name), reference.version);
        }
        Ok(pins)
    }

    /// Nodes whose package id differs from a freshly resolved graph
    ///
    /// Matching is by context and full reference; nodes present on only one
    /// side are not reported.
    pub fn changed_ids(&self, graph: &Graph) -> Vec<PackageIdChange> {
        let current: HashMap<(String, String), PackageId> = graph
            .iter()
            .filter_map(|n| {
                n.package_id
                    .map(|id| ((n.context.clone(), n.reference.to_string()), id))
            })
            .collect();

        let mut changes = Vec::new();
        for node in self.nodes.values() {
            if let Some(&now) = current.get(&(node.context.clone(), node.reference.clone())) {
                if now != node.package_id {
                    changes.push(PackageIdChange {
                        reference: node.reference.clone(),
                        previous: node.package_id,
                        current: now,
                    });
                }
            }
        }
        changes
    }
}

/// One package whose binary identity drifted since the snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageIdChange {
    pub reference: String,
    pub previous: PackageId,
    pub current: PackageId,
}
