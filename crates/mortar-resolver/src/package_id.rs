//! Package id computation over a resolved graph.
//!
//! Each node's id folds together its reference, the settings and options
//! that affect its binary, and the ids of the dependencies whose binaries it
//! links against. Ids are computed leaves-first: a node is ready once every
//! dependency it depends on for identity already has an id.
//!
//! Inputs deliberately excluded from a node's own id:
//! - settings and options the recipe marked as not affecting the binary;
//! - private dependencies (resolved and built, but an implementation detail
//!   of their consumer);
//! - build-requires, unless the edge asks for its id to be embedded.

use mortar_core::error::{MortarError, MortarResult};
use mortar_core::hash::{IdHasher, PackageId};
use mortar_core::types::RequirementSpec;

use crate::graph::{Graph, GraphNode, NodeId};

/// Compute and store a package id on every node
pub fn compute_ids(graph: &mut Graph) -> MortarResult<()> {
    let total = graph.len();
    let mut done = 0usize;

    while done < total {
        let mut progressed = false;
        for idx in 0..total {
            let id = NodeId(idx);
            if graph.node(id).package_id.is_some() {
                continue;
            }
            if !deps_ready(graph, id) {
                continue;
            }
            let package_id = hash_node(graph, graph.node(id));
            graph.node_mut(id).package_id = Some(package_id);
            done += 1;
            progressed = true;
        }
        if !progressed {
            return Err(MortarError::CorruptGraph {
                message: "package id computation stalled; dependency edges form a cycle"
                    .to_string(),
            });
        }
    }
    Ok(())
}

/// Recompute one node's id from the graph as it stands
pub fn recompute(graph: &Graph, id: NodeId) -> MortarResult<PackageId> {
    if !deps_ready(graph, id) {
        return Err(MortarError::CorruptGraph {
            message: format!("node {id} has dependencies without package ids"),
        });
    }
    Ok(hash_node(graph, graph.node(id)))
}

/// Whether every id-contributing dependency of a node has an id
fn deps_ready(graph: &Graph, id: NodeId) -> bool {
    graph
        .node(id)
        .dependencies
        .iter()
        .filter(|(spec, _)| contributes(spec))
        .all(|(_, dep)| graph.node(*dep).package_id.is_some())
}

fn contributes(spec: &RequirementSpec) -> bool {
    if spec.is_build_require {
        spec.embed_in_package_id
    } else {
        !spec.is_private
    }
}

fn hash_node(graph: &Graph, node: &GraphNode) -> PackageId {
    let mut hasher = IdHasher::new();

    hasher.field("reference").text(&node.reference.to_string());

    hasher.field("settings");
    for (key, value) in node.settings.identity_iter() {
        hasher.pair(key, value);
    }

    hasher.field("options");
    for (key, value) in node.options.identity_iter() {
        hasher.pair(key, value);
    }

    // Regular dependencies in declaration order; edge order is part of the
    // identity because link order can change the produced binary.
    hasher.field("requires");
    for (_, dep) in node.regular_dependencies() {
        let dep_node = graph.node(dep);
        hasher.text(&dep_node.reference.name);
        hasher.raw(dep_node.package_id.expect("dependency id computed first").as_bytes());
    }

    hasher.field("build-requires");
    for (spec, dep) in node.build_dependencies() {
        if !spec.embed_in_package_id {
            continue;
        }
        let dep_node = graph.node(dep);
        hasher.text(&dep_node.reference.name);
        hasher.raw(dep_node.package_id.expect("dependency id computed first").as_bytes());
    }

    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use mortar_core::types::{Profile, RequirementSpec};
    use mortar_index::{InMemoryIndex, Recipe};

    use crate::builder::{GraphBuilder, RootManifest};

    use super::*;

    #[tokio::test]
    async fn test_recompute_is_idempotent() {
        let index = InMemoryIndex::new();
        index.add(Recipe::new("zlib/1.2.11".parse().unwrap()));
        index.add(
            Recipe::new("libpng/1.6.40".parse().unwrap())
                .requires(RequirementSpec::parse("zlib/1.2.11").unwrap()),
        );
        let manifest = RootManifest::new("app", "0.1.0".parse().unwrap())
            .require(RequirementSpec::parse("libpng/1.6.40").unwrap());

        let graph = GraphBuilder::new(&index, Profile::new())
            .resolve(&manifest)
            .await
            .unwrap();

        for node in graph.iter() {
            let again = recompute(&graph, node.id).unwrap();
            assert_eq!(Some(again), node.package_id);
        }
    }

    #[tokio::test]
    async fn test_ignored_settings_leave_id_unchanged() {
        let build = |release: bool| {
            let index = InMemoryIndex::new();
            index.add(
                Recipe::new("zlib/1.2.11".parse().unwrap())
                    .default_settings()
                    .ignore_setting_for_id("build_type"),
            );
            let profile = Profile::new()
                .setting("arch", "x86_64")
                .setting("build_type", if release { "Release" } else { "Debug" });
            (index, profile)
        };
        let manifest = RootManifest::new("app", "0.1.0".parse().unwrap())
            .require(RequirementSpec::parse("zlib/1.2.11").unwrap());

        let (index, profile) = build(false);
        let debug = GraphBuilder::new(&index, profile)
            .resolve(&manifest)
            .await
            .unwrap();
        let (index, profile) = build(true);
        let release = GraphBuilder::new(&index, profile)
            .resolve(&manifest)
            .await
            .unwrap();

        assert_eq!(
            debug.find_by_name("zlib").unwrap().package_id,
            release.find_by_name("zlib").unwrap().package_id
        );
    }

    #[tokio::test]
    async fn test_cosmetic_option_on_leaf_leaves_ancestor_ids_unchanged() {
        let index = InMemoryIndex::new();
        index.add(
            Recipe::new("zlib/1.2.11".parse().unwrap()).cosmetic_option("verbose", "off"),
        );
        index.add(
            Recipe::new("libpng/1.6.40".parse().unwrap())
                .requires(RequirementSpec::parse("zlib/1.2.11").unwrap()),
        );
        let manifest = RootManifest::new("app", "0.1.0".parse().unwrap())
            .require(RequirementSpec::parse("libpng/1.6.40").unwrap());

        let plain = GraphBuilder::new(&index, Profile::new())
            .resolve(&manifest)
            .await
            .unwrap();
        let flipped = GraphBuilder::new(&index, Profile::new().package_option("zlib", "verbose", "on"))
            .resolve(&manifest)
            .await
            .unwrap();

        // The flip is applied but never reaches any node's identity.
        assert_eq!(
            flipped.find_by_name("zlib").unwrap().options.get("verbose"),
            Some("on")
        );
        for (a, b) in plain.iter().zip(flipped.iter()) {
            assert_eq!(a.package_id, b.package_id, "id of {} drifted", a.reference);
        }
    }
}
