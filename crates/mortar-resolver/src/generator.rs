//! Output generators: render a resolved graph for humans or tools.

use serde::Serialize;

use mortar_core::error::{MortarError, MortarResult};

use crate::graph::Graph;

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generator {
    /// Indented text listing, one node per line
    Text,
    /// Stable JSON document for downstream tooling
    Json,
}

#[derive(Serialize)]
struct JsonNode<'a> {
    id: usize,
    reference: String,
    package_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    build_level: Option<usize>,
    settings: Vec<(&'a str, &'a str)>,
    options: Vec<(&'a str, &'a str)>,
    requires: Vec<usize>,
    build_requires: Vec<usize>,
}

impl Generator {
    pub fn emit(&self, graph: &Graph) -> MortarResult<String> {
        match self {
            Generator::Text => Ok(Self::emit_text(graph)),
            Generator::Json => Self::emit_json(graph),
        }
    }

    fn emit_text(graph: &Graph) -> String {
        let mut out = String::new();
        for node in graph.iter() {
            out.push_str(&format!(
                "{} {}",
                node.id,
                node.reference,
            ));
            if let Some(id) = &node.package_id {
                out.push_str(&format!(" [{id}]"));
            }
            if let Some(level) = node.build_level {
                out.push_str(&format!(" (level {level})"));
            }
            out.push('\n');
            for (spec, dep) in &node.dependencies {
                let kind = if spec.is_build_require {
                    "build-requires"
                } else if spec.is_private {
                    "requires (private)"
                } else {
                    "requires"
                };
                out.push_str(&format!(
                    "  {kind} {} -> {}\n",
                    spec.display_target(),
                    graph.node(*dep).reference
                ));
            }
        }
        out
    }

    fn emit_json(graph: &Graph) -> MortarResult<String> {
        let nodes: Vec<JsonNode<'_>> = graph
            .iter()
            .map(|node| JsonNode {
                id: node.id.0,
                reference: node.reference.to_string(),
                package_id: node.package_id.map(|id| id.to_hex()),
                build_level: node.build_level,
                settings: node.settings.identity_iter().collect(),
                options: node.options.identity_iter().collect(),
                requires: node.regular_dependencies().map(|(_, d)| d.0).collect(),
                build_requires: node.build_dependencies().map(|(_, d)| d.0).collect(),
            })
            .collect();
        serde_json::to_string_pretty(&nodes).map_err(|e| MortarError::CorruptGraph {
            message: format!("failed to render graph as JSON: {e}"),
        })
    }
}
