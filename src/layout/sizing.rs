use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde_json::{Value, json};

use crate::config::Config;
use crate::diagnostic::Diagnostic;
use crate::normalize::{Forest, TreeNode};

use super::text::wrap_label;
use super::{LayoutEdge, LayoutGraph, LayoutNode};

pub const PADDING_OPTION: &str = "elk.padding";

static BASE_LAYOUT_OPTIONS: Lazy<BTreeMap<String, Value>> = Lazy::new(|| {
    [
        ("elk.hierarchyHandling", json!("INCLUDE_CHILDREN")),
        ("elk.algorithm", json!("elk.layered")),
        ("nodePlacement.strategy", json!("BRANDES_KOEPF")),
        ("elk.layered.mergeEdges", json!(false)),
        ("elk.direction", json!("RIGHT")),
        ("spacing.baseValue", json!(80)),
        (
            "elk.layered.crossingMinimization.forceNodeModelOrder",
            json!(false),
        ),
        (
            "elk.layered.considerModelOrder.strategy",
            json!("NODES_AND_EDGES"),
        ),
        ("elk.layered.unnecessaryBendpoints", json!(true)),
        ("elk.layered.wrapping.multiEdge.improveCuts", json!(true)),
        (
            "elk.layered.wrapping.multiEdge.improveWrappedEdges",
            json!(true),
        ),
        ("elk.layered.edgeRouting.selfLoopDistribution", json!("EQUALLY")),
        ("elk.layered.mergeHierarchyEdges", json!(true)),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value))
    .collect()
});

/// Global options sent with every layout request.
pub fn base_layout_options() -> &'static BTreeMap<String, Value> {
    &BASE_LAYOUT_OPTIONS
}

/// Uniform inset in the engine's `[top=..,left=..,bottom=..,right=..]` syntax.
pub fn padding_spec(padding: f64) -> String {
    format!("[top={padding},left={padding},bottom={padding},right={padding}]")
}

/// Builds the layout request: leaves get an intrinsic icon-plus-label size,
/// containers only a padding inset and are sized by the engine.
pub fn annotate_forest(
    forest: &Forest,
    config: &Config,
    diagnostics: &mut Vec<Diagnostic>,
) -> LayoutGraph {
    let children = forest
        .roots
        .iter()
        .map(|root| annotate_node(root, config))
        .collect();

    let mut edges = Vec::new();
    for edge in &forest.edges {
        if edge.source_ids.is_empty() {
            Diagnostic::EdgeDropped {
                edge: edge.id.clone(),
                side: "source",
            }
            .emit(diagnostics);
            continue;
        }
        if edge.target_ids.is_empty() {
            Diagnostic::EdgeDropped {
                edge: edge.id.clone(),
                side: "target",
            }
            .emit(diagnostics);
            continue;
        }
        edges.push(LayoutEdge {
            id: Some(edge.id.clone()),
            sources: edge.source_ids.clone(),
            targets: edge.target_ids.clone(),
            edge_data: edge.edge_data.clone(),
            ..Default::default()
        });
    }

    tracing::debug!(
        roots = forest.roots.len(),
        edges = edges.len(),
        "annotated layout request"
    );
    LayoutGraph {
        layout_options: base_layout_options().clone(),
        children,
        edges,
        ..Default::default()
    }
}

fn annotate_node(node: &TreeNode, config: &Config) -> LayoutNode {
    let sizing = &config.sizing;
    let padding = if node.is_leaf() {
        sizing.leaf_padding
    } else {
        sizing.container_padding
    };
    let mut layout_options = BTreeMap::new();
    layout_options.insert(PADDING_OPTION.to_string(), json!(padding_spec(padding)));

    let mut annotated = LayoutNode {
        id: node.id.clone(),
        text: node.text.clone(),
        icon_id: node.icon_id.clone(),
        layout_options,
        ..Default::default()
    };

    if node.is_leaf() {
        let mut height = sizing.icon_dim;
        if let Some(text) = node.text.as_deref() {
            let block = wrap_label(text, sizing.icon_dim, &config.theme);
            height += block.height;
            annotated.text = (!block.lines.is_empty()).then(|| block.text());
        }
        annotated.width = Some(sizing.icon_dim + 2.0 * padding);
        annotated.height = Some(height + 2.0 * padding);
    } else {
        annotated.children = node
            .children
            .iter()
            .map(|child| annotate_node(child, config))
            .collect();
    }
    annotated
}
