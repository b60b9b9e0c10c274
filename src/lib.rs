//! Compiles a generated architecture graph into a renderer-ready scene.
//!
//! The pipeline has two pure halves around one external call:
//! [`prepare_layout_request`] normalizes the graph and sizes its nodes, a
//! [`LayoutEngine`] positions them, and [`compile_scene`] turns the engine's
//! answer into scene elements. [`render_graph`] runs all three.

pub mod assets;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod normalize;
pub mod parser;
pub mod render;
pub mod scene;
pub mod theme;

use std::collections::HashMap;

#[cfg(feature = "cli")]
pub use cli::run;
pub use assets::{IconEntry, IconRegistry};
pub use config::{Config, load_config};
pub use diagnostic::Diagnostic;
pub use error::{Error, Result};
pub use ir::{EdgeData, GraphDocument, GraphEdge, GraphNode};
pub use layout::{Geometry, LayoutEngine, LayoutEngineError, LayoutGraph, LayoutNode};
pub use parser::parse_graph_document;
pub use scene::{Scene, VisualElement, validate_bindings};

#[derive(Debug, Clone)]
pub struct Prepared {
    pub request: LayoutGraph,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone)]
pub struct Compiled {
    pub scene: Scene,
    pub geometry: Geometry,
    pub diagnostics: Vec<Diagnostic>,
}

/// Normalizes `document` into a forest and annotates it for the layout engine.
pub fn prepare_layout_request(document: &GraphDocument, config: &Config) -> Prepared {
    let mut diagnostics = Vec::new();
    let forest = normalize::normalize_graph(document, config.sizing.max_depth, &mut diagnostics);
    let request = layout::annotate_forest(&forest, config, &mut diagnostics);
    Prepared {
        request,
        diagnostics,
    }
}

/// Builds the scene from a laid-out graph.
pub fn compile_scene(response: &LayoutGraph, registry: &IconRegistry, config: &Config) -> Compiled {
    let mut diagnostics = Vec::new();
    let geometry = layout::compile_geometry(response, config.sizing.max_depth, &mut diagnostics);
    let scene = render::build_scene(&geometry, registry, config, &mut diagnostics);
    Compiled {
        scene,
        geometry,
        diagnostics,
    }
}

/// Runs the whole pipeline. Only a layout engine failure is an error.
pub fn render_graph(
    document: &GraphDocument,
    engine: &dyn LayoutEngine,
    registry: &IconRegistry,
    config: &Config,
) -> Result<Compiled> {
    let prepared = prepare_layout_request(document, config);
    tracing::info!(
        roots = prepared.request.children.len(),
        edges = prepared.request.edges.len(),
        "requesting layout"
    );
    let mut response = engine.layout(&prepared.request)?;
    restore_node_metadata(&mut response.children, &prepared.request.children);

    let mut compiled = compile_scene(&response, registry, config);
    let mut diagnostics = prepared.diagnostics;
    diagnostics.append(&mut compiled.diagnostics);
    compiled.diagnostics = diagnostics;
    Ok(compiled)
}

/// Engines are free to drop fields they do not understand; labels and icons
/// are copied back from the request by node id.
fn restore_node_metadata(response: &mut [LayoutNode], request: &[LayoutNode]) {
    fn index<'a>(nodes: &'a [LayoutNode], out: &mut HashMap<&'a str, &'a LayoutNode>) {
        let mut stack: Vec<&LayoutNode> = nodes.iter().collect();
        while let Some(node) = stack.pop() {
            out.insert(node.id.as_str(), node);
            stack.extend(node.children.iter());
        }
    }

    let mut by_id = HashMap::new();
    index(request, &mut by_id);
    let mut stack: Vec<&mut LayoutNode> = response.iter_mut().collect();
    while let Some(node) = stack.pop() {
        if let Some(original) = by_id.get(node.id.as_str()) {
            if node.text.is_none() {
                node.text = original.text.clone();
            }
            if node.icon_id.is_none() {
                node.icon_id = original.icon_id.clone();
            }
        }
        stack.extend(node.children.iter_mut());
    }
}
