//! Turns compiled geometry into renderer elements and assembles the scene.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use anyhow::Result;

use crate::assets::{AssetResolver, IconRegistry};
use crate::config::Config;
use crate::diagnostic::Diagnostic;
use crate::layout::text::measure_label;
use crate::layout::{Geometry, NormalizedEdge, PlacedNode};
use crate::scene::{
    AppState, ArrowElement, Arrowhead, Binding, BindingMode, BoundElement, BoundKind,
    ElementBase, IdGenerator, ImageElement, Roundness, Scene, ShapeElement, TextElement,
    VisualElement, seed_for,
};

/// Proportional-radius rounding, as the renderer's UI applies to new shapes.
const ADAPTIVE_RADIUS: u32 = 3;

/// Builds the scene for `geometry`. Nodes come first in document order, each
/// followed by its label, then one arrow per routed edge.
pub fn build_scene(
    geometry: &Geometry,
    registry: &IconRegistry,
    config: &Config,
    diagnostics: &mut Vec<Diagnostic>,
) -> Scene {
    let mut synth = ElementSynthesizer::new(registry, config);
    synth.reserve(
        geometry
            .nodes
            .iter()
            .map(|node| node.id.as_str())
            .chain(geometry.edges.iter().filter_map(|edge| edge.id.as_deref())),
    );
    let mut elements = Vec::new();
    for node in &geometry.nodes {
        elements.extend(synth.synthesize_node(node, diagnostics));
    }

    // Arrows bind to node elements only.
    let index: HashMap<String, usize> = elements
        .iter()
        .enumerate()
        .map(|(idx, element)| (element.id().to_string(), idx))
        .collect();
    for edge in &geometry.edges {
        let arrow = synth.synthesize_edge(edge, &index, diagnostics);
        let arrow_id = arrow.base.id.clone();
        for binding in [&arrow.start_binding, &arrow.end_binding].into_iter().flatten() {
            if let Some(&idx) = index.get(&binding.element_id) {
                attach(&mut elements[idx], BoundKind::Arrow, &arrow_id);
            }
        }
        elements.push(VisualElement::Arrow(arrow));
    }

    let scene_cfg = &config.scene;
    let scene = Scene {
        kind: scene_cfg.document_type.clone(),
        version: scene_cfg.version,
        source: scene_cfg.source.clone(),
        elements,
        app_state: AppState {
            grid_size: scene_cfg.grid_size,
            grid_step: scene_cfg.grid_step,
            grid_mode_enabled: scene_cfg.grid_mode_enabled,
            view_background_color: config.theme.view_background.clone(),
            locked_multi_selections: BTreeMap::new(),
        },
        assets: synth.assets.into_files(),
    };
    tracing::debug!(
        elements = scene.elements.len(),
        files = scene.assets.len(),
        "built scene"
    );
    scene
}

/// Per-scene element factory; owns the id source and the asset table.
/// Element ids are unique within one synthesizer.
pub struct ElementSynthesizer<'a> {
    config: &'a Config,
    ids: IdGenerator,
    reserved: HashSet<String>,
    taken: HashSet<String>,
    assets: AssetResolver<'a>,
}

impl<'a> ElementSynthesizer<'a> {
    pub fn new(registry: &'a IconRegistry, config: &'a Config) -> Self {
        Self {
            config,
            ids: IdGenerator::new(config.scene.deterministic_ids),
            reserved: HashSet::new(),
            taken: HashSet::new(),
            assets: AssetResolver::new(registry, config.scene.updated),
        }
    }

    /// Keeps minted ids clear of ids the input will claim later.
    pub fn reserve<'i>(&mut self, ids: impl IntoIterator<Item = &'i str>) {
        self.reserved.extend(ids.into_iter().map(str::to_string));
    }

    /// Takes `preferred` as the element id unless an earlier element already
    /// holds it, in which case a fresh id is minted and reported.
    fn claim(&mut self, preferred: &str, prefix: &str, diagnostics: &mut Vec<Diagnostic>) -> String {
        if self.taken.insert(preferred.to_string()) {
            return preferred.to_string();
        }
        let replacement = self.mint(prefix);
        Diagnostic::DuplicateElementId {
            id: preferred.to_string(),
            replacement: replacement.clone(),
        }
        .emit(diagnostics);
        replacement
    }

    fn mint(&mut self, prefix: &str) -> String {
        loop {
            let id = self.ids.mint(prefix);
            if !self.reserved.contains(&id) && self.taken.insert(id.clone()) {
                return id;
            }
        }
    }

    /// An icon node becomes an Image with its label grouped underneath; any
    /// other node becomes a Shape hosting its label.
    pub fn synthesize_node(
        &mut self,
        node: &PlacedNode,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Vec<VisualElement> {
        let file_id = match node.icon_id.as_deref() {
            Some(icon) => {
                let resolved = self.assets.resolve(icon, &mut self.ids);
                if resolved.is_none() {
                    Diagnostic::MissingIcon {
                        node: node.id.clone(),
                        icon: icon.to_string(),
                    }
                    .emit(diagnostics);
                }
                resolved
            }
            None => None,
        };
        let label = node
            .text
            .as_deref()
            .filter(|text| !text.trim().is_empty());
        let id = self.claim(&node.id, "node", diagnostics);

        match file_id {
            Some(file_id) => self.image_node(node, id, file_id, label),
            None => self.shape_node(node, id, label),
        }
    }

    fn image_node(
        &mut self,
        node: &PlacedNode,
        id: String,
        file_id: String,
        label: Option<&str>,
    ) -> Vec<VisualElement> {
        let icon_dim = self.config.sizing.icon_dim;
        let group = self.mint("group");
        let mut base = self.base(&id, node.x, node.y, icon_dim, icon_dim);
        base.group_ids = vec![group.clone()];
        let image = VisualElement::Image(ImageElement {
            base,
            file_id,
            scale: [1.0, 1.0],
            status: "saved".to_string(),
        });

        let mut elements = vec![image];
        if let Some(label) = label {
            let mut text = self.text(label, node.x, node.y + icon_dim, None, "top");
            text.base.group_ids = vec![group];
            elements.push(VisualElement::Text(text));
        }
        elements
    }

    fn shape_node(&mut self, node: &PlacedNode, id: String, label: Option<&str>) -> Vec<VisualElement> {
        let mut base = self.base(&id, node.x, node.y, node.width, node.height);
        base.roundness = Some(Roundness {
            kind: ADAPTIVE_RADIUS,
        });
        let mut shape = ShapeElement { base };

        let Some(label) = label else {
            return vec![VisualElement::Shape(shape)];
        };
        let block = measure_label(label, &self.config.theme);
        let x = node.x + (node.width - block.width) / 2.0;
        let y = node.y + (node.height - block.height) / 2.0;
        let text = self.text(label, x, y, Some(id), "middle");
        shape.base.bound_elements = Some(vec![BoundElement {
            kind: BoundKind::Text,
            id: text.base.id.clone(),
        }]);
        vec![VisualElement::Shape(shape), VisualElement::Text(text)]
    }

    /// Binds arrow ends to the first source and first target, when those
    /// elements exist in `index`.
    pub fn synthesize_edge(
        &mut self,
        edge: &NormalizedEdge,
        index: &HashMap<String, usize>,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> ArrowElement {
        let id = match &edge.id {
            Some(id) if !id.is_empty() => self.claim(id, "arrow", diagnostics),
            _ => self.mint("arrow"),
        };
        let mut bind = |side: &'static str, endpoint: Option<&String>| {
            let node = endpoint?;
            if index.contains_key(node) {
                return Some(Binding {
                    element_id: node.clone(),
                    mode: BindingMode::Orbit,
                    fixed_point: None,
                });
            }
            Diagnostic::UnboundEndpoint {
                edge: id.clone(),
                side,
                node: node.clone(),
            }
            .emit(diagnostics);
            None
        };
        let start_binding = bind("start", edge.sources.first());
        let end_binding = bind("end", edge.targets.first());

        ArrowElement {
            base: self.base(&id, edge.x, edge.y, edge.width, edge.height),
            points: edge.points.clone(),
            start_binding,
            end_binding,
            start_arrowhead: None,
            end_arrowhead: edge.end_arrow.then_some(Arrowhead::Arrow),
            elbowed: true,
        }
    }

    fn text(
        &mut self,
        label: &str,
        x: f64,
        y: f64,
        container_id: Option<String>,
        vertical_align: &str,
    ) -> TextElement {
        let theme = &self.config.theme;
        let block = measure_label(label, theme);
        let id = self.mint("text");
        TextElement {
            base: self.base(&id, x, y, block.width, block.height),
            text: label.to_string(),
            font_size: theme.font_size,
            font_family: theme.font_family,
            text_align: "center".to_string(),
            vertical_align: vertical_align.to_string(),
            container_id,
            original_text: label.to_string(),
            auto_resize: true,
            line_height: theme.line_height,
        }
    }

    fn base(&self, id: &str, x: f64, y: f64, width: f64, height: f64) -> ElementBase {
        let theme = &self.config.theme;
        ElementBase {
            id: id.to_string(),
            x,
            y,
            width,
            height,
            angle: 0.0,
            stroke_color: theme.stroke_color.clone(),
            background_color: theme.background_color.clone(),
            fill_style: theme.fill_style.clone(),
            stroke_width: theme.stroke_width,
            stroke_style: theme.stroke_style.clone(),
            roughness: theme.roughness,
            opacity: theme.opacity,
            group_ids: Vec::new(),
            frame_id: None,
            roundness: None,
            seed: seed_for(id),
            version: 1,
            version_nonce: 0,
            is_deleted: false,
            bound_elements: None,
            updated: self.config.scene.updated,
            link: None,
            locked: false,
        }
    }
}

fn attach(element: &mut VisualElement, kind: BoundKind, id: &str) {
    let bound = element.base_mut().bound_elements.get_or_insert_with(Vec::new);
    if !bound.iter().any(|existing| existing.id == id) {
        bound.push(BoundElement {
            kind,
            id: id.to_string(),
        });
    }
}

pub fn write_output_scene(scene: &Scene, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(scene)?;
    match output {
        Some(path) => {
            std::fs::write(path, json)?;
        }
        None => {
            println!("{}", json);
        }
    }
    Ok(())
}
