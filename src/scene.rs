//! Renderer-facing scene document.
//!
//! Field names follow the vector renderer's file format exactly; the Rust side
//! models the element kinds as one tagged union over a shared envelope.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    #[serde(rename = "type")]
    pub kind: String,
    pub version: u32,
    pub source: String,
    pub elements: Vec<VisualElement>,
    pub app_state: AppState,
    #[serde(rename = "files")]
    pub assets: BTreeMap<String, AssetFile>,
}

impl Scene {
    pub fn element(&self, id: &str) -> Option<&VisualElement> {
        self.elements.iter().find(|element| element.id() == id)
    }

    pub fn arrows(&self) -> impl Iterator<Item = &ArrowElement> {
        self.elements.iter().filter_map(|element| match element {
            VisualElement::Arrow(arrow) => Some(arrow),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub grid_size: u32,
    pub grid_step: u32,
    pub grid_mode_enabled: bool,
    pub view_background_color: String,
    pub locked_multi_selections: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetFile {
    pub id: String,
    #[serde(rename = "dataURL")]
    pub data_url: String,
    pub mime_type: String,
    pub created: u64,
    pub last_retrieved: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VisualElement {
    #[serde(rename = "rectangle")]
    Shape(ShapeElement),
    #[serde(rename = "image")]
    Image(ImageElement),
    #[serde(rename = "text")]
    Text(TextElement),
    #[serde(rename = "arrow")]
    Arrow(ArrowElement),
}

impl VisualElement {
    pub fn base(&self) -> &ElementBase {
        match self {
            Self::Shape(el) => &el.base,
            Self::Image(el) => &el.base,
            Self::Text(el) => &el.base,
            Self::Arrow(el) => &el.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut ElementBase {
        match self {
            Self::Shape(el) => &mut el.base,
            Self::Image(el) => &mut el.base,
            Self::Text(el) => &mut el.base,
            Self::Arrow(el) => &mut el.base,
        }
    }

    pub fn id(&self) -> &str {
        &self.base().id
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Shape(_) => "rectangle",
            Self::Image(_) => "image",
            Self::Text(_) => "text",
            Self::Arrow(_) => "arrow",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementBase {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub angle: f64,
    pub stroke_color: String,
    pub background_color: String,
    pub fill_style: String,
    pub stroke_width: f64,
    pub stroke_style: String,
    pub roughness: u32,
    pub opacity: u32,
    pub group_ids: Vec<String>,
    pub frame_id: Option<String>,
    pub roundness: Option<Roundness>,
    pub seed: u32,
    pub version: u32,
    pub version_nonce: u32,
    pub is_deleted: bool,
    pub bound_elements: Option<Vec<BoundElement>>,
    pub updated: u64,
    pub link: Option<String>,
    pub locked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Roundness {
    #[serde(rename = "type")]
    pub kind: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundElement {
    #[serde(rename = "type")]
    pub kind: BoundKind,
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundKind {
    Text,
    Arrow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeElement {
    #[serde(flatten)]
    pub base: ElementBase,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageElement {
    #[serde(flatten)]
    pub base: ElementBase,
    pub file_id: String,
    pub scale: [f64; 2],
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextElement {
    #[serde(flatten)]
    pub base: ElementBase,
    pub text: String,
    pub font_size: f64,
    pub font_family: u32,
    pub text_align: String,
    pub vertical_align: String,
    pub container_id: Option<String>,
    pub original_text: String,
    pub auto_resize: bool,
    pub line_height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrowElement {
    #[serde(flatten)]
    pub base: ElementBase,
    pub points: Vec<[f64; 2]>,
    pub start_binding: Option<Binding>,
    pub end_binding: Option<Binding>,
    pub start_arrowhead: Option<Arrowhead>,
    pub end_arrowhead: Option<Arrowhead>,
    pub elbowed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Binding {
    pub element_id: String,
    pub mode: BindingMode,
    pub fixed_point: Option<[f64; 2]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingMode {
    Orbit,
    Inside,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arrowhead {
    Arrow,
    Bar,
    Dot,
    Triangle,
}

/// Source of fresh element, group and file ids.
#[derive(Debug, Clone)]
pub enum IdGenerator {
    Random,
    Sequential { next: u64 },
}

impl IdGenerator {
    pub fn new(deterministic: bool) -> Self {
        if deterministic {
            Self::Sequential { next: 0 }
        } else {
            Self::Random
        }
    }

    pub fn mint(&mut self, prefix: &str) -> String {
        match self {
            Self::Random => Uuid::new_v4().to_string(),
            Self::Sequential { next } => {
                *next += 1;
                format!("{prefix}-{next}")
            }
        }
    }
}

/// Stable per-id seed for the renderer's hand-drawn jitter (FNV-1a).
pub fn seed_for(id: &str) -> u32 {
    id.bytes().fold(0x811c_9dc5u32, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(0x0100_0193)
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingViolation {
    pub element: String,
    pub field: &'static str,
    pub reference: String,
}

impl fmt::Display for BindingViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field == "id" {
            return write!(f, "element id `{}` is used more than once", self.element);
        }
        write!(
            f,
            "element `{}` {} -> `{}` does not resolve",
            self.element, self.field, self.reference
        )
    }
}

/// Checks that element ids are unique, that every cross reference in the
/// scene resolves, and that label bindings are mutual: a container listing a
/// text must be that text's `containerId`, and vice versa.
pub fn validate_bindings(scene: &Scene) -> Vec<BindingViolation> {
    let by_id: HashMap<&str, &VisualElement> = scene
        .elements
        .iter()
        .map(|element| (element.id(), element))
        .collect();
    let mut violations = Vec::new();
    let mut flag = |element: &str, field: &'static str, reference: &str| {
        violations.push(BindingViolation {
            element: element.to_string(),
            field,
            reference: reference.to_string(),
        });
    };

    let mut seen = HashSet::new();
    for element in &scene.elements {
        let id = element.id();
        if !seen.insert(id) {
            flag(id, "id", id);
        }
        for bound in element.base().bound_elements.iter().flatten() {
            match (bound.kind, by_id.get(bound.id.as_str())) {
                (BoundKind::Text, Some(VisualElement::Text(text)))
                    if text.container_id.as_deref() == Some(id) => {}
                (BoundKind::Arrow, Some(VisualElement::Arrow(arrow)))
                    if binds_to(arrow, id) => {}
                _ => flag(id, "boundElements", &bound.id),
            }
        }
        match element {
            VisualElement::Text(text) => {
                if let Some(container) = text.container_id.as_deref() {
                    let listed = by_id.get(container).is_some_and(|host| {
                        host.base()
                            .bound_elements
                            .iter()
                            .flatten()
                            .any(|bound| bound.kind == BoundKind::Text && bound.id == id)
                    });
                    if !listed {
                        flag(id, "containerId", container);
                    }
                }
            }
            VisualElement::Image(image) => {
                if !scene.assets.contains_key(&image.file_id) {
                    flag(id, "fileId", &image.file_id);
                }
            }
            VisualElement::Arrow(arrow) => {
                for (field, binding) in [
                    ("startBinding", &arrow.start_binding),
                    ("endBinding", &arrow.end_binding),
                ] {
                    if let Some(binding) = binding {
                        if !by_id.contains_key(binding.element_id.as_str()) {
                            flag(id, field, &binding.element_id);
                        }
                    }
                }
            }
            VisualElement::Shape(_) => {}
        }
    }
    violations
}

fn binds_to(arrow: &ArrowElement, element_id: &str) -> bool {
    [&arrow.start_binding, &arrow.end_binding]
        .into_iter()
        .flatten()
        .any(|binding| binding.element_id == element_id)
}
