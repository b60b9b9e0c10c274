use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ir::{EdgeData, null_as_empty};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextBlock {
    pub lines: Vec<String>,
    pub width: f64,
    pub height: f64,
}

impl TextBlock {
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn offset_by(self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// Absolute placement reported by some layout back ends instead of parent-relative `x`/`y`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Offset {
    pub pos_x: f64,
    pub pos_y: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub start_point: Point,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub bend_points: Vec<Point>,
    pub end_point: Point,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutEdge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, alias = "sourceIds", deserialize_with = "null_as_empty")]
    pub sources: Vec<String>,
    #[serde(default, alias = "targetIds", deserialize_with = "null_as_empty")]
    pub targets: Vec<String>,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub sections: Vec<EdgeSection>,
    /// Pre-flattened route; used when `sections` is absent.
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub points: Vec<Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_data: Option<EdgeData>,
}

/// One node of the layout-engine tree. The request and the response share this
/// shape: the engine fills in `x`/`y` (or `offset`) and echoes the rest back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, alias = "icon_id", skip_serializing_if = "Option::is_none")]
    pub icon_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<Offset>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub layout_options: BTreeMap<String, Value>,
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub children: Vec<LayoutNode>,
    /// Edges whose coordinates are relative to this node.
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub edges: Vec<LayoutEdge>,
}

impl LayoutNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Root of a layout request/response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutGraph {
    #[serde(default = "default_root_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub layout_options: BTreeMap<String, Value>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub children: Vec<LayoutNode>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub edges: Vec<LayoutEdge>,
}

impl Default for LayoutGraph {
    fn default() -> Self {
        Self {
            id: default_root_id(),
            layout_options: BTreeMap::new(),
            children: Vec::new(),
            edges: Vec::new(),
        }
    }
}

fn default_root_id() -> String {
    "root".to_string()
}
