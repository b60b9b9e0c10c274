use serde::{Deserialize, Deserializer, Serialize};

/// Graph document as proposed by the upstream generator: a flat node list where
/// nesting is expressed through `childrenIds` references.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub nodes: Vec<GraphNode>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, alias = "icon_id", skip_serializing_if = "Option::is_none")]
    pub icon_id: Option<String>,
    #[serde(default, alias = "children_ids", deserialize_with = "null_as_empty")]
    pub children_ids: Vec<String>,
    /// Physically nested children; folded into `children_ids` by the parser.
    #[serde(
        default,
        deserialize_with = "null_as_empty",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub children: Vec<GraphNode>,
}

impl GraphNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_icon(mut self, icon_id: impl Into<String>) -> Self {
        self.icon_id = Some(icon_id.into());
        self
    }

    pub fn with_children<I, S>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.children_ids = children.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub id: String,
    #[serde(
        default,
        alias = "sources",
        alias = "source_ids",
        deserialize_with = "null_as_empty"
    )]
    pub source_ids: Vec<String>,
    #[serde(
        default,
        alias = "targets",
        alias = "target_ids",
        deserialize_with = "null_as_empty"
    )]
    pub target_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_data: Option<EdgeData>,
}

impl GraphEdge {
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_ids: vec![source.into()],
            target_ids: vec![target.into()],
            edge_data: None,
        }
    }
}

/// Arrowhead hints carried on an edge through the layout round trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrow_type_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arrow_type_end: Option<String>,
}

impl EdgeData {
    pub fn wants_end_arrow(&self) -> bool {
        self.arrow_type_end.as_deref() == Some("arrow_point")
    }
}

pub(crate) fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
