use crate::layout::text::split_lines;
use crate::layout::{Geometry, NormalizedEdge, PlacedNode};
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct GeometryDump {
    pub width: f64,
    pub height: f64,
    pub nodes: Vec<NodeDump>,
    pub edges: Vec<EdgeDump>,
}

#[derive(Debug, Serialize)]
pub struct NodeDump {
    pub id: String,
    pub parent: Option<String>,
    pub depth: usize,
    pub container: bool,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub icon: Option<String>,
    pub label_lines: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct EdgeDump {
    pub id: Option<String>,
    pub sources: Vec<String>,
    pub targets: Vec<String>,
    pub arrow_end: bool,
    /// Absolute route points.
    pub points: Vec<[f64; 2]>,
}

impl GeometryDump {
    pub fn from_geometry(geometry: &Geometry) -> Self {
        let nodes: Vec<NodeDump> = geometry.nodes.iter().map(node_dump).collect();
        let edges: Vec<EdgeDump> = geometry.edges.iter().map(edge_dump).collect();

        let mut width: f64 = 0.0;
        let mut height: f64 = 0.0;
        for node in &nodes {
            width = width.max(node.x + node.width);
            height = height.max(node.y + node.height);
        }
        for [x, y] in edges.iter().flat_map(|edge| edge.points.iter()) {
            width = width.max(*x);
            height = height.max(*y);
        }

        GeometryDump {
            width,
            height,
            nodes,
            edges,
        }
    }
}

fn node_dump(node: &PlacedNode) -> NodeDump {
    NodeDump {
        id: node.id.clone(),
        parent: node.parent.clone(),
        depth: node.depth,
        container: node.is_container,
        x: node.x,
        y: node.y,
        width: node.width,
        height: node.height,
        icon: node.icon_id.clone(),
        label_lines: node.text.as_deref().map(split_lines).unwrap_or_default(),
    }
}

fn edge_dump(edge: &NormalizedEdge) -> EdgeDump {
    EdgeDump {
        id: edge.id.clone(),
        sources: edge.sources.clone(),
        targets: edge.targets.clone(),
        arrow_end: edge.end_arrow,
        points: edge
            .points
            .iter()
            .map(|[x, y]| [edge.x + x, edge.y + y])
            .collect(),
    }
}

pub fn write_geometry_dump(path: &Path, geometry: &Geometry) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let dump = GeometryDump::from_geometry(geometry);
    serde_json::to_writer_pretty(writer, &dump)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_restores_absolute_route_and_extent() {
        let geometry = Geometry {
            nodes: vec![PlacedNode {
                id: "A".to_string(),
                x: 0.0,
                y: 0.0,
                width: 128.0,
                height: 153.0,
                text: Some("Simple\nStorage".to_string()),
                icon_id: Some("s3".to_string()),
                parent: None,
                depth: 0,
                is_container: false,
            }],
            edges: vec![NormalizedEdge {
                id: Some("e1".to_string()),
                x: 128.0,
                y: 64.0,
                width: 172.0,
                height: 0.0,
                points: vec![[0.0, 0.0], [172.0, 0.0]],
                sources: vec!["A".to_string()],
                targets: vec!["B".to_string(), "C".to_string()],
                end_arrow: true,
            }],
        };
        let dump = GeometryDump::from_geometry(&geometry);
        assert_eq!(dump.nodes[0].label_lines, vec!["Simple", "Storage"]);
        assert_eq!(dump.edges[0].points[1], [300.0, 64.0]);
        assert_eq!(dump.edges[0].sources, vec!["A"]);
        assert_eq!(dump.edges[0].targets, vec!["B", "C"]);
        assert_eq!((dump.width, dump.height), (300.0, 153.0));
    }
}
