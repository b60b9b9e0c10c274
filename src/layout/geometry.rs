//! Post-layout geometry: absolute node origins and arrow-local edge routes.

use serde::Serialize;

use crate::diagnostic::Diagnostic;
use crate::ir::EdgeData;

use super::{LayoutEdge, LayoutGraph, LayoutNode, Point};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedNode {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub text: Option<String>,
    pub icon_id: Option<String>,
    pub parent: Option<String>,
    pub depth: usize,
    pub is_container: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedEdge {
    pub id: Option<String>,
    /// Absolute position of the first route point.
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Route points relative to `(x, y)`.
    pub points: Vec<[f64; 2]>,
    pub sources: Vec<String>,
    pub targets: Vec<String>,
    pub end_arrow: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Geometry {
    pub nodes: Vec<PlacedNode>,
    pub edges: Vec<NormalizedEdge>,
}

/// Resolves every node to absolute coordinates (document order) and every
/// routed edge to an origin-shifted point list. Edges nested under a node are
/// shifted by that node's absolute origin first.
pub fn compile_geometry(
    graph: &LayoutGraph,
    max_depth: usize,
    diagnostics: &mut Vec<Diagnostic>,
) -> Geometry {
    let mut geometry = Geometry::default();
    let mut nested_edges: Vec<(Point, &LayoutEdge)> = Vec::new();
    place_into(
        &graph.children,
        Point::default(),
        None,
        0,
        max_depth,
        &mut geometry.nodes,
        &mut nested_edges,
        diagnostics,
    );

    let routed = graph
        .edges
        .iter()
        .map(|edge| (Point::default(), edge))
        .chain(nested_edges);
    for (origin, edge) in routed {
        match normalize_edge(edge, origin) {
            Some(normalized) => geometry.edges.push(normalized),
            None => Diagnostic::EmptyEdgeGeometry {
                edge: edge.id.clone().unwrap_or_default(),
            }
            .emit(diagnostics),
        }
    }

    tracing::debug!(
        nodes = geometry.nodes.len(),
        edges = geometry.edges.len(),
        "compiled geometry"
    );
    geometry
}

/// Accumulates parent offsets down the tree. An explicit `offset` is taken as
/// absolute and replaces the accumulated origin for that node.
pub fn place_nodes(
    nodes: &[LayoutNode],
    max_depth: usize,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<PlacedNode> {
    let mut placed = Vec::new();
    let mut nested_edges = Vec::new();
    place_into(
        nodes,
        Point::default(),
        None,
        0,
        max_depth,
        &mut placed,
        &mut nested_edges,
        diagnostics,
    );
    placed
}

#[allow(clippy::too_many_arguments)]
fn place_into<'a>(
    nodes: &'a [LayoutNode],
    parent_origin: Point,
    parent_id: Option<&str>,
    depth: usize,
    max_depth: usize,
    out: &mut Vec<PlacedNode>,
    nested_edges: &mut Vec<(Point, &'a LayoutEdge)>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for node in nodes {
        let origin = match node.offset {
            Some(offset) => Point::new(offset.pos_x, offset.pos_y),
            None => parent_origin.offset_by(node.x.unwrap_or(0.0), node.y.unwrap_or(0.0)),
        };
        out.push(PlacedNode {
            id: node.id.clone(),
            x: origin.x,
            y: origin.y,
            width: node.width.unwrap_or(0.0),
            height: node.height.unwrap_or(0.0),
            text: node.text.clone(),
            icon_id: node.icon_id.clone(),
            parent: parent_id.map(str::to_string),
            depth,
            is_container: !node.is_leaf(),
        });
        nested_edges.extend(node.edges.iter().map(|edge| (origin, edge)));

        if node.is_leaf() {
            continue;
        }
        if depth + 1 >= max_depth {
            Diagnostic::DepthLimit {
                id: node.id.clone(),
                max_depth,
            }
            .emit(diagnostics);
            continue;
        }
        place_into(
            &node.children,
            origin,
            Some(node.id.as_str()),
            depth + 1,
            max_depth,
            out,
            nested_edges,
            diagnostics,
        );
    }
}

/// Concatenates start, bend and end points of every section in order, falling
/// back to a pre-flattened `points` list.
pub fn flatten_route(edge: &LayoutEdge) -> Vec<Point> {
    if edge.sections.is_empty() {
        return edge.points.clone();
    }
    let mut points = Vec::new();
    for section in &edge.sections {
        points.push(section.start_point);
        points.extend(section.bend_points.iter().copied());
        points.push(section.end_point);
    }
    points
}

/// Returns `None` for an edge without routing points.
pub fn normalize_edge(edge: &LayoutEdge, origin: Point) -> Option<NormalizedEdge> {
    let route = flatten_route(edge);
    let first = route.first()?.offset_by(origin.x, origin.y);
    let points: Vec<[f64; 2]> = route
        .iter()
        .map(|p| {
            let p = p.offset_by(origin.x, origin.y);
            [p.x - first.x, p.y - first.y]
        })
        .collect();

    let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
    for [x, y] in &points {
        min_x = min_x.min(*x);
        max_x = max_x.max(*x);
        min_y = min_y.min(*y);
        max_y = max_y.max(*y);
    }

    Some(NormalizedEdge {
        id: edge.id.clone(),
        x: first.x,
        y: first.y,
        width: max_x - min_x,
        height: max_y - min_y,
        points,
        sources: edge.sources.clone(),
        targets: edge.targets.clone(),
        end_arrow: edge
            .edge_data
            .as_ref()
            .is_some_and(EdgeData::wants_end_arrow),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{EdgeSection, Offset};
    use proptest::prelude::*;

    fn node(id: &str, x: f64, y: f64, children: Vec<LayoutNode>) -> LayoutNode {
        LayoutNode {
            id: id.to_string(),
            x: Some(x),
            y: Some(y),
            width: Some(10.0),
            height: Some(10.0),
            children,
            ..Default::default()
        }
    }

    fn edge(points: &[(f64, f64)]) -> LayoutEdge {
        LayoutEdge {
            id: Some("e".to_string()),
            points: points.iter().map(|&(x, y)| Point::new(x, y)).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn nested_offsets_accumulate() {
        let tree = vec![node(
            "outer",
            10.0,
            10.0,
            vec![node("middle", 5.0, 5.0, vec![node("inner", 2.0, 2.0, vec![])])],
        )];
        let mut diags = Vec::new();
        let placed = place_nodes(&tree, 64, &mut diags);
        let ids: Vec<&str> = placed.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["outer", "middle", "inner"]);
        assert_eq!((placed[2].x, placed[2].y), (17.0, 17.0));
        assert_eq!(placed[2].parent.as_deref(), Some("middle"));
        assert_eq!(placed[2].depth, 2);
        assert!(placed[0].is_container && !placed[2].is_container);
    }

    #[test]
    fn explicit_offset_overrides_accumulation() {
        let mut child = node("child", 5.0, 5.0, vec![node("grandchild", 1.0, 1.0, vec![])]);
        child.offset = Some(Offset {
            pos_x: 300.0,
            pos_y: 40.0,
        });
        let tree = vec![node("parent", 100.0, 100.0, vec![child])];
        let mut diags = Vec::new();
        let placed = place_nodes(&tree, 64, &mut diags);
        assert_eq!((placed[1].x, placed[1].y), (300.0, 40.0));
        assert_eq!((placed[2].x, placed[2].y), (301.0, 41.0));
    }

    #[test]
    fn depth_budget_stops_descent() {
        let tree = vec![node("a", 0.0, 0.0, vec![node("b", 0.0, 0.0, vec![])])];
        let mut diags = Vec::new();
        let placed = place_nodes(&tree, 1, &mut diags);
        assert_eq!(placed.len(), 1);
        assert_eq!(diags.len(), 1);
    }

    #[test]
    fn sections_concatenate_in_order() {
        let edge = LayoutEdge {
            sections: vec![
                EdgeSection {
                    id: None,
                    start_point: Point::new(0.0, 0.0),
                    bend_points: vec![Point::new(10.0, 0.0)],
                    end_point: Point::new(10.0, 10.0),
                },
                EdgeSection {
                    id: None,
                    start_point: Point::new(10.0, 10.0),
                    bend_points: vec![],
                    end_point: Point::new(20.0, 10.0),
                },
            ],
            points: vec![Point::new(99.0, 99.0)],
            ..Default::default()
        };
        let route = flatten_route(&edge);
        assert_eq!(route.len(), 5);
        assert_eq!(route[4], Point::new(20.0, 10.0));
    }

    #[test]
    fn straight_edge_has_zero_height() {
        let normalized = normalize_edge(&edge(&[(128.0, 64.0), (200.0, 64.0)]), Point::default())
            .unwrap();
        assert_eq!((normalized.x, normalized.y), (128.0, 64.0));
        assert_eq!(normalized.points, vec![[0.0, 0.0], [72.0, 0.0]]);
        assert_eq!((normalized.width, normalized.height), (72.0, 0.0));
    }

    #[test]
    fn bounding_box_covers_backward_bends() {
        let normalized = normalize_edge(
            &edge(&[(50.0, 50.0), (20.0, 50.0), (20.0, 90.0), (80.0, 90.0)]),
            Point::default(),
        )
        .unwrap();
        assert_eq!(normalized.points[1], [-30.0, 0.0]);
        assert_eq!((normalized.width, normalized.height), (60.0, 40.0));
    }

    #[test]
    fn empty_route_is_skipped() {
        assert!(normalize_edge(&edge(&[]), Point::default()).is_none());
        let graph = LayoutGraph {
            edges: vec![edge(&[])],
            ..Default::default()
        };
        let mut diags = Vec::new();
        let geometry = compile_geometry(&graph, 64, &mut diags);
        assert!(geometry.edges.is_empty());
        assert!(matches!(diags[0], Diagnostic::EmptyEdgeGeometry { .. }));
    }

    #[test]
    fn container_edges_are_shifted_by_container_origin() {
        let mut container = node("vpc", 100.0, 50.0, vec![node("a", 8.0, 8.0, vec![])]);
        container.edges.push(edge(&[(8.0, 20.0), (40.0, 20.0)]));
        let graph = LayoutGraph {
            children: vec![container],
            ..Default::default()
        };
        let mut diags = Vec::new();
        let geometry = compile_geometry(&graph, 64, &mut diags);
        assert_eq!((geometry.edges[0].x, geometry.edges[0].y), (108.0, 70.0));
        assert_eq!(geometry.edges[0].width, 32.0);
    }

    proptest! {
        #[test]
        fn shifting_a_route_leaves_local_geometry_unchanged(
            raw in proptest::collection::vec((-500i32..500, -500i32..500), 1..8),
            dx in -1000i32..1000,
            dy in -1000i32..1000,
        ) {
            let base: Vec<(f64, f64)> = raw.iter().map(|&(x, y)| (x as f64, y as f64)).collect();
            let shifted: Vec<(f64, f64)> = base
                .iter()
                .map(|&(x, y)| (x + dx as f64, y + dy as f64))
                .collect();
            let a = normalize_edge(&edge(&base), Point::default()).unwrap();
            let b = normalize_edge(&edge(&shifted), Point::default()).unwrap();
            prop_assert_eq!(a.points, b.points);
            prop_assert_eq!(a.width, b.width);
            prop_assert_eq!(a.height, b.height);
        }
    }
}
