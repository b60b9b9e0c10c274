use std::path::{Path, PathBuf};

use graph_scene::config::parse_config;
use graph_scene::layout::PrecomputedLayout;
use graph_scene::scene::{Arrowhead, BindingMode, BoundKind};
use graph_scene::{
    Config, Diagnostic, IconRegistry, LayoutGraph, Scene, VisualElement, compile_scene,
    parse_graph_document, prepare_layout_request, render_graph, validate_bindings,
};

fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn read_fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name)).expect("fixture read failed")
}

fn load_layout(name: &str) -> LayoutGraph {
    serde_json::from_str(&read_fixture(name)).expect("layout fixture parse failed")
}

fn icons() -> IconRegistry {
    IconRegistry::load(&fixture_path("icons.json")).expect("icon manifest load failed")
}

fn assert_consistent(scene: &Scene, fixture: &str) {
    let violations = validate_bindings(scene);
    assert!(
        violations.is_empty(),
        "{fixture}: dangling references: {}",
        violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
}

fn types(scene: &Scene) -> Vec<&'static str> {
    scene.elements.iter().map(VisualElement::type_name).collect()
}

#[test]
fn two_icons_and_one_straight_edge() {
    let config = Config::deterministic();
    let compiled = compile_scene(&load_layout("layout_basic.json"), &icons(), &config);
    let scene = &compiled.scene;
    assert_consistent(scene, "layout_basic.json");
    assert!(compiled.diagnostics.is_empty(), "{:?}", compiled.diagnostics);

    assert_eq!(types(scene), vec!["image", "text", "image", "text", "arrow"]);
    let arrows: Vec<_> = scene.arrows().collect();
    assert_eq!(arrows.len(), 1);
    let arrow = arrows[0];
    assert_eq!(arrow.points, vec![[0.0, 0.0], [72.0, 0.0]]);
    assert_eq!((arrow.base.x, arrow.base.y), (128.0, 64.0));
    assert_eq!((arrow.base.width, arrow.base.height), (72.0, 0.0));
    let start = arrow.start_binding.as_ref().expect("start binding");
    let end = arrow.end_binding.as_ref().expect("end binding");
    assert_eq!(start.element_id, "A");
    assert_eq!(end.element_id, "B");
    assert_eq!(start.mode, BindingMode::Orbit);
    assert_eq!(arrow.end_arrowhead, None);
    assert_eq!(scene.assets.len(), 2);
}

#[test]
fn end_to_end_through_an_engine() {
    let config = Config::deterministic();
    let document = parse_graph_document(&read_fixture("graph_basic.json")).expect("parse failed");

    let prepared = prepare_layout_request(&document, &config);
    assert!(prepared.diagnostics.is_empty());
    let request = serde_json::to_value(&prepared.request).expect("serialize failed");
    assert_eq!(request["id"], "root");
    assert_eq!(request["layoutOptions"]["elk.algorithm"], "elk.layered");
    assert_eq!(request["children"][0]["width"], 128.0);
    assert_eq!(request["children"][0]["height"], 153.0);
    assert_eq!(
        request["children"][0]["layoutOptions"]["elk.padding"],
        "[top=0,left=0,bottom=0,right=0]"
    );
    assert_eq!(request["edges"][0]["sources"][0], "A");

    let engine = PrecomputedLayout(load_layout("layout_basic.json"));
    let compiled = render_graph(&document, &engine, &icons(), &config).expect("render failed");
    let scene = &compiled.scene;
    assert_consistent(scene, "graph_basic.json");
    let non_arrows = scene
        .elements
        .iter()
        .filter(|element| !matches!(element, VisualElement::Arrow(_)))
        .count();
    assert_eq!(non_arrows, 4);

    // Labels sit directly under their icon and share its group.
    let (VisualElement::Image(image), VisualElement::Text(label)) =
        (&scene.elements[2], &scene.elements[3])
    else {
        panic!("unexpected element order: {:?}", types(scene));
    };
    assert_eq!((label.base.x, label.base.y), (200.0, 128.0));
    assert_eq!(label.text, "Lambda");
    assert_eq!(label.base.group_ids, image.base.group_ids);
    assert_eq!(label.container_id, None);
}

#[test]
fn agent_output_is_repaired_and_compiled() {
    let config = Config::deterministic();
    let document =
        parse_graph_document(&read_fixture("agent_output.md")).expect("agent output parse failed");
    let prepared = prepare_layout_request(&document, &config);
    assert_eq!(
        prepared.diagnostics,
        vec![
            Diagnostic::DuplicateNode {
                id: "web".to_string()
            },
            Diagnostic::MissingChild {
                parent: "vpc".to_string(),
                child: "ghost".to_string()
            },
            Diagnostic::CycleBroken {
                parent: "worker".to_string(),
                child: "vpc".to_string()
            },
            Diagnostic::MissingEndpoint {
                edge: "e3".to_string(),
                node: "nowhere".to_string()
            },
            Diagnostic::EdgeDropped {
                edge: "e3".to_string(),
                side: "source"
            },
        ]
    );

    let request = &prepared.request;
    let roots: Vec<&str> = request.children.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(roots, vec!["vpc", "bucket", "queue"]);
    let vpc = &request.children[0];
    assert!(vpc.width.is_none());
    assert_eq!(
        vpc.layout_options["elk.padding"],
        "[top=8,left=8,bottom=8,right=8]"
    );
    assert_eq!(vpc.children[1].text.as_deref(), Some("Order\nworker"));
    assert_eq!(request.children[1].height, Some(253.0));
    assert_eq!(request.edges.len(), 2);
    assert!(request.edges[0].edge_data.as_ref().unwrap().wants_end_arrow());

    let compiled = compile_scene(&load_layout("layout_nested.json"), &icons(), &config);
    let scene = &compiled.scene;
    assert_consistent(scene, "layout_nested.json");
    assert_eq!(
        types(scene),
        vec![
            "rectangle", "text", "image", "text", "image", "text", "image", "text", "rectangle",
            "text", "arrow", "arrow",
        ]
    );
    assert_eq!(scene.assets.len(), 3);
    assert!(matches!(
        &compiled.diagnostics[..],
        [
            Diagnostic::EmptyEdgeGeometry { .. },
            Diagnostic::MissingIcon { node, .. },
        ] if node == "queue"
    ));
}

#[test]
fn nested_coordinates_are_absolute() {
    let config = Config::deterministic();
    let compiled = compile_scene(&load_layout("layout_nested.json"), &icons(), &config);
    let scene = &compiled.scene;

    let worker = scene.element("worker").expect("worker element");
    assert_eq!((worker.base().x, worker.base().y), (236.0, 20.0));
    let bucket = scene.element("bucket").expect("bucket element");
    assert_eq!((bucket.base().x, bucket.base().y), (460.0, 20.0));

    // The container edge is reported relative to its container.
    let Some(VisualElement::Arrow(inner)) = scene.element("e1") else {
        panic!("missing container edge");
    };
    assert_eq!((inner.base.x, inner.base.y), (148.0, 84.0));
    assert_eq!(
        inner.points,
        vec![[0.0, 0.0], [44.0, 0.0], [44.0, 8.0], [88.0, 8.0]]
    );
    assert_eq!((inner.base.width, inner.base.height), (88.0, 8.0));
    assert_eq!(inner.end_arrowhead, Some(Arrowhead::Arrow));

    let Some(VisualElement::Arrow(fan_out)) = scene.element("e2") else {
        panic!("missing fan-out edge");
    };
    assert_eq!(
        fan_out.end_binding.as_ref().map(|b| b.element_id.as_str()),
        Some("bucket")
    );
}

#[test]
fn container_label_is_bound_and_centered() {
    let config = Config::deterministic();
    let compiled = compile_scene(&load_layout("layout_nested.json"), &icons(), &config);
    let scene = &compiled.scene;

    let (VisualElement::Shape(vpc), VisualElement::Text(label)) =
        (&scene.elements[0], &scene.elements[1])
    else {
        panic!("unexpected element order: {:?}", types(scene));
    };
    assert_eq!(vpc.base.id, "vpc");
    assert_eq!((vpc.base.width, vpc.base.height), (360.0, 177.0));
    assert_eq!(label.container_id.as_deref(), Some("vpc"));
    let center_x = label.base.x + label.base.width / 2.0;
    let center_y = label.base.y + label.base.height / 2.0;
    assert!((center_x - (12.0 + 180.0)).abs() < 1e-9);
    assert!((center_y - (12.0 + 88.5)).abs() < 1e-9);
}

#[test]
fn arrows_are_listed_on_the_nodes_they_bind() {
    let config = Config::deterministic();
    let compiled = compile_scene(&load_layout("layout_nested.json"), &icons(), &config);
    let worker = compiled.scene.element("worker").expect("worker element");
    let mut arrows: Vec<&str> = worker
        .base()
        .bound_elements
        .iter()
        .flatten()
        .filter(|bound| bound.kind == BoundKind::Arrow)
        .map(|bound| bound.id.as_str())
        .collect();
    arrows.sort_unstable();
    assert_eq!(arrows, vec!["e1", "e2"]);
}

#[test]
fn scene_document_matches_renderer_format() {
    let config = Config::deterministic();
    let compiled = compile_scene(&load_layout("layout_basic.json"), &icons(), &config);
    let value = serde_json::to_value(&compiled.scene).expect("serialize failed");

    assert_eq!(value["type"], "excalidraw");
    assert_eq!(value["version"], 2);
    assert_eq!(value["appState"]["gridSize"], 20);
    assert_eq!(value["appState"]["gridStep"], 5);
    assert_eq!(value["appState"]["viewBackgroundColor"], "#ffffff");

    let image = &value["elements"][0];
    assert_eq!(image["type"], "image");
    assert_eq!(image["status"], "saved");
    assert_eq!(image["scale"], serde_json::json!([1.0, 1.0]));
    let file_id = image["fileId"].as_str().expect("fileId");
    let file = &value["files"][file_id];
    assert_eq!(file["mimeType"], "image/svg+xml");
    assert!(
        file["dataURL"]
            .as_str()
            .expect("dataURL")
            .starts_with("data:image/svg+xml;base64,")
    );

    let text = &value["elements"][1];
    assert_eq!(text["fontSize"], 20.0);
    assert_eq!(text["fontFamily"], 5);
    assert_eq!(text["lineHeight"], 1.25);
    assert_eq!(text["textAlign"], "center");
    assert_eq!(text["verticalAlign"], "top");
    assert!(text["containerId"].is_null());

    let arrow = &value["elements"][4];
    assert_eq!(arrow["elbowed"], true);
    assert_eq!(arrow["startBinding"]["mode"], "orbit");
    assert!(arrow["startBinding"]["fixedPoint"].is_null());
    assert!(arrow["startArrowhead"].is_null());
}

#[test]
fn random_ids_differ_between_compiles() {
    let config = Config::default();
    let layout = load_layout("layout_basic.json");
    let first = compile_scene(&layout, &icons(), &config);
    let second = compile_scene(&layout, &icons(), &config);
    // Node-derived ids are stable, minted ones are not.
    assert_eq!(first.scene.elements[0].id(), second.scene.elements[0].id());
    assert_ne!(first.scene.elements[1].id(), second.scene.elements[1].id());
}

#[test]
fn document_type_follows_config() {
    let config = parse_config(r#"{"scene": {"documentType": "scene", "deterministicIds": true}}"#)
        .expect("config parse failed");
    let compiled = compile_scene(&load_layout("layout_basic.json"), &icons(), &config);
    assert_eq!(compiled.scene.kind, "scene");
    let value = serde_json::to_value(&compiled.scene).expect("serialize failed");
    assert_eq!(value["type"], "scene");
    assert!(value["files"].is_object());
}

#[test]
fn edge_ids_never_shadow_nodes() {
    let layout: LayoutGraph = serde_json::from_value(serde_json::json!({
        "id": "root",
        "children": [
            { "id": "A", "x": 0, "y": 0, "width": 128, "height": 153 },
            { "id": "B", "x": 200, "y": 0, "width": 128, "height": 153 }
        ],
        "edges": [
            { "id": "A", "sources": ["A"], "targets": ["B"],
              "sections": [{ "startPoint": { "x": 128, "y": 64 }, "endPoint": { "x": 200, "y": 64 } }] },
            { "id": "e2", "sources": ["B"], "targets": ["A"],
              "sections": [{ "startPoint": { "x": 200, "y": 90 }, "endPoint": { "x": 128, "y": 90 } }] },
            { "id": "e2", "sources": ["A"], "targets": ["B"],
              "sections": [{ "startPoint": { "x": 128, "y": 120 }, "endPoint": { "x": 200, "y": 120 } }] }
        ]
    }))
    .expect("layout parse failed");
    let compiled = compile_scene(&layout, &IconRegistry::default(), &Config::deterministic());
    let scene = &compiled.scene;
    assert_consistent(scene, "inline layout");

    let mut ids: Vec<&str> = scene.elements.iter().map(VisualElement::id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), scene.elements.len());

    let node_a = scene.element("A").expect("node A");
    assert_eq!(node_a.type_name(), "rectangle");
    let bound = node_a.base().bound_elements.as_ref().expect("arrows on A");
    assert_eq!(bound.len(), 3);
    assert_eq!(
        compiled
            .diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::DuplicateElementId { .. }))
            .count(),
        2
    );
}
