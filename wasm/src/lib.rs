use graph_scene::config::parse_config;
use graph_scene::{
    Config, Diagnostic, IconRegistry, LayoutGraph, Scene, compile_scene, parse_graph_document,
    prepare_layout_request,
};
use serde::Serialize;
use wasm_bindgen::prelude::*;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PrepareOutput {
    request: LayoutGraph,
    diagnostics: Vec<Diagnostic>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompileOutput {
    scene: Scene,
    diagnostics: Vec<Diagnostic>,
}

fn to_js(error: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn build_config(config_json: Option<String>) -> Result<Config, String> {
    match config_json {
        Some(raw) if !raw.trim().is_empty() => parse_config(&raw).map_err(|error| error.to_string()),
        _ => Ok(Config::default()),
    }
}

fn prepare(graph: &str, config_json: Option<String>) -> Result<String, String> {
    let config = build_config(config_json)?;
    let document = parse_graph_document(graph).map_err(|error| error.to_string())?;
    let prepared = prepare_layout_request(&document, &config);
    serde_json::to_string(&PrepareOutput {
        request: prepared.request,
        diagnostics: prepared.diagnostics,
    })
    .map_err(|error| error.to_string())
}

fn compile(
    layout: &str,
    icons_json: Option<String>,
    config_json: Option<String>,
) -> Result<String, String> {
    let config = build_config(config_json)?;
    let response: LayoutGraph = serde_json::from_str(layout).map_err(|error| error.to_string())?;
    let registry = match icons_json {
        Some(raw) => IconRegistry::from_json(&raw).map_err(|error| error.to_string())?,
        None => IconRegistry::default(),
    };
    let compiled = compile_scene(&response, &registry, &config);
    serde_json::to_string(&CompileOutput {
        scene: compiled.scene,
        diagnostics: compiled.diagnostics,
    })
    .map_err(|error| error.to_string())
}

/// Graph document (JSON, possibly fenced or JSON5) -> `{request, diagnostics}`.
#[wasm_bindgen(js_name = prepareLayoutRequest)]
pub fn prepare_layout_request_json(
    graph: &str,
    config_json: Option<String>,
) -> Result<String, JsValue> {
    prepare(graph, config_json).map_err(to_js)
}

/// Laid-out graph (JSON) -> `{scene, diagnostics}`.
#[wasm_bindgen(js_name = compileScene)]
pub fn compile_scene_json(
    layout: &str,
    icons_json: Option<String>,
    config_json: Option<String>,
) -> Result<String, JsValue> {
    compile(layout, icons_json, config_json).map_err(to_js)
}
