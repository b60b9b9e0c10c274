use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ICON_DIM: f64 = 128.0;
pub const CONTAINER_PADDING: f64 = 8.0;
pub const MAX_NESTING_DEPTH: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizingConfig {
    pub icon_dim: f64,
    pub container_padding: f64,
    pub leaf_padding: f64,
    /// Nesting budget shared by every recursive pass.
    pub max_depth: usize,
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            icon_dim: ICON_DIM,
            container_padding: CONTAINER_PADDING,
            leaf_padding: 0.0,
            max_depth: MAX_NESTING_DEPTH,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneConfig {
    pub document_type: String,
    pub version: u32,
    pub source: String,
    pub grid_size: u32,
    pub grid_step: u32,
    pub grid_mode_enabled: bool,
    /// Mint `prefix-N` ids instead of random UUIDs.
    pub deterministic_ids: bool,
    pub updated: u64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            document_type: "excalidraw".to_string(),
            version: 2,
            source: "graph-scene".to_string(),
            grid_size: 20,
            grid_step: 5,
            grid_mode_enabled: false,
            deterministic_ids: false,
            updated: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub command: Option<String>,
    pub args: Vec<String>,
    pub timeout_ms: u64,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            timeout_ms: 30_000,
            retry_attempts: 3,
            retry_backoff_ms: 250,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub theme: Theme,
    pub sizing: SizingConfig,
    pub scene: SceneConfig,
    pub engine: EngineConfig,
}

impl Config {
    /// Defaults with sequential ids, for reproducible scenes.
    pub fn deterministic() -> Self {
        let mut config = Self::default();
        config.scene.deterministic_ids = true;
        config
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ThemeFile {
    stroke_color: Option<String>,
    background_color: Option<String>,
    fill_style: Option<String>,
    stroke_width: Option<f64>,
    stroke_style: Option<String>,
    roughness: Option<u32>,
    opacity: Option<u32>,
    font_family: Option<u32>,
    font_size: Option<f64>,
    line_height: Option<f64>,
    char_width_ratio: Option<f64>,
    view_background: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SizingFile {
    icon_dim: Option<f64>,
    container_padding: Option<f64>,
    leaf_padding: Option<f64>,
    max_depth: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SceneFile {
    document_type: Option<String>,
    version: Option<u32>,
    source: Option<String>,
    grid_size: Option<u32>,
    grid_step: Option<u32>,
    grid_mode_enabled: Option<bool>,
    deterministic_ids: Option<bool>,
    updated: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct EngineFile {
    command: Option<String>,
    args: Option<Vec<String>>,
    timeout_ms: Option<u64>,
    retry_attempts: Option<u32>,
    retry_backoff_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeFile>,
    sizing: Option<SizingFile>,
    scene: Option<SceneFile>,
    engine: Option<EngineFile>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let parsed: ConfigFile = serde_json::from_str(contents)?;
    let mut config = Config::default();

    if let Some(theme_name) = parsed.theme.as_deref() {
        match theme_name {
            "sketch" => config.theme = Theme::sketch(),
            "default" | "excalidraw" => config.theme = Theme::excalidraw_default(),
            other => anyhow::bail!("unknown theme: {other}"),
        }
    }

    if let Some(vars) = parsed.theme_variables {
        let theme = &mut config.theme;
        if let Some(v) = vars.stroke_color {
            theme.stroke_color = v;
        }
        if let Some(v) = vars.background_color {
            theme.background_color = v;
        }
        if let Some(v) = vars.fill_style {
            theme.fill_style = v;
        }
        if let Some(v) = vars.stroke_width {
            theme.stroke_width = v;
        }
        if let Some(v) = vars.stroke_style {
            theme.stroke_style = v;
        }
        if let Some(v) = vars.roughness {
            theme.roughness = v;
        }
        if let Some(v) = vars.opacity {
            theme.opacity = v.min(100);
        }
        if let Some(v) = vars.font_family {
            theme.font_family = v;
        }
        if let Some(v) = vars.font_size {
            theme.font_size = v;
        }
        if let Some(v) = vars.line_height {
            theme.line_height = v;
        }
        if let Some(v) = vars.char_width_ratio {
            theme.char_width_ratio = v;
        }
        if let Some(v) = vars.view_background {
            theme.view_background = v;
        }
    }

    if let Some(sizing) = parsed.sizing {
        if let Some(v) = sizing.icon_dim {
            config.sizing.icon_dim = v;
        }
        if let Some(v) = sizing.container_padding {
            config.sizing.container_padding = v;
        }
        if let Some(v) = sizing.leaf_padding {
            config.sizing.leaf_padding = v;
        }
        if let Some(v) = sizing.max_depth {
            config.sizing.max_depth = v.max(1);
        }
    }

    if let Some(scene) = parsed.scene {
        if let Some(v) = scene.document_type {
            config.scene.document_type = v;
        }
        if let Some(v) = scene.version {
            config.scene.version = v;
        }
        if let Some(v) = scene.source {
            config.scene.source = v;
        }
        if let Some(v) = scene.grid_size {
            config.scene.grid_size = v;
        }
        if let Some(v) = scene.grid_step {
            config.scene.grid_step = v;
        }
        if let Some(v) = scene.grid_mode_enabled {
            config.scene.grid_mode_enabled = v;
        }
        if let Some(v) = scene.deterministic_ids {
            config.scene.deterministic_ids = v;
        }
        if let Some(v) = scene.updated {
            config.scene.updated = v;
        }
    }

    if let Some(engine) = parsed.engine {
        if engine.command.is_some() {
            config.engine.command = engine.command;
        }
        if let Some(v) = engine.args {
            config.engine.args = v;
        }
        if let Some(v) = engine.timeout_ms {
            config.engine.timeout_ms = v;
        }
        if let Some(v) = engine.retry_attempts {
            config.engine.retry_attempts = v.max(1);
        }
        if let Some(v) = engine.retry_backoff_ms {
            config.engine.retry_backoff_ms = v;
        }
    }

    Ok(config)
}
