use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Theme {
    pub stroke_color: String,
    pub background_color: String,
    pub fill_style: String,
    pub stroke_width: f64,
    pub stroke_style: String,
    pub roughness: u32,
    pub opacity: u32,
    pub font_family: u32,
    pub font_size: f64,
    pub line_height: f64,
    /// Average glyph advance as a fraction of the font size.
    pub char_width_ratio: f64,
    pub view_background: String,
}

impl Theme {
    pub fn excalidraw_default() -> Self {
        Self {
            stroke_color: "#1e1e1e".to_string(),
            background_color: "transparent".to_string(),
            fill_style: "solid".to_string(),
            stroke_width: 2.0,
            stroke_style: "solid".to_string(),
            roughness: 1,
            opacity: 100,
            font_family: 5,
            font_size: 20.0,
            line_height: 1.25,
            char_width_ratio: 0.54,
            view_background: "#ffffff".to_string(),
        }
    }

    pub fn sketch() -> Self {
        Self {
            stroke_color: "#343a40".to_string(),
            fill_style: "hachure".to_string(),
            stroke_width: 1.0,
            roughness: 2,
            font_family: 1,
            ..Self::excalidraw_default()
        }
    }

    pub fn char_width(&self) -> f64 {
        self.font_size * self.char_width_ratio
    }

    pub fn line_advance(&self) -> f64 {
        self.font_size * self.line_height
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::excalidraw_default()
    }
}
