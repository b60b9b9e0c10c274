//! Icon registry and the per-scene asset table.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::scene::{AssetFile, IdGenerator};

const SVG_MIME: &str = "image/svg+xml";

static ARCH_PREFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^Arch_").unwrap());
static SIZE_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"_(16|32|48|64)$").unwrap());
static SEPARATOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[-_\s]+").unwrap());

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IconEntry {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// A `data:` URL, raw SVG markup, or base64 image data.
    #[serde(alias = "url", alias = "dataURL")]
    pub payload: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl IconEntry {
    /// Returns `(mime type, data URL)` ready to embed in a scene.
    pub fn embed(&self) -> (String, String) {
        let payload = self.payload.trim();
        if let Some(rest) = payload.strip_prefix("data:") {
            let mime = rest
                .split([';', ','])
                .next()
                .filter(|mime| !mime.is_empty())
                .map(str::to_string)
                .or_else(|| self.mime_type.clone())
                .unwrap_or_else(|| SVG_MIME.to_string());
            return (mime, payload.to_string());
        }
        if payload.starts_with('<') {
            let mime = SVG_MIME.to_string();
            let url = format!("data:{mime};base64,{}", STANDARD.encode(payload));
            return (mime, url);
        }
        let mime = self.mime_type.clone().unwrap_or_else(|| SVG_MIME.to_string());
        let url = format!("data:{mime};base64,{payload}");
        (mime, url)
    }
}

/// Read-only icon lookup, loaded once per process.
#[derive(Debug, Clone, Default)]
pub struct IconRegistry {
    icons: BTreeMap<String, IconEntry>,
}

impl IconRegistry {
    /// The first entry for a given id wins.
    pub fn new(entries: impl IntoIterator<Item = IconEntry>) -> Self {
        let mut icons = BTreeMap::new();
        for entry in entries {
            icons.entry(entry.id.clone()).or_insert(entry);
        }
        Self { icons }
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let entries: Vec<IconEntry> = serde_json::from_str(text)?;
        Ok(Self::new(entries))
    }

    pub fn load(path: &Path) -> crate::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&text)?)
    }

    /// Builds a registry from the image files under `dir` (recursively).
    pub fn from_dir(dir: &Path) -> crate::Result<Self> {
        let mut files = Vec::new();
        collect_image_files(dir, &mut files)?;
        files.sort();

        let mut entries = Vec::new();
        for path in files {
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let mime = mime_for(&path);
            let bytes = std::fs::read(&path)?;
            entries.push(IconEntry {
                id: stem.to_string(),
                name: icon_display_name(stem),
                payload: format!("data:{mime};base64,{}", STANDARD.encode(bytes)),
                mime_type: Some(mime.to_string()),
            });
        }
        tracing::debug!(icons = entries.len(), dir = %dir.display(), "scanned icon directory");
        Ok(Self::new(entries))
    }

    pub fn get(&self, id: &str) -> Option<&IconEntry> {
        self.icons.get(id)
    }

    pub fn len(&self) -> usize {
        self.icons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.icons.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &IconEntry> {
        self.icons.values()
    }

    /// Case-insensitive substring match on display names; empty term matches all.
    pub fn search(&self, term: &str) -> Vec<&IconEntry> {
        let needle = term.trim().to_lowercase();
        self.iter()
            .filter(|entry| needle.is_empty() || entry.name.to_lowercase().contains(&needle))
            .collect()
    }
}

/// `Arch_Amazon-Simple-Storage-Service_64` -> `amazon simple storage service`.
pub fn icon_display_name(stem: &str) -> String {
    let name = ARCH_PREFIX_RE.replace(stem, "");
    let name = SIZE_SUFFIX_RE.replace(&name, "");
    SEPARATOR_RE
        .replace_all(&name, " ")
        .trim()
        .to_lowercase()
}

fn collect_image_files(dir: &Path, out: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_image_files(&path, out)?;
        } else if is_image(&path) {
            out.push(path);
        }
    }
    Ok(())
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

fn is_image(path: &Path) -> bool {
    matches!(
        extension(path).as_deref(),
        Some("svg" | "png" | "jpg" | "jpeg")
    )
}

fn mime_for(path: &Path) -> &'static str {
    match extension(path).as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        _ => SVG_MIME,
    }
}

/// Scene-scoped asset table. Each icon is embedded at most once; later
/// references reuse the first file id. Unknown icons resolve to `None`.
#[derive(Debug)]
pub struct AssetResolver<'r> {
    registry: &'r IconRegistry,
    resolved: HashMap<String, Option<String>>,
    files: BTreeMap<String, AssetFile>,
    timestamp: u64,
}

impl<'r> AssetResolver<'r> {
    pub fn new(registry: &'r IconRegistry, timestamp: u64) -> Self {
        Self {
            registry,
            resolved: HashMap::new(),
            files: BTreeMap::new(),
            timestamp,
        }
    }

    /// Returns the file id for `icon_id`, embedding the payload on first use.
    pub fn resolve(&mut self, icon_id: &str, ids: &mut IdGenerator) -> Option<String> {
        if let Some(cached) = self.resolved.get(icon_id) {
            return cached.clone();
        }
        let registry = self.registry;
        let file_id = registry.get(icon_id).map(|entry| {
            let (mime_type, data_url) = entry.embed();
            let file_id = ids.mint("file");
            self.files.insert(
                file_id.clone(),
                AssetFile {
                    id: file_id.clone(),
                    data_url,
                    mime_type,
                    created: self.timestamp,
                    last_retrieved: self.timestamp,
                },
            );
            file_id
        });
        self.resolved.insert(icon_id.to_string(), file_id.clone());
        file_id
    }

    pub fn into_files(self) -> BTreeMap<String, AssetFile> {
        self.files
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, payload: &str) -> IconEntry {
        IconEntry {
            id: id.to_string(),
            name: icon_display_name(id),
            payload: payload.to_string(),
            mime_type: None,
        }
    }

    #[test]
    fn display_name_strips_catalog_decorations() {
        assert_eq!(
            icon_display_name("Arch_Amazon-Simple-Storage-Service_64"),
            "amazon simple storage service"
        );
        assert_eq!(icon_display_name("AWS-Lambda"), "aws lambda");
        assert_eq!(icon_display_name("ec2_instance_48x"), "ec2 instance 48x");
    }

    #[test]
    fn embeds_each_payload_form() {
        let (mime, url) = entry("a", "data:image/png;base64,AAAA").embed();
        assert_eq!(mime, "image/png");
        assert_eq!(url, "data:image/png;base64,AAAA");

        let (mime, url) = entry("b", "<svg/>").embed();
        assert_eq!(mime, SVG_MIME);
        assert_eq!(url, format!("data:image/svg+xml;base64,{}", STANDARD.encode("<svg/>")));

        let (_, url) = entry("c", "PHN2Zy8+").embed();
        assert_eq!(url, "data:image/svg+xml;base64,PHN2Zy8+");
    }

    #[test]
    fn manifest_accepts_url_field() {
        let registry = IconRegistry::from_json(
            r#"[{"id": "s3", "name": "s3", "url": "data:image/svg+xml;base64,AAAA"},
                {"id": "s3", "name": "shadowed", "url": "<svg/>"}]"#,
        )
        .unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("s3").unwrap().name, "s3");
    }

    #[test]
    fn search_matches_names_case_insensitively() {
        let registry = IconRegistry::new([
            entry("AWS-Lambda", "<svg/>"),
            entry("Amazon-S3", "<svg/>"),
        ]);
        let hits: Vec<&str> = registry.search("LAMBDA").iter().map(|e| e.id.as_str()).collect();
        assert_eq!(hits, vec!["AWS-Lambda"]);
        assert_eq!(registry.search("").len(), 2);
    }

    #[test]
    fn resolver_embeds_once_per_icon() {
        let registry = IconRegistry::new([entry("s3", "<svg/>")]);
        let mut ids = IdGenerator::new(true);
        let mut resolver = AssetResolver::new(&registry, 7);
        let first = resolver.resolve("s3", &mut ids).unwrap();
        let second = resolver.resolve("s3", &mut ids).unwrap();
        assert_eq!(first, second);
        assert!(resolver.resolve("nope", &mut ids).is_none());
        assert!(resolver.resolve("nope", &mut ids).is_none());
        let files = resolver.into_files();
        assert_eq!(files.len(), 1);
        assert_eq!(files[&first].created, 7);
        assert_eq!(files[&first].mime_type, SVG_MIME);
    }

    #[test]
    fn scans_icon_directory() {
        let dir = std::env::temp_dir().join(format!("graph-scene-icons-{}", std::process::id()));
        let nested = dir.join("compute");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("Arch_AWS-Lambda_64.svg"), "<svg/>").unwrap();
        std::fs::write(dir.join("Amazon-S3.PNG"), [0x89u8, 0x50]).unwrap();
        std::fs::write(dir.join("notes.txt"), "skip").unwrap();

        let registry = IconRegistry::from_dir(&dir).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();

        assert_eq!(registry.len(), 2);
        let lambda = registry.get("Arch_AWS-Lambda_64").unwrap();
        assert_eq!(lambda.name, "aws lambda");
        assert!(lambda.payload.starts_with("data:image/svg+xml;base64,"));
        assert_eq!(registry.get("Amazon-S3").unwrap().embed().0, "image/png");
    }
}
