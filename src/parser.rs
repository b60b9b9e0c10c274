//! Reads graph documents as produced by the upstream generator. Generators
//! tend to wrap JSON in prose or markdown fences, leave trailing commas, or
//! nest children inline; all of that is accepted here and folded into the
//! flat `childrenIds` form.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};
use crate::ir::{GraphDocument, GraphNode};

static FENCE_INFO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:json5?|jsonc)?$").unwrap());

pub fn parse_graph_document(input: &str) -> Result<GraphDocument> {
    let payload = extract_json_payload(input);
    let document = match serde_json::from_str::<GraphDocument>(payload) {
        Ok(document) => document,
        Err(strict) => match json5::from_str::<GraphDocument>(payload) {
            Ok(document) => {
                tracing::debug!("graph document is not strict JSON; accepted as JSON5");
                document
            }
            Err(_) => return Err(Error::Document(strict.to_string())),
        },
    };
    Ok(flatten_nested_children(document))
}

/// Returns the first fenced JSON block if there is one, otherwise the
/// outermost `{...}` span, otherwise the trimmed input.
pub fn extract_json_payload(input: &str) -> &str {
    if let Some(block) = first_fenced_block(input) {
        return block;
    }
    let trimmed = input.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

fn first_fenced_block(input: &str) -> Option<&str> {
    let mut offset = 0;
    // (fence, body start, is json)
    let mut open: Option<(&str, usize, bool)> = None;
    for line in input.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let trimmed = line.trim();
        match open {
            None => {
                if let Some((fence, is_json)) = detect_fence(trimmed) {
                    open = Some((fence, offset, is_json));
                }
            }
            Some((fence, body_start, is_json)) => {
                if is_fence_end(trimmed, fence) {
                    if is_json {
                        return Some(input[body_start..line_start].trim());
                    }
                    open = None;
                }
            }
        }
    }
    // An unterminated fence still carries the payload.
    match open {
        Some((_, body_start, true)) => Some(input[body_start..].trim()),
        _ => None,
    }
}

fn detect_fence(line: &str) -> Option<(&'static str, bool)> {
    for fence in ["```", "~~~"] {
        if let Some(rest) = line.strip_prefix(fence) {
            let marker = fence.chars().next().unwrap_or('`');
            let info = rest.trim_start_matches(marker).trim().to_ascii_lowercase();
            return Some((fence, FENCE_INFO_RE.is_match(&info)));
        }
    }
    None
}

fn is_fence_end(line: &str, fence: &str) -> bool {
    if !line.starts_with(fence) {
        return false;
    }
    line[fence.len()..].trim().is_empty()
}

/// Hoists inline `children` to the top-level node list (pre-order, right
/// after their parent) and records them in the parent's `childrenIds`.
pub fn flatten_nested_children(document: GraphDocument) -> GraphDocument {
    let GraphDocument { nodes, edges } = document;
    let mut flat = Vec::with_capacity(nodes.len());
    let mut stack: Vec<GraphNode> = nodes.into_iter().rev().collect();
    while let Some(mut node) = stack.pop() {
        let nested = std::mem::take(&mut node.children);
        let mut listed: HashSet<String> = node.children_ids.iter().cloned().collect();
        for child in &nested {
            if listed.insert(child.id.clone()) {
                node.children_ids.push(child.id.clone());
            }
        }
        flat.push(node);
        stack.extend(nested.into_iter().rev());
    }
    GraphDocument { nodes: flat, edges }
}
