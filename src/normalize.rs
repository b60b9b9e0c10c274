//! Rebuilds the rooted forest behind a flat, reference-based graph document.
//!
//! Children are claimed by the first parent that lists them. Dangling
//! references, self references and reference cycles are repaired locally and
//! reported as [`Diagnostic`]s; nothing here fails.

use std::collections::{HashMap, HashSet};

use crate::diagnostic::Diagnostic;
use crate::ir::{GraphDocument, GraphEdge};

#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub id: String,
    pub text: Option<String>,
    pub icon_id: Option<String>,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Pre-order (document order) traversal.
    pub fn walk(&self) -> impl Iterator<Item = &TreeNode> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.iter().rev());
            Some(node)
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Forest {
    pub roots: Vec<TreeNode>,
    pub edges: Vec<GraphEdge>,
}

impl Forest {
    pub fn nodes(&self) -> impl Iterator<Item = &TreeNode> {
        self.roots.iter().flat_map(TreeNode::walk)
    }
}

pub fn normalize_graph(
    doc: &GraphDocument,
    max_depth: usize,
    diagnostics: &mut Vec<Diagnostic>,
) -> Forest {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut nodes = Vec::new();
    for node in &doc.nodes {
        if index.contains_key(node.id.as_str()) {
            Diagnostic::DuplicateNode {
                id: node.id.clone(),
            }
            .emit(diagnostics);
            continue;
        }
        index.insert(node.id.as_str(), nodes.len());
        nodes.push(node);
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut parent_of: Vec<Option<usize>> = vec![None; nodes.len()];
    for (parent, node) in nodes.iter().enumerate() {
        for child_id in &node.children_ids {
            if *child_id == node.id {
                Diagnostic::SelfReference {
                    id: node.id.clone(),
                }
                .emit(diagnostics);
                continue;
            }
            let Some(&child) = index.get(child_id.as_str()) else {
                Diagnostic::MissingChild {
                    parent: node.id.clone(),
                    child: child_id.clone(),
                }
                .emit(diagnostics);
                continue;
            };
            match parent_of[child] {
                Some(kept) if kept == parent => {}
                Some(kept) => Diagnostic::DuplicateParent {
                    child: child_id.clone(),
                    kept: nodes[kept].id.clone(),
                    ignored: node.id.clone(),
                }
                .emit(diagnostics),
                None => {
                    parent_of[child] = Some(parent);
                    children[parent].push(child);
                }
            }
        }
    }

    break_cycles(&nodes, &mut children, &mut parent_of, diagnostics);

    let mut included = HashSet::new();
    let roots: Vec<TreeNode> = (0..nodes.len())
        .filter(|&idx| parent_of[idx].is_none())
        .map(|idx| {
            build_tree(
                idx,
                0,
                &nodes,
                &children,
                max_depth,
                &mut included,
                diagnostics,
            )
        })
        .collect();

    // Edge ids become element ids downstream, so they share a namespace with
    // node ids.
    let reserved: HashSet<&str> = index
        .keys()
        .copied()
        .chain(doc.edges.iter().map(|edge| edge.id.as_str()))
        .collect();
    let mut taken: HashSet<String> = index.keys().map(|id| id.to_string()).collect();
    let edges = doc
        .edges
        .iter()
        .map(|edge| {
            let id = unique_edge_id(&edge.id, &reserved, &mut taken, diagnostics);
            GraphEdge {
                source_ids: retain_known(&id, &edge.source_ids, &included, diagnostics),
                target_ids: retain_known(&id, &edge.target_ids, &included, diagnostics),
                edge_data: edge.edge_data.clone(),
                id,
            }
        })
        .collect();

    tracing::debug!(
        nodes = included.len(),
        roots = roots.len(),
        "normalized graph forest"
    );
    Forest { roots, edges }
}

/// Every node not reachable from a natural root sits on (or under) a cycle.
/// The earliest cycle member in document order becomes a root and the
/// reference pointing back at it is dropped.
fn break_cycles(
    nodes: &[&crate::ir::GraphNode],
    children: &mut [Vec<usize>],
    parent_of: &mut [Option<usize>],
    diagnostics: &mut Vec<Diagnostic>,
) {
    let mut reached = vec![false; nodes.len()];
    for idx in 0..nodes.len() {
        if parent_of[idx].is_none() {
            mark_reachable(idx, children, &mut reached);
        }
    }

    for start in 0..nodes.len() {
        if reached[start] {
            continue;
        }
        let mut seen = HashSet::new();
        let mut cursor = start;
        while seen.insert(cursor) {
            match parent_of[cursor] {
                Some(parent) => cursor = parent,
                None => break,
            }
        }
        let mut head = cursor;
        let mut walker = cursor;
        while let Some(parent) = parent_of[walker] {
            if parent == cursor {
                break;
            }
            head = head.min(parent);
            walker = parent;
        }
        if let Some(parent) = parent_of[head].take() {
            children[parent].retain(|&child| child != head);
            Diagnostic::CycleBroken {
                parent: nodes[parent].id.clone(),
                child: nodes[head].id.clone(),
            }
            .emit(diagnostics);
        }
        mark_reachable(head, children, &mut reached);
    }
}

fn mark_reachable(root: usize, children: &[Vec<usize>], reached: &mut [bool]) {
    let mut stack = vec![root];
    while let Some(idx) = stack.pop() {
        if std::mem::replace(&mut reached[idx], true) {
            continue;
        }
        stack.extend(children[idx].iter().copied());
    }
}

fn build_tree(
    idx: usize,
    depth: usize,
    nodes: &[&crate::ir::GraphNode],
    children: &[Vec<usize>],
    max_depth: usize,
    included: &mut HashSet<String>,
    diagnostics: &mut Vec<Diagnostic>,
) -> TreeNode {
    let node = nodes[idx];
    included.insert(node.id.clone());
    let nested = if children[idx].is_empty() {
        Vec::new()
    } else if depth + 1 >= max_depth {
        Diagnostic::DepthLimit {
            id: node.id.clone(),
            max_depth,
        }
        .emit(diagnostics);
        Vec::new()
    } else {
        children[idx]
            .iter()
            .map(|&child| {
                build_tree(
                    child,
                    depth + 1,
                    nodes,
                    children,
                    max_depth,
                    included,
                    diagnostics,
                )
            })
            .collect()
    };
    TreeNode {
        id: node.id.clone(),
        text: node.text.clone(),
        icon_id: node.icon_id.clone(),
        children: nested,
    }
}

/// Keeps the first use of an edge id; later uses get the next free `id-N`.
fn unique_edge_id(
    id: &str,
    reserved: &HashSet<&str>,
    taken: &mut HashSet<String>,
    diagnostics: &mut Vec<Diagnostic>,
) -> String {
    if id.is_empty() || taken.insert(id.to_string()) {
        return id.to_string();
    }
    let mut n = 2;
    let renamed = loop {
        let candidate = format!("{id}-{n}");
        if !reserved.contains(candidate.as_str()) && !taken.contains(&candidate) {
            break candidate;
        }
        n += 1;
    };
    taken.insert(renamed.clone());
    Diagnostic::DuplicateEdge {
        id: id.to_string(),
        renamed: renamed.clone(),
    }
    .emit(diagnostics);
    renamed
}

fn retain_known(
    edge: &str,
    ids: &[String],
    included: &HashSet<String>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<String> {
    ids.iter()
        .filter(|id| {
            let known = included.contains(id.as_str());
            if !known {
                Diagnostic::MissingEndpoint {
                    edge: edge.to_string(),
                    node: (*id).clone(),
                }
                .emit(diagnostics);
            }
            known
        })
        .cloned()
        .collect()
}
