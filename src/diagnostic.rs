use serde::Serialize;

/// A recoverable input defect. The compiler repairs these locally and keeps going;
/// they are reported next to the output rather than as failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Diagnostic {
    #[error("node `{parent}` references unknown child `{child}`")]
    MissingChild { parent: String, child: String },
    #[error("node `{id}` lists itself as a child")]
    SelfReference { id: String },
    #[error("node `{child}` already belongs to `{kept}`; ignoring parent `{ignored}`")]
    DuplicateParent {
        child: String,
        kept: String,
        ignored: String,
    },
    #[error("duplicate node id `{id}`; keeping the first definition")]
    DuplicateNode { id: String },
    #[error("cycle through `{parent}` -> `{child}` severed")]
    CycleBroken { parent: String, child: String },
    #[error("nesting below `{id}` exceeds depth {max_depth}; children dropped")]
    DepthLimit { id: String, max_depth: usize },
    #[error("duplicate edge id `{id}`; renamed to `{renamed}`")]
    DuplicateEdge { id: String, renamed: String },
    #[error("edge `{edge}` references unknown node `{node}`")]
    MissingEndpoint { edge: String, node: String },
    #[error("edge `{edge}` has no usable {side}; left out of the layout request")]
    EdgeDropped { edge: String, side: &'static str },
    #[error("icon `{icon}` for node `{node}` is not registered; drawing a plain shape")]
    MissingIcon { node: String, icon: String },
    #[error("edge `{edge}` has no routing points; skipped")]
    EmptyEdgeGeometry { edge: String },
    #[error("arrow `{edge}` {side} endpoint `{node}` is not in the scene; left unbound")]
    UnboundEndpoint {
        edge: String,
        side: &'static str,
        node: String,
    },
    #[error("element id `{id}` is already taken; using `{replacement}`")]
    DuplicateElementId { id: String, replacement: String },
}

impl Diagnostic {
    pub(crate) fn emit(self, sink: &mut Vec<Diagnostic>) {
        tracing::warn!("{self}");
        sink.push(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_kind_tag() {
        let diag = Diagnostic::MissingIcon {
            node: "a".to_string(),
            icon: "nope".to_string(),
        };
        let value = serde_json::to_value(&diag).unwrap();
        assert_eq!(value["kind"], "missingIcon");
        assert_eq!(value["icon"], "nope");
        assert!(diag.to_string().contains("nope"));
    }
}
