use crate::layout::engine::LayoutEngineError;

/// Failures that stop a pipeline stage. Recoverable input defects are
/// [`Diagnostic`](crate::Diagnostic)s instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Layout(#[from] LayoutEngineError),
    #[error("invalid graph document: {0}")]
    Document(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
