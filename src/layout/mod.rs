//! Everything between the normalized forest and absolute scene geometry:
//! label sizing, the engine request/response model, the engine seam and the
//! post-layout coordinate pass.

pub mod engine;
pub mod geometry;
pub mod sizing;
pub mod text;
pub(crate) mod types;

pub use engine::{
    CommandLayoutEngine, LayoutEngine, LayoutEngineError, PrecomputedLayout, RetryingEngine,
    engine_from_config,
};
pub use geometry::{Geometry, NormalizedEdge, PlacedNode, compile_geometry};
pub use sizing::annotate_forest;
pub use types::*;
