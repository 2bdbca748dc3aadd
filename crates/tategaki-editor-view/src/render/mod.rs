//! Rendering: the abstract render tree, the line renderer and the pipeline
//! that keeps the tree in step with the buffer.

pub mod line;
pub mod pipeline;
pub mod tree;

pub use line::{render_line, render_line_light, with_pending};
pub use pipeline::{PatchPath, PatchReport, RenderPipeline, RenderSettings};
pub use tree::{LineElement, LineState, RenderNode, RenderTree};
