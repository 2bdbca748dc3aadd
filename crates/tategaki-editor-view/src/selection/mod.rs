//! Selection and caret mapping.
//!
//! Buffer offsets are the only coordinates the editor understands; this
//! module translates them to and from presenter geometry, moves the caret by
//! visual lines under wrapping, and builds the selection overlay.

pub mod mapping;
pub mod navigation;
pub mod overlay;

pub use mapping::{
    LineView, ProjectionSource, adjacent_visible, caret_rect, normalize_offset_to_visible,
    offset_from_point, offset_of_visible_index, visible_index_of, visible_len, visual_rows,
};
pub use navigation::{NavIntent, NavUnit, move_offset, move_selection, nav_intent};
pub use overlay::{SelectionOverlay, SoftSelection, build_overlay, selection_rects};
