//! tategaki-editor-core: the framework-agnostic model behind the vertical
//! markdown view.
//!
//! This crate provides:
//! - `TextBuffer` trait and the ropey-backed `EditorRope`
//! - `SourceEditor`, with `PlainEditor` as the undoable reference editor
//! - `LineModel`: line ranges, block kinds, folds and reference tables
//! - inline decoration (`decorate_line`) and the segment builder
//! - formatting commands and `execute_action`
//!
//! All offsets are char offsets into the buffer.

pub mod actions;
pub mod decoration;
pub mod document;
pub mod error;
pub mod execute;
pub mod format;
pub mod highlight;
pub mod line_cache;
pub mod line_model;
pub mod math;
pub mod scan;
pub mod segment;
pub mod text;
pub mod text_helpers;
pub mod types;
pub mod undo;

pub use actions::{EditorAction, InputType, Key, KeyCombo, KeydownResult, Modifiers};
pub use decoration::{
    DecorationContext, InlineStyle, InlineWidget, InlineWidgetKind, LineDecorations,
    MarkdownTreeProvider, SpanClass, SyntaxTreeProvider, decorate_line,
};
pub use document::{ChangeSpec, PlainEditor, SourceEditor, Transaction, map_offset};
pub use error::CoreError;
pub use execute::execute_action;
pub use format::{clear_formatting, clear_ruby, insert_ruby, is_inline_style_active, toggle_inline_style};
pub use highlight::{HighlightRun, Highlighter, SyntectHighlighter};
pub use line_cache::{LineCache, SegmentKey, hash_source};
pub use line_model::{
    BlockKind, CodePart, LineInfo, LineModel, LineRange, OutlineEntry, ReferenceTables,
    compute_line_ranges, recompute_line_block_kinds,
};
pub use math::{LatexRenderer, MathRenderer};
pub use segment::{
    LineProjection, RenderSegment, SegmentContext, build_line_projection, build_segments_for_line,
};
pub use smol_str::SmolStr;
pub use text::{EditorRope, TextBuffer};
pub use types::{
    BLOCK_SYNTAX_ZONE, ChangeRecord, CompositionState, EditorUpdate, Selection, WritingMode,
};
pub use undo::{UndoManager, UndoableBuffer};
