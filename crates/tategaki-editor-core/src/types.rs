//! Core editor types: selection, change records, composition and writing mode.
//!
//! These types are framework-agnostic and shared by the model and the view.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Text selection with anchor and head positions.
///
/// The anchor is where the selection started, the head is where the caret is now.
/// They may be in any order - use `start()` and `end()` for ordered bounds.
#[derive(Clone, Debug, Copy, PartialEq, Eq, Default)]
pub struct Selection {
    /// Where selection started
    pub anchor: usize,
    /// Where the caret is now
    pub head: usize,
}

impl Selection {
    /// Create a new selection.
    pub fn new(anchor: usize, head: usize) -> Self {
        Self { anchor, head }
    }

    /// Create a collapsed selection (caret position).
    pub fn collapsed(offset: usize) -> Self {
        Self {
            anchor: offset,
            head: offset,
        }
    }

    /// Get the start (lower bound) of the selection.
    pub fn start(&self) -> usize {
        self.anchor.min(self.head)
    }

    /// Get the end (upper bound) of the selection.
    pub fn end(&self) -> usize {
        self.anchor.max(self.head)
    }

    /// Check if the selection is collapsed (caret only).
    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.head
    }

    /// Check if an offset is within the selection.
    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.start() && offset < self.end()
    }

    /// Get the selection length.
    pub fn len(&self) -> usize {
        self.end() - self.start()
    }

    /// Check if empty (same as is_collapsed).
    pub fn is_empty(&self) -> bool {
        self.is_collapsed()
    }

    /// Convert to a Range<usize> (ordered).
    pub fn to_range(&self) -> Range<usize> {
        self.start()..self.end()
    }

    /// Check if the selection is backwards (head before anchor).
    pub fn is_backwards(&self) -> bool {
        self.head < self.anchor
    }

    /// Clamp both ends into `0..=len`.
    pub fn clamped(&self, len: usize) -> Self {
        Self {
            anchor: self.anchor.min(len),
            head: self.head.min(len),
        }
    }
}

/// One replaced span, as emitted by the editor abstraction.
///
/// `from..to` is in pre-change coordinates, `from_b..to_b` is the same span
/// after the change. Records of one update are ordered and non-overlapping.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeRecord {
    pub from: usize,
    pub to: usize,
    pub from_b: usize,
    pub to_b: usize,
    pub insert: SmolStr,
}

impl ChangeRecord {
    /// Build a record for replacing `from..to` with `insert`, where `delta`
    /// is the accumulated length change of the records before this one.
    pub fn replace(from: usize, to: usize, insert: &str, delta: isize) -> Self {
        let from_b = (from as isize + delta) as usize;
        let inserted = insert.chars().count();
        Self {
            from,
            to,
            from_b,
            to_b: from_b + inserted,
            insert: SmolStr::new(insert),
        }
    }

    /// Net change in document length caused by this record.
    pub fn len_delta(&self) -> isize {
        (self.to_b - self.from_b) as isize - (self.to - self.from) as isize
    }

    /// Whether the inserted text contains a line break.
    pub fn inserts_newline(&self) -> bool {
        self.insert.contains('\n')
    }
}

/// Notification emitted by the editor after every mutation or selection change.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct EditorUpdate {
    pub doc_changed: bool,
    pub changes: Vec<ChangeRecord>,
    pub selection_changed: bool,
    pub selection: Selection,
}

impl EditorUpdate {
    /// An update that only moved the selection.
    pub fn selection_only(selection: Selection) -> Self {
        Self {
            doc_changed: false,
            changes: Vec::new(),
            selection_changed: true,
            selection,
        }
    }

    /// Whether any change inserted or removed a line break.
    ///
    /// Removal can only be detected by the caller (it needs the old text), so
    /// this only reports insertions.
    pub fn inserts_newline(&self) -> bool {
        self.changes.iter().any(ChangeRecord::inserts_newline)
    }
}

/// IME composition state (for international text input).
///
/// During IME composition, the user is building up a string of characters
/// that hasn't been committed yet. This tracks where that composition
/// started and what text is currently being composed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompositionState {
    /// Character offset where composition started
    pub start_offset: usize,
    /// Current composition text (uncommitted)
    pub text: String,
}

impl CompositionState {
    /// Create a new composition state.
    pub fn new(start_offset: usize, text: String) -> Self {
        Self { start_offset, text }
    }

    /// Get the end offset of the composition.
    pub fn end_offset(&self) -> usize {
        self.start_offset + self.text.chars().count()
    }

    /// Check if an offset is within the composition.
    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.start_offset && offset < self.end_offset()
    }
}

/// Direction of text flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WritingMode {
    /// Columns run top to bottom, stacked right to left.
    #[default]
    #[serde(rename = "vertical-rl")]
    VerticalRl,
    /// Columns run top to bottom, stacked left to right.
    #[serde(rename = "vertical-lr")]
    VerticalLr,
    /// Ordinary horizontal lines, stacked top to bottom.
    #[serde(rename = "horizontal-tb")]
    HorizontalTb,
}

impl WritingMode {
    pub fn is_vertical(self) -> bool {
        !matches!(self, WritingMode::HorizontalTb)
    }

    /// CSS `writing-mode` value.
    pub fn as_css(self) -> &'static str {
        match self {
            WritingMode::VerticalRl => "vertical-rl",
            WritingMode::VerticalLr => "vertical-lr",
            WritingMode::HorizontalTb => "horizontal-tb",
        }
    }
}

/// Max distance from line start where block syntax can appear.
/// Covers: `######` (6), ```` ``` ```` (3), `> ` (2), `- ` (2), `999. ` (5)
pub const BLOCK_SYNTAX_ZONE: usize = 6;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_bounds() {
        let sel = Selection::new(5, 10);
        assert_eq!(sel.start(), 5);
        assert_eq!(sel.end(), 10);
        assert!(!sel.is_backwards());

        let sel = Selection::new(10, 5);
        assert_eq!(sel.start(), 5);
        assert_eq!(sel.end(), 10);
        assert!(sel.is_backwards());
        assert_eq!(sel.to_range(), 5..10);
    }

    #[test]
    fn test_selection_clamped() {
        let sel = Selection::new(3, 40).clamped(12);
        assert_eq!(sel, Selection::new(3, 12));
    }

    #[test]
    fn test_change_record_delta() {
        let rec = ChangeRecord::replace(4, 6, "abc", 2);
        assert_eq!(rec.from_b, 6);
        assert_eq!(rec.to_b, 9);
        assert_eq!(rec.len_delta(), 1);
        assert!(!rec.inserts_newline());
    }

    #[test]
    fn test_composition_contains() {
        let comp = CompositionState::new(10, "漢字".to_string());
        assert_eq!(comp.end_offset(), 12);
        assert!(!comp.contains(9));
        assert!(comp.contains(11));
        assert!(!comp.contains(12));
    }

    #[test]
    fn test_writing_mode_css() {
        assert!(WritingMode::VerticalRl.is_vertical());
        assert!(!WritingMode::HorizontalTb.is_vertical());
        assert_eq!(WritingMode::VerticalLr.as_css(), "vertical-lr");
    }
}
