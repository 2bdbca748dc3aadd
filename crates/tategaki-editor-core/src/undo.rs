//! Undo/redo management for editor operations.
//!
//! Provides:
//! - `UndoManager` trait for abstracting undo implementations
//! - `UndoableBuffer<T>` - wraps a TextBuffer and provides grouped undo/redo

use std::ops::Range;

use smol_str::{SmolStr, ToSmolStr};

use crate::text::TextBuffer;
use crate::types::Selection;

/// Trait for managing undo/redo operations.
///
/// Implementations must actually perform the undo/redo, not just track state.
/// Edits recorded between two `commit_step` calls are undone together.
pub trait UndoManager {
    /// Check if undo is available.
    fn can_undo(&self) -> bool;

    /// Check if redo is available.
    fn can_redo(&self) -> bool;

    /// Seal the edits recorded so far into one undo step, remembering the
    /// selections before and after it.
    fn commit_step(&mut self, selection_before: Selection, selection_after: Selection);

    /// Perform undo. Returns the selection to restore, or None if nothing to undo.
    fn undo(&mut self) -> Option<Selection>;

    /// Perform redo. Returns the selection to restore, or None if nothing to redo.
    fn redo(&mut self) -> Option<Selection>;

    /// Clear all undo/redo history.
    fn clear_history(&mut self);
}

/// A recorded edit operation for undo/redo.
#[derive(Debug, Clone)]
struct EditOperation {
    /// Character position where edit occurred
    pos: usize,
    /// Text that was deleted (empty for pure insertions)
    deleted: SmolStr,
    /// Text that was inserted (empty for pure deletions)
    inserted: SmolStr,
}

#[derive(Debug, Clone)]
struct UndoStep {
    ops: Vec<EditOperation>,
    selection_before: Selection,
    selection_after: Selection,
}

/// A TextBuffer wrapper that tracks edits and provides undo/redo.
///
/// All mutations go through this wrapper, which records them for undo.
#[derive(Clone)]
pub struct UndoableBuffer<T> {
    buffer: T,
    pending: Vec<EditOperation>,
    undo_stack: Vec<UndoStep>,
    redo_stack: Vec<UndoStep>,
    max_steps: usize,
}

impl<T: TextBuffer + Default> Default for UndoableBuffer<T> {
    fn default() -> Self {
        Self::new(T::default(), 100)
    }
}

impl<T: TextBuffer> UndoableBuffer<T> {
    /// Create a new undoable buffer wrapping the given buffer.
    pub fn new(buffer: T, max_steps: usize) -> Self {
        Self {
            buffer,
            pending: Vec::new(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_steps,
        }
    }

    /// Get a reference to the inner buffer.
    pub fn inner(&self) -> &T {
        &self.buffer
    }

    fn record_op(&mut self, pos: usize, deleted: &str, inserted: &str) {
        self.redo_stack.clear();
        self.pending.push(EditOperation {
            pos,
            deleted: deleted.to_smolstr(),
            inserted: inserted.to_smolstr(),
        });
    }

    fn apply_inverse(&mut self, op: &EditOperation) {
        let inserted_chars = op.inserted.chars().count();
        if inserted_chars > 0 {
            self.buffer.delete(op.pos..op.pos + inserted_chars);
        }
        if !op.deleted.is_empty() {
            self.buffer.insert(op.pos, &op.deleted);
        }
    }

    fn apply_forward(&mut self, op: &EditOperation) {
        let deleted_chars = op.deleted.chars().count();
        if deleted_chars > 0 {
            self.buffer.delete(op.pos..op.pos + deleted_chars);
        }
        if !op.inserted.is_empty() {
            self.buffer.insert(op.pos, &op.inserted);
        }
    }
}

impl<T: TextBuffer> TextBuffer for UndoableBuffer<T> {
    fn len_bytes(&self) -> usize {
        self.buffer.len_bytes()
    }

    fn len_chars(&self) -> usize {
        self.buffer.len_chars()
    }

    fn insert(&mut self, char_offset: usize, text: &str) {
        self.record_op(char_offset, "", text);
        self.buffer.insert(char_offset, text);
    }

    fn delete(&mut self, char_range: Range<usize>) {
        let deleted = self.buffer.slice(char_range.clone()).unwrap_or_default();
        self.record_op(char_range.start, &deleted, "");
        self.buffer.delete(char_range);
    }

    // Record a replace as one operation so undo restores it atomically.
    fn replace(&mut self, char_range: Range<usize>, text: &str) {
        let deleted = self.buffer.slice(char_range.clone()).unwrap_or_default();
        self.record_op(char_range.start, &deleted, text);
        self.buffer.replace(char_range, text);
    }

    fn slice(&self, char_range: Range<usize>) -> Option<SmolStr> {
        self.buffer.slice(char_range)
    }

    fn char_at(&self, char_offset: usize) -> Option<char> {
        self.buffer.char_at(char_offset)
    }

    fn to_string(&self) -> String {
        self.buffer.to_string()
    }

    fn char_to_byte(&self, char_offset: usize) -> usize {
        self.buffer.char_to_byte(char_offset)
    }

    fn byte_to_char(&self, byte_offset: usize) -> usize {
        self.buffer.byte_to_char(byte_offset)
    }

    fn line_start(&self, offset: usize) -> usize {
        self.buffer.line_start(offset)
    }

    fn line_end(&self, offset: usize) -> usize {
        self.buffer.line_end(offset)
    }
}

impl<T: TextBuffer> UndoManager for UndoableBuffer<T> {
    fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    fn commit_step(&mut self, selection_before: Selection, selection_after: Selection) {
        if self.pending.is_empty() {
            return;
        }
        let ops = std::mem::take(&mut self.pending);
        self.undo_stack.push(UndoStep {
            ops,
            selection_before,
            selection_after,
        });
        while self.undo_stack.len() > self.max_steps {
            self.undo_stack.remove(0);
        }
    }

    fn undo(&mut self) -> Option<Selection> {
        let step = self.undo_stack.pop()?;
        for op in step.ops.iter().rev() {
            self.apply_inverse(op);
        }
        let restore = step.selection_before;
        self.redo_stack.push(step);
        Some(restore)
    }

    fn redo(&mut self) -> Option<Selection> {
        let step = self.redo_stack.pop()?;
        for op in step.ops.iter() {
            self.apply_forward(op);
        }
        let restore = step.selection_after;
        self.undo_stack.push(step);
        Some(restore)
    }

    fn clear_history(&mut self) {
        self.pending.clear();
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::EditorRope;

    #[test]
    fn test_grouped_undo_redo() {
        let mut buf = UndoableBuffer::new(EditorRope::from_str("hello"), 100);
        assert!(!buf.can_undo());

        buf.insert(5, " world");
        buf.insert(0, ">> ");
        buf.commit_step(Selection::collapsed(5), Selection::collapsed(14));
        assert_eq!(buf.to_string(), ">> hello world");

        assert_eq!(buf.undo(), Some(Selection::collapsed(5)));
        assert_eq!(buf.to_string(), "hello");
        assert!(buf.can_redo());

        assert_eq!(buf.redo(), Some(Selection::collapsed(14)));
        assert_eq!(buf.to_string(), ">> hello world");
    }

    #[test]
    fn test_replace_is_single_op() {
        let mut buf = UndoableBuffer::new(EditorRope::from_str("**bold**"), 100);
        buf.replace(0..8, "bold");
        buf.commit_step(Selection::new(0, 8), Selection::new(0, 4));
        assert_eq!(buf.to_string(), "bold");
        buf.undo();
        assert_eq!(buf.to_string(), "**bold**");
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let mut buf = UndoableBuffer::new(EditorRope::from_str("a"), 100);
        buf.insert(1, "b");
        buf.commit_step(Selection::collapsed(1), Selection::collapsed(2));
        buf.undo();
        assert!(buf.can_redo());
        buf.insert(1, "c");
        assert!(!buf.can_redo());
    }

    #[test]
    fn test_max_steps() {
        let mut buf = UndoableBuffer::new(EditorRope::new(), 2);
        for (i, s) in ["a", "b", "c"].iter().enumerate() {
            buf.insert(i, s);
            buf.commit_step(Selection::collapsed(i), Selection::collapsed(i + 1));
        }
        assert!(buf.undo().is_some());
        assert!(buf.undo().is_some());
        assert!(buf.undo().is_none());
        assert_eq!(buf.to_string(), "a");
    }

    #[test]
    fn test_empty_commit_is_ignored() {
        let mut buf = UndoableBuffer::new(EditorRope::from_str("x"), 10);
        buf.commit_step(Selection::default(), Selection::default());
        assert!(!buf.can_undo());
    }
}
