//! The editor abstraction the view is driven by.
//!
//! `SourceEditor` is the narrow contract between the view and whatever owns
//! the buffer: read the document, read/write the selection, apply changes,
//! undo/redo. Every mutation returns an `EditorUpdate` carrying ordered,
//! non-overlapping change records. `PlainEditor<T>` is the reference
//! implementation over any `TextBuffer + UndoManager`.

use smol_str::SmolStr;

use crate::error::CoreError;
use crate::text::{EditorRope, TextBuffer};
use crate::types::{ChangeRecord, EditorUpdate, Selection};
use crate::undo::{UndoManager, UndoableBuffer};

/// One change of a transaction, in pre-change coordinates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeSpec {
    pub from: usize,
    pub to: usize,
    pub insert: SmolStr,
}

impl ChangeSpec {
    pub fn new(from: usize, to: usize, insert: impl Into<SmolStr>) -> Self {
        Self {
            from,
            to,
            insert: insert.into(),
        }
    }

    pub fn delete(from: usize, to: usize) -> Self {
        Self::new(from, to, "")
    }

    pub fn insert(at: usize, text: impl Into<SmolStr>) -> Self {
        Self::new(at, at, text)
    }
}

/// A batch of changes applied as one update and one undo step.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Transaction {
    pub changes: Vec<ChangeSpec>,
    /// Selection after the transaction, in post-change coordinates.
    /// When absent the current selection is mapped through the changes.
    pub selection: Option<Selection>,
}

impl Transaction {
    pub fn new(changes: Vec<ChangeSpec>) -> Self {
        Self {
            changes,
            selection: None,
        }
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }
}

/// Map an offset through ordered change records.
///
/// Offsets strictly inside a replaced span move to its end; an offset at the
/// start of a pure insertion stays before it.
pub fn map_offset(offset: usize, changes: &[ChangeRecord]) -> usize {
    let mut delta: isize = 0;
    for change in changes {
        if offset <= change.from {
            break;
        }
        if offset < change.to {
            return change.to_b;
        }
        delta += change.len_delta();
    }
    (offset as isize + delta).max(0) as usize
}

/// Core trait for the editor abstraction consumed by the view.
pub trait SourceEditor {
    /// Full document text.
    fn doc(&self) -> String;

    /// Document length in chars.
    fn len_chars(&self) -> usize;

    /// Slice of the document, None if out of bounds.
    fn slice(&self, from: usize, to: usize) -> Option<SmolStr>;

    /// Character at offset.
    fn char_at(&self, offset: usize) -> Option<char>;

    fn selection(&self) -> Selection;

    /// Set the selection, clamped to the document.
    fn set_selection(&mut self, selection: Selection) -> EditorUpdate;

    /// Apply a transaction. Changes must be in ascending order and must not overlap.
    fn apply(&mut self, tx: Transaction) -> Result<EditorUpdate, CoreError>;

    /// Undo the last transaction.
    fn undo(&mut self) -> Option<EditorUpdate>;

    /// Redo the last undone transaction.
    fn redo(&mut self) -> Option<EditorUpdate>;

    fn can_undo(&self) -> bool;

    fn can_redo(&self) -> bool;

    /// Replace `from..to` with `insert`, mapping the selection through the change.
    fn replace_range(
        &mut self,
        from: usize,
        to: usize,
        insert: &str,
    ) -> Result<EditorUpdate, CoreError> {
        self.apply(Transaction::new(vec![ChangeSpec::new(from, to, insert)]))
    }

    /// Replace the selection with `insert` and put the caret after it.
    fn replace_selection(&mut self, insert: &str) -> Result<EditorUpdate, CoreError> {
        let sel = self.selection();
        let caret = sel.start() + insert.chars().count();
        self.apply(
            Transaction::new(vec![ChangeSpec::new(sel.start(), sel.end(), insert)])
                .with_selection(Selection::collapsed(caret)),
        )
    }

    /// Text currently selected.
    fn selected_text(&self) -> SmolStr {
        let sel = self.selection();
        self.slice(sel.start(), sel.end()).unwrap_or_default()
    }

    fn is_empty(&self) -> bool {
        self.len_chars() == 0
    }
}

/// Simple field-based editor over a `TextBuffer + UndoManager`.
#[derive(Clone)]
pub struct PlainEditor<T: TextBuffer + UndoManager = UndoableBuffer<EditorRope>> {
    buffer: T,
    selection: Selection,
}

impl PlainEditor<UndoableBuffer<EditorRope>> {
    /// Create an editor over a ropey buffer with 100 undo steps.
    pub fn from_text(text: &str) -> Self {
        Self::new(UndoableBuffer::new(EditorRope::from_str(text), 100))
    }
}

impl<T: TextBuffer + UndoManager> PlainEditor<T> {
    pub fn new(buffer: T) -> Self {
        Self {
            buffer,
            selection: Selection::default(),
        }
    }

    pub fn buffer(&self) -> &T {
        &self.buffer
    }

    fn validate(&self, changes: &[ChangeSpec]) -> Result<(), CoreError> {
        let len = self.buffer.len_chars();
        let mut last_end = 0;
        for (i, change) in changes.iter().enumerate() {
            if change.from > change.to || change.to > len {
                return Err(CoreError::InvalidRange {
                    from: change.from,
                    to: change.to,
                    len,
                });
            }
            if i > 0 && change.from < last_end {
                return Err(CoreError::OverlappingChange(change.from));
            }
            last_end = change.to;
        }
        Ok(())
    }

    /// Single change record describing the difference between two texts.
    fn diff_record(before: &str, after: &str) -> Option<ChangeRecord> {
        let a: Vec<char> = before.chars().collect();
        let b: Vec<char> = after.chars().collect();
        let prefix = a.iter().zip(b.iter()).take_while(|(x, y)| x == y).count();
        let max_suffix = a.len().min(b.len()) - prefix;
        let suffix = a
            .iter()
            .rev()
            .zip(b.iter().rev())
            .take(max_suffix)
            .take_while(|(x, y)| x == y)
            .count();
        if prefix == a.len() && prefix == b.len() {
            return None;
        }
        let insert: String = b[prefix..b.len() - suffix].iter().collect();
        Some(ChangeRecord::replace(prefix, a.len() - suffix, &insert, 0))
    }

    fn history_update(&mut self, before: String, restore: Selection) -> EditorUpdate {
        let after = self.buffer.to_string();
        let changes: Vec<ChangeRecord> = Self::diff_record(&before, &after).into_iter().collect();
        let old_sel = self.selection;
        self.selection = restore.clamped(self.buffer.len_chars());
        EditorUpdate {
            doc_changed: !changes.is_empty(),
            changes,
            selection_changed: old_sel != self.selection,
            selection: self.selection,
        }
    }
}

impl<T: TextBuffer + UndoManager> SourceEditor for PlainEditor<T> {
    fn doc(&self) -> String {
        self.buffer.to_string()
    }

    fn len_chars(&self) -> usize {
        self.buffer.len_chars()
    }

    fn slice(&self, from: usize, to: usize) -> Option<SmolStr> {
        self.buffer.slice(from..to)
    }

    fn char_at(&self, offset: usize) -> Option<char> {
        self.buffer.char_at(offset)
    }

    fn selection(&self) -> Selection {
        self.selection
    }

    fn set_selection(&mut self, selection: Selection) -> EditorUpdate {
        let selection = selection.clamped(self.buffer.len_chars());
        let changed = selection != self.selection;
        self.selection = selection;
        EditorUpdate {
            doc_changed: false,
            changes: Vec::new(),
            selection_changed: changed,
            selection,
        }
    }

    fn apply(&mut self, tx: Transaction) -> Result<EditorUpdate, CoreError> {
        self.validate(&tx.changes)?;

        let mut records = Vec::with_capacity(tx.changes.len());
        let mut delta: isize = 0;
        for change in &tx.changes {
            let record = ChangeRecord::replace(change.from, change.to, &change.insert, delta);
            delta += record.len_delta();
            records.push(record);
        }
        records.retain(|r| r.from != r.to || !r.insert.is_empty());

        // Apply back to front so earlier offsets stay valid.
        for change in tx.changes.iter().rev() {
            if change.from == change.to && change.insert.is_empty() {
                continue;
            }
            self.buffer.replace(change.from..change.to, &change.insert);
        }

        let before = self.selection;
        let selection = match tx.selection {
            Some(sel) => sel.clamped(self.buffer.len_chars()),
            None => Selection::new(
                map_offset(before.anchor, &records),
                map_offset(before.head, &records),
            ),
        };
        self.selection = selection;
        self.buffer.commit_step(before, selection);

        tracing::trace!(
            target: "tategaki::editor",
            changes = records.len(),
            anchor = selection.anchor,
            head = selection.head,
            "applied transaction"
        );

        Ok(EditorUpdate {
            doc_changed: !records.is_empty(),
            changes: records,
            selection_changed: before != selection,
            selection,
        })
    }

    fn undo(&mut self) -> Option<EditorUpdate> {
        let before = self.buffer.to_string();
        let restore = self.buffer.undo()?;
        Some(self.history_update(before, restore))
    }

    fn redo(&mut self) -> Option<EditorUpdate> {
        let before = self.buffer.to_string();
        let restore = self.buffer.redo()?;
        Some(self.history_update(before, restore))
    }

    fn can_undo(&self) -> bool {
        self.buffer.can_undo()
    }

    fn can_redo(&self) -> bool {
        self.buffer.can_redo()
    }
}
