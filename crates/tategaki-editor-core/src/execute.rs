//! Action execution for source editors.
//!
//! `execute_action` applies an `EditorAction` to any `SourceEditor`. Every
//! mutation goes through one transaction so undo restores it as a unit.

use crate::actions::EditorAction;
use crate::document::{ChangeSpec, SourceEditor, Transaction};
use crate::error::CoreError;
use crate::format;
use crate::text_helpers::{
    detect_list_context, find_line_end, find_line_start, find_word_boundary_backward,
    find_word_boundary_forward, is_list_item_empty,
};
use crate::types::{EditorUpdate, Selection};

/// Execute an editor action.
///
/// Returns `Ok(None)` when the action had nothing to do (delete at the
/// document start, undo with empty history, ...).
pub fn execute_action<E: SourceEditor + ?Sized>(
    editor: &mut E,
    action: &EditorAction,
) -> Result<Option<EditorUpdate>, CoreError> {
    tracing::trace!(target: "tategaki::editor", ?action, "execute");
    match action {
        EditorAction::Insert { text, range } => execute_insert(editor, text, *range),
        EditorAction::InsertLineBreak { range } => execute_insert(editor, "\n", *range),
        EditorAction::InsertParagraph { range } => execute_insert_paragraph(editor, *range),
        EditorAction::DeleteBackward { range } => execute_delete_backward(editor, *range),
        EditorAction::DeleteForward { range } => execute_delete_forward(editor, *range),
        EditorAction::DeleteWordBackward { range } => {
            delete_or(editor, *range, |e, cursor| {
                (find_word_boundary_backward(e, cursor), cursor)
            })
        }
        EditorAction::DeleteWordForward { range } => {
            delete_or(editor, *range, |e, cursor| {
                (cursor, find_word_boundary_forward(e, cursor))
            })
        }
        EditorAction::DeleteToLineStart { range } => {
            delete_or(editor, *range, |e, cursor| (find_line_start(e, cursor), cursor))
        }
        EditorAction::DeleteToLineEnd { range } => {
            delete_or(editor, *range, |e, cursor| (cursor, find_line_end(e, cursor)))
        }
        EditorAction::Undo => Ok(editor.undo()),
        EditorAction::Redo => Ok(editor.redo()),
        EditorAction::ToggleStyle(style) => format::toggle_inline_style(editor, *style),
        EditorAction::ClearFormatting => format::clear_formatting(editor),
        EditorAction::InsertRuby { reading } => format::insert_ruby(editor, reading),
        EditorAction::ClearRuby => format::clear_ruby(editor),
        EditorAction::SelectAll => {
            let len = editor.len_chars();
            Ok(Some(editor.set_selection(Selection::new(0, len))))
        }
        EditorAction::MoveCursor { offset } => {
            Ok(Some(editor.set_selection(Selection::collapsed(*offset))))
        }
        EditorAction::ExtendSelection { offset } => {
            let anchor = editor.selection().anchor;
            Ok(Some(editor.set_selection(Selection::new(anchor, *offset))))
        }
    }
}

fn replace<E: SourceEditor + ?Sized>(
    editor: &mut E,
    from: usize,
    to: usize,
    insert: &str,
    caret: usize,
) -> Result<Option<EditorUpdate>, CoreError> {
    let tx = Transaction::new(vec![ChangeSpec::new(from, to, insert)])
        .with_selection(Selection::collapsed(caret));
    editor.apply(tx).map(Some)
}

fn execute_insert<E: SourceEditor + ?Sized>(
    editor: &mut E,
    text: &str,
    range: Selection,
) -> Result<Option<EditorUpdate>, CoreError> {
    let (from, to) = (range.start(), range.end());
    replace(editor, from, to, text, from + text.chars().count())
}

fn execute_insert_paragraph<E: SourceEditor + ?Sized>(
    editor: &mut E,
    range: Selection,
) -> Result<Option<EditorUpdate>, CoreError> {
    let (from, to) = (range.start(), range.end());
    if from == to {
        if let Some(ctx) = detect_list_context(editor, from) {
            if is_list_item_empty(editor, from, &ctx) {
                // Empty item: drop the marker and leave the list.
                let line_start = find_line_start(editor, from);
                let line_end = find_line_end(editor, from);
                return replace(editor, line_start, line_end, "", line_start);
            }
            let insert = format!("\n{}", ctx.continuation());
            return replace(editor, from, to, &insert, from + insert.chars().count());
        }
    }
    replace(editor, from, to, "\n", from + 1)
}

fn execute_delete_backward<E: SourceEditor + ?Sized>(
    editor: &mut E,
    range: Selection,
) -> Result<Option<EditorUpdate>, CoreError> {
    delete_or(editor, range, |_, cursor| (cursor.saturating_sub(1), cursor))
}

fn execute_delete_forward<E: SourceEditor + ?Sized>(
    editor: &mut E,
    range: Selection,
) -> Result<Option<EditorUpdate>, CoreError> {
    let len = editor.len_chars();
    delete_or(editor, range, |_, cursor| (cursor, (cursor + 1).min(len)))
}

/// Delete a non-empty range, or the span `extent` computes around a caret.
fn delete_or<E, F>(
    editor: &mut E,
    range: Selection,
    extent: F,
) -> Result<Option<EditorUpdate>, CoreError>
where
    E: SourceEditor + ?Sized,
    F: FnOnce(&E, usize) -> (usize, usize),
{
    let (from, to) = if range.is_collapsed() {
        extent(editor, range.head)
    } else {
        (range.start(), range.end())
    };
    if from >= to {
        return Ok(None);
    }
    replace(editor, from, to, "", from)
}
