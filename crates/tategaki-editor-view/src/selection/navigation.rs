//! Keyboard caret movement.
//!
//! Arrow keys are interpreted against the writing mode: along the inline axis
//! they step one visible character, across it they move one visual line,
//! keeping the caret's inline position.

use tategaki_editor_core::{Key, KeyCombo, Selection, WritingMode};

use crate::geometry::LayoutProvider;
use crate::selection::mapping::{
    LineView, ProjectionSource, adjacent_visible, caret_inline, index_in_row,
    normalize_offset_to_visible, offset_of_visible_index, visible_index_of, visible_len,
    visual_rows,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavUnit {
    Char,
    VisualLine,
    /// Start or end of the logical line's content.
    LineBoundary,
    Document,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavIntent {
    pub unit: NavUnit,
    /// Toward the end of the document.
    pub forward: bool,
    /// Keep the anchor (shift held).
    pub extend: bool,
}

impl NavIntent {
    pub fn new(unit: NavUnit, forward: bool) -> Self {
        Self {
            unit,
            forward,
            extend: false,
        }
    }
}

/// Map a navigation key to a caret movement, or None for keys that are not
/// navigation.
pub fn nav_intent(mode: WritingMode, combo: &KeyCombo, is_mac: bool) -> Option<NavIntent> {
    let primary = combo.modifiers.primary(is_mac);
    // (along the inline axis, forward)
    let (inline_axis, forward) = match (&combo.key, mode) {
        (Key::ArrowLeft, WritingMode::HorizontalTb) => (true, false),
        (Key::ArrowRight, WritingMode::HorizontalTb) => (true, true),
        (Key::ArrowUp, WritingMode::HorizontalTb) => (false, false),
        (Key::ArrowDown, WritingMode::HorizontalTb) => (false, true),
        (Key::ArrowUp, _) => (true, false),
        (Key::ArrowDown, _) => (true, true),
        (Key::ArrowLeft, WritingMode::VerticalRl) => (false, true),
        (Key::ArrowRight, WritingMode::VerticalRl) => (false, false),
        (Key::ArrowLeft, WritingMode::VerticalLr) => (false, false),
        (Key::ArrowRight, WritingMode::VerticalLr) => (false, true),
        (Key::Home, _) | (Key::End, _) => {
            let unit = if primary {
                NavUnit::Document
            } else {
                NavUnit::LineBoundary
            };
            return Some(NavIntent {
                unit,
                forward: combo.key == Key::End,
                extend: combo.modifiers.shift,
            });
        }
        _ => return None,
    };
    let unit = match (inline_axis, primary) {
        (true, false) => NavUnit::Char,
        (false, false) => NavUnit::VisualLine,
        (true, true) => NavUnit::LineBoundary,
        (false, true) => NavUnit::Document,
    };
    Some(NavIntent {
        unit,
        forward,
        extend: combo.modifiers.shift,
    })
}

/// First and last line of the block a widget covers.
fn widget_lines<S: ProjectionSource + ?Sized>(src: &S, from: usize, to: usize) -> (usize, usize) {
    let model = src.line_model();
    (model.line_at_offset(from), model.line_at_offset(to))
}

/// Step out of `line` into the neighbouring visible line: its start going
/// forward, its end going back.
fn cross_line<S: ProjectionSource + ?Sized>(
    src: &mut S,
    line: usize,
    offset: usize,
    forward: bool,
) -> usize {
    let edge = match src.line_view(line) {
        LineView::Widget { from, to } => {
            let (first, last) = widget_lines(src, from, to);
            if forward { last } else { first }
        }
        _ => line,
    };
    adjacent_visible(src, edge, forward).unwrap_or(offset)
}

fn step_char<S: ProjectionSource + ?Sized>(src: &mut S, offset: usize, forward: bool) -> usize {
    let line = src.line_model().line_at_offset(offset);
    let Some(range) = src.line_model().range(line) else {
        return offset;
    };
    match src.line_view(line) {
        LineView::Content(p) => {
            let index = visible_index_of(&p, offset);
            if forward && index < visible_len(&p) {
                offset_of_visible_index(&p, range, index + 1)
            } else if !forward && index > 0 {
                offset_of_visible_index(&p, range, index - 1)
            } else {
                cross_line(src, line, offset, forward)
            }
        }
        LineView::Widget { from, to } => {
            if forward && offset < to {
                to
            } else if !forward && offset > from {
                from
            } else {
                cross_line(src, line, offset, forward)
            }
        }
        LineView::Hidden => normalize_offset_to_visible(src, offset, forward),
    }
}

fn line_boundary<S: ProjectionSource + ?Sized>(src: &mut S, offset: usize, forward: bool) -> usize {
    let line = src.line_model().line_at_offset(offset);
    let Some(range) = src.line_model().range(line) else {
        return offset;
    };
    match src.line_view(line) {
        LineView::Content(p) => {
            let edge = if forward { range.to } else { range.from };
            p.nearest_visible_offset(edge, !forward)
                .unwrap_or(range.from)
        }
        LineView::Widget { from, to } => {
            if forward {
                to
            } else {
                from
            }
        }
        LineView::Hidden => normalize_offset_to_visible(src, offset, forward),
    }
}

fn visual_move<S, L>(src: &mut S, layout: &L, offset: usize, forward: bool) -> usize
where
    S: ProjectionSource + ?Sized,
    L: LayoutProvider + ?Sized,
{
    let mode = layout.writing_mode();
    let line = src.line_model().line_at_offset(offset);
    let Some(range) = src.line_model().range(line) else {
        return offset;
    };
    let projection = match src.line_view(line) {
        LineView::Content(p) => p,
        LineView::Widget { .. } => return cross_line(src, line, offset, forward),
        LineView::Hidden => return normalize_offset_to_visible(src, offset, forward),
    };
    let Some(boxes) = layout.char_boxes(line) else {
        return cross_line(src, line, offset, forward);
    };
    let rows = visual_rows(mode, boxes);
    if rows.is_empty() {
        return cross_line(src, line, offset, forward);
    }
    let index = visible_index_of(&projection, offset).min(boxes.len());
    let current = rows
        .iter()
        .position(|r| r.contains(&index))
        .unwrap_or(rows.len() - 1);
    let target = if forward {
        Some(current + 1).filter(|t| *t < rows.len())
    } else {
        current.checked_sub(1)
    };
    match target {
        Some(t) => {
            let inline = caret_inline(mode, boxes, index);
            let i = index_in_row(mode, boxes, &rows[t], inline, t + 1 == rows.len());
            tracing::trace!(target: "tategaki::caret", line, from_row = current, to_row = t, index = i, "visual move");
            offset_of_visible_index(&projection, range, i)
        }
        None => cross_line(src, line, offset, forward),
    }
}

/// New caret offset after moving from `offset`.
pub fn move_offset<S, L>(src: &mut S, layout: &L, offset: usize, intent: NavIntent) -> usize
where
    S: ProjectionSource + ?Sized,
    L: LayoutProvider + ?Sized,
{
    match intent.unit {
        NavUnit::Char => step_char(src, offset, intent.forward),
        NavUnit::VisualLine => visual_move(src, layout, offset, intent.forward),
        NavUnit::LineBoundary => line_boundary(src, offset, intent.forward),
        NavUnit::Document => {
            let target = if intent.forward {
                src.line_model().doc_len()
            } else {
                0
            };
            normalize_offset_to_visible(src, target, !intent.forward)
        }
    }
}

/// Apply a movement to a selection. Without `extend`, a character step over
/// a non-empty selection collapses it to the edge in the direction of travel.
pub fn move_selection<S, L>(src: &mut S, layout: &L, selection: Selection, intent: NavIntent) -> Selection
where
    S: ProjectionSource + ?Sized,
    L: LayoutProvider + ?Sized,
{
    if !intent.extend && !selection.is_collapsed() && intent.unit == NavUnit::Char {
        let edge = if intent.forward {
            selection.end()
        } else {
            selection.start()
        };
        return Selection::collapsed(edge);
    }
    let head = move_offset(src, layout, selection.head, intent);
    if intent.extend {
        Selection::new(selection.anchor, head)
    } else {
        Selection::collapsed(head)
    }
}
