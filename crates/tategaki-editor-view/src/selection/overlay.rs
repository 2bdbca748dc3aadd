//! Selection highlight geometry.

use tategaki_editor_core::Selection;

use crate::geometry::{LayoutProvider, Rect};
use crate::selection::mapping::{LineView, ProjectionSource, caret_rect, visible_index_of, visual_rows};

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOverlay {
    None,
    /// One rect per selected visual line.
    Rects(Vec<Rect>),
    /// Single bounding box shown while a huge-document drag is in progress.
    Soft { bounds: Rect },
}

/// Per-visual-line highlight rects of `selection` over laid-out lines.
pub fn selection_rects<S, L>(src: &mut S, layout: &L, selection: Selection) -> Vec<Rect>
where
    S: ProjectionSource + ?Sized,
    L: LayoutProvider + ?Sized,
{
    let (start, end) = (selection.start(), selection.end());
    let mode = layout.writing_mode();
    let mut rects = Vec::new();
    if start == end {
        return rects;
    }
    for line in layout.laid_out_lines() {
        let Some(range) = src.line_model().range(line) else {
            continue;
        };
        if range.to < start || range.from > end {
            continue;
        }
        match src.line_view(line) {
            LineView::Content(p) => {
                let Some(boxes) = layout.char_boxes(line) else {
                    continue;
                };
                let a = visible_index_of(&p, start.max(range.from));
                let b = visible_index_of(&p, end.min(range.to)).min(boxes.len());
                for row in visual_rows(mode, boxes) {
                    let (lo, hi) = (row.start.max(a), row.end.min(b));
                    if lo < hi {
                        let bounds = boxes[lo + 1..hi]
                            .iter()
                            .fold(boxes[lo], |acc, r| acc.union(r));
                        rects.push(bounds);
                    }
                }
            }
            LineView::Widget { from, to } if start <= from && to <= end => {
                rects.extend(layout.line_box(line));
            }
            _ => {}
        }
    }
    rects
}

/// Drag selection for huge documents. The real selection is only committed
/// when the gesture ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftSelection {
    anchor: usize,
    head: usize,
}

impl SoftSelection {
    pub fn begin(anchor: usize) -> Self {
        Self {
            anchor,
            head: anchor,
        }
    }

    pub fn update(&mut self, head: usize) {
        self.head = head;
    }

    pub fn selection(&self) -> Selection {
        Selection::new(self.anchor, self.head)
    }

    /// Bounding box of both ends and every laid-out line between them.
    pub fn bounds<S, L>(&self, src: &mut S, layout: &L) -> Option<Rect>
    where
        S: ProjectionSource + ?Sized,
        L: LayoutProvider + ?Sized,
    {
        let sel = self.selection();
        let first = src.line_model().line_at_offset(sel.start());
        let last = src.line_model().line_at_offset(sel.end());
        let ends = [caret_rect(src, layout, sel.start()), caret_rect(src, layout, sel.end())];
        let between = layout
            .laid_out_lines()
            .into_iter()
            .filter(|l| *l > first && *l < last)
            .filter_map(|l| layout.line_box(l));
        ends.into_iter()
            .flatten()
            .chain(between)
            .reduce(|acc, r| acc.union(&r))
    }
}

/// Overlay for the current selection. `soft` carries the in-progress drag
/// when soft selection is active.
pub fn build_overlay<S, L>(
    src: &mut S,
    layout: &L,
    selection: Selection,
    soft: Option<&SoftSelection>,
) -> SelectionOverlay
where
    S: ProjectionSource + ?Sized,
    L: LayoutProvider + ?Sized,
{
    if let Some(soft) = soft {
        return match soft.bounds(src, layout) {
            Some(bounds) if !soft.selection().is_collapsed() => SelectionOverlay::Soft { bounds },
            _ => SelectionOverlay::None,
        };
    }
    if selection.is_collapsed() {
        return SelectionOverlay::None;
    }
    let rects = selection_rects(src, layout, selection);
    if rects.is_empty() {
        SelectionOverlay::None
    } else {
        SelectionOverlay::Rects(rects)
    }
}
