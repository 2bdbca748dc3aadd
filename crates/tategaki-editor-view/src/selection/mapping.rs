//! Buffer offsets to visual positions and back.
//!
//! Everything here is defined over segment boundaries: a caret index within
//! a line counts visible characters, and the line's segments translate it to
//! and from buffer offsets. Geometry comes from a [`LayoutProvider`].

use std::ops::Range;

use tategaki_editor_core::{LineModel, LineProjection, LineRange, WritingMode};

use crate::geometry::{FlowAxes, LayoutProvider, Point, Rect};

/// How one line presents itself to caret logic.
#[derive(Debug, Clone, PartialEq)]
pub enum LineView {
    Content(LineProjection),
    /// Folded, hidden frontmatter.
    Hidden,
    /// Covered by a block widget spanning buffer offsets `from..to`.
    Widget { from: usize, to: usize },
}

/// Line data the mapper reads.
pub trait ProjectionSource {
    fn line_model(&self) -> &LineModel;
    fn line_view(&mut self, line: usize) -> LineView;
}

/// Visible characters of the line.
pub fn visible_len(projection: &LineProjection) -> usize {
    projection.segments.iter().map(|s| s.len()).sum()
}

/// Number of visible characters before `offset`.
pub fn visible_index_of(projection: &LineProjection, offset: usize) -> usize {
    projection
        .segments
        .iter()
        .map(|s| {
            if offset >= s.to {
                s.len()
            } else {
                offset.saturating_sub(s.from)
            }
        })
        .sum()
}

/// Buffer offset of visible caret index `index`.
pub fn offset_of_visible_index(projection: &LineProjection, range: LineRange, index: usize) -> usize {
    let mut rest = index;
    for seg in &projection.segments {
        if rest <= seg.len() {
            return seg.from + rest;
        }
        rest -= seg.len();
    }
    projection.segments.last().map_or(range.from, |s| s.to)
}

fn first_visible(view: &LineView, range: LineRange) -> Option<usize> {
    match view {
        LineView::Content(p) => Some(p.nearest_visible_offset(range.from, true).unwrap_or(range.from)),
        LineView::Widget { from, .. } => Some(*from),
        LineView::Hidden => None,
    }
}

fn last_visible(view: &LineView, range: LineRange) -> Option<usize> {
    match view {
        LineView::Content(p) => Some(p.nearest_visible_offset(range.to, false).unwrap_or(range.from)),
        LineView::Widget { to, .. } => Some(*to),
        LineView::Hidden => None,
    }
}

/// First caret position past `line` in the given direction: the start of the
/// next visible line going forward, the end of the previous one going back.
pub fn adjacent_visible<S: ProjectionSource + ?Sized>(
    src: &mut S,
    line: usize,
    forward: bool,
) -> Option<usize> {
    let count = src.line_model().line_count();
    let lines: Box<dyn Iterator<Item = usize>> = if forward {
        Box::new(line + 1..count)
    } else {
        Box::new((0..line.min(count)).rev())
    };
    for l in lines {
        let range = src.line_model().range(l)?;
        let view = src.line_view(l);
        let found = if forward {
            first_visible(&view, range)
        } else {
            last_visible(&view, range)
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

/// Snap `offset` to the nearest caret position that is not inside hidden
/// syntax, a folded section, hidden frontmatter or a block widget.
pub fn normalize_offset_to_visible<S: ProjectionSource + ?Sized>(
    src: &mut S,
    offset: usize,
    prefer_forward: bool,
) -> usize {
    let model = src.line_model();
    let offset = offset.min(model.doc_len());
    let line = model.line_at_offset(offset);
    let Some(range) = model.range(line) else {
        return offset;
    };
    let snapped = match src.line_view(line) {
        // A hidden prefix such as `# ` starts at the line start, so the
        // line start itself is not a stop there.
        LineView::Content(p) if p.is_visible_offset(offset) => offset,
        LineView::Content(p) => p
            .nearest_visible_offset(offset, prefer_forward)
            .or_else(|| p.nearest_visible_offset(offset, !prefer_forward))
            .unwrap_or(range.from),
        LineView::Widget { from, to } => {
            if offset <= from || offset >= to {
                offset.clamp(from, to)
            } else if prefer_forward {
                to
            } else {
                from
            }
        }
        LineView::Hidden => adjacent_visible(src, line, prefer_forward)
            .or_else(|| adjacent_visible(src, line, !prefer_forward))
            .unwrap_or(offset),
    };
    if snapped != offset {
        tracing::trace!(target: "tategaki::caret", offset, snapped, prefer_forward, "normalized");
    }
    snapped
}

fn leading_inline(mode: WritingMode, r: &Rect) -> f64 {
    mode.inline_of(Point::new(r.x, r.y))
}

fn center_inline(mode: WritingMode, r: &Rect) -> f64 {
    leading_inline(mode, r) + mode.inline_extent(r) / 2.0
}

/// Whether `b` sits on a different visual line than `a`.
pub fn wraps_between(mode: WritingMode, a: &Rect, b: &Rect) -> bool {
    let delta = mode.block_of(a.center()) - mode.block_of(b.center());
    delta.abs() > mode.block_extent(a) / 2.0
}

/// Group logical-order char boxes into visual lines.
pub fn visual_rows(mode: WritingMode, boxes: &[Rect]) -> Vec<Range<usize>> {
    let mut rows = Vec::new();
    let mut start = 0;
    for i in 1..boxes.len() {
        if wraps_between(mode, &boxes[i - 1], &boxes[i]) {
            rows.push(start..i);
            start = i;
        }
    }
    if !boxes.is_empty() {
        rows.push(start..boxes.len());
    }
    rows
}

/// Zero-inline-extent rect at the leading edge of `r`.
fn leading_edge(mode: WritingMode, r: &Rect) -> Rect {
    if mode.is_vertical() {
        Rect::new(r.x, r.y, r.width, 0.0)
    } else {
        Rect::new(r.x, r.y, 0.0, r.height)
    }
}

fn trailing_edge(mode: WritingMode, r: &Rect) -> Rect {
    if mode.is_vertical() {
        Rect::new(r.x, r.bottom(), r.width, 0.0)
    } else {
        Rect::new(r.right(), r.y, 0.0, r.height)
    }
}

/// Inline coordinate of caret index `index` among `boxes`.
pub fn caret_inline(mode: WritingMode, boxes: &[Rect], index: usize) -> f64 {
    match boxes.get(index) {
        Some(r) => leading_inline(mode, r),
        None => boxes
            .last()
            .map_or(0.0, |r| leading_inline(mode, r) + mode.inline_extent(r)),
    }
}

/// Caret index in `row` closest to inline coordinate `inline`. Only the last
/// row of a line may return its end index.
pub fn index_in_row(
    mode: WritingMode,
    boxes: &[Rect],
    row: &Range<usize>,
    inline: f64,
    last_row: bool,
) -> usize {
    for j in row.clone() {
        if inline < center_inline(mode, &boxes[j]) {
            return j;
        }
    }
    if last_row || row.is_empty() {
        row.end
    } else {
        row.end - 1
    }
}

/// Caret rectangle at `offset`: zero extent along the inline axis, full
/// extent across it.
pub fn caret_rect<S, L>(src: &mut S, layout: &L, offset: usize) -> Option<Rect>
where
    S: ProjectionSource + ?Sized,
    L: LayoutProvider + ?Sized,
{
    let mode = layout.writing_mode();
    let model = src.line_model();
    let line = model.line_at_offset(offset);
    let projection = match src.line_view(line) {
        LineView::Content(p) => p,
        LineView::Widget { from, to } => {
            let first = src.line_model().line_at_offset(from);
            let bounds = layout.line_box(first)?;
            return Some(if offset >= to {
                trailing_edge(mode, &bounds)
            } else {
                leading_edge(mode, &bounds)
            });
        }
        LineView::Hidden => return None,
    };
    let boxes = layout.char_boxes(line)?;
    let index = visible_index_of(&projection, offset);
    let rect = match (index.checked_sub(1).and_then(|i| boxes.get(i)), boxes.get(index)) {
        (None, None) => leading_edge(mode, &layout.line_box(line)?),
        (None, Some(next)) => leading_edge(mode, next),
        (Some(prev), None) => trailing_edge(mode, prev),
        (Some(prev), Some(next)) => {
            // At a wrap the caret belongs to the start of the new visual line.
            if wraps_between(mode, prev, next) {
                leading_edge(mode, next)
            } else {
                trailing_edge(mode, prev)
            }
        }
    };
    Some(rect)
}

fn resolve_index<S: ProjectionSource + ?Sized>(src: &mut S, line: usize, index: usize) -> Option<usize> {
    let range = src.line_model().range(line)?;
    match src.line_view(line) {
        LineView::Content(p) => Some(offset_of_visible_index(&p, range, index)),
        LineView::Widget { from, .. } => Some(from),
        LineView::Hidden => None,
    }
}

fn hit_index(mode: WritingMode, boxes: &[Rect], p: Point) -> Option<usize> {
    let i = boxes.iter().position(|b| b.contains(p))?;
    Some(if mode.inline_of(p) > center_inline(mode, &boxes[i]) {
        i + 1
    } else {
        i
    })
}

/// Buffer offset under point `p`.
///
/// Tries the presenter's native hit-test, then the laid-out character boxes,
/// then the visual line closest to `p` with `p` clamped into it, and finally
/// the start or end of the nearest line box.
pub fn offset_from_point<S, L>(src: &mut S, layout: &L, p: Point) -> Option<usize>
where
    S: ProjectionSource + ?Sized,
    L: LayoutProvider + ?Sized,
{
    let mode = layout.writing_mode();
    let resolved = native_hit(src, layout, p)
        .or_else(|| box_hit(src, layout, mode, p))
        .or_else(|| nearest_row_hit(src, layout, mode, p))
        .or_else(|| line_edge_hit(src, layout, mode, p));
    let offset = resolved?;
    Some(normalize_offset_to_visible(src, offset, true))
}

fn native_hit<S, L>(src: &mut S, layout: &L, p: Point) -> Option<usize>
where
    S: ProjectionSource + ?Sized,
    L: LayoutProvider + ?Sized,
{
    let (line, index) = layout.caret_from_point(p)?;
    resolve_index(src, line, index)
}

fn box_hit<S, L>(src: &mut S, layout: &L, mode: WritingMode, p: Point) -> Option<usize>
where
    S: ProjectionSource + ?Sized,
    L: LayoutProvider + ?Sized,
{
    layout.laid_out_lines().into_iter().find_map(|line| {
        let index = hit_index(mode, layout.char_boxes(line)?, p)?;
        resolve_index(src, line, index)
    })
}

fn nearest_row_hit<S, L>(src: &mut S, layout: &L, mode: WritingMode, p: Point) -> Option<usize>
where
    S: ProjectionSource + ?Sized,
    L: LayoutProvider + ?Sized,
{
    let block = mode.block_of(p);
    let mut best: Option<(f64, usize, Rect)> = None;
    for line in layout.laid_out_lines() {
        let Some(boxes) = layout.char_boxes(line) else {
            continue;
        };
        for row in visual_rows(mode, boxes) {
            let bounds = boxes[row.clone()]
                .iter()
                .skip(1)
                .fold(boxes[row.start], |acc, b| acc.union(b));
            let (a, b) = (
                mode.block_of(Point::new(bounds.x, bounds.y)),
                mode.block_of(Point::new(bounds.right(), bounds.bottom())),
            );
            let (lo, hi) = (a.min(b), a.max(b));
            let distance = if block < lo {
                lo - block
            } else if block > hi {
                block - hi
            } else {
                0.0
            };
            if best.as_ref().is_none_or(|(d, _, _)| distance < *d) {
                best = Some((distance, line, bounds));
            }
        }
    }
    let (_, line, bounds) = best?;
    let clamped = bounds.clamp(p);
    let index = hit_index(mode, layout.char_boxes(line)?, clamped)?;
    resolve_index(src, line, index)
}

fn line_edge_hit<S, L>(src: &mut S, layout: &L, mode: WritingMode, p: Point) -> Option<usize>
where
    S: ProjectionSource + ?Sized,
    L: LayoutProvider + ?Sized,
{
    let block = mode.block_of(p);
    let (line, bounds) = layout
        .laid_out_lines()
        .into_iter()
        .filter_map(|l| Some((l, layout.line_box(l)?)))
        .min_by(|(_, a), (_, b)| {
            let da = (mode.block_of(a.center()) - block).abs();
            let db = (mode.block_of(b.center()) - block).abs();
            da.total_cmp(&db)
        })?;
    let range = src.line_model().range(line)?;
    Some(if mode.inline_of(p) <= center_inline(mode, &bounds) {
        range.from
    } else {
        range.to
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewConfig;
    use crate::geometry::GridLayout;
    use crate::render::RenderPipeline;

    fn pipeline(doc: &str) -> RenderPipeline {
        let mut p = RenderPipeline::new(&ViewConfig::default());
        p.render_full(doc);
        p
    }

    #[test]
    fn test_visible_index_roundtrip() {
        let mut p = pipeline("a**b**c");
        let LineView::Content(proj) = p.line_view(0) else {
            panic!("expected content");
        };
        assert_eq!(visible_len(&proj), 3);
        assert_eq!(visible_index_of(&proj, 3), 1);
        assert_eq!(visible_index_of(&proj, 4), 2);
        assert_eq!(offset_of_visible_index(&proj, LineRange::new(0, 7), 2), 4);
        assert_eq!(offset_of_visible_index(&proj, LineRange::new(0, 7), 9), 7);
    }

    #[test]
    fn test_normalize_inside_marker() {
        let mut p = pipeline("a**b**c");
        assert_eq!(normalize_offset_to_visible(&mut p, 2, true), 3);
        assert_eq!(normalize_offset_to_visible(&mut p, 2, false), 1);
        assert_eq!(normalize_offset_to_visible(&mut p, 4, true), 4);
    }

    #[test]
    fn test_normalize_skips_hidden_line_prefix() {
        let mut p = pipeline("# 見出し\n> 引用");
        for (offset, forward) in [(0, true), (0, false), (1, true), (1, false)] {
            assert_eq!(normalize_offset_to_visible(&mut p, offset, forward), 2);
        }
        assert_eq!(normalize_offset_to_visible(&mut p, 6, false), 8);
        assert_eq!(normalize_offset_to_visible(&mut p, 7, true), 8);
        assert_eq!(normalize_offset_to_visible(&mut p, 5, true), 5);
    }

    #[test]
    fn test_normalize_skips_folded_lines() {
        let mut p = pipeline("# A\nbody\n# B");
        p.toggle_fold(0);
        assert_eq!(normalize_offset_to_visible(&mut p, 6, true), 11);
        assert_eq!(normalize_offset_to_visible(&mut p, 6, false), 3);
    }

    #[test]
    fn test_normalize_widget_interior() {
        let mut p = pipeline("x\n$$\ny\n$$");
        assert_eq!(normalize_offset_to_visible(&mut p, 6, true), 9);
        assert_eq!(normalize_offset_to_visible(&mut p, 6, false), 2);
    }

    #[test]
    fn test_caret_rect_prefers_wrapped_line_start() {
        let mut p = pipeline("abcdef");
        let mut layout = GridLayout::new(WritingMode::VerticalRl, 4);
        layout.layout(p.tree());
        let at_wrap = caret_rect(&mut p, &layout, 4).unwrap();
        let boxes = layout.char_boxes(0).unwrap();
        assert_eq!((at_wrap.x, at_wrap.y), (boxes[4].x, boxes[4].y));
        let end = caret_rect(&mut p, &layout, 6).unwrap();
        assert_eq!(end.y, boxes[5].bottom());
    }

    #[test]
    fn test_point_to_offset_paths() {
        let mut p = pipeline("abcd\nef");
        let mut layout = GridLayout::new(WritingMode::HorizontalTb, 10);
        layout.layout(p.tree());
        // inside 'b', right half
        assert_eq!(offset_from_point(&mut p, &layout, Point::new(28.0, 5.0)), Some(2));
        // beyond the end of line 0, same visual line
        assert_eq!(offset_from_point(&mut p, &layout, Point::new(500.0, 5.0)), Some(4));
        // far below everything: nearest visual line is line 1
        assert_eq!(offset_from_point(&mut p, &layout, Point::new(1.0, 900.0)), Some(5));
    }
}
