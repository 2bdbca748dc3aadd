//! Geometry shared by presenters and the caret mapper.
//!
//! Caret mapping needs only two things from a presenter: the box of each
//! visible character of a line, and optionally a native point hit-test.
//! [`GridLayout`] is a deterministic fixed-cell presenter used for
//! terminal-like targets and tests.

use std::collections::HashMap;

use tategaki_editor_core::WritingMode;

use crate::render::{LineElement, LineState, RenderNode, RenderTree};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(x, y, self.right().max(other.right()) - x, self.bottom().max(other.bottom()) - y)
    }

    /// Closest point of the rect to `p`.
    pub fn clamp(&self, p: Point) -> Point {
        Point::new(p.x.clamp(self.x, self.right()), p.y.clamp(self.y, self.bottom()))
    }
}

/// Axis helpers for a writing mode.
///
/// The inline axis is the direction characters advance within a visual
/// line; visual lines stack along the block axis.
pub trait FlowAxes {
    /// Position of `p` along the inline axis.
    fn inline_of(self, p: Point) -> f64;
    /// Position of `p` along the block axis, growing in flow order.
    fn block_of(self, p: Point) -> f64;
    /// Extent of `r` along the inline axis.
    fn inline_extent(self, r: &Rect) -> f64;
    /// Extent of `r` along the block axis.
    fn block_extent(self, r: &Rect) -> f64;
    /// A point with the given inline and flow-order block coordinates.
    fn point(self, inline: f64, block: f64) -> Point;
}

impl FlowAxes for WritingMode {
    fn inline_of(self, p: Point) -> f64 {
        if self.is_vertical() { p.y } else { p.x }
    }

    fn block_of(self, p: Point) -> f64 {
        match self {
            WritingMode::VerticalRl => -p.x,
            WritingMode::VerticalLr => p.x,
            WritingMode::HorizontalTb => p.y,
        }
    }

    fn inline_extent(self, r: &Rect) -> f64 {
        if self.is_vertical() { r.height } else { r.width }
    }

    fn block_extent(self, r: &Rect) -> f64 {
        if self.is_vertical() { r.width } else { r.height }
    }

    fn point(self, inline: f64, block: f64) -> Point {
        match self {
            WritingMode::VerticalRl => Point::new(-block, inline),
            WritingMode::VerticalLr => Point::new(block, inline),
            WritingMode::HorizontalTb => Point::new(inline, block),
        }
    }
}

/// What the caret mapper asks of a presenter.
pub trait LayoutProvider {
    fn writing_mode(&self) -> WritingMode;

    /// Box of each visible buffer character of `line`, in logical order.
    /// None when the line has no real layout (placeholder or hidden).
    fn char_boxes(&self, line: usize) -> Option<&[Rect]>;

    /// Bounding box of the whole line element.
    fn line_box(&self, line: usize) -> Option<Rect>;

    /// Native point hit-test, `caretPositionFromPoint` style: the line and
    /// visible caret index under `p`.
    fn caret_from_point(&self, _p: Point) -> Option<(usize, usize)> {
        None
    }

    /// Lines that currently have a layout, in document order.
    fn laid_out_lines(&self) -> Vec<usize>;
}

#[derive(Debug, Clone, Default)]
struct GridLine {
    boxes: Vec<Rect>,
    bounds: Rect,
}

/// Fixed-cell layout: every visible char, pending char and inline widget
/// takes one cell; a visual line holds `wrap_at` cells.
#[derive(Debug, Clone)]
pub struct GridLayout {
    mode: WritingMode,
    wrap_at: usize,
    cell_inline: f64,
    cell_block: f64,
    lines: HashMap<usize, GridLine>,
    order: Vec<usize>,
}

impl GridLayout {
    pub fn new(mode: WritingMode, wrap_at: usize) -> Self {
        Self {
            mode,
            wrap_at: wrap_at.max(1),
            cell_inline: 16.0,
            cell_block: 24.0,
            lines: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Cell size along the inline and block axes.
    pub fn with_cell(mut self, inline: f64, block: f64) -> Self {
        self.cell_inline = inline;
        self.cell_block = block;
        self
    }

    fn cell(&self, visual_line: usize, column: usize) -> Rect {
        let inline = column as f64 * self.cell_inline;
        let block = visual_line as f64 * self.cell_block;
        match self.mode {
            WritingMode::VerticalRl => Rect::new(
                -(block + self.cell_block),
                inline,
                self.cell_block,
                self.cell_inline,
            ),
            WritingMode::VerticalLr => {
                Rect::new(block, inline, self.cell_block, self.cell_inline)
            }
            WritingMode::HorizontalTb => {
                Rect::new(inline, block, self.cell_inline, self.cell_block)
            }
        }
    }

    /// Lay out every line of `tree` from the top.
    pub fn layout(&mut self, tree: &RenderTree) {
        self.lines.clear();
        self.order.clear();
        let mut visual = 0;
        for element in tree.lines() {
            match element.state {
                LineState::Hidden => continue,
                LineState::Light => {
                    visual += 1;
                }
                LineState::Full => {
                    let (line, used) = self.layout_line(element, visual);
                    visual += used;
                    self.lines.insert(element.line, line);
                    self.order.push(element.line);
                }
            }
        }
    }

    fn layout_line(&self, element: &LineElement, first_visual: usize) -> (GridLine, usize) {
        let mut boxes = Vec::new();
        let mut column = 0;
        let mut visual = first_visual;
        let mut advance = |count_box: bool, boxes: &mut Vec<Rect>| {
            if column == self.wrap_at {
                column = 0;
                visual += 1;
            }
            let rect = self.cell(visual, column);
            column += 1;
            if count_box {
                boxes.push(rect);
            }
        };
        for_each_cell(&element.children, &mut |is_buffer_char| {
            advance(is_buffer_char, &mut boxes)
        });
        let used = visual - first_visual + 1;
        let first = self.cell(first_visual, 0);
        let last = self.cell(first_visual + used - 1, self.wrap_at - 1);
        (
            GridLine {
                boxes,
                bounds: first.union(&last),
            },
            used,
        )
    }
}

/// Visit one cell per laid-out unit: `true` for buffer chars, `false` for
/// pending preview chars and widgets.
fn for_each_cell(nodes: &[RenderNode], f: &mut impl FnMut(bool)) {
    for node in nodes {
        match node {
            RenderNode::Run { text, .. } => text.chars().for_each(|_| f(true)),
            RenderNode::Pending { text } => text.chars().for_each(|_| f(false)),
            RenderNode::InlineWidget { .. } | RenderNode::BlockWidget { .. } => f(false),
            RenderNode::Cell { children, .. } => for_each_cell(children, f),
        }
    }
}

impl LayoutProvider for GridLayout {
    fn writing_mode(&self) -> WritingMode {
        self.mode
    }

    fn char_boxes(&self, line: usize) -> Option<&[Rect]> {
        self.lines.get(&line).map(|l| l.boxes.as_slice())
    }

    fn line_box(&self, line: usize) -> Option<Rect> {
        self.lines.get(&line).map(|l| l.bounds)
    }

    fn laid_out_lines(&self) -> Vec<usize> {
        self.order.clone()
    }
}
