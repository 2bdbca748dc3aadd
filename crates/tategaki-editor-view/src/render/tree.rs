//! Abstract render tree and its HTML presentation.
//!
//! One [`LineElement`] per buffer line. Elements carry their buffer
//! coordinates (`data-from`, `data-to`, `data-line`) and block kind
//! (`data-md-kind`); every other subsystem locates content through them.

use std::fmt::Write as _;
use std::ops::Range;

use markdown_weaver_escape::{escape_href, escape_html};
use smol_str::SmolStr;
use tategaki_editor_core::{BlockKind, InlineWidgetKind, LineRange};

#[derive(Debug, Clone, PartialEq)]
pub enum RenderNode {
    /// A visible slice of buffer text.
    Run {
        from: usize,
        to: usize,
        text: String,
        classes: Vec<SmolStr>,
        href: Option<SmolStr>,
        ruby: Option<SmolStr>,
    },
    /// Inline math or a footnote marker, standing in for hidden source.
    InlineWidget {
        at: usize,
        kind: InlineWidgetKind,
        html: String,
    },
    /// Uncommitted IME text shown at the caret.
    Pending { text: String },
    /// One table cell.
    Cell {
        index: usize,
        children: Vec<RenderNode>,
    },
    /// A whole block rendered as one element on its first line.
    BlockWidget {
        kind: BlockKind,
        lines: Range<usize>,
        html: String,
    },
}

impl RenderNode {
    fn shift(&mut self, delta: isize) {
        let move_by = |v: &mut usize| *v = (*v as isize + delta).max(0) as usize;
        match self {
            RenderNode::Run { from, to, .. } => {
                move_by(from);
                move_by(to);
            }
            RenderNode::InlineWidget { at, .. } => move_by(at),
            RenderNode::Cell { children, .. } => children.iter_mut().for_each(|c| c.shift(delta)),
            RenderNode::Pending { .. } | RenderNode::BlockWidget { .. } => {}
        }
    }

    fn push_text(&self, out: &mut String) {
        match self {
            RenderNode::Run { text, .. } => out.push_str(text),
            RenderNode::Cell { children, .. } => children.iter().for_each(|c| c.push_text(out)),
            _ => {}
        }
    }

    /// Length in UTF-16 code units of the text this node presents.
    pub fn utf16_len(&self) -> usize {
        match self {
            RenderNode::Run { text, .. } | RenderNode::Pending { text } => {
                text.encode_utf16().count()
            }
            RenderNode::Cell { children, .. } => children.iter().map(RenderNode::utf16_len).sum(),
            RenderNode::InlineWidget { .. } | RenderNode::BlockWidget { .. } => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineState {
    /// Decorated content.
    Full,
    /// Placeholder for an off-screen line.
    Light,
    /// Folded, hidden frontmatter, or covered by a block widget.
    Hidden,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineElement {
    pub line: usize,
    pub from: usize,
    pub to: usize,
    pub kind: BlockKind,
    pub state: LineState,
    pub classes: Vec<SmolStr>,
    pub children: Vec<RenderNode>,
    pub editable: bool,
}

impl LineElement {
    pub fn new(line: usize, range: LineRange, kind: BlockKind, state: LineState) -> Self {
        Self {
            line,
            from: range.from,
            to: range.to,
            kind,
            state,
            classes: Vec::new(),
            children: Vec::new(),
            editable: false,
        }
    }

    /// Text of the buffer runs, in order.
    pub fn visible_text(&self) -> String {
        let mut out = String::new();
        self.children.iter().for_each(|c| c.push_text(&mut out));
        out
    }

    /// Move to a new line index and range, shifting run offsets with it.
    pub fn relocate(&mut self, line: usize, range: LineRange) {
        let delta = range.from as isize - self.from as isize;
        if delta != 0 {
            self.children.iter_mut().for_each(|c| c.shift(delta));
        }
        self.line = line;
        self.from = range.from;
        self.to = range.to;
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        let state_class = match self.state {
            LineState::Full => "",
            LineState::Light => " tategaki-sot-light",
            LineState::Hidden => " tategaki-sot-hidden",
        };
        let _ = write!(
            out,
            r#"<div class="tategaki-sot-line{state_class}"#
        );
        for class in &self.classes {
            let _ = write!(out, " {class}");
        }
        let _ = write!(
            out,
            r#"" data-line="{}" data-from="{}" data-to="{}" data-md-kind="{}" contenteditable="{}""#,
            self.line,
            self.from,
            self.to,
            self.kind.as_str(),
            self.editable
        );
        if self.state == LineState::Light {
            let _ = write!(out, r#" style="--tategaki-approx-len:{}""#, self.to - self.from);
        }
        out.push('>');
        if self.state == LineState::Full {
            if self.children.is_empty() {
                out.push_str("<br>");
            }
            for child in &self.children {
                write_node(child, out);
            }
        }
        out.push_str("</div>");
    }
}

fn write_classes(out: &mut String, base: &str, classes: &[SmolStr]) {
    out.push_str(base);
    for class in classes {
        out.push(' ');
        out.push_str(class);
    }
}

fn write_node(node: &RenderNode, out: &mut String) {
    match node {
        RenderNode::Run {
            from,
            to,
            text,
            classes,
            href,
            ruby,
        } => {
            let tag = if href.is_some() { "a" } else { "span" };
            let _ = write!(out, "<{tag} class=\"");
            write_classes(out, "tategaki-sot-run", classes);
            let _ = write!(out, r#"" data-from="{from}" data-to="{to}""#);
            if let Some(href) = href {
                out.push_str(r#" href=""#);
                let _ = escape_href(&mut *out, href);
                out.push('"');
            }
            out.push('>');
            match ruby {
                Some(reading) => {
                    out.push_str("<ruby>");
                    let _ = escape_html(&mut *out, text);
                    out.push_str("<rt>");
                    let _ = escape_html(&mut *out, reading);
                    out.push_str("</rt></ruby>");
                }
                None => {
                    let _ = escape_html(&mut *out, text);
                }
            }
            let _ = write!(out, "</{tag}>");
        }
        RenderNode::InlineWidget { at, kind, html } => {
            let class = match kind {
                InlineWidgetKind::MathInline { .. } => "tategaki-math-inline",
                InlineWidgetKind::FootnoteRef { .. } => "tategaki-footnote-ref",
            };
            let _ = write!(
                out,
                r#"<span class="tategaki-inline-widget {class}" data-at="{at}" contenteditable="false">{html}</span>"#
            );
        }
        RenderNode::Pending { text } => {
            out.push_str(r#"<span class="tategaki-pending">"#);
            let _ = escape_html(&mut *out, text);
            out.push_str("</span>");
        }
        RenderNode::Cell { index, children } => {
            let _ = write!(out, r#"<span class="tategaki-table-cell" data-cell="{index}">"#);
            for child in children {
                write_node(child, out);
            }
            out.push_str("</span>");
        }
        RenderNode::BlockWidget { kind, lines, html } => {
            let _ = write!(
                out,
                r#"<div class="tategaki-block-widget tategaki-widget-{}" data-block-start="{}" data-block-end="{}" contenteditable="false">{html}</div>"#,
                kind.as_str(),
                lines.start,
                lines.end
            );
        }
    }
}

/// All line elements of a document, indexed by line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderTree {
    lines: Vec<LineElement>,
}

impl RenderTree {
    pub fn new(lines: Vec<LineElement>) -> Self {
        Self { lines }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn lines(&self) -> &[LineElement] {
        &self.lines
    }

    pub fn get(&self, line: usize) -> Option<&LineElement> {
        self.lines.get(line)
    }

    pub fn get_mut(&mut self, line: usize) -> Option<&mut LineElement> {
        self.lines.get_mut(line)
    }

    pub fn replace(&mut self, element: LineElement) {
        if let Some(slot) = self.lines.get_mut(element.line) {
            *slot = element;
        }
    }

    /// Replace elements `old` with `new`, leaving every other element untouched.
    pub fn splice(&mut self, old: Range<usize>, new: Vec<LineElement>) {
        let end = old.end.min(self.lines.len());
        let start = old.start.min(end);
        self.lines.splice(start..end, new);
    }

    /// Re-sync line indices and buffer coordinates after a shift.
    pub fn sync_ranges(&mut self, ranges: &[LineRange]) {
        for (i, (element, range)) in self.lines.iter_mut().zip(ranges).enumerate() {
            if element.line != i || element.from != range.from || element.to != range.to {
                element.relocate(i, *range);
            }
        }
    }

    pub fn to_html(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            line.write_html(&mut out);
        }
        out
    }
}
