//! Line renderer: segments and widgets of one line into a [`LineElement`].

use std::ops::Range;

use markdown_weaver::{Options, Parser, html};
use smol_str::{SmolStr, format_smolstr};
use tategaki_editor_core::math::{MathRenderer, fallback_html};
use tategaki_editor_core::segment::table_pipe_offsets;
use tategaki_editor_core::{
    BlockKind, InlineWidget, InlineWidgetKind, LineInfo, LineProjection, LineRange,
    RenderSegment,
};

use super::tree::{LineElement, LineState, RenderNode};

/// Options for rendering block widgets through the markdown parser.
fn block_md_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_GFM
        | Options::ENABLE_WIKILINKS
        | Options::ENABLE_OBSIDIAN_EMBEDS
}

/// Line-level classes derived from the classification.
pub fn line_classes(info: &LineInfo, folded: bool) -> Vec<SmolStr> {
    let mut classes = vec![format_smolstr!("tategaki-md-{}", info.kind.as_str())];
    if let Some(level) = info.heading_level {
        classes.push(format_smolstr!("tategaki-md-h{level}"));
        if folded {
            classes.push(SmolStr::new_static("tategaki-fold-collapsed"));
        }
    }
    if let Some(part) = info.code_part {
        classes.push(format_smolstr!("tategaki-code-{}", part.as_str()));
    }
    if let Some(kind) = &info.callout_type {
        classes.push(format_smolstr!("tategaki-callout-{kind}"));
    }
    classes
}

fn run_node(seg: &RenderSegment) -> RenderNode {
    RenderNode::Run {
        from: seg.from,
        to: seg.to,
        text: seg.text.clone(),
        classes: seg.classes.clone(),
        href: seg.href.clone(),
        ruby: seg.ruby.clone(),
    }
}

fn widget_node(widget: &InlineWidget, math: &dyn MathRenderer) -> RenderNode {
    let html = match &widget.kind {
        InlineWidgetKind::MathInline { source } => match math.render(source, false) {
            Ok(html) => html,
            Err(err) => {
                tracing::debug!(target: "tategaki::pipeline", %err, "inline math fallback");
                fallback_html(source, false)
            }
        },
        InlineWidgetKind::FootnoteRef { number, .. } => format!("<sup>{number}</sup>"),
    };
    RenderNode::InlineWidget {
        at: widget.at,
        kind: widget.kind.clone(),
        html,
    }
}

/// Segments and widgets interleaved in buffer order.
fn inline_nodes(projection: &LineProjection, math: &dyn MathRenderer) -> Vec<RenderNode> {
    let mut nodes = Vec::with_capacity(projection.segments.len() + projection.widgets.len());
    let mut widgets = projection.widgets.iter().peekable();
    for seg in &projection.segments {
        while let Some(w) = widgets.next_if(|w| w.at <= seg.from) {
            nodes.push(widget_node(w, math));
        }
        nodes.push(run_node(seg));
    }
    nodes.extend(widgets.map(|w| widget_node(w, math)));
    nodes
}

fn node_start(node: &RenderNode) -> usize {
    match node {
        RenderNode::Run { from, .. } => *from,
        RenderNode::InlineWidget { at, .. } => *at,
        _ => 0,
    }
}

/// Group a table row's nodes into cells split at the row's pipes.
fn table_cells(nodes: Vec<RenderNode>, text: &str, from: usize) -> Vec<RenderNode> {
    let pipes = table_pipe_offsets(text, from);
    let leading = text
        .chars()
        .position(|c| !c.is_whitespace())
        .is_some_and(|i| pipes.first() == Some(&(from + i)));
    let mut cells: Vec<Vec<RenderNode>> = Vec::new();
    for node in nodes {
        let start = node_start(&node);
        let before = pipes.iter().filter(|&&p| p < start).count();
        let index = before.saturating_sub(usize::from(leading));
        if cells.len() <= index {
            cells.resize_with(index + 1, Vec::new);
        }
        cells[index].push(node);
    }
    cells
        .into_iter()
        .enumerate()
        .map(|(index, children)| RenderNode::Cell { index, children })
        .collect()
}

/// Render a laid-out line from its projection.
pub fn render_line(
    line: usize,
    range: LineRange,
    text: &str,
    info: &LineInfo,
    projection: &LineProjection,
    folded: bool,
    math: &dyn MathRenderer,
) -> LineElement {
    let mut element = LineElement::new(line, range, info.kind, LineState::Full);
    element.classes = line_classes(info, folded);
    let nodes = inline_nodes(projection, math);
    element.children = if matches!(info.base_kind, BlockKind::TableRow) {
        table_cells(nodes, text, range.from)
    } else {
        nodes
    };
    element
}

/// Placeholder for an off-screen line.
pub fn render_line_light(line: usize, range: LineRange, info: &LineInfo) -> LineElement {
    let mut element = LineElement::new(line, range, info.kind, LineState::Light);
    element.classes = vec![format_smolstr!("tategaki-md-{}", info.kind.as_str())];
    element
}

/// A line with no visual content of its own.
pub fn render_hidden(line: usize, range: LineRange, info: &LineInfo, widget_covered: bool) -> LineElement {
    let mut element = LineElement::new(line, range, info.kind, LineState::Hidden);
    if widget_covered {
        element.classes.push(SmolStr::new_static("widget-hidden"));
    }
    element
}

/// Source of a math block without its `$$` fences.
pub fn math_block_source(block: &str) -> &str {
    let trimmed = block.trim();
    let inner = trimmed.strip_prefix("$$").unwrap_or(trimmed);
    inner.strip_suffix("$$").unwrap_or(inner).trim()
}

fn block_widget_html(kind: BlockKind, block: &str, math: &dyn MathRenderer) -> String {
    if matches!(kind, BlockKind::Math | BlockKind::MathFence) {
        let source = math_block_source(block);
        return match math.render(source, true) {
            Ok(html) => html,
            Err(err) => {
                tracing::debug!(target: "tategaki::pipeline", %err, "math block fallback");
                fallback_html(source, true)
            }
        };
    }
    let mut out = String::new();
    html::push_html(&mut out, Parser::new_ext(block, block_md_options()));
    out
}

/// First line of a block shown as one widget; `block` is the block source.
pub fn render_block_widget(
    line: usize,
    range: LineRange,
    info: &LineInfo,
    lines: Range<usize>,
    block: &str,
    math: &dyn MathRenderer,
) -> LineElement {
    let mut element = LineElement::new(line, range, info.kind, LineState::Full);
    element.classes = line_classes(info, false);
    element.classes.push(SmolStr::new_static("tategaki-widget-line"));
    element.children = vec![RenderNode::BlockWidget {
        kind: info.base_kind,
        lines,
        html: block_widget_html(info.base_kind, block, math),
    }];
    element
}

/// Copy of `element` with uncommitted text shown at buffer offset `at`.
///
/// The run containing `at` is split around the preview; no decoration is
/// recomputed.
pub fn with_pending(element: &LineElement, at: usize, text: &str) -> LineElement {
    let mut out = element.clone();
    let pending = RenderNode::Pending {
        text: text.to_string(),
    };
    let mut children = Vec::with_capacity(out.children.len() + 2);
    let mut placed = false;
    for node in out.children.drain(..) {
        if placed {
            children.push(node);
            continue;
        }
        match node {
            RenderNode::Run {
                from,
                to,
                text: run_text,
                classes,
                href,
                ruby: None,
            } if from <= at && at < to => {
                let split = at - from;
                let head: String = run_text.chars().take(split).collect();
                let tail: String = run_text.chars().skip(split).collect();
                if !head.is_empty() {
                    children.push(RenderNode::Run {
                        from,
                        to: at,
                        text: head,
                        classes: classes.clone(),
                        href: href.clone(),
                        ruby: None,
                    });
                }
                children.push(pending.clone());
                children.push(RenderNode::Run {
                    from: at,
                    to,
                    text: tail,
                    classes,
                    href,
                    ruby: None,
                });
                placed = true;
            }
            other => {
                if node_start(&other) >= at && matches!(other, RenderNode::Run { .. } | RenderNode::InlineWidget { .. }) {
                    children.push(pending.clone());
                    placed = true;
                }
                children.push(other);
            }
        }
    }
    if !placed {
        children.push(pending);
    }
    out.children = children;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tategaki_editor_core::{
        CoreError, DecorationContext, LatexRenderer, SegmentContext, build_line_projection,
        recompute_line_block_kinds,
    };

    struct FailingMath;

    impl MathRenderer for FailingMath {
        fn render(&self, _source: &str, _display: bool) -> Result<String, CoreError> {
            Err(CoreError::Math("unsupported".into()))
        }
    }

    fn element_for(lines: &[&str], i: usize, math: &dyn MathRenderer) -> LineElement {
        let c = recompute_line_block_kinds(lines, &BTreeSet::new());
        let info = &c.lines[i];
        let ctx = SegmentContext {
            decoration: DecorationContext {
                refs: Some(&c.refs),
                ruby: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let from: usize = lines[..i].iter().map(|l| l.chars().count() + 1).sum();
        let to = from + lines[i].chars().count();
        let projection = build_line_projection(lines[i], from, info, &ctx);
        render_line(i, LineRange::new(from, to), lines[i], info, &projection, false, math)
    }

    #[test]
    fn test_inline_math_widget_between_runs() {
        let el = element_for(&["a $x$ b"], 0, &LatexRenderer);
        assert_eq!(el.children.len(), 3);
        assert!(matches!(el.children[1], RenderNode::InlineWidget { at: 2, .. }));
        assert_eq!(el.visible_text(), "a  b");
    }

    #[test]
    fn test_math_failure_falls_back() {
        let el = element_for(&["$x$"], 0, &FailingMath);
        let RenderNode::InlineWidget { html, .. } = &el.children[0] else {
            panic!("expected widget");
        };
        assert!(html.contains("tategaki-math-fallback"));
        assert!(html.contains("$x$"));
    }

    #[test]
    fn test_footnote_marker() {
        let el = element_for(&["本文[^n]", "", "[^n]: 注"], 0, &LatexRenderer);
        assert!(el.to_html().contains("<sup>1</sup>"));
    }

    #[test]
    fn test_table_row_cells() {
        let lines = ["| a | b\\|c |", "|---|---|"];
        let el = element_for(&lines, 0, &LatexRenderer);
        let cells: Vec<String> = el
            .children
            .iter()
            .map(|c| {
                let mut s = String::new();
                if let RenderNode::Cell { children, .. } = c {
                    for n in children {
                        if let RenderNode::Run { text, .. } = n {
                            s.push_str(text);
                        }
                    }
                }
                s
            })
            .collect();
        assert_eq!(cells[0], " a ");
        assert!(cells[1].contains("b") && cells[1].contains("c"));
    }

    #[test]
    fn test_heading_classes() {
        let el = element_for(&["## 見出し"], 0, &LatexRenderer);
        assert_eq!(el.classes, vec!["tategaki-md-heading", "tategaki-md-h2"]);
        assert_eq!(el.visible_text(), "見出し");
    }

    #[test]
    fn test_pending_splits_run() {
        let el = element_for(&["abcd"], 0, &LatexRenderer);
        let pending = with_pending(&el, 2, "かな");
        assert_eq!(pending.children.len(), 3);
        assert!(matches!(&pending.children[1], RenderNode::Pending { text } if text == "かな"));
        assert_eq!(pending.visible_text(), "abcd");
    }

    #[test]
    fn test_pending_at_line_end() {
        let el = element_for(&["ab"], 0, &LatexRenderer);
        let pending = with_pending(&el, 2, "x");
        assert!(matches!(pending.children.last(), Some(RenderNode::Pending { .. })));
    }

    #[test]
    fn test_math_block_widget() {
        assert_eq!(math_block_source("$$\nx^2\n$$"), "x^2");
        assert_eq!(math_block_source("$$y$$"), "y");
        let info = LineInfo {
            kind: BlockKind::MathFence,
            base_kind: BlockKind::MathFence,
            ..Default::default()
        };
        let el = render_block_widget(0, LineRange::new(0, 9), &info, 0..2, "$$\nx^2\n$$", &LatexRenderer);
        assert!(el.to_html().contains("<math"));
    }

    #[test]
    fn test_table_block_widget_renders_html_table() {
        let info = LineInfo {
            kind: BlockKind::TableRow,
            base_kind: BlockKind::TableRow,
            ..Default::default()
        };
        let el = render_block_widget(0, LineRange::new(0, 5), &info, 0..1, "| a |\n|---|\n| 1 |", &LatexRenderer);
        assert!(el.to_html().contains("<table>"));
    }
}
