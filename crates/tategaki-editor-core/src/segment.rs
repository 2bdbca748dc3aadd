//! Segment builder: the visible-text projection of one line.
//!
//! A line's segments are cuts of the complement of its hidden ranges. Their
//! offset ranges are strictly increasing and non-overlapping, and their texts
//! concatenate to the line text with every hidden range removed. Every
//! buffer/visual mapping in the view is defined over these boundaries.

use std::collections::BTreeSet;
use std::ops::Range;

use smol_str::SmolStr;

use crate::decoration::{
    DecorationContext, InlineWidget, LineDecorations, SpanClass, decorate_line, merge_ranges,
};
use crate::highlight::{Highlighter, runs_match_text};
use crate::line_model::{BlockKind, LineInfo};
use crate::scan::table_split_points;

/// A contiguous visible run of one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSegment {
    pub from: usize,
    pub to: usize,
    pub text: String,
    /// Sorted, deduplicated class names.
    pub classes: Vec<SmolStr>,
    pub href: Option<SmolStr>,
    pub ruby: Option<SmolStr>,
}

impl RenderSegment {
    pub fn len(&self) -> usize {
        self.to - self.from
    }

    pub fn is_empty(&self) -> bool {
        self.from == self.to
    }

    fn same_style(&self, other: &RenderSegment) -> bool {
        self.classes == other.classes && self.href == other.href && self.ruby == other.ruby
    }
}

/// Segments plus the widgets and hidden ranges they were cut from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineProjection {
    pub segments: Vec<RenderSegment>,
    pub widgets: Vec<InlineWidget>,
    /// Merged hidden ranges, absolute.
    pub hidden: Vec<Range<usize>>,
}

impl LineProjection {
    /// Concatenated visible text.
    pub fn visible_text(&self) -> String {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }

    /// Whether `offset` is a position the caret may rest on: inside or at
    /// the edge of a segment, or at either side of an inline widget.
    pub fn is_visible_offset(&self, offset: usize) -> bool {
        self.segments
            .iter()
            .any(|s| offset >= s.from && offset <= s.to)
            || self
                .widgets
                .iter()
                .any(|w| offset == w.range.start || offset == w.range.end)
    }

    /// Closest caret position at or after `offset` (or at or before it when
    /// `forward` is false). None when there is none on that side.
    pub fn nearest_visible_offset(&self, offset: usize, forward: bool) -> Option<usize> {
        let bounds = self
            .segments
            .iter()
            .flat_map(|s| [s.from, s.to])
            .chain(self.widgets.iter().flat_map(|w| [w.range.start, w.range.end]));
        if forward {
            bounds.filter(|&b| b >= offset).min()
        } else {
            bounds.filter(|&b| b <= offset).max()
        }
    }
}

/// Inputs to the segment builder besides the line itself.
#[derive(Clone, Copy, Default)]
pub struct SegmentContext<'a> {
    pub decoration: DecorationContext<'a>,
    pub highlighter: Option<&'a dyn Highlighter>,
    /// Plain-text view: nothing is hidden or styled except code.
    pub source_mode: bool,
    /// This line's block renders as a widget (the caret is outside it).
    pub block_widget: bool,
    pub hide_frontmatter: bool,
}

/// How a line is projected, decided from its classification alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineShape {
    /// Folded away, hidden frontmatter, or covered by a block widget.
    Hidden,
    /// Syntax-highlighted code body.
    Code,
    /// One unstyled run (fences, frontmatter, math source, source mode).
    Plain,
    TableRow,
    Decorated,
}

pub fn line_shape(info: &LineInfo, ctx: &SegmentContext<'_>) -> LineShape {
    let kind = info.base_kind;
    if info.is_hidden() {
        return LineShape::Hidden;
    }
    if ctx.hide_frontmatter
        && matches!(kind, BlockKind::Frontmatter | BlockKind::FrontmatterFence)
    {
        return LineShape::Hidden;
    }
    if ctx.block_widget && kind.is_widget_block() {
        return LineShape::Hidden;
    }
    if kind == BlockKind::Code {
        return LineShape::Code;
    }
    if ctx.source_mode || kind.is_verbatim() || kind == BlockKind::TableSep {
        return LineShape::Plain;
    }
    if kind == BlockKind::TableRow {
        return LineShape::TableRow;
    }
    LineShape::Decorated
}

fn plain_run(text: &str, from: usize) -> Vec<RenderSegment> {
    if text.is_empty() {
        return Vec::new();
    }
    vec![RenderSegment {
        from,
        to: from + text.chars().count(),
        text: text.to_string(),
        classes: Vec::new(),
        href: None,
        ruby: None,
    }]
}

fn code_segments(
    text: &str,
    from: usize,
    lang: Option<&str>,
    highlighter: Option<&dyn Highlighter>,
) -> Vec<RenderSegment> {
    let Some(hl) = highlighter else {
        return plain_run(text, from);
    };
    let runs = match hl.highlight_line(lang, text) {
        Ok(runs) if runs_match_text(&runs, text) => runs,
        Ok(_) => {
            tracing::debug!(
                target: "tategaki::decorate",
                from,
                "highlight length mismatch, plain run"
            );
            return plain_run(text, from);
        }
        Err(err) => {
            tracing::warn!(
                target: "tategaki::decorate",
                error = %err,
                "highlighter failed, plain run"
            );
            return plain_run(text, from);
        }
    };
    let mut pos = from;
    runs.into_iter()
        .filter(|r| !r.text.is_empty())
        .map(|r| {
            let len = r.text.chars().count();
            let seg = RenderSegment {
                from: pos,
                to: pos + len,
                text: r.text,
                classes: r.class.into_iter().collect(),
                href: None,
                ruby: None,
            };
            pos += len;
            seg
        })
        .collect()
}

/// Absolute offsets of the pipes a table row hides: the leading border pipe
/// (when present) and every column separator.
pub fn table_pipe_offsets(text: &str, from: usize) -> Vec<usize> {
    let mut pipes = Vec::new();
    if let Some((i, '|')) = text.chars().enumerate().find(|(_, c)| !c.is_whitespace()) {
        pipes.push(from + i);
    }
    pipes.extend(table_split_points(text).into_iter().map(|p| from + p));
    pipes
}

/// Cut the visible complement of `hidden` at every decoration boundary.
pub fn cut_segments(
    text: &str,
    from: usize,
    decorations: &LineDecorations,
    extra_hidden: &[Range<usize>],
) -> (Vec<RenderSegment>, Vec<Range<usize>>) {
    let chars: Vec<char> = text.chars().collect();
    let to = from + chars.len();
    let mut hidden_all = decorations.hidden.clone();
    hidden_all.extend(extra_hidden.iter().cloned());
    let hidden = merge_ranges(hidden_all);

    let mut cuts: BTreeSet<usize> = BTreeSet::from([from, to]);
    let mut add = |r: &Range<usize>| {
        cuts.insert(r.start.clamp(from, to));
        cuts.insert(r.end.clamp(from, to));
    };
    hidden.iter().for_each(&mut add);
    decorations.styles.iter().for_each(|s| add(&s.range));
    decorations.links.iter().for_each(|l| add(&l.range));
    decorations.ruby.iter().for_each(|r| add(&r.range));
    decorations.tcy.iter().for_each(&mut add);

    let cuts: Vec<usize> = cuts.into_iter().collect();
    let mut segments: Vec<RenderSegment> = Vec::new();
    for pair in cuts.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if a >= b || hidden.iter().any(|h| h.start <= a && b <= h.end) {
            continue;
        }
        let covers = |r: &Range<usize>| r.start <= a && b <= r.end;
        let mut classes: BTreeSet<SmolStr> = decorations
            .styles
            .iter()
            .filter(|s| covers(&s.range))
            .map(|s| SmolStr::new_static(s.class.as_class()))
            .collect();
        if decorations.tcy.iter().any(|r| covers(r)) {
            classes.insert(SmolStr::new_static(SpanClass::Tcy.as_class()));
        }
        let ruby = decorations
            .ruby
            .iter()
            .find(|r| covers(&r.range))
            .map(|r| r.text.clone());
        if ruby.is_some() {
            classes.insert(SmolStr::new_static(SpanClass::Ruby.as_class()));
        }
        let href = decorations
            .links
            .iter()
            .find(|l| covers(&l.range))
            .map(|l| l.href.clone());
        let seg = RenderSegment {
            from: a,
            to: b,
            text: chars[a - from..b - from].iter().collect(),
            classes: classes.into_iter().collect(),
            href,
            ruby,
        };
        match segments.last_mut() {
            // Ruby bases stay separate so each keeps its own annotation.
            Some(last) if last.to == a && last.same_style(&seg) && seg.ruby.is_none() => {
                last.to = b;
                last.text.push_str(&seg.text);
            }
            _ => segments.push(seg),
        }
    }
    (segments, hidden)
}

/// Build the projection of the line `text` starting at absolute `from`.
pub fn build_line_projection(
    text: &str,
    from: usize,
    info: &LineInfo,
    ctx: &SegmentContext<'_>,
) -> LineProjection {
    match line_shape(info, ctx) {
        LineShape::Hidden => LineProjection::default(),
        LineShape::Plain => LineProjection {
            segments: plain_run(text, from),
            ..Default::default()
        },
        LineShape::Code => LineProjection {
            segments: code_segments(text, from, info.code_lang.as_deref(), ctx.highlighter),
            ..Default::default()
        },
        shape @ (LineShape::TableRow | LineShape::Decorated) => {
            let decorations = decorate_line(text, from, info, &ctx.decoration);
            let pipes: Vec<Range<usize>> = if shape == LineShape::TableRow {
                table_pipe_offsets(text, from)
                    .into_iter()
                    .map(|p| p..p + 1)
                    .collect()
            } else {
                Vec::new()
            };
            let (segments, hidden) = cut_segments(text, from, &decorations, &pipes);
            LineProjection {
                segments,
                widgets: decorations.widgets,
                hidden,
            }
        }
    }
}

/// The segments of one line.
pub fn build_segments_for_line(
    text: &str,
    from: usize,
    info: &LineInfo,
    ctx: &SegmentContext<'_>,
) -> Vec<RenderSegment> {
    build_line_projection(text, from, info, ctx).segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::highlight::{HighlightRun, SyntectHighlighter};
    use crate::line_model::recompute_line_block_kinds;

    fn info(lines: &[&str], i: usize) -> LineInfo {
        recompute_line_block_kinds(lines, &BTreeSet::new()).lines[i].clone()
    }

    fn texts(segs: &[RenderSegment]) -> Vec<&str> {
        segs.iter().map(|s| s.text.as_str()).collect()
    }

    #[test]
    fn test_bold_segments() {
        let line = "a **b** c";
        let segs = build_segments_for_line(line, 0, &info(&[line], 0), &SegmentContext::default());
        assert_eq!(texts(&segs), vec!["a ", "b", " c"]);
        assert_eq!(segs[1].classes, vec![SmolStr::new("tategaki-md-bold")]);
        assert_eq!((segs[1].from, segs[1].to), (4, 5));
    }

    #[test]
    fn test_hidden_escape_splits_runs() {
        let line = r"a\*b";
        let segs = build_segments_for_line(line, 0, &info(&[line], 0), &SegmentContext::default());
        assert_eq!(texts(&segs), vec!["a", "*b"]);
    }

    #[test]
    fn test_ruby_segment() {
        let line = "前｜漢字《かんじ》後";
        let ctx = SegmentContext {
            decoration: DecorationContext {
                ruby: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let segs = build_segments_for_line(line, 0, &info(&[line], 0), &ctx);
        assert_eq!(texts(&segs), vec!["前", "漢字", "後"]);
        assert_eq!(segs[1].ruby.as_deref(), Some("かんじ"));
        assert!(segs[1].classes.contains(&SmolStr::new("tategaki-ruby")));
    }

    #[test]
    fn test_link_href() {
        let line = "[x](u)";
        let segs = build_segments_for_line(line, 5, &info(&[line], 0), &SegmentContext::default());
        assert_eq!(segs.len(), 1);
        assert_eq!(segs[0].href.as_deref(), Some("u"));
        assert_eq!((segs[0].from, segs[0].to), (6, 7));
    }

    #[test]
    fn test_source_mode_single_run() {
        let line = "## **b**";
        let ctx = SegmentContext {
            source_mode: true,
            ..Default::default()
        };
        let segs = build_segments_for_line(line, 0, &info(&[line], 0), &ctx);
        assert_eq!(texts(&segs), vec!["## **b**"]);
        assert!(segs[0].classes.is_empty());
    }

    #[test]
    fn test_code_line_highlighted() {
        let lines = ["```rust", "let x = 1;", "```"];
        let hl = SyntectHighlighter::default();
        let ctx = SegmentContext {
            highlighter: Some(&hl),
            ..Default::default()
        };
        let segs = build_segments_for_line(lines[1], 8, &info(&lines, 1), &ctx);
        assert_eq!(segs.concat_text(), "let x = 1;");
        assert_eq!(segs.last().map(|s| s.to), Some(18));
    }

    struct Lying;

    impl Highlighter for Lying {
        fn highlight_line(
            &self,
            _lang: Option<&str>,
            _text: &str,
        ) -> Result<Vec<HighlightRun>, crate::CoreError> {
            Ok(vec![HighlightRun {
                text: "nope".into(),
                class: Some("hl-x".into()),
            }])
        }
    }

    #[test]
    fn test_highlight_mismatch_degrades() {
        let lines = ["```", "abc", "```"];
        let ctx = SegmentContext {
            highlighter: Some(&Lying),
            ..Default::default()
        };
        let segs = build_segments_for_line(lines[1], 4, &info(&lines, 1), &ctx);
        assert_eq!(texts(&segs), vec!["abc"]);
        assert!(segs[0].classes.is_empty());
    }

    #[test]
    fn test_fence_and_hidden_lines() {
        let lines = ["# A", "body", "```", "x", "```"];
        let c = recompute_line_block_kinds(&lines, &BTreeSet::from([0]));
        let ctx = SegmentContext::default();
        assert!(build_segments_for_line(lines[1], 4, &c.lines[1], &ctx).is_empty());
        // The fold runs to the end, so fences are hidden too.
        assert!(build_segments_for_line(lines[2], 9, &c.lines[2], &ctx).is_empty());

        let c = recompute_line_block_kinds(&lines, &BTreeSet::new());
        let fence = build_segments_for_line(lines[2], 9, &c.lines[2], &ctx);
        assert_eq!(texts(&fence), vec!["```"]);
    }

    #[test]
    fn test_widget_line_hidden_when_collapsed() {
        let lines = ["![a](b.png)"];
        let ctx = SegmentContext {
            block_widget: true,
            ..Default::default()
        };
        assert!(build_segments_for_line(lines[0], 0, &info(&lines, 0), &ctx).is_empty());
        let revealed =
            build_segments_for_line(lines[0], 0, &info(&lines, 0), &SegmentContext::default());
        assert_eq!(texts(&revealed), vec!["a"]);
    }

    #[test]
    fn test_table_row_hides_pipes() {
        let lines = ["| a | b\\|c | d |", "|---|---|---|"];
        let proj = build_line_projection(lines[0], 0, &info(&lines, 0), &SegmentContext::default());
        assert_eq!(proj.visible_text(), " a  b|c  d ");
        assert_eq!(table_pipe_offsets(lines[0], 0), vec![0, 4, 11, 15]);
    }

    #[test]
    fn test_inline_math_widget_survives() {
        let line = "x $a$ y";
        let proj = build_line_projection(line, 0, &info(&[line], 0), &SegmentContext::default());
        assert_eq!(proj.visible_text(), "x  y");
        assert_eq!(proj.widgets.len(), 1);
        assert_eq!(proj.hidden, vec![2..5]);
    }

    trait ConcatText {
        fn concat_text(&self) -> String;
    }

    impl ConcatText for Vec<RenderSegment> {
        fn concat_text(&self) -> String {
            self.iter().map(|s| s.text.as_str()).collect()
        }
    }
}
