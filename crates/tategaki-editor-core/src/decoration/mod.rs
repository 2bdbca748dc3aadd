//! Inline decoration engine.
//!
//! For one line, computes the ranges of Markdown syntax to hide, the styled,
//! link, ruby and tate-chu-yoko ranges over the visible text, and zero-width
//! inline widgets (inline math, footnote numbers). Nothing here mutates the
//! buffer; every output is a char-offset interval into it.
//!
//! Sources, in order: block prefixes from the line classification, the
//! shared line scanner (links, embeds, code spans, footnotes, math, escapes),
//! emphasis from a syntax tree when one is supplied (falling back to the
//! character scanner), then ruby and tcy over what is left.

mod emphasis;
mod ruby;
mod tcy;
mod tree;

use std::ops::Range;

use smol_str::SmolStr;

pub use emphasis::{EmphasisRun, scan_emphasis};
pub use ruby::{RubyMatch, find_ruby};
pub use tcy::find_tcy;
pub use tree::{MarkdownTreeProvider, SyntaxNode, SyntaxNodeKind, SyntaxTreeProvider};

use crate::line_model::{BlockKind, LineInfo};
use crate::scan::{self, ConstructKind, RefResolver, ScanMatch, ScanSink};

/// Inline styles that formatting commands can toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InlineStyle {
    Bold,
    Italic,
    Strike,
    Highlight,
    Code,
}

impl InlineStyle {
    pub const ALL: [InlineStyle; 5] = [
        InlineStyle::Bold,
        InlineStyle::Italic,
        InlineStyle::Strike,
        InlineStyle::Highlight,
        InlineStyle::Code,
    ];

    /// Marker inserted by formatting commands.
    pub fn marker(self) -> &'static str {
        match self {
            InlineStyle::Bold => "**",
            InlineStyle::Italic => "*",
            InlineStyle::Strike => "~~",
            InlineStyle::Highlight => "==",
            InlineStyle::Code => "`",
        }
    }
}

/// Visual class attached to a styled range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SpanClass {
    Style(InlineStyle),
    Link,
    WikiLink,
    Embed,
    InlineFootnote,
    Ruby,
    Tcy,
}

impl SpanClass {
    pub fn as_class(self) -> &'static str {
        match self {
            SpanClass::Style(InlineStyle::Bold) => "tategaki-md-bold",
            SpanClass::Style(InlineStyle::Italic) => "tategaki-md-italic",
            SpanClass::Style(InlineStyle::Strike) => "tategaki-md-strike",
            SpanClass::Style(InlineStyle::Highlight) => "tategaki-md-highlight",
            SpanClass::Style(InlineStyle::Code) => "tategaki-md-code",
            SpanClass::Link => "tategaki-md-link",
            SpanClass::WikiLink => "tategaki-md-wikilink",
            SpanClass::Embed => "tategaki-md-embed",
            SpanClass::InlineFootnote => "tategaki-md-inline-footnote",
            SpanClass::Ruby => "tategaki-ruby",
            SpanClass::Tcy => "tategaki-tcy",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledRange {
    pub range: Range<usize>,
    pub class: SpanClass,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRange {
    pub range: Range<usize>,
    pub href: SmolStr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RubyRange {
    pub range: Range<usize>,
    pub text: SmolStr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InlineWidgetKind {
    MathInline { source: SmolStr },
    FootnoteRef { id: SmolStr, number: usize },
}

/// Out-of-band content mounted at `at`, standing in for the hidden `range`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineWidget {
    pub at: usize,
    pub range: Range<usize>,
    pub kind: InlineWidgetKind,
}

/// Everything the segment builder needs to know about one line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineDecorations {
    pub hidden: Vec<Range<usize>>,
    pub styles: Vec<StyledRange>,
    pub links: Vec<LinkRange>,
    pub ruby: Vec<RubyRange>,
    pub tcy: Vec<Range<usize>>,
    pub widgets: Vec<InlineWidget>,
}

impl LineDecorations {
    /// Hidden ranges sorted with overlaps and touching ranges coalesced.
    pub fn merged_hidden(&self) -> Vec<Range<usize>> {
        merge_ranges(self.hidden.clone())
    }

    fn clamp_to(&mut self, line: Range<usize>) {
        let clamp = |r: &Range<usize>| {
            let start = r.start.clamp(line.start, line.end);
            start..r.end.clamp(start, line.end)
        };
        self.hidden = self
            .hidden
            .iter()
            .map(clamp)
            .filter(|r| !r.is_empty())
            .collect();
        for s in &mut self.styles {
            s.range = clamp(&s.range);
        }
        self.styles.retain(|s| !s.range.is_empty());
        for l in &mut self.links {
            l.range = clamp(&l.range);
        }
        self.links.retain(|l| !l.range.is_empty());
        for r in &mut self.ruby {
            r.range = clamp(&r.range);
        }
        self.ruby.retain(|r| !r.range.is_empty());
        self.tcy = self
            .tcy
            .iter()
            .map(clamp)
            .filter(|r| !r.is_empty())
            .collect();
        for w in &mut self.widgets {
            w.range = clamp(&w.range);
            w.at = w.at.clamp(line.start, line.end);
        }
    }
}

/// Sort and coalesce ranges; empty ranges are dropped.
pub fn merge_ranges(mut ranges: Vec<Range<usize>>) -> Vec<Range<usize>> {
    ranges.retain(|r| r.start < r.end);
    ranges.sort_by_key(|r| (r.start, r.end));
    let mut out: Vec<Range<usize>> = Vec::with_capacity(ranges.len());
    for r in ranges {
        match out.last_mut() {
            Some(last) if r.start <= last.end => last.end = last.end.max(r.end),
            _ => out.push(r),
        }
    }
    out
}

/// Inputs besides the line text.
#[derive(Clone, Copy, Default)]
pub struct DecorationContext<'a> {
    pub refs: Option<&'a dyn RefResolver>,
    pub tree: Option<&'a dyn SyntaxTreeProvider>,
    pub ruby: bool,
    /// Maximum tcy run length; `None` outside vertical writing modes.
    pub tcy_max: Option<usize>,
}

/// Hidden range of a line's block prefix (`## `, `> `, `> [!note] `).
pub fn block_prefix_len(text: &str, info: &LineInfo) -> usize {
    let chars: Vec<char> = text.chars().collect();
    let skip_ws = |mut i: usize| {
        while i < chars.len() && (chars[i] == ' ' || chars[i] == '\t') {
            i += 1;
        }
        i
    };
    match info.base_kind {
        BlockKind::Heading => {
            let start = skip_ws(0);
            let mut i = start;
            while i < chars.len() && chars[i] == '#' {
                i += 1;
            }
            if i < chars.len() { i + 1 } else { i }
        }
        BlockKind::Blockquote | BlockKind::Callout | BlockKind::CalloutTitle => {
            let mut i = skip_ws(0);
            while i < chars.len() && chars[i] == '>' {
                i += 1;
                if chars.get(i) == Some(&' ') {
                    i += 1;
                }
                i = skip_ws(i);
            }
            if info.base_kind == BlockKind::CalloutTitle && chars.get(i) == Some(&'[') {
                if let Some(close) = (i..chars.len()).find(|&j| chars[j] == ']') {
                    i = close + 1;
                    if matches!(chars.get(i), Some('-') | Some('+')) {
                        i += 1;
                    }
                    if chars.get(i) == Some(&' ') {
                        i += 1;
                    }
                }
            }
            i
        }
        _ => 0,
    }
}

struct DecorationSink<'a> {
    out: &'a mut LineDecorations,
    /// Ranges emphasis, ruby and tcy must not touch.
    protected: Vec<Range<usize>>,
    refs: Option<&'a dyn RefResolver>,
}

impl DecorationSink<'_> {
    fn style(&mut self, range: Range<usize>, class: SpanClass) {
        self.out.styles.push(StyledRange { range, class });
    }

    fn link(&mut self, range: Range<usize>, href: Option<SmolStr>) {
        if let Some(href) = href {
            self.out.links.push(LinkRange { range, href });
        }
    }
}

impl ScanSink for DecorationSink<'_> {
    fn push(&mut self, m: ScanMatch) {
        self.out.hidden.extend(m.markers.iter().cloned());
        self.protected.extend(m.markers.iter().cloned());
        match m.kind {
            ConstructKind::CodeSpan => {
                self.style(m.content.clone(), SpanClass::Style(InlineStyle::Code));
                self.protected.push(m.span);
            }
            ConstructKind::Autolink => {
                self.style(m.content.clone(), SpanClass::Link);
                self.link(m.content, m.target);
                self.protected.push(m.span);
            }
            ConstructKind::Image | ConstructKind::WikiImageEmbed | ConstructKind::WikiEmbed => {
                self.style(m.content.clone(), SpanClass::Embed);
                self.link(m.content, m.target);
            }
            ConstructKind::WikiLink => {
                self.style(m.content.clone(), SpanClass::WikiLink);
                self.link(m.content, m.target);
            }
            ConstructKind::Link => {
                self.style(m.content.clone(), SpanClass::Link);
                self.link(m.content, m.target);
            }
            ConstructKind::InlineFootnote => {
                self.style(m.content, SpanClass::InlineFootnote);
            }
            ConstructKind::FootnoteRef => {
                let id = m.target.unwrap_or_default();
                let number = self
                    .refs
                    .and_then(|r| r.footnote_number(&id))
                    .unwrap_or_default();
                self.out.widgets.push(InlineWidget {
                    at: m.span.end,
                    range: m.span,
                    kind: InlineWidgetKind::FootnoteRef { id, number },
                });
            }
            ConstructKind::InlineMath => {
                self.out.widgets.push(InlineWidget {
                    at: m.span.start,
                    range: m.span.clone(),
                    kind: InlineWidgetKind::MathInline {
                        source: m.target.unwrap_or_default(),
                    },
                });
                self.protected.push(m.span);
            }
            ConstructKind::Escape => {
                self.protected.push(m.span);
            }
        }
    }
}

/// Decorate one line.
///
/// `base` is the line's absolute start offset. Verbatim lines (code, math,
/// frontmatter) get no decorations.
pub fn decorate_line(
    text: &str,
    base: usize,
    info: &LineInfo,
    ctx: &DecorationContext<'_>,
) -> LineDecorations {
    let mut out = LineDecorations::default();
    if info.base_kind.is_verbatim() {
        return out;
    }
    let chars: Vec<char> = text.chars().collect();
    let line = base..base + chars.len();

    let prefix = block_prefix_len(text, info);
    if prefix > 0 {
        out.hidden.push(base..base + prefix);
    }

    let protected = {
        let mut sink = DecorationSink {
            out: &mut out,
            protected: vec![base..base + prefix],
            refs: ctx.refs,
        };
        scan::scan_line(text, base, ctx.refs, &mut sink);
        sink.protected
    };
    let local: Vec<Range<usize>> = protected
        .iter()
        .map(|r| r.start.saturating_sub(base)..r.end.saturating_sub(base))
        .collect();

    let runs = emphasis_runs(text, &chars, &local, ctx);
    let mut blocked = local.clone();
    for run in &runs {
        out.hidden.push(base + run.open.start..base + run.open.end);
        out.hidden.push(base + run.close.start..base + run.close.end);
        out.styles.push(StyledRange {
            range: base + run.open.end..base + run.close.start,
            class: SpanClass::Style(run.style),
        });
        blocked.push(run.open.clone());
        blocked.push(run.close.clone());
    }

    if ctx.ruby {
        for m in find_ruby(text, &blocked) {
            out.hidden
                .extend(m.hidden().into_iter().map(|r| base + r.start..base + r.end));
            out.ruby.push(RubyRange {
                range: base + m.base.start..base + m.base.end,
                text: m.reading_text.clone(),
            });
            blocked.push(m.span);
        }
    }

    if let Some(max) = ctx.tcy_max {
        for r in find_tcy(&chars, max, &blocked) {
            out.tcy.push(base + r.start..base + r.end);
        }
    }

    out.clamp_to(line);
    tracing::trace!(
        target: "tategaki::decorate",
        base,
        hidden = out.hidden.len(),
        styles = out.styles.len(),
        widgets = out.widgets.len(),
        "decorated line"
    );
    out
}

fn emphasis_runs(
    text: &str,
    chars: &[char],
    protected: &[Range<usize>],
    ctx: &DecorationContext<'_>,
) -> Vec<EmphasisRun> {
    const FALLBACK: [InlineStyle; 4] = [
        InlineStyle::Bold,
        InlineStyle::Italic,
        InlineStyle::Strike,
        InlineStyle::Highlight,
    ];
    if !chars.iter().any(|c| matches!(c, '*' | '_' | '~' | '=')) {
        return Vec::new();
    }
    let Some(tree) = ctx.tree else {
        return scan_emphasis(chars, protected, &FALLBACK);
    };
    let nodes = match tree.inline_nodes(text) {
        Ok(nodes) => nodes,
        Err(err) => {
            tracing::warn!(
                target: "tategaki::decorate",
                error = %err,
                "syntax tree unavailable, using fallback scanner"
            );
            return scan_emphasis(chars, protected, &FALLBACK);
        }
    };

    let mut runs = Vec::new();
    let mut saw_highlight = false;
    for node in nodes {
        let (style, markers): (InlineStyle, &[&str]) = match node.kind {
            SyntaxNodeKind::Strong => (InlineStyle::Bold, &["**", "__"][..]),
            SyntaxNodeKind::Emphasis => (InlineStyle::Italic, &["*", "_"][..]),
            SyntaxNodeKind::Strikethrough => (InlineStyle::Strike, &["~~", "~"][..]),
            SyntaxNodeKind::Highlight => {
                saw_highlight = true;
                (InlineStyle::Highlight, &["=="][..])
            }
            _ => continue,
        };
        if let Some(run) = exact_marker_run(chars, &node.range, style, markers) {
            let overlaps = protected.iter().any(|p| {
                (run.open.start < p.end && p.start < run.open.end)
                    || (run.close.start < p.end && p.start < run.close.end)
            });
            if !overlaps {
                runs.push(run);
            }
        }
    }
    if !saw_highlight {
        runs.extend(scan_emphasis(chars, protected, &[InlineStyle::Highlight]));
    }
    runs.sort_by_key(|r| (r.open.start, r.close.end));
    runs
}

/// A run for `range` when its text starts and ends with the same known marker.
fn exact_marker_run(
    chars: &[char],
    range: &Range<usize>,
    style: InlineStyle,
    markers: &[&str],
) -> Option<EmphasisRun> {
    let span = chars.get(range.clone())?;
    markers.iter().find_map(|marker| {
        let m: Vec<char> = marker.chars().collect();
        let n = m.len();
        (span.len() > 2 * n && span.starts_with(&m) && span.ends_with(&m)).then(|| EmphasisRun {
            style,
            open: range.start..range.start + n,
            close: range.end - n..range.end,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line_model::{LineModel, recompute_line_block_kinds};
    use std::collections::BTreeSet;

    fn info_for(line: &str) -> LineInfo {
        recompute_line_block_kinds(&[line], &BTreeSet::new()).lines[0].clone()
    }

    fn visible(text: &str, d: &LineDecorations, base: usize) -> String {
        let hidden = d.merged_hidden();
        text.chars()
            .enumerate()
            .filter(|(i, _)| !hidden.iter().any(|r| r.contains(&(base + i))))
            .map(|(_, c)| c)
            .collect()
    }

    #[test]
    fn test_heading_prefix_and_bold() {
        let text = "## **太字** です";
        let d = decorate_line(text, 10, &info_for(text), &DecorationContext::default());
        assert_eq!(visible(text, &d, 10), "太字 です");
        assert!(d.styles.contains(&StyledRange {
            range: 15..17,
            class: SpanClass::Style(InlineStyle::Bold)
        }));
    }

    #[test]
    fn test_link_carries_href() {
        let text = "see [site](https://example.com) now";
        let d = decorate_line(text, 0, &info_for(text), &DecorationContext::default());
        assert_eq!(visible(text, &d, 0), "see site now");
        assert_eq!(
            d.links,
            vec![LinkRange {
                range: 5..9,
                href: "https://example.com".into()
            }]
        );
    }

    #[test]
    fn test_ruby_hidden_ranges() {
        let text = "｜漢字《かんじ》";
        let ctx = DecorationContext {
            ruby: true,
            ..Default::default()
        };
        let d = decorate_line(text, 0, &info_for(text), &ctx);
        assert_eq!(d.hidden, vec![0..1, 3..4, 4..7, 7..8]);
        assert_eq!(
            d.ruby,
            vec![RubyRange {
                range: 1..3,
                text: "かんじ".into()
            }]
        );
        assert_eq!(visible(text, &d, 0), "漢字");
    }

    #[test]
    fn test_ruby_disabled_keeps_source() {
        let text = "｜漢字《かんじ》";
        let d = decorate_line(text, 0, &info_for(text), &DecorationContext::default());
        assert!(d.hidden.is_empty());
        assert!(d.ruby.is_empty());
    }

    #[test]
    fn test_code_span_blocks_emphasis_and_ruby() {
        let text = "`**x** ｜a《b》`";
        let ctx = DecorationContext {
            ruby: true,
            ..Default::default()
        };
        let d = decorate_line(text, 0, &info_for(text), &ctx);
        assert_eq!(visible(text, &d, 0), "**x** ｜a《b》");
        assert!(d.ruby.is_empty());
    }

    #[test]
    fn test_inline_math_widget() {
        let text = "式 $x^2$ です";
        let d = decorate_line(text, 0, &info_for(text), &DecorationContext::default());
        assert_eq!(visible(text, &d, 0), "式  です");
        assert_eq!(
            d.widgets,
            vec![InlineWidget {
                at: 2,
                range: 2..7,
                kind: InlineWidgetKind::MathInline {
                    source: "x^2".into()
                }
            }]
        );
    }

    #[test]
    fn test_footnote_ref_widget_uses_number() {
        let model = LineModel::build("本文[^n]\n\n[^n]: 注", &BTreeSet::new());
        let text = model.text(0).unwrap();
        let ctx = DecorationContext {
            refs: Some(model.refs()),
            ..Default::default()
        };
        let d = decorate_line(text, 0, model.info(0).unwrap(), &ctx);
        assert_eq!(visible(text, &d, 0), "本文");
        assert!(matches!(
            &d.widgets[0].kind,
            InlineWidgetKind::FootnoteRef { number: 1, .. }
        ));
    }

    #[test]
    fn test_tcy_only_when_enabled() {
        let text = "第12話!?";
        let d = decorate_line(text, 0, &info_for(text), &DecorationContext::default());
        assert!(d.tcy.is_empty());
        let ctx = DecorationContext {
            tcy_max: Some(2),
            ..Default::default()
        };
        let d = decorate_line(text, 0, &info_for(text), &ctx);
        assert_eq!(d.tcy, vec![1..3, 4..6]);
    }

    #[test]
    fn test_tree_provider_exact_markers() {
        let text = "a **b** ==c==";
        let ctx = DecorationContext {
            tree: Some(&MarkdownTreeProvider),
            ..Default::default()
        };
        let d = decorate_line(text, 0, &info_for(text), &ctx);
        assert_eq!(visible(text, &d, 0), "a b c");
    }

    struct Failing;

    impl SyntaxTreeProvider for Failing {
        fn inline_nodes(&self, _line: &str) -> Result<Vec<SyntaxNode>, crate::CoreError> {
            Err(crate::CoreError::Highlight("tree gone".into()))
        }
    }

    #[test]
    fn test_failing_tree_falls_back() {
        let text = "*i*";
        let ctx = DecorationContext {
            tree: Some(&Failing),
            ..Default::default()
        };
        let d = decorate_line(text, 0, &info_for(text), &ctx);
        assert_eq!(visible(text, &d, 0), "i");
    }

    #[test]
    fn test_callout_title_prefix() {
        let lines = ["> [!note] タイトル", "> 本文"];
        let c = recompute_line_block_kinds(&lines, &BTreeSet::new());
        assert_eq!(block_prefix_len(lines[0], &c.lines[0]), 10);
        assert_eq!(block_prefix_len(lines[1], &c.lines[1]), 2);
    }

    #[test]
    fn test_escape_hides_backslash() {
        let text = r"\*not\*";
        let d = decorate_line(text, 0, &info_for(text), &DecorationContext::default());
        assert_eq!(visible(text, &d, 0), "*not*");
        assert!(d.styles.is_empty());
    }

    #[test]
    fn test_verbatim_lines_undecorated() {
        let c = recompute_line_block_kinds(&["```", "**x**", "```"], &BTreeSet::new());
        let d = decorate_line("**x**", 4, &c.lines[1], &DecorationContext::default());
        assert_eq!(d, LineDecorations::default());
    }

    #[test]
    fn test_merge_ranges() {
        assert_eq!(merge_ranges(vec![5..7, 0..2, 1..3, 3..4, 9..9]), vec![0..4, 5..7]);
    }
}
