//! Full and incremental rendering over a virtualized line list.
//!
//! The pipeline owns the line model and the render tree. A full render
//! rebuilds both from the buffer. An edit that stays on single lines patches
//! those lines in place and shifts every later range; anything else re-splits
//! the affected line span and splices new elements over the old ones, leaving
//! every other element untouched.
//!
//! Lines outside the viewport window are kept as light placeholders and
//! promoted when they scroll in or when caret logic needs their geometry.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use tategaki_editor_core::line_model::BlockSpan;
use tategaki_editor_core::segment::{LineShape, line_shape};
use tategaki_editor_core::{
    BLOCK_SYNTAX_ZONE, ChangeRecord, DecorationContext, Highlighter, LatexRenderer, LineCache,
    LineInfo, LineModel, LineProjection, MarkdownTreeProvider, MathRenderer, OutlineEntry,
    SegmentContext, SegmentKey, SourceEditor, SyntaxTreeProvider, SyntectHighlighter,
    build_line_projection,
};

use super::line::{render_block_widget, render_hidden, render_line, render_line_light, with_pending};
use super::tree::{LineElement, LineState, RenderTree};
use crate::config::ViewConfig;
use crate::selection::{LineView, ProjectionSource};

/// The subset of [`ViewConfig`] that changes rendered output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderSettings {
    pub ruby: bool,
    pub tcy_max: Option<usize>,
    pub hide_frontmatter: bool,
    pub block_widgets: bool,
    pub source_mode: bool,
    pub use_syntax_tree: bool,
}

impl RenderSettings {
    pub fn from_config(config: &ViewConfig) -> Self {
        Self {
            ruby: config.ruby_enabled,
            tcy_max: config.tcy_max(),
            hide_frontmatter: config.hide_frontmatter,
            block_widgets: config.block_widgets,
            source_mode: config.source_mode,
            use_syntax_tree: config.use_syntax_tree,
        }
    }

    fn widgets(&self) -> bool {
        self.block_widgets && !self.source_mode
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PatchPath {
    /// Single-line edits patched in place.
    #[default]
    Fast,
    /// Line span re-split and spliced, or a full render.
    Slow,
}

/// What an incremental update did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchReport {
    pub path: PatchPath,
    /// Lines whose element was rebuilt, by new index.
    pub rebuilt: Vec<usize>,
    /// Classification was left stale and needs a deferred
    /// [`RenderPipeline::reclassify_now`].
    pub reclassify_pending: bool,
}

enum LinePlan {
    Hidden,
    WidgetHead(BlockSpan),
    WidgetCovered(BlockSpan),
    Content,
}

struct Pending {
    at: usize,
    text: String,
}

pub struct RenderPipeline {
    model: LineModel,
    collapsed: BTreeSet<usize>,
    tree: RenderTree,
    cache: LineCache<SegmentKey, LineProjection>,
    /// Bumped whenever footnote numbers or link references may have changed.
    refs_generation: u64,
    highlighter: Box<dyn Highlighter>,
    math: Box<dyn MathRenderer>,
    syntax_tree: Box<dyn SyntaxTreeProvider>,
    settings: RenderSettings,
    /// Materialized line window; None until the host reports a viewport.
    window: Option<Range<usize>>,
    overscan: usize,
    cache_margin: usize,
    caret_line: usize,
    pinned: BTreeSet<usize>,
    editable: Range<usize>,
    pending: Option<Pending>,
}

impl RenderPipeline {
    pub fn new(config: &ViewConfig) -> Self {
        Self {
            model: LineModel::default(),
            collapsed: BTreeSet::new(),
            tree: RenderTree::default(),
            cache: LineCache::new(config.line_cache_capacity),
            refs_generation: 0,
            highlighter: Box::new(SyntectHighlighter::default()),
            math: Box::new(LatexRenderer),
            syntax_tree: Box::new(MarkdownTreeProvider),
            settings: RenderSettings::from_config(config),
            window: None,
            overscan: config.overscan_lines,
            cache_margin: config.cache_margin_lines,
            caret_line: 0,
            pinned: BTreeSet::new(),
            editable: 0..0,
            pending: None,
        }
    }

    pub fn with_highlighter(mut self, highlighter: Box<dyn Highlighter>) -> Self {
        self.highlighter = highlighter;
        self
    }

    pub fn with_math_renderer(mut self, math: Box<dyn MathRenderer>) -> Self {
        self.math = math;
        self
    }

    pub fn with_syntax_tree(mut self, provider: Box<dyn SyntaxTreeProvider>) -> Self {
        self.syntax_tree = provider;
        self
    }

    pub fn model(&self) -> &LineModel {
        &self.model
    }

    pub fn tree(&self) -> &RenderTree {
        &self.tree
    }

    pub fn settings(&self) -> RenderSettings {
        self.settings
    }

    pub fn collapsed(&self) -> &BTreeSet<usize> {
        &self.collapsed
    }

    pub fn window(&self) -> Option<Range<usize>> {
        self.window.clone()
    }

    pub fn caret_line(&self) -> usize {
        self.caret_line
    }

    pub fn outline(&self) -> Vec<OutlineEntry> {
        self.model.outline()
    }

    pub fn to_html(&self) -> String {
        self.tree.to_html()
    }

    /// Rebuild the line model and every element from `doc`.
    pub fn render_full(&mut self, doc: &str) {
        self.model = LineModel::build(doc, &self.collapsed);
        self.collapsed = self.model.collapsed().clone();
        self.refs_generation += 1;
        self.cache.clear();
        self.pinned.clear();
        self.caret_line = self.caret_line.min(self.model.line_count().saturating_sub(1));
        let count = self.model.line_count();
        let elements = (0..count).filter_map(|line| self.render_element(line)).collect();
        self.tree = RenderTree::new(elements);
        tracing::debug!(target: "tategaki::pipeline", lines = count, "full render");
    }

    /// Bring the tree in step with an editor update.
    pub fn apply_changes<E: SourceEditor + ?Sized>(
        &mut self,
        editor: &E,
        changes: &[ChangeRecord],
    ) -> PatchReport {
        if changes.is_empty() {
            return PatchReport {
                reclassify_pending: self.model.is_stale(),
                ..Default::default()
            };
        }
        let delta: isize = changes.iter().map(ChangeRecord::len_delta).sum();
        let expected = self.model.doc_len() as isize + delta;
        if self.model.line_count() == 0 || expected != editor.len_chars() as isize {
            tracing::warn!(
                target: "tategaki::pipeline",
                expected,
                actual = editor.len_chars(),
                "line model out of step with buffer, full render"
            );
            self.render_full(&editor.doc());
            return PatchReport {
                path: PatchPath::Slow,
                rebuilt: (0..self.tree.len()).collect(),
                reclassify_pending: false,
            };
        }
        let single_line = changes.iter().all(|c| {
            !c.inserts_newline() && self.model.line_at_offset(c.from) == self.model.line_at_offset(c.to)
        });
        if single_line {
            self.apply_fast(editor, changes)
        } else {
            self.apply_slow(editor, changes)
        }
    }

    fn apply_fast<E: SourceEditor + ?Sized>(
        &mut self,
        editor: &E,
        changes: &[ChangeRecord],
    ) -> PatchReport {
        // line -> (length delta, first edited column)
        let mut touched: BTreeMap<usize, (isize, usize)> = BTreeMap::new();
        for change in changes {
            let line = self.model.line_at_offset(change.from);
            let column = change.from - self.model.range(line).map_or(0, |r| r.from);
            let entry = touched.entry(line).or_insert((0, column));
            entry.0 += change.len_delta();
            entry.1 = entry.1.min(column);
        }

        let mut reclassify = false;
        for (&line, &(delta, column)) in &touched {
            let (Some(range), Some(info)) = (self.model.range(line), self.model.info(line)) else {
                continue;
            };
            let new_to = (range.to as isize + delta).max(range.from as isize) as usize;
            let text = editor
                .slice(range.from, new_to)
                .map(|s| s.to_string())
                .unwrap_or_default();
            let old = self.model.text(line).unwrap_or_default();
            reclassify |= affects_classification(info, column, old, &text);
            self.model.patch_line(line, text);
        }

        self.tree.sync_ranges(self.model.ranges());
        let mut rebuilt: Vec<usize> = touched.keys().copied().collect();
        if reclassify {
            rebuilt.extend(self.reclassify_now());
        }
        for &line in touched.keys() {
            self.rerender(line);
            // the head widget presents the whole block source
            if let Some(span) = self.widget_span(line).filter(|s| s.start != line) {
                self.rerender(span.start);
                rebuilt.push(span.start);
            }
        }
        rebuilt.sort_unstable();
        rebuilt.dedup();
        tracing::trace!(
            target: "tategaki::pipeline",
            lines = ?rebuilt,
            reclassify,
            "fast path patch"
        );
        PatchReport {
            path: PatchPath::Fast,
            rebuilt,
            reclassify_pending: self.model.is_stale(),
        }
    }

    fn apply_slow<E: SourceEditor + ?Sized>(
        &mut self,
        editor: &E,
        changes: &[ChangeRecord],
    ) -> PatchReport {
        let (Some(first), Some(last)) = (changes.first(), changes.last()) else {
            return PatchReport::default();
        };
        let old_start = self.model.line_at_offset(first.from);
        let old_end = self.model.line_at_offset(last.to);
        let (Some(start_range), Some(end_range)) =
            (self.model.range(old_start), self.model.range(old_end))
        else {
            self.render_full(&editor.doc());
            return PatchReport {
                path: PatchPath::Slow,
                rebuilt: (0..self.tree.len()).collect(),
                reclassify_pending: false,
            };
        };
        let old_infos = self.model.infos().to_vec();
        let old_refs = self.model.refs().clone();

        let delta: isize = changes.iter().map(ChangeRecord::len_delta).sum();
        let new_to = (end_range.to as isize + delta).max(start_range.from as isize) as usize;
        let span_text = editor
            .slice(start_range.from, new_to)
            .map(|s| s.to_string())
            .unwrap_or_default();
        let new_lines: Vec<String> = span_text.split('\n').map(str::to_string).collect();
        let new_span = new_lines.len();
        let line_delta = new_span as isize - (old_end + 1 - old_start) as isize;

        self.collapsed = shift_folds(&self.collapsed, old_start, old_end, line_delta);
        self.model
            .splice_lines(old_start, old_end + 1, new_lines, &self.collapsed);
        self.collapsed = self.model.collapsed().clone();
        let refs_changed = *self.model.refs() != old_refs;
        if refs_changed {
            self.refs_generation += 1;
        }
        self.caret_line = self.caret_line.min(self.model.line_count().saturating_sub(1));

        let new_end = old_start + new_span;
        let elements: Vec<LineElement> = (old_start..new_end)
            .filter_map(|line| self.render_element(line))
            .collect();
        self.tree.splice(old_start..old_end + 1, elements);
        self.tree.sync_ranges(self.model.ranges());

        let mut rebuilt: Vec<usize> = (old_start..new_end).collect();
        let count = self.model.line_count();
        for line in (0..old_start).chain(new_end..count) {
            let old_line = if line < old_start {
                line
            } else {
                (line as isize - line_delta) as usize
            };
            let info_changed = old_infos.get(old_line) != self.model.info(line);
            let refs_hit = refs_changed && self.is_full(line);
            if info_changed || refs_hit {
                self.rerender(line);
                rebuilt.push(line);
            }
        }
        tracing::debug!(
            target: "tategaki::pipeline",
            old_start,
            old_end,
            new_span,
            rebuilt = rebuilt.len(),
            "slow path splice"
        );
        PatchReport {
            path: PatchPath::Slow,
            rebuilt,
            reclassify_pending: false,
        }
    }

    /// Rerun the classifier and re-render every line whose classification
    /// changed. Returns those lines.
    pub fn reclassify_now(&mut self) -> Vec<usize> {
        let old_infos = self.model.infos().to_vec();
        let old_refs = self.model.refs().clone();
        self.model.reclassify(&self.collapsed);
        self.collapsed = self.model.collapsed().clone();
        let refs_changed = *self.model.refs() != old_refs;
        if refs_changed {
            self.refs_generation += 1;
        }
        let mut changed = Vec::new();
        for line in 0..self.model.line_count() {
            let info_changed = old_infos.get(line) != self.model.info(line);
            if info_changed || (refs_changed && self.is_full(line)) {
                self.rerender(line);
                changed.push(line);
            }
        }
        tracing::debug!(target: "tategaki::pipeline", changed = changed.len(), "reclassified");
        changed
    }

    /// Track the selection head. Widget blocks the head leaves or enters are
    /// re-rendered; returns the lines that changed.
    pub fn set_selection_head(&mut self, head: usize) -> Vec<usize> {
        let line = self.model.line_at_offset(head);
        let old = std::mem::replace(&mut self.caret_line, line);
        if old == line {
            return Vec::new();
        }
        let mut lines = BTreeSet::new();
        let (old_block, new_block) = (self.widget_span(old), self.widget_span(line));
        if old_block != new_block {
            for span in [old_block, new_block].into_iter().flatten() {
                lines.extend(span.start..=span.end);
            }
        }
        for l in [old, line] {
            let outside = self.window.as_ref().is_some_and(|w| !w.contains(&l));
            if outside {
                lines.insert(l);
            }
        }
        for &l in &lines {
            self.rerender(l);
        }
        lines.into_iter().collect()
    }

    /// Report the lines currently on screen. During a jump no overscan is
    /// materialized. Returns the lines promoted or demoted.
    pub fn set_viewport(&mut self, visible: Range<usize>, jump: bool) -> Vec<usize> {
        let count = self.model.line_count();
        let overscan = if jump { 0 } else { self.overscan };
        let start = visible.start.saturating_sub(overscan).min(count);
        let end = visible.end.saturating_add(overscan).min(count).max(start);
        let old = self.window.replace(start..end);
        let unpinned = std::mem::take(&mut self.pinned);
        let scan = match old {
            Some(o) => o.start.min(start)..o.end.max(end).min(count),
            None => 0..count,
        };
        let mut changed = Vec::new();
        for line in scan.chain(unpinned) {
            let Some(state) = self.tree.get(line).map(|e| e.state) else {
                continue;
            };
            if state == LineState::Hidden {
                continue;
            }
            if self.is_materialized(line) != (state == LineState::Full) {
                self.rerender(line);
                changed.push(line);
            }
        }
        let margin = self.cache_margin;
        self.cache
            .prune_outside(start.saturating_sub(margin)..end.saturating_add(margin));
        tracing::trace!(
            target: "tategaki::pipeline",
            start,
            end,
            jump,
            changed = changed.len(),
            "viewport"
        );
        changed
    }

    /// Promote a placeholder line to full content. Returns whether it changed.
    pub fn ensure_line_rendered(&mut self, line: usize) -> bool {
        if self.tree.get(line).is_none_or(|e| e.state != LineState::Light) {
            return false;
        }
        self.pinned.insert(line);
        self.rerender(line);
        true
    }

    /// Show uncommitted text at `at`; empty text removes the preview.
    /// Returns the lines re-rendered.
    pub fn set_pending(&mut self, at: usize, text: &str) -> Vec<usize> {
        let old = self.pending.take().map(|p| self.model.line_at_offset(p.at));
        if !text.is_empty() {
            self.pending = Some(Pending {
                at,
                text: text.to_string(),
            });
        }
        let new = self.pending.as_ref().map(|p| self.model.line_at_offset(p.at));
        let mut lines: Vec<usize> = old.into_iter().chain(new).collect();
        lines.sort_unstable();
        lines.dedup();
        for &line in &lines {
            self.rerender(line);
        }
        lines
    }

    pub fn clear_pending(&mut self) -> Vec<usize> {
        self.set_pending(0, "")
    }

    pub fn pending(&self) -> Option<(usize, &str)> {
        self.pending.as_ref().map(|p| (p.at, p.text.as_str()))
    }

    /// Mark `lines` editable and every other line not. Returns the lines whose
    /// flag flipped.
    pub fn set_editable(&mut self, lines: Range<usize>) -> Vec<usize> {
        let old = std::mem::replace(&mut self.editable, lines.clone());
        let mut changed = Vec::new();
        for line in old.start.min(lines.start)..old.end.max(lines.end) {
            if let Some(el) = self.tree.get_mut(line) {
                let want = lines.contains(&line) && el.state == LineState::Full;
                if el.editable != want {
                    el.editable = want;
                    changed.push(line);
                }
            }
        }
        changed
    }

    pub fn editable(&self) -> Range<usize> {
        self.editable.clone()
    }

    /// Collapse or expand the heading on `line`. Returns the lines re-rendered.
    pub fn toggle_fold(&mut self, line: usize) -> Vec<usize> {
        if self.model.info(line).and_then(|i| i.heading_level).is_none() {
            return Vec::new();
        }
        if !self.collapsed.remove(&line) {
            self.collapsed.insert(line);
        }
        let mut lines = self.reclassify_now();
        if !lines.contains(&line) {
            self.rerender(line);
            lines.push(line);
            lines.sort_unstable();
        }
        tracing::debug!(
            target: "tategaki::pipeline",
            line,
            collapsed = self.collapsed.contains(&line),
            "fold toggled"
        );
        lines
    }

    /// Apply new settings; re-renders everything when they differ.
    pub fn set_settings(&mut self, settings: RenderSettings) -> bool {
        if self.settings == settings {
            return false;
        }
        self.settings = settings;
        self.cache.clear();
        self.refs_generation += 1;
        for line in 0..self.model.line_count() {
            self.rerender(line);
        }
        true
    }

    pub fn is_materialized(&self, line: usize) -> bool {
        self.window.as_ref().is_none_or(|w| w.contains(&line))
            || line == self.caret_line
            || self.pinned.contains(&line)
    }

    fn is_full(&self, line: usize) -> bool {
        self.tree.get(line).is_some_and(|e| e.state == LineState::Full)
    }

    fn widget_span(&self, line: usize) -> Option<BlockSpan> {
        if !self.settings.widgets() {
            return None;
        }
        let info = self.model.info(line)?;
        info.base_kind.is_widget_block().then_some(info.block).flatten()
    }

    fn plan(&self, line: usize, info: &LineInfo) -> LinePlan {
        if info.is_hidden() {
            return LinePlan::Hidden;
        }
        let widgets = self.settings.widgets()
            && !info.block.is_some_and(|b| b.contains(self.caret_line));
        let ctx = SegmentContext {
            source_mode: self.settings.source_mode,
            block_widget: widgets,
            hide_frontmatter: self.settings.hide_frontmatter,
            ..Default::default()
        };
        match line_shape(info, &ctx) {
            LineShape::Hidden if widgets && info.base_kind.is_widget_block() => {
                let span = info.block.unwrap_or(BlockSpan {
                    start: line,
                    end: line,
                });
                if span.start == line {
                    LinePlan::WidgetHead(span)
                } else {
                    LinePlan::WidgetCovered(span)
                }
            }
            LineShape::Hidden => LinePlan::Hidden,
            _ => LinePlan::Content,
        }
    }

    fn projection(&mut self, line: usize) -> Option<LineProjection> {
        let range = self.model.range(line)?;
        let info = self.model.info(line)?;
        let text = self.model.text(line)?;
        let settings = self.settings;
        let ctx = SegmentContext {
            decoration: DecorationContext {
                refs: Some(self.model.refs()),
                tree: settings.use_syntax_tree.then_some(self.syntax_tree.as_ref()),
                ruby: settings.ruby,
                tcy_max: settings.tcy_max,
            },
            highlighter: Some(self.highlighter.as_ref()),
            source_mode: settings.source_mode,
            block_widget: false,
            hide_frontmatter: settings.hide_frontmatter,
        };
        let mut key = SegmentKey::new(range.from, range.to, text, info);
        key.source_mode = settings.source_mode;
        key.ruby = settings.ruby;
        key.tcy_max = settings.tcy_max;
        key.refs_generation = self.refs_generation;
        let projection = self
            .cache
            .get_or_insert_with(line, key, || build_line_projection(text, range.from, info, &ctx));
        Some(projection.clone())
    }

    fn block_source(&self, span: BlockSpan) -> String {
        (span.start..=span.end)
            .filter_map(|l| self.model.text(l))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn render_element(&mut self, line: usize) -> Option<LineElement> {
        let range = self.model.range(line)?;
        let info = self.model.info(line)?.clone();
        let mut element = match self.plan(line, &info) {
            LinePlan::Hidden => render_hidden(line, range, &info, false),
            LinePlan::WidgetCovered(_) => render_hidden(line, range, &info, true),
            _ if !self.is_materialized(line) => render_line_light(line, range, &info),
            LinePlan::WidgetHead(span) => {
                let block = self.block_source(span);
                render_block_widget(
                    line,
                    range,
                    &info,
                    span.start..span.end + 1,
                    &block,
                    self.math.as_ref(),
                )
            }
            LinePlan::Content => {
                let projection = self.projection(line)?;
                let text = self.model.text(line)?;
                let folded = self.collapsed.contains(&line);
                let element =
                    render_line(line, range, text, &info, &projection, folded, self.math.as_ref());
                match &self.pending {
                    Some(p) if range.contains(p.at) => with_pending(&element, p.at, &p.text),
                    _ => element,
                }
            }
        };
        element.editable = self.editable.contains(&line) && element.state == LineState::Full;
        Some(element)
    }

    fn rerender(&mut self, line: usize) {
        if let Some(element) = self.render_element(line) {
            self.tree.replace(element);
        }
    }
}

/// Whether a single-line edit may change block classification or the
/// reference tables, so that reclassification cannot wait.
fn affects_classification(info: &LineInfo, column: usize, old: &str, new: &str) -> bool {
    column < BLOCK_SYNTAX_ZONE
        || info.base_kind.is_widget_block()
        || [old, new]
            .iter()
            .any(|t| t.contains("[^") || t.contains("]:") || t.contains('|'))
}

/// Move collapsed headings past an edited line span. Headings inside the span
/// other than its first line are dropped.
fn shift_folds(
    collapsed: &BTreeSet<usize>,
    start: usize,
    end: usize,
    delta: isize,
) -> BTreeSet<usize> {
    collapsed
        .iter()
        .filter_map(|&l| {
            if l <= start {
                Some(l)
            } else if l > end {
                Some((l as isize + delta).max(0) as usize)
            } else {
                None
            }
        })
        .collect()
}

impl ProjectionSource for RenderPipeline {
    fn line_model(&self) -> &LineModel {
        &self.model
    }

    fn line_view(&mut self, line: usize) -> LineView {
        let Some(info) = self.model.info(line).cloned() else {
            return LineView::Hidden;
        };
        match self.plan(line, &info) {
            LinePlan::Hidden => LineView::Hidden,
            LinePlan::WidgetHead(span) | LinePlan::WidgetCovered(span) => {
                let from = self.model.range(span.start).map_or(0, |r| r.from);
                let to = self.model.range(span.end).map_or(from, |r| r.to);
                LineView::Widget { from, to }
            }
            LinePlan::Content => self
                .projection(line)
                .map_or(LineView::Hidden, LineView::Content),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::RenderNode;
    use tategaki_editor_core::PlainEditor;

    fn pipeline(doc: &str) -> RenderPipeline {
        let config = ViewConfig {
            overscan_lines: 2,
            ..Default::default()
        };
        let mut p = RenderPipeline::new(&config);
        p.render_full(doc);
        p
    }

    fn texts(p: &RenderPipeline) -> Vec<String> {
        p.tree().lines().iter().map(LineElement::visible_text).collect()
    }

    #[test]
    fn test_full_render_attrs() {
        let p = pipeline("# 見出し\n本文");
        let lines = p.tree().lines();
        assert_eq!(lines.len(), 2);
        assert_eq!((lines[1].line, lines[1].from, lines[1].to), (1, 6, 8));
        assert_eq!(texts(&p), vec!["見出し", "本文"]);
    }

    #[test]
    fn test_fast_path_patches_one_line() {
        let mut editor = PlainEditor::from_text("abc\ndef\nghi");
        let mut p = pipeline(&editor.doc());
        let untouched = p.tree().get(0).cloned();
        let update = editor.replace_range(5, 5, "X").unwrap();
        let report = p.apply_changes(&editor, &update.changes);
        assert_eq!(report.path, PatchPath::Fast);
        assert_eq!(report.rebuilt, vec![1]);
        assert_eq!(texts(&p), vec!["abc", "dXef", "ghi"]);
        let last = p.tree().get(2).unwrap();
        assert_eq!((last.from, last.to), (9, 12));
        assert_eq!(p.tree().get(0).cloned(), untouched);
    }

    #[test]
    fn test_slow_path_splices_span() {
        let mut editor = PlainEditor::from_text("one\ntwo\nthree");
        let mut p = pipeline(&editor.doc());
        let first = p.tree().get(0).cloned();
        let update = editor.replace_range(5, 5, "\nnew\n").unwrap();
        let report = p.apply_changes(&editor, &update.changes);
        assert_eq!(report.path, PatchPath::Slow);
        assert_eq!(texts(&p), vec!["one", "t", "new", "wo", "three"]);
        assert_eq!(p.tree().get(0).cloned(), first);
        let last = p.tree().get(4).unwrap();
        assert_eq!((last.line, last.from, last.to), (4, 13, 18));
    }

    #[test]
    fn test_deleting_newline_takes_slow_path() {
        let mut editor = PlainEditor::from_text("ab\ncd");
        let mut p = pipeline(&editor.doc());
        let update = editor.replace_range(2, 3, "").unwrap();
        let report = p.apply_changes(&editor, &update.changes);
        assert_eq!(report.path, PatchPath::Slow);
        assert_eq!(texts(&p), vec!["abcd"]);
    }

    #[test]
    fn test_heading_prefix_edit_reclassifies_immediately() {
        let mut editor = PlainEditor::from_text("見出し\n本文");
        let mut p = pipeline(&editor.doc());
        let update = editor.replace_range(0, 0, "# ").unwrap();
        let report = p.apply_changes(&editor, &update.changes);
        assert!(!report.reclassify_pending);
        assert_eq!(p.tree().get(0).unwrap().kind, tategaki_editor_core::BlockKind::Heading);
        assert_eq!(p.tree().get(0).unwrap().visible_text(), "見出し");
    }

    #[test]
    fn test_mid_line_edit_defers_reclassify() {
        let mut editor = PlainEditor::from_text("a long plain line");
        let mut p = pipeline(&editor.doc());
        let update = editor.replace_range(10, 10, "x").unwrap();
        let report = p.apply_changes(&editor, &update.changes);
        assert!(report.reclassify_pending);
        assert!(p.reclassify_now().is_empty());
        assert!(!p.model().is_stale());
    }

    #[test]
    fn test_math_block_widget_reveals_under_caret() {
        let mut p = pipeline("前\n$$\nx^2\n$$\n後");
        let head = p.tree().get(1).unwrap();
        assert!(matches!(head.children.as_slice(), [RenderNode::BlockWidget { lines, .. }] if *lines == (1..4)));
        assert_eq!(p.tree().get(2).unwrap().state, LineState::Hidden);

        let changed = p.set_selection_head(6);
        assert_eq!(changed, vec![1, 2, 3]);
        assert_eq!(p.tree().get(2).unwrap().visible_text(), "x^2");

        p.set_selection_head(0);
        assert_eq!(p.tree().get(2).unwrap().state, LineState::Hidden);
    }

    #[test]
    fn test_viewport_virtualization() {
        let doc: Vec<String> = (0..40).map(|i| format!("line {i}")).collect();
        let mut p = pipeline(&doc.join("\n"));
        p.set_viewport(0..5, false);
        assert_eq!(p.tree().get(6).unwrap().state, LineState::Full);
        assert_eq!(p.tree().get(20).unwrap().state, LineState::Light);

        let changed = p.set_viewport(18..22, true);
        assert!(changed.contains(&20));
        assert_eq!(p.tree().get(20).unwrap().state, LineState::Full);
        assert_eq!(p.tree().get(3).unwrap().state, LineState::Light);
        // caret line stays materialized
        assert_eq!(p.tree().get(0).unwrap().state, LineState::Full);

        assert!(p.ensure_line_rendered(30));
        assert_eq!(p.tree().get(30).unwrap().visible_text(), "line 30");
        assert!(!p.ensure_line_rendered(30));
    }

    #[test]
    fn test_pending_preview_rolls_back() {
        let mut p = pipeline("かな\n次");
        assert_eq!(p.set_pending(1, "漢"), vec![0]);
        assert!(p.to_html().contains(r#"<span class="tategaki-pending">漢</span>"#));
        assert_eq!(p.tree().get(0).unwrap().visible_text(), "かな");
        p.clear_pending();
        assert!(!p.to_html().contains("tategaki-pending"));
    }

    #[test]
    fn test_fold_hides_section() {
        let mut p = pipeline("# A\n1\n2\n# B\n3");
        let lines = p.toggle_fold(0);
        assert_eq!(lines, vec![0, 1, 2]);
        let states: Vec<LineState> = p.tree().lines().iter().map(|e| e.state).collect();
        assert_eq!(
            states,
            vec![
                LineState::Full,
                LineState::Hidden,
                LineState::Hidden,
                LineState::Full,
                LineState::Full
            ]
        );
        assert!(p.tree().get(0).unwrap().classes.iter().any(|c| c == "tategaki-fold-collapsed"));
        p.toggle_fold(0);
        assert_eq!(p.tree().get(1).unwrap().state, LineState::Full);
    }

    #[test]
    fn test_fold_shifts_with_inserted_lines() {
        let mut editor = PlainEditor::from_text("x\n# A\nbody");
        let mut p = pipeline(&editor.doc());
        p.toggle_fold(1);
        let update = editor.replace_range(0, 0, "new\n").unwrap();
        p.apply_changes(&editor, &update.changes);
        assert!(p.collapsed().contains(&2));
        assert_eq!(p.tree().get(3).unwrap().state, LineState::Hidden);
    }

    #[test]
    fn test_editable_flags() {
        let mut p = pipeline("a\nb\nc\nd");
        assert_eq!(p.set_editable(1..3), vec![1, 2]);
        assert!(p.to_html().contains(r#"data-line="1" data-from="2" data-to="3" data-md-kind="normal" contenteditable="true""#));
        assert_eq!(p.set_editable(2..4), vec![1, 3]);
    }

    #[test]
    fn test_settings_change_rerenders() {
        let mut p = pipeline("｜漢字《かんじ》");
        assert_eq!(p.tree().get(0).unwrap().visible_text(), "漢字");
        let mut settings = p.settings();
        settings.source_mode = true;
        assert!(p.set_settings(settings));
        assert_eq!(p.tree().get(0).unwrap().visible_text(), "｜漢字《かんじ》");
        assert!(!p.set_settings(settings));
    }

    #[test]
    fn test_out_of_step_model_self_heals() {
        let mut editor = PlainEditor::from_text("abc");
        let mut p = pipeline("something else entirely");
        let update = editor.replace_range(0, 0, "x").unwrap();
        let report = p.apply_changes(&editor, &update.changes);
        assert_eq!(report.path, PatchPath::Slow);
        assert_eq!(texts(&p), vec!["xabc"]);
    }
}
