//! ContentEditable input bridge.
//!
//! In CE mode the lines themselves take input so the platform IME can
//! compose in place, but the DOM never becomes a second copy of the
//! document: every `beforeinput` is prevented and replayed as a buffer
//! operation against the selection synced from the DOM. The bridge
//! periodically checks that the DOM around the caret still matches what the
//! segment model says it should show, and gives up on CE mode when it does
//! not.

use std::collections::VecDeque;
use std::ops::Range;
use std::time::Duration;

use tategaki_editor_core::{
    CoreError, EditorUpdate, InputType, LineModel, Selection, SourceEditor, execute_action,
};
use web_time::Instant;

use crate::config::ViewConfig;
use crate::platform::Platform;
use crate::render::RenderPipeline;
use crate::selection::{
    LineView, ProjectionSource, normalize_offset_to_visible, offset_of_visible_index,
    visible_index_of,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CeState {
    #[default]
    Idle,
    Composing { id: u64, start: usize },
}

/// Result of handling a beforeinput event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeforeInputResult {
    /// Replayed against the buffer; prevent the native edit.
    Handled,
    /// Let the platform handle it (composition text).
    PassThrough,
}

/// A caret position as the DOM reports it: a line element and a visible
/// character index inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomPosition {
    pub line: usize,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    VerifyMismatch { failures: usize },
    /// The DOM changed without the bridge applying anything.
    ExternalMutation,
    /// The caret landed somewhere no line mapping exists for.
    UnsafeNode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Skipped,
    Matched,
    Mismatch { failures: usize },
    Fallback(FallbackReason),
}

#[derive(Debug)]
pub struct CeBridge {
    enabled: bool,
    state: CeState,
    next_compose_id: u64,
    applying: bool,
    select_all: bool,
    failures: VecDeque<Instant>,
    last_verify: Option<Instant>,
    threshold: usize,
    window: Duration,
    throttle: Duration,
    margin: usize,
    touch: bool,
}

impl CeBridge {
    pub fn new(config: &ViewConfig, platform: Platform) -> Self {
        Self {
            enabled: config.ce_ime_enabled,
            state: CeState::Idle,
            next_compose_id: 0,
            applying: false,
            select_all: false,
            failures: VecDeque::new(),
            last_verify: None,
            threshold: config.ce_failure_threshold.max(1),
            window: config.ce_failure_window(),
            throttle: config.ce_verify_throttle(),
            margin: config.ce_editable_margin,
            touch: platform.touch,
        }
    }

    pub fn reconfigure(&mut self, config: &ViewConfig) {
        self.threshold = config.ce_failure_threshold.max(1);
        self.window = config.ce_failure_window();
        self.throttle = config.ce_verify_throttle();
        self.margin = config.ce_editable_margin;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn enable(&mut self) {
        self.enabled = true;
        self.failures.clear();
        self.last_verify = None;
        tracing::debug!(target: "tategaki::ce", "enabled");
    }

    pub fn disable(&mut self) {
        self.enabled = false;
        self.state = CeState::Idle;
        self.select_all = false;
    }

    pub fn state(&self) -> CeState {
        self.state
    }

    pub fn is_composing(&self) -> bool {
        matches!(self.state, CeState::Composing { .. })
    }

    /// True while the bridge itself is writing to the buffer.
    pub fn is_applying(&self) -> bool {
        self.applying
    }

    pub fn is_select_all(&self) -> bool {
        self.select_all
    }

    /// Remember that the whole document is selected. Off-screen lines have
    /// no DOM, so this cannot be read back from the native selection.
    pub fn mark_select_all(&mut self) {
        self.select_all = true;
    }

    /// The native selection moved away from the whole document.
    pub fn clear_select_all(&mut self) {
        if std::mem::take(&mut self.select_all) {
            tracing::trace!(target: "tategaki::ce", "select-all cleared");
        }
    }

    fn apply<E, T>(&mut self, editor: &mut E, f: impl FnOnce(&mut E) -> T) -> T
    where
        E: SourceEditor + ?Sized,
    {
        self.applying = true;
        let out = f(editor);
        self.applying = false;
        out
    }

    /// Replay a `beforeinput` against the buffer.
    pub fn handle_beforeinput<E: SourceEditor + ?Sized>(
        &mut self,
        editor: &mut E,
        input_type: &InputType,
        data: Option<&str>,
    ) -> Result<(BeforeInputResult, Option<EditorUpdate>), CoreError> {
        if self.is_composing()
            && !matches!(input_type, InputType::HistoryUndo | InputType::HistoryRedo)
        {
            return Ok((BeforeInputResult::PassThrough, None));
        }
        if *input_type == InputType::InsertCompositionText {
            return Ok((BeforeInputResult::PassThrough, None));
        }
        let selection = if self.select_all {
            Selection::new(0, editor.len_chars())
        } else {
            editor.selection()
        };
        let Some(action) = input_type.to_action(selection, data) else {
            return Ok((BeforeInputResult::PassThrough, None));
        };
        self.select_all = false;
        tracing::trace!(target: "tategaki::ce", ?input_type, "beforeinput");
        let update = self.apply(editor, |e| execute_action(e, &action))?;
        Ok((BeforeInputResult::Handled, update))
    }

    /// Returns the composition id.
    pub fn composition_start<E: SourceEditor + ?Sized>(&mut self, editor: &E) -> u64 {
        self.next_compose_id += 1;
        let id = self.next_compose_id;
        let start = editor.selection().start();
        self.state = CeState::Composing { id, start };
        tracing::debug!(target: "tategaki::ce", id, start, "composition start");
        id
    }

    /// Apply the composed text as one replace of the selection the
    /// composition started from.
    pub fn composition_end<E: SourceEditor + ?Sized>(
        &mut self,
        editor: &mut E,
        text: &str,
    ) -> Result<Option<EditorUpdate>, CoreError> {
        let CeState::Composing { id, .. } = std::mem::take(&mut self.state) else {
            return Ok(None);
        };
        tracing::debug!(target: "tategaki::ce", id, chars = text.chars().count(), "composition end");
        if text.is_empty() {
            return Ok(None);
        }
        self.select_all = false;
        self.apply(editor, |e| e.replace_selection(text)).map(Some)
    }

    /// Focus loss or a forced fallback mid-composition.
    pub fn interrupt(&mut self) {
        if let CeState::Composing { id, .. } = std::mem::take(&mut self.state) {
            tracing::debug!(target: "tategaki::ce", id, "composition interrupted");
        }
    }

    /// Buffer selection for a native selection.
    pub fn selection_from_dom<S: ProjectionSource + ?Sized>(
        &mut self,
        src: &mut S,
        anchor: DomPosition,
        head: DomPosition,
    ) -> Option<Selection> {
        if self.select_all {
            if spans_document(src, anchor, head) {
                return Some(Selection::new(0, src.line_model().doc_len()));
            }
            self.clear_select_all();
        }
        let anchor = resolve_dom(src, anchor)?;
        let head = resolve_dom(src, head)?;
        Some(Selection::new(anchor, head))
    }

    /// Native selection for a buffer selection.
    pub fn selection_to_dom<S: ProjectionSource + ?Sized>(
        &mut self,
        src: &mut S,
        selection: Selection,
    ) -> Option<(DomPosition, DomPosition)> {
        if selection.start() != 0 || selection.end() != src.line_model().doc_len() {
            self.select_all = false;
        }
        Some((dom_of(src, selection.anchor)?, dom_of(src, selection.head)?))
    }

    /// Lines that should be editable around `selection`.
    pub fn editable_lines(&self, model: &LineModel, selection: Selection) -> Range<usize> {
        if !self.enabled {
            return 0..0;
        }
        let first = model.line_at_offset(selection.start());
        let last = model.line_at_offset(selection.end());
        first.saturating_sub(self.margin)..(last + self.margin + 1).min(model.line_count())
    }

    /// Re-tighten the editable span. Returns the lines whose flag flipped.
    pub fn restrict_editable(&self, pipeline: &mut RenderPipeline, selection: Selection) -> Vec<usize> {
        let lines = self.editable_lines(pipeline.model(), selection);
        pipeline.set_editable(lines)
    }

    /// Compare the DOM text around the caret with what the model expects.
    pub fn verify(&mut self, now: Instant, expected: &str, actual: &str) -> VerifyOutcome {
        if !self.enabled || self.touch || self.is_composing() || self.applying {
            return VerifyOutcome::Skipped;
        }
        if self
            .last_verify
            .is_some_and(|t| now.saturating_duration_since(t) < self.throttle)
        {
            return VerifyOutcome::Skipped;
        }
        self.last_verify = Some(now);
        if expected == actual {
            return VerifyOutcome::Matched;
        }
        tracing::debug!(target: "tategaki::ce", expected, actual, "selection context mismatch");
        self.record_failure(now)
    }

    /// Count a mapping failure; enough of them inside the window fall back.
    pub fn record_failure(&mut self, now: Instant) -> VerifyOutcome {
        if !self.enabled {
            return VerifyOutcome::Skipped;
        }
        while self
            .failures
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) > self.window)
        {
            self.failures.pop_front();
        }
        self.failures.push_back(now);
        let failures = self.failures.len();
        if failures >= self.threshold {
            let reason = FallbackReason::VerifyMismatch { failures };
            self.fall_back(reason);
            VerifyOutcome::Fallback(reason)
        } else {
            VerifyOutcome::Mismatch { failures }
        }
    }

    /// A DOM mutation the bridge did not cause. Falls back immediately unless
    /// composing.
    pub fn note_dom_mutation(&mut self) -> Option<FallbackReason> {
        if !self.enabled || self.applying || self.is_composing() {
            return None;
        }
        self.fall_back(FallbackReason::ExternalMutation);
        Some(FallbackReason::ExternalMutation)
    }

    /// The caret landed on a node with no line mapping.
    pub fn note_unsafe_caret(&mut self) -> Option<FallbackReason> {
        if !self.enabled {
            return None;
        }
        self.fall_back(FallbackReason::UnsafeNode);
        Some(FallbackReason::UnsafeNode)
    }

    fn fall_back(&mut self, reason: FallbackReason) {
        tracing::warn!(target: "tategaki::ce", ?reason, "falling back to overlay input");
        self.interrupt();
        self.disable();
        self.failures.clear();
        self.last_verify = None;
    }
}

/// Whether a native selection still covers every rendered line, from the
/// start of the first visible line to the last visible line.
fn spans_document<S: ProjectionSource + ?Sized>(
    src: &mut S,
    anchor: DomPosition,
    head: DomPosition,
) -> bool {
    let (start, end) = if (anchor.line, anchor.index) <= (head.line, head.index) {
        (anchor, head)
    } else {
        (head, anchor)
    };
    if start == end {
        return false;
    }
    let doc_len = src.line_model().doc_len();
    let first = normalize_offset_to_visible(src, 0, true);
    let last = normalize_offset_to_visible(src, doc_len, false);
    let model = src.line_model();
    start.line <= model.line_at_offset(first) && start.index == 0 && end.line >= model.line_at_offset(last)
}

fn resolve_dom<S: ProjectionSource + ?Sized>(src: &mut S, pos: DomPosition) -> Option<usize> {
    let range = src.line_model().range(pos.line)?;
    let offset = match src.line_view(pos.line) {
        LineView::Content(p) => offset_of_visible_index(&p, range, pos.index),
        LineView::Widget { from, .. } => from,
        LineView::Hidden => range.from,
    };
    Some(normalize_offset_to_visible(src, offset, true))
}

fn dom_of<S: ProjectionSource + ?Sized>(src: &mut S, offset: usize) -> Option<DomPosition> {
    let offset = normalize_offset_to_visible(src, offset, true);
    let line = src.line_model().line_at_offset(offset);
    match src.line_view(line) {
        LineView::Content(p) => Some(DomPosition {
            line,
            index: visible_index_of(&p, offset),
        }),
        LineView::Widget { from, to } => {
            let first = src.line_model().line_at_offset(from);
            Some(DomPosition {
                line: first,
                index: usize::from(offset >= to),
            })
        }
        LineView::Hidden => None,
    }
}

/// Visible text within `radius` characters of `offset` on its line, as the
/// DOM should show it.
pub fn expected_context<S: ProjectionSource + ?Sized>(
    src: &mut S,
    offset: usize,
    radius: usize,
) -> Option<String> {
    let line = src.line_model().line_at_offset(offset);
    let LineView::Content(p) = src.line_view(line) else {
        return None;
    };
    let index = visible_index_of(&p, offset);
    let text = p.visible_text();
    Some(
        text.chars()
            .skip(index.saturating_sub(radius))
            .take(index.min(radius) + radius)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tategaki_editor_core::PlainEditor;

    fn config() -> ViewConfig {
        ViewConfig {
            ce_ime_enabled: true,
            ..Default::default()
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_beforeinput_replayed_on_buffer() {
        let mut bridge = CeBridge::new(&config(), Platform::default());
        let mut editor = PlainEditor::from_text("ab");
        editor.set_selection(Selection::collapsed(1));
        let (result, update) = bridge
            .handle_beforeinput(&mut editor, &InputType::InsertText, Some("x"))
            .unwrap();
        assert_eq!(result, BeforeInputResult::Handled);
        assert!(update.is_some_and(|u| u.doc_changed));
        assert_eq!(editor.doc(), "axb");
        assert!(!bridge.is_applying());
    }

    #[test]
    fn test_composition_passes_through_then_commits() {
        let mut bridge = CeBridge::new(&config(), Platform::default());
        let mut editor = PlainEditor::from_text("本文");
        editor.set_selection(Selection::collapsed(2));
        let id = bridge.composition_start(&editor);
        assert_eq!(bridge.state(), CeState::Composing { id, start: 2 });
        let (result, _) = bridge
            .handle_beforeinput(&mut editor, &InputType::InsertCompositionText, Some("か"))
            .unwrap();
        assert_eq!(result, BeforeInputResult::PassThrough);
        assert_eq!(editor.doc(), "本文");
        bridge.composition_end(&mut editor, "漢字").unwrap();
        assert_eq!(editor.doc(), "本文漢字");
        assert_eq!(bridge.state(), CeState::Idle);
    }

    #[test]
    fn test_select_all_uses_whole_document() {
        let mut bridge = CeBridge::new(&config(), Platform::default());
        let mut editor = PlainEditor::from_text("abc\ndef");
        bridge.mark_select_all();
        bridge
            .handle_beforeinput(&mut editor, &InputType::DeleteContentBackward, None)
            .unwrap();
        assert_eq!(editor.doc(), "");
        assert!(!bridge.is_select_all());
    }

    #[test]
    fn test_select_all_kept_only_while_dom_spans_document() {
        let mut bridge = CeBridge::new(&config(), Platform::default());
        let mut pipeline = RenderPipeline::new(&config());
        pipeline.render_full("abc\ndef");
        bridge.mark_select_all();
        let (start, end) = (DomPosition { line: 0, index: 0 }, DomPosition { line: 1, index: 3 });
        let sel = bridge.selection_from_dom(&mut pipeline, start, end).unwrap();
        assert_eq!(sel, Selection::new(0, 7));
        assert!(bridge.is_select_all());

        let caret = DomPosition { line: 1, index: 1 };
        let sel = bridge.selection_from_dom(&mut pipeline, caret, caret).unwrap();
        assert_eq!(sel, Selection::collapsed(5));
        assert!(!bridge.is_select_all());
    }

    #[test]
    fn test_dom_positions_round_trip() {
        let mut bridge = CeBridge::new(&config(), Platform::default());
        let mut pipeline = RenderPipeline::new(&config());
        pipeline.render_full("a**b**c\nxy");
        let pos = DomPosition { line: 0, index: 2 };
        let sel = bridge.selection_from_dom(&mut pipeline, pos, pos).unwrap();
        assert_eq!(sel, Selection::collapsed(4));
        let (anchor, _) = bridge.selection_to_dom(&mut pipeline, Selection::new(9, 4)).unwrap();
        assert_eq!(anchor, DomPosition { line: 1, index: 1 });
    }

    #[test]
    fn test_verify_throttled_and_skipped_on_touch() {
        let mut bridge = CeBridge::new(&config(), Platform::default());
        let t0 = Instant::now();
        assert_eq!(bridge.verify(t0, "ab", "ab"), VerifyOutcome::Matched);
        assert_eq!(bridge.verify(t0 + ms(10), "ab", "ax"), VerifyOutcome::Skipped);
        assert_eq!(
            bridge.verify(t0 + ms(100), "ab", "ax"),
            VerifyOutcome::Mismatch { failures: 1 }
        );

        let touch = Platform {
            touch: true,
            ..Default::default()
        };
        let mut bridge = CeBridge::new(&config(), touch);
        assert_eq!(bridge.verify(t0, "ab", "ax"), VerifyOutcome::Skipped);
    }

    #[test]
    fn test_failures_outside_window_decay() {
        let mut bridge = CeBridge::new(&config(), Platform::default());
        let t0 = Instant::now();
        bridge.record_failure(t0);
        bridge.record_failure(t0 + ms(500));
        assert_eq!(
            bridge.record_failure(t0 + ms(1600)),
            VerifyOutcome::Mismatch { failures: 2 }
        );
        assert!(bridge.is_enabled());
    }

    #[test]
    fn test_external_mutation_falls_back_immediately() {
        let mut bridge = CeBridge::new(&config(), Platform::default());
        assert_eq!(bridge.note_dom_mutation(), Some(FallbackReason::ExternalMutation));
        assert!(!bridge.is_enabled());
    }

    #[test]
    fn test_editable_lines_follow_selection() {
        let bridge = CeBridge::new(&config(), Platform::default());
        let mut pipeline = RenderPipeline::new(&config());
        pipeline.render_full("0\n1\n2\n3\n4\n5\n6\n7");
        assert_eq!(
            bridge.editable_lines(pipeline.model(), Selection::collapsed(8)),
            2..7
        );
        assert_eq!(bridge.restrict_editable(&mut pipeline, Selection::collapsed(0)), vec![0, 1, 2]);
    }

    #[test]
    fn test_expected_context_window() {
        let mut pipeline = RenderPipeline::new(&config());
        pipeline.render_full("abcdefgh");
        assert_eq!(expected_context(&mut pipeline, 4, 2).as_deref(), Some("cdef"));
        assert_eq!(expected_context(&mut pipeline, 1, 3).as_deref(), Some("abcd"));
    }
}
