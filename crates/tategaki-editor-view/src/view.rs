//! The view controller.
//!
//! One [`TategakiView`] per open document. It owns the buffer, the render
//! pipeline and every input adapter, and sequences their calls: a buffer
//! change is applied to the model, then the selection is synced, then the
//! presentation is either returned immediately or left for the next frame.

use std::collections::BTreeSet;
use std::ops::Range;

use tategaki_editor_core::{
    EditorAction, EditorUpdate, InputType, KeyCombo, KeydownResult, OutlineEntry, PlainEditor,
    Selection, SourceEditor, execute_action,
};
use web_time::Instant;

use crate::config::{PersistedViewState, ViewConfig};
use crate::error::ViewError;
use crate::geometry::{LayoutProvider, Point, Rect};
use crate::input::ce_bridge::expected_context;
use crate::input::{BeforeInputResult, CeBridge, DomPosition, FallbackReason, InputSurface, OverlayIme, VerifyOutcome};
use crate::log_buffer::get_logs;
use crate::notice::{Notice, NoticeQueue};
use crate::plain_edit::{PlainEditController, PlainEditSession};
use crate::platform::Platform;
use crate::render::{RenderPipeline, RenderSettings, RenderTree};
use crate::scheduler::{RenderToken, Scheduler};
use crate::selection::{
    SelectionOverlay, SoftSelection, build_overlay, caret_rect, move_selection, nav_intent,
    offset_from_point,
};

/// Characters either side of the caret compared by CE verification.
const VERIFY_RADIUS: usize = 8;

/// Something the host has to do on the view's behalf.
#[derive(Debug, Clone, PartialEq)]
pub enum HostRequest {
    /// The persisted file is gone.
    CloseView,
    ShowNotice(Notice),
}

/// A file read the host should perform. Pass it back to
/// [`TategakiView::finish_load`]; a load that was superseded is discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLoad {
    pub path: String,
    token: RenderToken,
}

/// Lines the host must re-present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewUpdate {
    pub lines: BTreeSet<usize>,
    /// Re-present every line.
    pub full: bool,
    pub selection_changed: bool,
}

impl ViewUpdate {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && !self.full && !self.selection_changed
    }
}

/// Per-document state.
pub struct EditorViewState {
    pub editor: PlainEditor,
    pub pipeline: RenderPipeline,
    pub ime: OverlayIme,
    pub ce: CeBridge,
    pub plain: PlainEditController,
    soft: Option<SoftSelection>,
    drag_anchor: Option<usize>,
    dirty: ViewUpdate,
}

impl EditorViewState {
    fn new(config: &ViewConfig, platform: Platform, text: &str) -> Self {
        let mut pipeline = RenderPipeline::new(config);
        pipeline.render_full(text);
        Self {
            editor: PlainEditor::from_text(text),
            pipeline,
            ime: OverlayIme::default(),
            ce: CeBridge::new(config, platform),
            plain: PlainEditController::default(),
            soft: None,
            drag_anchor: None,
            dirty: ViewUpdate {
                full: true,
                ..Default::default()
            },
        }
    }

    fn mark(&mut self, lines: impl IntoIterator<Item = usize>) {
        self.dirty.lines.extend(lines);
    }
}

pub struct TategakiView {
    config: ViewConfig,
    platform: Platform,
    state: EditorViewState,
    scheduler: Scheduler,
    notices: NoticeQueue,
    attached: bool,
    pending_state: Option<PersistedViewState>,
    file_path: Option<String>,
    requests: Vec<HostRequest>,
}

impl TategakiView {
    pub fn new(config: ViewConfig, platform: Platform) -> Self {
        Self {
            state: EditorViewState::new(&config, platform, ""),
            scheduler: Scheduler::new(&config),
            notices: NoticeQueue::default(),
            attached: false,
            pending_state: None,
            file_path: None,
            requests: Vec::new(),
            config,
            platform,
        }
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn state(&self) -> &EditorViewState {
        &self.state
    }

    pub fn editor(&self) -> &PlainEditor {
        &self.state.editor
    }

    pub fn tree(&self) -> &RenderTree {
        self.state.pipeline.tree()
    }

    pub fn html(&self) -> String {
        self.state.pipeline.to_html()
    }

    pub fn file_path(&self) -> Option<&str> {
        self.file_path.as_deref()
    }

    pub fn outline(&self) -> Vec<OutlineEntry> {
        self.state.pipeline.outline()
    }

    pub fn take_requests(&mut self) -> Vec<HostRequest> {
        std::mem::take(&mut self.requests)
    }

    pub fn active_notices(&mut self, now: Instant) -> Vec<Notice> {
        self.notices.active(now).cloned().collect()
    }

    pub fn input_surface(&self) -> InputSurface {
        if self.state.plain.is_active() {
            InputSurface::PlainEdit
        } else if self.state.ce.is_enabled() {
            InputSurface::ContentEditable
        } else {
            InputSurface::OverlayTextarea
        }
    }

    // === Lifecycle ===

    pub fn get_state(&self) -> PersistedViewState {
        PersistedViewState {
            file_path: self.file_path.clone(),
            writing_mode: Some(self.config.writing_mode),
        }
    }

    /// Restore pane state. Before [`attach`](Self::attach) the state is kept
    /// and applied once the view is ready.
    pub fn set_state(&mut self, now: Instant, state: PersistedViewState) -> Option<FileLoad> {
        if !self.attached {
            tracing::debug!(target: "tategaki::view", "state buffered until attach");
            self.pending_state = Some(state);
            return None;
        }
        if let Some(mode) = state.writing_mode.filter(|m| *m != self.config.writing_mode) {
            let config = ViewConfig {
                writing_mode: mode,
                ..self.config.clone()
            };
            self.set_config(now, config);
        }
        let path = state.file_path?;
        Some(self.begin_load(path))
    }

    /// The presenter is ready. Applies buffered state.
    pub fn attach(&mut self, now: Instant) -> Option<FileLoad> {
        self.attached = true;
        let state = self.pending_state.take()?;
        self.set_state(now, state)
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Start loading `path`, superseding any load in flight.
    pub fn begin_load(&mut self, path: String) -> FileLoad {
        FileLoad {
            token: self.scheduler.issue_token(),
            path,
        }
    }

    /// Deliver the result of a [`FileLoad`]. `None` content means the file
    /// does not exist, and the view asks to be closed.
    pub fn finish_load(&mut self, load: FileLoad, content: Option<String>) -> Result<(), ViewError> {
        if !self.scheduler.is_current(load.token) {
            tracing::debug!(target: "tategaki::view", path = %load.path, "stale load discarded");
            return Ok(());
        }
        let Some(text) = content else {
            tracing::warn!(target: "tategaki::view", path = %load.path, "file missing");
            self.requests.push(HostRequest::CloseView);
            return Err(ViewError::MissingFile(load.path));
        };
        self.open_document(Some(load.path), &text);
        Ok(())
    }

    /// Replace the document. Folds, caches and the undo history start over.
    pub fn open_document(&mut self, path: Option<String>, text: &str) {
        let ce_enabled = self.state.ce.is_enabled();
        self.state = EditorViewState::new(&self.config, self.platform, text);
        if !ce_enabled {
            self.state.ce.disable();
        }
        self.file_path = path;
        self.scheduler.cancel_render();
        tracing::info!(
            target: "tategaki::view",
            path = self.file_path.as_deref().unwrap_or(""),
            lines = self.state.pipeline.model().line_count(),
            "document opened"
        );
    }

    // === Settings ===

    /// Apply new settings. Rendering changes are debounced.
    pub fn set_config(&mut self, now: Instant, config: ViewConfig) {
        if self.config.affects_rendering(&config) {
            self.scheduler.schedule_settings_render(now);
        }
        if config.ce_ime_enabled != self.config.ce_ime_enabled {
            self.config.ce_ime_enabled = config.ce_ime_enabled;
            self.set_ce_enabled(config.ce_ime_enabled);
        }
        self.scheduler.reconfigure(&config);
        self.state.ce.reconfigure(&config);
        self.config = config;
    }

    /// Switch CE input on or off. Turning it on ends any plain edit.
    pub fn set_ce_enabled(&mut self, enabled: bool) {
        let st = &mut self.state;
        if enabled {
            if st.plain.is_active() {
                st.plain.cancel();
            }
            st.ce.enable();
        } else {
            st.ce.interrupt();
            st.ce.disable();
        }
        let selection = st.editor.selection();
        let lines = st.ce.restrict_editable(&mut st.pipeline, selection);
        st.mark(lines);
    }

    // === Deferred work ===

    /// Run whatever deferred work is due. Returns what to re-present.
    pub fn tick(&mut self, now: Instant) -> Option<ViewUpdate> {
        let st = &mut self.state;
        if self.scheduler.take_due_settings_render(now)
            && st.pipeline.set_settings(RenderSettings::from_config(&self.config))
        {
            st.dirty.full = true;
        }
        if self.scheduler.take_due_reclassify(now) {
            let lines = st.pipeline.reclassify_now();
            st.mark(lines);
        }
        let due = self.scheduler.take_due_render(now).is_some();
        let urgent = st.dirty.full;
        if (due || urgent) && !st.dirty.is_empty() {
            return Some(std::mem::take(&mut st.dirty));
        }
        None
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    /// Everything pending, regardless of schedule.
    pub fn flush(&mut self) -> ViewUpdate {
        self.scheduler.cancel_render();
        std::mem::take(&mut self.state.dirty)
    }

    /// Sequence one editor update: model, then selection sync, then either
    /// immediate presentation or a render on the next frame.
    fn commit_update(&mut self, now: Instant, update: EditorUpdate, immediate: bool) -> Option<ViewUpdate> {
        let st = &mut self.state;
        if update.doc_changed {
            let report = st.pipeline.apply_changes(&st.editor, &update.changes);
            st.mark(report.rebuilt);
            if report.reclassify_pending {
                self.scheduler.schedule_reclassify(now);
            }
        }
        let selection = st.editor.selection();
        let head_lines = st.pipeline.set_selection_head(selection.head);
        st.mark(head_lines);
        let editable = st.ce.restrict_editable(&mut st.pipeline, selection);
        st.mark(editable);
        st.dirty.selection_changed |= update.selection_changed || update.doc_changed;
        if immediate {
            Some(self.flush())
        } else {
            self.scheduler.schedule_render(now, false);
            None
        }
    }

    fn run_action(&mut self, now: Instant, action: &EditorAction) -> Result<Option<ViewUpdate>, ViewError> {
        let immediate = !matches!(
            action,
            EditorAction::Insert { .. }
                | EditorAction::DeleteBackward { .. }
                | EditorAction::DeleteForward { .. }
        );
        let Some(update) = execute_action(&mut self.state.editor, action)? else {
            return Ok(None);
        };
        Ok(self.commit_update(now, update, immediate))
    }

    // === Keyboard and text input ===

    pub fn on_keydown<L: LayoutProvider + ?Sized>(
        &mut self,
        now: Instant,
        layout: &L,
        combo: &KeyCombo,
    ) -> Result<(KeydownResult, Option<ViewUpdate>), ViewError> {
        let composing = self.state.ime.is_composing() || self.state.ce.is_composing();
        if self.state.plain.is_active() || composing {
            return Ok((KeydownResult::PassThrough, None));
        }
        let ce = self.state.ce.is_enabled();
        if let Some(intent) = nav_intent(self.config.writing_mode, combo, self.platform.mac) {
            if ce {
                // Native caret movement; the selection comes back through
                // `on_dom_selection_change`.
                return Ok((KeydownResult::PassThrough, None));
            }
            let st = &mut self.state;
            let moved = move_selection(&mut st.pipeline, layout, st.editor.selection(), intent);
            let update = st.editor.set_selection(moved);
            return Ok((KeydownResult::Handled, self.commit_update(now, update, true)));
        }
        let Some(action) = combo.to_action(self.state.editor.selection(), self.platform.mac) else {
            return Ok((KeydownResult::NotHandled, None));
        };
        match action {
            EditorAction::SelectAll if ce => self.state.ce.mark_select_all(),
            EditorAction::SelectAll | EditorAction::Undo | EditorAction::Redo => {}
            // CE receives these as beforeinput.
            _ if ce => return Ok((KeydownResult::PassThrough, None)),
            _ => {}
        }
        let update = self.run_action(now, &action)?;
        Ok((KeydownResult::Handled, update))
    }

    /// Committed text from the overlay textarea.
    pub fn on_textarea_input(&mut self, now: Instant, data: &str) -> Result<Option<ViewUpdate>, ViewError> {
        let Some(update) = self.state.ime.on_input(&mut self.state.editor, data)? else {
            return Ok(None);
        };
        Ok(self.commit_update(now, update, false))
    }

    /// Run an editor action from the host (menu commands, toolbar).
    pub fn execute(&mut self, now: Instant, action: &EditorAction) -> Result<Option<ViewUpdate>, ViewError> {
        self.run_action(now, action)
    }

    pub fn on_composition_start(&mut self) {
        let surface = self.input_surface();
        let st = &mut self.state;
        match surface {
            InputSurface::ContentEditable => {
                st.ce.composition_start(&st.editor);
            }
            InputSurface::OverlayTextarea => st.ime.composition_start(&st.editor),
            InputSurface::PlainEdit => {}
        }
    }

    /// In overlay mode, previews the text. Returns the lines to re-present.
    pub fn on_composition_update(&mut self, text: &str) -> Vec<usize> {
        let st = &mut self.state;
        if !st.ime.is_composing() {
            return Vec::new();
        }
        st.ime.composition_update(&mut st.pipeline, text)
    }

    pub fn on_composition_end(&mut self, now: Instant, text: &str) -> Result<Option<ViewUpdate>, ViewError> {
        let st = &mut self.state;
        let update = if st.ce.is_composing() {
            st.ce.composition_end(&mut st.editor, text)?
        } else if st.ime.is_composing() {
            let (update, rolled_back) = st.ime.composition_end(&mut st.editor, &mut st.pipeline, text)?;
            st.mark(rolled_back);
            update
        } else {
            None
        };
        match update {
            Some(update) => Ok(self.commit_update(now, update, true)),
            None => Ok(Some(self.flush())),
        }
    }

    /// Focus left the input surface.
    pub fn on_blur(&mut self) -> Vec<usize> {
        let st = &mut self.state;
        st.ce.interrupt();
        st.ime.cancel(&mut st.pipeline)
    }

    pub fn on_beforeinput(
        &mut self,
        now: Instant,
        input_type: &str,
        data: Option<&str>,
    ) -> Result<(BeforeInputResult, Option<ViewUpdate>), ViewError> {
        if !self.state.ce.is_enabled() {
            return Ok((BeforeInputResult::PassThrough, None));
        }
        let input_type = InputType::parse(input_type);
        let st = &mut self.state;
        let (result, update) = st.ce.handle_beforeinput(&mut st.editor, &input_type, data)?;
        let view_update = update.and_then(|u| self.commit_update(now, u, false));
        Ok((result, view_update))
    }

    // === CE selection and verification ===

    pub fn on_dom_selection_change(
        &mut self,
        now: Instant,
        anchor: DomPosition,
        head: DomPosition,
    ) -> Option<ViewUpdate> {
        let st = &mut self.state;
        if !st.ce.is_enabled() || st.ce.is_applying() {
            return None;
        }
        let Some(selection) = st.ce.selection_from_dom(&mut st.pipeline, anchor, head) else {
            if let Some(reason) = st.ce.note_unsafe_caret() {
                self.after_fallback(now, reason);
            }
            return Some(self.flush());
        };
        if selection == st.editor.selection() {
            return None;
        }
        let update = st.editor.set_selection(selection);
        self.commit_update(now, update, true)
    }

    /// Where the native selection should be for the buffer selection.
    pub fn dom_selection(&mut self) -> Option<(DomPosition, DomPosition)> {
        let st = &mut self.state;
        let selection = st.editor.selection();
        st.ce.selection_to_dom(&mut st.pipeline, selection)
    }

    /// Check the DOM text around the caret against the model.
    pub fn verify_ce_selection(&mut self, now: Instant, actual: &str) -> VerifyOutcome {
        let st = &mut self.state;
        let head = st.editor.selection().head;
        let Some(expected) = expected_context(&mut st.pipeline, head, VERIFY_RADIUS) else {
            return VerifyOutcome::Skipped;
        };
        let outcome = st.ce.verify(now, &expected, actual);
        if let VerifyOutcome::Fallback(reason) = outcome {
            self.after_fallback(now, reason);
        }
        outcome
    }

    /// The DOM changed outside a bridge-applied edit.
    pub fn on_dom_mutation(&mut self, now: Instant) -> Option<FallbackReason> {
        let reason = self.state.ce.note_dom_mutation()?;
        self.after_fallback(now, reason);
        Some(reason)
    }

    fn after_fallback(&mut self, now: Instant, reason: FallbackReason) {
        let st = &mut self.state;
        let selection = st.editor.selection();
        let lines = st.ce.restrict_editable(&mut st.pipeline, selection);
        st.mark(lines);
        let message = match reason {
            FallbackReason::VerifyMismatch { .. } => "入力位置の同期に失敗したため、標準の入力方式に切り替えました",
            FallbackReason::ExternalMutation | FallbackReason::UnsafeNode => {
                "編集領域が想定外に変更されたため、標準の入力方式に切り替えました"
            }
        };
        let notice = self
            .notices
            .push(now, self.config.notice_duration(), message, Some(get_logs()))
            .clone();
        self.requests.push(HostRequest::ShowNotice(notice));
    }

    // === Pointer ===

    pub fn on_pointer_down<L: LayoutProvider + ?Sized>(
        &mut self,
        now: Instant,
        layout: &L,
        p: Point,
        extend: bool,
    ) -> Option<ViewUpdate> {
        let st = &mut self.state;
        st.ce.clear_select_all();
        let offset = offset_from_point(&mut st.pipeline, layout, p)?;
        let anchor = if extend {
            st.editor.selection().anchor
        } else {
            offset
        };
        st.drag_anchor = Some(anchor);
        let model = st.pipeline.model();
        if self.config.is_huge_document(model.doc_len(), model.line_count()) {
            let mut soft = SoftSelection::begin(anchor);
            soft.update(offset);
            st.soft = Some(soft);
            return None;
        }
        let update = st.editor.set_selection(Selection::new(anchor, offset));
        self.commit_update(now, update, true)
    }

    pub fn on_pointer_move<L: LayoutProvider + ?Sized>(
        &mut self,
        now: Instant,
        layout: &L,
        p: Point,
    ) -> Option<ViewUpdate> {
        let st = &mut self.state;
        let anchor = st.drag_anchor?;
        let offset = offset_from_point(&mut st.pipeline, layout, p)?;
        if let Some(soft) = st.soft.as_mut() {
            soft.update(offset);
            return None;
        }
        let update = st.editor.set_selection(Selection::new(anchor, offset));
        self.commit_update(now, update, true)
    }

    /// End of a drag. A soft selection is committed here.
    pub fn on_pointer_up(&mut self, now: Instant) -> Option<ViewUpdate> {
        let st = &mut self.state;
        st.drag_anchor = None;
        let soft = st.soft.take()?;
        let update = st.editor.set_selection(soft.selection());
        self.commit_update(now, update, true)
    }

    // === Viewport, caret and overlay ===

    /// The host scrolled; `visible` is the range of lines on screen.
    pub fn on_scroll(&mut self, now: Instant, visible: Range<usize>, lines_moved: usize) -> Option<ViewUpdate> {
        let jump = self.scheduler.note_scroll(now, lines_moved);
        let lines = self.state.pipeline.set_viewport(visible, jump);
        if lines.is_empty() {
            return None;
        }
        self.state.mark(lines);
        Some(self.flush())
    }

    pub fn is_scrolling(&self, now: Instant) -> bool {
        self.scheduler.is_scrolling(now)
    }

    /// Caret rect for positioning the overlay textarea.
    pub fn caret_rect<L: LayoutProvider + ?Sized>(&mut self, layout: &L) -> Option<Rect> {
        let st = &mut self.state;
        let head = st.editor.selection().head;
        if let Some(line) = st.pipeline.tree().lines().iter().position(|e| e.from <= head && head <= e.to) {
            st.pipeline.ensure_line_rendered(line);
        }
        caret_rect(&mut st.pipeline, layout, head)
    }

    /// Selection overlay, or None while scrolling (keep the previous one).
    pub fn selection_overlay<L: LayoutProvider + ?Sized>(
        &mut self,
        now: Instant,
        layout: &L,
    ) -> Option<SelectionOverlay> {
        if self.scheduler.is_scrolling(now) {
            return None;
        }
        let st = &mut self.state;
        let selection = st.editor.selection();
        Some(build_overlay(&mut st.pipeline, layout, selection, st.soft.as_ref()))
    }

    // === Folding and plain edit ===

    pub fn toggle_fold(&mut self, line: usize) -> Result<ViewUpdate, ViewError> {
        let count = self.state.pipeline.model().line_count();
        if line >= count {
            return Err(ViewError::UnknownLine { line, count });
        }
        let lines = self.state.pipeline.toggle_fold(line);
        self.state.mark(lines);
        Ok(self.flush())
    }

    /// Open raw editing on the paragraph or block at `line`. Ends CE mode.
    pub fn begin_plain_edit(&mut self, line: usize) -> Result<Option<&PlainEditSession>, ViewError> {
        let count = self.state.pipeline.model().line_count();
        if line >= count {
            return Err(ViewError::UnknownLine { line, count });
        }
        if self.state.ce.is_enabled() {
            self.set_ce_enabled(false);
        }
        let st = &mut self.state;
        Ok(st.plain.begin(st.pipeline.model(), line))
    }

    pub fn update_plain_edit(&mut self, text: &str) {
        self.state.plain.update(text);
    }

    /// Commit the plain edit (blur, outside click or toggle off).
    pub fn end_plain_edit(&mut self, now: Instant) -> Result<Option<ViewUpdate>, ViewError> {
        let committed = self.state.plain.commit(&mut self.state.editor);
        self.restore_ce_after_plain_edit();
        let Some(update) = committed? else {
            return Ok(None);
        };
        Ok(self.commit_update(now, update, true))
    }

    pub fn cancel_plain_edit(&mut self) {
        self.state.plain.cancel();
        self.restore_ce_after_plain_edit();
    }

    fn restore_ce_after_plain_edit(&mut self) {
        if self.config.ce_ime_enabled && !self.state.ce.is_enabled() {
            self.set_ce_enabled(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GridLayout;
    use std::time::Duration;
    use tategaki_editor_core::{Key, WritingMode};

    fn view(doc: &str) -> TategakiView {
        let mut v = TategakiView::new(ViewConfig::default(), Platform::default());
        v.open_document(None, doc);
        v.flush();
        v
    }

    #[test]
    fn test_state_buffered_until_attach() {
        let mut v = TategakiView::new(ViewConfig::default(), Platform::default());
        let now = Instant::now();
        let state = PersistedViewState {
            file_path: Some("notes/a.md".into()),
            writing_mode: Some(WritingMode::HorizontalTb),
        };
        assert!(v.set_state(now, state).is_none());
        let load = v.attach(now).unwrap();
        assert_eq!(load.path, "notes/a.md");
        assert_eq!(v.config().writing_mode, WritingMode::HorizontalTb);
        v.finish_load(load, Some("# 題\n本文".into())).unwrap();
        assert_eq!(v.file_path(), Some("notes/a.md"));
        assert_eq!(v.outline().len(), 1);
    }

    #[test]
    fn test_missing_file_closes_view() {
        let mut v = TategakiView::new(ViewConfig::default(), Platform::default());
        let load = v.begin_load("gone.md".into());
        assert!(matches!(v.finish_load(load, None), Err(ViewError::MissingFile(_))));
        assert_eq!(v.take_requests(), vec![HostRequest::CloseView]);
    }

    #[test]
    fn test_stale_load_discarded() {
        let mut v = TategakiView::new(ViewConfig::default(), Platform::default());
        let first = v.begin_load("a.md".into());
        let second = v.begin_load("b.md".into());
        v.finish_load(first, Some("old".into())).unwrap();
        assert_eq!(v.editor().doc(), "");
        v.finish_load(second, Some("new".into())).unwrap();
        assert_eq!(v.editor().doc(), "new");
    }

    #[test]
    fn test_typing_renders_next_frame() {
        let mut v = view("abc");
        let t0 = Instant::now();
        v.state.editor.set_selection(Selection::collapsed(3));
        assert!(v.on_textarea_input(t0, "d").unwrap().is_none());
        assert_eq!(v.tree().get(0).unwrap().visible_text(), "abcd");
        let update = v.tick(t0 + Duration::from_millis(20)).unwrap();
        assert!(update.lines.contains(&0));
        assert!(update.selection_changed);
        assert!(v.tick(t0 + Duration::from_millis(40)).is_none());
    }

    #[test]
    fn test_structural_command_renders_immediately() {
        let mut v = view("abc");
        let t0 = Instant::now();
        v.state.editor.set_selection(Selection::new(0, 3));
        let combo = KeyCombo::with_modifiers(Key::character("b"), tategaki_editor_core::Modifiers::CTRL);
        let layout = GridLayout::new(WritingMode::VerticalRl, 40);
        let (result, update) = v.on_keydown(t0, &layout, &combo).unwrap();
        assert_eq!(result, KeydownResult::Handled);
        assert!(update.is_some());
        assert_eq!(v.editor().doc(), "**abc**");
    }

    #[test]
    fn test_arrow_moves_caret_in_vertical_mode() {
        let mut v = view("abc");
        let t0 = Instant::now();
        let mut layout = GridLayout::new(WritingMode::VerticalRl, 40);
        layout.layout(v.tree());
        let (result, _) = v.on_keydown(t0, &layout, &KeyCombo::new(Key::ArrowDown)).unwrap();
        assert_eq!(result, KeydownResult::Handled);
        assert_eq!(v.editor().selection(), Selection::collapsed(1));
    }

    #[test]
    fn test_plain_edit_excludes_ce() {
        let config = ViewConfig {
            ce_ime_enabled: true,
            ..Default::default()
        };
        let mut v = TategakiView::new(config, Platform::default());
        v.open_document(None, "一\n二");
        assert_eq!(v.input_surface(), InputSurface::ContentEditable);
        v.begin_plain_edit(0).unwrap();
        assert_eq!(v.input_surface(), InputSurface::PlainEdit);
        v.update_plain_edit("壱\n二");
        v.end_plain_edit(Instant::now()).unwrap();
        assert_eq!(v.editor().doc(), "壱\n二");
        assert_eq!(v.input_surface(), InputSurface::ContentEditable);
    }

    #[test]
    fn test_toggle_fold_unknown_line() {
        let mut v = view("# a");
        assert!(matches!(
            v.toggle_fold(5),
            Err(ViewError::UnknownLine { line: 5, count: 1 })
        ));
    }

    #[test]
    fn test_settings_change_is_debounced() {
        let mut v = view("**a**");
        let t0 = Instant::now();
        let config = ViewConfig {
            source_mode: true,
            ..v.config().clone()
        };
        v.set_config(t0, config);
        assert_eq!(v.tree().get(0).unwrap().visible_text(), "a");
        assert!(v.tick(t0 + Duration::from_millis(50)).is_none());
        let update = v.tick(t0 + Duration::from_millis(130)).unwrap();
        assert!(update.full);
        assert_eq!(v.tree().get(0).unwrap().visible_text(), "**a**");
    }
}
