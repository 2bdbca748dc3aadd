//! Hidden textarea input.
//!
//! The textarea holds no document text. Committed input is forwarded to the
//! editor as a replace-selection; composition text is only previewed through
//! the pipeline's pending span until the composition ends.

use tategaki_editor_core::{CompositionState, CoreError, EditorUpdate, SourceEditor};

use crate::render::RenderPipeline;

#[derive(Debug, Default)]
pub struct OverlayIme {
    composition: Option<CompositionState>,
}

impl OverlayIme {
    pub fn is_composing(&self) -> bool {
        self.composition.is_some()
    }

    pub fn composition(&self) -> Option<&CompositionState> {
        self.composition.as_ref()
    }

    /// `input` outside composition. Empty data and input during composition
    /// are ignored.
    pub fn on_input<E: SourceEditor + ?Sized>(
        &mut self,
        editor: &mut E,
        data: &str,
    ) -> Result<Option<EditorUpdate>, CoreError> {
        if self.is_composing() || data.is_empty() {
            return Ok(None);
        }
        editor.replace_selection(data).map(Some)
    }

    pub fn composition_start<E: SourceEditor + ?Sized>(&mut self, editor: &E) {
        let start = editor.selection().start();
        tracing::debug!(target: "tategaki::ime", start, "composition start");
        self.composition = Some(CompositionState::new(start, String::new()));
    }

    /// Preview the in-progress text. Returns the lines re-rendered.
    pub fn composition_update(&mut self, pipeline: &mut RenderPipeline, text: &str) -> Vec<usize> {
        let Some(composition) = self.composition.as_mut() else {
            return Vec::new();
        };
        composition.text = text.to_string();
        pipeline.set_pending(composition.start_offset, text)
    }

    /// Roll back the preview and commit `text` as one replace. Returns the
    /// update and the lines the rollback re-rendered.
    pub fn composition_end<E: SourceEditor + ?Sized>(
        &mut self,
        editor: &mut E,
        pipeline: &mut RenderPipeline,
        text: &str,
    ) -> Result<(Option<EditorUpdate>, Vec<usize>), CoreError> {
        let rolled_back = pipeline.clear_pending();
        if self.composition.take().is_none() {
            return Ok((None, rolled_back));
        }
        tracing::debug!(target: "tategaki::ime", chars = text.chars().count(), "composition end");
        if text.is_empty() {
            return Ok((None, rolled_back));
        }
        let update = editor.replace_selection(text)?;
        Ok((Some(update), rolled_back))
    }

    /// Abandon the composition without committing (focus loss).
    pub fn cancel(&mut self, pipeline: &mut RenderPipeline) -> Vec<usize> {
        if self.composition.take().is_some() {
            tracing::debug!(target: "tategaki::ime", "composition cancelled");
        }
        pipeline.clear_pending()
    }
}
