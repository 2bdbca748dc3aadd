//! Raw markdown editing for one paragraph or block.
//!
//! While a session is open its lines are shown as a plain textarea with the
//! source text; the edit is written back verbatim on commit.

use std::ops::Range;

use tategaki_editor_core::{CoreError, EditorUpdate, LineModel, SourceEditor};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainEditSession {
    /// Lines covered, end exclusive.
    pub lines: Range<usize>,
    pub from: usize,
    pub to: usize,
    original: String,
    text: String,
}

impl PlainEditSession {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_dirty(&self) -> bool {
        self.text != self.original
    }
}

#[derive(Debug, Default)]
pub struct PlainEditController {
    session: Option<PlainEditSession>,
}

/// Lines a plain edit started on `line` covers: the whole block for block
/// constructs, otherwise the surrounding run of non-blank lines.
pub fn edit_span(model: &LineModel, line: usize) -> Option<Range<usize>> {
    let info = model.info(line)?;
    if let Some(block) = info.block {
        return Some(block.start..block.end + 1);
    }
    let plain = |l: usize| {
        model.info(l).is_some_and(|i| i.block.is_none() && !i.is_hidden())
            && model.text(l).is_some_and(|t| !t.trim().is_empty())
    };
    if !plain(line) {
        return Some(line..line + 1);
    }
    let mut start = line;
    while start > 0 && plain(start - 1) {
        start -= 1;
    }
    let mut end = line + 1;
    while end < model.line_count() && plain(end) {
        end += 1;
    }
    Some(start..end)
}

impl PlainEditController {
    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&PlainEditSession> {
        self.session.as_ref()
    }

    /// Open a session over the span around `line`. Replaces any open session
    /// without committing it.
    pub fn begin(&mut self, model: &LineModel, line: usize) -> Option<&PlainEditSession> {
        let lines = edit_span(model, line)?;
        let from = model.range(lines.start)?.from;
        let to = model.range(lines.end - 1)?.to;
        let original = (lines.clone())
            .filter_map(|l| model.text(l))
            .collect::<Vec<_>>()
            .join("\n");
        tracing::debug!(target: "tategaki::plain", ?lines, from, to, "begin");
        self.session = Some(PlainEditSession {
            lines,
            from,
            to,
            text: original.clone(),
            original,
        });
        self.session.as_ref()
    }

    pub fn update(&mut self, text: &str) {
        if let Some(session) = self.session.as_mut() {
            session.text = text.to_string();
        }
    }

    /// Close the session and write its text back. Nothing is written when the
    /// text is unchanged or the buffer no longer holds the original span.
    pub fn commit<E: SourceEditor + ?Sized>(
        &mut self,
        editor: &mut E,
    ) -> Result<Option<EditorUpdate>, CoreError> {
        let Some(session) = self.session.take() else {
            return Ok(None);
        };
        if !session.is_dirty() {
            return Ok(None);
        }
        let current = editor.slice(session.from, session.to);
        if current.as_deref() != Some(session.original.as_str()) {
            tracing::warn!(
                target: "tategaki::plain",
                from = session.from,
                to = session.to,
                "buffer changed under plain edit, discarding"
            );
            return Ok(None);
        }
        tracing::debug!(target: "tategaki::plain", from = session.from, to = session.to, "commit");
        editor
            .replace_range(session.from, session.to, &session.text)
            .map(Some)
    }

    pub fn cancel(&mut self) {
        if self.session.take().is_some() {
            tracing::debug!(target: "tategaki::plain", "cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tategaki_editor_core::PlainEditor;

    fn model(doc: &str) -> LineModel {
        LineModel::build(doc, &BTreeSet::new())
    }

    #[test]
    fn test_span_is_paragraph() {
        let m = model("a\nb\n\nc");
        assert_eq!(edit_span(&m, 1), Some(0..2));
        assert_eq!(edit_span(&m, 3), Some(3..4));
        assert_eq!(edit_span(&m, 2), Some(2..3));
    }

    #[test]
    fn test_span_is_whole_block() {
        let m = model("x\n$$\na+b\n$$\ny");
        assert_eq!(edit_span(&m, 2), Some(1..4));
    }

    #[test]
    fn test_commit_writes_verbatim() {
        let doc = "前\n\n**太字**\n続き\n\n後";
        let mut editor = PlainEditor::from_text(doc);
        let mut plain = PlainEditController::default();
        let session = plain.begin(&model(doc), 2).unwrap();
        assert_eq!(session.text(), "**太字**\n続き");
        plain.update("*斜体*\n続き");
        let update = plain.commit(&mut editor).unwrap();
        assert!(update.is_some());
        assert_eq!(editor.doc(), "前\n\n*斜体*\n続き\n\n後");
        assert!(!plain.is_active());
    }

    #[test]
    fn test_unchanged_or_stale_commits_nothing() {
        let doc = "abc";
        let mut editor = PlainEditor::from_text(doc);
        let mut plain = PlainEditController::default();
        plain.begin(&model(doc), 0);
        assert!(plain.commit(&mut editor).unwrap().is_none());

        plain.begin(&model(doc), 0);
        plain.update("xyz");
        editor.replace_range(0, 1, "Z").unwrap();
        assert!(plain.commit(&mut editor).unwrap().is_none());
        assert_eq!(editor.doc(), "Zbc");
    }
}
