//! Formatting commands: toggle and clear inline styles, insert and clear ruby.
//!
//! Marker detection reuses the line scanner with a sink that records which
//! spans are clearable, so commands agree with what decoration hides.

use std::ops::Range;

use smol_str::SmolStr;

use crate::decoration::{EmphasisRun, InlineStyle, find_ruby, scan_emphasis};
use crate::document::{ChangeSpec, SourceEditor, Transaction};
use crate::error::CoreError;
use crate::scan::{self, ConstructKind, ScanMatch, ScanSink, code_span_ranges};
use crate::text_helpers::{find_line_end, find_line_start, word_range_at};
use crate::types::{EditorUpdate, Selection};

/// Scanner sink collecting code spans and the ranges emphasis must skip.
#[derive(Debug, Default)]
struct ClearableSpans {
    code: Vec<EmphasisRun>,
    protected: Vec<Range<usize>>,
}

impl ScanSink for ClearableSpans {
    fn push(&mut self, m: ScanMatch) {
        match m.kind {
            ConstructKind::CodeSpan => {
                if let [open, close] = m.markers.as_slice() {
                    self.code.push(EmphasisRun {
                        style: InlineStyle::Code,
                        open: open.clone(),
                        close: close.clone(),
                    });
                }
                self.protected.push(m.span);
            }
            ConstructKind::Autolink | ConstructKind::InlineMath | ConstructKind::Escape => {
                self.protected.push(m.span);
            }
            _ => self.protected.extend(m.markers),
        }
    }
}

/// Styled runs of one line, in absolute offsets.
pub fn style_runs_in_line(text: &str, base: usize, styles: &[InlineStyle]) -> Vec<EmphasisRun> {
    let mut sink = ClearableSpans::default();
    scan::scan_line(text, 0, None, &mut sink);
    let chars: Vec<char> = text.chars().collect();
    let mut runs = scan_emphasis(&chars, &sink.protected, styles);
    if styles.contains(&InlineStyle::Code) {
        runs.extend(sink.code);
    }
    for run in &mut runs {
        run.open = base + run.open.start..base + run.open.end;
        run.close = base + run.close.start..base + run.close.end;
    }
    runs.sort_by_key(|r| (r.open.start, r.close.end));
    runs
}

/// `(line_start, text)` for every line touching `from..to`.
fn lines_touching<E: SourceEditor + ?Sized>(editor: &E, from: usize, to: usize) -> Vec<(usize, String)> {
    let len = editor.len_chars();
    let mut out = Vec::new();
    let mut start = find_line_start(editor, from);
    loop {
        let end = find_line_end(editor, start);
        let text = editor.slice(start, end).map(|s| s.to_string()).unwrap_or_default();
        out.push((start, text));
        if end >= to || end >= len {
            break;
        }
        start = end + 1;
    }
    out
}

fn runs_touching<E: SourceEditor + ?Sized>(
    editor: &E,
    from: usize,
    to: usize,
    styles: &[InlineStyle],
) -> Vec<EmphasisRun> {
    lines_touching(editor, from, to)
        .into_iter()
        .flat_map(|(start, text)| style_runs_in_line(&text, start, styles))
        .collect()
}

/// Whether `style` applies to all of `range` (or around a caret).
pub fn is_inline_style_active<E: SourceEditor + ?Sized>(
    editor: &E,
    range: Range<usize>,
    style: InlineStyle,
) -> bool {
    let runs = runs_touching(editor, range.start, range.end, &[style]);
    if range.is_empty() {
        return runs
            .iter()
            .any(|r| r.content().start <= range.start && range.start <= r.content().end);
    }
    let mut any = false;
    for (start, text) in lines_touching(editor, range.start, range.end) {
        let end = start + text.chars().count();
        let a = range.start.max(start);
        let b = range.end.min(end);
        if a >= b {
            continue;
        }
        any = true;
        if !runs.iter().any(|r| r.content().start <= a && b <= r.content().end) {
            return false;
        }
    }
    any
}

fn delete_markers<E: SourceEditor + ?Sized>(
    editor: &mut E,
    runs: &[EmphasisRun],
) -> Result<Option<EditorUpdate>, CoreError> {
    let mut ranges: Vec<Range<usize>> = runs
        .iter()
        .flat_map(|r| [r.open.clone(), r.close.clone()])
        .collect();
    ranges.sort_by_key(|r| r.start);
    ranges.dedup();
    if ranges.is_empty() {
        return Ok(None);
    }
    let changes = ranges
        .into_iter()
        .map(|r| ChangeSpec::delete(r.start, r.end))
        .collect();
    editor.apply(Transaction::new(changes)).map(Some)
}

/// Toggle `style` on the selection, or on the word around a caret.
///
/// An active style is removed by deleting the markers of every run covering
/// the range. Otherwise the range is wrapped, one pair of markers per line.
pub fn toggle_inline_style<E: SourceEditor + ?Sized>(
    editor: &mut E,
    style: InlineStyle,
) -> Result<Option<EditorUpdate>, CoreError> {
    let sel = editor.selection();
    let (from, to) = word_range_at(editor, sel.start(), sel.end());

    if is_inline_style_active(editor, from..to, style) {
        let runs: Vec<EmphasisRun> = runs_touching(editor, from, to, &[style])
            .into_iter()
            .filter(|r| {
                let c = r.content();
                if from == to {
                    c.start <= from && from <= c.end
                } else {
                    c.start < to && from < c.end
                }
            })
            .collect();
        return delete_markers(editor, &runs);
    }

    let marker = style.marker();
    let m = marker.chars().count();
    if from == to {
        let tx = Transaction::new(vec![ChangeSpec::insert(from, format!("{marker}{marker}"))])
            .with_selection(Selection::collapsed(from + m));
        return editor.apply(tx).map(Some);
    }

    let mut changes = Vec::new();
    for (start, text) in lines_touching(editor, from, to) {
        let end = start + text.chars().count();
        let a = from.max(start);
        let b = to.min(end);
        if a < b {
            changes.push(ChangeSpec::insert(a, marker));
            changes.push(ChangeSpec::insert(b, marker));
        }
    }
    let pairs = changes.len() / 2;
    let new_start = from + m;
    let new_end = to + m * (2 * pairs).saturating_sub(1);
    let selection = if sel.is_backwards() {
        Selection::new(new_end, new_start)
    } else {
        Selection::new(new_start, new_end)
    };
    editor
        .apply(Transaction::new(changes).with_selection(selection))
        .map(Some)
}

/// Remove the markers of every inline style touching the selection.
pub fn clear_formatting<E: SourceEditor + ?Sized>(
    editor: &mut E,
) -> Result<Option<EditorUpdate>, CoreError> {
    let sel = editor.selection();
    let (from, to) = word_range_at(editor, sel.start(), sel.end());
    let runs: Vec<EmphasisRun> = runs_touching(editor, from, to, &InlineStyle::ALL)
        .into_iter()
        .filter(|r| {
            let span = r.span();
            if from == to {
                span.start <= from && from <= span.end
            } else {
                span.start < to && from < span.end
            }
        })
        .collect();
    tracing::debug!(target: "tategaki::editor", runs = runs.len(), "clear formatting");
    delete_markers(editor, &runs)
}

/// Wrap the selection as `｜base《reading》`. Multi-line selections are left alone.
pub fn insert_ruby<E: SourceEditor + ?Sized>(
    editor: &mut E,
    reading: &str,
) -> Result<Option<EditorUpdate>, CoreError> {
    let sel = editor.selection();
    let reading = reading.trim();
    if sel.is_collapsed() || reading.is_empty() {
        return Ok(None);
    }
    let base = editor.selected_text();
    if base.contains('\n') {
        return Ok(None);
    }
    let insert = SmolStr::from(format!("｜{base}《{reading}》"));
    let caret = sel.start() + insert.chars().count();
    let tx = Transaction::new(vec![ChangeSpec::new(sel.start(), sel.end(), insert)])
        .with_selection(Selection::collapsed(caret));
    editor.apply(tx).map(Some)
}

/// Replace every ruby annotation touching the selection by its base text.
pub fn clear_ruby<E: SourceEditor + ?Sized>(
    editor: &mut E,
) -> Result<Option<EditorUpdate>, CoreError> {
    let sel = editor.selection();
    let (from, to) = (sel.start(), sel.end());
    let mut changes = Vec::new();
    for (start, text) in lines_touching(editor, from, to) {
        let chars: Vec<char> = text.chars().collect();
        for m in find_ruby(&text, &code_span_ranges(&text)) {
            let span = start + m.span.start..start + m.span.end;
            let touches = if from == to {
                span.start <= from && from <= span.end
            } else {
                span.start < to && from < span.end
            };
            if touches {
                let base: String = chars[m.base.clone()].iter().collect();
                changes.push(ChangeSpec::new(span.start, span.end, base));
            }
        }
    }
    if changes.is_empty() {
        return Ok(None);
    }
    editor.apply(Transaction::new(changes)).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PlainEditor;

    fn editor(text: &str, anchor: usize, head: usize) -> PlainEditor {
        let mut e = PlainEditor::from_text(text);
        e.set_selection(Selection::new(anchor, head));
        e
    }

    #[test]
    fn test_toggle_bold_wraps_selection() {
        let mut e = editor("hello world", 0, 5);
        toggle_inline_style(&mut e, InlineStyle::Bold).unwrap();
        assert_eq!(e.doc(), "**hello** world");
        assert_eq!(e.selection(), Selection::new(2, 7));
        assert!(is_inline_style_active(&e, 2..7, InlineStyle::Bold));
    }

    #[test]
    fn test_toggle_twice_restores() {
        let mut e = editor("hello world", 6, 11);
        toggle_inline_style(&mut e, InlineStyle::Strike).unwrap();
        assert_eq!(e.doc(), "hello ~~world~~");
        toggle_inline_style(&mut e, InlineStyle::Strike).unwrap();
        assert_eq!(e.doc(), "hello world");
        assert_eq!(e.selection(), Selection::new(6, 11));
    }

    #[test]
    fn test_toggle_caret_uses_word() {
        let mut e = editor("縦書き text", 6, 6);
        toggle_inline_style(&mut e, InlineStyle::Italic).unwrap();
        assert_eq!(e.doc(), "縦書き *text*");
    }

    #[test]
    fn test_toggle_on_empty_inserts_pair() {
        let mut e = editor("a  b", 2, 2);
        toggle_inline_style(&mut e, InlineStyle::Code).unwrap();
        assert_eq!(e.doc(), "a `` b");
        assert_eq!(e.selection(), Selection::collapsed(3));
    }

    #[test]
    fn test_toggle_multiline_wraps_each_line() {
        let mut e = editor("ab\ncd", 0, 5);
        toggle_inline_style(&mut e, InlineStyle::Highlight).unwrap();
        assert_eq!(e.doc(), "==ab==\n==cd==");
        assert_eq!(e.selection(), Selection::new(2, 11));
    }

    #[test]
    fn test_clear_formatting_each_style() {
        for style in InlineStyle::ALL {
            let m = style.marker();
            let text = format!("x {m}styled{m} y");
            let open = 2 + m.chars().count();
            let mut e = editor(&text, open, open + 6);
            assert!(is_inline_style_active(&e, open..open + 6, style), "{style:?}");
            clear_formatting(&mut e).unwrap();
            assert_eq!(e.doc(), "x styled y", "{style:?}");
            assert!(!is_inline_style_active(&e, 2..8, style), "{style:?}");
        }
    }

    #[test]
    fn test_clear_formatting_nested() {
        let mut e = editor("***both***", 3, 7);
        clear_formatting(&mut e).unwrap();
        assert_eq!(e.doc(), "both");
    }

    #[test]
    fn test_clear_formatting_ignores_link_syntax() {
        let mut e = editor("[a_b](x_y)", 1, 4);
        assert!(clear_formatting(&mut e).unwrap().is_none());
        assert_eq!(e.doc(), "[a_b](x_y)");
    }

    #[test]
    fn test_ruby_insert_and_clear() {
        let mut e = editor("漢字", 0, 2);
        insert_ruby(&mut e, "かんじ").unwrap();
        assert_eq!(e.doc(), "｜漢字《かんじ》");
        assert_eq!(e.selection(), Selection::collapsed(8));
        clear_ruby(&mut e).unwrap();
        assert_eq!(e.doc(), "漢字");
    }

    #[test]
    fn test_clear_ruby_only_touching() {
        let mut e = editor("｜青《あお》と｜赤《あか》", 2, 2);
        clear_ruby(&mut e).unwrap();
        assert_eq!(e.doc(), "青と｜赤《あか》");
    }

    #[test]
    fn test_insert_ruby_requires_selection() {
        let mut e = editor("漢字", 1, 1);
        assert!(insert_ruby(&mut e, "かん").unwrap().is_none());
        assert_eq!(e.doc(), "漢字");
    }
}
