//! Text navigation and analysis helpers.
//!
//! These functions work with the `SourceEditor` trait to provide
//! common text operations like finding line boundaries and word boundaries.

use crate::document::SourceEditor;

/// Find start of line containing offset.
pub fn find_line_start<E: SourceEditor + ?Sized>(editor: &E, offset: usize) -> usize {
    let mut pos = offset.min(editor.len_chars());
    while pos > 0 {
        if let Some('\n') = editor.char_at(pos - 1) {
            return pos;
        }
        pos -= 1;
    }
    0
}

/// Find end of line containing offset (position of newline or end of doc).
pub fn find_line_end<E: SourceEditor + ?Sized>(editor: &E, offset: usize) -> usize {
    let len = editor.len_chars();
    let mut pos = offset.min(len);
    while pos < len {
        if let Some('\n') = editor.char_at(pos) {
            return pos;
        }
        pos += 1;
    }
    len
}

/// Character class used for word movement. Kana, kanji and latin words
/// are separate classes so that mixed Japanese text stops at script changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WordClass {
    Space,
    Punct,
    Latin,
    Han,
    Hiragana,
    Katakana,
}

fn word_class(c: char) -> WordClass {
    match c {
        c if c.is_whitespace() || c == '\u{3000}' => WordClass::Space,
        '\u{3041}'..='\u{309F}' => WordClass::Hiragana,
        '\u{30A0}'..='\u{30FF}' | '\u{31F0}'..='\u{31FF}' => WordClass::Katakana,
        c if is_han(c) => WordClass::Han,
        c if c.is_alphanumeric() || c == '_' => WordClass::Latin,
        _ => WordClass::Punct,
    }
}

/// Whether `c` is a CJK ideograph (including the iteration mark 々).
pub fn is_han(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'
        | '\u{3400}'..='\u{4DBF}'
        | '\u{F900}'..='\u{FAFF}'
        | '\u{20000}'..='\u{2A6DF}'
        | '\u{3005}'
        | '\u{3007}'
        | '\u{303B}'
    )
}

/// Find word boundary backward from cursor.
pub fn find_word_boundary_backward<E: SourceEditor + ?Sized>(editor: &E, cursor: usize) -> usize {
    let mut pos = cursor.min(editor.len_chars());

    // Skip any whitespace immediately before cursor.
    while pos > 0 {
        match editor.char_at(pos - 1) {
            Some(c) if word_class(c) == WordClass::Space && c != '\n' => pos -= 1,
            _ => break,
        }
    }

    let Some(class) = pos.checked_sub(1).and_then(|p| editor.char_at(p)).map(word_class) else {
        return pos;
    };
    if class == WordClass::Space {
        // A newline: delete just that.
        return pos - 1;
    }
    while pos > 0 {
        match editor.char_at(pos - 1) {
            Some(c) if word_class(c) == class => pos -= 1,
            _ => break,
        }
    }
    pos
}

/// Find word boundary forward from cursor.
pub fn find_word_boundary_forward<E: SourceEditor + ?Sized>(editor: &E, cursor: usize) -> usize {
    let len = editor.len_chars();
    let mut pos = cursor.min(len);

    let Some(class) = editor.char_at(pos).map(word_class) else {
        return pos;
    };
    if class == WordClass::Space {
        while pos < len {
            match editor.char_at(pos) {
                Some(c) if word_class(c) == WordClass::Space && c != '\n' => pos += 1,
                Some('\n') if pos == cursor => return pos + 1,
                _ => break,
            }
        }
        return pos;
    }
    while pos < len {
        match editor.char_at(pos) {
            Some(c) if word_class(c) == class => pos += 1,
            _ => break,
        }
    }
    pos
}

/// Describes what kind of list item the cursor is in, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListContext {
    /// Unordered list with the given marker char ('-', '*' or '+') and indentation.
    Unordered { indent: String, marker: char },
    /// Task list item; continues as an unchecked task.
    Task { indent: String, marker: char },
    /// Ordered list with the current number and indentation.
    Ordered { indent: String, number: usize },
}

impl ListContext {
    /// Text inserted after the newline to continue the list.
    pub fn continuation(&self) -> String {
        match self {
            ListContext::Unordered { indent, marker } => format!("{}{} ", indent, marker),
            ListContext::Task { indent, marker } => format!("{}{} [ ] ", indent, marker),
            ListContext::Ordered { indent, number } => format!("{}{}. ", indent, number + 1),
        }
    }

    /// Char length of the marker prefix of the current line.
    fn prefix_len(&self) -> usize {
        match self {
            ListContext::Unordered { indent, .. } => indent.chars().count() + 2,
            ListContext::Task { indent, .. } => indent.chars().count() + 6,
            ListContext::Ordered { indent, number } => {
                indent.chars().count() + number.to_string().len() + 2
            }
        }
    }
}

/// Detect if the line holding `cursor_offset` is a list item.
pub fn detect_list_context<E: SourceEditor + ?Sized>(
    editor: &E,
    cursor_offset: usize,
) -> Option<ListContext> {
    let line_start = find_line_start(editor, cursor_offset);
    let line_end = find_line_end(editor, cursor_offset);
    if line_start >= line_end {
        return None;
    }
    let line = editor.slice(line_start, line_end)?;
    list_context_for_line(&line)
}

/// Detect a list marker at the start of `line`.
pub fn list_context_for_line(line: &str) -> Option<ListContext> {
    let indent: String = line
        .chars()
        .take_while(|c| *c == ' ' || *c == '\t')
        .collect();
    let trimmed = &line[indent.len()..];

    for marker in ['-', '*', '+'] {
        let bullet = format!("{marker} ");
        if let Some(rest) = trimmed.strip_prefix(bullet.as_str()) {
            if rest.starts_with("[ ] ") || rest.starts_with("[x] ") || rest.starts_with("[X] ") {
                return Some(ListContext::Task { indent, marker });
            }
            return Some(ListContext::Unordered { indent, marker });
        }
    }

    let dot_pos = trimmed.find(". ")?;
    let num_part = &trimmed[..dot_pos];
    if num_part.is_empty() || num_part.len() > 3 || !num_part.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let number = num_part.parse::<usize>().ok()?;
    Some(ListContext::Ordered { indent, number })
}

/// Whether the list item at `cursor_offset` has no content after its marker.
pub fn is_list_item_empty<E: SourceEditor + ?Sized>(
    editor: &E,
    cursor_offset: usize,
    ctx: &ListContext,
) -> bool {
    let line_start = find_line_start(editor, cursor_offset);
    let line_end = find_line_end(editor, cursor_offset);
    line_end.saturating_sub(line_start) <= ctx.prefix_len()
}

/// Expand a caret to the surrounding word; a non-empty range is returned as is.
pub fn word_range_at<E: SourceEditor + ?Sized>(editor: &E, from: usize, to: usize) -> (usize, usize) {
    if from != to {
        return (from, to);
    }
    let class = |pos: usize| editor.char_at(pos).map(word_class);
    let mut start = from;
    let mut end = from;
    let target = match (from.checked_sub(1).and_then(class), class(from)) {
        (_, Some(c)) if c != WordClass::Space && c != WordClass::Punct => c,
        (Some(c), _) if c != WordClass::Space && c != WordClass::Punct => c,
        _ => return (from, to),
    };
    while start > 0 && class(start - 1) == Some(target) {
        start -= 1;
    }
    while class(end) == Some(target) {
        end += 1;
    }
    (start, end)
}
