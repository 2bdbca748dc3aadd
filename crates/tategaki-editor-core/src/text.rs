//! Text buffer abstraction for the source-of-truth document.
//!
//! The `TextBuffer` trait is the only storage interface the editor model
//! talks to. `EditorRope` is the ropey-backed implementation used by
//! `PlainEditor`; hosts with their own storage can implement the trait.

use smol_str::{SmolStr, ToSmolStr};
use std::ops::Range;

use crate::types::BLOCK_SYNTAX_ZONE;

/// A text buffer that supports efficient editing and offset conversion.
///
/// All offsets are in Unicode scalar values (chars), not bytes or UTF-16.
pub trait TextBuffer {
    /// Total length in bytes (UTF-8).
    fn len_bytes(&self) -> usize;

    /// Total length in chars (Unicode scalar values).
    fn len_chars(&self) -> usize;

    /// Check if empty.
    fn is_empty(&self) -> bool {
        self.len_chars() == 0
    }

    /// Insert text at char offset.
    fn insert(&mut self, char_offset: usize, text: &str);

    /// Delete char range.
    fn delete(&mut self, char_range: Range<usize>);

    /// Replace char range with text.
    fn replace(&mut self, char_range: Range<usize>, text: &str) {
        self.delete(char_range.clone());
        self.insert(char_range.start, text);
    }

    /// Get a slice as SmolStr. Returns None if range is invalid.
    fn slice(&self, char_range: Range<usize>) -> Option<SmolStr>;

    /// Get character at offset. Returns None if out of bounds.
    fn char_at(&self, char_offset: usize) -> Option<char>;

    /// Convert entire buffer to String.
    fn to_string(&self) -> String;

    /// Convert char offset to byte offset.
    fn char_to_byte(&self, char_offset: usize) -> usize;

    /// Convert byte offset to char offset.
    fn byte_to_char(&self, byte_offset: usize) -> usize;

    /// Char offset of the start of the line containing `offset`.
    fn line_start(&self, offset: usize) -> usize {
        let mut pos = offset.min(self.len_chars());
        while pos > 0 {
            if self.char_at(pos - 1) == Some('\n') {
                return pos;
            }
            pos -= 1;
        }
        0
    }

    /// Char offset of the end of the line containing `offset` (the newline
    /// position, or the document length for the last line).
    fn line_end(&self, offset: usize) -> usize {
        let len = self.len_chars();
        let mut pos = offset.min(len);
        while pos < len {
            if self.char_at(pos) == Some('\n') {
                return pos;
            }
            pos += 1;
        }
        len
    }

    /// Check if a char offset is in the block-syntax zone (first few chars of a line).
    fn is_in_block_syntax_zone(&self, offset: usize) -> bool {
        offset.saturating_sub(self.line_start(offset)) <= BLOCK_SYNTAX_ZONE
    }
}

/// Ropey-backed text buffer.
///
/// Provides O(log n) editing operations, offset conversions and line lookups.
#[derive(Clone, Default)]
pub struct EditorRope {
    rope: ropey::Rope,
}

impl EditorRope {
    /// Create a new empty rope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from string.
    pub fn from_str(s: &str) -> Self {
        Self {
            rope: ropey::Rope::from_str(s),
        }
    }

    /// Get a reference to the underlying rope.
    pub fn rope(&self) -> &ropey::Rope {
        &self.rope
    }
}

impl TextBuffer for EditorRope {
    fn len_bytes(&self) -> usize {
        self.rope.len_bytes()
    }

    fn len_chars(&self) -> usize {
        self.rope.len_chars()
    }

    fn insert(&mut self, char_offset: usize, text: &str) {
        self.rope.insert(char_offset, text);
    }

    fn delete(&mut self, char_range: Range<usize>) {
        self.rope.remove(char_range);
    }

    fn slice(&self, char_range: Range<usize>) -> Option<SmolStr> {
        if char_range.start > char_range.end || char_range.end > self.len_chars() {
            return None;
        }
        Some(self.rope.slice(char_range).to_smolstr())
    }

    fn char_at(&self, char_offset: usize) -> Option<char> {
        if char_offset >= self.len_chars() {
            return None;
        }
        Some(self.rope.char(char_offset))
    }

    fn to_string(&self) -> String {
        self.rope.to_string()
    }

    fn char_to_byte(&self, char_offset: usize) -> usize {
        self.rope.char_to_byte(char_offset)
    }

    fn byte_to_char(&self, byte_offset: usize) -> usize {
        self.rope.byte_to_char(byte_offset)
    }

    // Ropey keeps a line index, so skip the char-by-char walk.
    fn line_start(&self, offset: usize) -> usize {
        let offset = offset.min(self.rope.len_chars());
        self.rope.line_to_char(self.rope.char_to_line(offset))
    }

    fn line_end(&self, offset: usize) -> usize {
        let len = self.rope.len_chars();
        let offset = offset.min(len);
        let line = self.rope.char_to_line(offset);
        if line + 1 >= self.rope.len_lines() {
            return len;
        }
        // Start of the next line minus its separating newline.
        self.rope.line_to_char(line + 1) - 1
    }
}

impl From<&str> for EditorRope {
    fn from(s: &str) -> Self {
        Self::from_str(s)
    }
}

impl From<String> for EditorRope {
    fn from(s: String) -> Self {
        Self::from_str(&s)
    }
}
