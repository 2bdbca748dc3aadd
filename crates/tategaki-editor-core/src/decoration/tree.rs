//! Optional syntax-tree source for inline emphasis.
//!
//! A provider yields typed spans over one line. The decoration engine only
//! trusts a span when its boundary text is exactly a known marker pair, so a
//! provider with a different tree shape can at worst under-hide.

use std::ops::Range;

use markdown_weaver::{Event, Options, Parser, Tag};

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxNodeKind {
    Emphasis,
    Strong,
    Strikethrough,
    Highlight,
    Code,
    Link,
    Url,
}

/// A typed span, in char offsets local to the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxNode {
    pub kind: SyntaxNodeKind,
    pub range: Range<usize>,
}

pub trait SyntaxTreeProvider {
    fn inline_nodes(&self, line: &str) -> Result<Vec<SyntaxNode>, CoreError>;
}

/// Provider backed by the markdown-weaver parser, run over a single line.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownTreeProvider;

impl SyntaxTreeProvider for MarkdownTreeProvider {
    fn inline_nodes(&self, line: &str) -> Result<Vec<SyntaxNode>, CoreError> {
        let mut byte_to_char = vec![0usize; line.len() + 1];
        let mut count = 0;
        for (b, ch) in line.char_indices() {
            for slot in &mut byte_to_char[b..b + ch.len_utf8()] {
                *slot = count;
            }
            count += 1;
        }
        byte_to_char[line.len()] = count;
        let to_char = |r: Range<usize>| {
            byte_to_char[r.start.min(line.len())]..byte_to_char[r.end.min(line.len())]
        };

        let options = Options::ENABLE_STRIKETHROUGH;
        let mut nodes = Vec::new();
        for (event, range) in Parser::new_ext(line, options).into_offset_iter() {
            let kind = match event {
                Event::Start(Tag::Emphasis) => SyntaxNodeKind::Emphasis,
                Event::Start(Tag::Strong) => SyntaxNodeKind::Strong,
                Event::Start(Tag::Strikethrough) => SyntaxNodeKind::Strikethrough,
                Event::Start(Tag::Link { .. }) => SyntaxNodeKind::Link,
                Event::Code(_) => SyntaxNodeKind::Code,
                _ => continue,
            };
            nodes.push(SyntaxNode {
                kind,
                range: to_char(range),
            });
        }
        Ok(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markdown_nodes() {
        let nodes = MarkdownTreeProvider
            .inline_nodes("漢**字** and ~~x~~")
            .unwrap();
        let kinds: Vec<_> = nodes.iter().map(|n| (n.kind, n.range.clone())).collect();
        assert!(kinds.contains(&(SyntaxNodeKind::Strong, 1..6)));
        assert!(kinds.contains(&(SyntaxNodeKind::Strikethrough, 11..16)));
    }
}
