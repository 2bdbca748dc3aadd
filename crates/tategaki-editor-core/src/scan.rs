//! Escape- and code-span-aware line scanner.
//!
//! One left-to-right pass over a single line recognises the bracket and
//! delimiter constructs that the decoration engine hides, and reports each
//! one to a [`ScanSink`]. Decoration (hide and style), formatting commands
//! (collect clearable spans) and tests all consume the same match stream.
//!
//! All offsets reported are absolute char offsets: the line's `base` plus
//! the char index inside the line.

use std::ops::Range;

use smol_str::SmolStr;

/// Kind of inline construct recognised by the scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstructKind {
    /// `` `code` `` with any backtick run length.
    CodeSpan,
    /// `<https://...>` or `<name@host>`.
    Autolink,
    /// `![alt](url)`
    Image,
    /// `![[file.png]]`
    WikiImageEmbed,
    /// `![[note]]`
    WikiEmbed,
    /// `[[target|alias]]`
    WikiLink,
    /// `[^id]` with a known definition.
    FootnoteRef,
    /// `[text](url)`, `[text][ref]` or `[text]` with a known reference.
    Link,
    /// `^[text]`
    InlineFootnote,
    /// `$x^2$`
    InlineMath,
    /// Backslash before ASCII punctuation.
    Escape,
}

/// One recognised construct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanMatch {
    pub kind: ConstructKind,
    /// Whole construct, markers included.
    pub span: Range<usize>,
    /// Syntax to hide in decorated mode.
    pub markers: Vec<Range<usize>>,
    /// Text that stays visible (may be empty).
    pub content: Range<usize>,
    /// Link destination, wiki target, footnote id or math source.
    pub target: Option<SmolStr>,
}

/// Receives constructs in document order.
pub trait ScanSink {
    fn push(&mut self, m: ScanMatch);
}

impl ScanSink for Vec<ScanMatch> {
    fn push(&mut self, m: ScanMatch) {
        Vec::push(self, m);
    }
}

/// Resolves references that live outside the current line.
pub trait RefResolver {
    /// URL for a normalized link reference label.
    fn link_ref(&self, label: &str) -> Option<SmolStr>;
    /// Display number for a footnote id.
    fn footnote_number(&self, id: &str) -> Option<usize>;
}

/// Normalize a reference label: trim, collapse inner whitespace, lowercase.
pub fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Whether the char at `idx` is escaped by an odd run of preceding backslashes.
pub fn is_escaped(chars: &[char], idx: usize) -> bool {
    let mut count = 0;
    let mut pos = idx;
    while pos > 0 && chars[pos - 1] == '\\' {
        count += 1;
        pos -= 1;
    }
    count % 2 == 1
}

fn run_len(chars: &[char], start: usize, c: char) -> usize {
    chars[start..].iter().take_while(|&&x| x == c).count()
}

/// If a code span opens at `start`, return the index one past its closing run.
fn code_span_end(chars: &[char], start: usize) -> Option<usize> {
    if chars.get(start) != Some(&'`') || is_escaped(chars, start) {
        return None;
    }
    if start > 0 && chars[start - 1] == '`' {
        return None;
    }
    let n = run_len(chars, start, '`');
    let mut j = start + n;
    while j < chars.len() {
        if chars[j] == '`' {
            let m = run_len(chars, j, '`');
            if m == n {
                return Some(j + m);
            }
            j += m;
        } else {
            j += 1;
        }
    }
    None
}

/// Local char ranges of every complete code span in the line.
pub fn code_span_ranges(text: &str) -> Vec<Range<usize>> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '`' {
            if let Some(end) = code_span_end(&chars, i) {
                out.push(i..end);
                i = end;
                continue;
            }
            i += run_len(&chars, i, '`');
            continue;
        }
        i += 1;
    }
    out
}

/// Column separator positions of a table row, as local char indices.
///
/// Escaped pipes and pipes inside code spans are skipped. A leading border
/// pipe is not a split point; a trailing border pipe is (the cell after it
/// is empty).
pub fn table_split_points(text: &str) -> Vec<usize> {
    let chars: Vec<char> = text.chars().collect();
    let first_content = chars.iter().position(|c| !c.is_whitespace());
    let mut points = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '`' => {
                if let Some(end) = code_span_end(&chars, i) {
                    i = end;
                    continue;
                }
                i += run_len(&chars, i, '`');
                continue;
            }
            '|' if !is_escaped(&chars, i) && Some(i) != first_content => points.push(i),
            _ => {}
        }
        i += 1;
    }
    points
}

/// Footnote ids referenced or defined on the line, in order of appearance.
pub fn footnote_ids(text: &str) -> Vec<SmolStr> {
    let chars: Vec<char> = text.chars().collect();
    let mut ids = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '`' => {
                if let Some(end) = code_span_end(&chars, i) {
                    i = end;
                    continue;
                }
                i += run_len(&chars, i, '`');
                continue;
            }
            '[' if !is_escaped(&chars, i) && chars.get(i + 1) == Some(&'^') => {
                if let Some((id, end)) = footnote_label(&chars, i) {
                    ids.push(id);
                    i = end;
                    continue;
                }
            }
            _ => {}
        }
        i += 1;
    }
    ids
}

/// Parse `[^id]` at `start`, returning the id and the index past `]`.
fn footnote_label(chars: &[char], start: usize) -> Option<(SmolStr, usize)> {
    let mut j = start + 2;
    while j < chars.len() {
        match chars[j] {
            ']' => break,
            c if c.is_whitespace() || c == '[' => return None,
            _ => j += 1,
        }
    }
    if j >= chars.len() || j == start + 2 {
        return None;
    }
    let id: String = chars[start + 2..j].iter().collect();
    Some((SmolStr::new(id), j + 1))
}

/// Parse a footnote definition line `[^id]: text`, returning id and text.
pub fn footnote_definition(line: &str) -> Option<(SmolStr, String)> {
    let trimmed = line.trim_start();
    if line.len() - trimmed.len() > 3 || !trimmed.starts_with("[^") {
        return None;
    }
    let chars: Vec<char> = trimmed.chars().collect();
    let (id, end) = footnote_label(&chars, 0)?;
    if chars.get(end) != Some(&':') {
        return None;
    }
    let text: String = chars[end + 1..].iter().collect();
    Some((id, text.trim().to_string()))
}

/// Parse a link reference definition line `[label]: url "title"`.
pub fn link_reference_definition(line: &str) -> Option<(String, SmolStr)> {
    let trimmed = line.trim_start();
    if line.len() - trimmed.len() > 3 || !trimmed.starts_with('[') || trimmed.starts_with("[^") {
        return None;
    }
    let close = trimmed.find("]:")?;
    let label = &trimmed[1..close];
    if label.trim().is_empty() || label.contains('[') || label.contains(']') {
        return None;
    }
    let rest = trimmed[close + 2..].trim();
    let url = rest.split_whitespace().next()?;
    let url = url.trim_start_matches('<').trim_end_matches('>');
    if url.is_empty() {
        return None;
    }
    Some((normalize_label(label), SmolStr::new(url)))
}

enum Step {
    Matched(ScanMatch),
    Advance(usize),
}

struct LineScanner<'a> {
    chars: &'a [char],
    base: usize,
    refs: Option<&'a dyn RefResolver>,
}

/// Scan one line and report every construct to `sink`.
pub fn scan_line<S: ScanSink + ?Sized>(
    text: &str,
    base: usize,
    refs: Option<&dyn RefResolver>,
    sink: &mut S,
) {
    let chars: Vec<char> = text.chars().collect();
    let scanner = LineScanner {
        chars: &chars,
        base,
        refs,
    };
    let mut i = 0;
    while i < chars.len() {
        match scanner.step(i) {
            Some(Step::Matched(m)) => {
                let next = m.span.end - base;
                sink.push(m);
                i = next.max(i + 1);
            }
            Some(Step::Advance(n)) => i += n.max(1),
            None => i += 1,
        }
    }
}

impl LineScanner<'_> {
    fn at(&self, i: usize) -> Option<char> {
        self.chars.get(i).copied()
    }

    fn abs(&self, r: Range<usize>) -> Range<usize> {
        self.base + r.start..self.base + r.end
    }

    fn text(&self, r: Range<usize>) -> String {
        self.chars[r].iter().collect()
    }

    fn matched(
        &self,
        kind: ConstructKind,
        span: Range<usize>,
        markers: Vec<Range<usize>>,
        content: Range<usize>,
        target: Option<String>,
    ) -> Option<Step> {
        Some(Step::Matched(ScanMatch {
            kind,
            span: self.abs(span),
            markers: markers.into_iter().map(|r| self.abs(r)).collect(),
            content: self.abs(content),
            target: target.map(SmolStr::new),
        }))
    }

    fn step(&self, i: usize) -> Option<Step> {
        let c = self.chars[i];
        if c == '\\' {
            return match self.at(i + 1) {
                Some(next) if next.is_ascii_punctuation() => self.matched(
                    ConstructKind::Escape,
                    i..i + 2,
                    vec![i..i + 1],
                    i + 1..i + 2,
                    None,
                ),
                _ => None,
            };
        }
        if is_escaped(self.chars, i) {
            return None;
        }
        match c {
            '`' => self.code_span(i),
            '<' => self.autolink(i),
            '!' if self.at(i + 1) == Some('[') => {
                if self.at(i + 2) == Some('[') {
                    self.wiki_embed(i)
                } else {
                    self.image(i)
                }
            }
            '[' if self.at(i + 1) == Some('[') => self.wiki_link(i),
            '[' if self.at(i + 1) == Some('^') => self.footnote_ref(i),
            '[' => self.link(i),
            '^' if self.at(i + 1) == Some('[') => self.inline_footnote(i),
            '$' => self.inline_math(i),
            _ => None,
        }
    }

    fn code_span(&self, i: usize) -> Option<Step> {
        let n = run_len(self.chars, i, '`');
        let Some(end) = code_span_end(self.chars, i) else {
            return Some(Step::Advance(n));
        };
        self.matched(
            ConstructKind::CodeSpan,
            i..end,
            vec![i..i + n, end - n..end],
            i + n..end - n,
            None,
        )
    }

    /// Matching `]` for the `[` at `open`, depth counted, skipping escapes and code spans.
    fn close_bracket(&self, open: usize) -> Option<usize> {
        self.close_delim(open, '[', ']')
    }

    fn close_paren(&self, open: usize) -> Option<usize> {
        self.close_delim(open, '(', ')')
    }

    fn close_delim(&self, open: usize, left: char, right: char) -> Option<usize> {
        let mut depth = 0usize;
        let mut j = open;
        while j < self.chars.len() {
            let c = self.chars[j];
            if c == '\\' {
                j += 2;
                continue;
            }
            if c == '`' {
                if let Some(end) = code_span_end(self.chars, j) {
                    j = end;
                    continue;
                }
            }
            if c == left {
                depth += 1;
            } else if c == right {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(j);
                }
            }
            j += 1;
        }
        None
    }

    fn find_pair(&self, from: usize, c: char) -> Option<usize> {
        (from..self.chars.len().saturating_sub(1))
            .find(|&j| self.chars[j] == c && self.chars[j + 1] == c && !is_escaped(self.chars, j))
    }

    fn autolink(&self, i: usize) -> Option<Step> {
        let close = (i + 1..self.chars.len()).find(|&j| self.chars[j] == '>')?;
        let inner = self.text(i + 1..close);
        if inner.is_empty() || inner.chars().any(|c| c.is_whitespace() || c == '<') {
            return None;
        }
        let href = if is_uri(&inner) {
            inner
        } else if is_email(&inner) {
            format!("mailto:{inner}")
        } else {
            return None;
        };
        self.matched(
            ConstructKind::Autolink,
            i..close + 1,
            vec![i..i + 1, close..close + 1],
            i + 1..close,
            Some(href),
        )
    }

    fn wiki_embed(&self, i: usize) -> Option<Step> {
        let close = self.find_pair(i + 3, ']')?;
        if close == i + 3 {
            return None;
        }
        let pipe = (i + 3..close).find(|&j| self.chars[j] == '|');
        let target_end = pipe.unwrap_or(close);
        let target = self.text(i + 3..target_end);
        let kind = if is_image_path(&target) {
            ConstructKind::WikiImageEmbed
        } else {
            ConstructKind::WikiEmbed
        };
        let mut markers = vec![i..i + 3];
        if let Some(p) = pipe {
            markers.push(p..close);
        }
        markers.push(close..close + 2);
        self.matched(kind, i..close + 2, markers, i + 3..target_end, Some(target))
    }

    fn image(&self, i: usize) -> Option<Step> {
        let close = self.close_bracket(i + 1)?;
        if self.at(close + 1) != Some('(') {
            return None;
        }
        let pclose = self.close_paren(close + 1)?;
        let url = destination(&self.text(close + 2..pclose));
        self.matched(
            ConstructKind::Image,
            i..pclose + 1,
            vec![i..i + 2, close..pclose + 1],
            i + 2..close,
            Some(url),
        )
    }

    fn wiki_link(&self, i: usize) -> Option<Step> {
        let close = self.find_pair(i + 2, ']')?;
        if close == i + 2 {
            return None;
        }
        if (i + 2..close).any(|j| self.chars[j] == '[') {
            return None;
        }
        let pipe = (i + 2..close).find(|&j| self.chars[j] == '|');
        let (target, content, markers) = match pipe {
            Some(p) => (
                self.text(i + 2..p),
                p + 1..close,
                vec![i..p + 1, close..close + 2],
            ),
            None => (
                self.text(i + 2..close),
                i + 2..close,
                vec![i..i + 2, close..close + 2],
            ),
        };
        self.matched(
            ConstructKind::WikiLink,
            i..close + 2,
            markers,
            content,
            Some(target),
        )
    }

    fn footnote_ref(&self, i: usize) -> Option<Step> {
        let (id, end) = footnote_label(self.chars, i)?;
        // `[^id]:` at line start is a definition, shown as typed.
        let at_line_start = self.chars[..i].iter().all(|c| c.is_whitespace());
        if at_line_start && self.at(end) == Some(':') {
            return Some(Step::Advance(end - i));
        }
        self.refs?.footnote_number(&id)?;
        self.matched(
            ConstructKind::FootnoteRef,
            i..end,
            vec![i..end],
            end..end,
            Some(id.to_string()),
        )
    }

    fn link(&self, i: usize) -> Option<Step> {
        let close = self.close_bracket(i)?;
        if close == i + 1 {
            return None;
        }
        match self.at(close + 1) {
            Some('(') => {
                let pclose = self.close_paren(close + 1)?;
                let url = destination(&self.text(close + 2..pclose));
                self.matched(
                    ConstructKind::Link,
                    i..pclose + 1,
                    vec![i..i + 1, close..pclose + 1],
                    i + 1..close,
                    Some(url),
                )
            }
            Some('[') => {
                let rclose = (close + 2..self.chars.len()).find(|&j| self.chars[j] == ']')?;
                let label = match self.text(close + 2..rclose) {
                    l if l.trim().is_empty() => self.text(i + 1..close),
                    l => l,
                };
                let url = self.refs?.link_ref(&normalize_label(&label))?;
                self.matched(
                    ConstructKind::Link,
                    i..rclose + 1,
                    vec![i..i + 1, close..rclose + 1],
                    i + 1..close,
                    Some(url.to_string()),
                )
            }
            _ => {
                let label = normalize_label(&self.text(i + 1..close));
                let url = self.refs?.link_ref(&label)?;
                self.matched(
                    ConstructKind::Link,
                    i..close + 1,
                    vec![i..i + 1, close..close + 1],
                    i + 1..close,
                    Some(url.to_string()),
                )
            }
        }
    }

    fn inline_footnote(&self, i: usize) -> Option<Step> {
        let close = self.close_bracket(i + 1)?;
        if close == i + 2 {
            return None;
        }
        self.matched(
            ConstructKind::InlineFootnote,
            i..close + 1,
            vec![i..i + 2, close..close + 1],
            i + 2..close,
            None,
        )
    }

    fn inline_math(&self, i: usize) -> Option<Step> {
        match self.at(i + 1) {
            Some('$') => return Some(Step::Advance(2)),
            Some(c) if c.is_whitespace() => return None,
            None => return None,
            _ => {}
        }
        let mut j = i + 1;
        while j < self.chars.len() {
            let c = self.chars[j];
            if c == '`' && code_span_end(self.chars, j).is_some() {
                return None;
            }
            if c == '$'
                && !is_escaped(self.chars, j)
                && !self.chars[j - 1].is_whitespace()
                && !self.at(j + 1).is_some_and(|n| n.is_ascii_digit() || n == '$')
            {
                let source = self.text(i + 1..j);
                return self.matched(
                    ConstructKind::InlineMath,
                    i..j + 1,
                    vec![i..j + 1],
                    j + 1..j + 1,
                    Some(source),
                );
            }
            j += 1;
        }
        None
    }
}

/// First token of a link destination, without angle brackets.
fn destination(raw: &str) -> String {
    let raw = raw.trim();
    if let Some(rest) = raw.strip_prefix('<') {
        if let Some(end) = rest.find('>') {
            return rest[..end].to_string();
        }
    }
    raw.split_whitespace().next().unwrap_or("").to_string()
}

fn is_uri(s: &str) -> bool {
    let Some(colon) = s.find(':') else {
        return false;
    };
    let scheme = &s[..colon];
    (2..=32).contains(&scheme.len())
        && scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'))
}

fn is_email(s: &str) -> bool {
    let Some((user, host)) = s.split_once('@') else {
        return false;
    };
    !user.is_empty() && host.contains('.') && !host.starts_with('.') && !host.ends_with('.')
}

/// Whether a wiki embed target names an image file.
pub fn is_image_path(target: &str) -> bool {
    let lower = target.to_ascii_lowercase();
    let ext = lower.rsplit_once('.').map(|(_, e)| e).unwrap_or("");
    matches!(
        ext,
        "png" | "jpg" | "jpeg" | "gif" | "webp" | "svg" | "bmp" | "avif"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Refs {
        links: HashMap<String, SmolStr>,
        notes: HashMap<String, usize>,
    }

    impl RefResolver for Refs {
        fn link_ref(&self, label: &str) -> Option<SmolStr> {
            self.links.get(label).cloned()
        }
        fn footnote_number(&self, id: &str) -> Option<usize> {
            self.notes.get(id).copied()
        }
    }

    fn refs() -> Refs {
        Refs {
            links: HashMap::from([("home page".to_string(), SmolStr::new("https://example.com"))]),
            notes: HashMap::from([("1".to_string(), 1)]),
        }
    }

    fn scan(text: &str) -> Vec<ScanMatch> {
        let r = refs();
        let mut out = Vec::new();
        scan_line(text, 0, Some(&r), &mut out);
        out
    }

    fn kinds(text: &str) -> Vec<ConstructKind> {
        scan(text).into_iter().map(|m| m.kind).collect()
    }

    #[test]
    fn test_table_split_points_skip_escaped_pipe() {
        assert_eq!(table_split_points(r"| a | b\|c | d |"), vec![4, 11, 15]);
    }

    #[test]
    fn test_table_split_points_skip_code() {
        assert_eq!(table_split_points("a | `x|y` | b"), vec![2, 10]);
    }

    #[test]
    fn test_is_escaped_counts_backslashes() {
        let chars: Vec<char> = r"a\\[b\[".chars().collect();
        assert!(!is_escaped(&chars, 3));
        assert!(is_escaped(&chars, 6));
    }

    #[test]
    fn test_code_span_lengths() {
        assert_eq!(code_span_ranges("a ``b ` c`` d `e`"), vec![2..11, 14..17]);
        assert!(code_span_ranges("``open only`").is_empty());
    }

    #[test]
    fn test_link_inside_code_is_ignored() {
        assert_eq!(kinds("`[a](b)` [c](d)"), vec![ConstructKind::CodeSpan, ConstructKind::Link]);
    }

    #[test]
    fn test_inline_link_markers() {
        let m = &scan("see [a [b] c](http://x.y \"t\") now")[0];
        assert_eq!(m.kind, ConstructKind::Link);
        assert_eq!(m.markers, vec![4..5, 12..29]);
        assert_eq!(m.content, 5..12);
        assert_eq!(m.target.as_deref(), Some("http://x.y"));
    }

    #[test]
    fn test_reference_links_resolve() {
        let m = &scan("[Home  Page]")[0];
        assert_eq!(m.target.as_deref(), Some("https://example.com"));
        let m = &scan("[go][home page]")[0];
        assert_eq!(m.markers, vec![0..1, 3..15]);
        assert!(scan("[unknown]").is_empty());
    }

    #[test]
    fn test_image_before_link() {
        assert_eq!(kinds("![alt](a.png)"), vec![ConstructKind::Image]);
        assert_eq!(kinds("![[pic.PNG]]"), vec![ConstructKind::WikiImageEmbed]);
        assert_eq!(kinds("![[Note]]"), vec![ConstructKind::WikiEmbed]);
        // Escaped bang leaves a plain link.
        assert_eq!(
            kinds(r"\![t](u)"),
            vec![ConstructKind::Escape, ConstructKind::Link]
        );
    }

    #[test]
    fn test_wiki_link_alias() {
        let m = &scan("[[Target|shown]]")[0];
        assert_eq!(m.markers, vec![0..9, 14..16]);
        assert_eq!(m.content, 9..14);
        assert_eq!(m.target.as_deref(), Some("Target"));
    }

    #[test]
    fn test_footnotes() {
        let m = &scan("text[^1] more")[0];
        assert_eq!(m.kind, ConstructKind::FootnoteRef);
        assert_eq!(m.markers, vec![4..8]);
        assert!(scan("[^nope]").is_empty());
        assert!(scan("[^1]: definition").is_empty());
        assert_eq!(kinds("x^[inline note]"), vec![ConstructKind::InlineFootnote]);
    }

    #[test]
    fn test_inline_math() {
        let m = &scan("area $\\pi r^2$ here")[0];
        assert_eq!(m.kind, ConstructKind::InlineMath);
        assert_eq!(m.span, 5..14);
        assert_eq!(m.target.as_deref(), Some("\\pi r^2"));
        assert!(scan("costs $5 and $6").is_empty());
        assert!(scan("$$").is_empty());
    }

    #[test]
    fn test_autolinks() {
        let m = &scan("<https://a.b/c>")[0];
        assert_eq!(m.target.as_deref(), Some("https://a.b/c"));
        let m = &scan("<me@a.jp>")[0];
        assert_eq!(m.target.as_deref(), Some("mailto:me@a.jp"));
        assert!(scan("<not a link>").is_empty());
    }

    #[test]
    fn test_footnote_ids_and_definitions() {
        assert_eq!(
            footnote_ids("[^b] and `[^x]` and [^a]"),
            vec![SmolStr::new("b"), SmolStr::new("a")]
        );
        assert_eq!(
            footnote_definition("[^note]: The text."),
            Some((SmolStr::new("note"), "The text.".to_string()))
        );
        assert_eq!(
            link_reference_definition("[Home Page]: <https://example.com> \"t\""),
            Some(("home page".to_string(), SmolStr::new("https://example.com")))
        );
        assert_eq!(link_reference_definition("[^1]: x"), None);
    }

    #[test]
    fn test_offsets_are_absolute() {
        let mut out = Vec::new();
        scan_line("`c`", 100, None, &mut out);
        assert_eq!(out[0].span, 100..103);
        assert_eq!(out[0].markers, vec![100..101, 102..103]);
    }
}
