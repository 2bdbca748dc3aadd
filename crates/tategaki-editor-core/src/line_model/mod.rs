//! Line model: line ranges and per-line block classification.
//!
//! The buffer is split on `\n` into contiguous, gapless [`LineRange`]s. Each
//! line gets a [`LineInfo`] describing its block role, computed in one
//! forward pass by [`recompute_line_block_kinds`]. The pass never fails;
//! unterminated or malformed constructs degrade to a best guess.

mod classify;
mod refs;

use std::collections::BTreeSet;

use smol_str::SmolStr;

pub use classify::{LineClassification, recompute_line_block_kinds};
pub use refs::{FootnoteDef, FootnoteTable, LinkRefMap, ReferenceTables};

/// Half-open char range of one line, excluding its trailing `\n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LineRange {
    pub from: usize,
    pub to: usize,
}

impl LineRange {
    pub fn new(from: usize, to: usize) -> Self {
        Self { from, to }
    }

    pub fn len(&self) -> usize {
        self.to - self.from
    }

    pub fn is_empty(&self) -> bool {
        self.from == self.to
    }

    /// Whether `offset` lies on this line (end inclusive).
    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.from && offset <= self.to
    }
}

/// Compute contiguous line ranges from the lines of a buffer.
///
/// Each line's `to` is followed by exactly one `\n` before the next line's
/// `from`; the last line ends at the buffer length.
pub fn compute_line_ranges<S: AsRef<str>>(lines: &[S]) -> Vec<LineRange> {
    let mut ranges = Vec::with_capacity(lines.len());
    let mut pos = 0;
    for line in lines {
        let len = line.as_ref().chars().count();
        ranges.push(LineRange::new(pos, pos + len));
        pos += len + 1;
    }
    ranges
}

/// Split a buffer into lines. An empty buffer has one empty line.
pub fn split_lines(doc: &str) -> Vec<&str> {
    doc.split('\n').collect()
}

/// Block classification of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BlockKind {
    #[default]
    Normal,
    Heading,
    List,
    Task,
    OList,
    Blockquote,
    Code,
    CodeFence,
    Math,
    MathFence,
    Callout,
    CalloutTitle,
    TableRow,
    TableSep,
    Deflist,
    Frontmatter,
    FrontmatterFence,
    /// A line holding only an image.
    Image,
    /// A line holding only a wiki embed.
    Embed,
    /// Inside a collapsed heading section.
    HeadingHidden,
}

impl BlockKind {
    /// Value of the `data-md-kind` attribute.
    pub fn as_str(self) -> &'static str {
        match self {
            BlockKind::Normal => "normal",
            BlockKind::Heading => "heading",
            BlockKind::List => "list",
            BlockKind::Task => "task",
            BlockKind::OList => "olist",
            BlockKind::Blockquote => "blockquote",
            BlockKind::Code => "code",
            BlockKind::CodeFence => "code-fence",
            BlockKind::Math => "math",
            BlockKind::MathFence => "math-fence",
            BlockKind::Callout => "callout",
            BlockKind::CalloutTitle => "callout-title",
            BlockKind::TableRow => "table-row",
            BlockKind::TableSep => "table-sep",
            BlockKind::Deflist => "deflist",
            BlockKind::Frontmatter => "frontmatter",
            BlockKind::FrontmatterFence => "frontmatter-fence",
            BlockKind::Image => "image",
            BlockKind::Embed => "embed",
            BlockKind::HeadingHidden => "heading-hidden",
        }
    }

    /// Kinds that render as one block widget while the caret is outside them.
    pub fn is_widget_block(self) -> bool {
        matches!(
            self,
            BlockKind::Math
                | BlockKind::MathFence
                | BlockKind::Callout
                | BlockKind::CalloutTitle
                | BlockKind::TableRow
                | BlockKind::TableSep
                | BlockKind::Deflist
                | BlockKind::Image
                | BlockKind::Embed
        )
    }

    /// Kinds whose text is shown verbatim, without inline decoration.
    pub fn is_verbatim(self) -> bool {
        matches!(
            self,
            BlockKind::Code
                | BlockKind::CodeFence
                | BlockKind::Math
                | BlockKind::MathFence
                | BlockKind::Frontmatter
                | BlockKind::FrontmatterFence
        )
    }

    /// Kinds whose block extent is tracked in [`LineInfo::block`].
    fn has_block(self) -> bool {
        self.is_widget_block()
            || matches!(
                self,
                BlockKind::Code
                    | BlockKind::CodeFence
                    | BlockKind::Frontmatter
                    | BlockKind::FrontmatterFence
            )
    }
}

/// Position of a body line inside a fenced code block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodePart {
    Start,
    Middle,
    End,
    Single,
}

impl CodePart {
    pub fn as_str(self) -> &'static str {
        match self {
            CodePart::Start => "start",
            CodePart::Middle => "middle",
            CodePart::End => "end",
            CodePart::Single => "single",
        }
    }
}

/// Inclusive line-index extent of a multi-line block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockSpan {
    pub start: usize,
    pub end: usize,
}

impl BlockSpan {
    pub fn contains(&self, line: usize) -> bool {
        line >= self.start && line <= self.end
    }
}

/// Classification of one line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct LineInfo {
    /// Effective kind (`HeadingHidden` when folded away).
    pub kind: BlockKind,
    /// Kind before folding was applied.
    pub base_kind: BlockKind,
    /// 1..=6 for headings.
    pub heading_level: Option<u8>,
    /// Last line of a heading's section.
    pub section_end: Option<usize>,
    /// Collapsed heading hiding this line.
    pub hidden_by: Option<usize>,
    pub code_lang: Option<SmolStr>,
    pub code_part: Option<CodePart>,
    pub callout_type: Option<SmolStr>,
    pub block: Option<BlockSpan>,
}

impl LineInfo {
    fn of(kind: BlockKind) -> Self {
        Self {
            kind,
            base_kind: kind,
            ..Default::default()
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden_by.is_some()
    }
}

/// Heading entry for outline extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    pub line: usize,
    pub level: u8,
    pub text: String,
}

/// Derived projection of the whole buffer: line texts, ranges and classification.
#[derive(Debug, Clone, Default)]
pub struct LineModel {
    texts: Vec<String>,
    ranges: Vec<LineRange>,
    classification: LineClassification,
    /// Set when single-line edits patched texts without reclassifying.
    stale: bool,
}

impl LineModel {
    /// Build the model for `doc` with the given collapsed headings.
    pub fn build(doc: &str, collapsed: &BTreeSet<usize>) -> Self {
        let lines = split_lines(doc);
        let ranges = compute_line_ranges(&lines);
        let classification = recompute_line_block_kinds(&lines, collapsed);
        tracing::debug!(
            target: "tategaki::line_model",
            lines = lines.len(),
            "line model rebuilt"
        );
        Self {
            texts: lines.into_iter().map(str::to_string).collect(),
            ranges,
            classification,
            stale: false,
        }
    }

    pub fn line_count(&self) -> usize {
        self.ranges.len()
    }

    pub fn ranges(&self) -> &[LineRange] {
        &self.ranges
    }

    pub fn range(&self, line: usize) -> Option<LineRange> {
        self.ranges.get(line).copied()
    }

    pub fn text(&self, line: usize) -> Option<&str> {
        self.texts.get(line).map(String::as_str)
    }

    pub fn info(&self, line: usize) -> Option<&LineInfo> {
        self.classification.lines.get(line)
    }

    pub fn infos(&self) -> &[LineInfo] {
        &self.classification.lines
    }

    pub fn refs(&self) -> &ReferenceTables {
        &self.classification.refs
    }

    pub fn collapsed(&self) -> &BTreeSet<usize> {
        &self.classification.collapsed
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Total length of the buffer the model was built from.
    pub fn doc_len(&self) -> usize {
        self.ranges.last().map(|r| r.to).unwrap_or(0)
    }

    /// Line index containing `offset` (clamped to the last line).
    pub fn line_at_offset(&self, offset: usize) -> usize {
        if self.ranges.is_empty() {
            return 0;
        }
        match self.ranges.binary_search_by(|r| r.from.cmp(&offset)) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        }
    }

    /// Reassemble the document text.
    pub fn doc(&self) -> String {
        self.texts.join("\n")
    }

    /// Rerun classification over the current texts.
    pub fn reclassify(&mut self, collapsed: &BTreeSet<usize>) {
        let lines: Vec<&str> = self.texts.iter().map(String::as_str).collect();
        self.classification = recompute_line_block_kinds(&lines, collapsed);
        self.stale = false;
    }

    /// Replace the text of one line and shift every later range by the length
    /// delta. Classification is left as is and the model is marked stale.
    pub fn patch_line(&mut self, line: usize, text: String) {
        let Some(range) = self.ranges.get(line).copied() else {
            return;
        };
        let new_len = text.chars().count();
        let delta = new_len as isize - range.len() as isize;
        self.texts[line] = text;
        self.ranges[line].to = range.from + new_len;
        if delta != 0 {
            for r in &mut self.ranges[line + 1..] {
                r.from = (r.from as isize + delta) as usize;
                r.to = (r.to as isize + delta) as usize;
            }
        }
        self.stale = true;
    }

    /// Replace lines `old_start..old_end` with `new_lines`, recomputing ranges
    /// and classification.
    pub fn splice_lines(
        &mut self,
        old_start: usize,
        old_end: usize,
        new_lines: Vec<String>,
        collapsed: &BTreeSet<usize>,
    ) {
        let old_end = old_end.min(self.texts.len());
        let old_start = old_start.min(old_end);
        self.texts.splice(old_start..old_end, new_lines);
        if self.texts.is_empty() {
            self.texts.push(String::new());
        }
        self.ranges = compute_line_ranges(&self.texts);
        self.reclassify(collapsed);
    }

    /// Headings in document order.
    pub fn outline(&self) -> Vec<OutlineEntry> {
        self.infos()
            .iter()
            .enumerate()
            .filter_map(|(line, info)| {
                let level = info.heading_level?;
                let text = self.texts[line]
                    .trim_start()
                    .trim_start_matches('#')
                    .trim()
                    .to_string();
                Some(OutlineEntry { line, level, text })
            })
            .collect()
    }

    /// First visible line at or after `line` (or before it when `forward` is false).
    pub fn nearest_visible_line(&self, line: usize, forward: bool) -> Option<usize> {
        let infos = self.infos();
        let visible = |i: usize| infos.get(i).is_some_and(|info| !info.is_hidden());
        if forward {
            (line..infos.len()).find(|&i| visible(i))
        } else {
            (0..=line.min(infos.len().saturating_sub(1)))
                .rev()
                .find(|&i| visible(i))
        }
    }
}
