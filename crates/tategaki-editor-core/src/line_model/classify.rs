use std::collections::BTreeSet;

use smol_str::SmolStr;

use super::refs::ReferenceTables;
use super::{BlockKind, BlockSpan, CodePart, LineInfo};
use crate::scan::{
    self, ConstructKind, footnote_definition, footnote_ids, link_reference_definition,
};
use crate::text_helpers::list_context_for_line;

/// Result of one classification pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineClassification {
    pub lines: Vec<LineInfo>,
    pub refs: ReferenceTables,
    /// Collapsed headings that still point at heading lines.
    pub collapsed: BTreeSet<usize>,
}

struct OpenFence {
    marker: char,
    len: usize,
    start: usize,
}

/// Classify every line in one forward pass.
pub fn recompute_line_block_kinds<S: AsRef<str>>(
    lines: &[S],
    collapsed: &BTreeSet<usize>,
) -> LineClassification {
    let n = lines.len();
    let mut infos: Vec<LineInfo> = Vec::with_capacity(n);
    let mut refs = ReferenceTables::default();

    let frontmatter_end = frontmatter_end(lines);
    let mut code: Option<(OpenFence, Option<SmolStr>)> = None;
    let mut math: Option<usize> = None;
    let mut callout: Option<(usize, SmolStr)> = None;
    let mut table: Option<usize> = None;
    let mut deflist: Option<usize> = None;

    let mut i = 0;
    while i < n {
        let line = lines[i].as_ref();

        if let Some(end) = frontmatter_end {
            if i <= end {
                let kind = if i == 0 || i == end {
                    BlockKind::FrontmatterFence
                } else {
                    BlockKind::Frontmatter
                };
                let mut info = LineInfo::of(kind);
                info.block = Some(BlockSpan { start: 0, end });
                infos.push(info);
                i += 1;
                continue;
            }
        }

        if let Some((fence, lang)) = &code {
            let mut info = if closes_fence(line, fence) {
                LineInfo::of(BlockKind::CodeFence)
            } else {
                LineInfo::of(BlockKind::Code)
            };
            info.code_lang = lang.clone();
            let closing = info.kind == BlockKind::CodeFence;
            let start = fence.start;
            infos.push(info);
            if closing {
                close_block(&mut infos, start, i);
                code = None;
            }
            i += 1;
            continue;
        }

        if let Some(start) = math {
            let closing = line.trim() == "$$";
            infos.push(LineInfo::of(if closing {
                BlockKind::MathFence
            } else {
                BlockKind::Math
            }));
            if closing {
                close_block(&mut infos, start, i);
                math = None;
            }
            i += 1;
            continue;
        }

        // Multi-line containers end at the first line that does not continue them.
        if let Some((start, _)) = &callout {
            if line.trim_start().starts_with('>') {
                infos.push(LineInfo::of(BlockKind::Callout));
                collect_footnotes(line, &mut refs);
                i += 1;
                continue;
            }
            close_block(&mut infos, *start, i - 1);
            callout = None;
        }
        if let Some(start) = table {
            if !line.trim().is_empty() {
                infos.push(LineInfo::of(BlockKind::TableRow));
                collect_footnotes(line, &mut refs);
                i += 1;
                continue;
            }
            close_block(&mut infos, start, i - 1);
            table = None;
        }
        if let Some(start) = deflist {
            if is_definition(line) || (line.starts_with("  ") && !line.trim().is_empty()) {
                infos.push(LineInfo::of(BlockKind::Deflist));
                collect_footnotes(line, &mut refs);
                i += 1;
                continue;
            }
            close_block(&mut infos, start, i - 1);
            deflist = None;
        }

        if let Some(fence) = open_fence(line, i) {
            let lang = fence_lang(line);
            let mut info = LineInfo::of(BlockKind::CodeFence);
            info.code_lang = lang.clone();
            infos.push(info);
            code = Some((fence, lang));
            i += 1;
            continue;
        }

        let trimmed = line.trim();
        if trimmed == "$$" {
            infos.push(LineInfo::of(BlockKind::MathFence));
            math = Some(i);
            i += 1;
            continue;
        }
        if trimmed.len() > 4 && trimmed.starts_with("$$") && trimmed.ends_with("$$") {
            let mut info = LineInfo::of(BlockKind::Math);
            info.block = Some(BlockSpan { start: i, end: i });
            infos.push(info);
            i += 1;
            continue;
        }

        if let Some(level) = heading_level(line) {
            let mut info = LineInfo::of(BlockKind::Heading);
            info.heading_level = Some(level);
            infos.push(info);
            collect_footnotes(line, &mut refs);
            i += 1;
            continue;
        }

        if let Some(kind) = callout_type(line) {
            let mut info = LineInfo::of(BlockKind::CalloutTitle);
            info.callout_type = Some(kind.clone());
            infos.push(info);
            callout = Some((i, kind));
            collect_footnotes(line, &mut refs);
            i += 1;
            continue;
        }

        if let Some(next) = lines.get(i + 1) {
            if is_table_header(line) && is_table_separator(next.as_ref()) {
                infos.push(LineInfo::of(BlockKind::TableRow));
                infos.push(LineInfo::of(BlockKind::TableSep));
                collect_footnotes(line, &mut refs);
                table = Some(i);
                i += 2;
                continue;
            }
            if !trimmed.is_empty()
                && !is_definition(line)
                && is_definition(next.as_ref())
                && list_context_for_line(line).is_none()
            {
                infos.push(LineInfo::of(BlockKind::Deflist));
                deflist = Some(i);
                collect_footnotes(line, &mut refs);
                i += 1;
                continue;
            }
        }

        let kind = if line.trim_start().starts_with('>') {
            BlockKind::Blockquote
        } else if let Some(ctx) = list_context_for_line(line) {
            match ctx {
                crate::text_helpers::ListContext::Task { .. } => BlockKind::Task,
                crate::text_helpers::ListContext::Ordered { .. } => BlockKind::OList,
                crate::text_helpers::ListContext::Unordered { .. } => BlockKind::List,
            }
        } else if let Some(kind) = media_line_kind(line) {
            kind
        } else {
            BlockKind::Normal
        };
        let mut info = LineInfo::of(kind);
        if matches!(kind, BlockKind::Image | BlockKind::Embed) {
            info.block = Some(BlockSpan { start: i, end: i });
        }
        infos.push(info);

        if let Some((id, text)) = footnote_definition(line) {
            refs.footnotes.define(&id, i, text);
        } else if let Some((label, url)) = link_reference_definition(line) {
            refs.links.insert(label, url);
        }
        collect_footnotes(line, &mut refs);
        i += 1;
    }

    // Unterminated blocks run to the end of the document.
    let last = n.saturating_sub(1);
    if let Some((fence, _)) = &code {
        close_block(&mut infos, fence.start, last);
    }
    if let Some(start) = math {
        close_block(&mut infos, start, last);
    }
    for start in [callout.map(|(s, _)| s), table, deflist].into_iter().flatten() {
        close_block(&mut infos, start, last);
    }

    assign_code_parts(&mut infos);
    assign_heading_sections(&mut infos);
    let collapsed = apply_folds(&mut infos, collapsed);

    tracing::trace!(
        target: "tategaki::line_model",
        lines = n,
        footnotes = refs.footnotes.len(),
        link_refs = refs.links.len(),
        collapsed = collapsed.len(),
        "classified lines"
    );

    LineClassification {
        lines: infos,
        refs,
        collapsed,
    }
}

fn close_block(infos: &mut [LineInfo], start: usize, end: usize) {
    let span = BlockSpan { start, end };
    let Some(block) = infos.get_mut(start..=end.min(infos.len().saturating_sub(1))) else {
        return;
    };
    for info in block {
        if info.base_kind.has_block() {
            info.block = Some(span);
        }
    }
}

fn collect_footnotes(line: &str, refs: &mut ReferenceTables) {
    for id in footnote_ids(line) {
        refs.footnotes.note(&id);
    }
}

/// Closing index of a frontmatter block starting at line 0, if it is closed.
fn frontmatter_end<S: AsRef<str>>(lines: &[S]) -> Option<usize> {
    if lines.first()?.as_ref().trim_end() != "---" {
        return None;
    }
    lines
        .iter()
        .enumerate()
        .skip(1)
        .find(|(_, l)| matches!(l.as_ref().trim_end(), "---" | "..."))
        .map(|(i, _)| i)
}

fn leading_spaces(line: &str) -> usize {
    line.chars().take_while(|c| *c == ' ').count()
}

fn open_fence(line: &str, start: usize) -> Option<OpenFence> {
    let indent = leading_spaces(line);
    if indent > 3 {
        return None;
    }
    let rest = &line[indent..];
    let marker = rest.chars().next()?;
    if marker != '`' && marker != '~' {
        return None;
    }
    let len = rest.chars().take_while(|c| *c == marker).count();
    if len < 3 {
        return None;
    }
    if marker == '`' && rest[len..].contains('`') {
        return None;
    }
    Some(OpenFence { marker, len, start })
}

fn closes_fence(line: &str, fence: &OpenFence) -> bool {
    let indent = leading_spaces(line);
    if indent > 3 {
        return false;
    }
    let rest = &line[indent..];
    let len = rest.chars().take_while(|c| *c == fence.marker).count();
    len >= fence.len && rest[len * fence.marker.len_utf8()..].trim().is_empty()
}

fn fence_lang(line: &str) -> Option<SmolStr> {
    let info = line.trim_start().trim_start_matches(['`', '~']).trim();
    let lang = info.split(|c: char| c.is_whitespace() || c == '{').next()?;
    (!lang.is_empty()).then(|| SmolStr::new(lang))
}

fn heading_level(line: &str) -> Option<u8> {
    if leading_spaces(line) > 3 {
        return None;
    }
    let rest = line.trim_start_matches(' ');
    let level = rest.chars().take_while(|c| *c == '#').count();
    if !(1..=6).contains(&level) {
        return None;
    }
    match rest[level..].chars().next() {
        None | Some(' ') | Some('\t') => Some(level as u8),
        _ => None,
    }
}

fn callout_type(line: &str) -> Option<SmolStr> {
    let rest = line.trim_start().strip_prefix('>')?.trim_start();
    let rest = rest.strip_prefix("[!")?;
    let end = rest.find(']')?;
    let kind = &rest[..end];
    if kind.is_empty() || kind.contains(char::is_whitespace) {
        return None;
    }
    Some(SmolStr::new(kind.to_lowercase()))
}

fn is_table_header(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && (trimmed.starts_with('|') || !scan::table_split_points(line).is_empty())
}

/// `|---|:--:|` style separator row.
pub(crate) fn is_table_separator(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.contains('|')
        && trimmed.contains('-')
        && trimmed
            .split('|')
            .map(str::trim)
            .filter(|cell| !cell.is_empty())
            .all(|cell| {
                let inner = cell.trim_start_matches(':').trim_end_matches(':');
                !inner.is_empty() && inner.chars().all(|c| c == '-')
            })
}

fn is_definition(line: &str) -> bool {
    line.starts_with(": ") || line.starts_with(":\t")
}

fn media_line_kind(line: &str) -> Option<BlockKind> {
    let trimmed = line.trim();
    if !trimmed.starts_with('!') {
        return None;
    }
    let mut matches = Vec::new();
    scan::scan_line(trimmed, 0, None, &mut matches);
    let [only] = matches.as_slice() else {
        return None;
    };
    if only.span != (0..trimmed.chars().count()) {
        return None;
    }
    match only.kind {
        ConstructKind::Image | ConstructKind::WikiImageEmbed => Some(BlockKind::Image),
        ConstructKind::WikiEmbed => Some(BlockKind::Embed),
        _ => None,
    }
}

fn assign_code_parts(infos: &mut [LineInfo]) {
    let mut i = 0;
    while i < infos.len() {
        if infos[i].base_kind != BlockKind::Code {
            i += 1;
            continue;
        }
        let start = i;
        while i < infos.len() && infos[i].base_kind == BlockKind::Code {
            i += 1;
        }
        let end = i - 1;
        for (j, info) in infos[start..=end].iter_mut().enumerate() {
            let line = start + j;
            info.code_part = Some(if start == end {
                CodePart::Single
            } else if line == start {
                CodePart::Start
            } else if line == end {
                CodePart::End
            } else {
                CodePart::Middle
            });
        }
    }
}

fn assign_heading_sections(infos: &mut [LineInfo]) {
    let last = infos.len().saturating_sub(1);
    let mut open: Vec<(usize, u8)> = Vec::new();
    for i in 0..infos.len() {
        let Some(level) = infos[i].heading_level else {
            continue;
        };
        while let Some(&(h, l)) = open.last() {
            if l < level {
                break;
            }
            infos[h].section_end = Some(i - 1);
            open.pop();
        }
        open.push((i, level));
    }
    for (h, _) in open {
        infos[h].section_end = Some(last);
    }
}

fn apply_folds(infos: &mut [LineInfo], collapsed: &BTreeSet<usize>) -> BTreeSet<usize> {
    let valid: BTreeSet<usize> = collapsed
        .iter()
        .copied()
        .filter(|&h| infos.get(h).is_some_and(|info| info.heading_level.is_some()))
        .collect();
    for &h in &valid {
        // An outer fold already hides this heading's body.
        if infos[h].hidden_by.is_some() {
            continue;
        }
        let Some(end) = infos[h].section_end else {
            continue;
        };
        for info in &mut infos[h + 1..=end] {
            if info.hidden_by.is_none() {
                info.hidden_by = Some(h);
                info.kind = BlockKind::HeadingHidden;
            }
        }
    }
    valid
}
