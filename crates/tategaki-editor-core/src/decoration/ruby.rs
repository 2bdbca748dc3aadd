//! Aozora-style ruby: `｜base《reading》`, `|base《reading》` and implicit
//! ruby over a run of kanji directly before `《`.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use smol_str::SmolStr;

static EXPLICIT_RUBY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"[｜|]([^｜|《》]+?)《([^《》]+)》").ok());

static IMPLICIT_RUBY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"([\p{Han}々〆〇ヶ]+)《([^《》]+)》").ok());

/// One ruby annotation, in char offsets local to the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RubyMatch {
    pub span: Range<usize>,
    /// The `｜` or `|` delimiter; `None` for implicit ruby.
    pub delimiter: Option<Range<usize>>,
    pub base: Range<usize>,
    pub open: Range<usize>,
    pub reading: Range<usize>,
    pub close: Range<usize>,
    pub reading_text: SmolStr,
}

impl RubyMatch {
    /// Source ranges hidden in decorated mode.
    pub fn hidden(&self) -> Vec<Range<usize>> {
        self.delimiter
            .iter()
            .cloned()
            .chain([self.open.clone(), self.reading.clone(), self.close.clone()])
            .collect()
    }
}

fn char_index(text: &str, byte: usize) -> usize {
    text[..byte].chars().count()
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

/// Find ruby annotations, skipping any that overlap `blocked` (code spans and
/// other constructs) or an earlier match.
pub fn find_ruby(text: &str, blocked: &[Range<usize>]) -> Vec<RubyMatch> {
    let mut out: Vec<RubyMatch> = Vec::new();
    if !text.contains('《') {
        return out;
    }
    let explicit = EXPLICIT_RUBY.as_ref().into_iter().flat_map(|re| {
        re.captures_iter(text).filter_map(|caps| {
            let whole = caps.get(0)?;
            let base = caps.get(1)?;
            let reading = caps.get(2)?;
            Some((whole.range(), Some(whole.start()..base.start()), base.range(), reading.range()))
        })
    });
    let implicit = IMPLICIT_RUBY.as_ref().into_iter().flat_map(|re| {
        re.captures_iter(text).filter_map(|caps| {
            let whole = caps.get(0)?;
            let base = caps.get(1)?;
            let reading = caps.get(2)?;
            Some((whole.range(), None, base.range(), reading.range()))
        })
    });

    let mut candidates: Vec<_> = explicit
        .chain(implicit)
        .map(|(whole, delim, base, reading)| {
            let c = |b: usize| char_index(text, b);
            let span = c(whole.start)..c(whole.end);
            let base_c = c(base.start)..c(base.end);
            let reading_c = c(reading.start)..c(reading.end);
            RubyMatch {
                delimiter: delim.map(|d| c(d.start)..c(d.end)),
                open: base_c.end..base_c.end + 1,
                close: reading_c.end..reading_c.end + 1,
                reading_text: SmolStr::new(&text[reading]),
                base: base_c,
                reading: reading_c,
                span,
            }
        })
        .collect();
    // Explicit matches sort before an implicit one starting inside their base.
    candidates.sort_by_key(|m| (m.span.start, m.delimiter.is_none()));

    for m in candidates {
        if blocked.iter().any(|b| overlaps(b, &m.span))
            || out.iter().any(|prev| overlaps(&prev.span, &m.span))
        {
            continue;
        }
        out.push(m);
    }
    out
}
