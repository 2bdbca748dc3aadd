//! Fallback emphasis scanner used when no syntax tree is available.
//!
//! Works character by character over one line. `~~` and `==` pair with the
//! next unused run of the same marker. For `*` and `_` the opener length is
//! chosen by looking ahead for a balancing closer: three, then two, then one
//! char. A triple run yields strong wrapped around emphasis.

use std::ops::Range;

use super::InlineStyle;
use crate::scan::is_escaped;

/// A paired marker run, in char offsets local to the line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmphasisRun {
    pub style: InlineStyle,
    pub open: Range<usize>,
    pub close: Range<usize>,
}

impl EmphasisRun {
    /// Whole span from opener through closer.
    pub fn span(&self) -> Range<usize> {
        self.open.start..self.close.end
    }

    pub fn content(&self) -> Range<usize> {
        self.open.end..self.close.start
    }
}

struct Scanner<'a> {
    chars: &'a [char],
    used: Vec<bool>,
}

impl Scanner<'_> {
    fn free(&self, i: usize, c: char) -> bool {
        i < self.chars.len() && !self.used[i] && self.chars[i] == c
    }

    fn run_at(&self, i: usize, c: char) -> usize {
        (i..self.chars.len()).take_while(|&j| self.free(j, c)).count()
    }

    fn mark(&mut self, r: Range<usize>) {
        for i in r {
            self.used[i] = true;
        }
    }

    /// First closing run of `c` after `from` with at least `len` chars.
    fn find_closer(&self, from: usize, c: char, len: usize) -> Option<usize> {
        let mut k = from;
        while k < self.chars.len() {
            if !self.free(k, c) || is_escaped(self.chars, k) {
                k += 1;
                continue;
            }
            let run = self.run_at(k, c);
            let prev_space = k == 0 || self.chars[k - 1].is_whitespace();
            let intraword = c == '_'
                && self
                    .chars
                    .get(k + run)
                    .is_some_and(|n| n.is_alphanumeric());
            if run >= len && !prev_space && !intraword && k > from {
                return Some(k);
            }
            k += run;
        }
        None
    }
}

/// Scan `chars` for emphasis runs of the given styles, skipping `protected`
/// ranges (code spans, link destinations, hidden markers).
pub fn scan_emphasis(
    chars: &[char],
    protected: &[Range<usize>],
    styles: &[InlineStyle],
) -> Vec<EmphasisRun> {
    let mut s = Scanner {
        chars,
        used: vec![false; chars.len()],
    };
    for r in protected {
        let end = r.end.min(chars.len());
        if r.start < end {
            s.mark(r.start..end);
        }
    }
    let wants = |style: InlineStyle| styles.contains(&style);
    let mut out = Vec::new();

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if s.used[i] || !matches!(c, '*' | '_' | '~' | '=') || is_escaped(chars, i) {
            i += 1;
            continue;
        }
        let run = s.run_at(i, c);
        let next = chars.get(i + run).copied();
        if next.is_none_or(char::is_whitespace) {
            i += run;
            continue;
        }

        match c {
            '~' | '=' => {
                let style = if c == '~' {
                    InlineStyle::Strike
                } else {
                    InlineStyle::Highlight
                };
                if run >= 2 && wants(style) {
                    let open = i + run - 2..i + run;
                    if let Some(k) = s.find_closer(open.end, c, 2) {
                        let close = k..k + 2;
                        s.mark(open.clone());
                        s.mark(close.clone());
                        out.push(EmphasisRun { style, open, close });
                    }
                }
                i += run;
            }
            _ => {
                if c == '_' && i > 0 && chars[i - 1].is_alphanumeric() {
                    i += run;
                    continue;
                }
                let mut matched = false;
                for len in (1..=run.min(3)).rev() {
                    let open_start = i + run - len;
                    let Some(k) = s.find_closer(i + run, c, len) else {
                        continue;
                    };
                    let pieces: Vec<(InlineStyle, Range<usize>, Range<usize>)> = match len {
                        3 => vec![
                            (InlineStyle::Bold, open_start..open_start + 2, k + 1..k + 3),
                            (InlineStyle::Italic, open_start + 2..open_start + 3, k..k + 1),
                        ],
                        2 => vec![(InlineStyle::Bold, open_start..open_start + 2, k..k + 2)],
                        _ => vec![(InlineStyle::Italic, open_start..open_start + 1, k..k + 1)],
                    };
                    for (style, open, close) in pieces {
                        if wants(style) {
                            s.mark(open.clone());
                            s.mark(close.clone());
                            out.push(EmphasisRun { style, open, close });
                        }
                    }
                    matched = true;
                    break;
                }
                i += if matched { run } else { run.max(1) };
            }
        }
    }
    out.sort_by_key(|r| (r.open.start, r.close.end));
    out
}
