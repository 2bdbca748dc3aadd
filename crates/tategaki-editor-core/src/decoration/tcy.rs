//! Automatic tate-chu-yoko: short ASCII runs set horizontally in vertical text.

use std::ops::Range;

const PUNCT_PAIRS: [&str; 4] = ["!!", "!?", "?!", "??"];

fn is_blocked(blocked: &[Range<usize>], r: &Range<usize>) -> bool {
    blocked.iter().any(|b| r.start < b.end && b.start < r.end)
}

/// Isolated runs of `1..=max_len` ASCII digits and the pairs `!!`, `!?`, `?!`,
/// `??`, as char ranges local to the line.
pub fn find_tcy(chars: &[char], max_len: usize, blocked: &[Range<usize>]) -> Vec<Range<usize>> {
    let mut out = Vec::new();
    if max_len == 0 {
        return out;
    }
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let before = start.checked_sub(1).map(|p| chars[p]);
            let after = chars.get(i).copied();
            let isolated = !before.is_some_and(is_ascii_word) && !after.is_some_and(is_ascii_word);
            let range = start..i;
            if isolated && i - start <= max_len && !is_blocked(blocked, &range) {
                out.push(range);
            }
            continue;
        }
        if c == '!' || c == '?' {
            let start = i;
            while i < chars.len() && matches!(chars[i], '!' | '?') {
                i += 1;
            }
            if i - start == 2 {
                let pair: String = chars[start..i].iter().collect();
                let range = start..i;
                if PUNCT_PAIRS.contains(&pair.as_str()) && !is_blocked(blocked, &range) {
                    out.push(range);
                }
            }
            continue;
        }
        i += 1;
    }
    out
}

fn is_ascii_word(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | ',' | '_' | '-' | '/' | ':')
}
