//! Per-line syntax highlighting for fenced code blocks.

use smol_str::{SmolStr, format_smolstr};
use syntect::parsing::{ParseState, ScopeStack, SyntaxSet};

use crate::error::CoreError;

/// One highlighted run. Runs of a line concatenate back to the line text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightRun {
    pub text: String,
    pub class: Option<SmolStr>,
}

pub trait Highlighter {
    fn highlight_line(&self, lang: Option<&str>, text: &str)
    -> Result<Vec<HighlightRun>, CoreError>;
}

/// Check highlighter output against the input; a mismatch means the runs
/// cannot be mapped back to buffer offsets.
pub fn runs_match_text(runs: &[HighlightRun], text: &str) -> bool {
    let mut rest = text;
    for run in runs {
        match rest.strip_prefix(run.text.as_str()) {
            Some(r) => rest = r,
            None => return false,
        }
    }
    rest.is_empty()
}

/// syntect-backed highlighter. Each line is parsed from a fresh state.
pub struct SyntectHighlighter {
    syntaxes: SyntaxSet,
}

impl Default for SyntectHighlighter {
    fn default() -> Self {
        Self {
            syntaxes: SyntaxSet::load_defaults_newlines(),
        }
    }
}

impl std::fmt::Debug for SyntectHighlighter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyntectHighlighter").finish_non_exhaustive()
    }
}

fn scope_class(stack: &ScopeStack) -> Option<SmolStr> {
    let top = stack.as_slice().last()?;
    let name = top.build_string();
    // Drop the language suffix: `keyword.control.rust` -> `keyword-control`.
    let mut parts: Vec<&str> = name.split('.').collect();
    if parts.len() > 2 {
        parts.pop();
    }
    Some(format_smolstr!("hl-{}", parts.join("-")))
}

fn push_run(runs: &mut Vec<HighlightRun>, slice: &str, class: Option<SmolStr>) {
    if slice.is_empty() {
        return;
    }
    match runs.last_mut() {
        Some(last) if last.class == class => last.text.push_str(slice),
        _ => runs.push(HighlightRun {
            text: slice.to_string(),
            class,
        }),
    }
}

impl Highlighter for SyntectHighlighter {
    fn highlight_line(
        &self,
        lang: Option<&str>,
        text: &str,
    ) -> Result<Vec<HighlightRun>, CoreError> {
        let syntax = lang
            .and_then(|l| self.syntaxes.find_syntax_by_token(l))
            .unwrap_or_else(|| self.syntaxes.find_syntax_plain_text());
        let mut state = ParseState::new(syntax);
        let line = format!("{text}\n");
        let ops = state
            .parse_line(&line, &self.syntaxes)
            .map_err(|e| CoreError::Highlight(e.to_string()))?;

        let mut stack = ScopeStack::new();
        let mut runs: Vec<HighlightRun> = Vec::new();
        let mut pos = 0;
        for (at, op) in ops {
            let at = at.min(text.len());
            if at > pos {
                push_run(&mut runs, &text[pos..at], scope_class(&stack));
                pos = at;
            }
            stack
                .apply(&op)
                .map_err(|e| CoreError::Highlight(format!("{e:?}")))?;
        }
        if pos < text.len() {
            push_run(&mut runs, &text[pos..], scope_class(&stack));
        }
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runs_cover_line() {
        let hl = SyntectHighlighter::default();
        let text = "fn main() { let x = 1; }";
        let runs = hl.highlight_line(Some("rust"), text).unwrap();
        assert!(runs_match_text(&runs, text));
        assert!(runs.iter().any(|r| r.class.is_some()));
    }

    #[test]
    fn test_unknown_language_is_plain() {
        let hl = SyntectHighlighter::default();
        let runs = hl.highlight_line(Some("no-such-lang"), "a < b").unwrap();
        assert!(runs_match_text(&runs, "a < b"));
    }

    #[test]
    fn test_runs_match_text() {
        let runs = vec![
            HighlightRun {
                text: "ab".into(),
                class: None,
            },
            HighlightRun {
                text: "c".into(),
                class: Some("hl-x".into()),
            },
        ];
        assert!(runs_match_text(&runs, "abc"));
        assert!(!runs_match_text(&runs, "abcd"));
        assert!(!runs_match_text(&runs, "xbc"));
    }
}
