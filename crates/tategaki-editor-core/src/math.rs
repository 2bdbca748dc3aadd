//! LaTeX math rendering via pulldown-latex → MathML

use markdown_weaver_escape::escape_html;
use pulldown_latex::{
    Parser, Storage, config::DisplayMode, config::RenderConfig, mathml::push_mathml,
};

use crate::error::CoreError;

/// Typesets math for inline widgets and math blocks.
pub trait MathRenderer {
    /// Render `source` (without `$` delimiters) to markup.
    fn render(&self, source: &str, display: bool) -> Result<String, CoreError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LatexRenderer;

impl MathRenderer for LatexRenderer {
    fn render(&self, source: &str, display: bool) -> Result<String, CoreError> {
        render_mathml(source, display)
    }
}

/// Render LaTeX math to MathML.
pub fn render_mathml(latex: &str, display_mode: bool) -> Result<String, CoreError> {
    let storage = Storage::new();
    let parser = Parser::new(latex, &storage);
    let config = RenderConfig {
        display_mode: if display_mode {
            DisplayMode::Block
        } else {
            DisplayMode::Inline
        },
        ..Default::default()
    };

    let events: Vec<_> = parser.collect();
    let errors: Vec<String> = events
        .iter()
        .filter_map(|e| e.as_ref().err().map(|err| err.to_string()))
        .collect();
    if !errors.is_empty() {
        return Err(CoreError::Math(errors.join("; ")));
    }

    let mut mathml = String::new();
    push_mathml(&mut mathml, events.into_iter(), config)
        .map_err(|e| CoreError::Math(e.to_string()))?;
    Ok(mathml)
}

/// Raw `$source$` shown when typesetting fails.
pub fn fallback_html(source: &str, display: bool) -> String {
    let delim = if display { "$$" } else { "$" };
    let mut escaped = String::new();
    // Writing to a String cannot fail.
    let _ = escape_html(&mut escaped, source);
    format!(r#"<span class="tategaki-math tategaki-math-fallback">{delim}{escaped}{delim}</span>"#)
}
