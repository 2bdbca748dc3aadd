//! View configuration and persisted pane state.
//!
//! Both are loaded from host JSON. Every threshold the view tunes at runtime
//! lives in [`ViewConfig`] so it can be re-tuned per platform.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tategaki_editor_core::WritingMode;

use crate::error::ViewError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewConfig {
    pub writing_mode: WritingMode,
    pub ruby_enabled: bool,
    /// Automatic tate-chu-yoko for short digit runs in vertical modes.
    pub auto_tcy: bool,
    pub tcy_max_len: usize,
    pub hide_frontmatter: bool,
    /// Render tables, math, callouts, images as single widgets.
    pub block_widgets: bool,
    /// Plain-text view: no syntax is hidden.
    pub source_mode: bool,
    /// Consult the markdown parser for emphasis before the fallback scanner.
    pub use_syntax_tree: bool,

    pub ce_ime_enabled: bool,
    pub ce_failure_threshold: usize,
    pub ce_failure_window_ms: u64,
    pub ce_verify_throttle_ms: u64,
    /// Lines around the selection marked editable in CE mode.
    pub ce_editable_margin: usize,

    pub soft_selection_chars: usize,
    pub soft_selection_lines: usize,

    pub scroll_settle_ms: u64,
    /// A scroll moving at least this many lines at once counts as a jump.
    pub scroll_jump_lines: usize,
    pub overscan_lines: usize,
    pub cache_margin_lines: usize,
    pub line_cache_capacity: usize,

    pub settings_debounce_ms: u64,
    pub reclassify_delay_ms: u64,
    pub notice_ms: u64,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            writing_mode: WritingMode::VerticalRl,
            ruby_enabled: true,
            auto_tcy: true,
            tcy_max_len: 2,
            hide_frontmatter: true,
            block_widgets: true,
            source_mode: false,
            use_syntax_tree: true,
            ce_ime_enabled: false,
            ce_failure_threshold: 3,
            ce_failure_window_ms: 1200,
            ce_verify_throttle_ms: 80,
            ce_editable_margin: 2,
            soft_selection_chars: 150_000,
            soft_selection_lines: 2_000,
            scroll_settle_ms: 150,
            scroll_jump_lines: 40,
            overscan_lines: 30,
            cache_margin_lines: 200,
            line_cache_capacity: 2_048,
            settings_debounce_ms: 120,
            reclassify_delay_ms: 250,
            notice_ms: 4_000,
        }
    }
}

impl ViewConfig {
    /// Parse the host's settings blob. Missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ViewError> {
        serde_json::from_str(json).map_err(ViewError::Config)
    }

    pub fn to_json(&self) -> Result<String, ViewError> {
        serde_json::to_string(self).map_err(ViewError::Config)
    }

    /// Max tcy run length, or None when tcy does not apply.
    pub fn tcy_max(&self) -> Option<usize> {
        (self.auto_tcy && self.writing_mode.is_vertical() && self.tcy_max_len > 0)
            .then_some(self.tcy_max_len)
    }

    /// Whether switching from `self` to `other` changes rendered output.
    pub fn affects_rendering(&self, other: &ViewConfig) -> bool {
        self.writing_mode != other.writing_mode
            || self.ruby_enabled != other.ruby_enabled
            || self.tcy_max() != other.tcy_max()
            || self.hide_frontmatter != other.hide_frontmatter
            || self.block_widgets != other.block_widgets
            || self.source_mode != other.source_mode
            || self.use_syntax_tree != other.use_syntax_tree
    }

    /// Whether a document this size uses soft selection while dragging.
    pub fn is_huge_document(&self, chars: usize, lines: usize) -> bool {
        chars >= self.soft_selection_chars || lines >= self.soft_selection_lines
    }

    pub fn ce_failure_window(&self) -> Duration {
        Duration::from_millis(self.ce_failure_window_ms)
    }

    pub fn ce_verify_throttle(&self) -> Duration {
        Duration::from_millis(self.ce_verify_throttle_ms)
    }

    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }

    pub fn settings_debounce(&self) -> Duration {
        Duration::from_millis(self.settings_debounce_ms)
    }

    pub fn reclassify_delay(&self) -> Duration {
        Duration::from_millis(self.reclassify_delay_ms)
    }

    pub fn notice_duration(&self) -> Duration {
        Duration::from_millis(self.notice_ms)
    }
}

/// Pane state the host saves and restores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedViewState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub writing_mode: Option<WritingMode>,
}

impl PersistedViewState {
    pub fn from_json(json: &str) -> Result<Self, ViewError> {
        serde_json::from_str(json).map_err(ViewError::State)
    }

    pub fn to_json(&self) -> Result<String, ViewError> {
        serde_json::to_string(self).map_err(ViewError::State)
    }
}
