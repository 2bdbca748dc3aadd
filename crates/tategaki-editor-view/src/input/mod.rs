//! Input adapters.
//!
//! Exactly one surface receives text input at a time: the hidden overlay
//! textarea, the contenteditable lines, or a plain-edit textarea.

pub mod ce_bridge;
pub mod overlay_ime;

pub use ce_bridge::{BeforeInputResult, CeBridge, CeState, DomPosition, FallbackReason, VerifyOutcome};
pub use overlay_ime::OverlayIme;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InputSurface {
    #[default]
    OverlayTextarea,
    ContentEditable,
    PlainEdit,
}
