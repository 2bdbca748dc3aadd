//! tategaki-editor-view: the vertical markdown view.
//!
//! This crate provides:
//! - the render tree and its HTML presentation
//! - `RenderPipeline`: full, incremental and virtualized rendering
//! - caret mapping, visual-line navigation and the selection overlay
//! - the overlay textarea and contenteditable input bridges
//! - plain-edit sessions, scheduling, notices and diagnostic log capture
//! - `TategakiView`, the controller owning one document's state
//!
//! Geometry comes from a `LayoutProvider`; `GridLayout` is a fixed-cell
//! presenter for terminal-like targets and tests.

pub mod config;
pub mod error;
pub mod geometry;
pub mod input;
pub mod log_buffer;
pub mod notice;
pub mod plain_edit;
pub mod platform;
pub mod render;
pub mod scheduler;
pub mod selection;
pub mod view;

pub use config::{PersistedViewState, ViewConfig};
pub use error::ViewError;
pub use geometry::{FlowAxes, GridLayout, LayoutProvider, Point, Rect};
pub use input::{
    BeforeInputResult, CeBridge, CeState, DomPosition, FallbackReason, InputSurface, OverlayIme,
    VerifyOutcome,
};
pub use log_buffer::{LogCaptureLayer, clear_logs, get_logs};
pub use notice::{Notice, NoticeQueue};
pub use plain_edit::{PlainEditController, PlainEditSession};
pub use platform::Platform;
pub use render::{
    LineElement, LineState, PatchPath, PatchReport, RenderNode, RenderPipeline, RenderSettings,
    RenderTree,
};
pub use scheduler::{RenderToken, Scheduler};
pub use selection::{LineView, NavIntent, NavUnit, ProjectionSource, SelectionOverlay, SoftSelection};
pub use view::{EditorViewState, FileLoad, HostRequest, TategakiView, ViewUpdate};
