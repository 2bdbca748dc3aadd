use thiserror::Error;

/// Errors raised by the editor model.
///
/// Decoration, segmenting and highlighting never surface these to the view;
/// they are caught at the call site and the construct degrades to plain text.
#[derive(Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum CoreError {
    /// A change or selection referenced offsets outside the document.
    #[error("range {from}..{to} out of bounds for document of length {len}")]
    InvalidRange { from: usize, to: usize, len: usize },

    /// Changes of one transaction overlapped or were out of order.
    #[error("overlapping change at offset {0}")]
    OverlappingChange(usize),

    /// External syntax highlighter failed.
    #[error("highlighter error: {0}")]
    Highlight(String),

    /// Math typesetting failed.
    #[error("math error: {0}")]
    Math(String),
}
