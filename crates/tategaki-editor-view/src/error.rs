use tategaki_editor_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ViewError {
    #[error("invalid view config: {0}")]
    Config(#[source] serde_json::Error),

    #[error("invalid persisted view state: {0}")]
    State(#[source] serde_json::Error),

    #[error("file not found: {0}")]
    MissingFile(String),

    #[error("no line {line} (document has {count})")]
    UnknownLine { line: usize, count: usize },

    #[error(transparent)]
    Core(#[from] CoreError),
}
