//! Rendering errors.

use std::process::ExitStatus;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RenderError>;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("invalid color: {0}")]
    InvalidColor(String),

    #[error("no samples to rasterize")]
    EmptyGrid,

    #[error("{tool} not found: {source}")]
    ToolMissing {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} failed ({status}): {stderr}")]
    ToolFailed {
        tool: &'static str,
        status: ExitStatus,
        stderr: String,
    },

    #[error("unexpected {tool} output: {output}")]
    MalformedOutput { tool: &'static str, output: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encode(String),

    #[error("storage error: {0}")]
    Storage(#[from] storage::StorageError),
}

impl From<serde_json::Error> for RenderError {
    fn from(e: serde_json::Error) -> Self {
        RenderError::Encode(e.to_string())
    }
}
