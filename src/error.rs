use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::content::markdown_renderer::RenderError;
use crate::content::metadata::MetadataError;

/// Outcome of a failed post store operation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Post {0} not found")]
    NotFound(String),

    #[error("Post {0} already exists")]
    AlreadyExists(String),

    #[error("{0}")]
    Validation(String),

    #[error("Malformed metadata in post {name}: {source}")]
    MetadataDecode {
        name: String,
        source: MetadataError,
    },

    #[error("I/O failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to render post {name}: {source}")]
    Render {
        name: String,
        source: RenderError,
    },
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        StoreError::Io { path: path.into(), source }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        StoreError::Validation(msg.into())
    }

    /// True for failures caused by the server rather than by the request.
    pub fn is_internal(&self) -> bool {
        matches!(self, StoreError::MetadataDecode { .. } | StoreError::Io { .. } | StoreError::Render { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
