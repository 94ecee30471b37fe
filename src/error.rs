use serde::Serialize;

use crate::tree::NodeKind;

/// All errors that can occur while building, projecting or exporting a project.
#[derive(Debug, thiserror::Error)]
pub enum BuilderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Empty, separator-only or otherwise unusable step path.
    #[error("malformed path {path:?}")]
    MalformedPath { path: String },

    /// A segment expected to be one kind of node already exists as the other.
    #[error("path kind conflict at {path}: expected {expected}, found {found}")]
    PathKindConflict {
        path: String,
        expected: NodeKind,
        found: NodeKind,
    },

    /// A tree node that cannot be projected (the tree is corrupt).
    #[error("malformed node at {path:?}: {reason}")]
    MalformedNode { path: String, reason: String },

    /// The instruction backend or the sandbox runtime could not be reached.
    #[error("{service} unavailable: {message}")]
    UpstreamUnavailable { service: String, message: String },

    #[error("{0}")]
    Custom(String),
}

impl BuilderError {
    pub fn upstream(service: &str, message: impl Into<String>) -> Self {
        BuilderError::UpstreamUnavailable {
            service: service.to_string(),
            message: message.into(),
        }
    }

    /// Whether the caller may retry the same operation later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BuilderError::UpstreamUnavailable { .. })
    }
}

// Errors travel inside serialized reports and events, so they serialize as their message.
impl Serialize for BuilderError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BuilderError>;
