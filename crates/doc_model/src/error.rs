//! Error types for document model operations

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocModelError {
    #[error("Style inheritance cycle: {}", chain.join(" -> "))]
    StyleCycle { chain: Vec<String> },

    #[error("Style not found: {kind} style '{id}'")]
    StyleNotFound { kind: String, id: String },

    #[error("Duplicate {kind} style '{id}'")]
    DuplicateStyle { kind: String, id: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Comment not found: {0}")]
    CommentNotFound(u32),

    #[error("No paragraph contains anchor text '{0}'")]
    AnchorNotFound(String),

    #[error("Paragraph index {index} out of range ({len} paragraphs)")]
    ParagraphOutOfRange { index: usize, len: usize },

    #[error("Run index {index} out of range ({len} runs)")]
    RunOutOfRange { index: usize, len: usize },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl DocModelError {
    /// True for configuration errors: cyclic style inheritance and bad engine setup
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, DocModelError::StyleCycle { .. } | DocModelError::Configuration(_))
    }
}

pub type Result<T> = std::result::Result<T, DocModelError>;
