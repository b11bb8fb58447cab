//! Error types for DOCX operations

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Line and column (both 1-based) of a position inside an XML part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextPosition {
    pub line: usize,
    pub column: usize,
}

impl TextPosition {
    /// Compute the line and column of a byte offset into `content`
    pub fn from_offset(content: &str, offset: usize) -> Self {
        let offset = offset.min(content.len());
        let before = content.as_bytes().get(..offset).unwrap_or_default();
        let line = before.iter().filter(|&&b| b == b'\n').count() + 1;
        let line_start = before.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
        let column = String::from_utf8_lossy(&before[line_start..]).chars().count() + 1;
        Self { line, column }
    }
}

impl fmt::Display for TextPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

fn at_position(position: &Option<TextPosition>) -> String {
    position.map(|p| format!(" at {p}")).unwrap_or_default()
}

/// Errors that can occur while opening, decoding, encoding or saving a package
#[derive(Debug, Error)]
pub enum DocxError {
    /// The file to open does not exist
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Not a zip archive, a truncated archive, or a package missing a mandatory part
    #[error("Corrupt package: {0}")]
    CorruptPackage(String),

    /// A requested part is not in the package
    #[error("Part not found: {0}")]
    PartNotFound(String),

    /// Malformed XML in a part
    #[error("XML parse error in {part}{}: {message}", at_position(.position))]
    Parse {
        part: String,
        position: Option<TextPosition>,
        message: String,
    },

    /// Validation warnings promoted to an error in strict mode
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The document cannot be encoded
    #[error("Encode error: {0}")]
    Encode(String),

    /// Disk I/O failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Document model error
    #[error("Document model error: {0}")]
    Model(#[from] doc_model::DocModelError),

    /// Unusable engine options
    #[error("Options error: {0}")]
    Options(String),
}

impl DocxError {
    /// A parse error for `part` at byte offset `offset` of `content`
    pub fn parse_at(part: &str, content: &str, offset: u64, message: impl fmt::Display) -> Self {
        DocxError::Parse {
            part: part.to_string(),
            position: Some(TextPosition::from_offset(content, offset as usize)),
            message: message.to_string(),
        }
    }

    /// A parse error with no position
    pub fn parse(part: &str, message: impl fmt::Display) -> Self {
        DocxError::Parse {
            part: part.to_string(),
            position: None,
            message: message.to_string(),
        }
    }

    /// Map a zip error raised while reading an archive
    pub fn from_zip_read(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) if e.kind() != std::io::ErrorKind::UnexpectedEof => DocxError::Io(e),
            other => DocxError::CorruptPackage(other.to_string()),
        }
    }

    /// Map a zip error raised while writing an archive
    pub fn from_zip_write(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(e) => DocxError::Io(e),
            other => DocxError::Encode(other.to_string()),
        }
    }
}

/// Result type for DOCX operations
pub type DocxResult<T> = std::result::Result<T, DocxError>;
