//! Engine options
//!
//! Options are plain serde structs with defaults, loaded from an optional
//! JSON file. A missing file means defaults; a file that does not parse is
//! logged and also falls back to defaults.

use crate::docx::{DocxError, DocxResult, PackageLimits, MAX_PART_BYTES, MAX_TOTAL_BYTES};
use doc_model::ConflictStrategy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// All engine options
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineOptions {
    pub open: OpenOptions,
    pub save: SaveOptions,
    pub styles: StyleOptions,
}

/// Options used while opening and decoding a package
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpenOptions {
    /// Fail with a validation error instead of recording warnings
    pub strict: bool,
    /// Read `comments.xml` and `commentsExtended.xml`
    pub load_comments: bool,
    /// Carry headers, footers, notes, theme and similar parts through a save
    pub preserve_unknown_parts: bool,
    /// Largest allowed inflated part, in bytes
    pub max_part_bytes: u64,
    /// Largest allowed inflated package, in bytes
    pub max_total_bytes: u64,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            strict: false,
            load_comments: true,
            preserve_unknown_parts: true,
            max_part_bytes: MAX_PART_BYTES,
            max_total_bytes: MAX_TOTAL_BYTES,
        }
    }
}

impl OpenOptions {
    pub fn limits(&self) -> PackageLimits {
        PackageLimits {
            max_part_bytes: self.max_part_bytes,
            max_total_bytes: self.max_total_bytes,
        }
    }
}

/// Zip compression used when saving
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Deflated,
    Stored,
}

impl Compression {
    pub fn method(&self) -> zip::CompressionMethod {
        match self {
            Compression::Deflated => zip::CompressionMethod::Deflated,
            Compression::Stored => zip::CompressionMethod::Stored,
        }
    }
}

/// Options used while encoding and saving
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SaveOptions {
    pub compression: Compression,
    /// Emit `docProps/core.xml`
    pub write_core_properties: bool,
    /// Stamp the modified time into the core properties on save
    pub update_modified: bool,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self {
            compression: Compression::Deflated,
            write_core_properties: true,
            update_modified: true,
        }
    }
}

/// Style engine options
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StyleOptions {
    pub conflict_strategy: ConflictStrategy,
}

impl EngineOptions {
    /// Load options from a JSON file, or return defaults if the file doesn't exist
    pub fn load(path: impl AsRef<Path>) -> DocxResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str::<EngineOptions>(&content) {
            Ok(options) => Ok(options),
            Err(e) => {
                tracing::warn!("Failed to parse engine options, using defaults: {}", e);
                Ok(Self::default())
            }
        }
    }

    /// Save options as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> DocxResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self).map_err(|e| DocxError::Options(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject option combinations the engine cannot honor
    pub fn validate(&self) -> DocxResult<()> {
        if self.open.max_part_bytes == 0 || self.open.max_total_bytes == 0 {
            return Err(DocxError::Options("size limits must be greater than zero".into()));
        }
        if self.open.max_part_bytes > self.open.max_total_bytes {
            return Err(DocxError::Options(
                "max_part_bytes cannot exceed max_total_bytes".into(),
            ));
        }
        Ok(())
    }
}
