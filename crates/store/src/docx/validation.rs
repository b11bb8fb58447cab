//! Validation warnings recorded during tolerant reads and defensive writes
//!
//! Problems that the engine can repair locally (a dangling comment reference,
//! a cyclic style, a ragged table row) never abort an open or a save. They
//! are fixed, logged, and collected in a [`ValidationReport`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// =============================================================================
// Warning Types
// =============================================================================

/// What kind of problem a warning describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WarningKind {
    /// A comment marker in the body names a comment that does not exist
    DanglingCommentReference,
    /// A `commentRangeStart` without a matching end
    UnclosedCommentRange,
    /// A comment no marker in the body refers to
    OrphanedComment,
    /// A style whose `basedOn` chain loops
    CyclicStyle,
    /// Two styles of one family share an ID
    DuplicateStyle,
    /// A table row with the wrong number of cells
    RaggedTable,
    /// A relationship whose internal target is missing
    DanglingRelationship,
    /// Two relationships with the same ID in one scope
    DuplicateRelationship,
    /// An optional part that could not be read
    AuxiliaryPartUnreadable,
    /// Content the engine does not model and drops
    UnsupportedContent,
    /// A part with no declared content type
    MissingContentType,
    /// Two comments in the comments part share a `w:id`
    DuplicateCommentId,
    /// Text holding characters XML 1.0 cannot represent; they are not written
    InvalidXmlCharacter,
}

impl WarningKind {
    /// Stable code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            WarningKind::DanglingCommentReference => "W001",
            WarningKind::UnclosedCommentRange => "W002",
            WarningKind::OrphanedComment => "W003",
            WarningKind::CyclicStyle => "W004",
            WarningKind::DuplicateStyle => "W005",
            WarningKind::RaggedTable => "W006",
            WarningKind::DanglingRelationship => "W007",
            WarningKind::DuplicateRelationship => "W008",
            WarningKind::AuxiliaryPartUnreadable => "W009",
            WarningKind::UnsupportedContent => "W010",
            WarningKind::MissingContentType => "W011",
            WarningKind::DuplicateCommentId => "W012",
            WarningKind::InvalidXmlCharacter => "W013",
        }
    }
}

/// A single validation warning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationWarning {
    /// Stable warning code
    pub code: String,
    pub kind: WarningKind,
    /// Part the problem was found in
    pub part: Option<String>,
    /// Human-readable message
    pub message: String,
}

impl ValidationWarning {
    pub fn new(kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            code: kind.code().to_string(),
            kind,
            part: None,
            message: message.into(),
        }
    }

    /// Attach the part the warning refers to
    pub fn in_part(mut self, part: impl Into<String>) -> Self {
        self.part = Some(part.into());
        self
    }
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.part {
            Some(part) => write!(f, "[{}] {}: {}", self.code, part, self.message),
            None => write!(f, "[{}] {}", self.code, self.message),
        }
    }
}

// =============================================================================
// Validation Report
// =============================================================================

/// Warnings collected while decoding or encoding one document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    warnings: Vec<ValidationWarning>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a warning and log it
    pub fn add(&mut self, warning: ValidationWarning) {
        tracing::warn!(
            code = %warning.code,
            part = warning.part.as_deref().unwrap_or("-"),
            "{}",
            warning.message
        );
        self.warnings.push(warning);
    }

    /// Shorthand for [`ValidationReport::add`]
    pub fn warn(&mut self, kind: WarningKind, part: &str, message: impl Into<String>) {
        self.add(ValidationWarning::new(kind, message).in_part(part));
    }

    pub fn warnings(&self) -> &[ValidationWarning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    /// Warnings of one kind
    pub fn by_kind(&self, kind: WarningKind) -> Vec<&ValidationWarning> {
        self.warnings.iter().filter(|w| w.kind == kind).collect()
    }

    pub fn has(&self, kind: WarningKind) -> bool {
        self.warnings.iter().any(|w| w.kind == kind)
    }

    /// Number of warnings per kind
    pub fn counts(&self) -> HashMap<WarningKind, usize> {
        let mut counts = HashMap::new();
        for warning in &self.warnings {
            *counts.entry(warning.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Append another report
    pub fn merge(&mut self, other: ValidationReport) {
        self.warnings.extend(other.warnings);
    }

    /// One line per warning, for strict-mode errors
    pub fn summary(&self) -> String {
        self.warnings
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }
}
