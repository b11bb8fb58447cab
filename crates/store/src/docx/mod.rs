//! DOCX Import/Export Module
//!
//! This module reads and writes Microsoft Word DOCX files.
//! DOCX is based on the Office Open XML (OOXML) format defined in ECMA-376.
//!
//! ## Structure
//!
//! A DOCX file is a ZIP archive containing XML files:
//! - `[Content_Types].xml` - Content type definitions
//! - `_rels/.rels` - Root relationships
//! - `word/document.xml` - Main document content
//! - `word/styles.xml` - Style definitions
//! - `word/comments.xml` - Comments content
//! - `word/commentsExtended.xml` - Comment threading and resolution
//! - `word/settings.xml` - Document settings
//! - `word/_rels/document.xml.rels` - Document relationships
//! - `docProps/core.xml`, `docProps/custom.xml` - Document properties
//!
//! Headers, footers, notes, theme, font table and numbering parts are not
//! modeled; they travel through a round trip as preserved parts.
//!
//! ## Layers
//!
//! - [`Package`] holds the archive's parts.
//! - [`PackageGraph`] resolves content types and relationships.
//! - The part codecs turn individual parts into model values and back.
//! - `parser` and `writer` orchestrate the codecs for a whole document.
//! - [`DocxDocument`] and [`DocumentWriter`] are the public entry points.

mod api;
mod comments_io;
mod content_types;
mod document;
mod document_writer;
mod error;
mod formatting;
mod package;
mod parser;
mod props_io;
mod reader;
mod relationships;
mod resolver;
mod settings_io;
mod styles;
mod styles_writer;
mod validation;
mod writer;

pub use api::{DocumentWriter, DocxDocument};
pub use content_types::ContentTypes;
pub use error::{DocxError, DocxResult, TextPosition};
pub use package::{Package, PackageLimits, Part, PartName, CONTENT_TYPES_PART, MAX_PART_BYTES, MAX_TOTAL_BYTES};
pub use parser::{decode, DecodedDocument};
pub use relationships::{Relationship, Relationships, TargetMode};
pub use resolver::{regenerate, PackageGraph, RelationshipEntry};
pub use validation::{ValidationReport, ValidationWarning, WarningKind};
pub use writer::{encode, EncodedPackage};

/// XML namespaces used in DOCX files
pub mod namespaces {
    /// Main WordprocessingML namespace
    pub const W: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
    /// Relationships namespace
    pub const R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
    /// Package relationships namespace
    pub const PKG_REL: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
    /// Content types namespace
    pub const CT: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
    /// Markup compatibility namespace
    pub const MC: &str = "http://schemas.openxmlformats.org/markup-compatibility/2006";
    /// Word 2010 extensions (`w14:paraId`)
    pub const W14: &str = "http://schemas.microsoft.com/office/word/2010/wordml";
    /// Word 2012 extensions (`w15:commentEx`)
    pub const W15: &str = "http://schemas.microsoft.com/office/word/2012/wordml";
}

/// Relationship types used in DOCX
pub mod relationship_types {
    pub const DOCUMENT: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
    /// `officeDocument` as written by strict-conformance producers
    pub const DOCUMENT_STRICT: &str = "http://purl.oclc.org/ooxml/officeDocument/relationships/officeDocument";
    pub const STYLES: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";
    pub const NUMBERING: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/numbering";
    pub const HYPERLINK: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";
    pub const SETTINGS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/settings";
    pub const HEADER: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/header";
    pub const FOOTER: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer";
    pub const FOOTNOTES: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/footnotes";
    pub const ENDNOTES: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/endnotes";
    pub const COMMENTS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/comments";
    pub const COMMENTS_EXTENDED: &str = "http://schemas.microsoft.com/office/2011/relationships/commentsExtended";
    pub const THEME: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme";
    pub const FONT_TABLE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/fontTable";
    pub const WEB_SETTINGS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/webSettings";
    pub const CUSTOM_XML: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/customXml";
    pub const CORE_PROPERTIES: &str =
        "http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties";
    pub const CUSTOM_PROPERTIES: &str =
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/custom-properties";
}

/// Content types for DOCX parts
pub mod content_type_values {
    pub const DOCUMENT: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml";
    pub const STYLES: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml";
    pub const SETTINGS: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.settings+xml";
    pub const RELATIONSHIPS: &str = "application/vnd.openxmlformats-package.relationships+xml";
    pub const COMMENTS: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.comments+xml";
    pub const COMMENTS_EXTENDED: &str =
        "application/vnd.openxmlformats-officedocument.wordprocessingml.commentsExtended+xml";
    pub const CORE_PROPERTIES: &str = "application/vnd.openxmlformats-package.core-properties+xml";
    pub const CUSTOM_PROPERTIES: &str = "application/vnd.openxmlformats-officedocument.custom-properties+xml";
    pub const XML: &str = "application/xml";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_structure() {
        assert!(namespaces::W.contains("wordprocessingml"));
        assert!(content_type_values::COMMENTS_EXTENDED.ends_with("+xml"));
    }
}
