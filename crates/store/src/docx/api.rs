//! Public API for DOCX documents
//!
//! [`DocxDocument`] is an opened (or new) document together with the
//! options it was opened with and the warnings raised while reading it.
//! [`DocumentWriter`] is a stateful builder over one document for callers
//! that create or edit files step by step.

use crate::docx::error::{DocxError, DocxResult};
use crate::docx::package::Package;
use crate::docx::parser::decode;
use crate::docx::validation::ValidationReport;
use crate::docx::writer::encode;
use crate::options::EngineOptions;
use doc_model::{CommentId, Document, Paragraph, ParagraphStyleId, Run, RunProperties, Table};
use std::path::{Path, PathBuf};

/// A document opened from, or destined for, a DOCX file
#[derive(Debug)]
pub struct DocxDocument {
    document: Document,
    options: EngineOptions,
    warnings: ValidationReport,
    path: Option<PathBuf>,
}

impl DocxDocument {
    /// A new empty document with the built-in styles
    pub fn new() -> Self {
        Self::with_options(EngineOptions::default())
    }

    /// A new empty document that will be saved with `options`
    pub fn with_options(options: EngineOptions) -> Self {
        Self {
            document: Document::new(),
            options,
            warnings: ValidationReport::new(),
            path: None,
        }
    }

    /// Open a DOCX file with default options
    ///
    /// # Example
    ///
    /// ```ignore
    /// use store::docx::DocxDocument;
    ///
    /// let doc = DocxDocument::open("report.docx")?;
    /// println!("{}", doc.get_text());
    /// ```
    pub fn open(path: impl AsRef<Path>) -> DocxResult<Self> {
        Self::open_with(path, &EngineOptions::default())
    }

    /// Open a DOCX file
    pub fn open_with(path: impl AsRef<Path>, options: &EngineOptions) -> DocxResult<Self> {
        let path = path.as_ref();
        options.validate()?;
        let package = Package::open_with_limits(path, options.open.limits())?;
        let mut opened = Self::decode(package, options)?;
        tracing::info!(
            path = %path.display(),
            paragraphs = opened.document.paragraphs().len(),
            warnings = opened.warnings.len(),
            "document opened"
        );
        opened.path = Some(path.to_path_buf());
        Ok(opened)
    }

    /// Read a DOCX held in memory
    pub fn from_bytes(bytes: &[u8], options: &EngineOptions) -> DocxResult<Self> {
        options.validate()?;
        let package = Package::from_bytes(bytes, options.open.limits())?;
        Self::decode(package, options)
    }

    fn decode(package: Package, options: &EngineOptions) -> DocxResult<Self> {
        let decoded = decode(package, options)?;
        Ok(Self {
            document: decoded.document,
            options: options.clone(),
            warnings: decoded.report,
            path: None,
        })
    }

    /// Body paragraph texts joined with newlines
    pub fn get_text(&self) -> &str {
        self.document.text()
    }

    pub fn get_paragraphs(&self) -> &[Paragraph] {
        self.document.paragraphs()
    }

    pub fn get_tables(&self) -> &[Table] {
        self.document.tables()
    }

    /// Warnings raised while opening
    pub fn warnings(&self) -> &ValidationReport {
        &self.warnings
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Path the document was opened from or last saved to
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Save to `path` atomically. Returns the warnings raised while encoding.
    pub fn save(&mut self, path: impl AsRef<Path>) -> DocxResult<ValidationReport> {
        let path = path.as_ref();
        let encoded = encode(&self.document, &self.options)?;
        encoded
            .package
            .save_to_file(path, self.options.save.compression)?;
        tracing::info!(
            path = %path.display(),
            parts = encoded.package.len(),
            warnings = encoded.report.len(),
            "document saved"
        );
        self.path = Some(path.to_path_buf());
        Ok(encoded.report)
    }

    /// Save back to the path the document came from
    pub fn save_in_place(&mut self) -> DocxResult<ValidationReport> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| DocxError::Encode("document has no path; use save".into()))?;
        self.save(path)
    }

    /// Encode into an in-memory archive
    pub fn to_bytes(&self) -> DocxResult<Vec<u8>> {
        let encoded = encode(&self.document, &self.options)?;
        encoded.package.to_bytes(self.options.save.compression)
    }

    /// Release the document. Unsaved changes are discarded.
    pub fn close(self) {
        tracing::debug!(path = ?self.path, "document closed");
    }
}

impl Default for DocxDocument {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Document Writer
// =============================================================================

/// Step-by-step document builder.
///
/// Every operation needs a document created with
/// [`create_new_document`](Self::create_new_document) or opened with
/// [`open_for_modification`](Self::open_for_modification) first.
#[derive(Debug, Default)]
pub struct DocumentWriter {
    current: Option<DocxDocument>,
    options: EngineOptions,
}

impl DocumentWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: EngineOptions) -> Self {
        Self { current: None, options }
    }

    /// Start a new empty document, discarding any current one
    pub fn create_new_document(&mut self) {
        self.current = Some(DocxDocument::with_options(self.options.clone()));
    }

    /// Open an existing file for editing
    pub fn open_for_modification(&mut self, path: impl AsRef<Path>) -> DocxResult<()> {
        self.current = Some(DocxDocument::open_with(path, &self.options)?);
        Ok(())
    }

    /// The document being built, if any
    pub fn document(&self) -> Option<&DocxDocument> {
        self.current.as_ref()
    }

    /// Take the built document out of the writer
    pub fn finish(self) -> Option<DocxDocument> {
        self.current
    }

    fn doc(&mut self) -> DocxResult<&mut Document> {
        self.current
            .as_mut()
            .map(DocxDocument::document_mut)
            .ok_or_else(|| DocxError::Encode("document not initialized".into()))
    }

    /// Append a paragraph; returns its index
    pub fn add_paragraph(&mut self, text: &str, style: Option<&str>) -> DocxResult<usize> {
        Ok(self.doc()?.add_paragraph(text, style.map(ParagraphStyleId::new)))
    }

    pub fn add_formatted_paragraph(&mut self, style: Option<&str>, runs: Vec<Run>) -> DocxResult<usize> {
        Ok(self.doc()?.add_formatted_paragraph(style.map(ParagraphStyleId::new), runs))
    }

    /// Append a table; short rows are padded to the first row's width
    pub fn add_table(&mut self, rows: Vec<Vec<String>>) -> DocxResult<usize> {
        Ok(self.doc()?.add_table(rows))
    }

    /// Replace every occurrence in runs and table cells; returns the count
    pub fn replace_text(&mut self, from: &str, to: &str) -> DocxResult<usize> {
        Ok(self.doc()?.replace_text(from, to))
    }

    pub fn set_paragraph_style(&mut self, index: usize, style: &str) -> DocxResult<()> {
        self.doc()?.set_paragraph_style(index, Some(ParagraphStyleId::new(style)))?;
        Ok(())
    }

    pub fn set_run_formatting(&mut self, paragraph: usize, run: usize, properties: &RunProperties) -> DocxResult<()> {
        self.doc()?.set_run_formatting(paragraph, run, properties)?;
        Ok(())
    }

    /// Comment on the first paragraph containing `anchor_text`
    pub fn add_comment(&mut self, author: &str, text: &str, anchor_text: &str) -> DocxResult<CommentId> {
        Ok(self.doc()?.add_comment(author, text, anchor_text)?)
    }

    pub fn save(&mut self, path: impl AsRef<Path>) -> DocxResult<ValidationReport> {
        self.current
            .as_mut()
            .ok_or_else(|| DocxError::Encode("document not initialized".into()))?
            .save(path)
    }
}
