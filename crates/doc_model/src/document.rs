//! The document aggregate and its body content
//!
//! [`Document`] owns the body, the style sheet, the comments and the
//! document-level parts. Comment anchors are paragraph-side (`Paragraph::comments`)
//! and every operation here that adds or removes comments or paragraphs keeps
//! both sides consistent.

use crate::comment::{Comment, CommentId, CommentManager};
use crate::error::{DocModelError, Result};
use crate::paragraph::Paragraph;
use crate::parts::{CoreProperties, PreservedPart, SettingsPart};
use crate::properties::{PropertyBag, RunProperties};
use crate::run::Run;
use crate::style::{ParagraphStyleId, StyleSheet};
use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// Body Content
// =============================================================================

/// One entry of the body in document order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyElement {
    /// Index into [`DocumentContent::paragraphs`]
    Paragraph(usize),
    /// Index into [`DocumentContent::tables`]
    Table(usize),
}

/// Body paragraphs and tables, plus the full-text cache
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentContent {
    paragraphs: Vec<Paragraph>,
    tables: Vec<Table>,
    body: Vec<BodyElement>,
    text: String,
    /// Raw `w:sectPr` element of the body, written back verbatim
    section_properties: Option<String>,
}

impl DocumentContent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.paragraphs
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// Paragraphs and tables in document order
    pub fn body(&self) -> &[BodyElement] {
        &self.body
    }

    /// Body paragraph texts joined with `\n`
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn paragraph(&self, index: usize) -> Option<&Paragraph> {
        self.paragraphs.get(index)
    }

    pub fn table(&self, index: usize) -> Option<&Table> {
        self.tables.get(index)
    }

    /// Tables hold no text cache, so direct mutable access is safe.
    pub fn table_mut(&mut self, index: usize) -> Option<&mut Table> {
        self.tables.get_mut(index)
    }

    pub fn section_properties(&self) -> Option<&str> {
        self.section_properties.as_deref()
    }

    pub fn set_section_properties(&mut self, xml: Option<String>) {
        self.section_properties = xml;
    }

    /// Append a paragraph and return its index
    pub fn push_paragraph(&mut self, paragraph: Paragraph) -> usize {
        if !self.paragraphs.is_empty() {
            self.text.push('\n');
        }
        self.text.push_str(paragraph.text());
        self.paragraphs.push(paragraph);
        let index = self.paragraphs.len() - 1;
        self.body.push(BodyElement::Paragraph(index));
        index
    }

    /// Append a table and return its index
    pub fn push_table(&mut self, table: Table) -> usize {
        self.tables.push(table);
        let index = self.tables.len() - 1;
        self.body.push(BodyElement::Table(index));
        index
    }

    /// Modify one paragraph in place
    pub fn update_paragraph<R>(&mut self, index: usize, f: impl FnOnce(&mut Paragraph) -> R) -> Result<R> {
        let len = self.paragraphs.len();
        let paragraph = self
            .paragraphs
            .get_mut(index)
            .ok_or(DocModelError::ParagraphOutOfRange { index, len })?;
        let result = f(paragraph);
        self.refresh_text();
        Ok(result)
    }

    pub(crate) fn remove_paragraph(&mut self, index: usize) -> Result<Paragraph> {
        let len = self.paragraphs.len();
        if index >= len {
            return Err(DocModelError::ParagraphOutOfRange { index, len });
        }
        let removed = self.paragraphs.remove(index);
        self.body.retain(|e| *e != BodyElement::Paragraph(index));
        for element in &mut self.body {
            if let BodyElement::Paragraph(i) = element {
                if *i > index {
                    *i -= 1;
                }
            }
        }
        self.refresh_text();
        Ok(removed)
    }

    pub(crate) fn paragraphs_mut(&mut self) -> impl Iterator<Item = &mut Paragraph> {
        self.paragraphs.iter_mut()
    }

    fn replace_text(&mut self, from: &str, to: &str) -> usize {
        let mut count: usize = self.paragraphs.iter_mut().map(|p| p.replace_text(from, to)).sum();
        count += self.tables.iter_mut().map(|t| t.replace_text(from, to)).sum::<usize>();
        if count > 0 {
            self.refresh_text();
        }
        count
    }

    fn refresh_text(&mut self) {
        self.text = self
            .paragraphs
            .iter()
            .map(Paragraph::text)
            .collect::<Vec<_>>()
            .join("\n");
    }
}

// =============================================================================
// Integrity
// =============================================================================

/// A cross-reference problem found by [`Document::check_integrity`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityIssue {
    /// A paragraph anchors a comment that does not exist
    DanglingAnchor { paragraph: usize, comment: CommentId },
    /// A top-level comment is not anchored anywhere. Expected for comments
    /// added with [`Document::add_unanchored_comment`].
    UnanchoredComment(CommentId),
    /// A table row whose cell count differs from the column count
    RaggedTable(usize),
    /// A paragraph references a style the sheet does not define
    UnknownParagraphStyle { paragraph: usize, style: String },
}

// =============================================================================
// Document
// =============================================================================

/// An in-memory word processing document
#[derive(Debug, Clone, Default)]
pub struct Document {
    content: DocumentContent,
    styles: StyleSheet,
    comments: CommentManager,
    settings: Option<SettingsPart>,
    /// `docProps/core.xml`
    pub core_properties: CoreProperties,
    /// Free-form metadata (`docProps/custom.xml`)
    pub metadata: BTreeMap<String, String>,
    preserved_parts: Vec<PreservedPart>,
}

impl Document {
    /// A new empty document with the built-in styles
    pub fn new() -> Self {
        Self {
            styles: StyleSheet::with_builtins(),
            ..Default::default()
        }
    }

    /// A document with an explicit style sheet, used when loading from a file
    pub fn with_styles(styles: StyleSheet) -> Self {
        Self {
            styles,
            ..Default::default()
        }
    }

    pub fn content(&self) -> &DocumentContent {
        &self.content
    }

    /// Mutable body access. Removing paragraphs goes through
    /// [`Document::remove_paragraph`] so comment anchors stay consistent.
    pub fn content_mut(&mut self) -> &mut DocumentContent {
        &mut self.content
    }

    pub fn paragraphs(&self) -> &[Paragraph] {
        self.content.paragraphs()
    }

    pub fn tables(&self) -> &[Table] {
        self.content.tables()
    }

    /// All body paragraph text joined with `\n`
    pub fn text(&self) -> &str {
        self.content.text()
    }

    pub fn styles(&self) -> &StyleSheet {
        &self.styles
    }

    pub fn styles_mut(&mut self) -> &mut StyleSheet {
        &mut self.styles
    }

    pub fn comments(&self) -> &CommentManager {
        &self.comments
    }

    /// Mutable comment access for loading. Deleting through the manager
    /// directly leaves anchors behind; use [`Document::delete_comment`].
    pub fn comments_mut(&mut self) -> &mut CommentManager {
        &mut self.comments
    }

    pub fn settings(&self) -> Option<&SettingsPart> {
        self.settings.as_ref()
    }

    pub fn settings_mut(&mut self) -> Option<&mut SettingsPart> {
        self.settings.as_mut()
    }

    pub fn set_settings(&mut self, settings: Option<SettingsPart>) {
        self.settings = settings;
    }

    pub fn preserved_parts(&self) -> &[PreservedPart] {
        &self.preserved_parts
    }

    pub fn add_preserved_part(&mut self, part: PreservedPart) {
        self.preserved_parts.push(part);
    }

    pub fn clear_preserved_parts(&mut self) {
        self.preserved_parts.clear();
    }

    // =========================================================================
    // Paragraphs and tables
    // =========================================================================

    /// Append a paragraph holding one unformatted run
    pub fn add_paragraph(&mut self, text: impl Into<String>, style: Option<ParagraphStyleId>) -> usize {
        let mut paragraph = Paragraph::with_text(text);
        paragraph.style = style;
        self.content.push_paragraph(paragraph)
    }

    /// Append a paragraph built from runs
    pub fn add_formatted_paragraph(&mut self, style: Option<ParagraphStyleId>, runs: Vec<Run>) -> usize {
        let mut paragraph = Paragraph::from_runs(runs);
        paragraph.style = style;
        self.content.push_paragraph(paragraph)
    }

    /// Append a table; the first row decides the column count
    pub fn add_table(&mut self, rows: Vec<Vec<String>>) -> usize {
        self.content.push_table(Table::from_rows(rows))
    }

    /// Set or clear a paragraph's style reference without validation
    pub fn set_paragraph_style(&mut self, index: usize, style: Option<ParagraphStyleId>) -> Result<()> {
        self.content.update_paragraph(index, |p| p.style = style)
    }

    /// Apply a defined paragraph style, filling unset direct properties
    pub fn apply_paragraph_style(&mut self, index: usize, style: &ParagraphStyleId) -> Result<()> {
        let styles = &self.styles;
        self.content
            .update_paragraph(index, |p| styles.apply_style(p, style))?
    }

    /// Overlay formatting onto one run: fields set in `properties` win.
    /// Formatting that cannot be stored is a `Configuration` error.
    pub fn set_run_formatting(&mut self, paragraph: usize, run: usize, properties: &RunProperties) -> Result<()> {
        properties.validate()?;
        self.content
            .update_paragraph(paragraph, |p| p.update_run(run, |r| r.properties.overlay(properties)))?
    }

    /// Remove a paragraph together with the comments anchored to it
    pub fn remove_paragraph(&mut self, index: usize) -> Result<Paragraph> {
        let removed = self.content.remove_paragraph(index)?;
        for id in &removed.comments {
            if self.comments.contains(*id) {
                self.delete_comment(*id)?;
            }
        }
        Ok(removed)
    }

    /// Replace text inside each run and each table cell. Returns the count.
    pub fn replace_text(&mut self, from: &str, to: &str) -> usize {
        self.content.replace_text(from, to)
    }

    /// Effective formatting of a run with styles and defaults applied
    pub fn effective_run_properties(&self, paragraph: usize, run: usize) -> Option<RunProperties> {
        let para = self.content.paragraph(paragraph)?;
        let r = para.run(run)?;
        Some(self.styles.effective_run_properties(para, r))
    }

    // =========================================================================
    // Comments
    // =========================================================================

    /// Add a comment anchored to the first paragraph whose text contains
    /// `anchor_text`.
    pub fn add_comment(&mut self, author: &str, text: &str, anchor_text: &str) -> Result<CommentId> {
        let index = self
            .content
            .paragraphs()
            .iter()
            .position(|p| p.text().contains(anchor_text))
            .ok_or_else(|| DocModelError::AnchorNotFound(anchor_text.to_string()))?;
        self.add_comment_at(index, author, text)
    }

    /// Add a comment anchored to paragraph `index`
    pub fn add_comment_at(&mut self, index: usize, author: &str, text: &str) -> Result<CommentId> {
        let len = self.content.paragraphs().len();
        if index >= len {
            return Err(DocModelError::ParagraphOutOfRange { index, len });
        }
        let id = self.comments.add(author, text)?;
        self.content.update_paragraph(index, |p| p.comments.push(id))?;
        Ok(id)
    }

    /// Add a comment with no anchor in the body
    pub fn add_unanchored_comment(&mut self, author: &str, text: &str) -> Result<CommentId> {
        self.comments.add(author, text)
    }

    /// Reply to a comment. The reply shares its parent's anchor.
    pub fn add_reply(&mut self, parent: CommentId, author: &str, text: &str) -> Result<CommentId> {
        let id = self.comments.add_reply(parent, author, text)?;
        if let Some(index) = self.comment_anchor(parent) {
            self.content.update_paragraph(index, |p| p.comments.push(id))?;
        }
        Ok(id)
    }

    /// Attach an existing comment to a paragraph
    pub fn anchor_comment(&mut self, index: usize, id: CommentId) -> Result<()> {
        if !self.comments.contains(id) {
            return Err(DocModelError::CommentNotFound(id.value()));
        }
        self.content.update_paragraph(index, |p| {
            if !p.comments.contains(&id) {
                p.comments.push(id);
            }
        })
    }

    /// Delete a comment, its replies, and every anchor pointing at them
    pub fn delete_comment(&mut self, id: CommentId) -> Result<Vec<Comment>> {
        let removed = self.comments.delete(id)?;
        let gone: Vec<CommentId> = removed.iter().map(|c| c.id).collect();
        for paragraph in self.content.paragraphs_mut() {
            paragraph.comments.retain(|c| !gone.contains(c));
        }
        Ok(removed)
    }

    pub fn resolve_comment(&mut self, id: CommentId) -> Result<()> {
        self.comments.resolve(id)
    }

    /// Index of the first paragraph anchoring comment `id`
    pub fn comment_anchor(&self, id: CommentId) -> Option<usize> {
        self.content
            .paragraphs()
            .iter()
            .position(|p| p.comments.contains(&id))
    }

    /// Report cross-reference problems without changing anything
    pub fn check_integrity(&self) -> Vec<IntegrityIssue> {
        let mut issues = Vec::new();

        for (index, paragraph) in self.content.paragraphs().iter().enumerate() {
            for id in &paragraph.comments {
                if !self.comments.contains(*id) {
                    issues.push(IntegrityIssue::DanglingAnchor {
                        paragraph: index,
                        comment: *id,
                    });
                }
            }
            if let Some(style) = &paragraph.style {
                if !self.styles.contains(style) {
                    issues.push(IntegrityIssue::UnknownParagraphStyle {
                        paragraph: index,
                        style: style.to_string(),
                    });
                }
            }
        }

        for comment in self.comments.iter() {
            if !comment.is_reply() && self.comment_anchor(comment.id).is_none() {
                issues.push(IntegrityIssue::UnanchoredComment(comment.id));
            }
        }

        for (index, table) in self.content.tables().iter().enumerate() {
            if !table.is_rectangular() {
                issues.push(IntegrityIssue::RaggedTable(index));
            }
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_cache_joins_paragraphs() {
        let mut doc = Document::new();
        doc.add_paragraph("Title", Some("Heading1".into()));
        doc.add_paragraph("Body text.", Some("Normal".into()));
        assert_eq!(doc.text(), "Title\nBody text.");

        doc.replace_text("Body", "Main");
        assert_eq!(doc.text(), "Title\nMain text.");

        doc.remove_paragraph(0).unwrap();
        assert_eq!(doc.text(), "Main text.");
        assert_eq!(doc.content().body(), &[BodyElement::Paragraph(0)]);
    }

    #[test]
    fn test_body_order_with_tables() {
        let mut doc = Document::new();
        doc.add_paragraph("Before", None);
        doc.add_table(vec![vec!["a".into(), "b".into()]]);
        doc.add_paragraph("After", None);

        assert_eq!(
            doc.content().body(),
            &[BodyElement::Paragraph(0), BodyElement::Table(0), BodyElement::Paragraph(1)]
        );
    }

    #[test]
    fn test_add_comment_anchors_first_match() {
        let mut doc = Document::new();
        doc.add_paragraph("Intro", None);
        doc.add_paragraph("Body text.", None);
        doc.add_paragraph("Body text. Again", None);

        let id = doc.add_comment("Alice", "needs review", "Body text.").unwrap();
        assert_eq!(doc.comment_anchor(id), Some(1));
        assert!(doc.paragraphs()[1].has_comment());
        assert_eq!(doc.paragraphs()[1].comment_id(), Some(id));
        assert!(!doc.paragraphs()[2].has_comment());
    }

    #[test]
    fn test_add_comment_missing_anchor() {
        let mut doc = Document::new();
        doc.add_paragraph("Intro", None);
        let err = doc.add_comment("Alice", "x", "nowhere").unwrap_err();
        assert!(matches!(err, DocModelError::AnchorNotFound(_)));
        assert!(doc.comments().is_empty());
    }

    #[test]
    fn test_reply_shares_anchor_and_delete_cascades() {
        let mut doc = Document::new();
        doc.add_paragraph("Body", None);
        let root = doc.add_comment("Alice", "root", "Body").unwrap();
        let reply = doc.add_reply(root, "Bob", "reply").unwrap();
        assert_eq!(doc.paragraphs()[0].comments, vec![root, reply]);

        let removed = doc.delete_comment(root).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(!doc.paragraphs()[0].has_comment());
        assert!(doc.check_integrity().is_empty());
    }

    #[test]
    fn test_remove_paragraph_removes_its_comments() {
        let mut doc = Document::new();
        doc.add_paragraph("One", None);
        doc.add_paragraph("Two", None);
        let id = doc.add_comment("Alice", "note", "Two").unwrap();

        doc.remove_paragraph(1).unwrap();
        assert!(!doc.comments().contains(id));
    }

    #[test]
    fn test_integrity_reports_unanchored() {
        let mut doc = Document::new();
        let id = doc.add_unanchored_comment("Alice", "floating").unwrap();
        assert_eq!(doc.check_integrity(), vec![IntegrityIssue::UnanchoredComment(id)]);
    }

    #[test]
    fn test_integrity_reports_unknown_style() {
        let mut doc = Document::new();
        doc.add_paragraph("x", Some("Fancy".into()));
        assert!(matches!(
            doc.check_integrity().as_slice(),
            [IntegrityIssue::UnknownParagraphStyle { paragraph: 0, .. }]
        ));
    }

    #[test]
    fn test_set_run_formatting_overlays() {
        let mut doc = Document::new();
        doc.add_formatted_paragraph(None, vec![Run::new("a").italic(), Run::new("b")]);
        doc.set_run_formatting(
            0,
            0,
            &RunProperties {
                bold: Some(true),
                ..Default::default()
            },
        )
        .unwrap();

        let run = &doc.paragraphs()[0].runs()[0];
        assert_eq!(run.properties.bold, Some(true));
        assert_eq!(run.properties.italic, Some(true));
        assert!(doc.set_run_formatting(0, 5, &RunProperties::default()).is_err());
        assert!(doc.set_run_formatting(3, 0, &RunProperties::default()).is_err());
    }

    #[test]
    fn test_set_run_formatting_rejects_unstorable_font_size() {
        let mut doc = Document::new();
        doc.add_paragraph("sized", None);
        let sized = |points: f32| RunProperties {
            font_size: Some(points),
            ..Default::default()
        };

        let err = doc.set_run_formatting(0, 0, &sized(10.3)).unwrap_err();
        assert!(err.is_configuration_error());
        assert!(doc.set_run_formatting(0, 0, &sized(f32::NAN)).is_err());
        assert_eq!(doc.paragraphs()[0].runs()[0].properties.font_size, None);

        doc.set_run_formatting(0, 0, &sized(10.5)).unwrap();
        assert_eq!(doc.paragraphs()[0].runs()[0].properties.font_size, Some(10.5));
    }

    #[test]
    fn test_apply_paragraph_style() {
        let mut doc = Document::new();
        doc.add_paragraph("Heading", None);
        doc.apply_paragraph_style(0, &"Heading1".into()).unwrap();

        let para = &doc.paragraphs()[0];
        assert_eq!(para.style.as_ref().map(|s| s.as_str()), Some("Heading1"));
        assert_eq!(para.properties.keep_next, Some(true));
        assert!(doc.apply_paragraph_style(0, &"Missing".into()).is_err());
    }

    #[test]
    fn test_replace_text_reaches_tables() {
        let mut doc = Document::new();
        doc.add_paragraph("Dear NAME", None);
        doc.add_table(vec![vec!["NAME".into(), "x".into()]]);

        assert_eq!(doc.replace_text("NAME", "Ada"), 2);
        assert_eq!(doc.tables()[0].cell(0, 0), Some("Ada"));
    }
}
