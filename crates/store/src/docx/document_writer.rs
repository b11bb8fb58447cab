//! Document.xml writer
//!
//! Converts the document body to DOCX document.xml format. Comment markers
//! come from [`CommentsWriter`] so both parts agree on IDs.

use crate::docx::comments_io::CommentsWriter;
use crate::docx::formatting::{write_paragraph_properties, write_run_properties, write_table_properties};
use crate::docx::namespaces;
use crate::docx::reader::{has_invalid_xml_chars, write_run_text, XmlParser, XML_DECLARATION};
use crate::docx::validation::{ValidationReport, WarningKind};
use doc_model::{BodyElement, CommentId, Document, Paragraph, Run, Table};
use quick_xml::events::Event;
use std::collections::HashSet;

const DOCUMENT_PART: &str = "word/document.xml";

/// US Letter portrait with one inch margins
const DEFAULT_SECTION: &str = concat!(
    r#"<w:sectPr><w:pgSz w:w="12240" w:h="15840"/>"#,
    r#"<w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440" w:header="720" w:footer="720" w:gutter="0"/>"#,
    r#"<w:cols w:space="720"/><w:docGrid w:linePitch="360"/></w:sectPr>"#
);

/// Text width of the default section, in twips
const DEFAULT_TEXT_WIDTH: u32 = 9360;

/// Writer for document.xml
pub struct DocumentXmlWriter<'a> {
    document: &'a Document,
    report: &'a mut ValidationReport,
    /// Relationship IDs that resolve from the new `document.xml.rels`
    relationship_ids: HashSet<String>,
}

impl<'a> DocumentXmlWriter<'a> {
    pub fn new(document: &'a Document, report: &'a mut ValidationReport) -> Self {
        Self {
            document,
            report,
            relationship_ids: HashSet::new(),
        }
    }

    /// Declare the relationship IDs a preserved section block may reference
    pub fn with_relationships(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.relationship_ids = ids.into_iter().collect();
        self
    }

    /// Generate document.xml content
    pub fn write(mut self) -> String {
        let mut xml = String::new();
        xml.push_str(XML_DECLARATION);
        xml.push('\n');
        xml.push_str(&format!(
            r#"<w:document xmlns:w="{}" xmlns:r="{}">"#,
            namespaces::W,
            namespaces::R,
        ));
        xml.push_str("<w:body>");

        let content = self.document.content();
        for element in content.body() {
            match *element {
                BodyElement::Paragraph(i) => {
                    if let Some(paragraph) = content.paragraph(i) {
                        self.write_paragraph(&mut xml, paragraph);
                    }
                }
                BodyElement::Table(i) => {
                    if let Some(table) = content.table(i) {
                        self.write_table(&mut xml, i, table);
                    }
                }
            }
        }

        self.write_section(&mut xml);
        xml.push_str("</w:body>");
        xml.push_str("</w:document>");

        tracing::debug!(
            paragraphs = content.paragraphs().len(),
            tables = content.tables().len(),
            "document body encoded"
        );
        xml
    }

    fn write_paragraph(&mut self, xml: &mut String, paragraph: &Paragraph) {
        xml.push_str("<w:p>");
        write_paragraph_properties(
            xml,
            paragraph.style.as_ref().map(|s| s.as_str()),
            &paragraph.properties,
        );

        let comments = self.emitted_comments(paragraph);
        for id in &comments {
            xml.push_str(&CommentsWriter::range_start(*id));
        }
        for (r, run) in paragraph.runs().iter().enumerate() {
            if has_invalid_xml_chars(&run.text) {
                self.invalid_text(format!("run {r} of a paragraph"));
            }
            write_run(xml, run);
        }
        for id in &comments {
            xml.push_str(&CommentsWriter::range_end(*id));
            xml.push_str(&CommentsWriter::reference_run(*id));
        }

        xml.push_str("</w:p>");
    }

    /// Comment IDs of `paragraph` that exist in the comment manager
    fn emitted_comments(&mut self, paragraph: &Paragraph) -> Vec<CommentId> {
        let manager = self.document.comments();
        let mut ids = Vec::with_capacity(paragraph.comments.len());
        for id in &paragraph.comments {
            if manager.contains(*id) {
                ids.push(*id);
            } else {
                self.report.warn(
                    WarningKind::DanglingCommentReference,
                    DOCUMENT_PART,
                    format!("paragraph references missing comment {id}, markers skipped"),
                );
            }
        }
        ids
    }

    fn write_table(&mut self, xml: &mut String, index: usize, table: &Table) {
        let columns = table.column_count();
        if columns == 0 || table.rows().is_empty() {
            self.report.warn(
                WarningKind::UnsupportedContent,
                DOCUMENT_PART,
                format!("table {index} has no cells and was not written"),
            );
            return;
        }

        let total_width = table.properties.width.unwrap_or(DEFAULT_TEXT_WIDTH);
        let column_width = total_width / columns as u32;

        xml.push_str("<w:tbl>");
        write_table_properties(xml, table.style.as_ref().map(|s| s.as_str()), &table.properties);
        xml.push_str("<w:tblGrid>");
        for _ in 0..columns {
            xml.push_str(&format!(r#"<w:gridCol w:w="{column_width}"/>"#));
        }
        xml.push_str("</w:tblGrid>");

        for (r, row) in table.rows().iter().enumerate() {
            if row.len() != columns {
                self.report.warn(
                    WarningKind::RaggedTable,
                    DOCUMENT_PART,
                    format!("table {index} row {r} has {} cells, written as {columns}", row.len()),
                );
            }
            xml.push_str("<w:tr>");
            for c in 0..columns {
                let text = row.get(c).map(String::as_str).unwrap_or("");
                if has_invalid_xml_chars(text) {
                    self.invalid_text(format!("table {index} cell ({r}, {c})"));
                }
                write_cell(xml, text, column_width);
            }
            xml.push_str("</w:tr>");
        }

        xml.push_str("</w:tbl>");
    }

    fn invalid_text(&mut self, location: String) {
        self.report.warn(
            WarningKind::InvalidXmlCharacter,
            DOCUMENT_PART,
            format!("{location} holds characters XML cannot represent; they were left out"),
        );
    }

    fn write_section(&mut self, xml: &mut String) {
        match self.document.content().section_properties() {
            Some(section) => {
                let missing: Vec<String> = section_relationship_ids(section)
                    .into_iter()
                    .filter(|id| !self.relationship_ids.contains(id))
                    .collect();
                if missing.is_empty() {
                    xml.push_str(section);
                } else {
                    self.report.warn(
                        WarningKind::DanglingRelationship,
                        DOCUMENT_PART,
                        format!(
                            "section properties reference missing relationships {}, default page setup written",
                            missing.join(", ")
                        ),
                    );
                    xml.push_str(DEFAULT_SECTION);
                }
            }
            None => xml.push_str(DEFAULT_SECTION),
        }
    }
}

/// Empty runs are written too; their properties are content
fn write_run(xml: &mut String, run: &Run) {
    xml.push_str("<w:r>");
    write_run_properties(xml, run.style.as_ref().map(|s| s.as_str()), &run.properties);
    write_run_text(xml, &run.text);
    xml.push_str("</w:r>");
}

/// A cell holds one paragraph per line of its text
fn write_cell(xml: &mut String, text: &str, width: u32) {
    xml.push_str(&format!(r#"<w:tc><w:tcPr><w:tcW w:w="{width}" w:type="dxa"/></w:tcPr>"#));
    for line in text.split('\n') {
        xml.push_str("<w:p>");
        if !line.is_empty() {
            xml.push_str("<w:r>");
            write_run_text(xml, line);
            xml.push_str("</w:r>");
        }
        xml.push_str("</w:p>");
    }
    xml.push_str("</w:tc>");
}

/// Every `r:` attribute value in a section properties block
fn section_relationship_ids(section: &str) -> Vec<String> {
    let mut reader = XmlParser::from_string(section);
    let mut buf = Vec::new();
    let mut ids = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                for attr in e.attributes().filter_map(|a| a.ok()) {
                    if attr.key.as_ref().starts_with(b"r:") {
                        ids.push(String::from_utf8_lossy(&attr.value).into_owned());
                    }
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    ids
}
