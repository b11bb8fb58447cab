//! Document.xml parser
//!
//! Walks `w:body` paragraph by paragraph and table by table. Comment range
//! markers are collected by raw ID while walking; matching them against the
//! comments part happens afterwards, once both parts are read.

use crate::docx::error::{DocxError, DocxResult};
use crate::docx::formatting::{apply_paragraph_property, apply_run_property, apply_table_property, read_block};
use crate::docx::reader::XmlParser;
use crate::docx::validation::{ValidationReport, WarningKind};
use doc_model::{DocumentContent, Paragraph, ParagraphProperties, Run, Table, TableProperties};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashSet;

/// Where a comment's markers were first seen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentAnchor {
    /// The `w:id` as written in the file
    pub raw_id: String,
    /// Body paragraph index, or `None` for markers inside table cells
    pub paragraph: Option<usize>,
}

/// The decoded body plus the comment markers found in it
#[derive(Debug, Default)]
pub struct DecodedBody {
    pub content: DocumentContent,
    pub anchors: Vec<CommentAnchor>,
}

/// Tracks comment ranges while walking the body. Ranges may nest and
/// interleave, so closing searches the open stack from the top.
#[derive(Debug, Default)]
struct CommentRangeTracker {
    open: Vec<String>,
    anchors: Vec<CommentAnchor>,
    seen: HashSet<String>,
}

impl CommentRangeTracker {
    fn start(&mut self, id: String, paragraph: Option<usize>) {
        if !self.open.contains(&id) {
            self.open.push(id.clone());
        }
        self.anchor(id, paragraph);
    }

    fn end(&mut self, id: &str) {
        if let Some(pos) = self.open.iter().rposition(|open| open == id) {
            self.open.remove(pos);
        }
    }

    fn reference(&mut self, id: String, paragraph: Option<usize>) {
        self.anchor(id, paragraph);
    }

    fn anchor(&mut self, raw_id: String, paragraph: Option<usize>) {
        if self.seen.insert(raw_id.clone()) {
            self.anchors.push(CommentAnchor { raw_id, paragraph });
        }
    }
}

/// Parser for document.xml
pub struct DocumentParser<'a> {
    part: &'a str,
    content: &'a str,
    report: &'a mut ValidationReport,
    body: DocumentContent,
    comments: CommentRangeTracker,
}

impl<'a> DocumentParser<'a> {
    /// Create a parser for `content`, the text of part `part`
    pub fn new(part: &'a str, content: &'a str, report: &'a mut ValidationReport) -> Self {
        Self {
            part,
            content,
            report,
            body: DocumentContent::new(),
            comments: CommentRangeTracker::default(),
        }
    }

    /// Parse the whole part. Malformed XML is a fatal error.
    pub fn parse(mut self) -> DocxResult<DecodedBody> {
        let mut reader = XmlParser::from_string(self.content);
        let mut buf = Vec::new();

        loop {
            match XmlParser::next_event(&mut reader, &mut buf, self.part, self.content)? {
                Event::Start(ref e) if XmlParser::matches_element(e.name().as_ref(), "body") => {
                    self.parse_body(&mut reader)?;
                    break;
                }
                Event::Empty(ref e) if XmlParser::matches_element(e.name().as_ref(), "body") => break,
                Event::Eof => return Err(DocxError::parse(self.part, "missing <w:body>")),
                _ => {}
            }
            buf.clear();
        }

        for id in std::mem::take(&mut self.comments.open) {
            self.report.warn(
                WarningKind::UnclosedCommentRange,
                self.part,
                format!("comment range {id} is never closed"),
            );
        }

        tracing::debug!(
            paragraphs = self.body.paragraphs().len(),
            tables = self.body.tables().len(),
            comment_markers = self.comments.anchors.len(),
            "document body decoded"
        );
        Ok(DecodedBody {
            content: self.body,
            anchors: self.comments.anchors,
        })
    }

    fn unexpected_eof(&self, inside: &str) -> DocxError {
        DocxError::parse(self.part, format!("unexpected end of file inside <w:{inside}>"))
    }

    fn unsupported(&mut self, element: &[u8]) {
        self.report.warn(
            WarningKind::UnsupportedContent,
            self.part,
            format!("<{}> is not supported and was dropped", String::from_utf8_lossy(element)),
        );
    }

    fn parse_body(&mut self, reader: &mut Reader<&[u8]>) -> DocxResult<()> {
        let content = self.content;
        let mut buf = Vec::new();

        loop {
            let event_start = reader.buffer_position() as usize;
            match XmlParser::next_event(reader, &mut buf, self.part, content)? {
                Event::Start(ref e) => {
                    let name = e.name();
                    match XmlParser::local_name(name.as_ref()) {
                        b"p" => {
                            let index = self.body.paragraphs().len();
                            let paragraph = self.parse_paragraph(reader, Some(index))?;
                            self.body.push_paragraph(paragraph);
                        }
                        b"tbl" => {
                            let table = self.parse_table(reader)?;
                            self.body.push_table(table);
                        }
                        b"sectPr" => {
                            XmlParser::skip_element(reader, e, self.part, content)?;
                            let event_end = reader.buffer_position() as usize;
                            if let Some(raw) = content.get(event_start..event_end) {
                                self.keep_section_properties(raw);
                            }
                        }
                        // Wrappers whose children are ordinary body content
                        b"sdt" | b"sdtContent" | b"customXml" | b"ins" | b"smartTag" => {}
                        b"sdtPr" | b"sdtEndPr" | b"del" | b"moveFrom" | b"moveTo" => {
                            XmlParser::skip_element(reader, e, self.part, content)?;
                        }
                        b"commentRangeStart" => {
                            if let Some(id) = XmlParser::get_w_attribute(e, "id") {
                                self.comments.start(id, Some(self.body.paragraphs().len()));
                            }
                            XmlParser::skip_element(reader, e, self.part, content)?;
                        }
                        b"commentRangeEnd" => {
                            if let Some(id) = XmlParser::get_w_attribute(e, "id") {
                                self.comments.end(&id);
                            }
                            XmlParser::skip_element(reader, e, self.part, content)?;
                        }
                        other => {
                            self.unsupported(other);
                            XmlParser::skip_element(reader, e, self.part, content)?;
                        }
                    }
                }
                Event::Empty(ref e) => {
                    let name = e.name();
                    match XmlParser::local_name(name.as_ref()) {
                        b"p" => {
                            self.body.push_paragraph(Paragraph::new());
                        }
                        b"sectPr" => {
                            let event_end = reader.buffer_position() as usize;
                            if let Some(raw) = content.get(event_start..event_end) {
                                self.keep_section_properties(raw);
                            }
                        }
                        // A range opening between paragraphs belongs to the next one
                        b"commentRangeStart" => {
                            if let Some(id) = XmlParser::get_w_attribute(e, "id") {
                                self.comments.start(id, Some(self.body.paragraphs().len()));
                            }
                        }
                        b"commentRangeEnd" => {
                            if let Some(id) = XmlParser::get_w_attribute(e, "id") {
                                self.comments.end(&id);
                            }
                        }
                        _ => {}
                    }
                }
                Event::End(ref e) if XmlParser::matches_element(e.name().as_ref(), "body") => break,
                Event::Eof => return Err(self.unexpected_eof("body")),
                _ => {}
            }
            buf.clear();
        }
        Ok(())
    }

    fn keep_section_properties(&mut self, raw: &str) {
        if XmlParser::uses_only_prefixes(raw, &["w", "r"]) {
            self.body.set_section_properties(Some(raw.to_string()));
        } else {
            self.report.warn(
                WarningKind::UnsupportedContent,
                self.part,
                "section properties use extension namespaces; a default page setup will be written",
            );
        }
    }

    /// Parse a `w:p` whose start tag was just read. `index` is the body
    /// paragraph index, `None` inside table cells.
    fn parse_paragraph(&mut self, reader: &mut Reader<&[u8]>, index: Option<usize>) -> DocxResult<Paragraph> {
        let content = self.content;
        let mut paragraph = Paragraph::new();
        let mut runs = Vec::new();
        let mut buf = Vec::new();

        loop {
            match XmlParser::next_event(reader, &mut buf, self.part, content)? {
                Event::Start(ref e) => {
                    let name = e.name();
                    match XmlParser::local_name(name.as_ref()) {
                        b"pPr" => {
                            let (style, properties) = self.parse_paragraph_properties(reader, e)?;
                            paragraph.style = style.map(Into::into);
                            paragraph.properties = properties;
                        }
                        b"r" => {
                            if let Some(run) = self.parse_run(reader, index)? {
                                runs.push(run);
                            }
                        }
                        // Wrappers whose runs are read as ordinary runs
                        b"hyperlink" | b"ins" | b"smartTag" | b"sdt" | b"sdtContent" | b"fldSimple"
                        | b"customXml" | b"moveTo" | b"dir" | b"bdo" => {}
                        // Deleted content and wrapper metadata
                        b"del" | b"moveFrom" | b"sdtPr" | b"sdtEndPr" | b"rPr" => {
                            XmlParser::skip_element(reader, e, self.part, content)?;
                        }
                        b"commentRangeStart" => {
                            if let Some(id) = XmlParser::get_w_attribute(e, "id") {
                                self.comments.start(id, index);
                            }
                            XmlParser::skip_element(reader, e, self.part, content)?;
                        }
                        b"commentRangeEnd" => {
                            if let Some(id) = XmlParser::get_w_attribute(e, "id") {
                                self.comments.end(&id);
                            }
                            XmlParser::skip_element(reader, e, self.part, content)?;
                        }
                        other => {
                            self.unsupported(other);
                            XmlParser::skip_element(reader, e, self.part, content)?;
                        }
                    }
                }
                Event::Empty(ref e) => {
                    let name = e.name();
                    match XmlParser::local_name(name.as_ref()) {
                        b"r" => runs.push(Run::default()),
                        b"commentRangeStart" => {
                            if let Some(id) = XmlParser::get_w_attribute(e, "id") {
                                self.comments.start(id, index);
                            }
                        }
                        b"commentRangeEnd" => {
                            if let Some(id) = XmlParser::get_w_attribute(e, "id") {
                                self.comments.end(&id);
                            }
                        }
                        _ => {}
                    }
                }
                Event::End(ref e) if XmlParser::matches_element(e.name().as_ref(), "p") => break,
                Event::Eof => return Err(self.unexpected_eof("p")),
                _ => {}
            }
            buf.clear();
        }

        paragraph.set_runs(runs);
        Ok(paragraph)
    }

    fn parse_paragraph_properties(
        &mut self,
        reader: &mut Reader<&[u8]>,
        start: &BytesStart<'_>,
    ) -> DocxResult<(Option<String>, ParagraphProperties)> {
        let mut style = None;
        let mut properties = ParagraphProperties::default();
        let mut section_break = false;
        read_block(reader, start, self.part, self.content, |child| {
            let name = child.name();
            match XmlParser::local_name(name.as_ref()) {
                b"pStyle" => style = XmlParser::get_w_attribute(child, "val"),
                b"sectPr" => section_break = true,
                _ => {
                    apply_paragraph_property(child, &mut properties);
                }
            }
        })?;
        if section_break {
            self.report.warn(
                WarningKind::UnsupportedContent,
                self.part,
                "section break inside a paragraph was dropped; only the final section is kept",
            );
        }
        Ok((style, properties))
    }

    /// Parse a `w:r`. A run that only carries a comment reference is a
    /// marker, not content, and yields `None`.
    fn parse_run(&mut self, reader: &mut Reader<&[u8]>, index: Option<usize>) -> DocxResult<Option<Run>> {
        let content = self.content;
        let mut run = Run::default();
        let mut has_reference = false;
        let mut buf = Vec::new();

        loop {
            match XmlParser::next_event(reader, &mut buf, self.part, content)? {
                Event::Start(ref e) => {
                    let name = e.name();
                    match XmlParser::local_name(name.as_ref()) {
                        b"rPr" => {
                            let mut style = None;
                            read_block(reader, e, self.part, content, |child| {
                                if XmlParser::matches_element(child.name().as_ref(), "rStyle") {
                                    style = XmlParser::get_w_attribute(child, "val");
                                } else {
                                    apply_run_property(child, &mut run.properties);
                                }
                            })?;
                            run.style = style.map(Into::into);
                        }
                        b"t" => {
                            let text = self.read_text(reader)?;
                            run.text.push_str(&text);
                        }
                        b"drawing" | b"pict" | b"object" | b"AlternateContent" | b"ruby" => {
                            self.unsupported(name.as_ref());
                            XmlParser::skip_element(reader, e, self.part, content)?;
                        }
                        // delText, instrText, fldChar and friends
                        _ => XmlParser::skip_element(reader, e, self.part, content)?,
                    }
                }
                Event::Empty(ref e) => {
                    let name = e.name();
                    match XmlParser::local_name(name.as_ref()) {
                        b"tab" | b"ptab" => run.text.push('\t'),
                        b"br" => run.text.push('\n'),
                        b"cr" => run.text.push('\r'),
                        b"noBreakHyphen" => run.text.push('\u{2011}'),
                        b"softHyphen" => run.text.push('\u{00AD}'),
                        b"commentReference" => {
                            has_reference = true;
                            if let Some(id) = XmlParser::get_w_attribute(e, "id") {
                                self.comments.reference(id, index);
                            }
                        }
                        b"footnoteReference" | b"endnoteReference" | b"drawing" | b"pict" | b"object" | b"sym" => {
                            self.unsupported(name.as_ref());
                        }
                        _ => {}
                    }
                }
                Event::End(_) => break,
                Event::Eof => return Err(self.unexpected_eof("r")),
                _ => {}
            }
            buf.clear();
        }

        if has_reference && run.text.is_empty() {
            return Ok(None);
        }
        Ok(Some(run))
    }

    /// Text of a `w:t` whose start tag was just read
    fn read_text(&mut self, reader: &mut Reader<&[u8]>) -> DocxResult<String> {
        let mut text = String::new();
        let mut buf = Vec::new();
        loop {
            match XmlParser::next_event(reader, &mut buf, self.part, self.content)? {
                Event::Text(ref e) => text.push_str(&XmlParser::text(e, self.part)?),
                Event::CData(ref e) => text.push_str(&String::from_utf8_lossy(e)),
                Event::End(_) => break,
                Event::Eof => return Err(self.unexpected_eof("t")),
                _ => {}
            }
            buf.clear();
        }
        Ok(text)
    }

    fn parse_table(&mut self, reader: &mut Reader<&[u8]>) -> DocxResult<Table> {
        let content = self.content;
        let mut style = None;
        let mut properties = TableProperties::default();
        let mut grid_columns = 0usize;
        let mut rows: Vec<Vec<String>> = Vec::new();
        let mut buf = Vec::new();

        loop {
            match XmlParser::next_event(reader, &mut buf, self.part, content)? {
                Event::Start(ref e) => {
                    let name = e.name();
                    match XmlParser::local_name(name.as_ref()) {
                        b"tblPr" => {
                            read_block(reader, e, self.part, content, |child| {
                                if XmlParser::matches_element(child.name().as_ref(), "tblStyle") {
                                    style = XmlParser::get_w_attribute(child, "val");
                                } else {
                                    apply_table_property(child, &mut properties);
                                }
                            })?;
                        }
                        b"tblGrid" => {
                            read_block(reader, e, self.part, content, |child| {
                                if XmlParser::matches_element(child.name().as_ref(), "gridCol") {
                                    grid_columns += 1;
                                }
                            })?;
                        }
                        b"tr" => rows.push(self.parse_row(reader)?),
                        b"sdt" | b"sdtContent" | b"customXml" => {}
                        _ => XmlParser::skip_element(reader, e, self.part, content)?,
                    }
                }
                Event::End(ref e) if XmlParser::matches_element(e.name().as_ref(), "tbl") => break,
                Event::Eof => return Err(self.unexpected_eof("tbl")),
                _ => {}
            }
            buf.clear();
        }

        let columns = if grid_columns > 0 {
            grid_columns
        } else {
            rows.iter().map(Vec::len).max().unwrap_or(0)
        };
        let ragged = rows.iter().filter(|row| row.len() != columns).count();
        if ragged > 0 {
            self.report.warn(
                WarningKind::RaggedTable,
                self.part,
                format!(
                    "table {}: {ragged} row(s) padded or truncated to {columns} cells",
                    self.body.tables().len()
                ),
            );
        }

        let mut table = Table::with_columns(rows, columns);
        table.style = style.map(Into::into);
        table.properties = properties;
        Ok(table)
    }

    fn parse_row(&mut self, reader: &mut Reader<&[u8]>) -> DocxResult<Vec<String>> {
        let content = self.content;
        let mut cells = Vec::new();
        let mut buf = Vec::new();

        loop {
            match XmlParser::next_event(reader, &mut buf, self.part, content)? {
                Event::Start(ref e) => {
                    let name = e.name();
                    match XmlParser::local_name(name.as_ref()) {
                        b"tc" => {
                            let (text, span) = self.parse_cell(reader)?;
                            cells.push(text);
                            // Spanned grid cells read as empty cells
                            cells.extend(std::iter::repeat(String::new()).take(span.saturating_sub(1)));
                        }
                        b"sdt" | b"sdtContent" | b"customXml" => {}
                        _ => XmlParser::skip_element(reader, e, self.part, content)?,
                    }
                }
                Event::End(ref e) if XmlParser::matches_element(e.name().as_ref(), "tr") => break,
                Event::Eof => return Err(self.unexpected_eof("tr")),
                _ => {}
            }
            buf.clear();
        }
        Ok(cells)
    }

    /// Cell text (paragraphs joined with `\n`) and grid span
    fn parse_cell(&mut self, reader: &mut Reader<&[u8]>) -> DocxResult<(String, usize)> {
        let content = self.content;
        let mut paragraphs: Vec<String> = Vec::new();
        let mut span = 1usize;
        let mut buf = Vec::new();

        loop {
            match XmlParser::next_event(reader, &mut buf, self.part, content)? {
                Event::Start(ref e) => {
                    let name = e.name();
                    match XmlParser::local_name(name.as_ref()) {
                        b"tcPr" => {
                            read_block(reader, e, self.part, content, |child| {
                                if XmlParser::matches_element(child.name().as_ref(), "gridSpan") {
                                    if let Some(n) = XmlParser::get_w_attribute(child, "val").and_then(|v| v.parse().ok()) {
                                        span = usize::max(n, 1);
                                    }
                                }
                            })?;
                        }
                        b"p" => {
                            let paragraph = self.parse_paragraph(reader, None)?;
                            paragraphs.push(paragraph.text().to_string());
                        }
                        b"tbl" => {
                            self.unsupported(b"nested w:tbl");
                            XmlParser::skip_element(reader, e, self.part, content)?;
                        }
                        b"sdt" | b"sdtContent" | b"customXml" => {}
                        _ => XmlParser::skip_element(reader, e, self.part, content)?,
                    }
                }
                Event::Empty(ref e) if XmlParser::matches_element(e.name().as_ref(), "p") => {
                    paragraphs.push(String::new());
                }
                Event::End(ref e) if XmlParser::matches_element(e.name().as_ref(), "tc") => break,
                Event::Eof => return Err(self.unexpected_eof("tc")),
                _ => {}
            }
            buf.clear();
        }
        Ok((paragraphs.join("\n"), span))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:body>{body}</w:body></w:document>"#
        )
    }

    fn decode(body: &str) -> (DecodedBody, ValidationReport) {
        let xml = wrap(body);
        let mut report = ValidationReport::new();
        let decoded = DocumentParser::new("word/document.xml", &xml, &mut report).parse().unwrap();
        (decoded, report)
    }

    #[test]
    fn test_paragraphs_and_runs() {
        let (decoded, report) = decode(
            r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/><w:jc w:val="center"/></w:pPr><w:r><w:t>Title</w:t></w:r></w:p>
<w:p><w:r><w:rPr><w:b/><w:sz w:val="24"/></w:rPr><w:t xml:space="preserve">Bold </w:t></w:r><w:r><w:t>plain</w:t><w:tab/><w:t>&amp; more</w:t></w:r></w:p>
<w:p/>"#,
        );
        assert!(report.is_empty());

        let content = &decoded.content;
        assert_eq!(content.paragraphs().len(), 3);
        let title = &content.paragraphs()[0];
        assert_eq!(title.text(), "Title");
        assert_eq!(title.style.as_ref().map(|s| s.as_str()), Some("Heading1"));
        assert_eq!(title.properties.alignment, Some(doc_model::Alignment::Center));

        let body = &content.paragraphs()[1];
        assert_eq!(body.runs().len(), 2);
        assert_eq!(body.runs()[0].text, "Bold ");
        assert_eq!(body.runs()[0].properties.bold, Some(true));
        assert_eq!(body.runs()[0].properties.font_size, Some(12.0));
        assert_eq!(body.runs()[1].text, "plain\t& more");
        assert_eq!(content.text(), "Title\nBold plain\t& more\n");
    }

    #[test]
    fn test_wrapped_runs_are_read_and_deletions_ignored() {
        let (decoded, _) = decode(
            r#"<w:p><w:hyperlink r:id="rId5"><w:r><w:t>link</w:t></w:r></w:hyperlink><w:ins w:id="1" w:author="A"><w:r><w:t> added</w:t></w:r></w:ins><w:del w:id="2" w:author="A"><w:r><w:delText> removed</w:delText></w:r></w:del></w:p>"#,
        );
        assert_eq!(decoded.content.paragraphs()[0].text(), "link added");
    }

    #[test]
    fn test_drawings_are_skipped_with_warning() {
        let (decoded, report) = decode(
            r#"<w:p><w:r><w:t>before</w:t></w:r><w:r><w:drawing><wp:inline><w:p><w:r><w:t>inner</w:t></w:r></w:p></wp:inline></w:drawing></w:r><w:r><w:t>after</w:t></w:r></w:p>"#,
        );
        assert_eq!(decoded.content.paragraphs().len(), 1);
        assert_eq!(decoded.content.paragraphs()[0].text(), "beforeafter");
        assert!(report.has(WarningKind::UnsupportedContent));
    }

    #[test]
    fn test_comment_markers() {
        let (decoded, report) = decode(
            r#"<w:p><w:r><w:t>first</w:t></w:r></w:p>
<w:p><w:commentRangeStart w:id="0"/><w:commentRangeStart w:id="1"/><w:r><w:t>Body text.</w:t></w:r><w:commentRangeEnd w:id="0"/><w:r><w:rPr><w:rStyle w:val="CommentReference"/></w:rPr><w:commentReference w:id="0"/></w:r></w:p>
<w:p><w:commentRangeEnd w:id="1"/><w:r><w:commentReference w:id="1"/></w:r><w:commentRangeStart w:id="9"/></w:p>"#,
        );
        let anchors = &decoded.anchors;
        assert_eq!(
            anchors,
            &vec![
                CommentAnchor { raw_id: "0".into(), paragraph: Some(1) },
                CommentAnchor { raw_id: "1".into(), paragraph: Some(1) },
                CommentAnchor { raw_id: "9".into(), paragraph: Some(2) },
            ]
        );
        // Reference-only runs are markers, not content
        assert_eq!(decoded.content.paragraphs()[1].runs().len(), 1);
        assert!(decoded.content.paragraphs()[2].runs().is_empty());
        assert_eq!(report.by_kind(WarningKind::UnclosedCommentRange).len(), 1);
    }

    #[test]
    fn test_table_with_span_and_ragged_row() {
        let (decoded, report) = decode(
            r#"<w:tbl><w:tblPr><w:tblStyle w:val="TableGrid"/><w:tblW w:w="5000" w:type="dxa"/></w:tblPr>
<w:tblGrid><w:gridCol w:w="1000"/><w:gridCol w:w="1000"/><w:gridCol w:w="1000"/></w:tblGrid>
<w:tr><w:tc><w:p><w:r><w:t>a</w:t></w:r></w:p></w:tc><w:tc><w:p><w:r><w:t>b</w:t></w:r></w:p><w:p><w:r><w:t>c</w:t></w:r></w:p></w:tc><w:tc><w:p/></w:tc></w:tr>
<w:tr><w:tc><w:tcPr><w:gridSpan w:val="2"/></w:tcPr><w:p><w:r><w:t>wide</w:t></w:r></w:p></w:tc><w:tc><w:p/></w:tc></w:tr>
<w:tr><w:tc><w:p><w:r><w:t>short</w:t></w:r></w:p></w:tc></w:tr>
</w:tbl><w:p/>"#,
        );
        let table = &decoded.content.tables()[0];
        assert_eq!(table.column_count(), 3);
        assert!(table.is_rectangular());
        assert_eq!(table.cell(0, 1), Some("b\nc"));
        assert_eq!(table.cell(1, 0), Some("wide"));
        assert_eq!(table.cell(1, 1), Some(""));
        assert_eq!(table.cell(2, 2), Some(""));
        assert_eq!(table.style.as_ref().map(|s| s.as_str()), Some("TableGrid"));
        assert_eq!(table.properties.width, Some(5000));
        assert_eq!(report.by_kind(WarningKind::RaggedTable).len(), 1);
        assert_eq!(decoded.content.body().len(), 2);
    }

    #[test]
    fn test_section_properties_kept_verbatim() {
        let sect = r#"<w:sectPr><w:headerReference w:type="default" r:id="rId8"/><w:pgSz w:w="11906" w:h="16838"/></w:sectPr>"#;
        let (decoded, _) = decode(&format!("<w:p/>{sect}"));
        assert_eq!(decoded.content.section_properties(), Some(sect));

        let (decoded, report) = decode(r#"<w:p/><w:sectPr><w14:ext w:val="1"/></w:sectPr>"#);
        assert_eq!(decoded.content.section_properties(), None);
        assert!(report.has(WarningKind::UnsupportedContent));
    }

    #[test]
    fn test_comment_markers_in_start_tag_form() {
        let (decoded, report) = decode(
            r#"<w:commentRangeStart w:id="3"></w:commentRangeStart>
<w:p><w:commentRangeStart w:id="4"><w:extra/></w:commentRangeStart><w:r><w:t>marked</w:t></w:r><w:commentRangeEnd w:id="4"></w:commentRangeEnd><w:commentRangeEnd w:id="3"></w:commentRangeEnd></w:p>"#,
        );
        assert_eq!(
            decoded.anchors,
            vec![
                CommentAnchor { raw_id: "3".into(), paragraph: Some(0) },
                CommentAnchor { raw_id: "4".into(), paragraph: Some(0) },
            ]
        );
        assert!(!report.has(WarningKind::UnsupportedContent));
        assert!(!report.has(WarningKind::UnclosedCommentRange));
    }

    #[test]
    fn test_carriage_return_and_empty_runs() {
        let (decoded, _) = decode(r#"<w:p><w:r><w:t>a</w:t><w:cr/><w:t>b</w:t><w:br/></w:r><w:r/><w:r><w:rPr><w:b/></w:rPr></w:r></w:p>"#);
        let runs = decoded.content.paragraphs()[0].runs();
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0].text, "a\rb\n");
        assert!(runs[1].text.is_empty());
        assert!(runs[2].text.is_empty());
        assert_eq!(runs[2].properties.bold, Some(true));
    }

    #[test]
    fn test_section_break_inside_paragraph_is_reported() {
        let (decoded, report) = decode(
            r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/><w:sectPr><w:pgSz w:w="11906" w:h="16838"/></w:sectPr></w:pPr><w:r><w:t>end of section</w:t></w:r></w:p>"#,
        );
        let paragraph = &decoded.content.paragraphs()[0];
        assert_eq!(paragraph.style.as_ref().map(|s| s.as_str()), Some("Heading1"));
        assert_eq!(decoded.content.section_properties(), None);
        let warnings = report.by_kind(WarningKind::UnsupportedContent);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("section break"));
    }

    #[test]
    fn test_malformed_xml_reports_position() {
        let xml = wrap("<w:p><w:r><w:t>oops</w:r></w:p>");
        let mut report = ValidationReport::new();
        let err = DocumentParser::new("word/document.xml", &xml, &mut report).parse().unwrap_err();
        match err {
            DocxError::Parse { part, position, .. } => {
                assert_eq!(part, "word/document.xml");
                assert_eq!(position.map(|p| p.line), Some(2));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_body() {
        let mut report = ValidationReport::new();
        let result = DocumentParser::new("word/document.xml", "<w:document/>", &mut report).parse();
        assert!(matches!(result, Err(DocxError::Parse { .. })));
    }
}
