//! Styles.xml parser
//!
//! Reads `w:docDefaults` and every `w:style` into a [`StyleSheet`]. Loading
//! is tolerant: a repeated style ID keeps the first definition, and
//! inheritance cycles are broken at the link that closes them. Both are
//! recorded as warnings.

use crate::docx::error::DocxResult;
use crate::docx::formatting::{apply_paragraph_property, apply_run_property, apply_table_property, read_block};
use crate::docx::reader::XmlParser;
use crate::docx::validation::{ValidationReport, WarningKind};
use doc_model::{family, StyleDefinition, StyleFamily, StyleKind, StyleProperties, StyleSheet};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashSet;

/// A `w:style` element before it is sorted into its family
#[derive(Debug, Default)]
struct ParsedStyle {
    id: String,
    name: Option<String>,
    based_on: Option<String>,
    next: Option<String>,
    properties: StyleProperties,
    is_default: bool,
    hidden: bool,
    quick_format: bool,
    priority: Option<u32>,
}

impl ParsedStyle {
    fn into_definition<F: StyleFamily>(self) -> StyleDefinition<F> {
        let name = self.name.unwrap_or_else(|| self.id.clone());
        let mut style = StyleDefinition::<F>::new(self.id, name);
        style.based_on = self.based_on.map(Into::into);
        style.next = self.next.map(Into::into);
        style.properties = self.properties;
        style.is_default = self.is_default;
        style.hidden = self.hidden;
        style.quick_format = self.quick_format;
        style.priority = self.priority;
        style
    }
}

/// Parser for styles.xml
pub struct StylesParser<'a> {
    part: &'a str,
    content: &'a str,
    report: &'a mut ValidationReport,
    seen: HashSet<String>,
}

impl<'a> StylesParser<'a> {
    pub fn new(part: &'a str, content: &'a str, report: &'a mut ValidationReport) -> Self {
        Self {
            part,
            content,
            report,
            seen: HashSet::new(),
        }
    }

    /// Parse the part into a style sheet
    pub fn parse(mut self) -> DocxResult<StyleSheet> {
        let mut sheet = StyleSheet::new();
        let mut reader = XmlParser::from_string(self.content);
        let mut buf = Vec::new();

        loop {
            match XmlParser::next_event(&mut reader, &mut buf, self.part, self.content)? {
                Event::Start(ref e) => {
                    let name = e.name();
                    match XmlParser::local_name(name.as_ref()) {
                        b"docDefaults" => sheet.defaults = self.parse_doc_defaults(&mut reader)?,
                        b"style" => {
                            let kind = XmlParser::get_w_attribute(e, "type");
                            let parsed = self.parse_style(&mut reader, e)?;
                            self.insert(&mut sheet, kind.as_deref(), parsed);
                        }
                        b"styles" => {}
                        _ => XmlParser::skip_element(&mut reader, e, self.part, self.content)?,
                    }
                }
                Event::Empty(ref e) if XmlParser::matches_element(e.name().as_ref(), "style") => {
                    let kind = XmlParser::get_w_attribute(e, "type");
                    let parsed = style_header(e);
                    self.insert(&mut sheet, kind.as_deref(), parsed);
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        for (kind, chain) in sheet.break_cycles() {
            self.report.warn(
                WarningKind::CyclicStyle,
                self.part,
                format!("{kind} style inheritance cycle {} broken", chain.join(" -> ")),
            );
        }

        tracing::debug!(styles = sheet.len(), "styles decoded");
        Ok(sheet)
    }

    fn insert(&mut self, sheet: &mut StyleSheet, kind: Option<&str>, parsed: ParsedStyle) {
        if parsed.id.is_empty() {
            self.report
                .warn(WarningKind::UnsupportedContent, self.part, "style without w:styleId dropped");
            return;
        }
        let Some(kind) = StyleKind::from_ooxml(kind) else {
            self.report.warn(
                WarningKind::UnsupportedContent,
                self.part,
                format!("style '{}' has an unknown type and was dropped", parsed.id),
            );
            return;
        };
        // Style IDs share one namespace across all families in the file
        if !self.seen.insert(parsed.id.clone()) {
            self.report.warn(
                WarningKind::DuplicateStyle,
                self.part,
                format!("style '{}' is defined more than once; the first definition is kept", parsed.id),
            );
            return;
        }

        match kind {
            StyleKind::Paragraph => insert_into::<family::Paragraph>(sheet, parsed),
            StyleKind::Character => insert_into::<family::Character>(sheet, parsed),
            StyleKind::Table => insert_into::<family::Table>(sheet, parsed),
            StyleKind::Numbering | StyleKind::List => insert_into::<family::Numbering>(sheet, parsed),
        }
    }

    fn parse_doc_defaults(&mut self, reader: &mut Reader<&[u8]>) -> DocxResult<StyleProperties> {
        let content = self.content;
        let mut defaults = StyleProperties::default();
        let mut buf = Vec::new();

        loop {
            match XmlParser::next_event(reader, &mut buf, self.part, content)? {
                Event::Start(ref e) => {
                    let name = e.name();
                    match XmlParser::local_name(name.as_ref()) {
                        b"rPrDefault" | b"pPrDefault" => {}
                        b"rPr" => read_block(reader, e, self.part, content, |child| {
                            apply_run_property(child, &mut defaults.run);
                        })?,
                        b"pPr" => read_block(reader, e, self.part, content, |child| {
                            apply_paragraph_property(child, &mut defaults.paragraph);
                        })?,
                        _ => XmlParser::skip_element(reader, e, self.part, content)?,
                    }
                }
                Event::End(ref e) if XmlParser::matches_element(e.name().as_ref(), "docDefaults") => break,
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        Ok(defaults)
    }

    fn parse_style(&mut self, reader: &mut Reader<&[u8]>, start: &BytesStart<'_>) -> DocxResult<ParsedStyle> {
        let content = self.content;
        let mut style = style_header(start);
        let mut buf = Vec::new();

        loop {
            match XmlParser::next_event(reader, &mut buf, self.part, content)? {
                Event::Start(ref e) => {
                    let name = e.name();
                    match XmlParser::local_name(name.as_ref()) {
                        b"rPr" => read_block(reader, e, self.part, content, |child| {
                            apply_run_property(child, &mut style.properties.run);
                        })?,
                        b"pPr" => read_block(reader, e, self.part, content, |child| {
                            apply_paragraph_property(child, &mut style.properties.paragraph);
                        })?,
                        b"tblPr" => read_block(reader, e, self.part, content, |child| {
                            apply_table_property(child, &mut style.properties.table);
                        })?,
                        _ => {
                            style_child(e, &mut style);
                            XmlParser::skip_element(reader, e, self.part, content)?;
                        }
                    }
                }
                Event::Empty(ref e) => style_child(e, &mut style),
                Event::End(ref e) if XmlParser::matches_element(e.name().as_ref(), "style") => break,
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        Ok(style)
    }
}

fn insert_into<F: StyleFamily>(sheet: &mut StyleSheet, parsed: ParsedStyle) {
    sheet.family_mut::<F>().insert_unchecked(parsed.into_definition());
}

fn style_header(e: &BytesStart<'_>) -> ParsedStyle {
    ParsedStyle {
        id: XmlParser::get_w_attribute(e, "styleId").unwrap_or_default(),
        is_default: XmlParser::get_w_attribute(e, "default").is_some_and(|v| XmlParser::parse_bool(&v)),
        ..Default::default()
    }
}

fn style_child(e: &BytesStart<'_>, style: &mut ParsedStyle) {
    let val = || XmlParser::get_w_attribute(e, "val");
    let name = e.name();
    match XmlParser::local_name(name.as_ref()) {
        b"name" => style.name = val(),
        b"basedOn" => style.based_on = val(),
        b"next" => style.next = val(),
        b"uiPriority" => style.priority = val().and_then(|v| v.parse().ok()),
        b"qFormat" => style.quick_format = XmlParser::parse_on_off(e),
        b"hidden" | b"semiHidden" => style.hidden |= XmlParser::parse_on_off(e),
        _ => {}
    }
}
