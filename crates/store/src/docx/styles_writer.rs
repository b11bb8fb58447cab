//! Styles.xml writer
//!
//! Generates styles.xml from the document's style sheet.

use crate::docx::formatting::{write_paragraph_properties, write_run_properties, write_table_properties};
use crate::docx::namespaces;
use crate::docx::reader::{escape_xml, XML_DECLARATION};
use crate::docx::validation::{ValidationReport, WarningKind};
use doc_model::{family, PropertyBag, StyleDefinition, StyleFamily, StyleSheet};
use std::collections::HashSet;

const STYLES_PART: &str = "word/styles.xml";

/// Writer for styles.xml
#[derive(Debug, Default)]
pub struct StylesWriter {
    written: HashSet<String>,
}

impl StylesWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate styles.xml content.
    ///
    /// Word requires style IDs to be unique across families, so a style
    /// whose ID was already written by an earlier family is skipped.
    pub fn write(mut self, sheet: &StyleSheet, report: &mut ValidationReport) -> String {
        let mut xml = String::new();
        xml.push_str(XML_DECLARATION);
        xml.push('\n');
        xml.push_str(&format!(
            r#"<w:styles xmlns:w="{}" xmlns:r="{}">"#,
            namespaces::W,
            namespaces::R,
        ));

        self.write_doc_defaults(&mut xml, sheet);
        self.write_family::<family::Paragraph>(&mut xml, sheet, report);
        self.write_family::<family::Character>(&mut xml, sheet, report);
        self.write_family::<family::Table>(&mut xml, sheet, report);
        self.write_family::<family::Numbering>(&mut xml, sheet, report);
        self.write_family::<family::List>(&mut xml, sheet, report);

        xml.push_str("</w:styles>");
        tracing::debug!(styles = self.written.len(), "styles encoded");
        xml
    }

    fn write_doc_defaults(&self, xml: &mut String, sheet: &StyleSheet) {
        xml.push_str("<w:docDefaults>");
        xml.push_str("<w:rPrDefault>");
        write_run_properties(xml, None, &sheet.defaults.run);
        xml.push_str("</w:rPrDefault>");
        xml.push_str("<w:pPrDefault>");
        write_paragraph_properties(xml, None, &sheet.defaults.paragraph);
        xml.push_str("</w:pPrDefault>");
        xml.push_str("</w:docDefaults>");
    }

    fn write_family<F: StyleFamily>(&mut self, xml: &mut String, sheet: &StyleSheet, report: &mut ValidationReport) {
        for style in sheet.family::<F>().iter() {
            if !self.written.insert(style.id.as_str().to_string()) {
                report.warn(
                    WarningKind::DuplicateStyle,
                    STYLES_PART,
                    format!("{} style '{}' reuses an ID already written and was skipped", F::KIND, style.id),
                );
                continue;
            }
            write_style(xml, style);
        }
    }
}

fn write_style<F: StyleFamily>(xml: &mut String, style: &StyleDefinition<F>) {
    xml.push_str(&format!(
        r#"<w:style w:type="{}" w:styleId="{}""#,
        F::KIND.as_ooxml(),
        escape_xml(style.id.as_str())
    ));
    if style.is_default {
        xml.push_str(r#" w:default="1""#);
    }
    xml.push('>');

    xml.push_str(&format!(r#"<w:name w:val="{}"/>"#, escape_xml(&style.name)));
    if let Some(base) = &style.based_on {
        xml.push_str(&format!(r#"<w:basedOn w:val="{}"/>"#, escape_xml(base.as_str())));
    }
    if let Some(next) = &style.next {
        xml.push_str(&format!(r#"<w:next w:val="{}"/>"#, escape_xml(next.as_str())));
    }
    if let Some(priority) = style.priority {
        xml.push_str(&format!(r#"<w:uiPriority w:val="{priority}"/>"#));
    }
    if style.hidden {
        xml.push_str("<w:semiHidden/>");
    }
    if style.quick_format {
        xml.push_str("<w:qFormat/>");
    }

    let props = &style.properties;
    write_paragraph_properties(xml, None, &props.paragraph);
    write_run_properties(xml, None, &props.run);
    if !props.table.is_empty() {
        write_table_properties(xml, None, &props.table);
    }
    xml.push_str("</w:style>");
}
