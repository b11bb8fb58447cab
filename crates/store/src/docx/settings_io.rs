//! Settings.xml import/export
//!
//! Only a handful of settings are modeled. Everything else in the part is
//! kept by writing the source XML back unchanged for as long as the modeled
//! values are not touched.

use crate::docx::error::DocxResult;
use crate::docx::namespaces;
use crate::docx::reader::{XmlParser, XML_DECLARATION};
use doc_model::{DocumentSettings, SettingsPart};
use quick_xml::events::Event;

/// Parser for settings.xml
pub struct SettingsParser;

impl SettingsParser {
    /// Parse the part, keeping its source for verbatim re-emission
    pub fn parse(content: &str, part: &str) -> DocxResult<SettingsPart> {
        let mut settings = DocumentSettings::default();
        let mut reader = XmlParser::from_string(content);
        let mut buf = Vec::new();

        loop {
            match XmlParser::next_event(&mut reader, &mut buf, part, content)? {
                Event::Empty(ref e) | Event::Start(ref e) => {
                    let name = e.name();
                    match XmlParser::local_name(name.as_ref()) {
                        b"defaultTabStop" => {
                            settings.default_tab_stop =
                                XmlParser::get_w_attribute(e, "val").and_then(|v| v.parse().ok());
                        }
                        b"zoom" => {
                            settings.zoom_percent =
                                XmlParser::get_w_attribute(e, "percent").and_then(|v| v.trim_end_matches('%').parse().ok());
                        }
                        b"trackRevisions" => settings.track_revisions = XmlParser::parse_on_off(e),
                        b"evenAndOddHeaders" => settings.even_and_odd_headers = XmlParser::parse_on_off(e),
                        b"compatSetting" => {
                            if XmlParser::get_w_attribute(e, "name").as_deref() == Some("compatibilityMode") {
                                settings.compatibility_mode =
                                    XmlParser::get_w_attribute(e, "val").and_then(|v| v.parse().ok());
                            }
                        }
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(SettingsPart::from_source(settings, content.to_string()))
    }
}

/// Writer for settings.xml
pub struct SettingsWriter;

impl SettingsWriter {
    /// The part content: the source XML when untouched, otherwise generated
    pub fn write(part: &SettingsPart) -> String {
        if let Some(source) = part.source_xml() {
            return source.to_string();
        }
        Self::generate(part.settings())
    }

    fn generate(settings: &DocumentSettings) -> String {
        let mut xml = String::new();
        xml.push_str(XML_DECLARATION);
        xml.push('\n');
        xml.push_str(&format!(r#"<w:settings xmlns:w="{}">"#, namespaces::W));

        if let Some(zoom) = settings.zoom_percent {
            xml.push_str(&format!(r#"<w:zoom w:percent="{zoom}"/>"#));
        }
        if settings.track_revisions {
            xml.push_str("<w:trackRevisions/>");
        }
        if let Some(tab) = settings.default_tab_stop {
            xml.push_str(&format!(r#"<w:defaultTabStop w:val="{tab}"/>"#));
        }
        if settings.even_and_odd_headers {
            xml.push_str("<w:evenAndOddHeaders/>");
        }
        if let Some(mode) = settings.compatibility_mode {
            xml.push_str(&format!(
                r#"<w:compat><w:compatSetting w:name="compatibilityMode" w:uri="http://schemas.microsoft.com/office/word" w:val="{mode}"/></w:compat>"#
            ));
        }

        xml.push_str("</w:settings>");
        xml
    }
}
