//! Document properties: `docProps/core.xml` and `docProps/custom.xml`

use crate::docx::error::DocxResult;
use crate::docx::reader::{escape_xml, XmlParser, XML_DECLARATION};
use chrono::{DateTime, SecondsFormat, Utc};
use doc_model::CoreProperties;
use quick_xml::events::Event;
use std::collections::BTreeMap;

const CORE_NS: &str = "http://schemas.openxmlformats.org/package/2006/metadata/core-properties";
const DC_NS: &str = "http://purl.org/dc/elements/1.1/";
const DCTERMS_NS: &str = "http://purl.org/dc/terms/";
const DCMITYPE_NS: &str = "http://purl.org/dc/dcmitype/";
const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
const CUSTOM_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/custom-properties";
const VT_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes";

/// Format ID every custom property carries
const CUSTOM_FMTID: &str = "{D5CDD505-2E9C-101B-9397-08002B2CF9AE}";

// =============================================================================
// Core Properties
// =============================================================================

/// Parse core.xml
pub fn parse_core(content: &str, part: &str) -> DocxResult<CoreProperties> {
    let mut props = CoreProperties::default();
    let mut reader = XmlParser::from_string(content);
    let mut buf = Vec::new();
    let mut current: Option<Vec<u8>> = None;
    let mut text = String::new();

    loop {
        match XmlParser::next_event(&mut reader, &mut buf, part, content)? {
            Event::Start(ref e) => {
                current = Some(XmlParser::local_name(e.name().as_ref()).to_vec());
                text.clear();
            }
            Event::Text(ref e) if current.is_some() => text.push_str(&XmlParser::text(e, part)?),
            Event::End(_) => {
                if let Some(field) = current.take() {
                    let value = std::mem::take(&mut text);
                    assign_core(&mut props, &field, value);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(props)
}

fn assign_core(props: &mut CoreProperties, field: &[u8], value: String) {
    let value = value.trim().to_string();
    if value.is_empty() {
        return;
    }
    match field {
        b"title" => props.title = Some(value),
        b"subject" => props.subject = Some(value),
        b"creator" => props.creator = Some(value),
        b"keywords" => props.keywords = Some(value),
        b"description" => props.description = Some(value),
        b"lastModifiedBy" => props.last_modified_by = Some(value),
        b"revision" => props.revision = Some(value),
        b"created" => props.created = parse_w3cdtf(&value),
        b"modified" => props.modified = parse_w3cdtf(&value),
        _ => {}
    }
}

fn parse_w3cdtf(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value).ok().map(|d| d.with_timezone(&Utc))
}

/// Generate core.xml
pub fn write_core(props: &CoreProperties) -> String {
    let mut xml = String::new();
    xml.push_str(XML_DECLARATION);
    xml.push('\n');
    xml.push_str(&format!(
        r#"<cp:coreProperties xmlns:cp="{CORE_NS}" xmlns:dc="{DC_NS}" xmlns:dcterms="{DCTERMS_NS}" xmlns:dcmitype="{DCMITYPE_NS}" xmlns:xsi="{XSI_NS}">"#
    ));

    let text_fields = [
        ("dc:title", &props.title),
        ("dc:subject", &props.subject),
        ("dc:creator", &props.creator),
        ("cp:keywords", &props.keywords),
        ("dc:description", &props.description),
        ("cp:lastModifiedBy", &props.last_modified_by),
        ("cp:revision", &props.revision),
    ];
    for (element, value) in text_fields {
        if let Some(value) = value {
            xml.push_str(&format!("<{element}>{}</{element}>", escape_xml(value)));
        }
    }
    for (element, value) in [("dcterms:created", props.created), ("dcterms:modified", props.modified)] {
        if let Some(value) = value {
            xml.push_str(&format!(
                r#"<{element} xsi:type="dcterms:W3CDTF">{}</{element}>"#,
                value.to_rfc3339_opts(SecondsFormat::Secs, true)
            ));
        }
    }

    xml.push_str("</cp:coreProperties>");
    xml
}

// =============================================================================
// Custom Properties
// =============================================================================

/// Parse custom.xml into name/value pairs. Every value type is read as text.
pub fn parse_custom(content: &str, part: &str) -> DocxResult<BTreeMap<String, String>> {
    let mut metadata = BTreeMap::new();
    let mut reader = XmlParser::from_string(content);
    let mut buf = Vec::new();
    let mut name: Option<String> = None;
    let mut value = String::new();

    loop {
        match XmlParser::next_event(&mut reader, &mut buf, part, content)? {
            Event::Start(ref e) if XmlParser::matches_element(e.name().as_ref(), "property") => {
                name = XmlParser::get_attribute(e, b"name");
                value.clear();
            }
            Event::Text(ref e) if name.is_some() => value.push_str(&XmlParser::text(e, part)?),
            Event::End(ref e) if XmlParser::matches_element(e.name().as_ref(), "property") => {
                if let Some(name) = name.take() {
                    metadata.insert(name, value.trim().to_string());
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(metadata)
}

/// Generate custom.xml. Values are written as `vt:lpwstr`.
pub fn write_custom(metadata: &BTreeMap<String, String>) -> String {
    let mut xml = String::new();
    xml.push_str(XML_DECLARATION);
    xml.push('\n');
    xml.push_str(&format!(r#"<Properties xmlns="{CUSTOM_NS}" xmlns:vt="{VT_NS}">"#));
    // pid 0 and 1 are reserved
    for (pid, (name, value)) in (2u32..).zip(metadata) {
        xml.push_str(&format!(
            r#"<property fmtid="{CUSTOM_FMTID}" pid="{pid}" name="{}"><vt:lpwstr>{}</vt:lpwstr></property>"#,
            escape_xml(name),
            escape_xml(value)
        ));
    }
    xml.push_str("</Properties>");
    xml
}
