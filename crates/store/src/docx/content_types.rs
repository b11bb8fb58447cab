//! [Content_Types].xml parsing and generation
//!
//! On read the declared types are looked up per part. On write the whole
//! table is rebuilt from the final part set, never patched.

use crate::docx::content_type_values;
use crate::docx::error::DocxResult;
use crate::docx::package::{Package, PartName, CONTENT_TYPES_PART};
use crate::docx::reader::{escape_xml, XmlParser, XML_DECLARATION};
use quick_xml::events::Event;
use std::collections::BTreeMap;

/// Content type for parts whose type nobody declared
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Represents the content types in a DOCX package
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentTypes {
    /// Default content types by lowercase extension (e.g., "xml" -> "application/xml")
    pub defaults: BTreeMap<String, String>,
    /// Override content types by part name, with leading slash (e.g., "/word/document.xml" -> "...")
    pub overrides: BTreeMap<String, String>,
}

impl ContentTypes {
    /// Create a new ContentTypes with the `rels` and `xml` defaults
    pub fn new() -> Self {
        let mut ct = Self::default();
        ct.defaults.insert("rels".to_string(), content_type_values::RELATIONSHIPS.to_string());
        ct.defaults.insert("xml".to_string(), content_type_values::XML.to_string());
        ct
    }

    /// Parse [Content_Types].xml from its content
    pub fn parse(content: &str) -> DocxResult<Self> {
        let mut result = Self::default();
        let mut reader = XmlParser::from_string(content);
        let mut buf = Vec::new();

        loop {
            match XmlParser::next_event(&mut reader, &mut buf, CONTENT_TYPES_PART, content)? {
                Event::Empty(ref e) | Event::Start(ref e) => {
                    let name = e.name();
                    if XmlParser::matches_element(name.as_ref(), "Default") {
                        if let (Some(ext), Some(ct)) = (
                            XmlParser::get_attribute(e, b"Extension"),
                            XmlParser::get_attribute(e, b"ContentType"),
                        ) {
                            result.defaults.insert(ext.to_ascii_lowercase(), ct);
                        }
                    } else if XmlParser::matches_element(name.as_ref(), "Override") {
                        if let (Some(part), Some(ct)) = (
                            XmlParser::get_attribute(e, b"PartName"),
                            XmlParser::get_attribute(e, b"ContentType"),
                        ) {
                            if let Ok(part) = PartName::new(&part) {
                                result.overrides.insert(override_key(&part), ct);
                            }
                        }
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        Ok(result)
    }

    /// Get the content type for a part: its override, else its extension default
    pub fn get_content_type(&self, part: &PartName) -> Option<&str> {
        if let Some(ct) = self.overrides.get(&override_key(part)) {
            return Some(ct);
        }
        part.extension()
            .and_then(|ext| self.defaults.get(&ext))
            .map(String::as_str)
    }

    /// Add an override for a specific part
    pub fn add_override(&mut self, part: &PartName, content_type: &str) {
        self.overrides.insert(format!("/{}", part.as_str()), content_type.to_string());
    }

    /// Build the table for the parts of `package`.
    ///
    /// `rels` and `xml` always get a `Default`. Other extensions get a
    /// `Default` when a well-known type exists for them. Every part whose
    /// declared type differs from its extension default gets an `Override`.
    /// Parts with no declared type and no usable default are typed
    /// [`FALLBACK_CONTENT_TYPE`] and returned so the caller can report them.
    pub fn generate(package: &Package) -> (Self, Vec<PartName>) {
        let mut ct = Self::new();
        let mut untyped = Vec::new();

        for part in package.parts() {
            if part.name.as_str() == CONTENT_TYPES_PART {
                continue;
            }
            if let Some(ext) = part.name.extension() {
                if !ct.defaults.contains_key(&ext) {
                    if let Some(known) = default_for_extension(&ext) {
                        ct.defaults.insert(ext, known.to_string());
                    }
                }
            }
        }

        for part in package.parts() {
            if part.name.as_str() == CONTENT_TYPES_PART {
                continue;
            }
            let default = part.name.extension().and_then(|ext| ct.defaults.get(&ext).cloned());
            match (&part.content_type, default) {
                (Some(declared), Some(default)) if *declared == default => {}
                (Some(declared), _) => ct.add_override(&part.name, declared),
                (None, Some(_)) => {}
                (None, None) => {
                    ct.add_override(&part.name, FALLBACK_CONTENT_TYPE);
                    untyped.push(part.name.clone());
                }
            }
        }

        tracing::debug!(
            defaults = ct.defaults.len(),
            overrides = ct.overrides.len(),
            "content types regenerated"
        );
        (ct, untyped)
    }

    /// Generate XML content for [Content_Types].xml
    pub fn to_xml(&self) -> String {
        let mut xml = String::new();
        xml.push_str(XML_DECLARATION);
        xml.push('\n');
        xml.push_str(r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#);

        for (ext, ct) in &self.defaults {
            xml.push_str(&format!(
                r#"<Default Extension="{}" ContentType="{}"/>"#,
                escape_xml(ext),
                escape_xml(ct)
            ));
        }

        for (part, ct) in &self.overrides {
            xml.push_str(&format!(
                r#"<Override PartName="{}" ContentType="{}"/>"#,
                escape_xml(part),
                escape_xml(ct)
            ));
        }

        xml.push_str("</Types>");
        xml
    }
}

fn override_key(part: &PartName) -> String {
    format!("/{}", part.as_str())
}

/// Well-known content types for binary extensions found in documents
pub fn default_for_extension(ext: &str) -> Option<&'static str> {
    Some(match ext {
        "rels" => content_type_values::RELATIONSHIPS,
        "xml" => content_type_values::XML,
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "svg" => "image/svg+xml",
        "emf" => "image/x-emf",
        "wmf" => "image/x-wmf",
        "bin" => "application/vnd.openxmlformats-officedocument.oleObject",
        "odttf" => "application/vnd.openxmlformats-officedocument.obfuscatedFont",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> PartName {
        PartName::new(s).unwrap()
    }

    #[test]
    fn test_content_types_parsing() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
    <Default Extension="XML" ContentType="application/xml"/>
    <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
    <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
</Types>"#;

        let ct = ContentTypes::parse(xml).unwrap();
        assert_eq!(ct.defaults.get("xml").map(String::as_str), Some("application/xml"));
        assert_eq!(ct.get_content_type(&name("word/document.xml")), Some(content_type_values::DOCUMENT));
        assert_eq!(ct.get_content_type(&name("word/other.xml")), Some("application/xml"));
        assert_eq!(ct.get_content_type(&name("word/media/a.png")), None);
    }

    #[test]
    fn test_parse_error_has_position() {
        let err = ContentTypes::parse("<Types>\n<Default></Types>").unwrap_err();
        assert!(err.to_string().contains(CONTENT_TYPES_PART));
    }

    #[test]
    fn test_generate_from_parts() {
        let mut package = Package::new();
        package
            .add_part("word/document.xml", b"<w:document/>".to_vec(), Some(content_type_values::DOCUMENT))
            .unwrap();
        package.add_part("_rels/.rels", Vec::new(), Some(content_type_values::RELATIONSHIPS)).unwrap();
        package.add_part("word/media/image1.png", vec![0x89], None).unwrap();
        package.add_part("customXml/item1.xml", Vec::new(), None).unwrap();
        package.add_part("word/blob.dat", vec![1, 2], None).unwrap();

        let (ct, untyped) = ContentTypes::generate(&package);

        assert_eq!(ct.defaults.get("png").map(String::as_str), Some("image/png"));
        assert!(ct.overrides.contains_key("/word/document.xml"));
        assert!(!ct.overrides.contains_key("/_rels/.rels"));
        assert!(!ct.overrides.contains_key("/customXml/item1.xml"));
        assert_eq!(untyped, vec![name("word/blob.dat")]);
        assert_eq!(ct.get_content_type(&name("word/blob.dat")), Some(FALLBACK_CONTENT_TYPE));
    }

    #[test]
    fn test_to_xml_roundtrip() {
        let mut original = ContentTypes::new();
        original.add_override(&name("word/styles.xml"), content_type_values::STYLES);
        let parsed = ContentTypes::parse(&original.to_xml()).unwrap();
        assert_eq!(original, parsed);
    }
}
