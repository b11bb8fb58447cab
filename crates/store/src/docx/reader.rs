//! XML reading and writing utilities shared by the part codecs

use crate::docx::error::{DocxError, DocxResult};
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;
use std::borrow::Cow;

/// XML reader utilities for parsing DOCX XML content
pub struct XmlParser;

impl XmlParser {
    /// Create a new XML reader from a string.
    ///
    /// Text is not trimmed: whitespace inside `w:t` is content.
    pub fn from_string(content: &str) -> Reader<&[u8]> {
        let mut reader = Reader::from_str(content);
        reader.config_mut().trim_text(false);
        reader
    }

    /// Read the next event, mapping failures to a positioned parse error
    pub fn next_event<'b>(
        reader: &mut Reader<&[u8]>,
        buf: &'b mut Vec<u8>,
        part: &str,
        content: &str,
    ) -> DocxResult<Event<'b>> {
        reader
            .read_event_into(buf)
            .map_err(|e| DocxError::parse_at(part, content, reader.error_position(), e))
    }

    /// Skip the rest of the element whose start tag was just read
    pub fn skip_element(
        reader: &mut Reader<&[u8]>,
        start: &BytesStart<'_>,
        part: &str,
        content: &str,
    ) -> DocxResult<()> {
        let end = start.to_end().into_owned();
        let mut skip_buf = Vec::new();
        reader
            .read_to_end_into(end.name(), &mut skip_buf)
            .map_err(|e| DocxError::parse_at(part, content, reader.error_position(), e))?;
        Ok(())
    }

    /// Unescape a text event
    pub fn text(event: &BytesText<'_>, part: &str) -> DocxResult<String> {
        event
            .unescape()
            .map(Cow::into_owned)
            .map_err(|e| DocxError::parse(part, e))
    }

    /// Get an attribute value from an event, unescaped
    pub fn get_attribute(event: &BytesStart<'_>, name: &[u8]) -> Option<String> {
        event
            .attributes()
            .filter_map(|a| a.ok())
            .find(|a| a.key.as_ref() == name)
            .map(|a| match a.unescape_value() {
                Ok(v) => v.into_owned(),
                Err(_) => String::from_utf8_lossy(&a.value).into_owned(),
            })
    }

    /// Get an attribute value with a namespace prefix
    pub fn get_prefixed_attribute(event: &BytesStart<'_>, prefix: &str, local: &str) -> Option<String> {
        let key = format!("{}:{}", prefix, local);
        Self::get_attribute(event, key.as_bytes())
    }

    /// Get a w: namespaced attribute (most common in DOCX)
    pub fn get_w_attribute(event: &BytesStart<'_>, name: &str) -> Option<String> {
        Self::get_prefixed_attribute(event, "w", name).or_else(|| Self::get_attribute(event, name.as_bytes()))
    }

    /// Get a r: namespaced attribute
    pub fn get_r_attribute(event: &BytesStart<'_>, name: &str) -> Option<String> {
        Self::get_prefixed_attribute(event, "r", name)
    }

    /// Element name without its namespace prefix
    pub fn local_name(name: &[u8]) -> &[u8] {
        match name.iter().rposition(|&b| b == b':') {
            Some(i) => &name[i + 1..],
            None => name,
        }
    }

    /// Check if an element name matches with optional namespace prefix
    pub fn matches_element(name: &[u8], expected: &str) -> bool {
        Self::local_name(name) == expected.as_bytes()
    }

    /// Parse a dimension value (twips to points conversion)
    /// DOCX uses twips (1/20 of a point) for many measurements
    pub fn parse_twips(value: &str) -> Option<f32> {
        value.parse::<f32>().ok().map(|v| v / 20.0)
    }

    /// Parse a half-point value to points
    /// DOCX uses half-points for font sizes. Values outside 1..=3276 are
    /// not sizes Word stores and read as unset.
    pub fn parse_half_points(value: &str) -> Option<f32> {
        let half_points = value.trim().parse::<u16>().ok()?;
        (1..=3276).contains(&half_points).then(|| f32::from(half_points) / 2.0)
    }

    /// Parse a boolean value (0/1, true/false, on/off)
    pub fn parse_bool(value: &str) -> bool {
        matches!(value.to_lowercase().as_str(), "1" | "true" | "on" | "yes")
    }

    /// Value of an on/off property element such as `<w:b/>` or `<w:b w:val="0"/>`.
    /// A missing `w:val` means on.
    pub fn parse_on_off(event: &BytesStart<'_>) -> bool {
        Self::get_w_attribute(event, "val").map_or(true, |v| Self::parse_bool(&v))
    }

    /// True when the element name carries only the given prefixes.
    /// Used to decide whether raw XML can be re-emitted under our root.
    pub fn uses_only_prefixes(xml: &str, allowed: &[&str]) -> bool {
        let mut reader = Self::from_string(xml);
        let mut buf = Vec::new();
        loop {
            let ok = match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                    let prefix_ok = |name: &[u8]| match name.iter().position(|&b| b == b':') {
                        Some(i) => allowed.iter().any(|p| p.as_bytes() == &name[..i]),
                        None => true,
                    };
                    prefix_ok(e.name().as_ref())
                        && e.attributes().filter_map(|a| a.ok()).all(|a| prefix_ok(a.key.as_ref()))
                }
                Ok(Event::Eof) => return true,
                Err(_) => return false,
                _ => true,
            };
            if !ok {
                return false;
            }
            buf.clear();
        }
    }
}

// =============================================================================
// Writing helpers
// =============================================================================

/// XML declaration written at the top of every generated part
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

/// Escape text or an attribute value, dropping characters XML 1.0 forbids
pub fn escape_xml(text: &str) -> String {
    let clean: Cow<'_, str> = if text.chars().all(is_xml_char) {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(text.chars().filter(|&c| is_xml_char(c)).collect())
    };
    quick_xml::escape::escape(clean.as_ref()).into_owned()
}

/// True when `text` holds characters that [`escape_xml`] leaves out
pub fn has_invalid_xml_chars(text: &str) -> bool {
    !text.chars().all(is_xml_char)
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

/// Points to twips, rounded
pub fn to_twips(points: f32) -> i64 {
    (points * 20.0).round() as i64
}

/// Write the inside of a `w:r` for `text`: `w:t` segments with tabs,
/// line breaks and non-breaking hyphens as their own elements.
pub fn write_run_text(out: &mut String, text: &str) {
    let mut segment = String::new();
    for c in text.chars() {
        let element = match c {
            '\t' => "<w:tab/>",
            '\n' => "<w:br/>",
            '\r' => "<w:cr/>",
            '\u{2011}' => "<w:noBreakHyphen/>",
            '\u{00AD}' => "<w:softHyphen/>",
            _ => {
                segment.push(c);
                continue;
            }
        };
        flush_text(out, &mut segment);
        out.push_str(element);
    }
    flush_text(out, &mut segment);
}

fn flush_text(out: &mut String, segment: &mut String) {
    if segment.is_empty() {
        return;
    }
    let starts_or_ends_blank = segment.starts_with(char::is_whitespace) || segment.ends_with(char::is_whitespace);
    if starts_or_ends_blank {
        out.push_str(r#"<w:t xml:space="preserve">"#);
    } else {
        out.push_str("<w:t>");
    }
    out.push_str(&escape_xml(segment));
    out.push_str("</w:t>");
    segment.clear();
}

/// Points to half-points, rounded
pub fn to_half_points(points: f32) -> i64 {
    (points * 2.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_twips() {
        assert_eq!(XmlParser::parse_twips("1440"), Some(72.0)); // 1 inch
        assert_eq!(XmlParser::parse_twips("720"), Some(36.0)); // 0.5 inch
        assert_eq!(to_twips(72.0), 1440);
    }

    #[test]
    fn test_parse_half_points() {
        assert_eq!(XmlParser::parse_half_points("24"), Some(12.0)); // 12pt
        assert_eq!(XmlParser::parse_half_points("21"), Some(10.5));
        assert_eq!(XmlParser::parse_half_points("0"), None);
        assert_eq!(XmlParser::parse_half_points("3277"), None);
        assert_eq!(XmlParser::parse_half_points("21.5"), None);
        assert_eq!(XmlParser::parse_half_points("NaN"), None);
        assert_eq!(to_half_points(10.5), 21);
    }

    #[test]
    fn test_parse_bool() {
        assert!(XmlParser::parse_bool("1"));
        assert!(XmlParser::parse_bool("true"));
        assert!(XmlParser::parse_bool("on"));
        assert!(!XmlParser::parse_bool("0"));
        assert!(!XmlParser::parse_bool("false"));
    }

    #[test]
    fn test_matches_element() {
        assert!(XmlParser::matches_element(b"p", "p"));
        assert!(XmlParser::matches_element(b"w:p", "p"));
        assert!(!XmlParser::matches_element(b"w:r", "p"));
        assert!(!XmlParser::matches_element(b"w:pPr", "p"));
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(escape_xml("a < b & \"c\""), "a &lt; b &amp; &quot;c&quot;");
        assert_eq!(escape_xml("bell\u{7}"), "bell");
        assert!(has_invalid_xml_chars("bell\u{7}"));
        assert!(!has_invalid_xml_chars("tab\tline\ncr\r\u{2011}"));
    }

    #[test]
    fn test_write_run_text() {
        let mut out = String::new();
        write_run_text(&mut out, "a\tb\nc ");
        assert_eq!(
            out,
            r#"<w:t>a</w:t><w:tab/><w:t>b</w:t><w:br/><w:t xml:space="preserve">c </w:t>"#
        );

        let mut out = String::new();
        write_run_text(&mut out, "x\u{2011}y & z");
        assert_eq!(out, "<w:t>x</w:t><w:noBreakHyphen/><w:t>y &amp; z</w:t>");
    }

    #[test]
    fn test_uses_only_prefixes() {
        let ok = r#"<w:sectPr><w:headerReference w:type="default" r:id="rId4"/></w:sectPr>"#;
        let foreign = r#"<w:sectPr><w14:foo w:val="1"/></w:sectPr>"#;
        assert!(XmlParser::uses_only_prefixes(ok, &["w", "r"]));
        assert!(!XmlParser::uses_only_prefixes(foreign, &["w", "r"]));
    }

    #[test]
    fn test_next_event_reports_position() {
        let content = "<a>\n<b></c></a>";
        let mut reader = XmlParser::from_string(content);
        let mut buf = Vec::new();
        let err = loop {
            match XmlParser::next_event(&mut reader, &mut buf, "part.xml", content) {
                Ok(Event::Eof) => panic!("expected an error"),
                Ok(_) => buf.clear(),
                Err(e) => break e,
            }
        };
        match err {
            DocxError::Parse { part, position, .. } => {
                assert_eq!(part, "part.xml");
                assert_eq!(position.map(|p| p.line), Some(2));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
