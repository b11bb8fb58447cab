//! Run, paragraph and table property blocks (`w:rPr`, `w:pPr`, `w:tblPr`)
//!
//! The same blocks appear in `document.xml` and `styles.xml`, so both
//! readers and both writers go through here.

use crate::docx::error::{DocxError, DocxResult};
use crate::docx::reader::{escape_xml, to_half_points, to_twips, XmlParser};
use doc_model::{Alignment, ParagraphProperties, PropertyBag, RunProperties, TableProperties};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

// =============================================================================
// Reading
// =============================================================================

/// Read a property block whose start tag was just consumed. `apply` sees
/// every child element; grandchildren are skipped.
pub fn read_block(
    reader: &mut Reader<&[u8]>,
    start: &BytesStart<'_>,
    part: &str,
    content: &str,
    mut apply: impl FnMut(&BytesStart<'_>),
) -> DocxResult<()> {
    let mut buf = Vec::new();
    loop {
        match XmlParser::next_event(reader, &mut buf, part, content)? {
            Event::Empty(ref e) => apply(e),
            Event::Start(ref e) => {
                apply(e);
                XmlParser::skip_element(reader, e, part, content)?;
            }
            Event::End(_) => break,
            Event::Eof => {
                return Err(DocxError::parse(
                    part,
                    format!(
                        "unexpected end of file inside <{}>",
                        String::from_utf8_lossy(start.name().as_ref())
                    ),
                ))
            }
            _ => {}
        }
        buf.clear();
    }
    Ok(())
}

fn val(e: &BytesStart<'_>) -> Option<String> {
    XmlParser::get_w_attribute(e, "val")
}

/// Apply one `w:rPr` child. Returns false for elements not modeled.
pub fn apply_run_property(e: &BytesStart<'_>, props: &mut RunProperties) -> bool {
    let name = e.name();
    match XmlParser::local_name(name.as_ref()) {
        b"b" => props.bold = Some(XmlParser::parse_on_off(e)),
        b"i" => props.italic = Some(XmlParser::parse_on_off(e)),
        b"u" => props.underline = Some(val(e).map_or(true, |v| v != "none" && v != "0" && v != "false")),
        b"rFonts" => {
            let font = XmlParser::get_w_attribute(e, "ascii")
                .or_else(|| XmlParser::get_w_attribute(e, "hAnsi"))
                .or_else(|| XmlParser::get_w_attribute(e, "cs"));
            if font.is_some() {
                props.font_name = font;
            }
        }
        b"sz" => {
            if let Some(size) = val(e).and_then(|v| XmlParser::parse_half_points(&v)) {
                props.font_size = Some(size);
            }
        }
        b"color" => {
            if let Some(color) = val(e) {
                props.color = Some(color);
            }
        }
        _ => return false,
    }
    true
}

/// Apply one `w:pPr` child. Returns false for elements not modeled.
pub fn apply_paragraph_property(e: &BytesStart<'_>, props: &mut ParagraphProperties) -> bool {
    let name = e.name();
    match XmlParser::local_name(name.as_ref()) {
        b"jc" => {
            if let Some(v) = val(e) {
                props.alignment = Some(Alignment::from_ooxml(&v));
            }
        }
        b"spacing" => {
            if let Some(v) = XmlParser::get_w_attribute(e, "before") {
                props.space_before = XmlParser::parse_twips(&v);
            }
            if let Some(v) = XmlParser::get_w_attribute(e, "after") {
                props.space_after = XmlParser::parse_twips(&v);
            }
        }
        b"ind" => {
            let left = XmlParser::get_w_attribute(e, "left").or_else(|| XmlParser::get_w_attribute(e, "start"));
            let right = XmlParser::get_w_attribute(e, "right").or_else(|| XmlParser::get_w_attribute(e, "end"));
            if let Some(v) = left {
                props.indent_left = XmlParser::parse_twips(&v);
            }
            if let Some(v) = right {
                props.indent_right = XmlParser::parse_twips(&v);
            }
            if let Some(v) = XmlParser::get_w_attribute(e, "firstLine") {
                props.indent_first_line = XmlParser::parse_twips(&v);
            }
            // Hanging indent is a negative first line
            if let Some(twips) = XmlParser::get_w_attribute(e, "hanging").and_then(|v| XmlParser::parse_twips(&v)) {
                props.indent_first_line = Some(-twips);
            }
        }
        b"keepNext" => props.keep_next = Some(XmlParser::parse_on_off(e)),
        b"keepLines" => props.keep_lines = Some(XmlParser::parse_on_off(e)),
        b"pageBreakBefore" => props.page_break_before = Some(XmlParser::parse_on_off(e)),
        b"outlineLvl" => {
            if let Some(level) = val(e).and_then(|v| v.parse::<u8>().ok()) {
                props.outline_level = Some(level);
            }
        }
        _ => return false,
    }
    true
}

/// Apply one `w:tblPr` child. Returns false for elements not modeled.
pub fn apply_table_property(e: &BytesStart<'_>, props: &mut TableProperties) -> bool {
    let name = e.name();
    match XmlParser::local_name(name.as_ref()) {
        b"jc" => {
            if let Some(v) = val(e) {
                props.alignment = Some(Alignment::from_ooxml(&v));
            }
        }
        b"tblW" => {
            let is_dxa = XmlParser::get_w_attribute(e, "type").map_or(true, |t| t == "dxa");
            if is_dxa {
                if let Some(width) = XmlParser::get_w_attribute(e, "w").and_then(|w| w.parse::<u32>().ok()) {
                    props.width = Some(width);
                }
            }
        }
        b"tblLayout" => {
            props.fixed_layout = Some(XmlParser::get_w_attribute(e, "type").as_deref() == Some("fixed"));
        }
        _ => return false,
    }
    true
}

// =============================================================================
// Writing
// =============================================================================

fn on_off(out: &mut String, element: &str, value: Option<bool>) {
    match value {
        Some(true) => {
            out.push_str(&format!("<w:{element}/>"));
        }
        Some(false) => {
            out.push_str(&format!(r#"<w:{element} w:val="0"/>"#));
        }
        None => {}
    }
}

/// Write `<w:rPr>` with an optional character style. Nothing is written
/// when there is no style and no property is set.
pub fn write_run_properties(out: &mut String, style: Option<&str>, props: &RunProperties) {
    if style.is_none() && props.is_empty() {
        return;
    }
    out.push_str("<w:rPr>");
    if let Some(style) = style {
        out.push_str(&format!(r#"<w:rStyle w:val="{}"/>"#, escape_xml(style)));
    }
    if let Some(font) = &props.font_name {
        let font = escape_xml(font);
        out.push_str(&format!(r#"<w:rFonts w:ascii="{font}" w:hAnsi="{font}" w:cs="{font}"/>"#));
    }
    on_off(out, "b", props.bold);
    on_off(out, "i", props.italic);
    if let Some(color) = &props.color {
        out.push_str(&format!(r#"<w:color w:val="{}"/>"#, escape_xml(color)));
    }
    if let Some(size) = props.font_size {
        out.push_str(&format!(r#"<w:sz w:val="{}"/>"#, to_half_points(size)));
    }
    match props.underline {
        Some(true) => out.push_str(r#"<w:u w:val="single"/>"#),
        Some(false) => out.push_str(r#"<w:u w:val="none"/>"#),
        None => {}
    }
    out.push_str("</w:rPr>");
}

/// Write `<w:pPr>` with an optional paragraph style
pub fn write_paragraph_properties(out: &mut String, style: Option<&str>, props: &ParagraphProperties) {
    if style.is_none() && props.is_empty() {
        return;
    }
    out.push_str("<w:pPr>");
    if let Some(style) = style {
        out.push_str(&format!(r#"<w:pStyle w:val="{}"/>"#, escape_xml(style)));
    }
    on_off(out, "keepNext", props.keep_next);
    on_off(out, "keepLines", props.keep_lines);
    on_off(out, "pageBreakBefore", props.page_break_before);
    if props.space_before.is_some() || props.space_after.is_some() {
        out.push_str("<w:spacing");
        if let Some(before) = props.space_before {
            out.push_str(&format!(r#" w:before="{}""#, to_twips(before)));
        }
        if let Some(after) = props.space_after {
            out.push_str(&format!(r#" w:after="{}""#, to_twips(after)));
        }
        out.push_str("/>");
    }
    if props.indent_left.is_some() || props.indent_right.is_some() || props.indent_first_line.is_some() {
        out.push_str("<w:ind");
        if let Some(left) = props.indent_left {
            out.push_str(&format!(r#" w:left="{}""#, to_twips(left)));
        }
        if let Some(right) = props.indent_right {
            out.push_str(&format!(r#" w:right="{}""#, to_twips(right)));
        }
        match props.indent_first_line {
            Some(first) if first < 0.0 => {
                out.push_str(&format!(r#" w:hanging="{}""#, to_twips(-first)));
            }
            Some(first) => {
                out.push_str(&format!(r#" w:firstLine="{}""#, to_twips(first)));
            }
            None => {}
        }
        out.push_str("/>");
    }
    if let Some(alignment) = props.alignment {
        out.push_str(&format!(r#"<w:jc w:val="{}"/>"#, alignment.as_ooxml()));
    }
    if let Some(level) = props.outline_level {
        out.push_str(&format!(r#"<w:outlineLvl w:val="{level}"/>"#));
    }
    out.push_str("</w:pPr>");
}

/// Write `<w:tblPr>`. Always written, since `w:tbl` requires it.
pub fn write_table_properties(out: &mut String, style: Option<&str>, props: &TableProperties) {
    out.push_str("<w:tblPr>");
    if let Some(style) = style {
        out.push_str(&format!(r#"<w:tblStyle w:val="{}"/>"#, escape_xml(style)));
    }
    match props.width {
        Some(width) => {
            out.push_str(&format!(r#"<w:tblW w:w="{width}" w:type="dxa"/>"#));
        }
        None => out.push_str(r#"<w:tblW w:w="0" w:type="auto"/>"#),
    }
    if let Some(alignment) = props.alignment {
        out.push_str(&format!(r#"<w:jc w:val="{}"/>"#, alignment.as_ooxml()));
    }
    if let Some(fixed) = props.fixed_layout {
        let layout = if fixed { "fixed" } else { "autofit" };
        out.push_str(&format!(r#"<w:tblLayout w:type="{layout}"/>"#));
    }
    out.push_str("</w:tblPr>");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_block<T: Default>(xml: &str, apply: fn(&BytesStart<'_>, &mut T) -> bool) -> T {
        let mut reader = XmlParser::from_string(xml);
        let mut buf = Vec::new();
        let mut props = T::default();
        loop {
            match reader.read_event_into(&mut buf).unwrap() {
                Event::Start(e) => {
                    let e = e.into_owned();
                    read_block(&mut reader, &e, "test.xml", xml, |child| {
                        apply(child, &mut props);
                    })
                    .unwrap();
                    break;
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        props
    }

    #[test]
    fn test_read_run_properties() {
        let xml = r#"<w:rPr><w:rFonts w:ascii="Arial" w:hAnsi="Arial"/><w:b/><w:i w:val="0"/><w:sz w:val="28"/><w:u w:val="double"/><w:color w:val="FF0000"/><w:lang><w:x/></w:lang></w:rPr>"#;
        let props: RunProperties = parse_block(xml, apply_run_property);
        assert_eq!(props.bold, Some(true));
        assert_eq!(props.italic, Some(false));
        assert_eq!(props.underline, Some(true));
        assert_eq!(props.font_size, Some(14.0));
        assert_eq!(props.font_name.as_deref(), Some("Arial"));
        assert_eq!(props.color.as_deref(), Some("FF0000"));
    }

    #[test]
    fn test_read_paragraph_properties() {
        let xml = r#"<w:pPr><w:jc w:val="both"/><w:spacing w:before="240" w:after="120"/><w:ind w:left="720" w:hanging="360"/><w:keepNext/><w:outlineLvl w:val="1"/><w:rPr><w:b/></w:rPr></w:pPr>"#;
        let props: ParagraphProperties = parse_block(xml, apply_paragraph_property);
        assert_eq!(props.alignment, Some(Alignment::Justify));
        assert_eq!(props.space_before, Some(12.0));
        assert_eq!(props.space_after, Some(6.0));
        assert_eq!(props.indent_left, Some(36.0));
        assert_eq!(props.indent_first_line, Some(-18.0));
        assert_eq!(props.keep_next, Some(true));
        assert_eq!(props.outline_level, Some(1));
    }

    #[test]
    fn test_write_run_properties_explicit_off() {
        let mut out = String::new();
        let props = RunProperties {
            bold: Some(false),
            underline: Some(false),
            font_size: Some(10.5),
            ..Default::default()
        };
        write_run_properties(&mut out, Some("Emphasis"), &props);
        assert_eq!(
            out,
            r#"<w:rPr><w:rStyle w:val="Emphasis"/><w:b w:val="0"/><w:sz w:val="21"/><w:u w:val="none"/></w:rPr>"#
        );
    }

    #[test]
    fn test_write_empty_blocks_emit_nothing() {
        let mut out = String::new();
        write_run_properties(&mut out, None, &RunProperties::default());
        write_paragraph_properties(&mut out, None, &ParagraphProperties::default());
        assert!(out.is_empty());
    }

    #[test]
    fn test_paragraph_properties_written_in_schema_order() {
        let mut out = String::new();
        let props = ParagraphProperties {
            alignment: Some(Alignment::Center),
            keep_next: Some(true),
            space_after: Some(6.0),
            ..Default::default()
        };
        write_paragraph_properties(&mut out, Some("Heading1"), &props);
        assert_eq!(
            out,
            r#"<w:pPr><w:pStyle w:val="Heading1"/><w:keepNext/><w:spacing w:after="120"/><w:jc w:val="center"/></w:pPr>"#
        );
    }
}
