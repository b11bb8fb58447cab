//! Property-Based Tests
//!
//! Invariants that must hold for any document the engine writes:
//! - Saving then opening keeps paragraph text, styles and run formatting
//! - Characters XML cannot carry are left out and reported, never written
//! - Font sizes are stored exactly or refused before anything is written
//! - Every table row in the written XML has as many cells as the grid
//! - Every comment marker refers to a comment that exists
//! - Inheritance cycles never survive into a loaded style sheet

use doc_model::{ParagraphStyleId, Run, RunProperties, StyleDefinition, StyleSheet, FONT_SIZE_RANGE};
use doc_model::{family, DocModelError};
use proptest::prelude::*;
use store::docx::{encode, DocxDocument, DocxError, Package, WarningKind};
use store::{Compression, EngineOptions};

/// Characters a run can hold: letters plus the ones written as their own
/// elements, markup characters and text outside ASCII
fn run_char() -> impl Strategy<Value = char> {
    prop_oneof![
        4 => prop::char::range('a', 'z'),
        1 => prop::sample::select(vec![
            ' ', '\t', '\n', '\r', '\u{2011}', '\u{00AD}', '&', '<', '>', '"', '\'', '\u{e9}', '\u{674e}', '\u{1F600}',
        ]),
    ]
}

/// Empty text and leading or trailing blanks included
fn run_text() -> impl Strategy<Value = String> {
    prop::collection::vec(run_char(), 0..12).prop_map(|chars| chars.into_iter().collect())
}

fn is_representable(c: char) -> bool {
    !matches!(c, '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}' | '\u{fffe}' | '\u{ffff}')
}

fn storable_font_size(points: f32) -> bool {
    points.is_finite() && FONT_SIZE_RANGE.contains(&points) && (points * 2.0).fract() == 0.0
}

fn run_properties() -> impl Strategy<Value = RunProperties> {
    (
        proptest::option::of(any::<bool>()),
        proptest::option::of(any::<bool>()),
        proptest::option::of(any::<bool>()),
        proptest::option::of(1u16..=3276),
    )
        .prop_map(|(bold, italic, underline, half_points)| RunProperties {
            bold,
            italic,
            underline,
            font_size: half_points.map(|hp| f32::from(hp) / 2.0),
            ..Default::default()
        })
}

fn paragraph() -> impl Strategy<Value = (Option<String>, Vec<Run>)> {
    (
        proptest::option::of(prop::sample::select(vec!["Normal", "Heading1", "Heading2", "Quote"])),
        prop::collection::vec(
            (run_text(), run_properties()).prop_map(|(text, props)| Run::with_properties(text, props)),
            0..5,
        ),
    )
        .prop_map(|(style, runs)| (style.map(str::to_string), runs))
}

fn table_rows() -> impl Strategy<Value = Vec<Vec<String>>> {
    (1usize..5, 1usize..5).prop_flat_map(|(rows, columns)| {
        prop::collection::vec(prop::collection::vec("[a-z0-9 ]{0,8}", columns), rows)
    })
}

fn reopen(doc: &DocxDocument) -> DocxDocument {
    let bytes = doc.to_bytes().unwrap();
    DocxDocument::from_bytes(&bytes, &EngineOptions::default()).unwrap()
}

// ============================================================================
// Round Trip Properties
// ============================================================================

/// Property: paragraphs keep their text, style and run formatting
#[test]
fn proptest_paragraph_roundtrip() {
    proptest!(ProptestConfig::with_cases(64), |(paragraphs in prop::collection::vec(paragraph(), 1..8))| {
        let mut doc = DocxDocument::new();
        for (style, runs) in &paragraphs {
            doc.document_mut()
                .add_formatted_paragraph(style.as_deref().map(ParagraphStyleId::new), runs.clone());
        }

        let reopened = reopen(&doc);
        prop_assert_eq!(reopened.get_text(), doc.get_text());
        prop_assert_eq!(reopened.get_paragraphs().len(), paragraphs.len());
        for (original, decoded) in doc.get_paragraphs().iter().zip(reopened.get_paragraphs()) {
            prop_assert_eq!(&original.style, &decoded.style);
            prop_assert_eq!(original.runs(), decoded.runs());
        }
    });
}

/// Property: text XML cannot represent is dropped with a warning, and the
/// rest of the run comes back unchanged
#[test]
fn proptest_unrepresentable_characters_are_dropped() {
    let char_strategy = prop_oneof![
        3 => run_char(),
        1 => prop::sample::select(vec!['\u{0}', '\u{1}', '\u{7}', '\u{b}', '\u{c}', '\u{1f}', '\u{fffe}', '\u{ffff}']),
    ];
    proptest!(ProptestConfig::with_cases(64), |(chars in prop::collection::vec(char_strategy, 0..16))| {
        let text: String = chars.into_iter().collect();
        let kept: String = text.chars().filter(|&c| is_representable(c)).collect();
        let mut doc = DocxDocument::new();
        doc.document_mut().add_paragraph(text.clone(), None);

        let encoded = encode(doc.document(), &EngineOptions::default()).unwrap();
        prop_assert_eq!(encoded.report.has(WarningKind::InvalidXmlCharacter), kept != text);

        let bytes = encoded.package.to_bytes(Compression::Deflated).unwrap();
        let reopened = DocxDocument::from_bytes(&bytes, &EngineOptions::default()).unwrap();
        prop_assert_eq!(reopened.get_paragraphs()[0].runs()[0].text.as_str(), kept.as_str());
    });
}

/// Property: a font size is either stored exactly or refused as a
/// configuration error, both when set and when saved
#[test]
fn proptest_font_size_is_exact_or_refused() {
    let size_strategy = prop_oneof![
        any::<f32>(),
        -10.0f32..2000.0,
        (0u16..=3300).prop_map(|hp| f32::from(hp) / 2.0),
    ];
    proptest!(ProptestConfig::with_cases(128), |(size in size_strategy)| {
        let storable = storable_font_size(size);
        let mut doc = DocxDocument::new();
        doc.document_mut().add_paragraph("sized", None);
        let properties = RunProperties {
            font_size: Some(size),
            ..Default::default()
        };
        prop_assert_eq!(doc.document_mut().set_run_formatting(0, 0, &properties).is_ok(), storable);

        doc.document_mut().add_formatted_paragraph(None, vec![Run::new("direct").size(size)]);
        match doc.to_bytes() {
            Ok(bytes) => {
                prop_assert!(storable, "{} was written", size);
                let reopened = DocxDocument::from_bytes(&bytes, &EngineOptions::default()).unwrap();
                prop_assert_eq!(reopened.get_paragraphs()[1].runs()[0].properties.font_size, Some(size));
            }
            Err(err) => {
                prop_assert!(!storable, "{} was refused", size);
                prop_assert!(matches!(err, DocxError::Model(ref e) if e.is_configuration_error()));
            }
        }
    });
}

/// Property: tables come back with identical cells
#[test]
fn proptest_table_roundtrip() {
    proptest!(ProptestConfig::with_cases(64), |(rows in table_rows())| {
        let mut doc = DocxDocument::new();
        doc.document_mut().add_paragraph("before", None);
        doc.document_mut().add_table(rows.clone());

        let reopened = reopen(&doc);
        prop_assert_eq!(reopened.get_tables().len(), 1);
        prop_assert_eq!(reopened.get_tables()[0].rows(), rows.as_slice());
        prop_assert!(!reopened.warnings().has(WarningKind::RaggedTable));
    });
}

/// Property: ragged input rows are written as a rectangular grid
#[test]
fn proptest_written_tables_are_rectangular() {
    proptest!(ProptestConfig::with_cases(48), |(widths in prop::collection::vec(0usize..6, 1..6))| {
        let rows: Vec<Vec<String>> = widths
            .iter()
            .map(|&w| (0..w).map(|c| format!("c{c}")).collect())
            .collect();
        let columns = widths[0];
        let mut doc = DocxDocument::new();
        doc.document_mut().add_table(rows);

        let bytes = doc.to_bytes().unwrap();
        let package = Package::from_bytes(&bytes, Default::default()).unwrap();
        let xml = package.part_string("word/document.xml").unwrap();

        if columns == 0 {
            prop_assert!(!xml.contains("<w:tbl>"));
        } else {
            prop_assert_eq!(xml.matches("<w:gridCol ").count(), columns);
            for row in xml.split("<w:tr>").skip(1) {
                let row = &row[..row.find("</w:tr>").unwrap()];
                prop_assert_eq!(row.matches("<w:tc>").count(), columns);
            }
        }
    });
}

/// Property: after any mix of adds, replies and deletes, every marker in the
/// written body refers to a written comment and the anchors survive reopening
#[test]
fn proptest_comment_integrity() {
    let op_strategy = prop::collection::vec((0usize..4, 0u8..3), 1..12);
    proptest!(ProptestConfig::with_cases(64), |(ops in op_strategy)| {
        let mut doc = DocxDocument::new();
        let document = doc.document_mut();
        for i in 0..4 {
            document.add_paragraph(format!("Paragraph {i}"), None);
        }
        let mut ids = Vec::new();
        for (paragraph, op) in ops {
            match op {
                0 => ids.push(document.add_comment_at(paragraph, "Ann Lee", "note").unwrap()),
                1 if !ids.is_empty() => {
                    let parent = ids[paragraph % ids.len()];
                    if document.comments().contains(parent) {
                        ids.push(document.add_reply(parent, "Bo", "reply").unwrap());
                    }
                }
                2 if !ids.is_empty() => {
                    let id = ids[paragraph % ids.len()];
                    if document.comments().contains(id) {
                        document.delete_comment(id).unwrap();
                    }
                }
                _ => {}
            }
        }
        prop_assert!(document.check_integrity().is_empty());

        let reopened = reopen(&doc);
        let decoded = reopened.document();
        prop_assert_eq!(decoded.comments().len(), doc.document().comments().len());
        prop_assert!(!reopened.warnings().has(WarningKind::DanglingCommentReference));
        for (original, read) in doc.get_paragraphs().iter().zip(reopened.get_paragraphs()) {
            prop_assert_eq!(&original.comments, &read.comments);
            for id in &read.comments {
                prop_assert!(decoded.comments().contains(*id));
            }
        }
        for comment in doc.document().comments().iter() {
            let read = decoded.comments().get(comment.id).unwrap();
            prop_assert_eq!(read.parent_id, comment.parent_id);
            prop_assert_eq!(&read.author, &comment.author);
        }
    });
}

// ============================================================================
// Style Cycle Properties
// ============================================================================

fn ring_styles_xml(len: usize) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
    );
    for i in 0..len {
        xml.push_str(&format!(
            r#"<w:style w:type="paragraph" w:styleId="S{i}"><w:name w:val="S{i}"/><w:basedOn w:val="S{}"/><w:rPr><w:sz w:val="{}"/></w:rPr></w:style>"#,
            (i + 1) % len,
            20 + i * 2
        ));
    }
    xml.push_str("</w:styles>");
    xml
}

/// Property: a styles part whose `basedOn` links form a ring loads with one
/// cycle warning and every style in the ring resolves
#[test]
fn proptest_style_ring_is_broken_on_load() {
    proptest!(ProptestConfig::with_cases(16), |(len in 1usize..8)| {
        let mut doc = DocxDocument::new();
        doc.document_mut().add_paragraph("Ring", Some(ParagraphStyleId::new("S0")));
        let mut package = Package::from_bytes(&doc.to_bytes().unwrap(), Default::default()).unwrap();
        package
            .add_part("word/styles.xml", ring_styles_xml(len).into_bytes(), None)
            .unwrap();
        let bytes = package.to_bytes(Compression::Deflated).unwrap();

        let reopened = DocxDocument::from_bytes(&bytes, &EngineOptions::default()).unwrap();
        prop_assert_eq!(reopened.warnings().by_kind(WarningKind::CyclicStyle).len(), 1);
        let styles = reopened.document().styles();
        for i in 0..len {
            let chain = styles.resolve(&ParagraphStyleId::new(format!("S{i}")));
            prop_assert!(chain.is_ok());
            prop_assert!(chain.unwrap().len() <= len);
        }
        prop_assert!(reopened.document().effective_run_properties(0, 0).is_some());
    });
}

/// Property: inserting the style that would close a ring is rejected
#[test]
fn proptest_insert_closing_ring_is_rejected() {
    proptest!(|(len in 2usize..10)| {
        let mut sheet = StyleSheet::new();
        for i in (1..len).rev() {
            let style: StyleDefinition<family::Paragraph> = StyleDefinition::new(format!("S{i}"), format!("S{i}"))
                .with_based_on(format!("S{}", (i + 1) % len));
            sheet.insert(style).unwrap();
        }
        let closing: StyleDefinition<family::Paragraph> = StyleDefinition::new("S0", "S0").with_based_on("S1");
        let err = sheet.insert(closing).unwrap_err();
        prop_assert!(matches!(err, DocModelError::StyleCycle { .. }), "unexpected error: {:?}", err);
        prop_assert_eq!(sheet.len(), len - 1);
    });
}
