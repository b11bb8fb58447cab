//! DOCX encoding
//!
//! Builds a fresh [`Package`] from a [`Document`]. Relationship parts and
//! `[Content_Types].xml` are regenerated from the parts actually written,
//! never copied from the package the document was read from.

use crate::docx::comments_io::CommentsWriter;
use crate::docx::content_type_values;
use crate::docx::content_types::ContentTypes;
use crate::docx::document_writer::DocumentXmlWriter;
use crate::docx::error::DocxResult;
use crate::docx::package::{Package, PartName, CONTENT_TYPES_PART};
use crate::docx::props_io;
use crate::docx::reader::has_invalid_xml_chars;
use crate::docx::relationship_types;
use crate::docx::resolver::{regenerate, RelationshipEntry};
use crate::docx::settings_io::SettingsWriter;
use crate::docx::styles_writer::StylesWriter;
use crate::docx::validation::{ValidationReport, WarningKind};
use crate::options::EngineOptions;
use chrono::Utc;
use doc_model::{family, Document, DocumentSettings, PartKind, SettingsPart, StyleFamily, StyleSheet};

const DOCUMENT_PART: &str = "word/document.xml";
const STYLES_PART: &str = "word/styles.xml";
const SETTINGS_PART: &str = "word/settings.xml";
const COMMENTS_PART: &str = "word/comments.xml";
const COMMENTS_EXTENDED_PART: &str = "word/commentsExtended.xml";
const CORE_PART: &str = "docProps/core.xml";
const CUSTOM_PART: &str = "docProps/custom.xml";

/// Parts the writer generates itself; preserved parts may not replace them
const GENERATED: &[&str] = &[
    DOCUMENT_PART,
    STYLES_PART,
    SETTINGS_PART,
    COMMENTS_PART,
    COMMENTS_EXTENDED_PART,
    CORE_PART,
    CUSTOM_PART,
    "word/_rels/document.xml.rels",
    "_rels/.rels",
    CONTENT_TYPES_PART,
];

/// Word 2013 and later
const DEFAULT_COMPATIBILITY_MODE: u32 = 15;

/// An encoded package with the warnings raised while writing it
#[derive(Debug)]
pub struct EncodedPackage {
    pub package: Package,
    pub report: ValidationReport,
}

/// Encode a document into a new package
pub fn encode(document: &Document, options: &EngineOptions) -> DocxResult<EncodedPackage> {
    DocxWriter::new(document, options).write()
}

/// Relationship type used from the main document for a preserved part
fn relationship_type(kind: PartKind) -> Option<&'static str> {
    Some(match kind {
        PartKind::Header => relationship_types::HEADER,
        PartKind::Footer => relationship_types::FOOTER,
        PartKind::Footnotes => relationship_types::FOOTNOTES,
        PartKind::Endnotes => relationship_types::ENDNOTES,
        PartKind::Theme => relationship_types::THEME,
        PartKind::FontTable => relationship_types::FONT_TABLE,
        PartKind::Numbering => relationship_types::NUMBERING,
        PartKind::WebSettings => relationship_types::WEB_SETTINGS,
        PartKind::Dependency => return None,
    })
}

/// Refuse formatting that `w:sz` and friends cannot hold, before any part is built
fn validate_formatting(document: &Document) -> DocxResult<()> {
    for paragraph in document.paragraphs() {
        for run in paragraph.runs() {
            run.properties.validate()?;
        }
    }
    let sheet = document.styles();
    sheet.defaults.run.validate()?;
    validate_family::<family::Paragraph>(sheet)?;
    validate_family::<family::Character>(sheet)?;
    validate_family::<family::Table>(sheet)?;
    validate_family::<family::Numbering>(sheet)?;
    validate_family::<family::List>(sheet)
}

fn validate_family<F: StyleFamily>(sheet: &StyleSheet) -> DocxResult<()> {
    for style in sheet.family::<F>().iter() {
        style.properties.run.validate()?;
    }
    Ok(())
}

struct DocxWriter<'a> {
    document: &'a Document,
    options: &'a EngineOptions,
    package: Package,
    report: ValidationReport,
    document_rels: Vec<RelationshipEntry>,
    root_rels: Vec<RelationshipEntry>,
}

impl<'a> DocxWriter<'a> {
    fn new(document: &'a Document, options: &'a EngineOptions) -> Self {
        Self {
            document,
            options,
            package: Package::new(),
            report: ValidationReport::new(),
            document_rels: Vec::new(),
            root_rels: Vec::new(),
        }
    }

    fn write(mut self) -> DocxResult<EncodedPackage> {
        let main = PartName::new(DOCUMENT_PART)?;

        validate_formatting(self.document)?;
        self.write_preserved()?;
        self.write_styles()?;
        self.write_settings()?;
        self.write_comments()?;

        let (rels, _) = regenerate(Some(&main), &self.document_rels);
        let relationship_ids: Vec<String> = rels.all().map(|r| r.id.clone()).collect();
        self.add_xml(main.rels_part().as_str(), rels.to_xml(), content_type_values::RELATIONSHIPS)?;

        let document_xml = DocumentXmlWriter::new(self.document, &mut self.report)
            .with_relationships(relationship_ids)
            .write();
        self.add_xml(DOCUMENT_PART, document_xml, content_type_values::DOCUMENT)?;

        self.root_rels.push(RelationshipEntry::new(relationship_types::DOCUMENT, main));
        self.write_properties()?;
        let (root, _) = regenerate(None, &self.root_rels);
        self.add_xml(PartName::root_rels().as_str(), root.to_xml(), content_type_values::RELATIONSHIPS)?;

        let (content_types, untyped) = ContentTypes::generate(&self.package);
        for name in untyped {
            self.report.warn(
                WarningKind::MissingContentType,
                name.as_str(),
                "part has no known content type, written as application/octet-stream",
            );
        }
        self.package
            .add_part(CONTENT_TYPES_PART, content_types.to_xml().into_bytes(), None)?;

        tracing::debug!(
            parts = self.package.len(),
            warnings = self.report.len(),
            "document encoded"
        );
        Ok(EncodedPackage {
            package: self.package,
            report: self.report,
        })
    }

    fn add_xml(&mut self, name: &str, xml: String, content_type: &str) -> DocxResult<()> {
        self.package.add_part(name, xml.into_bytes(), Some(content_type))
    }

    /// Carried-over parts keep their names, bytes and relationship IDs
    fn write_preserved(&mut self) -> DocxResult<()> {
        for part in self.document.preserved_parts() {
            let name = PartName::new(&part.name)?;
            if GENERATED.contains(&name.as_str()) {
                self.report.warn(
                    WarningKind::UnsupportedContent,
                    name.as_str(),
                    "preserved part collides with a generated part and was dropped",
                );
                continue;
            }
            self.package
                .add_part(name.as_str(), part.data.clone(), Some(&part.content_type))?;
            if let Some(rel_type) = relationship_type(part.kind) {
                self.document_rels
                    .push(RelationshipEntry::new(rel_type, name).with_id(part.relationship_id.clone()));
            }
        }
        Ok(())
    }

    fn write_styles(&mut self) -> DocxResult<()> {
        let xml = StylesWriter::new().write(self.document.styles(), &mut self.report);
        self.add_xml(STYLES_PART, xml, content_type_values::STYLES)?;
        self.document_rels
            .push(RelationshipEntry::new(relationship_types::STYLES, PartName::new(STYLES_PART)?));
        Ok(())
    }

    /// Settings read from the file, or a minimal part for new documents
    fn write_settings(&mut self) -> DocxResult<()> {
        let xml = match self.document.settings() {
            Some(settings) => SettingsWriter::write(settings),
            None => SettingsWriter::write(&SettingsPart::new(DocumentSettings {
                compatibility_mode: Some(DEFAULT_COMPATIBILITY_MODE),
                ..Default::default()
            })),
        };
        self.add_xml(SETTINGS_PART, xml, content_type_values::SETTINGS)?;
        self.document_rels
            .push(RelationshipEntry::new(relationship_types::SETTINGS, PartName::new(SETTINGS_PART)?));
        Ok(())
    }

    fn write_comments(&mut self) -> DocxResult<()> {
        let Some(encoded) = CommentsWriter::write(self.document.comments()) else {
            return Ok(());
        };
        for comment in self.document.comments().iter() {
            let fields = [&comment.author, &comment.initials, &comment.text];
            if fields.iter().any(|field| has_invalid_xml_chars(field)) {
                self.report.warn(
                    WarningKind::InvalidXmlCharacter,
                    COMMENTS_PART,
                    format!("comment {} holds characters XML cannot represent; they were left out", comment.id),
                );
            }
        }
        self.add_xml(COMMENTS_PART, encoded.comments_xml, content_type_values::COMMENTS)?;
        self.add_xml(
            COMMENTS_EXTENDED_PART,
            encoded.extended_xml,
            content_type_values::COMMENTS_EXTENDED,
        )?;
        self.document_rels
            .push(RelationshipEntry::new(relationship_types::COMMENTS, PartName::new(COMMENTS_PART)?));
        self.document_rels.push(RelationshipEntry::new(
            relationship_types::COMMENTS_EXTENDED,
            PartName::new(COMMENTS_EXTENDED_PART)?,
        ));
        Ok(())
    }

    fn write_properties(&mut self) -> DocxResult<()> {
        if self.options.save.write_core_properties {
            let mut core = self.document.core_properties.clone();
            if self.options.save.update_modified {
                let now = Utc::now();
                core.created.get_or_insert(now);
                core.modified = Some(now);
            }
            self.add_xml(CORE_PART, props_io::write_core(&core), content_type_values::CORE_PROPERTIES)?;
            self.root_rels
                .push(RelationshipEntry::new(relationship_types::CORE_PROPERTIES, PartName::new(CORE_PART)?));
        }
        if !self.document.metadata.is_empty() {
            self.add_xml(
                CUSTOM_PART,
                props_io::write_custom(&self.document.metadata),
                content_type_values::CUSTOM_PROPERTIES,
            )?;
            self.root_rels.push(RelationshipEntry::new(
                relationship_types::CUSTOM_PROPERTIES,
                PartName::new(CUSTOM_PART)?,
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::error::DocxError;
    use crate::docx::relationships::Relationships;
    use doc_model::{PreservedPart, Run, RunProperties};

    fn encode_default(document: &Document) -> EncodedPackage {
        encode(document, &EngineOptions::default()).unwrap()
    }

    fn rels(package: &Package, name: &str) -> Relationships {
        Relationships::parse(&package.part_string(name).unwrap(), name).unwrap()
    }

    #[test]
    fn test_new_document_parts() {
        let mut document = Document::new();
        document.add_paragraph("Hello", None);
        let encoded = encode_default(&document);
        let package = &encoded.package;

        for name in [CONTENT_TYPES_PART, "_rels/.rels", DOCUMENT_PART, STYLES_PART, SETTINGS_PART, CORE_PART] {
            assert!(package.contains(name), "missing {name}");
        }
        assert!(!package.contains(COMMENTS_PART));
        assert!(!package.contains(CUSTOM_PART));

        let root = rels(package, "_rels/.rels");
        assert_eq!(root.get_by_type(relationship_types::DOCUMENT).unwrap().target, "word/document.xml");
        let doc = rels(package, "word/_rels/document.xml.rels");
        assert_eq!(doc.get_by_type(relationship_types::STYLES).unwrap().target, "styles.xml");
        assert!(doc.get_by_type(relationship_types::COMMENTS).is_none());
        assert!(encoded.report.is_empty(), "{}", encoded.report.summary());
    }

    #[test]
    fn test_content_types_cover_every_part() {
        let mut document = Document::new();
        document.add_paragraph("Body", None);
        document.add_comment_at(0, "Alice", "note").unwrap();
        document.metadata.insert("Client".into(), "ACME".into());
        let package = encode_default(&document).package;

        let ct = ContentTypes::parse(&package.part_string(CONTENT_TYPES_PART).unwrap()).unwrap();
        for name in package.part_names().filter(|n| n.as_str() != CONTENT_TYPES_PART) {
            assert!(ct.get_content_type(name).is_some(), "untyped {name}");
        }
        let comments = PartName::new(COMMENTS_EXTENDED_PART).unwrap();
        assert_eq!(ct.get_content_type(&comments), Some(content_type_values::COMMENTS_EXTENDED));
    }

    #[test]
    fn test_preserved_header_keeps_relationship_id() {
        let mut document = Document::new();
        document.add_paragraph("Body", None);
        document.add_preserved_part(PreservedPart {
            kind: PartKind::Header,
            name: "word/header1.xml".into(),
            content_type: "application/vnd.openxmlformats-officedocument.wordprocessingml.header+xml".into(),
            relationship_id: Some("rId1".into()),
            data: b"<w:hdr/>".to_vec(),
        });
        document.content_mut().set_section_properties(Some(
            r#"<w:sectPr><w:headerReference w:type="default" r:id="rId1"/></w:sectPr>"#.into(),
        ));

        let encoded = encode_default(&document);
        let doc = rels(&encoded.package, "word/_rels/document.xml.rels");
        let header = doc.get("rId1").unwrap();
        assert_eq!(header.rel_type, relationship_types::HEADER);
        assert_eq!(header.target, "header1.xml");
        assert_ne!(doc.get_by_type(relationship_types::STYLES).unwrap().id, "rId1");

        let xml = encoded.package.part_string(DOCUMENT_PART).unwrap();
        assert!(xml.contains(r#"r:id="rId1""#));
        assert!(encoded.report.is_empty());
    }

    #[test]
    fn test_colliding_preserved_part_dropped() {
        let mut document = Document::new();
        document.add_preserved_part(PreservedPart {
            kind: PartKind::Dependency,
            name: "word/styles.xml".into(),
            content_type: content_type_values::STYLES.into(),
            relationship_id: None,
            data: b"<bogus/>".to_vec(),
        });
        let encoded = encode_default(&document);
        assert!(encoded.report.has(WarningKind::UnsupportedContent));
        assert_ne!(encoded.package.part(STYLES_PART).unwrap(), b"<bogus/>");
    }

    #[test]
    fn test_core_properties_options() {
        let document = Document::new();
        let mut options = EngineOptions::default();
        options.save.write_core_properties = false;
        let package = encode(&document, &options).unwrap().package;
        assert!(!package.contains(CORE_PART));
        let root = rels(&package, "_rels/.rels");
        assert!(root.get_by_type(relationship_types::CORE_PROPERTIES).is_none());

        let package = encode_default(&document).package;
        let core = props_io::parse_core(&package.part_string(CORE_PART).unwrap(), CORE_PART).unwrap();
        assert!(core.modified.is_some());
    }

    #[test]
    fn test_unstorable_font_size_refused() {
        let sized = |points: f32| RunProperties {
            font_size: Some(points),
            ..Default::default()
        };

        let mut document = Document::new();
        document.add_formatted_paragraph(None, vec![Run::with_properties("x", sized(10.3))]);
        let err = encode(&document, &EngineOptions::default()).unwrap_err();
        assert!(matches!(err, DocxError::Model(ref e) if e.is_configuration_error()));

        let mut document = Document::new();
        document.styles_mut().defaults.run = sized(f32::NAN);
        assert!(encode(&document, &EngineOptions::default()).is_err());

        let mut document = Document::new();
        document.add_formatted_paragraph(None, vec![Run::with_properties("x", sized(10.5))]);
        assert!(encode(&document, &EngineOptions::default()).is_ok());
    }

    #[test]
    fn test_unrepresentable_comment_text_reported() {
        let mut document = Document::new();
        document.add_paragraph("Body", None);
        document.add_comment_at(0, "Alice", "bell\u{7}").unwrap();
        let encoded = encode_default(&document);
        let warnings = encoded.report.by_kind(WarningKind::InvalidXmlCharacter);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].part.as_deref(), Some(COMMENTS_PART));
        let xml = encoded.package.part_string(COMMENTS_PART).unwrap();
        assert!(xml.contains(">bell<"));
    }
}
