//! Relationships (.rels) file parsing and generation
//!
//! DOCX uses relationships to connect parts of the document together.
//! A relationship set keeps the file order and the original IDs; a second
//! entry with an ID already seen is dropped and remembered as a duplicate.

use crate::docx::error::{DocxError, DocxResult};
use crate::docx::reader::{escape_xml, XmlParser, XML_DECLARATION};
use quick_xml::events::{BytesStart, Event};
use std::collections::HashMap;

/// A single relationship in a .rels file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Unique ID within the rels file (e.g., "rId1")
    pub id: String,
    /// Relationship type URI
    pub rel_type: String,
    /// Target path (relative to the source part) or external URI
    pub target: String,
    /// Target mode (Internal or External)
    pub target_mode: TargetMode,
}

impl Relationship {
    pub fn is_external(&self) -> bool {
        self.target_mode == TargetMode::External
    }
}

/// Target mode for relationships
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TargetMode {
    /// Internal target within the package
    #[default]
    Internal,
    /// External target (URL)
    External,
}

/// Collection of relationships from a .rels file
#[derive(Debug, Clone, Default)]
pub struct Relationships {
    relationships: Vec<Relationship>,
    index: HashMap<String, usize>,
    duplicates: Vec<Relationship>,
}

impl Relationships {
    /// Create a new empty relationships collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a .rels file from its XML content. `part` names the file in errors.
    pub fn parse(content: &str, part: &str) -> DocxResult<Self> {
        let mut result = Self::new();
        let mut reader = XmlParser::from_string(content);
        let mut buf = Vec::new();

        loop {
            match XmlParser::next_event(&mut reader, &mut buf, part, content)? {
                Event::Empty(ref e) | Event::Start(ref e) => {
                    if XmlParser::matches_element(e.name().as_ref(), "Relationship") {
                        let id = required(e, "Id", part)?;
                        let rel_type = required(e, "Type", part)?;
                        let target = required(e, "Target", part)?;
                        let target_mode = match XmlParser::get_attribute(e, b"TargetMode").as_deref() {
                            Some("External") => TargetMode::External,
                            _ => TargetMode::Internal,
                        };

                        let rel = Relationship {
                            id,
                            rel_type,
                            target,
                            target_mode,
                        };
                        if !result.insert(rel.clone()) {
                            result.duplicates.push(rel);
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

    /// Insert a relationship under its own ID. Returns false, leaving the
    /// set unchanged, when the ID is taken.
    pub fn insert(&mut self, rel: Relationship) -> bool {
        if self.index.contains_key(&rel.id) {
            return false;
        }
        self.index.insert(rel.id.clone(), self.relationships.len());
        self.relationships.push(rel);
        true
    }

    /// Add a relationship under a fresh `rIdN` ID and return the ID
    pub fn add(&mut self, rel_type: &str, target: &str, target_mode: TargetMode) -> String {
        let id = self.next_free_id();
        self.insert(Relationship {
            id: id.clone(),
            rel_type: rel_type.to_string(),
            target: target.to_string(),
            target_mode,
        });
        id
    }

    /// The lowest `rIdN` not in use
    fn next_free_id(&self) -> String {
        (1u32..)
            .map(|n| format!("rId{n}"))
            .find(|id| !self.index.contains_key(id))
            .unwrap_or_default()
    }

    /// Get a relationship by ID
    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.index.get(id).map(|&i| &self.relationships[i])
    }

    /// First relationship of a given type, in file order
    pub fn get_by_type(&self, rel_type: &str) -> Option<&Relationship> {
        self.relationships.iter().find(|r| r.rel_type == rel_type)
    }

    /// All relationships of a given type, in file order
    pub fn get_all_by_type(&self, rel_type: &str) -> Vec<&Relationship> {
        self.relationships.iter().filter(|r| r.rel_type == rel_type).collect()
    }

    /// Check if a relationship exists
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }

    /// All relationships, in file order
    pub fn all(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.iter()
    }

    /// Entries dropped because their ID was already used
    pub fn duplicates(&self) -> &[Relationship] {
        &self.duplicates
    }

    /// Generate XML content for the .rels file
    pub fn to_xml(&self) -> String {
        let mut xml = String::new();
        xml.push_str(XML_DECLARATION);
        xml.push('\n');
        xml.push_str(r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#);

        for rel in &self.relationships {
            xml.push_str(&format!(
                r#"<Relationship Id="{}" Type="{}" Target="{}""#,
                escape_xml(&rel.id),
                escape_xml(&rel.rel_type),
                escape_xml(&rel.target)
            ));
            if rel.is_external() {
                xml.push_str(r#" TargetMode="External""#);
            }
            xml.push_str("/>");
        }

        xml.push_str("</Relationships>");
        xml
    }
}

fn required(e: &BytesStart<'_>, key: &str, part: &str) -> DocxResult<String> {
    XmlParser::get_attribute(e, key.as_bytes())
        .ok_or_else(|| DocxError::parse(part, format!("Relationship missing {key}")))
}
