//! Content-type and relationship resolver
//!
//! [`PackageGraph`] joins the content type table with every relationship
//! scope of a package. The reader uses it to find parts by relationship
//! type; the writer uses [`regenerate`] to build fresh relationship sets
//! from the parts it actually emits.

use crate::docx::content_types::ContentTypes;
use crate::docx::error::{DocxError, DocxResult};
use crate::docx::package::{Package, PartName, CONTENT_TYPES_PART};
use crate::docx::relationship_types;
use crate::docx::relationships::{Relationship, Relationships, TargetMode};
use crate::docx::validation::{ValidationReport, WarningKind};
use std::collections::{BTreeMap, BTreeSet};

/// Relationship scope: the owning part, or `None` for the package root
pub type Scope = Option<PartName>;

/// Content types and relationships of a package
#[derive(Debug, Clone, Default)]
pub struct PackageGraph {
    content_types: ContentTypes,
    scopes: BTreeMap<Scope, Relationships>,
}

impl PackageGraph {
    /// Read `[Content_Types].xml` and every `.rels` part.
    ///
    /// The content types part and the root relationships are mandatory;
    /// other relationship parts that fail to parse are reported and skipped.
    /// Declared content types are recorded on the package's parts.
    pub fn load(package: &mut Package, report: &mut ValidationReport) -> DocxResult<Self> {
        if !package.contains(CONTENT_TYPES_PART) {
            return Err(DocxError::CorruptPackage(format!("missing {CONTENT_TYPES_PART}")));
        }
        let content_types = ContentTypes::parse(&package.part_string(CONTENT_TYPES_PART)?)?;

        let root_rels = PartName::root_rels();
        if !package.contains(root_rels.as_str()) {
            return Err(DocxError::CorruptPackage(format!("missing {root_rels}")));
        }

        let names: Vec<PartName> = package.part_names().cloned().collect();
        let mut scopes = BTreeMap::new();

        for name in &names {
            if name.as_str() == CONTENT_TYPES_PART {
                continue;
            }
            match content_types.get_content_type(name) {
                Some(ct) => package.set_content_type(name, ct),
                None => report.warn(
                    WarningKind::MissingContentType,
                    name.as_str(),
                    "part has no declared content type",
                ),
            }

            let Some(scope) = scope_of_rels(name) else {
                continue;
            };
            let parsed = package
                .part_string(name.as_str())
                .and_then(|xml| Relationships::parse(&xml, name.as_str()));
            let rels = match parsed {
                Ok(rels) => rels,
                Err(e) if scope.is_none() => return Err(e),
                Err(e) => {
                    report.warn(WarningKind::AuxiliaryPartUnreadable, name.as_str(), e.to_string());
                    continue;
                }
            };
            for dup in rels.duplicates() {
                report.warn(
                    WarningKind::DuplicateRelationship,
                    name.as_str(),
                    format!("relationship id '{}' repeated, keeping the first entry", dup.id),
                );
            }
            scopes.insert(scope, rels);
        }

        let graph = Self { content_types, scopes };
        graph.report_dangling(package, report);
        tracing::debug!(scopes = graph.scopes.len(), "relationship graph loaded");
        Ok(graph)
    }

    fn report_dangling(&self, package: &Package, report: &mut ValidationReport) {
        for (scope, rels) in &self.scopes {
            let rels_name = scope.as_ref().map_or_else(PartName::root_rels, PartName::rels_part);
            for rel in rels.all().filter(|r| !r.is_external()) {
                let exists = PartName::resolve(scope.as_ref(), &rel.target)
                    .is_ok_and(|target| package.contains(target.as_str()));
                if !exists {
                    report.warn(
                        WarningKind::DanglingRelationship,
                        rels_name.as_str(),
                        format!("relationship '{}' targets missing part '{}'", rel.id, rel.target),
                    );
                }
            }
        }
    }

    pub fn content_types(&self) -> &ContentTypes {
        &self.content_types
    }

    /// Declared content type of a part
    pub fn content_type(&self, part: &PartName) -> Option<&str> {
        self.content_types.get_content_type(part)
    }

    /// Relationships owned by `source` (`None` for the package root)
    pub fn relationships(&self, source: Option<&PartName>) -> Option<&Relationships> {
        self.scopes.get(&source.cloned())
    }

    /// The main document part named by the root `officeDocument` relationship
    pub fn main_document(&self) -> DocxResult<PartName> {
        self.part_for_type(None, relationship_types::DOCUMENT)
            .or_else(|| self.part_for_type(None, relationship_types::DOCUMENT_STRICT))
            .ok_or_else(|| DocxError::CorruptPackage("no officeDocument relationship in _rels/.rels".into()))
    }

    /// Target of the first internal relationship of `rel_type` from `source`
    pub fn part_for_type(&self, source: Option<&PartName>, rel_type: &str) -> Option<PartName> {
        self.parts_for_type(source, rel_type).into_iter().next().map(|(_, name)| name)
    }

    /// `(relationship id, target)` of every internal relationship of `rel_type` from `source`
    pub fn parts_for_type(&self, source: Option<&PartName>, rel_type: &str) -> Vec<(String, PartName)> {
        let Some(rels) = self.relationships(source) else {
            return Vec::new();
        };
        rels.get_all_by_type(rel_type)
            .into_iter()
            .filter(|r| !r.is_external())
            .filter_map(|r| {
                PartName::resolve(source, &r.target)
                    .ok()
                    .map(|name| (r.id.clone(), name))
            })
            .collect()
    }

    /// Target of relationship `id` from `source`
    pub fn target_of(&self, source: Option<&PartName>, id: &str) -> Option<PartName> {
        let rel = self.relationships(source)?.get(id)?;
        if rel.is_external() {
            return None;
        }
        PartName::resolve(source, &rel.target).ok()
    }

    /// Every existing part reachable from `start` through internal
    /// relationships, `start` excluded
    pub fn reachable_from(&self, package: &Package, start: &PartName) -> Vec<PartName> {
        let mut seen = BTreeSet::new();
        let mut queue = vec![start.clone()];
        while let Some(source) = queue.pop() {
            let Some(rels) = self.relationships(Some(&source)) else {
                continue;
            };
            for rel in rels.all().filter(|r| !r.is_external()) {
                let Ok(target) = PartName::resolve(Some(&source), &rel.target) else {
                    continue;
                };
                if target != *start && package.contains(target.as_str()) && seen.insert(target.clone()) {
                    queue.push(target);
                }
            }
        }
        seen.into_iter().collect()
    }
}

/// The scope a `.rels` part describes, or `None` if the part is not a
/// relationships part. `_rels/.rels` is the root scope.
pub fn scope_of_rels(name: &PartName) -> Option<Scope> {
    if !name.is_relationships() {
        return None;
    }
    let dir = name.directory();
    let owner_dir = if dir == "_rels" {
        ""
    } else {
        dir.strip_suffix("/_rels")?
    };
    let owner_file = name.file_name().strip_suffix(".rels")?;
    if owner_file.is_empty() {
        return owner_dir.is_empty().then_some(None);
    }
    let owner = if owner_dir.is_empty() {
        owner_file.to_string()
    } else {
        format!("{owner_dir}/{owner_file}")
    };
    PartName::new(&owner).ok().map(Some)
}

// =============================================================================
// Regeneration
// =============================================================================

/// One relationship the writer wants in a regenerated set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipEntry {
    /// ID to keep if it is still free, e.g. a header `r:id` used by `w:sectPr`
    pub preferred_id: Option<String>,
    pub rel_type: String,
    pub target: PartName,
}

impl RelationshipEntry {
    pub fn new(rel_type: &str, target: PartName) -> Self {
        Self {
            preferred_id: None,
            rel_type: rel_type.to_string(),
            target,
        }
    }

    pub fn with_id(mut self, id: Option<String>) -> Self {
        self.preferred_id = id;
        self
    }
}

/// Build a relationship set for `source` from scratch.
///
/// Entries with a preferred ID keep it unless an earlier entry already took
/// it; everything else gets the lowest free `rIdN`. Returns the set and the
/// ID assigned to each entry, in entry order.
pub fn regenerate(source: Option<&PartName>, entries: &[RelationshipEntry]) -> (Relationships, Vec<String>) {
    let mut rels = Relationships::new();
    let mut ids = vec![String::new(); entries.len()];

    for (i, entry) in entries.iter().enumerate() {
        let Some(id) = &entry.preferred_id else {
            continue;
        };
        let inserted = rels.insert(Relationship {
            id: id.clone(),
            rel_type: entry.rel_type.clone(),
            target: entry.target.relative_to(source),
            target_mode: TargetMode::Internal,
        });
        if inserted {
            ids[i] = id.clone();
        }
    }
    for (i, entry) in entries.iter().enumerate() {
        if ids[i].is_empty() {
            ids[i] = rels.add(&entry.rel_type, &entry.target.relative_to(source), TargetMode::Internal);
        }
    }

    tracing::debug!(
        scope = source.map_or("(root)", PartName::as_str),
        relationships = rels.len(),
        "relationships regenerated"
    );
    (rels, ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::content_type_values;

    fn name(s: &str) -> PartName {
        PartName::new(s).unwrap()
    }

    const CT: &str = r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
</Types>"#;

    const ROOT_RELS: &str = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>
</Relationships>"#;

    const DOC_RELS: &str = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
<Relationship Id="rId7" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/header" Target="header1.xml"/>
<Relationship Id="rId8" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/header" Target="header2.xml"/>
<Relationship Id="rId9" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com" TargetMode="External"/>
<Relationship Id="rId9" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer" Target="footer1.xml"/>
</Relationships>"#;

    const HEADER_RELS: &str = r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/logo.png"/>
</Relationships>"#;

    fn sample_package() -> Package {
        let mut package = Package::new();
        package.add_part(CONTENT_TYPES_PART, CT.as_bytes().to_vec(), None).unwrap();
        package.add_part("_rels/.rels", ROOT_RELS.as_bytes().to_vec(), None).unwrap();
        package.add_part("word/document.xml", b"<w:document/>".to_vec(), None).unwrap();
        package.add_part("word/_rels/document.xml.rels", DOC_RELS.as_bytes().to_vec(), None).unwrap();
        package.add_part("word/styles.xml", b"<w:styles/>".to_vec(), None).unwrap();
        package.add_part("word/header1.xml", b"<w:hdr/>".to_vec(), None).unwrap();
        package.add_part("word/_rels/header1.xml.rels", HEADER_RELS.as_bytes().to_vec(), None).unwrap();
        package.add_part("word/media/logo.png", vec![0x89, 0x50], None).unwrap();
        package
    }

    #[test]
    fn test_scope_of_rels() {
        assert_eq!(scope_of_rels(&name("_rels/.rels")), Some(None));
        assert_eq!(
            scope_of_rels(&name("word/_rels/document.xml.rels")),
            Some(Some(name("word/document.xml")))
        );
        assert_eq!(scope_of_rels(&name("_rels/foo.xml.rels")), Some(Some(name("foo.xml"))));
        assert_eq!(scope_of_rels(&name("word/document.xml")), None);
        assert_eq!(scope_of_rels(&name("word/stray.rels")), None);
    }

    #[test]
    fn test_load_and_lookup() {
        let mut package = sample_package();
        let mut report = ValidationReport::new();
        let graph = PackageGraph::load(&mut package, &mut report).unwrap();

        let main = graph.main_document().unwrap();
        assert_eq!(main, name("word/document.xml"));
        assert_eq!(graph.content_type(&main), Some(content_type_values::DOCUMENT));
        assert_eq!(
            package.get("word/document.xml").unwrap().content_type.as_deref(),
            Some(content_type_values::DOCUMENT)
        );
        assert_eq!(
            graph.part_for_type(Some(&main), relationship_types::STYLES),
            Some(name("word/styles.xml"))
        );
        let headers = graph.parts_for_type(Some(&main), relationship_types::HEADER);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0], ("rId7".to_string(), name("word/header1.xml")));
        assert_eq!(graph.target_of(Some(&main), "rId9"), None);
    }

    #[test]
    fn test_load_reports_problems() {
        let mut package = sample_package();
        let mut report = ValidationReport::new();
        PackageGraph::load(&mut package, &mut report).unwrap();

        // header2.xml is missing, rId9 is declared twice, the png has no type
        assert_eq!(report.by_kind(WarningKind::DanglingRelationship).len(), 1);
        assert_eq!(report.by_kind(WarningKind::DuplicateRelationship).len(), 1);
        assert_eq!(report.by_kind(WarningKind::MissingContentType).len(), 1);
    }

    #[test]
    fn test_reachable_from() {
        let mut package = sample_package();
        let mut report = ValidationReport::new();
        let graph = PackageGraph::load(&mut package, &mut report).unwrap();

        let reachable = graph.reachable_from(&package, &name("word/header1.xml"));
        assert_eq!(reachable, vec![name("word/media/logo.png")]);
    }

    #[test]
    fn test_missing_mandatory_parts() {
        let mut package = Package::new();
        package.add_part("word/document.xml", Vec::new(), None).unwrap();
        let err = PackageGraph::load(&mut package, &mut ValidationReport::new()).unwrap_err();
        assert!(matches!(err, DocxError::CorruptPackage(_)));

        package.add_part(CONTENT_TYPES_PART, CT.as_bytes().to_vec(), None).unwrap();
        let err = PackageGraph::load(&mut package, &mut ValidationReport::new()).unwrap_err();
        assert!(matches!(err, DocxError::CorruptPackage(_)));
    }

    #[test]
    fn test_unreadable_auxiliary_rels_is_a_warning() {
        let mut package = sample_package();
        package.add_part("word/_rels/header1.xml.rels", b"<Relationships><oops".to_vec(), None).unwrap();
        let mut report = ValidationReport::new();
        let graph = PackageGraph::load(&mut package, &mut report).unwrap();

        assert!(report.has(WarningKind::AuxiliaryPartUnreadable));
        assert!(graph.relationships(Some(&name("word/header1.xml"))).is_none());
    }

    #[test]
    fn test_regenerate_keeps_preferred_ids() {
        let main = name("word/document.xml");
        let entries = vec![
            RelationshipEntry::new(relationship_types::STYLES, name("word/styles.xml")),
            RelationshipEntry::new(relationship_types::HEADER, name("word/header1.xml")).with_id(Some("rId1".into())),
            RelationshipEntry::new(relationship_types::FOOTER, name("word/footer1.xml")).with_id(Some("rId1".into())),
            RelationshipEntry::new(relationship_types::CUSTOM_XML, name("customXml/item1.xml")),
        ];

        let (rels, ids) = regenerate(Some(&main), &entries);

        assert_eq!(ids, ["rId2", "rId1", "rId3", "rId4"]);
        assert_eq!(rels.get("rId1").unwrap().target, "header1.xml");
        assert_eq!(rels.get("rId4").unwrap().target, "/customXml/item1.xml");
        assert_eq!(rels.len(), 4);
    }
}
