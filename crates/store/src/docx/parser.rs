//! Main DOCX decoding logic
//!
//! This module coordinates parsing of all DOCX parts and builds the
//! [`Document`]. Only the package structure and the main document part are
//! mandatory; every other part degrades to a warning and a default.

use crate::docx::comments_io::{assign_ids, CommentsParser, LoadedComments};
use crate::docx::content_types::FALLBACK_CONTENT_TYPE;
use crate::docx::document::{CommentAnchor, DocumentParser};
use crate::docx::error::{DocxError, DocxResult};
use crate::docx::package::{Package, PartName};
use crate::docx::props_io;
use crate::docx::relationship_types;
use crate::docx::resolver::PackageGraph;
use crate::docx::settings_io::SettingsParser;
use crate::docx::styles::StylesParser;
use crate::docx::validation::{ValidationReport, WarningKind};
use crate::options::EngineOptions;
use doc_model::{CommentId, Document, PartKind, PreservedPart, StyleSheet};
use std::collections::{BTreeSet, HashSet};

/// Parts carried through a round trip, keyed by their relationship from the
/// main document
const PRESERVED: &[(PartKind, &str)] = &[
    (PartKind::Header, relationship_types::HEADER),
    (PartKind::Footer, relationship_types::FOOTER),
    (PartKind::Footnotes, relationship_types::FOOTNOTES),
    (PartKind::Endnotes, relationship_types::ENDNOTES),
    (PartKind::Theme, relationship_types::THEME),
    (PartKind::FontTable, relationship_types::FONT_TABLE),
    (PartKind::Numbering, relationship_types::NUMBERING),
    (PartKind::WebSettings, relationship_types::WEB_SETTINGS),
];

/// A decoded document with the warnings raised while reading it
#[derive(Debug)]
pub struct DecodedDocument {
    pub document: Document,
    pub report: ValidationReport,
}

/// Decode a package into a document
pub fn decode(package: Package, options: &EngineOptions) -> DocxResult<DecodedDocument> {
    DocxParser::new(package, options).parse()
}

struct DocxParser<'a> {
    package: Package,
    options: &'a EngineOptions,
    report: ValidationReport,
}

impl<'a> DocxParser<'a> {
    fn new(package: Package, options: &'a EngineOptions) -> Self {
        Self {
            package,
            options,
            report: ValidationReport::new(),
        }
    }

    fn parse(mut self) -> DocxResult<DecodedDocument> {
        let graph = PackageGraph::load(&mut self.package, &mut self.report)?;
        let main = graph.main_document()?;
        if !self.package.contains(main.as_str()) {
            return Err(DocxError::CorruptPackage(format!("main document part '{main}' is missing")));
        }

        let document_xml = self.package.part_string(main.as_str())?;
        let body = DocumentParser::new(main.as_str(), &document_xml, &mut self.report).parse()?;

        let mut document = Document::with_styles(self.read_styles(&graph, &main));
        *document.content_mut() = body.content;

        if self.options.open.load_comments {
            let loaded = self.read_comments(&graph, &main).unwrap_or_default();
            self.attach_comments(&mut document, loaded, &body.anchors, main.as_str());
        }

        self.read_settings(&graph, &main, &mut document);
        self.read_properties(&graph, &mut document);

        if self.options.open.preserve_unknown_parts {
            self.collect_preserved(&graph, &main, &mut document);
        }

        if self.options.open.strict && !self.report.is_empty() {
            return Err(DocxError::Validation(self.report.summary()));
        }

        tracing::debug!(
            paragraphs = document.paragraphs().len(),
            tables = document.tables().len(),
            comments = document.comments().len(),
            styles = document.styles().len(),
            preserved = document.preserved_parts().len(),
            warnings = self.report.len(),
            "document decoded"
        );
        Ok(DecodedDocument {
            document,
            report: self.report,
        })
    }

    /// Text of an optional part, or `None` with a warning when it cannot be read
    fn auxiliary_text(&mut self, part: &PartName) -> Option<String> {
        if !self.package.contains(part.as_str()) {
            return None;
        }
        match self.package.part_string(part.as_str()) {
            Ok(text) => Some(text),
            Err(e) => {
                self.report
                    .warn(WarningKind::AuxiliaryPartUnreadable, part.as_str(), e.to_string());
                None
            }
        }
    }

    fn read_styles(&mut self, graph: &PackageGraph, main: &PartName) -> StyleSheet {
        let mut sheet = graph
            .part_for_type(Some(main), relationship_types::STYLES)
            .and_then(|part| {
                let xml = self.auxiliary_text(&part)?;
                match StylesParser::new(part.as_str(), &xml, &mut self.report).parse() {
                    Ok(sheet) => Some(sheet),
                    Err(e) => {
                        self.report.warn(
                            WarningKind::AuxiliaryPartUnreadable,
                            part.as_str(),
                            format!("{e}; built-in styles used instead"),
                        );
                        None
                    }
                }
            })
            .unwrap_or_else(StyleSheet::with_builtins);
        sheet.set_conflict_strategy(self.options.styles.conflict_strategy);
        sheet
    }

    fn read_comments(&mut self, graph: &PackageGraph, main: &PartName) -> Option<LoadedComments> {
        let part = graph.part_for_type(Some(main), relationship_types::COMMENTS)?;
        let xml = self.auxiliary_text(&part)?;
        let parsed = match CommentsParser::parse_comments(&xml, part.as_str()) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.report.warn(
                    WarningKind::AuxiliaryPartUnreadable,
                    part.as_str(),
                    format!("{e}; comments dropped"),
                );
                return None;
            }
        };

        let extensions = graph
            .part_for_type(Some(main), relationship_types::COMMENTS_EXTENDED)
            .and_then(|ext| {
                let xml = self.auxiliary_text(&ext)?;
                match CommentsParser::parse_extended(&xml, ext.as_str()) {
                    Ok(extensions) => Some(extensions),
                    Err(e) => {
                        self.report.warn(
                            WarningKind::AuxiliaryPartUnreadable,
                            ext.as_str(),
                            format!("{e}; reply threading dropped"),
                        );
                        None
                    }
                }
            })
            .unwrap_or_default();

        Some(assign_ids(parsed, &extensions, part.as_str(), &mut self.report))
    }

    /// Load comments into the document and reconcile them with the body markers
    fn attach_comments(
        &mut self,
        document: &mut Document,
        loaded: LoadedComments,
        anchors: &[CommentAnchor],
        main: &str,
    ) {
        for comment in loaded.comments {
            let id = comment.id;
            if let Err(e) = document.comments_mut().insert_loaded(comment) {
                self.report.warn(WarningKind::DuplicateCommentId, main, format!("comment {id} dropped: {e}"));
            }
        }

        let mut in_cells = HashSet::new();
        for anchor in anchors {
            let Some(&id) = loaded.ids.get(&anchor.raw_id) else {
                self.report.warn(
                    WarningKind::DanglingCommentReference,
                    main,
                    format!("comment id {} has no entry in the comments part", anchor.raw_id),
                );
                continue;
            };
            match anchor.paragraph {
                Some(index) => {
                    if let Err(e) = document.anchor_comment(index, id) {
                        self.report.warn(WarningKind::DanglingCommentReference, main, e.to_string());
                    }
                }
                None => {
                    in_cells.insert(id);
                    self.report.warn(
                        WarningKind::UnsupportedContent,
                        main,
                        format!("comment {id} is anchored inside a table cell and was loaded unanchored"),
                    );
                }
            }
        }

        let orphans: Vec<CommentId> = document
            .comments()
            .iter()
            .filter(|c| !c.is_reply() && !in_cells.contains(&c.id))
            .map(|c| c.id)
            .filter(|id| document.comment_anchor(*id).is_none())
            .collect();
        for id in orphans {
            self.report.warn(
                WarningKind::OrphanedComment,
                main,
                format!("comment {id} is not referenced from the document body"),
            );
        }
    }

    fn read_settings(&mut self, graph: &PackageGraph, main: &PartName, document: &mut Document) {
        let Some(part) = graph.part_for_type(Some(main), relationship_types::SETTINGS) else {
            return;
        };
        let Some(xml) = self.auxiliary_text(&part) else {
            return;
        };
        match SettingsParser::parse(&xml, part.as_str()) {
            Ok(settings) => document.set_settings(Some(settings)),
            Err(e) => self.report.warn(
                WarningKind::AuxiliaryPartUnreadable,
                part.as_str(),
                format!("{e}; default settings used"),
            ),
        }
    }

    fn read_properties(&mut self, graph: &PackageGraph, document: &mut Document) {
        if let Some(part) = graph.part_for_type(None, relationship_types::CORE_PROPERTIES) {
            if let Some(xml) = self.auxiliary_text(&part) {
                match props_io::parse_core(&xml, part.as_str()) {
                    Ok(props) => document.core_properties = props,
                    Err(e) => self.report.warn(WarningKind::AuxiliaryPartUnreadable, part.as_str(), e.to_string()),
                }
            }
        }
        if let Some(part) = graph.part_for_type(None, relationship_types::CUSTOM_PROPERTIES) {
            if let Some(xml) = self.auxiliary_text(&part) {
                match props_io::parse_custom(&xml, part.as_str()) {
                    Ok(metadata) => document.metadata = metadata,
                    Err(e) => self.report.warn(WarningKind::AuxiliaryPartUnreadable, part.as_str(), e.to_string()),
                }
            }
        }
    }

    /// Headers, footers and the other unmodeled parts, plus everything
    /// reachable from them and their own relationship parts
    fn collect_preserved(&self, graph: &PackageGraph, main: &PartName, document: &mut Document) {
        let mut taken: BTreeSet<PartName> = BTreeSet::new();
        let mut dependencies: Vec<PartName> = Vec::new();

        for (kind, rel_type) in PRESERVED {
            for (id, name) in graph.parts_for_type(Some(main), rel_type) {
                if !taken.insert(name.clone()) {
                    continue;
                }
                let Some(part) = self.preserved_part(graph, *kind, &name, Some(id)) else {
                    continue;
                };
                document.add_preserved_part(part);
                dependencies.extend(graph.reachable_from(&self.package, &name));
                dependencies.push(name.rels_part());
            }
        }

        let mut index = 0;
        while index < dependencies.len() {
            let name = dependencies[index].clone();
            index += 1;
            if name == *main || !taken.insert(name.clone()) {
                continue;
            }
            if let Some(part) = self.preserved_part(graph, PartKind::Dependency, &name, None) {
                document.add_preserved_part(part);
                dependencies.push(name.rels_part());
            }
        }
    }

    fn preserved_part(
        &self,
        graph: &PackageGraph,
        kind: PartKind,
        name: &PartName,
        relationship_id: Option<String>,
    ) -> Option<PreservedPart> {
        let part = self.package.get(name.as_str())?;
        let content_type = part
            .content_type
            .clone()
            .or_else(|| graph.content_type(name).map(str::to_string))
            .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string());
        Some(PreservedPart {
            kind,
            name: name.as_str().to_string(),
            content_type,
            relationship_id,
            data: part.data.clone(),
        })
    }
}
