//! Comments Import/Export for DOCX
//!
//! Reads and writes `word/comments.xml` and `word/commentsExtended.xml`,
//! and produces the `w:commentRangeStart` / `w:commentRangeEnd` /
//! `w:commentReference` markers the document writer places around
//! commented paragraphs.
//!
//! Threading and resolution live in commentsExtended: each `w15:commentEx`
//! points at the last paragraph of a comment by `w14:paraId` and names its
//! parent by that parent's last paragraph.

use crate::docx::error::DocxResult;
use crate::docx::namespaces;
use crate::docx::reader::{escape_xml, write_run_text, XmlParser, XML_DECLARATION};
use crate::docx::validation::{ValidationReport, WarningKind};
use chrono::{DateTime, NaiveDateTime, Utc};
use doc_model::{author_initials, Comment, CommentId, CommentManager};
use quick_xml::events::{BytesStart, Event};
use std::collections::{HashMap, HashSet};

/// First `w14:paraId` handed out to comment paragraphs. Values must stay
/// below 0x80000000.
const FIRST_PARA_ID: u32 = 0x1000_0001;

// =============================================================================
// Comments Parser
// =============================================================================

/// A comment as read from comments.xml, before ID assignment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedComment {
    /// `w:id` as written in the file
    pub raw_id: String,
    pub author: String,
    pub date: Option<DateTime<Utc>>,
    pub initials: Option<String>,
    /// Paragraph texts joined with `\n`
    pub text: String,
    /// `w14:paraId` of the comment's last paragraph
    pub para_id: Option<String>,
    /// Legacy `w:done` attribute
    pub done: bool,
}

/// A `w15:commentEx` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentExtension {
    pub para_id: String,
    pub parent_para_id: Option<String>,
    pub done: bool,
}

/// Parser for the comments parts
pub struct CommentsParser;

impl CommentsParser {
    /// Parse comments.xml
    pub fn parse_comments(content: &str, part: &str) -> DocxResult<Vec<ParsedComment>> {
        let mut reader = XmlParser::from_string(content);
        let mut buf = Vec::new();

        let mut comments = Vec::new();
        let mut current: Option<ParsedComment> = None;
        let mut paragraphs: Vec<String> = Vec::new();
        let mut in_para = false;
        let mut in_text = false;
        let mut in_deleted = 0usize;

        loop {
            match XmlParser::next_event(&mut reader, &mut buf, part, content)? {
                Event::Start(ref e) => {
                    let name = e.name();
                    match XmlParser::local_name(name.as_ref()) {
                        b"comment" => {
                            current = Some(comment_header(e));
                            paragraphs.clear();
                        }
                        b"p" if current.is_some() => {
                            in_para = true;
                            paragraphs.push(String::new());
                            if let Some(comment) = current.as_mut() {
                                if let Some(id) = XmlParser::get_prefixed_attribute(e, "w14", "paraId") {
                                    comment.para_id = Some(id);
                                }
                            }
                        }
                        b"t" if in_para && in_deleted == 0 => in_text = true,
                        b"del" | b"moveFrom" => in_deleted += 1,
                        _ => {}
                    }
                }
                Event::Empty(ref e) => {
                    let name = e.name();
                    match XmlParser::local_name(name.as_ref()) {
                        b"comment" => {
                            comments.push(comment_header(e));
                        }
                        b"p" if current.is_some() => {
                            paragraphs.push(String::new());
                            if let Some(comment) = current.as_mut() {
                                if let Some(id) = XmlParser::get_prefixed_attribute(e, "w14", "paraId") {
                                    comment.para_id = Some(id);
                                }
                            }
                        }
                        b"tab" if in_para => push_char(&mut paragraphs, '\t'),
                        b"br" if in_para => push_char(&mut paragraphs, '\n'),
                        b"cr" if in_para => push_char(&mut paragraphs, '\r'),
                        _ => {}
                    }
                }
                Event::Text(ref e) if in_text => {
                    let text = XmlParser::text(e, part)?;
                    if let Some(last) = paragraphs.last_mut() {
                        last.push_str(&text);
                    }
                }
                Event::End(ref e) => {
                    let name = e.name();
                    match XmlParser::local_name(name.as_ref()) {
                        b"comment" => {
                            if let Some(mut comment) = current.take() {
                                comment.text = paragraphs.join("\n");
                                comments.push(comment);
                            }
                        }
                        b"p" => in_para = false,
                        b"t" => in_text = false,
                        b"del" | b"moveFrom" => in_deleted = in_deleted.saturating_sub(1),
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }

        tracing::debug!(comments = comments.len(), "comments part decoded");
        Ok(comments)
    }

    /// Parse commentsExtended.xml
    pub fn parse_extended(content: &str, part: &str) -> DocxResult<Vec<CommentExtension>> {
        let mut reader = XmlParser::from_string(content);
        let mut buf = Vec::new();
        let mut entries = Vec::new();

        loop {
            match XmlParser::next_event(&mut reader, &mut buf, part, content)? {
                Event::Empty(ref e) | Event::Start(ref e)
                    if XmlParser::matches_element(e.name().as_ref(), "commentEx") =>
                {
                    if let Some(para_id) = XmlParser::get_prefixed_attribute(e, "w15", "paraId") {
                        entries.push(CommentExtension {
                            para_id,
                            parent_para_id: XmlParser::get_prefixed_attribute(e, "w15", "paraIdParent"),
                            done: XmlParser::get_prefixed_attribute(e, "w15", "done")
                                .is_some_and(|v| XmlParser::parse_bool(&v)),
                        });
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        Ok(entries)
    }
}

fn comment_header(e: &BytesStart<'_>) -> ParsedComment {
    ParsedComment {
        raw_id: XmlParser::get_w_attribute(e, "id").unwrap_or_default(),
        author: XmlParser::get_w_attribute(e, "author").unwrap_or_default(),
        date: XmlParser::get_w_attribute(e, "date").and_then(|d| parse_date(&d)),
        initials: XmlParser::get_w_attribute(e, "initials"),
        done: XmlParser::get_w_attribute(e, "done").is_some_and(|v| XmlParser::parse_bool(&v)),
        ..Default::default()
    }
}

fn push_char(paragraphs: &mut [String], c: char) {
    if let Some(last) = paragraphs.last_mut() {
        last.push(c);
    }
}

/// Parse a `w:date` value. Word writes UTC with a `Z`; some producers omit
/// the zone, which is read as UTC.
fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

// =============================================================================
// ID Assignment
// =============================================================================

/// Comments with their final IDs, and the mapping from file IDs to them
#[derive(Debug, Default)]
pub struct LoadedComments {
    pub comments: Vec<Comment>,
    pub ids: HashMap<String, CommentId>,
}

/// Give every parsed comment a [`CommentId`] and apply threading.
///
/// Numeric IDs are kept. Non-numeric IDs, and IDs seen earlier in the part,
/// get fresh IDs above the highest numeric one; the remap is recorded so
/// markers in document.xml still resolve. A repeated ID is only reachable
/// from the body through its first definition. When no fresh ID is left
/// below `u32::MAX` the comment is dropped with a warning.
pub fn assign_ids(
    parsed: Vec<ParsedComment>,
    extensions: &[CommentExtension],
    part: &str,
    report: &mut ValidationReport,
) -> LoadedComments {
    let mut next = match parsed.iter().filter_map(|c| c.raw_id.parse::<u32>().ok()).max() {
        Some(max) => max.checked_add(1),
        None => Some(0),
    };

    let mut loaded = LoadedComments::default();
    let mut taken = HashSet::new();
    let mut by_para: HashMap<String, CommentId> = HashMap::new();

    for comment in parsed {
        let id = match comment.raw_id.parse::<u32>() {
            Ok(n) if taken.insert(n) => CommentId::new(n),
            _ => {
                let duplicate = loaded.ids.contains_key(&comment.raw_id);
                let Some(fresh) = next else {
                    report.warn(
                        WarningKind::DuplicateCommentId,
                        part,
                        format!("no free id left for comment {}; the comment was dropped", comment.raw_id),
                    );
                    continue;
                };
                next = fresh.checked_add(1);
                taken.insert(fresh);
                if duplicate {
                    report.warn(
                        WarningKind::DuplicateCommentId,
                        part,
                        format!("comment id {} is used twice; the second comment was renumbered", comment.raw_id),
                    );
                } else {
                    tracing::debug!(raw = %comment.raw_id, id = fresh, "comment id remapped");
                }
                CommentId::new(fresh)
            }
        };
        loaded.ids.entry(comment.raw_id.clone()).or_insert(id);
        if let Some(para) = &comment.para_id {
            by_para.insert(para.clone(), id);
        }

        let initials = comment
            .initials
            .filter(|i| !i.is_empty())
            .unwrap_or_else(|| author_initials(&comment.author));
        loaded.comments.push(Comment {
            id,
            author: comment.author,
            date: comment.date,
            text: comment.text,
            initials,
            index: loaded.comments.len(),
            parent_id: None,
            resolved: comment.done,
        });
    }

    for ext in extensions {
        let Some(&id) = by_para.get(&ext.para_id) else {
            continue;
        };
        let parent = ext.parent_para_id.as_ref().and_then(|p| by_para.get(p)).copied();
        if let Some(comment) = loaded.comments.iter_mut().find(|c| c.id == id) {
            comment.resolved |= ext.done;
            if parent != Some(id) {
                comment.parent_id = parent;
            }
        }
    }

    loaded
}

// =============================================================================
// Comments Writer
// =============================================================================

/// Encoded comment parts
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedComments {
    /// word/comments.xml
    pub comments_xml: String,
    /// word/commentsExtended.xml
    pub extended_xml: String,
}

/// Writer for the comments parts
pub struct CommentsWriter;

impl CommentsWriter {
    /// Encode every comment of `manager`. Returns `None` when there are none.
    pub fn write(manager: &CommentManager) -> Option<EncodedComments> {
        if manager.is_empty() {
            return None;
        }

        let mut next_para_id = FIRST_PARA_ID;
        let mut last_para: HashMap<CommentId, String> = HashMap::new();

        let mut xml = String::new();
        xml.push_str(XML_DECLARATION);
        xml.push('\n');
        xml.push_str(&format!(
            r#"<w:comments xmlns:w="{}" xmlns:r="{}" xmlns:mc="{}" xmlns:w14="{}" mc:Ignorable="w14">"#,
            namespaces::W,
            namespaces::R,
            namespaces::MC,
            namespaces::W14,
        ));

        for comment in manager.iter() {
            xml.push_str(&format!(
                r#"<w:comment w:id="{}" w:author="{}""#,
                comment.id,
                escape_xml(&comment.author)
            ));
            if let Some(date) = comment.date {
                xml.push_str(&format!(r#" w:date="{}""#, date.format("%Y-%m-%dT%H:%M:%SZ")));
            }
            xml.push_str(&format!(r#" w:initials="{}">"#, escape_xml(&comment.initials)));

            for (i, line) in comment.text.split('\n').enumerate() {
                let para_id = format!("{next_para_id:08X}");
                next_para_id += 1;
                xml.push_str(&format!(r#"<w:p w14:paraId="{para_id}" w14:textId="77777777">"#));
                xml.push_str(r#"<w:pPr><w:pStyle w:val="CommentText"/></w:pPr>"#);
                if i == 0 {
                    xml.push_str(r#"<w:r><w:rPr><w:rStyle w:val="CommentReference"/></w:rPr><w:annotationRef/></w:r>"#);
                }
                if !line.is_empty() {
                    xml.push_str("<w:r>");
                    write_run_text(&mut xml, line);
                    xml.push_str("</w:r>");
                }
                xml.push_str("</w:p>");
                last_para.insert(comment.id, para_id);
            }
            xml.push_str("</w:comment>");
        }
        xml.push_str("</w:comments>");

        let mut ext = String::new();
        ext.push_str(XML_DECLARATION);
        ext.push('\n');
        ext.push_str(&format!(
            r#"<w15:commentsEx xmlns:mc="{}" xmlns:w15="{}" mc:Ignorable="w15">"#,
            namespaces::MC,
            namespaces::W15,
        ));
        for comment in manager.iter() {
            let Some(para_id) = last_para.get(&comment.id) else {
                continue;
            };
            ext.push_str(&format!(r#"<w15:commentEx w15:paraId="{para_id}""#));
            if let Some(parent) = comment.parent_id.and_then(|p| last_para.get(&p)) {
                ext.push_str(&format!(r#" w15:paraIdParent="{parent}""#));
            }
            ext.push_str(&format!(r#" w15:done="{}"/>"#, u8::from(comment.resolved)));
        }
        ext.push_str("</w15:commentsEx>");

        tracing::debug!(comments = manager.len(), "comments encoded");
        Some(EncodedComments {
            comments_xml: xml,
            extended_xml: ext,
        })
    }

    /// Marker opening a commented range
    pub fn range_start(id: CommentId) -> String {
        format!(r#"<w:commentRangeStart w:id="{id}"/>"#)
    }

    /// Marker closing a commented range
    pub fn range_end(id: CommentId) -> String {
        format!(r#"<w:commentRangeEnd w:id="{id}"/>"#)
    }

    /// The run carrying the comment reference mark
    pub fn reference_run(id: CommentId) -> String {
        format!(
            r#"<w:r><w:rPr><w:rStyle w:val="CommentReference"/></w:rPr><w:commentReference w:id="{id}"/></w:r>"#
        )
    }
}
