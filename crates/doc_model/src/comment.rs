//! Comment model - annotations and reply threads
//!
//! The [`CommentManager`] owns every comment of a document. It allocates
//! IDs from a monotonic counter, so an ID is never reused within a session,
//! even after the comment holding it is deleted. Anchoring comments to
//! paragraphs is the job of [`crate::Document`], which keeps anchors and
//! comments consistent.

use crate::error::{DocModelError, Result};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// Initials used for a word that starts with a CJK character
pub const CJK_INITIALS_PLACEHOLDER: &str = "U";

/// Identifier of a comment, unique within a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommentId(u32);

impl CommentId {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for CommentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for CommentId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// A comment or a reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub author: String,
    /// Creation time, second precision
    pub date: Option<DateTime<Utc>>,
    /// Plain text. Paragraph breaks inside the comment are `\n`.
    pub text: String,
    pub initials: String,
    /// Position in the manager's list
    pub index: usize,
    /// The comment this one replies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<CommentId>,
    #[serde(default)]
    pub resolved: bool,
}

impl Comment {
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }
}

/// Derive initials from an author name: the first letter of each word,
/// upper-cased. Words starting with a CJK character contribute
/// [`CJK_INITIALS_PLACEHOLDER`].
pub fn author_initials(author: &str) -> String {
    let mut initials = String::new();
    for word in author.split_whitespace() {
        let Some(first) = word.graphemes(true).next() else {
            continue;
        };
        if first.chars().next().is_some_and(is_cjk) {
            initials.push_str(CJK_INITIALS_PLACEHOLDER);
        } else {
            initials.push_str(&first.to_uppercase());
        }
    }
    initials
}

fn is_cjk(c: char) -> bool {
    matches!(
        c as u32,
        0x3040..=0x30FF       // kana
            | 0x3400..=0x4DBF // extension A
            | 0x4E00..=0x9FFF // unified ideographs
            | 0xAC00..=0xD7AF // hangul
            | 0xF900..=0xFAFF
            | 0x20000..=0x2A6DF
    )
}

/// Current time truncated to whole seconds, the precision `w:date` keeps
pub fn comment_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// The comments of one document, in creation order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommentManager {
    comments: Vec<Comment>,
    next_id: u32,
}

impl CommentManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Comment> {
        self.comments.iter()
    }

    pub fn get(&self, id: CommentId) -> Option<&Comment> {
        self.comments.iter().find(|c| c.id == id)
    }

    pub fn contains(&self, id: CommentId) -> bool {
        self.get(id).is_some()
    }

    /// The ID the next comment will receive
    pub fn next_id(&self) -> CommentId {
        CommentId(self.next_id)
    }

    fn validate(author: &str, text: &str) -> Result<()> {
        if author.trim().is_empty() {
            return Err(DocModelError::InvalidOperation("comment author must not be empty".into()));
        }
        if text.is_empty() {
            return Err(DocModelError::InvalidOperation("comment text must not be empty".into()));
        }
        Ok(())
    }

    fn push(&mut self, author: &str, text: &str, parent_id: Option<CommentId>) -> Result<CommentId> {
        let id = CommentId(self.next_id);
        self.next_id = self
            .next_id
            .checked_add(1)
            .ok_or_else(|| DocModelError::InvalidOperation("comment IDs exhausted".into()))?;
        self.comments.push(Comment {
            id,
            author: author.to_string(),
            date: Some(comment_timestamp()),
            text: text.to_string(),
            initials: author_initials(author),
            index: self.comments.len(),
            parent_id,
            resolved: false,
        });
        tracing::debug!(comment_id = id.value(), reply = parent_id.is_some(), "comment added");
        Ok(id)
    }

    /// Create a top-level comment. Author and text must be non-empty.
    pub fn add(&mut self, author: &str, text: &str) -> Result<CommentId> {
        Self::validate(author, text)?;
        self.push(author, text, None)
    }

    /// Create a reply to `parent`
    pub fn add_reply(&mut self, parent: CommentId, author: &str, text: &str) -> Result<CommentId> {
        Self::validate(author, text)?;
        if !self.contains(parent) {
            return Err(DocModelError::CommentNotFound(parent.value()));
        }
        self.push(author, text, Some(parent))
    }

    /// Add a comment read from a file, keeping its ID. Later allocations
    /// continue above the highest ID seen.
    pub fn insert_loaded(&mut self, mut comment: Comment) -> Result<()> {
        if self.contains(comment.id) {
            return Err(DocModelError::InvalidOperation(format!(
                "duplicate comment id {}",
                comment.id
            )));
        }
        self.next_id = self.next_id.max(comment.id.value().saturating_add(1));
        comment.index = self.comments.len();
        self.comments.push(comment);
        Ok(())
    }

    /// Mark a comment resolved
    pub fn resolve(&mut self, id: CommentId) -> Result<()> {
        let comment = self
            .comments
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(DocModelError::CommentNotFound(id.value()))?;
        comment.resolved = true;
        Ok(())
    }

    /// Clear a comment's parent link, making it top-level
    pub fn detach_reply(&mut self, id: CommentId) -> Result<()> {
        let comment = self
            .comments
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(DocModelError::CommentNotFound(id.value()))?;
        comment.parent_id = None;
        Ok(())
    }

    /// Delete a comment and, transitively, all replies to it.
    /// Returns the removed comments.
    pub fn delete(&mut self, id: CommentId) -> Result<Vec<Comment>> {
        if !self.contains(id) {
            return Err(DocModelError::CommentNotFound(id.value()));
        }

        let mut doomed = vec![id];
        let mut i = 0;
        while i < doomed.len() {
            let parent = doomed[i];
            doomed.extend(
                self.comments
                    .iter()
                    .filter(|c| c.parent_id == Some(parent))
                    .map(|c| c.id),
            );
            i += 1;
        }

        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.comments)
            .into_iter()
            .partition(|c| doomed.contains(&c.id));
        self.comments = kept;
        for (index, comment) in self.comments.iter_mut().enumerate() {
            comment.index = index;
        }
        tracing::debug!(comment_id = id.value(), removed = removed.len(), "comment deleted");
        Ok(removed)
    }

    /// Comments written by `author`, exact match
    pub fn by_author(&self, author: &str) -> Vec<&Comment> {
        self.comments.iter().filter(|c| c.author == author).collect()
    }

    /// Comments not yet resolved
    pub fn unresolved(&self) -> Vec<&Comment> {
        self.comments.iter().filter(|c| !c.resolved).collect()
    }

    /// Direct replies to `id`
    pub fn replies_to(&self, id: CommentId) -> Vec<&Comment> {
        self.comments.iter().filter(|c| c.parent_id == Some(id)).collect()
    }
}
