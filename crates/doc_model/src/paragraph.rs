//! Paragraph - an ordered sequence of runs

use crate::comment::CommentId;
use crate::error::{DocModelError, Result};
use crate::properties::ParagraphProperties;
use crate::run::Run;
use crate::style::ParagraphStyleId;
use serde::{Deserialize, Serialize};

/// A paragraph
///
/// The concatenated text of the runs is cached and kept in sync by every
/// mutator, which is why the run list is private.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "ParagraphData")]
pub struct Paragraph {
    runs: Vec<Run>,
    #[serde(skip)]
    text: String,
    /// Paragraph style reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<ParagraphStyleId>,
    /// Direct paragraph formatting
    #[serde(default)]
    pub properties: ParagraphProperties,
    /// Comments anchored to this paragraph, in anchoring order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub comments: Vec<CommentId>,
}

#[derive(Deserialize)]
struct ParagraphData {
    #[serde(default)]
    runs: Vec<Run>,
    #[serde(default)]
    style: Option<ParagraphStyleId>,
    #[serde(default)]
    properties: ParagraphProperties,
    #[serde(default)]
    comments: Vec<CommentId>,
}

impl From<ParagraphData> for Paragraph {
    fn from(data: ParagraphData) -> Self {
        let mut para = Paragraph::from_runs(data.runs);
        para.style = data.style;
        para.properties = data.properties;
        para.comments = data.comments;
        para
    }
}

impl Paragraph {
    /// Create an empty paragraph
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a paragraph holding one unformatted run
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::from_runs(vec![Run::new(text)])
    }

    /// Create a paragraph from runs
    pub fn from_runs(runs: Vec<Run>) -> Self {
        let mut para = Self {
            runs,
            ..Default::default()
        };
        para.refresh_text();
        para
    }

    /// Builder: set the paragraph style
    pub fn styled(mut self, style: impl Into<ParagraphStyleId>) -> Self {
        self.style = Some(style.into());
        self
    }

    /// Concatenated run text
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    pub fn run(&self, index: usize) -> Option<&Run> {
        self.runs.get(index)
    }

    pub fn push_run(&mut self, run: Run) {
        self.text.push_str(&run.text);
        self.runs.push(run);
    }

    /// Replace all runs
    pub fn set_runs(&mut self, runs: Vec<Run>) {
        self.runs = runs;
        self.refresh_text();
    }

    /// Modify one run in place
    pub fn update_run<R>(&mut self, index: usize, f: impl FnOnce(&mut Run) -> R) -> Result<R> {
        let len = self.runs.len();
        let run = self
            .runs
            .get_mut(index)
            .ok_or(DocModelError::RunOutOfRange { index, len })?;
        let result = f(run);
        self.refresh_text();
        Ok(result)
    }

    /// Replace `from` with `to` inside each run. Matches that span two runs
    /// are not found. Returns the number of replacements.
    pub fn replace_text(&mut self, from: &str, to: &str) -> usize {
        let count = self.runs.iter_mut().map(|r| r.replace_text(from, to)).sum();
        if count > 0 {
            self.refresh_text();
        }
        count
    }

    /// The first anchored comment, if any
    pub fn comment_id(&self) -> Option<CommentId> {
        self.comments.first().copied()
    }

    pub fn has_comment(&self) -> bool {
        !self.comments.is_empty()
    }

    fn refresh_text(&mut self) {
        self.text = self.runs.iter().map(|r| r.text.as_str()).collect();
    }
}
