//! Text run - a contiguous span of text with uniform formatting

use crate::properties::RunProperties;
use crate::style::CharacterStyleId;
use serde::{Deserialize, Serialize};

/// A text run
///
/// Adjacent runs are never merged, even when their formatting matches.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// The text content of this run. Tabs and line breaks are stored as
    /// `\t` and `\n`.
    pub text: String,
    /// Direct formatting
    #[serde(default)]
    pub properties: RunProperties,
    /// Character style reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<CharacterStyleId>,
}

impl Run {
    /// Create a new unformatted run
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Create a run with direct formatting
    pub fn with_properties(text: impl Into<String>, properties: RunProperties) -> Self {
        Self {
            text: text.into(),
            properties,
            style: None,
        }
    }

    /// Builder: bold on
    pub fn bold(mut self) -> Self {
        self.properties.bold = Some(true);
        self
    }

    /// Builder: italic on
    pub fn italic(mut self) -> Self {
        self.properties.italic = Some(true);
        self
    }

    /// Builder: underline on
    pub fn underline(mut self) -> Self {
        self.properties.underline = Some(true);
        self
    }

    /// Builder: font size in points
    pub fn size(mut self, points: f32) -> Self {
        self.properties.font_size = Some(points);
        self
    }

    /// Builder: font family
    pub fn font(mut self, name: impl Into<String>) -> Self {
        self.properties.font_name = Some(name.into());
        self
    }

    /// Builder: character style
    pub fn styled(mut self, style: impl Into<CharacterStyleId>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Replace every occurrence of `from` within this run. Returns the count.
    pub fn replace_text(&mut self, from: &str, to: &str) -> usize {
        if from.is_empty() {
            return 0;
        }
        let count = self.text.matches(from).count();
        if count > 0 {
            self.text = self.text.replace(from, to);
        }
        count
    }
}
