//! Document-level metadata and parts carried through unmodified

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Package core properties (`docProps/core.xml`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoreProperties {
    pub title: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub keywords: Option<String>,
    pub description: Option<String>,
    pub last_modified_by: Option<String>,
    pub revision: Option<String>,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
}

impl CoreProperties {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// The modeled subset of `word/settings.xml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentSettings {
    /// Default tab stop in twips
    pub default_tab_stop: Option<u32>,
    pub zoom_percent: Option<u32>,
    pub track_revisions: bool,
    pub even_and_odd_headers: bool,
    /// `compatibilityMode` compat setting (15 = Word 2013+)
    pub compatibility_mode: Option<u32>,
}

/// The settings part: modeled values plus the XML they were read from.
///
/// While the settings are untouched the source XML is written back as-is.
/// Any change through [`SettingsPart::update`] drops the source so the
/// writer regenerates the part from the modeled values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsPart {
    settings: DocumentSettings,
    #[serde(skip)]
    source_xml: Option<String>,
}

impl SettingsPart {
    pub fn new(settings: DocumentSettings) -> Self {
        Self {
            settings,
            source_xml: None,
        }
    }

    /// Settings read from a file, remembering the original XML
    pub fn from_source(settings: DocumentSettings, source_xml: String) -> Self {
        Self {
            settings,
            source_xml: Some(source_xml),
        }
    }

    pub fn settings(&self) -> &DocumentSettings {
        &self.settings
    }

    pub fn source_xml(&self) -> Option<&str> {
        self.source_xml.as_deref()
    }

    pub fn update<R>(&mut self, f: impl FnOnce(&mut DocumentSettings) -> R) -> R {
        self.source_xml = None;
        f(&mut self.settings)
    }
}

/// Kinds of package parts kept as opaque bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartKind {
    Header,
    Footer,
    Footnotes,
    Endnotes,
    Theme,
    FontTable,
    Numbering,
    WebSettings,
    /// A part reachable only from another preserved part (images, embeddings)
    Dependency,
}

/// A part carried through a round trip without being modeled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreservedPart {
    pub kind: PartKind,
    /// Normalized part name, e.g. `word/header1.xml`
    pub name: String,
    pub content_type: String,
    /// Relationship ID from `word/document.xml`; `None` for dependencies
    pub relationship_id: Option<String>,
    pub data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_update_drops_source() {
        let mut part = SettingsPart::from_source(DocumentSettings::default(), "<w:settings/>".into());
        assert!(part.source_xml().is_some());

        part.update(|s| s.track_revisions = true);
        assert!(part.source_xml().is_none());
        assert!(part.settings().track_revisions);
    }

    #[test]
    fn test_core_properties_empty() {
        assert!(CoreProperties::default().is_empty());
        let props = CoreProperties {
            title: Some("Report".into()),
            ..Default::default()
        };
        assert!(!props.is_empty());
    }
}
