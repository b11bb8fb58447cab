//! Style definitions and the style resolution engine
//!
//! Styles live in one registry per family. Style references are typed by
//! family ([`StyleId<F>`]), so a paragraph can only ever point at a paragraph
//! style and a run only at a character style. Inheritance chains are resolved
//! on demand and memoized per family; any change to a family invalidates its
//! memo table.

use crate::error::{DocModelError, Result};
use crate::paragraph::Paragraph;
use crate::properties::{ParagraphProperties, PropertyBag, RunProperties, StyleProperties};
use crate::run::Run;
use crate::table::Table;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::Arc;

// =============================================================================
// Style Families
// =============================================================================

/// The family a style belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StyleKind {
    Paragraph,
    Character,
    Table,
    Numbering,
    /// List styles are stored in `styles.xml` with type `numbering`
    List,
}

impl StyleKind {
    /// The `w:type` attribute value written for this family
    pub fn as_ooxml(&self) -> &'static str {
        match self {
            StyleKind::Paragraph => "paragraph",
            StyleKind::Character => "character",
            StyleKind::Table => "table",
            StyleKind::Numbering | StyleKind::List => "numbering",
        }
    }

    /// Parse a `w:type` attribute value. A missing type means paragraph.
    pub fn from_ooxml(value: Option<&str>) -> Option<Self> {
        match value {
            None | Some("paragraph") => Some(StyleKind::Paragraph),
            Some("character") => Some(StyleKind::Character),
            Some("table") => Some(StyleKind::Table),
            Some("numbering") => Some(StyleKind::Numbering),
            Some(_) => None,
        }
    }
}

impl fmt::Display for StyleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StyleKind::Paragraph => "paragraph",
            StyleKind::Character => "character",
            StyleKind::Table => "table",
            StyleKind::Numbering => "numbering",
            StyleKind::List => "list",
        };
        f.write_str(name)
    }
}

/// Marker types for the five style families
pub mod family {
    /// Paragraph styles
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub enum Paragraph {}
    /// Character (run) styles
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub enum Character {}
    /// Table styles
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub enum Table {}
    /// Numbering styles
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub enum Numbering {}
    /// List styles
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub enum List {}
}

/// A style family marker with access to its registry inside a [`StyleSheet`]
pub trait StyleFamily: Sized + Clone + fmt::Debug + Eq + Hash + Ord + 'static {
    const KIND: StyleKind;

    fn styles(sheet: &StyleSheet) -> &FamilyStyles<Self>;
    fn styles_mut(sheet: &mut StyleSheet) -> &mut FamilyStyles<Self>;
}

macro_rules! impl_family {
    ($marker:ident, $kind:ident, $field:ident) => {
        impl StyleFamily for family::$marker {
            const KIND: StyleKind = StyleKind::$kind;

            fn styles(sheet: &StyleSheet) -> &FamilyStyles<Self> {
                &sheet.$field
            }

            fn styles_mut(sheet: &mut StyleSheet) -> &mut FamilyStyles<Self> {
                &mut sheet.$field
            }
        }
    };
}

impl_family!(Paragraph, Paragraph, paragraph);
impl_family!(Character, Character, character);
impl_family!(Table, Table, table);
impl_family!(Numbering, Numbering, numbering);
impl_family!(List, List, list);

// =============================================================================
// Style IDs
// =============================================================================

/// Identifier of a style within one family
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StyleId<F> {
    id: String,
    family: PhantomData<F>,
}

pub type ParagraphStyleId = StyleId<family::Paragraph>;
pub type CharacterStyleId = StyleId<family::Character>;
pub type TableStyleId = StyleId<family::Table>;
pub type NumberingStyleId = StyleId<family::Numbering>;
pub type ListStyleId = StyleId<family::List>;

impl<F> StyleId<F> {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            family: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }
}

impl<F: StyleFamily> fmt::Debug for StyleId<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StyleId<{}>({:?})", F::KIND, self.id)
    }
}

impl<F> fmt::Display for StyleId<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

impl<F> From<&str> for StyleId<F> {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl<F> From<String> for StyleId<F> {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl<F> Serialize for StyleId<F> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.id)
    }
}

impl<'de, F> Deserialize<'de> for StyleId<F> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

// =============================================================================
// Style Definitions
// =============================================================================

/// A style definition within family `F`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "", deserialize = ""))]
pub struct StyleDefinition<F: StyleFamily> {
    pub id: StyleId<F>,
    /// Display name
    pub name: String,
    /// Parent style within the same family
    pub based_on: Option<StyleId<F>>,
    /// Style applied to the following paragraph
    pub next: Option<StyleId<F>>,
    pub properties: StyleProperties,
    /// Default style of its family (`w:default="1"`)
    pub is_default: bool,
    pub hidden: bool,
    pub quick_format: bool,
    pub priority: Option<u32>,
}

impl<F: StyleFamily> StyleDefinition<F> {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: StyleId::new(id),
            name: name.into(),
            based_on: None,
            next: None,
            properties: StyleProperties::default(),
            is_default: false,
            hidden: false,
            quick_format: false,
            priority: None,
        }
    }

    /// Builder: set the parent style
    pub fn with_based_on(mut self, base: impl Into<StyleId<F>>) -> Self {
        self.based_on = Some(base.into());
        self
    }

    /// Builder: set the next paragraph style
    pub fn with_next(mut self, next: impl Into<StyleId<F>>) -> Self {
        self.next = Some(next.into());
        self
    }

    /// Builder: set the properties block
    pub fn with_properties(mut self, properties: StyleProperties) -> Self {
        self.properties = properties;
        self
    }

    /// Builder: mark as family default
    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn kind(&self) -> StyleKind {
        F::KIND
    }
}

// =============================================================================
// Conflict Handling
// =============================================================================

/// What to do when a style is added under an ID the family already holds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictStrategy {
    /// Keep the existing definition and discard the incoming one
    #[default]
    KeepOriginal,
    /// Replace the existing definition with the incoming one
    PreferNewer,
    /// Keep the existing definition and fill its unset fields from the incoming one
    Merge,
    /// Ask the installed [`ConflictResolver`]
    UserChoice,
}

/// Decision returned by a [`ConflictResolver`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    KeepOriginal,
    UseIncoming,
    Merge,
}

/// A pending style conflict handed to a [`ConflictResolver`]
#[derive(Debug)]
pub struct StyleConflict<'a> {
    pub kind: StyleKind,
    pub id: &'a str,
    pub original: &'a StyleProperties,
    pub incoming: &'a StyleProperties,
    /// Fields set on both sides with different values
    pub conflicting_fields: Vec<&'static str>,
}

/// Decides style conflicts under [`ConflictStrategy::UserChoice`]
pub trait ConflictResolver: Send + Sync {
    fn resolve(&self, conflict: &StyleConflict<'_>) -> Resolution;
}

impl<T> ConflictResolver for T
where
    T: Fn(&StyleConflict<'_>) -> Resolution + Send + Sync,
{
    fn resolve(&self, conflict: &StyleConflict<'_>) -> Resolution {
        self(conflict)
    }
}

/// Result of adding a style to a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The ID was new
    Added,
    /// An existing definition won and the incoming one was dropped
    KeptOriginal,
    /// The incoming definition replaced the existing one
    Replaced,
    /// Unset fields of the existing definition were filled from the incoming one
    Merged,
}

// =============================================================================
// Per-Family Registry
// =============================================================================

/// All styles of one family, in insertion order
#[derive(Debug, Clone)]
pub struct FamilyStyles<F: StyleFamily> {
    styles: Vec<StyleDefinition<F>>,
    index: HashMap<StyleId<F>, usize>,
    /// Memoized inheritance chains, cleared on every mutation
    chains: RefCell<HashMap<StyleId<F>, Vec<StyleId<F>>>>,
}

impl<F: StyleFamily> Default for FamilyStyles<F> {
    fn default() -> Self {
        Self {
            styles: Vec::new(),
            index: HashMap::new(),
            chains: RefCell::new(HashMap::new()),
        }
    }
}

impl<F: StyleFamily> FamilyStyles<F> {
    pub fn get(&self, id: &StyleId<F>) -> Option<&StyleDefinition<F>> {
        self.index.get(id).map(|&i| &self.styles[i])
    }

    pub fn contains(&self, id: &StyleId<F>) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StyleDefinition<F>> {
        self.styles.iter()
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.is_empty()
    }

    /// The family's default style, if one is marked
    pub fn default_style(&self) -> Option<&StyleDefinition<F>> {
        self.styles.iter().find(|s| s.is_default)
    }

    fn invalidate(&self) {
        self.chains.borrow_mut().clear();
    }

    /// Would pointing `id` at `base` close a cycle?
    fn creates_cycle(&self, id: &StyleId<F>, base: Option<&StyleId<F>>) -> Option<Vec<String>> {
        let mut chain = vec![id.to_string()];
        let mut seen = HashSet::new();
        seen.insert(id.clone());
        let mut current = base.cloned();

        while let Some(next) = current {
            chain.push(next.to_string());
            if !seen.insert(next.clone()) {
                return Some(chain);
            }
            current = self.get(&next).and_then(|s| s.based_on.clone());
        }
        None
    }

    /// Add a definition, resolving an ID collision with `strategy`.
    ///
    /// A definition whose `based_on` would close an inheritance cycle is
    /// rejected with [`DocModelError::StyleCycle`].
    pub fn insert(
        &mut self,
        incoming: StyleDefinition<F>,
        strategy: ConflictStrategy,
        resolver: Option<&dyn ConflictResolver>,
    ) -> Result<InsertOutcome> {
        let Some(&slot) = self.index.get(&incoming.id) else {
            if let Some(chain) = self.creates_cycle(&incoming.id, incoming.based_on.as_ref()) {
                return Err(DocModelError::StyleCycle { chain });
            }
            self.index.insert(incoming.id.clone(), self.styles.len());
            self.styles.push(incoming);
            self.invalidate();
            return Ok(InsertOutcome::Added);
        };

        let resolution = match strategy {
            ConflictStrategy::KeepOriginal => Resolution::KeepOriginal,
            ConflictStrategy::PreferNewer => Resolution::UseIncoming,
            ConflictStrategy::Merge => Resolution::Merge,
            ConflictStrategy::UserChoice => {
                let resolver = resolver.ok_or_else(|| {
                    DocModelError::Configuration(
                        "conflict strategy UserChoice requires a conflict resolver".to_string(),
                    )
                })?;
                let original = &self.styles[slot];
                resolver.resolve(&StyleConflict {
                    kind: F::KIND,
                    id: incoming.id.as_str(),
                    original: &original.properties,
                    incoming: &incoming.properties,
                    conflicting_fields: original.properties.conflicts(&incoming.properties),
                })
            }
        };

        match resolution {
            Resolution::KeepOriginal => {
                tracing::debug!(style = %incoming.id, kind = %F::KIND, "kept original style definition");
                Ok(InsertOutcome::KeptOriginal)
            }
            Resolution::UseIncoming => {
                if let Some(chain) = self.creates_cycle(&incoming.id, incoming.based_on.as_ref()) {
                    return Err(DocModelError::StyleCycle { chain });
                }
                self.styles[slot] = incoming;
                self.invalidate();
                Ok(InsertOutcome::Replaced)
            }
            Resolution::Merge => {
                if self.styles[slot].based_on.is_none() {
                    if let Some(base) = incoming.based_on.as_ref() {
                        if self.creates_cycle(&incoming.id, Some(base)).is_none() {
                            self.styles[slot].based_on = Some(base.clone());
                        }
                    }
                }
                let existing = &mut self.styles[slot];
                if existing.next.is_none() {
                    existing.next = incoming.next;
                }
                if existing.priority.is_none() {
                    existing.priority = incoming.priority;
                }
                existing.properties.fill_unset(&incoming.properties);
                self.invalidate();
                Ok(InsertOutcome::Merged)
            }
        }
    }

    /// Change the parent of an existing style.
    pub fn set_based_on(&mut self, id: &StyleId<F>, base: Option<StyleId<F>>) -> Result<()> {
        let slot = *self.index.get(id).ok_or_else(|| DocModelError::StyleNotFound {
            kind: F::KIND.to_string(),
            id: id.to_string(),
        })?;
        if let Some(chain) = self.creates_cycle(id, base.as_ref()) {
            return Err(DocModelError::StyleCycle { chain });
        }
        self.styles[slot].based_on = base;
        self.invalidate();
        Ok(())
    }

    /// Remove a style. Styles based on it keep their reference.
    pub fn remove(&mut self, id: &StyleId<F>) -> Option<StyleDefinition<F>> {
        let slot = self.index.remove(id)?;
        let removed = self.styles.remove(slot);
        for i in self.index.values_mut() {
            if *i > slot {
                *i -= 1;
            }
        }
        self.invalidate();
        Some(removed)
    }

    /// Inheritance chain of `id`, most specific first.
    ///
    /// The chain stops at a `based_on` that names an unknown style.
    pub fn resolve(&self, id: &StyleId<F>) -> Result<Vec<StyleId<F>>> {
        if let Some(chain) = self.chains.borrow().get(id) {
            return Ok(chain.clone());
        }
        if !self.contains(id) {
            return Err(DocModelError::StyleNotFound {
                kind: F::KIND.to_string(),
                id: id.to_string(),
            });
        }

        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(id.clone());
        while let Some(next) = current {
            if !seen.insert(next.clone()) {
                let mut names: Vec<String> = chain.iter().map(ToString::to_string).collect();
                names.push(next.to_string());
                return Err(DocModelError::StyleCycle { chain: names });
            }
            let Some(style) = self.get(&next) else {
                tracing::debug!(style = %next, kind = %F::KIND, "based-on names unknown style");
                break;
            };
            current = style.based_on.clone();
            chain.push(next);
        }

        self.chains.borrow_mut().insert(id.clone(), chain.clone());
        Ok(chain)
    }

    /// Properties of `id` with every ancestor folded in, ancestor first.
    pub fn resolved_properties(&self, id: &StyleId<F>) -> Result<StyleProperties> {
        let chain = self.resolve(id)?;
        let mut props = StyleProperties::default();
        for ancestor in chain.iter().rev() {
            if let Some(style) = self.get(ancestor) {
                props.overlay(&style.properties);
            }
        }
        Ok(props)
    }

    /// Clear the `based_on` link that closes each inheritance cycle.
    ///
    /// Returns the cycles found, each as the chain of IDs that looped.
    pub fn break_cycles(&mut self) -> Vec<Vec<String>> {
        let mut broken = Vec::new();
        for slot in 0..self.styles.len() {
            let id = self.styles[slot].id.clone();
            let base = self.styles[slot].based_on.clone();
            if let Some(chain) = self.creates_cycle(&id, base.as_ref()) {
                // Only the link back into the start breaks this cycle without touching others
                if chain.last().map(String::as_str) == Some(id.as_str()) {
                    self.styles[slot].based_on = None;
                    broken.push(chain);
                }
            }
        }
        if !broken.is_empty() {
            self.invalidate();
        }
        broken
    }

    /// Insert without conflict or cycle checks. Used when loading from a file,
    /// followed by [`FamilyStyles::break_cycles`].
    pub fn insert_unchecked(&mut self, style: StyleDefinition<F>) -> bool {
        if self.contains(&style.id) {
            return false;
        }
        self.index.insert(style.id.clone(), self.styles.len());
        self.styles.push(style);
        self.invalidate();
        true
    }
}

// =============================================================================
// Styled Targets
// =============================================================================

/// Document elements that carry a style reference
pub trait Styled {
    type Family: StyleFamily;

    fn style_ref(&self) -> Option<&StyleId<Self::Family>>;
    fn set_style_ref(&mut self, id: Option<StyleId<Self::Family>>);

    /// Fill unset direct properties from resolved style properties.
    fn merge_resolved(&mut self, resolved: &StyleProperties);
}

impl Styled for Paragraph {
    type Family = family::Paragraph;

    fn style_ref(&self) -> Option<&ParagraphStyleId> {
        self.style.as_ref()
    }

    fn set_style_ref(&mut self, id: Option<ParagraphStyleId>) {
        self.style = id;
    }

    fn merge_resolved(&mut self, resolved: &StyleProperties) {
        self.properties.fill_unset(&resolved.paragraph);
    }
}

impl Styled for Run {
    type Family = family::Character;

    fn style_ref(&self) -> Option<&CharacterStyleId> {
        self.style.as_ref()
    }

    fn set_style_ref(&mut self, id: Option<CharacterStyleId>) {
        self.style = id;
    }

    fn merge_resolved(&mut self, resolved: &StyleProperties) {
        self.properties.fill_unset(&resolved.run);
    }
}

impl Styled for Table {
    type Family = family::Table;

    fn style_ref(&self) -> Option<&TableStyleId> {
        self.style.as_ref()
    }

    fn set_style_ref(&mut self, id: Option<TableStyleId>) {
        self.style = id;
    }

    fn merge_resolved(&mut self, resolved: &StyleProperties) {
        self.properties.fill_unset(&resolved.table);
    }
}

// =============================================================================
// Style Sheet
// =============================================================================

/// The document's styles: document defaults plus one registry per family
#[derive(Clone, Default)]
pub struct StyleSheet {
    /// Document defaults (`w:docDefaults`)
    pub defaults: StyleProperties,
    paragraph: FamilyStyles<family::Paragraph>,
    character: FamilyStyles<family::Character>,
    table: FamilyStyles<family::Table>,
    numbering: FamilyStyles<family::Numbering>,
    list: FamilyStyles<family::List>,
    strategy: ConflictStrategy,
    resolver: Option<Arc<dyn ConflictResolver>>,
}

impl fmt::Debug for StyleSheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StyleSheet")
            .field("defaults", &self.defaults)
            .field("paragraph", &self.paragraph.len())
            .field("character", &self.character.len())
            .field("table", &self.table.len())
            .field("numbering", &self.numbering.len())
            .field("list", &self.list.len())
            .field("strategy", &self.strategy)
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}

impl StyleSheet {
    /// An empty style sheet
    pub fn new() -> Self {
        Self::default()
    }

    /// A style sheet holding the built-in styles of a new document
    pub fn with_builtins() -> Self {
        let mut sheet = Self::new();
        sheet.defaults = StyleProperties {
            run: RunProperties {
                font_name: Some("Calibri".into()),
                font_size: Some(11.0),
                ..Default::default()
            },
            ..Default::default()
        };

        let mut normal = StyleDefinition::new("Normal", "Normal").as_default();
        normal.quick_format = true;
        sheet.paragraph.insert_unchecked(normal);

        for level in 1..=3u8 {
            let size = match level {
                1 => 16.0,
                2 => 13.0,
                _ => 12.0,
            };
            let mut heading = StyleDefinition::new(format!("Heading{level}"), format!("heading {level}"))
                .with_based_on("Normal")
                .with_next("Normal")
                .with_properties(StyleProperties {
                    run: RunProperties {
                        bold: Some(true),
                        font_size: Some(size),
                        ..Default::default()
                    },
                    paragraph: ParagraphProperties {
                        keep_next: Some(true),
                        space_before: Some(12.0),
                        outline_level: Some(level - 1),
                        ..Default::default()
                    },
                    ..Default::default()
                });
            heading.quick_format = true;
            sheet.paragraph.insert_unchecked(heading);
        }

        let mut title = StyleDefinition::new("Title", "Title")
            .with_based_on("Normal")
            .with_next("Normal")
            .with_properties(StyleProperties {
                run: RunProperties {
                    font_size: Some(28.0),
                    ..Default::default()
                },
                ..Default::default()
            });
        title.quick_format = true;
        sheet.paragraph.insert_unchecked(title);

        sheet.paragraph.insert_unchecked(
            StyleDefinition::new("CommentText", "annotation text")
                .with_based_on("Normal")
                .with_properties(StyleProperties {
                    run: RunProperties {
                        font_size: Some(10.0),
                        ..Default::default()
                    },
                    ..Default::default()
                }),
        );

        sheet
            .character
            .insert_unchecked(StyleDefinition::new("DefaultParagraphFont", "Default Paragraph Font").as_default());
        sheet.character.insert_unchecked(
            StyleDefinition::new("CommentReference", "annotation reference")
                .with_based_on("DefaultParagraphFont")
                .with_properties(StyleProperties {
                    run: RunProperties {
                        font_size: Some(8.0),
                        ..Default::default()
                    },
                    ..Default::default()
                }),
        );

        sheet
            .table
            .insert_unchecked(StyleDefinition::new("TableNormal", "Normal Table").as_default());
        sheet.table.insert_unchecked(
            StyleDefinition::new("TableGrid", "Table Grid").with_based_on("TableNormal"),
        );

        sheet
            .numbering
            .insert_unchecked(StyleDefinition::new("NoList", "No List").as_default());

        sheet
    }

    /// Registry of family `F`
    pub fn family<F: StyleFamily>(&self) -> &FamilyStyles<F> {
        F::styles(self)
    }

    /// Mutable registry of family `F`
    pub fn family_mut<F: StyleFamily>(&mut self) -> &mut FamilyStyles<F> {
        F::styles_mut(self)
    }

    pub fn get<F: StyleFamily>(&self, id: &StyleId<F>) -> Option<&StyleDefinition<F>> {
        self.family::<F>().get(id)
    }

    pub fn contains<F: StyleFamily>(&self, id: &StyleId<F>) -> bool {
        self.family::<F>().contains(id)
    }

    /// Total number of styles across all families
    pub fn len(&self) -> usize {
        self.paragraph.len() + self.character.len() + self.table.len() + self.numbering.len() + self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn conflict_strategy(&self) -> ConflictStrategy {
        self.strategy
    }

    pub fn set_conflict_strategy(&mut self, strategy: ConflictStrategy) {
        self.strategy = strategy;
    }

    /// Install the callback consulted under [`ConflictStrategy::UserChoice`]
    pub fn set_conflict_resolver(&mut self, resolver: impl ConflictResolver + 'static) {
        self.resolver = Some(Arc::new(resolver));
    }

    pub fn clear_conflict_resolver(&mut self) {
        self.resolver = None;
    }

    /// Add a style using the sheet's conflict strategy
    pub fn insert<F: StyleFamily>(&mut self, style: StyleDefinition<F>) -> Result<InsertOutcome> {
        let strategy = self.strategy;
        let resolver = self.resolver.clone();
        let outcome = F::styles_mut(self).insert(style, strategy, resolver.as_deref())?;
        Ok(outcome)
    }

    /// Add a style whose ID must be new to its family
    pub fn insert_unique<F: StyleFamily>(&mut self, style: StyleDefinition<F>) -> Result<()> {
        if self.contains(&style.id) {
            return Err(DocModelError::DuplicateStyle {
                kind: F::KIND.to_string(),
                id: style.id.to_string(),
            });
        }
        self.insert(style).map(|_| ())
    }

    /// Add several styles of one family, stopping at the first error
    pub fn import<F: StyleFamily>(
        &mut self,
        styles: impl IntoIterator<Item = StyleDefinition<F>>,
    ) -> Result<Vec<InsertOutcome>> {
        styles.into_iter().map(|s| self.insert(s)).collect()
    }

    /// Inheritance chain of a style, most specific first
    pub fn resolve<F: StyleFamily>(&self, id: &StyleId<F>) -> Result<Vec<StyleId<F>>> {
        self.family::<F>().resolve(id)
    }

    /// Properties of a style with its ancestors folded in
    pub fn resolved_properties<F: StyleFamily>(&self, id: &StyleId<F>) -> Result<StyleProperties> {
        self.family::<F>().resolved_properties(id)
    }

    /// Attach style `id` to `target` and fill its unset direct properties
    /// from the style's resolved properties.
    pub fn apply_style<T: Styled>(&self, target: &mut T, id: &StyleId<T::Family>) -> Result<()> {
        let resolved = self.resolved_properties(id)?;
        target.set_style_ref(Some(id.clone()));
        target.merge_resolved(&resolved);
        Ok(())
    }

    /// The formatting a run renders with: document defaults, then the
    /// paragraph style chain, then the character style chain, then direct
    /// formatting. Style references that do not resolve are skipped.
    pub fn effective_run_properties(&self, paragraph: &Paragraph, run: &Run) -> RunProperties {
        let mut props = self.defaults.run.clone();
        if let Some(id) = &paragraph.style {
            match self.resolved_properties(id) {
                Ok(resolved) => props.overlay(&resolved.run),
                Err(e) => tracing::debug!(error = %e, "paragraph style ignored"),
            }
        }
        if let Some(id) = &run.style {
            match self.resolved_properties(id) {
                Ok(resolved) => props.overlay(&resolved.run),
                Err(e) => tracing::debug!(error = %e, "character style ignored"),
            }
        }
        props.overlay(&run.properties);
        props
    }

    /// Break inheritance cycles in every family.
    ///
    /// Returns `(family, chain)` for each cycle broken.
    pub fn break_cycles(&mut self) -> Vec<(StyleKind, Vec<String>)> {
        let mut broken = Vec::new();
        broken.extend(self.paragraph.break_cycles().into_iter().map(|c| (StyleKind::Paragraph, c)));
        broken.extend(self.character.break_cycles().into_iter().map(|c| (StyleKind::Character, c)));
        broken.extend(self.table.break_cycles().into_iter().map(|c| (StyleKind::Table, c)));
        broken.extend(self.numbering.break_cycles().into_iter().map(|c| (StyleKind::Numbering, c)));
        broken.extend(self.list.break_cycles().into_iter().map(|c| (StyleKind::List, c)));
        broken
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn bold() -> StyleProperties {
        StyleProperties {
            run: RunProperties {
                bold: Some(true),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_chain_most_specific_first() {
        let mut sheet = StyleSheet::new();
        sheet.insert(StyleDefinition::<family::Paragraph>::new("Normal", "Normal")).unwrap();
        sheet
            .insert(StyleDefinition::<family::Paragraph>::new("Heading1", "heading 1").with_based_on("Normal"))
            .unwrap();
        sheet
            .insert(StyleDefinition::<family::Paragraph>::new("Custom", "Custom").with_based_on("Heading1"))
            .unwrap();

        let chain = sheet.resolve(&ParagraphStyleId::new("Custom")).unwrap();
        let names: Vec<&str> = chain.iter().map(|s| s.as_str()).collect();
        assert_eq!(names, vec!["Custom", "Heading1", "Normal"]);
    }

    #[test]
    fn test_resolve_unknown_style() {
        let sheet = StyleSheet::new();
        let err = sheet.resolve(&ParagraphStyleId::new("Missing")).unwrap_err();
        assert!(matches!(err, DocModelError::StyleNotFound { .. }));
    }

    #[test]
    fn test_insert_rejects_cycle() {
        let mut sheet = StyleSheet::new();
        sheet
            .insert(StyleDefinition::<family::Paragraph>::new("A", "A").with_based_on("B"))
            .unwrap();
        let err = sheet
            .insert(StyleDefinition::<family::Paragraph>::new("B", "B").with_based_on("A"))
            .unwrap_err();
        assert!(matches!(err, DocModelError::StyleCycle { .. }));
        assert!(!sheet.contains(&ParagraphStyleId::new("B")));
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let mut sheet = StyleSheet::new();
        let err = sheet
            .insert(StyleDefinition::<family::Character>::new("Loop", "Loop").with_based_on("Loop"))
            .unwrap_err();
        assert!(matches!(err, DocModelError::StyleCycle { .. }));
    }

    #[test]
    fn test_break_cycles_after_unchecked_load() {
        let mut sheet = StyleSheet::new();
        let registry = sheet.family_mut::<family::Paragraph>();
        registry.insert_unchecked(StyleDefinition::new("A", "A").with_based_on("B"));
        registry.insert_unchecked(StyleDefinition::new("B", "B").with_based_on("A"));

        assert!(sheet.resolve(&ParagraphStyleId::new("A")).is_err());

        let broken = sheet.break_cycles();
        assert_eq!(broken.len(), 1);
        assert!(sheet.resolve(&ParagraphStyleId::new("A")).is_ok());
        assert!(sheet.resolve(&ParagraphStyleId::new("B")).is_ok());
    }

    #[test]
    fn test_resolved_properties_ancestor_first() {
        let mut sheet = StyleSheet::new();
        sheet
            .insert(StyleDefinition::<family::Paragraph>::new("Base", "Base").with_properties(StyleProperties {
                run: RunProperties {
                    bold: Some(true),
                    font_size: Some(12.0),
                    ..Default::default()
                },
                ..Default::default()
            }))
            .unwrap();
        sheet
            .insert(
                StyleDefinition::<family::Paragraph>::new("Child", "Child")
                    .with_based_on("Base")
                    .with_properties(StyleProperties {
                        run: RunProperties {
                            font_size: Some(20.0),
                            ..Default::default()
                        },
                        ..Default::default()
                    }),
            )
            .unwrap();

        let props = sheet.resolved_properties(&ParagraphStyleId::new("Child")).unwrap();
        assert_eq!(props.run.bold, Some(true));
        assert_eq!(props.run.font_size, Some(20.0));
    }

    #[test]
    fn test_cache_invalidated_on_change() {
        let mut sheet = StyleSheet::new();
        sheet.insert(StyleDefinition::<family::Paragraph>::new("A", "A")).unwrap();
        sheet.insert(StyleDefinition::<family::Paragraph>::new("B", "B")).unwrap();
        let id = ParagraphStyleId::new("B");
        assert_eq!(sheet.resolve(&id).unwrap().len(), 1);

        sheet
            .family_mut::<family::Paragraph>()
            .set_based_on(&id, Some("A".into()))
            .unwrap();
        assert_eq!(sheet.resolve(&id).unwrap().len(), 2);
    }

    #[test]
    fn test_keep_original_is_default() {
        let mut sheet = StyleSheet::new();
        sheet.insert(StyleDefinition::<family::Paragraph>::new("S", "Original")).unwrap();
        let outcome = sheet
            .insert(StyleDefinition::<family::Paragraph>::new("S", "Incoming").with_properties(bold()))
            .unwrap();

        assert_eq!(outcome, InsertOutcome::KeptOriginal);
        let style = sheet.get(&ParagraphStyleId::new("S")).unwrap();
        assert_eq!(style.name, "Original");
        assert!(style.properties.is_empty());
    }

    #[test]
    fn test_prefer_newer_replaces() {
        let mut sheet = StyleSheet::new();
        sheet.set_conflict_strategy(ConflictStrategy::PreferNewer);
        sheet.insert(StyleDefinition::<family::Paragraph>::new("S", "Original")).unwrap();
        let outcome = sheet
            .insert(StyleDefinition::<family::Paragraph>::new("S", "Incoming"))
            .unwrap();

        assert_eq!(outcome, InsertOutcome::Replaced);
        assert_eq!(sheet.get(&ParagraphStyleId::new("S")).unwrap().name, "Incoming");
    }

    #[test]
    fn test_merge_fills_unset_fields_only() {
        let mut sheet = StyleSheet::new();
        sheet.set_conflict_strategy(ConflictStrategy::Merge);
        sheet
            .insert(StyleDefinition::<family::Paragraph>::new("S", "S").with_properties(StyleProperties {
                run: RunProperties {
                    bold: Some(false),
                    ..Default::default()
                },
                ..Default::default()
            }))
            .unwrap();
        sheet
            .insert(StyleDefinition::<family::Paragraph>::new("S", "S").with_properties(StyleProperties {
                run: RunProperties {
                    bold: Some(true),
                    italic: Some(true),
                    ..Default::default()
                },
                paragraph: ParagraphProperties {
                    space_after: Some(6.0),
                    ..Default::default()
                },
                ..Default::default()
            }))
            .unwrap();

        let props = &sheet.get(&ParagraphStyleId::new("S")).unwrap().properties;
        assert_eq!(props.run.bold, Some(false));
        assert_eq!(props.run.italic, Some(true));
        assert_eq!(props.paragraph.space_after, Some(6.0));
    }

    #[test]
    fn test_user_choice_without_resolver_is_configuration_error() {
        let mut sheet = StyleSheet::new();
        sheet.set_conflict_strategy(ConflictStrategy::UserChoice);
        sheet.insert(StyleDefinition::<family::Paragraph>::new("S", "S")).unwrap();

        let err = sheet
            .insert(StyleDefinition::<family::Paragraph>::new("S", "S"))
            .unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_user_choice_consults_resolver() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        let mut sheet = StyleSheet::new();
        sheet.set_conflict_strategy(ConflictStrategy::UserChoice);
        sheet.set_conflict_resolver(|conflict: &StyleConflict<'_>| {
            CALLS.fetch_add(1, Ordering::SeqCst);
            assert_eq!(conflict.conflicting_fields, vec!["bold"]);
            Resolution::UseIncoming
        });
        sheet
            .insert(StyleDefinition::<family::Character>::new("Strong", "Strong").with_properties(StyleProperties {
                run: RunProperties {
                    bold: Some(false),
                    ..Default::default()
                },
                ..Default::default()
            }))
            .unwrap();
        let outcome = sheet
            .insert(StyleDefinition::<family::Character>::new("Strong", "Strong").with_properties(bold()))
            .unwrap();

        assert_eq!(outcome, InsertOutcome::Replaced);
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
        let style = sheet.get(&CharacterStyleId::new("Strong")).unwrap();
        assert_eq!(style.properties.run.bold, Some(true));
    }

    #[test]
    fn test_apply_style_fills_direct_properties() {
        let mut sheet = StyleSheet::new();
        sheet
            .insert(StyleDefinition::<family::Character>::new("Emphasis", "Emphasis").with_properties(StyleProperties {
                run: RunProperties {
                    italic: Some(true),
                    bold: Some(true),
                    ..Default::default()
                },
                ..Default::default()
            }))
            .unwrap();

        let mut run = Run::new("hello");
        run.properties.bold = Some(false);
        sheet.apply_style(&mut run, &CharacterStyleId::new("Emphasis")).unwrap();

        assert_eq!(run.style.as_ref().map(|s| s.as_str()), Some("Emphasis"));
        assert_eq!(run.properties.italic, Some(true));
        assert_eq!(run.properties.bold, Some(false));
    }

    #[test]
    fn test_apply_unknown_style_leaves_target_untouched() {
        let sheet = StyleSheet::new();
        let mut para = Paragraph::new();
        assert!(sheet.apply_style(&mut para, &ParagraphStyleId::new("Nope")).is_err());
        assert!(para.style.is_none());
    }

    #[test]
    fn test_effective_run_properties_layering() {
        let sheet = StyleSheet::with_builtins();
        let mut para = Paragraph::with_text("Title");
        para.style = Some(ParagraphStyleId::new("Heading1"));
        let mut run = Run::new("Title");
        run.properties.font_size = Some(30.0);

        let props = sheet.effective_run_properties(&para, &run);
        assert_eq!(props.bold, Some(true));
        assert_eq!(props.font_size, Some(30.0));
        assert_eq!(props.font_name.as_deref(), Some("Calibri"));
    }

    #[test]
    fn test_builtins_resolve() {
        let sheet = StyleSheet::with_builtins();
        assert!(sheet.resolve(&ParagraphStyleId::new("Heading2")).is_ok());
        assert!(sheet.resolve(&CharacterStyleId::new("CommentReference")).is_ok());
        assert!(sheet.resolve(&TableStyleId::new("TableGrid")).is_ok());
        assert_eq!(
            sheet.family::<family::Paragraph>().default_style().map(|s| s.id.as_str()),
            Some("Normal")
        );
    }

    #[test]
    fn test_list_family_serializes_as_numbering() {
        assert_eq!(StyleKind::List.as_ooxml(), "numbering");
        assert_eq!(StyleKind::from_ooxml(None), Some(StyleKind::Paragraph));
        assert_eq!(StyleKind::from_ooxml(Some("weird")), None);
    }

    #[test]
    fn test_insert_unique_rejects_duplicate() {
        let mut sheet = StyleSheet::with_builtins();
        let err = sheet
            .insert_unique(StyleDefinition::<family::Paragraph>::new("Normal", "Normal"))
            .unwrap_err();
        assert!(matches!(err, DocModelError::DuplicateStyle { .. }));
        // same ID in another family is fine
        sheet
            .insert_unique(StyleDefinition::<family::Character>::new("Normal", "Normal"))
            .unwrap();
    }

    #[test]
    fn test_remove_reindexes() {
        let mut sheet = StyleSheet::new();
        sheet.insert(StyleDefinition::<family::Table>::new("A", "A")).unwrap();
        sheet.insert(StyleDefinition::<family::Table>::new("B", "B")).unwrap();
        sheet.family_mut::<family::Table>().remove(&TableStyleId::new("A"));

        assert_eq!(sheet.get(&TableStyleId::new("B")).unwrap().name, "B");
        assert_eq!(sheet.len(), 1);
    }

    #[test]
    fn test_conflict_strategy_json_names() {
        let json = serde_json::to_string(&ConflictStrategy::PreferNewer).unwrap();
        assert_eq!(json, "\"prefer_newer\"");
        let parsed: ConflictStrategy = serde_json::from_str("\"user_choice\"").unwrap();
        assert_eq!(parsed, ConflictStrategy::UserChoice);
    }

    proptest::proptest! {
        #[test]
        fn prop_insert_never_admits_a_cycle(links in proptest::collection::vec((0usize..6, proptest::option::of(0usize..6)), 1..24)) {
            let mut sheet = StyleSheet::new();
            for (id, base) in links {
                let mut style = StyleDefinition::<family::Paragraph>::new(format!("P{id}"), format!("P{id}"));
                if let Some(base) = base {
                    style = style.with_based_on(format!("P{base}"));
                }
                match sheet.insert(style) {
                    Ok(_) => {}
                    Err(e) => proptest::prop_assert!(matches!(e, DocModelError::StyleCycle { .. }), "unexpected error: {:?}", e),
                }
            }
            for style in sheet.family::<family::Paragraph>().iter() {
                let chain = sheet.resolve(&style.id).unwrap();
                proptest::prop_assert!(chain.len() <= 6);
                proptest::prop_assert_eq!(&chain[0], &style.id);
            }
        }
    }
}
