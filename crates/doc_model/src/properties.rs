//! Formatting property bags
//!
//! Direct formatting on runs, paragraphs and tables and the property blocks
//! of style definitions share the same shape: every field is optional and
//! `None` means "not set here". All bags implement [`PropertyBag`], which
//! gives style inheritance and style conflict merging one uniform set of
//! combinators instead of per-field code.

use crate::error::{DocModelError, Result};
use serde::{Deserialize, Serialize};

/// Uniform combinators over a bag of optional properties
pub trait PropertyBag: Clone + Default {
    /// Fill every unset field from `other`. Fields already set are never touched.
    fn fill_unset(&mut self, other: &Self);

    /// Overwrite with every field that is set in `other`.
    fn overlay(&mut self, other: &Self);

    /// True when no field is set
    fn is_empty(&self) -> bool;

    /// Names of the fields set on both sides with different values
    fn conflicts(&self, other: &Self) -> Vec<&'static str>;
}

macro_rules! property_bag {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $(
                $(#[$fmeta:meta])*
                pub $field:ident : $ty:ty,
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            $(
                $(#[$fmeta])*
                #[serde(default, skip_serializing_if = "Option::is_none")]
                pub $field: Option<$ty>,
            )*
        }

        impl PropertyBag for $name {
            fn fill_unset(&mut self, other: &Self) {
                $(
                    if self.$field.is_none() {
                        self.$field = other.$field.clone();
                    }
                )*
            }

            fn overlay(&mut self, other: &Self) {
                $(
                    if other.$field.is_some() {
                        self.$field = other.$field.clone();
                    }
                )*
            }

            fn is_empty(&self) -> bool {
                true $( && self.$field.is_none() )*
            }

            fn conflicts(&self, other: &Self) -> Vec<&'static str> {
                let mut names = Vec::new();
                $(
                    if let (Some(ours), Some(theirs)) = (&self.$field, &other.$field) {
                        if ours != theirs {
                            names.push(stringify!($field));
                        }
                    }
                )*
                names
            }
        }
    };
}

// =============================================================================
// Alignment
// =============================================================================

/// Horizontal alignment for paragraphs and tables
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

impl Alignment {
    /// Parse a `w:jc` value. Unknown values fall back to `Left`.
    pub fn from_ooxml(value: &str) -> Self {
        match value {
            "center" => Alignment::Center,
            "right" | "end" => Alignment::Right,
            "both" | "distribute" | "justify" => Alignment::Justify,
            _ => Alignment::Left,
        }
    }

    /// The `w:jc` value for this alignment
    pub fn as_ooxml(&self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
            Alignment::Justify => "both",
        }
    }
}

// =============================================================================
// Property Bags
// =============================================================================

property_bag! {
    /// Character formatting carried by a run or a style's `w:rPr`
    pub struct RunProperties {
        /// Bold (`w:b`)
        pub bold: bool,
        /// Italic (`w:i`)
        pub italic: bool,
        /// Underline (`w:u`), any underline style reads as `true`
        pub underline: bool,
        /// Font family (`w:rFonts/@w:ascii`)
        pub font_name: String,
        /// Font size in points (`w:sz` holds half-points)
        pub font_size: f32,
        /// Text color as hex RGB without `#`, or `auto`
        pub color: String,
    }
}

property_bag! {
    /// Paragraph formatting carried by a paragraph or a style's `w:pPr`
    pub struct ParagraphProperties {
        /// Alignment (`w:jc`)
        pub alignment: Alignment,
        /// Space before in points
        pub space_before: f32,
        /// Space after in points
        pub space_after: f32,
        /// Left indent in points
        pub indent_left: f32,
        /// Right indent in points
        pub indent_right: f32,
        /// First line indent in points, negative for a hanging indent
        pub indent_first_line: f32,
        /// Keep with next paragraph
        pub keep_next: bool,
        /// Keep lines together
        pub keep_lines: bool,
        /// Page break before
        pub page_break_before: bool,
        /// Outline level, 0-based as stored in `w:outlineLvl`
        pub outline_level: u8,
    }
}

property_bag! {
    /// Table formatting carried by a table or a style's `w:tblPr`
    pub struct TableProperties {
        /// Table alignment (`w:jc`)
        pub alignment: Alignment,
        /// Preferred width in twips (`w:tblW` with `w:type="dxa"`)
        pub width: u32,
        /// Fixed layout (`w:tblLayout w:type="fixed"`)
        pub fixed_layout: bool,
    }
}

/// The combined property block of a style definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleProperties {
    #[serde(default)]
    pub run: RunProperties,
    #[serde(default)]
    pub paragraph: ParagraphProperties,
    #[serde(default)]
    pub table: TableProperties,
}

impl PropertyBag for StyleProperties {
    fn fill_unset(&mut self, other: &Self) {
        self.run.fill_unset(&other.run);
        self.paragraph.fill_unset(&other.paragraph);
        self.table.fill_unset(&other.table);
    }

    fn overlay(&mut self, other: &Self) {
        self.run.overlay(&other.run);
        self.paragraph.overlay(&other.paragraph);
        self.table.overlay(&other.table);
    }

    fn is_empty(&self) -> bool {
        self.run.is_empty() && self.paragraph.is_empty() && self.table.is_empty()
    }

    fn conflicts(&self, other: &Self) -> Vec<&'static str> {
        let mut names = self.run.conflicts(&other.run);
        names.extend(self.paragraph.conflicts(&other.paragraph));
        names.extend(self.table.conflicts(&other.table));
        names
    }
}

/// Font sizes `w:sz` can hold, in points
pub const FONT_SIZE_RANGE: std::ops::RangeInclusive<f32> = 0.5..=1638.0;

impl RunProperties {
    /// Check that every set field is storable without loss. Font sizes must
    /// be whole half-points inside [`FONT_SIZE_RANGE`].
    pub fn validate(&self) -> Result<()> {
        if let Some(size) = self.font_size {
            if !size.is_finite() || !FONT_SIZE_RANGE.contains(&size) {
                return Err(DocModelError::Configuration(format!(
                    "font size {size} is outside {}..={} points",
                    FONT_SIZE_RANGE.start(),
                    FONT_SIZE_RANGE.end()
                )));
            }
            if (size * 2.0).fract() != 0.0 {
                return Err(DocModelError::Configuration(format!(
                    "font size {size} is not a whole number of half-points"
                )));
            }
        }
        Ok(())
    }
}
