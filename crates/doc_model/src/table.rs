//! Tables - rectangular grids of text cells

use crate::properties::TableProperties;
use crate::style::TableStyleId;
use serde::{Deserialize, Serialize};

/// A table
///
/// Every row holds exactly `columns` cells. Cells are plain text; line breaks
/// between cell paragraphs are stored as `\n`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    rows: Vec<Vec<String>>,
    columns: usize,
    /// Table style reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<TableStyleId>,
    /// Direct table formatting
    #[serde(default)]
    pub properties: TableProperties,
}

impl Table {
    /// Build a table from rows. The column count is the width of the first
    /// row; other rows are padded with empty cells or truncated to match.
    pub fn from_rows(rows: Vec<Vec<String>>) -> Self {
        let columns = rows.first().map(Vec::len).unwrap_or(0);
        Self::with_columns(rows, columns)
    }

    /// Build a table with an explicit column count, padding or truncating rows.
    pub fn with_columns(rows: Vec<Vec<String>>, columns: usize) -> Self {
        let mut table = Self {
            rows,
            columns,
            style: None,
            properties: TableProperties::default(),
        };
        table.normalize();
        table
    }

    /// Builder: set the table style
    pub fn styled(mut self, style: impl Into<TableStyleId>) -> Self {
        self.style = Some(style.into());
        self
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&str> {
        self.rows.get(row)?.get(column).map(String::as_str)
    }

    /// Set one cell's text. Returns false when out of range.
    pub fn set_cell(&mut self, row: usize, column: usize, text: impl Into<String>) -> bool {
        match self.rows.get_mut(row).and_then(|r| r.get_mut(column)) {
            Some(cell) => {
                *cell = text.into();
                true
            }
            None => false,
        }
    }

    /// Append a row, padded or truncated to the column count
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.columns, String::new());
        self.rows.push(row);
    }

    /// Replace `from` with `to` in every cell. Returns the number of replacements.
    pub fn replace_text(&mut self, from: &str, to: &str) -> usize {
        if from.is_empty() {
            return 0;
        }
        let mut count = 0;
        for cell in self.rows.iter_mut().flatten() {
            let n = cell.matches(from).count();
            if n > 0 {
                *cell = cell.replace(from, to);
                count += n;
            }
        }
        count
    }

    /// True when every row has exactly `columns` cells
    pub fn is_rectangular(&self) -> bool {
        self.rows.iter().all(|r| r.len() == self.columns)
    }

    /// Pad short rows and truncate long rows to the column count.
    /// Returns the number of rows that changed.
    pub fn normalize(&mut self) -> usize {
        let mut changed = 0;
        for row in &mut self.rows {
            if row.len() != self.columns {
                row.resize(self.columns, String::new());
                changed += 1;
            }
        }
        changed
    }
}
