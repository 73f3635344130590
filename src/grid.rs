//! In-memory spreadsheet grid with 1-based row/column addressing.
//!
//! Templates arrive from calamine or csv as ragged rows of text. The grid
//! keeps them as strings (an empty string is an empty cell) and grows on
//! write, so the writer can append a record row past the current end.

/// Rows × columns of cell text, addressed from `(1, 1)` like a worksheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpreadsheetGrid {
    rows: Vec<Vec<String>>,
    /// Worksheet the grid was loaded from, when it came from a workbook.
    sheet: Option<String>,
}

impl SpreadsheetGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a grid from row-major cell text; row 0 of `rows` is worksheet row 1.
    pub fn from_rows<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
            sheet: None,
        }
    }

    /// Record the worksheet name the grid belongs to.
    pub fn with_sheet_name(mut self, name: impl Into<String>) -> Self {
        self.sheet = Some(name.into());
        self
    }

    pub fn sheet_name(&self) -> Option<&str> {
        self.sheet.as_deref()
    }

    /// Cell text at `(row, column)`; empty when out of range.
    pub fn cell(&self, row: usize, column: usize) -> &str {
        if row == 0 || column == 0 {
            return "";
        }
        self.rows
            .get(row - 1)
            .and_then(|r| r.get(column - 1))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Set the cell text at `(row, column)`, growing the grid as needed.
    ///
    /// # Panics
    /// When `row` or `column` is 0.
    pub fn set_cell(&mut self, row: usize, column: usize, value: impl Into<String>) {
        assert!(row >= 1 && column >= 1, "grid addresses are 1-based");
        if self.rows.len() < row {
            self.rows.resize_with(row, Vec::new);
        }
        let cells = &mut self.rows[row - 1];
        if cells.len() < column {
            cells.resize(column, String::new());
        }
        cells[column - 1] = value.into();
    }

    /// Number of rows, counting blank trailing rows that were loaded or written.
    pub fn max_row(&self) -> usize {
        self.rows.len()
    }

    /// Width of the widest row.
    pub fn max_column(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Last row holding at least one non-blank cell, or 0 when there is none.
    pub fn last_populated_row(&self) -> usize {
        self.rows
            .iter()
            .rposition(|r| r.iter().any(|c| !is_blank(c)))
            .map_or(0, |i| i + 1)
    }

    /// Row-major view of the cells.
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }
}

/// Empty, or the single-space placeholder templates use for "no value".
pub fn is_blank(cell: &str) -> bool {
    cell.is_empty() || cell == " "
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_based_addressing() {
        let grid = SpreadsheetGrid::from_rows([vec!["a", "b"], vec!["c"]]);
        assert_eq!(grid.cell(1, 1), "a");
        assert_eq!(grid.cell(1, 2), "b");
        assert_eq!(grid.cell(2, 1), "c");
        assert_eq!(grid.cell(2, 2), "");
        assert_eq!(grid.cell(0, 1), "");
        assert_eq!(grid.cell(9, 9), "");
        assert_eq!(grid.max_row(), 2);
        assert_eq!(grid.max_column(), 2);
    }

    #[test]
    fn set_cell_grows() {
        let mut grid = SpreadsheetGrid::new();
        grid.set_cell(4, 3, "WI");
        assert_eq!(grid.max_row(), 4);
        assert_eq!(grid.max_column(), 3);
        assert_eq!(grid.cell(4, 3), "WI");
        assert_eq!(grid.cell(4, 1), "");
    }

    #[test]
    fn last_populated_row_ignores_placeholders() {
        let grid = SpreadsheetGrid::from_rows([
            vec!["", "SUBJECT"],
            vec!["x", "State"],
            vec![" ", ""],
            vec!["", ""],
        ]);
        assert_eq!(grid.max_row(), 4);
        assert_eq!(grid.last_populated_row(), 2);
        assert_eq!(SpreadsheetGrid::new().last_populated_row(), 0);
    }

    #[test]
    fn blank_cells() {
        assert!(is_blank(""));
        assert!(is_blank(" "));
        assert!(!is_blank("  "));
        assert!(!is_blank("0"));
    }
}
