//! Writer: one new record row per run, never overwriting existing data.

use super::columns::ColumnIdentity;
use super::flatten::FlatIndex;
use super::resolve::pick_value;
use crate::config::HeaderLayout;
use crate::grid::{is_blank, SpreadsheetGrid};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

/// `(section, field)` → the first column that carries it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    targets: Vec<(String, String, usize)>,
}

impl ColumnMap {
    /// Build from detected identities in column order. A column is a write
    /// target only when both its section and its field are known; repeated
    /// pairs keep their first column.
    pub fn from_identities(identities: &[ColumnIdentity]) -> Self {
        let mut seen: HashMap<(&str, &str), usize> = HashMap::new();
        let mut targets = Vec::new();
        for id in identities {
            if id.section.is_empty() || id.field.is_empty() {
                continue;
            }
            if let Some(first) = seen.get(&(id.section.as_str(), id.field.as_str())) {
                debug!(
                    "column {} duplicates '{}.{}' from column {}; not a write target",
                    id.column, id.section, id.field, first
                );
                continue;
            }
            seen.insert((id.section.as_str(), id.field.as_str()), id.column);
            targets.push((id.section.clone(), id.field.clone(), id.column));
        }
        Self { targets }
    }

    /// Column mapped to `(section, field)`.
    pub fn column(&self, section: &str, field: &str) -> Option<usize> {
        self.targets
            .iter()
            .find(|(s, f, _)| s == section && f == field)
            .map(|(_, _, c)| *c)
    }

    /// `(section, field, column)` in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, usize)> {
        self.targets.iter().map(|(s, f, c)| (s.as_str(), f.as_str(), *c))
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Outcome of filling one row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FillReport {
    /// 1-based row that was filled.
    pub row: usize,
    /// Cells written.
    pub filled: usize,
    /// Mapped cells skipped because they already held a value.
    pub occupied: usize,
    /// Mapped cells with no value in the document.
    pub missing: usize,
    /// Write targets in the template.
    pub mapped_columns: usize,
}

/// Row a new record goes to: right after the last populated row, never
/// above `first_data_row`.
pub fn next_row(grid: &SpreadsheetGrid, layout: &HeaderLayout) -> usize {
    (grid.last_populated_row() + 1).max(layout.first_data_row)
}

/// Resolve and write every mapped column into `row`, leaving occupied cells alone.
///
/// A resolved value that is only whitespace (the `" "` the prompts ask for
/// when a field is unreadable) counts as missing and is not written.
pub fn fill_row_at(
    grid: &mut SpreadsheetGrid,
    columns: &ColumnMap,
    flat: &FlatIndex,
    row: usize,
) -> FillReport {
    let mut report = FillReport {
        row,
        mapped_columns: columns.len(),
        ..FillReport::default()
    };

    for (section, field, column) in columns.iter() {
        let existing = grid.cell(row, column);
        if !is_blank(existing) {
            debug!("row {row} column {column}: occupied ('{existing}'), skipped");
            report.occupied += 1;
            continue;
        }
        let value = pick_value(section, field, flat);
        if value.trim().is_empty() {
            report.missing += 1;
            continue;
        }
        debug!("row {row} column {column}: {section}.{field} = '{value}'");
        grid.set_cell(row, column, value);
        report.filled += 1;
    }

    if report.filled == 0 && report.occupied == 0 {
        warn!("No template column found a value in the document");
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ExtractionDocument;
    use crate::reconcile::columns::detect_sections;
    use crate::reconcile::flatten::flatten;

    fn template() -> SpreadsheetGrid {
        SpreadsheetGrid::from_rows([
            vec!["Appraisal log", "", "", "", ""],
            vec!["", "", "SUBJECT", "Comparable Sale #1", ""],
            vec!["File #", "Pool", "State", "GLA", "GLA"],
        ])
    }

    fn flat_of(json: &str) -> FlatIndex {
        flatten(&ExtractionDocument::from_json_str(json).unwrap())
    }

    fn map_of(grid: &SpreadsheetGrid) -> ColumnMap {
        ColumnMap::from_identities(&detect_sections(grid, &HeaderLayout::default()))
    }

    #[test]
    fn first_duplicate_column_wins() {
        let map = map_of(&template());
        assert_eq!(map.column("COMPARABLE SALE #1", "GLA"), Some(4));
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn unlabeled_fields_are_not_targets() {
        let ids = vec![
            ColumnIdentity { column: 1, section: "SUBJECT".into(), field: String::new() },
            ColumnIdentity { column: 2, section: "SUBJECT".into(), field: "STATE".into() },
        ];
        let map = ColumnMap::from_identities(&ids);
        assert_eq!(map.len(), 1);
        assert_eq!(map.column("SUBJECT", "STATE"), Some(2));
    }

    #[test]
    fn columns_without_a_section_are_not_targets() {
        // No section labels and no comparable block: nothing positions the columns.
        let mut grid = SpreadsheetGrid::from_rows([
            vec!["", ""],
            vec!["", ""],
            vec!["Pool", "State"],
        ]);
        let map = map_of(&grid);
        assert!(map.is_empty());

        let flat = flat_of(r#"{"SUBJECT": {"Pool": "Yes", "State": "WI"}}"#);
        let report = fill_row_at(&mut grid, &map, &flat, 4);
        assert_eq!(report.filled, 0);
        assert_eq!(report.mapped_columns, 0);
        assert_eq!(grid.cell(4, 1), "");
    }

    #[test]
    fn fills_next_row() {
        let mut grid = template();
        let map = map_of(&grid);
        let flat = flat_of(
            r#"{"SUBJECT": {"State": "WI", "Pool": "No"},
                "SALES_COMPARISON_APPROACH": {"Comparable Sale #1": {"GLA": "1,480"}}}"#,
        );
        let row = next_row(&grid, &HeaderLayout::default());
        assert_eq!(row, 4);
        let report = fill_row_at(&mut grid, &map, &flat, row);
        assert_eq!(report.filled, 3);
        assert_eq!(report.missing, 1);
        assert_eq!(grid.cell(4, 2), "No");
        assert_eq!(grid.cell(4, 3), "WI");
        assert_eq!(grid.cell(4, 4), "1,480");
        assert_eq!(grid.cell(4, 5), "");
        assert_eq!(next_row(&grid, &HeaderLayout::default()), 5);
    }

    #[test]
    fn refill_same_row_writes_nothing() {
        let mut grid = template();
        let map = map_of(&grid);
        let flat = flat_of(r#"{"SUBJECT": {"State": "WI", "Pool": "No"}}"#);
        let first = fill_row_at(&mut grid, &map, &flat, 4);
        assert_eq!(first.filled, 2);
        let again = fill_row_at(&mut grid, &map, &flat, 4);
        assert_eq!(again.filled, 0);
        assert_eq!(again.occupied, 2);
    }

    #[test]
    fn never_overwrites_and_fills_placeholders() {
        let mut grid = template();
        grid.set_cell(4, 3, "IL");
        grid.set_cell(4, 2, " ");
        let map = map_of(&grid);
        let flat = flat_of(r#"{"SUBJECT": {"State": "WI", "Pool": "Yes"}}"#);
        let report = fill_row_at(&mut grid, &map, &flat, 4);
        assert_eq!(grid.cell(4, 3), "IL");
        assert_eq!(grid.cell(4, 2), "Yes");
        assert_eq!(report.filled, 1);
        assert_eq!(report.occupied, 1);
    }

    #[test]
    fn placeholder_values_are_not_written() {
        let mut grid = template();
        let map = map_of(&grid);
        let flat = flat_of(r#"{"SUBJECT": {"State": " "}}"#);
        let report = fill_row_at(&mut grid, &map, &flat, 4);
        assert_eq!(report.filled, 0);
        assert_eq!(grid.cell(4, 3), "");
    }

    #[test]
    fn next_row_respects_first_data_row() {
        let grid = SpreadsheetGrid::from_rows([vec!["x"]]);
        assert_eq!(next_row(&grid, &HeaderLayout::default()), 4);
    }
}
