//! Fill entry points: extraction document + template → one new record row.
//!
//! [`fill`] works purely in memory; [`fill_template`] wraps it with template
//! loading and `.xlsx` or `.csv` output. The only hard failures are structural: a template
//! with no cells, no header rows, or no column whose headers name both a
//! section and a field.
//! Everything else (missing values, duplicate columns, an error-shaped
//! document) degrades to cells left empty.

use crate::config::{FillConfig, HeaderLayout};
use crate::document::ExtractionDocument;
use crate::error::Form1004Error;
use crate::grid::SpreadsheetGrid;
use crate::reconcile::{detect_sections, fill_row_at, flatten, next_row, ColumnIdentity, ColumnMap, FillReport};
use crate::workbook;
use std::path::Path;
use tracing::{info, warn};

/// Fill the next free row of `grid` from `doc`.
///
/// Writes into `config.target_row` instead when it is set.
pub fn fill(
    doc: &ExtractionDocument,
    grid: &mut SpreadsheetGrid,
    config: &FillConfig,
) -> Result<FillReport, Form1004Error> {
    config.validate()?;
    let columns = column_map(grid, &config.layout)?;

    if doc.is_upstream_error() {
        warn!("Extraction document is the error fallback for an unparseable model reply; nothing will be filled");
    }
    let flat = flatten(doc);

    let row = config
        .target_row
        .unwrap_or_else(|| next_row(grid, &config.layout));
    let report = fill_row_at(grid, &columns, &flat, row);
    info!(
        "Filled {} of {} mapped columns in row {} ({} occupied, {} without a value)",
        report.filled, report.mapped_columns, report.row, report.occupied, report.missing
    );
    Ok(report)
}

/// Detected identity of every template column.
pub fn describe_columns(
    grid: &SpreadsheetGrid,
    layout: &HeaderLayout,
) -> Result<Vec<ColumnIdentity>, Form1004Error> {
    layout.validate()?;
    check_structure(grid, layout)?;
    Ok(detect_sections(grid, layout))
}

/// Load `json_path` and `template_path`, fill one row, and save the result
/// in the format named by the extension of `output_path`.
pub fn fill_template(
    json_path: &Path,
    template_path: &Path,
    output_path: &Path,
    config: &FillConfig,
) -> Result<FillReport, Form1004Error> {
    workbook::OutputFormat::from_path(output_path)?;
    let doc = ExtractionDocument::load(json_path)?;
    let mut grid = workbook::load_template(template_path, config.sheet.as_deref())?;
    let report = fill(&doc, &mut grid, config)?;
    workbook::save_grid(&grid, output_path)?;
    Ok(report)
}

fn column_map(grid: &SpreadsheetGrid, layout: &HeaderLayout) -> Result<ColumnMap, Form1004Error> {
    check_structure(grid, layout)?;
    let columns = ColumnMap::from_identities(&detect_sections(grid, layout));
    if columns.is_empty() {
        return Err(Form1004Error::UnparseableHeaders {
            columns: grid.max_column(),
            section_row: layout.section_row,
            field_row: layout.field_row,
        });
    }
    Ok(columns)
}

fn check_structure(grid: &SpreadsheetGrid, layout: &HeaderLayout) -> Result<(), Form1004Error> {
    if grid.max_row() == 0 || grid.max_column() == 0 {
        return Err(Form1004Error::EmptyTemplate {
            rows: grid.max_row(),
            columns: grid.max_column(),
        });
    }
    let header_rows = layout.section_row.max(layout.field_row);
    if grid.max_row() < header_rows {
        return Err(Form1004Error::MissingHeaderRows {
            field_row: header_rows,
            rows: grid.max_row(),
        });
    }
    Ok(())
}
