//! Template I/O: workbook or CSV file ↔ [`SpreadsheetGrid`].
//!
//! Workbooks (`.xlsx`, `.xlsm`, `.xlsb`, `.xls`, `.ods`) are read with
//! calamine; CSV templates with the `csv` crate. A worksheet's used range may
//! not start at `A1`, so cells are placed at their real worksheet
//! coordinates: header rows 2 and 3 stay rows 2 and 3 even when row 1 is
//! empty and calamine trims it from the range.
//!
//! Date cells are read as ISO text (`2024-01-01`, `2024-01-01 09:30:00`)
//! rather than Excel serial numbers, so rows that were already filled keep
//! their dates when the sheet is written back.
//!
//! Filled grids are saved as `.xlsx` (rust_xlsxwriter) or `.csv`, chosen by
//! the output extension.

use crate::error::Form1004Error;
use crate::grid::SpreadsheetGrid;
use calamine::{open_workbook_auto, Data, DataType, Range, Reader};
use chrono::NaiveTime;
use rust_xlsxwriter::{Workbook, XlsxError};
use std::path::Path;
use tracing::{debug, info};

/// Worksheet name used when the grid did not come from a workbook.
const DEFAULT_SHEET_NAME: &str = "Sheet1";

/// Template formats understood by [`load_template`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateFormat {
    Workbook,
    Csv,
}

impl TemplateFormat {
    pub fn from_path(path: &Path) -> Result<Self, Form1004Error> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(TemplateFormat::Workbook),
            "csv" => Ok(TemplateFormat::Csv),
            _ => Err(Form1004Error::UnsupportedTemplate {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Formats a filled grid can be saved as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Xlsx,
    Csv,
}

impl OutputFormat {
    pub fn from_path(path: &Path) -> Result<Self, Form1004Error> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "xlsx" => Ok(OutputFormat::Xlsx),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(Form1004Error::UnsupportedOutput {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Load a template sheet: the named sheet, or the first one.
///
/// `sheet` is ignored for CSV files.
pub fn load_template(path: &Path, sheet: Option<&str>) -> Result<SpreadsheetGrid, Form1004Error> {
    if !path.exists() {
        return Err(Form1004Error::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    let grid = match TemplateFormat::from_path(path)? {
        TemplateFormat::Workbook => load_workbook(path, sheet)?,
        TemplateFormat::Csv => load_csv(path)?,
    };
    info!(
        "Loaded template {}: {} rows × {} columns",
        path.display(),
        grid.max_row(),
        grid.max_column()
    );
    Ok(grid)
}

fn load_workbook(path: &Path, sheet: Option<&str>) -> Result<SpreadsheetGrid, Form1004Error> {
    let read_failed = |detail: String| Form1004Error::TemplateReadFailed {
        path: path.to_path_buf(),
        detail,
    };

    let mut workbook = open_workbook_auto(path).map_err(|e| read_failed(e.to_string()))?;
    let sheet_names = workbook.sheet_names();
    let name = match sheet {
        Some(wanted) => sheet_names
            .iter()
            .find(|n| n.as_str() == wanted)
            .cloned()
            .ok_or_else(|| Form1004Error::SheetNotFound {
                path: path.to_path_buf(),
                sheet: wanted.to_string(),
                available: sheet_names.join(", "),
            })?,
        None => sheet_names
            .first()
            .cloned()
            .ok_or_else(|| read_failed("workbook has no sheets".to_string()))?,
    };
    debug!("Reading sheet '{}' of {}", name, path.display());

    let range = workbook
        .worksheet_range(&name)
        .map_err(|e| read_failed(format!("sheet '{name}': {e}")))?;
    Ok(grid_from_range(&range).with_sheet_name(name))
}

/// Place a calamine range at its worksheet coordinates.
pub fn grid_from_range(range: &Range<Data>) -> SpreadsheetGrid {
    let mut grid = SpreadsheetGrid::new();
    let Some((row0, col0)) = range.start() else {
        return grid;
    };
    for (r, cells) in range.rows().enumerate() {
        for (c, cell) in cells.iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            grid.set_cell(row0 as usize + r + 1, col0 as usize + c + 1, cell_text(cell));
        }
    }
    grid
}

/// Display text of one calamine cell. Dates become ISO text; every other
/// value uses calamine's own formatting.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::DateTime(dt) if !dt.is_duration() => match dt.as_datetime() {
            Some(at) if at.time() == NaiveTime::MIN => at.format("%Y-%m-%d").to_string(),
            Some(at) => at.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => cell.to_string(),
        },
        _ => cell.to_string(),
    }
}

fn load_csv(path: &Path) -> Result<SpreadsheetGrid, Form1004Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| Form1004Error::TemplateReadFailed {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|e| Form1004Error::TemplateReadFailed {
            path: path.to_path_buf(),
            detail: format!("row {}: {e}", i + 1),
        })?;
        rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }
    Ok(SpreadsheetGrid::from_rows(rows))
}

/// Save the grid in the format named by the extension of `path`.
pub fn save_grid(grid: &SpreadsheetGrid, path: &Path) -> Result<(), Form1004Error> {
    match OutputFormat::from_path(path)? {
        OutputFormat::Xlsx => save_xlsx(grid, path),
        OutputFormat::Csv => save_csv(grid, path),
    }
}

/// Write the grid as a one-sheet `.xlsx` workbook.
///
/// The sheet keeps the template's name. Cells whose text is exactly the
/// canonical form of a number (`1450`, `0.25`) are written as numbers; all
/// other cells, including `1,450` and `02134`, are written as text.
/// Uses atomic write (temp file + rename) to prevent partial files.
pub fn save_xlsx(grid: &SpreadsheetGrid, path: &Path) -> Result<(), Form1004Error> {
    let io_failed = |source: std::io::Error| Form1004Error::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    let xlsx_failed = |e: XlsxError| io_failed(std::io::Error::other(e.to_string()));
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_failed)?;
    }

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(grid.sheet_name().unwrap_or(DEFAULT_SHEET_NAME))
        .map_err(xlsx_failed)?;

    for (r, cells) in grid.rows().iter().enumerate() {
        for (c, text) in cells.iter().enumerate() {
            if text.is_empty() {
                continue;
            }
            let (row, col) = match (u32::try_from(r), u16::try_from(c)) {
                (Ok(row), Ok(col)) => (row, col),
                _ => {
                    return Err(io_failed(std::io::Error::other(format!(
                        "cell ({}, {}) is outside the worksheet",
                        r + 1,
                        c + 1
                    ))))
                }
            };
            match as_number(text) {
                Some(n) => worksheet.write_number(row, col, n),
                None => worksheet.write_string(row, col, text),
            }
            .map_err(xlsx_failed)?;
        }
    }

    let tmp_path = path.with_extension("xlsx.tmp");
    workbook.save(&tmp_path).map_err(xlsx_failed)?;
    std::fs::rename(&tmp_path, path).map_err(io_failed)?;
    info!("Wrote {} rows to {}", grid.max_row(), path.display());
    Ok(())
}

/// The number `text` spells, if it is written the way Rust prints it.
fn as_number(text: &str) -> Option<f64> {
    let n: f64 = text.parse().ok()?;
    (n.is_finite() && n.to_string() == text).then_some(n)
}

/// Write the grid as CSV, padding every row to the grid width.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub fn save_csv(grid: &SpreadsheetGrid, path: &Path) -> Result<(), Form1004Error> {
    let write_failed = |source: std::io::Error| Form1004Error::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_failed)?;
    }

    let tmp_path = path.with_extension("csv.tmp");
    let width = grid.max_column();
    {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_path(&tmp_path)
            .map_err(|e| write_failed(e.into()))?;
        for row in grid.rows() {
            let padded = row
                .iter()
                .map(String::as_str)
                .chain(std::iter::repeat("").take(width.saturating_sub(row.len())));
            writer.write_record(padded).map_err(|e| write_failed(e.into()))?;
        }
        writer.flush().map_err(write_failed)?;
    }
    std::fs::rename(&tmp_path, path).map_err(write_failed)?;

    info!("Wrote {} rows to {}", grid.max_row(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{ExcelDateTime, ExcelDateTimeType};

    #[test]
    fn format_from_extension() {
        assert_eq!(TemplateFormat::from_path(Path::new("t.XLSX")).unwrap(), TemplateFormat::Workbook);
        assert_eq!(TemplateFormat::from_path(Path::new("t.ods")).unwrap(), TemplateFormat::Workbook);
        assert_eq!(TemplateFormat::from_path(Path::new("t.csv")).unwrap(), TemplateFormat::Csv);
        assert!(matches!(
            TemplateFormat::from_path(Path::new("t.numbers")),
            Err(Form1004Error::UnsupportedTemplate { .. })
        ));
        assert!(TemplateFormat::from_path(Path::new("template")).is_err());
    }

    #[test]
    fn range_offsets_are_preserved() {
        // Used range starts at B2: row 1 and column A are empty.
        let mut range = Range::new((1, 1), (2, 3));
        range.set_value((1, 2), Data::String("SUBJECT".to_string()));
        range.set_value((2, 1), Data::String("File #".to_string()));
        range.set_value((2, 2), Data::String("State".to_string()));
        range.set_value((2, 3), Data::Float(1450.0));

        let grid = grid_from_range(&range);
        assert_eq!(grid.cell(2, 3), "SUBJECT");
        assert_eq!(grid.cell(3, 2), "File #");
        assert_eq!(grid.cell(3, 3), "State");
        assert_eq!(grid.cell(3, 4), "1450");
        assert_eq!(grid.cell(1, 1), "");
        assert_eq!(grid.max_row(), 3);
    }

    #[test]
    fn dates_load_as_iso_text() {
        let mut range = Range::new((3, 0), (3, 2));
        range.set_value(
            (3, 0),
            Data::DateTime(ExcelDateTime::new(45292.0, ExcelDateTimeType::DateTime, false)),
        );
        range.set_value(
            (3, 1),
            Data::DateTime(ExcelDateTime::new(45292.5, ExcelDateTimeType::DateTime, false)),
        );
        range.set_value((3, 2), Data::DateTimeIso("2019-03-15".to_string()));
        let grid = grid_from_range(&range);
        assert_eq!(grid.cell(4, 1), "2024-01-01");
        assert_eq!(grid.cell(4, 2), "2024-01-01 12:00:00");
        assert_eq!(grid.cell(4, 3), "2019-03-15");
    }

    #[test]
    fn output_format_from_extension() {
        assert_eq!(OutputFormat::from_path(Path::new("out.XLSX")).unwrap(), OutputFormat::Xlsx);
        assert_eq!(OutputFormat::from_path(Path::new("out.csv")).unwrap(), OutputFormat::Csv);
        assert!(matches!(
            OutputFormat::from_path(Path::new("out.xls")),
            Err(Form1004Error::UnsupportedOutput { .. })
        ));
    }

    #[test]
    fn xlsx_output_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("filled.xlsx");
        let grid = SpreadsheetGrid::from_rows([
            vec!["Log", "", ""],
            vec!["", "SUBJECT", ""],
            vec!["File #", "State", "GLA"],
            vec!["02134", "WI", "1450"],
        ])
        .with_sheet_name("Appraisals");
        save_grid(&grid, &out).unwrap();
        assert!(!out.with_extension("xlsx.tmp").exists());

        let reloaded = load_template(&out, Some("Appraisals")).unwrap();
        assert_eq!(reloaded.sheet_name(), Some("Appraisals"));
        assert_eq!(reloaded.cell(2, 2), "SUBJECT");
        assert_eq!(reloaded.cell(4, 1), "02134");
        assert_eq!(reloaded.cell(4, 2), "WI");
        assert_eq!(reloaded.cell(4, 3), "1450");
    }

    #[test]
    fn numbers_must_round_trip_exactly() {
        assert_eq!(as_number("1450"), Some(1450.0));
        assert_eq!(as_number("0.25"), Some(0.25));
        assert_eq!(as_number("02134"), None);
        assert_eq!(as_number("1,450"), None);
        assert_eq!(as_number("NaN"), None);
        assert_eq!(as_number("WI"), None);
    }

    #[test]
    fn empty_range_is_empty_grid() {
        let range: Range<Data> = Range::empty();
        assert_eq!(grid_from_range(&range).max_row(), 0);
    }

    #[test]
    fn csv_round_trip_keeps_ragged_rows() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("template.csv");
        std::fs::write(&src, "Log\n,SUBJECT,\"Comparable Sale #1\"\nFile #,State,GLA\n").unwrap();

        let mut grid = load_template(&src, None).unwrap();
        assert_eq!(grid.max_row(), 3);
        assert_eq!(grid.cell(2, 3), "Comparable Sale #1");
        grid.set_cell(4, 2, "WI");

        let out = dir.path().join("out").join("filled.csv");
        save_csv(&grid, &out).unwrap();
        let text = std::fs::read_to_string(&out).unwrap();
        assert_eq!(text.lines().nth(3), Some(",WI,"));
        assert!(!out.with_extension("csv.tmp").exists());
    }

    #[test]
    fn missing_template() {
        let err = load_template(Path::new("/no/such/template.xlsx"), None).unwrap_err();
        assert!(matches!(err, Form1004Error::FileNotFound { .. }));
    }
}
