//! File-level reconciliation tests: extraction JSON + CSV template → filled CSV.
//!
//! No network and no pdfium; every fixture is written to a temp directory.

use edgequake_form1004::{
    describe_columns, fill_template, workbook, FillConfig, Form1004Error, HeaderLayout,
};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const TEMPLATE: &str = "\
Appraisal log,,,,,,,,,,
,,SUBJECT,,Comparable Sale #1,,,Comparbe 2,,Reconciliation,
File #,Address,State,GLA,Address,GLA,Bdrms,Address,GLA,Value,Depreciation
";

const RESULTS: &str = r#"{
  "blocks": {"subject": [2], "sales": [3, 4, 5, 6, 7], "cost": [8]},
  "raw": {},
  "merged": {
    "SUBJECT": {"Property Address": "12 Elm Ct", "State": "WI", "Pool": "No"},
    "SALES_COMPARISON_APPROACH": {
      "Subject": {"Address": "12 Elm Ct", "GLA": "1,450"},
      "Comparable Sale #1": {"Address": "40 Oak St", "GLA": "1,520", "Bdrms": 3},
      "Comparable Sale #2": {"Address": "7 Pine Rd", "GLA": "1,390"}
    },
    "RECONCILIATION": {"Value": "$305,000"},
    "COST_APPROACH": {"Depreciation": "12,400"}
  },
  "stats": {}
}"#;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let p = self.dir.path().join(name);
        std::fs::write(&p, contents).unwrap();
        p
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

fn lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

#[test]
fn results_file_fills_next_row() {
    let fx = Fixture::new();
    let json = fx.write("appraisal.json", RESULTS);
    let template = fx.write("log.csv", TEMPLATE);
    let out = fx.path("filled.csv");

    let report = fill_template(&json, &template, &out, &FillConfig::default()).unwrap();
    assert_eq!(report.row, 4);

    let filled = lines(&out);
    assert_eq!(filled.len(), 4);
    // File # | Address | State | GLA | C1 Address | C1 GLA | C1 Bdrms | C2 Address | C2 GLA | Value | Depreciation
    assert_eq!(
        filled[3],
        ",12 Elm Ct,WI,\"1,450\",40 Oak St,\"1,520\",3,7 Pine Rd,\"1,390\",\"$305,000\",\"12,400\""
    );
    assert_eq!(report.filled, 10);
    assert_eq!(report.missing, 1);
}

#[test]
fn second_run_appends_below() {
    let fx = Fixture::new();
    let json = fx.write("appraisal.json", RESULTS);
    let template = fx.write("log.csv", TEMPLATE);
    let first = fx.path("first.csv");
    let second = fx.path("second.csv");

    fill_template(&json, &template, &first, &FillConfig::default()).unwrap();
    let report = fill_template(&json, &first, &second, &FillConfig::default()).unwrap();
    assert_eq!(report.row, 5);
    assert_eq!(lines(&second).len(), 5);
}

#[test]
fn refilling_the_same_row_writes_nothing() {
    let fx = Fixture::new();
    let json = fx.write("appraisal.json", RESULTS);
    let template = fx.write("log.csv", TEMPLATE);
    let first = fx.path("first.csv");
    let second = fx.path("second.csv");
    let row4 = FillConfig {
        target_row: Some(4),
        ..FillConfig::default()
    };

    fill_template(&json, &template, &first, &row4).unwrap();
    let report = fill_template(&json, &first, &second, &row4).unwrap();
    assert_eq!(report.filled, 0);
    assert_eq!(lines(&first), lines(&second));
}

#[test]
fn bare_document_state_lands_in_column_three() {
    let fx = Fixture::new();
    let json = fx.write("doc.json", r#"{"SUBJECT":{"State":"WI"}}"#);
    let template = fx.write("t.csv", ",,\n,,SUBJECT\nA,B,State\n");
    let out = fx.path("out.csv");

    let report = fill_template(&json, &template, &out, &FillConfig::default()).unwrap();
    assert_eq!(report.filled, 1);
    assert_eq!(lines(&out)[3], ",,WI");
}

#[test]
fn error_shaped_document_fills_nothing() {
    let fx = Fixture::new();
    let json = fx.write(
        "doc.json",
        r#"{"error": "Invalid JSON returned from model", "raw_output": "Sorry, I cannot read this"}"#,
    );
    let template = fx.write("log.csv", TEMPLATE);
    let out = fx.path("out.csv");

    let report = fill_template(&json, &template, &out, &FillConfig::default()).unwrap();
    assert_eq!(report.filled, 0);
    assert_eq!(lines(&out).len(), 3);
}

#[test]
fn comparable_headers_propagate() {
    let fx = Fixture::new();
    let template = fx.write("log.csv", TEMPLATE);
    let grid = workbook::load_template(&template, None).unwrap();
    let ids = describe_columns(&grid, &HeaderLayout::default()).unwrap();

    let sections: Vec<&str> = ids.iter().map(|c| c.section.as_str()).collect();
    assert_eq!(
        sections,
        vec![
            "SUBJECT",
            "SUBJECT",
            "SUBJECT",
            "SUBJECT",
            "COMPARABLE SALE #1",
            "COMPARABLE SALE #1",
            "COMPARABLE SALE #1",
            "COMPARABLE SALE #2",
            "COMPARABLE SALE #2",
            "RECONCILIATION",
            "RECONCILIATION",
        ]
    );
    assert_eq!(ids[6].field, "BEDROOMS");
}

#[test]
fn structural_errors_surface() {
    let fx = Fixture::new();
    let json = fx.write("doc.json", r#"{"SUBJECT":{"State":"WI"}}"#);
    let out = fx.path("out.csv");

    let empty = fx.write("empty.csv", "");
    let err = fill_template(&json, &empty, &out, &FillConfig::default()).unwrap_err();
    assert!(matches!(err, Form1004Error::EmptyTemplate { .. }), "{err}");

    let unsupported = fx.write("log.txt", TEMPLATE);
    let err = fill_template(&json, &unsupported, &out, &FillConfig::default()).unwrap_err();
    assert!(matches!(err, Form1004Error::UnsupportedTemplate { .. }), "{err}");

    let bad_json = fx.write("bad.json", "{not json");
    let template = fx.write("log.csv", TEMPLATE);
    let err = fill_template(&bad_json, &template, &out, &FillConfig::default()).unwrap_err();
    assert!(matches!(err, Form1004Error::InvalidDocument { .. }), "{err}");
    assert!(!out.exists());
}

#[test]
fn results_file_with_empty_merged_fills_nothing() {
    let fx = Fixture::new();
    let json = fx.write(
        "appraisal.json",
        r#"{
          "blocks": {"subject": [2], "sales": [3], "cost": [4]},
          "raw": {"subject": {"error": "Invalid JSON returned from model", "raw_output": "nope"}},
          "merged": {},
          "stats": {"total_pages": 4}
        }"#,
    );
    let template = fx.write("log.csv", ",,\n,Subject,\nFile #,Error,Raw Output\n");
    let out = fx.path("out.csv");

    let report = fill_template(&json, &template, &out, &FillConfig::default()).unwrap();
    assert_eq!(report.filled, 0);
    assert_eq!(lines(&out).len(), 3);
}

#[test]
fn workbook_output_keeps_existing_rows() {
    let fx = Fixture::new();
    let json = fx.write("appraisal.json", RESULTS);
    let template = fx.write("log.csv", TEMPLATE);
    let out = fx.path("filled.xlsx");

    let report = fill_template(&json, &template, &out, &FillConfig::default()).unwrap();
    assert_eq!(report.filled, 10);

    let grid = workbook::load_template(&out, None).unwrap();
    assert_eq!(grid.cell(1, 1), "Appraisal log");
    assert_eq!(grid.cell(2, 5), "Comparable Sale #1");
    assert_eq!(grid.cell(4, 3), "WI");
    assert_eq!(grid.cell(4, 4), "1,450");
    assert_eq!(grid.cell(4, 7), "3");
    assert_eq!(grid.cell(4, 10), "$305,000");
}

#[test]
fn unsupported_output_is_rejected_before_reading() {
    let fx = Fixture::new();
    let json = fx.write("appraisal.json", RESULTS);
    let template = fx.write("log.csv", TEMPLATE);
    let out = fx.path("filled.ods");

    let err = fill_template(&json, &template, &out, &FillConfig::default()).unwrap_err();
    assert!(matches!(err, Form1004Error::UnsupportedOutput { .. }), "{err}");
    assert!(!out.exists());
}
