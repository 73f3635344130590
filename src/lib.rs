//! # edgequake-form1004
//!
//! Pull the fields of a Form 1004 (Uniform Residential Appraisal Report) out
//! of a scanned PDF with a Vision Language Model, then write them as one new
//! record row into a spreadsheet template whose headers are typed by hand.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF ─┬─ 1. Input    resolve local file, URL or bytes
//!      ├─ 2. Blocks   first page → subject, middle → sales, last → cost
//!      ├─ 3. Render   rasterise each block's pages via pdfium (spawn_blocking)
//!      ├─ 4. VLM      one JSON-returning call per block, sequentially
//!      └─ 5. Merge    block documents → one ExtractionDocument
//!
//! ExtractionDocument + template
//!      ├─ 6. Flatten  nested JSON → "SECTION.FIELD" index
//!      ├─ 7. Detect   each template column → (section, field)
//!      └─ 8. Write    next empty row, never overwriting a cell
//! ```
//!
//! Stages 6–8 are deterministic and need no network or PDF library; see
//! [`reconcile`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_form1004::{extract, fill, ExtractionConfig, FillConfig, workbook};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / …
//!     let output = extract("appraisal.pdf", &ExtractionConfig::default()).await?;
//!
//!     let mut grid = workbook::load_template(Path::new("log.xlsx"), None)?;
//!     let report = fill(&output.merged, &mut grid, &FillConfig::default())?;
//!     workbook::save_grid(&grid, Path::new("log-filled.xlsx"))?;
//!     eprintln!("filled {} cells in row {}", report.filled, report.row);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `form1004` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ## PDFium
//!
//! Rendering binds `libpdfium` at run time from `PDFIUM_LIB_PATH` (a file or
//! a directory) or from the system library path.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod fill;
pub mod grid;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod reconcile;
pub mod workbook;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, FillConfig, HeaderLayout, PageSelection};
pub use document::{ExtractionDocument, Value};
pub use error::{BlockError, Form1004Error};
pub use extract::{extract, extract_from_bytes, extract_to_file};
pub use fill::{describe_columns, fill, fill_template};
pub use grid::SpreadsheetGrid;
pub use output::{BlockResult, ExtractionOutput, ExtractionStats, RawBlocks};
pub use pipeline::blocks::{BlockKind, BlockPlan};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use reconcile::{ColumnIdentity, FillReport, FlatIndex};
