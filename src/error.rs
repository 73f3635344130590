//! Error types for the edgequake-form1004 library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Form1004Error`] is **fatal**: the run cannot proceed at all (bad input
//!   file, provider not configured, a spreadsheet template with nothing to
//!   fill). Returned as `Err(Form1004Error)` from the top-level `extract*` and
//!   `fill*` functions.
//!
//! * [`BlockError`] is **non-fatal**: one page block (subject, sales or cost)
//!   failed to render or the VLM call failed, but the other blocks are fine.
//!   Stored inside [`crate::output::BlockResult`] so the merged document keeps
//!   whatever the surviving blocks produced.
//!
//! Everything the reconciliation engine meets after loading (missing values,
//! duplicate columns, a model answer that was not JSON) degrades to "cell not
//! populated" and never shows up here. The only reconciliation failure is a
//! structural one: a template whose headers leave nothing to fill.

use crate::pipeline::blocks::BlockKind;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-form1004 library.
#[derive(Debug, Error)]
pub enum Form1004Error {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The page selection does not hit a single page of the document.
    #[error("No pages selected (document has {total} pages)\nCheck --pages, e.g. --pages 2-8.")]
    NoPagesSelected { total: usize },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium (or its directory) or install pdfium system-wide."
    )]
    PdfiumBindingFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Every page block failed; there is no document to merge.
    #[error("All {total} page blocks failed after {retries} retries each.\nFirst error: {first_error}")]
    AllBlocksFailed {
        total: usize,
        retries: u32,
        first_error: String,
    },

    // ── Document errors ───────────────────────────────────────────────────
    /// The extraction JSON file could not be parsed.
    #[error("Extraction document '{path}' is not valid: {source}")]
    InvalidDocument {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    // ── Template errors ───────────────────────────────────────────────────
    /// The template extension is not a spreadsheet format we can read.
    #[error("Unsupported template '{path}': expected .xlsx, .xlsm, .xlsb, .xls, .ods or .csv")]
    UnsupportedTemplate { path: PathBuf },

    /// The output extension is not a format the filled sheet can be saved as.
    #[error("Unsupported output '{path}': expected .xlsx or .csv")]
    UnsupportedOutput { path: PathBuf },

    /// calamine or csv failed to open or decode the template.
    #[error("Failed to read template '{path}': {detail}")]
    TemplateReadFailed { path: PathBuf, detail: String },

    /// The requested worksheet does not exist in the workbook.
    #[error("Worksheet '{sheet}' not found in '{path}' (available: {available})")]
    SheetNotFound {
        path: PathBuf,
        sheet: String,
        available: String,
    },

    // ── Structural mismatch ───────────────────────────────────────────────
    /// The grid has no rows or no columns.
    #[error("Template sheet is empty ({rows} rows × {columns} columns); nothing to fill")]
    EmptyTemplate { rows: usize, columns: usize },

    /// The grid stops before the field header row.
    #[error("Template has {rows} rows but the field header row is row {field_row}")]
    MissingHeaderRows { field_row: usize, rows: usize },

    /// No column resolved to a usable (section, field) identity.
    #[error(
        "None of the {columns} template columns has a recognisable section and field header \
(section row {section_row}, field row {field_row})"
    )]
    UnparseableHeaders {
        columns: usize,
        section_row: usize,
        field_row: usize,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not read an input file.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or layout validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page block.
///
/// Stored alongside [`crate::output::BlockResult`] when a block fails. The
/// extraction continues unless ALL blocks fail.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum BlockError {
    /// Rasterising or encoding one of the block's pages failed.
    #[error("{block} block: rendering failed: {detail}")]
    RenderFailed { block: BlockKind, detail: String },

    /// LLM call failed after retries.
    #[error("{block} block: LLM call failed after {retries} retries: {detail}")]
    LlmFailed {
        block: BlockKind,
        retries: u32,
        detail: String,
    },

    /// LLM call did not answer within the configured timeout.
    #[error("{block} block: LLM call timed out after {secs}s")]
    Timeout { block: BlockKind, secs: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_template_display() {
        let e = Form1004Error::EmptyTemplate { rows: 0, columns: 0 };
        assert!(e.to_string().contains("nothing to fill"), "got: {e}");
    }

    #[test]
    fn unparseable_headers_display() {
        let e = Form1004Error::UnparseableHeaders {
            columns: 12,
            section_row: 2,
            field_row: 3,
        };
        let msg = e.to_string();
        assert!(msg.contains("12"));
        assert!(msg.contains("field row 3"));
    }

    #[test]
    fn all_blocks_failed_display() {
        let e = Form1004Error::AllBlocksFailed {
            total: 3,
            retries: 0,
            first_error: "boom".into(),
        };
        assert!(e.to_string().contains("All 3 page blocks"));
        assert!(e.to_string().contains("boom"));
    }

    #[test]
    fn block_error_names_block() {
        let e = BlockError::LlmFailed {
            block: BlockKind::Sales,
            retries: 2,
            detail: "503".into(),
        };
        let msg = e.to_string();
        assert!(msg.starts_with("sales block"), "got: {msg}");
        assert!(msg.contains("503"));
    }
}
