//! Pipeline stages for PDF → extraction-document runs.
//!
//! Each submodule implements one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ blocks ──▶ render ──▶ encode ──▶ llm ──▶ parse
//! (URL/path) (split)   (pdfium)   (base64)   (VLM)   (JSON cleanup)
//! ```
//!
//! 1. [`input`]: canonicalise the path, URL or byte buffer to a local PDF
//! 2. [`blocks`]: split the selected pages into subject, sales and cost blocks
//! 3. [`render`]: rasterise a block's pages in `spawn_blocking`
//! 4. [`encode`]: PNG-encode and base64-wrap each page image
//! 5. [`llm`]: one VLM call per block; the only stage with network I/O
//! 6. [`parse`]: strip fences and prose, parse, or fall back to the
//!    error-shaped document

pub mod blocks;
pub mod encode;
pub mod input;
pub mod llm;
pub mod parse;
pub mod render;
