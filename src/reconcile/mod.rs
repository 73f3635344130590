//! Reconciliation engine: extraction document → one template row.
//!
//! ```text
//! ExtractionDocument ──flatten──▶ FlatIndex ─────────────┐
//!                                                         ├─pick_value─▶ cell writes
//! SpreadsheetGrid ──detect_sections──▶ ColumnMap ─────────┘
//! ```
//!
//! Both sides go through [`normalize`] so that lookups are exact string
//! matches on canonical `SECTION.FIELD` keys.

pub mod columns;
pub mod flatten;
pub mod normalize;
pub mod resolve;
pub mod writer;

pub use columns::{detect_sections, ColumnIdentity};
pub use flatten::{flatten, FlatIndex};
pub use normalize::{canonical_field, canonical_section, normalize_text};
pub use resolve::{pick_value, Lookup};
pub use writer::{fill_row_at, next_row, ColumnMap, FillReport};
