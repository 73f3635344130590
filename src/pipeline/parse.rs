//! Model-output cleanup: raw VLM text → [`ExtractionDocument`].
//!
//! Even at temperature 0 models wrap JSON in ```` ```json ```` fences or add
//! a sentence before the object. The rules below peel that off before
//! parsing. Anything that still fails to parse becomes the error-shaped
//! document ([`ExtractionDocument::upstream_error`]) carrying the untouched
//! reply, so one bad block never aborts the run.
//!
//! ## Rule Order
//!
//! 1. Drop a leading BOM and surrounding whitespace
//! 2. Strip a leading ```` ``` ````/```` ```json ```` fence and a trailing fence
//! 3. Keep the outermost `{ … }` span

use crate::document::ExtractionDocument;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// Parse a model reply, falling back to the error-shaped document.
pub fn document_from_model_output(raw: &str) -> ExtractionDocument {
    let s = trim_reply(raw);
    let s = strip_json_fences(s);
    let Some(span) = outer_object(s) else {
        warn!("Model reply holds no JSON object ({} chars)", raw.len());
        return ExtractionDocument::upstream_error(raw);
    };
    match ExtractionDocument::from_json_str(span) {
        Ok(doc) => {
            debug!("Parsed model reply: {} top-level sections", doc.sections().len());
            doc
        }
        Err(e) => {
            warn!("Model reply is not valid JSON: {}", e);
            ExtractionDocument::upstream_error(raw)
        }
    }
}

// ── Rule 1: BOM and whitespace ───────────────────────────────────────────────

fn trim_reply(raw: &str) -> &str {
    raw.trim_start_matches('\u{feff}').trim()
}

// ── Rule 2: Code fences ──────────────────────────────────────────────────────

static RE_LEADING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^```(?:json)?[ \t]*\r?\n?").unwrap());

static RE_TRAILING_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r?\n?```\s*$").unwrap());

fn strip_json_fences(s: &str) -> &str {
    let start = RE_LEADING_FENCE.find(s).map_or(0, |m| m.end());
    let s = &s[start..];
    let end = RE_TRAILING_FENCE.find(s).map_or(s.len(), |m| m.start());
    s[..end].trim()
}

// ── Rule 3: Outermost object ─────────────────────────────────────────────────

fn outer_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    (end > start).then(|| &s[start..=end])
}
