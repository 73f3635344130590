//! Extraction result types.
//!
//! [`ExtractionOutput`] serialises to the results file the fill side reads:
//!
//! ```json
//! {
//!   "blocks": {"subject": [2], "sales": [3, 4, 5, 6, 7], "cost": [8]},
//!   "raw":    {"subject": {...}, "sales": {...}, "cost": {...}},
//!   "merged": {...},
//!   "stats":  {...}
//! }
//! ```

use crate::document::ExtractionDocument;
use crate::error::BlockError;
use crate::pipeline::blocks::{BlockKind, BlockPlan};
use serde::{Deserialize, Serialize};

/// Result of one page block's VLM call.
#[derive(Debug, Clone)]
pub struct BlockResult {
    pub kind: BlockKind,
    /// 1-indexed pages sent with the request.
    pub pages: Vec<usize>,
    /// Parsed reply; the error-shaped document when the reply was not JSON.
    /// `None` when the call itself failed.
    pub document: Option<ExtractionDocument>,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    pub retries: u32,
    pub error: Option<BlockError>,
}

impl BlockResult {
    pub fn failed(kind: BlockKind, pages: &[usize], duration_ms: u64, retries: u32, error: BlockError) -> Self {
        Self {
            kind,
            pages: pages.to_vec(),
            document: None,
            input_tokens: 0,
            output_tokens: 0,
            duration_ms,
            retries,
            error: Some(error),
        }
    }

    /// Document recorded under `raw.{block}`: the parsed reply, or the
    /// error-shaped document describing a failed call.
    pub fn raw_document(&self) -> ExtractionDocument {
        match (&self.document, &self.error) {
            (Some(doc), _) => doc.clone(),
            (None, Some(e)) => ExtractionDocument::upstream_error(&e.to_string()),
            (None, None) => ExtractionDocument::default(),
        }
    }
}

/// Per-block documents as returned by the model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBlocks {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<ExtractionDocument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sales: Option<ExtractionDocument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost: Option<ExtractionDocument>,
}

impl RawBlocks {
    pub fn set(&mut self, kind: BlockKind, doc: ExtractionDocument) {
        let slot = match kind {
            BlockKind::Subject => &mut self.subject,
            BlockKind::Sales => &mut self.sales,
            BlockKind::Cost => &mut self.cost,
        };
        *slot = Some(doc);
    }

    pub fn get(&self, kind: BlockKind) -> Option<&ExtractionDocument> {
        match kind {
            BlockKind::Subject => self.subject.as_ref(),
            BlockKind::Sales => self.sales.as_ref(),
            BlockKind::Cost => self.cost.as_ref(),
        }
    }
}

/// Aggregate statistics for one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Pages in the PDF.
    pub total_pages: usize,
    /// Pages selected and split into blocks.
    pub selected_pages: usize,
    pub processed_blocks: usize,
    pub failed_blocks: usize,
    /// Blocks whose reply could not be parsed as JSON.
    pub unparsed_blocks: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub total_duration_ms: u64,
    pub render_duration_ms: u64,
    pub llm_duration_ms: u64,
}

/// Complete output of [`crate::extract`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub blocks: BlockPlan,
    pub raw: RawBlocks,
    pub merged: ExtractionDocument,
    pub stats: ExtractionStats,
    /// Per-block call details; not part of the results file.
    #[serde(skip)]
    pub block_results: Vec<BlockResult>,
}

impl ExtractionOutput {
    /// Pretty JSON for the results file.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(json: &str) -> ExtractionDocument {
        ExtractionDocument::from_json_str(json).unwrap()
    }

    #[test]
    fn results_file_shape_and_reload() {
        let mut raw = RawBlocks::default();
        raw.set(BlockKind::Subject, doc(r#"{"SUBJECT": {"State": "WI"}}"#));
        let output = ExtractionOutput {
            blocks: BlockPlan::split(&[2, 3, 8]),
            raw,
            merged: doc(r#"{"SUBJECT": {"State": "WI"}}"#),
            stats: ExtractionStats::default(),
            block_results: Vec::new(),
        };
        let json = output.to_json_pretty().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["blocks"]["sales"], serde_json::json!([3]));
        assert_eq!(value["raw"]["subject"]["SUBJECT"]["State"], "WI");
        assert!(value["raw"].get("cost").is_none());
        assert_eq!(value["merged"]["SUBJECT"]["State"], "WI");

        let reloaded = ExtractionDocument::from_results_str(&json).unwrap();
        assert_eq!(reloaded, output.merged);
    }

    #[test]
    fn failed_block_raw_is_error_shaped() {
        let result = BlockResult::failed(
            BlockKind::Cost,
            &[8],
            10,
            0,
            BlockError::Timeout {
                block: BlockKind::Cost,
                secs: 180,
            },
        );
        let raw = result.raw_document();
        assert!(raw.is_upstream_error());
    }
}
