//! Progress-callback trait for per-block extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the pipeline renders and sends each page block (subject, sales,
//! cost) to the VLM. Blocks run one after another, but the trait is
//! `Send + Sync` so implementations can forward events across threads.
//!
//! # Example
//!
//! ```rust
//! use edgequake_form1004::{BlockKind, ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: Arc<AtomicUsize>,
//! }
//!
//! impl ExtractionProgressCallback for CountingCallback {
//!     fn on_block_complete(&self, block: BlockKind, sections: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{block} block done ({sections} sections)");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     completed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::pipeline::blocks::BlockKind;
use std::sync::Arc;

/// Called by the extraction pipeline as it processes each page block.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once before any block is rendered.
    ///
    /// # Arguments
    /// * `total_blocks`: number of non-empty blocks that will be processed
    fn on_extraction_start(&self, total_blocks: usize) {
        let _ = total_blocks;
    }

    /// Called before a block's pages are rendered.
    ///
    /// # Arguments
    /// * `block`: which block is starting
    /// * `pages`: its 1-indexed page numbers
    fn on_block_start(&self, block: BlockKind, pages: &[usize]) {
        let _ = (block, pages);
    }

    /// Called when the VLM answered for a block.
    ///
    /// # Arguments
    /// * `block`: the finished block
    /// * `sections`: top-level keys in its document (0 for a non-JSON answer)
    fn on_block_complete(&self, block: BlockKind, sections: usize) {
        let _ = (block, sections);
    }

    /// Called when a block failed to render or its VLM call failed.
    fn on_block_error(&self, block: BlockKind, error: &str) {
        let _ = (block, error);
    }

    /// Called once after every block has been attempted.
    ///
    /// # Arguments
    /// * `total_blocks`: blocks attempted
    /// * `success_count`: blocks that produced a document
    fn on_extraction_complete(&self, total_blocks: usize, success_count: usize) {
        let _ = (total_blocks, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;
