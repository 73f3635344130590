//! Extraction entry points: PDF → [`ExtractionOutput`].
//!
//! Blocks are processed one after another in subject, sales, cost order and
//! their documents merged in that order (see [`ExtractionDocument::merge`]).

use crate::config::{ExtractionConfig, DEFAULT_MODEL};
use crate::document::ExtractionDocument;
use crate::error::{BlockError, Form1004Error};
use crate::output::{BlockResult, ExtractionOutput, ExtractionStats, RawBlocks};
use crate::pipeline::blocks::{BlockKind, BlockPlan};
use crate::pipeline::input::{self, ResolvedInput};
use crate::pipeline::{encode, llm, render};
use edgequake_llm::{ImageData, LLMProvider, ProviderFactory};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Extract Form 1004 fields from a PDF file or URL.
///
/// # Returns
/// `Ok(ExtractionOutput)` as long as at least one block produced a reply,
/// even when the others failed (check `output.stats.failed_blocks`).
///
/// # Errors
/// Fatal errors only: unreadable input, not a PDF, no pages selected, no
/// provider, or every block failed.
pub async fn extract(
    input_str: impl AsRef<str>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Form1004Error> {
    let input_str = input_str.as_ref();
    info!("Starting extraction: {}", input_str);
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    extract_resolved(&resolved, config).await
}

/// Extract from PDF bytes held in memory.
///
/// The bytes are written to a managed temp file that is removed on return.
pub async fn extract_from_bytes(
    bytes: &[u8],
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Form1004Error> {
    let resolved = input::resolve_bytes(bytes).await?;
    extract_resolved(&resolved, config).await
}

/// Extract and write the results file (pretty JSON) to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn extract_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Form1004Error> {
    let output = extract(input_str, config).await?;
    let path = output_path.as_ref();
    let json = output
        .to_json_pretty()
        .map_err(|e| Form1004Error::Internal(format!("Failed to serialise output: {e}")))?;

    let write_err = |source| Form1004Error::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, json).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

    info!("Wrote extraction results to {}", path.display());
    Ok(output)
}

async fn extract_resolved(
    resolved: &ResolvedInput,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, Form1004Error> {
    let total_start = Instant::now();
    let pdf_path = resolved.path();

    // ── Step 1: Provider ─────────────────────────────────────────────────
    let provider = resolve_provider(config).await?;

    // ── Step 2: Pages and blocks ─────────────────────────────────────────
    let total_pages = render::page_count(pdf_path, config.password.as_deref()).await?;
    let pages = config.pages.to_pages(total_pages);
    if pages.is_empty() {
        return Err(Form1004Error::NoPagesSelected { total: total_pages });
    }
    let plan = BlockPlan::split(&pages);
    let block_count = plan.non_empty().count();
    info!(
        "PDF has {} pages; subject {:?}, sales {:?}, cost {:?}",
        total_pages, plan.subject, plan.sales, plan.cost
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_start(block_count);
    }

    // ── Step 3: Render, encode and call, block by block ──────────────────
    let mut results: Vec<BlockResult> = Vec::with_capacity(block_count);
    let mut render_duration_ms = 0u64;
    let mut llm_duration_ms = 0u64;

    for (kind, block_pages) in plan.non_empty() {
        if let Some(ref cb) = config.progress_callback {
            cb.on_block_start(kind, block_pages);
        }

        let render_start = Instant::now();
        let images = render_block(pdf_path, kind, block_pages, config).await;
        render_duration_ms += render_start.elapsed().as_millis() as u64;

        let result = match images {
            Ok(images) => {
                let llm_start = Instant::now();
                let r = llm::process_block(&provider, kind, block_pages, images, config).await;
                llm_duration_ms += llm_start.elapsed().as_millis() as u64;
                r
            }
            Err(BlockFailure::Fatal(e)) => return Err(e),
            Err(BlockFailure::Block(e)) => BlockResult::failed(kind, block_pages, 0, 0, e),
        };

        if let Some(ref cb) = config.progress_callback {
            match (&result.error, &result.document) {
                (Some(e), _) => cb.on_block_error(kind, &e.to_string()),
                (None, Some(doc)) if doc.is_upstream_error() => cb.on_block_complete(kind, 0),
                (None, doc) => cb.on_block_complete(kind, doc.as_ref().map_or(0, |d| d.sections().len())),
            }
        }
        results.push(result);
    }

    // ── Step 4: Merge ────────────────────────────────────────────────────
    let processed = results.iter().filter(|r| r.error.is_none()).count();
    let failed = results.len() - processed;
    if processed == 0 {
        let first_error = results
            .iter()
            .find_map(|r| r.error.as_ref())
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        return Err(Form1004Error::AllBlocksFailed {
            total: results.len(),
            retries: config.max_retries,
            first_error,
        });
    }

    let mut raw = RawBlocks::default();
    for r in &results {
        raw.set(r.kind, r.raw_document());
    }
    let usable: Vec<&ExtractionDocument> = results
        .iter()
        .filter_map(|r| r.document.as_ref())
        .filter(|d| !d.is_upstream_error())
        .collect();
    let unparsed = results
        .iter()
        .filter(|r| r.document.as_ref().is_some_and(ExtractionDocument::is_upstream_error))
        .count();
    if unparsed > 0 {
        warn!("{} block(s) returned a reply that is not JSON", unparsed);
    }
    let merged = ExtractionDocument::merge(usable);

    let stats = ExtractionStats {
        total_pages,
        selected_pages: pages.len(),
        processed_blocks: processed,
        failed_blocks: failed,
        unparsed_blocks: unparsed,
        total_input_tokens: results.iter().map(|r| r.input_tokens as u64).sum(),
        total_output_tokens: results.iter().map(|r| r.output_tokens as u64).sum(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        render_duration_ms,
        llm_duration_ms,
    };

    info!(
        "Extraction complete: {}/{} blocks, {} top-level sections, {}ms total",
        processed,
        results.len(),
        merged.sections().len(),
        stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_complete(results.len(), processed);
    }

    Ok(ExtractionOutput {
        blocks: plan,
        raw,
        merged,
        stats,
        block_results: results,
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

enum BlockFailure {
    /// The whole run must stop (e.g. pdfium could not be bound).
    Fatal(Form1004Error),
    /// Only this block is lost.
    Block(BlockError),
}

/// Render and encode one block's pages.
async fn render_block(
    pdf_path: &Path,
    kind: BlockKind,
    pages: &[usize],
    config: &ExtractionConfig,
) -> Result<Vec<ImageData>, BlockFailure> {
    let rendered = render::render_pages(pdf_path, config, pages)
        .await
        .map_err(|e| match e {
            Form1004Error::CorruptPdf { detail, .. } => BlockFailure::Block(BlockError::RenderFailed {
                block: kind,
                detail,
            }),
            fatal => BlockFailure::Fatal(fatal),
        })?;

    let images: Vec<ImageData> = rendered
        .iter()
        .filter_map(|(page, img)| match encode::encode_page(img) {
            Ok(data) => Some(data),
            Err(e) => {
                warn!("{} block: failed to encode page {}: {}", kind, page, e);
                None
            }
        })
        .collect();

    if images.is_empty() {
        return Err(BlockFailure::Block(BlockError::RenderFailed {
            block: kind,
            detail: format!("no page of {pages:?} could be rendered"),
        }));
    }
    debug!("{} block: {} page images ready", kind, images.len());
    Ok(images)
}

fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, Form1004Error> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Form1004Error::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    honoured even when several API keys are present.
/// 4. **`OPENAI_API_KEY`** with the configured model or [`DEFAULT_MODEL`].
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub async fn resolve_provider(
    config: &ExtractionConfig,
) -> Result<Arc<dyn LLMProvider>, Form1004Error> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_vision_provider(name, config.model_or_default());
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if std::env::var("OPENAI_API_KEY").is_ok_and(|k| !k.is_empty()) {
        return create_vision_provider("openai", config.model_or_default());
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Form1004Error::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY (default model {DEFAULT_MODEL}), ANTHROPIC_API_KEY, \
                or configure a provider.\nError: {e}"
            ),
        })?;

    Ok(llm_provider)
}
