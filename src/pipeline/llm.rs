//! VLM interaction: one chat request per page block.
//!
//! The request is a fixed system message followed by a single user turn
//! carrying the block's prompt and all of its page images, so the model sees
//! a multi-page sales grid at once. Prompt text lives in [`crate::prompts`].
//!
//! ## Retry Strategy
//!
//! `max_retries` defaults to 0. When raised, failed calls back off
//! exponentially (`retry_backoff_ms * 2^attempt`). Each attempt is bounded by
//! `api_timeout_secs`.

use super::blocks::BlockKind;
use super::parse::document_from_model_output;
use crate::config::ExtractionConfig;
use crate::error::BlockError;
use crate::output::BlockResult;
use crate::prompts::SYSTEM_PROMPT;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Send one block to the VLM and parse the reply.
///
/// Never returns an error: a failed call is recorded in `result.error` and a
/// reply that is not JSON becomes the error-shaped document.
pub async fn process_block(
    provider: &Arc<dyn LLMProvider>,
    kind: BlockKind,
    pages: &[usize],
    images: Vec<ImageData>,
    config: &ExtractionConfig,
) -> BlockResult {
    let start = Instant::now();
    let messages = vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user_with_images(kind.prompt(), images),
    ];
    let options = build_options(config);
    let call_timeout = Duration::from_secs(config.api_timeout_secs);

    let mut last_err: Option<BlockError> = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "{} block: retry {}/{} after {}ms",
                kind, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match timeout(call_timeout, provider.chat(&messages, Some(&options))).await {
            Ok(Ok(response)) => {
                let duration = start.elapsed();
                debug!(
                    "{} block: {} input tokens, {} output tokens, {:?}",
                    kind, response.prompt_tokens, response.completion_tokens, duration
                );
                return BlockResult {
                    kind,
                    pages: pages.to_vec(),
                    document: Some(document_from_model_output(&response.content)),
                    input_tokens: response.prompt_tokens,
                    output_tokens: response.completion_tokens,
                    duration_ms: duration.as_millis() as u64,
                    retries: attempt,
                    error: None,
                };
            }
            Ok(Err(e)) => {
                warn!("{} block: attempt {} failed: {}", kind, attempt + 1, e);
                last_err = Some(BlockError::LlmFailed {
                    block: kind,
                    retries: config.max_retries,
                    detail: e.to_string(),
                });
            }
            Err(_) => {
                warn!(
                    "{} block: attempt {} timed out after {}s",
                    kind,
                    attempt + 1,
                    config.api_timeout_secs
                );
                last_err = Some(BlockError::Timeout {
                    block: kind,
                    secs: config.api_timeout_secs,
                });
            }
        }
    }

    let error = last_err.unwrap_or_else(|| BlockError::LlmFailed {
        block: kind,
        retries: config.max_retries,
        detail: "Unknown error".to_string(),
    });
    BlockResult::failed(
        kind,
        pages,
        start.elapsed().as_millis() as u64,
        config.max_retries,
        error,
    )
}

fn build_options(config: &ExtractionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_defaults() {
        let opts = build_options(&ExtractionConfig::default());
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.max_tokens, Some(4096));
    }
}
