//! Configuration types for extraction and template filling.
//!
//! Extraction behaviour is controlled through [`ExtractionConfig`], built via
//! its [`ExtractionConfigBuilder`]. Filling is controlled through
//! [`FillConfig`], whose [`HeaderLayout`] says where the template keeps its
//! two header rows.

use crate::error::Form1004Error;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Model used when neither the config nor the environment names one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Configuration for a PDF → extraction-document run.
///
/// # Example
/// ```rust
/// use edgequake_form1004::{ExtractionConfig, PageSelection};
///
/// let config = ExtractionConfig::builder()
///     .dpi(200)
///     .pages("2-5,8".parse::<PageSelection>().unwrap())
///     .model("gpt-4.1-mini")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Rendering DPI used when rasterising each PDF page. Range: 72–400. Default: 250.
    ///
    /// Form 1004 pages are dense with small checkbox labels; 250 DPI keeps
    /// them legible to the VLM.
    pub dpi: u32,

    /// Maximum rendered image dimension (width or height) in pixels. Default: 3000.
    pub max_rendered_pixels: u32,

    /// LLM model identifier. If None, uses [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per block. Default: 4096.
    pub max_tokens: usize,

    /// Retries per block on a failed VLM call. Default: 0 (one call per block).
    pub max_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Page selection. Default: pages 2–8, where a Form 1004 report usually
    /// keeps the subject, sales comparison and cost pages.
    pub pages: PageSelection,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-VLM-call timeout in seconds. Default: 180.
    pub api_timeout_secs: u64,

    /// Optional per-block progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            dpi: 250,
            max_rendered_pixels: 3000,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 4096,
            max_retries: 0,
            retry_backoff_ms: 500,
            password: None,
            pages: PageSelection::Range(2, 8),
            download_timeout_secs: 120,
            api_timeout_secs: 180,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("pages", &self.pages)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Model to request, falling back to [`DEFAULT_MODEL`].
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, Form1004Error> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(Form1004Error::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(Form1004Error::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        if let PageSelection::Range(start, end) = c.pages {
            if start == 0 || start > end {
                return Err(Form1004Error::InvalidConfig(format!(
                    "Invalid page range {start}-{end}"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Page selection ───────────────────────────────────────────────────────

/// Specifies which pages of the PDF to extract from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageSelection {
    /// Every page of the document.
    #[default]
    All,
    /// A single page (1-indexed).
    Single(usize),
    /// A contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Specific pages (1-indexed, deduplicated on use).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into sorted, deduplicated 1-indexed page numbers
    /// that exist in a document of `total_pages` pages.
    pub fn to_pages(&self, total_pages: usize) -> Vec<usize> {
        let in_range = |p: &usize| *p >= 1 && *p <= total_pages;
        let mut pages: Vec<usize> = match self {
            PageSelection::All => (1..=total_pages).collect(),
            PageSelection::Single(p) => Some(*p).into_iter().filter(in_range).collect(),
            PageSelection::Range(start, end) => (*start..=*end).filter(in_range).collect(),
            PageSelection::Set(pages) => pages.iter().copied().filter(in_range).collect(),
        };
        pages.sort_unstable();
        pages.dedup();
        pages
    }
}

impl FromStr for PageSelection {
    type Err = Form1004Error;

    /// Parse `all`, `5`, `2-8`, or a comma/whitespace separated mix such as
    /// `2-5,8` or `1 3 5`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        if s == "all" {
            return Ok(PageSelection::All);
        }

        let parts: Vec<&str> = s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|p| !p.is_empty())
            .collect();
        if parts.is_empty() {
            return Err(Form1004Error::InvalidConfig("Empty page selection".into()));
        }

        let mut ranges = Vec::with_capacity(parts.len());
        for part in &parts {
            ranges.push(parse_page_part(part)?);
        }

        match ranges.as_slice() {
            [(a, b)] if a == b => Ok(PageSelection::Single(*a)),
            [(a, b)] => Ok(PageSelection::Range(*a, *b)),
            _ => Ok(PageSelection::Set(
                ranges.into_iter().flat_map(|(a, b)| a..=b).collect(),
            )),
        }
    }
}

/// One `N` or `A-B` token → inclusive range.
fn parse_page_part(part: &str) -> Result<(usize, usize), Form1004Error> {
    let parse = |t: &str| {
        t.trim()
            .parse::<usize>()
            .map_err(|_| Form1004Error::InvalidConfig(format!("Invalid page number: '{}'", t.trim())))
    };
    let (start, end) = match part.split_once('-') {
        Some((a, b)) => (parse(a)?, parse(b)?),
        None => {
            let p = parse(part)?;
            (p, p)
        }
    };
    if start < 1 {
        return Err(Form1004Error::InvalidConfig(format!(
            "Pages are 1-indexed, minimum is 1 (got {start})"
        )));
    }
    if start > end {
        return Err(Form1004Error::InvalidConfig(format!(
            "Invalid page range '{start}-{end}': start must be <= end"
        )));
    }
    Ok((start, end))
}

// ── Fill configuration ───────────────────────────────────────────────────

/// Where the template keeps its header rows (1-based worksheet rows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderLayout {
    /// Row holding section labels ("SUBJECT", "Comparable Sale #1", …). Default: 2.
    pub section_row: usize,
    /// Row holding field labels ("State", "GLA", …). Default: 3.
    pub field_row: usize,
    /// Lowest row a new record may be written to. Default: 4.
    pub first_data_row: usize,
}

impl Default for HeaderLayout {
    fn default() -> Self {
        Self {
            section_row: 2,
            field_row: 3,
            first_data_row: 4,
        }
    }
}

impl HeaderLayout {
    pub fn validate(&self) -> Result<(), Form1004Error> {
        if self.section_row == 0 || self.field_row == 0 {
            return Err(Form1004Error::InvalidConfig(
                "Header rows are 1-indexed".into(),
            ));
        }
        if self.section_row == self.field_row {
            return Err(Form1004Error::InvalidConfig(format!(
                "Section and field headers cannot share row {}",
                self.field_row
            )));
        }
        if self.first_data_row <= self.section_row.max(self.field_row) {
            return Err(Form1004Error::InvalidConfig(format!(
                "First data row {} must come after the header rows",
                self.first_data_row
            )));
        }
        Ok(())
    }
}

/// Configuration for a fill run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillConfig {
    pub layout: HeaderLayout,
    /// Worksheet to fill. Default: the first sheet of the workbook.
    pub sheet: Option<String>,
    /// Row to fill. Default: the row after the last populated row.
    pub target_row: Option<usize>,
}

impl FillConfig {
    pub fn validate(&self) -> Result<(), Form1004Error> {
        self.layout.validate()?;
        if let Some(row) = self.target_row {
            if row < self.layout.first_data_row {
                return Err(Form1004Error::InvalidConfig(format!(
                    "Target row {row} is inside the header rows (first data row is {})",
                    self.layout.first_data_row
                )));
            }
        }
        Ok(())
    }
}
