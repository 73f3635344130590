//! CLI binary for edgequake-form1004.
//!
//! A thin shim over the library crate: `extract` maps flags to
//! `ExtractionConfig`, `fill` and `columns` map them to `FillConfig`.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_form1004::{
    describe_columns, extract, extract_to_file, fill_template, workbook, BlockKind,
    ExtractionConfig, ExtractionOutput, ExtractionProgressCallback, FillConfig, HeaderLayout,
    PageSelection, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One spinner for the whole run; a log line per finished block.
struct CliProgressCallback {
    bar: ProgressBar,
    block_start: std::sync::Mutex<Option<Instant>>,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            block_start: std::sync::Mutex::new(None),
        })
    }

    fn block_elapsed(&self) -> String {
        let secs = self
            .block_start
            .lock()
            .ok()
            .and_then(|mut t| t.take())
            .map_or(0.0, |t| t.elapsed().as_secs_f64());
        dim(&format!("{secs:.1}s"))
    }
}

impl ExtractionProgressCallback for CliProgressCallback {
    fn on_extraction_start(&self, total_blocks: usize) {
        self.bar.set_prefix("Extracting");
        self.bar.println(bold(&format!("◆ Extracting {total_blocks} page blocks…")));
    }

    fn on_block_start(&self, block: BlockKind, pages: &[usize]) {
        if let Ok(mut t) = self.block_start.lock() {
            *t = Some(Instant::now());
        }
        self.bar.set_message(format!("{block} block, pages {pages:?}"));
    }

    fn on_block_complete(&self, block: BlockKind, sections: usize) {
        let status = if sections == 0 {
            red("no JSON in reply")
        } else {
            dim(&format!("{sections} sections"))
        };
        self.bar.println(format!(
            "  {} {:<8} {}  {}",
            green("✓"),
            block.name(),
            status,
            self.block_elapsed()
        ));
    }

    fn on_block_error(&self, block: BlockKind, error: &str) {
        let msg = if error.chars().count() > 80 {
            format!("{}…", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {:<8} {}  {}",
            red("✗"),
            block.name(),
            red(&msg),
            self.block_elapsed()
        ));
    }

    fn on_extraction_complete(&self, total_blocks: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = total_blocks.saturating_sub(success_count);
        if failed == 0 {
            eprintln!("{} {} blocks extracted", green("✔"), bold(&success_count.to_string()));
        } else {
            eprintln!(
                "{} {}/{} blocks extracted  ({} failed)",
                red("⚠"),
                success_count,
                total_blocks,
                red(&failed.to_string())
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract pages 2-8 (the default) to a results file
  form1004 extract appraisal.pdf -o appraisal.json

  # Custom page blocks: first → subject, last → cost, rest → sales
  form1004 extract appraisal.pdf --pages 2-5,8 -o appraisal.json

  # Append one row to a template, saving the result as a workbook
  form1004 fill --template log.xlsx --json appraisal.json -o log-filled.xlsx

  # ... or as CSV
  form1004 fill --template log.csv --json appraisal.json -o log-filled.csv

  # Show how each template column was understood
  form1004 columns --template log.xlsx

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         libpdfium file or directory; system library otherwise
"#;

/// Extract Form 1004 appraisal fields with Vision LLMs and fill spreadsheet templates.
#[derive(Parser, Debug)]
#[command(
    name = "form1004",
    version,
    about = "Extract Form 1004 appraisal fields with Vision LLMs and fill spreadsheet templates",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "FORM1004_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "FORM1004_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract fields from a PDF (path or URL) into a JSON results file.
    Extract(ExtractArgs),
    /// Append one record row to a template from an extraction JSON file.
    Fill(FillArgs),
    /// Print the (section, field) each template column maps to.
    Columns(ColumnsArgs),
}

#[derive(Args, Debug)]
struct ExtractArgs {
    /// Local PDF file path or HTTP/HTTPS URL.
    input: String,

    /// Write the results JSON to this file instead of stdout.
    #[arg(short, long, env = "FORM1004_OUTPUT")]
    output: Option<PathBuf>,

    /// Page selection: all, 5, 2-8, 2-5,8.
    #[arg(long, env = "FORM1004_PAGES", default_value = "2-8")]
    pages: String,

    /// LLM model ID. Default: gpt-4.1-mini.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Rendering DPI (72–400).
    #[arg(long, env = "FORM1004_DPI", default_value_t = 250,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "FORM1004_PASSWORD")]
    password: Option<String>,

    /// Max LLM output tokens per block.
    #[arg(long, env = "FORM1004_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "FORM1004_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Retries per block on LLM failure.
    #[arg(long, env = "FORM1004_MAX_RETRIES", default_value_t = 0)]
    max_retries: u32,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "FORM1004_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-block LLM call timeout in seconds.
    #[arg(long, env = "FORM1004_API_TIMEOUT", default_value_t = 180)]
    api_timeout: u64,

    /// Disable the progress spinner.
    #[arg(long, env = "FORM1004_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Args, Debug)]
struct TemplateArgs {
    /// Template workbook (.xlsx, .xlsm, .xlsb, .xls, .ods) or .csv file.
    #[arg(short, long, env = "FORM1004_TEMPLATE")]
    template: PathBuf,

    /// Worksheet name. Default: the first sheet.
    #[arg(long, env = "FORM1004_SHEET")]
    sheet: Option<String>,

    /// Row holding section labels.
    #[arg(long, default_value_t = 2)]
    section_row: usize,

    /// Row holding field labels.
    #[arg(long, default_value_t = 3)]
    field_row: usize,

    /// First row a record may be written to.
    #[arg(long, default_value_t = 4)]
    first_data_row: usize,
}

impl TemplateArgs {
    fn layout(&self) -> HeaderLayout {
        HeaderLayout {
            section_row: self.section_row,
            field_row: self.field_row,
            first_data_row: self.first_data_row,
        }
    }
}

#[derive(Args, Debug)]
struct FillArgs {
    #[command(flatten)]
    template: TemplateArgs,

    /// Extraction JSON: a results file from `extract` or a bare document.
    #[arg(short, long, env = "FORM1004_JSON")]
    json: PathBuf,

    /// Where to write the filled sheet (.xlsx or .csv).
    #[arg(short, long)]
    output: PathBuf,

    /// Fill this row instead of the next empty one.
    #[arg(long)]
    row: Option<usize>,
}

#[derive(Args, Debug)]
struct ColumnsArgs {
    #[command(flatten)]
    template: TemplateArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = matches!(&cli.command, Command::Extract(a) if !a.no_progress) && !cli.quiet;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match &cli.command {
        Command::Extract(args) => run_extract(args, show_progress, cli.quiet).await,
        Command::Fill(args) => run_fill(args, cli.quiet),
        Command::Columns(args) => run_columns(args),
    }
}

async fn run_extract(args: &ExtractArgs, show_progress: bool, quiet: bool) -> Result<()> {
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ExtractionProgressCallback>)
    } else {
        None
    };
    let config = build_config(args, progress_cb)?;

    let output: ExtractionOutput = match &args.output {
        Some(path) => extract_to_file(&args.input, path, &config)
            .await
            .context("Extraction failed")?,
        None => {
            let output = extract(&args.input, &config).await.context("Extraction failed")?;
            println!(
                "{}",
                output.to_json_pretty().context("Failed to serialise output")?
            );
            output
        }
    };

    if !quiet {
        let stats = &output.stats;
        eprintln!(
            "   {} sections merged  {}  {} tokens in / {} tokens out  {}ms",
            output.merged.sections().len(),
            args.output
                .as_ref()
                .map(|p| format!("→ {}", bold(&p.display().to_string())))
                .unwrap_or_default(),
            dim(&stats.total_input_tokens.to_string()),
            dim(&stats.total_output_tokens.to_string()),
            stats.total_duration_ms,
        );
    }
    Ok(())
}

fn run_fill(args: &FillArgs, quiet: bool) -> Result<()> {
    let config = FillConfig {
        layout: args.template.layout(),
        sheet: args.template.sheet.clone(),
        target_row: args.row,
    };
    let report = fill_template(&args.json, &args.template.template, &args.output, &config)
        .context("Fill failed")?;

    if !quiet {
        eprintln!(
            "{} row {}: {} cells filled  {}",
            if report.filled > 0 { green("✔") } else { red("⚠") },
            report.row,
            bold(&report.filled.to_string()),
            dim(&format!(
                "({} mapped, {} occupied, {} without a value) → {}",
                report.mapped_columns,
                report.occupied,
                report.missing,
                args.output.display()
            )),
        );
    }
    Ok(())
}

fn run_columns(args: &ColumnsArgs) -> Result<()> {
    let grid = workbook::load_template(&args.template.template, args.template.sheet.as_deref())
        .context("Failed to load template")?;
    let columns = describe_columns(&grid, &args.template.layout())
        .context("Template headers could not be read")?;
    for c in columns {
        println!(
            "{:>4}  {:<24}  {}",
            c.column,
            if c.section.is_empty() { "-" } else { c.section.as_str() },
            if c.field.is_empty() { "-" } else { c.field.as_str() },
        );
    }
    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(args: &ExtractArgs, progress: Option<ProgressCallback>) -> Result<ExtractionConfig> {
    let pages: PageSelection = args
        .pages
        .parse()
        .with_context(|| format!("Invalid --pages '{}'", args.pages))?;

    let mut builder = ExtractionConfig::builder()
        .dpi(args.dpi)
        .pages(pages)
        .max_tokens(args.max_tokens)
        .temperature(args.temperature)
        .max_retries(args.max_retries)
        .download_timeout_secs(args.download_timeout)
        .api_timeout_secs(args.api_timeout);

    if let Some(ref model) = args.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref password) = args.password {
        builder = builder.password(password);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
