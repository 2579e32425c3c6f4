//! CLI binary for idscan.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ProcessingConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use idscan::prompts::describe;
use idscan::{
    classify_only, process_batch, process_to_file, BatchItem, ClassificationResult,
    ProcessingConfig, ProcessingOutcome, ProcessingProgressCallback, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live progress bar plus one log line per
/// document. Documents of a batch complete out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    /// Per-document wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(TICKS),
        );
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed_secs(&self, index: usize) -> f64 {
        self.start_times
            .lock()
            .unwrap()
            .remove(&index)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ProcessingProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} documents  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Scanning");
    }

    fn on_document_start(&self, index: usize, _total: usize, input: &str) {
        self.start_times
            .lock()
            .unwrap()
            .insert(index, Instant::now());
        self.bar.set_message(input.to_string());
    }

    fn on_document_complete(&self, index: usize, total: usize, summary: &str, needs_review: bool) {
        let mark = if needs_review { yellow("⚑") } else { green("✓") };
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            mark,
            index,
            total,
            summary,
            dim(&format!("{:.1}s", self.elapsed_secs(index))),
        ));
        self.bar.inc(1);
    }

    fn on_document_error(&self, index: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);

        let first_line = error.lines().next().unwrap_or_default();
        let msg = if first_line.chars().count() > 80 {
            format!("{}\u{2026}", first_line.chars().take(79).collect::<String>())
        } else {
            first_line.to_string()
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            red("✗"),
            index,
            total,
            red(&msg),
            dim(&format!("{:.1}s", self.elapsed_secs(index))),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total: usize, processed: usize) {
        self.bar.finish_and_clear();
        let failed = self.errors.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {}/{} documents extracted",
                green("✔"),
                bold(&processed.to_string()),
                total
            );
        } else {
            eprintln!(
                "{} {}/{} documents extracted  ({} failed)",
                if failed == total { red("✘") } else { cyan("⚠") },
                bold(&processed.to_string()),
                total,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Classify and extract one image (human summary)
  idscan passport.jpg

  # JSON records, ready for storage
  idscan --json passport.jpg license.png > records.json

  # Write the record for one image to a file
  idscan passport.jpg -o passport.json

  # Only run the classifier
  idscan --classify-only scan.png

  # Custom model chains, most preferred first
  idscan --classification-models gpt-4.1-nano,gpt-4.1-mini \
         --extraction-models gpt-4.1,gpt-4.1-mini passport.jpg

  # Process from URL
  idscan https://example.com/uploads/front.jpg

DOCUMENT TYPES:
  american_passport, american_drivers_license   extracted
  foreign_passport, foreign_drivers_license,
  other_valid_document                          unsupported (no extraction)
  indecipherable, not_a_document                not recognized

  A processed document needs manual review when any field is `unsure`.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  IDSCAN_PROVIDER         Override provider (openai, anthropic, gemini, ollama)
"#;

/// Classify identity-document images and extract their fields using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "idscan",
    version,
    about = "Classify identity documents and extract their fields using Vision LLMs",
    long_about = "Classify identity-document images (local files or URLs) into one of seven \
document types, extract the fields of US passports and US driver's licenses, and flag documents \
whose extraction contains uncertain fields for manual review.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local image paths (PNG/JPEG) or HTTP/HTTPS URLs.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Write the JSON record to this file (single input only).
    #[arg(short, long, env = "IDSCAN_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "IDSCAN_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama."
    )]
    provider: Option<String>,

    /// Comma-separated classification models, most preferred first.
    #[arg(long, env = "IDSCAN_CLASSIFICATION_MODELS", value_delimiter = ',')]
    classification_models: Vec<String>,

    /// Comma-separated models for both extractors, most preferred first.
    #[arg(long, env = "IDSCAN_EXTRACTION_MODELS", value_delimiter = ',')]
    extraction_models: Vec<String>,

    /// Comma-separated passport extraction models (overrides --extraction-models).
    #[arg(long, env = "IDSCAN_PASSPORT_MODELS", value_delimiter = ',')]
    passport_models: Vec<String>,

    /// Comma-separated license extraction models (overrides --extraction-models).
    #[arg(long, env = "IDSCAN_LICENSE_MODELS", value_delimiter = ',')]
    license_models: Vec<String>,

    /// Number of documents processed concurrently.
    #[arg(short, long, env = "IDSCAN_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Max LLM output tokens per answer.
    #[arg(long, env = "IDSCAN_MAX_TOKENS", default_value_t = 1000)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "IDSCAN_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Accept answers where an invisible field has high confidence.
    #[arg(long, env = "IDSCAN_ALLOW_CONTRACT_VIOLATIONS")]
    allow_contract_violations: bool,

    /// Output JSON instead of a human summary.
    #[arg(long, env = "IDSCAN_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "IDSCAN_NO_PROGRESS")]
    no_progress: bool,

    /// Only classify, do not extract fields.
    #[arg(long)]
    classify_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "IDSCAN_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "IDSCAN_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "IDSCAN_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-model-attempt timeout in seconds.
    #[arg(long, env = "IDSCAN_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level library logs.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.classify_only;
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

    if cli.output.is_some() && cli.inputs.len() > 1 {
        anyhow::bail!("--output takes a single input (got {})", cli.inputs.len());
    }

    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ProcessingProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Classify-only mode ───────────────────────────────────────────────
    if cli.classify_only {
        let mut failed = 0;
        for input in &cli.inputs {
            match classify_only(input, &config).await {
                Ok(c) => print_classification(&cli, input, &c)?,
                Err(e) => {
                    failed += 1;
                    eprintln!("{} {}: {}", red("✗"), input, e);
                }
            }
        }
        if failed > 0 {
            anyhow::bail!("{failed} of {} documents failed", cli.inputs.len());
        }
        return Ok(());
    }

    // ── Single input to file ─────────────────────────────────────────────
    if let Some(ref output_path) = cli.output {
        let outcome = process_to_file(&cli.inputs[0], output_path, &config)
            .await
            .context("Processing failed")?;
        if !cli.quiet {
            eprintln!(
                "{}  {}  →  {}",
                outcome_mark(&outcome),
                outcome.summary(),
                bold(&output_path.display().to_string()),
            );
        }
        return Ok(());
    }

    // ── Batch ────────────────────────────────────────────────────────────
    let output = process_batch(cli.inputs.iter().cloned(), &config)
        .await
        .context("Processing failed")?;

    if cli.json {
        let values = output
            .items
            .iter()
            .map(item_json)
            .collect::<Result<Vec<_>>>()?;
        let json = if values.len() == 1 {
            serde_json::to_string_pretty(&values[0])
        } else {
            serde_json::to_string_pretty(&values)
        }
        .context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        for item in &output.items {
            print_item(item);
        }
    }

    if !cli.quiet && !show_progress {
        let s = &output.stats;
        eprintln!(
            "{} processed, {} flagged, {} not recognized, {} unsupported, {} failed in {}ms",
            s.processed, s.flagged_for_review, s.not_recognized, s.unsupported, s.failed, s.duration_ms
        );
    }

    if output.stats.failed > 0 {
        anyhow::bail!(
            "{} of {} documents failed",
            output.stats.failed,
            output.stats.total
        );
    }
    Ok(())
}

/// Map CLI args to `ProcessingConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ProcessingConfig> {
    let mut builder = ProcessingConfig::builder()
        .concurrency(cli.concurrency)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .enforce_visibility_contract(!cli.allow_contract_violations)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref name) = cli.provider {
        builder = builder.provider_name(name);
    }
    if !cli.classification_models.is_empty() {
        builder = builder.classification_models(cli.classification_models.iter().cloned());
    }
    if !cli.extraction_models.is_empty() {
        builder = builder.extraction_models(cli.extraction_models.iter().cloned());
    }
    if !cli.passport_models.is_empty() {
        builder = builder.passport_models(cli.passport_models.iter().cloned());
    }
    if !cli.license_models.is_empty() {
        builder = builder.license_models(cli.license_models.iter().cloned());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

fn outcome_mark(outcome: &ProcessingOutcome) -> String {
    match outcome {
        ProcessingOutcome::Processed { .. } if outcome.needs_manual_review() => yellow("⚑"),
        ProcessingOutcome::Processed { .. } => green("✔"),
        _ => cyan("◆"),
    }
}

/// JSON for one batch item: the record, the tagged outcome, or the error.
fn item_json(item: &BatchItem) -> Result<serde_json::Value> {
    let value = match &item.outcome {
        Ok(outcome) => {
            let value = match outcome.to_record() {
                Some(record) => serde_json::to_value(record),
                None => serde_json::to_value(outcome),
            };
            value.context("Failed to serialise outcome")?
        }
        Err(e) => serde_json::json!({
            "status": "error",
            "status_code": e.status_code(),
            "error": e.to_string(),
        }),
    };
    Ok(serde_json::json!({ "input": item.input, "result": value }))
}

fn print_item(item: &BatchItem) {
    println!("{}", bold(&item.input));
    match &item.outcome {
        Ok(outcome) => {
            println!(
                "  {} {}  {}",
                outcome_mark(outcome),
                describe(outcome.document_type()),
                dim(&outcome.summary())
            );
            match outcome.result() {
                Some(result) => {
                    for (name, field) in result.extracted_data.fields() {
                        let value = if field.visible {
                            field.value.clone()
                        } else {
                            dim("(not visible)")
                        };
                        let line = format!("    {name:<16} {value}");
                        if field.is_unsure() {
                            println!("{}", yellow(&format!("{line}  [unsure]")));
                        } else {
                            println!("{line}");
                        }
                    }
                }
                None => println!("    {}", dim(&outcome.classification().image_analysis)),
            }
        }
        Err(e) => println!("  {} {}", red("✗"), e),
    }
}

fn print_classification(cli: &Cli, input: &str, c: &ClassificationResult) -> Result<()> {
    if cli.json {
        let json = serde_json::to_string_pretty(&serde_json::json!({
            "input": input,
            "classification": c,
        }))
        .context("Failed to serialise classification")?;
        println!("{json}");
    } else {
        println!("File:      {}", input);
        println!(
            "Type:      {} ({})",
            describe(c.document_type),
            c.document_type
        );
        println!("Analysis:  {}", c.image_analysis);
    }
    Ok(())
}
