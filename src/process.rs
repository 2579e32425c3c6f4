//! Processing entry points and the per-document orchestrator.
//!
//! One invocation is a linear state machine, always run strictly in order:
//!
//! ```text
//! Start ─▶ Classified ─┬─▶ NotRecognized          (indecipherable / not_a_document)
//!                      ├─▶ Unsupported            (no extractor for the type)
//!                      └─▶ Extracted ─▶ Triaged ─▶ Processed
//! ```
//!
//! Each invocation owns its own state, so any number of them may run
//! concurrently against the same [`DocumentProcessor`]. [`process_batch`]
//! does exactly that, with a concurrency bound.

use crate::config::ProcessingConfig;
use crate::error::IdScanError;
use crate::output::{BatchItem, BatchOutput, BatchStats, ProcessingOutcome, ProcessingResult};
use crate::pipeline::classify::classify_document;
use crate::pipeline::encode::encode_image;
use crate::pipeline::extract::{extract_fields, route, Route};
use crate::pipeline::input;
use crate::pipeline::llm::{InferenceBackend, ProviderBackend};
use crate::schema::ClassificationResult;
use edgequake_llm::ImageData;
use futures::stream::{self, StreamExt};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Runs documents through classify → route → extract → triage.
///
/// Holds only shared, read-only state: the inference backend and the
/// configuration. Cheap to clone.
#[derive(Clone)]
pub struct DocumentProcessor {
    backend: Arc<dyn InferenceBackend>,
    config: ProcessingConfig,
}

impl std::fmt::Debug for DocumentProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentProcessor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DocumentProcessor {
    pub fn new(backend: Arc<dyn InferenceBackend>, config: ProcessingConfig) -> Self {
        Self { backend, config }
    }

    /// Use `config.backend` if set, otherwise build a provider-backed one.
    pub fn from_config(config: &ProcessingConfig) -> Result<Self, IdScanError> {
        let backend = resolve_backend(config)?;
        Ok(Self::new(backend, config.clone()))
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// Process a local path or HTTP/HTTPS URL.
    pub async fn process(&self, input_str: &str) -> Result<ProcessingOutcome, IdScanError> {
        let resolved = input::resolve_input(input_str, self.config.download_timeout_secs).await?;
        self.process_path(resolved.path()).await
    }

    /// Process an image already on local disk.
    pub async fn process_path(&self, path: &Path) -> Result<ProcessingOutcome, IdScanError> {
        let image = encode_image(path).await?;
        self.process_image(image).await
    }

    /// Run the state machine on an encoded image.
    ///
    /// The image is encoded once by the caller and shared by both the
    /// classification and the extraction request.
    pub async fn process_image(&self, image: ImageData) -> Result<ProcessingOutcome, IdScanError> {
        let start = Instant::now();
        debug!("Encoded image: {} base64 bytes", image.data.len());

        // ── Classified ───────────────────────────────────────────────────
        let classification =
            classify_document(self.backend.as_ref(), image.clone(), &self.config).await?;

        // ── Route ────────────────────────────────────────────────────────
        let kind = match route(classification.document_type) {
            Route::Unrecognized => {
                info!(
                    "Document not recognized ({}): {}",
                    classification.document_type, classification.image_analysis
                );
                return Ok(ProcessingOutcome::NotRecognized(classification));
            }
            Route::Unsupported => {
                info!(
                    "No extractor for {}: {}",
                    classification.document_type, classification.image_analysis
                );
                return Ok(ProcessingOutcome::Unsupported(classification));
            }
            Route::Extract(kind) => kind,
        };

        // ── Extracted ────────────────────────────────────────────────────
        let extraction = extract_fields(self.backend.as_ref(), kind, image, &self.config).await?;

        // ── Triaged ──────────────────────────────────────────────────────
        let outcome = ProcessingOutcome::processed(ProcessingResult::new(classification, extraction));
        info!(
            "Processed in {}ms: {}",
            start.elapsed().as_millis(),
            outcome.summary()
        );
        Ok(outcome)
    }

    /// Run only the classification step.
    pub async fn classify(&self, input_str: &str) -> Result<ClassificationResult, IdScanError> {
        let resolved = input::resolve_input(input_str, self.config.download_timeout_secs).await?;
        let image = encode_image(resolved.path()).await?;
        classify_document(self.backend.as_ref(), image, &self.config).await
    }
}

/// Process one identity-document image from a path or URL.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// `Ok(ProcessingOutcome)` for every expected outcome, including documents
/// that are not recognized or have no extractor.
///
/// # Errors
/// Returns `Err(IdScanError)` only for fatal errors:
/// - File not found / not an image / download failure
/// - No provider configured
/// - Every candidate model of a step failed
pub async fn process_document(
    input_str: impl AsRef<str>,
    config: &ProcessingConfig,
) -> Result<ProcessingOutcome, IdScanError> {
    let input_str = input_str.as_ref();
    info!("Starting processing: {}", input_str);

    // Resolve input before the backend so a bad path fails without
    // touching provider configuration.
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let processor = DocumentProcessor::from_config(config)?;
    processor.process_path(resolved.path()).await
}

/// Synchronous wrapper around [`process_document`].
///
/// Creates a temporary tokio runtime internally.
pub fn process_sync(
    input_str: impl AsRef<str>,
    config: &ProcessingConfig,
) -> Result<ProcessingOutcome, IdScanError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| IdScanError::Processing(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(process_document(input_str, config))
}

/// Process image bytes held in memory.
///
/// The bytes are spooled to a managed [`tempfile`] that is deleted when this
/// call returns. Non-image bytes are rejected before any model is called.
///
/// # Example
/// ```rust,no_run
/// use idscan::{process_from_bytes, ProcessingConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("passport.jpg")?;
/// let outcome = process_from_bytes(&bytes, &ProcessingConfig::default()).await?;
/// println!("needs review: {}", outcome.needs_manual_review());
/// # Ok(())
/// # }
/// ```
pub async fn process_from_bytes(
    bytes: &[u8],
    config: &ProcessingConfig,
) -> Result<ProcessingOutcome, IdScanError> {
    let mut tmp = tempfile::NamedTempFile::new()
        .map_err(|e| IdScanError::Processing(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| IdScanError::Processing(format!("tempfile write: {e}")))?;
    let path = tmp.path().to_string_lossy().to_string();
    // `tmp` is dropped (and the file deleted) when `process_document` returns
    process_document(&path, config).await
}

/// Process a document and write its JSON record to `output_path`.
///
/// Processed documents are written as an [`crate::output::ExtractionRecord`];
/// terminal outcomes are written as the tagged outcome so the analysis is
/// kept. Uses atomic write (temp file + rename) to prevent partial files.
pub async fn process_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ProcessingConfig,
) -> Result<ProcessingOutcome, IdScanError> {
    let outcome = process_document(input_str, config).await?;
    let path = output_path.as_ref();

    let json = match outcome.to_record() {
        Some(record) => serde_json::to_vec_pretty(&record),
        None => serde_json::to_vec_pretty(&outcome),
    }
    .map_err(|e| IdScanError::Processing(format!("serialise record: {e}")))?;

    let write_err = |e| IdScanError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, &json).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

    Ok(outcome)
}

/// Classify a document without extracting fields.
pub async fn classify_only(
    input_str: impl AsRef<str>,
    config: &ProcessingConfig,
) -> Result<ClassificationResult, IdScanError> {
    DocumentProcessor::from_config(config)?
        .classify(input_str.as_ref())
        .await
}

/// Process many documents as independent invocations.
///
/// Up to `config.concurrency` documents are in flight at once. A fatal error
/// for one input is recorded in its [`BatchItem`] and does not affect the
/// others. Items are returned in input order.
///
/// # Errors
/// Only backend construction fails the whole batch.
pub async fn process_batch<I, S>(
    inputs: I,
    config: &ProcessingConfig,
) -> Result<BatchOutput, IdScanError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let start = Instant::now();
    let processor = DocumentProcessor::from_config(config)?;
    let inputs: Vec<String> = inputs.into_iter().map(Into::into).collect();
    let total = inputs.len();

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let mut items: Vec<BatchItem> = stream::iter(inputs.into_iter().enumerate())
        .map(|(i, input_str)| run_item(&processor, i + 1, total, input_str))
        .buffer_unordered(config.concurrency)
        .collect()
        .await;

    items.sort_by_key(|item| item.index);

    let stats = BatchStats::from_items(&items, start.elapsed().as_millis() as u64);
    info!(
        "Batch complete: {}/{} processed, {} flagged for review, {} failed",
        stats.processed, stats.total, stats.flagged_for_review, stats.failed
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, stats.processed);
    }

    Ok(BatchOutput { items, stats })
}

/// Process one batch input, reporting progress around it.
pub(crate) async fn run_item(
    processor: &DocumentProcessor,
    index: usize,
    total: usize,
    input_str: String,
) -> BatchItem {
    let cb = processor.config.progress_callback.as_ref();
    if let Some(cb) = cb {
        cb.on_document_start(index, total, &input_str);
    }

    // A panic inside one invocation fails only that document.
    let task = {
        let processor = processor.clone();
        let input_str = input_str.clone();
        tokio::spawn(async move { processor.process(&input_str).await })
    };
    let outcome = match task.await {
        Ok(outcome) => outcome,
        Err(e) => Err(IdScanError::Processing(format!("document task failed: {e}"))),
    };

    if let Some(cb) = cb {
        match &outcome {
            Ok(o) => cb.on_document_complete(index, total, &o.summary(), o.needs_manual_review()),
            Err(e) => cb.on_document_error(index, total, &e.to_string()),
        }
    }

    BatchItem {
        index,
        input: input_str,
        outcome,
    }
}

/// Pick the inference backend: injected first, then provider-backed.
pub(crate) fn resolve_backend(
    config: &ProcessingConfig,
) -> Result<Arc<dyn InferenceBackend>, IdScanError> {
    match config.backend {
        Some(ref backend) => Ok(Arc::clone(backend)),
        None => Ok(Arc::new(ProviderBackend::from_config(config)?)),
    }
}
