//! # idscan
//!
//! Classify identity-document images and extract their fields with Vision
//! Language Models (VLMs), flagging uncertain readings for manual review.
//!
//! ## Pipeline Overview
//!
//! ```text
//! image (path / URL / bytes)
//!  │
//!  ├─ 1. Input     resolve local file or download from URL, check magic bytes
//!  ├─ 2. Encode    bytes → base64 ImageData (encoded once, shared by both calls)
//!  ├─ 3. Classify  fallback chain of vision models → one of 7 document types
//!  ├─ 4. Route     passport / license → extractor; everything else stops here
//!  ├─ 5. Extract   fallback chain of vision models → per-field value + confidence
//!  └─ 6. Triage    any `unsure` field ⇒ needs_manual_review
//! ```
//!
//! Every model answer is parsed into a closed Rust type; malformed JSON, extra
//! fields or out-of-set values count as that model's failure and the next
//! model in the chain is tried.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use idscan::{process_document, ProcessingConfig, ProcessingOutcome};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = ProcessingConfig::default();
//!     match process_document("passport.jpg", &config).await? {
//!         ProcessingOutcome::Processed { result, needs_manual_review } => {
//!             for (name, field) in result.extracted_data.fields() {
//!                 println!("{name}: {} ({:?})", field.value, field.confidence);
//!             }
//!             println!("needs review: {needs_manual_review}");
//!         }
//!         other => println!("{}", other.summary()),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `idscan` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! idscan = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod process;
pub mod progress;
pub mod prompts;
pub mod schema;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ProcessingConfig, ProcessingConfigBuilder};
pub use error::{ErrorClass, IdScanError, InferenceError, InferenceStage};
pub use output::{
    BatchItem, BatchOutput, BatchStats, ExtractedData, ExtractionRecord, ExtractionResponse,
    ProcessingMetadata, ProcessingOutcome, ProcessingResult,
};
pub use pipeline::llm::{InferenceBackend, ProviderBackend};
pub use process::{
    classify_only, process_batch, process_document, process_from_bytes, process_sync,
    process_to_file, DocumentProcessor,
};
pub use progress::{NoopProgressCallback, ProcessingProgressCallback, ProgressCallback};
pub use schema::{
    ClassificationResult, Confidence, DocumentType, FieldExtraction, LicenseData, PassportData,
};
pub use stream::{process_stream, DocumentStream};
