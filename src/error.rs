//! Error types for the idscan library.
//!
//! Two distinct error types reflect two distinct failure scopes:
//!
//! * [`IdScanError`]: **Fatal** for one pipeline invocation: the input could
//!   not be read, every candidate model failed, or the document landed on a
//!   terminal classification and the caller asked for it as an error via
//!   [`crate::output::ProcessingOutcome::into_result`].
//!
//! * [`InferenceError`]: **Non-fatal**: a single model attempt failed
//!   (transport error, timeout, malformed or schema-violating JSON). The
//!   fallback chain swallows it and moves on to the next model. Transport and
//!   parse failures are deliberately flattened into one shape; the chain only
//!   needs to know that this attempt is unusable.

use crate::schema::DocumentType;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the idscan library.
#[derive(Debug, Error)]
pub enum IdScanError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// The file exists and was read, but is not a supported image.
    #[error("File is not a supported image: '{path}'\nAccepted formats: PNG, JPEG.")]
    NotAnImage { path: PathBuf },

    /// Reading the image bytes failed after the input was resolved.
    #[error("Failed to read image '{path}': {source}")]
    ImageReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Inference errors ──────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Every candidate model of a fallback chain failed.
    ///
    /// Only the last attempt's failure is kept; earlier ones are logged.
    #[error("All {attempts} candidate models failed during {stage}. Last error: {last_error}")]
    FallbackExhausted {
        stage: InferenceStage,
        attempts: usize,
        last_error: String,
    },

    // ── Terminal classifications ──────────────────────────────────────────
    /// The image is not a document, or is too degraded to classify.
    #[error("Document not recognized (classified as {document_type})")]
    DocumentNotRecognized {
        document_type: DocumentType,
        image_analysis: String,
    },

    /// The image is a real document but no extractor exists for its type.
    #[error("Unsupported document type: {document_type}")]
    UnsupportedDocumentType {
        document_type: DocumentType,
        image_analysis: String,
    },

    // ── Catch-all processing failure ──────────────────────────────────────
    /// Unexpected failure during orchestration.
    #[error("Failed to process document: {0}")]
    Processing(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output JSON file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Coarse classification of an [`IdScanError`] for callers that map
/// failures onto response classes (e.g. HTTP status families).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The request itself was invalid or semantically unprocessable.
    ClientError,
    /// The system could not complete a valid request.
    ServerError,
}

impl IdScanError {
    /// Which side of the boundary this failure belongs to.
    pub fn class(&self) -> ErrorClass {
        match self {
            IdScanError::FileNotFound { .. }
            | IdScanError::PermissionDenied { .. }
            | IdScanError::InvalidInput { .. }
            | IdScanError::NotAnImage { .. }
            | IdScanError::DocumentNotRecognized { .. }
            | IdScanError::UnsupportedDocumentType { .. } => ErrorClass::ClientError,
            _ => ErrorClass::ServerError,
        }
    }

    /// Suggested HTTP status code for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            IdScanError::DocumentNotRecognized { .. }
            | IdScanError::UnsupportedDocumentType { .. } => 422,
            IdScanError::FileNotFound { .. }
            | IdScanError::PermissionDenied { .. }
            | IdScanError::InvalidInput { .. }
            | IdScanError::NotAnImage { .. } => 400,
            _ => 500,
        }
    }

    pub fn is_fallback_exhausted(&self) -> bool {
        matches!(self, IdScanError::FallbackExhausted { .. })
    }

    /// The classifier's rationale, when the failure came from a terminal
    /// classification.
    pub fn image_analysis(&self) -> Option<&str> {
        match self {
            IdScanError::DocumentNotRecognized { image_analysis, .. }
            | IdScanError::UnsupportedDocumentType { image_analysis, .. } => {
                Some(image_analysis)
            }
            _ => None,
        }
    }
}

/// Which inference step a fallback chain was serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferenceStage {
    Classification,
    PassportExtraction,
    LicenseExtraction,
}

impl fmt::Display for InferenceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InferenceStage::Classification => "classification",
            InferenceStage::PassportExtraction => "passport extraction",
            InferenceStage::LicenseExtraction => "license extraction",
        })
    }
}

/// A single failed model attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("model '{model}' call failed: {detail}")]
pub struct InferenceError {
    pub model: String,
    pub detail: String,
}

impl InferenceError {
    pub fn new(model: impl Into<String>, detail: impl fmt::Display) -> Self {
        Self {
            model: model.into(),
            detail: detail.to_string(),
        }
    }
}
