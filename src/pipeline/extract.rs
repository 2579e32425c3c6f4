//! Field extraction, one extractor per supported document type.
//!
//! Extractor selection goes through an explicit table from
//! [`DocumentType`] to [`Route`]; only two types currently have an extractor.
//! Each extractor is the classifier pattern with a different instruction,
//! schema and model chain. Extracted values are passed through exactly as
//! the model returned them.

use crate::config::ProcessingConfig;
use crate::error::{IdScanError, InferenceStage};
use crate::output::ExtractionResponse;
use crate::pipeline::fallback::query_with_fallbacks;
use crate::pipeline::llm::{InferenceBackend, StructuredRequest};
use crate::prompts::{license_system_prompt, passport_system_prompt, LICENSE_TASK, PASSPORT_TASK};
use crate::schema::{DocumentType, LicenseResponse, PassportResponse};
use edgequake_llm::ImageData;
use tokio::time::Duration;
use tracing::info;

/// The extractors the pipeline knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorKind {
    Passport,
    License,
}

impl ExtractorKind {
    pub fn stage(self) -> InferenceStage {
        match self {
            ExtractorKind::Passport => InferenceStage::PassportExtraction,
            ExtractorKind::License => InferenceStage::LicenseExtraction,
        }
    }

    /// The ordered model chain configured for this extractor.
    pub fn models(self, config: &ProcessingConfig) -> &[String] {
        match self {
            ExtractorKind::Passport => &config.passport_models,
            ExtractorKind::License => &config.license_models,
        }
    }
}

/// Where a classified document goes next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Not a document, or too degraded to classify.
    Unrecognized,
    /// A real document with no registered extractor.
    Unsupported,
    /// Run this extractor.
    Extract(ExtractorKind),
}

/// Registered extractors by document type.
const EXTRACTORS: [(DocumentType, ExtractorKind); 2] = [
    (DocumentType::AmericanPassport, ExtractorKind::Passport),
    (DocumentType::AmericanDriversLicense, ExtractorKind::License),
];

/// Classifications that mean "no usable document".
const UNRECOGNIZED: [DocumentType; 2] = [DocumentType::Indecipherable, DocumentType::NotADocument];

/// Look up the route for a classified document type.
pub fn route(document_type: DocumentType) -> Route {
    if UNRECOGNIZED.contains(&document_type) {
        return Route::Unrecognized;
    }
    EXTRACTORS
        .iter()
        .find(|(ty, _)| *ty == document_type)
        .map_or(Route::Unsupported, |(_, kind)| Route::Extract(*kind))
}

/// Run the selected extractor against the encoded image.
pub async fn extract_fields(
    backend: &dyn InferenceBackend,
    kind: ExtractorKind,
    image: ImageData,
    config: &ProcessingConfig,
) -> Result<ExtractionResponse, IdScanError> {
    let timeout = Duration::from_secs(config.api_timeout_secs);
    let stage = kind.stage();
    let models = kind.models(config);

    let response = match kind {
        ExtractorKind::Passport => {
            let request = StructuredRequest::<PassportResponse>::new(
                &passport_system_prompt(),
                PASSPORT_TASK,
                Some(image),
                config,
            );
            ExtractionResponse::Passport(
                query_with_fallbacks(backend, stage, models, &request, timeout).await?,
            )
        }
        ExtractorKind::License => {
            let request = StructuredRequest::<LicenseResponse>::new(
                &license_system_prompt(),
                LICENSE_TASK,
                Some(image),
                config,
            );
            ExtractionResponse::License(
                query_with_fallbacks(backend, stage, models, &request, timeout).await?,
            )
        }
    };

    info!("{} finished", stage);
    Ok(response)
}
