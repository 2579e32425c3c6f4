//! Document classification: "what kind of document is this, if any?"
//!
//! The classifier answer is returned exactly as parsed. An out-of-set
//! `document_type` never reaches this module; it fails schema validation in
//! the inference client and the fallback chain moves on.

use crate::config::ProcessingConfig;
use crate::error::{IdScanError, InferenceStage};
use crate::pipeline::fallback::query_with_fallbacks;
use crate::pipeline::llm::{InferenceBackend, StructuredRequest};
use crate::prompts::{CLASSIFICATION_SYSTEM_PROMPT, CLASSIFICATION_TASK};
use crate::schema::ClassificationResult;
use edgequake_llm::ImageData;
use tokio::time::Duration;
use tracing::info;

/// Classify an encoded document image with the classification model chain.
pub async fn classify_document(
    backend: &dyn InferenceBackend,
    image: ImageData,
    config: &ProcessingConfig,
) -> Result<ClassificationResult, IdScanError> {
    let request = StructuredRequest::<ClassificationResult>::new(
        CLASSIFICATION_SYSTEM_PROMPT,
        CLASSIFICATION_TASK,
        Some(image),
        config,
    );

    let classification = query_with_fallbacks(
        backend,
        InferenceStage::Classification,
        &config.classification_models,
        &request,
        Duration::from_secs(config.api_timeout_secs),
    )
    .await?;

    info!("Classified as {}", classification.document_type);
    Ok(classification)
}
