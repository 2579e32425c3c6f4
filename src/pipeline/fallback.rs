//! Fallback inference: try an ordered list of models until one answers.
//!
//! Models are tried strictly in list order, one at a time. The first
//! schema-conforming answer wins and later models are never called. There is
//! no scoring, racing or voting: the goal is *a* valid answer at the lowest
//! cost, not the best of several.
//!
//! Each attempt is bounded by `api_timeout_secs`; a stuck model is cancelled
//! (its future dropped) and treated like any other failed attempt.
//!
//! When every model fails, only the last failure is kept in the returned
//! [`IdScanError::FallbackExhausted`]; earlier failures are logged.

use crate::error::{IdScanError, InferenceError, InferenceStage};
use crate::pipeline::llm::{query_structured, InferenceBackend, StructuredRequest};
use crate::schema::ResponseSchema;
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

/// Query `models` in order and return the first valid answer.
pub async fn query_with_fallbacks<T: ResponseSchema>(
    backend: &dyn InferenceBackend,
    stage: InferenceStage,
    models: &[String],
    request: &StructuredRequest<T>,
    attempt_timeout: Duration,
) -> Result<T, IdScanError> {
    let mut last_err: Option<InferenceError> = None;

    for (attempt, model) in models.iter().enumerate() {
        let attempt_future = query_structured(backend, model, request);
        let outcome = match timeout(attempt_timeout, attempt_future).await {
            Ok(result) => result,
            Err(_) => Err(InferenceError::new(
                model.as_str(),
                format!("timed out after {}s", attempt_timeout.as_secs()),
            )),
        };

        match outcome {
            Ok(value) => {
                debug!("{}: answered by {} (attempt {})", stage, model, attempt + 1);
                return Ok(value);
            }
            Err(e) => {
                warn!(
                    "{}: model {} failed ({}/{}): {}",
                    stage,
                    model,
                    attempt + 1,
                    models.len(),
                    e.detail
                );
                last_err = Some(e);
            }
        }
    }

    Err(IdScanError::FallbackExhausted {
        stage,
        attempts: models.len(),
        last_error: last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no candidate models configured".to_string()),
    })
}
