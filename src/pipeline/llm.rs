//! Structured inference client: one model, one request, one typed answer.
//!
//! This module owns the seam between the pipeline and the outside world.
//! [`InferenceBackend`] is the narrow contract an inference endpoint must
//! satisfy (send messages to a named model, return the raw text). The
//! production implementation, [`ProviderBackend`], delegates to
//! `edgequake-llm` providers; tests substitute an in-memory backend.
//!
//! [`query_structured`] performs exactly one attempt and has no retry logic
//! of its own. Transport errors, malformed JSON and schema or contract
//! violations all come back as the same [`InferenceError`], because the
//! fallback chain above only needs to know that this attempt is unusable.

use crate::config::ProcessingConfig;
use crate::error::{IdScanError, InferenceError};
use crate::pipeline::parse::parse_response;
use crate::prompts::schema_instruction;
use crate::schema::ResponseSchema;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider, ProviderFactory};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// An external inference endpoint addressed by model identifier.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Send `messages` to `model` and return the raw text of the answer.
    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, InferenceError>;
}

// ── Request ──────────────────────────────────────────────────────────────

/// A fully prepared request for schema `T`, reusable across every model of
/// a fallback chain.
///
/// ## Message Layout
/// 1. **System message**: task instruction followed by the JSON schema of `T`
/// 2. **User message**: the task text, with the document image attached
pub struct StructuredRequest<T> {
    messages: Vec<ChatMessage>,
    options: CompletionOptions,
    enforce_contract: bool,
    _schema: PhantomData<fn() -> T>,
}

impl<T: ResponseSchema> StructuredRequest<T> {
    pub fn new(
        system_prompt: &str,
        task: &str,
        image: Option<ImageData>,
        config: &ProcessingConfig,
    ) -> Self {
        let system = format!(
            "{system_prompt}{}",
            schema_instruction(T::NAME, &T::response_schema())
        );
        let user = match image {
            Some(image) => ChatMessage::user_with_images(task, vec![image]),
            None => ChatMessage::user(task),
        };

        Self {
            messages: vec![ChatMessage::system(&system), user],
            options: build_options(config),
            enforce_contract: config.enforce_visibility_contract,
            _schema: PhantomData,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }
}

impl<T> fmt::Debug for StructuredRequest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StructuredRequest")
            .field("messages", &self.messages.len())
            .field("enforce_contract", &self.enforce_contract)
            .finish()
    }
}

/// Build `CompletionOptions` from the processing config.
fn build_options(config: &ProcessingConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Run one inference attempt against `model` and parse the answer into `T`.
pub async fn query_structured<T: ResponseSchema>(
    backend: &dyn InferenceBackend,
    model: &str,
    request: &StructuredRequest<T>,
) -> Result<T, InferenceError> {
    let start = Instant::now();
    let raw = backend
        .complete(model, &request.messages, &request.options)
        .await?;
    debug!(
        "{}: {} answered with {} bytes in {:?}",
        T::NAME,
        model,
        raw.len(),
        start.elapsed()
    );

    parse_response::<T>(&raw, request.enforce_contract).map_err(|e| InferenceError::new(model, e))
}

// ── edgequake-llm backed implementation ──────────────────────────────────

/// Inference backend that routes each model id to an `edgequake-llm` provider.
///
/// Providers for every model named in the config are created once, up front,
/// and never mutated afterwards, so one backend can serve any number of
/// concurrent invocations.
pub struct ProviderBackend {
    provider_name: String,
    providers: HashMap<String, Arc<dyn LLMProvider>>,
}

impl ProviderBackend {
    /// Create providers for `models` under the named provider.
    pub fn new(provider_name: &str, models: &[String]) -> Result<Self, IdScanError> {
        let providers = models
            .iter()
            .map(|model| Ok((model.clone(), create_vision_provider(provider_name, model)?)))
            .collect::<Result<HashMap<_, _>, IdScanError>>()?;

        Ok(Self {
            provider_name: provider_name.to_string(),
            providers,
        })
    }

    /// Resolve the provider name from the config or the environment and
    /// create providers for every model the config names.
    pub fn from_config(config: &ProcessingConfig) -> Result<Self, IdScanError> {
        let name = resolve_provider_name(config)?;
        Self::new(&name, &config.all_models())
    }

    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }
}

#[async_trait]
impl InferenceBackend for ProviderBackend {
    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String, InferenceError> {
        let provider = match self.providers.get(model) {
            Some(p) => Arc::clone(p),
            None => create_vision_provider(&self.provider_name, model)
                .map_err(|e| InferenceError::new(model, e))?,
        };

        let response = provider
            .chat(messages, Some(options))
            .await
            .map_err(|e| InferenceError::new(model, e))?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            model, response.prompt_tokens, response.completion_tokens
        );
        Ok(response.content)
    }
}

/// Instantiate a named provider with the given model.
fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, IdScanError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        IdScanError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// API-key variables checked, in order, when no provider is named.
const KEY_DETECTION: [(&str, &str); 3] = [
    ("OPENAI_API_KEY", "openai"),
    ("ANTHROPIC_API_KEY", "anthropic"),
    ("GEMINI_API_KEY", "gemini"),
];

/// Resolve the provider name, from most-specific to least-specific:
///
/// 1. `config.provider_name`
/// 2. `IDSCAN_PROVIDER` environment variable
/// 3. the first of `OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, `GEMINI_API_KEY`
///    that is set and non-empty
fn resolve_provider_name(config: &ProcessingConfig) -> Result<String, IdScanError> {
    if let Some(ref name) = config.provider_name {
        return Ok(name.clone());
    }

    if let Ok(name) = std::env::var("IDSCAN_PROVIDER") {
        if !name.is_empty() {
            return Ok(name);
        }
    }

    KEY_DETECTION
        .iter()
        .find(|(var, _)| std::env::var(var).is_ok_and(|v| !v.is_empty()))
        .map(|(_, name)| name.to_string())
        .ok_or_else(|| IdScanError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY or GEMINI_API_KEY, or pass --provider."
                .to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ClassificationResult, DocumentType};
    use std::sync::Mutex;

    struct CannedBackend {
        answer: Result<String, String>,
        seen: Mutex<Vec<(String, usize)>>,
    }

    #[async_trait]
    impl InferenceBackend for CannedBackend {
        async fn complete(
            &self,
            model: &str,
            messages: &[ChatMessage],
            _options: &CompletionOptions,
        ) -> Result<String, InferenceError> {
            self.seen
                .lock()
                .unwrap()
                .push((model.to_string(), messages.len()));
            self.answer
                .clone()
                .map_err(|detail| InferenceError::new(model, detail))
        }
    }

    fn canned(answer: Result<&str, &str>) -> CannedBackend {
        CannedBackend {
            answer: answer.map(str::to_string).map_err(str::to_string),
            seen: Mutex::new(Vec::new()),
        }
    }

    fn request() -> StructuredRequest<ClassificationResult> {
        StructuredRequest::new("Classify.", "Classify this.", None, &ProcessingConfig::default())
    }

    #[test]
    fn build_options_defaults() {
        let opts = build_options(&ProcessingConfig::default());
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.max_tokens, Some(1000));
    }

    #[test]
    fn request_has_system_and_user_messages() {
        assert_eq!(request().messages().len(), 2);
    }

    #[tokio::test]
    async fn parses_a_conforming_answer() {
        let backend = canned(Ok(
            r#"{"image_analysis": "a US passport", "document_type": "american_passport"}"#,
        ));
        let result = query_structured(&backend, "small", &request()).await.unwrap();
        assert_eq!(result.document_type, DocumentType::AmericanPassport);
        assert_eq!(*backend.seen.lock().unwrap(), [("small".to_string(), 2)]);
    }

    #[tokio::test]
    async fn transport_failure_is_a_call_failure() {
        let backend = canned(Err("HTTP 503 Service Unavailable"));
        let err = query_structured(&backend, "small", &request()).await.unwrap_err();
        assert_eq!(err.model, "small");
        assert!(err.detail.contains("503"));
    }

    #[tokio::test]
    async fn schema_violation_is_a_call_failure() {
        let backend = canned(Ok(r#"{"image_analysis": "?", "document_type": "receipt"}"#));
        let err = query_structured(&backend, "small", &request()).await.unwrap_err();
        assert_eq!(err.model, "small");
        assert!(err.detail.contains("DocumentClassification"), "got: {err}");
    }

    #[test]
    fn explicit_provider_name_wins() {
        let config = ProcessingConfig::builder()
            .provider_name("ollama")
            .build()
            .unwrap();
        assert_eq!(resolve_provider_name(&config).unwrap(), "ollama");
    }
}
