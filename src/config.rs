//! Configuration types for identity-document processing.
//!
//! All pipeline behaviour is controlled through [`ProcessingConfig`], built
//! via its [`ProcessingConfigBuilder`]. Keeping every knob in one struct makes
//! it trivial to share a config across concurrent invocations and to log the
//! exact settings a run used.
//!
//! # Model lists
//! Each inference step has its own ordered candidate list, most preferred
//! first. Classification defaults to the cheaper model first; extraction
//! reverses the order and leads with the more capable model.

use crate::error::IdScanError;
use crate::pipeline::llm::InferenceBackend;
use crate::progress::ProgressCallback;
use std::fmt;
use std::sync::Arc;

/// Default classification chain: cheapest model first.
pub const DEFAULT_CLASSIFICATION_MODELS: [&str; 2] = ["gpt-4.1-nano", "gpt-4.1-mini"];

/// Default extraction chain: most capable model first.
pub const DEFAULT_EXTRACTION_MODELS: [&str; 2] = ["gpt-4.1-mini", "gpt-4.1-nano"];

/// Configuration for one or many document-processing invocations.
///
/// # Example
/// ```rust
/// use idscan::ProcessingConfig;
///
/// let config = ProcessingConfig::builder()
///     .classification_models(["gpt-4.1-nano", "gpt-4.1-mini"])
///     .passport_models(["gpt-4.1", "gpt-4.1-mini"])
///     .api_timeout_secs(30)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ProcessingConfig {
    /// Pre-constructed inference backend. Takes precedence over `provider_name`.
    ///
    /// Tests and embedding applications inject a substitute backend here.
    pub backend: Option<Arc<dyn InferenceBackend>>,

    /// LLM provider name (e.g. "openai", "anthropic", "gemini", "ollama").
    /// If None, `IDSCAN_PROVIDER` or API-key auto-detection decides.
    pub provider_name: Option<String>,

    /// Ordered candidate models for classification.
    pub classification_models: Vec<String>,

    /// Ordered candidate models for passport extraction.
    pub passport_models: Vec<String>,

    /// Ordered candidate models for driver's license extraction.
    pub license_models: Vec<String>,

    /// Sampling temperature. Default: 0.0.
    ///
    /// Transcription wants the model's single most likely reading.
    pub temperature: f32,

    /// Maximum tokens the model may generate per answer. Default: 1000.
    ///
    /// An eleven-field extraction with analysis fits well under 1000 tokens;
    /// a truncated answer fails JSON parsing and moves the chain on.
    pub max_tokens: usize,

    /// Upper bound on a single model attempt, in seconds. Default: 60.
    ///
    /// A stuck model counts as failed after this and the next model is tried.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Number of documents processed at once by batch entry points. Default: 4.
    ///
    /// A single document is always processed strictly sequentially.
    pub concurrency: usize,

    /// Reject extraction answers where an invisible field has high
    /// confidence. Default: true.
    pub enforce_visibility_contract: bool,

    /// Optional progress callback for batch runs.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            backend: None,
            provider_name: None,
            classification_models: to_strings(DEFAULT_CLASSIFICATION_MODELS),
            passport_models: to_strings(DEFAULT_EXTRACTION_MODELS),
            license_models: to_strings(DEFAULT_EXTRACTION_MODELS),
            temperature: 0.0,
            max_tokens: 1000,
            api_timeout_secs: 60,
            download_timeout_secs: 120,
            concurrency: 4,
            enforce_visibility_contract: true,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ProcessingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessingConfig")
            .field("backend", &self.backend.as_ref().map(|_| "<dyn InferenceBackend>"))
            .field("provider_name", &self.provider_name)
            .field("classification_models", &self.classification_models)
            .field("passport_models", &self.passport_models)
            .field("license_models", &self.license_models)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field("concurrency", &self.concurrency)
            .field("enforce_visibility_contract", &self.enforce_visibility_contract)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ProcessingProgressCallback>"),
            )
            .finish()
    }
}

impl ProcessingConfig {
    /// Create a new builder for `ProcessingConfig`.
    pub fn builder() -> ProcessingConfigBuilder {
        ProcessingConfigBuilder {
            config: Self::default(),
        }
    }

    /// Every distinct model named by any chain, in first-seen order.
    pub fn all_models(&self) -> Vec<String> {
        let mut models: Vec<String> = Vec::new();
        for m in self
            .classification_models
            .iter()
            .chain(&self.passport_models)
            .chain(&self.license_models)
        {
            if !models.contains(m) {
                models.push(m.clone());
            }
        }
        models
    }
}

fn to_strings<I, S>(models: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    models.into_iter().map(Into::into).collect()
}

/// Builder for [`ProcessingConfig`].
pub struct ProcessingConfigBuilder {
    config: ProcessingConfig,
}

impl fmt::Debug for ProcessingConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ProcessingConfigBuilder")
            .field(&self.config)
            .finish()
    }
}

impl ProcessingConfigBuilder {
    pub fn backend(mut self, backend: Arc<dyn InferenceBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn classification_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.classification_models = to_strings(models);
        self
    }

    pub fn passport_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.passport_models = to_strings(models);
        self
    }

    pub fn license_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.license_models = to_strings(models);
        self
    }

    /// Set both extraction chains at once.
    pub fn extraction_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let models = to_strings(models);
        self.config.passport_models = models.clone();
        self.config.license_models = models;
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

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn enforce_visibility_contract(mut self, v: bool) -> Self {
        self.config.enforce_visibility_contract = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ProcessingConfig, IdScanError> {
        let c = &self.config;
        for (name, models) in [
            ("classification", &c.classification_models),
            ("passport", &c.passport_models),
            ("license", &c.license_models),
        ] {
            if models.is_empty() {
                return Err(IdScanError::InvalidConfig(format!(
                    "{name} model list must name at least one model"
                )));
            }
            if models.iter().any(|m| m.trim().is_empty()) {
                return Err(IdScanError::InvalidConfig(format!(
                    "{name} model list contains an empty model id"
                )));
            }
        }
        if c.max_tokens == 0 {
            return Err(IdScanError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(IdScanError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_shows_download_timeout_and_callback_presence() {
        let plain = format!("{:?}", ProcessingConfig::default());
        assert!(plain.contains("download_timeout_secs: 120"));
        assert!(plain.contains("progress_callback: None"));

        let cb: ProgressCallback = Arc::new(crate::progress::NoopProgressCallback);
        let with_cb = ProcessingConfig::builder()
            .download_timeout_secs(15)
            .progress_callback(cb)
            .build()
            .unwrap();
        let shown = format!("{with_cb:?}");
        assert!(shown.contains("download_timeout_secs: 15"));
        assert!(shown.contains("progress_callback: Some(\"<dyn ProcessingProgressCallback>\")"));
    }

    #[test]
    fn defaults_reverse_model_order_between_steps() {
        let c = ProcessingConfig::default();
        assert_eq!(c.classification_models, ["gpt-4.1-nano", "gpt-4.1-mini"]);
        assert_eq!(c.passport_models, ["gpt-4.1-mini", "gpt-4.1-nano"]);
        assert_eq!(c.license_models, c.passport_models);
        assert_eq!(c.temperature, 0.0);
        assert_eq!(c.max_tokens, 1000);
        assert!(c.enforce_visibility_contract);
    }

    #[test]
    fn builder_rejects_empty_model_list() {
        let err = ProcessingConfig::builder()
            .classification_models(Vec::<String>::new())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("classification"), "got: {err}");
    }

    #[test]
    fn builder_rejects_blank_model_id() {
        let err = ProcessingConfig::builder()
            .license_models(["gpt-4.1", " "])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("license"), "got: {err}");
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        assert!(ProcessingConfig::builder()
            .api_timeout_secs(0)
            .build()
            .is_err());
    }

    #[test]
    fn builder_clamps_temperature_and_concurrency() {
        let c = ProcessingConfig::builder()
            .temperature(5.0)
            .concurrency(0)
            .build()
            .unwrap();
        assert_eq!(c.temperature, 2.0);
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn extraction_models_sets_both_chains() {
        let c = ProcessingConfig::builder()
            .extraction_models(["big", "small"])
            .build()
            .unwrap();
        assert_eq!(c.passport_models, ["big", "small"]);
        assert_eq!(c.license_models, ["big", "small"]);
    }

    #[test]
    fn all_models_deduplicates_in_order() {
        let c = ProcessingConfig::default();
        assert_eq!(c.all_models(), ["gpt-4.1-nano", "gpt-4.1-mini"]);
    }
}
