//! Pipeline configuration.
//!
//! Everything the pipelines need to run lives in one [`PipelineConfig`],
//! built via its [`PipelineConfigBuilder`]. One struct makes configs easy
//! to share between the two pipelines, serialise for debugging, and diff
//! across runs.
//!
//! # Design choice: explicit key injection
//! The API key is a constructor input, not an ad-hoc environment read at
//! call time. [`PipelineConfig::from_env`] exists as a convenience for
//! binaries, but a library embedder passes the key (or a pre-built
//! [`CompletionModel`]) explicitly — there is no hidden global.

use crate::error::PipelineError;
use crate::extract::{OcrBackend, TextExtractor};
use crate::model::CompletionModel;
use std::fmt;
use std::sync::Arc;

/// Default OpenAI-compatible endpoint base.
pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Default completion model.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Configuration for validation and generation pipeline runs.
///
/// Built via [`PipelineConfig::builder()`].
///
/// # Example
/// ```rust
/// use proforma2po::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .api_key("sk-…")
///     .temperature(0.3)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct PipelineConfig {
    /// API key for the completion endpoint. May be empty when
    /// `model_override` is set.
    pub api_key: String,

    /// Base URL of the OpenAI-compatible endpoint. Default:
    /// [`DEFAULT_API_BASE`].
    pub api_base: String,

    /// Completion model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Sampling temperature. Default: 0.3.
    ///
    /// Low temperature favours deterministic, schema-conforming JSON —
    /// exactly what the fixed output shapes demand. Raising it buys
    /// nothing here and costs parse failures.
    pub temperature: f32,

    /// Token budget for a validation completion. Default: 1000.
    pub max_validation_tokens: u32,

    /// Token budget for an extraction completion. Default: 1500.
    ///
    /// Extraction output (vendor + items + pricing + terms) is larger than
    /// a verdict, hence the bigger budget. Too small a budget truncates the
    /// JSON mid-object and sends the run down the fail-closed parse path.
    pub max_extraction_tokens: u32,

    /// Per-call HTTP timeout in seconds. Default: 60. Always finite — a
    /// hung endpoint must not block the approval workflow indefinitely.
    pub api_timeout_secs: u64,

    /// Pre-constructed model client. Takes precedence over `api_key` /
    /// `api_base` / `model`. Tests inject counting doubles here.
    pub model_override: Option<Arc<dyn CompletionModel>>,

    /// OCR backend for raster attachments. `None` means image extraction
    /// reports an error instead of running OCR.
    pub ocr: Option<Arc<dyn OcrBackend>>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.3,
            max_validation_tokens: 1000,
            max_extraction_tokens: 1500,
            api_timeout_secs: 60,
            model_override: None,
            ocr: None,
        }
    }
}

impl fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("api_key", &self.redacted_key())
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_validation_tokens", &self.max_validation_tokens)
            .field("max_extraction_tokens", &self.max_extraction_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field(
                "model_override",
                &self.model_override.as_ref().map(|_| "<dyn CompletionModel>"),
            )
            .field("ocr", &self.ocr.as_ref().map(|_| "<dyn OcrBackend>"))
            .finish()
    }
}

impl PipelineConfig {
    /// Create a new builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Build a config with the key taken from `OPENAI_API_KEY`.
    ///
    /// Binary convenience only; embedders should inject the key.
    pub fn from_env() -> Result<Self, PipelineError> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            PipelineError::ModelNotConfigured {
                hint: "OPENAI_API_KEY is not set".into(),
            }
        })?;
        Self::builder().api_key(api_key).build()
    }

    /// The text extractor for this config (shares the OCR backend).
    pub fn extractor(&self) -> TextExtractor {
        match &self.ocr {
            Some(ocr) => TextExtractor::with_ocr(Arc::clone(ocr)),
            None => TextExtractor::new(),
        }
    }

    fn redacted_key(&self) -> String {
        if self.api_key.is_empty() {
            "<unset>".into()
        } else {
            format!("sk-…({} chars)", self.api_key.len())
        }
    }
}

/// Builder for [`PipelineConfig`].
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn api_base(mut self, base: impl Into<String>) -> Self {
        self.config.api_base = base.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_validation_tokens(mut self, n: u32) -> Self {
        self.config.max_validation_tokens = n;
        self
    }

    pub fn max_extraction_tokens(mut self, n: u32) -> Self {
        self.config.max_extraction_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn model_override(mut self, model: Arc<dyn CompletionModel>) -> Self {
        self.config.model_override = Some(model);
        self
    }

    pub fn ocr(mut self, backend: Arc<dyn OcrBackend>) -> Self {
        self.config.ocr = Some(backend);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        let c = &self.config;
        if c.api_key.is_empty() && c.model_override.is_none() {
            return Err(PipelineError::InvalidConfig(
                "either api_key or model_override must be set".into(),
            ));
        }
        if c.api_base.is_empty() {
            return Err(PipelineError::InvalidConfig("api_base is empty".into()));
        }
        if c.max_validation_tokens == 0 || c.max_extraction_tokens == 0 {
            return Err(PipelineError::InvalidConfig(
                "token budgets must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = PipelineConfig::default();
        assert_eq!(c.api_base, DEFAULT_API_BASE);
        assert_eq!(c.model, DEFAULT_MODEL);
        assert_eq!(c.temperature, 0.3);
        assert_eq!(c.api_timeout_secs, 60);
    }

    #[test]
    fn temperature_is_clamped() {
        let c = PipelineConfig::builder()
            .api_key("k")
            .temperature(9.0)
            .build()
            .unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn build_requires_key_or_override() {
        assert!(PipelineConfig::builder().build().is_err());
        assert!(PipelineConfig::builder().api_key("k").build().is_ok());
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = PipelineConfig::builder()
            .api_key("sk-super-secret-value")
            .build()
            .unwrap();
        let out = format!("{c:?}");
        assert!(!out.contains("super-secret"), "got: {out}");
    }
}
