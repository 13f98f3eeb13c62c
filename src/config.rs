//! Configuration types for paper digestion.
//!
//! All behaviour is controlled through [`DigestConfig`], built via its
//! [`DigestConfigBuilder`]. One cloneable struct can be handed to the lazy
//! stream, the eager entry points and the CLI alike.

use crate::error::DigestError;
use crate::pipeline::llm::SummaryModel;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Configuration for summarising a paper.
///
/// # Example
/// ```rust
/// use paper_digest::{DigestConfig, SummaryMode};
///
/// let config = DigestConfig::builder()
///     .mode(SummaryMode::WholeDocument)
///     .header_ratio(0.08)
///     .model("gemini-2.0-flash-lite")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct DigestConfig {
    /// Fraction of the page height cut from the top before extracting text. Default: 0.1.
    pub header_ratio: f32,

    /// Fraction of the page height cut from the bottom. Default: 0.1.
    pub footer_ratio: f32,

    /// Summarise each section/subsection, or the whole document at once.
    pub mode: SummaryMode,

    /// How the document is sent in [`SummaryMode::WholeDocument`].
    pub delivery: DocumentDelivery,

    /// LLM model identifier. If None, uses the provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "gemini", "openai", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed summarizer. Takes precedence over `provider`.
    pub summarizer: Option<Arc<dyn SummaryModel>>,

    /// Sampling temperature. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens the model may generate per call. Default: 4096.
    ///
    /// A whole-document reply lists every section; 4 096 tokens covers
    /// roughly 60 two-sentence entries.
    pub max_tokens: usize,

    /// Retry attempts on a failed model call. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call model timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Per-unit prompt template; `{text}` is replaced by the unit text.
    pub unit_prompt: Option<String>,

    /// Whole-document prompt template; `{document}` is replaced by the paged text.
    pub document_prompt: Option<String>,

    /// Receives per-unit progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            header_ratio: 0.1,
            footer_ratio: 0.1,
            mode: SummaryMode::default(),
            delivery: DocumentDelivery::default(),
            model: None,
            provider_name: None,
            provider: None,
            summarizer: None,
            temperature: 0.2,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 120,
            download_timeout_secs: 120,
            password: None,
            unit_prompt: None,
            document_prompt: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for DigestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestConfig")
            .field("header_ratio", &self.header_ratio)
            .field("footer_ratio", &self.footer_ratio)
            .field("mode", &self.mode)
            .field("delivery", &self.delivery)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("summarizer", &self.summarizer.as_ref().map(|_| "<dyn SummaryModel>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl DigestConfig {
    /// Create a new builder for `DigestConfig`.
    pub fn builder() -> DigestConfigBuilder {
        DigestConfigBuilder {
            config: Self::default(),
        }
    }

    /// The header/footer crop applied to every page.
    pub fn crop_band(&self) -> CropBand {
        CropBand {
            header_ratio: self.header_ratio,
            footer_ratio: self.footer_ratio,
        }
    }
}

/// Builder for [`DigestConfig`].
pub struct DigestConfigBuilder {
    config: DigestConfig,
}

impl fmt::Debug for DigestConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigestConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl DigestConfigBuilder {
    pub fn header_ratio(mut self, ratio: f32) -> Self {
        self.config.header_ratio = ratio;
        self
    }

    pub fn footer_ratio(mut self, ratio: f32) -> Self {
        self.config.footer_ratio = ratio;
        self
    }

    pub fn mode(mut self, mode: SummaryMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn delivery(mut self, delivery: DocumentDelivery) -> Self {
        self.config.delivery = delivery;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn summarizer(mut self, summarizer: Arc<dyn SummaryModel>) -> Self {
        self.config.summarizer = Some(summarizer);
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

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
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

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn unit_prompt(mut self, template: impl Into<String>) -> Self {
        self.config.unit_prompt = Some(template.into());
        self
    }

    pub fn document_prompt(mut self, template: impl Into<String>) -> Self {
        self.config.document_prompt = Some(template.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<DigestConfig, DigestError> {
        let c = &self.config;
        for (name, ratio) in [("header", c.header_ratio), ("footer", c.footer_ratio)] {
            if !(0.0..1.0).contains(&ratio) {
                return Err(DigestError::InvalidConfig(format!(
                    "{name} ratio must be in [0, 1), got {ratio}"
                )));
            }
        }
        if c.header_ratio + c.footer_ratio >= 1.0 {
            return Err(DigestError::InvalidConfig(format!(
                "header + footer ratios leave no text band ({} + {})",
                c.header_ratio, c.footer_ratio
            )));
        }
        if c.max_tokens == 0 {
            return Err(DigestError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(DigestError::InvalidConfig(
                "api_timeout_secs must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Granularity of summarization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SummaryMode {
    /// One model call per section and per subsection, in document order. (default)
    #[default]
    PerUnit,
    /// The model sees the whole paper and returns a JSON list of sections.
    WholeDocument,
}

/// How the paged text reaches the model in whole-document mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentDelivery {
    /// Every page concatenated into a single prompt: one call. (default)
    #[default]
    SingleShot,
    /// Chat-style: one turn per page, then the summary request (pages + 1 calls).
    PageByPage,
}

/// Header/footer crop ratios.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropBand {
    pub header_ratio: f32,
    pub footer_ratio: f32,
}

impl Default for CropBand {
    fn default() -> Self {
        Self {
            header_ratio: 0.1,
            footer_ratio: 0.1,
        }
    }
}

impl CropBand {
    /// Vertical band kept on a page of the given height, measured from the top edge.
    pub fn band(&self, height: f32) -> (f32, f32) {
        (height * self.header_ratio, height * (1.0 - self.footer_ratio))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = DigestConfig::default();
        assert_eq!(c.mode, SummaryMode::PerUnit);
        assert_eq!(c.delivery, DocumentDelivery::SingleShot);
        assert_eq!(c.crop_band(), CropBand::default());
        assert_eq!(c.max_retries, 3);
    }

    #[test]
    fn band_excludes_header_and_footer() {
        let band = CropBand {
            header_ratio: 0.1,
            footer_ratio: 0.2,
        };
        let (top, bottom) = band.band(800.0);
        assert!((top - 80.0).abs() < 1e-3);
        assert!((bottom - 640.0).abs() < 1e-3);
    }

    #[test]
    fn rejects_out_of_range_ratio() {
        let err = DigestConfig::builder().header_ratio(1.0).build().unwrap_err();
        assert!(matches!(err, DigestError::InvalidConfig(_)));
        let err = DigestConfig::builder().footer_ratio(-0.1).build().unwrap_err();
        assert!(matches!(err, DigestError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_ratios_that_cover_the_page() {
        let err = DigestConfig::builder()
            .header_ratio(0.5)
            .footer_ratio(0.5)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("no text band"));
    }

    #[test]
    fn temperature_is_clamped() {
        let c = DigestConfig::builder().temperature(5.0).build().unwrap();
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn mode_serialises_kebab_case() {
        let json = serde_json::to_string(&SummaryMode::WholeDocument).unwrap();
        assert_eq!(json, "\"whole-document\"");
    }
}
