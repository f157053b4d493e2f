//! Configuration types for annotation and rendering.
//!
//! Annotation behaviour is controlled through [`AnnotatorConfig`], built via
//! its [`AnnotatorConfigBuilder`]. Margin-box geometry lives in
//! [`LayoutConfig`], which the config carries so a single value describes a
//! whole annotate-then-render run.

use crate::error::AnnotatorError;
use crate::pipeline::llm::CompletionClient;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "llama3.2";

/// Configuration for an annotation job.
///
/// Built via [`AnnotatorConfig::builder()`] or using
/// [`AnnotatorConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_pdf_annotate::AnnotatorConfig;
///
/// let config = AnnotatorConfig::builder()
///     .model("mistral")
///     .api_timeout_secs(120)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AnnotatorConfig {
    /// Model identifier sent with every completion. Default: `llama3.2`,
    /// or `OLLAMA_MODEL` when set.
    pub model: String,

    /// Base URL of the Ollama server. Default: `http://localhost:11434`,
    /// or `OLLAMA_HOST` when set.
    pub ollama_host: String,

    /// Hosted provider name (`openai`, `anthropic`, `gemini`, …).
    /// `None` or `"ollama"` selects the built-in Ollama client.
    pub provider_name: Option<String>,

    /// Pre-constructed edgequake-llm provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed completion client. Takes precedence over everything else.
    pub client: Option<Arc<dyn CompletionClient>>,

    /// Sampling temperature. Default: 0.2.
    ///
    /// Low enough that the model sticks to the JSON contract, high enough
    /// that reactions and questions do not all read the same.
    pub temperature: f32,

    /// Maximum tokens generated per page. Default: 2048.
    ///
    /// Six annotations fit comfortably; output cut off by this limit is
    /// salvaged by the truncation-recovery repair strategy.
    pub max_tokens: usize,

    /// Per-completion timeout in seconds. Default: 180.
    ///
    /// A timeout fails the whole job; there is no retry.
    pub api_timeout_secs: u64,

    /// Page text longer than this many characters is cut and marked
    /// `[truncated]` before it is put in the prompt. Default: 4000.
    pub max_page_chars: usize,

    /// Timeout for the backend health check in seconds. Default: 4.
    pub health_timeout_secs: u64,

    /// Margin-box geometry used by the render pass.
    pub layout: LayoutConfig,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            model: std::env::var("OLLAMA_MODEL")
                .ok()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            ollama_host: std::env::var("OLLAMA_HOST")
                .ok()
                .filter(|h| !h.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_OLLAMA_HOST.to_string()),
            provider_name: None,
            provider: None,
            client: None,
            temperature: 0.2,
            max_tokens: 2048,
            api_timeout_secs: 180,
            max_page_chars: 4000,
            health_timeout_secs: 4,
            layout: LayoutConfig::default(),
        }
    }
}

impl fmt::Debug for AnnotatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnotatorConfig")
            .field("model", &self.model)
            .field("ollama_host", &self.ollama_host)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("client", &self.client.as_ref().map(|_| "<dyn CompletionClient>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("max_page_chars", &self.max_page_chars)
            .finish()
    }
}

impl AnnotatorConfig {
    /// Create a new builder for `AnnotatorConfig`.
    pub fn builder() -> AnnotatorConfigBuilder {
        AnnotatorConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`AnnotatorConfig`].
#[derive(Debug)]
pub struct AnnotatorConfigBuilder {
    config: AnnotatorConfig,
}

impl AnnotatorConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn ollama_host(mut self, host: impl Into<String>) -> Self {
        self.config.ollama_host = host.into();
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

    pub fn client(mut self, client: Arc<dyn CompletionClient>) -> Self {
        self.config.client = Some(client);
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

    pub fn max_page_chars(mut self, n: usize) -> Self {
        self.config.max_page_chars = n;
        self
    }

    pub fn health_timeout_secs(mut self, secs: u64) -> Self {
        self.config.health_timeout_secs = secs.max(1);
        self
    }

    pub fn layout(mut self, layout: LayoutConfig) -> Self {
        self.config.layout = layout;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AnnotatorConfig, AnnotatorError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(AnnotatorError::InvalidConfig("Model must not be empty".into()));
        }
        if c.api_timeout_secs == 0 {
            return Err(AnnotatorError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if c.max_page_chars == 0 {
            return Err(AnnotatorError::InvalidConfig(
                "max_page_chars must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Page range ───────────────────────────────────────────────────────────

/// Inclusive, 1-based page range. `to = None` means "through the last page".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub from: usize,
    pub to: Option<usize>,
}

impl Default for PageRange {
    fn default() -> Self {
        Self { from: 1, to: None }
    }
}

impl PageRange {
    pub fn new(from: usize, to: Option<usize>) -> Self {
        Self { from, to }
    }

    /// Clamp to `[1, total_pages]` and return `(first, last)`, or `None` when
    /// the clamped range selects no page.
    pub fn clamp(&self, total_pages: usize) -> Option<(usize, usize)> {
        let first = self.from.max(1);
        let last = self.to.unwrap_or(total_pages).min(total_pages);
        (first <= last).then_some((first, last))
    }

    /// Whether `page` (1-based) lies inside the unclamped range.
    pub fn contains(&self, page: usize) -> bool {
        page >= self.from.max(1) && self.to.is_none_or(|to| page <= to)
    }
}

// ── Layout ───────────────────────────────────────────────────────────────

/// Geometry and typography of the margin strip, in PDF points.
///
/// Vertical positions are measured top-down from the page's top edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Strip width as a fraction of the page width. Default: 0.23.
    pub margin_ratio: f32,
    /// Upper bound on the strip width. Default: 180.
    pub margin_max_width: f32,
    /// Vertical cursor start, and the separator line's inset. Default: 14.
    pub top_inset: f32,
    /// Boxes may not extend below `page_height - bottom_inset`. Default: 12.
    pub bottom_inset: f32,
    /// Gap left after each box. Default: 3.5.
    pub box_gap: f32,
    /// Inner vertical padding of a box. Default: 4.
    pub box_padding: f32,
    /// Width of the accent bar on the box's left edge. Default: 2.8.
    pub accent_bar_width: f32,
    pub label_font_size: f32,
    pub quote_font_size: f32,
    pub body_font_size: f32,
    pub theme_font_size: f32,
    /// Quotes longer than this many characters are shortened with `…`. Default: 50.
    pub quote_max_chars: usize,
    /// Quotes shorter than this are not searched for on the page. Default: 5.
    pub min_highlight_chars: usize,
    /// At most this many occurrences of a quote are highlighted. Default: 5.
    pub max_highlights: usize,
    /// At most this many theme tags are printed. Default: 4.
    pub max_theme_tags: usize,
    /// Never wrap narrower than this many characters. Default: 14.
    pub min_wrap_chars: usize,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            margin_ratio: 0.23,
            margin_max_width: 180.0,
            top_inset: 14.0,
            bottom_inset: 12.0,
            box_gap: 3.5,
            box_padding: 4.0,
            accent_bar_width: 2.8,
            label_font_size: 5.8,
            quote_font_size: 6.4,
            body_font_size: 6.9,
            theme_font_size: 5.0,
            quote_max_chars: 50,
            min_highlight_chars: 5,
            max_highlights: 5,
            max_theme_tags: 4,
            min_wrap_chars: 14,
        }
    }
}

impl LayoutConfig {
    pub fn quote_line_height(&self) -> f32 {
        self.quote_font_size * 1.32
    }

    pub fn body_line_height(&self) -> f32 {
        self.body_font_size * 1.36
    }

    /// Width of the margin strip for a page of the given width.
    pub fn margin_width(&self, page_width: f32) -> f32 {
        (page_width * self.margin_ratio).min(self.margin_max_width)
    }

    /// Characters per wrapped line for a box of the given width, estimated
    /// from the average Helvetica glyph width (≈ 0.52 em).
    pub fn wrap_chars(&self, box_width: f32) -> usize {
        let estimate = (box_width / (self.body_font_size * 0.52)).max(0.0) as usize;
        estimate.max(self.min_wrap_chars)
    }
}
