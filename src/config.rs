//! Configuration for the PDF question-answering assistant.
//!
//! All behaviour is controlled through [`AssistantConfig`], built via its
//! [`AssistantConfigBuilder`]. Callers set only what they care about and rely
//! on documented defaults for the rest.

use crate::error::PdfQaError;
use crate::events::EventsHandle;
use crate::prompts::{validate_template, DEFAULT_QA_TEMPLATE};
use crate::session::HistoryLimit;
use edgequake_llm::{EmbeddingProvider, LLMProvider};
use std::fmt;
use std::sync::Arc;

/// Model used when neither the caller nor the environment names one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Configuration for a question-answering conversation.
///
/// # Example
/// ```rust
/// use edgequake_pdfqa::AssistantConfig;
///
/// let config = AssistantConfig::builder()
///     .model("gpt-4.1-mini")
///     .similarity_top_k(3)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct AssistantConfig {
    /// LLM model identifier. If None, uses [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed embedding provider used to index excerpts.
    /// If None, the one paired with the environment's provider is used.
    pub embedding_provider: Option<Arc<dyn EmbeddingProvider>>,

    /// Excerpts sent per embedding request. Default: 64.
    pub embed_batch_size: usize,

    /// Sampling temperature. Default: 0.0.
    ///
    /// Answers should stay faithful to the retrieved excerpts, so sampling
    /// is deterministic by default.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per answer. Default: 1024.
    pub max_tokens: usize,

    /// Number of excerpts retrieved per question. Default: 2.
    pub similarity_top_k: usize,

    /// Excerpt size in characters. Default: 1000.
    ///
    /// Excerpts never span pages, so every source maps to exactly one page
    /// label.
    pub chunk_chars: usize,

    /// Characters shared between consecutive excerpts of a page. Default: 100.
    pub chunk_overlap: usize,

    /// Custom QA template containing `{context_str}` and `{query_str}`.
    /// If None, uses [`DEFAULT_QA_TEMPLATE`].
    pub prompt_template: Option<String>,

    /// How much history a session keeps. Default: unbounded.
    pub history_limit: HistoryLimit,

    /// How many document indexes are kept for quick switching. Default: 4.
    pub index_cache_capacity: usize,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Per-question LLM timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Optional observer for indexing and query events.
    pub events: Option<EventsHandle>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            embedding_provider: None,
            embed_batch_size: 64,
            temperature: 0.0,
            max_tokens: 1024,
            similarity_top_k: 2,
            chunk_chars: 1000,
            chunk_overlap: 100,
            prompt_template: None,
            history_limit: HistoryLimit::default(),
            index_cache_capacity: 4,
            password: None,
            download_timeout_secs: 120,
            api_timeout_secs: 60,
            events: None,
        }
    }
}

impl fmt::Debug for AssistantConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssistantConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field(
                "embedding_provider",
                &self.embedding_provider.as_ref().map(|_| "<dyn EmbeddingProvider>"),
            )
            .field("embed_batch_size", &self.embed_batch_size)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("similarity_top_k", &self.similarity_top_k)
            .field("chunk_chars", &self.chunk_chars)
            .field("chunk_overlap", &self.chunk_overlap)
            .field("history_limit", &self.history_limit)
            .field("index_cache_capacity", &self.index_cache_capacity)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("events", &self.events.as_ref().map(|_| "<dyn ConversationEvents>"))
            .finish()
    }
}

impl AssistantConfig {
    /// Create a new builder for `AssistantConfig`.
    pub fn builder() -> AssistantConfigBuilder {
        AssistantConfigBuilder {
            config: Self::default(),
        }
    }

    /// The QA template in effect.
    pub fn qa_template(&self) -> &str {
        self.prompt_template.as_deref().unwrap_or(DEFAULT_QA_TEMPLATE)
    }

    /// The model in effect.
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Builder for [`AssistantConfig`].
pub struct AssistantConfigBuilder {
    config: AssistantConfig,
}

impl fmt::Debug for AssistantConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssistantConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl AssistantConfigBuilder {
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

    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.config.embedding_provider = Some(provider);
        self
    }

    pub fn embed_batch_size(mut self, n: usize) -> Self {
        self.config.embed_batch_size = n.max(1);
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

    pub fn similarity_top_k(mut self, k: usize) -> Self {
        self.config.similarity_top_k = k.max(1);
        self
    }

    pub fn chunk_chars(mut self, n: usize) -> Self {
        self.config.chunk_chars = n.max(100);
        self
    }

    pub fn chunk_overlap(mut self, n: usize) -> Self {
        self.config.chunk_overlap = n;
        self
    }

    pub fn prompt_template(mut self, template: impl Into<String>) -> Self {
        self.config.prompt_template = Some(template.into());
        self
    }

    pub fn history_limit(mut self, limit: HistoryLimit) -> Self {
        self.config.history_limit = limit;
        self
    }

    pub fn index_cache_capacity(mut self, n: usize) -> Self {
        self.config.index_cache_capacity = n.max(1);
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn events(mut self, events: EventsHandle) -> Self {
        self.config.events = Some(events);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AssistantConfig, PdfQaError> {
        let c = &self.config;
        if c.chunk_overlap >= c.chunk_chars {
            return Err(PdfQaError::InvalidConfig(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                c.chunk_overlap, c.chunk_chars
            )));
        }
        if c.api_timeout_secs == 0 {
            return Err(PdfQaError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if let Some(ref template) = c.prompt_template {
            validate_template(template).map_err(PdfQaError::InvalidConfig)?;
        }
        Ok(self.config)
    }
}
