//! In-memory `edgequake-llm` providers for unit tests.

use async_trait::async_trait;
use edgequake_llm::{
    ChatMessage, CompletionOptions, EmbeddingProvider, LLMProvider, LLMResponse, LlmError,
};
use futures::stream::{self, BoxStream, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Embeds text as keyword counts, one dimension per keyword.
///
/// Every dimension gets a small floor so no vector is all zeros.
pub struct KeywordEmbedder {
    keywords: Vec<String>,
    calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new(keywords: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        self.keywords
            .iter()
            .map(|k| text.matches(k.as_str()).count() as f32 + 0.01)
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn name(&self) -> &str {
        "keywords"
    }

    fn model(&self) -> &str {
        "keywords-v1"
    }

    fn dimension(&self) -> usize {
        self.keywords.len()
    }

    fn max_tokens(&self) -> usize {
        8192
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

/// Chat provider with a canned answer, an optional delay and optional
/// streaming. Records every prompt it receives.
pub struct CannedLlm {
    answer: String,
    delay: Duration,
    pieces: Option<Vec<String>>,
    prompts: Mutex<Vec<String>>,
}

impl CannedLlm {
    pub fn answering(answer: &str) -> Arc<Self> {
        Arc::new(Self {
            answer: answer.into(),
            delay: Duration::ZERO,
            pieces: None,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn slow(answer: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            answer: answer.into(),
            delay,
            pieces: None,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn streaming(pieces: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            answer: pieces.concat(),
            delay: Duration::ZERO,
            pieces: Some(pieces.iter().map(|p| p.to_string()).collect()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    async fn respond(&self, prompt: String) -> Result<LLMResponse, LlmError> {
        self.prompts.lock().unwrap().push(prompt);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(LLMResponse::new(self.answer.clone(), "canned-1").with_usage(120, 30))
    }
}

#[async_trait]
impl LLMProvider for CannedLlm {
    fn name(&self) -> &str {
        "canned"
    }

    fn model(&self) -> &str {
        "canned-1"
    }

    fn max_context_length(&self) -> usize {
        8192
    }

    async fn complete(&self, prompt: &str) -> Result<LLMResponse, LlmError> {
        self.respond(prompt.to_string()).await
    }

    async fn complete_with_options(
        &self,
        prompt: &str,
        _options: &CompletionOptions,
    ) -> Result<LLMResponse, LlmError> {
        self.respond(prompt.to_string()).await
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        _options: Option<&CompletionOptions>,
    ) -> Result<LLMResponse, LlmError> {
        let prompt = messages
            .iter()
            .map(|m| m.content.clone())
            .collect::<Vec<_>>()
            .join("\n");
        self.respond(prompt).await
    }

    async fn stream(&self, prompt: &str) -> Result<BoxStream<'static, Result<String, LlmError>>, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let pieces = self.pieces.clone().unwrap_or_else(|| vec![self.answer.clone()]);
        Ok(stream::iter(pieces.into_iter().map(Ok)).boxed())
    }

    fn supports_streaming(&self) -> bool {
        self.pieces.is_some()
    }
}
