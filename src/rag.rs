//! Default collaborators: pdfium-backed indexing and retrieval-augmented
//! answering through `edgequake-llm` chat and embedding providers.
//!
//! ```text
//! bytes ──▶ extract ──▶ chunk ──▶ embed ──▶ VectorIndex        (PdfIndexer::build)
//! question ──▶ embed ──▶ top_k ──▶ QA prompt ──▶ LLM (stream)    (RagQueryEngine)
//! ```

use crate::config::AssistantConfig;
use crate::engine::{DocumentIndexer, QueryEngine, QueryResponse, UploadedDocument};
use crate::error::{PdfQaError, QueryError};
use crate::pipeline::chunk::{chunk_pages, Chunk};
use crate::pipeline::embed::{embed_chunks, embed_query};
use crate::pipeline::extract::extract_pages;
use crate::pipeline::llm;
use crate::pipeline::retrieve::{ScoredChunk, VectorIndex};
use crate::prompts::render_qa_prompt;
use crate::provider::resolve_providers;
use async_trait::async_trait;
use edgequake_llm::{CompletionOptions, EmbeddingProvider, LLMProvider};
use std::sync::Arc;
use tracing::info;

/// Builds a [`RagQueryEngine`] from a PDF.
pub struct PdfIndexer {
    provider: Arc<dyn LLMProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: AssistantConfig,
}

impl PdfIndexer {
    /// Resolve both providers from `config` and keep a copy of the settings.
    pub fn from_config(config: &AssistantConfig) -> Result<Self, PdfQaError> {
        let (provider, embedder) = resolve_providers(config)?;
        Ok(Self::with_providers(provider, embedder, config))
    }

    pub fn with_providers(
        provider: Arc<dyn LLMProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: &AssistantConfig,
    ) -> Self {
        Self {
            provider,
            embedder,
            config: config.clone(),
        }
    }
}

#[async_trait]
impl DocumentIndexer for PdfIndexer {
    async fn build(&self, document: &UploadedDocument) -> Result<Arc<dyn QueryEngine>, PdfQaError> {
        let pages = extract_pages(document, self.config.password.as_deref()).await?;
        let chunks = chunk_pages(&pages, self.config.chunk_chars, self.config.chunk_overlap);
        if chunks.is_empty() {
            return Err(PdfQaError::EmptyDocument {
                name: document.identity().to_string(),
                pages: pages.len(),
            });
        }

        let engine = RagQueryEngine::from_chunks(
            document.identity(),
            chunks,
            Arc::clone(&self.provider),
            Arc::clone(&self.embedder),
            &self.config,
        )
        .await?;

        info!(
            "Indexed '{}': {} pages, {} chunks",
            document.identity(),
            pages.len(),
            engine.chunk_count()
        );
        Ok(Arc::new(engine))
    }
}

/// Answers questions from the best-matching excerpts of one document.
pub struct RagQueryEngine {
    index: VectorIndex,
    provider: Arc<dyn LLMProvider>,
    embedder: Arc<dyn EmbeddingProvider>,
    template: String,
    options: CompletionOptions,
    top_k: usize,
    timeout_secs: u64,
}

impl RagQueryEngine {
    /// Embed `chunks` and index them. `name` only labels errors.
    pub async fn from_chunks(
        name: &str,
        chunks: Vec<Chunk>,
        provider: Arc<dyn LLMProvider>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: &AssistantConfig,
    ) -> Result<Self, PdfQaError> {
        let embedding_failed = |detail: String| PdfQaError::EmbeddingFailed {
            name: name.to_string(),
            detail,
        };
        let vectors = embed_chunks(&embedder, &chunks, config.embed_batch_size)
            .await
            .map_err(embedding_failed)?;
        let index = VectorIndex::build(chunks, vectors).map_err(embedding_failed)?;

        Ok(Self {
            index,
            provider,
            embedder,
            template: config.qa_template().to_string(),
            options: llm::build_options(config),
            top_k: config.similarity_top_k,
            timeout_secs: config.api_timeout_secs,
        })
    }

    pub fn chunk_count(&self) -> usize {
        self.index.len()
    }

    /// Retrieve excerpts for `question` and render the QA prompt.
    async fn prepare(&self, question: &str) -> Result<(String, Vec<String>), QueryError> {
        let query = embed_query(&self.embedder, question, self.timeout_secs).await?;
        let hits = self
            .index
            .search(&query, self.top_k)
            .map_err(QueryError::Provider)?;
        let prompt = render_qa_prompt(&self.template, &build_context(&hits), question);
        Ok((prompt, source_pages(&hits)))
    }
}

#[async_trait]
impl QueryEngine for RagQueryEngine {
    async fn query(&self, question: &str) -> Result<QueryResponse, QueryError> {
        let (prompt, source_pages) = self.prepare(question).await?;
        let generation =
            llm::generate(&self.provider, &prompt, &self.options, self.timeout_secs).await?;

        Ok(QueryResponse {
            text: generation.text,
            source_pages,
            input_tokens: generation.input_tokens,
            output_tokens: generation.output_tokens,
        })
    }

    /// Streams when the provider supports it; otherwise answers in one piece.
    async fn query_streaming(
        &self,
        question: &str,
        on_chunk: &(dyn for<'c> Fn(&'c str) + Send + Sync),
    ) -> Result<QueryResponse, QueryError> {
        if !self.provider.supports_streaming() {
            let response = self.query(question).await?;
            on_chunk(&response.text);
            return Ok(response);
        }

        let (prompt, source_pages) = self.prepare(question).await?;
        let generation =
            llm::generate_streaming(&self.provider, &prompt, self.timeout_secs, on_chunk).await?;

        Ok(QueryResponse {
            text: generation.text,
            source_pages,
            input_tokens: generation.input_tokens,
            output_tokens: generation.output_tokens,
        })
    }
}

/// Join retrieved excerpts into the `{context_str}` block.
fn build_context(hits: &[ScoredChunk<'_>]) -> String {
    hits.iter()
        .map(|h| h.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Page labels of the hits in rank order, each listed once.
///
/// Two excerpts from the same page cite it once ("3", not "3, 3"), unlike a
/// plain one-label-per-source listing.
fn source_pages(hits: &[ScoredChunk<'_>]) -> Vec<String> {
    let mut pages: Vec<String> = Vec::with_capacity(hits.len());
    for hit in hits {
        if !pages.contains(&hit.chunk.page_label) {
            pages.push(hit.chunk.page_label.clone());
        }
    }
    pages
}
