//! Embedding: turn excerpts and questions into vectors via `edgequake-llm`.
//!
//! Excerpts are sent in batches of `batch_size` so large documents stay
//! within provider request limits. Questions are embedded one at a time under
//! the per-question timeout.

use crate::error::QueryError;
use crate::pipeline::chunk::Chunk;
use edgequake_llm::EmbeddingProvider;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Embed every chunk, in order. Errors carry the provider's message.
pub async fn embed_chunks(
    embedder: &Arc<dyn EmbeddingProvider>,
    chunks: &[Chunk],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>, String> {
    let mut vectors = Vec::with_capacity(chunks.len());
    for (n, batch) in chunks.chunks(batch_size.max(1)).enumerate() {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let embedded = embedder.embed(&texts).await.map_err(|e| e.to_string())?;
        if embedded.len() != texts.len() {
            return Err(format!(
                "batch {} returned {} vectors for {} excerpts",
                n,
                embedded.len(),
                texts.len()
            ));
        }
        vectors.extend(embedded);
    }
    debug!(
        "Embedded {} excerpts with '{}'",
        vectors.len(),
        embedder.model()
    );
    Ok(vectors)
}

/// Embed a question, failing with [`QueryError::Timeout`] after `timeout_secs`.
pub async fn embed_query(
    embedder: &Arc<dyn EmbeddingProvider>,
    question: &str,
    timeout_secs: u64,
) -> Result<Vec<f32>, QueryError> {
    let texts = vec![question.to_string()];
    let mut vectors = tokio::time::timeout(Duration::from_secs(timeout_secs), embedder.embed(&texts))
        .await
        .map_err(|_| QueryError::Timeout { secs: timeout_secs })?
        .map_err(|e| QueryError::Provider(e.to_string()))?;

    vectors
        .pop()
        .ok_or_else(|| QueryError::Provider("embedding provider returned no vector".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::KeywordEmbedder;

    fn chunk(text: &str) -> Chunk {
        Chunk {
            page_label: "1".into(),
            text: text.into(),
        }
    }

    #[tokio::test]
    async fn chunks_are_embedded_in_batches_and_order() {
        let embedder = KeywordEmbedder::new(&["apple", "banana"]);
        let handle: Arc<dyn EmbeddingProvider> = embedder.clone();
        let chunks = [chunk("apple"), chunk("banana"), chunk("apple apple")];

        let vectors = embed_chunks(&handle, &chunks, 2).await.unwrap();

        assert_eq!(vectors.len(), 3);
        assert!(vectors[0][0] > vectors[0][1]);
        assert!(vectors[1][1] > vectors[1][0]);
        assert_eq!(embedder.calls(), 2);
    }

    #[tokio::test]
    async fn query_is_embedded() {
        let handle: Arc<dyn EmbeddingProvider> = KeywordEmbedder::new(&["apple", "banana"]);
        let v = embed_query(&handle, "banana?", 5).await.unwrap();
        assert_eq!(v.len(), 2);
        assert!(v[1] > v[0]);
    }
}
