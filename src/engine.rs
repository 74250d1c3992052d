//! Collaborator seams: document indexing and question answering.
//!
//! The conversation controller only ever talks to these two traits. The
//! default implementations ([`crate::rag::PdfIndexer`] and
//! [`crate::rag::RagQueryEngine`]) extract text with pdfium, retrieve the
//! best-matching page excerpts and ask an `edgequake-llm` provider; tests and
//! embedders can plug in anything else.

use crate::error::{PdfQaError, QueryError};
use async_trait::async_trait;
use std::sync::Arc;

/// A document handed to the assistant: a display name plus raw bytes.
///
/// The name is the document's identity: loading a document with a different
/// name starts a new conversation.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    name: String,
    bytes: Arc<[u8]>,
}

impl UploadedDocument {
    pub fn new(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn identity(&self) -> &str {
        &self.name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub(crate) fn shared_bytes(&self) -> Arc<[u8]> {
        Arc::clone(&self.bytes)
    }
}

/// What the query engine returns for one question.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResponse {
    pub text: String,
    /// Page labels of the sources used, in rank order.
    pub source_pages: Vec<String>,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl QueryResponse {
    pub fn new(text: impl Into<String>, source_pages: Vec<String>) -> Self {
        Self {
            text: text.into(),
            source_pages,
            ..Default::default()
        }
    }
}

/// Answers natural-language questions about one indexed document.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    async fn query(&self, question: &str) -> Result<QueryResponse, QueryError>;

    /// Answer while handing text to `on_chunk` as it becomes available.
    ///
    /// Engines without incremental output deliver the whole answer as a
    /// single chunk once it is complete.
    async fn query_streaming(
        &self,
        question: &str,
        on_chunk: &(dyn for<'c> Fn(&'c str) + Send + Sync),
    ) -> Result<QueryResponse, QueryError> {
        let response = self.query(question).await?;
        on_chunk(&response.text);
        Ok(response)
    }
}

/// Builds a [`QueryEngine`] for an uploaded document.
#[async_trait]
pub trait DocumentIndexer: Send + Sync {
    async fn build(&self, document: &UploadedDocument) -> Result<Arc<dyn QueryEngine>, PdfQaError>;
}
