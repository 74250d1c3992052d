//! # edgequake-pdfqa
//!
//! Ask questions about a PDF and get answers, with the pages they came from,
//! from any LLM supported by `edgequake-llm`.
//!
//! ## How a question is answered
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     resolve local file or download from URL
//!  ├─ 2. Extract   text layer of every page via pdfium (spawn_blocking)
//!  ├─ 3. Chunk     page-scoped excerpts, so each cites exactly one page
//!  ├─ 4. Embed     excerpts via the provider's embedding model
//!  ├─ 5. Retrieve  HNSW cosine search, top-k excerpts
//!  ├─ 6. Generate  Japanese QA prompt → gpt-4.1-nano / claude / gemini / … (streamed)
//!  └─ 7. Record    Answer turn with "参照ページ：" citations, or Error turn
//! ```
//!
//! The part this crate really owns is the [`Conversation`]: a per-session
//! state machine that tracks the active document and the ordered
//! Question / Answer / Error history, resets when a different document is
//! loaded, and answers only the latest unanswered question.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdfqa::{resolve_input, AssistantConfig, Conversation, PdfIndexer};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = AssistantConfig::default();
//!     let indexer = Arc::new(PdfIndexer::from_config(&config)?);
//!     let mut conversation = Conversation::new(indexer, &config);
//!
//!     let document = resolve_input("manual.pdf", config.download_timeout_secs).await?;
//!     conversation.on_document_uploaded(&document).await?;
//!     conversation.ask("この製品の保証期間は？").await;
//!
//!     for turn in conversation.history() {
//!         println!("{:?}: {}", turn.role(), turn.message());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature   | Default | Description |
//! |-----------|---------|-------------|
//! | `cli`     | on      | Enables the `pdfqa` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `bundled` | off     | Embeds the pdfium shared library in the binary |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod controller;
pub mod engine;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod prompts;
pub mod provider;
pub mod rag;
pub mod session;

#[cfg(test)]
mod test_support;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{AssistantConfig, AssistantConfigBuilder, DEFAULT_MODEL};
pub use controller::{Conversation, ResolveOutcome, UploadOutcome};
pub use engine::{DocumentIndexer, QueryEngine, QueryResponse, UploadedDocument};
pub use error::{PdfQaError, QueryError};
pub use events::{ConversationEvents, EventsHandle, NoopEvents};
pub use pipeline::input::{default_transcript_path, from_bytes, resolve_input};
pub use prompts::{DEFAULT_QA_TEMPLATE, INTRO_PROMPT, QUERY_FAILED_MESSAGE};
pub use rag::{PdfIndexer, RagQueryEngine};
pub use session::{save_transcript, Answer, HistoryLimit, Role, Session, Turn};
