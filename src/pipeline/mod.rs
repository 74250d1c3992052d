//! Pipeline stages behind the default document index and query engine.
//!
//! Each submodule implements exactly one step, so each is testable alone
//! and can be swapped without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ chunk ──▶ embed ──▶ retrieve ──▶ llm ──▶ postprocess
//! (path/URL) (pdfium)   (pages)   (vectors) (HNSW)      (chat)  (cleanup)
//! ```
//!
//! 1. [`input`]   — read the user-supplied path or URL into memory
//! 2. [`extract`] — pull each page's text layer; runs in `spawn_blocking`
//!    because pdfium is not async-safe
//! 3. [`chunk`]   — split pages into overlapping, page-scoped excerpts
//! 4. [`embed`]   — excerpt and question vectors from the embedding provider
//! 5. [`retrieve`] — cosine nearest neighbours of the question
//! 6. [`llm`]     — answer generation, whole or streamed
//! 7. [`postprocess`] — deterministic text cleanup for pages and answers

pub mod chunk;
pub mod embed;
pub mod extract;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod retrieve;
