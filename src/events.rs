//! Callback trait for conversation lifecycle events.
//!
//! Inject an [`Arc<dyn ConversationEvents>`] via
//! [`crate::config::AssistantConfigBuilder::events`] to observe indexing and
//! question answering as it happens: drive a spinner, forward answer chunks
//! to a terminal or socket, or record timings.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdfqa::{AssistantConfig, ConversationEvents};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingEvents {
//!     answered: AtomicUsize,
//! }
//!
//! impl ConversationEvents for CountingEvents {
//!     fn on_query_complete(&self, _question: &str, _duration_ms: u64) {
//!         self.answered.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = AssistantConfig::builder()
//!     .events(Arc::new(CountingEvents { answered: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the conversation controller at each step of an interaction.
///
/// All methods have no-op defaults so implementors only override what they
/// care about. Implementations must be `Send + Sync`.
pub trait ConversationEvents: Send + Sync {
    /// A document is about to be indexed.
    fn on_index_start(&self, document: &str) {
        let _ = document;
    }

    /// Indexing finished; `from_cache` is true when no work was needed.
    fn on_index_complete(&self, document: &str, from_cache: bool) {
        let _ = (document, from_cache);
    }

    /// Indexing failed; the conversation holds no index for `document`.
    fn on_index_error(&self, document: &str, error: &str) {
        let _ = (document, error);
    }

    /// The latest question is being sent to the query engine.
    fn on_query_start(&self, question: &str) {
        let _ = question;
    }

    /// A piece of answer text is available.
    fn on_answer_chunk(&self, chunk: &str) {
        let _ = chunk;
    }

    /// The question was answered.
    fn on_query_complete(&self, question: &str, duration_ms: u64) {
        let _ = (question, duration_ms);
    }

    /// The question could not be answered. `error` is the internal detail,
    /// not the message shown to the user.
    fn on_query_error(&self, question: &str, error: &str) {
        let _ = (question, error);
    }
}

/// A no-op implementation for callers that don't need events.
pub struct NoopEvents;

impl ConversationEvents for NoopEvents {}

/// Convenience alias matching the type stored in [`crate::config::AssistantConfig`].
pub type EventsHandle = Arc<dyn ConversationEvents>;
