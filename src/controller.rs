//! The conversation controller: one state machine per user session.
//!
//! ```text
//!  upload(doc) ──▶ identity changed? ──yes──▶ reset + index
//!                        │no
//!                        ▼
//!  submit(text) ──▶ append Question
//!                        │
//!  resolve() ──▶ last turn a Question? ──no──▶ no-op
//!                        │yes
//!                        ▼
//!               QueryEngine::query ──ok──▶ append Answer
//!                        │err
//!                        ▼
//!                  append Error (fixed message)
//! ```
//!
//! The guard in [`Conversation::resolve_latest_question`] is what makes
//! re-rendering safe: once the last question has an Answer or Error after it,
//! resolving again does nothing.

use crate::config::AssistantConfig;
use crate::engine::{DocumentIndexer, QueryEngine, UploadedDocument};
use crate::error::{PdfQaError, QueryError};
use crate::events::EventsHandle;
use crate::prompts::QUERY_FAILED_MESSAGE;
use crate::session::{Answer, Session, Turn};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// What [`Conversation::on_document_uploaded`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    /// Same document as before; history untouched.
    Unchanged,
    /// Same document, but its earlier indexing had failed and now succeeded.
    /// History untouched.
    Reindexed,
    /// A different document: history cleared and an index is ready.
    Switched { from_cache: bool },
}

/// What [`Conversation::resolve_latest_question`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// Nothing to answer: history empty or last turn not a Question.
    Idle,
    /// An Answer turn was appended.
    Answered,
    /// An Error turn was appended.
    Failed(QueryError),
}

/// Recently built engines keyed by document identity, oldest first.
struct IndexCache {
    capacity: usize,
    entries: VecDeque<(String, Arc<dyn QueryEngine>)>,
}

impl IndexCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    fn get(&self, identity: &str) -> Option<Arc<dyn QueryEngine>> {
        self.entries
            .iter()
            .find(|(id, _)| id == identity)
            .map(|(_, engine)| Arc::clone(engine))
    }

    fn insert(&mut self, identity: &str, engine: Arc<dyn QueryEngine>) {
        self.entries.retain(|(id, _)| id != identity);
        self.entries.push_back((identity.to_string(), engine));
        while self.entries.len() > self.capacity {
            if let Some((evicted, _)) = self.entries.pop_front() {
                debug!("Evicted cached index for '{}'", evicted);
            }
        }
    }
}

/// Session state plus the collaborators needed to answer questions about
/// the active document.
pub struct Conversation {
    session: Session,
    indexer: Arc<dyn DocumentIndexer>,
    engine: Option<Arc<dyn QueryEngine>>,
    cache: IndexCache,
    events: Option<EventsHandle>,
}

impl Conversation {
    pub fn new(indexer: Arc<dyn DocumentIndexer>, config: &AssistantConfig) -> Self {
        Self {
            session: Session::new(config.history_limit),
            indexer,
            engine: None,
            cache: IndexCache::new(config.index_cache_capacity),
            events: config.events.clone(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn history(&self) -> &[Turn] {
        self.session.history()
    }

    pub fn active_document(&self) -> &str {
        self.session.active_document()
    }

    /// Whether an index for the active document is ready.
    pub fn has_index(&self) -> bool {
        self.engine.is_some()
    }

    /// Make `document` the active document.
    ///
    /// A different identity clears the history before indexing starts, so
    /// even when indexing fails nothing from the previous document survives.
    /// The same identity is a no-op unless the last indexing attempt failed,
    /// in which case it is retried without touching history.
    pub async fn on_document_uploaded(
        &mut self,
        document: &UploadedDocument,
    ) -> Result<UploadOutcome, PdfQaError> {
        let identity = document.identity();
        let switched = self.session.observe_document(identity);

        if !switched && self.engine.is_some() {
            return Ok(UploadOutcome::Unchanged);
        }

        if switched {
            info!("Active document is now '{}'", identity);
            self.engine = None;
            if let Some(engine) = self.cache.get(identity) {
                self.engine = Some(engine);
                self.emit(|ev| ev.on_index_complete(identity, true));
                return Ok(UploadOutcome::Switched { from_cache: true });
            }
        }

        self.emit(|ev| ev.on_index_start(identity));
        match self.indexer.build(document).await {
            Ok(engine) => {
                self.cache.insert(identity, Arc::clone(&engine));
                self.engine = Some(engine);
                self.emit(|ev| ev.on_index_complete(identity, false));
                Ok(if switched {
                    UploadOutcome::Switched { from_cache: false }
                } else {
                    UploadOutcome::Reindexed
                })
            }
            Err(e) => {
                warn!("Indexing '{}' failed: {}", identity, e);
                let detail = e.to_string();
                self.emit(|ev| ev.on_index_error(identity, &detail));
                Err(e)
            }
        }
    }

    /// Record a question. Answering it is a separate step.
    pub fn on_question_submitted(&mut self, text: impl Into<String>) {
        self.session.append_turn(Turn::question(text));
    }

    /// Answer the last turn if it is an unanswered question.
    ///
    /// Query failures never escape: they become an Error turn carrying
    /// [`QUERY_FAILED_MESSAGE`]. Nothing is retried.
    pub async fn resolve_latest_question(&mut self) -> ResolveOutcome {
        let Some(question) = self.session.latest_unanswered_question() else {
            return ResolveOutcome::Idle;
        };
        let question = question.to_string();

        self.emit(|ev| ev.on_query_start(&question));
        let start = Instant::now();
        let result = match self.engine {
            Some(ref engine) => {
                let events = self.events.clone();
                let sink = move |chunk: &str| {
                    if let Some(ref ev) = events {
                        ev.on_answer_chunk(chunk);
                    }
                };
                engine.query_streaming(&question, &sink).await
            }
            None => Err(QueryError::NoIndex),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(response) => {
                debug!(
                    "Answered in {}ms from pages {:?}",
                    duration_ms, response.source_pages
                );
                self.session.append_turn(Turn::Answer(Answer {
                    text: response.text,
                    source_pages: response.source_pages,
                    input_tokens: response.input_tokens,
                    output_tokens: response.output_tokens,
                    duration_ms,
                }));
                self.emit(|ev| ev.on_query_complete(&question, duration_ms));
                ResolveOutcome::Answered
            }
            Err(e) => {
                warn!("Query failed after {}ms: {}", duration_ms, e);
                self.session.append_turn(Turn::error(QUERY_FAILED_MESSAGE));
                let detail = e.to_string();
                self.emit(|ev| ev.on_query_error(&question, &detail));
                ResolveOutcome::Failed(e)
            }
        }
    }

    /// Submit a question and resolve it.
    pub async fn ask(&mut self, text: impl Into<String>) -> ResolveOutcome {
        self.on_question_submitted(text);
        self.resolve_latest_question().await
    }

    fn emit(&self, f: impl FnOnce(&dyn crate::events::ConversationEvents)) {
        if let Some(ref ev) = self.events {
            f(ev.as_ref());
        }
    }
}
