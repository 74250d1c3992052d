//! Session state: the active document and its conversation history.
//!
//! A [`Session`] belongs to exactly one user interaction context. It is
//! created when the conversation starts, wiped whenever a different document
//! is loaded, and dropped with its owner. Nothing here is global.
//!
//! History is an append-only log of [`Turn`]s. The only ways turns disappear
//! are a full [`Session::reset`] or eviction of the oldest turns when a
//! [`HistoryLimit::MaxTurns`] cap is configured.

use crate::error::PdfQaError;
use crate::prompts::format_source_pages;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::Path;
use tracing::debug;

/// Role of a turn, used by the presentation layer to pick a style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Question,
    Answer,
    Error,
}

/// A generated answer with the pages it was grounded on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    /// Answer text as returned by the query engine.
    pub text: String,
    /// Page labels of the retrieved sources, in rank order.
    pub source_pages: Vec<String>,
    /// Prompt tokens reported by the provider (0 when unknown).
    #[serde(default)]
    pub input_tokens: usize,
    /// Completion tokens reported by the provider (0 when unknown).
    #[serde(default)]
    pub output_tokens: usize,
    /// Wall-clock time of the query.
    #[serde(default)]
    pub duration_ms: u64,
}

impl Answer {
    pub fn new(text: impl Into<String>, source_pages: Vec<String>) -> Self {
        Self {
            text: text.into(),
            source_pages,
            input_tokens: 0,
            output_tokens: 0,
            duration_ms: 0,
        }
    }

    /// Display form: the text, a blank line, then `参照ページ：` and the labels.
    pub fn render(&self) -> String {
        format!("{}\n\n{}", self.text, format_source_pages(&self.source_pages))
    }
}

/// One record in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Turn {
    Question { message: String },
    Answer(Answer),
    Error { message: String },
}

impl Turn {
    pub fn question(message: impl Into<String>) -> Self {
        Turn::Question {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Turn::Error {
            message: message.into(),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Turn::Question { .. } => Role::Question,
            Turn::Answer(_) => Role::Answer,
            Turn::Error { .. } => Role::Error,
        }
    }

    /// The text shown for this turn.
    pub fn message(&self) -> Cow<'_, str> {
        match self {
            Turn::Question { message } | Turn::Error { message } => Cow::Borrowed(message),
            Turn::Answer(answer) => Cow::Owned(answer.render()),
        }
    }
}

/// How much history a session keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HistoryLimit {
    /// Keep every turn for the life of the session. (default)
    #[default]
    Unbounded,
    /// Keep at most this many turns, evicting the oldest first.
    /// Values below 2 are raised to 2 so a question and its answer always fit.
    MaxTurns(usize),
}

impl HistoryLimit {
    fn cap(self) -> Option<usize> {
        match self {
            HistoryLimit::Unbounded => None,
            HistoryLimit::MaxTurns(n) => Some(n.max(2)),
        }
    }
}

/// The per-user, per-document conversation state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    active_document: String,
    history: Vec<Turn>,
    #[serde(skip)]
    limit: HistoryLimit,
}

impl Session {
    /// A fresh session with no active document.
    pub fn new(limit: HistoryLimit) -> Self {
        Self {
            active_document: String::new(),
            history: Vec::new(),
            limit,
        }
    }

    pub fn active_document(&self) -> &str {
        &self.active_document
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn limit(&self) -> HistoryLimit {
        self.limit
    }

    /// Make `document_identity` active and discard every prior turn.
    pub fn reset(&mut self, document_identity: impl Into<String>) {
        self.active_document = document_identity.into();
        self.history.clear();
        debug!("Session reset for '{}'", self.active_document);
    }

    /// Reset only if `identity` differs from the active document.
    ///
    /// Returns `true` when a reset happened.
    pub fn observe_document(&mut self, identity: &str) -> bool {
        if self.active_document == identity {
            return false;
        }
        self.reset(identity);
        true
    }

    /// Append a turn, then evict the oldest turns if over the limit.
    pub fn append_turn(&mut self, turn: Turn) {
        self.history.push(turn);
        if let Some(cap) = self.limit.cap() {
            if self.history.len() > cap {
                let excess = self.history.len() - cap;
                self.history.drain(..excess);
                debug!("Evicted {} turn(s) beyond the {}-turn limit", excess, cap);
            }
        }
    }

    /// The message of the last turn if it is a Question awaiting an answer.
    pub fn latest_unanswered_question(&self) -> Option<&str> {
        match self.history.last() {
            Some(Turn::Question { message }) => Some(message),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }
}

/// Write the session as pretty JSON to `path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn save_transcript(session: &Session, path: impl AsRef<Path>) -> Result<(), PdfQaError> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(session)
        .map_err(|e| PdfQaError::Internal(format!("Failed to serialise session: {e}")))?;
    let write_err = |source: std::io::Error| PdfQaError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("json.tmp");
    tokio::fs::write(&tmp_path, json).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_has_no_document() {
        let s = Session::default();
        assert_eq!(s.active_document(), "");
        assert!(s.is_empty());
        assert_eq!(s.limit(), HistoryLimit::Unbounded);
    }

    #[test]
    fn reset_clears_history() {
        let mut s = Session::default();
        s.reset("a.pdf");
        s.append_turn(Turn::question("q1"));
        s.append_turn(Turn::Answer(Answer::new("a1", vec!["1".into()])));
        s.reset("b.pdf");
        assert_eq!(s.active_document(), "b.pdf");
        assert!(s.history().is_empty());
    }

    #[test]
    fn observe_same_document_keeps_history() {
        let mut s = Session::default();
        assert!(s.observe_document("a.pdf"));
        s.append_turn(Turn::question("q"));
        assert!(!s.observe_document("a.pdf"));
        assert_eq!(s.len(), 1);
        assert!(s.observe_document("b.pdf"));
        assert!(s.is_empty());
    }

    #[test]
    fn observe_empty_identity_on_fresh_session_is_noop() {
        let mut s = Session::default();
        assert!(!s.observe_document(""));
    }

    #[test]
    fn latest_unanswered_question_only_when_last() {
        let mut s = Session::default();
        assert_eq!(s.latest_unanswered_question(), None);
        s.append_turn(Turn::question("What is X?"));
        assert_eq!(s.latest_unanswered_question(), Some("What is X?"));
        s.append_turn(Turn::error("boom"));
        assert_eq!(s.latest_unanswered_question(), None);
    }

    #[test]
    fn capped_history_evicts_oldest() {
        let mut s = Session::new(HistoryLimit::MaxTurns(3));
        for i in 0..5 {
            s.append_turn(Turn::question(format!("q{i}")));
        }
        let msgs: Vec<_> = s.history().iter().map(|t| t.message().into_owned()).collect();
        assert_eq!(msgs, vec!["q2", "q3", "q4"]);
    }

    #[test]
    fn tiny_cap_still_holds_question_and_answer() {
        let mut s = Session::new(HistoryLimit::MaxTurns(0));
        s.append_turn(Turn::question("q"));
        s.append_turn(Turn::Answer(Answer::new("a", vec![])));
        assert_eq!(s.len(), 2);
        assert_eq!(s.history()[0].role(), Role::Question);
    }

    #[test]
    fn answer_message_includes_source_pages() {
        let turn = Turn::Answer(Answer::new("X is Y.", vec!["1".into(), "3".into()]));
        assert_eq!(turn.message(), "X is Y.\n\n参照ページ：1, 3");
        assert_eq!(turn.role(), Role::Answer);
    }

    #[tokio::test]
    async fn save_transcript_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("a.qa.json");
        let mut s = Session::default();
        s.reset("a.pdf");
        s.append_turn(Turn::question("q"));

        save_transcript(&s, &path).await.unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["active_document"], "a.pdf");
        assert_eq!(written["history"][0]["role"], "question");
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn turns_serialise_with_role_tag() {
        let json = serde_json::to_string(&Turn::question("hi")).unwrap();
        assert_eq!(json, r#"{"role":"question","message":"hi"}"#);
        let back: Turn = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Turn::question("hi"));
    }
}
