//! Error types for the edgequake-pdfqa library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PdfQaError`] — **Fatal**: the operation cannot proceed at all (bad
//!   input file, corrupt PDF, provider not configured). Returned as
//!   `Err(PdfQaError)` from document loading and configuration.
//!
//! * [`QueryError`] — **Conversational**: answering one question failed
//!   (network glitch, provider error, timeout, no index). It never reaches
//!   the caller of [`crate::controller::Conversation`]; the controller turns
//!   it into an Error turn with a fixed user-facing message so the user can
//!   simply ask again.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdfqa library.
#[derive(Debug, Error)]
pub enum PdfQaError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes were read, but they are not a PDF.
    #[error("Document '{name}' is not a valid PDF\nFirst bytes: {magic:?}")]
    NotAPdf { name: String, magic: Vec<u8> },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// pdfium could not parse the document.
    #[error("PDF '{name}' is corrupt: {detail}")]
    CorruptPdf { name: String, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{name}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { name: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{name}'")]
    WrongPassword { name: String },

    /// Text extraction failed for a specific page.
    #[error("Text extraction failed for page {page} of '{name}': {detail}")]
    TextExtractionFailed {
        name: String,
        page: usize,
        detail: String,
    },

    /// The PDF parsed fine but has no extractable text (e.g. scanned images).
    #[error("PDF '{name}' contains no extractable text ({pages} pages)")]
    EmptyDocument { name: String, pages: usize },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Excerpts of a document could not be embedded or indexed.
    #[error("Failed to build the search index for '{name}': {detail}")]
    EmbeddingFailed { name: String, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not write the transcript file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDFium is normally downloaded automatically on first run.\n\
If the auto-download failed, you can:\n\
  • Check your internet connection and try again.\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium to use an existing copy.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a single question could not be answered.
///
/// Every variant collapses to the same Error turn in the conversation
/// history; the detail only ever reaches the logs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    /// No document index is available (nothing loaded, or indexing failed).
    #[error("no document index is available")]
    NoIndex,

    /// The LLM provider returned an error.
    #[error("LLM call failed: {0}")]
    Provider(String),

    /// The query exceeded `api_timeout_secs`.
    #[error("query timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The provider answered with nothing usable.
    #[error("LLM returned an empty answer")]
    EmptyAnswer,
}
