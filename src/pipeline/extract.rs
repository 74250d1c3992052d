//! PDF text extraction: pull the text layer of every page via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which is CPU-bound and not
//! async-aware. Extraction runs on tokio's blocking pool so the runtime's
//! worker threads keep serving other tasks.
//!
//! The pdfium library itself is located (and downloaded on first use) by
//! `pdfium-auto`, then bound once per process.

use crate::engine::UploadedDocument;
use crate::error::PdfQaError;
use crate::pipeline::postprocess::clean_page_text;
use once_cell::sync::OnceCell;
use pdfium_render::prelude::*;
use tracing::{debug, info};

/// Extracted text of one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// The page's label as printed in the document ("iv", "12", "A-3"),
    /// or its 1-based position when the PDF defines none.
    pub label: String,
    pub text: String,
}

static PDFIUM: OnceCell<Pdfium> = OnceCell::new();

fn pdfium() -> Result<&'static Pdfium, PdfQaError> {
    PDFIUM.get_or_try_init(|| {
        pdfium_auto::bind_pdfium_silent()
            .map_err(|e| PdfQaError::PdfiumBindingFailed(e.to_string()))
    })
}

/// Extract the text of every page of `document`.
///
/// Pages without any text are kept (with empty text) so page numbering stays
/// aligned; callers decide whether an all-empty document is an error.
pub async fn extract_pages(
    document: &UploadedDocument,
    password: Option<&str>,
) -> Result<Vec<PageText>, PdfQaError> {
    let name = document.identity().to_string();
    let bytes = document.shared_bytes();
    let password = password.map(str::to_string);

    tokio::task::spawn_blocking(move || extract_pages_blocking(&name, &bytes, password.as_deref()))
        .await
        .map_err(|e| PdfQaError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Blocking implementation of text extraction.
fn extract_pages_blocking(
    name: &str,
    bytes: &[u8],
    password: Option<&str>,
) -> Result<Vec<PageText>, PdfQaError> {
    let pdfium = pdfium()?;

    let document = pdfium
        .load_pdf_from_byte_slice(bytes, password)
        .map_err(|e| classify_load_error(name, password.is_some(), format!("{:?}", e)))?;

    let pages = document.pages();
    info!("PDF '{}' loaded: {} pages", name, pages.len());

    let mut results = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let text = page
            .text()
            .map_err(|e| PdfQaError::TextExtractionFailed {
                name: name.to_string(),
                page: idx + 1,
                detail: format!("{:?}", e),
            })?
            .all();

        let label = page_label(page.label(), idx);
        let text = clean_page_text(&text);
        debug!("Page {} (label '{}'): {} chars", idx + 1, label, text.chars().count());
        results.push(PageText { label, text });
    }

    Ok(results)
}

/// Map a pdfium load failure onto the most helpful error.
fn classify_load_error(name: &str, had_password: bool, detail: String) -> PdfQaError {
    if detail.contains("Password") || detail.contains("password") {
        if had_password {
            PdfQaError::WrongPassword {
                name: name.to_string(),
            }
        } else {
            PdfQaError::PasswordRequired {
                name: name.to_string(),
            }
        }
    } else {
        PdfQaError::CorruptPdf {
            name: name.to_string(),
            detail,
        }
    }
}

/// The label shown in citations for the page at `index` (0-based).
fn page_label(declared: Option<&str>, index: usize) -> String {
    match declared.map(str::trim) {
        Some(label) if !label.is_empty() => label.to_string(),
        _ => (index + 1).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_label_prefers_declared_label() {
        assert_eq!(page_label(Some("iv"), 3), "iv");
        assert_eq!(page_label(Some("  "), 3), "4");
        assert_eq!(page_label(None, 0), "1");
    }

    #[test]
    fn password_errors_are_classified() {
        assert!(matches!(
            classify_load_error("a.pdf", false, "PdfiumLibraryInternalError(PasswordError)".into()),
            PdfQaError::PasswordRequired { .. }
        ));
        assert!(matches!(
            classify_load_error("a.pdf", true, "PasswordError".into()),
            PdfQaError::WrongPassword { .. }
        ));
        assert!(matches!(
            classify_load_error("a.pdf", false, "FormatError".into()),
            PdfQaError::CorruptPdf { .. }
        ));
    }
}
