//! Input resolution: turn a user-supplied path or URL into an
//! [`UploadedDocument`].
//!
//! The document's identity is its file name, so loading `report.pdf` twice
//! keeps the conversation while loading `other.pdf` starts over. Bytes are
//! checked for the `%PDF` magic before anything else sees them so callers get
//! a meaningful error rather than a pdfium failure.

use crate::engine::UploadedDocument;
use crate::error::PdfQaError;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a loaded document.
///
/// URLs are downloaded in full; local paths are read from disk.
pub async fn resolve_input(
    input: &str,
    timeout_secs: u64,
) -> Result<UploadedDocument, PdfQaError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(Path::new(input)).await
    }
}

/// Wrap in-memory bytes as a document after validating the PDF magic.
pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Result<UploadedDocument, PdfQaError> {
    let name = name.into();
    check_magic(&name, &bytes)?;
    Ok(UploadedDocument::new(name, bytes))
}

fn check_magic(name: &str, bytes: &[u8]) -> Result<(), PdfQaError> {
    if bytes.len() < PDF_MAGIC.len() || &bytes[..PDF_MAGIC.len()] != PDF_MAGIC {
        return Err(PdfQaError::NotAPdf {
            name: name.to_string(),
            magic: bytes.iter().take(4).copied().collect(),
        });
    }
    Ok(())
}

/// Read a local PDF and name it after its file name.
async fn read_local(path: &Path) -> Result<UploadedDocument, PdfQaError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::PermissionDenied => PdfQaError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => PdfQaError::FileNotFound {
            path: path.to_path_buf(),
        },
    })?;

    let name = document_name(path);
    debug!("Read local PDF '{}' ({} bytes)", name, bytes.len());
    from_bytes(name, bytes)
}

fn document_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Download a URL into memory.
async fn download_url(url: &str, timeout_secs: u64) -> Result<UploadedDocument, PdfQaError> {
    info!("Downloading PDF from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| PdfQaError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            PdfQaError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            PdfQaError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(PdfQaError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| PdfQaError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let name = filename_from_url(url);
    info!("Downloaded '{}' ({} bytes)", name, bytes.len());
    from_bytes(name, bytes.to_vec())
}

/// Extract a reasonable document name from the URL path.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.pdf".to_string()
}

/// Where a transcript for `document` is saved by default.
pub fn default_transcript_path(document: &str) -> PathBuf {
    let stem = Path::new(document)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "session".to_string());
    PathBuf::from(format!("{stem}.qa.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.pdf"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url("doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn filename_from_url_uses_last_segment() {
        assert_eq!(filename_from_url("https://arxiv.org/pdf/1706.03762"), "1706.03762");
        assert_eq!(filename_from_url("https://example.com/a/manual.pdf"), "manual.pdf");
        assert_eq!(filename_from_url("https://example.com/"), "downloaded.pdf");
    }

    #[test]
    fn from_bytes_rejects_non_pdf() {
        let err = from_bytes("notes.txt", b"hello".to_vec()).unwrap_err();
        match err {
            PdfQaError::NotAPdf { name, magic } => {
                assert_eq!(name, "notes.txt");
                assert_eq!(magic, b"hell".to_vec());
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(from_bytes("tiny", b"%P".to_vec()).is_err());
    }

    #[test]
    fn default_transcript_path_uses_stem() {
        assert_eq!(default_transcript_path("a.pdf"), PathBuf::from("a.qa.json"));
    }

    #[tokio::test]
    async fn local_file_identity_is_file_name() {
        let mut tmp = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        tmp.write_all(b"%PDF-1.4\n%%EOF\n").unwrap();
        let path = tmp.path().to_str().unwrap().to_string();

        let doc = resolve_input(&path, 5).await.unwrap();
        let expected = tmp.path().file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(doc.identity(), expected);
        assert!(doc.bytes().starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn missing_local_file_is_not_found() {
        let err = resolve_input("/definitely/not/here.pdf", 5).await.unwrap_err();
        assert!(matches!(err, PdfQaError::FileNotFound { .. }));
    }
}
