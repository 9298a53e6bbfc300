//! Error types for the docsend-dl library.
//!
//! Three layers of error reflect three layers of the pipeline:
//!
//! * [`HttpError`]: **Transport**: a request could not be sent, the server
//!   answered with a non-retryable status, or the retry budget for transient
//!   5xx answers ran out. It never reaches callers on its own; it is carried
//!   as the `source` of a stage error.
//!
//! * [`PageError`]: **Per page**: one page worker failed. Always names the
//!   page number so a caller can see which page broke the run.
//!
//! * [`DocsendError`]: **Fatal**: returned by every public entry point. A
//!   download either produces its complete output or returns one of these;
//!   there is no partial-success result.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the docsend-dl library.
#[derive(Debug, Error)]
pub enum DocsendError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The identifier has no usable trailing path segment.
    #[error("Invalid document identifier '{input}': expected an id like 'abc123' or a viewer URL")]
    InvalidDocumentId { input: String },

    // ── Stage errors ──────────────────────────────────────────────────────
    /// The landing page could not be fetched or did not contain a page count.
    #[error("Failed to resolve metadata for document '{doc_id}': {reason}")]
    Metadata {
        doc_id: String,
        reason: String,
        #[source]
        source: Option<HttpError>,
    },

    /// The viewer rejected the credentials, or the form could not be submitted.
    #[error("Authorization failed for document '{doc_id}': {reason}\nCheck --email / --passcode.")]
    Authorization {
        doc_id: String,
        reason: String,
        #[source]
        source: Option<HttpError>,
    },

    /// A page worker failed; the whole batch (and run) is aborted.
    #[error(transparent)]
    PageFetch(#[from] PageError),

    /// The output PDF or image directory could not be produced.
    #[error("Failed to assemble output '{path}': {detail}")]
    Assembly { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failure of a single page worker.
///
/// Each variant records the 1-indexed page number and the step that failed.
#[derive(Debug, Error)]
pub enum PageError {
    /// The `page_data` request failed.
    #[error("Page {page}: page data request failed: {source}")]
    PageData {
        page: usize,
        #[source]
        source: HttpError,
    },

    /// The `page_data` body was not JSON or had no `imageUrl` field.
    #[error("Page {page}: malformed page data: {detail}")]
    MalformedPageData { page: usize, detail: String },

    /// Downloading the rendered page image failed.
    #[error("Page {page}: image download failed: {source}")]
    ImageDownload {
        page: usize,
        #[source]
        source: HttpError,
    },

    /// The downloaded bytes are not a decodable image.
    #[error("Page {page}: image decode failed: {detail}")]
    Decode { page: usize, detail: String },

    /// The blocking decode task panicked or was cancelled.
    #[error("Page {page}: worker task failed: {detail}")]
    Task { page: usize, detail: String },
}

impl PageError {
    /// The 1-indexed page number this error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::PageData { page, .. }
            | PageError::MalformedPageData { page, .. }
            | PageError::ImageDownload { page, .. }
            | PageError::Decode { page, .. }
            | PageError::Task { page, .. } => *page,
        }
    }
}

/// Transport-level failure of one logical request (all attempts included).
#[derive(Debug, Error)]
pub enum HttpError {
    /// The request could not be sent or the connection broke.
    #[error("request to '{url}' failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a status that is not retried (e.g. 401, 404).
    #[error("'{url}' returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// Every attempt hit a transient failure.
    #[error("'{url}' still failing after {attempts} attempts (last: {last})")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        last: String,
    },

    /// The response body could not be read.
    #[error("reading body of '{url}' failed: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl HttpError {
    /// HTTP status of the final answer, when the server sent one.
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// `true` when the retry budget was used up on transient failures.
    pub fn is_retries_exhausted(&self) -> bool {
        matches!(self, HttpError::RetriesExhausted { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_error_display_names_page() {
        let e = PageError::Decode {
            page: 7,
            detail: "unsupported format".into(),
        };
        assert_eq!(e.page(), 7);
        assert!(e.to_string().contains("Page 7"), "got: {e}");
    }

    #[test]
    fn page_fetch_is_transparent() {
        let e: DocsendError = PageError::MalformedPageData {
            page: 3,
            detail: "missing field `imageUrl`".into(),
        }
        .into();
        let msg = e.to_string();
        assert!(msg.starts_with("Page 3"), "got: {msg}");
        assert!(msg.contains("imageUrl"));
    }

    #[test]
    fn retries_exhausted_display() {
        let e = HttpError::RetriesExhausted {
            url: "https://docsend.com/view/abc".into(),
            attempts: 4,
            last: "HTTP 503".into(),
        };
        assert!(e.is_retries_exhausted());
        assert!(e.to_string().contains("4 attempts"));
        assert!(e.to_string().contains("503"));
        assert_eq!(e.status(), None);
    }

    #[test]
    fn metadata_error_display() {
        let e = DocsendError::Metadata {
            doc_id: "abc123".into(),
            reason: "no thumbnail containers found".into(),
            source: None,
        };
        let msg = e.to_string();
        assert!(msg.contains("abc123"));
        assert!(msg.contains("thumbnail"));
    }

    #[test]
    fn status_error_exposes_code() {
        let e = HttpError::Status {
            url: "https://docsend.com/view/abc".into(),
            status: 403,
        };
        assert_eq!(e.status(), Some(403));
        assert!(!e.is_retries_exhausted());
    }
}
