//! Document identity and resolved document state.
//!
//! Two types split the lifecycle of a document:
//!
//! * [`DocumentRef`]: what the caller typed: an id (or viewer URL) reduced to
//!   its trailing path segment, plus the derived viewer URL. Nothing is known
//!   about the content yet.
//! * [`Document`]: produced only by the metadata resolver. Carries the page
//!   count and the optional authenticity token and is never mutated again, so
//!   every later stage can rely on `page_count` being known.

use crate::error::DocsendError;
use serde::Serialize;

/// An unresolved document: identity only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentRef {
    doc_id: String,
    viewer_url: String,
}

impl DocumentRef {
    /// Parse a document id or viewer URL.
    ///
    /// Only the trailing non-empty path segment is kept, so
    /// `abc123`, `docsend.com/view/abc123` and
    /// `https://docsend.com/view/abc123/?utm=x` all name `abc123`.
    pub fn parse(input: &str, base_url: &str) -> Result<Self, DocsendError> {
        let trimmed = input.trim();
        let path = match reqwest::Url::parse(trimmed) {
            Ok(url) if url.has_host() => url.path().to_string(),
            _ => trimmed
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .to_string(),
        };

        let doc_id = path
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .ok_or_else(|| DocsendError::InvalidDocumentId {
                input: input.to_string(),
            })?
            .to_string();

        let viewer_url = format!("{}/view/{}", base_url.trim_end_matches('/'), doc_id);
        Ok(Self { doc_id, viewer_url })
    }

    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    pub fn viewer_url(&self) -> &str {
        &self.viewer_url
    }
}

/// A document whose metadata has been resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    doc_id: String,
    viewer_url: String,
    authenticity_token: Option<String>,
    page_count: usize,
    batch_size: usize,
}

impl Document {
    /// Only the metadata resolver (and tests) build resolved documents.
    pub(crate) fn resolved(
        reference: DocumentRef,
        authenticity_token: Option<String>,
        page_count: usize,
        batch_size: usize,
    ) -> Self {
        Self {
            doc_id: reference.doc_id,
            viewer_url: reference.viewer_url,
            authenticity_token,
            page_count,
            batch_size,
        }
    }

    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    pub fn viewer_url(&self) -> &str {
        &self.viewer_url
    }

    /// Anti-forgery token of the authorization form, when the viewer shows one.
    pub fn authenticity_token(&self) -> Option<&str> {
        self.authenticity_token.as_deref()
    }

    /// Total pages, always ≥ 1.
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Endpoint returning the JSON page descriptor for a 1-indexed page.
    pub fn page_data_url(&self, page: usize) -> String {
        format!("{}/page_data/{}", self.viewer_url, page)
    }
}
