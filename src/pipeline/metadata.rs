//! Metadata resolution: landing page → authenticity token + page count.
//!
//! The viewer's landing page renders one `.document-thumb-container` per
//! page, each carrying a `data-page-num` attribute; the last one holds the
//! page count. A gated document additionally renders the authorization form,
//! whose hidden `authenticity_token` input is needed to submit it.
//!
//! `scraper::Html` is not `Send`, so parsing happens in a plain function
//! after the body has been read and never across an `.await`.

use crate::document::{Document, DocumentRef};
use crate::error::DocsendError;
use crate::session::Session;
use scraper::{Html, Selector};
use tracing::{debug, info};

/// Fields extracted from the landing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerMetadata {
    pub authenticity_token: Option<String>,
    pub page_count: usize,
}

/// Fetch the landing page and build a resolved [`Document`].
pub async fn resolve(
    session: &Session,
    reference: DocumentRef,
    batch_size: usize,
) -> Result<Document, DocsendError> {
    info!("Resolving metadata: {}", reference.viewer_url());

    let body = session
        .get_bytes(reference.viewer_url())
        .await
        .map_err(|source| DocsendError::Metadata {
            doc_id: reference.doc_id().to_string(),
            reason: "landing page request failed".to_string(),
            source: Some(source),
        })?;

    let html = String::from_utf8_lossy(&body);
    let meta = parse_viewer_page(&html).map_err(|reason| DocsendError::Metadata {
        doc_id: reference.doc_id().to_string(),
        reason,
        source: None,
    })?;

    info!(
        "Document '{}' has {} pages ({})",
        reference.doc_id(),
        meta.page_count,
        if meta.authenticity_token.is_some() {
            "authorization form present"
        } else {
            "public"
        }
    );

    Ok(Document::resolved(
        reference,
        meta.authenticity_token,
        meta.page_count,
        batch_size,
    ))
}

/// Extract the token and page count from landing-page HTML.
pub fn parse_viewer_page(html: &str) -> Result<ViewerMetadata, String> {
    let document = Html::parse_document(html);

    let token_selector = selector(r#"input[name="authenticity_token"]"#)?;
    let authenticity_token = document
        .select(&token_selector)
        .next()
        .and_then(|input| input.value().attr("value"))
        .map(str::to_string);

    let thumb_selector = selector(".document-thumb-container")?;
    let last_thumb = document
        .select(&thumb_selector)
        .last()
        .ok_or_else(|| "no thumbnail containers found on the viewer page".to_string())?;

    let raw = last_thumb
        .value()
        .attr("data-page-num")
        .ok_or_else(|| "last thumbnail container has no data-page-num attribute".to_string())?;

    let page_count: usize = raw
        .trim()
        .parse()
        .map_err(|_| format!("data-page-num '{raw}' is not a page number"))?;
    if page_count == 0 {
        return Err("viewer reports 0 pages".to_string());
    }

    debug!(
        "Parsed viewer page: {} pages, token {}",
        page_count,
        if authenticity_token.is_some() { "found" } else { "absent" }
    );

    Ok(ViewerMetadata {
        authenticity_token,
        page_count,
    })
}

fn selector(css: &str) -> Result<Selector, String> {
    Selector::parse(css).map_err(|e| format!("invalid selector '{css}': {e:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thumbs(n: usize) -> String {
        (1..=n)
            .map(|i| format!(r#"<div class="document-thumb-container" data-page-num="{i}"></div>"#))
            .collect()
    }

    #[test]
    fn public_document() {
        let html = format!("<html><body>{}</body></html>", thumbs(12));
        let meta = parse_viewer_page(&html).unwrap();
        assert_eq!(meta.page_count, 12);
        assert_eq!(meta.authenticity_token, None);
    }

    #[test]
    fn gated_document_has_token() {
        let html = format!(
            r#"<form><input type="hidden" name="authenticity_token" value="tok=="></form>{}"#,
            thumbs(3)
        );
        let meta = parse_viewer_page(&html).unwrap();
        assert_eq!(meta.authenticity_token.as_deref(), Some("tok=="));
        assert_eq!(meta.page_count, 3);
    }

    #[test]
    fn last_container_wins() {
        let html = r#"
            <div class="document-thumb-container" data-page-num="1"></div>
            <div class="thumb document-thumb-container" data-page-num="40"></div>
        "#;
        assert_eq!(parse_viewer_page(html).unwrap().page_count, 40);
    }

    #[test]
    fn missing_thumbnails_is_error() {
        let err = parse_viewer_page("<html><body>Not found</body></html>").unwrap_err();
        assert!(err.contains("thumbnail"), "got: {err}");
    }

    #[test]
    fn non_numeric_page_count_is_error() {
        let html = r#"<div class="document-thumb-container" data-page-num="many"></div>"#;
        assert!(parse_viewer_page(html).unwrap_err().contains("many"));
    }

    #[test]
    fn zero_pages_is_error() {
        let html = r#"<div class="document-thumb-container" data-page-num="0"></div>"#;
        assert!(parse_viewer_page(html).is_err());
    }
}
