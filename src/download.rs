//! Download entry points.
//!
//! Every entry point follows the same shape:
//!
//! 1. parse the identifier into a [`DocumentRef`]
//! 2. open the [`Session`]
//! 3. resolve metadata, authorize if the viewer shows a form
//! 4. run the batch scheduler into a [`PageSink`] and finish it
//! 5. close the session, whether or not steps 3–4 succeeded

use crate::config::DownloadConfig;
use crate::document::{Document, DocumentRef};
use crate::error::DocsendError;
use crate::output::{DownloadReport, OutputTarget};
use crate::pipeline::assemble::{ImageDirAssembler, MemorySink, PageSink, PdfAssembler};
use crate::pipeline::page::PageImage;
use crate::pipeline::{auth, batch, metadata};
use crate::session::Session;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Download a document and write it to `target`.
///
/// # Arguments
/// * `input`: document id or viewer URL
/// * `target`: PDF file or PNG directory
/// * `config`: download configuration
///
/// # Errors
/// Any stage failure aborts the run; nothing is written at the target path
/// unless every page was fetched.
pub async fn download(
    input: impl AsRef<str>,
    target: &OutputTarget,
    config: &DownloadConfig,
) -> Result<DownloadReport, DocsendError> {
    let start = Instant::now();
    let input = input.as_ref();
    info!("Starting download: {} → {}", input, target.path().display());

    let outcome = match target {
        OutputTarget::Pdf(path) => {
            let path = path.clone();
            run(input, config, move |_| Ok(PdfAssembler::new(path))).await?
        }
        OutputTarget::Images(dir) => {
            let dir = dir.clone();
            run(input, config, move |_| ImageDirAssembler::new(dir)).await?
        }
    };

    let report = DownloadReport {
        doc_id: outcome.document.doc_id().to_string(),
        page_count: outcome.document.page_count(),
        batches: outcome.batches,
        output_path: outcome.output,
        authorized: outcome.authorized,
        total_duration_ms: start.elapsed().as_millis() as u64,
    };

    info!(
        "Download complete: {} pages in {}ms",
        report.page_count, report.total_duration_ms
    );
    Ok(report)
}

/// Download a document as a single PDF.
pub async fn download_to_pdf(
    input: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &DownloadConfig,
) -> Result<DownloadReport, DocsendError> {
    let target = OutputTarget::Pdf(output_path.as_ref().to_path_buf());
    download(input, &target, config).await
}

/// Download a document as `1.png`, `2.png`, … in `output_dir`.
pub async fn download_to_images(
    input: impl AsRef<str>,
    output_dir: impl AsRef<Path>,
    config: &DownloadConfig,
) -> Result<DownloadReport, DocsendError> {
    let target = OutputTarget::Images(output_dir.as_ref().to_path_buf());
    download(input, &target, config).await
}

/// Synchronous wrapper around [`download`].
///
/// Creates a temporary tokio runtime internally.
pub fn download_sync(
    input: impl AsRef<str>,
    target: &OutputTarget,
    config: &DownloadConfig,
) -> Result<DownloadReport, DocsendError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DocsendError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(download(input, target, config))
}

/// Fetch every page into memory, in page order.
///
/// Holds the whole document in memory; prefer [`download`] for long documents.
pub async fn fetch_pages(
    input: impl AsRef<str>,
    config: &DownloadConfig,
) -> Result<(Document, Vec<PageImage>), DocsendError> {
    let outcome = run(input.as_ref(), config, |_| Ok(MemorySink::new())).await?;
    Ok((outcome.document, outcome.output))
}

/// Resolve a document's metadata without authorizing or fetching pages.
pub async fn inspect(
    input: impl AsRef<str>,
    config: &DownloadConfig,
) -> Result<Document, DocsendError> {
    config.validate()?;
    let reference = DocumentRef::parse(input.as_ref(), &config.base_url)?;
    let session = Session::open(&config.http)?;
    let result = metadata::resolve(&session, reference, config.batch_size).await;
    session.close();
    result
}

// ── Internal helpers ─────────────────────────────────────────────────────

struct Run<T> {
    document: Document,
    output: T,
    batches: usize,
    authorized: bool,
}

/// Open a session, run the pipeline into the sink built by `make_sink`, and
/// close the session on every exit path.
async fn run<S, F>(
    input: &str,
    config: &DownloadConfig,
    make_sink: F,
) -> Result<Run<S::Output>, DocsendError>
where
    S: PageSink,
    F: FnOnce(&Document) -> Result<S, DocsendError>,
{
    config.validate()?;
    let reference = DocumentRef::parse(input, &config.base_url)?;
    let session = Session::open(&config.http)?;
    let result = run_with_session(&session, reference, config, make_sink).await;
    session.close();
    result
}

async fn run_with_session<S, F>(
    session: &Session,
    reference: DocumentRef,
    config: &DownloadConfig,
    make_sink: F,
) -> Result<Run<S::Output>, DocsendError>
where
    S: PageSink,
    F: FnOnce(&Document) -> Result<S, DocsendError>,
{
    let document = metadata::resolve(session, reference, config.batch_size).await?;
    let authorized = authorize_if_required(session, &document, config).await?;

    let mut sink = make_sink(&document)?;
    let batches = batch::fetch_document(
        session,
        &document,
        &mut sink,
        config.progress_callback.as_ref(),
    )
    .await?;
    let output = sink.finish()?;

    Ok(Run {
        document,
        output,
        batches,
        authorized,
    })
}

/// Submit credentials when the viewer shows an authorization form.
///
/// Returns whether the form was submitted.
async fn authorize_if_required(
    session: &Session,
    document: &Document,
    config: &DownloadConfig,
) -> Result<bool, DocsendError> {
    match (document.authenticity_token(), config.credentials.as_ref()) {
        (Some(token), Some(credentials)) => {
            auth::authorize(session, document, token, credentials).await?;
            Ok(true)
        }
        (Some(_), None) => {
            warn!(
                "'{}' shows an authorization form but no email was given; continuing without authorization",
                document.doc_id()
            );
            Ok(false)
        }
        (None, _) => {
            debug!("'{}' is public; skipping authorization", document.doc_id());
            Ok(false)
        }
    }
}
