//! Batch fetch scheduler: sequential batches, concurrent pages within a batch.
//!
//! ## Batching
//!
//! Fetching every page at once would hold every decoded page in memory and
//! open as many connections as the document has pages. Fetching one page at
//! a time wastes the network. Batches of `batch_size` pages are fetched
//! concurrently; the next batch starts only after the previous one has been
//! handed to the sink and dropped, so peak memory is one batch of images
//! whatever the document length.
//!
//! ## Failure policy
//!
//! `try_join_all` resolves to the first worker error and drops the other
//! in-flight workers of the batch. The error propagates immediately, no
//! later batch starts, and the sink is never finished.

use crate::document::Document;
use crate::error::{DocsendError, PageError};
use crate::pipeline::assemble::PageSink;
use crate::pipeline::page::{self, PageImage};
use crate::progress::ProgressCallback;
use crate::session::Session;
use futures::future::try_join_all;
use std::future::Future;
use std::ops::Range;
use tracing::{debug, info, warn};

/// Split `[1, page_count]` into consecutive `[start, end)` ranges of at most
/// `batch_size` pages.
pub fn batch_ranges(page_count: usize, batch_size: usize) -> Vec<Range<usize>> {
    let batch_size = batch_size.max(1);
    (1..=page_count)
        .step_by(batch_size)
        .map(|start| start..start.saturating_add(batch_size).min(page_count + 1))
        .collect()
}

/// Fetch every page of `document` through `session` into `sink`.
///
/// Returns the number of batches run.
pub async fn fetch_document<S: PageSink>(
    session: &Session,
    document: &Document,
    sink: &mut S,
    progress: Option<&ProgressCallback>,
) -> Result<usize, DocsendError> {
    run_batches(
        document.page_count(),
        document.batch_size(),
        |page| page::fetch_page(session, document, page),
        sink,
        progress,
    )
    .await
}

/// Drive `fetch` over all pages, batch by batch.
///
/// `fetch` is the per-page worker; it is called exactly once per page. The
/// results of each batch are put back into ascending page order before the
/// sink sees them.
pub async fn run_batches<F, Fut, S>(
    page_count: usize,
    batch_size: usize,
    fetch: F,
    sink: &mut S,
    progress: Option<&ProgressCallback>,
) -> Result<usize, DocsendError>
where
    F: Fn(usize) -> Fut,
    Fut: Future<Output = Result<PageImage, PageError>>,
    S: PageSink,
{
    let batches = batch_ranges(page_count, batch_size);
    let total_batches = batches.len();
    info!(
        "Fetching {} pages in {} batches of up to {}",
        page_count, total_batches, batch_size
    );
    if let Some(cb) = progress {
        cb.on_download_start(page_count, total_batches);
    }

    for (index, range) in batches.into_iter().enumerate() {
        debug!(
            "Batch {}/{}: pages [{}, {})",
            index + 1,
            total_batches,
            range.start,
            range.end
        );
        if let Some(cb) = progress {
            cb.on_batch_start(index, range.clone());
        }

        let workers = range.clone().map(|page_num| {
            let fut = fetch(page_num);
            async move {
                let result = fut.await;
                if let Some(cb) = progress {
                    match &result {
                        Ok(_) => cb.on_page_complete(page_num, page_count),
                        Err(e) => cb.on_page_error(page_num, page_count, &e.to_string()),
                    }
                }
                result
            }
        });

        // try_join_all keeps input order, so the batch comes back sorted by
        // page number no matter which worker finished first.
        let batch = try_join_all(workers).await.map_err(|e| {
            warn!("Batch {} aborted: {}", index + 1, e);
            DocsendError::PageFetch(e)
        })?;

        sink.accept(batch)?;
    }

    if let Some(cb) = progress {
        cb.on_download_complete(page_count);
    }
    Ok(total_batches)
}
