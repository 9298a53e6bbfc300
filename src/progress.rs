//! Progress-callback trait for per-batch and per-page download events.
//!
//! Inject an [`Arc<dyn DownloadProgressCallback>`] via
//! [`crate::config::DownloadConfigBuilder::progress_callback`] to receive
//! events as the scheduler works through the document.
//!
//! # Example
//!
//! ```rust
//! use docsend_dl::{DownloadConfig, DownloadProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl DownloadProgressCallback for CountingCallback {
//!     fn on_page_complete(&self, page_num: usize, total_pages: usize) {
//!         let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("page {page_num}/{total_pages} done ({done} so far)");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = DownloadConfig::builder()
//!     .progress_callback(counter as Arc<dyn DownloadProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::ops::Range;
use std::sync::Arc;

/// Called by the batch scheduler as it fetches each page.
///
/// Implementations must be `Send + Sync`. All methods have default no-op
/// implementations so callers only override what they care about.
///
/// # Thread safety
///
/// Pages inside one batch complete concurrently and in no particular order,
/// so `on_page_complete` and `on_page_error` may arrive out of page order.
pub trait DownloadProgressCallback: Send + Sync {
    /// Called once, after metadata resolution, before the first batch.
    fn on_download_start(&self, total_pages: usize, total_batches: usize) {
        let _ = (total_pages, total_batches);
    }

    /// Called before a batch's workers start.
    ///
    /// # Arguments
    /// * `batch_index`: 0-indexed batch number
    /// * `pages`: the 1-indexed `[start, end)` page range of the batch
    fn on_batch_start(&self, batch_index: usize, pages: Range<usize>) {
        let _ = (batch_index, pages);
    }

    /// Called when a page has been downloaded and decoded.
    fn on_page_complete(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page worker fails. The run aborts after this batch.
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after every page has been handed to the assembler.
    fn on_download_complete(&self, total_pages: usize) {
        let _ = total_pages;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl DownloadProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::DownloadConfig`].
pub type ProgressCallback = Arc<dyn DownloadProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        batches: Mutex<Vec<Range<usize>>>,
        completes: AtomicUsize,
        errors: AtomicUsize,
        started_total: AtomicUsize,
    }

    impl DownloadProgressCallback for TrackingCallback {
        fn on_download_start(&self, total_pages: usize, _total_batches: usize) {
            self.started_total.store(total_pages, Ordering::SeqCst);
        }

        fn on_batch_start(&self, _batch_index: usize, pages: Range<usize>) {
            self.batches.lock().unwrap().push(pages);
        }

        fn on_page_complete(&self, _page_num: usize, _total_pages: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_error(&self, _page_num: usize, _total_pages: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_download_start(5, 1);
        cb.on_batch_start(0, 1..6);
        cb.on_page_complete(1, 5);
        cb.on_page_error(2, 5, "some error");
        cb.on_download_complete(5);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();

        tracker.on_download_start(3, 2);
        assert_eq!(tracker.started_total.load(Ordering::SeqCst), 3);

        tracker.on_batch_start(0, 1..3);
        tracker.on_page_complete(2, 3);
        tracker.on_page_complete(1, 3);
        tracker.on_batch_start(1, 3..4);
        tracker.on_page_error(3, 3, "HTTP 404");

        assert_eq!(*tracker.batches.lock().unwrap(), vec![1..3, 3..4]);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_download_start(10, 2);
        cb.on_page_complete(1, 10);
    }
}
