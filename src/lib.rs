//! # docsend-dl
//!
//! Download documents from the DocSend web viewer as a PDF or as one PNG per
//! page.
//!
//! The viewer never serves the original file; it serves one rendered image
//! per page. This crate reads the page count from the viewer's landing page,
//! submits the email/passcode form when the document is gated, fetches the
//! page images in concurrent batches, and stitches them back together.
//!
//! ## Pipeline Overview
//!
//! ```text
//! id / URL
//!  │
//!  ├─ 1. Metadata  landing page → authenticity token + page count
//!  ├─ 2. Auth      email/passcode form (skipped for public documents)
//!  ├─ 3. Batches   pages [1,6) [6,11) … one batch at a time
//!  ├─ 4. Pages     page_data JSON → image bytes → opaque RGB (concurrent)
//!  └─ 5. Output    multi-page PDF, or 1.png … N.png in a directory
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docsend_dl::{download_to_pdf, Credentials, DownloadConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DownloadConfig::builder()
//!         .credentials(Credentials::new("me@example.com"))
//!         .build()?;
//!     let report = download_to_pdf("https://docsend.com/view/abc123", "deck.pdf", &config).await?;
//!     eprintln!("{} pages → {}", report.page_count, report.output_path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docsend` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! docsend-dl = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod download;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{Credentials, DownloadConfig, DownloadConfigBuilder, HttpConfig};
pub use document::{Document, DocumentRef};
pub use download::{
    download, download_sync, download_to_images, download_to_pdf, fetch_pages, inspect,
};
pub use error::{DocsendError, HttpError, PageError};
pub use output::{DownloadReport, OutputTarget};
pub use pipeline::assemble::PageSink;
pub use pipeline::page::PageImage;
pub use progress::{DownloadProgressCallback, NoopProgressCallback, ProgressCallback};
