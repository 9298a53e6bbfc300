//! Pipeline stages for downloading a viewer document.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own against a mock server or in-memory images.
//!
//! ## Data Flow
//!
//! ```text
//! metadata ──▶ auth ──▶ batch ──(page × batch_size)──▶ assemble
//! (landing)   (form)   (scheduler)  (worker)          (PDF / PNG dir)
//! ```
//!
//! 1. [`metadata`]: fetch the landing page; extract token and page count
//! 2. [`auth`]: submit email/passcode; skipped for public documents
//! 3. [`batch`]: sequential batches, concurrent workers inside a batch
//! 4. [`page`]: `page_data` JSON → image bytes → opaque RGB buffer;
//!    decoding runs in `spawn_blocking`
//! 5. [`assemble`]: [`assemble::PageSink`] implementations for PDF, PNG
//!    directory and in-memory output

pub mod assemble;
pub mod auth;
pub mod batch;
pub mod metadata;
pub mod page;
