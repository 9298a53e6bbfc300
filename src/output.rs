//! Output targets and the report returned after a download.

use serde::Serialize;
use std::path::{Path, PathBuf};

/// Where and how to write the downloaded pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// One multi-page PDF at this path.
    Pdf(PathBuf),
    /// A directory of `1.png`, `2.png`, … at this path.
    Images(PathBuf),
}

impl OutputTarget {
    pub fn path(&self) -> &Path {
        match self {
            OutputTarget::Pdf(p) | OutputTarget::Images(p) => p,
        }
    }
}

/// Summary of a completed download.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadReport {
    pub doc_id: String,
    pub page_count: usize,
    pub batches: usize,
    /// PDF file or image directory that was written.
    pub output_path: PathBuf,
    /// Whether the authorization form was submitted.
    pub authorized: bool,
    pub total_duration_ms: u64,
}
