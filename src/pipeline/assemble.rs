//! Output assembly: ordered page images → PDF, PNG directory, or memory.
//!
//! Every assembler implements [`PageSink`]. The scheduler hands it one batch
//! at a time, already sorted by page number, then calls [`PageSink::finish`]
//! once every page has arrived. Nothing becomes visible at the output path
//! until `finish` succeeds:
//!
//! * [`PdfAssembler`] keeps only the Flate-compressed image streams between
//!   batches (never the decoded pixels) and writes the PDF to a temp file in
//!   the target directory, renamed over the target on success.
//! * [`ImageDirAssembler`] writes `<page>.png` files into a hidden staging
//!   directory next to the target and moves them in on success. A failed
//!   run drops the staging directory and leaves the target untouched.
//! * [`MemorySink`] simply collects the pages for library callers.

use crate::error::DocsendError;
use crate::pipeline::page::PageImage;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::ImageFormat;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Object, ObjectId, Stream};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// Consumer of ordered page batches.
pub trait PageSink {
    /// What `finish` yields (an output path, or the pages themselves).
    type Output;

    /// Accept the next batch. Pages arrive in ascending order, each exactly once.
    fn accept(&mut self, batch: Vec<PageImage>) -> Result<(), DocsendError>;

    /// Finalise the output after the last batch.
    fn finish(self) -> Result<Self::Output, DocsendError>;
}

/// Tracks the next expected page number so a sink can reject gaps and reordering.
#[derive(Debug)]
struct PageOrder {
    next: usize,
}

impl PageOrder {
    fn new() -> Self {
        Self { next: 1 }
    }

    fn check(&mut self, page: usize, path: &Path) -> Result<(), DocsendError> {
        if page != self.next {
            return Err(DocsendError::Assembly {
                path: path.to_path_buf(),
                detail: format!("expected page {} but received page {}", self.next, page),
            });
        }
        self.next += 1;
        Ok(())
    }

    fn received(&self) -> usize {
        self.next - 1
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Temp files that end up as the output keep the mode `File::create` would
/// give them (0666 minus umask) instead of tempfile's owner-only default.
fn output_file_builder<'a, 'b>() -> tempfile::Builder<'a, 'b> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(".docsend-");
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(std::fs::Permissions::from_mode(0o666));
    }
    builder
}

// ── PDF ──────────────────────────────────────────────────────────────────────

/// Builds a single PDF with one page per image.
///
/// Each page's MediaBox equals the image size in points (72 dpi), so the
/// image fills the page exactly.
pub struct PdfAssembler {
    path: PathBuf,
    doc: lopdf::Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
    order: PageOrder,
}

impl PdfAssembler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            path: path.into(),
            doc,
            pages_id,
            kids: Vec::new(),
            order: PageOrder::new(),
        }
    }

    fn assembly_error(&self, detail: impl Into<String>) -> DocsendError {
        DocsendError::Assembly {
            path: self.path.clone(),
            detail: detail.into(),
        }
    }

    fn add_page(&mut self, page: &PageImage) -> Result<(), DocsendError> {
        let (width, height) = page.image.dimensions();

        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(page.image.as_raw())
            .map_err(|e| self.assembly_error(format!("page {}: compression failed: {e}", page.page)))?;
        let compressed = encoder
            .finish()
            .map_err(|e| self.assembly_error(format!("page {}: compression failed: {e}", page.page)))?;

        let mut image_dict = Dictionary::new();
        image_dict.set("Type", Object::Name(b"XObject".to_vec()));
        image_dict.set("Subtype", Object::Name(b"Image".to_vec()));
        image_dict.set("Width", Object::Integer(i64::from(width)));
        image_dict.set("Height", Object::Integer(i64::from(height)));
        image_dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
        image_dict.set("BitsPerComponent", Object::Integer(8));
        image_dict.set("Filter", Object::Name(b"FlateDecode".to_vec()));
        let image_id = self.doc.add_object(Stream::new(image_dict, compressed));

        // q  w 0 0 h 0 0 cm  /Im0 Do  Q
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::Integer(i64::from(width)),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::Integer(i64::from(height)),
                        Object::Integer(0),
                        Object::Integer(0),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_bytes = content
            .encode()
            .map_err(|e| self.assembly_error(format!("page {}: content stream: {e}", page.page)))?;
        let content_id = self
            .doc
            .add_object(Stream::new(Dictionary::new(), content_bytes));

        let mut xobjects = Dictionary::new();
        xobjects.set("Im0", Object::Reference(image_id));
        let mut resources = Dictionary::new();
        resources.set("XObject", Object::Dictionary(xobjects));

        let mut page_dict = Dictionary::new();
        page_dict.set("Type", Object::Name(b"Page".to_vec()));
        page_dict.set("Parent", Object::Reference(self.pages_id));
        page_dict.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(i64::from(width)),
                Object::Integer(i64::from(height)),
            ]),
        );
        page_dict.set("Resources", Object::Dictionary(resources));
        page_dict.set("Contents", Object::Reference(content_id));
        let page_id = self.doc.add_object(page_dict);

        self.kids.push(Object::Reference(page_id));
        Ok(())
    }
}

impl PageSink for PdfAssembler {
    type Output = PathBuf;

    fn accept(&mut self, batch: Vec<PageImage>) -> Result<(), DocsendError> {
        for page in &batch {
            self.order.check(page.page, &self.path)?;
            self.add_page(page)?;
        }
        debug!("PDF: {} pages buffered", self.kids.len());
        Ok(())
    }

    fn finish(mut self) -> Result<PathBuf, DocsendError> {
        if self.kids.is_empty() {
            return Err(self.assembly_error("no pages to write"));
        }

        let page_count = self.kids.len();
        let mut pages = Dictionary::new();
        pages.set("Type", Object::Name(b"Pages".to_vec()));
        pages.set("Kids", Object::Array(std::mem::take(&mut self.kids)));
        pages.set("Count", Object::Integer(page_count as i64));
        self.doc
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));

        let mut catalog = Dictionary::new();
        catalog.set("Type", Object::Name(b"Catalog".to_vec()));
        catalog.set("Pages", Object::Reference(self.pages_id));
        let catalog_id = self.doc.add_object(catalog);
        self.doc.trailer.set("Root", Object::Reference(catalog_id));

        let dir = parent_dir(&self.path);
        std::fs::create_dir_all(&dir)
            .map_err(|e| self.assembly_error(format!("cannot create '{}': {e}", dir.display())))?;

        // Atomic write: temp file in the same directory, then rename.
        let tmp = output_file_builder()
            .tempfile_in(&dir)
            .map_err(|e| self.assembly_error(format!("temp file: {e}")))?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            self.doc
                .save_to(&mut writer)
                .map_err(|e| self.assembly_error(format!("PDF write failed: {e}")))?;
            writer
                .flush()
                .map_err(|e| self.assembly_error(format!("PDF write failed: {e}")))?;
        }
        tmp.persist(&self.path)
            .map_err(|e| self.assembly_error(format!("rename failed: {}", e.error)))?;

        info!("Wrote {} pages to {}", page_count, self.path.display());
        Ok(self.path)
    }
}

// ── PNG directory ────────────────────────────────────────────────────────────

/// Writes `1.png`, `2.png`, … into an output directory.
pub struct ImageDirAssembler {
    dir: PathBuf,
    staging: TempDir,
    written: Vec<usize>,
    order: PageOrder,
}

impl ImageDirAssembler {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, DocsendError> {
        let dir = dir.into();
        let parent = parent_dir(&dir);
        std::fs::create_dir_all(&parent).map_err(|e| DocsendError::Assembly {
            path: dir.clone(),
            detail: format!("cannot create '{}': {e}", parent.display()),
        })?;
        let staging = tempfile::Builder::new()
            .prefix(".docsend-")
            .tempdir_in(&parent)
            .map_err(|e| DocsendError::Assembly {
                path: dir.clone(),
                detail: format!("cannot create staging directory: {e}"),
            })?;

        Ok(Self {
            dir,
            staging,
            written: Vec::new(),
            order: PageOrder::new(),
        })
    }

    /// File name for a 1-indexed page.
    pub fn file_name(page: usize) -> String {
        format!("{page}.png")
    }
}

impl PageSink for ImageDirAssembler {
    type Output = PathBuf;

    fn accept(&mut self, batch: Vec<PageImage>) -> Result<(), DocsendError> {
        for page in &batch {
            self.order.check(page.page, &self.dir)?;
            let path = self.staging.path().join(Self::file_name(page.page));
            page.image
                .save_with_format(&path, ImageFormat::Png)
                .map_err(|e| DocsendError::Assembly {
                    path: self.dir.clone(),
                    detail: format!("page {}: {e}", page.page),
                })?;
            self.written.push(page.page);
        }
        debug!("Staged {} page images", self.written.len());
        Ok(())
    }

    fn finish(self) -> Result<PathBuf, DocsendError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| DocsendError::Assembly {
            path: self.dir.clone(),
            detail: format!("cannot create output directory: {e}"),
        })?;

        for page in &self.written {
            let name = Self::file_name(*page);
            std::fs::rename(self.staging.path().join(&name), self.dir.join(&name)).map_err(
                |e| DocsendError::Assembly {
                    path: self.dir.clone(),
                    detail: format!("cannot move {name} into place: {e}"),
                },
            )?;
        }

        info!(
            "Wrote {} page images to {}",
            self.written.len(),
            self.dir.display()
        );
        Ok(self.dir)
    }
}

// ── Memory ───────────────────────────────────────────────────────────────────

/// Collects every page in order.
#[derive(Debug, Default)]
pub struct MemorySink {
    pages: Vec<PageImage>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PageSink for MemorySink {
    type Output = Vec<PageImage>;

    fn accept(&mut self, batch: Vec<PageImage>) -> Result<(), DocsendError> {
        let mut order = PageOrder {
            next: self.pages.len() + 1,
        };
        for page in &batch {
            order.check(page.page, Path::new("<memory>"))?;
        }
        debug_assert_eq!(order.received(), self.pages.len() + batch.len());
        self.pages.extend(batch);
        Ok(())
    }

    fn finish(self) -> Result<Vec<PageImage>, DocsendError> {
        Ok(self.pages)
    }
}
