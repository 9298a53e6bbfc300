//! Page fetch worker: page number → opaque RGB image.
//!
//! Each page takes two requests: the `page_data` endpoint returns a small
//! JSON descriptor whose `imageUrl` points at the rendered page (usually a
//! signed CDN URL), and that URL returns the image bytes.
//!
//! ## Transparency
//!
//! The viewer draws page images over a white page. Rendered pages often come
//! back as PNG with an alpha channel, and a transparent background would turn
//! black or checkered in the PDF. Compositing over white reproduces what the
//! viewer shows and lets every later stage work with plain RGB.

use crate::document::Document;
use crate::error::PageError;
use crate::session::Session;
use image::{DynamicImage, Rgb, RgbImage};
use serde::Deserialize;
use tracing::debug;

/// One decoded page, keyed by its 1-indexed page number.
#[derive(Debug, Clone, PartialEq)]
pub struct PageImage {
    pub page: usize,
    pub image: RgbImage,
}

impl PageImage {
    pub fn new(page: usize, image: RgbImage) -> Self {
        Self { page, image }
    }
}

/// The part of the `page_data` JSON this crate reads.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageData {
    image_url: String,
}

/// Fetch, decode and flatten one page.
pub async fn fetch_page(
    session: &Session,
    document: &Document,
    page: usize,
) -> Result<PageImage, PageError> {
    let meta_url = document.page_data_url(page);
    let body = session
        .get_bytes(&meta_url)
        .await
        .map_err(|source| PageError::PageData { page, source })?;

    let image_url = parse_page_data(&body).map_err(|detail| PageError::MalformedPageData {
        page,
        detail,
    })?;
    debug!("Page {}: image at {}", page, image_url);

    let bytes = session
        .get_bytes(&image_url)
        .await
        .map_err(|source| PageError::ImageDownload { page, source })?;

    let byte_len = bytes.len();
    let image = tokio::task::spawn_blocking(move || decode_opaque(&bytes))
        .await
        .map_err(|e| PageError::Task {
            page,
            detail: e.to_string(),
        })?
        .map_err(|e| PageError::Decode {
            page,
            detail: e.to_string(),
        })?;

    debug!(
        "Page {}: {} bytes → {}x{} px",
        page,
        byte_len,
        image.width(),
        image.height()
    );

    Ok(PageImage::new(page, image))
}

/// Read `imageUrl` out of a `page_data` body.
pub fn parse_page_data(body: &[u8]) -> Result<String, String> {
    let data: PageData = serde_json::from_slice(body).map_err(|e| e.to_string())?;
    if data.image_url.trim().is_empty() {
        return Err("imageUrl is empty".to_string());
    }
    Ok(data.image_url)
}

/// Decode image bytes of any supported format into an opaque RGB buffer.
pub fn decode_opaque(bytes: &[u8]) -> Result<RgbImage, image::ImageError> {
    let decoded = image::load_from_memory(bytes)?;
    Ok(flatten_onto_white(&decoded))
}

/// Composite `img` over an opaque white background of the same size.
///
/// Images without an alpha channel are converted to RGB unchanged.
pub fn flatten_onto_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (dst, src) in out.pixels_mut().zip(rgba.pixels()) {
        let alpha = u32::from(src[3]);
        let blend = |c: u8| -> u8 {
            // c·α + 255·(1−α), rounded
            ((u32::from(c) * alpha + 255 * (255 - alpha) + 127) / 255) as u8
        };
        *dst = Rgb([blend(src[0]), blend(src[1]), blend(src[2])]);
    }
    out
}
