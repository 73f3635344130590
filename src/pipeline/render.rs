//! PDF rasterisation: selected pages → `DynamicImage` via pdfium.
//!
//! pdfium is not async-safe, so every call runs inside
//! `tokio::task::spawn_blocking`. Pages are scaled by `dpi / 72` (PDF user
//! space is 72 units per inch) and capped at `max_rendered_pixels` on the
//! longest edge so an oversized scan cannot blow up memory.
//!
//! The library is bound from `PDFIUM_LIB_PATH` when set (a library file or
//! the directory holding it), otherwise from the system library search path.

use crate::config::ExtractionConfig;
use crate::error::Form1004Error;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// PDF user-space units per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// Bind the pdfium shared library.
pub fn bind_pdfium() -> Result<Pdfium, Form1004Error> {
    let bindings = match std::env::var_os("PDFIUM_LIB_PATH") {
        Some(raw) => {
            let path = PathBuf::from(raw);
            let lib = if path.is_dir() {
                Pdfium::pdfium_platform_library_name_at_path(&path)
            } else {
                path
            };
            debug!("Binding pdfium from {}", lib.display());
            Pdfium::bind_to_library(&lib).map_err(|e| {
                Form1004Error::PdfiumBindingFailed(format!("{}: {e}", lib.display()))
            })?
        }
        None => Pdfium::bind_to_system_library()
            .map_err(|e| Form1004Error::PdfiumBindingFailed(e.to_string()))?,
    };
    Ok(Pdfium::new(bindings))
}

/// Number of pages in the PDF.
pub async fn page_count(pdf_path: &Path, password: Option<&str>) -> Result<usize, Form1004Error> {
    let path = pdf_path.to_path_buf();
    let password = password.map(str::to_string);
    tokio::task::spawn_blocking(move || {
        let pdfium = bind_pdfium()?;
        let document = load_document(&pdfium, &path, password.as_deref())?;
        Ok(document.pages().len() as usize)
    })
    .await
    .map_err(|e| Form1004Error::Internal(format!("Page-count task panicked: {e}")))?
}

/// Rasterise the given 1-indexed pages, in order.
///
/// Pages beyond the end of the document are skipped with a warning.
pub async fn render_pages(
    pdf_path: &Path,
    config: &ExtractionConfig,
    pages: &[usize],
) -> Result<Vec<(usize, DynamicImage)>, Form1004Error> {
    let path = pdf_path.to_path_buf();
    let scale = config.dpi as f32 / POINTS_PER_INCH;
    let max_pixels = config.max_rendered_pixels as i32;
    let password = config.password.clone();
    let pages = pages.to_vec();

    tokio::task::spawn_blocking(move || {
        render_pages_blocking(&path, scale, max_pixels, password.as_deref(), &pages)
    })
    .await
    .map_err(|e| Form1004Error::Internal(format!("Render task panicked: {e}")))?
}

fn render_pages_blocking(
    pdf_path: &Path,
    scale: f32,
    max_pixels: i32,
    password: Option<&str>,
    pages: &[usize],
) -> Result<Vec<(usize, DynamicImage)>, Form1004Error> {
    let pdfium = bind_pdfium()?;
    let document = load_document(&pdfium, pdf_path, password)?;
    let doc_pages = document.pages();
    let total = doc_pages.len() as usize;

    let render_config = PdfRenderConfig::new()
        .scale_page_by_factor(scale)
        .set_maximum_width(max_pixels)
        .set_maximum_height(max_pixels);

    let mut images = Vec::with_capacity(pages.len());
    for &page_num in pages {
        if page_num == 0 || page_num > total {
            warn!("Skipping page {} (out of range, total={})", page_num, total);
            continue;
        }

        let page = doc_pages
            .get((page_num - 1) as u16)
            .map_err(|e| Form1004Error::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: format!("page {page_num}: {e:?}"),
            })?;
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| Form1004Error::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: format!("page {page_num} failed to render: {e:?}"),
            })?;

        let image = bitmap.as_image();
        debug!(
            "Rendered page {} → {}x{} px",
            page_num,
            image.width(),
            image.height()
        );
        images.push((page_num, image));
    }

    info!("Rendered {} of {} requested pages", images.len(), pages.len());
    Ok(images)
}

fn load_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, Form1004Error> {
    pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let detail = format!("{e:?}");
        if detail.to_lowercase().contains("password") {
            if password.is_some() {
                Form1004Error::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                Form1004Error::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            Form1004Error::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail,
            }
        }
    })
}
