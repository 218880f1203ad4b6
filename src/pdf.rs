//! PDF output for composed pages.
//!
//! Each page raster becomes one PDF page holding a single full-bleed image
//! XObject. The media box is sized so the raster prints at the job
//! resolution: `points = px * 72 / dpi`. Pixels go in as 8-bit DeviceRGB,
//! zlib-compressed (`FlateDecode`).
//!
//! The document is written to a temporary file next to the destination and
//! renamed into place only after every byte is on disk, so a failed write
//! never leaves a truncated PDF behind.

use crate::imaging::Page;
use miniz_oxide::deflate::compress_to_vec_zlib;
use pdf_writer::{Content, Filter, Name, Pdf, Rect, Ref, TextStr};
use rayon::prelude::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

const POINTS_PER_INCH: f32 = 72.0;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("nothing to write: no pages")]
    EmptyJob,
    #[error("page {index} has no pixels ({width}x{height})")]
    EmptyPage { index: usize, width: u32, height: u32 },
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Page edge length in PDF points for a raster edge at `dpi`.
pub fn px_to_points(px: u32, dpi: u32) -> f32 {
    px as f32 * POINTS_PER_INCH / dpi as f32
}

/// Serialize `pages` into a PDF at `dest`.
///
/// `compression` is the zlib level (0-10). Page images are compressed in
/// parallel on the global rayon pool. Returns the number of pages written.
pub fn write_pdf(
    pages: &[Page],
    dpi: u32,
    compression: u8,
    dest: &Path,
) -> Result<usize, OutputError> {
    if pages.is_empty() {
        return Err(OutputError::EmptyJob);
    }
    if let Some(page) = pages.iter().find(|p| p.raster.width() == 0 || p.raster.height() == 0) {
        return Err(OutputError::EmptyPage {
            index: page.index,
            width: page.raster.width(),
            height: page.raster.height(),
        });
    }
    let bytes = render_pdf(pages, dpi, compression);
    persist_atomically(&bytes, dest)?;
    tracing::info!(
        path = %dest.display(),
        pages = pages.len(),
        bytes = bytes.len(),
        "wrote document"
    );
    Ok(pages.len())
}

/// Build the whole document in memory.
pub fn render_pdf(pages: &[Page], dpi: u32, compression: u8) -> Vec<u8> {
    let streams: Vec<Vec<u8>> = pages
        .par_iter()
        .map(|page| compress_to_vec_zlib(page.raster.as_raw(), compression))
        .collect();

    let mut pdf = Pdf::new();
    let mut next_id = 1i32;
    let mut alloc = || {
        let r = Ref::new(next_id);
        next_id += 1;
        r
    };

    let catalog_id = alloc();
    let pages_id = alloc();
    let info_id = alloc();
    let page_ids: Vec<(Ref, Ref, Ref)> = pages.iter().map(|_| (alloc(), alloc(), alloc())).collect();

    pdf.catalog(catalog_id).pages(pages_id);
    pdf.pages(pages_id)
        .kids(page_ids.iter().map(|(page_id, _, _)| *page_id))
        .count(pages.len() as i32);
    pdf.document_info(info_id)
        .producer(TextStr(concat!("proxy-sheet ", env!("CARGO_PKG_VERSION"))));

    let image_name = Name(b"Im1");
    for ((page, data), &(page_id, content_id, image_id)) in pages.iter().zip(&streams).zip(&page_ids) {
        let (w_px, h_px) = page.raster.dimensions();
        let width = px_to_points(w_px, dpi);
        let height = px_to_points(h_px, dpi);

        {
            let mut image = pdf.image_xobject(image_id, data);
            image.filter(Filter::FlateDecode);
            image.width(w_px as i32);
            image.height(h_px as i32);
            image.color_space().device_rgb();
            image.bits_per_component(8);
        }

        let mut content = Content::new();
        content.save_state();
        content.transform([width, 0.0, 0.0, height, 0.0, 0.0]);
        content.x_object(image_name);
        content.restore_state();
        let raw = content.finish();
        let compressed = compress_to_vec_zlib(raw.as_slice(), compression);
        pdf.stream(content_id, &compressed).filter(Filter::FlateDecode);

        let mut pdf_page = pdf.page(page_id);
        pdf_page
            .media_box(Rect::new(0.0, 0.0, width, height))
            .parent(pages_id)
            .contents(content_id);
        pdf_page.resources().x_objects().pair(image_name, image_id);
    }

    pdf.finish()
}

fn persist_atomically(bytes: &[u8], dest: &Path) -> Result<(), OutputError> {
    let write_err = |source: std::io::Error| OutputError::Write {
        path: dest.to_path_buf(),
        source,
    };
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::Builder::new()
        .prefix(".proxy-sheet-")
        .suffix(".pdf.tmp")
        .tempfile_in(dir)
        .map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(dest).map_err(|e| write_err(e.error))?;
    Ok(())
}
