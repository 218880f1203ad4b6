//! Page compositing: a flat job in, white 3×3 pages out.
//!
//! [`compose`] folds over the job in order. Every ninth image starts a new
//! page. Each image is loaded, resized to the exact card size with Lanczos3
//! and pasted at its slot. Images with alpha are premultiplied before
//! resampling and blended over the white page, so transparent corners stay
//! white instead of picking up the dark colour stored under zero alpha.
//!
//! A failed load never aborts the job: the slot stays blank and a
//! [`SlotStatus::Skipped`] outcome is recorded for that position.

use super::geometry::{GeometrySpec, PageGeometry, Placement, SLOTS_PER_PAGE, Slot, page_count};
use super::loader::{ImageLoader, ImageRef, LoadError};
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage, RgbaImage};
use std::sync::mpsc::Sender;
use thiserror::Error;

/// Page background.
pub const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComposeError {
    #[error("nothing to print: the job has no images")]
    EmptyJob,
    #[error(
        "page {}x{} px or card {}x{} px is empty at this resolution",
        .0.page_width, .0.page_height, .0.card_width, .0.card_height
    )]
    EmptyGeometry(PageGeometry),
}

/// One finished sheet.
#[derive(Debug, Clone)]
pub struct Page {
    /// Zero-based page number within the job.
    pub index: usize,
    /// Number of slots that received an image.
    pub filled: usize,
    pub raster: RgbImage,
}

impl Page {
    fn blank(index: usize, geometry: &PageGeometry) -> Self {
        Self {
            index,
            filled: 0,
            raster: RgbImage::from_pixel(geometry.page_width, geometry.page_height, BACKGROUND),
        }
    }
}

/// What happened to one job position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotStatus {
    Filled,
    Skipped(LoadError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotOutcome {
    /// Zero-based position in the flattened job.
    pub position: usize,
    pub placement: Placement,
    pub image: ImageRef,
    pub status: SlotStatus,
}

/// Pages plus the per-slot record of how they were built.
#[derive(Debug, Clone)]
pub struct Composition {
    pub geometry: PageGeometry,
    pub pages: Vec<Page>,
    pub slots: Vec<SlotOutcome>,
}

impl Composition {
    /// Outcomes that did not place an image.
    pub fn skipped(&self) -> impl Iterator<Item = &SlotOutcome> {
        self.slots
            .iter()
            .filter(|s| matches!(s.status, SlotStatus::Skipped(_)))
    }
}

/// Progress reported while composing.
#[derive(Debug, Clone)]
pub enum ComposeEvent {
    SlotSkipped {
        position: usize,
        placement: Placement,
        error: LoadError,
    },
    PageCompleted {
        index: usize,
        filled: usize,
        total: usize,
    },
}

/// Build every page of a job.
///
/// `events` is optional; when present it receives one `PageCompleted` per
/// page and one `SlotSkipped` per failed load, converted into the channel's
/// event type. A dropped receiver is ignored.
pub fn compose<E: From<ComposeEvent>>(
    loader: &impl ImageLoader,
    job: &[ImageRef],
    spec: &GeometrySpec,
    events: Option<&Sender<E>>,
) -> Result<Composition, ComposeError> {
    if job.is_empty() {
        return Err(ComposeError::EmptyJob);
    }

    let geometry = spec.resolve();
    if geometry.is_degenerate() {
        return Err(ComposeError::EmptyGeometry(geometry));
    }
    tracing::debug!(?geometry, images = job.len(), "composing job");
    if geometry.overflows() {
        tracing::warn!(
            page_width = geometry.page_width,
            page_height = geometry.page_height,
            card_width = geometry.card_width,
            card_height = geometry.card_height,
            "3x3 card block is larger than the page; overflowing cards will be clipped"
        );
    }

    let total = page_count(job.len());
    let emit = |event: ComposeEvent| {
        if let Some(tx) = events {
            tx.send(E::from(event)).ok();
        }
    };

    let mut pages = Vec::with_capacity(total);
    let mut slots = Vec::with_capacity(job.len());
    let mut current: Option<Page> = None;

    for (position, image) in job.iter().enumerate() {
        let placement = Placement::for_position(position);

        if let Some(done) = current.take_if(|p| p.index != placement.page) {
            emit(ComposeEvent::PageCompleted {
                index: done.index,
                filled: done.filled,
                total,
            });
            pages.push(done);
        }
        let page = current.get_or_insert_with(|| Page::blank(placement.page, &geometry));

        let status = match loader.load(image) {
            Ok(img) => {
                paste_card(&mut page.raster, &img, &geometry, placement.slot);
                page.filled += 1;
                SlotStatus::Filled
            }
            Err(error) => {
                tracing::warn!(
                    position,
                    page = placement.page,
                    row = placement.slot.row,
                    col = placement.slot.col,
                    %error,
                    "skipping card"
                );
                emit(ComposeEvent::SlotSkipped {
                    position,
                    placement,
                    error: error.clone(),
                });
                SlotStatus::Skipped(error)
            }
        };

        slots.push(SlotOutcome {
            position,
            placement,
            image: image.clone(),
            status,
        });
    }

    if let Some(done) = current {
        emit(ComposeEvent::PageCompleted {
            index: done.index,
            filled: done.filled,
            total,
        });
        pages.push(done);
    }

    debug_assert_eq!(pages.len(), total);
    debug_assert!(pages.iter().all(|p| p.filled <= SLOTS_PER_PAGE));

    Ok(Composition {
        geometry,
        pages,
        slots,
    })
}

/// Resize one card to the slot size and paint it onto the page.
pub fn paste_card(page: &mut RgbImage, card: &DynamicImage, geometry: &PageGeometry, slot: Slot) {
    let (x, y) = geometry.origin(slot);
    let (w, h) = (geometry.card_width, geometry.card_height);

    if card.color().has_alpha() {
        let mut rgba = card.to_rgba8();
        premultiply_in_place(&mut rgba);
        let resized = imageops::resize(&rgba, w, h, FilterType::Lanczos3);
        blend_premultiplied_over(page, &resized, x, y);
    } else {
        let resized = imageops::resize(&card.to_rgb8(), w, h, FilterType::Lanczos3);
        imageops::replace(page, &resized, x as i64, y as i64);
    }
}

fn premultiply_in_place(img: &mut RgbaImage) {
    for px in img.pixels_mut() {
        let a = px[3] as u16;
        for c in 0..3 {
            px[c] = ((px[c] as u16 * a + 127) / 255) as u8;
        }
    }
}

/// Source-over blend of a premultiplied RGBA card onto an opaque page.
///
/// Pixels that land outside the page are dropped.
fn blend_premultiplied_over(page: &mut RgbImage, card: &RgbaImage, x: u32, y: u32) {
    let (page_w, page_h) = page.dimensions();
    for (cx, cy, src) in card.enumerate_pixels() {
        let (px, py) = (x + cx, y + cy);
        if px >= page_w || py >= page_h {
            continue;
        }
        let inv = 255 - src[3] as u16;
        let dst = page.get_pixel_mut(px, py);
        for c in 0..3 {
            let blended = src[c] as u16 + (dst[c] as u16 * inv + 127) / 255;
            dst[c] = blended.min(255) as u8;
        }
    }
}
