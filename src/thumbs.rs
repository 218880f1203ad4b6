//! Thumbnail cache for gallery front ends.
//!
//! Decoding a full-resolution card scan just to draw a 180 px tile is slow,
//! and a gallery redraws tiles often. [`ThumbnailCache`] memoizes one small
//! opaque thumbnail per [`ImageRef`], so repeated entries and redraws decode
//! the source once.
//!
//! # Design
//!
//! - **Keyed by identity**: the key is the `ImageRef` itself. The same path
//!   listed twice shares one thumbnail.
//! - **No eviction**: galleries hold tens to low hundreds of cards; a 180×260
//!   RGB thumbnail is ~140 KB, so the whole cache stays in the tens of MB.
//! - **Never fails**: an unreadable image gets a flat grey placeholder so the
//!   tile still renders. The placeholder is cached like any other result.
//! - **Not thread-safe**: the owning UI decides how to share it.
//!
//! The compositor never uses this cache; print pages are always built from
//! the full-resolution source.

use crate::imaging::{BACKGROUND, ImageLoader, ImageRef, LoadError};
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};
use std::collections::HashMap;
use std::fmt;

/// Bounding box for thumbnails, in pixels.
pub const THUMB_WIDTH: u32 = 180;
pub const THUMB_HEIGHT: u32 = 260;

/// Fill colour of the placeholder shown for unreadable images.
pub const PLACEHOLDER: Rgb<u8> = Rgb([240, 240, 240]);

/// A cached thumbnail, plus the load error if it is a placeholder.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub pixels: RgbImage,
    pub error: Option<LoadError>,
}

impl Thumbnail {
    pub fn is_placeholder(&self) -> bool {
        self.error.is_some()
    }
}

/// Hit/miss counters, mirrored in CLI output.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u32,
    pub misses: u32,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} decoded, {} reused", self.misses, self.hits)
    }
}

pub struct ThumbnailCache<L> {
    loader: L,
    entries: HashMap<ImageRef, Thumbnail>,
    stats: CacheStats,
}

impl<L: ImageLoader> ThumbnailCache<L> {
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            entries: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    /// Thumbnail for `image`, decoding it on first request.
    pub fn get(&mut self, image: &ImageRef) -> &Thumbnail {
        if self.entries.contains_key(image) {
            self.stats.hits += 1;
        } else {
            self.stats.misses += 1;
            let thumb = match self.loader.load(image) {
                Ok(img) => Thumbnail {
                    pixels: make_thumbnail(&img),
                    error: None,
                },
                Err(e) => {
                    tracing::debug!(%e, "thumbnail placeholder");
                    Thumbnail {
                        pixels: RgbImage::from_pixel(THUMB_WIDTH, THUMB_HEIGHT, PLACEHOLDER),
                        error: Some(e),
                    }
                }
            };
            self.entries.insert(image.clone(), thumb);
        }
        &self.entries[image]
    }

    pub fn contains(&self, image: &ImageRef) -> bool {
        self.entries.contains_key(image)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    /// Drop every cached thumbnail (the gallery was cleared).
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Flatten onto white and shrink to fit the thumbnail box, keeping aspect.
fn make_thumbnail(img: &DynamicImage) -> RgbImage {
    let flat = flatten_on_white(img);
    let (w, h) = flat.dimensions();
    if w <= THUMB_WIDTH && h <= THUMB_HEIGHT {
        return flat;
    }
    let scale = (THUMB_WIDTH as f64 / w as f64).min(THUMB_HEIGHT as f64 / h as f64);
    let tw = ((w as f64 * scale).round() as u32).max(1);
    let th = ((h as f64 * scale).round() as u32).max(1);
    imageops::resize(&flat, tw, th, FilterType::Lanczos3)
}

fn flatten_on_white(img: &DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }
    let rgba = img.to_rgba8();
    let mut out = RgbImage::from_pixel(rgba.width(), rgba.height(), BACKGROUND);
    for (x, y, src) in rgba.enumerate_pixels() {
        let a = src[3] as u16;
        let dst = out.get_pixel_mut(x, y);
        for c in 0..3 {
            dst[c] = ((src[c] as u16 * a + dst[c] as u16 * (255 - a) + 127) / 255) as u8;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::loader::tests::MockLoader;
    use image::{Rgba, RgbaImage};

    fn big_card() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(620, 870, Rgb([10, 20, 30])))
    }

    #[test]
    fn thumbnail_fits_box_and_keeps_aspect() {
        let card = ImageRef::path("/c/a.png");
        let mut cache = ThumbnailCache::new(MockLoader::new().with(card.clone(), big_card()));
        let thumb = cache.get(&card);
        // 620x870 scaled by min(180/620, 260/870) = 0.2903 → 180x253
        assert_eq!(thumb.pixels.dimensions(), (180, 253));
        assert!(!thumb.is_placeholder());
    }

    #[test]
    fn small_images_are_not_upscaled() {
        let card = ImageRef::path("/c/tiny.png");
        let img = DynamicImage::ImageRgb8(RgbImage::new(40, 50));
        let mut cache = ThumbnailCache::new(MockLoader::new().with(card.clone(), img));
        assert_eq!(cache.get(&card).pixels.dimensions(), (40, 50));
    }

    #[test]
    fn repeated_refs_decode_once() {
        let card = ImageRef::path("/c/a.png");
        let loader = MockLoader::new().with(card.clone(), big_card());
        let mut cache = ThumbnailCache::new(loader);

        cache.get(&card);
        cache.get(&card);
        cache.get(&card.clone());

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats(), CacheStats { hits: 2, misses: 1 });
        assert_eq!(cache.loader.get_calls().len(), 1);
    }

    #[test]
    fn unreadable_image_gets_cached_placeholder() {
        let missing = ImageRef::path("/c/missing.png");
        let mut cache = ThumbnailCache::new(MockLoader::new());

        let thumb = cache.get(&missing);
        assert!(thumb.is_placeholder());
        assert_eq!(thumb.pixels.dimensions(), (THUMB_WIDTH, THUMB_HEIGHT));
        assert_eq!(*thumb.pixels.get_pixel(0, 0), PLACEHOLDER);

        cache.get(&missing);
        assert_eq!(cache.loader.get_calls().len(), 1);
    }

    #[test]
    fn transparency_is_flattened_to_white() {
        let card = ImageRef::path("/c/clear.png");
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 0])));
        let mut cache = ThumbnailCache::new(MockLoader::new().with(card.clone(), img));
        assert_eq!(*cache.get(&card).pixels.get_pixel(5, 5), BACKGROUND);
    }

    #[test]
    fn clear_forces_reload() {
        let card = ImageRef::path("/c/a.png");
        let mut cache = ThumbnailCache::new(MockLoader::new().with(card.clone(), big_card()));
        cache.get(&card);
        cache.clear();
        assert!(cache.is_empty());
        assert!(!cache.contains(&card));
        cache.get(&card);
        assert_eq!(cache.stats().misses, 2);
    }
}
