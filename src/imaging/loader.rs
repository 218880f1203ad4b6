//! Image references and the loader that decodes them.
//!
//! The [`ImageLoader`] trait is the seam between the compositor and the
//! outside world. [`DecodingLoader`] is the production implementation; tests
//! use an in-memory mock.

use image::{ColorType, DynamicImage, ImageFormat, ImageReader};
use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use thiserror::Error;

/// Something resolvable to raster pixels.
///
/// Equality and hashing are by identity: two `Path` refs are the same image
/// when their paths are equal, two `Memory` refs when name and bytes match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ImageRef {
    Path(PathBuf),
    Memory { name: String, data: Arc<[u8]> },
}

impl ImageRef {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    pub fn memory(name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        Self::Memory {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Short human-readable label (file name, or the buffer name).
    pub fn label(&self) -> String {
        match self {
            Self::Path(p) => p
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_else(|| p.display().to_string()),
            Self::Memory { name, .. } => name.clone(),
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(p) => write!(f, "{}", p.display()),
            Self::Memory { name, data } => write!(f, "{name} ({} bytes in memory)", data.len()),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("cannot read {image}: {reason}")]
    Unreadable { image: String, reason: String },
    #[error("cannot decode {image}: {reason}")]
    Undecodable { image: String, reason: String },
}

impl LoadError {
    /// Display form of the reference that failed.
    pub fn image(&self) -> &str {
        match self {
            Self::Unreadable { image, .. } | Self::Undecodable { image, .. } => image,
        }
    }
}

/// Source of decoded card images.
///
/// Implementations must not cache; callers that want caching (the
/// thumbnail cache) do it themselves, keyed by [`ImageRef`]. Loaders are
/// only called from one thread, so interior state needs no locking.
pub trait ImageLoader {
    fn load(&self, image: &ImageRef) -> Result<DynamicImage, LoadError>;
}

/// Extensions we offer for folder expansion, if the decoder is compiled in.
const CARD_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("png", ImageFormat::Png),
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("webp", ImageFormat::WebP),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    CARD_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// File extensions (lowercase, no dot) that have a working decoder.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Whether a path looks like a card image we can decode.
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| {
            supported_input_extensions()
                .iter()
                .any(|s| s.eq_ignore_ascii_case(e))
        })
}

/// Loader backed by the `image` crate decoders.
#[derive(Debug, Default, Clone, Copy)]
pub struct DecodingLoader;

impl DecodingLoader {
    pub fn new() -> Self {
        Self
    }
}

impl ImageLoader for DecodingLoader {
    fn load(&self, image: &ImageRef) -> Result<DynamicImage, LoadError> {
        let decoded = match image {
            ImageRef::Path(path) => ImageReader::open(path)
                .map_err(|e| LoadError::Unreadable {
                    image: image.to_string(),
                    reason: e.to_string(),
                })?
                .with_guessed_format()
                .map_err(|e| LoadError::Unreadable {
                    image: image.to_string(),
                    reason: e.to_string(),
                })?
                .decode(),
            ImageRef::Memory { data, .. } => ImageReader::new(Cursor::new(&data[..]))
                .with_guessed_format()
                .map_err(|e| LoadError::Unreadable {
                    image: image.to_string(),
                    reason: e.to_string(),
                })?
                .decode(),
        };
        decoded
            .map(normalize)
            .map_err(|e| LoadError::Undecodable {
                image: image.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Bring a decoded image into a directly paintable layout.
///
/// Palette PNGs already arrive as RGB/RGBA from the decoder. Grey+alpha is
/// widened to RGBA8 so the alpha channel can be addressed the same way for
/// every input. Everything else passes through untouched.
pub fn normalize(img: DynamicImage) -> DynamicImage {
    match img.color() {
        ColorType::La8 | ColorType::La16 => DynamicImage::ImageRgba8(img.to_rgba8()),
        _ => img,
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use image::{GrayAlphaImage, LumaA, Rgb, RgbImage, Rgba, RgbaImage};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory loader: serves registered images, fails everything else,
    /// and records every lookup in order.
    #[derive(Default)]
    pub struct MockLoader {
        pub images: HashMap<ImageRef, DynamicImage>,
        pub calls: Mutex<Vec<ImageRef>>,
    }

    impl MockLoader {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with(mut self, image: ImageRef, pixels: DynamicImage) -> Self {
            self.images.insert(image, pixels);
            self
        }

        pub fn get_calls(&self) -> Vec<ImageRef> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ImageLoader for MockLoader {
        fn load(&self, image: &ImageRef) -> Result<DynamicImage, LoadError> {
            self.calls.lock().unwrap().push(image.clone());
            self.images
                .get(image)
                .cloned()
                .ok_or_else(|| LoadError::Unreadable {
                    image: image.to_string(),
                    reason: "not registered with mock".to_string(),
                })
        }
    }

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    #[test]
    fn supported_extensions_cover_png_and_jpeg() {
        let exts = supported_input_extensions();
        for expected in &["png", "jpg", "jpeg"] {
            assert!(exts.contains(expected), "expected {expected}");
        }
    }

    #[test]
    fn is_supported_image_ignores_case() {
        assert!(is_supported_image(Path::new("card.PNG")));
        assert!(is_supported_image(Path::new("dir/card.Jpeg")));
        assert!(!is_supported_image(Path::new("notes.txt")));
        assert!(!is_supported_image(Path::new("no_extension")));
    }

    #[test]
    fn label_uses_file_name() {
        assert_eq!(ImageRef::path("/a/b/bolt.png").label(), "bolt.png");
        assert_eq!(ImageRef::memory("sol", vec![1u8, 2]).label(), "sol");
    }

    #[test]
    fn memory_refs_compare_by_content() {
        let a = ImageRef::memory("x", vec![1u8, 2, 3]);
        let b = ImageRef::memory("x", vec![1u8, 2, 3]);
        let c = ImageRef::memory("x", vec![9u8]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn load_png_from_disk() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("card.png");
        RgbImage::from_pixel(20, 30, Rgb([10, 20, 30]))
            .save(&path)
            .unwrap();

        let img = DecodingLoader::new().load(&ImageRef::path(&path)).unwrap();
        assert_eq!((img.width(), img.height()), (20, 30));
        assert!(!img.color().has_alpha());
    }

    #[test]
    fn load_keeps_rgba_alpha() {
        let png = encode(
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([1, 2, 3, 0]))),
            ImageFormat::Png,
        );
        let img = DecodingLoader::new()
            .load(&ImageRef::memory("clear.png", png))
            .unwrap();
        assert!(img.color().has_alpha());
        assert_eq!(img.to_rgba8().get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn load_widens_gray_alpha_to_rgba() {
        let png = encode(
            DynamicImage::ImageLumaA8(GrayAlphaImage::from_pixel(3, 3, LumaA([200, 128]))),
            ImageFormat::Png,
        );
        let img = DecodingLoader::new()
            .load(&ImageRef::memory("la.png", png))
            .unwrap();
        assert_eq!(img.color(), ColorType::Rgba8);
        assert_eq!(img.to_rgba8().get_pixel(1, 1), &Rgba([200, 200, 200, 128]));
    }

    #[test]
    fn load_jpeg_without_extension_hint() {
        let jpg = encode(
            DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([50, 60, 70]))),
            ImageFormat::Jpeg,
        );
        let img = DecodingLoader::new()
            .load(&ImageRef::memory("blob", jpg))
            .unwrap();
        assert_eq!((img.width(), img.height()), (8, 8));
    }

    #[test]
    fn missing_file_is_unreadable() {
        let err = DecodingLoader::new()
            .load(&ImageRef::path("/nonexistent/card.png"))
            .unwrap_err();
        assert!(matches!(err, LoadError::Unreadable { .. }));
        assert!(err.image().contains("card.png"));
    }

    #[test]
    fn garbage_bytes_are_undecodable() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("broken.png");
        std::fs::write(&path, b"definitely not a png").unwrap();

        let err = DecodingLoader::new()
            .load(&ImageRef::path(&path))
            .unwrap_err();
        assert!(matches!(err, LoadError::Undecodable { .. }));
        assert!(err.to_string().contains("broken.png"));
    }
}
