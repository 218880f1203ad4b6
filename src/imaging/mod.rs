//! Card imaging: geometry, decoding and page compositing.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` (PNG, JPEG, WebP, TIFF) |
//! | **Normalize** | grey+alpha → RGBA8, palette expanded by the decoder |
//! | **Resize** | `image::imageops::resize` with `Lanczos3`, exact card size |
//! | **Paste** | `imageops::replace` (opaque) or premultiplied source-over (alpha) |
//!
//! The module is split into:
//! - **Geometry**: pure millimetre/pixel arithmetic (unit testable)
//! - **Loader**: [`ImageRef`], the [`ImageLoader`] trait and [`DecodingLoader`]
//! - **Compositor**: the fold from a flat job to finished [`Page`]s

pub mod compositor;
pub mod geometry;
pub mod loader;

pub use compositor::{
    BACKGROUND, ComposeError, ComposeEvent, Composition, Page, SlotOutcome, SlotStatus, compose,
};
pub use geometry::{
    GeometrySpec, PageGeometry, Placement, SLOTS_PER_PAGE, Slot, mm_to_px, page_count,
};
pub use loader::{
    DecodingLoader, ImageLoader, ImageRef, LoadError, is_supported_image,
    supported_input_extensions,
};
