//! # proxy-sheet
//!
//! Lays out trading-card images nine to a page, 3×3 and edge to edge, and
//! writes the pages as a print-ready PDF. Each card is resampled to its exact
//! physical size at the job resolution, so a 62×87 mm card prints at
//! 62×87 mm.
//!
//! # Architecture: Gallery → Job → Pages → Document
//!
//! ```text
//! 1. Assemble  paths / list file  →  [(image, qty)]   (gallery order)
//! 2. Expand    [(image, qty)]     →  [image; N]       (flat job)
//! 3. Compose   job + geometry     →  [page raster]    (ceil(N / 9) pages)
//! 4. Write     pages              →  sheet.pdf        (atomic rename)
//! ```
//!
//! Composition is a pure function of a job snapshot and a geometry. It never
//! sees the gallery, and the gallery never sees pixels.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Geometry arithmetic, image loading, and the page compositor |
//! | [`job`] | `JobItem` / `Gallery` assembly and the job-list file format |
//! | [`pdf`] | Multi-page PDF output with Flate-compressed page images |
//! | [`print`] | Compose-and-save driver, background runs, dry-run plan and check |
//! | [`thumbs`] | Memoized thumbnails for gallery front ends |
//! | [`config`] | `proxy-sheet.toml` loading, validation, and flag overrides |
//! | [`output`] | CLI output formatting |
//! | [`logging`] | `tracing` subscriber setup for the binary |
//!
//! # Design Decisions
//!
//! ## Fixed 3×3, Zero Gutter
//!
//! Cards touch. One straight cut along each grid line separates two cards, so
//! a sheet needs four horizontal and four vertical cuts. The block is centered
//! on the page; when the leftover is odd, the margin is the half-pixel value
//! rounded to the nearest even pixel.
//!
//! ## Soft Failure Per Slot
//!
//! One unreadable image should not cost a whole print run. A failed load
//! leaves its slot white, is logged, and is recorded as a
//! [`imaging::SlotStatus::Skipped`] outcome at its job position.
//!
//! ## Alpha Against White
//!
//! Transparent corners must print as paper, not as whatever colour the
//! encoder left under zero alpha. Alpha images are premultiplied before
//! resampling and blended over the white page.

pub mod config;
pub mod imaging;
pub mod job;
pub mod logging;
pub mod output;
pub mod pdf;
pub mod print;
pub mod thumbs;
