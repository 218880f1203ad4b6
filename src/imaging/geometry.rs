//! Pure geometry for the 3×3 card sheet.
//!
//! Everything here is arithmetic on millimetres and pixels; no images are
//! touched. The compositor derives a [`PageGeometry`] once per job and then
//! only looks up slot origins.

use serde::Serialize;

/// Millimetres per inch, used for every physical → pixel conversion.
pub const MM_PER_INCH: f64 = 25.4;

/// Cards per row and per column.
pub const GRID: u32 = 3;

/// Cards per page.
pub const SLOTS_PER_PAGE: usize = (GRID * GRID) as usize;

/// Convert a physical length to pixels at the given resolution.
///
/// Halves round to the nearest even pixel.
///
/// ```
/// # use proxy_sheet::imaging::mm_to_px;
/// // A4 width at 300 dpi
/// assert_eq!(mm_to_px(210.0, 300), 2480);
/// ```
pub fn mm_to_px(mm: f64, dpi: u32) -> u32 {
    (mm * dpi as f64 / MM_PER_INCH).round_ties_even() as u32
}

/// Physical description of one print job: page size, card size, resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeometrySpec {
    pub page_width_mm: f64,
    pub page_height_mm: f64,
    pub card_width_mm: f64,
    pub card_height_mm: f64,
    pub dpi: u32,
}

impl Default for GeometrySpec {
    /// A4 paper, 62×87 mm cards, 300 dpi.
    fn default() -> Self {
        Self {
            page_width_mm: 210.0,
            page_height_mm: 297.0,
            card_width_mm: 62.0,
            card_height_mm: 87.0,
            dpi: 300,
        }
    }
}

impl GeometrySpec {
    /// Derive pixel sizes and grid origins.
    pub fn resolve(&self) -> PageGeometry {
        let page_width = mm_to_px(self.page_width_mm, self.dpi);
        let page_height = mm_to_px(self.page_height_mm, self.dpi);
        let card_width = mm_to_px(self.card_width_mm, self.dpi);
        let card_height = mm_to_px(self.card_height_mm, self.dpi);

        let margin_x = centered_margin(page_width, card_width);
        let margin_y = centered_margin(page_height, card_height);

        PageGeometry {
            page_width,
            page_height,
            card_width,
            card_height,
            margin_x,
            margin_y,
            x_origins: [0, 1, 2].map(|col| margin_x + col * card_width),
            y_origins: [0, 1, 2].map(|row| margin_y + row * card_height),
        }
    }
}

/// Margin that centers a block of three cards, clamped at zero.
///
/// Halves round to the nearest even pixel: a leftover of 5 px yields a 2 px
/// margin, a leftover of 7 px yields 4.
fn centered_margin(page: u32, card: u32) -> u32 {
    let leftover = page as f64 - (GRID * card) as f64;
    (leftover.max(0.0) / 2.0).round_ties_even() as u32
}

/// Pixel geometry of a page, derived from a [`GeometrySpec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageGeometry {
    pub page_width: u32,
    pub page_height: u32,
    pub card_width: u32,
    pub card_height: u32,
    pub margin_x: u32,
    pub margin_y: u32,
    pub x_origins: [u32; 3],
    pub y_origins: [u32; 3],
}

impl PageGeometry {
    /// Top-left pixel of a slot.
    pub fn origin(&self, slot: Slot) -> (u32, u32) {
        (self.x_origins[slot.col], self.y_origins[slot.row])
    }

    /// True when the 3×3 block is wider or taller than the page.
    ///
    /// Such blocks are still pasted at a zero margin; whatever falls past the
    /// right or bottom edge is clipped.
    pub fn overflows(&self) -> bool {
        GRID * self.card_width > self.page_width || GRID * self.card_height > self.page_height
    }

    /// True when the page or the card rounds to zero pixels on either axis.
    pub fn is_degenerate(&self) -> bool {
        [self.page_width, self.page_height, self.card_width, self.card_height].contains(&0)
    }
}

/// A grid cell on a page, addressed row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Slot {
    pub row: usize,
    pub col: usize,
}

/// Where the image at a given job position lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub page: usize,
    pub slot: Slot,
}

impl Placement {
    /// Map a job position to its page and slot.
    pub fn for_position(position: usize) -> Self {
        let within = position % SLOTS_PER_PAGE;
        Self {
            page: position / SLOTS_PER_PAGE,
            slot: Slot {
                row: within / GRID as usize,
                col: within % GRID as usize,
            },
        }
    }
}

/// Number of pages needed for `images` cards.
pub fn page_count(images: usize) -> usize {
    images.div_ceil(SLOTS_PER_PAGE)
}
