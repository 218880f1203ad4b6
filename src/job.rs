//! Job assembly: the ordered card list and its flattening.
//!
//! A [`Gallery`] is the explicit, ordered list of `(image, quantity)` records
//! that a front end edits. Every mutation goes through a method on the list;
//! nothing else holds hidden state. When it is time to print, [`expand`]
//! turns a snapshot into the flat job the compositor consumes.
//!
//! ## Job list files
//!
//! Lists can also be written by hand, one card per line:
//!
//! ```text
//! # Burn deck
//! 4x cards/bolt.png
//! 2 cards/mountain.jpg
//! cards/sol-ring.png        // quantity defaults to 1
//! art/                      // a folder: every image inside, in name order
//! ```
//!
//! Blank lines and lines starting with `#` or `//` are skipped. Relative paths
//! are resolved against the directory of the list file.

use crate::imaging::{ImageRef, is_supported_image};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: quantity must be at least 1")]
    ZeroQuantity { line: usize },
    #[error("line {line}: invalid quantity '{text}'")]
    BadQuantity { line: usize, text: String },
    #[error("line {line}: missing image path")]
    MissingPath { line: usize },
    #[error("not a supported image or folder: {0}")]
    Unsupported(PathBuf),
}

/// One gallery entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobItem {
    pub image: ImageRef,
    /// Copies to print, always at least 1.
    pub quantity: u32,
}

impl JobItem {
    /// A quantity of 0 is a caller bug: it panics in debug builds and is
    /// raised to 1 in release builds.
    pub fn new(image: ImageRef, quantity: u32) -> Self {
        debug_assert!(quantity >= 1, "quantity must be at least 1 for {image}");
        Self {
            image,
            quantity: quantity.max(1),
        }
    }
}

/// Flatten items into the print sequence, repeating each image `quantity`
/// times in list order.
pub fn expand(items: &[JobItem]) -> Vec<ImageRef> {
    items
        .iter()
        .flat_map(|item| std::iter::repeat_n(item.image.clone(), item.quantity.max(1) as usize))
        .collect()
}

/// Total number of cards the items will print.
pub fn total_cards(items: &[JobItem]) -> usize {
    items.iter().map(|i| i.quantity.max(1) as usize).sum()
}

/// Ordered list of cards with per-card quantities.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Gallery {
    items: Vec<JobItem>,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<JobItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[JobItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append one item.
    pub fn push(&mut self, image: ImageRef, quantity: u32) {
        self.items.push(JobItem::new(image, quantity));
    }

    /// Add files and folders with quantity 1 each.
    ///
    /// Files are kept when they exist and have a supported extension.
    /// Folders contribute their supported images in file-name order; they
    /// are not searched recursively. Anything else is ignored. Returns how
    /// many items were added.
    pub fn add_paths<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<usize, JobError> {
        let before = self.items.len();
        for path in paths {
            for image in images_at(path.as_ref())? {
                self.push(ImageRef::Path(image), 1);
            }
        }
        Ok(self.items.len() - before)
    }

    /// Change an item's quantity by `delta`; reaching zero removes it.
    ///
    /// Out-of-range indices are ignored. Returns the new quantity, or `None`
    /// if the item is gone (or never existed).
    pub fn adjust_quantity(&mut self, index: usize, delta: i64) -> Option<u32> {
        let item = self.items.get_mut(index)?;
        let next = item.quantity as i64 + delta;
        if next <= 0 {
            self.items.remove(index);
            None
        } else {
            item.quantity = next.min(u32::MAX as i64) as u32;
            Some(item.quantity)
        }
    }

    pub fn remove(&mut self, index: usize) -> Option<JobItem> {
        (index < self.items.len()).then(|| self.items.remove(index))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Flattened print sequence for the current list.
    pub fn job(&self) -> Vec<ImageRef> {
        expand(&self.items)
    }

    pub fn total_cards(&self) -> usize {
        total_cards(&self.items)
    }
}

/// Supported images at a path: the file itself, or a folder's direct children.
fn images_at(path: &Path) -> Result<Vec<PathBuf>, JobError> {
    if path.is_dir() {
        let mut files: Vec<PathBuf> = fs::read_dir(path)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && is_supported_image(p))
            .collect();
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    } else if path.is_file() && is_supported_image(path) {
        Ok(vec![path.to_path_buf()])
    } else {
        Ok(Vec::new())
    }
}

/// Parse a job list. Relative paths are joined onto `base`.
///
/// Folder lines expand to every supported image inside, each with the
/// line's quantity. File lines are taken as written; whether they decode is
/// the loader's problem, so a typo becomes a skipped slot rather than an
/// aborted job.
pub fn parse_job_list(text: &str, base: &Path) -> Result<Vec<JobItem>, JobError> {
    let mut items = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
            continue;
        }

        let (quantity, rest) = split_quantity(line, line_no)?;
        let rest = strip_trailing_comment(rest);
        if rest.is_empty() {
            return Err(JobError::MissingPath { line: line_no });
        }

        let path = base.join(rest);
        if path.is_dir() {
            for image in images_at(&path)? {
                items.push(JobItem::new(ImageRef::Path(image), quantity));
            }
        } else {
            items.push(JobItem::new(ImageRef::Path(path), quantity));
        }
    }

    Ok(items)
}

/// Read and parse a job list file.
pub fn load_job_list(path: &Path) -> Result<Vec<JobItem>, JobError> {
    let text = fs::read_to_string(path)?;
    let base = path.parent().unwrap_or(Path::new("."));
    parse_job_list(&text, base)
}

/// Split an optional leading `N`, `Nx` or `N x` quantity from a line.
fn split_quantity(line: &str, line_no: usize) -> Result<(u32, &str), JobError> {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return Ok((1, line));
    }

    let (qty_str, rest) = line.split_at(digits);
    let after = rest.trim_start();
    let rest = if let Some(stripped) = after
        .strip_prefix(['x', 'X'])
        .filter(|s| s.is_empty() || s.starts_with(char::is_whitespace))
    {
        stripped.trim_start()
    } else if rest.starts_with(char::is_whitespace) {
        after
    } else {
        // "2024-card.png": digits are part of the file name
        return Ok((1, line));
    };

    let quantity: u32 = qty_str.parse().map_err(|_| JobError::BadQuantity {
        line: line_no,
        text: qty_str.to_string(),
    })?;
    if quantity == 0 {
        return Err(JobError::ZeroQuantity { line: line_no });
    }
    Ok((quantity, rest))
}

fn strip_trailing_comment(rest: &str) -> &str {
    match rest.find(" //") {
        Some(i) => rest[..i].trim_end(),
        None => rest.trim_end(),
    }
}

/// Build items from command-line inputs: each file or folder image gets
/// `copies` copies. Paths that are neither are rejected.
pub fn items_from_inputs(inputs: &[PathBuf], copies: u32) -> Result<Vec<JobItem>, JobError> {
    let mut items = Vec::new();
    for input in inputs {
        let images = images_at(input)?;
        if images.is_empty() && !input.is_dir() {
            return Err(JobError::Unsupported(input.clone()));
        }
        items.extend(
            images
                .into_iter()
                .map(|p| JobItem::new(ImageRef::Path(p), copies)),
        );
    }
    Ok(items)
}
