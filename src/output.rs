//! CLI output formatting for every command.
//!
//! # Position-First Display
//!
//! A card's identity in a job is its position: the output leads with the
//! 1-based job position, then where it lands (page, row, column), then the
//! image it came from. Rows and columns are 1-based on screen and 0-based
//! in the API.
//!
//! # Output Format
//!
//! ## Plan
//!
//! ```text
//! Page  210 x 297 mm -> 2480 x 3508 px @ 300 dpi
//! Card  62 x 87 mm -> 732 x 1028 px
//! Margins  142 px left/right, 212 px top/bottom
//! 10 cards on 2 pages
//!
//! Page 1
//!     001 r1 c1 (bolt.png)
//!         Source: cards/bolt.png
//! ```
//!
//! ## Build
//!
//! ```text
//! Printing 10 cards on 2 pages (2480 x 3508 px each)
//!     Page 1/2: 8 of 9 slots filled
//!     004 r2 c1 skipped: cannot read cards/missing.png: No such file
//!     Page 2/2: 1 of 9 slots filled
//! Wrote 2 pages -> sheet.pdf
//! ```
//!
//! ## Check
//!
//! ```text
//! 001 bolt.png (x4) ok
//! 002 missing.png unreadable
//!     cannot read cards/missing.png: No such file
//! 2 images, 1 unreadable (2 decoded, 3 reused)
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::imaging::{ComposeEvent, Placement};
use crate::print::{CheckReport, JobPlan, PrintEvent, PrintSummary};

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Job position and grid cell of a slot, all 1-based.
///
/// ```text
/// 004 r2 c1
/// ```
fn slot_label(position: usize, placement: &Placement) -> String {
    format!(
        "{} r{} c{}",
        format_index(position + 1),
        placement.slot.row + 1,
        placement.slot.col + 1
    )
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// Trim trailing zeros so `62.0` shows as `62` and `63.5` stays.
fn mm(value: f64) -> String {
    let text = format!("{value:.2}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

// ============================================================================
// Plan output
// ============================================================================

pub fn format_plan(plan: &JobPlan) -> Vec<String> {
    let spec = &plan.spec;
    let geo = &plan.geometry;
    let mut lines = vec![
        format!(
            "Page  {} x {} mm -> {} x {} px @ {} dpi",
            mm(spec.page_width_mm),
            mm(spec.page_height_mm),
            geo.page_width,
            geo.page_height,
            spec.dpi
        ),
        format!(
            "Card  {} x {} mm -> {} x {} px",
            mm(spec.card_width_mm),
            mm(spec.card_height_mm),
            geo.card_width,
            geo.card_height
        ),
        format!(
            "Margins  {} px left/right, {} px top/bottom",
            geo.margin_x, geo.margin_y
        ),
    ];
    if geo.overflows() {
        lines.push("Warning: the 3x3 block is larger than the page and will be clipped".into());
    }
    lines.push(format!(
        "{} on {}",
        plural(plan.slots.len(), "card"),
        plural(plan.pages, "page")
    ));

    let mut current_page = None;
    for slot in &plan.slots {
        if current_page != Some(slot.placement.page) {
            current_page = Some(slot.placement.page);
            lines.push(String::new());
            lines.push(format!("Page {}", slot.placement.page + 1));
        }
        let name = std::path::Path::new(&slot.image)
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| slot.image.clone());
        lines.push(format!(
            "{}{} ({})",
            indent(1),
            slot_label(slot.position, &slot.placement),
            name
        ));
        lines.push(format!("{}Source: {}", indent(2), slot.image));
    }
    lines
}

pub fn print_plan(plan: &JobPlan) {
    for line in format_plan(plan) {
        println!("{}", line);
    }
}

// ============================================================================
// Build output
// ============================================================================

/// Format a single print progress event as display lines.
pub fn format_print_event(event: &PrintEvent) -> Vec<String> {
    match event {
        PrintEvent::Started {
            cards,
            pages,
            geometry,
        } => vec![format!(
            "Printing {} on {} ({} x {} px each)",
            plural(*cards, "card"),
            plural(*pages, "page"),
            geometry.page_width,
            geometry.page_height
        )],
        PrintEvent::Compose(ComposeEvent::PageCompleted {
            index,
            filled,
            total,
        }) => vec![format!(
            "{}Page {}/{}: {} of 9 slots filled",
            indent(1),
            index + 1,
            total,
            filled
        )],
        PrintEvent::Compose(ComposeEvent::SlotSkipped {
            position,
            placement,
            error,
        }) => vec![format!(
            "{}{} skipped: {}",
            indent(1),
            slot_label(*position, placement),
            error
        )],
        PrintEvent::Written { path, pages } => {
            vec![format!("Wrote {} -> {}", plural(*pages, "page"), path.display())]
        }
    }
}

/// Closing lines after a build: a recap of blank slots, if any.
pub fn format_print_summary(summary: &PrintSummary) -> Vec<String> {
    if summary.skipped.is_empty() {
        return Vec::new();
    }
    let mut lines = vec![format!(
        "Warning: {} left blank",
        plural(summary.skipped.len(), "slot")
    )];
    for outcome in &summary.skipped {
        lines.push(format!(
            "{}{} {}",
            indent(1),
            slot_label(outcome.position, &outcome.placement),
            outcome.image
        ));
    }
    lines
}

pub fn print_print_summary(summary: &PrintSummary) {
    for line in format_print_summary(summary) {
        println!("{}", line);
    }
}

// ============================================================================
// Check output
// ============================================================================

pub fn format_check(report: &CheckReport) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, entry) in report.entries.iter().enumerate() {
        let uses = if entry.uses > 1 {
            format!(" (x{})", entry.uses)
        } else {
            String::new()
        };
        match &entry.error {
            None => lines.push(format!(
                "{} {}{} ok",
                format_index(i + 1),
                entry.image.label(),
                uses
            )),
            Some(error) => {
                lines.push(format!(
                    "{} {}{} unreadable",
                    format_index(i + 1),
                    entry.image.label(),
                    uses
                ));
                lines.push(format!("{}{}", indent(1), error));
            }
        }
    }
    let failures = report.failures().count();
    lines.push(format!(
        "{}, {} unreadable ({})",
        plural(report.entries.len(), "image"),
        failures,
        report.stats
    ));
    lines
}

pub fn print_check(report: &CheckReport) {
    for line in format_check(report) {
        println!("{}", line);
    }
}
