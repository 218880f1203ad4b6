//! Compose-and-save: one job in, one PDF out.
//!
//! [`print_job`] runs the whole pipeline on the calling thread: resolve the
//! geometry from config, composite every page, write the document. Progress
//! goes to an optional channel as [`PrintEvent`]s so a front end can render
//! it while the work runs.
//!
//! [`spawn_print`] moves the same work to a background thread. Composition
//! itself stays single-threaded; the only parallel step is page compression
//! inside the PDF writer.

use crate::config::{ConfigError, SheetConfig};
use crate::imaging::{
    ComposeError, ComposeEvent, GeometrySpec, ImageLoader, ImageRef, LoadError, PageGeometry,
    Placement, SlotOutcome, compose, page_count,
};
use crate::job::JobError;
use crate::pdf::{OutputError, write_pdf};
use crate::thumbs::{CacheStats, ThumbnailCache};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::thread::JoinHandle;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrintError {
    #[error(transparent)]
    Compose(#[from] ComposeError),
    #[error(transparent)]
    Output(#[from] OutputError),
    #[error(transparent)]
    Job(#[from] JobError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Progress of a print run.
#[derive(Debug, Clone)]
pub enum PrintEvent {
    Started {
        cards: usize,
        pages: usize,
        geometry: PageGeometry,
    },
    Compose(ComposeEvent),
    Written {
        path: PathBuf,
        pages: usize,
    },
}

impl From<ComposeEvent> for PrintEvent {
    fn from(event: ComposeEvent) -> Self {
        Self::Compose(event)
    }
}

/// Result of a finished print run.
#[derive(Debug, Clone)]
pub struct PrintSummary {
    pub path: PathBuf,
    pub pages: usize,
    pub cards: usize,
    pub geometry: PageGeometry,
    /// Positions that stayed blank because their image failed to load.
    pub skipped: Vec<SlotOutcome>,
}

/// Composite `job` and write it as a PDF to `dest`.
///
/// An empty job fails with [`ComposeError::EmptyJob`] before anything is
/// decoded or created on disk.
pub fn print_job(
    loader: &impl ImageLoader,
    job: &[ImageRef],
    config: &SheetConfig,
    dest: &Path,
    events: Option<&Sender<PrintEvent>>,
) -> Result<PrintSummary, PrintError> {
    if job.is_empty() {
        return Err(ComposeError::EmptyJob.into());
    }
    let spec = config.to_geometry();
    let geometry = spec.resolve();
    if geometry.is_degenerate() {
        return Err(ComposeError::EmptyGeometry(geometry).into());
    }
    let emit = |event: PrintEvent| {
        if let Some(tx) = events {
            tx.send(event).ok();
        }
    };

    emit(PrintEvent::Started {
        cards: job.len(),
        pages: page_count(job.len()),
        geometry,
    });

    let composition = compose(loader, job, &spec, events)?;
    let pages = write_pdf(
        &composition.pages,
        config.resolution,
        config.output.compression,
        dest,
    )?;

    emit(PrintEvent::Written {
        path: dest.to_path_buf(),
        pages,
    });

    let skipped = composition.skipped().cloned().collect();
    Ok(PrintSummary {
        path: dest.to_path_buf(),
        pages,
        cards: job.len(),
        geometry: composition.geometry,
        skipped,
    })
}

/// Run [`print_job`] on a background thread.
///
/// The job is a snapshot: later gallery edits do not affect the run. The
/// handle yields the single completion result; progress arrives on `events`.
pub fn spawn_print<L>(
    loader: L,
    job: Vec<ImageRef>,
    config: SheetConfig,
    dest: PathBuf,
    events: Option<Sender<PrintEvent>>,
) -> JoinHandle<Result<PrintSummary, PrintError>>
where
    L: ImageLoader + Send + 'static,
{
    std::thread::spawn(move || print_job(&loader, &job, &config, &dest, events.as_ref()))
}

// ============================================================================
// Dry runs
// ============================================================================

/// Slot assignment for a job, computed without decoding anything.
#[derive(Debug, Clone, Serialize)]
pub struct JobPlan {
    pub spec: GeometrySpec,
    pub geometry: PageGeometry,
    pub pages: usize,
    pub slots: Vec<PlannedSlot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlannedSlot {
    pub position: usize,
    pub placement: Placement,
    /// Pixel origin of the slot on its page.
    pub origin: (u32, u32),
    pub image: String,
}

pub fn plan_job(job: &[ImageRef], spec: &GeometrySpec) -> JobPlan {
    let geometry = spec.resolve();
    let slots = job
        .iter()
        .enumerate()
        .map(|(position, image)| {
            let placement = Placement::for_position(position);
            PlannedSlot {
                position,
                placement,
                origin: geometry.origin(placement.slot),
                image: image.to_string(),
            }
        })
        .collect();
    JobPlan {
        spec: *spec,
        geometry,
        pages: page_count(job.len()),
        slots,
    }
}

/// Decode result for one distinct image of a job.
#[derive(Debug, Clone)]
pub struct CheckEntry {
    pub image: ImageRef,
    /// How many job positions use this image.
    pub uses: usize,
    pub error: Option<LoadError>,
}

#[derive(Debug, Clone)]
pub struct CheckReport {
    pub entries: Vec<CheckEntry>,
    pub stats: CacheStats,
}

impl CheckReport {
    pub fn failures(&self) -> impl Iterator<Item = &CheckEntry> {
        self.entries.iter().filter(|e| e.error.is_some())
    }
}

/// Decode every distinct image of `job` once, through the thumbnail cache.
///
/// Entries follow first appearance in the job.
pub fn check_job<L: ImageLoader>(cache: &mut ThumbnailCache<L>, job: &[ImageRef]) -> CheckReport {
    let mut entries: Vec<CheckEntry> = Vec::new();
    for image in job {
        let error = cache.get(image).error.clone();
        match entries.iter_mut().find(|e| &e.image == image) {
            Some(entry) => entry.uses += 1,
            None => entries.push(CheckEntry {
                image: image.clone(),
                uses: 1,
                error,
            }),
        }
    }
    CheckReport {
        entries,
        stats: cache.stats(),
    }
}
