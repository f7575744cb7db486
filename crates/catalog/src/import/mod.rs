//! Directory import: turns the files of one directory into catalog rows.
//!
//! Screening against the catalog and the final inserts run on the calling
//! thread; metadata extraction and thumbnailing fan out over a rayon pool.
//! A file that fails any step is recorded in the report and the batch goes on.

pub mod scanner;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};

use anyhow::{Context, Result};
use engine::{Classified, MediaEngine};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::db::Medium;
use crate::services::CatalogService;

#[derive(Clone, Default, Debug)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImportStage {
    Screening,
    Processing,
    Cataloging,
}

#[derive(Clone, Debug)]
pub struct ImportProgress {
    pub stage: ImportStage,
    pub completed: usize,
    pub total: usize,
}

#[derive(Clone, Default)]
pub struct ImportOptions {
    /// Worker threads for extraction; `None` uses one per CPU core.
    pub workers: Option<usize>,
    pub cancel: CancellationFlag,
    pub progress: Option<Arc<dyn Fn(ImportProgress) + Send + Sync>>,
}

impl ImportOptions {
    fn emit_progress(&self, stage: ImportStage, completed: usize, total: usize) {
        if let Some(cb) = &self.progress {
            cb(ImportProgress {
                stage,
                completed,
                total,
            });
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The absolute path is already cataloged.
    Duplicate,
    /// The path is not valid UTF-8 and cannot be stored verbatim.
    InvalidFileName,
    /// No image or video MIME type could be guessed.
    UnsupportedType,
    Extraction(String),
    Thumbnail(String),
    /// The catalog refused the row, e.g. on a constraint violation.
    Rejected(String),
    /// Not started before the import was canceled.
    Canceled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duplicate => f.write_str("already cataloged"),
            Self::InvalidFileName => f.write_str("file name is not valid UTF-8"),
            Self::UnsupportedType => f.write_str("unsupported file type"),
            Self::Extraction(err) => write!(f, "metadata extraction failed: {err}"),
            Self::Thumbnail(err) => write!(f, "thumbnail generation failed: {err}"),
            Self::Rejected(err) => write!(f, "rejected by the catalog: {err}"),
            Self::Canceled => f.write_str("import canceled"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
}

#[derive(Clone, Debug, Default)]
pub struct ImportReport {
    /// Newly created rows, ordered by timestamp with undated media last.
    pub imported: Vec<Medium>,
    pub skipped: Vec<SkippedFile>,
    pub canceled: bool,
}

struct Candidate {
    path: PathBuf,
    filename: String,
    classified: Classified,
}

pub fn import_directory(
    service: &mut CatalogService,
    engine: &MediaEngine,
    dir: &Path,
) -> Result<ImportReport> {
    import_directory_with_options(service, engine, dir, &ImportOptions::default())
}

pub fn import_directory_with_options(
    service: &mut CatalogService,
    engine: &MediaEngine,
    dir: &Path,
    options: &ImportOptions,
) -> Result<ImportReport> {
    let files = scanner::list_files(dir)?;
    info!("importing {} files from {}", files.len(), dir.display());

    let mut report = ImportReport::default();
    let candidates = screen(service, engine, files, options, &mut report)?;
    let outcomes = process_all(engine, &candidates, options)?;

    let total = candidates.len();
    let mut ids = Vec::new();
    for (idx, (candidate, outcome)) in candidates.into_iter().zip(outcomes).enumerate() {
        match outcome {
            Ok(medium) => match service.add_medium(&medium) {
                Ok(id) => ids.push(id),
                Err(err) if is_constraint_violation(&err) => {
                    warn!("skipping {}: {err:#}", candidate.path.display());
                    if let Err(err) = engine.discard_thumbnail(&medium.thumbnail) {
                        warn!("failed to delete thumbnail {}: {err}", medium.thumbnail);
                    }
                    report.skipped.push(SkippedFile {
                        path: candidate.path,
                        reason: SkipReason::Rejected(format!("{err:#}")),
                    });
                }
                Err(err) => return Err(err),
            },
            Err(reason) => {
                if reason != SkipReason::Canceled {
                    warn!("skipping {}: {reason}", candidate.path.display());
                }
                report.skipped.push(SkippedFile {
                    path: candidate.path,
                    reason,
                });
            }
        }
        options.emit_progress(ImportStage::Cataloging, idx + 1, total);
    }

    report.canceled = options.cancel.is_canceled();
    report.imported = service.media_by_ids(&ids)?;
    info!(
        "imported {} files, skipped {}{}",
        report.imported.len(),
        report.skipped.len(),
        if report.canceled { " (canceled)" } else { "" }
    );
    Ok(report)
}

/// Drops duplicates and unsupported files before any decoding happens.
fn screen(
    service: &CatalogService,
    engine: &MediaEngine,
    files: Vec<PathBuf>,
    options: &ImportOptions,
    report: &mut ImportReport,
) -> Result<Vec<Candidate>> {
    let total = files.len();
    let mut candidates = Vec::with_capacity(total);
    for (idx, path) in files.into_iter().enumerate() {
        if let Some(candidate) = screen_one(service, engine, path, report)? {
            candidates.push(candidate);
        }
        options.emit_progress(ImportStage::Screening, idx + 1, total);
    }
    Ok(candidates)
}

fn screen_one(
    service: &CatalogService,
    engine: &MediaEngine,
    path: PathBuf,
    report: &mut ImportReport,
) -> Result<Option<Candidate>> {
    let Some(filename) = path.to_str().map(str::to_owned) else {
        warn!("skipping {}: file name is not valid UTF-8", path.display());
        report.skipped.push(SkippedFile {
            path,
            reason: SkipReason::InvalidFileName,
        });
        return Ok(None);
    };

    if let Some(existing) = service.find_medium_by_filename(&filename)? {
        info!("skipping {filename}: already cataloged as medium id={}", existing.id);
        report.skipped.push(SkippedFile {
            path,
            reason: SkipReason::Duplicate,
        });
        return Ok(None);
    }

    match engine.classify(&path) {
        Some(classified) => Ok(Some(Candidate {
            path,
            filename,
            classified,
        })),
        None => {
            warn!("skipping {filename}: unsupported file type");
            report.skipped.push(SkippedFile {
                path,
                reason: SkipReason::UnsupportedType,
            });
            Ok(None)
        }
    }
}

/// Row-level refusals (UNIQUE, NOT NULL, CHECK, trigger aborts) skip one file;
/// anything else means the store itself is unusable.
fn is_constraint_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::SqliteFailure(failure, _))
                if failure.code == rusqlite::ErrorCode::ConstraintViolation
        )
    })
}

fn process_all(
    engine: &MediaEngine,
    candidates: &[Candidate],
    options: &ImportOptions,
) -> Result<Vec<std::result::Result<Medium, SkipReason>>> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.workers.unwrap_or(0))
        .thread_name(|idx| format!("import-worker-{idx}"))
        .build()
        .context("failed to start import workers")?;

    let total = candidates.len();
    let done = AtomicUsize::new(0);
    let outcomes = pool.install(|| {
        candidates
            .par_iter()
            .map(|candidate| {
                let outcome = process(engine, candidate, &options.cancel);
                let completed = done.fetch_add(1, Ordering::Relaxed) + 1;
                options.emit_progress(ImportStage::Processing, completed, total);
                outcome
            })
            .collect()
    });
    Ok(outcomes)
}

fn process(
    engine: &MediaEngine,
    candidate: &Candidate,
    cancel: &CancellationFlag,
) -> std::result::Result<Medium, SkipReason> {
    if cancel.is_canceled() {
        return Err(SkipReason::Canceled);
    }

    let metadata = engine
        .extract(&candidate.path, candidate.classified.kind)
        .map_err(|err| SkipReason::Extraction(err.to_string()))?;
    let thumbnail = engine
        .generate_thumbnail(&candidate.path, &metadata)
        .map_err(|err| SkipReason::Thumbnail(err.to_string()))?;

    Ok(Medium::from_metadata(
        candidate.filename.as_str(),
        thumbnail,
        candidate.classified.mime_type.as_str(),
        &metadata,
    ))
}
