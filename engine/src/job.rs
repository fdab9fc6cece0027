//! Copy job orchestration.
//!
//! This module provides the copy engine's lifecycle:
//! - Validating the configured entries (existence, size limit)
//! - Running a copy over the valid entries with progress and cancellation
//! - Spawning a run on its own worker thread behind a re-entrancy guard

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cancel::{CancellationToken, JobSlot, ResetOnDrop};
use crate::error::EngineError;
use crate::fs_ops::{self, ChunkCopy, EntryKind};
use crate::model::{CopyJobConfig, Diagnostic, JobOutcome, JobReport, ValidationReport};
use crate::progress::{CopyProgressEvent, EventSink};

pub const COMPLETE_MESSAGE: &str = "Copying completed.";
pub const CANCEL_MESSAGE: &str = "Copy cancelled by user!";

/// Decide which entries a run will copy and how many bytes that is.
///
/// An entry is left out when its source or destination directory is missing,
/// or when its source is larger than the size limit. Each left-out entry gets
/// exactly one diagnostic. Nothing on disk is modified.
pub fn validate(config: &CopyJobConfig) -> ValidationReport {
    let mut report = ValidationReport::default();

    for (index, entry) in config.entries.iter().enumerate() {
        let source_ok = entry.source.is_dir();
        let destination_ok = entry.destination.is_dir();

        let missing = match (source_ok, destination_ok) {
            (true, true) => None,
            (false, true) => Some(format!(
                "Skipped {}: source folder {} does not exist.",
                entry.name,
                entry.source.display()
            )),
            (true, false) => Some(format!(
                "Skipped {}: destination folder {} does not exist.",
                entry.name,
                entry.destination.display()
            )),
            (false, false) => Some(format!(
                "Skipped {}: source folder {} and destination folder {} do not exist.",
                entry.name,
                entry.source.display(),
                entry.destination.display()
            )),
        };
        if let Some(message) = missing {
            debug!("{}", message);
            report.diagnostics.push(Diagnostic::error(message));
            continue;
        }

        let size = fs_ops::folder_size(&entry.source, &config.ignored_folders, config.skip_hidden);
        if size > config.size_limit_bytes {
            report.diagnostics.push(Diagnostic::skip(format!(
                "Skipped {} ({}) as it exceeds size limit.",
                entry.name,
                entry.source.display()
            )));
            continue;
        }

        report.valid_indices.push(index);
        report.total_bytes = report.total_bytes.saturating_add(size);
    }

    info!(
        "validated {} of {} entries, {} bytes",
        report.valid_indices.len(),
        config.entries.len(),
        report.total_bytes
    );
    report
}

/// Copy the valid entries of `config`.
///
/// Emits `Start` first and exactly one terminal event last. The token is reset
/// before returning, whatever the outcome.
pub fn run(
    valid_indices: &[usize],
    total_bytes: u64,
    config: &CopyJobConfig,
    cancel: &CancellationToken,
    sink: &dyn EventSink<CopyProgressEvent>,
) -> JobOutcome {
    let _reset = ResetOnDrop(cancel);
    let mut job = CopyRun {
        config,
        cancel,
        sink,
        total_bytes,
        copied_bytes: 0,
        files_copied: 0,
        files_skipped: 0,
    };

    sink.emit(CopyProgressEvent::Start { total_bytes });
    info!("copy started: {} entries, {} bytes", valid_indices.len(), total_bytes);

    match job.execute(valid_indices) {
        Ok(Flow::Continue) => {
            info!(
                "copy completed: {} files copied, {} skipped",
                job.files_copied, job.files_skipped
            );
            sink.emit(CopyProgressEvent::Complete {
                message: COMPLETE_MESSAGE.to_string(),
            });
            JobOutcome::Completed {
                copied_bytes: job.copied_bytes,
                files_copied: job.files_copied,
                files_skipped: job.files_skipped,
            }
        }
        Ok(Flow::Cancelled) => {
            info!("copy cancelled after {} bytes", job.copied_bytes);
            sink.emit(CopyProgressEvent::Cancel {
                message: CANCEL_MESSAGE.to_string(),
            });
            JobOutcome::Cancelled {
                copied_bytes: job.copied_bytes,
            }
        }
        Err(e) => {
            warn!("copy failed: {}", e);
            let message = format!("Error: {}", e);
            sink.emit(CopyProgressEvent::Error {
                message: message.clone(),
            });
            JobOutcome::Failed { message }
        }
    }
}

/// Whether a run keeps going after a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Cancelled,
}

struct CopyRun<'a> {
    config: &'a CopyJobConfig,
    cancel: &'a CancellationToken,
    sink: &'a dyn EventSink<CopyProgressEvent>,
    total_bytes: u64,
    copied_bytes: u64,
    files_copied: u64,
    files_skipped: u64,
}

impl CopyRun<'_> {
    fn log(&self, diagnostic: Diagnostic) {
        self.sink.emit(CopyProgressEvent::Log(diagnostic));
    }

    fn execute(&mut self, valid_indices: &[usize]) -> Result<Flow, EngineError> {
        let config = self.config;
        let entries = valid_indices
            .iter()
            .map(|&index| {
                config
                    .entries
                    .get(index)
                    .ok_or_else(|| EngineError::EntryNotFound {
                        name: format!("#{}", index),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if config.clear_destination_first {
            let mut cleared = HashSet::new();
            for entry in &entries {
                if self.cancel.is_cancelled() {
                    return Ok(Flow::Cancelled);
                }
                if !cleared.insert(entry.destination.as_path()) {
                    continue;
                }
                info!("clearing {}", entry.destination.display());
                fs_ops::clear_directory_contents(&entry.destination, &mut |d| self.log(d));
            }
        }

        for entry in entries {
            if self.cancel.is_cancelled() {
                return Ok(Flow::Cancelled);
            }
            debug!("copying entry {}", entry);

            if config.is_ignored(&entry.source) {
                self.log(Diagnostic::ignore(format!(
                    "Ignored folder: {}",
                    entry.source.display()
                )));
                continue;
            }

            let destination = if config.copy_folder_mode {
                let folder = entry.source.file_name().ok_or_else(|| EngineError::EnumerationFailed {
                    path: entry.source.clone(),
                    source: io::Error::new(io::ErrorKind::InvalidInput, "source has no folder name"),
                })?;
                let nested = entry.destination.join(folder);
                fs_ops::ensure_dir(&nested)?;
                nested
            } else {
                entry.destination.clone()
            };

            if self.copy_dir(&entry.source, &destination, Path::new(""))? == Flow::Cancelled {
                return Ok(Flow::Cancelled);
            }
        }

        Ok(Flow::Continue)
    }

    /// Copy the files of `src_dir`, then descend into its subdirectories.
    fn copy_dir(&mut self, src_dir: &Path, dst_dir: &Path, rel: &Path) -> Result<Flow, EngineError> {
        if self.cancel.is_cancelled() {
            return Ok(Flow::Cancelled);
        }

        let listing = list_sorted(src_dir)?;

        for link in &listing.links {
            self.log(Diagnostic::skip(format!(
                "Skipped folder link: {}",
                rel.join(link).display()
            )));
        }

        for file in listing.files {
            let rel_path = rel.join(&file.name);
            if self.config.skip_hidden && fs_ops::is_hidden(file.name.as_os_str()) {
                self.log(Diagnostic::skip(format!(
                    "Skipped hidden file: {}",
                    rel_path.display()
                )));
                continue;
            }
            let dst = dst_dir.join(&file.name);
            if self.copy_file(&file.path, &dst, &rel_path, file.len)? == Flow::Cancelled {
                return Ok(Flow::Cancelled);
            }
        }

        for (name, path) in listing.dirs {
            let rel_path = rel.join(&name);
            if self.config.is_ignored(&path) {
                self.log(Diagnostic::ignore(format!("Ignored folder: {}", path.display())));
                continue;
            }
            if self.config.skip_hidden && fs_ops::is_hidden(name.as_os_str()) {
                self.log(Diagnostic::skip(format!(
                    "Skipped hidden folder: {}",
                    rel_path.display()
                )));
                continue;
            }

            let dst_sub = dst_dir.join(&name);
            fs_ops::ensure_dir(&dst_sub)?;
            if self.copy_dir(&path, &dst_sub, &rel_path)? == Flow::Cancelled {
                return Ok(Flow::Cancelled);
            }
        }

        Ok(Flow::Continue)
    }

    /// Take `len` bytes that will never be copied out of the run's total.
    fn shrink_total(&mut self, len: u64) {
        self.total_bytes = self.total_bytes.saturating_sub(len);
        self.sink.emit(CopyProgressEvent::AdjustTotal {
            new_total_bytes: self.total_bytes,
        });
    }

    fn vanished(&mut self, rel: &Path, len: u64) -> Flow {
        self.files_skipped += 1;
        self.shrink_total(len);
        self.log(Diagnostic::skip(format!(
            "Skipped (no longer exists): {}",
            rel.display()
        )));
        Flow::Continue
    }

    /// Copy one file whose listed size is `len`.
    fn copy_file(&mut self, src: &Path, dst: &Path, rel: &Path, len: u64) -> Result<Flow, EngineError> {
        if self.cancel.is_cancelled() {
            return Ok(Flow::Cancelled);
        }

        if self.config.skip_existing && dst.exists() {
            self.files_skipped += 1;
            self.shrink_total(len);
            self.log(Diagnostic::skip(format!(
                "Skipped (already exists): {}",
                rel.display()
            )));
            return Ok(Flow::Continue);
        }

        let sink = self.sink;
        let copied = &mut self.copied_bytes;
        let result = fs_ops::copy_file_chunked(src, dst, self.cancel, &mut |chunk| {
            *copied += chunk;
            sink.emit(CopyProgressEvent::Progress {
                copied_bytes: *copied,
            });
        });

        match result {
            Ok(ChunkCopy::Done(_)) => {
                self.files_copied += 1;
                self.log(Diagnostic::copy(format!("Copied: {}", rel.display())));
                Ok(Flow::Continue)
            }
            Ok(ChunkCopy::Cancelled(written)) => {
                debug!("left partial file {} ({} bytes)", dst.display(), written);
                Ok(Flow::Cancelled)
            }
            Err(EngineError::ReadError { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                Ok(self.vanished(rel, len))
            }
            Err(e) => Err(e),
        }
    }
}

/// A regular file (or file symlink) found while listing a directory.
struct ListedFile {
    name: PathBuf,
    path: PathBuf,
    /// Size at listing time; zero if the file was already gone
    len: u64,
}

/// One directory's children, each list sorted by name.
struct Listing {
    files: Vec<ListedFile>,
    dirs: Vec<(PathBuf, PathBuf)>,
    /// Names of symlinked directories, which are never followed
    links: Vec<PathBuf>,
}

/// List a directory's children, split by kind and sorted by name.
fn list_sorted(dir: &Path) -> Result<Listing, EngineError> {
    let enumeration_failed = |e| EngineError::EnumerationFailed {
        path: dir.to_path_buf(),
        source: e,
    };

    let mut listing = Listing {
        files: Vec::new(),
        dirs: Vec::new(),
        links: Vec::new(),
    };
    for entry in fs::read_dir(dir).map_err(enumeration_failed)? {
        let entry = entry.map_err(enumeration_failed)?;
        let file_type = entry.file_type().map_err(enumeration_failed)?;
        let path = entry.path();
        let name = PathBuf::from(entry.file_name());
        match fs_ops::classify(&path, file_type) {
            EntryKind::Dir => listing.dirs.push((name, path)),
            EntryKind::LinkedDir => {
                debug!("not following directory link {}", path.display());
                listing.links.push(name);
            }
            EntryKind::File => {
                // Follows file symlinks, matching how the source was measured.
                let len = match fs::metadata(&path) {
                    Ok(metadata) => metadata.len(),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
                    Err(e) => return Err(EngineError::ReadError { path, source: e }),
                };
                listing.files.push(ListedFile { name, path, len });
            }
        }
    }
    listing.files.sort_by(|a, b| a.name.cmp(&b.name));
    listing.dirs.sort();
    listing.links.sort();
    Ok(listing)
}

/// Runs copy jobs on a worker thread, one at a time.
#[derive(Debug, Clone, Default)]
pub struct CopyEngine {
    slot: JobSlot,
}

impl CopyEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// True while a spawned job has not returned.
    pub fn is_running(&self) -> bool {
        self.slot.is_busy()
    }

    /// Start `run` on a dedicated thread, using an existing validation.
    ///
    /// `config` is the snapshot the worker owns for the whole run. The token
    /// is cleared before the worker starts.
    ///
    /// # Errors
    /// Returns `JobInProgress` if a job started by this engine is still running.
    pub fn spawn<S>(
        &self,
        config: CopyJobConfig,
        validation: &ValidationReport,
        cancel: CancellationToken,
        sink: S,
    ) -> Result<JoinHandle<JobReport>, EngineError>
    where
        S: EventSink<CopyProgressEvent> + 'static,
    {
        self.start(config, Some(validation.clone()), cancel, sink)
    }

    /// Validate and then run on a dedicated thread.
    ///
    /// Validation walks every source tree, so callers with an event loop use
    /// this instead of calling `validate` themselves. Validation diagnostics
    /// arrive as `Log` events ahead of `Start`.
    ///
    /// # Errors
    /// Returns `JobInProgress` if a job started by this engine is still running.
    pub fn spawn_validated<S>(
        &self,
        config: CopyJobConfig,
        cancel: CancellationToken,
        sink: S,
    ) -> Result<JoinHandle<JobReport>, EngineError>
    where
        S: EventSink<CopyProgressEvent> + 'static,
    {
        self.start(config, None, cancel, sink)
    }

    fn start<S>(
        &self,
        config: CopyJobConfig,
        validation: Option<ValidationReport>,
        cancel: CancellationToken,
        sink: S,
    ) -> Result<JoinHandle<JobReport>, EngineError>
    where
        S: EventSink<CopyProgressEvent> + 'static,
    {
        let guard = self
            .slot
            .try_acquire()
            .ok_or(EngineError::JobInProgress { kind: "copy job" })?;
        // A cancel aimed at the previous job must not abort this one.
        cancel.reset();

        let handle = thread::Builder::new()
            .name("copy-job".to_string())
            .spawn(move || {
                let _guard = guard;
                let id = Uuid::new_v4();
                let started_at = Utc::now();
                let span = tracing::info_span!("copy_job", %id);
                let _entered = span.enter();

                let validation = validation.unwrap_or_else(|| {
                    let report = validate(&config);
                    for diagnostic in &report.diagnostics {
                        sink.emit(CopyProgressEvent::Log(diagnostic.clone()));
                    }
                    report
                });
                let outcome = run(
                    &validation.valid_indices,
                    validation.total_bytes,
                    &config,
                    &cancel,
                    &sink,
                );
                JobReport {
                    id,
                    outcome,
                    started_at,
                    finished_at: Utc::now(),
                }
            })?;
        Ok(handle)
    }
}
