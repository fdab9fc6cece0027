//! Core data model for copy jobs and save scans.
//!
//! This module defines the main data structures shared by both engines:
//! - FolderPairEntry: a named source/destination directory mapping
//! - CopyJobConfig / DiscoveryConfig: immutable per-run snapshots of settings
//! - Diagnostic: a tagged, human-readable note about a skip, ignore or error
//! - ValidationReport, JobOutcome, JobReport: results handed back to callers

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of bytes in one gigabyte, using binary multiples.
pub const BYTES_PER_GB: u64 = 1024 * 1024 * 1024;

/// A named (source, destination) directory mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderPairEntry {
    /// Unique name of this entry
    pub name: String,

    /// Directory whose contents get copied
    pub source: PathBuf,

    /// Directory receiving the copy
    pub destination: PathBuf,
}

impl FolderPairEntry {
    pub fn new(
        name: impl Into<String>,
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        FolderPairEntry {
            name: name.into(),
            source: source.into(),
            destination: destination.into(),
        }
    }
}

impl fmt::Display for FolderPairEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} -> {}",
            self.name,
            self.source.display(),
            self.destination.display()
        )
    }
}

/// Everything one copy run needs, snapshotted when the run is requested.
///
/// The entry list is an owned copy; edits made to the entry repository while
/// the job runs are never observed by the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyJobConfig {
    /// Entries in configured order
    pub entries: Vec<FolderPairEntry>,

    /// Copy into `destination/<source folder name>` instead of `destination`
    pub copy_folder_mode: bool,

    /// Entries larger than this are skipped
    pub size_limit_bytes: u64,

    /// Leave files that already exist at the destination untouched
    pub skip_existing: bool,

    /// Skip files and directories whose name starts with `.`
    pub skip_hidden: bool,

    /// Empty every destination before copying
    pub clear_destination_first: bool,

    /// Source subtrees that are never copied or counted
    pub ignored_folders: HashSet<PathBuf>,
}

impl Default for CopyJobConfig {
    fn default() -> Self {
        CopyJobConfig {
            entries: Vec::new(),
            copy_folder_mode: false,
            size_limit_bytes: 5 * BYTES_PER_GB,
            skip_existing: true,
            skip_hidden: false,
            clear_destination_first: false,
            ignored_folders: HashSet::new(),
        }
    }
}

impl CopyJobConfig {
    /// Whether `dir` is listed as an ignored folder.
    pub fn is_ignored(&self, dir: &Path) -> bool {
        self.ignored_folders.contains(dir)
    }
}

/// Roots and extensions for one save scan.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiscoveryConfig {
    pub roots: Vec<PathBuf>,
    pub extensions: Vec<String>,
}

/// Category of a diagnostic line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticTag {
    /// Something was deliberately not copied
    Skip,
    /// An ignored folder was pruned
    Ignore,
    /// A file was copied
    Copy,
    /// Something was removed from a destination
    Delete,
    /// A non-fatal failure
    Error,
}

impl DiagnosticTag {
    pub const ALL: [DiagnosticTag; 5] = [
        DiagnosticTag::Skip,
        DiagnosticTag::Ignore,
        DiagnosticTag::Copy,
        DiagnosticTag::Delete,
        DiagnosticTag::Error,
    ];
}

impl fmt::Display for DiagnosticTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticTag::Skip => write!(f, "skip"),
            DiagnosticTag::Ignore => write!(f, "ignore"),
            DiagnosticTag::Copy => write!(f, "copy"),
            DiagnosticTag::Delete => write!(f, "delete"),
            DiagnosticTag::Error => write!(f, "error"),
        }
    }
}

/// A non-fatal, human-readable message produced by an engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub tag: DiagnosticTag,
    pub message: String,
}

impl Diagnostic {
    pub fn new(tag: DiagnosticTag, message: impl Into<String>) -> Self {
        Diagnostic {
            tag,
            message: message.into(),
        }
    }

    pub fn skip(message: impl Into<String>) -> Self {
        Self::new(DiagnosticTag::Skip, message)
    }

    pub fn ignore(message: impl Into<String>) -> Self {
        Self::new(DiagnosticTag::Ignore, message)
    }

    pub fn copy(message: impl Into<String>) -> Self {
        Self::new(DiagnosticTag::Copy, message)
    }

    pub fn delete(message: impl Into<String>) -> Self {
        Self::new(DiagnosticTag::Delete, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(DiagnosticTag::Error, message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.tag, self.message)
    }
}

/// Result of validating the configured entries before a copy run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Indices into `CopyJobConfig::entries` that will be copied, in order
    pub valid_indices: Vec<usize>,

    /// Sum of the computed sizes of the valid entries
    pub total_bytes: u64,

    /// Skip and invalid messages, in evaluation order
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationReport {
    pub fn is_empty(&self) -> bool {
        self.valid_indices.is_empty()
    }
}

/// Terminal state of one copy run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Every valid entry was processed
    Completed {
        copied_bytes: u64,
        files_copied: u64,
        files_skipped: u64,
    },
    /// The cancellation token was observed
    Cancelled { copied_bytes: u64 },
    /// An unexpected failure aborted the run
    Failed { message: String },
}

impl JobOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, JobOutcome::Completed { .. })
    }
}

/// Bookkeeping for one copy run.
#[derive(Debug, Clone)]
pub struct JobReport {
    /// Unique identifier for this run
    pub id: Uuid,

    pub outcome: JobOutcome,

    /// When the worker started
    pub started_at: DateTime<Utc>,

    /// When the worker returned
    pub finished_at: DateTime<Utc>,
}

impl JobReport {
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
