//! Error types for the save manager engine.
//!
//! The primary error type is `EngineError`. Most failures the engines meet while
//! working (a file vanishing, a directory that cannot be read, a delete that
//! fails) are not errors at this level: they are turned into `Diagnostic`
//! values and the job carries on. `EngineError` is reserved for conditions
//! that stop an operation outright.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that stop an engine operation or a store update.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Failed to read from a source file
    #[error("Failed to read file: {} ({source})", path.display())]
    ReadError { path: PathBuf, source: io::Error },

    /// Failed to write to a destination file
    #[error("Failed to write file: {} ({source})", path.display())]
    WriteError { path: PathBuf, source: io::Error },

    /// Failed to enumerate a directory
    #[error("Failed to enumerate directory: {} ({source})", path.display())]
    EnumerationFailed { path: PathBuf, source: io::Error },

    /// Failed to create a directory
    #[error("Failed to create directory: {} ({source})", path.display())]
    DirectoryCreationFailed { path: PathBuf, source: io::Error },

    /// Failed to remove a file or directory
    #[error("Failed to delete: {} ({source})", path.display())]
    DeleteFailed { path: PathBuf, source: io::Error },

    /// An entry with this name is already configured
    #[error("An entry named '{name}' already exists")]
    DuplicateEntry { name: String },

    /// No entry with this name is configured
    #[error("No entry named '{name}'")]
    EntryNotFound { name: String },

    /// A job of this kind is already running
    #[error("A {kind} is already in progress")]
    JobInProgress { kind: &'static str },

    /// A persisted store could not be parsed or serialized
    #[error("Invalid store file {}: {source}", path.display())]
    Store {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl EngineError {
    /// Extract the OS error code from this error, if available.
    pub fn raw_os_error(&self) -> Option<u32> {
        match self {
            Self::ReadError { source, .. }
            | Self::WriteError { source, .. }
            | Self::EnumerationFailed { source, .. }
            | Self::DirectoryCreationFailed { source, .. }
            | Self::DeleteFailed { source, .. }
            | Self::Io(source) => source.raw_os_error().map(|e| e as u32),
            _ => None,
        }
    }
}
