//! # SaveManager Engine - Save Backup Library
//!
//! A headless engine for finding, backing up and restoring per-application
//! save directories. Designed as the foundation for multiple UIs (CLI, GUI).
//!
//! ## Overview
//!
//! Two engines share one execution model: a run happens on a worker thread and
//! reports to a single consumer through an `EventSink` (usually a channel the
//! UI drains once per tick).
//!
//! - The **copy engine** copies named (source, destination) folder pairs with
//!   size limits, ignored folders, hidden-file skipping, skip-existing and
//!   cooperative cancellation, reporting byte-level progress.
//! - The **discovery engine** walks configured roots and collects directories
//!   that directly contain files with save extensions.
//!
//! ## Basic Usage
//!
//! ```no_run
//! use savemgr_engine::{
//!     job, CancellationToken, CopyProgressEvent, EntryRepository, FolderPairEntry, Settings,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut entries = EntryRepository::new();
//! entries.add(FolderPairEntry::new("Celeste", "C:\\Games\\Celeste\\Saves", "D:\\Backup"))?;
//!
//! // Snapshot settings and entries for this run
//! let config = Settings::default().copy_job_config(entries.snapshot());
//! let report = job::validate(&config);
//! for diagnostic in &report.diagnostics {
//!     println!("{}", diagnostic);
//! }
//!
//! let (tx, rx) = crossbeam_channel::unbounded::<CopyProgressEvent>();
//! let outcome = job::run(
//!     &report.valid_indices,
//!     report.total_bytes,
//!     &config,
//!     &CancellationToken::new(),
//!     &tx,
//! );
//! for event in rx.try_iter() {
//!     println!("{:?}", event);
//! }
//! println!("{:?}", outcome);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Core data structures (FolderPairEntry, configs, diagnostics, outcomes)
//! - **error**: Error types and handling
//! - **cancel**: Cancellation token, re-entrancy guard, bounded worker join
//! - **progress**: Event types, event sinks, consumer-side progress tracking
//! - **fs_ops**: Low-level filesystem operations
//! - **job**: Copy engine (validate, run, spawn)
//! - **discovery**: Discovery engine (scan, spawn)
//! - **entries**: Folder-pair repository and its JSON file
//! - **settings**: User settings and their JSON file

pub mod cancel;
pub mod discovery;
pub mod entries;
pub mod error;
pub mod fs_ops;
pub mod job;
pub mod model;
pub mod progress;
pub mod settings;

// Re-export main types and functions
pub use cancel::{join_with_timeout, CancellationToken, JobSlot, SHUTDOWN_TIMEOUT};
pub use discovery::{scan, DiscoveryEngine, DiscoveryResult};
pub use entries::{entries_path, EntryRepository};
pub use error::EngineError;
pub use job::{run, validate, CopyEngine};
pub use model::{
    CopyJobConfig, Diagnostic, DiagnosticTag, DiscoveryConfig, FolderPairEntry, JobOutcome,
    JobReport, ValidationReport, BYTES_PER_GB,
};
pub use progress::{
    CopyProgressEvent, DiscoveryEvent, EventSink, FnSink, ProgressTracker,
    DEFAULT_CHANNEL_CAPACITY,
};
pub use settings::{default_config_dir, Settings, SettingsStore};
