//! Save discovery: find directories holding save files.
//!
//! A scan walks every configured root and records each directory that
//! directly contains a file whose name ends with one of the configured
//! extensions. Unreadable directories and missing roots are reported as
//! diagnostics and never stop the scan.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::cancel::{CancellationToken, JobSlot, ResetOnDrop};
use crate::error::EngineError;
use crate::model::{Diagnostic, DiscoveryConfig};
use crate::progress::{DiscoveryEvent, EventSink};

/// Progress is emitted every this many processed directories.
pub const PROGRESS_INTERVAL: u64 = 10;

/// Directories found by a scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiscoveryResult {
    dirs: HashSet<PathBuf>,
    matched_files: u64,
}

impl DiscoveryResult {
    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    pub fn contains(&self, dir: &Path) -> bool {
        self.dirs.contains(dir)
    }

    /// Number of matching files seen, across all found directories.
    pub fn matched_files(&self) -> u64 {
        self.matched_files
    }

    /// Found directories in ascending path-string order.
    pub fn sorted(&self) -> impl Iterator<Item = &Path> + '_ {
        let mut dirs: Vec<(String, &Path)> = self
            .dirs
            .iter()
            .map(|d| (d.to_string_lossy().into_owned(), d.as_path()))
            .collect();
        dirs.sort();
        dirs.into_iter().map(|(_, dir)| dir)
    }

    /// Sorted directories paired with a 1-based position, for numbered lists.
    pub fn numbered(&self) -> impl Iterator<Item = (usize, &Path)> + '_ {
        self.sorted().enumerate().map(|(i, dir)| (i + 1, dir))
    }

    fn record(&mut self, dir: &Path) {
        self.matched_files += 1;
        if !self.dirs.contains(dir) {
            self.dirs.insert(dir.to_path_buf());
        }
    }
}

/// Case-sensitive suffix match against any of `extensions`.
pub fn matches_extension(file_name: &str, extensions: &[String]) -> bool {
    extensions.iter().any(|ext| file_name.ends_with(ext.as_str()))
}

/// Scan `roots` for directories holding files ending with one of `extensions`.
///
/// Missing roots are reported and left out. A pre-pass counts directories to
/// drive `processed / total` progress. The token is checked at every
/// directory; on cancellation the directories found so far are returned.
/// The token is reset before returning.
pub fn scan(
    roots: &[PathBuf],
    extensions: &[String],
    cancel: &CancellationToken,
    sink: &dyn EventSink<DiscoveryEvent>,
) -> DiscoveryResult {
    let _reset = ResetOnDrop(cancel);
    let mut result = DiscoveryResult::default();

    let mut valid_roots = Vec::new();
    for root in roots {
        if root.is_dir() {
            valid_roots.push(root.as_path());
        } else {
            debug!("skipping nonexistent root {}", root.display());
            sink.emit(DiscoveryEvent::Diagnostic(Diagnostic::skip(format!(
                "Skipped directory '{}' as it does not exist.",
                root.display()
            ))));
        }
    }

    let mut total_dirs: u64 = 0;
    for root in &valid_roots {
        match count_dirs(root, cancel) {
            Some(count) => total_dirs += count,
            None => {
                info!("scan cancelled while counting directories");
                sink.emit(DiscoveryEvent::Cancelled { found: 0 });
                return result;
            }
        }
    }
    info!("scan started: {} roots, {} directories", valid_roots.len(), total_dirs);
    sink.emit(DiscoveryEvent::Start { total_dirs });
    if total_dirs == 0 {
        sink.emit(DiscoveryEvent::Progress {
            processed_dirs: 0,
            total_dirs: 0,
        });
    }

    let mut processed_dirs: u64 = 0;
    for root in valid_roots {
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let dir = e
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| root.display().to_string());
                    debug!("cannot read {}: {}", dir, e);
                    sink.emit(DiscoveryEvent::Diagnostic(Diagnostic::error(format!(
                        "Error processing directory {}: {}",
                        dir, e
                    ))));
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                if cancel.is_cancelled() {
                    info!("scan cancelled with {} directories found", result.len());
                    sink.emit(DiscoveryEvent::Cancelled {
                        found: result.len(),
                    });
                    return result;
                }
                processed_dirs += 1;
                if processed_dirs % PROGRESS_INTERVAL == 0 {
                    sink.emit(DiscoveryEvent::Progress {
                        processed_dirs,
                        total_dirs,
                    });
                }
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            if matches_extension(&name, extensions) {
                if let Some(parent) = entry.path().parent() {
                    result.record(parent);
                }
            }
        }
    }

    let done = processed_dirs.max(total_dirs);
    sink.emit(DiscoveryEvent::Progress {
        processed_dirs: done,
        total_dirs: done,
    });
    info!(
        "scan completed: {} directories with {} matching files",
        result.len(),
        result.matched_files()
    );
    sink.emit(DiscoveryEvent::Complete {
        found: result.len(),
    });
    result
}

/// Number of directories under `root`, `root` included.
///
/// Returns `None` as soon as the token is seen cancelled.
fn count_dirs(root: &Path, cancel: &CancellationToken) -> Option<u64> {
    let mut count = 0;
    for entry in WalkDir::new(root).into_iter().filter_map(Result::ok) {
        if entry.file_type().is_dir() {
            if cancel.is_cancelled() {
                return None;
            }
            count += 1;
        }
    }
    Some(count)
}

/// Runs scans on a worker thread, one at a time.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryEngine {
    slot: JobSlot,
}

impl DiscoveryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.slot.is_busy()
    }

    /// Start `scan` on a dedicated thread with the given snapshot.
    ///
    /// The token is cleared before the worker starts.
    ///
    /// # Errors
    /// Returns `JobInProgress` if a scan started by this engine is still running.
    pub fn spawn<S>(
        &self,
        config: DiscoveryConfig,
        cancel: CancellationToken,
        sink: S,
    ) -> Result<JoinHandle<DiscoveryResult>, EngineError>
    where
        S: EventSink<DiscoveryEvent> + 'static,
    {
        let guard = self
            .slot
            .try_acquire()
            .ok_or(EngineError::JobInProgress { kind: "scan" })?;
        cancel.reset();

        let handle = thread::Builder::new()
            .name("save-scan".to_string())
            .spawn(move || {
                let _guard = guard;
                scan(&config.roots, &config.extensions, &cancel, &sink)
            })?;
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DiagnosticTag;
    use std::fs;
    use std::sync::Mutex;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent");
        }
        fs::write(path, b"x").expect("Failed to write file");
    }

    fn exts(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_matches_extension_is_case_sensitive_suffix() {
        let extensions = exts(&[".sav", ".save"]);
        assert!(matches_extension("slot1.sav", &extensions));
        assert!(matches_extension("profile.save", &extensions));
        assert!(!matches_extension("SLOT1.SAV", &extensions));
        assert!(!matches_extension("slot1.sav.bak", &extensions));
    }

    #[test]
    fn test_scan_finds_directories_with_matches() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = temp_dir.path().join("R");
        touch(&root.join("a").join("game.sav"));
        touch(&root.join("a").join("game2.sav"));
        touch(&root.join("b").join("notes.txt"));

        let events = Mutex::new(Vec::new());
        let result = scan(
            &[root.clone()],
            &exts(&[".sav"]),
            &CancellationToken::new(),
            &events,
        );

        assert_eq!(result.len(), 1);
        assert!(result.contains(&root.join("a")));
        assert_eq!(result.matched_files(), 2);

        let events = events.into_inner().unwrap();
        assert_eq!(events.first(), Some(&DiscoveryEvent::Start { total_dirs: 3 }));
        assert_eq!(events.last(), Some(&DiscoveryEvent::Complete { found: 1 }));
    }

    #[test]
    fn test_scan_reports_missing_root_and_continues() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = temp_dir.path().join("present");
        touch(&root.join("slot.save"));
        let missing = temp_dir.path().join("missing");

        let events = Mutex::new(Vec::new());
        let result = scan(
            &[missing, root.clone()],
            &exts(&[".sav", ".save"]),
            &CancellationToken::new(),
            &events,
        );

        assert!(result.contains(&root));
        let events = events.into_inner().unwrap();
        let diagnostics: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                DiscoveryEvent::Diagnostic(d) => Some(d),
                _ => None,
            })
            .collect();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("does not exist"));
    }

    #[test]
    fn test_scan_with_no_valid_roots_completes_immediately() {
        let events = Mutex::new(Vec::new());
        let result = scan(
            &[PathBuf::from("/definitely/not/here")],
            &exts(&[".sav"]),
            &CancellationToken::new(),
            &events,
        );

        assert!(result.is_empty());
        let events = events.into_inner().unwrap();
        let fractions: Vec<f32> = events.iter().filter_map(|e| e.fraction()).collect();
        assert!(!fractions.is_empty());
        assert!(fractions.iter().all(|f| *f == 1.0));
    }

    #[test]
    fn test_scan_emits_progress_every_ten_directories() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = temp_dir.path().join("R");
        for i in 0..24 {
            fs::create_dir_all(root.join(format!("d{:02}", i))).expect("Failed to create dir");
        }

        let events = Mutex::new(Vec::new());
        scan(&[root], &exts(&[".sav"]), &CancellationToken::new(), &events);

        let progress: Vec<u64> = events
            .into_inner()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                DiscoveryEvent::Progress { processed_dirs, .. } => Some(*processed_dirs),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![10, 20, 25]);
    }

    #[test]
    fn test_scan_cancelled_returns_partial_and_resets() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = temp_dir.path().join("R");
        touch(&root.join("a").join("game.sav"));

        let token = CancellationToken::new();
        token.cancel();
        let events = Mutex::new(Vec::new());
        let result = scan(&[root], &exts(&[".sav"]), &token, &events);

        assert!(result.is_empty());
        assert!(!token.is_cancelled());
        let events = events.into_inner().unwrap();
        assert!(matches!(events.last(), Some(DiscoveryEvent::Cancelled { .. })));
    }

    #[test]
    fn test_count_dirs_stops_on_cancel() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = temp_dir.path().join("R");
        fs::create_dir_all(root.join("a").join("b")).expect("Failed to create dirs");

        let token = CancellationToken::new();
        assert_eq!(count_dirs(&root, &token), Some(3));
        token.cancel();
        assert_eq!(count_dirs(&root, &token), None);
    }

    #[test]
    fn test_spawn_clears_stale_cancellation() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = temp_dir.path().join("R");
        touch(&root.join("a").join("game.sav"));

        let token = CancellationToken::new();
        token.cancel();
        let (tx, rx) = crossbeam_channel::unbounded();
        let result = DiscoveryEngine::new()
            .spawn(
                DiscoveryConfig {
                    roots: vec![root.clone()],
                    extensions: exts(&[".sav"]),
                },
                token.clone(),
                tx,
            )
            .expect("scan should start")
            .join()
            .expect("worker panicked");

        assert!(result.contains(&root.join("a")));
        let events: Vec<_> = rx.iter().collect();
        assert_eq!(events.last(), Some(&DiscoveryEvent::Complete { found: 1 }));
        assert!(!token.is_cancelled());
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_reports_unreadable_directory_and_continues() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = temp_dir.path().join("R");
        let locked = root.join("locked");
        touch(&locked.join("hidden.sav"));
        touch(&root.join("open").join("game.sav"));
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000))
            .expect("Failed to lock dir");

        // Permissions do not bind when running as root.
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).ok();
            return;
        }

        let events = Mutex::new(Vec::new());
        let result = scan(&[root.clone()], &exts(&[".sav"]), &CancellationToken::new(), &events);
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755))
            .expect("Failed to unlock dir");

        assert!(result.contains(&root.join("open")));
        assert!(!result.contains(&locked));
        let events = events.into_inner().unwrap();
        let errors: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                DiscoveryEvent::Diagnostic(d) if d.tag == DiagnosticTag::Error => Some(d),
                _ => None,
            })
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("locked"));
        assert_eq!(events.last(), Some(&DiscoveryEvent::Complete { found: 1 }));
    }

    #[test]
    fn test_sorted_and_numbered_output() {
        let mut result = DiscoveryResult::default();
        result.record(Path::new("/saves/zelda"));
        result.record(Path::new("/saves/celeste"));
        result.record(Path::new("/saves/celeste"));

        let sorted: Vec<_> = result.sorted().collect();
        assert_eq!(sorted, vec![Path::new("/saves/celeste"), Path::new("/saves/zelda")]);

        let numbered: Vec<_> = result.numbered().collect();
        assert_eq!(numbered[0], (1, Path::new("/saves/celeste")));
        assert_eq!(numbered[1], (2, Path::new("/saves/zelda")));
        assert_eq!(result.len(), 2);
        assert_eq!(result.matched_files(), 3);
    }
}
