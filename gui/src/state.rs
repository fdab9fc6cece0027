use std::path::{Path, PathBuf};

use savemgr_engine::{
    entries_path, CopyProgressEvent, Diagnostic, DiscoveryEvent, DiscoveryResult,
    EntryRepository, FolderPairEntry, JobOutcome, JobReport, ProgressTracker, Settings,
    SettingsStore,
};

use crate::display_types::LogFilter;

/// Application state, holding all UI and job-related data.
#[derive(Debug)]
pub struct AppState {
    /// Where settings and entries are persisted; `None` disables persistence
    pub config_dir: Option<PathBuf>,
    pub settings: Settings,
    pub entries: EntryRepository,

    // Entry form
    pub name_input: String,
    pub source_input: String,
    pub destination_input: String,
    pub size_limit_input: String,

    // Copy job
    pub progress: ProgressTracker,
    pub show_progress: bool,
    pub copy_log: Vec<Diagnostic>,
    pub log_filter: LogFilter,

    // Save finder
    pub scan_fraction: Option<f32>,
    pub scan_finished: bool,
    pub found: Vec<PathBuf>,

    pub status: String,
}

impl AppState {
    pub fn new(config_dir: Option<PathBuf>, settings: Settings, entries: EntryRepository) -> Self {
        AppState {
            config_dir,
            size_limit_input: settings.file_size_limit.to_string(),
            settings,
            entries,
            name_input: String::new(),
            source_input: String::new(),
            destination_input: String::new(),
            progress: ProgressTracker::new(),
            show_progress: false,
            copy_log: Vec::new(),
            log_filter: LogFilter::All,
            scan_fraction: None,
            scan_finished: false,
            found: Vec::new(),
            status: String::new(),
        }
    }

    /// Load settings and entries from `config_dir`, falling back to defaults.
    pub fn load(config_dir: Option<PathBuf>) -> Self {
        let mut state = Self::new(config_dir, Settings::default(), EntryRepository::new());
        let Some(dir) = state.config_dir.clone() else {
            return state;
        };

        match SettingsStore::in_dir(&dir).load() {
            Ok(settings) => {
                state.size_limit_input = settings.file_size_limit.to_string();
                state.settings = settings;
            }
            Err(e) => state.report_error(format!("Failed to load settings: {}", e)),
        }
        match EntryRepository::load(&entries_path(&dir)) {
            Ok(entries) => state.entries = entries,
            Err(e) => state.report_error(format!("Failed to load entries: {}", e)),
        }
        state
    }

    fn report_error(&mut self, message: String) {
        tracing::warn!("{}", message);
        self.copy_log.push(Diagnostic::error(message.clone()));
        self.status = message;
    }

    pub fn save_settings(&mut self) {
        let Some(dir) = self.config_dir.as_deref() else {
            return;
        };
        if let Err(e) = SettingsStore::in_dir(dir).save(&self.settings) {
            self.report_error(format!("Failed to save settings: {}", e));
        }
    }

    fn save_entries(&mut self) {
        let Some(dir) = self.config_dir.as_deref() else {
            return;
        };
        match self.entries.save(&entries_path(dir)) {
            Ok(()) => self.status = "Entries saved successfully.".to_string(),
            Err(e) => self.report_error(format!("Failed to save entries: {}", e)),
        }
    }

    pub fn set_size_limit(&mut self, input: String) {
        if let Ok(limit) = input.trim().parse() {
            self.settings.file_size_limit = limit;
            self.save_settings();
        }
        self.size_limit_input = input;
    }

    pub fn set_source(&mut self, path: &Path) {
        self.source_input = path.display().to_string();
    }

    pub fn set_destination(&mut self, path: &Path) {
        self.destination_input = path.display().to_string();
    }

    /// Add the entry described by the form; returns false if it was rejected.
    pub fn add_entry_from_form(&mut self) -> bool {
        let name = self.name_input.trim();
        let source = self.source_input.trim();
        let destination = self.destination_input.trim();
        if name.is_empty() || source.is_empty() || destination.is_empty() {
            self.status = "Please fill the name and select folders.".to_string();
            return false;
        }

        let entry = FolderPairEntry::new(name, source, destination);
        let name = entry.name.clone();
        if let Err(e) = self.entries.add(entry) {
            self.status = e.to_string();
            return false;
        }

        self.name_input.clear();
        self.source_input.clear();
        self.destination_input.clear();
        self.save_entries();
        self.status = format!("Added entry: {}", name);
        true
    }

    pub fn remove_entry(&mut self, name: &str) {
        match self.entries.remove(name) {
            Ok(removed) => {
                self.save_entries();
                self.status = format!("Removed entry: {}", removed.name);
            }
            Err(e) => self.status = e.to_string(),
        }
    }

    pub fn clear_entries(&mut self) {
        self.entries.clear();
        if let Some(dir) = self.config_dir.as_deref() {
            if let Err(e) = EntryRepository::clear_file(&entries_path(dir)) {
                self.report_error(e.to_string());
                return;
            }
        }
        self.status = "All entries cleared.".to_string();
    }

    /// Reset the copy view; validation results arrive later as events.
    pub fn begin_copy(&mut self) {
        self.copy_log.clear();
        self.progress = ProgressTracker::new();
        self.show_progress = true;
        self.status = "Copying directories...".to_string();
    }

    pub fn apply_copy_event(&mut self, event: CopyProgressEvent) {
        self.progress.apply(&event);
        match event {
            CopyProgressEvent::Log(diagnostic) => self.copy_log.push(diagnostic),
            CopyProgressEvent::Complete { message }
            | CopyProgressEvent::Cancel { message }
            | CopyProgressEvent::Error { message } => self.status = message,
            _ => {}
        }
    }

    pub fn finish_copy(&mut self, report: &JobReport) {
        tracing::info!(
            "copy job {} finished after {} ms",
            report.id,
            report.elapsed().num_milliseconds()
        );
        if let JobOutcome::Failed { message } = &report.outcome {
            self.status = message.clone();
        }
    }

    pub fn begin_scan(&mut self) {
        self.found.clear();
        self.scan_fraction = Some(0.0);
        self.scan_finished = false;
        self.status = "Searching for save files...".to_string();
    }

    pub fn apply_discovery_event(&mut self, event: DiscoveryEvent) {
        if let Some(fraction) = event.fraction() {
            self.scan_fraction = Some(fraction);
        }
        match event {
            DiscoveryEvent::Diagnostic(diagnostic) => self.copy_log.push(diagnostic),
            DiscoveryEvent::Complete { found } => {
                self.status = format!("Search complete: {} folders found.", found);
            }
            DiscoveryEvent::Cancelled { found } => {
                self.status = format!("Search cancelled: {} folders found.", found);
            }
            DiscoveryEvent::Start { .. } | DiscoveryEvent::Progress { .. } => {}
        }
    }

    pub fn finish_scan(&mut self, result: &DiscoveryResult) {
        self.found = result.sorted().map(Path::to_path_buf).collect();
        self.scan_fraction = None;
        self.scan_finished = true;
    }

    pub fn visible_log(&self) -> impl Iterator<Item = &Diagnostic> + '_ {
        self.copy_log
            .iter()
            .filter(move |d| self.log_filter.accepts(d.tag))
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(None, Settings::default(), EntryRepository::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use savemgr_engine::DiagnosticTag;

    fn fill_form(state: &mut AppState, name: &str) {
        state.name_input = name.to_string();
        state.source_input = format!("/saves/{}", name);
        state.destination_input = "/backup".to_string();
    }

    #[test]
    fn test_add_entry_requires_all_fields() {
        let mut state = AppState::default();
        state.name_input = "Celeste".to_string();

        assert!(!state.add_entry_from_form());
        assert!(state.entries.is_empty());
        assert_eq!(state.status, "Please fill the name and select folders.");
    }

    #[test]
    fn test_add_entry_persists_and_clears_form() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut state = AppState::load(Some(temp_dir.path().to_path_buf()));
        fill_form(&mut state, "Celeste");

        assert!(state.add_entry_from_form());
        assert!(state.name_input.is_empty());
        assert_eq!(state.status, "Added entry: Celeste");

        let reloaded = AppState::load(Some(temp_dir.path().to_path_buf()));
        assert!(reloaded.entries.contains("Celeste"));
    }

    #[test]
    fn test_duplicate_entry_keeps_form() {
        let mut state = AppState::default();
        fill_form(&mut state, "Hades");
        assert!(state.add_entry_from_form());

        fill_form(&mut state, "Hades");
        assert!(!state.add_entry_from_form());
        assert_eq!(state.entries.len(), 1);
        assert_eq!(state.name_input, "Hades");
    }

    #[test]
    fn test_clear_entries_removes_file() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut state = AppState::load(Some(temp_dir.path().to_path_buf()));
        fill_form(&mut state, "a");
        state.add_entry_from_form();
        assert!(entries_path(temp_dir.path()).exists());

        state.clear_entries();
        assert!(state.entries.is_empty());
        assert!(!entries_path(temp_dir.path()).exists());
        assert_eq!(state.status, "All entries cleared.");
    }

    #[test]
    fn test_copy_events_drive_progress_and_log() {
        let mut state = AppState::default();
        state.begin_copy();
        state.apply_copy_event(CopyProgressEvent::Log(Diagnostic::skip(
            "Skipped big (/big) as it exceeds size limit.",
        )));
        state.apply_copy_event(CopyProgressEvent::Start { total_bytes: 20 });
        state.apply_copy_event(CopyProgressEvent::Progress { copied_bytes: 10 });
        state.apply_copy_event(CopyProgressEvent::Log(Diagnostic::copy("Copied: a.sav")));
        state.apply_copy_event(CopyProgressEvent::AdjustTotal {
            new_total_bytes: 10,
        });
        state.apply_copy_event(CopyProgressEvent::Complete {
            message: "Copying completed.".to_string(),
        });

        assert_eq!(state.progress.fraction(), 1.0);
        assert!(!state.progress.running);
        assert_eq!(state.status, "Copying completed.");
        assert_eq!(state.copy_log.len(), 2);

        state.log_filter = LogFilter::Only(DiagnosticTag::Copy);
        let visible: Vec<_> = state.visible_log().collect();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].message, "Copied: a.sav");
    }

    #[test]
    fn test_discovery_events_update_fraction() {
        let mut state = AppState::default();
        state.begin_scan();
        state.apply_discovery_event(DiscoveryEvent::Progress {
            processed_dirs: 5,
            total_dirs: 10,
        });
        assert_eq!(state.scan_fraction, Some(0.5));

        state.apply_discovery_event(DiscoveryEvent::Complete { found: 0 });
        state.finish_scan(&DiscoveryResult::default());
        assert!(state.scan_finished);
        assert!(state.scan_fraction.is_none());
        assert!(state.found.is_empty());
    }

    #[test]
    fn test_size_limit_input() {
        let mut state = AppState::default();
        state.set_size_limit("12".to_string());
        assert_eq!(state.settings.file_size_limit, 12);

        state.set_size_limit("12x".to_string());
        assert_eq!(state.settings.file_size_limit, 12);
        assert_eq!(state.size_limit_input, "12x");
    }
}
