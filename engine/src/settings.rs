//! User settings and their persistence.
//!
//! `Settings` is a plain value object. Engines never read it directly; callers
//! turn it into a `CopyJobConfig` or `DiscoveryConfig` snapshot when a run
//! starts. `SettingsStore` reads and writes it as JSON.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::model::{CopyJobConfig, DiscoveryConfig, FolderPairEntry, BYTES_PER_GB};

pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const APP_DIR_NAME: &str = "savemgr";

/// Directory holding the settings and entry files, if the platform has one.
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Copy into `destination/<source folder name>`
    pub copy_folder_checkbox_state: bool,
    /// Per-entry size limit in gigabytes
    pub file_size_limit: u64,
    pub show_image_status: bool,
    pub remember_window_pos: bool,
    pub skip_existing_files: bool,
    pub skip_hidden_files: bool,
    pub clear_destination_folder: bool,
    pub ignored_folders: Vec<PathBuf>,
    pub file_extensions: Vec<String>,
    /// Roots searched for save files
    pub folder_paths: Vec<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            copy_folder_checkbox_state: false,
            file_size_limit: 5,
            show_image_status: true,
            remember_window_pos: true,
            skip_existing_files: true,
            skip_hidden_files: false,
            clear_destination_folder: false,
            ignored_folders: Vec::new(),
            file_extensions: vec![".sav".to_string(), ".save".to_string()],
            folder_paths: default_folder_paths(),
        }
    }
}

#[cfg(windows)]
fn default_folder_paths() -> Vec<PathBuf> {
    let mut paths = vec![
        PathBuf::from("C:\\Program Files"),
        PathBuf::from("C:\\Program Files (x86)"),
    ];
    paths.extend(dirs::desktop_dir());
    paths.extend(dirs::config_dir());
    paths.extend(dirs::data_local_dir());
    paths.extend(dirs::document_dir());
    paths.push(PathBuf::from("C:\\Users\\Public\\Documents"));
    paths
}

#[cfg(not(windows))]
fn default_folder_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    paths.extend(dirs::data_dir());
    paths.extend(dirs::config_dir());
    paths.extend(dirs::document_dir());
    paths.extend(dirs::desktop_dir());
    paths
}

impl Settings {
    /// The size limit in bytes, using 1024-based gigabytes.
    pub fn size_limit_bytes(&self) -> u64 {
        self.file_size_limit.saturating_mul(BYTES_PER_GB)
    }

    /// Snapshot for one copy run over `entries`.
    pub fn copy_job_config(&self, entries: Vec<FolderPairEntry>) -> CopyJobConfig {
        CopyJobConfig {
            entries,
            copy_folder_mode: self.copy_folder_checkbox_state,
            size_limit_bytes: self.size_limit_bytes(),
            skip_existing: self.skip_existing_files,
            skip_hidden: self.skip_hidden_files,
            clear_destination_first: self.clear_destination_folder,
            ignored_folders: self.ignored_folders.iter().cloned().collect::<HashSet<_>>(),
        }
    }

    /// Snapshot for one scan.
    pub fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            roots: self.folder_paths.clone(),
            extensions: self.file_extensions.clone(),
        }
    }

    /// Add a file extension, prefixing `.` when missing.
    ///
    /// Returns false for blank or already present extensions.
    pub fn add_extension(&mut self, extension: &str) -> bool {
        let extension = extension.trim();
        if extension.is_empty() || extension == "." {
            return false;
        }
        let extension = if extension.starts_with('.') {
            extension.to_string()
        } else {
            format!(".{}", extension)
        };
        push_unique(&mut self.file_extensions, extension)
    }

    pub fn remove_extension(&mut self, extension: &str) -> bool {
        let extension = extension.trim();
        let dotted = format!(".{}", extension.trim_start_matches('.'));
        remove_item(&mut self.file_extensions, |e| e == extension || *e == dotted)
    }

    pub fn add_folder_path(&mut self, path: impl Into<PathBuf>) -> bool {
        push_unique(&mut self.folder_paths, path.into())
    }

    pub fn remove_folder_path(&mut self, path: &Path) -> bool {
        remove_item(&mut self.folder_paths, |p| p == path)
    }

    pub fn add_ignored_folder(&mut self, path: impl Into<PathBuf>) -> bool {
        push_unique(&mut self.ignored_folders, path.into())
    }

    pub fn remove_ignored_folder(&mut self, path: &Path) -> bool {
        remove_item(&mut self.ignored_folders, |p| p == path)
    }
}

fn push_unique<T: PartialEq>(list: &mut Vec<T>, item: T) -> bool {
    if list.contains(&item) {
        return false;
    }
    list.push(item);
    true
}

fn remove_item<T>(list: &mut Vec<T>, matches: impl Fn(&T) -> bool) -> bool {
    let before = list.len();
    list.retain(|item| !matches(item));
    list.len() != before
}

/// Reads and writes `Settings` as a JSON file.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SettingsStore { path: path.into() }
    }

    /// Store for `settings.json` inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(SETTINGS_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings; a missing file yields the defaults.
    pub fn load(&self) -> Result<Settings, EngineError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| EngineError::Store {
                path: self.path.clone(),
                source: e,
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Settings::default()),
            Err(e) => Err(EngineError::Io(e)),
        }
    }

    pub fn save(&self, settings: &Settings) -> Result<(), EngineError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let text = serde_json::to_string_pretty(settings).map_err(|e| EngineError::Store {
            path: self.path.clone(),
            source: e,
        })?;
        fs::write(&self.path, text)?;
        tracing::debug!("saved settings to {}", self.path.display());
        Ok(())
    }
}
