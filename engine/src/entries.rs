//! Folder-pair entries and their JSON file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::EngineError;
use crate::model::FolderPairEntry;

pub const ENTRIES_FILE_NAME: &str = "save_folders.json";

/// Ordered list of folder pairs with unique names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryRepository {
    entries: Vec<FolderPairEntry>,
}

impl EntryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    ///
    /// # Errors
    /// Returns `DuplicateEntry` and leaves the list untouched if the name is taken.
    pub fn add(&mut self, entry: FolderPairEntry) -> Result<(), EngineError> {
        if self.contains(&entry.name) {
            return Err(EngineError::DuplicateEntry { name: entry.name });
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<FolderPairEntry, EngineError> {
        let index = self
            .entries
            .iter()
            .position(|e| e.name == name)
            .ok_or_else(|| EngineError::EntryNotFound {
                name: name.to_string(),
            })?;
        Ok(self.entries.remove(index))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&FolderPairEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FolderPairEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Owned copy of the entries for a job to work from.
    pub fn snapshot(&self) -> Vec<FolderPairEntry> {
        self.entries.clone()
    }

    /// Load entries from a JSON array; a missing file is an empty repository.
    ///
    /// Entries repeating an earlier name are dropped.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(EngineError::Io(e)),
        };
        let loaded: Vec<FolderPairEntry> =
            serde_json::from_str(&text).map_err(|e| EngineError::Store {
                path: path.to_path_buf(),
                source: e,
            })?;

        let mut repo = Self::new();
        for entry in loaded {
            if let Err(e) = repo.add(entry) {
                tracing::warn!("{} in {}", e, path.display());
            }
        }
        Ok(repo)
    }

    /// Write entries as a pretty-printed JSON array.
    pub fn save(&self, path: &Path) -> Result<(), EngineError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let text = serde_json::to_string_pretty(&self.entries).map_err(|e| EngineError::Store {
            path: path.to_path_buf(),
            source: e,
        })?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Delete the persisted file, if any.
    pub fn clear_file(path: &Path) -> Result<(), EngineError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(EngineError::DeleteFailed {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}

/// Path of the entries file inside `dir`.
pub fn entries_path(dir: &Path) -> PathBuf {
    dir.join(ENTRIES_FILE_NAME)
}
