//! Filesystem operations module.
//!
//! This module provides low-level operations for:
//! - Measuring a source tree, honoring ignored folders and hidden entries
//! - Copying one file in fixed-size chunks with cancellation checks
//! - Emptying a destination directory item by item
//! - Creating directories recursively

use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::cancel::CancellationToken;
use crate::error::EngineError;
use crate::model::Diagnostic;

/// Size of one copy chunk (1 MiB).
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// True for names starting with `.`.
pub fn is_hidden(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// How a directory entry is treated when walking a source tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Dir,
    File,
    /// Symlink pointing at a directory; never followed
    LinkedDir,
}

/// Classify an entry without following directory symlinks.
pub fn classify(path: &Path, file_type: fs::FileType) -> EntryKind {
    if file_type.is_dir() {
        EntryKind::Dir
    } else if file_type.is_symlink() && fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false) {
        EntryKind::LinkedDir
    } else {
        EntryKind::File
    }
}

/// Compute the number of bytes a copy of `root` would transfer.
///
/// Subtrees whose path is in `ignored` are pruned, as are hidden entries below
/// the root when `skip_hidden` is set. Entries that cannot be read or vanish
/// during the walk count as zero bytes.
pub fn folder_size(root: &Path, ignored: &HashSet<PathBuf>, skip_hidden: bool) -> u64 {
    let walker = WalkDir::new(root).into_iter().filter_entry(|e| {
        if e.file_type().is_dir() && ignored.contains(e.path()) {
            return false;
        }
        !(skip_hidden && e.depth() > 0 && is_hidden(e.file_name()))
    });

    let mut total: u64 = 0;
    for entry in walker.filter_map(Result::ok) {
        if classify(entry.path(), entry.file_type()) != EntryKind::File {
            continue;
        }
        // Follows file symlinks; a dangling link or a file deleted mid-walk is zero.
        let size = fs::metadata(entry.path()).map(|m| m.len()).unwrap_or(0);
        total = total.saturating_add(size);
    }
    total
}

/// Result of a chunked file copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkCopy {
    /// The whole file was written
    Done(u64),
    /// Cancellation was observed before a chunk write; the destination is partial
    Cancelled(u64),
}

/// Copy `src` to `dst` in `CHUNK_SIZE` chunks.
///
/// The token is checked before every chunk write and `on_chunk` is called with
/// the length of every chunk written. The source modification time is carried
/// over once the copy is complete.
///
/// # Errors
/// Returns `ReadError`/`WriteError` for the failing side.
pub fn copy_file_chunked(
    src: &Path,
    dst: &Path,
    cancel: &CancellationToken,
    on_chunk: &mut dyn FnMut(u64),
) -> Result<ChunkCopy, EngineError> {
    ensure_parent_dir_exists(dst)?;

    let mut src_file = fs::File::open(src).map_err(|e| EngineError::ReadError {
        path: src.to_path_buf(),
        source: e,
    })?;
    let src_mtime = src_file.metadata().and_then(|m| m.modified()).ok();

    let mut dst_file = fs::File::create(dst).map_err(|e| EngineError::WriteError {
        path: dst.to_path_buf(),
        source: e,
    })?;

    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut written: u64 = 0;
    loop {
        let len = read_chunk(&mut src_file, &mut buffer).map_err(|e| EngineError::ReadError {
            path: src.to_path_buf(),
            source: e,
        })?;
        if len == 0 {
            break;
        }
        if cancel.is_cancelled() {
            return Ok(ChunkCopy::Cancelled(written));
        }
        dst_file
            .write_all(&buffer[..len])
            .map_err(|e| EngineError::WriteError {
                path: dst.to_path_buf(),
                source: e,
            })?;
        written += len as u64;
        on_chunk(len as u64);
    }

    dst_file.flush().map_err(|e| EngineError::WriteError {
        path: dst.to_path_buf(),
        source: e,
    })?;
    drop(dst_file);

    if let Some(mtime) = src_mtime {
        let _ = filetime::set_file_mtime(dst, filetime::FileTime::from_system_time(mtime));
    }

    Ok(ChunkCopy::Done(written))
}

/// Fill `buffer` as far as the reader allows; short only at end of file.
fn read_chunk(reader: &mut impl Read, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Remove everything inside `dir`, keeping `dir` itself.
///
/// Files and symlinks are unlinked one by one, subdirectories are removed with
/// their contents. Every removal (or failure to remove) is reported through
/// `report`; a failure never stops the remaining removals.
///
/// Returns the number of items removed.
pub fn clear_directory_contents(dir: &Path, report: &mut dyn FnMut(Diagnostic)) -> usize {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("cannot list {} for clearing: {}", dir.display(), e);
            report(Diagnostic::error(format!(
                "Failed to clear {}: {}",
                dir.display(),
                e
            )));
            return 0;
        }
    };

    let mut removed = 0;
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                report(Diagnostic::error(format!(
                    "Failed to read entry in {}: {}",
                    dir.display(),
                    e
                )));
                continue;
            }
        };
        let path = entry.path();
        let result = match entry.file_type() {
            Ok(ft) if ft.is_dir() => fs::remove_dir_all(&path),
            Ok(_) => fs::remove_file(&path),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                removed += 1;
                report(Diagnostic::delete(format!("Deleted: {}", path.display())));
            }
            Err(e) => {
                tracing::warn!("failed to delete {}: {}", path.display(), e);
                let err = EngineError::DeleteFailed { path, source: e };
                report(Diagnostic::error(err.to_string()));
            }
        }
    }
    removed
}

/// Create `path` and any missing parents.
pub fn ensure_dir(path: &Path) -> Result<(), EngineError> {
    fs::create_dir_all(path).map_err(|e| EngineError::DirectoryCreationFailed {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Ensure the parent directory of a path exists, creating it if necessary.
///
/// # Errors
/// Returns EngineError if the parent exists as a non-directory or cannot be created
pub fn ensure_parent_dir_exists(path: &Path) -> Result<(), EngineError> {
    let Some(parent) = path.parent() else {
        return Ok(());
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }

    match fs::metadata(parent) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(EngineError::DirectoryCreationFailed {
            path: parent.to_path_buf(),
            source: io::Error::new(
                io::ErrorKind::InvalidInput,
                "Parent path exists but is not a directory",
            ),
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => ensure_dir(parent),
        Err(e) => Err(EngineError::DirectoryCreationFailed {
            path: parent.to_path_buf(),
            source: e,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DiagnosticTag;

    fn write_file(path: &Path, contents: &[u8]) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent");
        }
        fs::write(path, contents).expect("Failed to write file");
    }

    #[test]
    fn test_is_hidden() {
        assert!(is_hidden(OsStr::new(".steam")));
        assert!(!is_hidden(OsStr::new("steam")));
    }

    #[test]
    fn test_folder_size_counts_nested_files() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        write_file(&src.join("slot1.sav"), b"0123456789");
        write_file(&src.join("sub").join("notes.txt"), b"abcde");

        assert_eq!(folder_size(&src, &HashSet::new(), false), 15);
    }

    #[test]
    fn test_folder_size_prunes_ignored_and_hidden() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        write_file(&src.join("slot1.sav"), b"0123456789");
        write_file(&src.join("cache").join("big.bin"), &[0u8; 100]);
        write_file(&src.join(".hidden").join("meta"), &[0u8; 7]);
        write_file(&src.join(".lock"), &[0u8; 3]);

        let ignored: HashSet<PathBuf> = [src.join("cache")].into_iter().collect();
        assert_eq!(folder_size(&src, &ignored, false), 20);
        assert_eq!(folder_size(&src, &ignored, true), 10);
    }

    #[test]
    fn test_folder_size_of_missing_dir_is_zero() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        assert_eq!(folder_size(&temp_dir.path().join("gone"), &HashSet::new(), false), 0);
    }

    #[test]
    fn test_copy_file_chunked_reports_chunks() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("big.sav");
        let dst = temp_dir.path().join("out").join("big.sav");
        let data = vec![7u8; CHUNK_SIZE + 10];
        write_file(&src, &data);

        let mut chunks = Vec::new();
        let result = copy_file_chunked(&src, &dst, &CancellationToken::new(), &mut |n| {
            chunks.push(n)
        })
        .expect("Failed to copy");

        assert_eq!(result, ChunkCopy::Done(data.len() as u64));
        assert_eq!(chunks, vec![CHUNK_SIZE as u64, 10]);
        assert_eq!(fs::read(&dst).expect("Failed to read dest"), data);
    }

    #[test]
    fn test_copy_file_chunked_stops_when_cancelled() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("slot.sav");
        let dst = temp_dir.path().join("copy.sav");
        write_file(&src, b"payload");

        let token = CancellationToken::new();
        token.cancel();
        let mut calls = 0;
        let result = copy_file_chunked(&src, &dst, &token, &mut |_| calls += 1)
            .expect("Cancelled copy is not an error");

        assert_eq!(result, ChunkCopy::Cancelled(0));
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_copy_file_chunked_missing_source() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let result = copy_file_chunked(
            &temp_dir.path().join("nope"),
            &temp_dir.path().join("dst"),
            &CancellationToken::new(),
            &mut |_| {},
        );
        assert!(matches!(result, Err(EngineError::ReadError { .. })));
    }

    #[test]
    fn test_clear_directory_contents_keeps_root() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let dst = temp_dir.path().join("dst");
        write_file(&dst.join("old.sav"), b"old");
        write_file(&dst.join("profile").join("data.sav"), b"old");

        let mut diagnostics = Vec::new();
        let removed = clear_directory_contents(&dst, &mut |d| diagnostics.push(d));

        assert_eq!(removed, 2);
        assert!(dst.is_dir());
        assert_eq!(fs::read_dir(&dst).expect("Failed to list").count(), 0);
        assert!(diagnostics.iter().all(|d| d.tag == DiagnosticTag::Delete));
    }

    #[test]
    fn test_clear_missing_directory_reports_error() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut diagnostics = Vec::new();
        let removed =
            clear_directory_contents(&temp_dir.path().join("missing"), &mut |d| diagnostics.push(d));

        assert_eq!(removed, 0);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].tag, DiagnosticTag::Error);
    }

    #[cfg(unix)]
    #[test]
    fn test_clear_continues_past_failed_delete() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let dst = temp_dir.path().join("dst");
        let locked = dst.join("locked");
        write_file(&dst.join("a.sav"), b"a");
        write_file(&locked.join("inner.sav"), b"inner");
        write_file(&dst.join("z.sav"), b"z");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555))
            .expect("Failed to lock dir");

        // Permissions do not bind when running as root.
        if fs::File::create(locked.join("write-check")).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).ok();
            return;
        }

        let mut diagnostics = Vec::new();
        let removed = clear_directory_contents(&dst, &mut |d| diagnostics.push(d));
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755))
            .expect("Failed to unlock dir");

        assert_eq!(removed, 2);
        assert!(!dst.join("a.sav").exists());
        assert!(!dst.join("z.sav").exists());
        assert!(locked.join("inner.sav").exists());
        let errors: Vec<_> = diagnostics
            .iter()
            .filter(|d| d.tag == DiagnosticTag::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("locked"));
        assert_eq!(
            diagnostics.iter().filter(|d| d.tag == DiagnosticTag::Delete).count(),
            2
        );
    }

    #[test]
    fn test_ensure_parent_dir_exists() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("subdir").join("file.txt");

        ensure_parent_dir_exists(&path).expect("Failed to create parent");
        assert!(path.parent().unwrap().exists());
    }
}
