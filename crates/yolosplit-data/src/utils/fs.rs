//! Filesystem helpers shared by the preparation steps

use crate::error::{DatasetError, Result};
use crate::traits::FileTransfer;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Create every directory, parents included
pub fn ensure_dirs<I, P>(dirs: I) -> Result<()>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    for dir in dirs {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| DatasetError::io(dir, e))?;
    }
    Ok(())
}

/// Regular files in `dir` whose name ends with `suffix`, sorted by name
pub fn files_with_suffix(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| DatasetError::io(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| DatasetError::io(dir, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().ends_with(suffix) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// File name with `suffix` cut off, if it carries that suffix
pub fn stem_before(path: &Path, suffix: &str) -> Option<String> {
    let name = path.file_name()?.to_string_lossy();
    name.strip_suffix(suffix)
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
}

/// Remove a file, treating an already missing file as success.
///
/// Returns whether something was deleted.
pub fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(DatasetError::io(path, e)),
    }
}

/// Delete the regular files directly inside `dir`; a missing directory is
/// left alone. Returns how many files went.
pub fn clear_files(dir: &Path) -> Result<usize> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(DatasetError::io(dir, e)),
    };

    let mut removed = 0;
    for entry in entries {
        let path = entry.map_err(|e| DatasetError::io(dir, e))?.path();
        if path.is_file() {
            fs::remove_file(&path).map_err(|e| DatasetError::io(&path, e))?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Create an empty file, truncating any existing one
pub fn touch(path: &Path) -> Result<()> {
    fs::File::create(path).map_err(|e| DatasetError::io(path, e))?;
    Ok(())
}

/// Copies, leaving the source in place
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyFile;

impl FileTransfer for CopyFile {
    fn transfer(&self, from: &Path, to: &Path) -> Result<()> {
        fs::copy(from, to).map_err(|e| DatasetError::io(from, e))?;
        Ok(())
    }
}

/// Moves, falling back to copy and delete when a rename is impossible
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveFile;

impl FileTransfer for MoveFile {
    fn transfer(&self, from: &Path, to: &Path) -> Result<()> {
        if fs::rename(from, to).is_ok() {
            return Ok(());
        }
        // rename fails across filesystems
        fs::copy(from, to).map_err(|e| DatasetError::io(from, e))?;
        fs::remove_file(from).map_err(|e| DatasetError::io(from, e))?;
        Ok(())
    }
}
