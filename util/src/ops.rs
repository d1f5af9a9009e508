use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use anyhow::Result;
use filetime::FileTime;

use crate::{Error, PathEncodingError};

/// Copy `src` to `tgt`, preserving permissions and modification time.
/// Symlinks are copied as symlinks pointing at the same target.
pub fn copy(src: &Path, tgt: &Path) -> Result<()> {
    if src.is_symlink() {
        let link_tgt = fs::read_link(src)?;
        symlink(&link_tgt, tgt)?;
    } else if src.is_file() {
        if let Err(e) = copy_file(src, tgt) {
            // no partial copies
            remove_file_if_exists(tgt)?;
            return Err(e.into());
        }
    } else {
        return Err(
            Error::UnknownPathType(src.to_str().ok_or(PathEncodingError)?.to_owned()).into(),
        );
    }
    Ok(())
}

fn copy_file(src: &Path, tgt: &Path) -> io::Result<()> {
    fs::copy(src, tgt)?;
    let meta = fs::metadata(src)?;
    filetime::set_file_mtime(tgt, FileTime::from_last_modification_time(&meta))
}

/// Symlink the given `link` to `tgt`; works for unix and windows.
pub fn symlink(tgt: &Path, link: &Path) -> Result<()> {
    #[cfg(unix)]
    std::os::unix::fs::symlink(tgt, link)?;

    #[cfg(windows)]
    if tgt.is_dir() {
        std::os::windows::fs::symlink_dir(tgt, link)?;
    } else {
        std::os::windows::fs::symlink_file(tgt, link)?;
    }
    Ok(())
}

/// Check if path exists on disk. Dangling symlinks exist, too.
pub fn exists<T: AsRef<Path>>(path: T) -> bool {
    let path = path.as_ref();
    path.exists() || path.is_symlink()
}

/// Remove a file or symlink, returning whether anything was removed.
pub fn remove_file_if_exists<T: AsRef<Path>>(path: T) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Create `dir` and any missing parents.
/// Returns the directories that did not exist before, outermost first.
pub fn create_dirs(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut missing: Vec<PathBuf> = dir
        .ancestors()
        .take_while(|p| !p.as_os_str().is_empty() && !exists(p))
        .map(Path::to_owned)
        .collect();
    fs::create_dir_all(dir)?;
    missing.reverse();
    Ok(missing)
}

/// Remove the given directories, innermost (last) first, as long as they are empty.
pub fn remove_empty_dirs(dirs: &[PathBuf]) -> io::Result<()> {
    for dir in dirs.iter().rev() {
        if !dir.is_dir() {
            continue;
        }
        if fs::read_dir(dir)?.next().is_some() {
            continue;
        }
        fs::remove_dir(dir)?;
    }
    Ok(())
}

/// Path to use as the target of a symlink at `link` so that it resolves to `tgt`.
///
/// Both paths are expected to share a base (both absolute, or both relative to
/// the same directory). The result is relative to the parent of `link`.
pub fn relative_link_target(link: &Path, tgt: &Path) -> PathBuf {
    let link_dir: Vec<Component> = link
        .parent()
        .map(|p| p.components().collect())
        .unwrap_or_default();
    let tgt_parts: Vec<Component> = tgt.components().collect();

    let shared = link_dir
        .iter()
        .zip(tgt_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut relative = PathBuf::with_capacity(tgt.as_os_str().len());
    for _ in shared..link_dir.len() {
        relative.push("..");
    }
    for part in &tgt_parts[shared..] {
        relative.push(part);
    }
    relative
}
