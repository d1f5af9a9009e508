use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{Error, SIG_SUFFIX};

/// The kind of file placed into a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoFileType {
    Package,
    PackageSignature,
}

impl RepoFileType {
    fn matches(self, path: &Path) -> bool {
        let is_sig = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(SIG_SUFFIX));
        match self {
            Self::Package => !is_sig,
            Self::PackageSignature => is_sig,
        }
    }
}

impl fmt::Display for RepoFileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Package => write!(f, "package"),
            Self::PackageSignature => write!(f, "package signature"),
        }
    }
}

/// A file in the pool directory and its symlink in a package repository directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoFile {
    pub file_type: RepoFileType,
    pub file_path: PathBuf,
    pub symlink_path: PathBuf,
}

impl RepoFile {
    pub fn new(
        file_type: RepoFileType,
        file_path: &Path,
        symlink_path: &Path,
    ) -> Result<Self, Error> {
        for path in [file_path, symlink_path] {
            if !path.is_absolute() {
                return Err(Error::NotAbsolute(path.to_owned()));
            }
            if !file_type.matches(path) {
                return Err(Error::FileTypeMismatch(path.to_owned(), file_type));
            }
        }
        Ok(Self {
            file_type,
            file_path: file_path.to_owned(),
            symlink_path: symlink_path.to_owned(),
        })
    }

    /// Copy `source` to the pool location. Never overwrites.
    pub fn copy_from(&self, source: &Path) -> Result<(), Error> {
        if util::exists(&self.file_path) {
            return Err(Error::FileExists(self.file_path.clone()));
        }
        let write_err = |e| Error::Write(self.file_path.clone(), e);
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        log::debug!("Copying {source:?} to {:?}", self.file_path);
        if let Err(e) = fs::copy(source, &self.file_path) {
            util::remove_file_if_exists(&self.file_path).map_err(write_err)?;
            return Err(write_err(e));
        }
        Ok(())
    }

    /// Create the relative symlink pointing at the pool file. Never overwrites.
    pub fn link(&self) -> Result<(), Error> {
        if util::exists(&self.symlink_path) {
            return Err(Error::FileExists(self.symlink_path.clone()));
        }
        let write_err = |e| Error::Write(self.symlink_path.clone(), e);
        if let Some(parent) = self.symlink_path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let target = util::relative_link_target(&self.symlink_path, &self.file_path);
        log::debug!("Linking {:?} -> {target:?}", self.symlink_path);
        util::symlink(&target, &self.symlink_path)?;
        Ok(())
    }

    /// Remove the symlink if `unlink` and the pool file if `force`.
    pub fn remove(&self, force: bool, unlink: bool) -> Result<(), Error> {
        if unlink {
            util::remove_file_if_exists(&self.symlink_path)
                .map_err(|e| Error::Write(self.symlink_path.clone(), e))?;
        }
        if force {
            util::remove_file_if_exists(&self.file_path)
                .map_err(|e| Error::Write(self.file_path.clone(), e))?;
        }
        Ok(())
    }
}
