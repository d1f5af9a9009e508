use std::fs;
use std::path::{Path, PathBuf};

use crate::{Error, PackageFileName};

/// A file to be copied into an archive directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopySourceDestination {
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl CopySourceDestination {
    /// Destination below `output_dir` following the archive layout
    /// `<first char of pkgname>/<pkgname>/<filename>`.
    pub fn from_archive_dir(source: &Path, output_dir: &Path) -> Result<Self, Error> {
        let filename = source
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| Error::InvalidFileName(source.display().to_string()))?;
        let parsed = PackageFileName::parse(filename)?;
        let first = parsed
            .name
            .chars()
            .next()
            .ok_or_else(|| Error::InvalidFileName(filename.to_owned()))?;

        let mut destination = output_dir.to_owned();
        destination.push(first.to_string());
        destination.push(&parsed.name);
        destination.push(filename);
        Ok(Self {
            source: source.to_owned(),
            destination,
        })
    }

    /// Copy source to destination, creating parent directories. Never overwrites.
    pub fn copy_file(&self) -> Result<(), Error> {
        if util::exists(&self.destination) {
            return Err(Error::FileExists(self.destination.clone()));
        }
        let write_err = |e| Error::Write(self.destination.clone(), e);
        if let Some(parent) = self.destination.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        log::debug!("Archiving {:?} as {:?}", self.source, self.destination);
        util::copy(&self.source, &self.destination)?;
        Ok(())
    }

    pub fn remove_destination(&self) -> Result<(), Error> {
        util::remove_file_if_exists(&self.destination)
            .map_err(|e| Error::Write(self.destination.clone(), e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    #[test]
    fn test_archive_layout() -> Result<()> {
        let entry = CopySourceDestination::from_archive_dir(
            Path::new("/pool/foo/foo-1.0-1-any.pkg.tar.zst.sig"),
            Path::new("/archive"),
        )?;
        assert_eq!(
            entry.destination,
            Path::new("/archive/f/foo/foo-1.0-1-any.pkg.tar.zst.sig")
        );
        assert!(CopySourceDestination::from_archive_dir(
            Path::new("/pool/foo/README"),
            Path::new("/archive")
        )
        .is_err());
        Ok(())
    }

    #[test]
    fn test_copy_and_remove() -> Result<()> {
        let dir = tempdir()?;
        let source = dir.path().join("bar-2.0-1-x86_64.pkg.tar.zst");
        fs::write(&source, "bar")?;

        let entry = CopySourceDestination::from_archive_dir(&source, &dir.path().join("archive"))?;
        entry.copy_file()?;
        assert_eq!(fs::read_to_string(&entry.destination)?, "bar");
        assert!(matches!(entry.copy_file(), Err(Error::FileExists(_))));

        entry.remove_destination()?;
        assert!(!entry.destination.exists());
        entry.remove_destination()?;
        Ok(())
    }
}
