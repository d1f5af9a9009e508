use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use repo::{BKP_SUFFIX, TMP_SUFFIX};

use crate::{ActionState, Error};

fn has_suffix(path: &Path, suffix: &str) -> bool {
    path.as_os_str()
        .to_str()
        .is_some_and(|path| path.ends_with(suffix))
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut path = path.as_os_str().to_owned();
    path.push(suffix);
    PathBuf::from(path)
}

/// A staged `.tmp` file and the destination it replaces.
///
/// If the destination exists when the move happens, it is first copied to
/// `<destination>.bkp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDestination {
    source: PathBuf,
    destination: PathBuf,
    destination_backup: PathBuf,
    backup_done: bool,
}

impl SourceDestination {
    pub fn new(source: &Path, destination: &Path) -> Result<Self, Error> {
        for path in [source, destination] {
            if !path.is_absolute() {
                return Err(Error::NotAbsolute(path.to_owned()));
            }
        }
        if !has_suffix(source, TMP_SUFFIX) {
            return Err(Error::MissingSuffix(source.to_owned(), TMP_SUFFIX));
        }
        for suffix in [TMP_SUFFIX, BKP_SUFFIX] {
            if has_suffix(destination, suffix) {
                return Err(Error::ReservedSuffix(destination.to_owned(), suffix));
            }
        }
        let destination_backup = with_suffix(destination, BKP_SUFFIX);
        debug_assert!(has_suffix(&destination_backup, BKP_SUFFIX));

        Ok(Self {
            source: source.to_owned(),
            destination: destination.to_owned(),
            destination_backup,
            backup_done: false,
        })
    }

    /// Pair a `.tmp` file with the path it has without the suffix.
    pub fn from_tmp(source: &Path) -> Result<Self, Error> {
        let destination = source
            .to_str()
            .ok_or(util::PathEncodingError)?
            .strip_suffix(TMP_SUFFIX)
            .ok_or_else(|| Error::MissingSuffix(source.to_owned(), TMP_SUFFIX))?;
        Self::new(source, Path::new(destination))
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn destination_backup(&self) -> &Path {
        &self.destination_backup
    }

    /// Whether the move copied an existing destination to the backup path.
    pub fn backup_done(&self) -> bool {
        self.backup_done
    }

    /// Back up the destination if it exists, then rename source to destination.
    pub(crate) fn move_file(&mut self) -> Result<()> {
        if util::exists(&self.destination) {
            util::copy(&self.destination, &self.destination_backup).with_context(|| {
                format!("while backing up {:?}", self.destination)
            })?;
            self.backup_done = true;
        }
        fs::rename(&self.source, &self.destination)
            .with_context(|| format!("while moving {:?} to {:?}", self.source, self.destination))?;
        Ok(())
    }

    /// Revert [`move_file`](Self::move_file), deciding from what exists on disk.
    ///
    /// `state` is the state of the task that ran the move.
    pub(crate) fn undo_move(&mut self, state: ActionState) -> Result<()> {
        let source = util::exists(&self.source);
        let destination = util::exists(&self.destination);
        let backup = util::exists(&self.destination_backup);
        let moved_states = matches!(
            state,
            ActionState::SuccessTask
                | ActionState::Success
                | ActionState::FailedPostCheck
                | ActionState::FailedTask
                | ActionState::FailedUndoTask
        );
        log::trace!(
            "Undoing move of {:?} ({state}, source: {source}, destination: {destination}, \
             backup done: {}, backup: {backup})",
            self.destination,
            self.backup_done
        );

        match (source, destination, self.backup_done, backup) {
            (false, true, true, true) if moved_states => {
                fs::rename(&self.destination, &self.source)?;
                fs::rename(&self.destination_backup, &self.destination)?;
            }
            (false, true, false, false) if moved_states => {
                fs::rename(&self.destination, &self.source)?;
            }
            // never moved, or already reverted
            (true, _, false, false) => {}
            // backed up, but the rename failed
            (true, true, true, true) => {
                fs::remove_file(&self.destination_backup)?;
            }
            // interrupted revert
            (true, false, true, true) => {
                fs::rename(&self.destination_backup, &self.destination)?;
            }
            _ => bail!(
                "unexpected state of {:?} (source exists: {source}, destination exists: \
                 {destination}, backup done: {}, backup exists: {backup})",
                self.destination,
                self.backup_done
            ),
        }
        self.backup_done = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_validation() {
        let ok = SourceDestination::new(Path::new("/a/foo.json.tmp"), Path::new("/a/foo.json"));
        assert_eq!(
            ok.map(|sd| sd.destination_backup().to_owned()).ok(),
            Some(PathBuf::from("/a/foo.json.bkp"))
        );
        assert!(matches!(
            SourceDestination::new(Path::new("a/foo.json.tmp"), Path::new("/a/foo.json")),
            Err(Error::NotAbsolute(_))
        ));
        assert!(matches!(
            SourceDestination::new(Path::new("/a/foo.json"), Path::new("/a/bar.json")),
            Err(Error::MissingSuffix(..))
        ));
        assert!(matches!(
            SourceDestination::new(Path::new("/a/foo.json.tmp"), Path::new("/a/foo.json.tmp")),
            Err(Error::ReservedSuffix(..))
        ));
        assert!(matches!(
            SourceDestination::new(Path::new("/a/foo.json.tmp"), Path::new("/a/foo.json.bkp")),
            Err(Error::ReservedSuffix(..))
        ));
    }

    #[test]
    fn test_from_tmp() -> Result<()> {
        let sd = SourceDestination::from_tmp(Path::new("/repo/core.db.tmp"))?;
        assert_eq!(sd.destination(), Path::new("/repo/core.db"));
        assert!(SourceDestination::from_tmp(Path::new("/repo/core.db")).is_err());
        Ok(())
    }

    #[test]
    fn test_move_and_undo_with_backup() -> Result<()> {
        let dir = tempdir()?;
        let source = dir.path().join("foo.json.tmp");
        let destination = dir.path().join("foo.json");
        fs::write(&source, "new")?;
        fs::write(&destination, "old")?;

        let mut sd = SourceDestination::new(&source, &destination)?;
        sd.move_file()?;
        assert!(sd.backup_done());
        assert_eq!(fs::read_to_string(&destination)?, "new");
        assert_eq!(fs::read_to_string(sd.destination_backup())?, "old");

        sd.undo_move(ActionState::Success)?;
        assert_eq!(fs::read_to_string(&source)?, "new");
        assert_eq!(fs::read_to_string(&destination)?, "old");
        assert!(!sd.destination_backup().exists());

        // reverting twice is harmless
        sd.undo_move(ActionState::Success)?;
        Ok(())
    }

    #[test]
    fn test_move_symlink_destination() -> Result<()> {
        let dir = tempdir()?;
        let source = dir.path().join("core.db.tmp");
        let destination = dir.path().join("core.db");
        util::symlink(Path::new("core.db.tar.gz"), &source)?;
        util::symlink(Path::new("core.db.tar.gz"), &destination)?;

        let mut sd = SourceDestination::new(&source, &destination)?;
        sd.move_file()?;
        assert!(sd.destination_backup().is_symlink());

        sd.undo_move(ActionState::SuccessTask)?;
        assert!(source.is_symlink());
        assert!(destination.is_symlink());
        assert!(!util::exists(sd.destination_backup()));
        Ok(())
    }

    #[test]
    fn test_undo_failed_rename_removes_backup() -> Result<()> {
        let dir = tempdir()?;
        // a directory cannot be renamed onto a file
        let source = dir.path().join("foo.json.tmp");
        fs::create_dir(&source)?;
        let destination = dir.path().join("foo.json");
        fs::write(&destination, "old")?;

        let mut sd = SourceDestination::new(&source, &destination)?;
        assert!(sd.move_file().is_err());
        assert!(sd.backup_done());
        assert!(sd.destination_backup().exists());

        sd.undo_move(ActionState::FailedTask)?;
        assert!(!util::exists(sd.destination_backup()));
        assert!(!sd.backup_done());
        assert_eq!(fs::read_to_string(&destination)?, "old");
        assert!(source.is_dir());
        Ok(())
    }

    #[test]
    fn test_undo_finishes_interrupted_revert() -> Result<()> {
        let dir = tempdir()?;
        let source = dir.path().join("foo.json.tmp");
        let destination = dir.path().join("foo.json");
        fs::write(&source, "new")?;
        fs::write(&destination, "old")?;

        let mut sd = SourceDestination::new(&source, &destination)?;
        sd.move_file()?;
        // first half of a revert, then stopped:
        fs::rename(&destination, &source)?;

        sd.undo_move(ActionState::FailedUndoTask)?;
        assert_eq!(fs::read_to_string(&source)?, "new");
        assert_eq!(fs::read_to_string(&destination)?, "old");
        assert!(!util::exists(sd.destination_backup()));
        Ok(())
    }

    #[test]
    fn test_unexpected_state() -> Result<()> {
        let dir = tempdir()?;
        let mut sd = SourceDestination::new(
            &dir.path().join("foo.json.tmp"),
            &dir.path().join("foo.json"),
        )?;
        // neither source nor destination exist
        assert!(sd.undo_move(ActionState::Success).is_err());
        Ok(())
    }
}
