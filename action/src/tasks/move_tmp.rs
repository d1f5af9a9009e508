use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use repo::BKP_SUFFIX;

use super::{WriteOutputPackageBasesToTmpFileInDirTask, WriteSyncDbsToTmpFilesInDirTask};
use crate::{
    ActionState, Check, Error, Shared, SourceDestination, Task, TaskCore, TaskRef, TaskResult,
};

/// Files to be moved by a [`MoveTmpFilesTask`].
pub enum MoveInput {
    Paths(Vec<SourceDestination>),
    /// Every file staged by the task.
    PkgbaseFiles(Shared<WriteOutputPackageBasesToTmpFileInDirTask>),
    /// The databases and symlinks staged by the task.
    SyncDbs(Shared<WriteSyncDbsToTmpFilesInDirTask>),
}

impl MoveInput {
    fn dependency(&self) -> Option<TaskRef> {
        match self {
            Self::Paths(_) => None,
            Self::PkgbaseFiles(task) => Some(task.clone()),
            Self::SyncDbs(task) => Some(task.clone()),
        }
    }

    /// `None` if the producing task did not succeed.
    fn resolve(&self) -> Option<Result<Vec<SourceDestination>, Error>> {
        match self {
            Self::Paths(entries) => Some(Ok(entries.clone())),
            Self::PkgbaseFiles(task) => {
                let task = task.borrow();
                let entries = (task.state() == ActionState::Success)
                    .then(|| from_tmp(task.filenames().iter().map(PathBuf::as_path)));
                entries
            }
            Self::SyncDbs(task) => {
                let task = task.borrow();
                let entries =
                    (task.state() == ActionState::Success).then(|| from_tmp(task.filenames()));
                entries
            }
        }
    }
}

fn from_tmp<'a>(
    paths: impl IntoIterator<Item = &'a Path>,
) -> Result<Vec<SourceDestination>, Error> {
    paths.into_iter().map(SourceDestination::from_tmp).collect()
}

/// Rename staged `.tmp` files to their destinations, backing up any
/// destination that already exists.
///
/// A failure part way leaves the files moved so far in place: the task ends
/// in `FailedTask` and it is up to [`undo`](crate::undo) to revert them.
pub struct MoveTmpFilesTask {
    core: TaskCore,
    input: MoveInput,
    entries: Vec<SourceDestination>,
}

impl MoveTmpFilesTask {
    /// Move explicit `(source, destination)` pairs.
    pub fn new(paths: &[(PathBuf, PathBuf)]) -> Result<Self, Error> {
        if paths.is_empty() {
            return Err(Error::NoInput("MoveTmpFilesTask"));
        }
        let entries = paths
            .iter()
            .map(|(source, destination)| SourceDestination::new(source, destination))
            .collect::<Result<_, _>>()?;
        Ok(Self::with_input(MoveInput::Paths(entries)))
    }

    pub fn from_pkgbase_files(task: &Shared<WriteOutputPackageBasesToTmpFileInDirTask>) -> Self {
        Self::with_input(MoveInput::PkgbaseFiles(task.clone()))
    }

    pub fn from_sync_dbs(task: &Shared<WriteSyncDbsToTmpFilesInDirTask>) -> Self {
        Self::with_input(MoveInput::SyncDbs(task.clone()))
    }

    fn with_input(input: MoveInput) -> Self {
        Self {
            core: TaskCore::new(input.dependency().into_iter().collect()),
            input,
            entries: Vec::new(),
        }
    }

    /// The moves of the last run.
    pub fn entries(&self) -> &[SourceDestination] {
        &self.entries
    }

    fn move_files(&mut self) -> Result<Vec<Box<dyn Check>>> {
        for entry in &mut self.entries {
            log::trace!("Moving {:?} to {:?}", entry.source(), entry.destination());
            entry.move_file()?;
        }
        log::debug!("Moved {} files", self.entries.len());
        Ok(Vec::new())
    }
}

impl Task for MoveTmpFilesTask {
    fn name(&self) -> &'static str {
        "MoveTmpFilesTask"
    }

    fn core(&self) -> &TaskCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TaskCore {
        &mut self.core
    }

    fn do_task(&mut self) -> TaskResult {
        match self.input.resolve() {
            None => TaskResult::FailedDependency,
            Some(Err(e)) => TaskResult::Failed(e.into()),
            Some(Ok(entries)) => {
                self.entries = entries;
                self.move_files().into()
            }
        }
    }

    fn undo_task(&mut self) -> Result<()> {
        let state = self.state();
        let mut failed = 0;
        for entry in self.entries.iter_mut().rev() {
            if let Err(e) = entry.undo_move(state) {
                log::warn!("Unable to revert move to {:?}: {e:#}", entry.destination());
                failed += 1;
            }
        }
        if failed > 0 {
            anyhow::bail!("{failed} of {} moves could not be reverted", self.entries.len());
        }
        Ok(())
    }
}

/// What a [`RemoveBackupFilesTask`] removes.
pub enum RemoveBackupInput {
    Paths(Vec<PathBuf>),
    /// The backups made by the tasks.
    Moved(Vec<Shared<MoveTmpFilesTask>>),
}

/// Delete `.bkp` files. Once this ran, the moves that made the backups can
/// no longer be reverted.
pub struct RemoveBackupFilesTask {
    core: TaskCore,
    input: RemoveBackupInput,
    removed: Vec<PathBuf>,
}

impl RemoveBackupFilesTask {
    pub fn new(paths: Vec<PathBuf>) -> Result<Self, Error> {
        if paths.is_empty() {
            return Err(Error::NoInput("RemoveBackupFilesTask"));
        }
        for path in &paths {
            if !path.is_absolute() {
                return Err(Error::NotAbsolute(path.clone()));
            }
            if !path.to_str().is_some_and(|p| p.ends_with(BKP_SUFFIX)) {
                return Err(Error::MissingSuffix(path.clone(), BKP_SUFFIX));
            }
        }
        Ok(Self {
            core: TaskCore::default(),
            input: RemoveBackupInput::Paths(paths),
            removed: Vec::new(),
        })
    }

    pub fn from_moved(tasks: Vec<Shared<MoveTmpFilesTask>>) -> Self {
        let dependencies = tasks.iter().map(|task| -> TaskRef { task.clone() }).collect();
        Self {
            core: TaskCore::new(dependencies),
            input: RemoveBackupInput::Moved(tasks),
            removed: Vec::new(),
        }
    }

    /// `None` if a producing task did not succeed.
    fn backups(&self) -> Option<Vec<PathBuf>> {
        match &self.input {
            RemoveBackupInput::Paths(paths) => Some(paths.clone()),
            RemoveBackupInput::Moved(tasks) => {
                let mut backups = Vec::new();
                for task in tasks {
                    let task = task.borrow();
                    if task.state() != ActionState::Success {
                        return None;
                    }
                    backups.extend(
                        task.entries()
                            .iter()
                            .filter(|entry| entry.backup_done())
                            .map(|entry| entry.destination_backup().to_owned()),
                    );
                }
                Some(backups)
            }
        }
    }

    fn remove(&mut self, backups: Vec<PathBuf>) -> Result<Vec<Box<dyn Check>>> {
        for backup in backups {
            let removed = util::remove_file_if_exists(&backup)
                .with_context(|| format!("while removing {backup:?}"))?;
            if removed {
                self.removed.push(backup);
            }
        }
        log::debug!("Removed {} backup files", self.removed.len());
        Ok(Vec::new())
    }
}

impl Task for RemoveBackupFilesTask {
    fn name(&self) -> &'static str {
        "RemoveBackupFilesTask"
    }

    fn core(&self) -> &TaskCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TaskCore {
        &mut self.core
    }

    fn do_task(&mut self) -> TaskResult {
        match self.backups() {
            Some(backups) => self.remove(backups).into(),
            None => TaskResult::FailedDependency,
        }
    }

    fn undo_task(&mut self) -> Result<()> {
        if !self.removed.is_empty() {
            log::warn!(
                "{} backup files were already removed and cannot be restored",
                self.removed.len()
            );
        }
        self.removed.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{as_ref, state};
    use crate::{call, shared, undo};
    use std::fs;
    use tempfile::tempdir;

    fn pair(dir: &Path, name: &str) -> (PathBuf, PathBuf) {
        (dir.join(format!("{name}.tmp")), dir.join(name))
    }

    #[test]
    fn test_move_round_trip() -> Result<()> {
        let dir = tempdir()?;
        let (source, destination) = pair(dir.path(), "foo.json");
        fs::write(&source, "new")?;

        let task = shared(MoveTmpFilesTask::new(&[(source.clone(), destination.clone())])?);
        assert_eq!(call(&as_ref(&task)), ActionState::Success);
        assert!(!source.exists());
        assert_eq!(fs::read_to_string(&destination)?, "new");

        assert_eq!(undo(&as_ref(&task)), ActionState::NotStarted);
        assert!(!destination.exists());
        assert_eq!(fs::read_to_string(&source)?, "new");
        assert!(!dir.path().join("foo.json.bkp").exists());
        Ok(())
    }

    #[test]
    fn test_move_with_backup_round_trip() -> Result<()> {
        let dir = tempdir()?;
        let (source, destination) = pair(dir.path(), "foo.json");
        let backup = dir.path().join("foo.json.bkp");
        fs::write(&source, "new")?;
        fs::write(&destination, "old")?;

        let task = shared(MoveTmpFilesTask::new(&[(source.clone(), destination.clone())])?);
        assert_eq!(call(&as_ref(&task)), ActionState::Success);
        assert_eq!(fs::read_to_string(&destination)?, "new");
        assert_eq!(fs::read_to_string(&backup)?, "old");

        assert_eq!(undo(&as_ref(&task)), ActionState::NotStarted);
        assert_eq!(fs::read_to_string(&destination)?, "old");
        // the staged file is restored for a later attempt
        assert_eq!(fs::read_to_string(&source)?, "new");
        assert!(!backup.exists());
        Ok(())
    }

    #[test]
    fn test_partial_failure() -> Result<()> {
        let dir = tempdir()?;
        let first = pair(dir.path(), "first.json");
        let second = (
            dir.path().join("second.json.tmp"),
            dir.path().join("missing/second.json"),
        );
        fs::write(&first.0, "first")?;
        fs::write(&second.0, "second")?;

        let task = shared(MoveTmpFilesTask::new(&[first.clone(), second.clone()])?);
        assert_eq!(call(&as_ref(&task)), ActionState::FailedTask);
        // no rollback inside the task itself
        assert!(first.1.exists());
        assert!(!first.0.exists());
        assert!(second.0.exists());

        assert_eq!(undo(&as_ref(&task)), ActionState::NotStarted);
        assert_eq!(fs::read_to_string(&first.0)?, "first");
        assert!(!first.1.exists());
        assert_eq!(fs::read_to_string(&second.0)?, "second");
        Ok(())
    }

    #[test]
    fn test_unrecoverable_undo() -> Result<()> {
        let dir = tempdir()?;
        let (source, destination) = pair(dir.path(), "foo.json");
        fs::write(&source, "new")?;

        let task = shared(MoveTmpFilesTask::new(&[(source, destination.clone())])?);
        assert_eq!(call(&as_ref(&task)), ActionState::Success);
        fs::remove_file(&destination)?;

        assert_eq!(undo(&as_ref(&task)), ActionState::FailedUndoTask);
        assert_eq!(state(&task), ActionState::FailedUndoTask);
        Ok(())
    }

    #[test]
    fn test_remove_backups() -> Result<()> {
        let dir = tempdir()?;
        let (source, destination) = pair(dir.path(), "foo.json");
        fs::write(&source, "new")?;
        fs::write(&destination, "old")?;

        let moved = shared(MoveTmpFilesTask::new(&[(source, destination.clone())])?);
        let remove = shared(RemoveBackupFilesTask::from_moved(vec![moved.clone()]));
        assert_eq!(call(&as_ref(&remove)), ActionState::Success);
        assert_eq!(state(&moved), ActionState::Success);
        assert!(!dir.path().join("foo.json.bkp").exists());
        assert_eq!(fs::read_to_string(&destination)?, "new");

        assert!(RemoveBackupFilesTask::new(vec![destination]).is_err());
        Ok(())
    }
}
