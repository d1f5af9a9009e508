use repo::OutputPackageBase;

use crate::{ActionState, Shared, Task, TaskRef};

/// Reading packages into pkgbases
mod create;
pub use create::{CreateOutputPackageBasesTask, PrintOutputPackageBasesTask};

/// Staging management repository files and sync databases
mod write;
pub use write::{WriteOutputPackageBasesToTmpFileInDirTask, WriteSyncDbsToTmpFilesInDirTask};

/// Promoting staged files and committing by removing backups
mod move_tmp;
pub use move_tmp::{MoveInput, MoveTmpFilesTask, RemoveBackupFilesTask, RemoveBackupInput};

/// Placing package files into pool, repository and archive directories
mod files;
pub use files::{AddToArchiveTask, ArchiveInput, FilesToRepoDirTask};

/// Comparing new pkgbases with the current state, and removing stale symlinks
mod consolidate;
pub use consolidate::{
    read_pkgbases_from_stability_layers, ConsolidateOutputPackageBasesTask,
    RemoveManagementRepoSymlinksTask, RemovePackageRepoSymlinksTask, SymlinkInput,
};

/// Build environment and repository group validation
mod validate;
pub use validate::{
    read_build_requirements_from_archive_dir, read_build_requirements_from_management_repo_dirs,
    transaction_build_requirements, RepoGroupTask, ReproducibleBuildEnvironmentTask,
};

/// Ordering-only tasks
mod barrier;
pub use barrier::{AddToRepoTask, CleanupRepoTask};

/// Where a task takes its pkgbases from.
pub enum PkgbasesFrom {
    Given(Vec<OutputPackageBase>),
    /// The pkgbases created by a task, available once it succeeded.
    Task(Shared<CreateOutputPackageBasesTask>),
}

impl PkgbasesFrom {
    /// The producing task, which has to run first.
    fn dependency(&self) -> Option<TaskRef> {
        match self {
            Self::Given(_) => None,
            Self::Task(task) => Some(task.clone()),
        }
    }

    /// `None` if the producing task did not succeed.
    fn resolve(&self) -> Option<Vec<OutputPackageBase>> {
        match self {
            Self::Given(pkgbases) => Some(pkgbases.clone()),
            Self::Task(task) => {
                let task = task.borrow();
                let pkgbases =
                    (task.state() == ActionState::Success).then(|| task.pkgbases().to_vec());
                pkgbases
            }
        }
    }
}
