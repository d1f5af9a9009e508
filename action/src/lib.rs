//! Checked, reversible units of work on a package repository.
//!
//! A [`Task`] owns a [`TaskCore`] (state, dependencies, checks) and implements
//! only its own side effects. [`call`] runs a task with its dependencies,
//! pre-checks and post-checks; [`undo`] reverts a task and then its
//! dependencies in reverse order. Filesystem changes are staged under
//! `.tmp` names and only [`MoveTmpFilesTask`] replaces existing files, always
//! keeping a `.bkp` copy until [`RemoveBackupFilesTask`] commits the change.

use std::path::PathBuf;

/// Task states
mod state;
pub use state::ActionState;

/// Checks run before and after tasks
mod check;
pub use check::{
    Check, CheckError, DebugPackagesCheck, MatchingArchitectureCheck, MatchingFilenameCheck,
    PackagesNewOrUpdatedCheck, PkgbasesVersionUpdateCheck, ReproducibleBuildEnvironmentCheck,
    SignaturesPresentCheck, SourceUrlCheck, StabilityLayerCheck, UniqueInRepoGroupCheck,
};

/// The task protocol
mod task;
pub use task::{call, shared, undo, Shared, Task, TaskCore, TaskRef, TaskResult};

/// Validated `.tmp` -> destination moves with backups
mod source_destination;
pub use source_destination::SourceDestination;

/// Concrete tasks
mod tasks;
pub use tasks::{
    read_build_requirements_from_archive_dir, read_build_requirements_from_management_repo_dirs,
    read_pkgbases_from_stability_layers, transaction_build_requirements, AddToArchiveTask,
    AddToRepoTask, ArchiveInput, CleanupRepoTask, ConsolidateOutputPackageBasesTask,
    CreateOutputPackageBasesTask, FilesToRepoDirTask, MoveInput, MoveTmpFilesTask, PkgbasesFrom,
    PrintOutputPackageBasesTask, RemoveBackupFilesTask, RemoveBackupInput,
    RemoveManagementRepoSymlinksTask, RemovePackageRepoSymlinksTask, RepoGroupTask,
    ReproducibleBuildEnvironmentTask, SymlinkInput, WriteOutputPackageBasesToTmpFileInDirTask,
    WriteSyncDbsToTmpFilesInDirTask,
};

#[cfg(test)]
mod testutil;

/// Errors raised while constructing tasks.
///
/// Failures while running a task never surface as an `Error`; they are turned
/// into an [`ActionState`].
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Path must be absolute: {0:?}")]
    NotAbsolute(PathBuf),
    #[error("Path must end in \"{1}\": {0:?}")]
    MissingSuffix(PathBuf, &'static str),
    #[error("Path must not end in \"{1}\": {0:?}")]
    ReservedSuffix(PathBuf, &'static str),
    #[error("Directory does not exist: {0:?}")]
    DirNotFound(PathBuf),
    #[error("No input provided for {0}")]
    NoInput(&'static str),
    #[error("Unable to derive repository name from {0:?}")]
    InvalidRepoDir(PathBuf),
    #[error(transparent)]
    Repo(#[from] repo::Error),
    #[error(transparent)]
    PathEncoding(#[from] util::PathEncodingError),
}
