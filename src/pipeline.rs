use std::io::Write;
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::Result;

use action::{
    call, shared, undo, ActionState, AddToArchiveTask, AddToRepoTask, ArchiveInput,
    CleanupRepoTask, ConsolidateOutputPackageBasesTask, CreateOutputPackageBasesTask,
    FilesToRepoDirTask, MoveTmpFilesTask, PkgbasesFrom, PrintOutputPackageBasesTask,
    RemoveBackupFilesTask, RemoveManagementRepoSymlinksTask, RemovePackageRepoSymlinksTask,
    RepoGroupTask, ReproducibleBuildEnvironmentTask, Shared, SymlinkInput, Task, TaskRef,
    WriteOutputPackageBasesToTmpFileInDirTask, WriteSyncDbsToTmpFilesInDirTask,
};
use repo::{PackageReader, RepoDirType, RepoFileType, SIG_SUFFIX};

use crate::settings::Settings;

/// A chain of tasks, each depending on the one before it.
///
/// The `target` depends (transitively) on every task of the transaction.
/// The optional `commit` runs after the target succeeded and makes the
/// transaction permanent.
pub struct Pipeline {
    tasks: Vec<TaskRef>,
    target: TaskRef,
    commit: Option<TaskRef>,
}

/// Appends tasks, making each one depend on the previous one.
struct Chain {
    tasks: Vec<TaskRef>,
}

impl Chain {
    fn new(first: TaskRef) -> Self {
        Self { tasks: vec![first] }
    }

    fn last(&self) -> TaskRef {
        // never empty, see `new`:
        self.tasks[self.tasks.len() - 1].clone()
    }

    /// Add `task` after the current last task.
    fn push<T: Task + 'static>(&mut self, task: T) -> Shared<T> {
        let task = shared(task.with_dependency(self.last()));
        self.tasks.push(task.clone());
        task
    }

    /// Add `task`, which already depends on the current last task.
    fn push_shared<T: Task + 'static>(&mut self, task: Shared<T>) -> Shared<T> {
        self.tasks.push(task.clone());
        task
    }
}

impl Pipeline {
    /// The tasks adding packages to the target repository of `settings`.
    pub fn import(settings: &Settings, reader: Rc<dyn PackageReader>) -> Result<Self> {
        let layout = &settings.layout;
        let repo = &settings.repo;
        let repo_type = settings.repo_type;
        let dir = |dir_type| {
            layout.get_repo_path(dir_type, &repo.name, Some(repo.architecture), repo_type)
        };
        let management_dir = dir(RepoDirType::Management)?;
        let package_dir = dir(RepoDirType::Package)?;
        let pool_dir = dir(RepoDirType::Pool)?;

        let create = shared(
            CreateOutputPackageBasesTask::new(
                reader,
                repo.architecture,
                settings.packages.clone(),
                settings.with_signature,
                repo_type.is_debug(),
            )?
            .with_source_urls(settings.source_urls.clone()),
        );
        let pkgbases = || PkgbasesFrom::Task(create.clone());
        let mut chain = Chain::new(create.clone());

        let mut consolidate =
            ConsolidateOutputPackageBasesTask::new(pkgbases(), layout, repo, repo_type)?;
        if let Some(url_validation) = &settings.url_validation {
            consolidate = consolidate.with_url_validation(url_validation.clone());
        }
        let consolidate = chain.push_shared(shared(consolidate));
        chain.push(ReproducibleBuildEnvironmentTask::new(pkgbases(), layout));
        chain.push(RepoGroupTask::new(pkgbases(), layout, repo));

        let write_pkgbases = chain.push(WriteOutputPackageBasesToTmpFileInDirTask::new(
            &management_dir,
            pkgbases(),
        )?);
        let move_pkgbases =
            chain.push_shared(shared(MoveTmpFilesTask::from_pkgbase_files(&write_pkgbases)));

        let mut repo_files = vec![chain.push(FilesToRepoDirTask::new(
            settings.packages.clone(),
            RepoFileType::Package,
            &package_dir,
            &pool_dir,
        )?)];
        if settings.with_signature {
            let signatures: Vec<PathBuf> = settings
                .packages
                .iter()
                .map(|package| {
                    let mut signature = package.as_os_str().to_owned();
                    signature.push(SIG_SUFFIX);
                    PathBuf::from(signature)
                })
                .collect();
            repo_files.push(chain.push(FilesToRepoDirTask::new(
                signatures,
                RepoFileType::PackageSignature,
                &package_dir,
                &pool_dir,
            )?));
        }

        let write_dbs = chain.push(WriteSyncDbsToTmpFilesInDirTask::new(
            &management_dir,
            &package_dir,
            settings.compression,
        )?);
        let move_dbs = chain.push_shared(shared(MoveTmpFilesTask::from_sync_dbs(&write_dbs)));

        chain.push(RemoveManagementRepoSymlinksTask::new(
            &management_dir,
            SymlinkInput::Consolidated(consolidate.clone()),
        )?);
        chain.push(RemovePackageRepoSymlinksTask::new(
            &package_dir,
            SymlinkInput::Consolidated(consolidate),
        )?);
        if let Some(archive_dir) = &layout.archive_dir {
            chain.push(AddToArchiveTask::new(
                archive_dir,
                ArchiveInput::RepoFiles(repo_files),
            )?);
        }

        let target: TaskRef = shared(AddToRepoTask::new(vec![chain.last()]));
        chain.tasks.push(target.clone());

        let remove_backups: TaskRef = shared(
            RemoveBackupFilesTask::from_moved(vec![move_pkgbases, move_dbs])
                .with_dependency(target.clone()),
        );
        chain.tasks.push(remove_backups.clone());
        let commit: TaskRef = shared(CleanupRepoTask::new(vec![remove_backups]));
        chain.tasks.push(commit.clone());

        Ok(Self {
            tasks: chain.tasks,
            target,
            commit: Some(commit),
        })
    }

    /// The tasks printing the pkgbases created from the packages of `settings`.
    pub fn print(
        settings: &Settings,
        reader: Rc<dyn PackageReader>,
        writer: Box<dyn Write>,
    ) -> Result<Self> {
        let create = shared(
            CreateOutputPackageBasesTask::new(
                reader,
                settings.repo.architecture,
                settings.packages.clone(),
                settings.with_signature,
                settings.repo_type.is_debug(),
            )?
            .with_source_urls(settings.source_urls.clone()),
        );
        let print: TaskRef = shared(PrintOutputPackageBasesTask::with_writer(
            PkgbasesFrom::Task(create.clone()),
            writer,
        ));
        Ok(Self {
            tasks: vec![create as TaskRef, print.clone()],
            target: print,
            commit: None,
        })
    }

    /// Every task, in the order they run.
    pub fn tasks(&self) -> &[TaskRef] {
        &self.tasks
    }

    /// Run the target, then the commit if the target succeeded.
    pub fn run(&self) -> ActionState {
        let state = call(&self.target);
        log::info!("{} finished in state {state}", self.target.borrow().name());
        match &self.commit {
            Some(commit) if state.is_success() => {
                let state = call(commit);
                log::info!("{} finished in state {state}", commit.borrow().name());
                state
            }
            _ => state,
        }
    }

    /// Revert everything that ran, starting from the commit if it was attempted.
    pub fn undo(&self) -> ActionState {
        let task = match &self.commit {
            Some(commit) if commit.borrow().state() != ActionState::NotStarted => commit,
            _ => &self.target,
        };
        let state = undo(task);
        log::info!("undo of {} finished in state {state}", task.borrow().name());
        state
    }
}
