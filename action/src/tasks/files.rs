use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use repo::{CopySourceDestination, RepoFile, RepoFileType};

use crate::{ActionState, Check, Error, Shared, Task, TaskCore, TaskRef, TaskResult};

fn file_name(path: &Path) -> Result<&str, Error> {
    let name = path
        .file_name()
        .ok_or_else(|| repo::Error::InvalidFileName(path.display().to_string()))?;
    Ok(name.to_str().ok_or(util::PathEncodingError)?)
}

/// Copy files into the pool directory and link them from the package
/// repository directory.
pub struct FilesToRepoDirTask {
    core: TaskCore,
    repo_files: Vec<(PathBuf, RepoFile)>,
    package_repo_dir: PathBuf,
    pool_dir: PathBuf,
    /// Indices into `repo_files` that were copied, and whether they were linked.
    placed: Vec<(usize, bool)>,
    created_dirs: Vec<PathBuf>,
}

impl FilesToRepoDirTask {
    pub fn new(
        files: Vec<PathBuf>,
        file_type: RepoFileType,
        package_repo_dir: &Path,
        pool_dir: &Path,
    ) -> Result<Self, Error> {
        if files.is_empty() {
            return Err(Error::NoInput("FilesToRepoDirTask"));
        }
        let mut repo_files = Vec::with_capacity(files.len());
        for file in files {
            let name = file_name(&file)?;
            let repo_file =
                RepoFile::new(file_type, &pool_dir.join(name), &package_repo_dir.join(name))?;
            repo_files.push((file, repo_file));
        }
        Ok(Self {
            core: TaskCore::default(),
            repo_files,
            package_repo_dir: package_repo_dir.to_owned(),
            pool_dir: pool_dir.to_owned(),
            placed: Vec::new(),
            created_dirs: Vec::new(),
        })
    }

    pub fn repo_files(&self) -> impl Iterator<Item = &RepoFile> {
        self.repo_files.iter().map(|(_, repo_file)| repo_file)
    }

    fn place(&mut self) -> Result<Vec<Box<dyn Check>>> {
        for dir in [&self.pool_dir, &self.package_repo_dir] {
            let created = util::create_dirs(dir).with_context(|| format!("while creating {dir:?}"))?;
            self.created_dirs.extend(created);
        }
        for (i, (source, repo_file)) in self.repo_files.iter().enumerate() {
            repo_file.copy_from(source)?;
            self.placed.push((i, false));
            repo_file.link()?;
            if let Some(placed) = self.placed.last_mut() {
                placed.1 = true;
            }
        }
        log::debug!("Placed {} files in {:?}", self.placed.len(), self.package_repo_dir);
        Ok(Vec::new())
    }
}

impl Task for FilesToRepoDirTask {
    fn name(&self) -> &'static str {
        "FilesToRepoDirTask"
    }

    fn core(&self) -> &TaskCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TaskCore {
        &mut self.core
    }

    fn do_task(&mut self) -> TaskResult {
        self.place().into()
    }

    fn undo_task(&mut self) -> Result<()> {
        while let Some((i, linked)) = self.placed.pop() {
            let repo_file = &self.repo_files[i].1;
            if let Err(e) = repo_file.remove(true, linked) {
                self.placed.push((i, linked));
                return Err(e.into());
            }
        }
        util::remove_empty_dirs(&self.created_dirs)?;
        self.created_dirs.clear();
        Ok(())
    }
}

/// Files for an [`AddToArchiveTask`].
pub enum ArchiveInput {
    Files(Vec<PathBuf>),
    /// The pool files placed by the tasks.
    RepoFiles(Vec<Shared<FilesToRepoDirTask>>),
}

/// Copy files into the archive directory, sharded by package name.
pub struct AddToArchiveTask {
    core: TaskCore,
    archive_dir: PathBuf,
    input: ArchiveInput,
    archived: Vec<CopySourceDestination>,
    created_dirs: Vec<PathBuf>,
}

impl AddToArchiveTask {
    pub fn new(archive_dir: &Path, input: ArchiveInput) -> Result<Self, Error> {
        if !archive_dir.is_absolute() {
            return Err(Error::NotAbsolute(archive_dir.to_owned()));
        }
        let dependencies = match &input {
            ArchiveInput::Files(files) if files.is_empty() => {
                return Err(Error::NoInput("AddToArchiveTask"))
            }
            ArchiveInput::Files(_) => Vec::new(),
            ArchiveInput::RepoFiles(tasks) => {
                tasks.iter().map(|task| -> TaskRef { task.clone() }).collect()
            }
        };
        Ok(Self {
            core: TaskCore::new(dependencies),
            archive_dir: archive_dir.to_owned(),
            input,
            archived: Vec::new(),
            created_dirs: Vec::new(),
        })
    }

    /// Archived copies made by the last run.
    pub fn archived(&self) -> &[CopySourceDestination] {
        &self.archived
    }

    /// `None` if a producing task did not succeed.
    fn sources(&self) -> Option<Vec<PathBuf>> {
        match &self.input {
            ArchiveInput::Files(files) => Some(files.clone()),
            ArchiveInput::RepoFiles(tasks) => {
                let mut sources = Vec::new();
                for task in tasks {
                    let task = task.borrow();
                    if task.state() != ActionState::Success {
                        return None;
                    }
                    sources.extend(task.repo_files().map(|file| file.file_path.clone()));
                }
                Some(sources)
            }
        }
    }

    fn archive(&mut self, sources: Vec<PathBuf>) -> Result<Vec<Box<dyn Check>>> {
        for source in sources {
            let entry = CopySourceDestination::from_archive_dir(&source, &self.archive_dir)?;
            if let Some(parent) = entry.destination.parent() {
                let created = util::create_dirs(parent)
                    .with_context(|| format!("while creating {parent:?}"))?;
                self.created_dirs.extend(created);
            }
            entry.copy_file()?;
            self.archived.push(entry);
        }
        log::debug!("Archived {} files", self.archived.len());
        Ok(Vec::new())
    }
}

impl Task for AddToArchiveTask {
    fn name(&self) -> &'static str {
        "AddToArchiveTask"
    }

    fn core(&self) -> &TaskCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TaskCore {
        &mut self.core
    }

    fn do_task(&mut self) -> TaskResult {
        match self.sources() {
            Some(sources) => self.archive(sources).into(),
            None => TaskResult::FailedDependency,
        }
    }

    fn undo_task(&mut self) -> Result<()> {
        while let Some(entry) = self.archived.pop() {
            if let Err(e) = entry.remove_destination() {
                self.archived.push(entry);
                return Err(e.into());
            }
        }
        util::remove_empty_dirs(&self.created_dirs)?;
        self.created_dirs.clear();
        Ok(())
    }
}
