use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use repo::{
    OutputPackageBase, PackageRepo, RepoDirType, RepoLayout, RepoType, UrlValidation,
    PKGNAMES_DIR, SIG_SUFFIX,
};

use super::PkgbasesFrom;
use crate::{
    ActionState, Check, Error, PackagesNewOrUpdatedCheck, PkgbasesVersionUpdateCheck, Shared,
    SourceUrlCheck, StabilityLayerCheck, Task, TaskCore, TaskRef, TaskResult,
};

/// Read the pkgbases of the same name as `pkgbases` from each of `dirs`,
/// where they exist.
pub fn read_pkgbases_from_stability_layers(
    pkgbases: &[OutputPackageBase],
    dirs: &[PathBuf],
) -> Result<Vec<OutputPackageBase>, repo::Error> {
    let mut found = Vec::new();
    for dir in dirs {
        for pkgbase in pkgbases {
            let path = dir.join(format!("{}.json", pkgbase.base));
            if path.exists() {
                found.push(OutputPackageBase::from_file(&path)?);
            }
        }
    }
    Ok(found)
}

/// Compare new pkgbases with those currently in the repository and its
/// other stability layers, and record which packages they replace.
pub struct ConsolidateOutputPackageBasesTask {
    core: TaskCore,
    directory: PathBuf,
    pkgbases: PkgbasesFrom,
    above: Vec<PathBuf>,
    below: Vec<PathBuf>,
    url_validation: Option<UrlValidation>,
    filenames: Vec<String>,
    package_names: Vec<String>,
    current_filenames: Vec<String>,
    current_package_names: Vec<String>,
}

impl ConsolidateOutputPackageBasesTask {
    pub fn new(
        pkgbases: PkgbasesFrom,
        layout: &RepoLayout,
        repo: &PackageRepo,
        repo_type: RepoType,
    ) -> Result<Self, Error> {
        let directory = layout.get_repo_path(
            RepoDirType::Management,
            &repo.name,
            Some(repo.architecture),
            repo_type,
        )?;
        let (above, below) = layout.stability_layer_dirs(repo, repo_type);
        Ok(Self {
            core: TaskCore::new(pkgbases.dependency().into_iter().collect()),
            directory,
            pkgbases,
            above,
            below,
            url_validation: None,
            filenames: Vec::new(),
            package_names: Vec::new(),
            current_filenames: Vec::new(),
            current_package_names: Vec::new(),
        })
    }

    /// Require source URLs of new pkgbases to match.
    pub fn with_url_validation(mut self, url_validation: UrlValidation) -> Self {
        self.url_validation = Some(url_validation);
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn filenames(&self) -> &[String] {
        &self.filenames
    }

    pub fn package_names(&self) -> &[String] {
        &self.package_names
    }

    pub fn current_filenames(&self) -> &[String] {
        &self.current_filenames
    }

    pub fn current_package_names(&self) -> &[String] {
        &self.current_package_names
    }

    /// Package names of replaced pkgbases that the new pkgbases no longer have.
    pub fn stale_package_names(&self) -> Vec<String> {
        difference(&self.current_package_names, &self.package_names)
    }

    /// Filenames of replaced packages that are not part of the new pkgbases.
    pub fn stale_filenames(&self) -> Vec<String> {
        difference(&self.current_filenames, &self.filenames)
    }

    fn consolidate(&mut self, pkgbases: Vec<OutputPackageBase>) -> Result<Vec<Box<dyn Check>>> {
        let current =
            read_pkgbases_from_stability_layers(&pkgbases, std::slice::from_ref(&self.directory))?;
        let above = read_pkgbases_from_stability_layers(&pkgbases, &self.above)?;
        let below = read_pkgbases_from_stability_layers(&pkgbases, &self.below)?;
        log::debug!(
            "{} of {} pkgbases replace existing ones in {:?}",
            current.len(),
            pkgbases.len(),
            self.directory
        );

        self.filenames = pkgbases.iter().flat_map(|p| p.filenames()).map(str::to_owned).collect();
        self.package_names = pkgbases
            .iter()
            .flat_map(|p| p.package_names())
            .map(str::to_owned)
            .collect();
        self.current_filenames = current.iter().flat_map(|p| p.filenames()).map(str::to_owned).collect();
        self.current_package_names = current
            .iter()
            .flat_map(|p| p.package_names())
            .map(str::to_owned)
            .collect();

        let mut checks: Vec<Box<dyn Check>> = vec![
            Box::new(StabilityLayerCheck::new(pkgbases.clone(), above, below)),
            Box::new(PkgbasesVersionUpdateCheck::new(pkgbases.clone(), current)),
        ];
        if let Some(url_validation) = &self.url_validation {
            checks.push(Box::new(SourceUrlCheck::new(
                pkgbases.clone(),
                url_validation.clone(),
            )));
        }
        checks.push(Box::new(PackagesNewOrUpdatedCheck::new(
            self.directory.clone(),
            pkgbases,
        )));
        Ok(checks)
    }
}

fn difference(current: &[String], new: &[String]) -> Vec<String> {
    current
        .iter()
        .filter(|name| !new.contains(name))
        .cloned()
        .collect()
}

impl Task for ConsolidateOutputPackageBasesTask {
    fn name(&self) -> &'static str {
        "ConsolidateOutputPackageBasesTask"
    }

    fn core(&self) -> &TaskCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TaskCore {
        &mut self.core
    }

    fn do_task(&mut self) -> TaskResult {
        match self.pkgbases.resolve() {
            Some(pkgbases) => self.consolidate(pkgbases).into(),
            None => TaskResult::FailedDependency,
        }
    }

    fn undo_task(&mut self) -> Result<()> {
        self.filenames.clear();
        self.package_names.clear();
        self.current_filenames.clear();
        self.current_package_names.clear();
        Ok(())
    }
}

/// Names whose symlinks a removal task deletes.
pub enum SymlinkInput {
    Names(Vec<String>),
    /// The stale names found by the task.
    Consolidated(Shared<ConsolidateOutputPackageBasesTask>),
}

impl SymlinkInput {
    fn dependency(&self) -> Option<TaskRef> {
        match self {
            Self::Names(_) => None,
            Self::Consolidated(task) => Some(task.clone()),
        }
    }

    /// `None` if the consolidation did not succeed.
    fn resolve(
        &self,
        stale: fn(&ConsolidateOutputPackageBasesTask) -> Vec<String>,
    ) -> Option<Vec<String>> {
        match self {
            Self::Names(names) => Some(names.clone()),
            Self::Consolidated(task) => {
                let task = task.borrow();
                let names = (task.state() == ActionState::Success).then(|| stale(&task));
                names
            }
        }
    }
}

/// Removed symlinks and their targets.
#[derive(Default)]
struct RemovedSymlinks(Vec<(PathBuf, PathBuf)>);

impl RemovedSymlinks {
    fn remove(&mut self, link: &Path) -> Result<()> {
        if !link.is_symlink() {
            if util::exists(link) {
                log::warn!("Not removing {link:?}: not a symlink");
            }
            return Ok(());
        }
        let target = fs::read_link(link).with_context(|| format!("while reading {link:?}"))?;
        fs::remove_file(link).with_context(|| format!("while removing {link:?}"))?;
        log::trace!("Removed {link:?} -> {target:?}");
        self.0.push((link.to_owned(), target));
        Ok(())
    }

    fn restore(&mut self) -> Result<()> {
        while let Some((link, target)) = self.0.pop() {
            if let Err(e) = util::symlink(&target, &link) {
                self.0.push((link.clone(), target));
                return Err(e.context(format!("while restoring {link:?}")));
            }
        }
        Ok(())
    }
}

/// Remove `pkgnames/<name>.json` symlinks of package names that left the
/// management repository.
pub struct RemoveManagementRepoSymlinksTask {
    core: TaskCore,
    directory: PathBuf,
    input: SymlinkInput,
    removed: RemovedSymlinks,
}

impl RemoveManagementRepoSymlinksTask {
    pub fn new(directory: &Path, input: SymlinkInput) -> Result<Self, Error> {
        if !directory.is_absolute() {
            return Err(Error::NotAbsolute(directory.to_owned()));
        }
        Ok(Self {
            core: TaskCore::new(input.dependency().into_iter().collect()),
            directory: directory.to_owned(),
            input,
            removed: RemovedSymlinks::default(),
        })
    }

    fn remove(&mut self, names: Vec<String>) -> Result<Vec<Box<dyn Check>>> {
        let pkgnames_dir = self.directory.join(PKGNAMES_DIR);
        for name in names {
            self.removed.remove(&pkgnames_dir.join(format!("{name}.json")))?;
        }
        Ok(Vec::new())
    }
}

impl Task for RemoveManagementRepoSymlinksTask {
    fn name(&self) -> &'static str {
        "RemoveManagementRepoSymlinksTask"
    }

    fn core(&self) -> &TaskCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TaskCore {
        &mut self.core
    }

    fn do_task(&mut self) -> TaskResult {
        match self
            .input
            .resolve(ConsolidateOutputPackageBasesTask::stale_package_names)
        {
            Some(names) => self.remove(names).into(),
            None => TaskResult::FailedDependency,
        }
    }

    fn undo_task(&mut self) -> Result<()> {
        self.removed.restore()
    }
}

/// Remove package (and signature) symlinks of filenames that left the
/// package repository.
pub struct RemovePackageRepoSymlinksTask {
    core: TaskCore,
    directory: PathBuf,
    input: SymlinkInput,
    removed: RemovedSymlinks,
}

impl RemovePackageRepoSymlinksTask {
    pub fn new(directory: &Path, input: SymlinkInput) -> Result<Self, Error> {
        if !directory.is_absolute() {
            return Err(Error::NotAbsolute(directory.to_owned()));
        }
        Ok(Self {
            core: TaskCore::new(input.dependency().into_iter().collect()),
            directory: directory.to_owned(),
            input,
            removed: RemovedSymlinks::default(),
        })
    }

    fn remove(&mut self, filenames: Vec<String>) -> Result<Vec<Box<dyn Check>>> {
        for filename in filenames {
            self.removed.remove(&self.directory.join(&filename))?;
            self.removed
                .remove(&self.directory.join(format!("{filename}{SIG_SUFFIX}")))?;
        }
        Ok(Vec::new())
    }
}

impl Task for RemovePackageRepoSymlinksTask {
    fn name(&self) -> &'static str {
        "RemovePackageRepoSymlinksTask"
    }

    fn core(&self) -> &TaskCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TaskCore {
        &mut self.core
    }

    fn do_task(&mut self) -> TaskResult {
        match self
            .input
            .resolve(ConsolidateOutputPackageBasesTask::stale_filenames)
        {
            Some(filenames) => self.remove(filenames).into(),
            None => TaskResult::FailedDependency,
        }
    }

    fn undo_task(&mut self) -> Result<()> {
        self.removed.restore()
    }
}
