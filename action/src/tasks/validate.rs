use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::Pattern;

use repo::{
    BuildRequirement, OutputPackageBase, PackageFileName, PackageRepo, RepoLayout, PKGNAMES_DIR,
    SIG_SUFFIX,
};
use util::HashSet;

use super::PkgbasesFrom;
use crate::{
    Check, ReproducibleBuildEnvironmentCheck, Task, TaskCore, TaskResult, UniqueInRepoGroupCheck,
};

/// Requirements provided by a package currently in one of the management
/// repository directories, looked up through `pkgnames/<name>.json`.
pub fn read_build_requirements_from_management_repo_dirs(
    requirements: &[BuildRequirement],
    dirs: &[PathBuf],
) -> Result<HashSet<BuildRequirement>, repo::Error> {
    let mut found = HashSet::default();
    for requirement in requirements {
        for dir in dirs {
            let path = dir
                .join(PKGNAMES_DIR)
                .join(format!("{}.json", requirement.name));
            if !path.exists() {
                continue;
            }
            let pkgbase = OutputPackageBase::from_file(&path)?;
            let provided = pkgbase.version == requirement.version
                && pkgbase.packages.iter().any(|pkg| {
                    pkg.name == requirement.name && pkg.arch == requirement.architecture
                });
            if provided {
                found.insert(requirement.clone());
                break;
            }
        }
    }
    Ok(found)
}

/// Requirements provided by a package file in the archive directory
/// `<archive>/<first char>/<name>/`.
pub fn read_build_requirements_from_archive_dir(
    requirements: &[BuildRequirement],
    archive_dir: &Path,
) -> Result<HashSet<BuildRequirement>> {
    let archive_dir = archive_dir.to_str().ok_or(util::PathEncodingError)?;
    let mut found = HashSet::default();
    for requirement in requirements {
        let Some(first) = requirement.name.chars().next() else {
            continue;
        };
        let pattern = format!(
            "{}/{}/{}/{}.pkg.tar*",
            Pattern::escape(archive_dir),
            Pattern::escape(&first.to_string()),
            Pattern::escape(&requirement.name),
            Pattern::escape(&requirement.to_string()),
        );
        let mut matches = Vec::new();
        for entry in glob::glob(&pattern)? {
            let path = entry?;
            let is_sig = path
                .to_str()
                .is_some_and(|path| path.ends_with(SIG_SUFFIX));
            if !is_sig {
                matches.push(path);
            }
        }

        match &matches[..] {
            [] => {}
            [path] => {
                let filename = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .ok_or(util::PathEncodingError)?;
                let parsed = PackageFileName::parse(filename)?;
                if parsed.name == requirement.name
                    && parsed.version == requirement.version
                    && parsed.arch == requirement.architecture
                {
                    found.insert(requirement.clone());
                }
            }
            _ => log::warn!(
                "Ignoring {} ambiguous archive matches for {requirement}",
                matches.len()
            ),
        }
    }
    Ok(found)
}

/// Requirements provided by the packages of a transaction itself.
pub fn transaction_build_requirements(
    pkgbases: &[OutputPackageBase],
) -> HashSet<BuildRequirement> {
    pkgbases
        .iter()
        .flat_map(|pkgbase| {
            pkgbase.packages.iter().map(|pkg| {
                BuildRequirement::new(&pkg.name, pkgbase.version.clone(), pkg.arch)
            })
        })
        .collect()
}

/// Find where the build environment of new pkgbases can be reproduced from.
///
/// Only reading candidate metadata can make the task fail; an unmet
/// requirement fails its post-check.
pub struct ReproducibleBuildEnvironmentTask {
    core: TaskCore,
    pkgbases: PkgbasesFrom,
    management_repo_dirs: Vec<PathBuf>,
    archive_dir: Option<PathBuf>,
}

impl ReproducibleBuildEnvironmentTask {
    /// Searches all repositories and the archive directory of `layout`.
    pub fn new(pkgbases: PkgbasesFrom, layout: &RepoLayout) -> Self {
        let management_repo_dirs = layout
            .repositories
            .iter()
            .flat_map(|repo| layout.management_repo_dirs(repo))
            .collect();
        Self {
            core: TaskCore::new(pkgbases.dependency().into_iter().collect()),
            pkgbases,
            management_repo_dirs,
            archive_dir: layout.archive_dir.clone(),
        }
    }

    fn gather(&self, pkgbases: &[OutputPackageBase]) -> Result<Vec<Box<dyn Check>>> {
        let mut seen = HashSet::default();
        let requirements: Vec<BuildRequirement> = pkgbases
            .iter()
            .flat_map(|pkgbase| &pkgbase.buildinfo.installed)
            .filter(|requirement| seen.insert(*requirement))
            .cloned()
            .collect();

        let mut available = read_build_requirements_from_management_repo_dirs(
            &requirements,
            &self.management_repo_dirs,
        )?;
        if let Some(archive_dir) = &self.archive_dir {
            let archived = read_build_requirements_from_archive_dir(&requirements, archive_dir)
                .with_context(|| format!("while searching {archive_dir:?}"))?;
            available.extend(archived);
        }
        available.extend(transaction_build_requirements(pkgbases));
        log::debug!(
            "{} build requirements, {} available",
            requirements.len(),
            available.len()
        );

        Ok(vec![Box::new(ReproducibleBuildEnvironmentCheck::new(
            requirements,
            available,
        ))])
    }
}

impl Task for ReproducibleBuildEnvironmentTask {
    fn name(&self) -> &'static str {
        "ReproducibleBuildEnvironmentTask"
    }

    fn core(&self) -> &TaskCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TaskCore {
        &mut self.core
    }

    fn do_task(&mut self) -> TaskResult {
        match self.pkgbases.resolve() {
            Some(pkgbases) => self.gather(&pkgbases).into(),
            None => TaskResult::FailedDependency,
        }
    }

    fn undo_task(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Make sure no pkgbase or package of the new pkgbases exists in another
/// repository of the same group.
pub struct RepoGroupTask {
    core: TaskCore,
    pkgbases: PkgbasesFrom,
    dirs: Vec<PathBuf>,
}

impl RepoGroupTask {
    pub fn new(pkgbases: PkgbasesFrom, layout: &RepoLayout, repo: &PackageRepo) -> Self {
        let dirs = layout
            .repo_group(repo)
            .flat_map(|other| layout.management_repo_dirs(other))
            .collect();
        Self {
            core: TaskCore::new(pkgbases.dependency().into_iter().collect()),
            pkgbases,
            dirs,
        }
    }

    /// Management repository directories of the other group members.
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }
}

impl Task for RepoGroupTask {
    fn name(&self) -> &'static str {
        "RepoGroupTask"
    }

    fn core(&self) -> &TaskCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut TaskCore {
        &mut self.core
    }

    fn do_task(&mut self) -> TaskResult {
        match self.pkgbases.resolve() {
            Some(pkgbases) => TaskResult::Success(vec![Box::new(UniqueInRepoGroupCheck::new(
                pkgbases,
                self.dirs.clone(),
            ))]),
            None => TaskResult::FailedDependency,
        }
    }

    fn undo_task(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{as_ref, pkgbase};
    use crate::{call, shared, ActionState, CheckError};
    use repo::{Architecture, BuildInfo};
    use std::fs;
    use tempfile::tempdir;

    fn layout(root: &Path) -> RepoLayout {
        let mut core = PackageRepo::new("core", Architecture::X86_64);
        core.group = Some(1);
        let mut extra = PackageRepo::new("extra", Architecture::X86_64);
        extra.group = Some(1);
        RepoLayout {
            management_dir: root.join("management"),
            package_dir: root.join("package"),
            pool_dir: root.join("pool"),
            archive_dir: Some(root.join("archive")),
            repositories: vec![core, extra],
        }
    }

    fn requiring(requirements: &[&str]) -> Result<OutputPackageBase> {
        let mut pkgbase = pkgbase("app", &["app"], "1.0-1", Architecture::X86_64)?;
        pkgbase.buildinfo = BuildInfo {
            installed: requirements
                .iter()
                .map(|r| r.parse())
                .collect::<Result<_, _>>()?,
        };
        Ok(pkgbase)
    }

    fn archive(root: &Path, filename: &str) -> Result<()> {
        let parsed = PackageFileName::parse(filename)?;
        let first = parsed.name.chars().next().unwrap_or('_').to_string();
        let dir = root.join("archive").join(first).join(&parsed.name);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(filename), "")?;
        fs::write(dir.join(format!("{filename}.sig")), "")?;
        Ok(())
    }

    #[test]
    fn test_requirement_in_archive() -> Result<()> {
        let root = tempdir()?;
        archive(root.path(), "foo-1.0-1-x86_64.pkg.tar.zst")?;
        let task = shared(ReproducibleBuildEnvironmentTask::new(
            PkgbasesFrom::Given(vec![requiring(&["foo-1.0-1-x86_64"])?]),
            &layout(root.path()),
        ));
        assert_eq!(call(&as_ref(&task)), ActionState::Success);
        Ok(())
    }

    #[test]
    fn test_requirement_with_other_architecture() -> Result<()> {
        let root = tempdir()?;
        archive(root.path(), "foo-1.0-1-any.pkg.tar.zst")?;
        let task = shared(ReproducibleBuildEnvironmentTask::new(
            PkgbasesFrom::Given(vec![requiring(&["foo-1.0-1-x86_64"])?]),
            &layout(root.path()),
        ));
        assert_eq!(call(&as_ref(&task)), ActionState::FailedPostCheck);
        match task.borrow().core().check_failure() {
            Some(CheckError::UnmetBuildRequirements(unmet)) => {
                assert_eq!(unmet.len(), 1);
                assert_eq!(unmet[0].to_string(), "foo-1.0-1-x86_64");
            }
            other => panic!("unexpected failure: {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_requirement_sources() -> Result<()> {
        let root = tempdir()?;
        let layout = layout(root.path());

        // in a repository
        let mgmt = root.path().join("management/x86_64/extra");
        fs::create_dir_all(mgmt.join(PKGNAMES_DIR))?;
        let lib = pkgbase("lib", &["lib"], "2.0-1", Architecture::X86_64)?;
        fs::write(mgmt.join("lib.json"), lib.to_json(false)?)?;
        util::symlink(Path::new("../lib.json"), &mgmt.join(PKGNAMES_DIR).join("lib.json"))?;

        let requirements: Vec<BuildRequirement> = vec!["lib-2.0-1-x86_64".parse()?, "lib-1.0-1-x86_64".parse()?];
        let found = read_build_requirements_from_management_repo_dirs(
            &requirements,
            &layout.management_repo_dirs(&layout.repositories[1]),
        )?;
        assert!(found.contains(&requirements[0]));
        assert!(!found.contains(&requirements[1]));

        // in the same transaction
        let tool = pkgbase("tool", &["tool", "tool-libs"], "3.0-1", Architecture::Any)?;
        let provided = transaction_build_requirements(&[tool.clone()]);
        assert!(provided.contains(&"tool-libs-3.0-1-any".parse()?));

        let task = shared(ReproducibleBuildEnvironmentTask::new(
            PkgbasesFrom::Given(vec![
                requiring(&["lib-2.0-1-x86_64", "tool-libs-3.0-1-any"])?,
                tool,
            ]),
            &layout,
        ));
        assert_eq!(call(&as_ref(&task)), ActionState::Success);
        Ok(())
    }

    #[test]
    fn test_repo_group() -> Result<()> {
        let root = tempdir()?;
        let layout = layout(root.path());
        let extra = root.path().join("management/x86_64/extra");
        fs::create_dir_all(&extra)?;
        fs::write(extra.join("app.json"), "")?;

        let task = shared(RepoGroupTask::new(
            PkgbasesFrom::Given(vec![requiring(&[])?]),
            &layout,
            &layout.repositories[0],
        ));
        assert_eq!(task.borrow().dirs(), [extra.clone()]);
        assert_eq!(call(&as_ref(&task)), ActionState::FailedPostCheck);
        assert!(matches!(
            task.borrow().core().check_failure(),
            Some(CheckError::NotUniqueInRepoGroup { .. })
        ));
        Ok(())
    }
}
