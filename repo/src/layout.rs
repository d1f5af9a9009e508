use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Architecture, Error};

/// Kind of directory a repository owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoDirType {
    /// `<management>/<arch>/<repo-name>`: pkgbase JSON files
    Management,
    /// `<package>/<repo-name>/<arch>`: symlinks and sync databases
    Package,
    /// `<pool>/<name>`: package files
    Pool,
}

/// One of the stability layers (and their debug companions) of a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepoType {
    Stable,
    StableDebug,
    Testing,
    TestingDebug,
    Staging,
    StagingDebug,
}

impl RepoType {
    pub const ALL: [RepoType; 6] = [
        Self::Stable,
        Self::StableDebug,
        Self::Testing,
        Self::TestingDebug,
        Self::Staging,
        Self::StagingDebug,
    ];

    fn suffix(self) -> &'static str {
        match self {
            Self::Stable => "",
            Self::StableDebug => "-debug",
            Self::Testing => "-testing",
            Self::TestingDebug => "-testing-debug",
            Self::Staging => "-staging",
            Self::StagingDebug => "-staging-debug",
        }
    }

    pub fn is_debug(self) -> bool {
        matches!(
            self,
            Self::StableDebug | Self::TestingDebug | Self::StagingDebug
        )
    }

    /// 0 for stable, 1 for testing, 2 for staging.
    fn stability(self) -> u8 {
        match self {
            Self::Stable | Self::StableDebug => 0,
            Self::Testing | Self::TestingDebug => 1,
            Self::Staging | Self::StagingDebug => 2,
        }
    }

    /// The debug counterpart of a non-debug type.
    pub fn debug(self) -> Self {
        match self {
            Self::Stable | Self::StableDebug => Self::StableDebug,
            Self::Testing | Self::TestingDebug => Self::TestingDebug,
            Self::Staging | Self::StagingDebug => Self::StagingDebug,
        }
    }
}

impl fmt::Display for RepoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stable => "stable",
            Self::StableDebug => "stable-debug",
            Self::Testing => "testing",
            Self::TestingDebug => "testing-debug",
            Self::Staging => "staging",
            Self::StagingDebug => "staging-debug",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for RepoType {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|repo_type| repo_type.to_string() == s)
            .ok_or_else(|| Error::UnknownRepoType(s.to_owned()))
    }
}

/// A configured binary package repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRepo {
    pub name: String,
    pub architecture: Architecture,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub testing: bool,
    #[serde(default)]
    pub staging: bool,
    /// Repositories sharing a group may not contain the same pkgbase or package.
    #[serde(default)]
    pub group: Option<u32>,
}

impl PackageRepo {
    pub fn new(name: &str, architecture: Architecture) -> Self {
        Self {
            name: name.to_owned(),
            architecture,
            debug: false,
            testing: false,
            staging: false,
            group: None,
        }
    }

    /// Directory name of one stability layer, e.g. `core-testing-debug`.
    pub fn repo_name(&self, repo_type: RepoType) -> String {
        format!("{}{}", self.name, repo_type.suffix())
    }

    pub fn is_enabled(&self, repo_type: RepoType) -> bool {
        let layer = match repo_type.stability() {
            0 => true,
            1 => self.testing,
            _ => self.staging,
        };
        layer && (!repo_type.is_debug() || self.debug)
    }

    pub fn repo_types(&self) -> impl Iterator<Item = RepoType> + '_ {
        RepoType::ALL
            .into_iter()
            .filter(|repo_type| self.is_enabled(*repo_type))
    }
}

/// URLs a pkgbase's `source_url` must start with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlValidation {
    pub urls: Vec<String>,
    #[serde(default)]
    pub tls_required: bool,
}

/// Base directories plus the repositories living in them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoLayout {
    pub management_dir: PathBuf,
    pub package_dir: PathBuf,
    pub pool_dir: PathBuf,
    #[serde(default)]
    pub archive_dir: Option<PathBuf>,
    #[serde(default)]
    pub repositories: Vec<PackageRepo>,
}

impl RepoLayout {
    /// Look up a repository by name and (if given) architecture.
    pub fn repo(&self, name: &str, architecture: Option<Architecture>) -> Result<&PackageRepo, Error> {
        self.repositories
            .iter()
            .find(|repo| repo.name == name && architecture.map_or(true, |a| a == repo.architecture))
            .ok_or_else(|| {
                let arch = architecture.map_or_else(|| "any architecture".to_owned(), |a| a.to_string());
                Error::UnknownRepo(name.to_owned(), arch)
            })
    }

    pub fn get_repo_path(
        &self,
        dir_type: RepoDirType,
        name: &str,
        architecture: Option<Architecture>,
        repo_type: RepoType,
    ) -> Result<PathBuf, Error> {
        let repo = self.repo(name, architecture)?;
        if !repo.is_enabled(repo_type) {
            return Err(Error::RepoTypeNotEnabled(name.to_owned(), repo_type.to_string()));
        }
        Ok(self.repo_dir(dir_type, repo, repo_type))
    }

    fn repo_dir(&self, dir_type: RepoDirType, repo: &PackageRepo, repo_type: RepoType) -> PathBuf {
        let arch = repo.architecture.as_str();
        match dir_type {
            RepoDirType::Management => join(&self.management_dir, &[arch, &repo.repo_name(repo_type)]),
            RepoDirType::Package => join(&self.package_dir, &[&repo.repo_name(repo_type), arch]),
            RepoDirType::Pool => join(&self.pool_dir, &[&repo.name]),
        }
    }

    /// Management directories of every enabled stability layer of `repo`.
    pub fn management_repo_dirs(&self, repo: &PackageRepo) -> Vec<PathBuf> {
        repo.repo_types()
            .map(|repo_type| self.repo_dir(RepoDirType::Management, repo, repo_type))
            .collect()
    }

    /// Management directories of the layers above (less stable) and below
    /// (more stable) `repo_type`, keeping debug and non-debug layers apart.
    pub fn stability_layer_dirs(
        &self,
        repo: &PackageRepo,
        repo_type: RepoType,
    ) -> (Vec<PathBuf>, Vec<PathBuf>) {
        let mut above = Vec::new();
        let mut below = Vec::new();
        for other in repo.repo_types() {
            if other.is_debug() != repo_type.is_debug() {
                continue;
            }
            let dir = self.repo_dir(RepoDirType::Management, repo, other);
            if other.stability() > repo_type.stability() {
                above.push(dir);
            } else if other.stability() < repo_type.stability() {
                below.push(dir);
            }
        }
        (above, below)
    }

    /// Other repositories in the group of `repo`.
    pub fn repo_group<'a>(&'a self, repo: &'a PackageRepo) -> impl Iterator<Item = &'a PackageRepo> {
        self.repositories.iter().filter(move |other| {
            repo.group.is_some() && other.group == repo.group && *other != repo
        })
    }
}

fn join(base: &Path, parts: &[&str]) -> PathBuf {
    let mut path = base.to_owned();
    for part in parts {
        path.push(part);
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    fn layout() -> RepoLayout {
        let mut core = PackageRepo::new("core", Architecture::X86_64);
        core.testing = true;
        core.staging = true;
        core.debug = true;
        core.group = Some(1);
        let mut extra = PackageRepo::new("extra", Architecture::X86_64);
        extra.group = Some(1);
        let other = PackageRepo::new("other", Architecture::Aarch64);

        RepoLayout {
            management_dir: PathBuf::from("/mgmt"),
            package_dir: PathBuf::from("/pkg"),
            pool_dir: PathBuf::from("/pool"),
            archive_dir: None,
            repositories: vec![core, extra, other],
        }
    }

    #[test]
    fn test_repo_paths() -> Result<()> {
        let layout = layout();
        assert_eq!(
            layout.get_repo_path(RepoDirType::Management, "core", None, RepoType::TestingDebug)?,
            Path::new("/mgmt/x86_64/core-testing-debug")
        );
        assert_eq!(
            layout.get_repo_path(RepoDirType::Package, "core", Some(Architecture::X86_64), RepoType::Stable)?,
            Path::new("/pkg/core/x86_64")
        );
        assert_eq!(
            layout.get_repo_path(RepoDirType::Pool, "extra", None, RepoType::Stable)?,
            Path::new("/pool/extra")
        );
        assert!(matches!(
            layout.get_repo_path(RepoDirType::Package, "core", Some(Architecture::Aarch64), RepoType::Stable),
            Err(Error::UnknownRepo(..))
        ));
        assert!(matches!(
            layout.get_repo_path(RepoDirType::Package, "extra", None, RepoType::Testing),
            Err(Error::RepoTypeNotEnabled(..))
        ));
        Ok(())
    }

    #[test]
    fn test_stability_layers() -> Result<()> {
        let layout = layout();
        let core = layout.repo("core", None)?;
        let (above, below) = layout.stability_layer_dirs(core, RepoType::Testing);
        assert_eq!(above, [PathBuf::from("/mgmt/x86_64/core-staging")]);
        assert_eq!(below, [PathBuf::from("/mgmt/x86_64/core")]);

        let (above, below) = layout.stability_layer_dirs(core, RepoType::StableDebug);
        assert_eq!(
            above,
            [
                PathBuf::from("/mgmt/x86_64/core-testing-debug"),
                PathBuf::from("/mgmt/x86_64/core-staging-debug")
            ]
        );
        assert!(below.is_empty());
        assert_eq!(layout.management_repo_dirs(core).len(), 6);
        Ok(())
    }

    #[test]
    fn test_repo_group() -> Result<()> {
        let layout = layout();
        let core = layout.repo("core", None)?;
        let group: Vec<_> = layout.repo_group(core).map(|r| r.name.as_str()).collect();
        assert_eq!(group, ["extra"]);

        let other = layout.repo("other", None)?;
        assert_eq!(layout.repo_group(other).count(), 0);
        Ok(())
    }

    #[test]
    fn test_repo_type_from_str() -> Result<()> {
        assert_eq!("testing-debug".parse::<RepoType>()?, RepoType::TestingDebug);
        assert!("unstable".parse::<RepoType>().is_err());
        Ok(())
    }
}
