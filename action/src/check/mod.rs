use std::fmt::Display;
use std::path::PathBuf;

use repo::{Architecture, BuildRequirement, Version};

/// Package file checks run while creating pkgbases
mod package;
pub use package::{
    DebugPackagesCheck, MatchingArchitectureCheck, MatchingFilenameCheck, SignaturesPresentCheck,
};

/// Checks of new pkgbases against the state of the repositories
mod pkgbase;
pub use pkgbase::{
    PackagesNewOrUpdatedCheck, PkgbasesVersionUpdateCheck, SourceUrlCheck, StabilityLayerCheck,
    UniqueInRepoGroupCheck,
};

/// Build environment check
mod build;
pub use build::ReproducibleBuildEnvironmentCheck;

/// A validation run before or after a task.
///
/// Checks are built with all the data they need, so running one takes no
/// arguments.
pub trait Check {
    fn name(&self) -> &'static str;

    fn check(&self) -> Result<(), CheckError>;
}

fn list<T: Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(thiserror::Error, Debug)]
pub enum CheckError {
    #[error("No packages to check")]
    NoPackages,
    #[error("Missing signatures for {0:?}")]
    MissingSignatures(Vec<PathBuf>),
    #[error("Packages {} do not match debug repository setting ({debug})", list(.packages))]
    DebugMismatch { debug: bool, packages: Vec<String> },
    #[error("Packages {} do not match architecture {architecture}", list(.packages))]
    ArchitectureMismatch {
        architecture: Architecture,
        packages: Vec<String>,
    },
    #[error("Package filenames {} do not match their metadata", list(.0))]
    FilenameMismatch(Vec<String>),
    #[error("{pkgbase} {version} is newer than {other} in a less stable layer")]
    NewerThanLayerAbove {
        pkgbase: String,
        version: Version,
        other: Version,
    },
    #[error("{pkgbase} {version} is older than {other} in a more stable layer")]
    OlderThanLayerBelow {
        pkgbase: String,
        version: Version,
        other: Version,
    },
    #[error("{0} has no source URL")]
    MissingSourceUrl(String),
    #[error("Source URL {url} of {pkgbase} is not allowed")]
    InvalidSourceUrl { pkgbase: String, url: String },
    #[error("{pkgbase} {version} is not newer than current version {current}")]
    VersionNotNewer {
        pkgbase: String,
        version: Version,
        current: Version,
    },
    #[error("Package {package} of {pkgbase} already belongs to {owner}")]
    PackageOwnedByOtherPkgbase {
        package: String,
        pkgbase: String,
        owner: String,
    },
    #[error("Unmet build requirements: {}", list(.0))]
    UnmetBuildRequirements(Vec<BuildRequirement>),
    #[error("{name} already exists in repository group member {dir:?}")]
    NotUniqueInRepoGroup { name: String, dir: PathBuf },
    #[error(transparent)]
    Repo(#[from] repo::Error),
}
