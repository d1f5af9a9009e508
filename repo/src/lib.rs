//! Data model and on-disk formats of a binary package repository.
//!
//! Everything in here is consumed by the tasks in `repotx-action`: package
//! metadata is read through [`PackageReader`], grouped into
//! [`OutputPackageBase`]s (the JSON files of a management repository), turned
//! into sync databases by [`SyncDatabase`], and placed into pool/repo/archive
//! directories by [`RepoFile`] and [`CopySourceDestination`]. Directory
//! resolution goes through an explicit [`RepoLayout`] value.

use std::path::PathBuf;

/// CPU architectures
mod architecture;
pub use architecture::Architecture;

/// Package versions and version comparison
mod version;
pub use version::{vercmp, Version};

/// Single packages, build requirements and package filenames
mod package;
pub use package::{
    BuildInfo, BuildRequirement, JsonPackageReader, Package, PackageFileName, PackageReader,
    PkgInfo,
};

/// Management repository representation of a pkgbase
mod pkgbase;
pub use pkgbase::{OutputPackage, OutputPackageBase};

/// Sync database writer
mod syncdb;
pub use syncdb::{Compression, DbType, SyncDatabase};

/// Pool file + repository symlink pairs
mod repofile;
pub use repofile::{RepoFile, RepoFileType};

/// Archive directory placement
mod archive;
pub use archive::CopySourceDestination;

/// Repository directory layout
mod layout;
pub use layout::{PackageRepo, RepoDirType, RepoLayout, RepoType, UrlValidation};

/// Suffix of files staged for a later move.
pub const TMP_SUFFIX: &str = ".tmp";
/// Suffix of backups of files about to be replaced.
pub const BKP_SUFFIX: &str = ".bkp";
/// Suffix of detached signatures.
pub const SIG_SUFFIX: &str = ".sig";
/// Subdirectory of a management repository directory holding per-package symlinks.
pub const PKGNAMES_DIR: &str = "pkgnames";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Invalid version string: \"{0}\"")]
    InvalidVersion(String),
    #[error("Unknown architecture: \"{0}\"")]
    UnknownArchitecture(String),
    #[error("Invalid build requirement: \"{0}\"")]
    InvalidBuildRequirement(String),
    #[error("Invalid package filename: \"{0}\"")]
    InvalidFileName(String),
    #[error("No packages provided for pkgbase")]
    EmptyPkgbase,
    #[error("Packages do not belong to a single pkgbase: {0}")]
    InconsistentPkgbase(String),
    #[error("Unable to read {0:?}")]
    Read(PathBuf, #[source] std::io::Error),
    #[error("Unable to write {0:?}")]
    Write(PathBuf, #[source] std::io::Error),
    #[error("Invalid JSON in {0:?}")]
    Json(PathBuf, #[source] serde_json::Error),
    #[error("Repository \"{0}\" ({1}) is not configured")]
    UnknownRepo(String, String),
    #[error("Unknown repository type: \"{0}\"")]
    UnknownRepoType(String),
    #[error("Repository type \"{1}\" is not enabled for repository \"{0}\"")]
    RepoTypeNotEnabled(String, String),
    #[error("Refusing to overwrite existing file {0:?}")]
    FileExists(PathBuf),
    #[error("Path must be absolute: {0:?}")]
    NotAbsolute(PathBuf),
    #[error("Path {0:?} does not match repository file type {1}")]
    FileTypeMismatch(PathBuf, RepoFileType),
    #[error("Management repository directory not found: {0:?}")]
    ManagementDirNotFound(PathBuf),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
