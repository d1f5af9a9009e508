use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Architecture, Error, Version, SIG_SUFFIX};

/// Compression suffixes accepted after `.pkg.tar`.
const PKG_COMPRESSION_SUFFIXES: [&str; 9] =
    ["", ".gz", ".bz2", ".xz", ".zst", ".lz4", ".lrz", ".lzo", ".Z"];

/// Metadata describing a single package (the `.PKGINFO` of a package file).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PkgInfo {
    pub name: String,
    pub base: String,
    pub version: Version,
    pub arch: Architecture,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<String>,
}

/// Build environment of a package (the `.BUILDINFO` of a package file).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    /// Packages installed in the build environment.
    #[serde(default)]
    pub installed: Vec<BuildRequirement>,
}

/// One entry of a build environment: `name-pkgver-pkgrel-arch`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BuildRequirement {
    pub name: String,
    pub version: Version,
    pub architecture: Architecture,
}

impl BuildRequirement {
    pub fn new(name: &str, version: Version, architecture: Architecture) -> Self {
        Self {
            name: name.to_owned(),
            version,
            architecture,
        }
    }
}

impl TryFrom<String> for BuildRequirement {
    type Error = Error;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl std::str::FromStr for BuildRequirement {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidBuildRequirement(s.to_owned());
        let (name, version, arch) = split_name_version_arch(s).ok_or_else(invalid)?;
        Ok(Self {
            name: name.to_owned(),
            version: Version::new(version).map_err(|_| invalid())?,
            architecture: arch.parse().map_err(|_| invalid())?,
        })
    }
}

impl From<BuildRequirement> for String {
    fn from(req: BuildRequirement) -> Self {
        req.to_string()
    }
}

impl fmt::Display for BuildRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.name, self.version, self.architecture)
    }
}

/// Split `name-pkgver-pkgrel-arch` into its name, full version and architecture.
fn split_name_version_arch(s: &str) -> Option<(&str, &str, &str)> {
    let (rest, arch) = s.rsplit_once('-')?;
    let (rest, _pkgrel) = rest.rsplit_once('-')?;
    let (name, _pkgver) = rest.rsplit_once('-')?;
    if name.is_empty() {
        return None;
    }
    let version = &s[name.len() + 1..s.len() - arch.len() - 1];
    Some((name, version, arch))
}

/// The components encoded in a package filename,
/// e.g. `foo-1.0-1-x86_64.pkg.tar.zst`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageFileName {
    pub name: String,
    pub version: Version,
    pub arch: Architecture,
}

impl PackageFileName {
    /// Parse a package (or package signature) filename.
    pub fn parse(filename: &str) -> Result<Self, Error> {
        let invalid = || Error::InvalidFileName(filename.to_owned());
        let unsigned = filename.strip_suffix(SIG_SUFFIX).unwrap_or(filename);
        let stem = PKG_COMPRESSION_SUFFIXES
            .iter()
            .find_map(|ext| unsigned.strip_suffix(&format!(".pkg.tar{ext}")))
            .ok_or_else(invalid)?;
        let (name, version, arch) = split_name_version_arch(stem).ok_or_else(invalid)?;
        Ok(Self {
            name: name.to_owned(),
            version: Version::new(version).map_err(|_| invalid())?,
            arch: arch.parse().map_err(|_| invalid())?,
        })
    }
}

/// A package read from disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub pkginfo: PkgInfo,
    #[serde(default)]
    pub buildinfo: BuildInfo,
    /// Files contained in the package.
    #[serde(default)]
    pub files: Vec<String>,
    /// Name of the file the package was read from.
    #[serde(default)]
    pub filename: String,
    /// Size of the package file.
    #[serde(default)]
    pub csize: u64,
    /// Whether a detached signature accompanies the package.
    #[serde(default)]
    pub signed: bool,
}

impl Package {
    /// True if this is a debug package.
    pub fn is_debug(&self) -> bool {
        self.pkginfo.name.ends_with("-debug")
    }
}

/// Reads package files into [`Package`]s.
pub trait PackageReader {
    fn read(&self, package: &Path, signature: Option<&Path>) -> Result<Package, Error>;
}

/// Reads package metadata records stored as JSON documents.
///
/// The file itself holds a serialized [`Package`]; `filename`, `csize` and
/// `signed` are filled in from the file on disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonPackageReader;

impl PackageReader for JsonPackageReader {
    fn read(&self, package: &Path, signature: Option<&Path>) -> Result<Package, Error> {
        log::debug!("Reading package {package:?}");
        let bytes = fs::read(package).map_err(|e| Error::Read(package.to_owned(), e))?;
        let mut pkg: Package =
            serde_json::from_slice(&bytes).map_err(|e| Error::Json(package.to_owned(), e))?;

        pkg.filename = package
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or(util::PathEncodingError)
            .map_err(anyhow::Error::from)?
            .to_owned();
        pkg.csize = bytes.len() as u64;

        if let Some(signature) = signature {
            fs::metadata(signature).map_err(|e| Error::Read(signature.to_owned(), e))?;
            pkg.signed = true;
        }
        Ok(pkg)
    }
}
