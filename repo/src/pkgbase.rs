use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Architecture, BuildInfo, Error, Package, Version};

/// A package as recorded in a management repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPackage {
    pub name: String,
    pub filename: String,
    pub arch: Architecture,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    #[serde(default)]
    pub csize: u64,
}

impl From<Package> for OutputPackage {
    fn from(pkg: Package) -> Self {
        Self {
            name: pkg.pkginfo.name,
            filename: pkg.filename,
            arch: pkg.pkginfo.arch,
            desc: pkg.pkginfo.desc,
            url: pkg.pkginfo.url,
            depends: pkg.pkginfo.depends,
            files: pkg.files,
            csize: pkg.csize,
        }
    }
}

/// One pkgbase and all of the packages built from it.
///
/// This is the unit that is written to (and read from) the JSON files of a
/// management repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPackageBase {
    pub base: String,
    pub version: Version,
    pub packages: Vec<OutputPackage>,
    #[serde(default)]
    pub buildinfo: BuildInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
}

impl OutputPackageBase {
    /// Group packages of the same pkgbase and version.
    pub fn from_packages(packages: Vec<Package>) -> Result<Self, Error> {
        let first = packages.first().ok_or(Error::EmptyPkgbase)?;
        let base = first.pkginfo.base.clone();
        let version = first.pkginfo.version.clone();
        let buildinfo = first.buildinfo.clone();

        if let Some(other) = packages
            .iter()
            .find(|pkg| pkg.pkginfo.base != base || pkg.pkginfo.version != version)
        {
            return Err(Error::InconsistentPkgbase(format!(
                "{} ({base} {version}) and {} ({} {})",
                first.pkginfo.name,
                other.pkginfo.name,
                other.pkginfo.base,
                other.pkginfo.version,
            )));
        }

        Ok(Self {
            base,
            version,
            packages: packages.into_iter().map(OutputPackage::from).collect(),
            buildinfo,
            source_url: None,
        })
    }

    /// Read a previously written pkgbase JSON file.
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let bytes = fs::read(path).map_err(|e| Error::Read(path.to_owned(), e))?;
        serde_json::from_slice(&bytes).map_err(|e| Error::Json(path.to_owned(), e))
    }

    /// Serialize for writing to a management repository.
    pub fn to_json(&self, pretty: bool) -> Result<Vec<u8>, serde_json::Error> {
        if pretty {
            serde_json::to_vec_pretty(self)
        } else {
            serde_json::to_vec(self)
        }
    }

    /// Names of all packages of this pkgbase.
    pub fn package_names(&self) -> impl Iterator<Item = &str> {
        self.packages.iter().map(|pkg| pkg.name.as_str())
    }

    /// Filenames of all packages of this pkgbase.
    pub fn filenames(&self) -> impl Iterator<Item = &str> {
        self.packages.iter().map(|pkg| pkg.filename.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PkgInfo;
    use anyhow::Result;
    use tempfile::tempdir;

    fn package(name: &str, base: &str, version: &str) -> Result<Package> {
        Ok(Package {
            pkginfo: PkgInfo {
                name: name.to_owned(),
                base: base.to_owned(),
                version: Version::new(version)?,
                arch: Architecture::X86_64,
                desc: None,
                url: None,
                depends: Vec::new(),
            },
            buildinfo: BuildInfo::default(),
            files: Vec::new(),
            filename: format!("{name}-{version}-x86_64.pkg.tar.zst"),
            csize: 1,
            signed: false,
        })
    }

    #[test]
    fn test_from_packages() -> Result<()> {
        let pkgbase = OutputPackageBase::from_packages(vec![
            package("foo", "foo", "1.0-1")?,
            package("foo-docs", "foo", "1.0-1")?,
        ])?;
        assert_eq!(pkgbase.base, "foo");
        assert_eq!(pkgbase.package_names().collect::<Vec<_>>(), ["foo", "foo-docs"]);

        assert!(OutputPackageBase::from_packages(Vec::new()).is_err());
        assert!(OutputPackageBase::from_packages(vec![
            package("foo", "foo", "1.0-1")?,
            package("foo-docs", "foo", "1.0-2")?,
        ])
        .is_err());
        Ok(())
    }

    #[test]
    fn test_file_roundtrip() -> Result<()> {
        let dir = tempdir()?;
        let mut pkgbase = OutputPackageBase::from_packages(vec![package("foo", "foo", "1.0-1")?])?;
        pkgbase.source_url = Some("https://example.org/foo.git".to_owned());

        let path = dir.path().join("foo.json");
        fs::write(&path, pkgbase.to_json(true)?)?;
        assert_eq!(OutputPackageBase::from_file(&path)?, pkgbase);

        fs::write(&path, "{")?;
        assert!(matches!(
            OutputPackageBase::from_file(&path),
            Err(Error::Json(..))
        ));
        Ok(())
    }
}
