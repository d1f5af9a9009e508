use std::path::PathBuf;

use repo::{Architecture, OutputPackageBase, PackageFileName};

use super::{Check, CheckError};

/// Every package comes with an existing detached signature.
pub struct SignaturesPresentCheck {
    packages: Vec<(PathBuf, Option<PathBuf>)>,
}

impl SignaturesPresentCheck {
    pub fn new(packages: Vec<(PathBuf, Option<PathBuf>)>) -> Self {
        Self { packages }
    }
}

impl Check for SignaturesPresentCheck {
    fn name(&self) -> &'static str {
        "SignaturesPresentCheck"
    }

    fn check(&self) -> Result<(), CheckError> {
        let missing: Vec<PathBuf> = self
            .packages
            .iter()
            .filter(|(_, signature)| !signature.as_ref().is_some_and(|sig| sig.is_file()))
            .map(|(package, _)| package.clone())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(CheckError::MissingSignatures(missing))
        }
    }
}

/// Debug repositories take only debug packages, other repositories none.
pub struct DebugPackagesCheck {
    pkgbases: Vec<OutputPackageBase>,
    debug: bool,
}

impl DebugPackagesCheck {
    pub fn new(pkgbases: Vec<OutputPackageBase>, debug: bool) -> Self {
        Self { pkgbases, debug }
    }
}

impl Check for DebugPackagesCheck {
    fn name(&self) -> &'static str {
        "DebugPackagesCheck"
    }

    fn check(&self) -> Result<(), CheckError> {
        let packages: Vec<String> = self
            .pkgbases
            .iter()
            .flat_map(|pkgbase| pkgbase.package_names())
            .filter(|name| name.ends_with("-debug") != self.debug)
            .map(str::to_owned)
            .collect();
        if packages.is_empty() {
            Ok(())
        } else {
            Err(CheckError::DebugMismatch {
                debug: self.debug,
                packages,
            })
        }
    }
}

/// Every package can be installed on the repository's architecture.
pub struct MatchingArchitectureCheck {
    pkgbases: Vec<OutputPackageBase>,
    architecture: Architecture,
}

impl MatchingArchitectureCheck {
    pub fn new(pkgbases: Vec<OutputPackageBase>, architecture: Architecture) -> Self {
        Self {
            pkgbases,
            architecture,
        }
    }
}

impl Check for MatchingArchitectureCheck {
    fn name(&self) -> &'static str {
        "MatchingArchitectureCheck"
    }

    fn check(&self) -> Result<(), CheckError> {
        let packages: Vec<String> = self
            .pkgbases
            .iter()
            .flat_map(|pkgbase| &pkgbase.packages)
            .filter(|pkg| !pkg.arch.fits(self.architecture))
            .map(|pkg| format!("{} ({})", pkg.name, pkg.arch))
            .collect();
        if packages.is_empty() {
            Ok(())
        } else {
            Err(CheckError::ArchitectureMismatch {
                architecture: self.architecture,
                packages,
            })
        }
    }
}

/// Package filenames encode the name, version and architecture of the package.
pub struct MatchingFilenameCheck {
    pkgbases: Vec<OutputPackageBase>,
}

impl MatchingFilenameCheck {
    pub fn new(pkgbases: Vec<OutputPackageBase>) -> Self {
        Self { pkgbases }
    }
}

impl Check for MatchingFilenameCheck {
    fn name(&self) -> &'static str {
        "MatchingFilenameCheck"
    }

    fn check(&self) -> Result<(), CheckError> {
        let mut mismatched = Vec::new();
        for pkgbase in &self.pkgbases {
            for pkg in &pkgbase.packages {
                let matches = PackageFileName::parse(&pkg.filename).is_ok_and(|parsed| {
                    parsed.name == pkg.name
                        && parsed.version == pkgbase.version
                        && parsed.arch == pkg.arch
                });
                if !matches {
                    mismatched.push(pkg.filename.clone());
                }
            }
        }
        if mismatched.is_empty() {
            Ok(())
        } else {
            Err(CheckError::FilenameMismatch(mismatched))
        }
    }
}
