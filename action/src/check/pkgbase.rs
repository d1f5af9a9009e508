use std::path::PathBuf;

use repo::{OutputPackageBase, UrlValidation, PKGNAMES_DIR};

use super::{Check, CheckError};

fn find<'a>(pkgbases: &'a [OutputPackageBase], base: &str) -> Option<&'a OutputPackageBase> {
    pkgbases.iter().find(|pkgbase| pkgbase.base == base)
}

/// Every layer may hold its own copy of a pkgbase.
fn find_all<'a>(
    pkgbases: &'a [OutputPackageBase],
    base: &'a str,
) -> impl Iterator<Item = &'a OutputPackageBase> {
    pkgbases.iter().filter(move |pkgbase| pkgbase.base == base)
}

/// A pkgbase may not be newer than in a less stable layer, nor older than
/// in a more stable one.
pub struct StabilityLayerCheck {
    pkgbases: Vec<OutputPackageBase>,
    above: Vec<OutputPackageBase>,
    below: Vec<OutputPackageBase>,
}

impl StabilityLayerCheck {
    pub fn new(
        pkgbases: Vec<OutputPackageBase>,
        above: Vec<OutputPackageBase>,
        below: Vec<OutputPackageBase>,
    ) -> Self {
        Self {
            pkgbases,
            above,
            below,
        }
    }
}

impl Check for StabilityLayerCheck {
    fn name(&self) -> &'static str {
        "StabilityLayerCheck"
    }

    fn check(&self) -> Result<(), CheckError> {
        for pkgbase in &self.pkgbases {
            for other in find_all(&self.above, &pkgbase.base) {
                if pkgbase.version.is_newer_than(&other.version) {
                    return Err(CheckError::NewerThanLayerAbove {
                        pkgbase: pkgbase.base.clone(),
                        version: pkgbase.version.clone(),
                        other: other.version.clone(),
                    });
                }
            }
            for other in find_all(&self.below, &pkgbase.base) {
                if pkgbase.version.is_older_than(&other.version) {
                    return Err(CheckError::OlderThanLayerBelow {
                        pkgbase: pkgbase.base.clone(),
                        version: pkgbase.version.clone(),
                        other: other.version.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Every pkgbase has a source URL starting with one of the allowed URLs.
pub struct SourceUrlCheck {
    pkgbases: Vec<OutputPackageBase>,
    validation: UrlValidation,
}

impl SourceUrlCheck {
    pub fn new(pkgbases: Vec<OutputPackageBase>, validation: UrlValidation) -> Self {
        Self {
            pkgbases,
            validation,
        }
    }
}

impl Check for SourceUrlCheck {
    fn name(&self) -> &'static str {
        "SourceUrlCheck"
    }

    fn check(&self) -> Result<(), CheckError> {
        for pkgbase in &self.pkgbases {
            let url = pkgbase
                .source_url
                .as_deref()
                .ok_or_else(|| CheckError::MissingSourceUrl(pkgbase.base.clone()))?;
            let tls_ok = !self.validation.tls_required || url.starts_with("https://");
            let prefix_ok = self.validation.urls.is_empty()
                || self.validation.urls.iter().any(|allowed| url.starts_with(allowed.as_str()));
            if !tls_ok || !prefix_ok {
                return Err(CheckError::InvalidSourceUrl {
                    pkgbase: pkgbase.base.clone(),
                    url: url.to_owned(),
                });
            }
        }
        Ok(())
    }
}

/// New pkgbases are newer than the ones they replace.
pub struct PkgbasesVersionUpdateCheck {
    pkgbases: Vec<OutputPackageBase>,
    current: Vec<OutputPackageBase>,
}

impl PkgbasesVersionUpdateCheck {
    pub fn new(pkgbases: Vec<OutputPackageBase>, current: Vec<OutputPackageBase>) -> Self {
        Self { pkgbases, current }
    }
}

impl Check for PkgbasesVersionUpdateCheck {
    fn name(&self) -> &'static str {
        "PkgbasesVersionUpdateCheck"
    }

    fn check(&self) -> Result<(), CheckError> {
        for pkgbase in &self.pkgbases {
            if let Some(current) = find(&self.current, &pkgbase.base) {
                if !pkgbase.version.is_newer_than(&current.version) {
                    return Err(CheckError::VersionNotNewer {
                        pkgbase: pkgbase.base.clone(),
                        version: pkgbase.version.clone(),
                        current: current.version.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Packages are either new to the repository or already belong to the same pkgbase.
pub struct PackagesNewOrUpdatedCheck {
    directory: PathBuf,
    pkgbases: Vec<OutputPackageBase>,
}

impl PackagesNewOrUpdatedCheck {
    pub fn new(directory: PathBuf, pkgbases: Vec<OutputPackageBase>) -> Self {
        Self {
            directory,
            pkgbases,
        }
    }
}

impl Check for PackagesNewOrUpdatedCheck {
    fn name(&self) -> &'static str {
        "PackagesNewOrUpdatedCheck"
    }

    fn check(&self) -> Result<(), CheckError> {
        let mut path = self.directory.join(PKGNAMES_DIR);
        for pkgbase in &self.pkgbases {
            for name in pkgbase.package_names() {
                path.push(format!("{name}.json"));
                if path.exists() {
                    let owner = OutputPackageBase::from_file(&path)?;
                    if owner.base != pkgbase.base {
                        return Err(CheckError::PackageOwnedByOtherPkgbase {
                            package: name.to_owned(),
                            pkgbase: pkgbase.base.clone(),
                            owner: owner.base,
                        });
                    }
                }
                path.pop();
            }
        }
        Ok(())
    }
}

/// No pkgbase or package exists in another repository of the same group.
pub struct UniqueInRepoGroupCheck {
    pkgbases: Vec<OutputPackageBase>,
    dirs: Vec<PathBuf>,
}

impl UniqueInRepoGroupCheck {
    pub fn new(pkgbases: Vec<OutputPackageBase>, dirs: Vec<PathBuf>) -> Self {
        Self { pkgbases, dirs }
    }
}

impl Check for UniqueInRepoGroupCheck {
    fn name(&self) -> &'static str {
        "UniqueInRepoGroupCheck"
    }

    fn check(&self) -> Result<(), CheckError> {
        for dir in &self.dirs {
            for pkgbase in &self.pkgbases {
                let mut candidates = vec![(
                    pkgbase.base.as_str(),
                    dir.join(format!("{}.json", pkgbase.base)),
                )];
                candidates.extend(pkgbase.package_names().map(|name| {
                    (name, dir.join(PKGNAMES_DIR).join(format!("{name}.json")))
                }));
                if let Some((name, _)) = candidates.iter().find(|(_, path)| util::exists(path)) {
                    return Err(CheckError::NotUniqueInRepoGroup {
                        name: name.to_string(),
                        dir: dir.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}
