use repo::BuildRequirement;
use util::HashSet;

use super::{Check, CheckError};

/// Every package installed in the build environment of a pkgbase is
/// available from a repository, the archive or the same transaction.
pub struct ReproducibleBuildEnvironmentCheck {
    requirements: Vec<BuildRequirement>,
    available: HashSet<BuildRequirement>,
}

impl ReproducibleBuildEnvironmentCheck {
    pub fn new(requirements: Vec<BuildRequirement>, available: HashSet<BuildRequirement>) -> Self {
        Self {
            requirements,
            available,
        }
    }
}

impl Check for ReproducibleBuildEnvironmentCheck {
    fn name(&self) -> &'static str {
        "ReproducibleBuildEnvironmentCheck"
    }

    fn check(&self) -> Result<(), CheckError> {
        let unmet: Vec<BuildRequirement> = self
            .requirements
            .iter()
            .filter(|req| !self.available.contains(*req))
            .cloned()
            .collect();
        if unmet.is_empty() {
            Ok(())
        } else {
            log::trace!("{} of {} build requirements unmet", unmet.len(), self.requirements.len());
            Err(CheckError::UnmetBuildRequirements(unmet))
        }
    }
}
