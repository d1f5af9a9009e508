use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// CPU architecture of a package or repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Architecture {
    Any,
    Aarch64,
    Armv7h,
    I686,
    Riscv64,
    X86_64,
    X86_64V2,
    X86_64V3,
    X86_64V4,
}

const ARCHITECTURES: [(Architecture, &str); 9] = [
    (Architecture::Any, "any"),
    (Architecture::Aarch64, "aarch64"),
    (Architecture::Armv7h, "armv7h"),
    (Architecture::I686, "i686"),
    (Architecture::Riscv64, "riscv64"),
    (Architecture::X86_64, "x86_64"),
    (Architecture::X86_64V2, "x86_64_v2"),
    (Architecture::X86_64V3, "x86_64_v3"),
    (Architecture::X86_64V4, "x86_64_v4"),
];

impl Architecture {
    pub fn as_str(self) -> &'static str {
        ARCHITECTURES
            .iter()
            .find(|(arch, _)| *arch == self)
            .map(|(_, s)| *s)
            .unwrap_or("any")
    }

    /// True if a package of this architecture can go into a repository of `target`.
    pub fn fits(self, target: Architecture) -> bool {
        self == Architecture::Any || self == target
    }
}

impl FromStr for Architecture {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ARCHITECTURES
            .iter()
            .find(|(_, name)| *name == s)
            .map(|(arch, _)| *arch)
            .ok_or_else(|| Error::UnknownArchitecture(s.to_owned()))
    }
}

impl TryFrom<String> for Architecture {
    type Error = Error;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Architecture> for String {
    fn from(arch: Architecture) -> Self {
        arch.as_str().to_owned()
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_names() {
        for (arch, name) in ARCHITECTURES {
            assert_eq!(arch.to_string(), name);
            assert_eq!(name.parse::<Architecture>().unwrap(), arch);
        }
        assert!("x86-64".parse::<Architecture>().is_err());
    }

    #[test]
    fn test_fits() {
        assert!(Architecture::Any.fits(Architecture::X86_64));
        assert!(Architecture::X86_64.fits(Architecture::X86_64));
        assert!(!Architecture::Aarch64.fits(Architecture::X86_64));
    }
}
