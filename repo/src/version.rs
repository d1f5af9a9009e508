use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Error;

/// A full package version: `[epoch:]pkgver-pkgrel`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version(String);

impl Version {
    pub fn new(version: &str) -> Result<Self, Error> {
        let invalid = || Error::InvalidVersion(version.to_owned());

        let rest = match version.split_once(':') {
            Some((epoch, rest)) => {
                if epoch.is_empty() || !epoch.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                rest
            }
            None => version,
        };
        let (pkgver, pkgrel) = rest.rsplit_once('-').ok_or_else(invalid)?;
        let pkgver_ok = !pkgver.is_empty()
            && pkgver
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '~'));
        let pkgrel_ok = is_pkgrel(pkgrel);
        if !pkgver_ok || !pkgrel_ok {
            return Err(invalid());
        }
        Ok(Self(version.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_newer_than(&self, other: &Version) -> bool {
        vercmp(&self.0, &other.0) == Ordering::Greater
    }

    pub fn is_older_than(&self, other: &Version) -> bool {
        vercmp(&self.0, &other.0) == Ordering::Less
    }
}

// pkgrel is a number, optionally followed by a single ".<number>" sub-release.
fn is_pkgrel(s: &str) -> bool {
    let mut parts = s.splitn(2, '.');
    let all_digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
    match (parts.next(), parts.next()) {
        (Some(major), None) => all_digits(major),
        (Some(major), Some(minor)) => all_digits(major) && all_digits(minor),
        _ => false,
    }
}

impl TryFrom<String> for Version {
    type Error = Error;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl From<Version> for String {
    fn from(v: Version) -> Self {
        v.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compare two full versions the way pacman does.
pub fn vercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let (epoch_a, ver_a, rel_a) = split_evr(a);
    let (epoch_b, ver_b, rel_b) = split_evr(b);

    rpmvercmp(epoch_a, epoch_b)
        .then_with(|| rpmvercmp(ver_a, ver_b))
        .then_with(|| match (rel_a, rel_b) {
            (Some(rel_a), Some(rel_b)) => rpmvercmp(rel_a, rel_b),
            _ => Ordering::Equal,
        })
}

fn split_evr(evr: &str) -> (&str, &str, Option<&str>) {
    let digits = evr.bytes().take_while(u8::is_ascii_digit).count();
    let (epoch, rest) = if evr.as_bytes().get(digits) == Some(&b':') {
        let epoch = if digits == 0 { "0" } else { &evr[..digits] };
        (epoch, &evr[digits + 1..])
    } else {
        ("0", evr)
    };
    match rest.rsplit_once('-') {
        Some((version, release)) => (epoch, version, Some(release)),
        None => (epoch, rest, None),
    }
}

/// Segment-wise comparison of alternating numeric and alphabetic runs.
fn rpmvercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let at = |s: &[u8], i: usize| s.get(i).copied().unwrap_or(0);

    let (mut one, mut two) = (0, 0);
    let (mut ptr1, mut ptr2) = (0, 0);

    while one < a.len() && two < b.len() {
        while one < a.len() && !a[one].is_ascii_alphanumeric() {
            one += 1;
        }
        while two < b.len() && !b[two].is_ascii_alphanumeric() {
            two += 1;
        }
        if one >= a.len() || two >= b.len() {
            break;
        }
        // differing separator lengths end the comparison
        if one - ptr1 != two - ptr2 {
            return (one - ptr1).cmp(&(two - ptr2));
        }

        ptr1 = one;
        ptr2 = two;
        let isnum = a[ptr1].is_ascii_digit();
        if isnum {
            while ptr1 < a.len() && a[ptr1].is_ascii_digit() {
                ptr1 += 1;
            }
            while ptr2 < b.len() && b[ptr2].is_ascii_digit() {
                ptr2 += 1;
            }
        } else {
            while ptr1 < a.len() && a[ptr1].is_ascii_alphabetic() {
                ptr1 += 1;
            }
            while ptr2 < b.len() && b[ptr2].is_ascii_alphabetic() {
                ptr2 += 1;
            }
        }

        // segments of different type: numeric beats alpha
        if two == ptr2 {
            return if isnum {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let mut seg1 = &a[one..ptr1];
        let mut seg2 = &b[two..ptr2];
        if isnum {
            while seg1.first() == Some(&b'0') {
                seg1 = &seg1[1..];
            }
            while seg2.first() == Some(&b'0') {
                seg2 = &seg2[1..];
            }
            match seg1.len().cmp(&seg2.len()) {
                Ordering::Equal => {}
                other => return other,
            }
        }
        match seg1.cmp(seg2) {
            Ordering::Equal => {}
            other => return other,
        }

        one = ptr1;
        two = ptr2;
    }

    if one >= a.len() && two >= b.len() {
        return Ordering::Equal;
    }

    // a remaining alpha segment never beats an empty one
    let (rest1, rest2) = (at(a, one), at(b, two));
    if (rest1 == 0 && !rest2.is_ascii_alphabetic()) || rest1.is_ascii_alphabetic() {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_validation() {
        assert!(Version::new("1.0-1").is_ok());
        assert!(Version::new("2:1.0.3_rc1-2.1").is_ok());
        assert!(Version::new("1.0").is_err());
        assert!(Version::new("1.0-a").is_err());
        assert!(Version::new(":1.0-1").is_err());
        assert!(Version::new("1.0 beta-1").is_err());
    }

    #[test]
    fn test_vercmp() {
        assert_eq!(vercmp("1.0-1", "1.0-1"), Ordering::Equal);
        assert_eq!(vercmp("1.0-1", "1.0-2"), Ordering::Less);
        assert_eq!(vercmp("1.0.1-1", "1.0-1"), Ordering::Greater);
        assert_eq!(vercmp("1.0a-1", "1.0-1"), Ordering::Less);
        assert_eq!(vercmp("1.0-1", "1.0rc1-1"), Ordering::Greater);
        assert_eq!(vercmp("1:1.0-1", "2.0-1"), Ordering::Greater);
        assert_eq!(vercmp("1.010-1", "1.9-1"), Ordering::Greater);
        assert_eq!(vercmp("1.0-1", "1.0-1.1"), Ordering::Less);
        assert_eq!(vercmp("1.0", "1.0-5"), Ordering::Equal);
    }

    #[test]
    fn test_newer_older() -> Result<(), Error> {
        let old = Version::new("1.2.3-1")?;
        let new = Version::new("1.2.10-1")?;
        assert!(new.is_newer_than(&old));
        assert!(old.is_older_than(&new));
        assert!(!old.is_newer_than(&old));
        Ok(())
    }
}
