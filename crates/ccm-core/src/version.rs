//! Server version parsing and comparison.

use std::cmp::Ordering;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::{Error, Result};

static BASE_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<property\s+name="base\.version"\s+value="([^"]+)""#)
        .unwrap_or_else(|e| panic!("invalid base.version pattern: {e}"))
});

/// A server release version such as `3.11.4` or `4.0-beta2`.
///
/// Ordering compares the numeric triple; a pre-release suffix sorts before
/// the plain release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
    pub suffix: Option<String>,
}

impl ServerVersion {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            suffix: None,
        }
    }
}

impl FromStr for ServerVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (numbers, suffix) = match s.split_once('-') {
            Some((n, suf)) => (n, Some(suf.to_string())),
            None => (s, None),
        };
        let mut parts = numbers.split('.');
        let mut next = |required: bool| -> Result<u32> {
            match parts.next() {
                Some(p) => p
                    .parse()
                    .map_err(|_| Error::invalid_data(format!("invalid version: {s}"))),
                None if required => Err(Error::invalid_data(format!("invalid version: {s}"))),
                None => Ok(0),
            }
        };
        let major = next(true)?;
        let minor = next(false)?;
        let patch = next(false)?;
        Ok(Self {
            major,
            minor,
            patch,
            suffix,
        })
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(suffix) = &self.suffix {
            write!(f, "-{suffix}")?;
        }
        Ok(())
    }
}

impl Ord for ServerVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.suffix, &other.suffix) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl PartialOrd for ServerVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Read the version declared in an install directory's `build.xml`.
///
/// Works without a running node.
pub fn version_from_build(install_dir: &Path) -> Result<ServerVersion> {
    let path = install_dir.join("build.xml");
    let content = std::fs::read_to_string(&path).map_err(|e| Error::io_with_path(e, &path))?;
    let captures = BASE_VERSION.captures(&content).ok_or_else(|| {
        Error::invalid_data(format!("no base.version property in {}", path.display()))
    })?;
    captures[1].parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full() {
        let v: ServerVersion = "3.11.4".parse().unwrap();
        assert_eq!(v, ServerVersion::new(3, 11, 4));
        assert_eq!(v.to_string(), "3.11.4");
    }

    #[test]
    fn test_parse_short_and_suffix() {
        let v: ServerVersion = "1.2".parse().unwrap();
        assert_eq!(v, ServerVersion::new(1, 2, 0));

        let v: ServerVersion = "4.0-beta2".parse().unwrap();
        assert_eq!(v.suffix.as_deref(), Some("beta2"));
        assert_eq!(v.to_string(), "4.0.0-beta2");
    }

    #[test]
    fn test_parse_invalid() {
        assert!("".parse::<ServerVersion>().is_err());
        assert!("three".parse::<ServerVersion>().is_err());
        assert!("3.x".parse::<ServerVersion>().is_err());
    }

    #[test]
    fn test_ordering() {
        let v = |s: &str| s.parse::<ServerVersion>().unwrap();
        assert!(v("1.1.12") < v("1.2"));
        assert!(v("3.11") < v("3.12"));
        assert!(v("4.0-beta2") < v("4.0"));
        assert!(v("4.0.1") > v("4.0"));
    }

    #[test]
    fn test_version_from_build() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("build.xml"),
            r#"<project name="apache-cassandra">
                 <property name="base.version" value="3.11.10"/>
               </project>"#,
        )
        .unwrap();
        let v = version_from_build(dir.path()).unwrap();
        assert_eq!(v, ServerVersion::new(3, 11, 10));
    }

    #[test]
    fn test_version_from_build_missing() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(matches!(
            version_from_build(dir.path()),
            Err(Error::IoPath { .. })
        ));
        std::fs::write(dir.path().join("build.xml"), "<project/>").unwrap();
        assert!(matches!(
            version_from_build(dir.path()),
            Err(Error::InvalidData(_))
        ));
    }
}
