//! Platform API and lifecycle versions

use crate::error::{OsrcError, OsrcResult};
use std::fmt;

/// A `major.minor` API version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApiVersion {
    major: u32,
    minor: u32,
}

impl ApiVersion {
    pub const fn of(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    pub fn parse(value: &str) -> OsrcResult<Self> {
        let invalid = |reason: &str| OsrcError::VersionInvalid {
            value: value.to_string(),
            reason: reason.to_string(),
        };
        let (major, minor) = value
            .trim()
            .strip_prefix('v')
            .unwrap_or(value.trim())
            .split_once('.')
            .ok_or_else(|| invalid("expected major.minor"))?;
        Ok(Self {
            major: major.parse().map_err(|_| invalid("major is not a number"))?,
            minor: minor.parse().map_err(|_| invalid("minor is not a number"))?,
        })
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    /// Whether an implementation of this version can serve `other`.
    ///
    /// Pre-1.0 versions only support themselves; otherwise the major must
    /// match and the minor must be at least `other`'s.
    pub fn supports(&self, other: &ApiVersion) -> bool {
        if self == other {
            return true;
        }
        if self.major == 0 || self.major != other.major {
            return false;
        }
        self.minor >= other.minor
    }

    pub fn supports_any(&self, others: &[ApiVersion]) -> bool {
        others.iter().any(|other| self.supports(other))
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// An ordered set of API versions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiVersions(Vec<ApiVersion>);

impl ApiVersions {
    /// Platform API versions this crate drives
    pub fn supported_platforms() -> Self {
        Self((3..=8).map(|minor| ApiVersion::of(0, minor)).collect())
    }

    pub fn of(versions: &[ApiVersion]) -> Self {
        Self(versions.to_vec())
    }

    /// Newest of our versions that any of `others` supports
    pub fn find_latest_supported(&self, others: &[String]) -> OsrcResult<ApiVersion> {
        let parsed = others
            .iter()
            .map(|other| ApiVersion::parse(other))
            .collect::<OsrcResult<Vec<_>>>()?;
        self.0
            .iter()
            .rev()
            .find(|version| parsed.iter().rev().any(|other| other.supports(version)))
            .copied()
            .ok_or_else(|| OsrcError::PlatformApiUnsupported {
                detected: others.join(","),
                supported: self.to_string(),
            })
    }
}

impl fmt::Display for ApiVersions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let versions: Vec<String> = self.0.iter().map(ApiVersion::to_string).collect();
        f.write_str(&versions.join(","))
    }
}

/// Version of the lifecycle shipped in a builder
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct LifecycleVersion(semver::Version);

impl LifecycleVersion {
    /// Parse `[v]major[.minor[.patch]]`, padding missing components with zero
    pub fn parse(value: &str) -> OsrcResult<Self> {
        let trimmed = value.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let mut components: Vec<&str> = trimmed.split('.').collect();
        if components.len() > 3 {
            return Err(OsrcError::VersionInvalid {
                value: value.to_string(),
                reason: "expected at most three components".to_string(),
            });
        }
        while components.len() < 3 {
            components.push("0");
        }
        semver::Version::parse(&components.join("."))
            .map(Self)
            .map_err(|e| OsrcError::VersionInvalid {
                value: value.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn is_equal_or_greater_than(&self, other: &LifecycleVersion) -> bool {
        self >= other
    }
}

impl fmt::Display for LifecycleVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}
