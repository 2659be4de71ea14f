use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use thiserror::Error;

/// Supported custom kernel versions.
pub const KERNELS: &[&str] = &[
    "5.0", "5.1", "5.2", "5.3", "5.4", "5.5", "5.6", "5.7", "5.8", "5.9", "5.10", "5.11", "5.12",
    "5.13", "5.14", "5.15", "5.16", "5.17", "5.18", "5.19", "4.4", "4.5", "4.6", "4.7", "4.8",
    "4.9", "4.10", "4.11", "4.12", "4.13", "4.14", "4.15", "4.16", "4.17", "4.18", "4.19", "4.20",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid kernel version '{0}': expected MAJOR.MINOR")]
pub struct InvalidKernelVersion(pub String);

/// A `MAJOR.MINOR` custom kernel version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KernelVersion {
    pub major: u32,
    pub minor: u32,
}

impl KernelVersion {
    /// Kernels at or below 4.14 boot with cgroup v1 and have no arm64 builds.
    pub fn is_legacy(&self) -> bool {
        self.major <= 4 && self.minor <= 14
    }
}

impl FromStr for KernelVersion {
    type Err = InvalidKernelVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidKernelVersion(s.to_owned());
        let (major, minor) = s.split_once('.').ok_or_else(invalid)?;
        Ok(KernelVersion {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }
}

impl Display for KernelVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Convenience form of [`KernelVersion::is_legacy`] for raw version strings.
pub fn lte_414(version: &str) -> Result<bool, InvalidKernelVersion> {
    version.parse::<KernelVersion>().map(|v| v.is_legacy())
}
