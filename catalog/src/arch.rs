use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Informal architecture names and the architecture they stand for.
pub const ARCH_ALIASES: &[(&str, Arch)] = &[
    ("amd64", Arch::X86_64),
    ("x86", Arch::X86_64),
    ("x86_64", Arch::X86_64),
    ("arm64", Arch::Arm64),
    ("arm", Arch::Arm64),
    ("aarch64", Arch::Arm64),
];

/// Sentinel meaning "whatever the invoking host runs on".
pub const LOCAL_ARCH: &str = "local";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown architecture: {0}")]
pub struct UnknownArch(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Arch {
    #[serde(rename = "x86_64")]
    X86_64,
    #[serde(rename = "arm64")]
    Arm64,
}

impl Arch {
    pub const ALL: [Arch; 2] = [Arch::X86_64, Arch::Arm64];

    pub fn from_alias(alias: &str) -> Option<Arch> {
        ARCH_ALIASES
            .iter()
            .find(|(name, _)| *name == alias)
            .map(|(_, arch)| *arch)
    }

    /// Serial console the guest kernel should log to.
    pub fn console(&self) -> &'static str {
        match self {
            Arch::X86_64 => "ttyS0",
            Arch::Arm64 => "ttyAMA0",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Arch::X86_64 => "x86_64",
            Arch::Arm64 => "arm64",
        }
    }
}

impl Display for Arch {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Arch {
    type Err = UnknownArch;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Arch::from_alias(s).ok_or_else(|| UnknownArch(s.to_owned()))
    }
}

/// Architecture as requested for a VM: either concrete, or deferred to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VmArch {
    #[serde(rename = "x86_64")]
    X86_64,
    #[serde(rename = "arm64")]
    Arm64,
    #[serde(rename = "local")]
    Local,
}

impl VmArch {
    pub fn is_local(&self) -> bool {
        matches!(self, VmArch::Local)
    }

    pub fn resolve(&self, host: Arch) -> Arch {
        match self {
            VmArch::X86_64 => Arch::X86_64,
            VmArch::Arm64 => Arch::Arm64,
            VmArch::Local => host,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VmArch::X86_64 => "x86_64",
            VmArch::Arm64 => "arm64",
            VmArch::Local => LOCAL_ARCH,
        }
    }
}

impl From<Arch> for VmArch {
    fn from(arch: Arch) -> Self {
        match arch {
            Arch::X86_64 => VmArch::X86_64,
            Arch::Arm64 => VmArch::Arm64,
        }
    }
}

impl Display for VmArch {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VmArch {
    type Err = UnknownArch;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == LOCAL_ARCH {
            return Ok(VmArch::Local);
        }
        s.parse::<Arch>().map(VmArch::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_to_two_arches() {
        for alias in ["amd64", "x86", "x86_64"] {
            assert_eq!(Arch::from_alias(alias), Some(Arch::X86_64));
        }
        for alias in ["arm64", "arm", "aarch64"] {
            assert_eq!(Arch::from_alias(alias), Some(Arch::Arm64));
        }
        assert_eq!(Arch::from_alias("riscv64"), None);
    }

    #[test]
    fn local_defers_to_host() {
        assert_eq!(VmArch::Local.resolve(Arch::Arm64), Arch::Arm64);
        assert_eq!(VmArch::X86_64.resolve(Arch::Arm64), Arch::X86_64);
        assert_eq!("local".parse::<VmArch>(), Ok(VmArch::Local));
        assert_eq!("aarch64".parse::<VmArch>(), Ok(VmArch::Arm64));
    }

    #[test]
    fn serializes_canonical_names() {
        let json = serde_json::to_string(&[VmArch::X86_64, VmArch::Local]).unwrap();
        assert_eq!(json, r#"["x86_64","local"]"#);
    }
}
