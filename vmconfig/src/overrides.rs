use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CpuCount(u16);

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MemorySize(u64); // In MiB

impl CpuCount {
    pub fn new(count: u16) -> Self {
        Self(count)
    }

    pub fn get(&self) -> u16 {
        self.0
    }
}

impl MemorySize {
    pub fn new(mib: u64) -> Self {
        Self(mib)
    }

    pub fn get(&self) -> u64 {
        self.0
    }

    pub fn round_up_pow_of_2(self) -> Self {
        Self(self.0.next_power_of_two())
    }
}

impl Display for CpuCount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Display for MemorySize {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Parses a positive decimal integer with nothing but ASCII digits.
fn parse_positive<T>(value: &str) -> Option<T>
where
    T: std::str::FromStr + Default + PartialEq,
{
    let value = value.trim();
    if value.is_empty() || !value.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    value.parse::<T>().ok().filter(|v| *v != T::default())
}

pub fn parse_vcpus<'a, I>(values: I) -> Result<Vec<CpuCount>, ConfigError>
where
    I: IntoIterator<Item = &'a str>,
{
    values
        .into_iter()
        .map(|value| {
            parse_positive::<u16>(value)
                .map(CpuCount)
                .ok_or_else(|| ConfigError::InvalidVcpu {
                    value: value.to_owned(),
                })
        })
        .collect()
}

/// Memory sizes are capped at `u32::MAX` MiB so rounding never overflows.
pub fn parse_memory<'a, I>(values: I) -> Result<Vec<MemorySize>, ConfigError>
where
    I: IntoIterator<Item = &'a str>,
{
    values
        .into_iter()
        .map(|value| {
            parse_positive::<u32>(value)
                .map(|mib| MemorySize(u64::from(mib)))
                .ok_or_else(|| ConfigError::InvalidMemory {
                    value: value.to_owned(),
                })
        })
        .collect()
}

/// Rounds every size up to the next power of two, noting each change.
pub fn mem_to_pow_of_2(memory: &mut [MemorySize]) {
    for mem in memory.iter_mut() {
        let rounded = mem.round_up_pow_of_2();
        if rounded != *mem {
            info!("rounding up memory: {mem} -> {rounded}");
            *mem = rounded;
        }
    }
}

/// Resource overrides applied uniformly to every vm set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Overrides {
    pub vcpu: Vec<CpuCount>,
    pub memory: Vec<MemorySize>,
}

impl Overrides {
    /// Parses comma separated lists, validating both before rounding memory.
    pub fn parse(vcpu: &str, memory: &str) -> Result<Self, ConfigError> {
        let mut memory = parse_memory(memory.split(','))?;
        let vcpu = parse_vcpus(vcpu.split(','))?;
        mem_to_pow_of_2(&mut memory);
        Ok(Self { vcpu, memory })
    }
}
