use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;

use crate::{
    document::{DiskEntry, KernelEntry},
    error::ConfigError,
};

/// Read-only reference template with canonical kernel and disk metadata,
/// keyed by `{recipe}_{arch}` set names.
///
/// Lookups hand out owned copies; nothing outside can mutate the template.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Template {
    #[serde(default)]
    vmsets: Vec<TemplateVmSet>,
}

#[derive(Debug, Clone, Deserialize)]
struct TemplateVmSet {
    name: String,
    #[serde(default)]
    disks: Vec<DiskEntry>,
    #[serde(default)]
    kernels: Vec<KernelEntry>,
}

impl Template {
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        serde_json::from_value(value).map_err(ConfigError::ParseTemplate)
    }

    fn vmset(&self, name: &str) -> Option<&TemplateVmSet> {
        self.vmsets.iter().find(|vmset| vmset.name == name)
    }

    pub fn has_vmset(&self, name: &str) -> bool {
        self.vmset(name).is_some()
    }

    pub fn kernel(&self, setname: &str, tag: &str) -> Option<KernelEntry> {
        self.vmset(setname)?
            .kernels
            .iter()
            .find(|kernel| kernel.tag == tag)
            .cloned()
    }

    pub fn disks(&self, setname: &str) -> Option<Vec<DiskEntry>> {
        self.vmset(setname).map(|vmset| vmset.disks.clone())
    }

    pub fn kernel_tags(&self, setname: &str) -> Vec<String> {
        self.vmset(setname)
            .map(|vmset| vmset.kernels.iter().map(|k| k.tag.clone()).collect())
            .unwrap_or_default()
    }
}

impl FromStr for Template {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s).map_err(ConfigError::ParseTemplate)
    }
}
