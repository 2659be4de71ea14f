use indexmap::IndexMap;
use kmt_catalog::{Recipe, VmArch};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Serializer, Value, ser::PrettyFormatter};

use crate::{
    error::ConfigError,
    overrides::{CpuCount, MemorySize},
};

/// Console redirection used for unattended runs.
pub const CONSOLE_FILE: &str = "file";

/// The persisted `vmconfig.json` of a stack.
///
/// Fields this tool does not know about are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigDocument {
    #[serde(default)]
    pub vmsets: Vec<VmSetRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VmSetRecord {
    pub name: String,
    /// `{recipe}-{arch}`, e.g. `distro-x86_64`.
    pub recipe: String,
    pub arch: VmArch,
    #[serde(default)]
    pub kernels: Vec<KernelEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vcpu: Option<Vec<CpuCount>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<Vec<MemorySize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disks: Option<Vec<DiskEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub console_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelEntry {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_params: Option<IndexMap<String, String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageEntry {
    pub image_path: String,
    pub image_source: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskEntry {
    pub source: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ConfigDocument {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn vmset_exists(&self, name: &str) -> bool {
        self.vmsets.iter().any(|vmset| vmset.name == name)
    }

    pub fn vmset(&self, name: &str) -> Option<&VmSetRecord> {
        self.vmsets.iter().find(|vmset| vmset.name == name)
    }

    pub fn vmset_mut(&mut self, name: &str) -> Option<&mut VmSetRecord> {
        self.vmsets.iter_mut().find(|vmset| vmset.name == name)
    }

    /// Appends `kernel` to the named set unless a kernel with its tag is there already.
    ///
    /// Returns whether the kernel was added.
    pub fn add_kernel(&mut self, setname: &str, kernel: KernelEntry) -> Result<bool, ConfigError> {
        let vmset = self
            .vmset_mut(setname)
            .ok_or_else(|| ConfigError::VmSetNotFound {
                set: setname.to_owned(),
            })?;
        if vmset.kernel_in_vmset(&kernel) {
            return Ok(false);
        }
        vmset.kernels.push(kernel);
        Ok(true)
    }

    /// Canonical on-disk form: four-space indented JSON with a trailing newline.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        let mut out = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut serializer = Serializer::with_formatter(&mut out, formatter);
        self.serialize(&mut serializer)?;
        out.push(b'\n');
        // serde_json only ever emits valid utf-8
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

impl VmSetRecord {
    pub fn new(name: impl Into<String>, recipe: Recipe, arch: VmArch) -> Self {
        Self {
            name: name.into(),
            recipe: format!("{recipe}-{arch}"),
            arch,
            kernels: Vec::new(),
            image: None,
            vcpu: None,
            memory: None,
            disks: None,
            console_type: None,
            extra: Map::new(),
        }
    }

    /// The recipe part of the `{recipe}-{arch}` field.
    pub fn recipe_kind(&self) -> Option<Recipe> {
        self.recipe.split('-').next()?.parse().ok()
    }

    pub fn kernel_in_vmset(&self, kernel: &KernelEntry) -> bool {
        self.kernels.iter().any(|k| k.tag == kernel.tag)
    }

    pub fn kernel_tags(&self) -> Vec<&str> {
        self.kernels.iter().map(|k| k.tag.as_str()).collect()
    }
}

impl KernelEntry {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            dir: None,
            image_source: None,
            extra_params: None,
            extra: Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn add_kernel_is_tag_based() {
        let mut doc = ConfigDocument::empty();
        doc.vmsets
            .push(VmSetRecord::new("distro_x86_64", Recipe::Distro, VmArch::X86_64));

        let mut first = KernelEntry::new("ubuntu_22.04");
        first.image_source = Some("https://a/ubuntu.qcow2.xz".to_string());
        let mut second = KernelEntry::new("ubuntu_22.04");
        second.image_source = Some("https://b/other.qcow2".to_string());

        assert!(doc.add_kernel("distro_x86_64", first).unwrap());
        assert!(!doc.add_kernel("distro_x86_64", second).unwrap());
        let set = doc.vmset("distro_x86_64").unwrap();
        assert_eq!(set.kernels.len(), 1);
        assert_eq!(
            set.kernels[0].image_source.as_deref(),
            Some("https://a/ubuntu.qcow2.xz")
        );
    }

    #[test]
    fn add_kernel_to_missing_set_fails() {
        let mut doc = ConfigDocument::empty();
        let err = doc
            .add_kernel("nope", KernelEntry::new("5.10"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::VmSetNotFound { set } if set == "nope"));
    }

    #[test]
    fn vmset_exists_is_name_based() {
        let mut doc = ConfigDocument::empty();
        doc.vmsets
            .push(VmSetRecord::new("distro_arm64", Recipe::Distro, VmArch::Arm64));
        assert!(doc.vmset_exists("distro_arm64"));
        assert!(!doc.vmset_exists("distro_x86_64"));
    }

    #[test]
    fn unknown_fields_survive_a_round_trip() {
        let input = json!({
            "ssh_key": "id_rsa",
            "vmsets": [{
                "name": "distro_x86_64",
                "recipe": "distro-x86_64",
                "arch": "x86_64",
                "machine": "q35",
                "kernels": [{ "tag": "debian_12", "image_version": "20231010" }],
                "vcpu": [4],
                "memory": [8192]
            }]
        });
        let doc: ConfigDocument = serde_json::from_value(input.clone()).unwrap();
        assert_eq!(doc.vmsets[0].recipe_kind(), Some(Recipe::Distro));
        assert_eq!(doc.vmsets[0].kernel_tags(), vec!["debian_12"]);
        assert_eq!(serde_json::to_value(&doc).unwrap(), input);
    }

    #[test]
    fn empty_document_on_disk_form() {
        assert_eq!(
            ConfigDocument::empty().to_json_pretty().unwrap(),
            "{\n    \"vmsets\": []\n}\n"
        );
    }
}
