use displaydoc::Display;

use crate::document::{ConfigDocument, VmSetRecord};

/// One structural difference between two documents.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ConfigChange {
    /// + vmset {set}
    VmSetAdded { set: String },
    /// - vmset {set}
    VmSetRemoved { set: String },
    /// + kernel {tag} in {set}
    KernelAdded { set: String, tag: String },
    /// - kernel {tag} in {set}
    KernelRemoved { set: String, tag: String },
    /// ~ {field} of {set}
    FieldChanged { set: String, field: &'static str },
}

impl ConfigChange {
    pub fn set(&self) -> &str {
        match self {
            ConfigChange::VmSetAdded { set }
            | ConfigChange::VmSetRemoved { set }
            | ConfigChange::KernelAdded { set, .. }
            | ConfigChange::KernelRemoved { set, .. }
            | ConfigChange::FieldChanged { set, .. } => set,
        }
    }
}

/// Set- and kernel-level differences from `old` to `new`.
pub fn diff(old: &ConfigDocument, new: &ConfigDocument) -> Vec<ConfigChange> {
    let mut changes = Vec::new();

    for old_set in &old.vmsets {
        if !new.vmset_exists(&old_set.name) {
            changes.push(ConfigChange::VmSetRemoved {
                set: old_set.name.clone(),
            });
        }
    }

    for new_set in &new.vmsets {
        match old.vmset(&new_set.name) {
            None => {
                changes.push(ConfigChange::VmSetAdded {
                    set: new_set.name.clone(),
                });
                changes.extend(new_set.kernels.iter().map(|k| ConfigChange::KernelAdded {
                    set: new_set.name.clone(),
                    tag: k.tag.clone(),
                }));
            }
            Some(old_set) => diff_vmset(old_set, new_set, &mut changes),
        }
    }

    changes
}

fn diff_vmset(old: &VmSetRecord, new: &VmSetRecord, changes: &mut Vec<ConfigChange>) {
    let set = &new.name;

    for kernel in &old.kernels {
        if !new.kernel_in_vmset(kernel) {
            changes.push(ConfigChange::KernelRemoved {
                set: set.clone(),
                tag: kernel.tag.clone(),
            });
        }
    }
    for kernel in &new.kernels {
        if !old.kernel_in_vmset(kernel) {
            changes.push(ConfigChange::KernelAdded {
                set: set.clone(),
                tag: kernel.tag.clone(),
            });
        } else if old.kernels.iter().find(|k| k.tag == kernel.tag) != Some(kernel) {
            changes.push(ConfigChange::FieldChanged {
                set: set.clone(),
                field: "kernels",
            });
        }
    }

    let fields = [
        ("recipe", old.recipe != new.recipe),
        ("arch", old.arch != new.arch),
        ("image", old.image != new.image),
        ("vcpu", old.vcpu != new.vcpu),
        ("memory", old.memory != new.memory),
        ("disks", old.disks != new.disks),
        ("console_type", old.console_type != new.console_type),
    ];
    for (field, changed) in fields {
        if changed {
            changes.push(ConfigChange::FieldChanged {
                set: set.clone(),
                field,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        document::KernelEntry,
        overrides::{CpuCount, MemorySize},
    };
    use kmt_catalog::{Recipe, VmArch};

    fn record(name: &str, tags: &[&str]) -> VmSetRecord {
        let mut record = VmSetRecord::new(name, Recipe::Distro, VmArch::X86_64);
        record.kernels = tags.iter().map(|tag| KernelEntry::new(*tag)).collect();
        record
    }

    #[test]
    fn identical_documents_have_no_changes() {
        let mut doc = ConfigDocument::empty();
        doc.vmsets.push(record("distro_x86_64", &["debian_12"]));
        assert!(diff(&doc, &doc.clone()).is_empty());
    }

    #[test]
    fn reports_added_sets_kernels_and_fields() {
        let mut old = ConfigDocument::empty();
        old.vmsets.push(record("distro_x86_64", &["debian_12"]));

        let mut new = old.clone();
        new.vmsets[0].kernels.push(KernelEntry::new("ubuntu_22.04"));
        new.vmsets[0].vcpu = Some(vec![CpuCount::new(4)]);
        new.vmsets[0].memory = Some(vec![MemorySize::new(512)]);
        new.vmsets.push(record("distro_arm64", &["fedora_38"]));

        assert_eq!(
            diff(&old, &new),
            vec![
                ConfigChange::KernelAdded {
                    set: "distro_x86_64".into(),
                    tag: "ubuntu_22.04".into()
                },
                ConfigChange::FieldChanged {
                    set: "distro_x86_64".into(),
                    field: "vcpu"
                },
                ConfigChange::FieldChanged {
                    set: "distro_x86_64".into(),
                    field: "memory"
                },
                ConfigChange::VmSetAdded {
                    set: "distro_arm64".into()
                },
                ConfigChange::KernelAdded {
                    set: "distro_arm64".into(),
                    tag: "fedora_38".into()
                },
            ]
        );
    }

    #[test]
    fn change_display() {
        let change = ConfigChange::KernelAdded {
            set: "distro_x86_64".into(),
            tag: "debian_12".into(),
        };
        assert_eq!(change.to_string(), "+ kernel debian_12 in distro_x86_64");
    }
}
