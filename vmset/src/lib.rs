//! Grouping of normalized VM definitions into named VM sets.

use std::fmt::{self, Display, Formatter};

use indexmap::IndexMap;
use kmt_catalog::{Recipe, VmArch};
use kmt_vmdef::{NormalizedVmDef, is_legacy_version};
use thiserror::Error;
use tracing::debug;

pub const LEGACY_PREFIX: &str = "lte_414";
pub const MODERN_PREFIX: &str = "gt_414";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmSetError {
    #[error("vm '{vm}' does not belong to any vm set")]
    UnassignedVm { vm: String },
}

/// `{prefix}_{recipe}_{arch}`, or `{recipe}_{arch}` without a prefix.
pub fn vmset_name(arch: VmArch, recipe: Recipe, prefix: &str) -> String {
    if prefix.is_empty() {
        format!("{recipe}_{arch}")
    } else {
        format!("{prefix}_{recipe}_{arch}")
    }
}

/// Implicit set prefix splitting custom kernels into legacy and modern populations.
pub fn custom_version_prefix(version: &str) -> &'static str {
    if is_legacy_version(version) {
        LEGACY_PREFIX
    } else {
        MODERN_PREFIX
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VmSet {
    pub arch: VmArch,
    pub recipe: Recipe,
    pub name: String,
    pub vms: Vec<String>,
}

impl VmSet {
    pub fn new(arch: VmArch, recipe: Recipe, name: impl Into<String>) -> Self {
        Self {
            arch,
            recipe,
            name: name.into(),
            vms: Vec::new(),
        }
    }

    pub fn belongs(&self, def: &NormalizedVmDef) -> bool {
        if def.recipe == Recipe::Custom && !self.name.starts_with(custom_version_prefix(&def.version))
        {
            return false;
        }
        self.recipe == def.recipe && self.arch == def.arch
    }

    /// Attaches `def` if it belongs here. Returns whether it belongs.
    pub fn add_vm_if_belongs(&mut self, def: &NormalizedVmDef) -> bool {
        if !self.belongs(def) {
            return false;
        }
        if !self.vms.contains(&def.version) {
            self.vms.push(def.version.clone());
        }
        true
    }

    pub fn has_legacy_kernel(&self) -> bool {
        self.recipe == Recipe::Custom && self.vms.iter().any(|vm| is_legacy_version(vm))
    }
}

impl Display for VmSet {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (arch={}, vms={})",
            self.name,
            self.arch,
            self.vms.join(",")
        )
    }
}

/// VM sets keyed by name, in creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VmSets(IndexMap<String, VmSet>);

impl VmSets {
    /// Builds every set the definitions need and attaches each definition to
    /// the sets it belongs to.
    ///
    /// Custom kernels get an extra `lte_414`/`gt_414` prefix on top of the user
    /// prefixes. Sets left without any VM are not kept.
    pub fn group(defs: &[NormalizedVmDef], prefixes: &[String]) -> Result<Self, VmSetError> {
        let mut sets = VmSets::default();

        for def in defs {
            let mut def_prefixes: Vec<&str> = prefixes.iter().map(String::as_str).collect();
            if def.recipe == Recipe::Custom {
                def_prefixes.push(custom_version_prefix(&def.version));
            }
            if def_prefixes.is_empty() {
                def_prefixes.push("");
            }

            for prefix in def_prefixes {
                let name = vmset_name(def.arch, def.recipe, prefix);
                sets.0
                    .entry(name.clone())
                    .or_insert_with(|| VmSet::new(def.arch, def.recipe, name));
            }
        }

        for def in defs {
            let mut attached = false;
            for set in sets.0.values_mut() {
                attached |= set.add_vm_if_belongs(def);
            }
            if !attached {
                return Err(VmSetError::UnassignedVm {
                    vm: def.to_string(),
                });
            }
        }

        sets.0.retain(|name, set| {
            let keep = !set.vms.is_empty();
            if !keep {
                debug!(set = %name, "dropping vm set without vms");
            }
            keep
        });

        Ok(sets)
    }

    pub fn get(&self, name: &str) -> Option<&VmSet> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &VmSet> {
        self.0.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl IntoIterator for VmSets {
    type Item = VmSet;
    type IntoIter = indexmap::map::IntoValues<String, VmSet>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_values()
    }
}
