use indexmap::IndexMap;
use kmt_catalog::{Arch, Recipe, VmArch};
use kmt_vmdef::is_legacy_version;

use crate::{document::KernelEntry, error::ConfigError, template::Template};

/// Name of the reference template set for a recipe on a concrete arch.
pub fn template_name(arch: VmArch, recipe: Recipe, host: Arch) -> String {
    format!("{recipe}_{}", arch.resolve(host))
}

/// Synthesized descriptor for a packaged custom kernel.
pub fn custom_kernel_config(version: &str, arch: VmArch, host: Arch) -> KernelEntry {
    let arch = arch.resolve(host);

    let mut extra_params = IndexMap::new();
    extra_params.insert("console".to_owned(), arch.console().to_owned());
    if is_legacy_version(version) {
        extra_params.insert("systemd.unified_cgroup_hierarchy".to_owned(), "0".to_owned());
    }

    let mut kernel = KernelEntry::new(version);
    kernel.dir = Some(format!("kernel-{version}.{arch}.pkg"));
    kernel.extra_params = Some(extra_params);
    kernel
}

/// Kernel descriptor for one VM of a set.
///
/// Distro kernels come from the reference template; a missing entry means
/// the template and the catalog disagree.
pub fn get_kernel_config(
    template: &Template,
    recipe: Recipe,
    version: &str,
    arch: VmArch,
    host: Arch,
) -> Result<KernelEntry, ConfigError> {
    match recipe {
        Recipe::Custom => Ok(custom_kernel_config(version, arch, host)),
        Recipe::Distro => {
            let setname = template_name(arch, recipe, host);
            template
                .kernel(&setname, version)
                .ok_or_else(|| ConfigError::NoKernelInSet {
                    version: version.to_owned(),
                    set: setname,
                })
        }
    }
}
