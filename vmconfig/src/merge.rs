use kmt_catalog::Recipe;
use kmt_ctx::Context;
use kmt_vmset::{VmSet, VmSets};
use tracing::{debug, info};

use crate::{
    document::{CONSOLE_FILE, ConfigDocument, ImageEntry, VmSetRecord},
    error::ConfigError,
    kernel::{get_kernel_config, template_name},
    local::image_source_to_path,
    overrides::Overrides,
    template::Template,
};

#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub overrides: Overrides,
    /// Redirect every console to a file, for unattended runs.
    pub ci: bool,
}

/// Merges grouped VM sets into an existing document without duplicating
/// sets (by name) or kernels (by tag).
pub struct Merger<'a> {
    ctx: &'a Context,
    template: &'a Template,
}

impl<'a> Merger<'a> {
    pub fn new(ctx: &'a Context, template: &'a Template) -> Self {
        Self { ctx, template }
    }

    pub fn merge(
        &self,
        mut vm_config: ConfigDocument,
        vmsets: &VmSets,
        options: &MergeOptions,
    ) -> Result<ConfigDocument, ConfigError> {
        for vmset in vmsets.iter() {
            self.add_vmset(&mut vm_config, vmset);
        }

        for vmset in vmsets.iter() {
            for version in &vmset.vms {
                let kernel = get_kernel_config(
                    self.template,
                    vmset.recipe,
                    version,
                    vmset.arch,
                    self.ctx.host_arch(),
                )?;
                if vm_config.add_kernel(&vmset.name, kernel)? {
                    debug!(set = %vmset.name, kernel = %version, "added kernel");
                } else {
                    debug!(set = %vmset.name, kernel = %version, "kernel already present");
                }
            }
        }

        let rootfs_dir = self.ctx.paths().rootfs_dir();
        for record in vm_config.vmsets.iter_mut() {
            record.vcpu = Some(options.overrides.vcpu.clone());
            record.memory = Some(options.overrides.memory.clone());

            if record.recipe_kind() == Some(Recipe::Distro) {
                self.add_disks(record);
            }

            if record.arch.is_local() {
                image_source_to_path(record, &rootfs_dir);
            }

            if options.ci {
                record.console_type = Some(CONSOLE_FILE.to_owned());
            }
        }

        Ok(vm_config)
    }

    fn add_vmset(&self, vm_config: &mut ConfigDocument, vmset: &VmSet) {
        if vm_config.vmset_exists(&vmset.name) {
            return;
        }

        let record = match vmset.recipe {
            Recipe::Custom => self.custom_vmset(vmset),
            Recipe::Distro => VmSetRecord::new(&vmset.name, vmset.recipe, vmset.arch),
        };

        info!(set = %vmset.name, "adding vm set");
        vm_config.vmsets.push(record);
    }

    /// Custom sets boot a debian rootfs; buster for legacy kernels, bullseye otherwise.
    fn custom_vmset(&self, vmset: &VmSet) -> VmSetRecord {
        let arch = vmset.arch.resolve(self.ctx.host_arch());
        let image_path = if vmset.has_legacy_kernel() {
            format!("custom-buster.{arch}.qcow2")
        } else {
            format!("custom-bullseye.{arch}.qcow2")
        };

        let mut record = VmSetRecord::new(&vmset.name, vmset.recipe, vmset.arch);
        record.image = Some(ImageEntry {
            image_source: format!("{}{image_path}", self.ctx.rootfs_url()),
            image_path,
            extra: Default::default(),
        });
        record
    }

    fn add_disks(&self, record: &mut VmSetRecord) {
        let Some(recipe) = record.recipe_kind() else {
            return;
        };
        let tname = template_name(record.arch, recipe, self.ctx.host_arch());
        if let Some(disks) = self.template.disks(&tname) {
            record.disks = Some(disks);
        }
    }
}
