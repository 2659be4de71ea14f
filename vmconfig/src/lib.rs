//! Resolution of VM definitions into a stack's `vmconfig.json`, and the
//! non-destructive merge into an existing one.

mod changes;
mod ci;
mod document;
mod error;
mod kernel;
mod local;
mod merge;
mod overrides;
mod template;

use kmt_catalog::Catalog;
use kmt_ctx::Context;
use kmt_vmdef::{NormalizedVmDef, Normalizer, Scorer};
use kmt_vmset::VmSets;
use tracing::debug;

pub use crate::changes::{ConfigChange, diff};
pub use crate::ci::{ci_arches, list_all_distro_normalized_vms};
pub use crate::document::{
    CONSOLE_FILE, ConfigDocument, DiskEntry, ImageEntry, KernelEntry, VmSetRecord,
};
pub use crate::error::ConfigError;
pub use crate::kernel::{custom_kernel_config, get_kernel_config, template_name};
pub use crate::local::{image_source_to_path, url_to_fspath};
pub use crate::merge::{MergeOptions, Merger};
pub use crate::overrides::{
    CpuCount, MemorySize, Overrides, mem_to_pow_of_2, parse_memory, parse_vcpus,
};
pub use crate::template::Template;

/// Normalizes comma separated, user typed VM identifiers.
pub fn normalize_vms(
    catalog: &Catalog,
    scorer: &dyn Scorer,
    vms: &str,
) -> Result<Vec<NormalizedVmDef>, ConfigError> {
    let tokens: Vec<&str> = vms
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .collect();
    if tokens.is_empty() {
        return Err(ConfigError::NoVms);
    }

    let normalizer = Normalizer::new(catalog, scorer);
    let defs = normalizer.normalize_all(tokens)?;
    debug!(?defs, "normalized vm definitions");
    Ok(defs)
}

/// Groups `defs` into sets and merges them into `vm_config`.
pub fn generate_vmconfig(
    ctx: &Context,
    template: &Template,
    vm_config: ConfigDocument,
    defs: &[NormalizedVmDef],
    sets: &[String],
    options: &MergeOptions,
) -> Result<ConfigDocument, ConfigError> {
    let vmsets = VmSets::group(defs, sets)?;
    for vmset in vmsets.iter() {
        debug!(%vmset, "grouped vm set");
    }
    Merger::new(ctx, template).merge(vm_config, &vmsets, options)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use kmt_catalog::{Arch, Recipe, VmArch};
    use kmt_ctx::{Paths, parse_base_url};
    use kmt_vmdef::TokenSortRatio;
    use serde_json::json;

    use super::*;

    fn ctx(host: Arch) -> Context {
        Context::new(
            Paths::new("/kmt"),
            host,
            PathBuf::from("vmconfig-template.json"),
            parse_base_url("https://example.com/rootfs").unwrap(),
        )
    }

    fn template() -> Template {
        Template::from_value(json!({
            "vmsets": [
                {
                    "name": "distro_x86_64",
                    "arch": "x86_64",
                    "disks": [{ "source": "https://example.com/docker-x86_64.qcow2.xz", "target": "/docker" }],
                    "kernels": [
                        { "tag": "ubuntu_22.04", "image_source": "https://example.com/ubuntu-22.04-x86_64.qcow2.xz" },
                        { "tag": "debian_12", "image_source": "https://example.com/debian-12-x86_64.qcow2.xz" }
                    ]
                },
                {
                    "name": "distro_arm64",
                    "arch": "arm64",
                    "disks": [{ "source": "https://example.com/docker-arm64.qcow2.xz", "target": "/docker" }],
                    "kernels": [
                        { "tag": "ubuntu_22.04", "image_source": "https://example.com/ubuntu-22.04-arm64.qcow2.xz" }
                    ]
                }
            ]
        }))
        .unwrap()
    }

    fn options(vcpu: &str, memory: &str, ci: bool) -> MergeOptions {
        MergeOptions {
            overrides: Overrides::parse(vcpu, memory).unwrap(),
            ci,
        }
    }

    fn generate(
        ctx: &Context,
        vm_config: ConfigDocument,
        vms: &str,
        sets: &[String],
        options: &MergeOptions,
    ) -> ConfigDocument {
        let catalog = Catalog::builtin();
        let defs = normalize_vms(&catalog, &TokenSortRatio, vms).unwrap();
        generate_vmconfig(ctx, &template(), vm_config, &defs, sets, options).unwrap()
    }

    fn tags(doc: &ConfigDocument, set: &str) -> Vec<String> {
        doc.vmset(set)
            .unwrap()
            .kernel_tags()
            .into_iter()
            .map(str::to_owned)
            .collect()
    }

    #[test]
    fn fresh_config_from_fuzzy_tokens() {
        let ctx = ctx(Arch::X86_64);
        let doc = generate(
            &ctx,
            ConfigDocument::empty(),
            "ubuntu-22,5.10",
            &[],
            &options("4", "512", false),
        );

        let names: Vec<&str> = doc.vmsets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["distro_x86_64", "gt_414_custom_x86_64"]);
        assert_eq!(tags(&doc, "distro_x86_64"), vec!["ubuntu_22.04"]);
        assert_eq!(tags(&doc, "gt_414_custom_x86_64"), vec!["5.10"]);

        for set in &doc.vmsets {
            assert_eq!(set.vcpu, Some(vec![CpuCount::new(4)]));
            assert_eq!(set.memory, Some(vec![MemorySize::new(512)]));
            assert_eq!(set.console_type, None);
        }

        let distro = doc.vmset("distro_x86_64").unwrap();
        assert_eq!(distro.recipe, "distro-x86_64");
        assert_eq!(
            distro.disks.as_ref().unwrap()[0].source,
            "https://example.com/docker-x86_64.qcow2.xz"
        );
        assert!(distro.image.is_none());

        let custom = doc.vmset("gt_414_custom_x86_64").unwrap();
        let image = custom.image.as_ref().unwrap();
        assert_eq!(image.image_path, "custom-bullseye.x86_64.qcow2");
        assert_eq!(
            image.image_source,
            "https://example.com/rootfs/custom-bullseye.x86_64.qcow2"
        );
        assert!(custom.disks.is_none());
    }

    #[test]
    fn adding_a_legacy_kernel_splits_custom_sets() {
        let ctx = ctx(Arch::X86_64);
        let options = options("4", "512", false);
        let first = generate(
            &ctx,
            ConfigDocument::empty(),
            "ubuntu-22,5.10",
            &[],
            &options,
        );
        let second = generate(&ctx, first.clone(), "ubuntu-22,5.10,4.10", &[], &options);

        assert_eq!(second.vmsets.len(), 3);
        assert_eq!(tags(&second, "gt_414_custom_x86_64"), vec!["5.10"]);
        assert_eq!(tags(&second, "lte_414_custom_x86_64"), vec!["4.10"]);
        assert_eq!(
            second.vmset("distro_x86_64"),
            first.vmset("distro_x86_64")
        );

        let legacy = second.vmset("lte_414_custom_x86_64").unwrap();
        assert_eq!(
            legacy.image.as_ref().unwrap().image_path,
            "custom-buster.x86_64.qcow2"
        );
        let params = legacy.kernels[0].extra_params.as_ref().unwrap();
        assert_eq!(
            params.get("systemd.unified_cgroup_hierarchy").map(String::as_str),
            Some("0")
        );
    }

    #[test]
    fn merging_twice_is_idempotent() {
        let ctx = ctx(Arch::X86_64);
        let vms = "distro-debian_12-x86_64,ubuntu-22,5.10,4.10,custom-5.4-arm64";
        let once = generate(
            &ctx,
            ConfigDocument::empty(),
            vms,
            &[],
            &options("4", "512", false),
        );
        let twice = generate(&ctx, once.clone(), vms, &[], &options("8", "1024", false));

        assert_eq!(once.vmsets.len(), twice.vmsets.len());
        for set in &once.vmsets {
            assert_eq!(tags(&once, &set.name), tags(&twice, &set.name));
        }
        // overrides are last-write-wins, on every set
        assert!(
            twice
                .vmsets
                .iter()
                .all(|set| set.vcpu == Some(vec![CpuCount::new(8)]))
        );
    }

    #[test]
    fn existing_sets_keep_their_kernels() {
        let ctx = ctx(Arch::X86_64);
        let existing: ConfigDocument = serde_json::from_value(json!({
            "vmsets": [{
                "name": "distro_x86_64",
                "recipe": "distro-x86_64",
                "arch": "x86_64",
                "kernels": [{ "tag": "debian_12", "image_source": "https://example.com/pinned.qcow2" }]
            }]
        }))
        .unwrap();

        let doc = generate(
            &ctx,
            existing,
            "distro-debian_12-x86_64,distro-ubuntu_22.04-x86_64",
            &[],
            &options("2", "1024", false),
        );
        let set = doc.vmset("distro_x86_64").unwrap();
        assert_eq!(set.kernel_tags(), vec!["debian_12", "ubuntu_22.04"]);
        assert_eq!(
            set.kernels[0].image_source.as_deref(),
            Some("https://example.com/pinned.qcow2")
        );
    }

    #[test]
    fn local_sets_read_images_from_the_cache() {
        let ctx = ctx(Arch::Arm64);
        let doc = generate(
            &ctx,
            ConfigDocument::empty(),
            "distro-jammy-local,custom-5.15-local",
            &[],
            &options("4", "512", true),
        );

        let distro = doc.vmset("distro_local").unwrap();
        assert_eq!(distro.arch, VmArch::Local);
        assert_eq!(
            distro.kernels[0].image_source.as_deref(),
            Some("file:///kmt/rootfs/ubuntu-22.04-arm64.qcow2")
        );
        assert_eq!(
            distro.disks.as_ref().unwrap()[0].source,
            "file:///kmt/rootfs/docker-arm64.qcow2"
        );

        let custom = doc.vmset("gt_414_custom_local").unwrap();
        assert_eq!(custom.recipe_kind(), Some(Recipe::Custom));
        assert_eq!(
            custom.image.as_ref().unwrap().image_source,
            "file:///kmt/rootfs/custom-bullseye.arm64.qcow2"
        );
        assert_eq!(
            custom.kernels[0].dir.as_deref(),
            Some("kernel-5.15.arm64.pkg")
        );

        assert!(
            doc.vmsets
                .iter()
                .all(|set| set.console_type.as_deref() == Some(CONSOLE_FILE))
        );
    }

    #[test]
    fn user_prefixes_create_named_sets() {
        let ctx = ctx(Arch::X86_64);
        let sets = vec!["net".to_string()];
        let doc = generate(
            &ctx,
            ConfigDocument::empty(),
            "distro-debian_12-x86_64",
            &sets,
            &options("4", "512", false),
        );
        assert_eq!(doc.vmsets.len(), 1);
        assert_eq!(doc.vmsets[0].name, "net_distro_x86_64");
        assert_eq!(tags(&doc, "net_distro_x86_64"), vec!["debian_12"]);
    }

    #[test]
    fn distro_missing_from_template_is_fatal() {
        let ctx = ctx(Arch::X86_64);
        let catalog = Catalog::builtin();
        let defs = normalize_vms(&catalog, &TokenSortRatio, "distro-centos_79-arm64").unwrap();
        let err = generate_vmconfig(
            &ctx,
            &template(),
            ConfigDocument::empty(),
            &defs,
            &[],
            &options("4", "512", false),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::NoKernelInSet { version, set } if version == "centos_79" && set == "distro_arm64"
        ));
    }

    #[test]
    fn empty_vm_list_is_rejected() {
        let catalog = Catalog::builtin();
        assert!(matches!(
            normalize_vms(&catalog, &TokenSortRatio, " , "),
            Err(ConfigError::NoVms)
        ));
    }

    #[test]
    fn ci_config_covers_every_template_distro() {
        let ctx = ctx(Arch::X86_64);
        let template = template();
        let arches = ci_arches(&Catalog::builtin(), None).unwrap();
        let defs = list_all_distro_normalized_vms(&template, &arches);
        let doc = generate_vmconfig(
            &ctx,
            &template,
            ConfigDocument::empty(),
            &defs,
            &[],
            &options("4", "8192", true),
        )
        .unwrap();

        assert_eq!(tags(&doc, "distro_x86_64"), vec!["ubuntu_22.04", "debian_12"]);
        assert_eq!(tags(&doc, "distro_arm64"), vec!["ubuntu_22.04"]);
        assert!(
            doc.vmsets
                .iter()
                .all(|set| set.console_type.as_deref() == Some(CONSOLE_FILE))
        );
    }
}
