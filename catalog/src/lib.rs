//! Static reference data for kernel matrix testing: kernels, distributions,
//! architectures, and the candidate space user input is matched against.

mod arch;
mod images;
mod kernel;
mod recipe;

use indexmap::IndexMap;

pub use crate::arch::*;
pub use crate::images::{ImageFilter, ImageSupport};
pub use crate::kernel::*;
pub use crate::recipe::*;

/// Informal distribution names and their canonical keys.
pub const DISTRIBUTIONS: &[(&str, &str)] = &[
    // ubuntu
    ("ubuntu_16", "ubuntu_16.04"),
    ("ubuntu_18", "ubuntu_18.04"),
    ("ubuntu_20", "ubuntu_20.04"),
    ("ubuntu_22", "ubuntu_22.04"),
    ("ubuntu_23", "ubuntu_23.10"),
    ("ubuntu_16.04", "ubuntu_16.04"),
    ("ubuntu_18.04", "ubuntu_18.04"),
    ("ubuntu_20.04", "ubuntu_20.04"),
    ("ubuntu_22.04", "ubuntu_22.04"),
    ("ubuntu_23.10", "ubuntu_23.10"),
    ("xenial", "ubuntu_16.04"),
    ("bionic", "ubuntu_18.04"),
    ("focal", "ubuntu_20.04"),
    ("jammy", "ubuntu_22.04"),
    ("mantic", "ubuntu_23.10"),
    // amazon linux
    ("amazon_4.14", "amzn_4.14"),
    ("amazon_5.4", "amzn_5.4"),
    ("amazon_5.10", "amzn_5.10"),
    ("amzn_4.14", "amzn_4.14"),
    ("amzn_5.4", "amzn_5.4"),
    ("amzn_5.10", "amzn_5.10"),
    // fedora
    ("fedora_37", "fedora_37"),
    ("fedora_38", "fedora_38"),
    // debian
    ("debian_10", "debian_10"),
    ("debian_11", "debian_11"),
    ("debian_12", "debian_12"),
    // centos
    ("centos_79", "centos_79"),
];

/// The full set of catalog entries for one invocation.
#[derive(Debug, Clone)]
pub struct Catalog {
    kernels: Vec<String>,
    distributions: IndexMap<String, String>,
    arches: IndexMap<String, Arch>,
}

impl Catalog {
    pub fn new(
        kernels: Vec<String>,
        distributions: IndexMap<String, String>,
        arches: IndexMap<String, Arch>,
    ) -> Self {
        Self {
            kernels,
            distributions,
            arches,
        }
    }

    pub fn builtin() -> Self {
        Self::new(
            KERNELS.iter().map(|k| k.to_string()).collect(),
            DISTRIBUTIONS
                .iter()
                .map(|(alias, key)| (alias.to_string(), key.to_string()))
                .collect(),
            ARCH_ALIASES
                .iter()
                .map(|(alias, arch)| (alias.to_string(), *arch))
                .collect(),
        )
    }

    pub fn kernels(&self) -> &[String] {
        &self.kernels
    }

    pub fn distribution(&self, alias: &str) -> Option<&str> {
        self.distributions.get(alias).map(String::as_str)
    }

    pub fn arch(&self, alias: &str) -> Option<Arch> {
        self.arches.get(alias).copied()
    }

    /// Every `recipe-version-arch` string the catalog can express.
    ///
    /// Built from the catalog each call, never shared between catalogs.
    pub fn generate_candidate_space(&self) -> Vec<String> {
        let arches: Vec<&str> = self
            .arches
            .keys()
            .map(String::as_str)
            .chain(std::iter::once(LOCAL_ARCH))
            .collect();

        let custom = self
            .kernels
            .iter()
            .map(|kernel| (Recipe::Custom, kernel.as_str()));
        let distro = self
            .distributions
            .keys()
            .map(|alias| (Recipe::Distro, alias.as_str()));

        custom
            .chain(distro)
            .flat_map(|(recipe, version)| {
                arches
                    .iter()
                    .map(move |arch| format!("{recipe}-{version}-{arch}"))
            })
            .collect()
    }

    pub fn image_support(&self, filter: ImageFilter) -> Vec<ImageSupport> {
        images::image_support(&self.kernels, filter)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_space_is_full_cross_product() {
        let catalog = Catalog::builtin();
        let space = catalog.generate_candidate_space();
        let arch_count = ARCH_ALIASES.len() + 1;
        assert_eq!(
            space.len(),
            (KERNELS.len() + DISTRIBUTIONS.len()) * arch_count
        );
        assert!(space.contains(&"custom-5.10-x86_64".to_string()));
        assert!(space.contains(&"distro-jammy-local".to_string()));
        assert!(space.contains(&"distro-ubuntu_22.04-aarch64".to_string()));
        assert!(space.iter().all(|c| c.split('-').count() == 3));
    }

    #[test]
    fn candidate_space_follows_catalog_contents() {
        let catalog = Catalog::new(
            vec!["6.1".to_string()],
            IndexMap::new(),
            [("x86_64".to_string(), Arch::X86_64)].into_iter().collect(),
        );
        assert_eq!(
            catalog.generate_candidate_space(),
            vec!["custom-6.1-x86_64", "custom-6.1-local"]
        );
    }

    #[test]
    fn every_distribution_alias_is_canonical_after_one_hop() {
        let catalog = Catalog::builtin();
        for (_, key) in DISTRIBUTIONS {
            assert_eq!(catalog.distribution(key), Some(*key));
        }
    }

    #[test]
    fn image_support_marks_legacy_kernels_x86_only() {
        let catalog = Catalog::builtin();
        let rows = catalog.image_support(ImageFilter {
            distro: false,
            custom: true,
        });
        assert_eq!(rows.len(), KERNELS.len());
        let legacy = rows
            .iter()
            .find(|row| row.name == "custom kernel v4.14")
            .unwrap();
        assert!(legacy.supports(Arch::X86_64));
        assert!(!legacy.supports(Arch::Arm64));

        let all = catalog.image_support(ImageFilter::default());
        assert!(all.len() > rows.len());
    }
}
