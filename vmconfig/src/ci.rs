use kmt_catalog::{Arch, Catalog, Recipe};
use kmt_vmdef::NormalizedVmDef;

use crate::{error::ConfigError, template::Template};

/// Architectures a CI run covers, optionally narrowed to one alias.
pub fn ci_arches(catalog: &Catalog, arch: Option<&str>) -> Result<Vec<Arch>, ConfigError> {
    match arch {
        None => Ok(Arch::ALL.to_vec()),
        Some(alias) => catalog
            .arch(alias)
            .map(|arch| vec![arch])
            .ok_or_else(|| ConfigError::InvalidArch {
                arch: alias.to_owned(),
            }),
    }
}

/// Every distro kernel the reference template knows for the given arches.
pub fn list_all_distro_normalized_vms(template: &Template, arches: &[Arch]) -> Vec<NormalizedVmDef> {
    arches
        .iter()
        .flat_map(|arch| {
            template
                .kernel_tags(&format!("{}_{arch}", Recipe::Distro))
                .into_iter()
                .map(move |tag| NormalizedVmDef::new(Recipe::Distro, tag, (*arch).into()))
        })
        .collect()
}
