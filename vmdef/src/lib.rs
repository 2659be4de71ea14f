//! Normalization of loosely typed VM identifiers into canonical definitions.

mod score;

use std::fmt::{self, Display, Formatter};

use kmt_catalog::{Catalog, KernelVersion, LOCAL_ARCH, Recipe, VmArch};
use thiserror::Error;
use tracing::debug;

pub use crate::score::{Scorer, TokenSortRatio};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("no candidates to match '{input}' against")]
    EmptyCandidateSpace { input: String },

    #[error("malformed candidate '{candidate}': expected recipe-version-arch")]
    MalformedCandidate { candidate: String },

    #[error("unknown recipe '{recipe}' in candidate '{candidate}'")]
    UnknownRecipe { recipe: String, candidate: String },

    #[error("unknown architecture '{arch}' in candidate '{candidate}'")]
    UnknownArch { arch: String, candidate: String },

    #[error("unknown distribution '{distro}' in candidate '{candidate}'")]
    UnknownDistribution { distro: String, candidate: String },
}

/// Canonical `(recipe, version, arch)` triple for one requested VM.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedVmDef {
    pub recipe: Recipe,
    pub version: String,
    pub arch: VmArch,
}

impl NormalizedVmDef {
    pub fn new(recipe: Recipe, version: impl Into<String>, arch: VmArch) -> Self {
        Self {
            recipe,
            version: version.into(),
            arch,
        }
    }

    /// Whether this is a custom kernel at or below 4.14.
    ///
    /// Distro versions are never legacy; they carry their own boot defaults.
    pub fn is_legacy(&self) -> bool {
        self.recipe == Recipe::Custom && is_legacy_version(&self.version)
    }
}

impl Display for NormalizedVmDef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.recipe, self.version, self.arch)
    }
}

/// Legacy rule for a raw custom kernel version; unparseable versions are not legacy.
pub fn is_legacy_version(version: &str) -> bool {
    version
        .parse::<KernelVersion>()
        .map(|version| version.is_legacy())
        .unwrap_or(false)
}

/// Fuzzy matcher over a catalog's candidate space.
pub struct Normalizer<'a> {
    catalog: &'a Catalog,
    candidates: Vec<String>,
    scorer: &'a dyn Scorer,
}

impl<'a> Normalizer<'a> {
    pub fn new(catalog: &'a Catalog, scorer: &'a dyn Scorer) -> Self {
        Self::with_candidates(catalog, catalog.generate_candidate_space(), scorer)
    }

    pub fn with_candidates(
        catalog: &'a Catalog,
        candidates: Vec<String>,
        scorer: &'a dyn Scorer,
    ) -> Self {
        Self {
            catalog,
            candidates,
            scorer,
        }
    }

    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn normalize(&self, input: &str) -> Result<NormalizedVmDef, NormalizeError> {
        let input = input.trim();
        let candidate = self.best_candidate(input)?;
        debug!(input, candidate, "matched vm definition");
        self.split_candidate(candidate)
    }

    pub fn normalize_all<I, S>(&self, inputs: I) -> Result<Vec<NormalizedVmDef>, NormalizeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        inputs
            .into_iter()
            .map(|input| self.normalize(input.as_ref()))
            .collect()
    }

    fn best_candidate(&self, input: &str) -> Result<&str, NormalizeError> {
        if let Some(exact) = self.candidates.iter().find(|c| c.as_str() == input) {
            return Ok(exact);
        }

        // first candidate wins ties
        let mut best: Option<(&str, f64)> = None;
        for candidate in &self.candidates {
            let score = self.scorer.score(input, candidate);
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((candidate.as_str(), score));
            }
        }

        best.map(|(candidate, _)| candidate)
            .ok_or_else(|| NormalizeError::EmptyCandidateSpace {
                input: input.to_owned(),
            })
    }

    fn split_candidate(&self, candidate: &str) -> Result<NormalizedVmDef, NormalizeError> {
        let malformed = || NormalizeError::MalformedCandidate {
            candidate: candidate.to_owned(),
        };
        let mut parts = candidate.split('-');
        let (Some(recipe), Some(version), Some(arch), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };

        let recipe = recipe
            .parse::<Recipe>()
            .map_err(|_| NormalizeError::UnknownRecipe {
                recipe: recipe.to_owned(),
                candidate: candidate.to_owned(),
            })?;

        let arch = if arch == LOCAL_ARCH {
            VmArch::Local
        } else {
            self.catalog
                .arch(arch)
                .map(VmArch::from)
                .ok_or_else(|| NormalizeError::UnknownArch {
                    arch: arch.to_owned(),
                    candidate: candidate.to_owned(),
                })?
        };

        let version = match recipe {
            Recipe::Custom => version.to_owned(),
            Recipe::Distro => self
                .catalog
                .distribution(version)
                .ok_or_else(|| NormalizeError::UnknownDistribution {
                    distro: version.to_owned(),
                    candidate: candidate.to_owned(),
                })?
                .to_owned(),
        };

        Ok(NormalizedVmDef::new(recipe, version, arch))
    }
}
