use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown recipe: {0}")]
pub struct UnknownRecipe(pub String);

/// How a VM's kernel is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recipe {
    /// Kernel built and packaged ad hoc.
    Custom,
    /// Stock kernel of a named distribution.
    Distro,
}

impl Recipe {
    pub const ALL: [Recipe; 2] = [Recipe::Custom, Recipe::Distro];

    pub fn as_str(&self) -> &'static str {
        match self {
            Recipe::Custom => "custom",
            Recipe::Distro => "distro",
        }
    }
}

impl Display for Recipe {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Recipe {
    type Err = UnknownRecipe;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "custom" => Ok(Recipe::Custom),
            "distro" => Ok(Recipe::Distro),
            other => Err(UnknownRecipe(other.to_owned())),
        }
    }
}
