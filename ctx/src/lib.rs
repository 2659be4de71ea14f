mod paths;

use std::{env, path::PathBuf};

use kmt_catalog::Arch;
use thiserror::Error;
use tracing::debug;
use url::Url;

pub use crate::paths::{Paths, PathsError, VMCONFIG_FILE};

/// Reference template shipped with the test infrastructure definitions.
pub const DEFAULT_TEMPLATE_PATH: &str = "test/new-e2e/system-probe/config/vmconfig.json";

pub const DEFAULT_ROOTFS_URL: &str =
    "https://dd-agent-omnibus.s3.amazonaws.com/kernel-version-testing/rootfs/";

#[derive(Error, Debug)]
pub enum ContextError {
    #[error(transparent)]
    Paths(#[from] PathsError),

    #[error("unsupported host architecture: {0}")]
    UnsupportedHostArch(String),

    #[error("invalid rootfs url '{url}': {source}")]
    RootfsUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Everything the pipeline needs to know about its environment, built once.
#[derive(Debug, Clone)]
pub struct Context {
    paths: Paths,
    host_arch: Arch,
    template_path: PathBuf,
    rootfs_url: Url,
}

impl Context {
    pub fn new(paths: Paths, host_arch: Arch, template_path: PathBuf, rootfs_url: Url) -> Self {
        Self {
            paths,
            host_arch,
            template_path,
            rootfs_url,
        }
    }

    /// Discovers paths and host architecture from the environment.
    ///
    /// `template_path` falls back to `KMT_TEMPLATE`, then to the in-repo default.
    pub fn create(template_path: Option<PathBuf>) -> Result<Self, ContextError> {
        let paths = Paths::create()?;
        let host_arch = Arch::from_alias(env::consts::ARCH)
            .ok_or_else(|| ContextError::UnsupportedHostArch(env::consts::ARCH.to_owned()))?;
        let template_path = template_path
            .or_else(|| env::var("KMT_TEMPLATE").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_TEMPLATE_PATH));
        let rootfs_url = env::var("KMT_ROOTFS_URL").unwrap_or_else(|_| DEFAULT_ROOTFS_URL.to_owned());
        let rootfs_url = parse_base_url(&rootfs_url)?;

        debug!(
            kmt_dir = %paths.kmt_dir().display(),
            host_arch = %host_arch,
            template = %template_path.display(),
            "created context"
        );

        Ok(Self::new(paths, host_arch, template_path, rootfs_url))
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub fn host_arch(&self) -> Arch {
        self.host_arch
    }

    pub fn template_path(&self) -> &PathBuf {
        &self.template_path
    }

    /// Base url rootfs images are downloaded from; always ends in `/`.
    pub fn rootfs_url(&self) -> &Url {
        &self.rootfs_url
    }
}

/// Parses `url` as a directory url, adding the trailing slash `Url::join` needs.
pub fn parse_base_url(url: &str) -> Result<Url, ContextError> {
    let normalized = if url.ends_with('/') {
        url.to_owned()
    } else {
        format!("{url}/")
    };
    Url::parse(&normalized).map_err(|source| ContextError::RootfsUrl {
        url: url.to_owned(),
        source,
    })
}
