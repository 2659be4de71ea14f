// Inspiration: https://github.com/cubic-vm/cubic/blob/68566f79d72e2037bce1b75246d92e6da7b999e5/src/env/environment_factory.rs

use std::{
    env::{self, VarError},
    path::{Path, PathBuf},
};
use thiserror::Error;

const PROJECT_NAME: &str = "kmt";

pub const VMCONFIG_FILE: &str = "vmconfig.json";

#[derive(Debug, Clone)]
pub struct Paths {
    kmt_dir: PathBuf,
}

#[derive(Error, Debug, Clone)]
pub enum PathsError {
    #[error(transparent)]
    Var(#[from] VarError),
}

impl Paths {
    pub fn new(kmt_dir: impl Into<PathBuf>) -> Self {
        Self {
            kmt_dir: kmt_dir.into(),
        }
    }

    /// Uses `KMT_DIR` when set, otherwise the platform data directory.
    pub fn create() -> Result<Paths, PathsError> {
        if let Ok(dir) = Self::var("KMT_DIR") {
            return Ok(Paths::new(dir));
        }
        Self::create_default()
    }

    #[cfg(target_os = "linux")]
    fn create_default() -> Result<Paths, PathsError> {
        let data_dirs: PathBuf = Self::var("XDG_DATA_HOME")
            .or_else(|_| Self::var("HOME").map(|home| format!("{home}/.local/share")))
            .map(From::from)?;
        Ok(Paths::new(data_dirs.join(PROJECT_NAME)))
    }

    #[cfg(target_os = "macos")]
    fn create_default() -> Result<Paths, PathsError> {
        let home_dir: PathBuf = Self::var("HOME").map(From::from)?;
        Ok(Paths::new(home_dir.join("Library").join(PROJECT_NAME)))
    }

    #[cfg(target_os = "windows")]
    fn create_default() -> Result<Paths, PathsError> {
        let local_app_data_dir: PathBuf = Self::var("LOCALAPPDATA").map(From::from)?;
        Ok(Paths::new(local_app_data_dir.join(PROJECT_NAME)))
    }

    pub fn kmt_dir(&self) -> &Path {
        &self.kmt_dir
    }

    pub fn stacks_dir(&self) -> PathBuf {
        self.kmt_dir.join("stacks")
    }

    pub fn stack_dir(&self, stack: &str) -> PathBuf {
        self.stacks_dir().join(stack)
    }

    pub fn stack_vmconfig_file(&self, stack: &str) -> PathBuf {
        self.stack_dir(stack).join(VMCONFIG_FILE)
    }

    /// Local cache of root filesystems and distro images.
    pub fn rootfs_dir(&self) -> PathBuf {
        self.kmt_dir.join("rootfs")
    }

    fn var(var: &str) -> Result<String, PathsError> {
        env::var(var).map_err(From::from)
    }
}
