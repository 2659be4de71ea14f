use kmt_vmdef::NormalizeError;
use kmt_vmset::VmSetError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for memory provided: '{value}'")]
    InvalidMemory { value: String },

    #[error("invalid value for vcpu provided: '{value}'")]
    InvalidVcpu { value: String },

    #[error("invalid architecture provided: '{arch}'")]
    InvalidArch { arch: String },

    #[error("no vms to boot provided")]
    NoVms,

    #[error("no kernel {version} in set {set}")]
    NoKernelInSet { version: String, set: String },

    #[error("unable to find vmset with name {set}")]
    VmSetNotFound { set: String },

    #[error("failed to parse reference template: {0}")]
    ParseTemplate(#[source] serde_json::Error),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error(transparent)]
    VmSet(#[from] VmSetError),
}
