//! Turns a resolved VM selection into a written stack configuration, with
//! operator review in between.

mod operator;
mod stack;

use std::{
    io::Write,
    path::{Path, PathBuf},
};

use kmt_catalog::Catalog;
use kmt_cmd::CommandError;
use kmt_ctx::Context;
use kmt_vmconfig::{
    ConfigDocument, ConfigError, MergeOptions, Overrides, Template, ci_arches, diff,
    generate_vmconfig, list_all_distro_normalized_vms, normalize_vms,
};
use kmt_vmdef::Scorer;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use crate::operator::{Operator, Review, TerminalOperator, changes_table};
pub use crate::stack::{
    STACK_SUFFIX, active_branch, check_and_get_stack, create_stack, stack_exists, stack_name,
};

pub const DEFAULT_CI_OUTPUT_FILE: &str = "vmconfig.json";

#[derive(Error, Debug)]
pub enum ApplyError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("stack {stack} does not exist, create it with --init-stack")]
    StackNotFound { stack: String },

    #[error("failed to create stack directory {path}: {source}")]
    CreateStack {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no branch checked out according to {path}, pass --stack")]
    DetachedHead { path: PathBuf },

    #[error("failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse vm config {path}: {source}")]
    ParseConfig {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize vm config: {0}")]
    SerializeConfig(#[source] serde_json::Error),

    #[error("failed to create temporary file: {0}")]
    TempFile(#[source] std::io::Error),

    #[error("failed to prompt operator: {0}")]
    Prompt(#[source] std::io::Error),

    #[error(transparent)]
    Command(#[from] CommandError),
}

pub struct GenConfigOptions {
    pub stack: Option<String>,
    /// Comma separated VM identifiers.
    pub vms: String,
    /// Set name prefixes.
    pub sets: Vec<String>,
    pub overrides: Overrides,
    pub init_stack: bool,
    /// Start from an empty document instead of the stack's current one.
    pub new: bool,
    /// Repository whose checked out branch names the default stack.
    pub repo_dir: PathBuf,
}

pub struct CiOptions {
    pub arch: Option<String>,
    pub sets: Vec<String>,
    pub overrides: Overrides,
    pub output_file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied { path: PathBuf },
    /// The proposal matched what is on disk.
    Unchanged { path: PathBuf },
    /// The operator declined; nothing was written.
    Declined,
}

pub async fn gen_config(
    ctx: &Context,
    catalog: &Catalog,
    scorer: &dyn Scorer,
    operator: &mut dyn Operator,
    options: GenConfigOptions,
) -> Result<ApplyOutcome, ApplyError> {
    let GenConfigOptions {
        stack,
        vms,
        sets,
        overrides,
        init_stack,
        new,
        repo_dir,
    } = options;

    let stack = check_and_get_stack(stack, &repo_dir).await?;
    if !stack_exists(ctx.paths(), &stack).await {
        if !init_stack {
            return Err(ApplyError::StackNotFound { stack });
        }
        create_stack(ctx.paths(), &stack).await?;
    }
    info!(stack = %stack, "selected stack");

    let defs = normalize_vms(catalog, scorer, &vms)?;
    let template = load_template(ctx.template_path()).await?;

    let vmconfig_file = ctx.paths().stack_vmconfig_file(&stack);
    let current = if new {
        None
    } else {
        load_config_if_exists(&vmconfig_file).await?
    };
    let baseline = current.clone().unwrap_or_else(ConfigDocument::empty);

    let options = MergeOptions {
        overrides,
        ci: false,
    };
    let proposed = generate_vmconfig(ctx, &template, baseline.clone(), &defs, &sets, &options)?;

    let on_disk = current.is_some().then_some(vmconfig_file.as_path());
    apply_vmconfig(operator, &stack, &vmconfig_file, on_disk, &baseline, &proposed).await
}

/// Shows `proposed` against the current configuration and writes it to `path`
/// if the operator accepts.
///
/// `on_disk` is the file to compare against; without one the comparison is
/// against an empty document.
pub async fn apply_vmconfig(
    operator: &mut dyn Operator,
    stack: &str,
    path: &Path,
    on_disk: Option<&Path>,
    current: &ConfigDocument,
    proposed: &ConfigDocument,
) -> Result<ApplyOutcome, ApplyError> {
    let proposed_text = proposed
        .to_json_pretty()
        .map_err(ApplyError::SerializeConfig)?;

    if let Some(on_disk) = on_disk {
        if read_file(on_disk).await? == proposed_text {
            info!("No changes to apply!");
            return Ok(ApplyOutcome::Unchanged {
                path: path.to_owned(),
            });
        }
    }

    let proposed_file = write_temp(&proposed_text)?;
    let skeleton_file;
    let current_path = match on_disk {
        Some(on_disk) => on_disk,
        None => {
            let skeleton = ConfigDocument::empty()
                .to_json_pretty()
                .map_err(ApplyError::SerializeConfig)?;
            skeleton_file = write_temp(&skeleton)?;
            skeleton_file.path()
        }
    };

    let changes = diff(current, proposed);
    debug!(?changes, "structural changes");
    operator
        .review(&Review {
            stack,
            current: current_path,
            proposed: proposed_file.path(),
            changes: &changes,
        })
        .await?;

    if !operator
        .confirm("are you sure you want to apply the diff?")
        .await?
    {
        warn!("diff not applied");
        return Ok(ApplyOutcome::Declined);
    }

    write_atomically(path, &proposed_text)?;
    info!(path = %path.display(), "vm config written");
    Ok(ApplyOutcome::Applied {
        path: path.to_owned(),
    })
}

/// Writes a configuration covering every distro kernel of the reference
/// template, for unattended runs.
pub async fn gen_config_ci(
    ctx: &Context,
    catalog: &Catalog,
    options: CiOptions,
) -> Result<PathBuf, ApplyError> {
    let CiOptions {
        arch,
        sets,
        overrides,
        output_file,
    } = options;

    let template = load_template(ctx.template_path()).await?;
    let arches = ci_arches(catalog, arch.as_deref())?;
    let defs = list_all_distro_normalized_vms(&template, &arches);
    info!(count = defs.len(), "collected distro vms");

    let options = MergeOptions { overrides, ci: true };
    let doc = generate_vmconfig(ctx, &template, ConfigDocument::empty(), &defs, &sets, &options)?;
    let text = doc.to_json_pretty().map_err(ApplyError::SerializeConfig)?;

    write_atomically(&output_file, &text)?;
    info!(path = %output_file.display(), "vm config written");
    Ok(output_file)
}

async fn read_file(path: &Path) -> Result<String, ApplyError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ApplyError::ReadFile {
            path: path.to_owned(),
            source,
        })
}

async fn load_template(path: &Path) -> Result<Template, ApplyError> {
    debug!(path = %path.display(), "loading reference template");
    Ok(read_file(path).await?.parse::<Template>()?)
}

async fn load_config_if_exists(path: &Path) -> Result<Option<ConfigDocument>, ApplyError> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        debug!(path = %path.display(), "no vm config yet");
        return Ok(None);
    }
    let text = read_file(path).await?;
    let doc = serde_json::from_str(&text).map_err(|source| ApplyError::ParseConfig {
        path: path.to_owned(),
        source,
    })?;
    Ok(Some(doc))
}

fn write_temp(contents: &str) -> Result<NamedTempFile, ApplyError> {
    let mut file = tempfile::Builder::new()
        .prefix("vmconfig-")
        .suffix(".json")
        .tempfile()
        .map_err(ApplyError::TempFile)?;
    file.write_all(contents.as_bytes())
        .and_then(|()| file.flush())
        .map_err(ApplyError::TempFile)?;
    Ok(file)
}

/// Replaces `path` in one step so readers never see a partial document.
fn write_atomically(path: &Path, contents: &str) -> Result<(), ApplyError> {
    let write_err = |source| ApplyError::WriteFile {
        path: path.to_owned(),
        source,
    };
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir).map_err(write_err)?;
    file.write_all(contents.as_bytes()).map_err(write_err)?;
    file.persist(path).map_err(|err| write_err(err.error))?;
    Ok(())
}
