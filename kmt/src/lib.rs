use std::{env, io, path::PathBuf};

use clap::{Args, Parser, Subcommand};
use comfy_table::Table;
use kmt_apply::{
    ApplyError, ApplyOutcome, CiOptions, DEFAULT_CI_OUTPUT_FILE, GenConfigOptions,
    TerminalOperator, gen_config, gen_config_ci,
};
use kmt_catalog::{Catalog, ImageFilter, ImageSupport};
use kmt_ctx::{Context, ContextError};
use kmt_vmconfig::{ConfigError, Overrides};
use kmt_vmdef::TokenSortRatio;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "kmt", version, about = "Kernel matrix testing VM configuration")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(long = "log", global = true, default_value = "info")]
    pub log: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add VMs to the configuration of a stack
    GenConfig(GenConfigArgs),
    /// List supported images
    Ls {
        /// Only distribution images
        #[arg(long)]
        distro: bool,

        /// Only custom kernels
        #[arg(long)]
        custom: bool,
    },
}

#[derive(Args, Debug)]
pub struct GenConfigArgs {
    /// Stack to configure, defaults to the checked out branch
    #[arg(long)]
    pub stack: Option<String>,

    /// Comma separated VMs, e.g. `ubuntu-22,5.10-arm64`
    #[arg(long, default_value = "")]
    pub vms: String,

    /// Comma separated set name prefixes
    #[arg(long, value_delimiter = ',')]
    pub sets: Vec<String>,

    /// Comma separated vcpu counts
    #[arg(long, default_value = "4")]
    pub vcpu: String,

    /// Comma separated memory sizes in MiB
    #[arg(long, default_value = "8192")]
    pub memory: String,

    /// Create the stack if it does not exist
    #[arg(long)]
    pub init_stack: bool,

    /// Start from an empty configuration
    #[arg(long)]
    pub new: bool,

    /// Configure every distribution of the reference template, without prompting
    #[arg(long)]
    pub ci: bool,

    /// Restrict a CI configuration to one architecture
    #[arg(long, requires = "ci")]
    pub arch: Option<String>,

    /// Where a CI configuration is written
    #[arg(long, default_value = DEFAULT_CI_OUTPUT_FILE)]
    pub output_file: PathBuf,

    /// Reference template, defaults to `KMT_TEMPLATE` or the repository's template
    #[arg(long)]
    pub template: Option<PathBuf>,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error("failed to get current directory: {0}")]
    CurrentDir(#[source] io::Error),
}

pub async fn run(cli: Cli) -> Result<(), AppError> {
    match cli.command {
        Command::GenConfig(args) => cmd_gen_config(args).await,
        Command::Ls { distro, custom } => cmd_ls(ImageFilter { distro, custom }),
    }
}

async fn cmd_gen_config(args: GenConfigArgs) -> Result<(), AppError> {
    let GenConfigArgs {
        stack,
        vms,
        sets,
        vcpu,
        memory,
        init_stack,
        new,
        ci,
        arch,
        output_file,
        template,
    } = args;

    let catalog = Catalog::builtin();
    let ctx = Context::create(template)?;
    let overrides = Overrides::parse(&vcpu, &memory)?;

    if ci {
        let options = CiOptions {
            arch,
            sets,
            overrides,
            output_file,
        };
        gen_config_ci(&ctx, &catalog, options).await?;
        return Ok(());
    }

    let options = GenConfigOptions {
        stack,
        vms,
        sets,
        overrides,
        init_stack,
        new,
        repo_dir: env::current_dir().map_err(AppError::CurrentDir)?,
    };
    let outcome = gen_config(&ctx, &catalog, &TokenSortRatio, &mut TerminalOperator, options).await?;
    debug!(?outcome, "gen-config finished");
    if outcome == ApplyOutcome::Declined {
        info!("no changes applied");
    }
    Ok(())
}

fn cmd_ls(filter: ImageFilter) -> Result<(), AppError> {
    let images = Catalog::builtin().image_support(filter);
    println!("{}", images_table(&images));
    Ok(())
}

pub fn images_table(images: &[ImageSupport]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS)
        .set_content_arrangement(comfy_table::ContentArrangement::Dynamic)
        .set_header(vec!["image", "x86_64", "arm64"]);

    let mark = |supported: bool| if supported { "✓" } else { "✗" };
    for image in images {
        table.add_row(vec![
            image.name.as_str(),
            mark(image.x86_64),
            mark(image.arm64),
        ]);
    }

    table
}
