//! CLI command definitions and dispatch.

mod convert;
mod convert_stream;
mod create;
mod info;
mod resize;
mod validate;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use diskimg_core::EngineConfig;
use diskimg_runtime::{ImageOperations, ProgressState, QemuOperations};

/// diskimg — resource-bounded qemu-img driver.
#[derive(Parser, Debug)]
#[command(name = "diskimg", version, about)]
pub struct Cli {
    /// Engine configuration file (YAML or JSON)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// qemu-img binary to run
    #[arg(long, global = true)]
    pub qemu_img: Option<PathBuf>,

    /// Owner identity labelling the import progress metric
    #[arg(long, global = true)]
    pub owner: Option<String>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print the metric registry in Prometheus text format when done
    #[arg(long, global = true)]
    pub print_metrics: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Convert a local qcow2 image to raw
    Convert(convert::ConvertArgs),
    /// Convert a remote qcow2 image to raw without a local copy
    ConvertStream(convert_stream::ConvertStreamArgs),
    /// Resize a raw image in place
    Resize(resize::ResizeArgs),
    /// Display image information as JSON
    Info(info::InfoArgs),
    /// Check format, size and backing file of an image
    Validate(validate::ValidateArgs),
    /// Create an empty raw image
    Create(create::CreateArgs),
}

/// Resolve the engine configuration: file, then environment, then flags.
pub fn load_config(cli: &Cli) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    let mut config = config.with_env();
    if let Some(binary) = &cli.qemu_img {
        config.qemu_img = binary.clone();
    }
    if let Some(owner) = &cli.owner {
        config.owner_uid = owner.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Run a command against an operation set.
pub fn run(command: Command, ops: &dyn ImageOperations) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Convert(args) => convert::execute(args, ops),
        Command::ConvertStream(args) => convert_stream::execute(args, ops),
        Command::Resize(args) => resize::execute(args, ops),
        Command::Info(args) => info::execute(args, ops),
        Command::Validate(args) => validate::execute(args, ops),
        Command::Create(args) => create::execute(args, ops),
    }
}

/// Dispatch a parsed command line.
pub fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&cli)?;
    tracing::debug!(
        qemu_img = %config.qemu_img.display(),
        owner = %config.owner_uid,
        "Engine configured"
    );

    let progress = Arc::new(ProgressState::new()?);
    let ops = QemuOperations::new(config, progress.clone());
    let result = run(cli.command, &ops);

    if cli.print_metrics {
        print_metrics(&progress);
    }
    result
}

/// Best-effort metric dump; a rendering failure never masks the command's result.
fn print_metrics(progress: &ProgressState) {
    match progress.render() {
        Ok(text) => print!("{}", text),
        Err(e) => tracing::warn!(error = %e, "Failed to render metrics"),
    }
}
