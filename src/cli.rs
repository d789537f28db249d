use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub const DEFAULT_INSTRUMENT: &str = "INTER";

#[derive(Parser, Debug)]
#[command(
    name = "inter-reduce",
    version,
    about = "Automatic reflectometry reduction for INTER runs"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reduce one raw run and save the results to the output directory.
    Reduce(ReduceArgs),
    /// Print the parameters the settings file yields for an angle.
    Resolve(ResolveArgs),
    /// Print the run name and mean sample angle of a raw run.
    Angle(AngleArgs),
}

#[derive(Args, Debug, Clone)]
pub struct BackendArgs {
    /// Python interpreter with Mantid importable.
    #[arg(long, default_value = "python3")]
    pub python: PathBuf,

    /// Sample log holding the motor angle readback.
    #[arg(long, default_value = "Theta")]
    pub log_name: String,
}

#[derive(Args, Debug, Clone)]
pub struct ReduceArgs {
    #[arg(long)]
    pub input_file: PathBuf,

    #[arg(long)]
    pub output_dir: PathBuf,

    /// Batch settings JSON saved from the reflectometry GUI.
    #[arg(long)]
    pub settings: PathBuf,

    #[arg(long, default_value = DEFAULT_INSTRUMENT)]
    pub instrument: String,

    #[command(flatten)]
    pub backend: BackendArgs,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ResolveArgs {
    #[arg(long)]
    pub settings: PathBuf,

    #[arg(long, allow_negative_numbers = true)]
    pub angle: f64,

    #[arg(long, default_value = DEFAULT_INSTRUMENT)]
    pub instrument: String,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct AngleArgs {
    #[arg(long)]
    pub input_file: PathBuf,

    #[arg(long, default_value = DEFAULT_INSTRUMENT)]
    pub instrument: String,

    #[command(flatten)]
    pub backend: BackendArgs,
}
