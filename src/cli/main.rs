//! asset-prep command-line tool
//!
//! Two subcommands, one per pipeline. Each invocation prints exactly one JSON
//! line on stdout; logs go to stderr.

use super::{config::CliConfigBuilder, output::CommandResponse};
use crate::{
    error::PrepError,
    normalizer::MeshNormalizer,
    processor::BackgroundRemovalProcessor,
    services::ProgressTracker,
    tracing_config::{events, init_cli_tracing, spans},
};
use anyhow::{Context, Result};
use clap::{error::ErrorKind, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info};

/// Prepare product photos and 3D assets for printing
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "asset-prep")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging on stderr (-v: INFO, -vv: DEBUG, -vvv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Remove the background of a product photo and write an RGBA image
    RemoveBg(RemoveBgArgs),
    /// Centre and scale a glTF/GLB asset and export STL
    NormalizeMesh(NormalizeMeshArgs),
}

impl Command {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Command::RemoveBg(_) => "remove-bg",
            Command::NormalizeMesh(_) => "normalize-mesh",
        }
    }
}

#[derive(Args, Debug)]
pub struct RemoveBgArgs {
    /// Input image (PNG, JPEG, TIFF or WebP)
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output image; the extension selects PNG, TIFF or WebP
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Mask combination policy
    #[arg(long, value_enum)]
    pub policy: Option<CliPolicy>,

    /// Fraction of each side left outside the initial foreground rectangle
    #[arg(long, value_name = "RATIO")]
    pub margin: Option<f64>,

    /// JSON file with segmentation settings; flags take precedence
    #[arg(long, value_name = "JSON")]
    pub config: Option<PathBuf>,
}

#[derive(Args, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct NormalizeMeshArgs {
    /// Input mesh (.glb, .gltf or .stl)
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Output STL file
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// Size of the largest dimension after scaling [default: 100]
    #[arg(value_name = "TARGET_SIZE_MM")]
    pub target_size_mm: Option<f64>,

    /// Write ASCII STL instead of binary
    #[arg(long)]
    pub ascii: bool,

    /// Skip hole filling
    #[arg(long)]
    pub no_repair: bool,

    /// Leave holes with more boundary edges than this open
    #[arg(long, value_name = "N")]
    pub max_hole_edges: Option<usize>,

    /// Keep coincident vertices separate
    #[arg(long)]
    pub no_weld: bool,

    /// JSON file with normalization settings; flags take precedence
    #[arg(long, value_name = "JSON")]
    pub config: Option<PathBuf>,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug)]
pub enum CliPolicy {
    Cascade,
    Composite,
}

/// Parse arguments, run the command and print the JSON response
///
/// Exit code 0 on success, 1 on any failure including argument errors.
pub fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        },
        Err(e) => {
            let _ = e.print();
            CommandResponse::failure(e.to_string().trim_end()).emit();
            return ExitCode::FAILURE;
        },
    };

    let session_id = match init_cli_tracing(cli.verbose) {
        Ok(id) => id,
        Err(e) => {
            eprintln!("warning: logging disabled: {:#}", e);
            String::new()
        },
    };
    let _session = spans::session(&session_id, cli.command.name()).entered();

    let response = match run(&cli) {
        Ok(response) => response,
        Err(e) => {
            events::error_with_context(&*e, error_kind(&e), cli.command.name());
            CommandResponse::failure(format!("{:#}", e))
        },
    };
    response.emit();

    if response.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Category of the pipeline error behind a failure, `other` for CLI-level errors
fn error_kind(error: &anyhow::Error) -> &'static str {
    error.downcast_ref::<PrepError>().map_or("other", PrepError::kind)
}

/// Execute a parsed command line
///
/// # Errors
/// Any configuration or pipeline failure, with context.
pub fn run(cli: &Cli) -> Result<CommandResponse> {
    let tracker = ProgressTracker::tracing(cli.verbose >= 2);

    match &cli.command {
        Command::RemoveBg(args) => {
            let config = CliConfigBuilder::segmentation(args)?;
            info!(policy = %config.policy, margin = config.rect_margin, "Removing background");

            let mut processor =
                BackgroundRemovalProcessor::new(config).context("Invalid segmentation configuration")?;
            processor.set_progress_tracker(tracker);
            let report = processor
                .process_file(&args.input, &args.output)
                .with_context(|| format!("Failed to remove background from {}", args.input.display()))?;
            debug!(report = ?report, "Background removal finished");
            Ok(CommandResponse::success())
        },
        Command::NormalizeMesh(args) => {
            let config = CliConfigBuilder::normalization(args)?;
            info!(target_size_mm = config.target_size_mm, "Normalizing mesh");

            let mut normalizer =
                MeshNormalizer::new(config).context("Invalid normalization configuration")?;
            normalizer.set_progress_tracker(tracker);
            let report = normalizer
                .normalize(&args.input, &args.output)
                .with_context(|| format!("Failed to normalize {}", args.input.display()))?;
            Ok(CommandResponse::normalized(report))
        },
    }
}
