//! tagtrack CLI: offline replay of recorded tag detections.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
#[cfg(not(feature = "tracing"))]
use log::LevelFilter;
use tagtrack::{
    recording_base_dir, run_replay, JsonLinesSink, NodeConfig, Recording, ReplayOptions,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "tagtrack")]
#[command(about = "Track AprilTags and chessboards in RGB-D streams")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded session and print the published poses as JSON lines.
    Replay(ReplayArgs),
}

#[derive(Debug, Clone, Args)]
struct ReplayArgs {
    /// Node configuration (JSON).
    #[arg(long)]
    config: PathBuf,

    /// Recording with camera, per-frame detections and depth (JSON).
    #[arg(long)]
    recording: PathBuf,

    /// Write poses here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Write debug overlays here (requires `debug_display` in the config).
    #[arg(long)]
    overlay_dir: Option<PathBuf>,

    /// Debug-level logging.
    #[arg(long, short)]
    verbose: bool,

    /// Emit structured JSON logs through `tracing`.
    #[cfg(feature = "tracing")]
    #[arg(long)]
    json_logs: bool,
}

fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Replay(args) => replay(args),
    };
    if let Err(err) = result {
        log::error!("{err}");
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

#[cfg(feature = "tracing")]
fn init_logging(args: &ReplayArgs) {
    if args.verbose && std::env::var_os("RUST_LOG").is_none() {
        std::env::set_var("RUST_LOG", "debug");
    }
    tagtrack::init_tracing(args.json_logs);
}

#[cfg(not(feature = "tracing"))]
fn init_logging(args: &ReplayArgs) {
    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let _ = tagtrack::init_with_level(level);
}

fn replay(args: ReplayArgs) -> CliResult<()> {
    init_logging(&args);

    let config = NodeConfig::load_json(&args.config)?;
    let recording = Recording::load_json(&args.recording)?;
    let options = ReplayOptions {
        base_dir: recording_base_dir(&args.recording),
        overlay_dir: args.overlay_dir.clone(),
    };

    let writer: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };
    let mut sink = JsonLinesSink::new(writer);
    let summary = run_replay(&config, &recording, &options, &mut sink)?;
    sink.into_inner().flush()?;

    log::info!(
        "{} frames, {} poses published per channel",
        summary.frames,
        summary.poses
    );
    if let Some(path) = &args.output {
        log::info!("poses written to {}", path.display());
    }
    Ok(())
}
