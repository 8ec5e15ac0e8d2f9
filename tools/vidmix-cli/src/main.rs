//! vidmix CLI: drive the mixer without a media stack.
//!
//! Usage:
//!   vidmix simulate [OPTIONS]   Run synthetic participants through the mixer
//!   vidmix layout [OPTIONS]     Print the tile plan for one viewer
//!   vidmix config               Show the effective configuration

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use vidmix_common::config::VidmixConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "vidmix",
    about = "Real-time per-participant video mixer",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to the standard location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run synthetic participants and report per-source frame statistics
    Simulate {
        /// Number of camera participants
        #[arg(short, long, default_value = "4")]
        participants: u32,

        /// Output frame rates, assigned round-robin (config default if unset)
        #[arg(long, value_delimiter = ',')]
        fps: Vec<u32>,

        /// Output width
        #[arg(long, default_value = "640")]
        width: u32,

        /// Output height
        #[arg(long, default_value = "360")]
        height: u32,

        /// Run time in seconds (Ctrl+C stops early)
        #[arg(short, long, default_value = "3.0")]
        duration: f64,

        /// Pixel format override: yuv420p|rgb32
        #[arg(long)]
        format: Option<String>,

        /// Show every participant its own input
        #[arg(long)]
        selfview: bool,

        /// Add a content-sharing participant
        #[arg(long)]
        content: bool,

        /// Hide shared content from camera participants
        #[arg(long)]
        content_hide: bool,

        /// Participant index everyone focuses on
        #[arg(long)]
        focus: Option<u32>,

        /// Show the focus target across the whole composite
        #[arg(long, requires = "focus")]
        focus_full: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the tile plan for one viewer
    Layout {
        /// Number of enabled participants (indices 1..=N)
        #[arg(short, long, default_value = "4")]
        participants: u32,

        /// Composite width
        #[arg(long, default_value = "1280")]
        width: u32,

        /// Composite height
        #[arg(long, default_value = "720")]
        height: u32,

        /// Viewer index (0 for an outside observer)
        #[arg(long, default_value = "0")]
        viewer: u32,

        /// Include the viewer's own tile
        #[arg(long)]
        selfview: bool,

        /// Participant indices flagged as content
        #[arg(long, value_delimiter = ',')]
        content: Vec<u32>,

        /// Exclude content participants
        #[arg(long)]
        content_hide: bool,

        /// Focus target index
        #[arg(long)]
        focus: Option<u32>,

        /// Focus target covers the whole composite
        #[arg(long, requires = "focus")]
        focus_full: bool,

        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => VidmixConfig::load_from(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config: {e}"))?,
        None => VidmixConfig::load(),
    };

    // Initialize logging
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    vidmix_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Simulate {
            participants,
            fps,
            width,
            height,
            duration,
            format,
            selfview,
            content,
            content_hide,
            focus,
            focus_full,
            json,
        } => {
            let fps = if fps.is_empty() {
                vec![config.mixer.default_fps]
            } else {
                fps
            };
            let options = commands::simulate::SimulateOptions {
                participants,
                fps,
                width,
                height,
                duration_secs: duration,
                format,
                selfview,
                content,
                content_hide,
                focus,
                focus_full,
            };
            commands::simulate::run(&config, options, json).await
        }
        Commands::Layout {
            participants,
            width,
            height,
            viewer,
            selfview,
            content,
            content_hide,
            focus,
            focus_full,
            json,
        } => commands::layout::run(
            participants,
            width,
            height,
            viewer,
            selfview,
            content,
            content_hide,
            focus,
            focus_full,
            json,
        ),
        Commands::Config => commands::config::run(&config, cli.config),
    }
}
