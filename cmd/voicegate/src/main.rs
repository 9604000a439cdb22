//! voicegate CLI - container and playback tools for the voice pipeline.

use clap::{Parser, Subcommand};

mod commands;

use commands::{ConfigCommand, InspectCommand, MuxCommand, TranscodeCommand};

/// voicegate CLI - container and playback tools for the voice pipeline.
///
/// This tool exercises the pipeline offline:
///   - Build an Ogg/Opus container from a packet list, filling gaps
///   - Inspect an Ogg/Opus container
///   - Stream an audio file through the playback decoder
#[derive(Parser)]
#[command(name = "voicegate")]
#[command(about = "voicegate voice pipeline tools")]
#[command(version)]
pub struct Cli {
    /// Config file (YAML)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Output as JSON (for piping)
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the effective configuration
    Config(ConfigCommand),
    /// Build a container from a packet list
    Mux(MuxCommand),
    /// Inspect a container
    Inspect(InspectCommand),
    /// Decode audio to 48 kHz stereo PCM
    Transcode(TranscodeCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Config(cmd) => cmd.run(&cli).await,
        Commands::Mux(cmd) => cmd.run(&cli).await,
        Commands::Inspect(cmd) => cmd.run(&cli).await,
        Commands::Transcode(cmd) => cmd.run(&cli).await,
    }
}
