//! CLI commands module.

mod config;
mod inspect;
mod mux;
mod transcode;

pub use config::ConfigCommand;
pub use inspect::InspectCommand;
pub use mux::MuxCommand;
pub use transcode::TranscodeCommand;

use anyhow::Context;
use voicegate_voice::VoiceConfig;

use crate::Cli;

/// Loads `--config`, or the defaults when none is given.
pub(crate) fn load_config(cli: &Cli) -> anyhow::Result<VoiceConfig> {
    let config = match &cli.config {
        Some(path) => VoiceConfig::load(path)
            .with_context(|| format!("failed to load config {}", path))?,
        None => VoiceConfig::default(),
    };
    Ok(config.normalized())
}

pub(crate) fn print_verbose(cli: &Cli, msg: &str) {
    if cli.verbose {
        eprintln!("[verbose] {}", msg);
    }
}
