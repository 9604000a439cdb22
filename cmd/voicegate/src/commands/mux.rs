//! Container building from a packet list.
//!
//! The input is a YAML (or JSON) list:
//!
//! ```yaml
//! - sequence: 0
//!   sample_index: 0
//!   payload: fcff
//! - sequence: 1
//!   sample_index: 3840
//!   payload: fcfe
//! ```

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use clap::Args;
use serde::Deserialize;
use voicegate_audio::opusrt::CompressedFrame;
use voicegate_voice::{EncodeError, EncoderStats, GapEncoder, StreamId};

use super::{load_config, print_verbose};
use crate::Cli;

/// Builds an Ogg/Opus container, filling gaps with silence.
#[derive(Args)]
pub struct MuxCommand {
    /// Packet list (YAML or JSON)
    #[arg(short = 'f', long = "file")]
    input: String,

    /// Output container (default: `<output_dir>/<new stream id>.ogg`)
    #[arg(short = 'o', long)]
    output: Option<String>,

    /// Ogg stream serial number
    #[arg(long, default_value_t = 1)]
    serial: u32,
}

#[derive(Debug, Deserialize)]
struct PacketEntry {
    #[serde(default)]
    sequence: u16,
    sample_index: u32,
    /// Hex-encoded compressed payload.
    payload: String,
}

impl PacketEntry {
    fn into_frame(self) -> anyhow::Result<CompressedFrame> {
        let payload = hex::decode(self.payload.trim())
            .with_context(|| format!("bad payload at sample {}", self.sample_index))?;
        Ok(CompressedFrame::new(self.sequence, self.sample_index, payload))
    }
}

impl MuxCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let text = std::fs::read_to_string(&self.input)
            .with_context(|| format!("failed to read {}", self.input))?;
        let entries: Vec<PacketEntry> =
            serde_yaml::from_str(&text).context("failed to parse packet list")?;
        if entries.is_empty() {
            bail!("{} contains no packets", self.input);
        }
        print_verbose(cli, &format!("{} packets from {}", entries.len(), self.input));

        let output = match &self.output {
            Some(path) => PathBuf::from(path),
            None => {
                let config = load_config(cli)?;
                let Some(dir) = config.output_dir else {
                    bail!("no --output given and no output_dir configured");
                };
                std::fs::create_dir_all(&dir)?;
                dir.join(format!("{}.ogg", StreamId::generate()))
            }
        };
        let (stats, duration) = mux_to(entries, &output, self.serial, |n, at| {
            print_verbose(cli, &format!("{} silence frames before {}", n, at))
        })?;

        if cli.json {
            let summary = serde_json::json!({
                "output": output.display().to_string(),
                "frames": stats.frames_written,
                "silence_frames": stats.silence_frames,
                "rejected_frames": stats.rejected_frames,
                "duration_ms": duration.as_millis() as u64,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            println!(
                "{}: {} frames, {} silence, {} rejected, {:.3}s",
                output.display(),
                stats.frames_written,
                stats.silence_frames,
                stats.rejected_frames,
                duration.as_secs_f64()
            );
        }
        Ok(())
    }
}

/// Builds the container at `<output>.part` and renames it to `output`
/// once closed. On any failure the partial file is removed and `output`
/// is left untouched.
fn mux_to(
    entries: Vec<PacketEntry>,
    output: &Path,
    serial: u32,
    mut on_gap: impl FnMut(u64, u32),
) -> anyhow::Result<(EncoderStats, Duration)> {
    let part = part_path(output);
    let file =
        File::create(&part).with_context(|| format!("failed to create {}", part.display()))?;

    let result = (|| {
        let mut encoder = GapEncoder::new(BufWriter::new(file), serial)?;
        for entry in entries {
            let frame = entry.into_frame()?;
            match encoder.write_frame(&frame) {
                Ok(0) => {}
                Ok(n) => on_gap(n, frame.sample_index),
                Err(EncodeError::Stale { sample_index, last }) => {
                    tracing::warn!("skipping stale packet {} (last {})", sample_index, last)
                }
                Err(e) => return Err(e.into()),
            }
        }
        encoder.close()?;
        let stats = encoder.stats();
        let duration = encoder.duration();
        encoder
            .into_inner()
            .into_inner()
            .map_err(|e| e.into_error())?
            .sync_all()?;
        std::fs::rename(&part, output)
            .with_context(|| format!("failed to move container to {}", output.display()))?;
        anyhow::Ok((stats, duration))
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&part);
    }
    result
}

fn part_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}
