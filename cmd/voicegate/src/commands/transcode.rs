//! Streaming decode of an audio file.

use std::io::Write;

use anyhow::Context;
use bytes::Bytes;
use clap::Args;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use voicegate_audio::Format;
use voicegate_voice::playback::Transcoder;

use super::{load_config, print_verbose};
use crate::Cli;

const READ_CHUNK: usize = 16 * 1024;

/// Decodes a file through the configured decoder into raw s16le 48 kHz
/// stereo PCM, one 20 ms frame at a time.
#[derive(Args)]
pub struct TranscodeCommand {
    /// Input audio file
    input: String,

    /// Output PCM file (default: stdout)
    #[arg(short = 'o', long)]
    output: Option<String>,
}

impl TranscodeCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let config = load_config(cli)?;
        print_verbose(
            cli,
            &format!("decoder: {} {}", config.decoder.program, config.decoder.args.join(" ")),
        );

        let mut file = tokio::fs::File::open(&self.input)
            .await
            .with_context(|| format!("failed to open {}", self.input))?;

        let (tx, rx) = mpsc::channel(config.decoder.channel_capacity);
        let cancel = CancellationToken::new();
        let transcoder =
            Transcoder::new(config.decoder.clone()).with_frame_queue(config.playback.frame_queue);
        let mut frames = transcoder.start(rx, cancel.clone())?;

        let feeder = tokio::spawn(async move {
            let mut buf = vec![0u8; READ_CHUNK];
            loop {
                let n = file.read(&mut buf).await?;
                if n == 0 || tx.send(Bytes::copy_from_slice(&buf[..n])).await.is_err() {
                    return Ok::<_, std::io::Error>(());
                }
            }
        });

        let mut out: Box<dyn Write> = match &self.output {
            Some(path) => Box::new(std::io::BufWriter::new(
                std::fs::File::create(path).with_context(|| format!("failed to create {}", path))?,
            )),
            None => Box::new(std::io::stdout().lock()),
        };

        let mut count = 0u64;
        let mut pcm_bytes = 0usize;
        tokio::select! {
            res = async {
                while let Some(frame) = frames.next().await {
                    let frame = frame?;
                    out.write_all(&frame.to_le_bytes())?;
                    count += 1;
                    pcm_bytes += frame.len() * 2;
                }
                anyhow::Ok(())
            } => res?,
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                anyhow::bail!("interrupted");
            }
        }
        out.flush()?;
        feeder.await??;

        let seconds = Format::STEREO_48K.duration(pcm_bytes).as_secs_f64();
        if cli.json {
            let summary = serde_json::json!({
                "input": self.input,
                "frames": count,
                "duration_secs": seconds,
            });
            eprintln!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            tracing::info!("{}: {} frames, {:.3}s of PCM", self.input, count, seconds);
        }
        Ok(())
    }
}
