//! Container inspection.

use std::fs::File;
use std::io::BufReader;

use anyhow::Context;
use clap::Args;
use voicegate_audio::codec::ogg::OpusPacketReader;
use voicegate_audio::opusrt::{OPUS_SILENCE_20MS, SAMPLE_RATE};

use crate::Cli;

/// Prints the header, packet count and duration of an Ogg/Opus file.
#[derive(Args)]
pub struct InspectCommand {
    /// Container to inspect
    file: String,

    /// List every packet
    #[arg(long)]
    packets: bool,
}

impl InspectCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let file = File::open(&self.file).with_context(|| format!("failed to open {}", self.file))?;
        let mut reader = OpusPacketReader::new(BufReader::new(file));

        let mut count = 0u64;
        let mut silence = 0u64;
        let mut bytes = 0usize;
        let mut last_granule = 0i64;
        let mut serial = None;
        let mut listing = Vec::new();

        while let Some(packet) = reader
            .read_packet()
            .with_context(|| format!("{} is not a valid container", self.file))?
        {
            count += 1;
            bytes += packet.data.len();
            last_granule = packet.granule;
            serial.get_or_insert(packet.serial_no);
            let is_silence = packet.data == OPUS_SILENCE_20MS;
            if is_silence {
                silence += 1;
            }
            if self.packets {
                listing.push((packet.granule, packet.data.len(), is_silence));
            }
        }

        let head = reader.head().context("missing OpusHead")?;
        let samples = (last_granule - i64::from(head.pre_skip)).max(0);
        let seconds = samples as f64 / f64::from(SAMPLE_RATE);

        if cli.json {
            let packets: Vec<_> = listing
                .iter()
                .map(|(granule, len, silent)| {
                    serde_json::json!({ "granule": granule, "len": len, "silence": silent })
                })
                .collect();
            let summary = serde_json::json!({
                "file": self.file,
                "serial": serial,
                "channels": head.channels,
                "pre_skip": head.pre_skip,
                "input_sample_rate": head.input_sample_rate,
                "packets": count,
                "silence_packets": silence,
                "payload_bytes": bytes,
                "duration_secs": seconds,
                "packet_list": packets,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
            return Ok(());
        }

        println!("file:        {}", self.file);
        if let Some(serial) = serial {
            println!("serial:      {}", serial);
        }
        println!("channels:    {}", head.channels);
        println!("pre-skip:    {}", head.pre_skip);
        println!("input rate:  {}", head.input_sample_rate);
        println!("packets:     {} ({} silence)", count, silence);
        println!("payload:     {} bytes", bytes);
        println!("duration:    {:.3}s", seconds);
        for (i, (granule, len, silent)) in listing.iter().enumerate() {
            println!(
                "  #{:<5} granule {:>10}  {:>5} bytes{}",
                i,
                granule,
                len,
                if *silent { "  (silence)" } else { "" }
            );
        }
        Ok(())
    }
}
