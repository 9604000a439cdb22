//! YAML configuration.
//!
//! ```yaml
//! queue_capacity: 100
//! locales: [en-US, de-DE]
//! output_dir: ./recordings
//! decoder:
//!   program: ffmpeg
//! playback:
//!   trailing_silence_frames: 5
//! ```
//!
//! Every field is optional. Zero or empty values fall back to the defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_QUEUE_CAPACITY: usize = 100;
const DEFAULT_READ_BUFFER: usize = 8192;
const DEFAULT_CHANNEL_CAPACITY: usize = 16;
const DEFAULT_FRAME_INTERVAL_MS: u64 = 20;
const DEFAULT_TRAILING_SILENCE: usize = 5;
const DEFAULT_FRAME_QUEUE: usize = 64;

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Capacity of each logical stream's ingest queue.
    pub queue_capacity: usize,

    /// Locales to start a recognition session for, per recognizer.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locales: Vec<String>,

    /// Directory for finished containers (file sink).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,

    pub decoder: DecoderConfig,

    pub playback: PlaybackConfig,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            locales: Vec::new(),
            output_dir: None,
            decoder: DecoderConfig::default(),
            playback: PlaybackConfig::default(),
        }
    }
}

impl VoiceConfig {
    /// Parses YAML and normalises the result.
    pub fn from_yaml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: VoiceConfig = if s.trim().is_empty() {
            VoiceConfig::default()
        } else {
            serde_yaml::from_str(s)?
        };
        Ok(cfg.normalized())
    }

    /// Reads and parses a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Serializes to YAML.
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Replaces zero or empty values with defaults.
    pub fn normalized(self) -> Self {
        Self {
            queue_capacity: if self.queue_capacity == 0 {
                DEFAULT_QUEUE_CAPACITY
            } else {
                self.queue_capacity
            },
            locales: self
                .locales
                .into_iter()
                .filter(|l| !l.trim().is_empty())
                .collect(),
            output_dir: self.output_dir,
            decoder: self.decoder.normalized(),
            playback: self.playback.normalized(),
        }
    }
}

/// External decoder process settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    /// Executable to run.
    pub program: String,
    /// Arguments. The process reads stdin and writes s16le 48k stereo to stdout.
    pub args: Vec<String>,
    /// Size of each stdout read.
    pub read_buffer: usize,
    /// Capacity of the channels between pipeline stages.
    pub channel_capacity: usize,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            args: default_decoder_args(),
            read_buffer: DEFAULT_READ_BUFFER,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl DecoderConfig {
    /// A decoder running `program` with `args`.
    pub fn command(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn normalized(self) -> Self {
        let defaults = Self::default();
        Self {
            program: if self.program.is_empty() {
                defaults.program
            } else {
                self.program
            },
            args: self.args,
            read_buffer: if self.read_buffer == 0 {
                defaults.read_buffer
            } else {
                self.read_buffer
            },
            channel_capacity: if self.channel_capacity == 0 {
                defaults.channel_capacity
            } else {
                self.channel_capacity
            },
        }
    }
}

fn default_decoder_args() -> Vec<String> {
    [
        "-hide_banner",
        "-loglevel",
        "error",
        "-fflags",
        "nobuffer",
        "-flags",
        "low_delay",
        "-probesize",
        "32",
        "-analyzeduration",
        "0",
        "-i",
        "pipe:0",
        "-f",
        "s16le",
        "-ar",
        "48000",
        "-ac",
        "2",
        "pipe:1",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Paced playback settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Interval between sent frames.
    pub frame_interval_ms: u64,
    /// Silence frames sent after the last audio frame.
    pub trailing_silence_frames: usize,
    /// Capacity of the PCM frame channel out of the transcoder.
    pub frame_queue: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
            trailing_silence_frames: DEFAULT_TRAILING_SILENCE,
            frame_queue: DEFAULT_FRAME_QUEUE,
        }
    }
}

impl PlaybackConfig {
    pub fn normalized(self) -> Self {
        Self {
            frame_interval_ms: if self.frame_interval_ms == 0 {
                DEFAULT_FRAME_INTERVAL_MS
            } else {
                self.frame_interval_ms
            },
            trailing_silence_frames: self.trailing_silence_frames,
            frame_queue: if self.frame_queue == 0 {
                DEFAULT_FRAME_QUEUE
            } else {
                self.frame_queue
            },
        }
    }

    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.frame_interval_ms)
    }
}
