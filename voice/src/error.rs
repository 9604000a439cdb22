//! Error types for voicegate.

use std::io;

use thiserror::Error;
use voicegate_audio::opusrt::PacketError;

use crate::stream_id::StreamId;

/// Errors from the gap-aware container encoder.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The frame does not move the timeline forward.
    #[error("stale frame: sample index {sample_index} is not after {last}")]
    Stale { sample_index: u32, last: u32 },

    #[error("stream closed")]
    Closed,

    #[error("container write failed: {0}")]
    Io(#[from] io::Error),
}

/// Errors from the stream router.
#[derive(Debug, Error)]
pub enum RouterError {
    #[error("stream resolution failed: {0:#}")]
    Resolve(anyhow::Error),

    #[error("container sink failed: {0}")]
    Sink(#[source] io::Error),

    #[error("container encoder failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("malformed packet: {0}")]
    Packet(#[from] PacketError),

    #[error("unknown stream {0}")]
    UnknownStream(StreamId),

    #[error("router shut down")]
    Closed,
}

/// Errors from the frame store and container building.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid range: start {start} is after end {end}")]
    InvalidRange { start: u32, end: u32 },

    #[error("no frames stored for {stream} in [{start}, {end}]")]
    NoFrames {
        stream: StreamId,
        start: u32,
        end: u32,
    },

    #[error("container build failed: {0}")]
    Encode(#[from] EncodeError),

    #[error("store backend failed: {0}")]
    Backend(String),
}

/// Errors from the playback pipeline.
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("failed to start decoder `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("decoder exited with {status}: {stderr}")]
    DecoderExited { status: String, stderr: String },

    #[error("decoder pipe failed: {0}")]
    Io(#[from] io::Error),

    #[error("playback cancelled")]
    Cancelled,

    #[error("frame encoding failed: {0}")]
    Encode(String),

    #[error("packet send failed: {0}")]
    Send(String),
}

/// Errors from recognition sessions.
#[derive(Debug, Error)]
pub enum RecognizeError {
    #[error("session start failed: {0}")]
    Start(String),

    #[error("session push failed: {0}")]
    Push(String),

    #[error("session closed")]
    Closed,
}

/// Errors from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config read failed: {0}")]
    Io(#[from] io::Error),

    #[error("config parse failed: {0}")]
    Parse(#[from] serde_yaml::Error),
}
