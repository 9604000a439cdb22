//! Logical stream identity and the external lookup performed on first sight.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use voicegate_audio::opusrt::EpochMillis;

use crate::encoder::EncoderStats;
use crate::stream_id::StreamId;

/// Identity of an inbound audio source within a call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamKey {
    /// Synchronization source of the sender.
    pub ssrc: u32,
    pub call_id: String,
    pub channel_id: String,
}

impl StreamKey {
    pub fn new(ssrc: u32, call_id: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            ssrc,
            call_id: call_id.into(),
            channel_id: channel_id.into(),
        }
    }
}

/// One continuous audio source for the lifetime of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalStream {
    pub id: StreamId,
    pub key: StreamKey,
    /// Speaker identity, when the resolver knows it.
    pub speaker: Option<String>,
    /// Sequence number of the first observed packet.
    pub sequence_offset: u16,
    /// Sample index of the first observed packet.
    pub sample_offset: u32,
    pub created_at: EpochMillis,
}

/// Summary of a logical stream once its container is finalised.
#[derive(Debug, Clone)]
pub struct StreamReport {
    pub stream: LogicalStream,
    pub stats: EncoderStats,
    /// Frames dropped at ingest because the queue was full.
    pub dropped_frames: u64,
    /// Decodable container duration.
    pub duration: Duration,
    /// True when the container was handed to the sink intact.
    pub committed: bool,
    /// Why the container was discarded, if it was.
    pub error: Option<String>,
}

/// External lookup run once when a key is first seen.
///
/// Typically maps the synchronization source to a speaker. It may block
/// on I/O; the router never holds a lock across it. A failure drops the
/// triggering packet and leaves nothing cached.
#[async_trait]
pub trait StreamResolver: Send + Sync {
    async fn resolve(&self, key: &StreamKey) -> anyhow::Result<Option<String>>;
}

/// Resolver that knows no speakers.
pub struct AnonymousResolver;

#[async_trait]
impl StreamResolver for AnonymousResolver {
    async fn resolve(&self, _key: &StreamKey) -> anyhow::Result<Option<String>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_anonymous_resolver() {
        let key = StreamKey::new(7, "call", "chan");
        assert_eq!(AnonymousResolver.resolve(&key).await.unwrap(), None);
    }

    #[test]
    fn test_logical_stream_clone() {
        let stream = LogicalStream {
            id: StreamId::from("s1"),
            key: StreamKey::new(3, "call", "chan"),
            speaker: Some("ana".into()),
            sequence_offset: 12,
            sample_offset: 960,
            created_at: EpochMillis::from_millis(1_700_000_000_000),
        };
        let copy = stream.clone();
        assert_eq!(copy, stream);
        assert_eq!(copy.created_at.as_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_key_yaml() {
        let key = StreamKey::new(9, "call", "chan");
        let yaml = serde_yaml::to_string(&key).unwrap();
        assert!(yaml.contains("ssrc: 9"));
        assert_eq!(serde_yaml::from_str::<StreamKey>(&yaml).unwrap(), key);
    }

    #[test]
    fn test_key_equality() {
        assert_eq!(StreamKey::new(1, "a", "b"), StreamKey::new(1, "a", "b"));
        assert_ne!(StreamKey::new(1, "a", "b"), StreamKey::new(2, "a", "b"));
        assert_ne!(StreamKey::new(1, "a", "b"), StreamKey::new(1, "a", "c"));
    }
}
