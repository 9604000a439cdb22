//! Real-time pacing of encoded frames.

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use voicegate_audio::opusrt::OPUS_SILENCE_20MS;
use voicegate_audio::pcm::PcmFrame;

use crate::config::PlaybackConfig;
use crate::error::PlaybackError;

/// Compresses one 20 ms PCM frame.
pub trait FrameEncoder: Send {
    fn encode(&mut self, frame: &PcmFrame) -> Result<Vec<u8>, PlaybackError>;
}

/// Delivers compressed packets to the transport.
#[async_trait]
pub trait PacketSender: Send {
    async fn send(&mut self, packet: &[u8]) -> Result<(), PlaybackError>;
}

/// Counters from one [`Pacer::play`] run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayStats {
    pub frames_sent: u64,
    pub silence_sent: u64,
}

/// Sends one frame per interval.
#[derive(Debug, Clone)]
pub struct Pacer {
    interval: Duration,
    trailing_silence: usize,
}

impl Pacer {
    pub fn new(config: &PlaybackConfig) -> Self {
        let config = config.clone().normalized();
        Self {
            interval: config.frame_interval(),
            trailing_silence: config.trailing_silence_frames,
        }
    }

    /// Encodes and sends `frames` at the frame rate, then the trailing
    /// silence. A short frame is zero-padded to full length.
    ///
    /// Nothing is sent for an empty input, trailing silence included.
    pub async fn play<I>(
        &self,
        frames: I,
        encoder: &mut dyn FrameEncoder,
        sender: &mut dyn PacketSender,
        cancel: &CancellationToken,
    ) -> Result<PlayStats, PlaybackError>
    where
        I: IntoIterator<Item = PcmFrame>,
        I::IntoIter: Send,
    {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut stats = PlayStats::default();

        for frame in frames {
            if frame.is_empty() {
                continue;
            }
            let frame = if frame.is_complete() {
                frame
            } else {
                frame.padded()
            };
            let packet = encoder.encode(&frame)?;
            wait(&mut ticker, cancel).await?;
            sender.send(&packet).await?;
            stats.frames_sent += 1;
        }

        if stats.frames_sent == 0 {
            return Ok(stats);
        }
        for _ in 0..self.trailing_silence {
            wait(&mut ticker, cancel).await?;
            sender.send(&OPUS_SILENCE_20MS).await?;
            stats.silence_sent += 1;
        }
        Ok(stats)
    }
}

async fn wait(ticker: &mut time::Interval, cancel: &CancellationToken) -> Result<(), PlaybackError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(PlaybackError::Cancelled),
        _ = ticker.tick() => Ok(()),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use tokio::time::Instant;

    /// Encodes a frame as its first two sample bytes.
    pub struct TagEncoder;

    impl FrameEncoder for TagEncoder {
        fn encode(&mut self, frame: &PcmFrame) -> Result<Vec<u8>, PlaybackError> {
            assert!(frame.is_complete());
            Ok(frame.samples()[0].to_le_bytes().to_vec())
        }
    }

    #[derive(Default)]
    pub struct RecordingSender {
        pub sent: Vec<(Instant, Vec<u8>)>,
        pub cancel_after: Option<(usize, CancellationToken)>,
    }

    #[async_trait]
    impl PacketSender for RecordingSender {
        async fn send(&mut self, packet: &[u8]) -> Result<(), PlaybackError> {
            self.sent.push((Instant::now(), packet.to_vec()));
            if let Some((n, token)) = &self.cancel_after {
                if self.sent.len() >= *n {
                    token.cancel();
                }
            }
            Ok(())
        }
    }
}
